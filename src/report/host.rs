//! Per-host rendering - the core of the report.
//!
//! A `Renderer` owns the resolved palette and the changes printer for one
//! render call. Each host becomes a colored banner line, the task lines
//! selected by the output mode, and a summary block.
//!
//! Tasks that ran a nested orchestration, or whose changes embed a whole
//! report, need that report rendered first. Instead of calling back into
//! the renderer, every nested report becomes a `Frame` in a flat arena:
//! frames are discovered breadth-first, then rendered from the last to the
//! first so each parent finds its children's text ready. Call depth stays
//! the same however deep the input nests.

use super::changes::{format_plain_changes, join_embedded, take_embedded_hosts};
use super::mode::{Presentation, choose_presentation, format_terse};
use super::nested::{ChangesPrinter, NestedPrinter};
use super::summary::HostSummary;
use crate::compress::{COMPRESSED_CHANGES, compress_ids};
use crate::config::RenderOptions;
use crate::console_format::{FIELD_INDENT, WRAP_WIDTH, indent_lines, wrap_text};
use crate::normalize::{Normalized, classify};
use crate::palette::{Palette, strip_esc_sequence};
use crate::types::{HostPayload, HostReport, Outcome, Report, TaskKey, TaskResult, display_value};
use log::{debug, error, warn};
use serde_json::Value;
use std::collections::HashMap;

/// Shown ahead of a host's output for every record missing its result or
/// run order
pub const MALFORMED_RECORD_MESSAGE: &str = "The State execution failed to record the order in which all states \
     were executed. The state return missing data is:";

/// Severity of the host banner. Only ever escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum HostStatus {
    Ok,
    Degraded,
    Failed,
}

/// How a frame's hosts are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// One host after another, as at the top level
    Stacked,
    /// Hosts embedded in a task's changes, indented under the task
    Embedded,
}

#[derive(Debug)]
enum FrameBody {
    /// Output that needs no further rendering
    Text(String),
    Hosts(Report, Layout),
}

/// A report waiting to be rendered
#[derive(Debug)]
struct Frame {
    body: FrameBody,
    indent: usize,
    /// Arena index of the frame nested in (host position, task position)
    nested: HashMap<(usize, usize), usize>,
}

impl Frame {
    fn new(body: FrameBody, indent: usize) -> Self {
        Frame { body, indent, nested: HashMap::new() }
    }
}

/// Rendered text of a finished frame and whether it changed anything
type Rendered = (String, bool);

/// Renders state returns as text
pub struct Renderer<'a> {
    options: &'a RenderOptions,
    palette: Palette,
    printer: Box<dyn ChangesPrinter + 'a>,
}

impl<'a> Renderer<'a> {
    /// Renderer with the palette from `options` and the default nested printer
    pub fn new(options: &'a RenderOptions) -> Self {
        let palette = Palette::new(options.color, options.color_theme.as_deref());
        let printer = NestedPrinter::new(palette.clone(), options.strip_colors);
        Self { options, palette, printer: Box::new(printer) }
    }

    /// Renderer that hands change payloads to `printer`
    pub fn with_printer(options: &'a RenderOptions, printer: Box<dyn ChangesPrinter + 'a>) -> Self {
        let palette = Palette::new(options.color, options.color_theme.as_deref());
        Self { options, palette, printer }
    }

    pub(crate) fn printer(&self) -> &dyn ChangesPrinter {
        self.printer.as_ref()
    }

    /// Render a raw state return
    pub fn render(&self, data: &Value) -> String {
        self.render_at(data, 1)
    }

    /// Render a raw state return whose orchestration tasks sit at `indent`
    pub fn render_at(&self, data: &Value, indent: usize) -> String {
        self.render_frames(Frame::new(self.prepare(data.clone(), indent), indent)).0
    }

    /// Render one host. Returns the text and whether anything changed.
    pub fn render_host(&self, host: &str, payload: &HostPayload, indent: usize) -> (String, bool) {
        let report = Report { hosts: vec![(host.to_string(), payload.clone())] };
        self.render_frames(Frame::new(FrameBody::Hosts(report, Layout::Stacked), indent))
    }

    /// Normalize and, when enabled, compress a raw state return
    fn prepare(&self, data: Value, indent: usize) -> FrameBody {
        match classify(data) {
            Normalized::Verbatim(text) => FrameBody::Text(text),
            Normalized::Hosts(map) => {
                if map.is_empty() {
                    error!("Data passed to the renderer is not a valid state return: {}", Value::Object(map));
                    return FrameBody::Text(String::new());
                }
                let report = Report::from_map(map);
                debug!("Rendering {} hosts with {} tasks at indent {}", report.hosts.len(), report.valid_task_count(), indent);
                FrameBody::Hosts(self.maybe_compress(report), Layout::Stacked)
            }
            Normalized::Degenerate(value) => {
                error!("Data passed to the renderer is not a valid state return: {}", value);
                FrameBody::Text(String::new())
            }
        }
    }

    fn maybe_compress(&self, report: Report) -> Report {
        if !self.options.state_compress_ids {
            return report;
        }
        match compress_ids(&report) {
            Ok(compressed) => compressed,
            Err(e) => {
                warn!("Unable to compress state output by id, rendering it uncompressed: {}", e);
                report
            }
        }
    }

    /// Discover every nested frame under `root`, then render them deepest
    /// first
    fn render_frames(&self, root: Frame) -> Rendered {
        let mut frames = vec![root];

        let mut next = 0;
        while next < frames.len() {
            let parent_indent = frames[next].indent;
            let mut found = Vec::new();
            if let FrameBody::Hosts(report, _) = &mut frames[next].body {
                for (h, (_, payload)) in report.hosts.iter_mut().enumerate() {
                    let HostPayload::Tasks(tasks) = payload else {
                        continue;
                    };
                    for (t, entry) in tasks.tasks.iter_mut().enumerate() {
                        let task = &mut entry.task;
                        if task.is_orchestration() {
                            let changes = std::mem::take(&mut task.changes);
                            let indent = parent_indent + 1;
                            found.push(((h, t), Frame::new(self.prepare(changes, indent), indent)));
                        } else if let Some(hosts) = take_embedded_hosts(&mut task.changes) {
                            let body = FrameBody::Hosts(Report::from_map(hosts), Layout::Embedded);
                            found.push(((h, t), Frame::new(body, 1)));
                        }
                    }
                }
            }
            for (slot, frame) in found {
                frames.push(frame);
                let child = frames.len() - 1;
                frames[next].nested.insert(slot, child);
            }
            next += 1;
        }
        debug!("Rendering {} report frames", frames.len());

        // Children always sit after their parent in the arena
        let mut done: Vec<Option<Rendered>> = frames.iter().map(|_| None).collect();
        for (index, frame) in frames.iter().enumerate().rev() {
            let mut nested: HashMap<(usize, usize), Rendered> =
                frame.nested.iter().filter_map(|(slot, child)| done[*child].take().map(|r| (*slot, r))).collect();
            done[index] = Some(self.render_frame(frame, &mut nested));
        }
        done.first_mut().and_then(Option::take).unwrap_or_default()
    }

    fn render_frame(&self, frame: &Frame, nested: &mut HashMap<(usize, usize), Rendered>) -> Rendered {
        let (report, layout) = match &frame.body {
            FrameBody::Text(text) => return (text.clone(), true),
            FrameBody::Hosts(report, layout) => (report, *layout),
        };

        let hosts = report
            .hosts
            .iter()
            .enumerate()
            .map(|(h, (host, payload))| self.render_host_frame(h, host, payload, frame.indent, nested));

        match layout {
            Layout::Embedded => {
                let (changed, text) = join_embedded(hosts);
                (text, changed)
            }
            Layout::Stacked => {
                let mut changed = false;
                let texts: Vec<String> = hosts
                    .map(|(text, host_changed)| {
                        changed = changed || host_changed;
                        text
                    })
                    .collect();
                (texts.join("\n"), changed)
            }
        }
    }

    fn render_host_frame(
        &self,
        h: usize,
        host: &str,
        payload: &HostPayload,
        indent: usize,
        nested: &mut HashMap<(usize, usize), Rendered>,
    ) -> Rendered {
        let p = &self.palette;
        let mut lines = Vec::new();
        let mut changed = false;

        let banner_color = match payload {
            HostPayload::Scalar(value) => {
                changed = true;
                lines.push(format!("{}    {}{}", p.green, value, p.endc));
                &p.cyan
            }
            HostPayload::Text(text) => {
                changed = true;
                for line in text.lines() {
                    lines.push(format!("{}    {}{}", p.green, line, p.endc));
                }
                &p.cyan
            }
            HostPayload::ErrorList(errors) => {
                lines.push(format!("    {}Data failed to compile:{}", p.light_red, p.endc));
                for err in errors {
                    let err = if self.options.strip_colors { strip_esc_sequence(err) } else { err.clone() };
                    lines.push(format!("{}----------\n    {}{}", p.light_red, err, p.endc));
                }
                &p.light_red
            }
            HostPayload::Tasks(report) => {
                let (task_lines, summary, status) = self.render_tasks(report, indent, |t| nested.remove(&(h, t)));
                lines.extend(task_lines);
                lines.extend(summary.render(
                    host,
                    p,
                    self.options.state_output_pct,
                    self.options.state_output_profile,
                ));
                changed = summary.changed > 0;
                match status {
                    HostStatus::Ok => &p.green,
                    HostStatus::Degraded => &p.light_yellow,
                    HostStatus::Failed => &p.red,
                }
            }
            HostPayload::Empty => {
                debug!("Host {} returned nothing printable", host);
                &p.green
            }
        };

        let host = if self.options.strip_colors { strip_esc_sequence(host) } else { host.to_string() };
        lines.insert(0, format!("{}{}:{}", banner_color, host, p.endc));
        (lines.join("\n"), changed)
    }

    /// `nested_for` hands out the rendered nested report of the task at a
    /// position in `report.tasks`, if it has one
    fn render_tasks(
        &self,
        report: &HostReport,
        indent: usize,
        mut nested_for: impl FnMut(usize) -> Option<Rendered>,
    ) -> (Vec<String>, HostSummary, HostStatus) {
        let options = self.options;
        let p = &self.palette;
        let mode = options.state_output;
        let filters = options.filter_sets();

        let mut lines = Vec::new();
        let mut summary = HostSummary::default();
        let mut status = HostStatus::Ok;

        // Last malformed record first
        for record in report.malformed.iter().rev() {
            lines.push(MALFORMED_RECORD_MESSAGE.to_string());
            lines.push(serde_json::to_string_pretty(record).unwrap_or_else(|_| record.to_string()));
        }

        for (position, entry) in report.ordered() {
            let (key, task) = (&entry.key, &entry.task);
            let count = if options.state_compress_ids { key.compressed_count().unwrap_or(1) } else { 1 };
            summary.counts.add(task.result, count);
            summary.record_duration(task.duration.as_ref(), task.parallel);

            let (task_changed, changes_text) = match nested_for(position) {
                Some((text, _)) if task.is_orchestration() => {
                    summary.changed += 1;
                    (true, indent_lines(&format!("\n{}", text), FIELD_INDENT * indent))
                }
                Some(embedded) => {
                    let (text, changed) = count_changes(&mut summary, task, count, embedded);
                    (changed, text)
                }
                None => {
                    let (changed, text) = format_plain_changes(self, &task.changes);
                    let (text, changed) = count_changes(&mut summary, task, count, (text, changed));
                    (changed, text)
                }
            };

            let quiet = options.state_output_diff || !options.state_verbose;
            if quiet && task.result.is_success() && !task_changed {
                continue;
            }

            let mut color = if task_changed { &p.cyan } else { &p.green };
            match task.result {
                Outcome::Failed => {
                    color = &p.red;
                    status = status.max(HostStatus::Failed);
                }
                Outcome::Pending => {
                    color = &p.light_yellow;
                    status = status.max(HostStatus::Degraded);
                }
                Outcome::Succeeded => {}
            }

            let key = if mode.by_id { key.with_name(key.id.clone()) } else { key.clone() };

            match choose_presentation(mode, &filters, task.result, task_changed) {
                Presentation::Skip => {}
                Presentation::Terse => lines.push(format_terse(
                    color,
                    &key,
                    task,
                    p,
                    &options.state_tabular,
                    options.state_output_profile,
                )),
                Presentation::Full => {
                    lines.extend(self.full_block(color, &key, task, &changes_text));
                    if let Some(warnings) = &task.warnings {
                        summary.counts.warnings += 1;
                        let wrapped = wrap_text(&warnings.join("\n"), WRAP_WIDTH, FIELD_INDENT);
                        lines.push(format!("   {} Warnings: {}{}", p.light_red, wrapped.trim_start(), p.endc));
                    }
                }
            }
        }

        (lines, summary, status)
    }

    fn full_block(&self, color: &str, key: &TaskKey, task: &TaskResult, changes_text: &str) -> Vec<String> {
        let endc = &self.palette.endc;
        let mut lines = vec![
            format!("{}----------{}", color, endc),
            format!("    {}      ID: {}{}", color, key.id, endc),
            format!("    {}Function: {}.{}{}", color, key.module, key.function, endc),
        ];
        if key.id != key.name {
            lines.push(format!("    {}    Name: {}{}", color, key.name, endc));
        }
        lines.push(format!("    {}  Result: {}{}", color, task.result, endc));
        lines.push(format!("    {} Comment: {}{}", color, comment_text(task), endc));

        if self.options.state_output_profile
            && let Some(start) = &task.start_time
        {
            let duration = task.duration.as_ref().map(|d| format!("{} ms", display_value(d))).unwrap_or_default();
            lines.push(format!("    {} Started: {}{}", color, start, endc));
            lines.push(format!("    {}Duration: {}{}", color, duration, endc));
        }

        lines.push(format!("{}     Changes:   {}{}", color, changes_text, endc));
        lines
    }
}

/// Add a task's changes to the summary's changed count
fn count_changes(summary: &mut HostSummary, task: &TaskResult, count: usize, changes: Rendered) -> Rendered {
    if changes.1 {
        summary.changed += if count > 1 { compressed_change_count(task) } else { 1 };
    }
    changes
}

/// Change count of a folded record: one per constituent that changed
fn compressed_change_count(task: &TaskResult) -> usize {
    match task.changes.get(COMPRESSED_CHANGES) {
        Some(Value::Object(nested)) if !nested.is_empty() => nested.len(),
        _ => 1,
    }
}

/// Comment text with continuation lines aligned under the first, plus any
/// attached `data`
fn comment_text(task: &TaskResult) -> String {
    let raw = match &task.comment {
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join("\n"),
        other => display_value(other),
    };
    let mut comment = raw.trim().replace('\n', &format!("\n{}", " ".repeat(FIELD_INDENT)));

    match &task.data {
        Some(Value::Array(items)) => {
            for item in items {
                comment.push(' ');
                comment.push_str(&display_value(item));
            }
        }
        Some(Value::Object(map)) => {
            for (k, v) in map {
                comment.push_str(&format!("\n\t\t{}: {}", k, display_value(v)));
            }
        }
        Some(other) => {
            comment.push(' ');
            comment.push_str(&display_value(other));
        }
        None => {}
    }

    comment
}

#[cfg(test)]
#[path = "host_test.rs"]
mod host_test;
