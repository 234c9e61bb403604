//! Output modes and the one-line task formats.
//!
//! Every task is either skipped, shown as a single terse line, or shown as
//! a full block. The decision depends only on the configured mode, the
//! filter sets, the task's result and whether it changed anything.

use crate::console_format::{Align, pad_left, pad_right, pad_with};
use crate::palette::Palette;
use crate::types::{Outcome, TaskKey, TaskResult, display_value};
use log::warn;
use serde::Deserialize;

/// Base output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    #[default]
    Full,
    Terse,
    Mixed,
    Changes,
    Filter,
}

/// Output style plus the `_id` modifier, which shows a task's id where its
/// name would be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub struct OutputMode {
    pub style: OutputStyle,
    pub by_id: bool,
}

impl OutputMode {
    /// Parse a `state_output` value such as `terse` or `changes_id`.
    ///
    /// Matching is case-insensitive and by prefix; anything unrecognized
    /// falls back to full output.
    pub fn parse(value: &str) -> Self {
        let value = value.to_lowercase();
        let by_id = value.ends_with("_id");

        let style = if value.starts_with("filter") {
            OutputStyle::Filter
        } else if value.starts_with("terse") {
            OutputStyle::Terse
        } else if value.starts_with("mixed") {
            OutputStyle::Mixed
        } else if value.starts_with("changes") {
            OutputStyle::Changes
        } else {
            if !value.starts_with("full") {
                warn!("Unknown state_output {:?}, using full output", value);
            }
            OutputStyle::Full
        };

        OutputMode { style, by_id }
    }
}

impl From<String> for OutputMode {
    fn from(value: String) -> Self {
        OutputMode::parse(&value)
    }
}

/// Layout of terse lines
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "TabularSetting")]
pub enum Tabular {
    /// `<word> Name: ... - Function: ... - Result: ...`
    #[default]
    Off,
    /// Fixed-width columns
    Aligned,
    /// User template with `{field}` substitution
    Template(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TabularSetting {
    Flag(bool),
    Template(String),
}

impl From<TabularSetting> for Tabular {
    fn from(setting: TabularSetting) -> Self {
        match setting {
            TabularSetting::Flag(true) => Tabular::Aligned,
            TabularSetting::Flag(false) => Tabular::Off,
            TabularSetting::Template(template) => Tabular::Template(template),
        }
    }
}

/// Result values (`"True"`, `"False"`, `"None"`) that filter mode hides or
/// shortens
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSets {
    pub exclude: Vec<String>,
    pub terse: Vec<String>,
}

impl FilterSets {
    fn is_terse(&self, outcome: Outcome) -> bool {
        self.terse.iter().any(|v| v == outcome.as_str())
    }

    fn is_excluded(&self, outcome: Outcome) -> bool {
        self.exclude.iter().any(|v| v == outcome.as_str())
    }
}

/// How a single task is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Skip,
    Terse,
    Full,
}

/// Pick the presentation of one task. In filter mode terse wins over exclude.
pub fn choose_presentation(mode: OutputMode, filters: &FilterSets, outcome: Outcome, changed: bool) -> Presentation {
    match mode.style {
        OutputStyle::Filter if filters.is_terse(outcome) => Presentation::Terse,
        OutputStyle::Filter if filters.is_excluded(outcome) => Presentation::Skip,
        OutputStyle::Terse => Presentation::Terse,
        OutputStyle::Mixed if outcome != Outcome::Failed => Presentation::Terse,
        OutputStyle::Changes if outcome == Outcome::Succeeded && !changed => Presentation::Terse,
        _ => Presentation::Full,
    }
}

/// One-word summary of a task
pub fn outcome_word(task: &TaskResult) -> &'static str {
    match task.result {
        Outcome::Failed => "Failed",
        Outcome::Pending => "Differs",
        Outcome::Succeeded if task.has_changes() => "Changed",
        Outcome::Succeeded => "Clean",
    }
}

/// Format a task as one line (warnings may add lines in front of it)
pub fn format_terse(
    color: &str,
    key: &TaskKey,
    task: &TaskResult,
    palette: &Palette,
    tabular: &Tabular,
    profile: bool,
) -> String {
    let word = outcome_word(task);
    let duration = task.duration.as_ref().map(display_value).unwrap_or_default();
    let start = task.start_time.as_deref().filter(|_| profile);

    match tabular {
        Tabular::Aligned => {
            let mut line = String::new();
            if let Some(warnings) = &task.warnings {
                line.push_str(&format!("{}Warnings:\n{}{}\n", palette.light_red, warnings.join("\n"), palette.endc));
            }
            line.push_str(color);
            if let Some(start) = start {
                line.push_str(&format!("{} [{:>7} ms] ", start, duration));
            }
            line.push_str(&format!(
                "{}.{} {}   Name: {}{}",
                pad_left(&key.module, 10),
                pad_right(&key.function, 10),
                pad_right(word, 7),
                key.name,
                palette.endc
            ));
            line
        }
        Tabular::Template(template) => render_template(
            template,
            &TemplateFields {
                color,
                name: &key.name,
                module: &key.module,
                function: &key.function,
                outcome: word,
                result: task.result.as_str(),
                endc: &palette.endc,
                start_time: task.start_time.as_deref().unwrap_or(""),
                duration: &duration,
            },
        ),
        Tabular::Off => {
            let mut line = String::new();
            if let Some(warnings) = &task.warnings {
                line.push_str(&format!("{}Warnings:\n{}{}", palette.light_red, warnings.join("\n"), palette.endc));
            }
            line.push_str(&format!(
                " {}{} Name: {} - Function: {}.{} - Result: {}",
                color, word, key.name, key.module, key.function, task.result
            ));
            if let Some(start) = start {
                line.push_str(&format!(" Started: - {} Duration: {} ms", start, duration));
            }
            line.push_str(&palette.endc);
            line
        }
    }
}

/// Values available to a custom tabular template
#[derive(Debug, Clone, Copy)]
pub struct TemplateFields<'a> {
    pub color: &'a str,
    pub name: &'a str,
    pub module: &'a str,
    pub function: &'a str,
    pub outcome: &'a str,
    pub result: &'a str,
    pub endc: &'a str,
    pub start_time: &'a str,
    pub duration: &'a str,
}

impl TemplateFields<'_> {
    fn lookup(&self, field: &str) -> Option<&str> {
        let value = match field {
            "0" | "color" => self.color,
            "1" | "name" => self.name,
            "2" | "module" => self.module,
            "3" | "function" => self.function,
            "4" | "outcome" => self.outcome,
            "5" | "endc" => self.endc,
            "6" | "start_time" | "6[start_time]" => self.start_time,
            "result" | "6[result]" => self.result,
            "duration" | "6[duration]" => self.duration,
            "6[name]" => self.name,
            _ => return None,
        };
        Some(value)
    }
}

/// Text format of a `{field:spec}` placeholder:
/// `[[fill]align][width][.precision][s]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Align,
    width: usize,
    precision: Option<usize>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<Self> {
        let align_of = |c: char| match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            _ => None,
        };

        let mut parsed = FormatSpec { fill: ' ', align: Align::Left, width: 0, precision: None };
        let mut chars = spec.chars();
        let rest = match (chars.next(), chars.next().and_then(align_of)) {
            (Some(fill), Some(align)) => {
                parsed.fill = fill;
                parsed.align = align;
                &spec[fill.len_utf8() + 1..]
            }
            (Some(first), None) if align_of(first).is_some() => {
                parsed.align = align_of(first)?;
                &spec[1..]
            }
            _ => spec,
        };

        let rest = rest.strip_suffix('s').unwrap_or(rest);
        let (width, precision) = match rest.split_once('.') {
            Some((width, precision)) => (width, Some(precision)),
            None => (rest, None),
        };
        if !width.is_empty() {
            parsed.width = width.parse().ok()?;
        }
        if let Some(precision) = precision {
            parsed.precision = Some(precision.parse().ok()?);
        }
        Some(parsed)
    }

    fn apply(&self, value: &str) -> String {
        match self.precision {
            Some(n) => pad_with(&value.chars().take(n).collect::<String>(), self.width, self.fill, self.align),
            None => pad_with(value, self.width, self.fill, self.align),
        }
    }
}

/// Value of one placeholder body such as `name`, `2:>10` or `6[duration]`
fn render_field(placeholder: &str, fields: &TemplateFields<'_>) -> Option<String> {
    match placeholder.split_once(':') {
        Some((field, spec)) => Some(FormatSpec::parse(spec)?.apply(fields.lookup(field)?)),
        None => fields.lookup(placeholder).map(str::to_string),
    }
}

/// Substitute `{field}` and `{field:spec}` placeholders. Fields are named or
/// positional (`{0}` to `{6}`, with `{6[start_time]}` style lookups into the
/// record); the spec pads the value with a fill, alignment and width, and
/// may cut it to a precision. `{{` and `}}` produce literal braces; unknown
/// fields, unsupported specs and unterminated fields are copied through
/// unchanged.
pub fn render_template(template: &str, fields: &TemplateFields<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('{')
            && let Some(end) = tail.find('}')
            && let Some(value) = render_field(&tail[1..end], fields)
        {
            out.push_str(&value);
            rest = &tail[end + 1..];
            continue;
        }

        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(result: serde_json::Value, changes: serde_json::Value) -> TaskResult {
        let record = json!({"result": result, "changes": changes, "__run_num__": 0});
        TaskResult::from_map(record.as_object().unwrap().clone()).unwrap()
    }

    fn filters(exclude: &[&str], terse: &[&str]) -> FilterSets {
        FilterSets {
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            terse: terse.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_output_mode() {
        assert_eq!(OutputMode::parse("full"), OutputMode { style: OutputStyle::Full, by_id: false });
        assert_eq!(OutputMode::parse("Terse"), OutputMode { style: OutputStyle::Terse, by_id: false });
        assert_eq!(OutputMode::parse("changes_id"), OutputMode { style: OutputStyle::Changes, by_id: true });
        assert_eq!(OutputMode::parse("filter_id"), OutputMode { style: OutputStyle::Filter, by_id: true });
        assert_eq!(OutputMode::parse("mixed"), OutputMode { style: OutputStyle::Mixed, by_id: false });
        assert_eq!(OutputMode::parse("bogus").style, OutputStyle::Full);
    }

    #[test]
    fn test_tabular_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            tabular: Tabular,
        }
        let on: Wrapper = toml::from_str("tabular = true").unwrap();
        assert_eq!(on.tabular, Tabular::Aligned);
        let off: Wrapper = toml::from_str("tabular = false").unwrap();
        assert_eq!(off.tabular, Tabular::Off);
        let custom: Wrapper = toml::from_str("tabular = \"{name}\"").unwrap();
        assert_eq!(custom.tabular, Tabular::Template("{name}".to_string()));
    }

    #[test]
    fn test_presentation_table() {
        let none = FilterSets::default();
        let full = OutputMode::parse("full");
        let terse = OutputMode::parse("terse");
        let mixed = OutputMode::parse("mixed");
        let changes = OutputMode::parse("changes");

        assert_eq!(choose_presentation(full, &none, Outcome::Succeeded, false), Presentation::Full);
        assert_eq!(choose_presentation(terse, &none, Outcome::Failed, true), Presentation::Terse);
        assert_eq!(choose_presentation(mixed, &none, Outcome::Pending, false), Presentation::Terse);
        assert_eq!(choose_presentation(mixed, &none, Outcome::Failed, false), Presentation::Full);
        assert_eq!(choose_presentation(changes, &none, Outcome::Succeeded, false), Presentation::Terse);
        assert_eq!(choose_presentation(changes, &none, Outcome::Succeeded, true), Presentation::Full);
        assert_eq!(choose_presentation(changes, &none, Outcome::Pending, false), Presentation::Full);
    }

    #[test]
    fn test_filter_terse_wins_over_exclude() {
        let filter = OutputMode::parse("filter");
        let sets = filters(&["True", ""], &["True"]);
        assert_eq!(choose_presentation(filter, &sets, Outcome::Succeeded, false), Presentation::Terse);

        let sets = filters(&["True", ""], &[]);
        assert_eq!(choose_presentation(filter, &sets, Outcome::Succeeded, false), Presentation::Skip);
        assert_eq!(choose_presentation(filter, &sets, Outcome::Failed, false), Presentation::Full);
    }

    #[test]
    fn test_outcome_words() {
        assert_eq!(outcome_word(&task(json!(true), json!({}))), "Clean");
        assert_eq!(outcome_word(&task(json!(true), json!({"pid": 1}))), "Changed");
        assert_eq!(outcome_word(&task(json!(false), json!({"pid": 1}))), "Failed");
        assert_eq!(outcome_word(&task(json!(null), json!({}))), "Differs");
    }

    #[test]
    fn test_terse_line() {
        let key = TaskKey::parse("pkg_|-vim_|-vim_|-installed");
        let line = format_terse("", &key, &task(json!(true), json!({})), &Palette::plain(), &Tabular::Off, false);
        assert_eq!(line, " Clean Name: vim - Function: pkg.installed - Result: True");
    }

    #[test]
    fn test_terse_line_with_profile_and_warnings() {
        let key = TaskKey::parse("pkg_|-vim_|-vim_|-installed");
        let record = json!({
            "result": true, "changes": {}, "__run_num__": 0,
            "start_time": "10:00:00.000000", "duration": 1.5, "warnings": ["old syntax"],
        });
        let task = TaskResult::from_map(record.as_object().unwrap().clone()).unwrap();

        let line = format_terse("", &key, &task, &Palette::plain(), &Tabular::Off, true);
        assert_eq!(
            line,
            "Warnings:\nold syntax Clean Name: vim - Function: pkg.installed - Result: True \
             Started: - 10:00:00.000000 Duration: 1.5 ms"
        );

        // Profiling off: no timing suffix
        let line = format_terse("", &key, &task, &Palette::plain(), &Tabular::Off, false);
        assert!(!line.contains("Started"));
    }

    #[test]
    fn test_aligned_line() {
        let key = TaskKey::parse("cmd_|-hello_|-echo hello_|-run");
        let record = json!({
            "result": true, "changes": {"pid": 4}, "__run_num__": 0,
            "start_time": "19:10:10.969049", "duration": 8.546,
        });
        let task = TaskResult::from_map(record.as_object().unwrap().clone()).unwrap();

        let line = format_terse("", &key, &task, &Palette::plain(), &Tabular::Aligned, true);
        assert_eq!(line, "19:10:10.969049 [  8.546 ms]        cmd.run        Changed   Name: echo hello");
    }

    #[test]
    fn test_render_template() {
        let fields = TemplateFields {
            color: "",
            name: "vim",
            module: "pkg",
            function: "installed",
            outcome: "Clean",
            result: "True",
            endc: "",
            start_time: "",
            duration: "",
        };
        assert_eq!(render_template("{2}.{3} {name} -> {outcome}", &fields), "pkg.installed vim -> Clean");
        assert_eq!(render_template("{{literal}} {result}", &fields), "{literal} True");
        assert_eq!(render_template("{unknown} {name", &fields), "{unknown} {name");
    }

    #[test]
    fn test_template_format_specs() {
        let key = TaskKey::parse("pkg_|-vim_|-vim_|-installed");
        let record = json!({
            "result": true, "changes": {}, "__run_num__": 0,
            "start_time": "10:00:00.000000", "duration": 1.5,
        });
        let task = TaskResult::from_map(record.as_object().unwrap().clone()).unwrap();

        let template = Tabular::Template("[{0}{2:>10}.{3:<10} {4:7}   Name: {1}{5}]".to_string());
        let line = format_terse("", &key, &task, &Palette::plain(), &template, false);
        assert_eq!(line, "[       pkg.installed  Clean     Name: vim]");

        let template = Tabular::Template("{6[start_time]} [{6[duration]:>7} ms] {1:*^9}|{3:.4}".to_string());
        let line = format_terse("", &key, &task, &Palette::plain(), &template, false);
        assert_eq!(line, "10:00:00.000000 [    1.5 ms] ***vim***|inst");
    }

    #[test]
    fn test_template_bad_spec_is_literal() {
        let fields = TemplateFields {
            color: "",
            name: "vim",
            module: "pkg",
            function: "installed",
            outcome: "Clean",
            result: "True",
            endc: "",
            start_time: "",
            duration: "",
        };
        assert_eq!(render_template("{2:>x} {7:>3} {6[pid]}", &fields), "{2:>x} {7:>3} {6[pid]}");
        assert_eq!(render_template("{name:}", &fields), "vim");
    }
}
