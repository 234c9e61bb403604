//! Per-host summary statistics.
//!
//! This module accumulates result counts, change counts and durations while
//! a host's tasks are rendered, and produces the trailing summary block.

use crate::console_format::pad_left;
use crate::palette::Palette;
use crate::types::Outcome;
use log::error;
use serde_json::Value;

const SUCCEEDED: &str = "Succeeded";
const FAILED: &str = "Failed";
const WARNINGS: &str = "Warnings";

/// Longest label a count line can carry ("Succeeded")
const LABEL_MAX_LEN: usize = 9;

/// Task counts per result kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounts {
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks with a `None` result
    pub pending: usize,
    /// Tasks shown with warnings
    pub warnings: usize,
}

impl ResultCounts {
    pub fn add(&mut self, outcome: Outcome, count: usize) {
        match outcome {
            Outcome::Succeeded => self.succeeded += count,
            Outcome::Failed => self.failed += count,
            Outcome::Pending => self.pending += count,
        }
    }

    /// Tasks run, warnings excluded
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.pending
    }
}

/// Statistics gathered for one host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSummary {
    pub counts: ResultCounts,
    /// Tasks that changed something
    pub changed: usize,
    /// Durations of sequentially run tasks, in ms
    pub durations: Vec<f64>,
    /// Durations of tasks run in parallel, in ms
    pub parallel_durations: Vec<f64>,
}

impl HostSummary {
    /// Record the duration of one task. A missing duration counts as zero;
    /// one that cannot be parsed is logged and skipped.
    pub fn record_duration(&mut self, value: Option<&Value>, parallel: bool) {
        let parsed = match value {
            None => Some(0.0),
            Some(v) => parse_duration(v),
        };

        let Some(ms) = parsed else {
            error!("Cannot parse a float from duration {}", value.map(|v| v.to_string()).unwrap_or_default());
            return;
        };

        if parallel {
            self.parallel_durations.push(ms);
        } else {
            self.durations.push(ms);
        }
    }

    /// Sequential time plus the longest parallel task, in ms
    pub fn total_duration(&self) -> f64 {
        let sequential: f64 = self.durations.iter().sum();
        let parallel = self.parallel_durations.iter().copied().fold(0.0, f64::max);
        sequential + parallel
    }

    /// Percentage of run tasks that succeeded (pending counts as success)
    pub fn success_pct(&self) -> Option<f64> {
        pct(self.counts.succeeded + self.counts.pending, self.counts.total())
    }

    pub fn failure_pct(&self) -> Option<f64> {
        pct(self.counts.failed, self.counts.total())
    }

    /// Width of the summary block, sized to the longest label and count
    fn line_width(&self) -> usize {
        let c = &self.counts;
        let count_max_len = [c.succeeded, c.failed, c.pending, c.warnings]
            .iter()
            .filter(|&&n| n > 0)
            .map(|n| n.to_string().len())
            .max()
            .unwrap_or(0);
        LABEL_MAX_LEN + count_max_len + 2
    }

    /// Render the summary block lines for `host`.
    ///
    /// # Arguments
    /// * `show_pct` - append success and failure percentages
    /// * `show_profile` - append the total run time
    pub fn render(&self, host: &str, palette: &Palette, show_pct: bool, show_profile: bool) -> Vec<String> {
        let width = self.line_width();
        let dashes = "-".repeat(width);
        let counts = |label: &str, value: &dyn std::fmt::Display| {
            format!("{}: {}", label, pad_left(&value.to_string(), width.saturating_sub(label.len() + 2)))
        };
        let colored = |color: &str, text: String| format!("{}{}{}", color, text, palette.endc);

        let mut lines = vec![colored(&palette.cyan, format!("\nSummary for {}\n{}", host, dashes))];

        let mut changestats = Vec::new();
        if self.changed > 0 {
            changestats.push(colored(&palette.green, format!("changed={}", self.changed)));
        }
        if self.counts.pending > 0 {
            changestats.push(colored(&palette.light_yellow, format!("unchanged={}", self.counts.pending)));
        }
        let changestats =
            if changestats.is_empty() { String::new() } else { format!(" ({})", changestats.join(", ")) };
        lines.push(colored(&palette.green, counts(SUCCEEDED, &(self.counts.succeeded + self.counts.pending))) + &changestats);

        let failed_color = if self.counts.failed > 0 { &palette.red } else { &palette.cyan };
        lines.push(colored(failed_color, counts(FAILED, &self.counts.failed)));

        if show_pct {
            if let Some(success) = self.success_pct() {
                lines.push(colored(&palette.green, counts("Success %", &python_float(success))));
            }
            if let Some(failure) = self.failure_pct() {
                lines.push(colored(failed_color, counts("Failure %", &python_float(failure))));
            }
        }

        if self.counts.warnings > 0 {
            lines.push(colored(&palette.light_red, counts(WARNINGS, &self.counts.warnings)));
        }

        lines.push(colored(
            &palette.cyan,
            format!("{}\nTotal states run: {:>w$}", dashes, self.counts.total(), w = width.saturating_sub(7)),
        ));

        if show_profile {
            let (amount, unit) = scale_duration(self.total_duration());
            let amount = format!("{:.3}", amount);
            lines.push(colored(
                &palette.cyan,
                format!("Total run time: {:>w$} {}", amount, unit, w = width.saturating_sub(5)),
            ));
        }

        lines
    }
}

/// Parse a duration in ms: a number, or a string like `"12.5"` / `"12.5 ms"`
pub fn parse_duration(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.split(" ms").next().and_then(|n| n.trim().parse().ok()))
        }
        _ => None,
    }
}

/// `part / whole` as a percentage rounded to 2 decimals; `None` when `whole` is zero
pub fn pct(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    Some((part as f64 / whole as f64 * 100.0 * 100.0).round() / 100.0)
}

/// Durations over 999 ms are shown in seconds
fn scale_duration(ms: f64) -> (f64, &'static str) {
    if ms > 999.0 { (ms / 1000.0, "s") } else { (ms, "ms") }
}

/// Float text with at least one decimal (`100.0`, `66.67`)
fn python_float(value: f64) -> String {
    if value.fract() == 0.0 { format!("{:.1}", value) } else { value.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(succeeded: usize, failed: usize, pending: usize) -> HostSummary {
        HostSummary {
            counts: ResultCounts { succeeded, failed, pending, warnings: 0 },
            ..Default::default()
        }
    }

    #[test]
    fn test_single_success_block() {
        let lines = summary(1, 0, 0).render("minionA", &Palette::plain(), false, false);
        assert_eq!(
            lines.join("\n"),
            "\nSummary for minionA\n------------\nSucceeded: 1\nFailed:    0\n------------\nTotal states run:     1"
        );
    }

    #[test]
    fn test_changestats() {
        let mut s = summary(3, 1, 2);
        s.changed = 2;
        let lines = s.render("m", &Palette::plain(), false, false);
        assert_eq!(lines[1], "Succeeded: 5 (changed=2, unchanged=2)");
        assert_eq!(lines[2], "Failed:    1");
    }

    #[test]
    fn test_percentages() {
        let lines = summary(2, 1, 0).render("m", &Palette::plain(), true, false);
        assert!(lines.contains(&"Success %: 66.67".to_string()), "{:?}", lines);
        assert!(lines.contains(&"Failure %: 33.33".to_string()), "{:?}", lines);

        let lines = summary(1, 0, 0).render("m", &Palette::plain(), true, false);
        assert!(lines.contains(&"Success %: 100.0".to_string()), "{:?}", lines);
        assert!(lines.contains(&"Failure %: 0.0".to_string()), "{:?}", lines);
    }

    #[test]
    fn test_zero_tasks_omits_percentages() {
        let s = HostSummary::default();
        assert_eq!(s.success_pct(), None);
        let lines = s.render("empty", &Palette::plain(), true, false);
        assert!(lines.iter().all(|l| !l.contains('%')));
        assert_eq!(lines[0], "\nSummary for empty\n-----------");
    }

    #[test]
    fn test_warnings_excluded_from_total() {
        let mut s = summary(2, 0, 0);
        s.counts.warnings = 1;
        let lines = s.render("m", &Palette::plain(), true, false);
        assert!(lines.contains(&"Warnings: 1".to_string()));
        assert!(lines.last().unwrap().ends_with("Total states run:     2"));
        assert!(lines.contains(&"Success %: 100.0".to_string()));
    }

    #[test]
    fn test_durations() {
        let mut s = HostSummary::default();
        s.record_duration(Some(&json!(10.5)), false);
        s.record_duration(Some(&json!("2.5 ms")), false);
        s.record_duration(None, false);
        s.record_duration(Some(&json!("soon")), false);
        s.record_duration(Some(&json!(4.0)), true);
        s.record_duration(Some(&json!(7.0)), true);

        assert_eq!(s.durations, vec![10.5, 2.5, 0.0]);
        assert_eq!(s.total_duration(), 20.0);
    }

    #[test]
    fn test_run_time_line() {
        let mut s = summary(1, 0, 0);
        s.durations = vec![1500.0, 250.25];
        let lines = s.render("m", &Palette::plain(), false, true);
        assert_eq!(lines.last().unwrap(), "Total run time:   1.750 s");

        s.durations = vec![12.0];
        let lines = s.render("m", &Palette::plain(), false, true);
        assert_eq!(lines.last().unwrap(), "Total run time:  12.000 ms");
    }

    #[test]
    fn test_colored_failed_line() {
        let palette = Palette::ansi();
        let lines = summary(0, 1, 0).render("m", &palette, false, false);
        assert_eq!(lines[2], format!("{}Failed:    1{}", palette.red, palette.endc));
        let lines = summary(1, 0, 0).render("m", &palette, false, false);
        assert!(lines[2].starts_with(&palette.cyan));
    }
}
