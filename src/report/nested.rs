//! Generic printer for arbitrary change payloads.
//!
//! Mappings print as sorted `key:` lines with their values four columns
//! deeper, lists as `- item` lines, and scalars on their own line:
//!
//! ```text
//!               ----------
//!               new:
//!                   1.2.3
//!               old:
//! ```

use crate::palette::{Palette, strip_esc_sequence};
use crate::types::display_value;
use serde_json::Value;

/// Renders a change payload at a given indent
pub trait ChangesPrinter {
    fn print(&self, value: &Value, indent: usize) -> String;
}

/// Default nested-structure printer
#[derive(Debug, Clone)]
pub struct NestedPrinter {
    palette: Palette,
    strip_colors: bool,
}

impl NestedPrinter {
    pub fn new(palette: Palette, strip_colors: bool) -> Self {
        Self { palette, strip_colors }
    }

    fn line(&self, indent: usize, color: &str, prefix: &str, msg: &str, suffix: &str) -> String {
        format!("{}{}{}{}{}{}", " ".repeat(indent), color, prefix, msg, self.palette.endc, suffix)
    }

    fn display(&self, value: &Value, indent: usize, prefix: &str, out: &mut Vec<String>) {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => {
                out.push(self.line(indent, &self.palette.light_yellow, prefix, &display_value(value), ""));
            }
            Value::String(s) => {
                for (i, text) in s.lines().enumerate() {
                    let line_prefix = if i == 0 { prefix.to_string() } else { " ".repeat(prefix.len()) };
                    let text = if self.strip_colors { strip_esc_sequence(text) } else { text.to_string() };
                    out.push(self.line(indent, &self.palette.green, &line_prefix, &text, ""));
                }
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Array(_) => {
                            out.push(self.line(indent, &self.palette.green, "", "|_", ""));
                            self.display(item, indent + 2, "- ", out);
                        }
                        Value::Object(_) => {
                            out.push(self.line(indent, &self.palette.green, "", "|_", ""));
                            self.display(item, indent + 2, "", out);
                        }
                        _ => self.display(item, indent, "- ", out),
                    }
                }
            }
            Value::Object(map) => {
                if indent > 0 {
                    out.push(self.line(indent, &self.palette.cyan, "", "----------", ""));
                }
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    out.push(self.line(indent, &self.palette.cyan, prefix, key, ":"));
                    self.display(&map[key], indent + 4, "", out);
                }
            }
        }
    }
}

impl ChangesPrinter for NestedPrinter {
    fn print(&self, value: &Value, indent: usize) -> String {
        let mut out = Vec::new();
        self.display(value, indent, "", &mut out);
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain() -> NestedPrinter {
        NestedPrinter::new(Palette::plain(), true)
    }

    #[test]
    fn test_mapping_sorted_with_separator() {
        let text = plain().print(&json!({"old": "1.0", "new": "2.0"}), 2);
        assert_eq!(text, "  ----------\n  new:\n      2.0\n  old:\n      1.0");
    }

    #[test]
    fn test_top_level_mapping_has_no_separator() {
        assert_eq!(plain().print(&json!({"pid": 42}), 0), "pid:\n    42");
    }

    #[test]
    fn test_lists_and_scalars() {
        let text = plain().print(&json!({"files": ["a", {"b": null}], "ok": true}), 0);
        assert_eq!(text, "files:\n    - a\n    |_\n      ----------\n      b:\n          None\nok:\n    True");
    }

    #[test]
    fn test_multiline_string_and_colors() {
        let printer = NestedPrinter::new(Palette::ansi(), true);
        let text = printer.print(&json!("first\nsec\x1bond"), 0);
        assert_eq!(text, "\x1b[0;32mfirst\x1b[0m\n\x1b[0;32msec?ond\x1b[0m");
    }
}
