/// Terminal color palette
///
/// This module handles:
/// - The fixed set of named colors the report uses
/// - Optional color themes read from a TOML file
/// - Stripping escape sequences out of untrusted text
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reset sequence
pub const ENDC: &str = "\x1b[0m";

/// Named colors used by the renderer. Every entry is either an ANSI SGR
/// sequence or, with color disabled, the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub green: String,
    pub cyan: String,
    pub red: String,
    pub light_red: String,
    pub light_yellow: String,
    pub endc: String,
}

impl Palette {
    /// Resolve the palette for a run. `theme` is only read when color is on.
    pub fn new(use_color: bool, theme: Option<&Path>) -> Self {
        if !use_color {
            return Palette::plain();
        }

        let mut palette = Palette::ansi();
        if let Some(path) = theme {
            match load_theme(path) {
                Ok(entries) => palette.apply_theme(&entries),
                Err(e) => warn!("Ignoring color theme {}: {}", path.display(), e),
            }
        }
        palette
    }

    /// Every color empty
    pub fn plain() -> Self {
        Palette {
            green: String::new(),
            cyan: String::new(),
            red: String::new(),
            light_red: String::new(),
            light_yellow: String::new(),
            endc: String::new(),
        }
    }

    /// Default terminal colors
    pub fn ansi() -> Self {
        Palette {
            green: sgr(term::color::GREEN),
            cyan: sgr(term::color::CYAN),
            red: sgr(term::color::RED),
            light_red: sgr(term::color::BRIGHT_RED),
            light_yellow: sgr(term::color::BRIGHT_YELLOW),
            endc: ENDC.to_string(),
        }
    }

    fn apply_theme(&mut self, entries: &HashMap<String, String>) {
        for (name, params) in entries {
            let code = format!("\x1b[{}m", params);
            let slot = match name.to_ascii_uppercase().as_str() {
                "GREEN" => &mut self.green,
                "CYAN" => &mut self.cyan,
                "RED" => &mut self.red,
                "LIGHT_RED" => &mut self.light_red,
                "LIGHT_YELLOW" => &mut self.light_yellow,
                "ENDC" => &mut self.endc,
                other => {
                    debug!("Color theme entry {} is not used", other);
                    continue;
                }
            };
            *slot = code;
        }
    }
}

/// SGR sequence for a `term` color. Bright colors map to the bold variant.
pub fn sgr(color: term::color::Color) -> String {
    if color >= 8 { format!("\x1b[1;3{}m", color - 8) } else { format!("\x1b[0;3{}m", color) }
}

fn load_theme(path: &Path) -> Result<HashMap<String, String>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("failed to read: {}", e))?;
    let entries: HashMap<String, String> = toml::from_str(&content).map_err(|e| format!("invalid theme: {}", e))?;

    for (name, params) in &entries {
        if params.is_empty() || !params.chars().all(|c| c.is_ascii_digit() || c == ';') {
            return Err(format!("{} is not a list of SGR parameters: {:?}", name, params));
        }
    }

    debug!("Loaded {} color theme entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Neutralize terminal escape sequences by replacing every ESC with `?`
pub fn strip_esc_sequence(text: &str) -> String {
    text.replace('\x1b', "?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_sequences() {
        let palette = Palette::ansi();
        assert_eq!(palette.green, "\x1b[0;32m");
        assert_eq!(palette.cyan, "\x1b[0;36m");
        assert_eq!(palette.red, "\x1b[0;31m");
        assert_eq!(palette.light_red, "\x1b[1;31m");
        assert_eq!(palette.light_yellow, "\x1b[1;33m");
        assert_eq!(palette.endc, "\x1b[0m");
    }

    #[test]
    fn test_color_disabled_is_plain() {
        let palette = Palette::new(false, Some(Path::new("/nonexistent/theme.toml")));
        assert_eq!(palette, Palette::plain());
        assert!(palette.green.is_empty() && palette.endc.is_empty());
    }

    #[test]
    fn test_theme_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "GREEN = \"1;32\"\nlight_yellow = \"0;93\"\nBLUE = \"0;34\"").unwrap();

        let palette = Palette::new(true, Some(file.path()));
        assert_eq!(palette.green, "\x1b[1;32m");
        assert_eq!(palette.light_yellow, "\x1b[0;93m");
        assert_eq!(palette.cyan, Palette::ansi().cyan);
    }

    #[test]
    fn test_bad_theme_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "GREEN = \"green please\"").unwrap();
        assert_eq!(Palette::new(true, Some(file.path())), Palette::ansi());

        assert_eq!(Palette::new(true, Some(Path::new("/nonexistent/theme.toml"))), Palette::ansi());
    }

    #[test]
    fn test_strip_esc_sequence() {
        assert_eq!(strip_esc_sequence("\x1b[0;31mred\x1b[0m"), "?[0;31mred?[0m");
        assert_eq!(strip_esc_sequence("plain"), "plain");
    }
}
