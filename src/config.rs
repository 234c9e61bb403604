/// Configuration resolution module
///
/// This module handles:
/// - The immutable `RenderOptions` value every render call reads
/// - Loading options from a TOML config file
/// - Applying command-line overrides on top of the file
/// - Parsing free-form `exclude=` / `terse=` filter tokens
use crate::cli::CliArgs;
use crate::report::{FilterSets, OutputMode, Tabular};
use log::debug;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Everything that shapes rendered output, resolved before rendering starts
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Show succeeded tasks that changed nothing
    pub state_verbose: bool,
    pub state_output: OutputMode,
    /// Hide succeeded tasks that changed nothing
    pub state_output_diff: bool,
    pub state_tabular: Tabular,
    pub state_output_pct: bool,
    pub state_compress_ids: bool,
    pub state_output_profile: bool,
    #[serde(deserialize_with = "list_or_csv")]
    pub state_output_exclude: Vec<String>,
    #[serde(deserialize_with = "list_or_csv")]
    pub state_output_terse: Vec<String>,
    pub color: bool,
    pub color_theme: Option<PathBuf>,
    /// Neutralize escape sequences in host names and compile errors
    pub strip_colors: bool,
    /// `exclude=` / `terse=` given on the command line
    #[serde(skip)]
    pub filter_overrides: FilterOverrides,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            state_verbose: true,
            state_output: OutputMode::default(),
            state_output_diff: false,
            state_tabular: Tabular::Off,
            state_output_pct: false,
            state_compress_ids: false,
            state_output_profile: false,
            state_output_exclude: Vec::new(),
            state_output_terse: Vec::new(),
            color: true,
            color_theme: None,
            strip_colors: true,
            filter_overrides: FilterOverrides::default(),
        }
    }
}

impl RenderOptions {
    /// Filter sets for filter mode; command-line tokens win over the config
    pub fn filter_sets(&self) -> FilterSets {
        FilterSets {
            exclude: self.filter_overrides.exclude.clone().unwrap_or_else(|| self.state_output_exclude.clone()),
            terse: self.filter_overrides.terse.clone().unwrap_or_else(|| self.state_output_terse.clone()),
        }
    }
}

/// Filter sets given as `key=value` tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOverrides {
    pub exclude: Option<Vec<String>>,
    pub terse: Option<Vec<String>>,
}

/// Configuration problems reported before anything is rendered
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    /// A filter token without `=`
    #[error("Expected KEY=VALUE, got {0:?}")]
    InvalidToken(String),
    /// A filter token whose key is neither `exclude` nor `terse`
    #[error("Unknown filter key {0:?} (expected exclude or terse)")]
    UnknownKey(String),
}

/// Default config file location
/// - Linux: ~/.config/highstate-render/config.toml
/// - macOS: ~/Library/Application Support/highstate-render/config.toml
/// - Windows: %APPDATA%/highstate-render/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("highstate-render").join("config.toml"))
}

/// Load options from a TOML file. Missing keys take their defaults.
pub fn load_config_file(path: &Path) -> Result<RenderOptions, ConfigError> {
    let content =
        fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
}

/// Split a comma-joined value. Empty segments are kept, so `"True,"` yields
/// `["True", ""]`.
pub fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv {
    List(Vec<String>),
    Csv(String),
}

fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(value) => split_csv(&value),
    })
}

/// Parse trailing `exclude=...` / `terse=...` tokens
pub fn parse_filter_tokens(tokens: &[String]) -> Result<FilterOverrides, ConfigError> {
    let mut overrides = FilterOverrides::default();

    for token in tokens {
        let (key, value) = token.split_once('=').ok_or_else(|| ConfigError::InvalidToken(token.clone()))?;
        match key.trim() {
            "exclude" => overrides.exclude = Some(split_csv(value)),
            "terse" => overrides.terse = Some(split_csv(value)),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        debug!("Filter override {}", token);
    }

    Ok(overrides)
}

/// Build the complete RenderOptions from CLI arguments
///
/// Resolution order: defaults, then the config file, then command-line
/// flags, then filter tokens.
pub fn build_render_options(args: &CliArgs) -> Result<RenderOptions, String> {
    debug!("Building render options from CLI args");

    // Step 1: Config file (an explicit path must exist, the default may not)
    let mut options = match &args.config {
        Some(path) => {
            debug!("Using config file from --config: {}", path.display());
            load_config_file(path).map_err(|e| e.to_string())?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                debug!("Using default config file {}", path.display());
                load_config_file(&path).map_err(|e| e.to_string())?
            }
            None => {
                debug!("No config file, using defaults");
                RenderOptions::default()
            }
        },
    };

    // Step 2: Command-line flags
    apply_cli_overrides(&mut options, args);

    // Step 3: Filter tokens
    options.filter_overrides = parse_filter_tokens(&args.filters).map_err(|e| e.to_string())?;

    debug!("Resolved render options: {:?}", options);
    Ok(options)
}

fn apply_cli_overrides(options: &mut RenderOptions, args: &CliArgs) {
    if let Some(mode) = &args.state_output {
        options.state_output = OutputMode::parse(mode);
    }
    if args.verbose {
        options.state_verbose = true;
    }
    if args.quiet {
        options.state_verbose = false;
    }
    if args.diff {
        options.state_output_diff = true;
    }
    if let Some(tabular) = &args.tabular {
        options.state_tabular = match tabular.as_str() {
            "true" => Tabular::Aligned,
            "false" => Tabular::Off,
            template => Tabular::Template(template.to_string()),
        };
    }
    if args.pct {
        options.state_output_pct = true;
    }
    if args.compress_ids {
        options.state_compress_ids = true;
    }
    if args.profile {
        options.state_output_profile = true;
    }
    if args.no_color {
        options.color = false;
    }
    if let Some(theme) = &args.color_theme {
        options.color_theme = Some(theme.clone());
    }
    if args.no_strip_colors {
        options.strip_colors = false;
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
