use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "highstate-render")]
#[command(about = "Render state run results as readable per-host reports")]
#[command(version)]
pub struct CliArgs {
    /// JSON state return to render ("-" or omitted reads stdin)
    #[arg(long, short = 'i', value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Config file (default: <config dir>/highstate-render/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output mode: full, terse, mixed, changes or filter, optionally with an
    /// "_id" suffix to show task ids instead of names
    #[arg(long, value_name = "MODE")]
    pub state_output: Option<String>,

    /// Show succeeded tasks that changed nothing (the default)
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Hide succeeded tasks that changed nothing
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Only show tasks that changed something or did not succeed
    #[arg(long)]
    pub diff: bool,

    /// Tabular terse lines; "--tabular=TEMPLATE" uses a custom line template
    /// with fields such as {name}, {module}, {function} and {outcome}
    #[arg(long, value_name = "TEMPLATE", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub tabular: Option<String>,

    /// Add success and failure percentages to the summary
    #[arg(long)]
    pub pct: bool,

    /// Fold tasks sharing an id, sls and result into one row
    #[arg(long)]
    pub compress_ids: bool,

    /// Show start times, durations and the total run time
    #[arg(long)]
    pub profile: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// TOML file mapping color names to SGR parameters (GREEN = "1;32")
    #[arg(long, value_name = "FILE")]
    pub color_theme: Option<PathBuf>,

    /// Keep escape sequences found in host names and compile errors
    #[arg(long)]
    pub no_strip_colors: bool,

    /// Filter mode overrides: exclude=True,None terse=False
    #[arg(value_name = "KEY=VALUE")]
    pub filters: Vec<String>,
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        CliArgs::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if let Some(input) = self.input_path()
            && !input.exists()
        {
            return Err(format!("Input file {} does not exist", input.display()));
        }

        if let Some(theme) = &self.color_theme
            && self.no_color
        {
            return Err(format!("--color-theme {} has no effect with --no-color", theme.display()));
        }

        if self.tabular.as_deref() == Some("") {
            return Err("--tabular template must not be empty".to_string());
        }

        Ok(())
    }

    /// Input file, or None when reading stdin
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|p| p.as_os_str() != "-")
    }
}
