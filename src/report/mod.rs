//! Report rendering module - turns a state return into text.
//!
//! This module handles:
//! - Per-host rendering, including nested orchestration reports
//! - Output modes (full, terse, mixed, changes, filter) and terse layouts
//! - Rendering of change payloads
//! - Summary statistics per host
//!
//! Text layout helpers live in the console_format module.
//!
//! # Module Organization
//!
//! - `host` - The `Renderer`: host banners, task blocks, nested report frames
//! - `mode` - Output mode parsing and the per-task presentation decision
//! - `changes` - Changes payload formatting
//! - `nested` - The `ChangesPrinter` seam and its default implementation
//! - `summary` - Result counts, percentages and run time

mod changes;
mod host;
mod mode;
mod nested;
mod summary;

// Re-export the renderer
pub use host::{MALFORMED_RECORD_MESSAGE, Renderer};

// Re-export mode types and functions
pub use mode::{
    FilterSets, OutputMode, OutputStyle, Presentation, Tabular, TemplateFields, choose_presentation, format_terse,
    outcome_word, render_template,
};

// Re-export the changes formatter and printers
pub use changes::format_changes;
pub use nested::{ChangesPrinter, NestedPrinter};

// Re-export summary types
pub use summary::{HostSummary, ResultCounts, parse_duration, pct};
