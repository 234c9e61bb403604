//! Render configuration-management state run results as text.
//!
//! A state return maps hosts to the results of the tasks run on them. This
//! crate turns such a return into a colorized per-host report: one block or
//! line per task, depending on the output mode, followed by a summary of
//! result counts, changes and run time.
//!
//! ```no_run
//! use highstate_render::config::RenderOptions;
//!
//! let data = serde_json::json!({"minion": {"pkg_|-vim_|-vim_|-installed": {
//!     "result": true, "changes": {}, "comment": "installed", "__run_num__": 0
//! }}});
//! println!("{}", highstate_render::render(&data, &RenderOptions::default()));
//! ```

pub mod cli;
pub mod compress;
pub mod config;
pub mod console_format;
pub mod normalize;
pub mod palette;
pub mod report;
pub mod types;
pub mod ui;

use config::RenderOptions;
use report::Renderer;
use serde_json::Value;

/// Render a raw state return with the default changes printer
pub fn render(data: &Value, options: &RenderOptions) -> String {
    Renderer::new(options).render(data)
}
