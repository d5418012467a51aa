//! CLI command handlers, one per file.

mod config;
mod preview;
mod run;

pub use config::run_config;
pub use preview::run_preview;
pub use run::run_summarize;
