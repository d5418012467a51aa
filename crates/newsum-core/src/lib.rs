pub mod config;
pub mod logging;

pub mod client;
pub mod dataset;
pub mod error_log;
pub mod processor;
pub mod prompt;
pub mod retry;
