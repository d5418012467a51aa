//! CLI for newsum.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use newsum_core::config;
use newsum_core::prompt::parse_extra;
use std::path::PathBuf;

use commands::{run_config, run_preview, run_summarize};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "newsum")]
#[command(about = "newsum: fill missing article summaries in a CSV dataset", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Dataset, template and extra placeholder values shared by subcommands.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Path to the CSV dataset (headers must include article and summary).
    #[arg(long, default_value = "data/sample.csv", value_name = "PATH")]
    pub csv: PathBuf,

    /// Path to the prompt template ({{ARTICLE}} is replaced by each row's article).
    #[arg(long, default_value = "prompts/summarize.txt", value_name = "PATH")]
    pub prompt: PathBuf,

    /// Extra template value, fills {{NAME}}. Repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_extra)]
    pub vars: Vec<(String, String)>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Model identifier (default: $OPENAI_MODEL, else gpt-3.5-turbo).
    #[arg(long)]
    pub model: Option<String>,

    /// Accepted for compatibility; rows are always processed one at a time.
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Print prompt previews and write a placeholder instead of calling the API.
    #[arg(long)]
    pub dry_run: bool,

    /// API key (default: $OPENAI_API_KEY, also read from ./.env).
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Where failed rows are logged (default from config: errors.log).
    #[arg(long, value_name = "PATH")]
    pub error_log: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Summarize every row whose summary is blank, then rewrite the dataset.
    Run(RunArgs),

    /// Print the fully rendered prompt for one row without calling the API.
    Preview {
        #[command(flatten)]
        input: InputArgs,

        /// Value of the row's id column (or its zero-based index if there is none).
        #[arg(long)]
        id: String,
    },

    /// Show the config file path and the effective configuration.
    Config,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        config::load_dotenv();
        let cfg = config::load_or_init()?.with_env_overrides();
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run(args) => run_summarize(&cfg, &args)?,
            CliCommand::Preview { input, id } => run_preview(&input, &id)?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
