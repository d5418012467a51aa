//! `newsum run` – fill blank summaries and rewrite the dataset.

use anyhow::Result;
use newsum_core::client::{Completer, HttpCompleter};
use newsum_core::config::{self, MissingCredential, NewsumConfig};
use newsum_core::processor::{ProcessEvent, ProcessOptions, Processor};

use crate::cli::RunArgs;

pub fn run_summarize(cfg: &NewsumConfig, args: &RunArgs) -> Result<()> {
    if let Some(n) = args.batch_size {
        tracing::warn!(batch_size = n, "--batch-size is accepted but has no effect");
        println!("note: --batch-size {} has no effect; rows are processed one at a time.", n);
    }

    let completer = if args.dry_run {
        None
    } else {
        let key = config::resolve_api_key(args.api_key.as_deref()).ok_or(MissingCredential)?;
        Some(HttpCompleter::new(&cfg.api, key)?)
    };

    let opts = build_options(cfg, args)?;
    tracing::info!(
        csv = %opts.dataset_path.display(),
        model = %opts.model,
        dry_run = opts.dry_run,
        "starting run"
    );

    let report = Processor::new(completer.as_ref().map(|c| c as &dyn Completer))
        .process(&opts, &mut print_event)?;

    println!(
        "{} row(s): {} skipped, {} summarized, {} dry-run, {} failed",
        report.total, report.skipped, report.summarized, report.dry_run, report.failed
    );
    if report.failed > 0 {
        println!("Failures were logged to {}", opts.error_log.display());
    }
    Ok(())
}

fn build_options(cfg: &NewsumConfig, args: &RunArgs) -> Result<ProcessOptions> {
    let model = config::resolve_model(args.model.as_deref());
    let mut opts = ProcessOptions::new(&args.input.csv, &args.input.prompt, model);
    opts.dry_run = args.dry_run;
    opts.extras = args.input.vars.iter().cloned().collect();
    opts.retry = cfg.retry_policy()?;
    opts.pacing = cfg.pacing();
    opts.error_log = args
        .error_log
        .clone()
        .unwrap_or_else(|| cfg.error_log.clone());
    Ok(opts)
}

fn print_event(event: ProcessEvent<'_>) {
    match event {
        ProcessEvent::Processing { id, index } => {
            println!("Processing id={} (index={})", id, index);
        }
        ProcessEvent::Preview { prompt, .. } => {
            println!("--- prompt preview ---");
            println!("{}", prompt);
            println!("--- end preview ---");
        }
        ProcessEvent::Summarized { .. } => {}
        ProcessEvent::Failed {
            id,
            error,
            attempts,
        } => {
            eprintln!(
                "Error calling API for id={} after {} attempt(s): {}",
                id, attempts, error
            );
        }
        ProcessEvent::Written { path } => println!("Wrote updates to {}", path.display()),
        ProcessEvent::Unchanged => println!("No updates needed."),
    }
}
