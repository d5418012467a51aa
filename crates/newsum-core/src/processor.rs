//! Dataset processor: fill blank summaries row by row, then persist once.
//!
//! The loop is strictly sequential. Each row needing work is rendered,
//! sent through the retry executor, stored, and followed by the pacing
//! delay before the next row starts. Nothing touches the dataset file
//! until the loop is done, and then only through a temp file + rename.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::Completer;
use crate::config::MissingCredential;
use crate::dataset::Dataset;
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::prompt::{preview, Extras, PromptTemplate, PREVIEW_CHARS};
use crate::retry::{self, RetryPolicy, Sleeper, ThreadSleeper};

/// Written into `summary` for every row a dry run touches.
pub const DRY_RUN_PLACEHOLDER: &str = "[dry-run] summary would be written here";

/// Default pause after each successful call.
pub const DEFAULT_PACING: Duration = Duration::from_millis(300);

static THREAD_SLEEPER: ThreadSleeper = ThreadSleeper;

/// Everything one run needs besides the completer.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub dataset_path: PathBuf,
    pub template_path: PathBuf,
    pub model: String,
    pub dry_run: bool,
    pub extras: Extras,
    pub retry: RetryPolicy,
    pub pacing: Duration,
    pub error_log: PathBuf,
}

impl ProcessOptions {
    pub fn new(
        dataset_path: impl Into<PathBuf>,
        template_path: impl Into<PathBuf>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            template_path: template_path.into(),
            model: model.into(),
            dry_run: false,
            extras: Extras::new(),
            retry: RetryPolicy::default(),
            pacing: DEFAULT_PACING,
            error_log: PathBuf::from("errors.log"),
        }
    }
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent<'a> {
    /// A row needs a summary and is about to be handled.
    Processing { id: &'a str, index: usize },
    /// Dry run: truncated rendered prompt for the row.
    Preview { id: &'a str, prompt: &'a str },
    /// The row received a summary from the completer.
    Summarized { id: &'a str, index: usize },
    /// Retries ran out; the row is left as it was.
    Failed {
        id: &'a str,
        error: &'a str,
        attempts: u32,
    },
    /// The dataset was rewritten.
    Written { path: &'a Path },
    /// Nothing changed; the dataset file was not touched.
    Unchanged,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub total: usize,
    pub skipped: usize,
    pub summarized: usize,
    pub dry_run: usize,
    pub failed: usize,
    pub written: bool,
}

pub struct Processor<'a> {
    completer: Option<&'a dyn Completer>,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Processor<'a> {
    /// `completer` may be `None` for dry runs.
    pub fn new(completer: Option<&'a dyn Completer>) -> Self {
        Self {
            completer,
            sleeper: &THREAD_SLEEPER,
        }
    }

    /// Route backoff and pacing delays through `sleeper`.
    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Load, fill, and (if anything changed) atomically rewrite the dataset.
    pub fn process(
        &self,
        opts: &ProcessOptions,
        observer: &mut dyn FnMut(ProcessEvent<'_>),
    ) -> Result<ProcessReport> {
        if !opts.dry_run && self.completer.is_none() {
            return Err(MissingCredential.into());
        }

        let template = PromptTemplate::load(&opts.template_path)?;
        let mut dataset = Dataset::load(&opts.dataset_path)
            .with_context(|| format!("load dataset {}", opts.dataset_path.display()))?;
        if dataset.is_empty() {
            tracing::info!(path = %opts.dataset_path.display(), "dataset has no rows");
        } else if !dataset.schema().has_id() {
            tracing::warn!("dataset has no 'id' column; row indices are used as ids");
        }

        let mut report = self.process_dataset(&mut dataset, &template, opts, observer)?;

        if dataset.is_dirty() {
            dataset
                .save_atomic(&opts.dataset_path)
                .with_context(|| format!("write dataset {}", opts.dataset_path.display()))?;
            report.written = true;
            observer(ProcessEvent::Written {
                path: &opts.dataset_path,
            });
        } else {
            observer(ProcessEvent::Unchanged);
        }

        tracing::info!(
            total = report.total,
            skipped = report.skipped,
            summarized = report.summarized,
            dry_run = report.dry_run,
            failed = report.failed,
            written = report.written,
            "run finished"
        );
        Ok(report)
    }

    /// Row loop over an already loaded dataset. Does not persist.
    ///
    /// Without a completer only a dry run is possible; anything else is
    /// rejected before the first row.
    pub fn process_dataset(
        &self,
        dataset: &mut Dataset,
        template: &PromptTemplate,
        opts: &ProcessOptions,
        observer: &mut dyn FnMut(ProcessEvent<'_>),
    ) -> Result<ProcessReport, MissingCredential> {
        if !opts.dry_run && self.completer.is_none() {
            return Err(MissingCredential);
        }
        let completer = self.completer.filter(|_| !opts.dry_run);
        let error_log = ErrorLog::new(&opts.error_log);
        let mut report = ProcessReport {
            total: dataset.len(),
            ..ProcessReport::default()
        };

        for index in 0..dataset.len() {
            let (id, prompt) = match dataset.row(index) {
                Some(row) if row.needs_summary() => {
                    (row.id(), template.render(row.article(), &opts.extras))
                }
                Some(_) => {
                    report.skipped += 1;
                    continue;
                }
                None => break,
            };
            observer(ProcessEvent::Processing { id: &id, index });

            let Some(completer) = completer else {
                observer(ProcessEvent::Preview {
                    id: &id,
                    prompt: preview(&prompt, PREVIEW_CHARS),
                });
                dataset.set_summary(index, DRY_RUN_PLACEHOLDER);
                report.dry_run += 1;
                continue;
            };
            let outcome = retry::run_with_retry(&opts.retry, self.sleeper, retry::classify, || {
                completer.complete(&prompt, &opts.model)
            });

            match outcome {
                Ok(text) => {
                    dataset.set_summary(index, text.trim());
                    report.summarized += 1;
                    tracing::debug!(id = %id, index, chars = text.len(), "row summarized");
                    observer(ProcessEvent::Summarized { id: &id, index });
                    self.sleeper.sleep(opts.pacing);
                }
                Err(err) => {
                    let message = err.last.to_string();
                    tracing::error!(id = %id, attempts = err.attempts, "row failed: {}", message);
                    let record =
                        ErrorRecord::now(id.as_str(), message.as_str(), err.attempts, &opts.model);
                    if let Err(e) = error_log.append(&record) {
                        let path = error_log.path().display();
                        tracing::warn!("could not append to {}: {:#}", path, e);
                    }
                    report.failed += 1;
                    observer(ProcessEvent::Failed {
                        id: &id,
                        error: &message,
                        attempts: err.attempts,
                    });
                }
            }
        }

        Ok(report)
    }
}

/// One-shot convenience wrapper around [`Processor::process`].
pub fn process(
    opts: &ProcessOptions,
    completer: Option<&dyn Completer>,
    observer: &mut dyn FnMut(ProcessEvent<'_>),
) -> Result<ProcessReport> {
    Processor::new(completer).process(opts, observer)
}
