//! End-to-end processor runs over real files with fake completers.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use newsum_core::client::{CallError, Completer};
use newsum_core::dataset::{DatasetError, SchemaError};
use newsum_core::error_log::ErrorLog;
use newsum_core::processor::{ProcessEvent, ProcessOptions, Processor, DRY_RUN_PLACEHOLDER};
use newsum_core::retry::{RetryPolicy, Sleeper};
use tempfile::TempDir;

const THREE_ROWS: &str = "id,article,summary,lang\n\
1,First article body,,en\n\
2,Second article body,Existing summary,de\n\
3,Third article body,   ,fr\n";

const TEMPLATE: &str = "Summarize in {{LANG}}:\n{{ARTICLE}}\n";

/// Scripted completer: fails for articles containing `fail_on`, echoes otherwise.
struct Scripted {
    fail_on: Option<&'static str>,
    calls: Cell<u32>,
}

impl Scripted {
    fn ok() -> Self {
        Self {
            fail_on: None,
            calls: Cell::new(0),
        }
    }

    fn failing_on(needle: &'static str) -> Self {
        Self {
            fail_on: Some(needle),
            calls: Cell::new(0),
        }
    }
}

impl Completer for Scripted {
    fn complete(&self, prompt: &str, model: &str) -> Result<String, CallError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(needle) = self.fail_on {
            if prompt.contains(needle) {
                return Err(CallError::Http {
                    status: 500,
                    body: "upstream exploded".to_string(),
                });
            }
        }
        let first_line = prompt.lines().nth(1).unwrap_or_default();
        Ok(format!("\n  [{model}] {first_line}  \n"))
    }
}

/// Counts calls; used where no call may happen.
struct MustNotCall;

impl Completer for MustNotCall {
    fn complete(&self, _prompt: &str, _model: &str) -> Result<String, CallError> {
        panic!("completer must not be called");
    }
}

#[derive(Default)]
struct RecordingSleeper(RefCell<Vec<Duration>>);

impl Sleeper for RecordingSleeper {
    fn sleep(&self, d: Duration) {
        self.0.borrow_mut().push(d);
    }
}

struct Fixture {
    dir: TempDir,
    dataset: PathBuf,
    template: PathBuf,
}

impl Fixture {
    fn new(csv: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("data.csv");
        let template = dir.path().join("summarize.txt");
        fs::write(&dataset, csv).unwrap();
        fs::write(&template, TEMPLATE).unwrap();
        Self {
            dir,
            dataset,
            template,
        }
    }

    fn options(&self) -> ProcessOptions {
        let mut o = ProcessOptions::new(&self.dataset, &self.template, "test-model");
        o.error_log = self.dir.path().join("errors.log");
        o.extras.insert("LANG".to_string(), "English".to_string());
        o.retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            ..RetryPolicy::default()
        };
        o.pacing = Duration::from_millis(300);
        o
    }

    fn read(&self) -> String {
        fs::read_to_string(&self.dataset).unwrap()
    }

    fn dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn summaries(path: &Path) -> Vec<String> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let idx = rdr.headers().unwrap().iter().position(|h| h == "summary").unwrap();
    rdr.records()
        .map(|r| r.unwrap().get(idx).unwrap().to_string())
        .collect()
}

#[test]
fn dry_run_previews_blank_rows_and_writes_placeholders() {
    let fx = Fixture::new(THREE_ROWS);
    let mut opts = fx.options();
    opts.dry_run = true;
    let sleeper = RecordingSleeper::default();
    let mut preview_ids = Vec::new();
    let mut previews = Vec::new();
    let mut written = false;

    let report = Processor::new(Some(&MustNotCall))
        .with_sleeper(&sleeper)
        .process(&opts, &mut |e| match e {
            ProcessEvent::Preview { id, prompt } => {
                preview_ids.push(id.to_string());
                previews.push(prompt.to_string());
            }
            ProcessEvent::Written { .. } => written = true,
            _ => {}
        })
        .unwrap();

    assert_eq!(preview_ids, vec!["1", "3"]);
    assert_eq!(previews[0], "Summarize in English:\nFirst article body\n");
    assert!(written);
    assert!(report.written);
    assert_eq!(report.dry_run, 2);
    assert_eq!(report.skipped, 1);
    assert!(sleeper.0.borrow().is_empty(), "no pacing in dry run");
    assert_eq!(
        summaries(&fx.dataset),
        vec![DRY_RUN_PLACEHOLDER, "Existing summary", DRY_RUN_PLACEHOLDER]
    );
    // Column order and pass-through column survive.
    assert!(fx.read().starts_with("id,article,summary,lang\n"));
    assert!(fx.read().contains(",Existing summary,de\n"));
}

#[test]
fn dry_run_preview_is_truncated() {
    let long_article = "x".repeat(5000);
    let fx = Fixture::new(&format!("id,article,summary\n9,{},\n", long_article));
    let mut opts = fx.options();
    opts.dry_run = true;
    let mut preview_len = 0;
    Processor::new(None)
        .process(&opts, &mut |e| {
            if let ProcessEvent::Preview { prompt, .. } = e {
                preview_len = prompt.chars().count();
            }
        })
        .unwrap();
    assert_eq!(preview_len, 1000);
}

#[test]
fn second_run_makes_no_calls_and_no_writes() {
    let fx = Fixture::new(THREE_ROWS);
    let opts = fx.options();
    let first = Scripted::ok();
    let sleeper = RecordingSleeper::default();

    let report = Processor::new(Some(&first))
        .with_sleeper(&sleeper)
        .process(&opts, &mut |_| {})
        .unwrap();
    assert_eq!(first.calls.get(), 2);
    assert_eq!(report.summarized, 2);
    assert!(report.written);
    assert_eq!(
        summaries(&fx.dataset),
        vec![
            "[test-model] First article body",
            "Existing summary",
            "[test-model] Third article body"
        ]
    );
    // Pacing after each success, nothing else.
    assert_eq!(
        *sleeper.0.borrow(),
        vec![Duration::from_millis(300), Duration::from_millis(300)]
    );

    let after_first = fs::read(&fx.dataset).unwrap();
    let mut unchanged = false;
    let report = Processor::new(Some(&MustNotCall))
        .with_sleeper(&sleeper)
        .process(&opts, &mut |e| {
            if e == ProcessEvent::Unchanged {
                unchanged = true;
            }
        })
        .unwrap();
    assert!(unchanged);
    assert!(!report.written);
    assert_eq!(report.skipped, 3);
    assert_eq!(fs::read(&fx.dataset).unwrap(), after_first);
}

#[test]
fn failed_row_is_logged_and_batch_continues() {
    let fx = Fixture::new(THREE_ROWS);
    let opts = fx.options();
    let completer = Scripted::failing_on("First article");
    let sleeper = RecordingSleeper::default();
    let mut failures = Vec::new();

    let report = Processor::new(Some(&completer))
        .with_sleeper(&sleeper)
        .process(&opts, &mut |e| {
            if let ProcessEvent::Failed { id, error, attempts } = e {
                failures.push((id.to_string(), error.to_string(), attempts));
            }
        })
        .unwrap();

    // 3 attempts for row 1, 1 for row 3.
    assert_eq!(completer.calls.get(), 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.summarized, 1);
    assert!(report.written);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "1");
    assert!(failures[0].1.contains("upstream exploded"));
    assert_eq!(failures[0].2, 3);

    // Backoff 10ms, 20ms for row 1; pacing only after row 3 succeeded.
    assert_eq!(
        *sleeper.0.borrow(),
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(300)
        ]
    );

    let summaries = summaries(&fx.dataset);
    assert_eq!(summaries[0], "", "failed row left unmodified");
    assert_eq!(summaries[2], "[test-model] Third article body");

    let records = ErrorLog::new(&opts.error_log).read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "1");
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].model, "test-model");
    assert!(records[0].error.contains("HTTP 500"));
}

#[test]
fn all_rows_failing_leaves_file_untouched() {
    let fx = Fixture::new(THREE_ROWS);
    let mut opts = fx.options();
    opts.retry.max_attempts = 1;
    let completer = Scripted::failing_on("article body");
    let sleeper = RecordingSleeper::default();
    let before = fs::read(&fx.dataset).unwrap();

    let report = Processor::new(Some(&completer))
        .with_sleeper(&sleeper)
        .process(&opts, &mut |_| {})
        .unwrap();

    assert_eq!(report.failed, 2);
    assert!(!report.written);
    assert!(sleeper.0.borrow().is_empty());
    assert_eq!(fs::read(&fx.dataset).unwrap(), before);
    assert_eq!(ErrorLog::new(&opts.error_log).read_all().unwrap().len(), 2);
}

#[test]
fn missing_summary_header_aborts_without_writing() {
    let csv = "id,article\n1,text\n";
    let fx = Fixture::new(csv);
    let err = Processor::new(Some(&MustNotCall))
        .process(&fx.options(), &mut |_| panic!("no events expected"))
        .unwrap_err();

    let schema = err
        .chain()
        .find_map(|e| e.downcast_ref::<DatasetError>())
        .expect("dataset error in chain");
    match schema {
        DatasetError::Schema(SchemaError { missing }) => assert_eq!(missing, &vec!["summary"]),
        other => panic!("expected schema error, got {other:?}"),
    }
    assert_eq!(fx.read(), csv);
    assert_eq!(fx.dir_entries(), vec!["data.csv", "summarize.txt"]);
}

#[test]
fn missing_template_is_fatal() {
    let fx = Fixture::new(THREE_ROWS);
    let mut opts = fx.options();
    opts.template_path = fx.dir.path().join("nope.txt");
    assert!(Processor::new(Some(&MustNotCall))
        .process(&opts, &mut |_| {})
        .is_err());
    assert_eq!(fx.read(), THREE_ROWS);
}
