//! `newsum preview` – render the prompt for a single row.

use anyhow::{Context, Result};
use newsum_core::dataset::Dataset;
use newsum_core::prompt::{Extras, PromptTemplate};

use crate::cli::InputArgs;

pub fn run_preview(input: &InputArgs, id: &str) -> Result<()> {
    let (prompt, already_done) = render_row(input, id)?;
    if already_done {
        println!("(row id={} already has a summary; `run` would skip it)", id);
    }
    println!("{}", prompt);
    Ok(())
}

/// Rendered prompt for the row with `id`, and whether that row already has a summary.
fn render_row(input: &InputArgs, id: &str) -> Result<(String, bool)> {
    let template = PromptTemplate::load(&input.prompt)?;
    let dataset = Dataset::load(&input.csv)
        .with_context(|| format!("load dataset {}", input.csv.display()))?;
    let extras: Extras = input.vars.iter().cloned().collect();
    let row = dataset
        .rows()
        .find(|r| r.id() == id)
        .with_context(|| format!("no row with id={} in {}", id, input.csv.display()))?;
    Ok((template.render(row.article(), &extras), !row.needs_summary()))
}
