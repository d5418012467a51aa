//! Atomic dataset writes: temp file in the target's directory, then rename.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{Dataset, DatasetError, LineEnding};

/// Dataset contents fully written to a temp file next to the target.
///
/// [`commit`](StagedWrite::commit) renames it over the target. Dropping it
/// instead deletes the temp file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically replace the target with the staged file.
    pub fn commit(self) -> Result<(), DatasetError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| DatasetError::io(&target, e.error))?;
        tracing::debug!(path = %target.display(), "dataset replaced");
        Ok(())
    }
}

/// Directory the temp file must live in so the rename stays on one filesystem.
fn staging_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

pub(super) fn stage(dataset: &Dataset, target: &Path) -> Result<StagedWrite, DatasetError> {
    let dir = staging_dir(target);
    let temp = tempfile::Builder::new()
        .prefix(".newsum-")
        .suffix(".csv")
        .tempfile_in(dir)
        .map_err(|e| DatasetError::io(dir, e))?;

    // Keep the target's mode; temp files are created 0600.
    if let Ok(meta) = fs::metadata(target) {
        fs::set_permissions(temp.path(), meta.permissions())
            .map_err(|e| DatasetError::io(temp.path(), e))?;
    }

    let terminator = match dataset.line_ending() {
        LineEnding::Lf => csv::Terminator::Any(b'\n'),
        LineEnding::CrLf => csv::Terminator::CRLF,
    };
    {
        let mut w = csv::WriterBuilder::new()
            .terminator(terminator)
            .from_writer(BufWriter::new(temp.as_file()));
        w.write_record(dataset.schema().headers())?;
        for record in dataset.records() {
            w.write_record(record)?;
        }
        w.flush().map_err(|e| DatasetError::io(temp.path(), e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| DatasetError::io(temp.path(), e))?;

    Ok(StagedWrite {
        temp,
        target: target.to_path_buf(),
    })
}
