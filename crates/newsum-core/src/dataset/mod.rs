//! Row-oriented CSV dataset.
//!
//! Loads the whole file into memory, exposes rows by field name, and writes
//! it back through a temp file + rename (see [`StagedWrite`]). Header order,
//! extra columns and row order survive a load/save cycle.

mod writer;

pub use writer::StagedWrite;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const ID_FIELD: &str = "id";
pub const ARTICLE_FIELD: &str = "article";
pub const SUMMARY_FIELD: &str = "summary";

/// Required columns are absent from the header.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "CSV must include headers and contain 'article' and 'summary' columns (missing: {})",
    .missing.join(", ")
)]
pub struct SchemaError {
    pub missing: Vec<&'static str>,
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A record has more fields than the header declares.
    #[error("line {line}: record has {found} fields but the header has {expected}")]
    RowWidth {
        line: u64,
        expected: usize,
        found: usize,
    },
}

impl DatasetError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Record terminator seen in the source file, reused on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Terminator of the header record: the first newline outside quotes.
    /// Quoted fields may hold either ending and do not count.
    fn detect(bytes: &[u8]) -> Self {
        let mut quoted = false;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'"' => quoted = !quoted,
                b'\n' if !quoted => {
                    return if i > 0 && bytes[i - 1] == b'\r' {
                        LineEnding::CrLf
                    } else {
                        LineEnding::Lf
                    };
                }
                _ => {}
            }
        }
        LineEnding::Lf
    }
}

/// Header with the positions of the columns the processor touches.
#[derive(Debug, Clone)]
pub struct Schema {
    headers: Vec<String>,
    id: Option<usize>,
    article: usize,
    summary: usize,
}

impl Schema {
    /// Validate a header row. `article` and `summary` are required; `id` is optional.
    pub fn from_headers(headers: Vec<String>) -> Result<Self, SchemaError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let article = find(ARTICLE_FIELD);
        let summary = find(SUMMARY_FIELD);
        match (article, summary) {
            (Some(article), Some(summary)) => Ok(Self {
                id: find(ID_FIELD),
                headers,
                article,
                summary,
            }),
            _ => {
                let mut missing = Vec::new();
                if article.is_none() {
                    missing.push(ARTICLE_FIELD);
                }
                if summary.is_none() {
                    missing.push(SUMMARY_FIELD);
                }
                Err(SchemaError { missing })
            }
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }
}

/// Borrowed view of one row, keyed by field name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    index: usize,
    schema: &'a Schema,
    values: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, field: &str) -> Option<&'a str> {
        self.schema
            .index_of(field)
            .map(|i| self.values[i].as_str())
    }

    /// Value of the `id` column, or the row index when there is none.
    pub fn id(&self) -> String {
        match self.schema.id {
            Some(i) => self.values[i].clone(),
            None => self.index.to_string(),
        }
    }

    pub fn article(&self) -> &'a str {
        &self.values[self.schema.article]
    }

    pub fn summary(&self) -> &'a str {
        &self.values[self.schema.summary]
    }

    /// True when `summary` is empty or whitespace only.
    pub fn needs_summary(&self) -> bool {
        self.summary().trim().is_empty()
    }
}

/// In-memory dataset: schema plus rows in file order.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Vec<String>>,
    line_ending: LineEnding,
    dirty: bool,
}

impl Dataset {
    /// Read and validate the CSV file at `path`.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let bytes = fs::read(path).map_err(|e| DatasetError::io(path, e))?;
        let ds = Self::from_reader(bytes.as_slice())?;
        tracing::debug!(
            path = %path.display(),
            rows = ds.len(),
            columns = ds.schema.headers.len(),
            "dataset loaded"
        );
        Ok(ds)
    }

    /// Parse CSV from any reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, DatasetError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| DatasetError::io(Path::new("<reader>"), e))?;
        let line_ending = LineEnding::detect(&bytes);

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let schema = Schema::from_headers(headers)?;
        let width = schema.headers.len();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() > width {
                return Err(DatasetError::RowWidth {
                    line: record.position().map(|p| p.line()).unwrap_or(0),
                    expected: width,
                    found: record.len(),
                });
            }
            let mut values: Vec<String> = record.iter().map(str::to_string).collect();
            values.resize(width, String::new());
            rows.push(values);
        }

        Ok(Self {
            schema,
            rows,
            line_ending,
            dirty: false,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            index,
            schema: &self.schema,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(|(index, values)| Row {
            index,
            schema: &self.schema,
            values,
        })
    }

    /// Overwrite `summary` for the row at `index` and mark the dataset dirty.
    pub fn set_summary(&mut self, index: usize, text: impl Into<String>) {
        let col = self.schema.summary;
        if let Some(values) = self.rows.get_mut(index) {
            values[col] = text.into();
            self.dirty = true;
        }
    }

    /// At least one row changed since load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn records(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Write to a temp file next to `path` without touching `path` yet.
    pub fn stage(&self, path: &Path) -> Result<StagedWrite, DatasetError> {
        writer::stage(self, path)
    }

    /// Replace `path` with this dataset via temp file + rename.
    pub fn save_atomic(&self, path: &Path) -> Result<(), DatasetError> {
        self.stage(path)?.commit()
    }
}
