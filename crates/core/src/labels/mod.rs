//! Sample label table loaded from a delimited `Id,Class` file.
//!
//! The map is built once before any worker starts and is only ever read
//! afterwards, so workers share it by plain reference.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::model::SampleId;

const ID_COLUMN: &str = "Id";
const CLASS_COLUMN: &str = "Class";

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Failed to read label file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid label CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Label file is missing the '{0}' column")]
    MissingColumn(&'static str),

    #[error("Label file is empty")]
    Empty,

    #[error("Malformed label row at line {line}: {content}")]
    MalformedRow { line: u64, content: String },
}

/// Immutable `SampleId -> class label` mapping.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    labels: HashMap<SampleId, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a label table from a CSV file with at least `Id` and `Class` columns.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|source| LabelError::Io { path: path.to_path_buf(), source })?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_str(body: &str) -> Result<Self, LabelError> {
        Self::from_csv_reader(body.as_bytes())
    }

    /// Column order is free; extra columns are ignored and the last row wins
    /// for a repeated id.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, LabelError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(LabelError::Empty);
        }
        let id_idx = column_index(&headers, ID_COLUMN)?;
        let class_idx = column_index(&headers, CLASS_COLUMN)?;

        let mut labels = HashMap::new();
        for record in reader.records() {
            let record = record?;
            match (record.get(id_idx), record.get(class_idx)) {
                (Some(id), Some(class)) if !id.is_empty() => {
                    labels.insert(SampleId::new(id), class.to_string());
                }
                _ => {
                    return Err(LabelError::MalformedRow {
                        line: record.position().map_or(0, |p| p.line()),
                        content: record.iter().collect::<Vec<_>>().join(","),
                    })
                }
            }
        }
        Ok(Self { labels })
    }

    pub fn get(&self, id: &SampleId) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &SampleId) -> bool {
        self.labels.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<K: Into<SampleId>, V: Into<String>> FromIterator<(K, V)> for LabelMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { labels: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

fn column_index(headers: &StringRecord, name: &'static str) -> Result<usize, LabelError> {
    headers.iter().position(|c| c == name).ok_or(LabelError::MissingColumn(name))
}
