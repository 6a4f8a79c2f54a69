use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyzeError>;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("cannot access \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// a referenced column is not part of the input header.
    #[error("column \"{column}\" not found in input header")]
    MissingColumn { column: String },

    /// a data row ends before a referenced column.
    #[error("line {line}: row has no value for column \"{column}\"")]
    MissingField { column: String, line: u64 },

    #[error("line {line}: value \"{value}\" of column \"{column}\" is not an integer")]
    NotNumeric { column: String, value: String, line: u64 },

    #[error("line {line}: sum of column \"{column}\" exceeds the 64 bit integer range")]
    SumOverflow { column: String, line: u64 },

    #[error("at least one key field is required for aggregation")]
    NoKeyFields,

    #[error("field \"{field}\" is not one of the aggregation key fields")]
    NotGrouped { field: String },

    #[error("cannot place text value \"{value}\" of field \"{field}\" on a numeric axis")]
    NonNumericAxis { field: String, value: String },

    #[error("chart drawing failed: {0}")]
    Chart(String),
}

impl AnalyzeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzeError::Io { path: path.into(), source }
    }
}
