use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use flate2::read::GzDecoder;
use tracing::{debug, trace};

use crate::error::{AnalyzeError, Result};

// Open a plain or gzip compressed input file.
pub fn open_decompress(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| AnalyzeError::io(path, e))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "gz" | "tgz" => {
            debug!(path = %path.display(), "opening gzip file");
            Ok(Box::new(GzDecoder::new(BufReader::new(file))))
        }
        _ => {
            trace!(path = %path.display(), "opening plain file");
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

fn create_csv_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    // ragged rows are tolerated until a referenced column is missing
    builder.delimiter(delimiter).has_headers(true).flexible(true);
    builder
}

/// All benchmark runs of one input file, held in memory.
#[derive(Debug)]
pub struct RunTable {
    columns: HashMap<String, usize>,
    records: Vec<StringRecord>,
}

impl RunTable {
    pub fn open(path: &Path, delimiter: u8) -> Result<RunTable> {
        let table = RunTable::from_reader(open_decompress(path)?, delimiter)?;
        debug!(path = %path.display(), rows = table.len(), "loaded runs");
        Ok(table)
    }

    pub fn from_reader<R: Read>(rdr: R, delimiter: u8) -> Result<RunTable> {
        let mut rdr = create_csv_builder(delimiter).from_reader(rdr);
        let headers = rdr.headers()?;
        let mut columns = HashMap::with_capacity(headers.len());
        for (i, h) in headers.iter().enumerate() {
            // first occurrence wins for duplicated header names
            columns.entry(h.to_string()).or_insert(i);
        }
        let records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(RunTable { columns, records })
    }

    pub fn records(&self) -> &[StringRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index of a header column.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| AnalyzeError::MissingColumn { column: name.to_string() })
    }
}

/// Line number of a record within its source, 0 when unknown.
pub fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

pub fn field<'r>(record: &'r StringRecord, index: usize, column: &str, line: u64) -> Result<&'r str> {
    record.get(index).ok_or_else(|| AnalyzeError::MissingField { column: column.to_string(), line })
}
