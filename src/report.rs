use std::fs::File;
use std::io::Write;
use std::path::Path;

use prettytable::{format, Cell, Row, Table};
use tracing::debug;

use crate::error::{AnalyzeError, Result};
use crate::keysum::{AggregatedGroup, Dimension, Metric};

/// Column titles: key fields, count, then a sum and an average column per metric.
pub fn header(key_fields: &[Dimension]) -> Vec<String> {
    let mut cols: Vec<String> = key_fields.iter().map(|d| d.column().to_string()).collect();
    cols.push("count".to_string());
    for m in Metric::ALL {
        cols.push(m.sum_column());
        cols.push(m.column().to_string());
    }
    cols
}

fn row_cells(group: &AggregatedGroup) -> Vec<String> {
    let mut cells: Vec<String> = group.keys.iter().map(|(_, v)| v.to_string()).collect();
    cells.push(group.count.to_string());
    for m in Metric::ALL {
        let stat = group.metric(m);
        cells.push(stat.sum.to_string());
        cells.push(stat.average.to_string());
    }
    cells
}

pub fn write_aggregated<W: Write>(writer: W, key_fields: &[Dimension], groups: &[AggregatedGroup]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(key_fields))?;
    for g in groups {
        wtr.write_record(row_cells(g))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write the report to `path`, replacing any previous content.
pub fn write_aggregated_file(path: &Path, key_fields: &[Dimension], groups: &[AggregatedGroup]) -> Result<()> {
    let file = File::create(path).map_err(|e| AnalyzeError::io(path, e))?;
    write_aggregated(file, key_fields, groups)?;
    debug!(path = %path.display(), rows = groups.len(), "wrote aggregated report");
    Ok(())
}

pub fn report_file_name(extra: Option<Dimension>) -> String {
    match extra {
        Some(d) => format!("{}_aggregated.csv", d.compact()),
        None => "aggregated.csv".to_string(),
    }
}

pub fn print_table<W: Write>(writer: &mut W, key_fields: &[Dimension], groups: &[AggregatedGroup]) -> Result<()> {
    let mut celltable = Table::new();
    celltable.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    celltable.set_titles(Row::new(header(key_fields).iter().map(|c| Cell::new(c)).collect()));
    for g in groups {
        celltable.add_row(Row::new(row_cells(g).iter().map(|c| Cell::new(c)).collect()));
    }
    celltable.print(writer).map_err(|e| AnalyzeError::io("<stdout>", e))?;
    Ok(())
}
