use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cpu_time::ProcessTime;
use tracing::info;

use crate::chart::{create_plot, ChartStyle};
use crate::error::{AnalyzeError, Result};
use crate::gen::RunTable;
use crate::keysum::{aggregate, Dimension, Metric};
use crate::report::{print_table, report_file_name, write_aggregated_file};

/// Key fields every grouping starts with.
pub const BASE_KEY_FIELDS: [Dimension; 3] = [Dimension::SubjSize, Dimension::QuerySize, Dimension::Success];

/// One grouping configuration: the base key fields plus an optional extra dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grouping {
    pub extra: Option<Dimension>,
}

impl Grouping {
    pub const ALL: [Grouping; 6] = [
        Grouping { extra: None },
        Grouping { extra: Some(Dimension::SubjType) },
        Grouping { extra: Some(Dimension::QueryStart) },
        Grouping { extra: Some(Dimension::DirectSet) },
        Grouping { extra: Some(Dimension::QueryType) },
        Grouping { extra: Some(Dimension::ContainerMode) },
    ];

    pub fn key_fields(&self) -> Vec<Dimension> {
        let mut fields = BASE_KEY_FIELDS.to_vec();
        fields.extend(self.extra);
        fields
    }

    pub fn plot_key_fields(&self) -> Vec<Dimension> {
        self.extra.into_iter().collect()
    }

    pub fn report_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(report_file_name(self.extra))
    }
}

impl FromStr for Grouping {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("none") {
            return Ok(Grouping { extra: None });
        }
        let extra: Dimension = s.parse()?;
        Grouping::ALL
            .iter()
            .copied()
            .find(|g| g.extra == Some(extra))
            .ok_or_else(|| format!("\"{}\" is not a grouping dimension", s))
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub charts: bool,
    pub print_table: bool,
    pub only: Option<Grouping>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions { charts: true, print_table: false, only: None }
    }
}

/// Aggregate, report and chart one grouping. Returns the files written.
pub fn run_grouping(runs: &RunTable, grouping: Grouping, output_dir: &Path, opts: &RunOptions) -> Result<Vec<PathBuf>> {
    let cpu_start = ProcessTime::now();
    let key_fields = grouping.key_fields();
    let plot_key_fields = grouping.plot_key_fields();

    let aggregated = aggregate(runs, &key_fields)?;

    let mut written = Vec::with_capacity(3);
    let report = grouping.report_path(output_dir);
    write_aggregated_file(&report, &key_fields, &aggregated)?;
    written.push(report);

    if opts.print_table {
        let stdout = std::io::stdout();
        let mut writer = stdout.lock();
        writeln!(writer, "{}", report_file_name(grouping.extra)).map_err(|e| AnalyzeError::io("<stdout>", e))?;
        print_table(&mut writer, &key_fields, &aggregated)?;
    }

    if opts.charts {
        written.push(create_plot(
            &plot_key_fields,
            &[Dimension::QuerySize],
            Dimension::SubjSize,
            Metric::AverageTime,
            &aggregated,
            output_dir,
            &ChartStyle::default(),
        )?);
        written.push(create_plot(
            &plot_key_fields,
            &[Dimension::SubjSize],
            Dimension::QuerySize,
            Metric::AverageTime,
            &aggregated,
            output_dir,
            &ChartStyle::default(),
        )?);
    }

    let keys = key_fields.iter().map(|d| d.column()).collect::<Vec<_>>().join(",");
    info!(
        keys = %keys,
        groups = aggregated.len(),
        files = written.len(),
        cpu_secs = cpu_start.elapsed().as_secs_f64(),
        "grouping done"
    );
    Ok(written)
}

/// Run every grouping configuration (or the one selected) over the input file.
pub fn run(input: &Path, output_dir: &Path, delimiter: u8, opts: &RunOptions) -> Result<Vec<PathBuf>> {
    let runs = RunTable::open(input, delimiter)?;
    info!(input = %input.display(), rows = runs.len(), "read benchmark runs");
    let groupings: Vec<Grouping> = match opts.only {
        Some(g) => vec![g],
        None => Grouping::ALL.to_vec(),
    };
    let mut written = Vec::new();
    for g in groupings {
        written.extend(run_grouping(&runs, g, output_dir, opts)?);
    }
    Ok(written)
}
