use std::path::PathBuf;
use std::str::FromStr;

use bench_aggregate::driver::{Grouping, RunOptions};
use clap::{ArgAction, Parser};
use lazy_static::lazy_static;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub const USAGE: &str = "Usage: bagg input-file.csv output-dir";

lazy_static! {
    pub static ref BUILD_INFO: String = format!("  ver: {}  rev: {}",
        env!("CARGO_PKG_VERSION"), env!("BUILD_GIT_HASH"));
}

#[derive(Parser, Debug)]
#[command(version = BUILD_INFO.as_str(), rename_all = "kebab-case")]
/// Aggregate benchmark runs by subject size, query size and success, write one CSV
/// report per grouping and chart the average times.
///
/// Missing INPUT or OUTPUT_DIR prints the usage line and exits successfully.
pub struct CliCfg {
    /// benchmark run CSV, optionally gzip compressed
    pub input: Option<PathBuf>,
    /// existing directory receiving reports and charts
    pub output_dir: Option<PathBuf>,
    #[arg(short='d', long="input_delimiter", value_parser=parse_escape, default_value=",")] pub delimiter: char,
    #[arg(short='v', action=ArgAction::Count)] pub verbose: u8,
    #[arg(long="no_charts")] pub no_charts: bool,
    #[arg(short='T', long="print_table")] pub print_table: bool,
    /// run a single grouping: none, subj type, query start, direct set, query type or container mode
    #[arg(long="only", value_parser=parse_grouping)] pub only: Option<Grouping>,
}

impl CliCfg {
    pub fn run_options(&self) -> RunOptions {
        RunOptions { charts: !self.no_charts, print_table: self.print_table, only: self.only }
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }
}

fn escape_parser(s: &str) -> Result<char> {
    if let Some(stripped) = s.strip_prefix("\\d") {
        match u8::from_str(stripped) {
            Ok(v) if v <= 127 => Ok(v as char),
            _ => Err(format!("Expect delimiter escape decimal to a be a number between 0 and 127 but got: \"{}\"", stripped))?,
        }
    } else {
        match s {
            "\\t" => Ok('\t'),
            "\\0" => Ok('\0'),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii() => Ok(c),
                    _ => Err("Delimiter not understood - must be 1 ascii character OR \\t or \\0 or \\d<dec num>".to_string())?,
                }
            }
        }
    }
}

// clap wrappers returning String errors
fn parse_escape(s: &str) -> std::result::Result<char, String> {
    escape_parser(s).map_err(|e| e.to_string())
}
fn parse_grouping(s: &str) -> std::result::Result<Grouping, String> {
    Grouping::from_str(s)
}

pub fn get_cli() -> CliCfg {
    CliCfg::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_aggregate::Dimension;

    #[test]
    fn delimiter_escapes() {
        assert_eq!(escape_parser(",").unwrap(), ',');
        assert_eq!(escape_parser("\\t").unwrap(), '\t');
        assert_eq!(escape_parser("\\0").unwrap(), '\0');
        assert_eq!(escape_parser("\\d59").unwrap(), ';');
        assert!(escape_parser("\\d300").is_err());
        assert!(escape_parser(";;").is_err());
        assert!(escape_parser("é").is_err());
    }

    #[test]
    fn parses_options() {
        let cfg = CliCfg::try_parse_from(["bagg", "runs.csv", "out", "-vv", "--only", "subj type", "--no_charts", "-d", "\\t"]).unwrap();
        assert_eq!(cfg.input, Some(PathBuf::from("runs.csv")));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cfg.verbose, 2);
        assert_eq!(cfg.delimiter_byte(), b'\t');
        let opts = cfg.run_options();
        assert!(!opts.charts);
        assert_eq!(opts.only, Some(Grouping { extra: Some(Dimension::SubjType) }));
    }

    #[test]
    fn positionals_are_optional() {
        let cfg = CliCfg::try_parse_from(["bagg", "runs.csv"]).unwrap();
        assert!(cfg.output_dir.is_none());
        assert!(CliCfg::try_parse_from(["bagg", "--only", "colour"]).is_err());
    }
}
