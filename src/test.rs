#![allow(unused)]

extern crate assert_cmd;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

#[macro_use]
extern crate lazy_static;

#[cfg(test)]
mod tests {
    lazy_static! {
        static ref RUNS_ALL_DIMS: String = create_fake_runs(true);
        static ref RUNS_BASE_ONLY: String = create_fake_runs(false);
    }
    use super::*;

    static HEADER: &str = "subj size,query size,success,subj type,query start,direct set,query type,container mode,init time,warmup time,total query time,run count,average time";

    fn create_fake_runs(with_extras: bool) -> String {
        let mut input_str = String::from(HEADER);
        input_str.push('\n');
        for subj in [10, 100, 1000] {
            for query in [2, 4] {
                for rep in 0..3 {
                    let extras = if with_extras {
                        let subj_type = if rep % 2 == 0 { "flat" } else { "deep" };
                        format!("{},cold,true,path,list", subj_type)
                    } else {
                        ",,,,".to_string()
                    };
                    let avg = subj * query * 10 + rep;
                    input_str.push_str(&format!("{},{},OK,{},5,7,{},1,{}\n", subj, query, extras, avg, avg));
                }
            }
        }
        let fail_extras = if with_extras { "flat,cold,true,path,list" } else { ",,,," };
        input_str.push_str(&format!("10,7,FAIL,{},5,,,0,\n", fail_extras));
        input_str
    }

    fn workspace(input: &str) -> Result<(TempDir, String, String), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let in_path = dir.path().join("runs.csv");
        fs::write(&in_path, input)?;
        let out = dir.path().join("out");
        fs::create_dir(&out)?;
        Ok((dir, in_path.to_string_lossy().into_owned(), out.to_string_lossy().into_owned()))
    }

    fn listing(dir: &str) -> Vec<String> {
        let mut v: Vec<String> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect();
        v.sort();
        v
    }

    #[test]
    fn no_args_prints_usage_and_succeeds() -> Result<(), Box<dyn std::error::Error>> {
        Command::cargo_bin("bagg")?
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage: bagg input-file.csv output-dir"));
        Ok(())
    }

    #[test]
    fn one_arg_prints_usage_and_succeeds() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, input, _out) = workspace(&RUNS_ALL_DIMS)?;
        Command::cargo_bin("bagg")?
            .arg(&input)
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage:"));
        Ok(())
    }

    #[test]
    fn full_run_writes_all_reports_and_charts() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, input, out) = workspace(&RUNS_ALL_DIMS)?;
        Command::cargo_bin("bagg")?.args([&input, &out]).assert().success();
        let files = listing(&out);
        assert_eq!(files.iter().filter(|f| f.ends_with(".csv")).count(), 6, "files: {:?}", files);
        assert_eq!(files.iter().filter(|f| f.ends_with(".svg")).count(), 12, "files: {:?}", files);
        for name in [
            "aggregated.csv",
            "subjtype_aggregated.csv",
            "containermode_aggregated.csv",
            "subjsize_averagetime.svg",
            "querysize_averagetime.svg",
            "subjtype_subjsize_averagetime.svg",
            "directset_querysize_averagetime.svg",
        ] {
            assert!(files.contains(&name.to_string()), "missing {} in {:?}", name, files);
        }

        let report = fs::read_to_string(Path::new(&out).join("aggregated.csv"))?;
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "subj size,query size,success,count,sum init time,init time,sum warmup time,warmup time,sum total query time,total query time,sum run count,run count,sum average time,average time");
        // 3 subject sizes x 2 query sizes, plus the failed run
        assert_eq!(lines.len(), 1 + 7);
        assert_eq!(lines[1], "10,2,OK,3,15,5,21,7,603,201,3,1,603,201");
        assert_eq!(lines[3], "10,7,FAIL,1,5,5,0,0,0,0,0,0,0,0");
        assert_eq!(lines[7], "1000,4,OK,3,15,5,21,7,120003,40001,3,1,120003,40001");
        Ok(())
    }

    #[test]
    fn failed_runs_stay_out_of_charts() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, input, out) = workspace(&RUNS_ALL_DIMS)?;
        Command::cargo_bin("bagg")?.args([input.as_str(), out.as_str(), "--only", "none"]).assert().success();
        let report = fs::read_to_string(Path::new(&out).join("aggregated.csv"))?;
        assert!(report.contains("10,7,FAIL"));
        let svg = fs::read_to_string(Path::new(&out).join("subjsize_averagetime.svg"))?;
        assert!(svg.contains("query size 2"));
        assert!(!svg.contains("query size 7"));
        Ok(())
    }

    #[test]
    fn base_only_input_single_grouping() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, input, out) = workspace(&RUNS_BASE_ONLY)?;
        Command::cargo_bin("bagg")?.args([input.as_str(), out.as_str(), "--only", "none"]).assert().success();
        assert_eq!(listing(&out), vec!["aggregated.csv", "querysize_averagetime.svg", "subjsize_averagetime.svg"]);
        let report = fs::read_to_string(Path::new(&out).join("aggregated.csv"))?;
        assert!(report.starts_with("subj size,query size,success,count,"));
        Ok(())
    }

    #[test]
    fn print_table_without_charts() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, input, out) = workspace(&RUNS_ALL_DIMS)?;
        Command::cargo_bin("bagg")?
            .args([input.as_str(), out.as_str(), "--only", "subj type", "--no_charts", "-T"])
            .assert()
            .success()
            .stdout(predicate::str::contains("subjtype_aggregated.csv").and(predicate::str::contains("deep")));
        assert_eq!(listing(&out), vec!["subjtype_aggregated.csv"]);
        Ok(())
    }

    #[test]
    fn gzip_input() -> Result<(), Box<dyn std::error::Error>> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let (dir, _input, out) = workspace("")?;
        let gz = dir.path().join("runs.csv.gz");
        let mut enc = GzEncoder::new(fs::File::create(&gz)?, Compression::default());
        enc.write_all(RUNS_ALL_DIMS.as_bytes())?;
        enc.finish()?;
        Command::cargo_bin("bagg")?
            .args([gz.to_string_lossy().as_ref(), out.as_str(), "--only", "none", "--no_charts"])
            .assert()
            .success();
        let report = fs::read_to_string(Path::new(&out).join("aggregated.csv"))?;
        assert_eq!(report.lines().count(), 8);
        Ok(())
    }

    #[test]
    fn semicolon_delimited_input() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, input, out) = workspace(&RUNS_BASE_ONLY.replace(',', ";"))?;
        Command::cargo_bin("bagg")?
            .args([input.as_str(), out.as_str(), "-d", ";", "--only", "none", "--no_charts"])
            .assert()
            .success();
        let report = fs::read_to_string(Path::new(&out).join("aggregated.csv"))?;
        assert!(report.contains("100,4,OK,3,"));
        Ok(())
    }

    #[test]
    fn missing_column_fails() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, input, out) = workspace("subj size,query size,success,init time,warmup time,total query time,run count,average time\n10,5,OK,1,1,1,1,1\n")?;
        Command::cargo_bin("bagg")?
            .args([&input, &out])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("column \"subj type\" not found in input header"));
        // the base grouping completed before the failing one
        assert!(Path::new(&out).join("aggregated.csv").exists());
        Ok(())
    }

    #[test]
    fn non_numeric_metric_fails() -> Result<(), Box<dyn std::error::Error>> {
        let input = format!("{}\n10,5,OK,,,,,,1,1,fast,1,1\n", HEADER);
        let (_dir, input, out) = workspace(&input)?;
        Command::cargo_bin("bagg")?
            .args([&input, &out])
            .assert()
            .failure()
            .stderr(predicate::str::contains("\"fast\"").and(predicate::str::contains("total query time")));
        Ok(())
    }

    #[test]
    fn missing_output_dir_fails() -> Result<(), Box<dyn std::error::Error>> {
        let (dir, input, _out) = workspace(&RUNS_ALL_DIMS)?;
        let absent = dir.path().join("nope");
        Command::cargo_bin("bagg")?
            .args([input.as_str(), absent.to_string_lossy().as_ref()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("error:"));
        Ok(())
    }

    #[test]
    fn missing_input_fails() -> Result<(), Box<dyn std::error::Error>> {
        let (dir, _input, out) = workspace("")?;
        Command::cargo_bin("bagg")?
            .args([dir.path().join("absent.csv").to_string_lossy().as_ref(), out.as_str()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("absent.csv"));
        Ok(())
    }
}
