use std::time::Instant;

use bench_aggregate::driver;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

mod cli;

use cli::{get_cli, CliCfg, USAGE};

fn main() {
    if let Err(err) = analyze() {
        eprintln!("error: {}", &err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn analyze() -> Result<(), Box<dyn std::error::Error>> {
    let cfg: CliCfg = get_cli();
    init_tracing(cfg.verbose);

    let (input, output_dir) = match (&cfg.input, &cfg.output_dir) {
        (Some(i), Some(o)) => (i, o),
        _ => {
            // missing arguments are a help request, not a failure
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let start_f = Instant::now();
    let written = driver::run(input, output_dir, cfg.delimiter_byte(), &cfg.run_options())?;
    info!(files = written.len(), secs = start_f.elapsed().as_secs_f64(), "analysis finished");
    Ok(())
}
