//! Standalone benchmark runner that prints the formatted report.
//!
//! Settings come from `BENCH_*` environment variables (a `.env` file in the
//! working directory is honoured); see `storage_bench::config`. The record
//! count may also be given as the only argument.
//!
//! Usage:
//!   cargo run --release
//!   cargo run --release -- 20000
//!   BENCH_REPORT_PATH=out/report.json cargo run --release

use std::{env, process};
use storage_bench::report::print_report;
use storage_bench::{BenchConfig, Harness};

fn main() {
    let mut config = BenchConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e:#}. Exiting.");
        process::exit(1);
    });

    if let Some(arg) = env::args().nth(1) {
        config.records = arg.parse().unwrap_or_else(|_| {
            eprintln!("Usage: storage-bench [records]  (got '{arg}')");
            process::exit(1);
        });
    }

    etl_core::initialize_logger(config.log.level, config.log.file.as_deref()).unwrap_or_else(
        |e| {
            eprintln!("Failed to initialize logger: {e}. Exiting.");
            process::exit(1);
        },
    );

    log::info!("Running storage benchmark...");
    log::info!("  Records:     {}", config.records);
    log::info!("  Output dir:  {}", config.output_dir.display());
    log::info!("  SQLite:      {}", config.relational.path.display());
    log::info!(
        "  Redis:       {}:{}/{}",
        config.document.host,
        config.document.port,
        config.document.database
    );

    let harness = Harness::from_config(&config);
    let report = match harness.run(config.records) {
        Ok(report) => report,
        Err(e) => {
            log::error!("Benchmark failed: {e}");
            process::exit(1);
        }
    };

    print_report(&report, config.records);

    if let Some(path) = &config.report_path {
        if let Err(e) = report.write_json(path) {
            log::error!("Failed to write report: {e:#}");
            process::exit(1);
        }
    }
}
