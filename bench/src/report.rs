//! Report module: the timing report a run produces, plus a console printer
//! and JSON export for whoever renders or compares results.

use crate::catalog::{Configuration, Operation};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Elapsed seconds per operation, for one configuration.
pub type OperationTimings = BTreeMap<Operation, f64>;

/// Configuration → operation → elapsed seconds.
///
/// Only the harness builds one, and a report is never modified after
/// `run` returns it. Iteration follows [`Configuration::ALL`] and
/// [`Operation::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingReport {
    timings: BTreeMap<Configuration, OperationTimings>,
}

impl TimingReport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, configuration: Configuration, operation: Operation, seconds: f64) {
        self.timings
            .entry(configuration)
            .or_default()
            .insert(operation, seconds);
    }

    pub fn get(&self, configuration: Configuration) -> Option<&OperationTimings> {
        self.timings.get(&configuration)
    }

    pub fn seconds(&self, configuration: Configuration, operation: Operation) -> Option<f64> {
        self.get(configuration)?.get(&operation).copied()
    }

    /// Look a timing up by its string ids, e.g. `("relational+flat", "insert")`.
    pub fn lookup(&self, configuration: &str, operation: &str) -> Option<f64> {
        let configuration = configuration.parse().ok()?;
        let operation = operation.parse().ok()?;
        self.seconds(configuration, operation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Configuration, &OperationTimings)> {
        self.timings.iter().map(|(c, ops)| (*c, ops))
    }

    pub fn configuration_count(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    /// Same nesting as the report, keyed by the string ids.
    fn to_json_value(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for (configuration, ops) in self.iter() {
            let mut inner = serde_json::Map::new();
            for (operation, seconds) in ops {
                inner.insert(operation.to_string(), serde_json::Value::from(*seconds));
            }
            root.insert(configuration.to_string(), serde_json::Value::Object(inner));
        }
        serde_json::Value::Object(root)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_json_value()).context("serialize timing report")
    }

    /// Write the JSON form to `path`, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        fs::write(path, self.to_json_string()?)
            .with_context(|| format!("write report to {}", path.display()))?;
        log::info!("Timing report written to {}", path.display());
        Ok(())
    }
}

/// Print one block per configuration, then a side-by-side summary.
pub fn print_report(report: &TimingReport, records: usize) {
    println!("\n{}", "=".repeat(80));
    println!("  Storage Benchmark Report");
    println!("  Records per configuration: {records}");
    println!("{}", "=".repeat(80));

    for (configuration, ops) in report.iter() {
        println!("\n  Configuration: {configuration}");
        println!("  {}", "-".repeat(44));
        println!("  {:24} {:>10} {:>8}", "Operation", "Seconds", "ms");
        for (operation, seconds) in ops {
            println!(
                "  {:24} {:>10.4} {:>8.1}",
                operation.as_str(),
                seconds,
                seconds * 1000.0
            );
        }
        let total: f64 = ops.values().sum();
        println!("  {:24} {:>10.4} {:>8.1}", "total", total, total * 1000.0);
    }

    println!("\n{}", "=".repeat(80));

    if report.configuration_count() >= 2 {
        println!("\n  Comparison Summary (seconds):");
        print!("  {:16}", "Operation");
        for (configuration, _) in report.iter() {
            print!(" {:>14}", short_label(configuration));
        }
        println!();
        println!("  {}", "-".repeat(16 + 15 * report.configuration_count()));
        for operation in Operation::ALL {
            print!("  {:16}", operation.as_str());
            for (configuration, _) in report.iter() {
                match report.seconds(configuration, operation) {
                    Some(s) => print!(" {:>14.4}", s),
                    None => print!(" {:>14}", "-"),
                }
            }
            println!();
        }
    }

    println!();
}

/// Column header short enough for the summary table.
fn short_label(configuration: Configuration) -> &'static str {
    match configuration {
        Configuration::RelationalFlat => "rel/flat",
        Configuration::RelationalSemiStructured => "rel/semi",
        Configuration::DocumentFlat => "doc/flat",
        Configuration::DocumentNested => "doc/nested",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> TimingReport {
        let mut report = TimingReport::new();
        // Deliberately recorded out of order.
        for (i, c) in Configuration::ALL.iter().rev().enumerate() {
            for (j, o) in Operation::ALL.iter().rev().enumerate() {
                report.record(*c, *o, (i * 10 + j) as f64 / 100.0);
            }
        }
        report
    }

    #[test]
    fn iteration_follows_run_order() {
        let report = full();
        let configs: Vec<Configuration> = report.iter().map(|(c, _)| c).collect();
        assert_eq!(configs, Configuration::ALL.to_vec());
        for (_, ops) in report.iter() {
            let names: Vec<Operation> = ops.keys().copied().collect();
            assert_eq!(names, Operation::ALL.to_vec());
        }
        assert_eq!(report.configuration_count(), 4);
    }

    #[test]
    fn lookup_by_string_ids() {
        let report = full();
        let direct = report
            .seconds(Configuration::DocumentNested, Operation::Insert)
            .unwrap();
        assert_eq!(report.lookup("document+nested", "insert"), Some(direct));
        assert_eq!(report.lookup("document+nested", "delete"), None);
        assert_eq!(report.lookup("graph+flat", "insert"), None);
    }

    #[test]
    fn missing_configuration_is_none() {
        let mut report = TimingReport::new();
        report.record(Configuration::RelationalFlat, Operation::Insert, 0.5);
        assert!(report.get(Configuration::DocumentFlat).is_none());
        assert_eq!(
            report.seconds(Configuration::RelationalFlat, Operation::Update),
            None
        );
    }

    #[test]
    fn json_uses_string_ids() {
        let mut report = TimingReport::new();
        report.record(Configuration::RelationalSemiStructured, Operation::IndexCreation, 1.25);
        let value: serde_json::Value =
            serde_json::from_str(&report.to_json_string().unwrap()).unwrap();
        assert_eq!(value["relational+semi-structured"]["index_creation"], 1.25);
    }

    #[test]
    fn write_json_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        full().write_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_object().map(|m| m.len()), Some(4));
    }
}
