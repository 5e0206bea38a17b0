//! CSV input of targets and CSV output of probe results.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use csv::{ReaderBuilder, Writer};

use crate::classify::{SupportReport, SupportStatus};
use crate::orchestrator::{ProbeResult, millis};

pub const HEADER: [&str; 18] = [
    "URL",
    "PHP Version",
    "MySQL Version",
    "WordPress Version",
    "Caching",
    "Cache Control",
    "Web Server",
    "Web Server Version",
    "SSL Valid",
    "TTFB1 - Longest (ms)",
    "TTFB2 (ms)",
    "TTFB3 - Shortest (ms)",
    "Average TTFB (ms)",
    "X-Powered-By",
    "PHP Status",
    "MySQL Status",
    "Web Server Status",
    "WordPress Status",
];

/// Collects the value of `column` from every record. The input has no
/// header row; short records and empty cells are skipped.
pub fn read_targets<R: io::Read>(reader: R, column: usize) -> Result<Vec<String>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut targets = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(column).map(str::trim) {
            if !value.is_empty() {
                targets.push(value.to_string());
            }
        }
    }
    Ok(targets)
}

pub fn read_targets_file(path: &Path, column: usize) -> Result<Vec<String>, csv::Error> {
    let file = std::fs::File::open(path)?;
    read_targets(file, column)
}

pub fn write_results<W: io::Write>(writer: W, results: &[ProbeResult]) -> Result<(), csv::Error> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(HEADER)?;
    for result in results {
        writer.write_record(to_row(result))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_results_file(path: &Path, results: &[ProbeResult]) -> Result<(), csv::Error> {
    let file = std::fs::File::create(path)?;
    write_results(file, results)
}

/// `site_info_YYYYMMDD_HHMMSS.csv`
pub fn output_file_name(now: DateTime<Local>) -> String {
    format!("site_info_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

pub fn output_path(directory: &Path, now: DateTime<Local>) -> PathBuf {
    directory.join(output_file_name(now))
}

fn to_row(result: &ProbeResult) -> Vec<String> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let ms = |value: Option<std::time::Duration>| {
        value
            .map(|d| format!("{:.3}", millis(d)))
            .unwrap_or_default()
    };

    let samples = result.latency.map(|l| *l.samples());
    let sample = |i: usize| ms(samples.map(|s| s[i]));
    let average = ms(result.latency.map(|l| l.average()));
    let status = |pick: fn(&SupportReport) -> SupportStatus| {
        result
            .support
            .as_ref()
            .map(|report| pick(report).to_string())
            .unwrap_or_default()
    };

    let meta = &result.metadata;
    vec![
        result.target.clone(),
        text(&meta.php_version),
        text(&meta.mysql_version),
        text(&result.wordpress_version),
        meta.caching.to_string(),
        text(&meta.cache_control),
        text(&meta.web_server),
        text(&meta.web_server_version),
        result.ssl_valid.to_string(),
        sample(0),
        sample(1),
        sample(2),
        average,
        text(&meta.x_powered_by),
        status(|r| r.php),
        status(|r| r.mysql),
        status(|r| r.web_server),
        status(|r| r.wordpress),
    ]
}
