//! Access to the end-of-life registry that maps release cycles to support
//! end dates.

pub mod cache;
pub mod client;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::Result;

pub use cache::CachedRegistry;
pub use client::EndOfLifeClient;

/// When a release cycle stops receiving support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EolMarker {
    /// `false` never expires, `true` is already end-of-life.
    Flag(bool),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionRecord {
    #[serde(deserialize_with = "cycle_as_string")]
    pub cycle: String,
    pub eol: EolMarker,
}

impl VersionRecord {
    pub fn new(cycle: impl Into<String>, eol: EolMarker) -> Self {
        Self {
            cycle: cycle.into(),
            eol,
        }
    }
}

/// Source of release-cycle tables, keyed by product slug.
#[async_trait]
pub trait VersionRegistry: Send + Sync {
    async fn fetch(&self, product: &str) -> Result<Vec<VersionRecord>>;
}

/// Decodes a registry table, skipping entries that do not have the expected
/// shape instead of rejecting the whole table.
pub fn parse_records(entries: Vec<serde_json::Value>) -> Vec<VersionRecord> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<VersionRecord>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "skipping malformed registry entry");
                None
            }
        })
        .collect()
}

// Some products publish numeric cycles (`"cycle": 8`).
fn cycle_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cycle {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Cycle::deserialize(deserializer)? {
        Cycle::Text(s) => s,
        Cycle::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_eol_variants() {
        let records = parse_records(vec![
            json!({"cycle": "8.3", "eol": "2027-12-31", "latest": "8.3.4"}),
            json!({"cycle": "1.25", "eol": false}),
            json!({"cycle": "5.6", "eol": true}),
        ]);

        assert_eq!(
            records,
            vec![
                VersionRecord::new(
                    "8.3",
                    EolMarker::Date(NaiveDate::from_ymd_opt(2027, 12, 31).unwrap())
                ),
                VersionRecord::new("1.25", EolMarker::Flag(false)),
                VersionRecord::new("5.6", EolMarker::Flag(true)),
            ]
        );
    }

    #[test]
    fn test_numeric_cycle() {
        let records = parse_records(vec![json!({"cycle": 8, "eol": false})]);
        assert_eq!(records[0].cycle, "8");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let records = parse_records(vec![
            json!({"eol": false}),
            json!({"cycle": "6.4", "eol": "soon"}),
            json!("not an object"),
            json!({"cycle": "6.5", "eol": false}),
        ]);
        assert_eq!(records, vec![VersionRecord::new("6.5", EolMarker::Flag(false))]);
    }
}
