//! Result Sink: ordered records → pretty, UTF-8 JSON on disk.

use crate::core::types::{Record, Row};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Resolve the output column names for `width` fields.
///
/// Unknown, empty, or surplus columns become `col_<n>` (1-based); repeated
/// header labels get a `_<n>` suffix so no value is silently overwritten.
pub fn column_names(headers: &[String], width: usize) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    (0..width.max(headers.len()))
        .map(|i| {
            let generic = format!("col_{}", i + 1);
            let label = headers.get(i).map(|h| h.trim()).unwrap_or_default();
            let mut name = if label.is_empty() {
                generic.clone()
            } else {
                label.to_string()
            };
            if used.contains(&name) {
                name = format!("{}_{}", name, i + 1);
            }
            if used.contains(&name) {
                name = generic;
            }
            used.insert(name.clone());
            name
        })
        .collect()
}

/// Build one record per row, column order preserved.
pub fn to_records(headers: &[String], rows: &[Row]) -> Vec<Record> {
    let width = rows.iter().map(|r| r.fields.len()).max().unwrap_or(0);
    let names = column_names(headers, width);
    rows.iter()
        .map(|row| {
            names
                .iter()
                .zip(row.fields.iter())
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
        .collect()
}

/// Pretty-printed JSON array. `serde_json` leaves non-ASCII text unescaped.
pub fn records_to_json(headers: &[String], rows: &[Row]) -> Result<String> {
    let records = to_records(headers, rows);
    serde_json::to_string_pretty(&records).context("serializing records")
}

pub trait ResultSink {
    fn write(&self, headers: &[String], rows: &[Row]) -> Result<()>;
}

/// Writes the record list to a file via a temp file + rename, so a crash
/// never leaves a truncated artifact behind.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonFileSink {
    fn write(&self, headers: &[String], rows: &[Row]) -> Result<()> {
        let json = records_to_json(headers, rows)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("moving {} into place", self.path.display()))?;

        info!("💾 Saved {} records to {}", rows.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        Row {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            raw: None,
            identity: None,
        }
    }

    fn headers(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn generic_names_without_headers() {
        assert_eq!(column_names(&[], 3), vec!["col_1", "col_2", "col_3"]);
    }

    #[test]
    fn empty_duplicate_and_surplus_columns() {
        let names = column_names(&headers(&["ID", "", "Name", "Name"]), 5);
        assert_eq!(names, vec!["ID", "col_2", "Name", "Name_4", "col_5"]);
    }

    #[test]
    fn records_keep_column_order() {
        let recs = to_records(&headers(&["Zeta", "Alpha"]), &[row(&["1", "2"])]);
        let keys: Vec<_> = recs[0].keys().cloned().collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn json_is_indented_and_keeps_unicode() {
        let json = records_to_json(&headers(&["Name"]), &[row(&["Café ☕"])]).unwrap();
        assert!(json.contains("Café ☕"));
        assert!(json.contains("\n  {"));
    }

    #[test]
    fn empty_harvest_is_still_valid_json() {
        assert_eq!(records_to_json(&[], &[]).unwrap(), "[]");
    }

    #[test]
    fn file_sink_writes_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("products.json");
        JsonFileSink::new(&path)
            .write(&headers(&["ID"]), &[row(&["1"]), row(&["2"])])
            .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.as_array().map(|a| a.len()), Some(2));
        assert_eq!(parsed[1]["ID"], "2");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
