//! Dedup Ledger: record key → row, insertion ordered, never shrinks.
//!
//! Known limitation: with the default content key two genuinely distinct
//! records that render identical text (or share a first column) collapse
//! into one. `KeyStrategy::PreferIdentity` avoids that when the renderer
//! exposes a per-row id.

use crate::core::config::KeyStrategy;
use crate::core::types::Row;
use indexmap::IndexMap;

/// Derive the dedup key for a row.
///
/// `Content`: the first field when non-empty, else all fields joined with
/// `|`, else the raw text. Fields are compared trimmed, so equal content
/// always yields an equal key.
pub fn record_key(row: &Row, strategy: KeyStrategy) -> String {
    if strategy == KeyStrategy::PreferIdentity {
        if let Some(id) = row.identity.as_deref().map(str::trim) {
            if !id.is_empty() {
                return format!("id:{}", id);
            }
        }
    }

    if let Some(first) = row.fields.first().map(|f| f.trim()) {
        if !first.is_empty() {
            return first.to_string();
        }
    }

    let joined = row
        .fields
        .iter()
        .map(|f| f.trim())
        .collect::<Vec<_>>()
        .join("|");
    if joined.chars().any(|c| c != '|') {
        return joined;
    }

    row.raw.as_deref().map(str::trim).unwrap_or_default().to_string()
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    strategy: KeyStrategy,
    entries: IndexMap<String, Row>,
}

impl Ledger {
    pub fn new(strategy: KeyStrategy) -> Self {
        Self {
            strategy,
            entries: IndexMap::new(),
        }
    }

    pub fn key_of(&self, row: &Row) -> String {
        record_key(row, self.strategy)
    }

    pub fn contains(&self, row: &Row) -> bool {
        self.entries.contains_key(&self.key_of(row))
    }

    /// Insert every row whose key is new. The return value is the only
    /// progress signal the harvest loop uses.
    pub fn merge<I>(&mut self, rows: I) -> usize
    where
        I: IntoIterator<Item = Row>,
    {
        let mut inserted = 0;
        for row in rows {
            let key = self.key_of(&row);
            if self.entries.contains_key(&key) {
                continue;
            }
            self.entries.insert(key, row);
            inserted += 1;
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.entries.values()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.entries.into_values().collect()
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

    #[test]
    fn key_prefers_first_field() {
        assert_eq!(record_key(&row(&["SKU-1", "Lamp"]), KeyStrategy::Content), "SKU-1");
    }

    #[test]
    fn key_falls_back_to_joined_fields() {
        assert_eq!(record_key(&row(&["", "Lamp", "4"]), KeyStrategy::Content), "|Lamp|4");
    }

    #[test]
    fn key_falls_back_to_raw_text() {
        let r = Row {
            fields: vec![String::new()],
            raw: Some("  loose text ".into()),
            identity: None,
        };
        assert_eq!(record_key(&r, KeyStrategy::Content), "loose text");
    }

    #[test]
    fn key_is_stable_under_whitespace() {
        let a = record_key(&row(&["", " Lamp ", "4"]), KeyStrategy::Content);
        let b = record_key(&row(&["", "Lamp", "4 "]), KeyStrategy::Content);
        assert_eq!(a, b);
        assert_eq!(a, record_key(&row(&["", " Lamp ", "4"]), KeyStrategy::Content));
    }

    #[test]
    fn identity_strategy_keeps_same_text_rows_apart() {
        let mut a = row(&["Lamp"]);
        a.identity = Some("1".into());
        let mut b = row(&["Lamp"]);
        b.identity = Some("2".into());

        let mut content = Ledger::new(KeyStrategy::Content);
        assert_eq!(content.merge(vec![a.clone(), b.clone()]), 1);

        let mut by_id = Ledger::new(KeyStrategy::PreferIdentity);
        assert_eq!(by_id.merge(vec![a, b]), 2);
    }

    #[test]
    fn merge_is_idempotent() {
        let rows = vec![row(&["1", "a"]), row(&["2", "b"]), row(&["3", "c"])];
        let mut ledger = Ledger::new(KeyStrategy::Content);
        assert_eq!(ledger.merge(rows.clone()), 3);
        assert_eq!(ledger.merge(rows), 0);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn merge_preserves_first_seen_order() {
        let mut ledger = Ledger::new(KeyStrategy::Content);
        ledger.merge(vec![row(&["b"]), row(&["a"])]);
        ledger.merge(vec![row(&["a"]), row(&["c"]), row(&["b"])]);
        let order: Vec<_> = ledger.rows().map(|r| r.fields[0].as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicates_inside_one_batch_count_once() {
        let mut ledger = Ledger::new(KeyStrategy::Content);
        assert_eq!(ledger.merge(vec![row(&["x", "1"]), row(&["x", "1"])]), 1);
    }
}
