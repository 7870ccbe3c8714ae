//! Row Extractor: turns whatever the surface reports into trimmed, non-empty rows.

use crate::core::types::{ContainerRef, RawRow, Row};
use crate::harvest::ledger::Ledger;
use crate::scraping::RenderSurface;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

static MULTI_SPACE: OnceLock<Regex> = OnceLock::new();

fn multi_space() -> &'static Regex {
    MULTI_SPACE.get_or_init(|| Regex::new(r"[ \u{a0}]{2,}").expect("valid multi-space regex"))
}

/// Normalize one raw row. Returns `None` for rows whose text is empty.
///
/// Cell boundaries come from the renderer when it has them. Otherwise the
/// text is split on tabs, then on runs of two or more spaces, and finally
/// kept whole as a single field.
pub fn normalize_row(raw: RawRow) -> Option<Row> {
    let text = raw.text.trim();
    let cells: Vec<String> = raw.cells.iter().map(|c| c.trim().to_string()).collect();

    if text.is_empty() && cells.iter().all(|c| c.is_empty()) {
        return None;
    }

    let identity = raw
        .identity
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    if !cells.is_empty() && cells.iter().any(|c| !c.is_empty()) {
        return Some(Row {
            fields: cells,
            raw: None,
            identity,
        });
    }

    Some(Row {
        fields: split_text(text),
        raw: Some(text.to_string()),
        identity,
    })
}

fn split_text(text: &str) -> Vec<String> {
    if text.contains('\t') {
        let parts: Vec<String> = text
            .split('\t')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if !parts.is_empty() {
            return parts;
        }
    }

    let parts: Vec<String> = multi_space()
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();
    if parts.len() > 1 {
        return parts;
    }

    vec![text.to_string()]
}

#[derive(Debug, Clone, Default)]
pub struct RowExtractor;

impl RowExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Every visible row in the container, normalized, in DOM order.
    ///
    /// A stale container or a failed evaluation yields an empty list; the
    /// harvest loop treats that as "nothing new this round".
    pub async fn visible_rows(&self, surface: &dyn RenderSurface, container: &ContainerRef) -> Vec<Row> {
        match surface.find_visible_rows(container).await {
            Ok(raw) => raw.into_iter().filter_map(normalize_row).collect(),
            Err(e) => {
                debug!("row extraction on '{}' failed (treated as empty): {}", container, e);
                Vec::new()
            }
        }
    }

    /// Visible rows whose key is not already in `seen`.
    pub async fn extract(
        &self,
        surface: &dyn RenderSurface,
        container: &ContainerRef,
        seen: &Ledger,
    ) -> Vec<Row> {
        self.visible_rows(surface, container)
            .await
            .into_iter()
            .filter(|row| !seen.contains(row))
            .collect()
    }
}
