//! Offline `RenderSurface` over captured HTML.
//!
//! A snapshot is a sequence of "windows": the DOM of a virtualized table as
//! it looked at successive scroll positions. Scrolling the document by one
//! viewport moves to the next window, so a recorded run can be replayed
//! through the real harvest loop without a browser.

use crate::core::error::{SurfaceError, SurfaceResult};
use crate::core::types::{ClickOutcome, ContainerRef, RawRow, ScrollGeometry, ScrollScope};
use crate::scraping::surface::RenderSurface;
use crate::scraping::{CELL_SELECTOR, HEADER_SELECTOR, IDENTITY_ATTRIBUTES, ROW_SELECTORS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_VIEWPORT: f64 = 600.0;

fn selector(css: &str) -> SurfaceResult<Selector> {
    Selector::parse(css).map_err(|e| SurfaceError::Evaluation(format!("bad selector '{}': {}", css, e)))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

fn is_hidden(el: ElementRef<'_>) -> bool {
    let v = el.value();
    if v.attr("hidden").is_some() || v.attr("aria-hidden") == Some("true") {
        return true;
    }
    let style: String = v
        .attr("style")
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    style.contains("display:none") || style.contains("visibility:hidden")
}

fn hidden_or_in_hidden(el: ElementRef<'_>) -> bool {
    is_hidden(el) || el.ancestors().filter_map(ElementRef::wrap).any(is_hidden)
}

fn in_thead(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "thead")
}

fn rows_in(doc: &Html, container: &ContainerRef) -> SurfaceResult<Vec<RawRow>> {
    let root_sel = selector(&container.selector)?;
    let root = doc
        .select(&root_sel)
        .next()
        .ok_or_else(|| SurfaceError::Detached(container.selector.clone()))?;
    let cell_sel = selector(CELL_SELECTOR)?;

    for css in ROW_SELECTORS {
        let row_sel = selector(css)?;
        let found: Vec<ElementRef<'_>> = root.select(&row_sel).collect();
        if found.is_empty() {
            continue;
        }
        let rows = found
            .into_iter()
            .filter(|r| !in_thead(*r) && !hidden_or_in_hidden(*r))
            .filter_map(|r| {
                let cells: Vec<ElementRef<'_>> = r.select(&cell_sel).collect();
                let header_only = !cells.is_empty()
                    && cells.iter().all(|c| {
                        c.value().name() == "th" || c.value().attr("role") == Some("columnheader")
                    });
                if header_only {
                    return None;
                }
                let mut raw = if cells.is_empty() {
                    RawRow {
                        text: text_of(r),
                        ..RawRow::default()
                    }
                } else {
                    RawRow::from_cells(cells.into_iter().map(text_of))
                };
                if let Some(id) = IDENTITY_ATTRIBUTES
                    .iter()
                    .find_map(|a| r.value().attr(a).filter(|v| !v.is_empty()))
                {
                    raw = raw.with_identity(id);
                }
                Some(raw)
            })
            .collect();
        return Ok(rows);
    }
    Ok(Vec::new())
}

fn headers_in(doc: &Html, container: &ContainerRef) -> SurfaceResult<Vec<String>> {
    let root_sel = selector(&container.selector)?;
    let root = doc
        .select(&root_sel)
        .next()
        .ok_or_else(|| SurfaceError::Detached(container.selector.clone()))?;
    let head_sel = selector(HEADER_SELECTOR)?;
    Ok(root
        .select(&head_sel)
        .map(|h| text_of(h).split_whitespace().collect::<Vec<_>>().join(" "))
        .collect())
}

fn classes_in(doc: &Html, container: &ContainerRef) -> SurfaceResult<Vec<String>> {
    let root_sel = selector(&container.selector)?;
    let Some(root) = doc.select(&root_sel).next() else {
        return Ok(Vec::new());
    };
    Ok(std::iter::once(root)
        .chain(root.ancestors().filter_map(ElementRef::wrap))
        .filter_map(|e| e.value().attr("class"))
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect())
}

/// Captured DOM windows replayed as a scrollable document.
#[derive(Debug)]
pub struct SnapshotSurface {
    windows: Vec<String>,
    viewport: f64,
    offset: Mutex<f64>,
}

impl SnapshotSurface {
    pub fn new(windows: Vec<String>) -> Self {
        Self {
            windows,
            viewport: DEFAULT_VIEWPORT,
            offset: Mutex::new(0.0),
        }
    }

    pub fn with_viewport(mut self, viewport: f64) -> Self {
        self.viewport = viewport.max(1.0);
        self
    }

    /// One window per file, in the order given.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let windows = paths
            .iter()
            .map(|p| {
                let p = p.as_ref();
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(windows))
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn max_offset(&self) -> f64 {
        self.windows.len().saturating_sub(1) as f64 * self.viewport
    }

    fn current_offset(&self) -> f64 {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_index(&self) -> usize {
        let idx = (self.current_offset() / self.viewport).round() as usize;
        idx.min(self.windows.len().saturating_sub(1))
    }

    /// Parse the current window and run `f` on it. `Html` is not `Send`, so it
    /// never outlives this call.
    fn with_window<T>(&self, f: impl FnOnce(&Html) -> T) -> T {
        let html = self
            .windows
            .get(self.current_index())
            .map(String::as_str)
            .unwrap_or_default();
        f(&Html::parse_document(html))
    }
}

#[async_trait]
impl RenderSurface for SnapshotSurface {
    async fn find_visible_rows(&self, container: &ContainerRef) -> SurfaceResult<Vec<RawRow>> {
        self.with_window(|doc| rows_in(doc, container))
    }

    async fn column_headers(&self, container: &ContainerRef) -> SurfaceResult<Vec<String>> {
        self.with_window(|doc| headers_in(doc, container))
    }

    async fn scroll_geometry(
        &self,
        _container: &ContainerRef,
        scope: ScrollScope,
    ) -> SurfaceResult<Option<ScrollGeometry>> {
        if scope != ScrollScope::Document {
            return Ok(None);
        }
        Ok(Some(ScrollGeometry {
            offset: self.current_offset(),
            viewport: self.viewport,
            max_offset: self.max_offset(),
        }))
    }

    async fn set_scroll_offset(
        &self,
        _container: &ContainerRef,
        scope: ScrollScope,
        offset: f64,
    ) -> SurfaceResult<f64> {
        if scope != ScrollScope::Document {
            return Err(SurfaceError::Unsupported("snapshots only scroll the document"));
        }
        let clamped = offset.clamp(0.0, self.max_offset());
        *self.offset.lock().unwrap_or_else(|e| e.into_inner()) = clamped;
        Ok(clamped)
    }

    async fn page_text(&self) -> SurfaceResult<String> {
        Ok(self.with_window(|doc| text_of(doc.root_element())))
    }

    async fn click_if_enabled(&self, _selector: &str) -> SurfaceResult<ClickOutcome> {
        Ok(ClickOutcome::Missing)
    }

    async fn wait_for_selector(&self, css: &str, _timeout: Duration) -> SurfaceResult<bool> {
        let sel = selector(css)?;
        Ok(self.with_window(|doc| doc.select(&sel).next().is_some()))
    }

    /// Nothing renders asynchronously in a snapshot.
    async fn wait_millis(&self, _ms: u64) {}

    async fn container_classes(&self, container: &ContainerRef) -> SurfaceResult<Vec<String>> {
        self.with_window(|doc| classes_in(doc, container))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(rows: &[(u32, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(id, name)| {
                format!(r#"<tr aria-rowindex="{id}"><td>{id}</td><td>{name}</td></tr>"#)
            })
            .collect();
        format!(
            r#"<html><body><div class="ag-grid"><table id="t">
<thead><tr><th>ID</th><th>Name</th></tr></thead>
<tbody>{body}<tr style="display: none"><td>99</td><td>ghost</td></tr></tbody>
</table></div><p>Showing 1-2 of 4</p></body></html>"#
        )
    }

    fn table() -> ContainerRef {
        ContainerRef::new("#t")
    }

    #[tokio::test]
    async fn reads_visible_body_rows_only() {
        let s = SnapshotSurface::new(vec![window(&[(1, "Ada"), (2, "Bob")])]);
        let rows = s.find_visible_rows(&table()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells, vec!["1", "Ada"]);
        assert_eq!(rows[1].identity.as_deref(), Some("2"));
        assert_eq!(s.column_headers(&table()).await.unwrap(), vec!["ID", "Name"]);
    }

    #[tokio::test]
    async fn one_viewport_of_scroll_shows_the_next_window() {
        let s = SnapshotSurface::new(vec![window(&[(1, "Ada")]), window(&[(2, "Bob")])]).with_viewport(400.0);
        let geom = s
            .scroll_geometry(&table(), ScrollScope::Document)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(geom.max_offset, 400.0);

        let now = s
            .set_scroll_offset(&table(), ScrollScope::Document, geom.next_offset())
            .await
            .unwrap();
        assert_eq!(now, 400.0);
        let rows = s.find_visible_rows(&table()).await.unwrap();
        assert_eq!(rows[0].cells[1], "Bob");
    }

    #[tokio::test]
    async fn single_window_has_no_extent() {
        let s = SnapshotSurface::new(vec![window(&[(1, "Ada")])]);
        let geom = s
            .scroll_geometry(&table(), ScrollScope::Document)
            .await
            .unwrap()
            .unwrap();
        assert!(!geom.has_extent());
        assert!(s
            .scroll_geometry(&table(), ScrollScope::Ancestor)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn missing_container_is_detached() {
        let s = SnapshotSurface::new(vec![window(&[(1, "Ada")])]);
        let err = s
            .find_visible_rows(&ContainerRef::new("#nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Detached(_)));
        assert!(!s
            .wait_for_selector("#nope", Duration::from_millis(10))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn page_text_and_classes() {
        let s = SnapshotSurface::new(vec![window(&[(1, "Ada")])]);
        assert!(s.page_text().await.unwrap().contains("Showing 1-2 of 4"));
        let classes = s.container_classes(&table()).await.unwrap();
        assert!(classes.iter().any(|c| c == "ag-grid"));
    }
}
