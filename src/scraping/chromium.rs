//! `RenderSurface` over a live chromiumoxide `Page`.
//!
//! DOM reads go through `page.evaluate` with small self-contained scripts;
//! selectors are embedded as JSON string literals. Wheel and key gestures are
//! dispatched as CDP input events so they arrive as trusted events.

use crate::core::error::{SurfaceError, SurfaceResult};
use crate::core::types::{ClickOutcome, ContainerRef, RawRow, ScrollGeometry, ScrollScope};
use crate::scraping::surface::RenderSurface;
use crate::scraping::{CELL_SELECTOR, HEADER_SELECTOR, IDENTITY_ATTRIBUTES, ROW_SELECTORS};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Upper bound for a single in-page evaluation.
const EVALUATE_TIMEOUT: Duration = Duration::from_secs(10);
const LOADING_SELECTORS: &[&str] = &[
    ".loading",
    ".spinner",
    "[class*=\"loading\"]",
    "[class*=\"spinner\"]",
    "[aria-busy=\"true\"]",
    "[aria-label*=\"loading\" i]",
];

/// Shared visibility predicate, injected into scripts that need it.
const VISIBLE_FN: &str = r#"const visible = (el) => {
  if (!el || !el.isConnected) return false;
  const s = getComputedStyle(el);
  if (s.display === 'none' || s.visibility === 'hidden' || s.visibility === 'collapse') return false;
  const r = el.getBoundingClientRect();
  return r.width > 0 && r.height > 0;
};"#;

/// JSON-encode a value for embedding into a script.
fn js<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn scope_name(scope: ScrollScope) -> &'static str {
    match scope {
        ScrollScope::Ancestor => "ancestor",
        ScrollScope::Descendant => "descendant",
        ScrollScope::Document => "document",
    }
}

/// Script prelude that binds `el` to the scroller for `scope`, or returns
/// early with `{ detached: true }` / `{ found: false }`.
fn locate_scroller(container: &ContainerRef, scope: ScrollScope) -> String {
    format!(
        r#"const root = document.querySelector({sel});
const scope = {scope};
const scrollable = (n) => {{
  const oy = getComputedStyle(n).overflowY;
  return (oy === 'auto' || oy === 'scroll' || oy === 'overlay') && n.scrollHeight > n.clientHeight + 1;
}};
let el = null;
if (scope === 'document') {{
  el = document.scrollingElement || document.documentElement;
}} else {{
  if (!root) return {{ detached: true }};
  if (scope === 'ancestor') {{
    for (let n = root; n && n !== document.body && n !== document.documentElement; n = n.parentElement) {{
      if (scrollable(n)) {{ el = n; break; }}
    }}
  }} else {{
    for (const d of root.querySelectorAll('*')) {{
      if (scrollable(d)) {{ el = d; break; }}
    }}
  }}
}}
if (!el) return {{ found: false }};"#,
        sel = js(&container.selector),
        scope = js(scope_name(scope)),
    )
}

#[derive(Debug, Deserialize)]
struct GeometryReply {
    #[serde(default)]
    detached: bool,
    #[serde(default)]
    found: bool,
    #[serde(default)]
    offset: f64,
    #[serde(default)]
    viewport: f64,
    #[serde(default)]
    max: f64,
}

#[derive(Debug, Deserialize)]
struct RowReply {
    text: String,
    cells: Vec<String>,
    identity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChromiumSurface {
    page: Page,
}

impl ChromiumSurface {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Evaluate `script` and return its JSON result (`null` for `undefined`).
    pub async fn evaluate(&self, script: &str) -> SurfaceResult<Value> {
        let result = tokio::time::timeout(EVALUATE_TIMEOUT, self.page.evaluate(script))
            .await
            .map_err(|_| SurfaceError::Timeout(EVALUATE_TIMEOUT.as_millis() as u64))?
            .map_err(|e| SurfaceError::Evaluation(e.to_string()))?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn evaluate_as<T: DeserializeOwned>(&self, script: &str) -> SurfaceResult<T> {
        let value = self.evaluate(script).await?;
        serde_json::from_value(value).map_err(|e| SurfaceError::Evaluation(e.to_string()))
    }

    async fn mouse_wheel(&self, x: f64, y: f64, delta_y: f64) -> SurfaceResult<()> {
        let moved = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(SurfaceError::Protocol)?;
        self.page
            .execute(moved)
            .await
            .map_err(|e| SurfaceError::Protocol(e.to_string()))?;

        let wheel = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(x)
            .y(y)
            .delta_x(0.0)
            .delta_y(delta_y)
            .build()
            .map_err(SurfaceError::Protocol)?;
        self.page
            .execute(wheel)
            .await
            .map_err(|e| SurfaceError::Protocol(e.to_string()))?;
        Ok(())
    }
}

/// Windows virtual key codes for the navigation keys we send.
fn key_code(key: &str) -> Option<i64> {
    match key {
        "PageUp" => Some(33),
        "PageDown" => Some(34),
        "End" => Some(35),
        "Home" => Some(36),
        "ArrowDown" => Some(40),
        _ => None,
    }
}

#[async_trait]
impl RenderSurface for ChromiumSurface {
    async fn find_visible_rows(&self, container: &ContainerRef) -> SurfaceResult<Vec<RawRow>> {
        let script = format!(
            r#"(() => {{
{visible}
const root = document.querySelector({sel});
if (!root) return null;
const cellSel = {cells};
const idAttrs = {ids};
for (const rowSel of {rows}) {{
  const found = Array.from(root.querySelectorAll(rowSel));
  if (!found.length) continue;
  return found
    .filter(r => !r.closest('thead'))
    .filter(visible)
    .map(r => {{
      const cellEls = Array.from(r.querySelectorAll(cellSel));
      const headerOnly = cellEls.length > 0 && cellEls.every(c => c.tagName === 'TH' || c.getAttribute('role') === 'columnheader');
      if (headerOnly) return null;
      let identity = null;
      for (const a of idAttrs) {{
        const v = r.getAttribute(a);
        if (v !== null && v !== '') {{ identity = v; break; }}
      }}
      return {{
        text: r.innerText || r.textContent || '',
        cells: cellEls.map(c => (c.innerText || c.textContent || '')),
        identity,
      }};
    }})
    .filter(r => r !== null);
}}
return [];
}})()"#,
            visible = VISIBLE_FN,
            sel = js(&container.selector),
            cells = js(CELL_SELECTOR),
            ids = js(IDENTITY_ATTRIBUTES),
            rows = js(ROW_SELECTORS),
        );

        let reply: Option<Vec<RowReply>> = self.evaluate_as(&script).await?;
        let rows = reply.ok_or_else(|| SurfaceError::Detached(container.selector.clone()))?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let mut raw = RawRow::from_cells(r.cells);
                if raw.cells.is_empty() {
                    raw.text = r.text;
                }
                match r.identity {
                    Some(id) => raw.with_identity(id),
                    None => raw,
                }
            })
            .collect())
    }

    async fn column_headers(&self, container: &ContainerRef) -> SurfaceResult<Vec<String>> {
        let script = format!(
            r#"(() => {{
const root = document.querySelector({sel});
if (!root) return null;
let heads = Array.from(root.querySelectorAll({heads}));
if (!heads.length) {{
  const first = root.querySelector('tr');
  if (first) heads = Array.from(first.querySelectorAll(':scope > th'));
}}
return heads.map(h => (h.innerText || h.textContent || '').trim());
}})()"#,
            sel = js(&container.selector),
            heads = js(HEADER_SELECTOR),
        );
        let reply: Option<Vec<String>> = self.evaluate_as(&script).await?;
        reply.ok_or_else(|| SurfaceError::Detached(container.selector.clone()))
    }

    async fn scroll_geometry(
        &self,
        container: &ContainerRef,
        scope: ScrollScope,
    ) -> SurfaceResult<Option<ScrollGeometry>> {
        let script = format!(
            r#"(() => {{
{locate}
return {{ found: true, offset: el.scrollTop, viewport: el.clientHeight, max: Math.max(0, el.scrollHeight - el.clientHeight) }};
}})()"#,
            locate = locate_scroller(container, scope),
        );
        let reply: GeometryReply = self.evaluate_as(&script).await?;
        if reply.detached {
            return Err(SurfaceError::Detached(container.selector.clone()));
        }
        if !reply.found {
            return Ok(None);
        }
        Ok(Some(ScrollGeometry {
            offset: reply.offset,
            viewport: reply.viewport,
            max_offset: reply.max,
        }))
    }

    async fn set_scroll_offset(
        &self,
        container: &ContainerRef,
        scope: ScrollScope,
        offset: f64,
    ) -> SurfaceResult<f64> {
        let script = format!(
            r#"(() => {{
{locate}
el.scrollTop = {offset};
el.dispatchEvent(new Event('scroll', {{ bubbles: true }}));
return {{ found: true, offset: el.scrollTop }};
}})()"#,
            locate = locate_scroller(container, scope),
            offset = offset,
        );
        let reply: GeometryReply = self.evaluate_as(&script).await?;
        if reply.detached {
            return Err(SurfaceError::Detached(container.selector.clone()));
        }
        if !reply.found {
            return Err(SurfaceError::Unsupported("no scroller for scope"));
        }
        Ok(reply.offset)
    }

    async fn page_text(&self) -> SurfaceResult<String> {
        let value = self
            .evaluate("(() => document.body ? document.body.innerText : '')()")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click_if_enabled(&self, selector: &str) -> SurfaceResult<ClickOutcome> {
        let script = format!(
            r#"(() => {{
{visible}
const el = document.querySelector({sel});
if (!el || !visible(el)) return 'missing';
if (el.disabled || el.getAttribute('aria-disabled') === 'true' || el.classList.contains('disabled')) return 'disabled';
el.click();
return 'clicked';
}})()"#,
            visible = VISIBLE_FN,
            sel = js(selector),
        );
        let value = self.evaluate(&script).await?;
        Ok(match value.as_str() {
            Some("clicked") => ClickOutcome::Clicked,
            Some("disabled") => ClickOutcome::Disabled,
            _ => ClickOutcome::Missing,
        })
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> SurfaceResult<bool> {
        let script = format!("(() => document.querySelector({}) !== null)()", js(selector));
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.evaluate(&script).await?.as_bool().unwrap_or(false) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn container_classes(&self, container: &ContainerRef) -> SurfaceResult<Vec<String>> {
        let script = format!(
            r#"(() => {{
const out = [];
for (let n = document.querySelector({sel}); n && n !== document.documentElement; n = n.parentElement) {{
  if (typeof n.className === 'string' && n.className) out.push(n.className);
}}
return out;
}})()"#,
            sel = js(&container.selector),
        );
        self.evaluate_as(&script).await
    }

    async fn scroll_last_row_into_view(&self, container: &ContainerRef) -> SurfaceResult<()> {
        let script = format!(
            r#"(() => {{
const root = document.querySelector({sel});
if (!root) return false;
const rows = root.querySelectorAll('tr, [role="row"], .ag-row');
if (!rows.length) return false;
rows[rows.length - 1].scrollIntoView({{ block: 'end' }});
return true;
}})()"#,
            sel = js(&container.selector),
        );
        self.evaluate(&script).await.map(|_| ())
    }

    async fn wheel_over(&self, container: &ContainerRef, delta_y: f64) -> SurfaceResult<()> {
        let script = format!(
            r#"(() => {{
const root = document.querySelector({sel});
if (!root) return null;
const r = root.getBoundingClientRect();
const x = Math.min(Math.max(r.left + r.width / 2, 1), window.innerWidth - 1);
const y = Math.min(Math.max(r.top + r.height / 2, 1), window.innerHeight - 1);
return [x, y];
}})()"#,
            sel = js(&container.selector),
        );
        let point: Option<(f64, f64)> = self.evaluate_as(&script).await?;
        let (x, y) = point.ok_or_else(|| SurfaceError::Detached(container.selector.clone()))?;
        self.mouse_wheel(x, y, delta_y).await
    }

    async fn press_key(&self, key: &str) -> SurfaceResult<()> {
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key.to_string())
                .code(key.to_string());
            if let Some(code) = key_code(key) {
                builder = builder
                    .windows_virtual_key_code(code)
                    .native_virtual_key_code(code);
            }
            let params = builder.build().map_err(SurfaceError::Protocol)?;
            self.page
                .execute(params)
                .await
                .map_err(|e| SurfaceError::Protocol(e.to_string()))?;
        }
        debug!("pressed {}", key);
        Ok(())
    }

    async fn loading_visible(&self) -> SurfaceResult<bool> {
        let script = format!(
            r#"(() => {{
{visible}
for (const sel of {sels}) {{
  let nodes;
  try {{ nodes = document.querySelectorAll(sel); }} catch (_) {{ continue; }}
  for (const n of nodes) if (visible(n)) return true;
}}
return false;
}})()"#,
            visible = VISIBLE_FN,
            sels = js(LOADING_SELECTORS),
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_embedded_as_string_literals() {
        let script = locate_scroller(&ContainerRef::new("div[data-x=\"a'b\"]"), ScrollScope::Ancestor);
        assert!(script.contains(r#"document.querySelector("div[data-x=\"a'b\"]")"#));
        assert!(script.contains(r#"const scope = "ancestor";"#));
    }

    #[test]
    fn navigation_keys_have_virtual_codes() {
        assert_eq!(key_code("End"), Some(35));
        assert_eq!(key_code("PageDown"), Some(34));
        assert_eq!(key_code("Enter"), None);
    }
}
