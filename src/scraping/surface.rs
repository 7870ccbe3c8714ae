//! The capability set the harvester needs from whatever is rendering the page.
//!
//! The live document is global mutable state; it is only ever reached through
//! a `&dyn RenderSurface` passed into each call, so tests can swap in a
//! scripted or snapshot-backed surface.

use crate::core::error::SurfaceResult;
use crate::core::types::{ClickOutcome, ContainerRef, RawRow, ScrollGeometry, ScrollScope};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Rows currently rendered and visible inside the container, in DOM order.
    async fn find_visible_rows(&self, container: &ContainerRef) -> SurfaceResult<Vec<RawRow>>;

    /// Column header labels, or an empty list when the table has none.
    async fn column_headers(&self, container: &ContainerRef) -> SurfaceResult<Vec<String>>;

    /// Geometry of the scroller for `scope`. `None` when no element of that
    /// kind exists (the document scope always exists).
    async fn scroll_geometry(
        &self,
        container: &ContainerRef,
        scope: ScrollScope,
    ) -> SurfaceResult<Option<ScrollGeometry>>;

    /// Assign a scroll offset; returns the offset the scroller actually took.
    async fn set_scroll_offset(
        &self,
        container: &ContainerRef,
        scope: ScrollScope,
        offset: f64,
    ) -> SurfaceResult<f64>;

    /// Visible text of the whole page.
    async fn page_text(&self) -> SurfaceResult<String>;

    /// Activate the first element matching `selector` if it is visible and enabled.
    async fn click_if_enabled(&self, selector: &str) -> SurfaceResult<ClickOutcome>;

    /// `true` once `selector` matches something, `false` after `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> SurfaceResult<bool>;

    async fn wait_millis(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Class names of the container and its ancestors, nearest first.
    async fn container_classes(&self, _container: &ContainerRef) -> SurfaceResult<Vec<String>> {
        Ok(Vec::new())
    }

    // Input-device gestures. Surfaces without real input leave these as no-ops.

    async fn scroll_last_row_into_view(&self, _container: &ContainerRef) -> SurfaceResult<()> {
        Ok(())
    }

    async fn wheel_over(&self, _container: &ContainerRef, _delta_y: f64) -> SurfaceResult<()> {
        Ok(())
    }

    async fn press_key(&self, _key: &str) -> SurfaceResult<()> {
        Ok(())
    }

    /// Whether a loading indicator (spinner, "Loading…", `aria-busy`) is visible.
    async fn loading_visible(&self) -> SurfaceResult<bool> {
        Ok(false)
    }
}
