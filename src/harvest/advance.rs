//! Advance Driver: one "reveal more" action per call.
//!
//! Scrolling tries each scope in `scopes` order and uses the first scroller
//! that exists: ancestor, then descendant, then the document. After the
//! offset move, input-device gestures are fired too, since some virtual
//! lists only react to trusted wheel/scroll events.

use crate::core::types::{AdvanceReport, ClickOutcome, ContainerRef, ScrollGeometry, ScrollScope};
use crate::scraping::RenderSurface;
use tracing::{debug, info};

pub const DEFAULT_NEXT_PAGE_SELECTORS: &[&str] = &[
    "button[aria-label=\"Next\"]",
    "button[aria-label=\"next\"]",
    "[aria-label=\"Next page\"]",
    ".pagination button:last-child",
    ".pager button:last-child",
    "button[class*='next']",
    "a[class*='next']",
    "a[rel=\"next\"]",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    Turned,
    /// A next control exists but is disabled: last page.
    Disabled,
    Absent,
}

#[derive(Debug, Clone)]
pub struct AdvanceDriver {
    scopes: Vec<ScrollScope>,
    next_page_selectors: Vec<String>,
    wheel_delta: f64,
}

impl Default for AdvanceDriver {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

impl AdvanceDriver {
    pub fn new(wheel_delta: f64) -> Self {
        Self {
            scopes: vec![ScrollScope::Ancestor, ScrollScope::Descendant, ScrollScope::Document],
            next_page_selectors: DEFAULT_NEXT_PAGE_SELECTORS.iter().map(|s| s.to_string()).collect(),
            wheel_delta,
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<ScrollScope>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_next_page_selectors(mut self, selectors: Vec<String>) -> Self {
        self.next_page_selectors = selectors;
        self
    }

    /// First scroller in cascade order, with its geometry.
    async fn locate(
        &self,
        surface: &dyn RenderSurface,
        container: &ContainerRef,
    ) -> Option<(ScrollScope, ScrollGeometry)> {
        for &scope in &self.scopes {
            match surface.scroll_geometry(container, scope).await {
                Ok(Some(geom)) => return Some((scope, geom)),
                Ok(None) => continue,
                Err(e) => debug!("scroll geometry ({:?}) unavailable: {}", scope, e),
            }
        }
        None
    }

    /// Report where the surface stands without moving it.
    pub async fn position(&self, surface: &dyn RenderSurface, container: &ContainerRef) -> AdvanceReport {
        match self.locate(surface, container).await {
            Some((scope, geom)) => AdvanceReport {
                changed: false,
                at_ceiling: geom.at_ceiling(),
                scrollable: geom.has_extent(),
                scope: Some(scope),
            },
            None => AdvanceReport::unknown(),
        }
    }

    /// Scroll forward by one viewport, capped at the maximum offset, then
    /// fire the redundant gestures. With `escalate`, also send End/PageDown
    /// key presses.
    pub async fn advance(
        &self,
        surface: &dyn RenderSurface,
        container: &ContainerRef,
        escalate: bool,
    ) -> AdvanceReport {
        let report = match self.locate(surface, container).await {
            Some((scope, geom)) => {
                let target = geom.next_offset();
                match surface.set_scroll_offset(container, scope, target).await {
                    Ok(now) => AdvanceReport {
                        changed: now > geom.offset + 0.5,
                        at_ceiling: now >= geom.max_offset - 1.0,
                        scrollable: geom.has_extent(),
                        scope: Some(scope),
                    },
                    Err(e) => {
                        debug!("scroll ({:?}) failed: {}", scope, e);
                        AdvanceReport::unknown()
                    }
                }
            }
            None => AdvanceReport::unknown(),
        };

        if let Err(e) = surface.scroll_last_row_into_view(container).await {
            debug!("scroll-into-view gesture failed: {}", e);
        }
        if let Err(e) = surface.wheel_over(container, self.wheel_delta).await {
            debug!("wheel gesture failed: {}", e);
        }

        if escalate {
            info!("⏬ No progress for a while, escalating with End/PageDown");
            for key in ["End", "PageDown"] {
                if let Err(e) = surface.press_key(key).await {
                    debug!("key '{}' failed: {}", key, e);
                }
            }
        }

        report
    }

    /// Whether the surface could still scroll further.
    pub async fn can_advance(&self, surface: &dyn RenderSurface, container: &ContainerRef) -> bool {
        let here = self.position(surface, container).await;
        here.scrollable && !here.at_ceiling
    }

    /// Click the first visible "next page" control. Stops at the first
    /// disabled control found.
    pub async fn next_page(&self, surface: &dyn RenderSurface) -> PageTurn {
        for sel in &self.next_page_selectors {
            match surface.click_if_enabled(sel).await {
                Ok(ClickOutcome::Clicked) => {
                    info!("➡️ Clicked pagination control: {}", sel);
                    return PageTurn::Turned;
                }
                Ok(ClickOutcome::Disabled) => {
                    info!("Pagination control {} is disabled", sel);
                    return PageTurn::Disabled;
                }
                Ok(ClickOutcome::Missing) => continue,
                Err(e) => debug!("pagination selector {} failed: {}", sel, e),
            }
        }
        PageTurn::Absent
    }
}
