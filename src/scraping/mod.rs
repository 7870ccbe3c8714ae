pub mod browser_manager;
pub mod chromium;
pub mod snapshot;
pub mod surface;
pub mod virtualization;

pub use chromium::ChromiumSurface;
pub use snapshot::SnapshotSurface;
pub use surface::RenderSurface;

/// Row selector cascade; the first selector that matches anything wins.
pub const ROW_SELECTORS: &[&str] = &["tbody tr", "tr", ".ag-row", "[role=\"row\"]"];
pub const CELL_SELECTOR: &str = "td, th, [role=\"cell\"], [role=\"gridcell\"], .ag-cell";
pub const HEADER_SELECTOR: &str = "thead th, [role=\"columnheader\"]";
/// Attributes renderers use for a stable per-row id, in preference order.
pub const IDENTITY_ATTRIBUTES: &[&str] = &["aria-rowindex", "data-row-id", "data-id", "row-index", "row-id"];
