pub mod core;
pub mod harvest;
pub mod scraping;

// --- Primary core exports ---
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::{HarvestConfig, HarvestSettings, KeyStrategy, SurfaceError, SurfaceResult};

pub use harvest::{Harvester, JsonFileSink, ResultSink};
pub use scraping::{ChromiumSurface, RenderSurface, SnapshotSurface};
