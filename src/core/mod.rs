pub mod config;
pub mod error;
pub mod types;

pub use config::{HarvestConfig, HarvestSettings, KeyStrategy};
pub use error::{SurfaceError, SurfaceResult};
