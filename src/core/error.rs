use thiserror::Error;

/// Failures reported by a [`crate::scraping::RenderSurface`].
///
/// Every variant is transient from the harvester's point of view: a failed
/// read counts as "zero rows seen" and a failed advance as "did not move".
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("container handle is detached from the render tree: {0}")]
    Detached(String),

    #[error("in-page evaluation failed: {0}")]
    Evaluation(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("operation not supported by this surface: {0}")]
    Unsupported(&'static str),
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;
