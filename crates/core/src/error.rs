//! Scene construction and lifecycle errors

use bigview_scheduler::WorkerError;

/// Errors surfaced by [`Scene`](crate::Scene)
///
/// Region load failures never appear here; the viewer falls back to the
/// sample instead.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The source image could not be decoded
    #[error("failed to decode scene image: {0}")]
    Image(#[from] image::ImageError),

    /// The refill worker could not be started or stopped cleanly
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// The source image has zero width or height
    #[error("scene image has no pixels")]
    EmptyImage,
}

pub type SceneResult<T> = Result<T, SceneError>;
