//! Error types for reading a stage.

use strata_render::RenderError;
use strata_scene::StageError;
use thiserror::Error;

use crate::phase::ReadStep;

/// Errors that can occur while translating a stage.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to open stage: {0}")]
    Stage(#[from] StageError),

    #[error("Object path {0} is not valid")]
    InvalidRootPath(String),

    #[error("Object path primitive {0} is not active")]
    InactiveRootPath(String),

    #[error("{path}: invalid {attribute} value '{value}'")]
    InvalidValue {
        path: String,
        attribute: String,
        value: String,
    },

    #[error("Renderer error: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to start reader threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Read step cannot go from {from:?} to {to:?}")]
    StepOrder { from: ReadStep, to: ReadStep },
}

/// Result type for read operations.
pub type ReadResult<T> = Result<T, ReadError>;
