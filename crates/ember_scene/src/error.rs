//! # Scene Error Types
//!
//! All errors that can occur in the scene layer.

use ember_core::EcsError;
use thiserror::Error;

/// Errors that can occur in the scene layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// An ECS operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// Invalid configuration file.
    #[error("invalid scene configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;
