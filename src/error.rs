//! Error type shared by every stage of the sync pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A remote collaborator could not deliver a resource.
    #[error("Failed to fetch {resource}: {message}")]
    Fetch { resource: String, message: String },

    #[error("Point cloud decode error: {0}")]
    Decode(String),

    #[error("Bitmap error: {0}")]
    Bitmap(String),

    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Both `name` and `name_3d` exist with a geometry other than point cloud.
    #[error("Class '{name}' collides with an existing class of geometry '{existing}'")]
    ClassCollision { name: String, existing: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn fetch(resource: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Fetch {
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}
