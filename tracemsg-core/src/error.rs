use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Storage error: {0}")]
    Storage(#[from] mongodb::error::Error),

    #[error("Store did not return an ObjectId for the inserted document")]
    MissingId,

    #[error("Invalid timestamp for '{field}': {value:?} (expected ISO-8601 with offset, e.g. 2024-01-01T10:00:00+00:00)")]
    InvalidTimestamp { field: String, value: String },

    #[error("Invalid range: from ({from}) is after to ({to})")]
    InvalidRange { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown store backend: {0}")]
    UnknownBackend(String),
}

impl TraceError {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TraceError::InvalidTimestamp { .. } | TraceError::InvalidRange { .. }
        )
    }
}
