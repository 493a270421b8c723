use thiserror::Error;

/// Main error type for tidecache operations
///
/// Cache misses and capacity overflow are never reported here; only
/// structurally invalid persisted state and medium failures surface.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid persisted key: {0}")]
    InvalidKey(String),

    #[error("Persistence medium error: {0}")]
    Medium(String),

    #[error("Unknown storage: {0}")]
    UnknownStorage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Deferred task not scheduled: {0}")]
    Unscheduled(String),
}

impl CacheError {
    /// Wrap an arbitrary medium failure
    pub fn medium(err: impl std::fmt::Display) -> Self {
        Self::Medium(err.to_string())
    }

    /// True when the error came from parsing persisted state
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::InvalidKey(_))
    }
}

/// Result type alias for tidecache operations
pub type Result<T> = std::result::Result<T, CacheError>;
