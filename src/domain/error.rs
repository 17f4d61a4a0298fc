use thiserror::Error;

/// Boxed error produced by port implementations (storage, coordinator).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction-time configuration.
    #[error("configuration: {0}")]
    Config(String),

    /// The external probe tool failed or produced unparseable output.
    #[error("probe: {0}")]
    Probe(String),

    /// An underlying storage operation failed.
    #[error("storage: {source}")]
    Storage {
        #[source]
        source: BoxError,
    },

    /// A coordinator operation (enqueue, subscribe, notify, wait) failed.
    #[error("coordinator: {source}")]
    Coordinator {
        #[source]
        source: BoxError,
    },

    /// The requested rendition does not exist for this source.
    #[error("rendition {name:?} not found")]
    Rendition { name: String },

    /// The external encoder exited non-zero or its output could not be
    /// consumed.
    #[error("encoder: {0}")]
    Encoder(String),

    /// A producer reported failure for a segment this caller was waiting on.
    #[error("segment {index} failed: {reason}")]
    Segment { index: usize, reason: String },

    /// The segment was not ready before the configured timeout.
    #[error("timed out waiting for segment {index}")]
    Timeout { index: usize },

    /// The controller was stopped while the call was in flight.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn storage(source: BoxError) -> Self {
        Error::Storage { source }
    }

    pub(crate) fn coordinator(source: BoxError) -> Self {
        Error::Coordinator { source }
    }
}
