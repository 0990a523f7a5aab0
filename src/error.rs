use std::fmt;

/// Failure reported by a weather store backend
#[derive(Debug)]
pub enum StoreError {
    Database(tokio_postgres::Error),
    Connection(String),
    Tls(String),
    Decode(String),
    /// A value could not be turned into a query parameter
    Encode(String),
    BatchTooLarge { len: usize, max: usize },
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Connection(msg) => write!(f, "connection error: {}", msg),
            StoreError::Tls(msg) => write!(f, "TLS setup error: {}", msg),
            StoreError::Decode(msg) => write!(f, "decode error: {}", msg),
            StoreError::Encode(msg) => write!(f, "encode error: {}", msg),
            StoreError::BatchTooLarge { len, max } => {
                write!(f, "batch delete of {} keys exceeds limit of {}", len, max)
            }
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Failure of a compaction pass
#[derive(Debug)]
pub enum CompactionError {
    /// Aggregation was asked to reduce zero samples
    EmptyInput(&'static str),
    Store(StoreError),
    /// Key pagination for a device did not finish within the configured page cap
    ContinuationExhausted { device_id: String, pages: usize },
}

impl fmt::Display for CompactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompactionError::EmptyInput(what) => write!(f, "cannot build {} from empty input", what),
            CompactionError::Store(e) => write!(f, "store error: {}", e),
            CompactionError::ContinuationExhausted { device_id, pages } => write!(
                f,
                "key pagination for device {} still had more pages after {} pages",
                device_id, pages
            ),
        }
    }
}

impl std::error::Error for CompactionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompactionError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CompactionError {
    fn from(err: StoreError) -> Self {
        CompactionError::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, CompactionError>;
