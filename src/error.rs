use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A remote fetch (task page, event history, label list) failed after
    /// retries. Transport and authorization failures both land here; nothing
    /// past the fetch boundary distinguishes them.
    #[error("remote fetch failed: {0}")]
    Fetch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("export error: {0}")]
    Export(String),

    /// The run was cancelled before completing. Not a failure: callers that
    /// requested a partial report on cancellation never see this variant.
    #[error("run cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Export(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
