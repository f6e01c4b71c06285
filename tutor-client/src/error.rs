use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request rejected with status {status}")]
    Status { status: u16 },

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: missing {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Server(String),
}

impl BackendError {
    /// True when the server processed the request and reported a failure.
    ///
    /// Everything else (transport errors, non-2xx statuses, unparsable
    /// bodies) is a generic failure.
    pub fn is_server(&self) -> bool {
        matches!(self, BackendError::Server(_))
    }
}
