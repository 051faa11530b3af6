use thiserror::Error;

/// エラー型
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No authentication tokens found")]
    MissingTokens,

    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),
}

/// Outcome shared by every caller waiting on the same refresh, hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token stored")]
    MissingRefreshToken,

    #[error("No access token received")]
    MissingAccessToken,

    #[error("Refresh rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Refresh was aborted before it settled")]
    Aborted,
}

impl From<reqwest::Error> for RefreshError {
    fn from(err: reqwest::Error) -> Self {
        RefreshError::Transport(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage quota exceeded ({limit} bytes)")]
    QuotaExceeded { limit: usize },
}
