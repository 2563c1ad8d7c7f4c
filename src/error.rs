use thiserror::Error;

/// Failure while retrieving a question set.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to the trivia API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("trivia API answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("trivia API returned an unreadable question list: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("trivia API returned no questions")]
    Empty,
}

/// Failure of the key-value substrate itself.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("session database error: {0}")]
    Db(#[from] sled::Error),

    #[error("stored value is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("storage encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure while reading persisted quiz state.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A stored value exists but cannot be used.
    #[error("malformed value under '{key}': {reason}")]
    Malformed { key: &'static str, reason: String },
}

impl PersistError {
    pub fn malformed(key: &'static str, reason: impl ToString) -> Self {
        PersistError::Malformed {
            key,
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
