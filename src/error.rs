use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered but its envelope `code` signalled failure.
    #[error("api error {code}: {message}")]
    Api { code: i32, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("broker protocol error: {0}")]
    Protocol(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not signed in: no access token stored")]
    NotSignedIn,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("ui error: {0}")]
    Ui(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
