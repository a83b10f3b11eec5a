use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebGenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed action at index {index}: field `{field}` {reason}")]
    MalformedAction {
        index: usize,
        field: &'static str,
        reason: String,
    },

    #[error("Action payload is not a sequence (got {0})")]
    NotASequence(&'static str),

    #[error("Target not found for action {index}: {descriptor}")]
    UnresolvedTarget { index: usize, descriptor: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Relay channel error: {0}")]
    ChannelProtocol(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl WebGenError {
    pub(crate) fn malformed(index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        WebGenError::MalformedAction {
            index,
            field,
            reason: reason.into(),
        }
    }
}

impl serde::Serialize for WebGenError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type WebGenResult<T> = Result<T, WebGenError>;
