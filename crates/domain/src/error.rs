/// Shared error type used across all ConvoAgent crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed input rejected at a boundary or by a value constructor.
    #[error("validation: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated (e.g. `(channel, channel_id)`).
    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("repository: {0}")]
    Repository(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Transport or harness failure of the skill runtime. A skill that ran
    /// and reported `success: false` is not an error.
    #[error("skill runtime: {0}")]
    SkillRuntime(String),

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Semantic error classes, independent of where the error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Repository,
    Provider,
    SkillRuntime,
    Canceled,
    Internal,
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Duplicate { .. } => ErrorKind::Conflict,
            Error::Repository(_) => ErrorKind::Repository,
            Error::Provider { .. } => ErrorKind::Provider,
            Error::SkillRuntime(_) => ErrorKind::SkillRuntime,
            Error::Canceled(_) => ErrorKind::Canceled,
            Error::Io(_)
            | Error::Json(_)
            | Error::Http(_)
            | Error::Timeout(_)
            | Error::Config(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// The message safe to show across an API boundary. Low-level causes
    /// are collapsed; callers should log the full error separately.
    pub fn public_message(&self) -> String {
        match self {
            Error::Io(_) | Error::Json(_) | Error::Other(_) => "internal error".into(),
            other => other.to_string(),
        }
    }
}
