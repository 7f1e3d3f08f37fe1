use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Template error in '{template}': {message}")]
    Template { template: String, message: String },

    #[error("Invalid chunk size: {0} (chunk size must be > 0)")]
    InvalidChunkSize(usize),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the failure came from the generation backend or its transport.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::Network(_) | Error::Stream(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::template("chunk_summary", "missing placeholder 'chunk'");
        assert!(err.to_string().contains("chunk_summary"));
        assert!(err.to_string().contains("missing placeholder"));

        let err = Error::InvalidChunkSize(0);
        assert!(err.to_string().contains("must be > 0"));
    }

    #[test]
    fn test_is_backend_error() {
        assert!(Error::backend("model crashed").is_backend_error());
        assert!(Error::network("connection refused").is_backend_error());
        assert!(Error::stream("truncated event").is_backend_error());
        assert!(!Error::AgentNotFound("nope".into()).is_backend_error());
        assert!(!Error::config("bad").is_backend_error());
    }
}
