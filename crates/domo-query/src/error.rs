//! Error types for the Domo query client.

/// Errors that can occur when using a [`Connection`](crate::Connection).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The caller did not supply a dataset and nothing was resolved before.
    #[error("Usage error: {0}")]
    Usage(String),

    /// The token endpoint rejected the client credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP transport error (connection, DNS, TLS, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No dataset in the catalog matched the requested id or name
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access token missing or rejected (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Permission denied (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Any other non-success status
    #[error("Server error ({status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Error message from server
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns true if the caller misused the API rather than the remote failing.
    pub fn is_usage(&self) -> bool {
        matches!(self, ClientError::Usage(_))
    }

    /// Returns true if the failure relates to credentials or the access token.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ClientError::Authentication(_) | ClientError::Unauthorized(_) | ClientError::Forbidden(_)
        )
    }

    /// Returns the HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound(_) => Some(404),
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Forbidden(_) => Some(403),
            ClientError::ServerError { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
