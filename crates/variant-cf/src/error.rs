//! Error handling for control-plane and metric endpoint clients

/// Result type alias for client operations
pub type CfResult<T> = std::result::Result<T, CfError>;

/// Errors raised by the Cloud Foundry and metric endpoint clients
#[derive(Debug, thiserror::Error)]
pub enum CfError {
    /// Transport-level failure (connect, timeout, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote endpoint answered with a non-success status
    #[error("API error: status {status}: {body}")]
    Api { status: u16, body: String },

    /// Token acquisition or refresh failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The response body did not decode into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// A referenced resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl CfError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an auth error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// The HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            CfError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CfError {
    fn from(err: serde_json::Error) -> Self {
        CfError::Decode(err.to_string())
    }
}

impl From<CfError> for variant_core::Error {
    fn from(err: CfError) -> Self {
        variant_core::Error::ControlPlane(err.to_string())
    }
}
