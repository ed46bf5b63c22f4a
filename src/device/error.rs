use thiserror::Error;

/// Failure of a single Bravia API call
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Connection refused, timeout, DNS failure, ...
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status without a JSON-RPC error body
    #[error("{service} answered HTTP {status}")]
    Http { service: String, status: u16 },

    /// JSON-RPC error envelope (`{"error": [code, "message"]}`)
    #[error("{method} failed with code {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("malformed {method} response: {message}")]
    Decode { method: String, message: String },

    /// Command name not present in the TV's remote controller code table
    #[error("unknown remote command: {0}")]
    UnknownCommand(String),
}

impl DeviceError {
    pub(crate) fn decode(method: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Returns `true` if the PSK was rejected by the television.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Rpc { code, .. } => *code == 401 || *code == 403,
            Self::Http { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
