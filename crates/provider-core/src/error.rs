use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed external call. Every failure carries exactly
/// one kind, chosen by the most specific match over the diagnostic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Ssl,
    Proxy,
    Timeout,
    Connection,
    Http,
    /// Catch-all for transport failures that match no specific pattern.
    Network,
    /// The worker crashed, was killed, or returned a malformed payload.
    ProcessFailure,
    /// Bad caller-supplied parameters, detected before or at dispatch.
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorKind::Ssl => "SSL_ERROR",
            ErrorKind::Proxy => "PROXY_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Connection => "CONNECTION_ERROR",
            ErrorKind::Http => "HTTP_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::ProcessFailure => "PROCESS_FAILURE",
            ErrorKind::Validation => "VALIDATION_ERROR",
        };
        write!(f, "{code}")
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Caller-supplied parameters rejected before dispatch. Never retried.
    #[error("invalid parameters: {0}")]
    Validation(String),

    /// A classified external-call failure with actionable hints.
    #[error("call failed ({kind}): {message}")]
    Call {
        kind: ErrorKind,
        message: String,
        hints: Vec<String>,
    },

    /// A fetched payload did not have the expected shape.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Derived-metric computation could not proceed.
    #[error("calculation error: {0}")]
    Calculation(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Validation(_) => ErrorKind::Validation,
            ProviderError::Call { kind, .. } => *kind,
            ProviderError::InvalidData(_) | ProviderError::Calculation(_) => {
                ErrorKind::ProcessFailure
            }
        }
    }

    pub fn hints(&self) -> &[String] {
        match self {
            ProviderError::Call { hints, .. } => hints,
            _ => &[],
        }
    }

    /// Transient call failures are retryable; validation rejections and
    /// post-fetch shape errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Call { kind, .. } if *kind != ErrorKind::Validation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Call {
            kind: ErrorKind::Ssl,
            message: "handshake failed".to_string(),
            hints: vec!["retry later".to_string()],
        };
        assert_eq!(err.to_string(), "call failed (SSL_ERROR): handshake failed");
        assert_eq!(err.kind(), ErrorKind::Ssl);
        assert_eq!(err.hints(), &["retry later".to_string()]);
    }

    #[test]
    fn test_retryability() {
        let transient = ProviderError::Call {
            kind: ErrorKind::Timeout,
            message: "timed out".to_string(),
            hints: vec![],
        };
        assert!(transient.is_retryable());

        let rejected = ProviderError::Validation("missing symbol".to_string());
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.kind(), ErrorKind::Validation);

        let callee_rejected = ProviderError::Call {
            kind: ErrorKind::Validation,
            message: "bad period".to_string(),
            hints: vec![],
        };
        assert!(!callee_rejected.is_retryable());
    }
}
