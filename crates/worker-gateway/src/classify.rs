use provider_core::{ErrorKind, ProviderError};

/// Map a raw diagnostic string to an [`ErrorKind`]. Patterns are checked
/// in priority order over the lowercased text; SSL outranks everything
/// because SSL failures often mention connections too.
pub fn classify_failure(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();

    if lowered.contains("ssl")
        || lowered.contains("eof occurred")
        || lowered.contains("certificate")
        || lowered.contains("handshake")
    {
        ErrorKind::Ssl
    } else if lowered.contains("proxy") {
        ErrorKind::Proxy
    } else if lowered.contains("timed out") || lowered.contains("timeout") {
        ErrorKind::Timeout
    } else if lowered.contains("connection") {
        ErrorKind::Connection
    } else if lowered.contains("http") || lowered.contains("status code") {
        ErrorKind::Http
    } else {
        ErrorKind::Network
    }
}

/// Remediation hints surfaced alongside a classified failure.
pub fn hints_for(kind: ErrorKind) -> Vec<String> {
    let hints: &[&str] = match kind {
        ErrorKind::Ssl => &[
            "upstream SSL endpoints are often unstable; retrying usually helps",
            "check whether a local proxy is intercepting TLS",
        ],
        ErrorKind::Proxy => &[
            "verify proxy settings or disable the proxy for this host",
        ],
        ErrorKind::Timeout => &[
            "the endpoint may be slow right now; retry with a longer timeout",
            "narrow the date range to reduce the payload",
        ],
        ErrorKind::Connection => &[
            "check network connectivity and DNS resolution",
        ],
        ErrorKind::Http => &[
            "the upstream service rejected the request; it may be rate limiting",
        ],
        ErrorKind::Network => &[
            "transient network failure; retrying usually helps",
        ],
        ErrorKind::ProcessFailure | ErrorKind::Validation => &[],
    };
    hints.iter().map(|h| h.to_string()).collect()
}

/// Build a classified call failure from a raw diagnostic.
pub fn call_failure(kind: ErrorKind, message: impl Into<String>) -> ProviderError {
    ProviderError::Call {
        kind,
        message: message.into(),
        hints: hints_for(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_outranks_connection() {
        assert_eq!(
            classify_failure("SSL: UNEXPECTED_EOF_WHILE_READING on connection"),
            ErrorKind::Ssl
        );
        assert_eq!(
            classify_failure("EOF occurred in violation of protocol"),
            ErrorKind::Ssl
        );
    }

    #[test]
    fn test_specific_patterns() {
        assert_eq!(classify_failure("ProxyError: tunnel failed"), ErrorKind::Proxy);
        assert_eq!(classify_failure("read timed out"), ErrorKind::Timeout);
        assert_eq!(
            classify_failure("Connection refused by peer"),
            ErrorKind::Connection
        );
        assert_eq!(
            classify_failure("HTTP 503 from upstream"),
            ErrorKind::Http
        );
    }

    #[test]
    fn test_unmatched_falls_back_to_network() {
        assert_eq!(classify_failure("something odd happened"), ErrorKind::Network);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(classify_failure("TIMEOUT waiting for data"), ErrorKind::Timeout);
    }

    #[test]
    fn test_transient_kinds_carry_hints() {
        for kind in [
            ErrorKind::Ssl,
            ErrorKind::Proxy,
            ErrorKind::Timeout,
            ErrorKind::Connection,
            ErrorKind::Http,
            ErrorKind::Network,
        ] {
            assert!(!hints_for(kind).is_empty(), "{kind} should carry hints");
        }
        assert!(hints_for(ErrorKind::Validation).is_empty());
    }
}
