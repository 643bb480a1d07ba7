use thiserror::Error;

/// Errors returned by [`HololithClient`](crate::HololithClient) calls.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (DNS, refused connection, timeout).
    #[error("connection error: {0}")]
    Connection(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The client could not be built.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether sending the same request again may succeed.
    ///
    /// Transport failures, rate limiting and server errors are retryable;
    /// client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Deserialization(_) | Self::Configuration(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_by_kind() {
        assert!(Error::Connection("refused".into()).is_retryable());
        assert!(
            Error::Http {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            Error::Http {
                status: 429,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !Error::Http {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!Error::Deserialization("eof".into()).is_retryable());
    }
}
