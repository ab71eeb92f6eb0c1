use std::fmt;

/// An error a [`crate::retry::RetryPolicy`] can classify.
///
/// Classification only looks at two things: the status code reported by
/// the provider, if any, and the error message. Errors are passed through
/// the policy untouched; this trait never wraps or converts them.
pub trait Retryable: fmt::Display {
    /// Status code reported by the provider, e.g. `429` or `503`
    fn status_code(&self) -> Option<u16>;

    /// Text checked against the transient failure markers
    fn message(&self) -> String {
        self.to_string()
    }
}

/// A failed call to an external provider.
///
/// Callers wrapping an HTTP client typically build one from the response
/// status and body. It keeps the provider's status and message verbatim.
///
/// # Examples
///
/// ```
/// use throttle_lib::retry::{ProviderError, Retryable};
///
/// let err = ProviderError::new(Some(429), "Too many requests");
/// assert_eq!(err.status_code(), Some(429));
/// assert_eq!(err.to_string(), "Too many requests (status 429)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    status: Option<u16>,
    message: String,
}

impl ProviderError {
    /// Create an error from an optional status code and a message
    #[must_use]
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Create an error for a response with the given status code
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status), message)
    }

    /// The provider's message, without the status suffix
    #[must_use]
    pub fn raw_message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

impl Retryable for ProviderError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn message(&self) -> String {
        self.message.clone()
    }
}
