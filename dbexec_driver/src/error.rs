use crate::ProviderKind;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Error when a column cannot be found in a row
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    /// Error reported by a driver while executing a command
    #[error("{}", format_execution_error(.message, .code.as_deref()))]
    CommandExecutionError {
        message: String,
        code: Option<String>,
    },
    /// Error loading or interpreting configuration
    #[error("{0}")]
    ConfigurationError(String),
    /// Error when a connection is used in the wrong state
    #[error("{0}")]
    ConnectionStateError(String),
    /// Error parsing a URL
    #[error("{0}")]
    InvalidUrl(String),
    /// IO error
    #[error("{0}")]
    IoError(String),
    /// Error when a driver is known by name but could not be loaded
    #[error("provider [{kind}] is unavailable; driver [{driver}]: {reason}")]
    ProviderUnavailable {
        kind: ProviderKind,
        driver: String,
        reason: String,
    },
    /// Error when a non-null scalar cannot be converted to the requested type
    #[error("cannot convert scalar value [{value}] to {target}")]
    ScalarConversionError { value: String, target: &'static str },
    /// Error when a provider kind has no driver name
    #[error("no driver name is defined for provider: {0}")]
    UnknownProviderKind(ProviderKind),
}

impl Error {
    /// Create a [`CommandExecutionError`](Error::CommandExecutionError) without a code
    #[must_use]
    pub fn execution<S: Into<String>>(message: S) -> Self {
        Error::CommandExecutionError {
            message: message.into(),
            code: None,
        }
    }

    /// Returns true when retrying the same call may succeed without changing the request
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ProviderUnavailable { .. })
    }
}

fn format_execution_error(message: &str, code: Option<&str>) -> String {
    match code {
        Some(code) => format!("[{code}] {message}"),
        None => message.to_string(),
    }
}

/// Converts a [`std::io::Error`] into an [`IoError`](Error::IoError)
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IoError(error.to_string())
    }
}

/// Convert [`utf8 errors`](std::string::FromUtf8Error) to [`IoError`](Error::IoError).
/// Drivers that decode column text map these to an execution error instead.
impl From<std::string::FromUtf8Error> for Error {
    fn from(error: std::string::FromUtf8Error) -> Self {
        Error::IoError(error.to_string())
    }
}

/// Convert [`url::ParseError`] to [`InvalidUrl`](Error::InvalidUrl)
impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Error::InvalidUrl(error.to_string())
    }
}
