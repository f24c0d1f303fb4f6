use thiserror::Error;

/// Malformed query text. Always something the user can fix by retyping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Which layer an [`ApiError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The server answered with an error status.
    Http,
    /// The profile has no token, so no request was sent.
    Auth,
    Timeout,
    Connect,
    /// Certificate verification failed.
    Tls,
    /// Server data did not contain what the command referred to.
    Lookup,
    /// Anything else: malformed payloads, odd transport failures.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    /// `None` means the failure happened before or below HTTP.
    pub status: Option<u16>,
    pub kind: ApiErrorKind,
}

impl ApiError {
    pub fn new(message: impl Into<String>, kind: ApiErrorKind) -> Self {
        Self {
            message: message.into(),
            status: None,
            kind,
        }
    }

    pub fn http(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            kind: ApiErrorKind::Http,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(message, ApiErrorKind::Other)
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(message, ApiErrorKind::Lookup)
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self.status, Some(401) | Some(403)) || self.kind == ApiErrorKind::Auth
    }

    /// No response was received at all.
    pub fn is_transport(&self) -> bool {
        self.status.is_none()
            && matches!(
                self.kind,
                ApiErrorKind::Timeout | ApiErrorKind::Connect | ApiErrorKind::Tls | ApiErrorKind::Other
            )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    ProfileNotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    SecureStorage(String),

    #[error("profile storage: {0}")]
    Storage(String),

    #[error("{0}")]
    Config(String),

    /// A newer query superseded this one. Never shown to the user.
    #[error("cancelled")]
    Cancelled,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
