use thiserror::Error;

/// Failures surfaced by session intents. Persistence write failures never
/// appear here; they are logged and swallowed so the in-memory state stays
/// authoritative.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("a capture is already in progress")]
    CaptureAlreadyActive,

    #[error("sign in before casting")]
    NotSignedIn,

    #[error("name must not be empty")]
    EmptyName,
}
