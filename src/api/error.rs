/// Failures surfaced by [`super::ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response. `message` is the server's `error` field when present.
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("{0} ID is required")]
    MissingId(&'static str),
    #[error("Invalid membership key")]
    InvalidMembershipKey,
    #[error("Verification failed: {status_text}")]
    VerificationFailed { status: u16, status_text: String },
    #[error("server returned no content for {path}")]
    NoContent { path: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status attached to the failure, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } | ApiError::VerificationFailed { status, .. } => {
                Some(*status)
            }
            ApiError::InvalidMembershipKey => Some(401),
            ApiError::NoContent { .. } => Some(204),
            ApiError::MissingId(_) | ApiError::Transport(_) | ApiError::Decode { .. } => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
