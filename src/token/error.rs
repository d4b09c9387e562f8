use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Malformed,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("signing key misconfigured: {0}")]
    SigningKeyMisconfigured(String),
}

impl TokenError {
    /// True for failures caused by the token bytes themselves rather than the key.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Malformed | Self::Base64 | Self::Json(_) | Self::UnsupportedAlg(_)
        )
    }
}
