/// Reasons an identity token is rejected.
///
/// Every variant is terminal; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    MalformedToken(&'static str),

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("token expired")]
    TokenExpired,

    #[error("key set unavailable: {0}")]
    KeySetUnavailable(#[from] KeySetError),

    #[error("invalid signature")]
    SignatureInvalid,

    #[error("invalid nonce")]
    InvalidNonce,
}

/// Failure to obtain a usable JSON web key set.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KeySetError {
    #[error("failed to fetch key set: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status code: {0}")]
    UnexpectedStatusCode(reqwest::StatusCode),

    #[error("failed to decode key set: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("key set contains no usable RSA key")]
    NoUsableKeys,
}
