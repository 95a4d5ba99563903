use oauth::id_token::VerifyError;
use thiserror::Error;
use tonic::{Code, Status};

/// Error of the Sign in with Apple flow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid state")]
    InvalidState,

    #[error("missing id token")]
    MissingIdToken,

    #[error("invalid user payload: {0}")]
    InvalidUserPayload(serde_json::Error),

    #[error("identity token rejected: {0}")]
    Verify(#[from] VerifyError),

    #[error("oauth request failed: {0}")]
    OAuth(#[from] oauth::Error),

    #[error("{0} must be set")]
    MissingEnv(&'static str),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidState => Code::Unauthenticated,
            Error::Verify(VerifyError::KeySetUnavailable(_)) => Code::Unavailable,
            Error::Verify(_) => Code::Unauthenticated,
            Error::InvalidUserPayload(_) => Code::InvalidArgument,
            Error::OAuth(oauth::Error::UnexpectedStatusCode(status)) if status.is_client_error() => {
                Code::Unauthenticated
            }
            Error::OAuth(oauth::Error::UnexpectedStatusCode(_) | oauth::Error::SendRequest(_)) => {
                Code::Unavailable
            }
            Error::OAuth(_)
            | Error::MissingIdToken
            | Error::MissingEnv(_)
            | Error::InvalidEnv { .. } => Code::Internal,
        };
        Status::new(code, err.to_string())
    }
}
