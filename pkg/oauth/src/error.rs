/// OAuth errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to build request body")]
    BuildRequestBody(#[from] serde_urlencoded::ser::Error),

    #[error("failed to build http client")]
    BuildHttpClient,

    #[error("failed to send request")]
    SendRequest(#[from] reqwest::Error),

    #[error("unexpected HTTP status code: {0}")]
    UnexpectedStatusCode(reqwest::StatusCode),

    #[error("parse URL: {0}")]
    ParseURL(#[from] url::ParseError),
}
