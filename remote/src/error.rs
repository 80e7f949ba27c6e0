use std::path::PathBuf;

use reqwest::StatusCode;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to parse remote address '{url}'")]
    InvalidAddress {
        url: String,

        #[source]
        source: url::ParseError,
    },

    #[error("Cannot read '{}' for upload: {}", .0.display(), .1)]
    ReadUpload(PathBuf, #[source] std::io::Error),

    #[error("Unexpected response code '{got}' while requesting to {requested_url}")]
    UnexpectedResponseCode {
        got: StatusCode,
        requested_url: String,
    },

    #[error("Malformed response body from {requested_url}: {source}")]
    MalformedResponse {
        requested_url: String,

        #[source]
        source: serde_json::Error,
    },

    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True when the request was abandoned because the client-side timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
