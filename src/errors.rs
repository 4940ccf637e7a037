use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read credential file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed credential: {0}")]
    MalformedCredential(String),
    #[error("no default credentials available: {0}")]
    NoCredentials(String),
    #[error("failed to fetch access token: {0}")]
    TokenFetch(String),
    #[error("failed to construct http client: {0}")]
    ClientConstruction(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to construct storage service: {0}")]
    ServiceConstruction(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::FileRead {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::MalformedCredential(format!("invalid json: {}", value))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Error::MalformedCredential(format!("invalid private key: {}", value))
    }
}
