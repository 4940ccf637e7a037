// Token sources used to authenticate against Google Cloud Storage
pub mod authorized_user;
pub mod default;
pub mod metadata;
pub mod service_account;
pub mod token;

use std::path::Path;

use tokio::sync::Mutex;
use tracing::debug;

use crate::Error;
use authorized_user::AuthorizedUser;
use metadata::MetadataServer;
use service_account::ServiceAccount;
pub use token::AccessToken;

#[derive(Debug)]
pub enum TokenSource {
    /// A token that is used as-is and never refreshed
    Static(AccessToken),
    ServiceAccount(ServiceAccount),
    AuthorizedUser(AuthorizedUser),
    Metadata(MetadataServer),
}

impl TokenSource {
    pub fn from_raw_token(token: String) -> TokenSource {
        TokenSource::Static(AccessToken::new_static(token))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TokenSource::Static(_) => "static",
            TokenSource::ServiceAccount(_) => "service_account",
            TokenSource::AuthorizedUser(_) => "authorized_user",
            TokenSource::Metadata(_) => "metadata",
        }
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<AccessToken, Error> {
        match self {
            TokenSource::Static(t) => Ok(t.clone()),
            TokenSource::ServiceAccount(s) => s.fetch_token(client).await,
            TokenSource::AuthorizedUser(s) => s.fetch_token(client).await,
            TokenSource::Metadata(s) => s.fetch_token(client).await,
        }
    }
}

/// Keeps the last token of a source around until it expires.
///
/// A new token is fetched lazily by the first request that sees the cached one expired.
/// Concurrent callers wait on the same fetch.
#[derive(Debug)]
pub struct CachedTokenSource {
    source: TokenSource,
    access_token: Mutex<Option<AccessToken>>,
}

impl CachedTokenSource {
    pub fn new(source: TokenSource) -> CachedTokenSource {
        CachedTokenSource {
            source,
            access_token: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    pub async fn get_access_token(&self, client: &reqwest::Client) -> Result<AccessToken, Error> {
        let mut cached = self.access_token.lock().await;
        match cached.as_ref() {
            Some(token) if !token.has_expired() => Ok(token.clone()),
            _ => {
                debug!(source = self.source.kind(), "fetching access token");
                let token = self.source.fetch(client).await?;
                *cached = Some(token.clone());
                Ok(token)
            }
        }
    }
}

/// Whether `path` is an existing regular file. Directories and paths we cannot stat do not count.
pub(crate) async fn file_exists(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => !metadata.is_dir(),
        Err(_) => false,
    }
}

pub(crate) async fn read_credential_file(path: &Path) -> Result<Vec<u8>, Error> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::file_read(path, e))
}
