// Credential selection
//
// Sources are tried in the order given by `ResolutionOrder`. The first source that is present
// wins: a present-but-invalid source is an error and never falls through to the next one. The
// only exception is `ResolutionOrder::AmbientFirst`, which falls back to the access token file
// on any ambient failure, including a broken credential file.
use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::auth::default::{find_default_credentials, DefaultSource};
use crate::auth::service_account::ServiceAccount;
use crate::auth::{file_exists, read_credential_file, TokenSource};
use crate::client::{AuthenticatedClient, ObjectsService, StorageContext, StorageService};
use crate::config::{Config, ResolutionOrder};
use crate::Error;

/// The credential source selected by an initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    AccessTokenFile(PathBuf),
    ServiceAccountFile(PathBuf),
    AmbientDefault(DefaultSource),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::AccessTokenFile(p) => write!(f, "access token file {}", p.display()),
            CredentialSource::ServiceAccountFile(p) => {
                write!(f, "service account file {}", p.display())
            }
            CredentialSource::AmbientDefault(s) => write!(f, "default credentials from {}", s),
        }
    }
}

pub struct Resolver {
    config: Config,
    http: Client,
}

impl Resolver {
    pub fn new(config: Config) -> Result<Resolver, Error> {
        let http = Client::builder()
            .build()
            .map_err(|e| Error::ClientConstruction(e.to_string()))?;
        Ok(Resolver::with_client(config, http))
    }

    pub fn with_client(config: Config, http: Client) -> Resolver {
        Resolver { config, http }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Selects a credential source and builds its token source
    pub async fn resolve(&self) -> Result<(CredentialSource, TokenSource), Error> {
        let result = match self.config.order {
            ResolutionOrder::LocalFirst => self.resolve_local_first().await,
            ResolutionOrder::AmbientFirst => self.resolve_ambient_first().await,
        };
        match &result {
            Ok((selection, source)) => {
                info!(order = %self.config.order, source = source.kind(), "using {}", selection)
            }
            Err(e) => error!(order = %self.config.order, error = %e, "unable to get client"),
        }
        result
    }

    async fn resolve_local_first(&self) -> Result<(CredentialSource, TokenSource), Error> {
        let access_token_path = &self.config.access_token_path;
        if file_exists(access_token_path).await {
            let source = client_from_access_token(access_token_path).await?;
            return Ok((
                CredentialSource::AccessTokenFile(access_token_path.clone()),
                source,
            ));
        }
        debug!(path = %access_token_path.display(), "no access token file");

        let service_account_path = &self.config.service_account_path;
        if file_exists(service_account_path).await {
            let source = client_from_service_account(service_account_path, &self.config).await?;
            return Ok((
                CredentialSource::ServiceAccountFile(service_account_path.clone()),
                source,
            ));
        }
        debug!(path = %service_account_path.display(), "no service account file");

        let (default_source, source) = find_default_credentials(&self.http, &self.config).await?;
        Ok((CredentialSource::AmbientDefault(default_source), source))
    }

    async fn resolve_ambient_first(&self) -> Result<(CredentialSource, TokenSource), Error> {
        let ambient_err = match find_default_credentials(&self.http, &self.config).await {
            Ok((default_source, source)) => {
                return Ok((CredentialSource::AmbientDefault(default_source), source))
            }
            Err(e) => e,
        };

        let access_token_path = &self.config.access_token_path;
        if !file_exists(access_token_path).await {
            return Err(ambient_err);
        }
        warn!(error = %ambient_err, path = %access_token_path.display(), "default credentials unavailable, falling back to access token file");
        let source = client_from_access_token(access_token_path).await?;
        Ok((
            CredentialSource::AccessTokenFile(access_token_path.clone()),
            source,
        ))
    }

    /// Resolves credentials and builds the storage handles on top of them
    pub async fn initialize(&self) -> Result<StorageContext, Error> {
        let (selection, source) = self.resolve().await?;
        let client = AuthenticatedClient::new(self.http.clone(), source);
        let storage = StorageService::new(client, &self.config.storage_endpoint)?;
        let objects = ObjectsService::new(&storage);
        Ok(StorageContext {
            selection,
            storage,
            objects,
        })
    }
}

// The whole file content is the token, including any trailing newline. An empty file gives an
// empty token rather than falling through to the next source.
async fn client_from_access_token(path: &Path) -> Result<TokenSource, Error> {
    let token_bytes = read_credential_file(path).await?;
    let token = String::from_utf8(token_bytes).map_err(|e| {
        Error::file_read(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    if token.is_empty() {
        warn!(path = %path.display(), "access token file is empty");
    }
    Ok(TokenSource::from_raw_token(token))
}

async fn client_from_service_account(path: &Path, config: &Config) -> Result<TokenSource, Error> {
    let json_bytes = read_credential_file(path).await?;
    let service_account = ServiceAccount::from_json(&json_bytes, &config.scope, &config.token_uri)?;
    Ok(TokenSource::ServiceAccount(service_account))
}
