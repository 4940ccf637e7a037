// Ambient ("application default") credentials discovery
//
// Mirrors the lookup order of the Google client libraries:
// https://cloud.google.com/docs/authentication/application-default-credentials
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::authorized_user::AuthorizedUser;
use super::metadata::MetadataServer;
use super::service_account::ServiceAccount;
use super::{file_exists, read_credential_file, TokenSource};
use crate::config::Config;
use crate::Error;

/// Which ambient mechanism produced the credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultSource {
    /// File named by `GOOGLE_APPLICATION_CREDENTIALS`
    EnvironmentFile(PathBuf),
    /// gcloud's `application_default_credentials.json`
    WellKnownFile(PathBuf),
    MetadataServer,
}

impl fmt::Display for DefaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultSource::EnvironmentFile(p) => {
                write!(f, "GOOGLE_APPLICATION_CREDENTIALS ({})", p.display())
            }
            DefaultSource::WellKnownFile(p) => write!(f, "gcloud well-known file ({})", p.display()),
            DefaultSource::MetadataServer => write!(f, "metadata server"),
        }
    }
}

/// Finds ambient default credentials, stopping at the first mechanism that is present.
///
/// A present-but-broken credential file is an error, it never falls through to the next
/// mechanism. The metadata server is checked once.
pub async fn find_default_credentials(
    client: &reqwest::Client,
    config: &Config,
) -> Result<(DefaultSource, TokenSource), Error> {
    let adc = &config.default_credentials;

    if let Some(path) = &adc.application_credentials {
        let source = credentials_from_file(path, config).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "invalid GOOGLE_APPLICATION_CREDENTIALS file");
            e
        })?;
        return Ok((DefaultSource::EnvironmentFile(path.clone()), source));
    }

    if let Some(path) = &adc.well_known_file {
        if file_exists(path).await {
            let source = credentials_from_file(path, config).await?;
            return Ok((DefaultSource::WellKnownFile(path.clone()), source));
        }
        debug!(path = %path.display(), "no gcloud application default credentials file");
    }

    if MetadataServer::detect(client, adc).await {
        let metadata = MetadataServer::new(&adc.metadata_root(), &config.scope);
        return Ok((DefaultSource::MetadataServer, TokenSource::Metadata(metadata)));
    }

    Err(Error::NoCredentials(
        "GOOGLE_APPLICATION_CREDENTIALS is not set, no gcloud application default credentials \
         file was found and no metadata server answered"
            .to_string(),
    ))
}

async fn credentials_from_file(path: &Path, config: &Config) -> Result<TokenSource, Error> {
    let content = read_credential_file(path).await?;
    let value: serde_json::Value = serde_json::from_slice(&content)?;
    let cred_type = value
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    match cred_type.as_str() {
        "service_account" => Ok(TokenSource::ServiceAccount(ServiceAccount::from_value(
            value,
            &config.scope,
            &config.token_uri,
        )?)),
        "authorized_user" => Ok(TokenSource::AuthorizedUser(AuthorizedUser::from_value(
            value,
            &config.token_uri,
        )?)),
        other => Err(Error::MalformedCredential(format!(
            "unsupported credential type '{}' in {}, expected 'service_account' or 'authorized_user'",
            other,
            path.display()
        ))),
    }
}
