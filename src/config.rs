use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

pub const ACCESS_TOKEN_PATH: &str = "/etc/apt/gcs_access_token";
pub const SERVICE_ACCOUNT_JSON_PATH: &str = "/etc/apt/gcs_sa_json";
pub const DEVSTORAGE_READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com/storage/v1";
pub const METADATA_HOST: &str = "metadata.google.internal";

const WELL_KNOWN_FILE: &str = "application_default_credentials.json";

/// Order in which credential sources are tried.
///
/// Deployments disagree on whether local files or ambient credentials should win, so this is an
/// explicit policy rather than a hardcoded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionOrder {
    /// Access token file, then service account file, then ambient default credentials.
    #[default]
    LocalFirst,
    /// Ambient default credentials, falling back to the access token file if they fail.
    /// The service account file is not consulted.
    AmbientFirst,
}

impl FromStr for ResolutionOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local-first" => Ok(ResolutionOrder::LocalFirst),
            "ambient-first" => Ok(ResolutionOrder::AmbientFirst),
            other => Err(Error::Config(format!(
                "unknown resolution order '{}', expected 'local-first' or 'ambient-first'",
                other
            ))),
        }
    }
}

impl fmt::Display for ResolutionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionOrder::LocalFirst => write!(f, "local-first"),
            ResolutionOrder::AmbientFirst => write!(f, "ambient-first"),
        }
    }
}

/// Where ambient default credentials are looked up
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultCredentialsConfig {
    /// Value of `GOOGLE_APPLICATION_CREDENTIALS`. When set, the file must be valid.
    pub application_credentials: Option<PathBuf>,
    /// gcloud's `application_default_credentials.json`, used only if the file exists
    pub well_known_file: Option<PathBuf>,
    pub metadata_host: String,
    pub metadata_detect_timeout: Duration,
}

impl Default for DefaultCredentialsConfig {
    fn default() -> Self {
        DefaultCredentialsConfig {
            application_credentials: None,
            well_known_file: None,
            metadata_host: METADATA_HOST.to_string(),
            metadata_detect_timeout: Duration::from_secs(2),
        }
    }
}

impl DefaultCredentialsConfig {
    pub fn metadata_root(&self) -> String {
        if self.metadata_host.starts_with("http://") || self.metadata_host.starts_with("https://")
        {
            self.metadata_host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.metadata_host)
        }
    }
}

/// Resolver settings.
///
/// `Config::default()` only carries the hardcoded paths: it does not look at
/// `GOOGLE_APPLICATION_CREDENTIALS` or the gcloud well-known file, so ambient discovery goes
/// straight to the metadata server. Use `Config::from_env()` to pick those up.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub access_token_path: PathBuf,
    pub service_account_path: PathBuf,
    pub scope: String,
    pub order: ResolutionOrder,
    /// Token endpoint used when a credential file does not name its own `token_uri`
    pub token_uri: String,
    pub storage_endpoint: String,
    pub default_credentials: DefaultCredentialsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            access_token_path: PathBuf::from(ACCESS_TOKEN_PATH),
            service_account_path: PathBuf::from(SERVICE_ACCOUNT_JSON_PATH),
            scope: DEVSTORAGE_READ_ONLY_SCOPE.to_string(),
            order: ResolutionOrder::default(),
            token_uri: TOKEN_URI.to_string(),
            storage_endpoint: STORAGE_ENDPOINT.to_string(),
            default_credentials: DefaultCredentialsConfig::default(),
        }
    }
}

impl Config {
    /// Builds a config from the process environment, keeping the defaults for unset variables
    pub fn from_env() -> Result<Config, Error> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(v) = lookup("GCS_ACCESS_TOKEN_PATH") {
            config.access_token_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("GCS_SERVICE_ACCOUNT_PATH") {
            config.service_account_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("GCS_SCOPE") {
            config.scope = v;
        }
        if let Some(v) = lookup("GCS_RESOLUTION_ORDER") {
            config.order = v.parse()?;
        }
        if let Some(v) = lookup("GCS_TOKEN_URI") {
            config.token_uri = v;
        }
        if let Some(v) = lookup("GCS_STORAGE_ENDPOINT") {
            config.storage_endpoint = v;
        }

        let adc = &mut config.default_credentials;
        adc.application_credentials = lookup("GOOGLE_APPLICATION_CREDENTIALS")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        adc.well_known_file = well_known_file(&lookup);
        if let Some(v) = lookup("GCE_METADATA_HOST").filter(|v| !v.is_empty()) {
            adc.metadata_host = v;
        }
        if let Some(v) = lookup("GCS_METADATA_DETECT_TIMEOUT_MS") {
            let millis: u64 = v.parse().map_err(|e| {
                Error::Config(format!("invalid GCS_METADATA_DETECT_TIMEOUT_MS '{}': {}", v, e))
            })?;
            adc.metadata_detect_timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

fn well_known_file<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("CLOUDSDK_CONFIG").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir).join(WELL_KNOWN_FILE));
    }
    lookup("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(".config/gcloud").join(WELL_KNOWN_FILE))
}

#[cfg(test)]
mod tests {
    use super::{Config, ResolutionOrder, ACCESS_TOKEN_PATH, SERVICE_ACCOUNT_JSON_PATH};
    use crate::Error;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_match_hardcoded_paths() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.access_token_path, PathBuf::from(ACCESS_TOKEN_PATH));
        assert_eq!(
            config.service_account_path,
            PathBuf::from(SERVICE_ACCOUNT_JSON_PATH)
        );
        assert_eq!(
            config.scope,
            "https://www.googleapis.com/auth/devstorage.read_only"
        );
        assert_eq!(config.order, ResolutionOrder::LocalFirst);
        assert_eq!(config.default_credentials.application_credentials, None);
        assert_eq!(config.default_credentials.well_known_file, None);
        assert_eq!(
            config.default_credentials.metadata_root(),
            "http://metadata.google.internal"
        );
    }

    #[test]
    fn test_default_skips_ambient_credential_files() {
        // Only from_env/from_lookup read GOOGLE_APPLICATION_CREDENTIALS and the gcloud file
        let config = Config::default();
        assert_eq!(config.default_credentials.application_credentials, None);
        assert_eq!(config.default_credentials.well_known_file, None);

        let config = config_from(&[
            ("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/adc.json"),
            ("HOME", "/home/apt"),
        ])
        .unwrap();
        assert!(config.default_credentials.application_credentials.is_some());
        assert!(config.default_credentials.well_known_file.is_some());
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[
            ("GCS_ACCESS_TOKEN_PATH", "/tmp/token"),
            ("GCS_SERVICE_ACCOUNT_PATH", "/tmp/sa.json"),
            ("GCS_RESOLUTION_ORDER", "ambient-first"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/adc.json"),
            ("GCE_METADATA_HOST", "127.0.0.1:8080"),
            ("GCS_METADATA_DETECT_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.access_token_path, PathBuf::from("/tmp/token"));
        assert_eq!(config.service_account_path, PathBuf::from("/tmp/sa.json"));
        assert_eq!(config.order, ResolutionOrder::AmbientFirst);
        let adc = &config.default_credentials;
        assert_eq!(
            adc.application_credentials,
            Some(PathBuf::from("/tmp/adc.json"))
        );
        assert_eq!(adc.metadata_root(), "http://127.0.0.1:8080");
        assert_eq!(adc.metadata_detect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_well_known_file_location() {
        let config = config_from(&[("HOME", "/home/apt")]).unwrap();
        assert_eq!(
            config.default_credentials.well_known_file,
            Some(PathBuf::from(
                "/home/apt/.config/gcloud/application_default_credentials.json"
            ))
        );

        let config = config_from(&[("HOME", "/home/apt"), ("CLOUDSDK_CONFIG", "/opt/gcloud")])
            .unwrap();
        assert_eq!(
            config.default_credentials.well_known_file,
            Some(PathBuf::from(
                "/opt/gcloud/application_default_credentials.json"
            ))
        );
    }

    #[test]
    fn test_invalid_order() {
        let res = config_from(&[("GCS_RESOLUTION_ORDER", "random")]);
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn test_order_display_roundtrip() {
        for order in [ResolutionOrder::LocalFirst, ResolutionOrder::AmbientFirst] {
            assert_eq!(order.to_string().parse::<ResolutionOrder>().unwrap(), order);
        }
    }
}
