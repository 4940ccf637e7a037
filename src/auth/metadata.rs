// Tokens for the service account attached to a GCE instance (or GKE/Cloud Run workload)
// https://cloud.google.com/compute/docs/access/authenticate-workloads#applications
use crate::auth::token::{read_token_response, AccessToken};
use crate::config::DefaultCredentialsConfig;
use crate::Error;
use std::time::Instant;
use tracing::debug;

const METADATA_FLAVOR: &str = "Metadata-Flavor";
const METADATA_FLAVOR_VALUE: &str = "Google";
const DEFAULT_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug)]
pub struct MetadataServer {
    root: String,
    scope: String,
}

impl MetadataServer {
    pub fn new(root: &str, scope: &str) -> MetadataServer {
        MetadataServer {
            root: root.to_string(),
            scope: scope.to_string(),
        }
    }

    /// Checks whether a metadata server answers at the configured host.
    ///
    /// This sends exactly one request. Any transport error or a response without the
    /// `Metadata-Flavor: Google` header means we are not running on GCP.
    pub async fn detect(client: &reqwest::Client, config: &DefaultCredentialsConfig) -> bool {
        let root = config.metadata_root();
        let resp = client
            .get(format!("{}/", root))
            .header(METADATA_FLAVOR, METADATA_FLAVOR_VALUE)
            .timeout(config.metadata_detect_timeout)
            .send()
            .await;
        match resp {
            Ok(resp) => {
                let flavor_ok = resp
                    .headers()
                    .get(METADATA_FLAVOR)
                    .map(|v| v.as_bytes() == METADATA_FLAVOR_VALUE.as_bytes())
                    .unwrap_or(false);
                debug!(%root, status = resp.status().as_u16(), flavor_ok, "metadata server check");
                flavor_ok
            }
            Err(e) => {
                debug!(%root, error = %e, "metadata server check failed");
                false
            }
        }
    }

    pub async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, Error> {
        let request_timestamp = Instant::now();
        let resp = client
            .get(format!("{}{}", self.root, DEFAULT_TOKEN_PATH))
            .query(&[("scopes", self.scope.as_str())])
            .header(METADATA_FLAVOR, METADATA_FLAVOR_VALUE)
            .send()
            .await?;
        read_token_response(resp, request_timestamp).await
    }
}
