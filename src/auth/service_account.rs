// Service account authentication
//
// The key file is exchanged for short lived access tokens using the JWT bearer grant:
// https://developers.google.com/identity/protocols/oauth2/service-account#httprest
use crate::auth::token::{read_token_response, AccessToken};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    key_type: Option<String>,
    private_key_id: String,
    private_key: String,
    client_email: String,
    token_uri: Option<String>,
}

pub struct ServiceAccount {
    client_email: String,
    private_key_id: String,
    encoding_key: jsonwebtoken::EncodingKey,
    scope: String,
    token_uri: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("scope", &self.scope)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccount {
    /// Parses a service account key file. The private key is decoded here so that a broken key
    /// is reported at initialization rather than on the first request.
    pub fn from_json(
        content: &[u8],
        scope: &str,
        default_token_uri: &str,
    ) -> Result<ServiceAccount, Error> {
        let key: ServiceAccountKey = serde_json::from_slice(content)?;
        Self::from_key(key, scope, default_token_uri)
    }

    pub(crate) fn from_value(
        value: serde_json::Value,
        scope: &str,
        default_token_uri: &str,
    ) -> Result<ServiceAccount, Error> {
        let key: ServiceAccountKey = serde_json::from_value(value)?;
        Self::from_key(key, scope, default_token_uri)
    }

    fn from_key(
        key: ServiceAccountKey,
        scope: &str,
        default_token_uri: &str,
    ) -> Result<ServiceAccount, Error> {
        if let Some(key_type) = &key.key_type {
            if key_type != "service_account" {
                return Err(Error::MalformedCredential(format!(
                    "expected a service_account key, got type '{}'",
                    key_type
                )));
            }
        }
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(ServiceAccount {
            client_email: key.client_email,
            private_key_id: key.private_key_id,
            encoding_key,
            scope: scope.to_string(),
            token_uri: key
                .token_uri
                .unwrap_or_else(|| default_token_uri.to_string()),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    fn make_access_token_jwt_assertion(&self) -> Result<String, Error> {
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.private_key_id.clone());
        let unix_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::TokenFetch(format!("system clock before unix epoch: {}", e)))?
            .as_secs();
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.token_uri.clone(),
            iat: unix_timestamp,
            exp: unix_timestamp + 3600,
        };
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)?;
        Ok(token)
    }

    pub async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, Error> {
        let assertion = self.make_access_token_jwt_assertion()?;
        let form = reqwest::multipart::Form::new()
            .part("assertion", reqwest::multipart::Part::text(assertion))
            .part(
                "grant_type",
                reqwest::multipart::Part::text(JWT_BEARER_GRANT_TYPE),
            );
        debug!(client_email = %self.client_email, token_uri = %self.token_uri, "exchanging service account assertion");
        let request_timestamp = Instant::now();
        let resp = client
            .post(&self.token_uri)
            .multipart(form)
            .send()
            .await?;
        read_token_response(resp, request_timestamp).await
    }
}
