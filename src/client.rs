use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Url};

use crate::auth::{CachedTokenSource, TokenSource};
use crate::errors::Error;
use crate::resolver::CredentialSource;

// https://cloud.google.com/storage/docs/request-endpoints#encoding
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &percent_encoding::CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b']');

/// An HTTP client that attaches the resolved credential to every request it builds.
///
/// Cloning is cheap and clones share the cached token.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: Client,
    tokens: Arc<CachedTokenSource>,
}

impl fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("source", &self.tokens.source().kind())
            .finish()
    }
}

impl AuthenticatedClient {
    pub fn new(http: Client, source: TokenSource) -> AuthenticatedClient {
        AuthenticatedClient {
            http,
            tokens: Arc::new(CachedTokenSource::new(source)),
        }
    }

    pub fn token_source(&self) -> &TokenSource {
        self.tokens.source()
    }

    /// The current bearer token, fetching a new one if needed
    pub async fn access_token(&self) -> Result<String, Error> {
        Ok(self.tokens.get_access_token(&self.http).await?.token)
    }

    pub async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, Error> {
        let token = self.access_token().await?;
        Ok(self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", token)))
    }

    pub async fn get(&self, url: &str) -> Result<RequestBuilder, Error> {
        self.request(Method::GET, url).await
    }
}

/// Handle on the Cloud Storage JSON API
#[derive(Debug, Clone)]
pub struct StorageService {
    client: AuthenticatedClient,
    base_url: String,
}

impl StorageService {
    pub fn new(client: AuthenticatedClient, endpoint: &str) -> Result<StorageService, Error> {
        let url = Url::parse(endpoint).map_err(|e| {
            Error::ServiceConstruction(format!("invalid storage endpoint '{}': {}", endpoint, e))
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(Error::ServiceConstruction(format!(
                "unsupported storage endpoint scheme '{}'",
                url.scheme()
            )));
        }
        Ok(StorageService {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Handle on the `objects` collection of a `StorageService`
#[derive(Debug, Clone)]
pub struct ObjectsService {
    service: StorageService,
}

impl ObjectsService {
    pub fn new(service: &StorageService) -> ObjectsService {
        ObjectsService {
            service: service.clone(),
        }
    }

    // https://cloud.google.com/storage/docs/json_api/v1/objects/get
    pub fn object_url(&self, bucket_name: &str, object_name: &str) -> String {
        let encoded_bucket: String =
            utf8_percent_encode(bucket_name, PATH_SEGMENT_ENCODE_SET).to_string();
        let encoded_object: String =
            utf8_percent_encode(object_name, PATH_SEGMENT_ENCODE_SET).to_string();
        format!(
            "{}/b/{}/o/{}",
            self.service.base_url(),
            encoded_bucket,
            encoded_object
        )
    }

    /// Builds, but does not send, an authenticated request for an object
    pub async fn object_request(
        &self,
        method: Method,
        bucket_name: &str,
        object_name: &str,
    ) -> Result<RequestBuilder, Error> {
        let url = self.object_url(bucket_name, object_name);
        self.service.client().request(method, &url).await
    }
}

/// Everything produced by initialization
#[derive(Debug, Clone)]
pub struct StorageContext {
    pub selection: CredentialSource,
    pub storage: StorageService,
    pub objects: ObjectsService,
}
