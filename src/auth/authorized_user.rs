// User credentials as written by `gcloud auth application-default login`
use crate::auth::token::{read_token_response, AccessToken};
use crate::Error;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

#[derive(Deserialize)]
pub struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(skip)]
    token_uri: String,
}

impl std::fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl AuthorizedUser {
    pub(crate) fn from_value(
        value: serde_json::Value,
        token_uri: &str,
    ) -> Result<AuthorizedUser, Error> {
        let mut user: AuthorizedUser = serde_json::from_value(value)?;
        if user.refresh_token.is_empty() {
            return Err(Error::MalformedCredential(
                "authorized_user credential has an empty refresh_token".to_string(),
            ));
        }
        user.token_uri = token_uri.to_string();
        Ok(user)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Scopes are fixed when the refresh token is granted, so none are sent here
    pub async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, Error> {
        let form = reqwest::multipart::Form::new()
            .text("client_id", self.client_id.clone())
            .text("client_secret", self.client_secret.clone())
            .text("refresh_token", self.refresh_token.clone())
            .text("grant_type", "refresh_token");
        debug!(client_id = %self.client_id, "refreshing authorized user token");
        let request_timestamp = Instant::now();
        let resp = client
            .post(&self.token_uri)
            .multipart(form)
            .send()
            .await?;
        read_token_response(resp, request_timestamp).await
    }
}

#[cfg(test)]
mod tests {
    use super::AuthorizedUser;
    use crate::Error;

    fn authorized_user(token_uri: &str) -> AuthorizedUser {
        let value = serde_json::from_str(&testutils::authorized_user_json()).unwrap();
        AuthorizedUser::from_value(value, token_uri).unwrap()
    }

    #[test]
    fn test_parse() {
        let user = authorized_user("https://example.com/token");
        assert_eq!(user.client_id(), "test-client.apps.googleusercontent.com");
        assert!(!format!("{:?}", user).contains("test-secret"));
    }

    #[test]
    fn test_missing_refresh_token() {
        let value = serde_json::json!({
            "type": "authorized_user",
            "client_id": "id",
            "client_secret": "secret",
        });
        let res = AuthorizedUser::from_value(value, "https://example.com/token");
        assert!(matches!(res, Err(Error::MalformedCredential(_))));
    }

    #[tokio::test]
    async fn test_fetch_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::Regex("1//test-refresh-token".to_string()))
            .with_status(200)
            .with_body(r#"{"access_token": "ya29.user", "token_type": "Bearer", "expires_in": 3599}"#)
            .expect(1)
            .create_async()
            .await;

        let user = authorized_user(&format!("{}/token", server.url()));
        let token = user.fetch_token(&reqwest::Client::new()).await.unwrap();
        assert_eq!(token.token, "ya29.user");
        mock.assert_async().await;
    }
}
