use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::Error;

#[derive(Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    /// `None` for tokens that never expire, e.g. a raw token read from disk
    pub expiration: Option<Instant>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl AccessToken {
    pub fn new_static(token: String) -> AccessToken {
        AccessToken {
            token,
            expiration: None,
        }
    }

    pub fn has_expired(&self) -> bool {
        match self.expiration {
            // Use a 1 second buffer to renew a bit earlier
            Some(expiration) => expiration < (Instant::now() + Duration::from_secs(1)),
            None => false,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: Option<u64>,
}

impl TokenResponse {
    pub(crate) fn into_access_token(self, request_timestamp: Instant) -> Result<AccessToken, Error> {
        if !self.token_type.eq_ignore_ascii_case("Bearer") {
            return Err(Error::TokenFetch(format!(
                "Invalid token type {}",
                self.token_type
            )));
        }
        let expiration = match self.expires_in {
            Some(secs) => Some(
                request_timestamp
                    .checked_add(Duration::from_secs(secs))
                    .ok_or_else(|| {
                        Error::TokenFetch(format!("Invalid expires_in {}", secs))
                    })?,
            ),
            None => None,
        };
        Ok(AccessToken {
            token: self.access_token,
            expiration,
        })
    }
}

/// Turns the response of a token endpoint (OAuth2 or metadata server) into an access token.
///
/// `request_timestamp` should be taken before the request is sent so the expiration errs on the
/// early side.
pub(crate) async fn read_token_response(
    resp: reqwest::Response,
    request_timestamp: Instant,
) -> Result<AccessToken, Error> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::TokenFetch(format!(
            "Request failed, code={}: {}",
            status.as_u16(),
            body
        )));
    }
    let token_resp: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| Error::TokenFetch(format!("Invalid token response: {}", e)))?;
    token_resp.into_access_token(request_timestamp)
}

#[cfg(test)]
mod tests {
    use super::{AccessToken, TokenResponse};
    use crate::Error;
    use std::time::{Duration, Instant};

    #[test]
    fn test_static_token_never_expires() {
        let token = AccessToken::new_static("tok123".to_string());
        assert!(!token.has_expired());
    }

    #[test]
    fn test_expiration_buffer() {
        let token = AccessToken {
            token: "t".to_string(),
            expiration: Some(Instant::now() + Duration::from_millis(500)),
        };
        // Within the renewal buffer
        assert!(token.has_expired());

        let token = AccessToken {
            token: "t".to_string(),
            expiration: Some(Instant::now() + Duration::from_secs(3600)),
        };
        assert!(!token.has_expired());
    }

    #[test]
    fn test_token_response_requires_bearer() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "MAC", "expires_in": 3600}"#,
        )
        .unwrap();
        let res = resp.into_access_token(Instant::now());
        assert!(matches!(res, Err(Error::TokenFetch(_))));
    }

    #[test]
    fn test_token_response_expiration() {
        let now = Instant::now();
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 3599}"#,
        )
        .unwrap();
        let token = resp.into_access_token(now).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expiration, Some(now + Duration::from_secs(3599)));
    }

    #[test]
    fn test_token_response_expires_in_overflow() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 18446744073709551615}"#,
        )
        .unwrap();
        let res = resp.into_access_token(Instant::now());
        assert!(matches!(res, Err(Error::TokenFetch(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = AccessToken::new_static("secret-token".to_string());
        assert!(!format!("{:?}", token).contains("secret-token"));
    }
}
