use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://oauth2.googleapis.com";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),
    /// The token endpoint rejected the grant (`invalid_grant`, `invalid_client`, ...).
    #[error("token grant rejected ({status}): {error}{}", describe(.description))]
    Grant {
        status: StatusCode,
        error: String,
        description: Option<String>,
    },
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|text| format!(": {text}"))
        .unwrap_or_default()
}

/// Error document of the token endpoint.
#[derive(Debug, Deserialize)]
struct GrantErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Mints short-lived bearer tokens from a long-lived refresh token.
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Self::with_base_url(DEFAULT_BASE_URL, client_id, client_secret)
    }

    pub fn with_base_url(
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            http: Client::new(),
            token_url: Url::parse(base_url)?.join("/token")?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Exchanges `refresh_token` for a fresh access token. The endpoint does
    /// not rotate refresh tokens, so the response usually carries none.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        scope: Option<&str>,
    ) -> Result<OAuthToken, OAuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(scope) = scope {
            form.push(("scope", scope));
        }

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<OAuthToken>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<GrantErrorBody>(&body) {
            Ok(grant) => OAuthError::Grant {
                status,
                error: grant.error,
                description: grant.error_description,
            },
            Err(_) => OAuthError::Api { status, body },
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds from the moment the token was issued.
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Present when the `openid` scope was granted; unused for Drive access.
    #[serde(default)]
    pub id_token: Option<String>,
}

impl OAuthToken {
    /// Absolute expiry in unix seconds, given the time the response arrived.
    pub fn expires_at(&self, received_at: i64) -> i64 {
        received_at.saturating_add(i64::try_from(self.expires_in).unwrap_or(i64::MAX))
    }
}
