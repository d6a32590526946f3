use driveconv_core::{OAuthClient, OAuthToken};
use thiserror::Error;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credentials: set DRIVECONV_ACCESS_TOKEN or DRIVECONV_REFRESH_TOKEN")]
    MissingCredentials,
    #[error("DRIVECONV_CLIENT_ID and DRIVECONV_CLIENT_SECRET are required to refresh tokens")]
    MissingOAuthClient,
    #[error("refresh token is missing")]
    MissingRefreshToken,
    #[error("oauth refresh failed: {0}")]
    OAuth(#[from] driveconv_core::OAuthError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds; `None` means the token is used as is until it fails.
    pub expires_at: Option<i64>,
    pub scope: Option<String>,
}

impl Credentials {
    fn from_oauth_token(token: &OAuthToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: Some(token.expires_at(now_unix())),
            scope: token.scope.clone(),
        }
    }
}

pub struct TokenProvider {
    credentials: Credentials,
    oauth_client: Option<OAuthClient>,
    refresh_skew_secs: i64,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, oauth_client: Option<OAuthClient>) -> Self {
        Self {
            credentials,
            oauth_client,
            refresh_skew_secs: 60,
        }
    }

    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// A static access token wins. Otherwise a refresh token plus client
    /// credentials are required and the first call mints a token.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(access_token) = non_blank("DRIVECONV_ACCESS_TOKEN") {
            return Ok(Self::new(
                Credentials {
                    access_token,
                    refresh_token: None,
                    expires_at: None,
                    scope: None,
                },
                None,
            ));
        }

        let refresh_token =
            non_blank("DRIVECONV_REFRESH_TOKEN").ok_or(CredentialError::MissingCredentials)?;
        let (Some(client_id), Some(client_secret)) = (
            non_blank("DRIVECONV_CLIENT_ID"),
            non_blank("DRIVECONV_CLIENT_SECRET"),
        ) else {
            return Err(CredentialError::MissingOAuthClient);
        };
        let oauth_client = match non_blank("DRIVECONV_OAUTH_BASE") {
            Some(base) => OAuthClient::with_base_url(&base, client_id, client_secret)?,
            None => OAuthClient::new(client_id, client_secret)?,
        };

        Ok(Self::new(
            Credentials {
                access_token: String::new(),
                refresh_token: Some(refresh_token),
                expires_at: Some(0),
                scope: Some(DRIVE_SCOPE.to_string()),
            },
            Some(oauth_client),
        ))
    }

    pub async fn valid_access_token(&mut self) -> Result<String, CredentialError> {
        if self.should_refresh() {
            self.refresh().await?;
        }
        Ok(self.credentials.access_token.clone())
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn should_refresh(&self) -> bool {
        let Some(expires_at) = self.credentials.expires_at else {
            return false;
        };
        expires_at <= now_unix().saturating_add(self.refresh_skew_secs)
    }

    async fn refresh(&mut self) -> Result<(), CredentialError> {
        let refresh_token = self
            .credentials
            .refresh_token
            .clone()
            .ok_or(CredentialError::MissingRefreshToken)?;
        let client = self
            .oauth_client
            .as_ref()
            .ok_or(CredentialError::MissingOAuthClient)?;
        let token = client
            .refresh_token(&refresh_token, self.credentials.scope.as_deref())
            .await?;
        let mut refreshed = Credentials::from_oauth_token(&token);
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token);
        }
        if refreshed.scope.is_none() {
            refreshed.scope = self.credentials.scope.clone();
        }
        self.credentials = refreshed;
        Ok(())
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
