//! OAuth 2.0 / `OpenID` Connect client for staff login.
//!
//! Only the pieces the admin login needs: the authorization URL, the code
//! exchange and the userinfo email. Whether that email may log in is decided
//! by the `ADMIN_EMAILS` allow-list, not here.

use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use larder_core::{Email, EmailError};

use crate::config::OAuthConfig;

/// Errors from the OAuth provider.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider error: {status} - {message}")]
    Provider { status: u16, message: String },

    #[error("identity has no verified email")]
    MissingEmail,

    #[error("invalid email from provider: {0}")]
    InvalidEmail(#[from] EmailError),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: SecretString,
}

/// `OpenID` Connect userinfo claims.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserInfo {
    /// The verified, normalized email.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::MissingEmail` when absent or explicitly unverified.
    pub fn verified_email(&self) -> Result<Email, OAuthError> {
        if self.email_verified == Some(false) {
            return Err(OAuthError::MissingEmail);
        }
        let raw = self.email.as_deref().ok_or(OAuthError::MissingEmail)?;
        Ok(Email::parse(raw)?)
    }
}

/// Client for the configured OAuth provider.
#[derive(Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    /// Create a new OAuth client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &OAuthConfig) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Build the provider login URL.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scopes)
            .append_pair("state", state);
        url.into()
    }

    /// Exchange the code and read the caller's userinfo.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Provider` if the provider rejects the code or
    /// the token.
    #[tracing::instrument(skip_all)]
    pub async fn identify(&self, code: &str, redirect_uri: &str) -> Result<UserInfo, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .client
            .post(self.config.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;

        let response = self
            .client
            .get(self.config.userinfo_url.clone())
            .bearer_auth(token.access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, OAuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(OAuthError::Provider {
        status: status.as_u16(),
        message,
    })
}
