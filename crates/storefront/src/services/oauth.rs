//! OAuth 2.0 / `OpenID` Connect client for customer login.
//!
//! Authorization code flow:
//!
//! 1. Redirect to [`OAuthClient::authorization_url`] with a random `state`
//! 2. Provider redirects back with `code` and `state`
//! 3. [`OAuthClient::exchange_code`] trades the code for an access token
//! 4. [`OAuthClient::userinfo`] reads the verified identity

use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use larder_core::{Email, EmailError};
use larder_db::models::OAuthIdentity;

use crate::config::OAuthConfig;

/// Errors from the OAuth provider.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the request.
    #[error("provider error: {status} - {message}")]
    Provider { status: u16, message: String },

    /// Provider did not return a usable email.
    #[error("identity has no verified email")]
    MissingEmail,

    #[error("invalid email from provider: {0}")]
    InvalidEmail(#[from] EmailError),
}

/// Token endpoint response.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: SecretString,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// `OpenID` Connect userinfo claims.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserInfo {
    /// Convert claims into a customer identity.
    ///
    /// An email the provider explicitly marks unverified is rejected.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::MissingEmail` or `OAuthError::InvalidEmail`.
    pub fn into_identity(self) -> Result<OAuthIdentity, OAuthError> {
        if self.email_verified == Some(false) {
            return Err(OAuthError::MissingEmail);
        }
        let raw = self.email.ok_or(OAuthError::MissingEmail)?;
        Ok(OAuthIdentity {
            subject: self.sub,
            email: Email::parse(&raw)?,
            name: self.name.unwrap_or_default(),
        })
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

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Provider` if the provider rejects the code.
    #[tracing::instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthError> {
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

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OAuthError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Fetch the userinfo claims for an access token.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Provider` if the token is rejected.
    #[tracing::instrument(skip_all)]
    pub async fn userinfo(&self, access_token: &SecretString) -> Result<UserInfo, OAuthError> {
        let response = self
            .client
            .get(self.userinfo_url())
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OAuthError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    fn userinfo_url(&self) -> Url {
        self.config.userinfo_url.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_authorization_url_carries_state() {
        let client = OAuthClient::new(&test_config().oauth).unwrap();
        let url = Url::parse(&client.authorization_url("http://localhost:3000/auth/callback", "st4te"))
            .unwrap();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("id.test"));
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "larder-storefront");
        assert_eq!(pairs["redirect_uri"], "http://localhost:3000/auth/callback");
        assert_eq!(pairs["scope"], "openid email profile");
        assert_eq!(pairs["state"], "st4te");
    }

    #[test]
    fn test_userinfo_into_identity() {
        let info: UserInfo = serde_json::from_str(
            r#"{"sub":"abc","email":" Cook@Example.com ","email_verified":true,"name":"Cook"}"#,
        )
        .unwrap();
        let identity = info.into_identity().unwrap();
        assert_eq!(identity.subject, "abc");
        assert_eq!(identity.email.as_str(), "cook@example.com");
        assert_eq!(identity.name, "Cook");
    }

    #[test]
    fn test_unverified_email_rejected() {
        let info: UserInfo =
            serde_json::from_str(r#"{"sub":"abc","email":"a@b.co","email_verified":false}"#)
                .unwrap();
        assert!(matches!(info.into_identity(), Err(OAuthError::MissingEmail)));
    }

    #[test]
    fn test_missing_email_rejected() {
        let info: UserInfo = serde_json::from_str(r#"{"sub":"abc"}"#).unwrap();
        assert!(matches!(info.into_identity(), Err(OAuthError::MissingEmail)));
    }
}
