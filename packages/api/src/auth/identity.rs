//! # Identity extraction
//!
//! Turns the `Authorization` header of an inbound request into a verified email by
//! asking the identity provider's userinfo endpoint.
//!
//! - [`IdentityProvider`] — the seam the `/callback` route depends on.
//! - [`HttpIdentityProvider`] — forwards the header verbatim to
//!   `GET <userinfo url>` with `reqwest` and reads `{ "email": string }` from the body.
//!
//! Any non-success status, transport failure, or body without a usable `email` is an
//! [`AuthError::IdentityVerification`]. The raw status and body of a rejection are
//! logged; callers only ever see a generic server error.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Subset of the userinfo response we rely on.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    email: Option<String>,
}

/// Verifies an inbound credential and yields the email it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verified_email(&self, authorization: &str) -> AuthResult<String>;
}

/// Identity provider reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    userinfo_url: String,
}

impl HttpIdentityProvider {
    /// Create a provider for the configured userinfo endpoint.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.identity_timeout)
            .build()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        Ok(Self {
            client,
            userinfo_url: config.userinfo_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verified_email(&self, authorization: &str) -> AuthResult<String> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Userinfo request failed: {}", e);
                AuthError::IdentityVerification(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Userinfo rejected credential: status={} body={}", status, body);
            return Err(AuthError::IdentityVerification(format!(
                "userinfo returned {status}"
            )));
        }

        let info: UserInfoResponse = response.json().await.map_err(|e| {
            tracing::error!("Userinfo body is not valid JSON: {}", e);
            AuthError::IdentityVerification(e.to_string())
        })?;

        match info.email {
            Some(email) if !email.trim().is_empty() => Ok(email),
            _ => {
                tracing::error!("Userinfo response has no email");
                Err(AuthError::IdentityVerification(
                    "userinfo response has no email".to_string(),
                ))
            }
        }
    }
}
