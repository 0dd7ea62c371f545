//! Authentication configuration from environment variables.

use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Email used by the development login routes.
pub const DEFAULT_DEV_EMAIL: &str = "foo@bar.com";

/// Authentication route configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Full URL of the identity provider's userinfo endpoint
    pub userinfo_url: String,

    /// Base location for post-login and post-logout redirects
    pub home_location: String,

    /// Email the development routes log in as
    pub dev_email: String,

    /// Register `/dev-callback` and `/signin`
    pub dev_login_enabled: bool,

    /// Cookie name of the primary session
    pub session_cookie: String,

    /// Cookie name of the legacy session used by `/signin` and `/signout`
    pub legacy_session_cookie: String,

    /// Mark session cookies `Secure`
    pub session_secure: bool,

    /// Timeout for the userinfo request
    pub identity_timeout: Duration,
}

impl AuthConfig {
    /// Create config from environment variables, reading `.env` first.
    pub fn from_env() -> AuthResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let domain = lookup("IDENTITY_DOMAIN")
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| AuthError::Config("IDENTITY_DOMAIN not set".to_string()))?;

        let home_location = lookup("HOME_LOCATION")
            .unwrap_or_else(|| "http://localhost:8000".to_string());

        let dev_email = lookup("DEV_EMAIL").unwrap_or_else(|| DEFAULT_DEV_EMAIL.to_string());
        if dev_email.trim().is_empty() {
            return Err(AuthError::Config("DEV_EMAIL is blank".to_string()));
        }

        let identity_timeout_secs: u64 = match lookup("IDENTITY_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                AuthError::Config(format!("IDENTITY_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            None => 10,
        };

        Ok(Self {
            userinfo_url: userinfo_url(&domain),
            home_location: home_location.trim_end_matches('/').to_string(),
            dev_email,
            dev_login_enabled: parse_flag(lookup("DEV_LOGIN_ENABLED").as_deref()),
            session_cookie: lookup("SESSION_COOKIE").unwrap_or_else(|| "session".to_string()),
            legacy_session_cookie: lookup("LEGACY_SESSION_COOKIE")
                .unwrap_or_else(|| "legacy_session".to_string()),
            session_secure: parse_flag(lookup("SESSION_SECURE").as_deref()),
            identity_timeout: Duration::from_secs(identity_timeout_secs),
        })
    }

    /// Where `/signin` and `/signout` send the browser.
    pub fn learn_location(&self) -> String {
        format!("{}/learn", self.home_location)
    }
}

fn userinfo_url(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        format!("{domain}/userinfo")
    } else {
        format!("https://{domain}/userinfo")
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
