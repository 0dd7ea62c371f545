//! # User model for authenticated users
//!
//! Three representations of a user live here:
//!
//! ## [`User`]
//!
//! The complete row from the `users` table. It derives [`sqlx::FromRow`]:
//!
//! - `id` — primary key (`UUID v4`), the identifier written into sessions.
//! - `email` — the lookup key. Unique per the `users_email_key` constraint.
//! - `name` — display name, seeded from the email's local part on first login.
//! - `created_at` / `updated_at` — audit timestamps.
//!
//! ## [`NewUser`]
//!
//! The default payload inserted the first time an email logs in. It is derived
//! from the email alone via [`NewUser::from_email`].
//!
//! ## [`UserInfo`]
//!
//! The client-safe projection returned by [`User::to_info`] and served from `/me`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Full user record from the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Convert to UserInfo for client consumption.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.to_string(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// Payload for a user created on first login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
}

impl NewUser {
    /// Build the default record for `email`.
    pub fn from_email(email: &str) -> Self {
        let name = email
            .split_once('@')
            .map(|(local, _)| local)
            .unwrap_or(email)
            .trim();

        Self {
            email: email.to_string(),
            name: (!name.is_empty()).then(|| name.to_string()),
        }
    }
}

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}
