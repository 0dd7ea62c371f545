//! User lookup and creation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, User};

/// Result of an insert against the unique email constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A row was written with this id.
    Created(Uuid),
    /// A row with the same email already exists; nothing was written.
    Conflict,
}

/// Persistence seam for user rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Ids of every user whose email equals `email`.
    async fn find_ids_by_email(&self, email: &str) -> AuthResult<Vec<Uuid>>;

    /// Insert `user` unless its email is already taken.
    async fn insert(&self, user: &NewUser) -> AuthResult<InsertOutcome>;

    /// The full row for `id`, if it exists.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;
}

/// Resolve `email` to exactly one user id, creating the user if none exists.
///
/// One match is returned as-is. Several matches fail with
/// [`AuthError::DuplicateUser`] and nothing is written. No match inserts
/// [`NewUser::from_email`]; if a concurrent login wins that insert, the lookup
/// runs once more and its single match is returned.
pub async fn find_or_create_user(store: &dyn UserStore, email: &str) -> AuthResult<String> {
    if email.trim().is_empty() {
        return Err(AuthError::IdentityVerification("email is empty".to_string()));
    }

    if let Some(id) = single_match(store, email).await? {
        return Ok(id.to_string());
    }

    match store.insert(&NewUser::from_email(email)).await? {
        InsertOutcome::Created(id) => {
            tracing::info!("Created user {} for first login", id);
            Ok(id.to_string())
        }
        InsertOutcome::Conflict => {
            tracing::warn!("User insert conflicted with a concurrent login, re-reading");
            single_match(store, email)
                .await?
                .map(|id| id.to_string())
                .ok_or_else(|| {
                    AuthError::Store("insert conflicted but no user matches the email".to_string())
                })
        }
    }
}

async fn single_match(store: &dyn UserStore, email: &str) -> AuthResult<Option<Uuid>> {
    let ids = store.find_ids_by_email(email).await?;
    match ids.as_slice() {
        [] => Ok(None),
        [id] => Ok(Some(*id)),
        _ => {
            tracing::error!("{} users share one email", ids.len());
            Err(AuthError::DuplicateUser)
        }
    }
}

/// PostgreSQL-backed user store.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_ids_by_email(&self, email: &str) -> AuthResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn insert(&self, user: &NewUser) -> AuthResult<InsertOutcome> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, name)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match id {
            Some(id) => InsertOutcome::Created(id),
            None => InsertOutcome::Conflict,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

/// In-memory user store for testing and database-less runs.
///
/// Inserts honour the same unique email rule as the migration. [`seed`](Self::seed)
/// bypasses it so tests can reproduce rows written before the constraint existed.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserStore {
    users: Arc<Mutex<Vec<User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row unconditionally and return its id.
    pub async fn seed(&self, email: &str) -> Uuid {
        let user = new_row(&NewUser::from_email(email));
        let id = user.id;
        self.users.lock().await.push(user);
        id
    }

    /// All stored rows.
    pub async fn users(&self) -> Vec<User> {
        self.users.lock().await.clone()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_ids_by_email(&self, email: &str) -> AuthResult<Vec<Uuid>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .filter(|u| u.email == email)
            .map(|u| u.id)
            .collect())
    }

    async fn insert(&self, user: &NewUser) -> AuthResult<InsertOutcome> {
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.email == user.email) {
            return Ok(InsertOutcome::Conflict);
        }
        let row = new_row(user);
        let id = row.id;
        users.push(row);
        Ok(InsertOutcome::Created(id))
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users.lock().await.iter().find(|u| u.id == id).cloned())
    }
}

fn new_row(user: &NewUser) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: user.email.clone(),
        name: user.name.clone(),
        created_at: now,
        updated_at: now,
    }
}
