//! # Database module — PostgreSQL pool and the user store
//!
//! ## Pool
//!
//! The pool is a **lazy, process-wide singleton** backed by a [`tokio::sync::OnceCell`].
//! The first call to [`get_pool`] reads `DATABASE_URL` from the environment (via `dotenvy`),
//! opens a connection pool with up to 5 connections, and caches the result for all
//! subsequent callers. [`run_migrations`] applies the bundled `migrations/` directory.
//!
//! ## Users
//!
//! [`UserStore`] is the seam between the login routes and persistence. It has two
//! implementations: [`PgUserStore`] over the shared pool and [`MemoryUserStore`] for
//! tests and database-less local runs. [`find_or_create_user`] holds the lookup policy
//! and is the only caller of [`UserStore::insert`].

mod pool;
mod users;

pub use pool::{get_pool, run_migrations};
pub use users::{find_or_create_user, InsertOutcome, MemoryUserStore, PgUserStore, UserStore};
