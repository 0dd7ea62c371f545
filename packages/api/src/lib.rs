//! # API crate — login callbacks and session establishment
//!
//! This crate bridges one upstream identity assertion to one local user row. Every login
//! route ends the same way: resolve an email to a single user id (creating the user on
//! first login), write that id into the server-side session, and save the session before
//! the response goes out.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Identity extraction via the provider's userinfo endpoint, the bearer precondition, session establish/destroy |
//! | [`config`] | [`AuthConfig`] loaded from the environment |
//! | [`db`] | PostgreSQL pool (lazy `OnceCell` singleton), migrations, the [`UserStore`](db::UserStore) seam and find-or-create |
//! | [`error`] | [`AuthError`] and its HTTP mapping |
//! | [`models`] | Database models (`User`, `NewUser`) and the client-safe `UserInfo` |
//! | [`routes`] | The axum routes and [`app`](routes::app), which wires them under their session layers |
//!
//! The HTTP server itself lives in the `web` package.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use models::UserInfo;
pub use routes::{app, AppState};
