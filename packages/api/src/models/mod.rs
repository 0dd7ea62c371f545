//! Data models for the application.

mod user;

pub use user::{NewUser, User, UserInfo};
