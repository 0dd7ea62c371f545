//! Authentication: identity extraction, the callback precondition and session handling.

mod guard;
mod identity;
mod session;

pub use guard::require_authorization;
pub use identity::{HttpIdentityProvider, IdentityProvider};
pub use session::{current_user, destroy_session, establish_session, SessionUser, SESSION_USER_KEY};
