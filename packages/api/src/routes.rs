//! # Login routes
//!
//! | Method | Path | Session | Effect |
//! |--------|------|---------|--------|
//! | GET | `/dev-callback` | primary | log in as the development email, answer `{"statusCode":200}` |
//! | GET | `/callback` | primary | verify the bearer credential with the identity provider, log in as its email |
//! | GET | `/me` | primary | the session's user as [`UserInfo`](crate::models::UserInfo), or `null` |
//! | GET | `/signin` | legacy | log in as the development email, redirect to `<home>/learn` |
//! | GET | `/signout` | legacy | destroy the session, redirect to `<home>/learn` |
//!
//! `/dev-callback` and `/signin` only exist when [`AuthConfig::dev_login_enabled`] is set.
//! `/callback` sits behind [`require_authorization`].
//!
//! The legacy pair runs under its own [`SessionManagerLayer`] with a different cookie, so a
//! legacy login is not visible to the primary routes and vice versa. [`app`] wires both.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_sessions::{Session, SessionManagerLayer, SessionStore};
use uuid::Uuid;

use crate::auth::{
    current_user, destroy_session, establish_session, require_authorization, IdentityProvider,
};
use crate::config::AuthConfig;
use crate::db::{find_or_create_user, UserStore};
use crate::error::{AuthError, AuthResult};

/// Shared state for the login routes.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityProvider>,
        config: AuthConfig,
    ) -> Self {
        Self {
            users,
            identity,
            config: Arc::new(config),
        }
    }
}

/// Routes that use the primary session cookie.
pub fn primary_routes(config: &AuthConfig) -> Router<AppState> {
    let mut router = Router::new()
        .route(
            "/callback",
            get(callback).route_layer(middleware::from_fn(require_authorization)),
        )
        .route("/me", get(me));

    if config.dev_login_enabled {
        router = router.route("/dev-callback", get(dev_callback));
    }
    router
}

/// Routes that use the legacy session cookie.
pub fn legacy_routes(config: &AuthConfig) -> Router<AppState> {
    let mut router = Router::new().route("/signout", get(signout));

    if config.dev_login_enabled {
        router = router.route("/signin", get(signin));
    }
    router
}

/// Assemble the full application, each route group under its own session layer.
pub fn app<P, L>(
    state: AppState,
    primary_sessions: SessionManagerLayer<P>,
    legacy_sessions: SessionManagerLayer<L>,
) -> Router
where
    P: SessionStore + Clone,
    L: SessionStore + Clone,
{
    if state.config.dev_login_enabled {
        tracing::warn!("Development login routes are enabled");
    }

    Router::new()
        .merge(primary_routes(&state.config).layer(primary_sessions))
        .merge(legacy_routes(&state.config).layer(legacy_sessions))
        .with_state(state)
}

/// Find or create the user for `email` and record it in `session`.
async fn log_in(state: &AppState, session: &Session, email: &str) -> AuthResult<String> {
    let user_id = find_or_create_user(state.users.as_ref(), email).await?;
    establish_session(session, &user_id).await?;
    tracing::info!("Session established for user {}", user_id);
    Ok(user_id)
}

async fn dev_callback(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, AuthError> {
    log_in(&state, &session, &state.config.dev_email).await?;
    Ok(Json(json!({ "statusCode": 200 })))
}

async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
) -> Result<StatusCode, AuthError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let email = state.identity.verified_email(authorization).await?;
    log_in(&state, &session, &email).await?;
    Ok(StatusCode::OK)
}

async fn me(State(state): State<AppState>, session: Session) -> Result<Json<Value>, AuthError> {
    let Some(session_user) = current_user(&session).await? else {
        return Ok(Json(json!({ "user": null })));
    };

    let user = match Uuid::parse_str(&session_user.id) {
        Ok(id) => state.users.find_by_id(id).await?,
        Err(_) => {
            tracing::warn!("Session holds a malformed user id: {}", session_user.id);
            None
        }
    };
    Ok(Json(json!({ "user": user.map(|u| u.to_info()) })))
}

async fn signin(State(state): State<AppState>, session: Session) -> Result<Redirect, AuthError> {
    log_in(&state, &session, &state.config.dev_email).await?;
    Ok(Redirect::to(&state.config.learn_location()))
}

async fn signout(State(state): State<AppState>, session: Session) -> Result<Redirect, AuthError> {
    destroy_session(&session).await?;
    tracing::info!("Session destroyed");
    Ok(Redirect::to(&state.config.learn_location()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{Request, Response};
    use tokio::sync::Mutex;
    use tower::ServiceExt;
    use tower_sessions::session::Id;
    use tower_sessions::MemoryStore;

    /// Identity provider that accepts one token.
    struct StubIdentity {
        token: &'static str,
        email: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn verified_email(&self, authorization: &str) -> AuthResult<String> {
            self.calls.lock().await.push(authorization.to_string());
            if authorization == format!("Bearer {}", self.token) {
                Ok(self.email.to_string())
            } else {
                Err(AuthError::IdentityVerification("userinfo returned 401".into()))
            }
        }
    }

    struct Harness {
        router: Router,
        users: MemoryUserStore,
        identity: Arc<StubIdentity>,
        primary_store: MemoryStore,
        legacy_store: MemoryStore,
    }

    fn harness(dev_login_enabled: bool) -> Harness {
        let users = MemoryUserStore::new();
        let identity = Arc::new(StubIdentity {
            token: "good",
            email: "a@b.com",
            calls: Mutex::new(Vec::new()),
        });
        let mut config = AuthConfig::from_lookup(|key| match key {
            "IDENTITY_DOMAIN" => Some("id.example.com".to_string()),
            "HOME_LOCATION" => Some("https://www.example.org".to_string()),
            _ => None,
        })
        .unwrap();
        config.dev_login_enabled = dev_login_enabled;

        let primary_store = MemoryStore::default();
        let primary = SessionManagerLayer::new(primary_store.clone())
            .with_name(config.session_cookie.clone())
            .with_secure(false);
        let legacy_store = MemoryStore::default();
        let legacy = SessionManagerLayer::new(legacy_store.clone())
            .with_name(config.legacy_session_cookie.clone())
            .with_secure(false);

        let state = AppState::new(Arc::new(users.clone()), identity.clone(), config);
        Harness {
            router: app(state, primary, legacy),
            users,
            identity,
            primary_store,
            legacy_store,
        }
    }

    async fn call(router: &Router, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// `name=value` pair of the first Set-Cookie header.
    fn cookie_of(response: &Response<Body>) -> String {
        let header = response
            .headers()
            .get(SET_COOKIE)
            .expect("response sets a cookie")
            .to_str()
            .unwrap();
        header.split(';').next().unwrap().to_string()
    }

    fn session_id_of(cookie: &str) -> Id {
        let (_, value) = cookie.split_once('=').unwrap();
        value.parse().unwrap()
    }

    async fn json_of(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn session_user(router: &Router, cookie: &str) -> Value {
        let response = call(router, "/me", &[("cookie", cookie)]).await;
        assert_eq!(response.status(), StatusCode::OK);
        json_of(response).await["user"].clone()
    }

    #[tokio::test]
    async fn test_dev_callback_creates_session() {
        let h = harness(true);

        let response = call(&h.router, "/dev-callback", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = cookie_of(&response);
        assert!(cookie.starts_with("session="));
        assert_eq!(json_of(response).await, json!({ "statusCode": 200 }));

        let users = h.users.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "foo@bar.com");

        let user = session_user(&h.router, &cookie).await;
        assert_eq!(user["id"], users[0].id.to_string());
    }

    #[tokio::test]
    async fn test_dev_routes_disabled() {
        let h = harness(false);
        assert_eq!(
            call(&h.router, "/dev-callback", &[]).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            call(&h.router, "/signin", &[]).await.status(),
            StatusCode::NOT_FOUND
        );
        assert!(h.users.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_callback_establishes_verified_user() {
        let h = harness(false);
        let existing = h.users.seed("a@b.com").await;

        let response = call(&h.router, "/callback", &[("authorization", "Bearer good")]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = cookie_of(&response);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(bytes.is_empty());

        assert_eq!(*h.identity.calls.lock().await, vec!["Bearer good".to_string()]);
        assert_eq!(h.users.users().await.len(), 1);

        let user = session_user(&h.router, &cookie).await;
        assert_eq!(user["id"], existing.to_string());
    }

    #[tokio::test]
    async fn test_callback_first_login_creates_user() {
        let h = harness(false);

        let response = call(&h.router, "/callback", &[("authorization", "Bearer good")]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = cookie_of(&response);

        let users = h.users.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@b.com");

        let user = session_user(&h.router, &cookie).await;
        assert_eq!(user["id"], users[0].id.to_string());
        assert_eq!(user["email"], "a@b.com");
        assert_eq!(user["name"], "a");
    }

    #[tokio::test]
    async fn test_login_issues_fresh_session_id() {
        let h = harness(true);

        // A session the client already holds before logging in
        let before = call(&h.router, "/dev-callback", &[]).await;
        let held = cookie_of(&before);

        let response = call(
            &h.router,
            "/callback",
            &[("authorization", "Bearer good"), (COOKIE.as_str(), held.as_str())],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let issued = cookie_of(&response);
        assert_ne!(issued, held);

        // The old id no longer resolves to anyone
        assert_eq!(session_user(&h.router, &held).await, Value::Null);
        assert_eq!(session_user(&h.router, &issued).await["email"], "a@b.com");
    }

    #[tokio::test]
    async fn test_me_without_matching_user() {
        let h = harness(false);
        let store = Arc::new(h.primary_store.clone());

        for user_id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            let session = Session::new(None, store.clone(), None);
            establish_session(&session, &user_id).await.unwrap();
            let cookie = format!("session={}", session.id().unwrap());

            assert_eq!(session_user(&h.router, &cookie).await, Value::Null);
        }
    }

    #[tokio::test]
    async fn test_callback_rejected_by_provider_writes_nothing() {
        let h = harness(false);

        let response = call(&h.router, "/callback", &[("authorization", "Bearer bad")]).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(json_of(response).await["statusCode"], 500);

        assert!(h.users.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_callback_requires_authorization() {
        let h = harness(false);

        let response = call(&h.router, "/callback", &[]).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(h.identity.calls.lock().await.is_empty());
        assert!(h.users.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_callback_duplicate_users_fail() {
        let h = harness(false);
        h.users.seed("a@b.com").await;
        h.users.seed("a@b.com").await;

        let response = call(&h.router, "/callback", &[("authorization", "Bearer good")]).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(h.users.users().await.len(), 2);
    }

    #[tokio::test]
    async fn test_signin_redirects_with_legacy_cookie() {
        let h = harness(true);

        let response = call(&h.router, "/signin", &[]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://www.example.org/learn"
        );
        let cookie = cookie_of(&response);
        assert!(cookie.starts_with("legacy_session="));

        // The legacy cookie is not a primary session
        assert_eq!(session_user(&h.router, &cookie).await, Value::Null);
    }

    #[tokio::test]
    async fn test_signout_then_signin() {
        let h = harness(true);

        let first = call(&h.router, "/signin", &[]).await;
        let cookie = cookie_of(&first);

        let response = call(&h.router, "/signout", &[(COOKIE.as_str(), cookie.as_str())]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://www.example.org/learn"
        );

        let old_id = session_id_of(&cookie);
        assert!(h.legacy_store.load(&old_id).await.unwrap().is_none());

        let again = call(&h.router, "/signin", &[(COOKIE.as_str(), cookie.as_str())]).await;
        assert_eq!(again.status(), StatusCode::SEE_OTHER);
        let new_cookie = cookie_of(&again);
        assert!(new_cookie.starts_with("legacy_session="));

        // Same email both times: still one row
        let users = h.users.users().await;
        assert_eq!(users.len(), 1);

        let record = h
            .legacy_store
            .load(&session_id_of(&new_cookie))
            .await
            .unwrap()
            .expect("new session is stored");
        assert_eq!(record.data.len(), 1);
        assert_eq!(record.data["user"], json!({ "id": users[0].id.to_string() }));
    }

    #[tokio::test]
    async fn test_signout_without_session() {
        let h = harness(false);
        let response = call(&h.router, "/signout", &[]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_me_without_session() {
        let h = harness(false);
        let response = call(&h.router, "/me", &[]).await;
        assert_eq!(json_of(response).await, json!({ "user": null }));
    }
}
