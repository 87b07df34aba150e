//! API routes

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::extractors::AppState;
use crate::handlers::{auth, users};

/// Create the auth API router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::current_user))
        .route("/users", post(users::create_user))
        .route("/users/:id/permissions", patch(users::update_permissions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use pmo_auth::directory::StaticDirectory;
    use pmo_auth::memory::{MemoryDepartmentStore, MemorySessionStore, MemoryUserStore};
    use pmo_auth::session::{CookieConfig, SessionManager};
    use pmo_auth::{password, AuthService};
    use pmo_core::config::SessionConfig;
    use pmo_core::types::{Role, UserStatus};
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        users: Arc<MemoryUserStore>,
    }

    fn test_app(directory: StaticDirectory) -> TestApp {
        let users = Arc::new(MemoryUserStore::new());
        let session_config = SessionConfig {
            cookie_name: "_pmo_session".into(),
            ttl_hours: 24,
            max_lifetime_hours: 168,
            secure_cookies: false,
        };
        let sessions = SessionManager::new(Arc::new(MemorySessionStore::new()), &session_config);
        let auth = AuthService::new(
            users.clone(),
            Arc::new(MemoryDepartmentStore::new()),
            Some(Arc::new(directory)),
            sessions,
        );

        let state = AppState {
            auth: Arc::new(auth),
            cookies: CookieConfig::from_config(&session_config),
        };

        TestApp {
            app: router().with_state(state),
            users,
        }
    }

    fn seed(users: &MemoryUserStore, username: &str, password: &str, role: Role) -> i64 {
        let hash = password::hash_password(password).unwrap();
        users
            .insert(
                username,
                &format!("{}@example.org", username),
                username,
                &hash,
                role,
                UserStatus::Active,
                None,
            )
            .id
    }

    fn login_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_cookie(response: &axum::response::Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("Set-Cookie header")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn login(app: &Router, username: &str, password: &str) -> String {
        let response = app
            .clone()
            .oneshot(login_request(serde_json::json!({
                "username": username,
                "password": password,
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_hides_password_hash() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "alice", "pw1234567890", Role::User);

        let response = tapp
            .app
            .clone()
            .oneshot(login_request(serde_json::json!({
                "username": "alice",
                "password": "pw1234567890",
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        assert!(cookie.starts_with("_pmo_session="));

        let body = body_json(response).await;
        assert_eq!(body["username"], "alice");
        assert!(body.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_login_rejection_message() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "alice", "pw1234567890", Role::User);

        let response = tapp
            .app
            .clone()
            .oneshot(login_request(serde_json::json!({
                "username": "alice",
                "password": "wrong",
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid username or password");
    }

    #[tokio::test]
    async fn test_inactive_account_gets_the_same_rejection() {
        let tapp = test_app(StaticDirectory::new());
        let hash = password::hash_password("pw1234567890").unwrap();
        tapp.users.insert(
            "bob",
            "bob@example.org",
            "Bob",
            &hash,
            Role::User,
            UserStatus::Inactive,
            None,
        );

        let response = tapp
            .app
            .clone()
            .oneshot(login_request(serde_json::json!({
                "username": "bob",
                "password": "pw1234567890",
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid username or password");
    }

    #[tokio::test]
    async fn test_current_user_requires_session() {
        let tapp = test_app(StaticDirectory::new());

        let response = tapp
            .app
            .clone()
            .oneshot(Request::builder().uri("/user").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_current_user_round_trip() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "alice", "pw1234567890", Role::ProjectManager);
        let cookie = login(&tapp.app, "alice", "pw1234567890").await;

        let response = tapp
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/user")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], "alice");
        assert_eq!(body["role"], "ProjectManager");
    }

    #[tokio::test]
    async fn test_logout_invalidates_the_cookie() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "alice", "pw1234567890", Role::User);
        let cookie = login(&tapp.app, "alice", "pw1234567890").await;

        let response = tapp
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let clear = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(clear.contains("Max-Age=0"));

        let response = tapp
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/user")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_without_session_is_a_no_op() {
        let tapp = test_app(StaticDirectory::new());

        let response = tapp
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_directory_login_provisions_user() {
        let tapp = test_app(
            StaticDirectory::new().with_user("jdoe", "dirpw", "jdoe@example.org", "Jane Doe"),
        );

        let response = tapp
            .app
            .clone()
            .oneshot(login_request(serde_json::json!({
                "username": "jdoe",
                "password": "dirpw",
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], "jdoe");
        assert_eq!(body["role"], "User");
        assert_eq!(body["directorySourced"], true);
    }

    #[tokio::test]
    async fn test_login_with_explicit_local_strategy() {
        let tapp = test_app(
            StaticDirectory::new().with_user("alice", "dirpw", "alice@example.org", "Alice"),
        );
        seed(&tapp.users, "alice", "localpw12345", Role::User);

        let response = tapp
            .app
            .clone()
            .oneshot(login_request(serde_json::json!({
                "username": "alice",
                "password": "dirpw",
                "strategy": "local",
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = tapp
            .app
            .clone()
            .oneshot(login_request(serde_json::json!({
                "username": "alice",
                "password": "localpw12345",
                "strategy": "local",
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn create_user_request(cookie: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/users")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_user_as_administrator() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "admin", "adminpw12345", Role::Administrator);
        let cookie = login(&tapp.app, "admin", "adminpw12345").await;

        let response = tapp
            .app
            .clone()
            .oneshot(create_user_request(
                &cookie,
                serde_json::json!({
                    "username": "newhire",
                    "email": "newhire@example.org",
                    "displayName": "New Hire",
                    "password": "a strong password",
                    "role": "ProjectManager",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["username"], "newhire");
        assert_eq!(body["role"], "ProjectManager");
        assert!(body.get("passwordHash").is_none());

        // The created account can log in with the supplied password.
        login(&tapp.app, "newhire", "a strong password").await;
    }

    #[tokio::test]
    async fn test_create_user_requires_can_manage_users() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "pm", "pmpw12345678", Role::ProjectManager);
        let cookie = login(&tapp.app, "pm", "pmpw12345678").await;

        let response = tapp
            .app
            .clone()
            .oneshot(create_user_request(
                &cookie,
                serde_json::json!({
                    "username": "newhire",
                    "email": "newhire@example.org",
                    "displayName": "New Hire",
                    "password": "a strong password",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_create_user_rejects_invalid_email() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "admin", "adminpw12345", Role::Administrator);
        let cookie = login(&tapp.app, "admin", "adminpw12345").await;

        let response = tapp
            .app
            .clone()
            .oneshot(create_user_request(
                &cookie,
                serde_json::json!({
                    "username": "newhire",
                    "email": "not-an-email",
                    "displayName": "New Hire",
                    "password": "a strong password",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_user_taken_username_is_conflict() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "admin", "adminpw12345", Role::Administrator);
        seed(&tapp.users, "carol", "carolpw12345", Role::User);
        let cookie = login(&tapp.app, "admin", "adminpw12345").await;

        let response = tapp
            .app
            .clone()
            .oneshot(create_user_request(
                &cookie,
                serde_json::json!({
                    "username": "CAROL",
                    "email": "carol2@example.org",
                    "displayName": "Carol",
                    "password": "a strong password",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Username is already taken");
    }

    fn patch_permissions(id: i64, cookie: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(format!("/users/{}/permissions", id))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_permissions_as_administrator() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "admin", "adminpw12345", Role::Administrator);
        let target = seed(&tapp.users, "carol", "carolpw12345", Role::User);
        let cookie = login(&tapp.app, "admin", "adminpw12345").await;

        let response = tapp
            .app
            .clone()
            .oneshot(patch_permissions(
                target,
                &cookie,
                serde_json::json!({
                    "role": "ProjectManager",
                    "customPermissions": { "canViewAuditLogs": true },
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["role"], "ProjectManager");
        assert_eq!(body["customPermissions"]["canViewAuditLogs"], true);
    }

    #[tokio::test]
    async fn test_update_permissions_requires_can_manage_users() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "pm", "pmpw12345678", Role::ProjectManager);
        let target = seed(&tapp.users, "carol", "carolpw12345", Role::User);
        let cookie = login(&tapp.app, "pm", "pmpw12345678").await;

        let response = tapp
            .app
            .clone()
            .oneshot(patch_permissions(
                target,
                &cookie,
                serde_json::json!({ "role": "Executive" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_update_permissions_rejects_unknown_role() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "admin", "adminpw12345", Role::Administrator);
        let target = seed(&tapp.users, "carol", "carolpw12345", Role::User);
        let cookie = login(&tapp.app, "admin", "adminpw12345").await;

        let response = tapp
            .app
            .clone()
            .oneshot(patch_permissions(
                target,
                &cookie,
                serde_json::json!({ "role": "Superuser" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_permissions_rejects_unknown_permission_key() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "admin", "adminpw12345", Role::Administrator);
        let target = seed(&tapp.users, "carol", "carolpw12345", Role::User);
        let cookie = login(&tapp.app, "admin", "adminpw12345").await;

        let response = tapp
            .app
            .clone()
            .oneshot(patch_permissions(
                target,
                &cookie,
                serde_json::json!({
                    "role": "User",
                    "customPermissions": { "canDoAnything": true },
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Unknown permission: canDoAnything");
    }

    #[tokio::test]
    async fn test_update_permissions_unknown_user_is_not_found() {
        let tapp = test_app(StaticDirectory::new());
        seed(&tapp.users, "admin", "adminpw12345", Role::Administrator);
        let cookie = login(&tapp.app, "admin", "adminpw12345").await;

        let response = tapp
            .app
            .clone()
            .oneshot(patch_permissions(
                9999,
                &cookie,
                serde_json::json!({ "role": "User" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
