#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::module_inception)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::Result;
    use axum::body::Bytes;
    use axum::http::StatusCode;
    use axum::middleware;
    use axum::routing::get;
    use axum::Router;
    use axum_test::TestServer;
    use base64::prelude::*;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};

    use crate::password::PasswordHasher;
    use crate::store::Store;
    use crate::token::TokenService;

    use crate::http::gateway::require_bearer;
    use crate::http::{router, AppState};

    const SECRET: &str = "test-signing-secret";

    async fn test_state() -> Result<(TempDir, AppState)> {
        let dir = tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let store = Store::connect(&url).await?;
        Ok((
            dir,
            AppState {
                store,
                tokens: TokenService::new(SECRET, 24),
                hasher: PasswordHasher::new(4),
            },
        ))
    }

    async fn seed_user(state: &AppState, username: &str, password: &str) -> Result<()> {
        let digest = state.hasher.hash(password)?;
        state.store.create_user(username, &digest).await?;
        Ok(())
    }

    fn basic(username: &str, password: &str) -> String {
        format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{username}:{password}"))
        )
    }

    #[tokio::test]
    async fn health_is_open_and_ok() -> Result<()> {
        let (_dir, state) = test_state().await?;
        let server = TestServer::new(router(state))?;

        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body.get("status"), Some(&Value::String("ok".into())));
        Ok(())
    }

    #[tokio::test]
    async fn login_returns_token_accepted_by_verify() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "alice", "pw1").await?;
        let server = TestServer::new(router(state))?;

        let response = server
            .post("/login")
            .json(&json!({"username": "alice", "password": "pw1"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        let token = body.get("token").and_then(Value::as_str).unwrap_or_default();
        assert!(!token.is_empty());
        assert_eq!(
            body.pointer("/user/username"),
            Some(&Value::String("alice".into()))
        );
        assert!(body.pointer("/user/created_at").is_some());

        let verified = server
            .get("/verify")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;
        assert_eq!(verified.status_code(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "alice", "pw1").await?;
        let server = TestServer::new(router(state))?;

        let wrong_password = server
            .post("/login")
            .json(&json!({"username": "alice", "password": "nope"}))
            .await;
        let unknown_user = server
            .post("/login")
            .json(&json!({"username": "mallory", "password": "nope"}))
            .await;

        assert_eq!(wrong_password.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_user.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.text(), unknown_user.text());
        Ok(())
    }

    #[tokio::test]
    async fn login_with_malformed_body_is_bad_request() -> Result<()> {
        let (_dir, state) = test_state().await?;
        let server = TestServer::new(router(state))?;

        let response = server
            .post("/login")
            .bytes(Bytes::from_static(b"{not json"))
            .content_type("application/json")
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn bearer_gateway_rejects_bad_tokens() -> Result<()> {
        let (_dir, state) = test_state().await?;
        let tokens = state.tokens.clone();
        let server = TestServer::new(router(state))?;

        let missing = server.get("/verify").await;
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
        let body: Value = missing.json();
        assert_eq!(
            body.get("error"),
            Some(&Value::String("Authorization header required".into()))
        );

        let mut tampered = tokens.issue("alice")?;
        let flipped = if tampered.ends_with('a') { 'b' } else { 'a' };
        tampered.pop();
        tampered.push(flipped);
        let response = server
            .get("/verify")
            .add_header("Authorization", format!("Bearer {tampered}"))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(
            body.get("error"),
            Some(&Value::String("Invalid token".into()))
        );

        let foreign = TokenService::new("some-other-secret", 24).issue("alice")?;
        let response = server
            .get("/verify")
            .add_header("Authorization", format!("Bearer {foreign}"))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

        let expired = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &json!({
                "username": "alice",
                "exp": chrono::Utc::now().timestamp() - 3600,
            }),
            &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
        )?;
        let response = server
            .get("/verify")
            .add_header("Authorization", format!("Bearer {expired}"))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_the_downstream_handler() -> Result<()> {
        let (_dir, state) = test_state().await?;
        let token = state.tokens.issue("alice")?;

        let invocations = Arc::new(AtomicUsize::new(0));
        let handler_invocations = Arc::clone(&invocations);
        let app = Router::new()
            .route(
                "/protected",
                get(move || {
                    let invocations = Arc::clone(&handler_invocations);
                    async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        StatusCode::OK
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(state, require_bearer));
        let server = TestServer::new(app)?;

        let missing = server.get("/protected").await;
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
        let garbage = server
            .get("/protected")
            .add_header("Authorization", "Bearer garbage")
            .await;
        assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(invocations.load(Ordering::SeqCst), 0);

        let accepted = server
            .get("/protected")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;
        assert_eq!(accepted.status_code(), StatusCode::OK);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unprefixed_token_passes_verification_unchanged() -> Result<()> {
        let (_dir, state) = test_state().await?;
        let token = state.tokens.issue("alice")?;
        let server = TestServer::new(router(state))?;

        // replace-once semantics: no "Bearer " prefix to strip, the raw value
        // is handed to verification and happens to be a valid token
        let response = server
            .get("/verify")
            .add_header("Authorization", token.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        // a differently-cased prefix is not stripped and fails verification
        let response = server
            .get("/verify")
            .add_header("Authorization", format!("bearer {token}"))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    // the bearer gateway trusts the signature, not a live lookup
    #[tokio::test]
    async fn deleted_users_token_remains_valid_until_expiry() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "bob", "pw1").await?;
        let store = state.store.clone();
        let tokens = state.tokens.clone();
        let server = TestServer::new(router(state))?;

        let token = tokens.issue("bob")?;
        store.delete_user("bob").await?;

        let response = server
            .get("/verify")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn visit_counter_is_gated_and_counts_sequentially() -> Result<()> {
        let (_dir, state) = test_state().await?;
        let token = state.tokens.issue("alice")?;
        let server = TestServer::new(router(state))?;

        let anonymous = server.get("/").await;
        assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

        for expected in 1..=3 {
            let response = server
                .get("/")
                .add_header("Authorization", format!("Bearer {token}"))
                .await;
            assert_eq!(response.status_code(), StatusCode::OK);
            let body: Value = response.json();
            assert_eq!(body.get("count"), Some(&Value::Number(expected.into())));
        }
        Ok(())
    }

    #[tokio::test]
    async fn admin_requires_basic_auth() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "admin", "secret").await?;
        let server = TestServer::new(router(state))?;

        let unauthorized = server.get("/admin").await;
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            unauthorized.header("www-authenticate"),
            "Basic realm=\"Restricted\""
        );

        let wrong_password = server
            .get("/admin")
            .add_header("Authorization", basic("admin", "wrong"))
            .await;
        let unknown_user = server
            .get("/admin")
            .add_header("Authorization", basic("nobody", "wrong"))
            .await;
        assert_eq!(wrong_password.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_user.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.text(), unknown_user.text());

        let authorized = server
            .get("/admin")
            .add_header("Authorization", basic("admin", "secret"))
            .await;
        assert_eq!(authorized.status_code(), StatusCode::OK);
        assert!(authorized.text().contains("admin"));
        Ok(())
    }

    #[tokio::test]
    async fn created_user_can_log_in() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "admin", "secret").await?;
        let server = TestServer::new(router(state))?;

        let created = server
            .post("/admin/users")
            .add_header("Authorization", basic("admin", "secret"))
            .form(&[("username", "carol"), ("password", "pw2")])
            .await;
        assert_eq!(created.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(created.header("location"), "/admin");

        let listing = server
            .get("/admin")
            .add_header("Authorization", basic("admin", "secret"))
            .await;
        assert!(listing.text().contains("carol"));

        let login = server
            .post("/login")
            .json(&json!({"username": "carol", "password": "pw2"}))
            .await;
        assert_eq!(login.status_code(), StatusCode::OK);

        let bad_login = server
            .post("/login")
            .json(&json!({"username": "carol", "password": "wrong"}))
            .await;
        assert_eq!(bad_login.status_code(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn create_user_requires_both_fields() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "admin", "secret").await?;
        let server = TestServer::new(router(state))?;

        let missing_password = server
            .post("/admin/users")
            .add_header("Authorization", basic("admin", "secret"))
            .form(&[("username", "dave")])
            .await;
        assert_eq!(missing_password.status_code(), StatusCode::BAD_REQUEST);

        let empty_username = server
            .post("/admin/users")
            .add_header("Authorization", basic("admin", "secret"))
            .form(&[("username", ""), ("password", "pw")])
            .await;
        assert_eq!(empty_username.status_code(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn delete_user_removes_credentials() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "admin", "secret").await?;
        seed_user(&state, "erin", "pw3").await?;
        let server = TestServer::new(router(state))?;

        let deleted = server
            .post("/admin/users/delete")
            .add_header("Authorization", basic("admin", "secret"))
            .form(&[("username", "erin")])
            .await;
        assert_eq!(deleted.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(deleted.header("location"), "/admin");

        let login = server
            .post("/login")
            .json(&json!({"username": "erin", "password": "pw3"}))
            .await;
        assert_eq!(login.status_code(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_admin_is_refused() -> Result<()> {
        let (_dir, state) = test_state().await?;
        seed_user(&state, "admin", "secret").await?;
        let store = state.store.clone();
        let server = TestServer::new(router(state))?;

        let refused = server
            .post("/admin/users/delete")
            .add_header("Authorization", basic("admin", "secret"))
            .form(&[("username", "admin")])
            .await;
        assert_eq!(refused.status_code(), StatusCode::BAD_REQUEST);

        // the row is untouched and the credentials still work
        assert!(store.find_user("admin").await?.is_some());
        let login = server
            .post("/login")
            .json(&json!({"username": "admin", "password": "secret"}))
            .await;
        assert_eq!(login.status_code(), StatusCode::OK);
        Ok(())
    }
}
