//! Test helper module for catalog-auth integration tests.
//!
//! Wires the real services over the in-memory ledger and credential store.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use catalog_auth::{
    build_router,
    config::{
        AuthConfig, CredentialsConfig, Environment, JwtConfig, LedgerBackend, LedgerConfig,
        SecurityConfig, SigningAlgorithm,
    },
    models::{Identity, Role, ShopId},
    services::{
        AuthService, InMemoryCredentialStore, InMemoryLedger, JwtService, RevocationLedger,
        TokenService,
    },
    utils::Password,
    AppState,
};
use chrono::Duration;
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-signing-secret-0123456789";
pub const TEST_ISSUER: &str = "catalog-auth";
pub const PASSWORD: &str = "correct-horse-battery";

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("catalog_auth=debug")
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        environment: Environment::Dev,
        service_name: "catalog-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        jwt: JwtConfig {
            algorithm: SigningAlgorithm::Hs256,
            secret: Some(Secret::new(TEST_SECRET.to_string())),
            private_key_path: None,
            public_key_path: None,
            issuer: TEST_ISSUER.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        ledger: LedgerConfig {
            backend: LedgerBackend::Memory,
            redis_url: None,
            gc_interval_seconds: 300,
        },
        credentials: CredentialsConfig { seed_path: None },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            require_verified_email: false,
        },
    }
}

pub fn test_jwt() -> JwtService {
    JwtService::from_secret(TEST_SECRET.as_bytes(), TEST_ISSUER)
}

/// Services wired together without the HTTP layer.
pub struct TestCore {
    pub credentials: Arc<InMemoryCredentialStore>,
    pub ledger: Arc<dyn RevocationLedger>,
    pub tokens: TokenService,
    pub auth: AuthService,
}

impl TestCore {
    pub fn new() -> Self {
        Self::with_ledger(Arc::new(InMemoryLedger::new(Duration::days(7))))
    }

    pub fn with_ledger(ledger: Arc<dyn RevocationLedger>) -> Self {
        Self::build(ledger, Duration::minutes(15))
    }

    /// Access tokens already expired at issuance.
    pub fn with_expired_access_tokens() -> Self {
        Self::build(
            Arc::new(InMemoryLedger::new(Duration::days(7))),
            Duration::seconds(-5),
        )
    }

    fn build(ledger: Arc<dyn RevocationLedger>, access_ttl: Duration) -> Self {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let tokens = TokenService::new(
            test_jwt(),
            ledger.clone(),
            credentials.clone(),
            access_ttl,
            Duration::days(7),
        );
        let auth = AuthService::new(tokens.clone(), credentials.clone(), false)
            .expect("Failed to build auth service");

        Self {
            credentials,
            ledger,
            tokens,
            auth,
        }
    }

    pub fn add_user(&self, email: &str, role: Role, shop: &str) -> Identity {
        self.credentials
            .register(email, &Password::new(PASSWORD), role, ShopId::from(shop))
            .expect("Failed to register test user")
    }
}

/// Full router over a fresh in-memory core.
pub struct TestApp {
    pub core: TestCore,
    pub router: Router,
}

impl TestApp {
    pub async fn spawn() -> Self {
        init_test_tracing();
        let core = TestCore::new();
        let state = AppState {
            config: test_config(),
            tokens: core.tokens.clone(),
            auth_service: core.auth.clone(),
            ledger: core.ledger.clone(),
        };
        let router = build_router(state)
            .await
            .expect("Failed to build router");

        Self { core, router }
    }

    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    pub async fn post(&self, path: &str, body: Value, bearer: Option<&str>) -> (StatusCode, Value) {
        self.request("POST", path, Some(body), bearer).await
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", path, None, bearer).await
    }

    /// Log in through the API and return the token response body.
    pub async fn login(&self, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/auth/login",
                serde_json::json!({ "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body
    }
}
