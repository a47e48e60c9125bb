#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use diesel::connection::SimpleConnection;
use http_body_util::BodyExt;
use onboarding::auth::jwt::JwtService;
use onboarding::config::AppConfig;
use onboarding::db::{self, PgPool};
use onboarding::events::{EventSink, LifecycleEvent};
use onboarding::routes;
use onboarding::state::AppState;
use onboarding::store::{MemoryStore, PgStore};
use onboarding::LifecycleCoordinator;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &LifecycleEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

impl RecordingSink {
    pub async fn names(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(|e| e.name()).collect()
    }

    pub async fn registration_token(&self, consultation_id: Uuid) -> Result<String> {
        self.events
            .lock()
            .await
            .iter()
            .rev()
            .filter(|event| event.consultation_id() == consultation_id)
            .find_map(|event| event.registration_token().map(str::to_owned))
            .ok_or_else(|| anyhow!("no invitation event for {consultation_id}"))
    }
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        token_secret: "test-secret".to_string(),
        token_issuer: "test-issuer".to_string(),
        admin_token_audience: "test-admin".to_string(),
        admin_token_expiry_minutes: 60,
        invitation_ttl_hours: 168,
        store_timeout_ms: 5000,
        cors_allowed_origin: None,
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingSink>,
    pub jwt: JwtService,
    router: Router,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let config = test_config("postgres://unused".to_string());

        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingSink::default());
        let jwt = JwtService::from_config(&config)?;
        let coordinator = LifecycleCoordinator::new(
            store.clone(),
            jwt.clone(),
            events.clone(),
            config.invitation_ttl(),
        );
        let state = AppState::new(config, coordinator, jwt.clone());
        let router = routes::create_router(state);

        Ok(Self {
            store,
            events,
            jwt,
            router,
        })
    }

    pub fn admin_token(&self) -> Result<String> {
        self.jwt.generate_admin_token("admin@test")
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Submits a consultation and returns its id.
    pub async fn submit(&self, name: &str, email: &str) -> Result<Uuid> {
        let response = self
            .post_json(
                "/api/consultations",
                &serde_json::json!({
                    "name": name,
                    "email": email,
                    "phone": "+15550100",
                    "locale": "en-US",
                    "intake": {
                        "target_roles": ["product manager"],
                        "package_tier": "standard",
                        "availability": ["weekday evenings"]
                    }
                }),
                None,
            )
            .await?;
        anyhow::ensure!(
            response.status() == axum::http::StatusCode::CREATED,
            "submit failed with status {}",
            response.status()
        );
        let body = body_json(response.into_body()).await?;
        let id = body["id"]
            .as_str()
            .context("submit response has no id")?
            .parse()?;
        Ok(id)
    }

    /// Submits and approves a consultation, returning its id and token.
    pub async fn approved(&self, name: &str, email: &str) -> Result<(Uuid, String)> {
        let id = self.submit(name, email).await?;
        let admin = self.admin_token()?;
        let response = self
            .post_json(
                &format!("/api/consultations/{id}/approve"),
                &serde_json::json!({ "admin_notes": "good fit" }),
                Some(&admin),
            )
            .await?;
        anyhow::ensure!(
            response.status() == axum::http::StatusCode::OK,
            "approve failed with status {}",
            response.status()
        );
        let token = self.events.registration_token(id).await?;
        Ok((id, token))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_json(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub type PgHarness = (LifecycleCoordinator, Arc<RecordingSink>, PgPool);

/// A coordinator over a real Postgres store, or `None` when
/// `TEST_DATABASE_URL` is unset. Tables are truncated first; hold
/// [`acquire_db_lock`] for the duration of the test.
pub async fn pg_coordinator() -> Result<Option<PgHarness>> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres test");
        return Ok(None);
    };
    let config = test_config(database_url);
    let pool = db::init_pool_with_size(&config.database_url, 8)?;
    prepare_database(&pool).await?;

    let store = Arc::new(PgStore::new(pool.clone(), config.store_timeout()));
    let events = Arc::new(RecordingSink::default());
    let jwt = JwtService::from_config(&config)?;
    let coordinator =
        LifecycleCoordinator::new(store, jwt, events.clone(), config.invitation_ttl());
    Ok(Some((coordinator, events, pool)))
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.batch_execute(
            "TRUNCATE TABLE notification_outbox, accounts, consultation_requests RESTART IDENTITY CASCADE;",
        )
        .context("failed to truncate tables")?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}
