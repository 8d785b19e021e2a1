//! Test harnesses for integration testing.
//!
//! `TestHarness` runs the full router, the change feed bridge and the
//! in-memory store in process. `PostgresHarness` uses a shared testcontainers
//! Postgres, started once and migrated once for the whole run.

#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use helpdesk_core::domains::tickets::{ChangeFeedBridge, TICKET_CHANGES_TOPIC};
use helpdesk_core::kernel::{ServerDeps, TestDependencies};
use helpdesk_core::server::build_app;
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;
use tower::ServiceExt;

fn init_tracing() {
    // Run tests with: RUST_LOG=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// In-process harness
// =============================================================================

/// Full application over the in-memory store.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let (status, body) = ctx.get_json("/api/tickets").await;
/// }
/// ```
pub struct TestHarness {
    pub deps: TestDependencies,
    pub app: Router,
    bridge: JoinHandle<()>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await
    }

    async fn teardown(self) {
        self.bridge.abort();
    }
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_deps(TestDependencies::new()).await
    }

    pub async fn with_deps(deps: TestDependencies) -> Self {
        init_tracing();
        let server_deps = deps.server_deps();
        let bridge =
            ChangeFeedBridge::spawn(server_deps.store.clone(), server_deps.stream_hub.clone()).await;
        let app = build_app(server_deps, &[]);
        Self { deps, app, bridge }
    }

    pub fn server_deps(&self) -> ServerDeps {
        self.deps.server_deps()
    }

    /// Subscribe to the hub topic the bridge publishes on.
    pub async fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.deps.stream_hub.subscribe(TICKET_CHANGES_TOPIC).await
    }

    /// Next hub event, failing the test if none arrives within a second.
    pub async fn next_event(rx: &mut broadcast::Receiver<Value>) -> Value {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no change event within 1s")
            .expect("change feed closed")
    }

    /// Assert nothing else is published within a short window.
    pub async fn assert_no_event(rx: &mut broadcast::Receiver<Value>) {
        let waited = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(waited.is_err(), "unexpected change event: {:?}", waited);
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is not JSON")
        };
        (status, body)
    }

    pub async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}

// =============================================================================
// Postgres harness
// =============================================================================

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        init_tracing();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Fresh pool against the shared, migrated database.
///
/// Tests share one database, so they must not assume an empty ticket table.
pub struct PostgresHarness {
    pub db_pool: PgPool,
}

impl AsyncTestContext for PostgresHarness {
    async fn setup() -> Self {
        let infra = SharedTestInfra::get().await;
        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .expect("Failed to connect to test database");
        Self { db_pool }
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}
