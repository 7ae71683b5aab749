use axum::{
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;

use crate::fixtures::{BackendFixture, RecordedRequest};
use crate::handlers::{
    generate, generate_from_image, health_check, history, login, register, SharedFixture,
};

pub struct MockBackend {
    fixture: BackendFixture,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            fixture: BackendFixture::new(),
        }
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.fixture.add_user(username, password);
        self
    }

    /// Accept a bearer token without a login round trip
    pub fn with_token(mut self, token: &str) -> Self {
        self.fixture.issue_token(token);
        self
    }

    pub fn with_history_entry(mut self, record: Value) -> Self {
        self.fixture.seed_history(record);
        self
    }

    pub fn with_generation_delay(mut self, delay: Duration) -> Self {
        self.fixture.generation_delay = Some(delay);
        self
    }

    /// Make both generation routes fail with the given status
    pub fn with_generation_status(mut self, status: u16) -> Self {
        self.fixture.generation_status = Some(status);
        self
    }

    pub fn router(fixture: SharedFixture) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/generate/", post(generate))
            .route("/generate/image-to-image", post(generate_from_image))
            .route("/generate/history", get(history))
            .layer(CorsLayer::permissive())
            .with_state(fixture)
    }

    /// Bind to an ephemeral local port and serve in the background
    pub async fn start(self) -> anyhow::Result<RunningBackend> {
        self.start_on("127.0.0.1:0").await
    }

    pub async fn start_on(self, addr: &str) -> anyhow::Result<RunningBackend> {
        let fixture: SharedFixture = Arc::new(Mutex::new(self.fixture));
        let app = Self::router(fixture.clone());

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        log::info!("Mock backend listening on {}", addr);

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = result {
                log::error!("Mock backend stopped with error: {}", e);
            }
        });

        Ok(RunningBackend {
            addr,
            fixture,
            shutdown_tx: Some(shutdown_tx),
        })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a backend serving in the background; shuts down on drop
pub struct RunningBackend {
    addr: SocketAddr,
    fixture: SharedFixture,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl RunningBackend {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.fixture
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    /// Most recent request to `path`
    pub fn last_request(&self, path: &str) -> Option<RecordedRequest> {
        self.recorded_requests()
            .into_iter()
            .rev()
            .find(|r| r.path == path)
    }

    pub fn history(&self) -> Vec<Value> {
        self.fixture
            .lock()
            .map(|state| state.history().to_vec())
            .unwrap_or_default()
    }

    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for RunningBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}
