//! REST API server for wrapup.
//!
//! Provides HTTP endpoints for:
//! - Meeting session lifecycle (start/end)
//! - Meeting history reads

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::meetings::MeetingApiState;

pub struct ApiServer {
    port: u16,
    state: MeetingApiState,
}

impl ApiServer {
    pub fn new(port: u16, state: MeetingApiState) -> Self {
        Self { port, state }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::meetings::router(self.state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                          - Service info");
        info!("  GET  /version                   - Version info");
        info!("  POST /meetings/:room_name/start - Start a meeting session");
        info!("  POST /meetings/:room_name/end   - End a meeting session");
        info!("  GET  /meetings                  - List meetings");
        info!("  GET  /meetings/:id              - Get a single meeting");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "wrapup",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "wrapup"
    }))
}
