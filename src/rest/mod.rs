// rest/mod.rs — Producer-facing update API.
//
// Axum HTTP server on the API port (local only unless the bind address is
// widened). Producers report task lifecycle events here; every successful
// mutation is pushed to observers through the feed.
//
// Endpoints:
//   POST   /api/task/:id
//   POST   /api/task/:id/log
//   POST   /api/task/:id/complete
//   POST   /api/task/:id/fail
//   DELETE /api/tasks/clear
//   GET    /api/health

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_api_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.api_port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("update API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(routes::health::health))
        // Task lifecycle
        .route("/api/task/:id", post(routes::tasks::upsert_task))
        .route("/api/task/:id/log", post(routes::tasks::append_log))
        .route("/api/task/:id/complete", post(routes::tasks::complete_task))
        .route("/api/task/:id/fail", post(routes::tasks::fail_task))
        .route("/api/tasks/clear", delete(routes::tasks::clear_finished))
        // Dashboards are served from other origins
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
