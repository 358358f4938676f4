use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::session;
use crate::sfu::Sfu;

/// The server surface: the signaling upgrade endpoint plus liveness and
/// metrics probes. Origin checking is permissive; access control belongs to
/// whatever hands out room ids.
pub fn build_router(sfu: Sfu) -> Router {
    Router::new()
        .route("/websocket/{room_id}", get(session::ws_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(sfu)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %err, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
