//! Dashboard API: axum HTTP server exposing the price board as JSON.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::board::{LoadState, PriceBoard, RefreshOutcome};
use crate::data::PriceQuery;
use crate::prices::PriceFilter;

pub fn router(board: PriceBoard) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/records", get(records_handler))
        .route("/api/movers", get(movers_handler))
        .route("/api/series", get(series_handler))
        .route("/api/view", get(view_handler))
        .route("/api/filter", post(filter_handler))
        .route("/api/query", post(query_handler))
        .route("/api/refresh", post(refresh_handler))
        .layer(CorsLayer::permissive())
        .with_state(board)
}

/// Spawn the dashboard HTTP server. Returns a handle that can be aborted.
pub fn spawn_dashboard(board: PriceBoard, bind: &str, port: u16) -> JoinHandle<()> {
    let addr = format!("{bind}:{port}");

    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => {
                info!(addr = %addr, "Dashboard server listening");
                l
            }
            Err(e) => {
                warn!(error = %e, addr = %addr, "Failed to bind dashboard server");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, router(board)).await {
            warn!(error = %e, "Dashboard server error");
        }
    })
}

// -- Route Handlers --

async fn health_handler(State(board): State<PriceBoard>) -> impl IntoResponse {
    Json(board.health().await)
}

async fn records_handler(
    State(board): State<PriceBoard>,
    Query(filter): Query<PriceFilter>,
) -> Response {
    match board.view_for(&filter).await {
        Ok(view) => Json(json!({
            "status": "ok",
            "filter": view.filter,
            "count": view.records.len(),
            "records": view.records,
        }))
        .into_response(),
        Err(state) => not_loaded(state),
    }
}

async fn movers_handler(
    State(board): State<PriceBoard>,
    Query(filter): Query<PriceFilter>,
) -> Response {
    match board.view_for(&filter).await {
        Ok(view) => Json(view.comparison).into_response(),
        Err(state) => not_loaded(state),
    }
}

async fn series_handler(
    State(board): State<PriceBoard>,
    Query(filter): Query<PriceFilter>,
) -> Response {
    match board.series_for(&filter).await {
        Ok(Ok(series)) => Json(json!({"status": "ready", "series": series})).into_response(),
        Ok(Err(e)) => Json(json!({
            "status": "insufficient_data",
            "distinct_dates": e.distinct_dates,
        }))
        .into_response(),
        Err(state) => not_loaded(state),
    }
}

/// The board's own view, built with its stored filter.
async fn view_handler(State(board): State<PriceBoard>) -> impl IntoResponse {
    Json(board.state().await)
}

/// Replace the stored filter. Recomputes from cached records, no fetch.
async fn filter_handler(
    State(board): State<PriceBoard>,
    Json(filter): Json<PriceFilter>,
) -> Response {
    match board.apply_filter(filter).await {
        Some(view) => Json(view).into_response(),
        None => not_loaded(board.state().await),
    }
}

/// Replace the upstream query and refetch with it.
async fn query_handler(
    State(board): State<PriceBoard>,
    Json(query): Json<PriceQuery>,
) -> Response {
    board.set_query(query).await;
    refresh_response(&board).await
}

async fn refresh_handler(State(board): State<PriceBoard>) -> Response {
    refresh_response(&board).await
}

async fn refresh_response(board: &PriceBoard) -> Response {
    match board.refresh().await {
        RefreshOutcome::Published => Json(json!({"status": "ok"})).into_response(),
        RefreshOutcome::Superseded => {
            (StatusCode::CONFLICT, Json(json!({"status": "superseded"}))).into_response()
        }
        RefreshOutcome::Failed => not_loaded(board.state().await),
    }
}

/// Fetch errors are fatal to every view; loading is retryable.
fn not_loaded(state: LoadState) -> Response {
    match state {
        LoadState::Failed { error } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"status": "error", "error": error})),
        )
            .into_response(),
        LoadState::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "loading"})),
        )
            .into_response(),
        LoadState::Loaded(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "error": "unexpected board state"})),
        )
            .into_response(),
    }
}
