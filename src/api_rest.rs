// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Read-only REST API over the latest sync result.

use crate::{
    CancellationToken,
    claims_aggregate::{ClaimsAggregate, build_cumulative_series, serialize_decimal},
    exports::{Snapshot, build_snapshot, events_to_csv},
    sync::{Cursor, SyncResult},
};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Latest successful sync, as published by the control loop.
#[derive(Debug, Clone)]
pub struct LedgerView {
    pub result: SyncResult,
    pub updated_at: DateTime<Utc>,
}

pub type SharedLedger = Arc<RwLock<Option<LedgerView>>>;

#[derive(Clone)]
pub struct ApiState {
    pub ledger: SharedLedger,
    pub chain: String,
    pub contract: String,
    pub decimals: u32,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct AggregateResponse {
    pub aggregates: ClaimsAggregate,
    pub cursor: Cursor,
    pub chain_head: Option<u64>,
    /// RFC3339 time of the sync.
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct SeriesPointResponse {
    pub timestamp: u64,
    /// RFC3339 form of `timestamp`.
    pub time: String,
    #[serde(serialize_with = "serialize_decimal")]
    pub cumulative: BigDecimal,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn not_synced() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "No sync has completed yet".to_string(),
        }),
    )
}

fn rfc3339(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

async fn snapshot_handler(State(state): State<ApiState>) -> Result<Json<Snapshot>, ApiError> {
    let ledger = state.ledger.read().await;
    let view = ledger.as_ref().ok_or_else(not_synced)?;

    Ok(Json(build_snapshot(
        &state.chain,
        &state.contract,
        &view.result.events,
        state.decimals,
    )))
}

async fn aggregate_handler(
    State(state): State<ApiState>,
) -> Result<Json<AggregateResponse>, ApiError> {
    let ledger = state.ledger.read().await;
    let view = ledger.as_ref().ok_or_else(not_synced)?;

    Ok(Json(AggregateResponse {
        aggregates: view.result.aggregates.clone(),
        cursor: view.result.cursor,
        chain_head: view.result.chain_head,
        updated_at: view.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

async fn series_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<SeriesPointResponse>>, ApiError> {
    let ledger = state.ledger.read().await;
    let view = ledger.as_ref().ok_or_else(not_synced)?;

    let series = build_cumulative_series(&view.result.events, state.decimals)
        .into_iter()
        .map(|point| SeriesPointResponse {
            timestamp: point.timestamp,
            time: rfc3339(point.timestamp),
            cumulative: point.cumulative,
        })
        .collect();

    Ok(Json(series))
}

async fn claims_csv_handler(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let ledger = state.ledger.read().await;
    let view = ledger.as_ref().ok_or_else(not_synced)?;

    Ok((
        [(CONTENT_TYPE, "text/csv; charset=utf-8")],
        events_to_csv(&view.result.events),
    )
        .into_response())
}

/// Creates and returns the REST API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/snapshot", get(snapshot_handler))
        .route("/aggregate", get(aggregate_handler))
        .route("/series", get(series_handler))
        .route("/claims.csv", get(claims_csv_handler))
        .with_state(state)
}

/// Starts the REST API server in a separate task.
///
/// The server stops when the cancellation token fires.
pub async fn start_api_server(
    server_address: &str,
    state: ApiState,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .with_context(|| format!("Failed to bind the API server to {server_address}"))?;
    info!("REST API server listening on {server_address}");

    let app = create_router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancellation_token))
            .await
        {
            error!("API server error: {e}");
        }
    });

    Ok(())
}

async fn shutdown_signal(cancellation_token: CancellationToken) {
    let _ = cancellation_token.subscribe().recv().await;
    info!("API server shutdown signal received");
}
