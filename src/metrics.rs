// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT
//
//! Prometheus metrics exporter.
use crate::sync::SyncResult;
use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
    },
    response::Response,
    routing::get,
};
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use std::{net::SocketAddr, sync::Arc};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Configuration for the Prometheus metrics server.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub allow_origin: Option<String>,
}

#[derive(Clone, Default)]
pub struct MetricsHandle {
    inner: Option<Arc<MetricsInner>>,
}

#[derive(Clone)]
struct MetricsInner {
    registry: Registry,
    cursor_block: IntGaugeVec,
    chain_head_block: IntGaugeVec,
    claims_count: IntGaugeVec,
    unique_claimers: IntGaugeVec,
    allow_origin: Option<String>,
}

const LABELS: [&str; 2] = ["chain_id", "contract_address"];

fn register_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), &LABELS)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl MetricsHandle {
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self { inner: None });
        }

        let registry = Registry::new_custom(Some("claimwatch".to_string()), None)?;

        let cursor_block = register_gauge(
            &registry,
            "cursor_block",
            "Highest block holding a known claim for a contract in a specific chain.",
        )?;
        let chain_head_block = register_gauge(
            &registry,
            "chain_head_block",
            "Latest block reported by the height oracle. Reported by contract.",
        )?;
        let claims_count = register_gauge(
            &registry,
            "claims_count",
            "Number of distinct claims known for a contract.",
        )?;
        let unique_claimers = register_gauge(
            &registry,
            "unique_claimers",
            "Number of distinct claimer addresses of a contract.",
        )?;

        // Standard build info style metric: value is always 1.
        let build_info = IntGaugeVec::new(
            Opts::new("build_info", "Build information about the running binary."),
            &["version"],
        )?;
        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1);
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            inner: Some(Arc::new(MetricsInner {
                registry,
                cursor_block,
                chain_head_block,
                claims_count,
                unique_claimers,
                allow_origin: config.allow_origin.clone(),
            })),
        })
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Publishes the state of a finished sync. The chain head gauge keeps its value when the oracle was down.
    pub fn record_sync(&self, chain_id: u64, contract: &str, result: &SyncResult) {
        let Some(inner) = &self.inner else {
            return;
        };
        let chain_id_str = chain_id.to_string();
        let labels = [chain_id_str.as_str(), contract];

        inner
            .cursor_block
            .with_label_values(&labels)
            .set(result.cursor.last_block as i64);
        inner
            .claims_count
            .with_label_values(&labels)
            .set(result.aggregates.claims_count as i64);
        inner
            .unique_claimers
            .with_label_values(&labels)
            .set(result.aggregates.unique_claimers as i64);
        if let Some(head) = result.chain_head {
            inner
                .chain_head_block
                .with_label_values(&labels)
                .set(head as i64);
        }
    }

    pub async fn serve(&self, config: MetricsConfig) -> Result<Option<JoinHandle<()>>> {
        let Some(inner) = self.inner.clone() else {
            return Ok(None);
        };

        let addr: SocketAddr = format!("{}:{}", config.address, config.port).parse()?;
        let state = MetricsState {
            registry: inner.registry.clone(),
            allow_origin: inner.allow_origin.clone(),
        };

        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Metrics server listening on {addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server error: {e}");
            }
        });

        Ok(Some(handle))
    }

    #[cfg(test)]
    fn gather_text(&self) -> String {
        let Some(inner) = &self.inner else {
            return String::new();
        };
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&inner.registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

#[derive(Clone)]
struct MetricsState {
    registry: Registry,
    allow_origin: Option<String>,
}

fn plain_response(status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

async fn metrics_handler(State(state): State<MetricsState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {e}");
        return plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Body::from("failed to encode metrics"),
        );
    }

    let mut response = plain_response(StatusCode::OK, Body::from(buffer));
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }

    if let Some(origin) = state.allow_origin.as_ref() {
        let header_value =
            HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("*"));
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, header_value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        claims_aggregate::aggregate_claims,
        sync::Cursor,
        test_utils::claim_record,
    };
    use rstest::*;

    const CONTRACT: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

    fn config(enabled: bool) -> MetricsConfig {
        MetricsConfig {
            enabled,
            address: "127.0.0.1".to_string(),
            port: 0,
            allow_origin: None,
        }
    }

    fn result(chain_head: Option<u64>) -> SyncResult {
        let events = vec![
            claim_record("0xaa", 1, 10, 100, 0),
            claim_record("0xbb", 1, 11, 110, 0),
            claim_record("0xaa", 1, 12, 120, 0),
        ];
        SyncResult {
            aggregates: aggregate_claims(&events, 0),
            cursor: Cursor { last_block: 12 },
            chain_head,
            events,
        }
    }

    #[rstest]
    fn disabled_metrics_are_a_no_op() {
        let metrics = MetricsHandle::new(&config(false)).unwrap();

        metrics.record_sync(1, CONTRACT, &result(Some(20)));

        assert!(!metrics.is_enabled());
        assert!(metrics.gather_text().is_empty());
    }

    #[rstest]
    fn sync_results_are_published() {
        let metrics = MetricsHandle::new(&config(true)).unwrap();

        metrics.record_sync(1, CONTRACT, &result(Some(20)));
        let text = metrics.gather_text();

        let labels = format!("{{chain_id=\"1\",contract_address=\"{CONTRACT}\"}}");
        assert!(text.contains(&format!("claimwatch_cursor_block{labels} 12")));
        assert!(text.contains(&format!("claimwatch_chain_head_block{labels} 20")));
        assert!(text.contains(&format!("claimwatch_claims_count{labels} 3")));
        assert!(text.contains(&format!("claimwatch_unique_claimers{labels} 2")));
        assert!(text.contains("claimwatch_build_info"));
    }

    #[rstest]
    fn oracle_outage_keeps_the_last_chain_head() {
        let metrics = MetricsHandle::new(&config(true)).unwrap();

        metrics.record_sync(1, CONTRACT, &result(Some(20)));
        metrics.record_sync(1, CONTRACT, &result(None));

        assert!(metrics.gather_text().contains("claimwatch_chain_head_block{chain_id=\"1\""));
        assert!(metrics.gather_text().contains(" 20\n"));
    }
}
