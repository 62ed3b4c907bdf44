// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! HTTP client for the `getLogs` endpoint of Etherscan-family explorers (Etherscan, Blockscout).

use crate::{
    constants::EXPLORER_REQUEST_TIMEOUT,
    error::ClaimsResult,
    log_source::{LogQuery, LogSource, RawLogRecord},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Message returned by the explorers when a query matches no logs.
const NO_RECORDS_MESSAGE: &str = "No records found";

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Value,
}

/// Parses the body of a `getLogs` response.
///
/// A `result` that is not a list (an error string, `null`, ...) is read as an empty page. Entries of the list that
/// are not log objects are dropped.
pub fn parse_logs_response(body: &str) -> ClaimsResult<Vec<RawLogRecord>> {
    let envelope: ExplorerEnvelope = serde_json::from_str(body)?;

    let items = match envelope.result {
        Value::Array(items) => items,
        other => {
            let message = envelope.message.unwrap_or_default();
            if envelope.status.as_deref() == Some("0") && message != NO_RECORDS_MESSAGE {
                warn!("Explorer returned no logs: {message} ({other})");
            }
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawLogRecord>(item) {
            Ok(log) => Some(log),
            Err(e) => {
                debug!("Dropping malformed log entry: {e}");
                None
            }
        })
        .collect())
}

/// Log source backed by an explorer's `module=logs&action=getLogs` API.
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    rate_limit_qps: f64,
}

impl ExplorerClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        rate_limit_qps: f64,
    ) -> ClaimsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EXPLORER_REQUEST_TIMEOUT))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rate_limit_qps,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query_params(&self, query: &LogQuery, page: u64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("module", "logs".to_string()),
            ("action", "getLogs".to_string()),
            ("address", query.address.clone()),
            ("fromBlock", query.from_block.to_string()),
            ("toBlock", query.to_block.to_string()),
            ("page", page.to_string()),
            ("offset", query.page_size.to_string()),
            ("sort", "asc".to_string()),
        ];
        if !query.topic0.is_empty() {
            params.push(("topic0", query.topic0.clone()));
        }
        if let Some(api_key) = &self.api_key {
            params.push(("apikey", api_key.expose_secret().to_string()));
        }
        params
    }
}

#[async_trait]
impl LogSource for ExplorerClient {
    async fn get_logs_page(&self, query: &LogQuery, page: u64) -> ClaimsResult<Vec<RawLogRecord>> {
        let body = self
            .http
            .get(&self.base_url)
            .query(&self.query_params(query, page))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_logs_response(&body)
    }

    fn rate_limit_qps(&self) -> f64 {
        self.rate_limit_qps
    }
}
