// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module for the paginated log fetcher.
//!
//! # Description
//!
//! Explorer APIs serve logs in pages. A [LogSource] only needs to know how to fetch a single page; the paging
//! itself (ordering, de-duplication across pages, stop conditions and throttling) is shared by every source
//! through [LogSource::fetch_logs_paginated].

use crate::{constants::MAX_LOG_PAGES, error::ClaimsResult};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{collections::HashSet, time::Duration};
use tokio::time::sleep;
use tracing::{debug, warn};

/// One on-chain log entry as served by the explorer API.
///
/// Numeric fields are accepted as JSON integers, decimal strings or `0x` hex strings. Values that can't be parsed
/// are read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<Option<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data: String,
    #[serde(rename = "blockNumber", default, deserialize_with = "lenient_u64")]
    pub block_number: u64,
    #[serde(rename = "transactionHash", default, deserialize_with = "lenient_string")]
    pub transaction_hash: String,
    #[serde(rename = "logIndex", default, deserialize_with = "lenient_u64")]
    pub log_index: u64,
    #[serde(rename = "timeStamp", default, deserialize_with = "lenient_u64")]
    pub timestamp: u64,
}

impl RawLogRecord {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().and_then(Option::as_deref)
    }
}

/// Parses an integer given as a decimal or `0x`-prefixed hex string. Returns 0 on failure.
pub fn parse_numeric_str(value: &str) -> u64 {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).unwrap_or(0),
        None => value.parse().unwrap_or(0),
    }
}

/// Parses an integer from a JSON value that may be a number, a decimal string or a hex string.
pub fn parse_numeric_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => parse_numeric_str(s),
        _ => 0,
    }
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(parse_numeric_value).unwrap_or(0))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Parameters of a log search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: String,
    /// Topic hash of the event. An empty string requests the logs of every event of the address.
    pub topic0: String,
    pub from_block: u64,
    pub to_block: u64,
    pub page_size: u64,
}

/// Delay between page requests for a queries-per-second budget. Non-positive budgets disable throttling.
pub fn throttle_interval(rate_limit_qps: f64) -> Option<Duration> {
    if rate_limit_qps > 0.0 && rate_limit_qps.is_finite() {
        Some(Duration::from_secs_f64(1.0 / rate_limit_qps))
    } else {
        None
    }
}

/// Capability of retrieving the logs of a contract from an explorer API.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetches a single page of logs. Pages are numbered from 1.
    async fn get_logs_page(&self, query: &LogQuery, page: u64) -> ClaimsResult<Vec<RawLogRecord>>;

    /// Queries per second allowed against the source. A zero or negative value disables throttling.
    fn rate_limit_qps(&self) -> f64 {
        0.0
    }

    /// Retrieves all the logs matching the query.
    ///
    /// # Description
    ///
    /// Pages are requested in increasing order. Logs are de-duplicated by `(transactionHash, logIndex)` across
    /// pages. The paging stops when a page is empty, when a page yields no new logs (some providers keep serving
    /// the last page), or after [MAX_LOG_PAGES] pages.
    async fn fetch_logs_paginated(&self, query: &LogQuery) -> ClaimsResult<Vec<RawLogRecord>> {
        let throttle = throttle_interval(self.rate_limit_qps());
        let mut collected: Vec<RawLogRecord> = Vec::new();
        let mut seen: HashSet<(String, u64)> = HashSet::new();
        let mut exhausted = false;

        for page in 1..=MAX_LOG_PAGES {
            if let Some(delay) = throttle {
                sleep(delay).await;
            }

            let logs = self.get_logs_page(query, page).await?;
            if logs.is_empty() {
                exhausted = true;
                break;
            }

            let mut added = 0usize;
            for log in logs {
                if seen.insert((log.transaction_hash.clone(), log.log_index)) {
                    collected.push(log);
                    added += 1;
                }
            }

            debug!(
                "Page {page} for blocks [{}-{}] added {added} new logs",
                query.from_block, query.to_block
            );

            if added == 0 {
                exhausted = true;
                break;
            }
        }

        if !exhausted {
            warn!(
                "Stopped fetching logs for {} after {MAX_LOG_PAGES} pages",
                query.address
            );
        }

        Ok(collected)
    }
}
