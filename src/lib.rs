// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Library of the claimwatch crate.
//!
//! # Description
//!
//! claimwatch keeps an in-memory ledger of the claim events emitted by a contract. Logs are fetched from an
//! Etherscan-family explorer API, decoded against the event's ABI, merged with the known records and aggregated
//! using exact decimal arithmetic.

pub mod abi_parser;
pub use abi_parser::EventSchema;
pub mod api_rest;
pub mod claims_aggregate;
pub use claims_aggregate::ClaimsAggregate;
pub mod claims_app;
pub use claims_app::ClaimsApp;
pub mod cli;
pub mod configuration;
pub mod decode;
pub use decode::{ClaimRecord, ExistingEvent};
pub mod error;
pub use error::{ClaimsError, ClaimsResult};
pub mod explorer_client;
pub mod exports;
pub mod height_oracle;
pub use height_oracle::HeightOracle;
pub mod log_source;
pub use log_source::{LogQuery, LogSource, RawLogRecord};
pub mod metrics;
pub mod sync;
pub use sync::{ClaimSynchronizer, Cursor, SyncResult};
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_utils;

use strum_macros::Display;

/// Module with constants used throughout the application.
pub mod constants {
    /// Default number of logs requested per explorer page.
    pub const DEFAULT_PAGE_SIZE: u64 = 1000;
    /// Default queries per second allowed against the explorer API.
    pub const DEFAULT_RATE_LIMIT_QPS: f64 = 3.0;
    /// Default number of trailing blocks re-scanned on every live tick.
    pub const DEFAULT_CONFIRMATION_BLOCKS: u64 = 6;
    /// Default poll interval in seconds between live ticks.
    pub const DEFAULT_POLL_INTERVAL: u64 = 5;
    /// Default token decimals.
    pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;
    /// Default network template.
    pub const DEFAULT_NETWORK: &str = "mainnet";
    /// Block height used as "tip of the chain" when the height oracle is unavailable.
    pub const SENTINEL_CHAIN_HEAD: u64 = 999_999_999;
    /// Safety bound on the number of pages requested for a single log query.
    pub const MAX_LOG_PAGES: u64 = 10_000;
    /// Claim amounts are saturated to the signed 63-bit range.
    pub const MAX_AMOUNT_RAW: u64 = i64::MAX as u64;
    /// Timeout in seconds for the explorer HTTP requests.
    pub const EXPLORER_REQUEST_TIMEOUT: u64 = 30;
    /// Retries issued by the RPC client when asking for the chain head.
    pub const RPC_MAX_RETRIES: u32 = 3;
    /// Initial backoff in milliseconds for the RPC retries.
    pub const RPC_INITIAL_BACKOFF: u64 = 500;
    /// Compute units per second budget of the RPC retry layer.
    pub const RPC_COMPUTE_UNITS_PER_SECOND: u64 = 100;
}

/// Exit codes of the binary.
pub mod error_codes {
    pub const ERROR_CODE_WRONG_INPUT_ARGUMENTS: i32 = 2;
    pub const ERROR_CODE_FAILED_TO_LOAD_CONFIGURATION_FROM_FILE: i32 = 3;
    pub const ERROR_CODE_INITIAL_SYNC_FAILED: i32 = 4;
}

pub type RxCancellationToken = tokio::sync::broadcast::Receiver<()>;

/// Cancellation token for a graceful shutdown of the components of the app.
#[derive(Clone)]
pub struct CancellationToken(tokio::sync::broadcast::Sender<()>);

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self(tokio::sync::broadcast::Sender::new(1))
    }

    pub fn subscribe(&self) -> RxCancellationToken {
        self.0.subscribe()
    }

    pub fn graceful_shutdown(&self) {
        // Nobody listening is not an error at shutdown.
        let _ = self.0.send(());
    }
}

/// Sync running mode
///
/// # Description
///
/// The synchronizer runs in two modes:
/// - Initial: one-shot backfill from a start block up to the chain head.
/// - Live: incremental ticks that re-scan the trailing confirmation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum SyncMode {
    #[default]
    #[strum(to_string = "Initial sync")]
    Initial,
    #[strum(to_string = "Live sync")]
    Live,
}
