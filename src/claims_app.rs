// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Control loop of the application.
//!
//! # Description
//!
//! The app runs one initial sync (a full backfill, or a live tick over a resumed ledger) and then, in live mode,
//! one incremental sync every poll interval. Syncs never overlap. After every successful sync the result is
//! published to the REST API, the metrics and the configured export files. A failed tick is logged and the
//! previous state is kept.

use crate::{
    CancellationToken, RxCancellationToken, SyncMode,
    abi_parser::{EventSchema, load_abi_from_json, select_event},
    api_rest::{ApiState, LedgerView, SharedLedger, start_api_server},
    configuration::{ClaimsConfiguration, EventSource},
    decode::ExistingEvent,
    error::ClaimsResult,
    error_codes,
    explorer_client::ExplorerClient,
    exports::{build_snapshot, read_existing_events, write_csv, write_events_json, write_snapshot},
    height_oracle::{HeightOracle, RpcHeightOracle, UnavailableOracle},
    log_source::LogSource,
    metrics::{MetricsConfig, MetricsHandle},
    sync::{ClaimSynchronizer, SyncResult},
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::{fs, sync::Arc, time::Duration};
use tokio::{signal::ctrl_c, sync::RwLock, time::sleep};
use tracing::{error, info, warn};

/// Loads the schema of the tracked event.
pub fn load_event_schema(source: &EventSource) -> Result<EventSchema> {
    match source {
        EventSource::Abi { path, event } => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read the ABI file {}", path.display()))?;
            let abi = load_abi_from_json(&text)?;
            Ok(select_event(&abi, event.as_deref())?)
        }
        EventSource::Signature(signature) => Ok(EventSchema::from_signature(signature)?),
    }
}

pub struct ClaimsApp {
    config: ClaimsConfiguration,
    synchronizer: ClaimSynchronizer,
    ledger: SharedLedger,
    metrics: MetricsHandle,
    cancellation_token: CancellationToken,
}

impl ClaimsApp {
    /// Builds a new instance of the app using the configuration.
    pub fn build_app(config: ClaimsConfiguration) -> Result<Self> {
        let log_source = Arc::new(ExplorerClient::new(
            &config.explorer_url,
            config.explorer_api_key.clone(),
            config.rate_limit_qps,
        )?);

        let height_oracle: Arc<dyn HeightOracle> = match &config.rpc_url {
            Some(rpc_url) => Arc::new(RpcHeightOracle::new(rpc_url)?),
            None => {
                warn!("No RPC endpoint configured, the chain head will be unknown");
                Arc::new(UnavailableOracle)
            }
        };

        Self::with_collaborators(config, log_source, height_oracle)
    }

    /// Builds the app over the given log source and height oracle.
    pub fn with_collaborators(
        config: ClaimsConfiguration,
        log_source: Arc<dyn LogSource>,
        height_oracle: Arc<dyn HeightOracle>,
    ) -> Result<Self> {
        let schema = load_event_schema(&config.event_source)?;
        info!(
            "Tracking {} ({}) of {} on {}",
            schema.name(),
            schema.signature(),
            config.contract,
            config.network
        );

        let metrics = MetricsHandle::new(&Self::metrics_config(&config))?;
        let synchronizer = ClaimSynchronizer::new(
            log_source,
            height_oracle,
            &config.contract,
            schema,
            config.page_size,
            config.decimals,
        );

        Ok(Self {
            config,
            synchronizer,
            ledger: Arc::new(RwLock::new(None)),
            metrics,
            cancellation_token: CancellationToken::default(),
        })
    }

    fn metrics_config(config: &ClaimsConfiguration) -> MetricsConfig {
        MetricsConfig {
            enabled: config.metrics,
            address: config.metrics_address.clone(),
            port: config.metrics_port,
            allow_origin: config.metrics_allow_origin.clone(),
        }
    }

    pub fn ledger(&self) -> SharedLedger {
        self.ledger.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Runs the app.
    pub async fn run(&self) -> Result<()> {
        self.metrics
            .serve(Self::metrics_config(&self.config))
            .await
            .context("Failure in the metrics server")?;

        if let Some(api_server) = &self.config.api_server {
            let state = ApiState {
                ledger: self.ledger.clone(),
                chain: self.config.network.clone(),
                contract: self.config.contract.clone(),
                decimals: self.config.decimals,
            };
            start_api_server(api_server, state, self.cancellation_token.clone())
                .await
                .context("Failure in the REST API server")?;
        }

        // Subscribed before the first sync so a Ctrl+C during the backfill is not lost.
        let mut cancelled = self.cancellation_token.subscribe();
        let ctrl_c_task = ClaimsApp::spawn_ctrl_c_handler(self.cancellation_token.clone());

        let result = tokio::select! {
            biased;
            _ = cancelled.recv() => {
                warn!("{} interrupted", SyncMode::Initial);
                ctrl_c_task.abort();
                return Ok(());
            }
            result = self.initial_sync() => match result {
                Ok(result) => result,
                Err(e) => {
                    error!("{} failed: {e}", SyncMode::Initial);
                    std::process::exit(error_codes::ERROR_CODE_INITIAL_SYNC_FAILED);
                }
            },
        };

        if self.config.live {
            self.live_loop(result, cancelled).await;
        } else {
            self.cancellation_token.graceful_shutdown();
        }

        ctrl_c_task.abort();
        info!("Shutdown complete");

        Ok(())
    }

    /// Runs the first sync of the session and publishes its result.
    ///
    /// With a resumed ledger, a live tick is run over it instead of a full backfill.
    pub async fn initial_sync(&self) -> ClaimsResult<SyncResult> {
        let result = match &self.config.resume {
            Some(path) => {
                let existing = read_existing_events(path)?;
                info!(
                    "Resuming from {} known events in {}",
                    existing.len(),
                    path.display()
                );
                self.synchronizer
                    .incremental_sync(existing, self.config.confirmation_blocks)
                    .await?
            }
            None => {
                info!(
                    "{} from block {}",
                    SyncMode::Initial,
                    self.config.from_block
                );
                self.synchronizer
                    .initial_sync(self.config.from_block, None)
                    .await?
            }
        };

        self.publish(&result).await;
        Ok(result)
    }

    /// Polls for new claims until a shutdown reaches `cancelled`.
    ///
    /// The receiver must be subscribed before the loop is entered, otherwise an earlier shutdown is missed.
    pub async fn live_loop(&self, mut current: SyncResult, mut cancelled: RxCancellationToken) {
        let poll_interval = Duration::from_secs(self.config.poll_interval);
        info!("{} every {}s", SyncMode::Live, self.config.poll_interval);

        loop {
            tokio::select! {
                biased;
                _ = cancelled.recv() => break,
                _ = sleep(poll_interval) => {}
            }

            let existing = current
                .events
                .iter()
                .cloned()
                .map(ExistingEvent::from)
                .collect();
            match self
                .synchronizer
                .incremental_sync(existing, self.config.confirmation_blocks)
                .await
            {
                Ok(result) => {
                    if result.aggregates.claims_count != current.aggregates.claims_count {
                        info!(
                            "{} claims known, cursor at block {}",
                            result.aggregates.claims_count, result.cursor.last_block
                        );
                    }
                    self.publish(&result).await;
                    current = result;
                }
                Err(e) => warn!("{} tick failed, keeping the previous state: {e}", SyncMode::Live),
            }
        }
    }

    async fn publish(&self, result: &SyncResult) {
        *self.ledger.write().await = Some(LedgerView {
            result: result.clone(),
            updated_at: Utc::now(),
        });
        self.metrics
            .record_sync(self.config.chain_id, &self.config.contract, result);

        if let Err(e) = self.write_exports(result) {
            error!("Failed to write the exports: {e}");
        }
    }

    fn write_exports(&self, result: &SyncResult) -> ClaimsResult<()> {
        if let Some(path) = &self.config.snapshot_out {
            let snapshot = build_snapshot(
                &self.config.network,
                &self.config.contract,
                &result.events,
                self.config.decimals,
            );
            write_snapshot(path, &snapshot)?;
        }
        if let Some(path) = &self.config.csv_out {
            write_csv(path, &result.events)?;
        }
        if let Some(path) = &self.config.events_out {
            write_events_json(path, &result.events)?;
        }
        Ok(())
    }

    fn spawn_ctrl_c_handler(cancellation_token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            ctrl_c().await.ok();
            warn!("Received Ctrl+C, shutting down gracefully...");
            cancellation_token.graceful_shutdown();
        })
    }
}
