// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module with the sync orchestrator.
//!
//! # Description
//!
//! A sync fetches logs from the explorer, decodes them, merges them with the records the caller already holds and
//! recomputes the aggregates. Two modes are offered:
//! - [ClaimSynchronizer::initial_sync]: backfill from a start block up to the chain head.
//! - [ClaimSynchronizer::incremental_sync]: one live tick. The last `confirmation_blocks` blocks before the newest
//!   known record are fetched again so logs dropped or replaced by a short reorg are picked up; duplicates are
//!   removed by the `(tx_hash, log_index)` key.
//!
//! The synchronizer holds no mutable state. Inputs are taken by value and a new [SyncResult] is returned, so a
//! failed sync leaves the caller's previous state untouched.

use crate::{
    abi_parser::EventSchema,
    claims_aggregate::{ClaimsAggregate, aggregate_claims, deduplicate_events},
    constants::SENTINEL_CHAIN_HEAD,
    decode::{ClaimRecord, ExistingEvent, decode_logs},
    error::ClaimsResult,
    height_oracle::HeightOracle,
    log_source::{LogQuery, LogSource, RawLogRecord},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Highest block covered by a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub last_block: u64,
}

/// Outcome of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Merged and de-duplicated records.
    pub events: Vec<ClaimRecord>,
    pub aggregates: ClaimsAggregate,
    pub cursor: Cursor,
    /// Chain height reported by the oracle for this sync. `None` when the oracle was unavailable, in which case no
    /// new logs were fetched.
    pub chain_head: Option<u64>,
}

/// Block range re-scanned by a live tick.
///
/// Both ends are moved back by `confirmation_blocks`, saturating at 0.
pub fn fetch_window(last_known_block: u64, latest_block: u64, confirmation_blocks: u64) -> (u64, u64) {
    (
        last_known_block.saturating_sub(confirmation_blocks),
        latest_block.saturating_sub(confirmation_blocks),
    )
}

/// Highest block number of a record set.
pub fn max_block(records: &[ClaimRecord]) -> Option<u64> {
    records.iter().map(|r| r.block_number).max()
}

pub struct ClaimSynchronizer {
    log_source: Arc<dyn LogSource>,
    height_oracle: Arc<dyn HeightOracle>,
    contract_address: String,
    schema: EventSchema,
    page_size: u64,
    decimals: u32,
}

impl ClaimSynchronizer {
    pub fn new(
        log_source: Arc<dyn LogSource>,
        height_oracle: Arc<dyn HeightOracle>,
        contract_address: &str,
        schema: EventSchema,
        page_size: u64,
        decimals: u32,
    ) -> Self {
        Self {
            log_source,
            height_oracle,
            contract_address: contract_address.to_string(),
            schema,
            page_size,
            decimals,
        }
    }

    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Backfills the claims from `from_block` up to the chain head.
    ///
    /// When the oracle can't report the head, logs are requested up to [SENTINEL_CHAIN_HEAD]. Passing the events
    /// of a previous result as `existing` over the same range yields the same aggregates.
    pub async fn initial_sync(
        &self,
        from_block: u64,
        existing: Option<Vec<ClaimRecord>>,
    ) -> ClaimsResult<SyncResult> {
        let latest = self.height_oracle.get_latest_block_number().await;
        let to_block = if latest == 0 {
            warn!("Chain head unavailable, syncing up to block {SENTINEL_CHAIN_HEAD}");
            SENTINEL_CHAIN_HEAD
        } else {
            latest
        };

        let mut result = self.sync_range(from_block, to_block, existing).await?;
        result.chain_head = (latest > 0).then_some(latest);

        info!(
            "Initial sync of {} finished: {} claims up to block {}",
            self.schema.name(),
            result.aggregates.claims_count,
            result.cursor.last_block
        );

        Ok(result)
    }

    /// Syncs an explicit block range, merging the new claims into `existing`.
    pub async fn sync_range(
        &self,
        from_block: u64,
        to_block: u64,
        existing: Option<Vec<ClaimRecord>>,
    ) -> ClaimsResult<SyncResult> {
        let mut records = existing.unwrap_or_default();
        records.extend(self.fetch_claims(from_block, to_block).await?);

        Ok(self.build_result(records, 0, None))
    }

    /// Runs a live tick over the records already known.
    ///
    /// Raw entries of `existing` are decoded against the schema. If the oracle is unavailable nothing is fetched
    /// and the existing records are only re-aggregated.
    pub async fn incremental_sync(
        &self,
        existing: Vec<ExistingEvent>,
        confirmation_blocks: u64,
    ) -> ClaimsResult<SyncResult> {
        let latest = self.height_oracle.get_latest_block_number().await;
        let last_known = existing
            .iter()
            .map(ExistingEvent::block_number)
            .max()
            .unwrap_or(0);
        let mut records = self.normalize_existing(existing);

        if latest == 0 {
            warn!("Chain head unavailable, skipping the fetch of this tick");
            return Ok(self.build_result(records, last_known, None));
        }

        let (from_block, to_block) = fetch_window(last_known, latest, confirmation_blocks);
        records.extend(self.fetch_claims(from_block, to_block).await?);

        let result = self.build_result(records, last_known, Some(latest));
        debug!(
            "Live tick over [{from_block}-{to_block}]: cursor at {}, chain head at {latest}",
            result.cursor.last_block
        );

        Ok(result)
    }

    /// Normalized records first, then the decoded raw entries, each group in input order.
    fn normalize_existing(&self, existing: Vec<ExistingEvent>) -> Vec<ClaimRecord> {
        let mut normalized = Vec::with_capacity(existing.len());
        let mut raw: Vec<RawLogRecord> = Vec::new();

        for event in existing {
            match event {
                ExistingEvent::Normalized(record) => normalized.push(record),
                ExistingEvent::Raw(log) => raw.push(log),
            }
        }

        if !raw.is_empty() {
            normalized.extend(decode_logs(std::slice::from_ref(&self.schema), &raw));
        }
        normalized
    }

    async fn fetch_claims(&self, from_block: u64, to_block: u64) -> ClaimsResult<Vec<ClaimRecord>> {
        if from_block > to_block {
            debug!("Empty block range [{from_block}-{to_block}], nothing to fetch");
            return Ok(Vec::new());
        }

        let query = LogQuery {
            address: self.contract_address.clone(),
            topic0: self.schema.topic0_hex(),
            from_block,
            to_block,
            page_size: self.page_size,
        };
        let logs = self.log_source.fetch_logs_paginated(&query).await?;
        let claims = decode_logs(std::slice::from_ref(&self.schema), &logs);

        debug!(
            "Fetched {} logs in [{from_block}-{to_block}], {} decoded as claims",
            logs.len(),
            claims.len()
        );

        Ok(claims)
    }

    fn build_result(
        &self,
        records: Vec<ClaimRecord>,
        fallback_block: u64,
        chain_head: Option<u64>,
    ) -> SyncResult {
        let events = deduplicate_events(records);
        let cursor = Cursor {
            last_block: max_block(&events).unwrap_or(fallback_block),
        };
        let aggregates = aggregate_claims(&events, self.decimals);

        SyncResult {
            events,
            aggregates,
            cursor,
            chain_head,
        }
    }
}
