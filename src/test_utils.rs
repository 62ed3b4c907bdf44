// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module with utilities for testing.

use crate::{
    abi_parser::EventSchema,
    decode::ClaimRecord,
    error::{ClaimsError, ClaimsResult},
    height_oracle::HeightOracle,
    log_source::{LogQuery, LogSource, RawLogRecord},
};
use alloy::primitives::{Address, U256, address};
use async_trait::async_trait;
use fake::{Fake, Faker};
use std::{collections::VecDeque, sync::Mutex};

/// Claimer used by tests that need a well known checksum.
pub const CLAIMER: Address = address!("0x000000000000000000000000000000000000dEaD");

/// Contract used by the generated logs.
pub const CONTRACT: &str = "0x1111111111111111111111111111111111111111";

/// ABI of a distributor contract with two claim events.
pub const CLAIM_ABI_JSON: &str = r#"[
    {"type": "constructor", "inputs": [{"name": "token", "type": "address"}]},
    {"type": "function", "name": "claim", "stateMutability": "nonpayable", "inputs": [
        {"name": "index", "type": "uint256"},
        {"name": "account", "type": "address"},
        {"name": "amount", "type": "uint256"}
    ], "outputs": []},
    {"type": "event", "name": "RewardClaim", "anonymous": false, "inputs": [
        {"name": "user", "type": "address", "indexed": true, "internalType": "address"},
        {"name": "amount", "type": "uint256", "indexed": false, "internalType": "uint256"}
    ]},
    {"type": "event", "name": "OwnershipTransferred", "anonymous": false, "inputs": [
        {"name": "previousOwner", "type": "address", "indexed": true},
        {"name": "newOwner", "type": "address", "indexed": true}
    ]},
    {"type": "event", "name": "Claimed", "anonymous": false, "inputs": [
        {"name": "index", "type": "uint256", "indexed": false},
        {"name": "account", "type": "address", "indexed": true},
        {"name": "amount", "type": "uint256", "indexed": false}
    ]}
]"#;

/// Generates a random Ethereum address.
pub fn fake_address() -> Address {
    let bytes: [u8; 20] = Faker.fake();
    Address::from(bytes)
}

/// Converts an Ethereum address to a topic.
pub fn address_to_topic(address: &Address) -> String {
    format!("0x{:0>64}", hex::encode(address))
}

/// Picks a random address from a pool.
pub fn pick_pool_address(pool: &[Address]) -> Address {
    let index = (Faker.fake::<u32>() as usize) % pool.len();
    pool[index]
}

/// Encodes a list of words as `0x` prefixed log data.
pub fn encode_words(words: &[U256]) -> String {
    let body = words
        .iter()
        .map(|word| hex::encode(word.to_be_bytes::<32>()))
        .collect::<String>();
    format!("0x{body}")
}

/// `Claim(address account, uint256 amount)` with both parameters in the log data.
pub fn claim_schema() -> EventSchema {
    EventSchema::from_signature("Claim(address account, uint256 amount)")
        .expect("failed to parse Claim event")
}

/// Builds a log of [claim_schema]. The transaction hash is derived from the block number.
pub fn claim_log(block: u64, log_index: u64, claimer: Address, amount: u64) -> RawLogRecord {
    let claimer_word = U256::from_be_slice(claimer.as_slice());
    RawLogRecord {
        address: CONTRACT.to_string(),
        topics: vec![Some(claim_schema().topic0_hex())],
        data: encode_words(&[claimer_word, U256::from(amount)]),
        block_number: block,
        transaction_hash: format!("0x{block:064x}"),
        log_index,
        timestamp: 1_700_000_000 + block,
    }
}

/// Builds an already decoded claim.
pub fn claim_record(
    claimer: &str,
    amount_raw: u64,
    block_number: u64,
    timestamp: u64,
    log_index: u64,
) -> ClaimRecord {
    ClaimRecord {
        claimer: claimer.to_string(),
        amount_raw,
        tx_hash: format!("0x{block_number:064x}"),
        block_number,
        log_index,
        timestamp,
    }
}

/// Fixture for generating logs of [claim_schema].
///
/// Claimers are drawn from a random address pool, amounts are random and every log lands on its own block.
pub struct ClaimLogFixture {
    log_count: usize,
    start_block: u64,
    address_pool_size: usize,
}

impl ClaimLogFixture {
    pub fn builder() -> Self {
        // Generate a random start block between 1 and 1_000_000
        let start_block: u64 = (Faker.fake::<u32>() % 1_000_000 + 1) as u64;
        Self {
            log_count: 1,
            start_block,
            address_pool_size: 5,
        }
    }

    pub fn with_log_count(mut self, log_count: usize) -> Self {
        self.log_count = log_count;
        self
    }

    pub fn with_start_block(mut self, start_block: u64) -> Self {
        self.start_block = start_block;
        self
    }

    pub fn with_address_pool_size(mut self, size: usize) -> Self {
        self.address_pool_size = size;
        self
    }

    pub fn build(self) -> Vec<RawLogRecord> {
        let pool = (0..self.address_pool_size.max(1))
            .map(|_| fake_address())
            .collect::<Vec<_>>();

        (0..self.log_count)
            .map(|i| {
                let amount = Faker.fake::<u32>() as u64 * 1_000_000_000;
                claim_log(
                    self.start_block + i as u64,
                    0,
                    pick_pool_address(&pool),
                    amount,
                )
            })
            .collect()
    }
}

/// Log source that serves a fixed list of pages, then empty pages.
pub struct MockLogSource {
    pages: Mutex<VecDeque<Vec<RawLogRecord>>>,
    failure: Option<String>,
    rate_limit_qps: f64,
    requested: Mutex<Vec<(LogQuery, u64)>>,
}

impl MockLogSource {
    pub fn with_pages(pages: Vec<Vec<RawLogRecord>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            failure: None,
            rate_limit_qps: 0.0,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit_qps: f64) -> Self {
        self.rate_limit_qps = rate_limit_qps;
        self
    }

    /// Source whose every request fails with [ClaimsError::LogApi].
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::with_pages(Vec::new())
        }
    }

    pub fn requested_pages(&self) -> Vec<u64> {
        self.requested.lock().unwrap().iter().map(|(_, page)| *page).collect()
    }

    pub fn requested_queries(&self) -> Vec<LogQuery> {
        self.requested.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn get_logs_page(&self, query: &LogQuery, page: u64) -> ClaimsResult<Vec<RawLogRecord>> {
        self.requested.lock().unwrap().push((query.clone(), page));
        if let Some(message) = &self.failure {
            return Err(ClaimsError::LogApi(message.clone()));
        }
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn rate_limit_qps(&self) -> f64 {
        self.rate_limit_qps
    }
}

/// Log source backed by an in-memory chain.
///
/// Honors the block range, the topic filter and the page size of the queries.
pub struct ChainLogSource {
    logs: Vec<RawLogRecord>,
    requested: Mutex<Vec<(LogQuery, u64)>>,
}

impl ChainLogSource {
    pub fn new(logs: Vec<RawLogRecord>) -> Self {
        Self {
            logs,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Block ranges of the queries that requested their first page.
    pub fn requested_ranges(&self) -> Vec<(u64, u64)> {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, page)| *page == 1)
            .map(|(q, _)| (q.from_block, q.to_block))
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl LogSource for ChainLogSource {
    async fn get_logs_page(&self, query: &LogQuery, page: u64) -> ClaimsResult<Vec<RawLogRecord>> {
        self.requested.lock().unwrap().push((query.clone(), page));
        let page_size = query.page_size.max(1) as usize;
        let matching = self
            .logs
            .iter()
            .filter(|log| (query.from_block..=query.to_block).contains(&log.block_number))
            .filter(|log| {
                query.topic0.is_empty()
                    || log
                        .topic0()
                        .is_some_and(|t| t.eq_ignore_ascii_case(&query.topic0))
            })
            .skip((page as usize - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();
        Ok(matching)
    }
}

/// Height oracle that always reports the same block.
pub struct StaticOracle(pub u64);

#[async_trait]
impl HeightOracle for StaticOracle {
    async fn get_latest_block_number(&self) -> u64 {
        self.0
    }
}
