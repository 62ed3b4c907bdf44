// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Sources of the latest block height of the chain.

use crate::constants::{RPC_COMPUTE_UNITS_PER_SECOND, RPC_INITIAL_BACKOFF, RPC_MAX_RETRIES};
use alloy::{
    providers::{Provider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::{http::reqwest::Url, layers::RetryBackoffLayer},
};
use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, warn};

/// Capability of reporting the latest block number of the chain.
///
/// A value of 0 means the height is unavailable. Implementations never fail; they degrade to 0 instead.
#[async_trait]
pub trait HeightOracle: Send + Sync {
    async fn get_latest_block_number(&self) -> u64;
}

/// Height oracle backed by a JSON-RPC node (`eth_blockNumber`).
pub struct RpcHeightOracle {
    provider: Arc<dyn Provider + Send + Sync + 'static>,
}

impl RpcHeightOracle {
    pub fn new(rpc_url: &SecretString) -> Result<Self> {
        let url: Url = rpc_url
            .expose_secret()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse the RPC URL: {e}"))?;

        let retry_layer = RetryBackoffLayer::new(
            RPC_MAX_RETRIES,
            RPC_INITIAL_BACKOFF,
            RPC_COMPUTE_UNITS_PER_SECOND,
        );
        let provider =
            ProviderBuilder::new().connect_client(RpcClient::builder().layer(retry_layer).http(url));

        Ok(Self {
            provider: Arc::new(provider),
        })
    }
}

#[async_trait]
impl HeightOracle for RpcHeightOracle {
    async fn get_latest_block_number(&self) -> u64 {
        match self.provider.get_block_number().await {
            Ok(block) => {
                debug!("Chain head at block {block}");
                block
            }
            Err(e) => {
                warn!("Failed to get the latest block number: {e}");
                0
            }
        }
    }
}

/// Oracle used when no RPC endpoint is configured. Always reports the height as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableOracle;

#[async_trait]
impl HeightOracle for UnavailableOracle {
    async fn get_latest_block_number(&self) -> u64 {
        0
    }
}
