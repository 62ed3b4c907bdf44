// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module that handles the configuration of the application.
//!
//! # Description
//!
//! Settings come from three places, in order of precedence: a configuration file, environment variables with the
//! `CLAIMWATCH_` prefix and the command line. Secrets (RPC URL, API keys) are only kept as [SecretString].

use crate::{
    cli::{ClaimsArgs, ExplorerKind},
    constants, error_codes,
};
use alloy::primitives::Address;
use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{path::Path, path::PathBuf, str::FromStr};
use thiserror::Error;

/// Placeholder of the network RPC templates replaced by the Ankr API key.
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";

/// Endpoints of a supported network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkTemplate {
    pub name: &'static str,
    pub chain_id: u64,
    pub blockscout_api: &'static str,
    pub etherscan_api: &'static str,
    pub rpc_template: &'static str,
}

pub const NETWORKS: [NetworkTemplate; 2] = [
    NetworkTemplate {
        name: "mainnet",
        chain_id: 1,
        blockscout_api: "https://eth.blockscout.com/api",
        etherscan_api: "https://api.etherscan.io/api",
        rpc_template: "https://rpc.ankr.com/eth/YOUR_API_KEY",
    },
    NetworkTemplate {
        name: "sepolia",
        chain_id: 11155111,
        blockscout_api: "https://eth-sepolia.blockscout.com/api",
        etherscan_api: "https://api-sepolia.etherscan.io/api",
        rpc_template: "https://rpc.ankr.com/eth_sepolia/YOUR_API_KEY",
    },
];

/// Looks a network template up by name (case-insensitive).
pub fn resolve_network(name: &str) -> Option<&'static NetworkTemplate> {
    NETWORKS.iter().find(|n| n.name.eq_ignore_ascii_case(name))
}

impl NetworkTemplate {
    pub fn explorer_api(&self, kind: ExplorerKind) -> &'static str {
        match kind {
            ExplorerKind::Blockscout => self.blockscout_api,
            ExplorerKind::Etherscan => self.etherscan_api,
        }
    }

    /// RPC URL of the template with the API key filled in. `None` without a key.
    pub fn rpc_url(&self, api_key: Option<&SecretString>) -> Option<SecretString> {
        let key = api_key?.expose_secret();
        if key.is_empty() {
            return None;
        }
        Some(SecretString::from(
            self.rpc_template.replace(API_KEY_PLACEHOLDER, key),
        ))
    }
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load the configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigurationError::Load(_) => {
                error_codes::ERROR_CODE_FAILED_TO_LOAD_CONFIGURATION_FROM_FILE
            }
            ConfigurationError::Invalid(_) => error_codes::ERROR_CODE_WRONG_INPUT_ARGUMENTS,
        }
    }
}

/// Configuration as parsed from a file and the environment. Fields are optional to allow partial configs.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FileConfiguration {
    pub network: Option<String>,
    pub explorer: Option<ExplorerKind>,
    pub explorer_url: Option<String>,
    pub explorer_api_key: Option<SecretString>,
    pub ankr_api_key: Option<SecretString>,
    pub rpc_url: Option<SecretString>,
    pub contract: Option<String>,
    pub abi_path: Option<String>,
    pub event: Option<String>,
    pub event_signature: Option<String>,
    pub from_block: Option<u64>,
    pub page_size: Option<u64>,
    pub decimals: Option<u32>,
    pub confirmation_blocks: Option<u64>,
    pub poll_interval: Option<u64>,
    pub rate_limit_qps: Option<f64>,
    pub snapshot_out: Option<String>,
    pub csv_out: Option<String>,
    pub events_out: Option<String>,
    pub api_server: Option<String>,
}

impl FileConfiguration {
    /// Loads the optional file and the `CLAIMWATCH_` environment variables.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::from(Path::new(config_file)));
        }
        builder
            .add_source(Environment::with_prefix("CLAIMWATCH"))
            .build()?
            .try_deserialize()
    }

    /// Build from CLI arguments.
    pub fn from_args(args: &ClaimsArgs) -> Self {
        Self {
            network: args.network.clone(),
            explorer: args.explorer,
            explorer_url: args.explorer_url.clone(),
            explorer_api_key: None,
            ankr_api_key: None,
            rpc_url: args.rpc_url.clone().map(SecretString::from),
            contract: args.contract.clone(),
            abi_path: args.abi.clone(),
            event: args.event.clone(),
            event_signature: args.event_signature.clone(),
            from_block: args.from_block,
            page_size: args.page_size,
            decimals: args.decimals,
            confirmation_blocks: args.confirmation_blocks,
            poll_interval: args.poll_interval,
            rate_limit_qps: args.rate_limit_qps,
            snapshot_out: args.snapshot_out.clone(),
            csv_out: args.csv_out.clone(),
            events_out: args.events_out.clone(),
            api_server: args.api_server.clone(),
        }
    }

    /// Fills the fields missing in `self` from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            network: self.network.or(fallback.network),
            explorer: self.explorer.or(fallback.explorer),
            explorer_url: self.explorer_url.or(fallback.explorer_url),
            explorer_api_key: self.explorer_api_key.or(fallback.explorer_api_key),
            ankr_api_key: self.ankr_api_key.or(fallback.ankr_api_key),
            rpc_url: self.rpc_url.or(fallback.rpc_url),
            contract: self.contract.or(fallback.contract),
            abi_path: self.abi_path.or(fallback.abi_path),
            event: self.event.or(fallback.event),
            event_signature: self.event_signature.or(fallback.event_signature),
            from_block: self.from_block.or(fallback.from_block),
            page_size: self.page_size.or(fallback.page_size),
            decimals: self.decimals.or(fallback.decimals),
            confirmation_blocks: self.confirmation_blocks.or(fallback.confirmation_blocks),
            poll_interval: self.poll_interval.or(fallback.poll_interval),
            rate_limit_qps: self.rate_limit_qps.or(fallback.rate_limit_qps),
            snapshot_out: self.snapshot_out.or(fallback.snapshot_out),
            csv_out: self.csv_out.or(fallback.csv_out),
            events_out: self.events_out.or(fallback.events_out),
            api_server: self.api_server.or(fallback.api_server),
        }
    }
}

/// Where the tracked event is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// ABI file and optional event name. Without a name the first claim-like event is used.
    Abi { path: PathBuf, event: Option<String> },
    /// Human readable event signature.
    Signature(String),
}

/// Fully resolved configuration with all defaults applied.
#[derive(Debug, Clone)]
pub struct ClaimsConfiguration {
    pub network: String,
    pub chain_id: u64,
    pub explorer_url: String,
    pub explorer_api_key: Option<SecretString>,
    pub rpc_url: Option<SecretString>,
    pub contract: String,
    pub event_source: EventSource,
    pub from_block: u64,
    pub page_size: u64,
    pub decimals: u32,
    pub confirmation_blocks: u64,
    pub poll_interval: u64,
    pub rate_limit_qps: f64,
    pub live: bool,
    pub resume: Option<PathBuf>,
    pub snapshot_out: Option<PathBuf>,
    pub csv_out: Option<PathBuf>,
    pub events_out: Option<PathBuf>,
    pub api_server: Option<String>,
    pub verbosity: u8,
    pub metrics: bool,
    pub metrics_address: String,
    pub metrics_port: u16,
    pub metrics_allow_origin: Option<String>,
}

impl ClaimsConfiguration {
    /// Build the configuration from CLI arguments, the optional configuration file and the environment.
    pub fn from_args(args: ClaimsArgs) -> Result<Self, ConfigurationError> {
        let loaded = FileConfiguration::load(args.config.as_deref())?;
        Self::resolve(loaded.or(FileConfiguration::from_args(&args)), args)
    }

    /// Applies the defaults and validates the merged settings. CLI-only options are taken from `args`.
    pub fn resolve(file: FileConfiguration, args: ClaimsArgs) -> Result<Self, ConfigurationError> {
        let network_name = file
            .network
            .unwrap_or_else(|| constants::DEFAULT_NETWORK.to_string());
        let network = resolve_network(&network_name).ok_or_else(|| {
            ConfigurationError::Invalid(format!(
                "unknown network '{network_name}', expected one of: {}",
                NETWORKS.map(|n| n.name).join(", ")
            ))
        })?;

        let contract = file
            .contract
            .ok_or_else(|| ConfigurationError::Invalid("a contract address is required".into()))?;
        Address::from_str(&contract).map_err(|e| {
            ConfigurationError::Invalid(format!("invalid contract address '{contract}': {e}"))
        })?;

        let event_source = match (file.abi_path, file.event_signature) {
            (Some(path), _) => EventSource::Abi {
                path: PathBuf::from(path),
                event: file.event,
            },
            (None, Some(signature)) => EventSource::Signature(signature),
            (None, None) => {
                return Err(ConfigurationError::Invalid(
                    "either an ABI file or an event signature is required".into(),
                ));
            }
        };

        let decimals = file.decimals.unwrap_or(constants::DEFAULT_TOKEN_DECIMALS);

        let page_size = file.page_size.unwrap_or(constants::DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(ConfigurationError::Invalid(
                "page size must be positive".into(),
            ));
        }

        let explorer_url = file.explorer_url.unwrap_or_else(|| {
            network
                .explorer_api(file.explorer.unwrap_or_default())
                .to_string()
        });
        let rpc_url = file
            .rpc_url
            .or_else(|| network.rpc_url(file.ankr_api_key.as_ref()));

        Ok(Self {
            network: network.name.to_string(),
            chain_id: network.chain_id,
            explorer_url,
            explorer_api_key: file.explorer_api_key,
            rpc_url,
            contract,
            event_source,
            from_block: file.from_block.unwrap_or(0),
            page_size,
            decimals,
            confirmation_blocks: file
                .confirmation_blocks
                .unwrap_or(constants::DEFAULT_CONFIRMATION_BLOCKS),
            poll_interval: file
                .poll_interval
                .unwrap_or(constants::DEFAULT_POLL_INTERVAL),
            rate_limit_qps: file
                .rate_limit_qps
                .unwrap_or(constants::DEFAULT_RATE_LIMIT_QPS),
            live: args.live,
            resume: args.resume.map(PathBuf::from),
            snapshot_out: file.snapshot_out.map(PathBuf::from),
            csv_out: file.csv_out.map(PathBuf::from),
            events_out: file.events_out.map(PathBuf::from),
            api_server: file.api_server,
            verbosity: args.verbosity,
            metrics: args.metrics,
            metrics_address: args.metrics_address,
            metrics_port: args.metrics_port,
            metrics_allow_origin: args.metrics_allow_origin,
        })
    }
}
