// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module that handles the command line interface.

use clap::{Parser, ValueEnum};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author = "Bilinear Labs")]
#[command(version = "0.1.0")]
#[command(about = "claimwatch")]
#[command(long_about = "Ledger of the claim events emitted by an EVM contract")]
pub struct ClaimsArgs {
    #[arg(
        short = 'f',
        long,
        help = "Path to a configuration file (YAML, TOML or JSON). Values found in the file take precedence over the command line."
    )]
    pub config: Option<String>,
    #[arg(
        short,
        long,
        help = "Network template used to pick the explorer and RPC endpoints: mainnet or sepolia. Default: mainnet"
    )]
    pub network: Option<String>,
    #[arg(
        long,
        value_enum,
        help = "Explorer API flavour of the network template. Default: blockscout"
    )]
    pub explorer: Option<ExplorerKind>,
    #[arg(
        long,
        help = "Base URL of an Etherscan-compatible logs API. Overrides the network template.\nExample => https://eth.blockscout.com/api"
    )]
    pub explorer_url: Option<String>,
    #[arg(
        short,
        long,
        help = "JSON-RPC endpoint used to read the chain head. When omitted, the network template is used if CLAIMWATCH_ANKR_API_KEY is set."
    )]
    pub rpc_url: Option<String>,
    #[arg(
        short,
        long,
        help = "Address of the contract emitting the claims.\nExample: 0x1234567890123456789012345678901234567890"
    )]
    pub contract: Option<String>,
    #[arg(
        short,
        long,
        help = "Path to the ABI JSON of the contract. The first event whose name contains 'claim' is tracked unless --event is given."
    )]
    pub abi: Option<String>,
    #[arg(short, long, help = "Name of the ABI event to track.\nExample: Claimed")]
    pub event: Option<String>,
    #[arg(
        short = 's',
        long,
        help = "Signature of the event to track when no ABI is given.\nExample: Claimed(address indexed account, uint256 amount)"
    )]
    pub event_signature: Option<String>,
    #[arg(long, help = "First block of the initial sync (decimal). Default: 0")]
    pub from_block: Option<u64>,
    #[arg(long, help = "Logs requested per explorer page. Default: 1000")]
    pub page_size: Option<u64>,
    #[arg(long, help = "Decimals of the claimed token. Default: 18")]
    pub decimals: Option<u32>,
    #[arg(
        long,
        help = "Trailing blocks fetched again on every live tick. Default: 6"
    )]
    pub confirmation_blocks: Option<u64>,
    #[arg(long, help = "Seconds between live ticks. Default: 5")]
    pub poll_interval: Option<u64>,
    #[arg(
        long,
        help = "Queries per second allowed against the explorer. 0 disables throttling. Default: 3"
    )]
    pub rate_limit_qps: Option<f64>,
    #[arg(
        short,
        long,
        help = "Keep polling for new claims after the initial sync.",
        default_value_t = false
    )]
    pub live: bool,
    #[arg(
        long,
        help = "Event ledger written by a previous session (--events-out). The sync resumes from it instead of running a full backfill."
    )]
    pub resume: Option<String>,
    #[arg(long, help = "Write the claims snapshot (JSON) to this path after every sync.")]
    pub snapshot_out: Option<String>,
    #[arg(long, help = "Write the claims as CSV to this path after every sync.")]
    pub csv_out: Option<String>,
    #[arg(long, help = "Write the event ledger (JSON) to this path after every sync.")]
    pub events_out: Option<String>,
    #[arg(
        short = 'j',
        long,
        help = "Interface and port in which the API server will listen for requests.\nExample => 127.0.0.1:9720"
    )]
    pub api_server: Option<String>,
    #[arg(
        short,
        long,
        help = "Verbosity level. 0 = WARN, 1 = INFO (default), 2 = DEBUG, 3 = TRACE",
        default_value_t = 1
    )]
    pub verbosity: u8,
    #[arg(long, help = "Enable the Prometheus metrics exporter.", default_value_t = false)]
    pub metrics: bool,
    #[arg(
        long,
        help = "Metrics listening address",
        default_value_t = String::from("127.0.0.1"),
    )]
    pub metrics_address: String,
    #[arg(long, help = "Metrics listening port", default_value_t = 5054)]
    pub metrics_port: u16,
    #[arg(
        long,
        help = "Value of the Access-Control-Allow-Origin header of the metrics endpoint."
    )]
    pub metrics_allow_origin: Option<String>,
}

/// Flavour of explorer API picked from a network template.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExplorerKind {
    #[default]
    Blockscout,
    Etherscan,
}
