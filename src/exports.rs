// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Snapshot and ledger exports.

use crate::{
    claims_aggregate::{aggregate_claims, decimal_to_string},
    decode::{ClaimRecord, ExistingEvent},
    error::ClaimsResult,
    sync::max_block,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::info;

const CSV_HEADER: &str = "claimer,amount_raw,tx_hash,block_number,log_index,timestamp";

/// Point-in-time view of the claims of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chain: String,
    pub contract: String,
    pub last_block: u64,
    /// Claimed amount per lowercased claimer, as a decimal string without trailing zeros.
    pub claimed_by: BTreeMap<String, String>,
}

pub fn build_snapshot(
    chain: &str,
    contract: &str,
    events: &[ClaimRecord],
    decimals: u32,
) -> Snapshot {
    let aggregates = aggregate_claims(events, decimals);

    Snapshot {
        chain: chain.to_string(),
        contract: contract.to_string(),
        last_block: max_block(events).unwrap_or(0),
        claimed_by: aggregates
            .distribution_by_address
            .iter()
            .map(|(claimer, amount)| (claimer.clone(), decimal_to_string(amount)))
            .collect(),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Renders the records as CSV, one line per record after the header. Lines end with `\r\n`.
pub fn events_to_csv(events: &[ClaimRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 2 + events.len() * 160);
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");

    for event in events {
        out.push_str(&format!(
            "{},{},{},{},{},{}\r\n",
            csv_field(&event.claimer),
            event.amount_raw,
            csv_field(&event.tx_hash),
            event.block_number,
            event.log_index,
            event.timestamp
        ));
    }

    out
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> ClaimsResult<()> {
    fs::write(path, serde_json::to_string_pretty(snapshot)?)?;
    info!("Snapshot written to {}", path.display());
    Ok(())
}

pub fn write_csv(path: &Path, events: &[ClaimRecord]) -> ClaimsResult<()> {
    fs::write(path, events_to_csv(events))?;
    info!("{} claims written to {}", events.len(), path.display());
    Ok(())
}

/// Writes the event ledger so a later session can resume from it.
pub fn write_events_json(path: &Path, events: &[ClaimRecord]) -> ClaimsResult<()> {
    fs::write(path, serde_json::to_string(events)?)?;
    info!("Event ledger written to {}", path.display());
    Ok(())
}

/// Reads an event ledger. Entries may be decoded records or raw explorer logs.
pub fn read_existing_events(path: &Path) -> ClaimsResult<Vec<ExistingEvent>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ClaimsError,
        test_utils::{CLAIMER, claim_log, claim_record},
    };
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::TempDir;

    #[fixture]
    fn events() -> Vec<ClaimRecord> {
        vec![
            ClaimRecord {
                claimer: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
                amount_raw: 1_000_000,
                tx_hash: "0x01".to_string(),
                block_number: 10,
                log_index: 0,
                timestamp: 1000,
            },
            ClaimRecord {
                claimer: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
                amount_raw: 2_000_000,
                tx_hash: "0x02".to_string(),
                block_number: 12,
                log_index: 0,
                timestamp: 1200,
            },
        ]
    }

    #[rstest]
    fn snapshot_uses_normalized_decimal_strings(events: Vec<ClaimRecord>) {
        let snapshot = build_snapshot(
            "sepolia",
            "0xcccccccccccccccccccccccccccccccccccccccc",
            &events,
            6,
        );

        assert_eq!(snapshot.chain, "sepolia");
        assert_eq!(snapshot.contract, "0xcccccccccccccccccccccccccccccccccccccccc");
        assert_eq!(snapshot.last_block, 12);
        assert_eq!(
            snapshot.claimed_by,
            BTreeMap::from([
                (
                    "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
                    "1".to_string()
                ),
                (
                    "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
                    "2".to_string()
                ),
            ])
        );
    }

    #[rstest]
    fn empty_snapshot() {
        let snapshot = build_snapshot("mainnet", "0x1", &[], 18);
        assert_eq!(snapshot.last_block, 0);
        assert!(snapshot.claimed_by.is_empty());
    }

    #[rstest]
    fn csv_has_header_and_plain_integers(events: Vec<ClaimRecord>) {
        let csv = events_to_csv(&events);

        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa,1000000,0x01,10,0,1000"
        );
        assert_eq!(lines.len(), 3);
    }

    #[rstest]
    #[case::plain("0xabc", "0xabc")]
    #[case::comma("a,b", "\"a,b\"")]
    #[case::quote("say \"hi\"", "\"say \"\"hi\"\"\"")]
    #[case::newline("a\nb", "\"a\nb\"")]
    fn csv_fields_are_quoted_when_needed(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(csv_field(input), expected);
    }

    #[rstest]
    fn ledger_file_resumes_a_session(events: Vec<ClaimRecord>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");

        write_events_json(&path, &events).unwrap();
        let loaded = read_existing_events(&path).unwrap();

        let expected = events.into_iter().map(ExistingEvent::from).collect::<Vec<_>>();
        assert_eq!(loaded, expected);
    }

    #[rstest]
    fn ledger_file_may_hold_raw_logs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.json");
        let raw = claim_log(7, 2, CLAIMER, 11);
        fs::write(&path, serde_json::to_string(&vec![raw.clone()]).unwrap()).unwrap();

        let loaded = read_existing_events(&path).unwrap();

        assert_eq!(loaded, vec![ExistingEvent::Raw(raw)]);
    }

    #[rstest]
    fn snapshot_and_csv_files_are_written(events: Vec<ClaimRecord>) {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("snapshot.json");
        let csv_path = dir.path().join("claims.csv");
        let snapshot = build_snapshot("mainnet", "0xc", &events, 6);

        write_snapshot(&snapshot_path, &snapshot).unwrap();
        write_csv(&csv_path, &[claim_record("0xa", 5, 1, 2, 0)]).unwrap();

        let read_back: Snapshot =
            serde_json::from_str(&fs::read_to_string(&snapshot_path).unwrap()).unwrap();
        assert_eq!(read_back, snapshot);
        assert!(fs::read_to_string(&csv_path).unwrap().contains("0xa,5,"));
    }

    #[rstest]
    fn missing_ledger_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_existing_events(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ClaimsError::Io(_)));
    }
}
