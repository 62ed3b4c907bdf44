// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module that aggregates claim records.
//!
//! # Description
//!
//! Aggregates are always recomputed from the full record set. Raw amounts are integers; every decimal value is
//! `raw / 10^decimals` computed exactly with [BigDecimal], floating point is never involved.

use crate::decode::ClaimRecord;
use bigdecimal::{BigDecimal, num_bigint::BigInt};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

/// Totals derived from a set of claim records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimsAggregate {
    pub total_claimed_raw: u128,
    #[serde(serialize_with = "serialize_decimal")]
    pub total_claimed_adj: BigDecimal,
    pub unique_claimers: usize,
    pub claims_count: usize,
    /// Adjusted amount claimed per lowercased claimer address.
    #[serde(serialize_with = "serialize_distribution")]
    pub distribution_by_address: BTreeMap<String, BigDecimal>,
}

/// Point of the cumulative claimed amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: u64,
    #[serde(serialize_with = "serialize_decimal")]
    pub cumulative: BigDecimal,
}

/// Serializes a decimal as its normalized string, e.g. `1.000000` as `"1"`.
pub fn serialize_decimal<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&decimal_to_string(value))
}

fn serialize_distribution<S>(
    value: &BTreeMap<String, BigDecimal>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(value.iter().map(|(k, v)| (k, decimal_to_string(v))))
}

/// Plain-text form of a decimal without trailing zeros.
pub fn decimal_to_string(value: &BigDecimal) -> String {
    value.normalized().to_plain_string()
}

/// Converts a raw integer amount into its decimal value, `raw / 10^decimals`.
pub fn to_decimal(raw: u128, decimals: u32) -> BigDecimal {
    BigDecimal::new(BigInt::from(raw), i64::from(decimals))
}

/// Keeps the first occurrence of every `(tx_hash, log_index)` pair, preserving order.
pub fn deduplicate_events(records: Vec<ClaimRecord>) -> Vec<ClaimRecord> {
    let mut seen: HashSet<(String, u64)> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert((record.tx_hash.clone(), record.log_index)))
        .collect()
}

/// Aggregates the claims of a record set.
///
/// Duplicated logs are counted once. Claimer addresses are grouped lowercased so checksum casing never splits a
/// claimer in two.
pub fn aggregate_claims(records: &[ClaimRecord], decimals: u32) -> ClaimsAggregate {
    let mut seen: HashSet<(&str, u64)> = HashSet::with_capacity(records.len());
    let mut total_raw: u128 = 0;
    let mut raw_by_claimer: BTreeMap<String, u128> = BTreeMap::new();
    let mut count = 0usize;

    for record in records {
        if !seen.insert(record.key()) {
            continue;
        }
        let amount = u128::from(record.amount_raw);
        total_raw = total_raw.saturating_add(amount);
        let entry = raw_by_claimer
            .entry(record.claimer.to_ascii_lowercase())
            .or_default();
        *entry = entry.saturating_add(amount);
        count += 1;
    }

    ClaimsAggregate {
        total_claimed_raw: total_raw,
        total_claimed_adj: to_decimal(total_raw, decimals),
        unique_claimers: raw_by_claimer.len(),
        claims_count: count,
        distribution_by_address: raw_by_claimer
            .into_iter()
            .map(|(claimer, raw)| (claimer, to_decimal(raw, decimals)))
            .collect(),
    }
}

/// Builds the cumulative claimed amount over time.
///
/// Records are ordered by `(timestamp, block_number, log_index)` so claims sharing a timestamp have a stable order.
pub fn build_cumulative_series(records: &[ClaimRecord], decimals: u32) -> Vec<SeriesPoint> {
    let mut sorted = records.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|r| (r.timestamp, r.block_number, r.log_index));

    let mut cumulative_raw: u128 = 0;
    sorted
        .into_iter()
        .map(|record| {
            cumulative_raw = cumulative_raw.saturating_add(u128::from(record.amount_raw));
            SeriesPoint {
                timestamp: record.timestamp,
                cumulative: to_decimal(cumulative_raw, decimals),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ClaimLogFixture, claim_record, claim_schema};
    use crate::decode::decode_logs;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::str::FromStr;

    #[fixture]
    fn mixed_case_records() -> Vec<ClaimRecord> {
        vec![
            claim_record("0xAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAa", 1_000_000, 10, 1000, 0),
            claim_record("0xBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBb", 2_000_000, 11, 1100, 0),
            claim_record("0xAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAa", 500_000, 12, 1200, 0),
            // Duplicate of the first log.
            claim_record("0xAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAa", 1_000_000, 10, 1000, 0),
        ]
    }

    #[rstest]
    fn deduplicate_keeps_first_occurrence(mixed_case_records: Vec<ClaimRecord>) {
        let mut first = mixed_case_records[0].clone();
        first.claimer = "first".to_string();
        let mut records = vec![first];
        records.extend(mixed_case_records);

        let deduped = deduplicate_events(records);

        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].claimer, "first");
        let blocks = deduped.iter().map(|r| r.block_number).collect::<Vec<_>>();
        assert_eq!(blocks, vec![10, 11, 12]);
    }

    #[rstest]
    fn aggregate_groups_claimers_case_insensitively(mixed_case_records: Vec<ClaimRecord>) {
        let agg = aggregate_claims(&mixed_case_records, 6);

        assert_eq!(agg.total_claimed_raw, 3_500_000);
        assert_eq!(agg.total_claimed_adj, BigDecimal::from_str("3.5").unwrap());
        assert_eq!(agg.unique_claimers, 2);
        assert_eq!(agg.claims_count, 3);
        assert_eq!(
            agg.distribution_by_address["0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"],
            BigDecimal::from_str("1.5").unwrap()
        );
        assert_eq!(
            agg.distribution_by_address["0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"],
            BigDecimal::from(2)
        );
    }

    #[rstest]
    fn empty_set_aggregates_to_zero() {
        let agg = aggregate_claims(&[], 18);

        assert_eq!(agg.total_claimed_raw, 0);
        assert_eq!(agg.total_claimed_adj, BigDecimal::from(0));
        assert_eq!(agg.unique_claimers, 0);
        assert_eq!(agg.claims_count, 0);
        assert!(agg.distribution_by_address.is_empty());
    }

    #[rstest]
    fn decimal_conversion_is_exact() {
        // 2^63 - 1 with 18 decimals has no binary floating point representation.
        let value = to_decimal(i64::MAX as u128, 18);
        assert_eq!(decimal_to_string(&value), "9.223372036854775807");

        let many = to_decimal(u128::MAX, 30);
        assert_eq!(
            decimal_to_string(&many),
            "340282366.920938463463374607431768211455"
        );
        assert_eq!(decimal_to_string(&to_decimal(1_000_000, 6)), "1");
        assert_eq!(decimal_to_string(&to_decimal(12_000, 0)), "12000");
        assert_eq!(
            decimal_to_string(&to_decimal(5, 40)),
            format!("0.{}5", "0".repeat(39))
        );
    }

    #[rstest]
    fn cumulative_series_breaks_timestamp_ties() {
        let records = vec![
            claim_record("0xa", 3, 12, 1000, 1),
            claim_record("0xa", 1, 11, 1000, 5),
            claim_record("0xa", 2, 12, 1000, 0),
            claim_record("0xa", 10, 9, 900, 0),
        ];

        let series = build_cumulative_series(&records, 0);

        let points = series
            .iter()
            .map(|p| (p.timestamp, decimal_to_string(&p.cumulative)))
            .collect::<Vec<_>>();
        assert_eq!(
            points,
            vec![
                (900, "10".to_string()),
                (1000, "11".to_string()),
                (1000, "13".to_string()),
                (1000, "16".to_string()),
            ]
        );
    }

    #[rstest]
    #[case(1)]
    #[case(25)]
    #[case(200)]
    fn dedup_aggregate_and_series_properties(#[case] log_count: usize) {
        let logs = ClaimLogFixture::builder()
            .with_log_count(log_count)
            .with_address_pool_size(4)
            .build();
        let mut records = decode_logs(&[claim_schema()], &logs);
        // Re-fetching the same logs must never double count.
        records.extend(records.clone());

        let once = deduplicate_events(records.clone());
        let twice = deduplicate_events(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), log_count);

        let keys = once.iter().map(|r| r.key()).collect::<HashSet<_>>();
        assert_eq!(keys.len(), once.len());

        let agg = aggregate_claims(&records, 18);
        let expected: u128 = once.iter().map(|r| u128::from(r.amount_raw)).sum();
        assert_eq!(agg.total_claimed_raw, expected);
        assert_eq!(agg.claims_count, log_count);

        let series = build_cumulative_series(&once, 18);
        assert!(series.windows(2).all(|w| w[0].cumulative <= w[1].cumulative));
        assert_eq!(
            series.last().map(|p| p.cumulative.clone()),
            Some(agg.total_claimed_adj)
        );
    }

    #[rstest]
    fn aggregate_serializes_decimals_as_strings(mixed_case_records: Vec<ClaimRecord>) {
        let agg = aggregate_claims(&mixed_case_records, 6);

        let value = serde_json::to_value(&agg).unwrap();

        assert_eq!(value["total_claimed_adj"], "3.5");
        assert_eq!(
            value["distribution_by_address"]["0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"],
            "2"
        );
        assert_eq!(value["claims_count"], 3);
    }
}
