// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module that turns raw explorer logs into claim records.
//!
//! # Description
//!
//! Decoding never fails a batch. Logs of unknown events are skipped, logs whose data can't be ABI-decoded for the
//! event's non-indexed parameters are skipped, and every other anomaly degrades to empty or zero fields.

use crate::{
    abi_parser::{EventSchema, ParamSlot},
    constants::MAX_AMOUNT_RAW,
    log_source::{RawLogRecord, lenient_u64},
};
use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, B256, U256},
};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::{Map, Value};
use std::{collections::HashMap, str::FromStr};
use tracing::debug;

/// A decoded claim.
///
/// `(tx_hash, log_index)` identifies the on-chain log and is the de-duplication key. Numeric fields read from
/// JSON follow the same lenient rules as [RawLogRecord].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    #[serde(default)]
    pub claimer: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub amount_raw: u64,
    pub tx_hash: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub block_number: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub log_index: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub timestamp: u64,
}

impl ClaimRecord {
    pub fn key(&self) -> (&str, u64) {
        (self.tx_hash.as_str(), self.log_index)
    }
}

/// Record held by a caller before an incremental sync.
///
/// Callers may hand over logs that were never decoded; those are decoded during the sync. When read from JSON,
/// objects carrying a `tx_hash` key are normalized records and anything else is read as a raw log. A malformed
/// normalized record is an error, never a raw log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExistingEvent {
    Normalized(ClaimRecord),
    Raw(RawLogRecord),
}

impl<'de> Deserialize<'de> for ExistingEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        if object.contains_key("tx_hash") {
            ClaimRecord::deserialize(Value::Object(object))
                .map(ExistingEvent::Normalized)
                .map_err(D::Error::custom)
        } else {
            RawLogRecord::deserialize(Value::Object(object))
                .map(ExistingEvent::Raw)
                .map_err(D::Error::custom)
        }
    }
}

impl ExistingEvent {
    pub fn block_number(&self) -> u64 {
        match self {
            ExistingEvent::Normalized(record) => record.block_number,
            ExistingEvent::Raw(log) => log.block_number,
        }
    }
}

impl From<ClaimRecord> for ExistingEvent {
    fn from(record: ClaimRecord) -> Self {
        ExistingEvent::Normalized(record)
    }
}

impl From<RawLogRecord> for ExistingEvent {
    fn from(log: RawLogRecord) -> Self {
        ExistingEvent::Raw(log)
    }
}

/// Value of an indexed parameter read from a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicValue {
    Address(Address),
    /// Unsigned integer saturated to [MAX_AMOUNT_RAW].
    Uint(u64),
    Word(B256),
}

/// Saturates an unsigned integer to the signed 63-bit range.
pub fn cap_amount(value: U256) -> u64 {
    u64::try_from(value)
        .unwrap_or(MAX_AMOUNT_RAW)
        .min(MAX_AMOUNT_RAW)
}

fn normalize_topic(topic: &str) -> String {
    let topic = topic.trim();
    topic
        .strip_prefix("0x")
        .or_else(|| topic.strip_prefix("0X"))
        .unwrap_or(topic)
        .to_ascii_lowercase()
}

/// Decodes the logs matching any of the given event schemas.
pub fn decode_logs(schemas: &[EventSchema], logs: &[RawLogRecord]) -> Vec<ClaimRecord> {
    // Keyed by the bare lowercase hex of the topic hash; incoming topics are normalized the same way.
    let by_topic: HashMap<String, &EventSchema> = schemas
        .iter()
        .map(|schema| (hex::encode(schema.topic0()), schema))
        .collect();

    logs.iter()
        .filter_map(|log| {
            let topic0 = log.topic0()?;
            let schema = by_topic.get(&normalize_topic(topic0))?;
            decode_log(schema, log)
        })
        .collect()
}

/// Decodes a single log against a schema, without checking its topic hash.
///
/// Returns `None` when the log data can't be decoded for the schema's non-indexed parameters.
pub fn decode_log(schema: &EventSchema, log: &RawLogRecord) -> Option<ClaimRecord> {
    let body = match decode_body(schema, &log.data) {
        Ok(values) => values,
        Err(reason) => {
            debug!(
                "Skipping log {}:{} of event {}: {reason}",
                log.transaction_hash,
                log.log_index,
                schema.name()
            );
            return None;
        }
    };
    let indexed = decode_topics(schema, &log.topics);
    let field_map = schema.field_map();

    let claimer = field_map
        .claimer
        .iter()
        .find_map(|slot| match slot {
            ParamSlot::Indexed(i) => match indexed.get(*i) {
                Some(Some(TopicValue::Address(address))) => Some(*address),
                _ => None,
            },
            ParamSlot::Body(i) => match body.get(*i) {
                Some(DynSolValue::Address(address)) => Some(*address),
                _ => None,
            },
        })
        .map(|address| address.to_checksum(None))
        .unwrap_or_default();

    let amount_raw = field_map
        .amount
        .iter()
        .find_map(|slot| match slot {
            ParamSlot::Indexed(i) => match indexed.get(*i) {
                Some(Some(TopicValue::Uint(value))) => Some(*value),
                _ => None,
            },
            ParamSlot::Body(i) => match body.get(*i) {
                Some(DynSolValue::Uint(value, _)) => Some(cap_amount(*value)),
                _ => None,
            },
        })
        .unwrap_or(0);

    Some(ClaimRecord {
        claimer,
        amount_raw,
        tx_hash: log.transaction_hash.clone(),
        block_number: log.block_number,
        log_index: log.log_index,
        timestamp: log.timestamp,
    })
}

fn decode_body(schema: &EventSchema, data: &str) -> Result<Vec<DynSolValue>, String> {
    let params = schema.body_params();
    if params.is_empty() {
        return Ok(Vec::new());
    }

    let data = data.trim();
    let data = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .unwrap_or(data);
    let bytes = hex::decode(data).map_err(|e| format!("data is not hex: {e}"))?;

    let tuple = DynSolType::Tuple(params.iter().map(|p| p.ty.clone()).collect());
    match tuple.abi_decode_sequence(&bytes) {
        Ok(DynSolValue::Tuple(values)) => Ok(values),
        Ok(other) => Ok(vec![other]),
        Err(e) => Err(format!("ABI decoding failed: {e}")),
    }
}

/// Reads a topic as a 32-byte word. Topics shorter than a word are left-padded with zeros.
fn topic_word(topic: &str) -> Option<B256> {
    let digits = normalize_topic(topic);
    if digits.is_empty() || digits.len() > 64 {
        return None;
    }
    B256::from_str(&format!("{digits:0>64}")).ok()
}

/// Reads the indexed parameters from `topics[1..]`. Missing or malformed topics yield `None`.
fn decode_topics(schema: &EventSchema, topics: &[Option<String>]) -> Vec<Option<TopicValue>> {
    schema
        .indexed_params()
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let word = topics
                .get(i + 1)
                .and_then(Option::as_deref)
                .and_then(topic_word)?;

            Some(match param.ty {
                DynSolType::Address => TopicValue::Address(Address::from_word(word)),
                DynSolType::Uint(_) => TopicValue::Uint(cap_amount(U256::from_be_bytes(word.0))),
                _ => TopicValue::Word(word),
            })
        })
        .collect()
}
