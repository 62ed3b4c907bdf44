// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Module that includes logic to parse a JSON with the definition of a smartcontract's ABI.
//!
//! # Description
//!
//! Only the event entries of an ABI are relevant for the claim ledger. Each selected event is turned into an
//! [EventSchema], which carries the topic hash used to filter the explorer logs, the resolved types of its
//! parameters and the mapping from parameters to claim fields.

use crate::error::{ClaimsError, ClaimsResult};
use alloy::{
    dyn_abi::DynSolType,
    json_abi::Event,
    primitives::{B256, keccak256},
};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

/// Raw ABI entry as found in the JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct AbiEntry {
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub entry_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub indexed: bool,
    #[serde(rename = "internalType")]
    pub internal_type: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub components: Vec<AbiParam>,
}

impl AbiEntry {
    pub fn is_event(&self) -> bool {
        self.entry_type == "event"
    }
}

impl AbiParam {
    /// Canonical type of the parameter, expanding `tuple` types from their components.
    fn canonical_type(&self) -> String {
        match self.param_type.strip_prefix("tuple") {
            Some(suffix) => {
                let inner = self
                    .components
                    .iter()
                    .map(AbiParam::canonical_type)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("({inner}){suffix}")
            }
            None => self.param_type.clone(),
        }
    }
}

/// Loads an ABI from its JSON text.
///
/// The root of the document must be a list of entries. Entries that are not objects, or that can't be read as ABI
/// entries, are ignored.
pub fn load_abi_from_json(data: &str) -> ClaimsResult<Vec<AbiEntry>> {
    let parsed: serde_json::Value = serde_json::from_str(data)?;

    let Some(entries) = parsed.as_array() else {
        return Err(ClaimsError::InvalidAbi(
            "ABI root must be a list of entries".to_string(),
        ));
    };

    Ok(entries
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| match serde_json::from_value::<AbiEntry>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Ignoring malformed ABI entry: {e}");
                None
            }
        })
        .collect())
}

/// Returns all the events of the ABI sorted by name.
pub fn find_all_events(abi: &[AbiEntry]) -> Vec<AbiEntry> {
    let mut events = abi
        .iter()
        .filter(|entry| entry.is_event())
        .cloned()
        .collect::<Vec<_>>();
    events.sort_by(|a, b| a.name.cmp(&b.name));
    events
}

/// Returns the events whose name contains `claim` (case-insensitive), sorted by name.
pub fn find_claim_events(abi: &[AbiEntry]) -> Vec<AbiEntry> {
    find_all_events(abi)
        .into_iter()
        .filter(|entry| entry.name.to_ascii_lowercase().contains("claim"))
        .collect()
}

/// Picks the event to track from an ABI.
///
/// # Description
///
/// When a name is given, the event with that name (case-insensitive) is selected. Otherwise the first claim-like
/// event is used.
pub fn select_event(abi: &[AbiEntry], name: Option<&str>) -> ClaimsResult<EventSchema> {
    let entry = match name {
        Some(name) => find_all_events(abi)
            .into_iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ClaimsError::UnknownEvent(name.to_string()))?,
        None => find_claim_events(abi)
            .into_iter()
            .next()
            .ok_or_else(|| ClaimsError::UnknownEvent("<any claim event>".to_string()))?,
    };

    EventSchema::from_abi_entry(&entry)
}

/// Location of a parameter within a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSlot {
    /// Position among the indexed parameters (topic `position + 1`).
    Indexed(usize),
    /// Position among the non-indexed parameters (ABI-encoded in the log data).
    Body(usize),
}

#[derive(Debug, Clone, Copy)]
enum ClaimField {
    Claimer,
    Amount,
}

struct FieldRule {
    field: ClaimField,
    accepts: fn(&DynSolType) -> bool,
    name_hints: &'static [&'static str],
}

fn is_address(ty: &DynSolType) -> bool {
    matches!(ty, DynSolType::Address)
}

fn is_unsigned(ty: &DynSolType) -> bool {
    matches!(ty, DynSolType::Uint(_))
}

/// Rules that map event parameters to claim fields. Parameter names are matched lowercased.
const CLAIM_FIELD_RULES: [FieldRule; 2] = [
    FieldRule {
        field: ClaimField::Claimer,
        accepts: is_address,
        name_hints: &["user", "account", "claimer"],
    },
    FieldRule {
        field: ClaimField::Amount,
        accepts: is_unsigned,
        name_hints: &["amount"],
    },
];

/// Candidate slots for the claim fields of an event, in priority order.
///
/// Indexed parameters come first. The decoder uses the first candidate that holds a value in a given log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimFieldMap {
    pub claimer: Vec<ParamSlot>,
    pub amount: Vec<ParamSlot>,
}

impl ClaimFieldMap {
    fn build(indexed: &[SchemaParam], body: &[SchemaParam]) -> Self {
        let slots = indexed
            .iter()
            .enumerate()
            .map(|(i, p)| (ParamSlot::Indexed(i), p))
            .chain(body.iter().enumerate().map(|(i, p)| (ParamSlot::Body(i), p)));

        let mut map = Self::default();
        for (slot, param) in slots {
            let name = param.name.to_ascii_lowercase();
            for rule in &CLAIM_FIELD_RULES {
                if (rule.accepts)(&param.ty) && rule.name_hints.iter().any(|h| name.contains(h)) {
                    match rule.field {
                        ClaimField::Claimer => map.claimer.push(slot),
                        ClaimField::Amount => map.amount.push(slot),
                    }
                }
            }
        }

        map
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaParam {
    pub name: String,
    pub ty: DynSolType,
}

/// Description of the contract event whose logs are turned into claim records.
#[derive(Debug, Clone)]
pub struct EventSchema {
    name: String,
    signature: String,
    topic0: B256,
    indexed: Vec<SchemaParam>,
    body: Vec<SchemaParam>,
    field_map: ClaimFieldMap,
}

impl EventSchema {
    /// Builds a schema from a parameter list of `(name, type, indexed)` triples.
    ///
    /// Anonymous events are rejected: their logs carry no topic hash to be matched against.
    pub fn new<'a, I>(name: &str, params: I, anonymous: bool) -> ClaimsResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str, bool)>,
    {
        if anonymous {
            return Err(ClaimsError::InvalidAbi(format!(
                "event '{name}' is anonymous and its logs can't be matched by topic"
            )));
        }

        let mut indexed = Vec::new();
        let mut body = Vec::new();
        let mut canonical_types = Vec::new();

        for (param_name, param_type, is_indexed) in params {
            let ty = DynSolType::parse(param_type).map_err(|e| {
                ClaimsError::InvalidEventSignature {
                    signature: name.to_string(),
                    reason: format!("unsupported type '{param_type}': {e}"),
                }
            })?;
            canonical_types.push(ty.sol_type_name().into_owned());

            let param = SchemaParam {
                name: param_name.to_string(),
                ty,
            };
            if is_indexed {
                indexed.push(param);
            } else {
                body.push(param);
            }
        }

        let signature = format!("{name}({})", canonical_types.join(","));
        let topic0 = keccak256(signature.as_bytes());
        let field_map = ClaimFieldMap::build(&indexed, &body);

        Ok(Self {
            name: name.to_string(),
            signature,
            topic0,
            indexed,
            body,
            field_map,
        })
    }

    pub fn from_abi_entry(entry: &AbiEntry) -> ClaimsResult<Self> {
        if !entry.is_event() {
            return Err(ClaimsError::InvalidAbi(format!(
                "entry '{}' is a {} and not an event",
                entry.name, entry.entry_type
            )));
        }

        let types = entry
            .inputs
            .iter()
            .map(AbiParam::canonical_type)
            .collect::<Vec<_>>();

        Self::new(
            &entry.name,
            entry
                .inputs
                .iter()
                .zip(types.iter())
                .map(|(p, ty)| (p.name.as_str(), ty.as_str(), p.indexed)),
            entry.anonymous,
        )
    }

    pub fn from_event(event: &Event) -> ClaimsResult<Self> {
        let types = event
            .inputs
            .iter()
            .map(|p| p.selector_type().into_owned())
            .collect::<Vec<_>>();

        Self::new(
            &event.name,
            event
                .inputs
                .iter()
                .zip(types.iter())
                .map(|(p, ty)| (p.name.as_str(), ty.as_str(), p.indexed)),
            event.anonymous,
        )
    }

    /// Parses a human readable signature such as `Claim(address indexed account, uint256 amount)`.
    pub fn from_signature(signature: &str) -> ClaimsResult<Self> {
        let signature = signature.trim();
        let full_signature = if signature.starts_with("event ") {
            signature.to_string()
        } else {
            format!("event {signature}")
        };

        let event =
            Event::from_str(&full_signature).map_err(|e| ClaimsError::InvalidEventSignature {
                signature: signature.to_string(),
                reason: e.to_string(),
            })?;

        Self::from_event(&event)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical signature, e.g. `Claim(address,uint256)`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn topic0(&self) -> B256 {
        self.topic0
    }

    /// Topic hash as a `0x`-prefixed lowercase hex string.
    pub fn topic0_hex(&self) -> String {
        format!("{:#x}", self.topic0)
    }

    pub fn indexed_params(&self) -> &[SchemaParam] {
        &self.indexed
    }

    pub fn body_params(&self) -> &[SchemaParam] {
        &self.body
    }

    pub fn field_map(&self) -> &ClaimFieldMap {
        &self.field_map
    }
}
