// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

//! Error type of the claim synchronization core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClaimsError {
    /// The ABI document is not a JSON array of entries.
    #[error("Invalid ABI: {0}")]
    InvalidAbi(String),

    #[error("Invalid event signature '{signature}': {reason}")]
    InvalidEventSignature { signature: String, reason: String },

    #[error("Event '{0}' not found in the ABI")]
    UnknownEvent(String),

    /// Failure reported by the block-explorer log API. The current sync attempt is aborted.
    #[error("Log API error: {0}")]
    LogApi(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClaimsError {
    fn from(error: reqwest::Error) -> Self {
        ClaimsError::LogApi(error.to_string())
    }
}

pub type ClaimsResult<T> = Result<T, ClaimsError>;
