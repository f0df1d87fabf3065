//! Error types for the row-store client and coordinator.
//!
//! # Design
//! Every failure of a unit of work is a `StoreError`. The variants keep the
//! distinctions a display layer may care about (auth vs. missing table vs.
//! transport) without forcing callers to match on them.

use thiserror::Error;

/// Errors produced by store requests and coordinator commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The request never produced an HTTP response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The store rejected the credentials (401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The table or row does not exist (404).
    #[error("resource not found")]
    NotFound,

    /// A single-row request would have returned zero or several rows (406).
    #[error("expected exactly one row: {0}")]
    NotSingleRow(String),

    /// Any other unexpected status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The request payload could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Delete and update address rows by id; the item was never persisted.
    #[error("item has no id")]
    MissingId,

    /// The coordinator task has stopped.
    #[error("coordinator closed")]
    Closed,
}

/// Errors raised while loading a `StoreConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
