//! Error types for the branching core.

use crate::types::{Bid, Eid, Revnum};
use thiserror::Error;

/// Main error type for branching operations.
#[derive(Debug, Error)]
pub enum BranchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No such revision: {0}")]
    NoSuchRevision(Revnum),

    #[error("Branch not found: {bid} in {rev}")]
    BranchNotFoundInRev { bid: Bid, rev: Revnum },

    #[error("Branch not found: {0}")]
    BranchNotFound(Bid),

    #[error("Branch already exists: {0}")]
    BranchExists(Bid),

    #[error("Element not found: {0}")]
    ElementNotFound(Eid),

    #[error("Duplicate sibling name '{name}' under {parent}")]
    DuplicateSiblingName { parent: Eid, name: String },

    #[error("Parent element {parent} not present in tree")]
    DanglingParent { parent: Eid },

    #[error("Cycle: {eid} cannot be moved under its own descendant {parent}")]
    Cycle { eid: Eid, parent: Eid },

    #[error("Revision out of order: expected {expected}, got {got}")]
    RevisionOutOfOrder { expected: Revnum, got: Revnum },

    #[error("Invalid branch id: {0}")]
    InvalidBranchId(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for BranchError {
    fn from(e: serde_json::Error) -> Self {
        BranchError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for BranchError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        BranchError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for BranchError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        BranchError::Deserialization(e.to_string())
    }
}

/// Result type for branching operations.
pub type Result<T> = std::result::Result<T, BranchError>;
