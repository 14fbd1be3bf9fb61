//! ledger::error
//!
//! Errors and consistency warnings raised by the ledger core.

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{CoffeeKey, EntityType, EntryId};
use crate::store::StoreError;

/// A request was malformed. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending input field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors from ledger operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("persistence error: {0}")]
    Persistence(StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateBatch(n) => LedgerError::Validation(ValidationError::new(
                "batch_number",
                format!("batch {} is already recorded", n),
            )),
            other => LedgerError::Persistence(other),
        }
    }
}

/// Something about the ledger's history needs attention.
///
/// Warnings are logged and returned alongside results; they never fail an
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyWarning {
    /// A group's running total dropped below zero.
    NegativeBalance {
        entity_type: EntityType,
        coffee_key: CoffeeKey,
        /// First entry that took the running total negative.
        first_negative: EntryId,
        /// True signed total.
        total: f64,
    },

    /// Two independent computations of a total disagree.
    ComputationDivergence {
        entity_type: EntityType,
        coffee_key: CoffeeKey,
        aggregated: f64,
        naive: f64,
    },

    /// A half-applied roast was reversed.
    CompensatingEntry {
        original: EntryId,
        compensation: EntryId,
        reason: String,
    },

    /// A brew was logged but its dose never left roasted stock.
    UnconsumedBrew {
        brew: EntryId,
        /// Grams that should have been consumed.
        dose: f64,
        reason: String,
    },
}

impl std::fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyWarning::NegativeBalance {
                entity_type,
                coffee_key,
                first_negative,
                total,
            } => write!(
                f,
                "{} '{}' went negative at entry {} (true total {:.1}g)",
                entity_type, coffee_key, first_negative, total
            ),
            ConsistencyWarning::ComputationDivergence {
                entity_type,
                coffee_key,
                aggregated,
                naive,
            } => write!(
                f,
                "{} '{}' totals diverge: aggregated {:.6}g, naive {:.6}g",
                entity_type, coffee_key, aggregated, naive
            ),
            ConsistencyWarning::CompensatingEntry {
                original,
                compensation,
                reason,
            } => write!(
                f,
                "entry {} reversed by {}: {}",
                original, compensation, reason
            ),
            ConsistencyWarning::UnconsumedBrew { brew, dose, reason } => write!(
                f,
                "brew {} logged but its {:.1}g dose was not drawn from stock: {}",
                brew, dose, reason
            ),
        }
    }
}
