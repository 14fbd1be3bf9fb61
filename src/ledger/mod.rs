//! ledger
//!
//! The coffee ledger: entry construction, aggregation, and the service
//! that ties them to a store.
//!
//! # Modules
//!
//! - [`factory`] - Pure builders turning validated input into entries
//! - [`aggregate`] - Folding entries into balances and inventory snapshots
//! - [`audit`] - Diagnostic recomputation of every group
//! - [`equipment`] - Equipment records folded from entries
//! - [`service`] - The [`LedgerService`] façade
//! - [`error`] - Validation errors and consistency warnings
//!
//! # Invariants
//!
//! - Entries are never updated or deleted; corrections are new entries
//! - Every derived value is a fold of entries in canonical order
//! - A reported amount is never negative, even when the true sum is

pub mod aggregate;
pub mod audit;
pub mod equipment;
pub mod error;
pub mod factory;
pub mod service;

pub use aggregate::{Balance, GreenRow, InventorySnapshot, RoastedRow};
pub use audit::{AuditReport, AuditRow};
pub use equipment::{Equipment, EquipmentPatch};
pub use error::{ConsistencyWarning, LedgerError, ValidationError};
pub use factory::{NewBrew, NewConsumption, NewRoast};
pub use service::{
    AdjustmentRequest, BrewRecorded, LedgerService, RoastRecorded, ServiceOptions,
};
