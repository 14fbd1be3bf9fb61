//! core
//!
//! Core domain types, entry schemas, and storage primitives for beanledger.
//!
//! # Modules
//!
//! - [`types`] - Strong types: UserId, CoffeeKey, EntityId, etc.
//! - [`entry`] - Ledger entry schema and action types
//! - [`ops`] - Entry journal, batch counters, and locking
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for ledger storage
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Entries are immutable once written

pub mod config;
pub mod entry;
pub mod ops;
pub mod paths;
pub mod types;
