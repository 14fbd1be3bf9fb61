//! beanledger - An append-only ledger for coffee roasting and brewing
//!
//! Every purchase, roast, brew, correction, schedule change, and equipment
//! change is an immutable entry. Inventory, schedules, and equipment lists
//! are derived by replaying those entries.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the ledger)
//! - [`ledger`] - Entry construction, aggregation, audit, and the service façade
//! - [`schedule`] - Roast schedules as a sub-ledger
//! - [`store`] - The entry store seam with file and in-memory backends
//! - [`core`] - Domain types, entry schemas, config, and storage primitives
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! 1. Entries are never updated or deleted
//! 2. Replaying the same entries always yields the same state
//! 3. Reported inventory is never negative
//! 4. Both sides of a roast are recorded, or neither is

pub mod cli;
pub mod core;
pub mod ledger;
pub mod schedule;
pub mod store;
pub mod ui;
