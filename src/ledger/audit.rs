//! ledger::audit
//!
//! Diagnostic recomputation of every inventory group.
//!
//! Unlike snapshots, the audit keeps groups whose total is zero or negative
//! and reports the true signed total. Each group is also summed naively, in
//! storage order and without the canonical sort, as an independent check on
//! the fold.

use serde::Serialize;
use tracing::warn;

use super::aggregate::{aggregate, group_inventory, negative_balance_warning};
use super::error::ConsistencyWarning;
use crate::core::entry::schema::EntryPayload;
use crate::core::entry::StoredEntry;
use crate::core::types::{CoffeeKey, EntityType, EntryId, UserId};

/// Largest accepted difference between the fold and the naive sum.
pub const DIVERGENCE_TOLERANCE: f64 = 1e-6;

/// One group's recomputed totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    pub entity_type: EntityType,
    pub coffee_key: CoffeeKey,
    /// True signed total from the canonical fold.
    pub total: f64,
    /// Clamped total as a snapshot would show it.
    pub display: f64,
    /// Plain sum in storage order.
    pub naive_total: f64,
    pub entry_count: usize,
    pub first_negative: Option<EntryId>,
    /// Entries in this group that reverse another entry.
    pub compensations: Vec<EntryId>,
}

/// Audit of all of a user's inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub rows: Vec<AuditRow>,
    pub warnings: Vec<ConsistencyWarning>,
}

impl AuditReport {
    /// Whether the audit found nothing to report.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Recompute every inventory group for a user.
pub fn audit(user: &UserId, entries: &[StoredEntry]) -> AuditReport {
    let mut report = AuditReport::default();

    for (group_key, group) in group_inventory(user, entries) {
        let balance = aggregate(group.iter().copied());
        let naive_total: f64 = entries
            .iter()
            .filter(|e| {
                &e.user_id == user
                    && e.entity_type == group_key.0
                    && e.coffee_key().as_ref() == Some(&group_key.1)
            })
            .map(|e| e.amount_change)
            .sum();

        if let Some(warning) = negative_balance_warning(&group_key, &balance) {
            report.warnings.push(warning);
        }
        if (balance.total - naive_total).abs() > DIVERGENCE_TOLERANCE {
            report.warnings.push(ConsistencyWarning::ComputationDivergence {
                entity_type: group_key.0,
                coffee_key: group_key.1.clone(),
                aggregated: balance.total,
                naive: naive_total,
            });
        }

        let compensations = group
            .iter()
            .filter(|e| match &e.payload {
                EntryPayload::GreenAdjustment(a) | EntryPayload::RoastedAdjustment(a) => {
                    a.reverses.is_some()
                }
                _ => false,
            })
            .map(|e| e.id.clone())
            .collect();

        let (entity_type, coffee_key) = group_key;
        report.rows.push(AuditRow {
            entity_type,
            coffee_key,
            total: balance.total,
            display: balance.display,
            naive_total,
            entry_count: group.len(),
            first_negative: balance.first_negative,
            compensations,
        });
    }

    for warning in &report.warnings {
        warn!(user = %user, "Audit: {}", warning);
    }
    report
}
