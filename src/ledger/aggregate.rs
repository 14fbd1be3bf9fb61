//! ledger::aggregate
//!
//! Folds ledger entries into balances and inventory snapshots.
//!
//! # Negative Balances
//!
//! `Balance::total` is the true signed sum of a group's deltas in canonical
//! order; `Balance::display` is that total clamped at zero. When the running
//! total first drops below zero the offending entry is remembered and a
//! [`ConsistencyWarning::NegativeBalance`] is produced. Groups whose total is
//! not positive are left out of snapshots. The audit path uses this same
//! fold, so the two can only disagree if the fold itself is wrong.
//!
//! # Example
//!
//! ```
//! use beanledger::core::entry::StoredEntry;
//! use beanledger::ledger::aggregate::aggregate;
//!
//! let entries: Vec<StoredEntry> = Vec::new();
//! let balance = aggregate(&entries);
//! assert_eq!(balance.total, 0.0);
//! assert_eq!(balance.display, 0.0);
//! assert!(balance.first_negative.is_none());
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use super::error::ConsistencyWarning;
use crate::core::entry::schema::EntryPayload;
use crate::core::entry::StoredEntry;
use crate::core::types::{CoffeeKey, EntityId, EntityType, EntryId, UserId, UtcTimestamp};

/// Totals at or below this are treated as empty.
pub const EMPTY_EPSILON: f64 = 1e-9;

/// Result of folding one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    /// True signed total.
    pub total: f64,
    /// `max(total, 0)`.
    pub display: f64,
    /// First entry that took the running total below zero.
    pub first_negative: Option<EntryId>,
}

/// Sum deltas in canonical order, tracking the running total.
pub fn aggregate<'a>(entries: impl IntoIterator<Item = &'a StoredEntry>) -> Balance {
    let mut ordered: Vec<&StoredEntry> = entries.into_iter().collect();
    ordered.sort_by_key(|e| e.order_key());

    let mut total = 0.0;
    let mut first_negative = None;
    for entry in ordered {
        total += entry.amount_change;
        if total < -EMPTY_EPSILON && first_negative.is_none() {
            first_negative = Some(entry.id.clone());
        }
    }

    Balance {
        total,
        display: total.max(0.0),
        first_negative,
    }
}

/// Grouping key for inventory entries.
pub type GroupKey = (EntityType, CoffeeKey);

/// Group a user's inventory entries by `(entity_type, coffee_key)`.
///
/// Non-inventory entries and entries of other users are skipped.
pub fn group_inventory<'a>(
    user: &UserId,
    entries: &'a [StoredEntry],
) -> BTreeMap<GroupKey, Vec<&'a StoredEntry>> {
    let mut groups: BTreeMap<GroupKey, Vec<&StoredEntry>> = BTreeMap::new();
    for entry in entries {
        if &entry.user_id != user || !entry.entity_type.is_inventory() {
            continue;
        }
        if let Some(key) = entry.coffee_key() {
            groups.entry((entry.entity_type, key)).or_default().push(entry);
        }
    }
    for group in groups.values_mut() {
        group.sort_by_key(|e| e.order_key());
    }
    groups
}

/// A green coffee lot with stock on hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreenRow {
    pub key: CoffeeKey,
    pub name: String,
    pub entity_id: EntityId,
    pub amount: f64,
    pub origin: Option<String>,
    pub farm: Option<String>,
    pub variety: Option<String>,
    pub process: Option<String>,
    pub supplier: Option<String>,
    pub last_purchase_date: Option<NaiveDate>,
    pub last_cost: Option<f64>,
}

/// Roasted coffee with stock on hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoastedRow {
    pub key: CoffeeKey,
    pub name: String,
    pub entity_id: EntityId,
    pub amount: f64,
    pub roast_level: Option<String>,
    pub roast_date: Option<NaiveDate>,
    pub batch_number: Option<u64>,
    pub weight_loss_percentage: Option<f64>,
    pub days_since_roast: Option<i64>,
    pub batch_count: usize,
}

/// Current inventory derived from the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventorySnapshot {
    /// Sorted by name.
    pub green: Vec<GreenRow>,
    /// Most recent roast first, then by name.
    pub roasted: Vec<RoastedRow>,
    pub warnings: Vec<ConsistencyWarning>,
}

/// Warning for a group whose running total went negative, if it did.
pub fn negative_balance_warning(
    (entity_type, key): &GroupKey,
    balance: &Balance,
) -> Option<ConsistencyWarning> {
    balance
        .first_negative
        .as_ref()
        .map(|first| ConsistencyWarning::NegativeBalance {
            entity_type: *entity_type,
            coffee_key: key.clone(),
            first_negative: first.clone(),
            total: balance.total,
        })
}

/// Build an inventory snapshot for one user as of `now`.
pub fn snapshot(user: &UserId, entries: &[StoredEntry], now: UtcTimestamp) -> InventorySnapshot {
    let mut snap = InventorySnapshot::default();

    for (group_key, group) in group_inventory(user, entries) {
        let balance = aggregate(group.iter().copied());
        if let Some(warning) = negative_balance_warning(&group_key, &balance) {
            warn!(user = %user, "{}", warning);
            snap.warnings.push(warning);
        }
        if balance.total <= EMPTY_EPSILON {
            continue;
        }

        let (entity_type, key) = group_key;
        match entity_type {
            EntityType::GreenCoffee => snap.green.push(green_row(user, key, &group, &balance)),
            EntityType::RoastedCoffee => {
                snap.roasted
                    .push(roasted_row(user, key, &group, &balance, now))
            }
            _ => {}
        }
    }

    snap.green.sort_by(|a, b| a.key.cmp(&b.key));
    snap.roasted.sort_by(|a, b| {
        b.roast_date
            .cmp(&a.roast_date)
            .then_with(|| a.key.cmp(&b.key))
    });
    snap
}

/// Display name: the latest name any entry in the group used.
fn display_name(group: &[&StoredEntry], key: &CoffeeKey) -> String {
    group
        .iter()
        .rev()
        .find_map(|e| e.payload.coffee_name())
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string())
}

fn green_row(user: &UserId, key: CoffeeKey, group: &[&StoredEntry], balance: &Balance) -> GreenRow {
    let purchase = group.iter().rev().find_map(|e| match &e.payload {
        EntryPayload::GreenPurchase(p) => Some(p),
        _ => None,
    });

    GreenRow {
        name: purchase
            .map(|p| p.name.clone())
            .unwrap_or_else(|| display_name(group, &key)),
        entity_id: EntityId::for_coffee(user, EntityType::GreenCoffee, &key),
        amount: balance.display,
        origin: purchase.map(|p| p.origin.clone()),
        farm: purchase.and_then(|p| p.farm.clone()),
        variety: purchase.and_then(|p| p.variety.clone()),
        process: purchase.and_then(|p| p.process.clone()),
        supplier: purchase.and_then(|p| p.supplier.clone()),
        last_purchase_date: purchase.and_then(|p| p.purchase_date),
        last_cost: purchase.and_then(|p| p.cost),
        key,
    }
}

fn roasted_row(
    user: &UserId,
    key: CoffeeKey,
    group: &[&StoredEntry],
    balance: &Balance,
    now: UtcTimestamp,
) -> RoastedRow {
    let roasts: Vec<_> = group
        .iter()
        .filter_map(|e| match &e.payload {
            EntryPayload::RoastCompleted(r) => Some(r),
            _ => None,
        })
        .collect();
    let latest = roasts.last().copied();

    RoastedRow {
        name: latest
            .map(|r| r.coffee_name.clone())
            .unwrap_or_else(|| display_name(group, &key)),
        entity_id: EntityId::for_coffee(user, EntityType::RoastedCoffee, &key),
        amount: balance.display,
        roast_level: latest.and_then(|r| r.roast_level.clone()),
        roast_date: latest.map(|r| r.roast_date),
        batch_number: latest.map(|r| r.batch_number),
        weight_loss_percentage: latest.map(|r| r.weight_loss_percentage),
        days_since_roast: latest.map(|r| (now.date() - r.roast_date).num_days()),
        batch_count: roasts.len(),
        key,
    }
}
