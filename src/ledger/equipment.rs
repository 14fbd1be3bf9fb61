//! ledger::equipment
//!
//! Equipment records folded from `equipment_added` / `equipment_updated`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::entry::schema::{EntryPayload, EquipmentRecord};
use crate::core::entry::StoredEntry;
use crate::core::types::{EntityId, UtcTimestamp};

/// Current state of one piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Equipment {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub record: EquipmentRecord,
    pub added_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,
}

/// Fields to change on an existing piece of equipment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquipmentPatch {
    pub kind: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub notes: Option<String>,
}

impl EquipmentPatch {
    /// Apply the patch to a record.
    pub fn apply(&self, record: &EquipmentRecord) -> EquipmentRecord {
        EquipmentRecord {
            name: record.name.clone(),
            kind: self.kind.clone().unwrap_or_else(|| record.kind.clone()),
            brand: self.brand.clone().or_else(|| record.brand.clone()),
            model: self.model.clone().or_else(|| record.model.clone()),
            notes: self.notes.clone().or_else(|| record.notes.clone()),
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.brand.is_none() && self.model.is_none() && self.notes.is_none()
    }
}

/// Fold equipment entries into current records, sorted by name.
///
/// The latest entry for an entity wins.
pub fn fold_equipment(entries: &[StoredEntry]) -> Vec<Equipment> {
    let mut ordered: Vec<&StoredEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.order_key());

    let mut items: BTreeMap<EntityId, Equipment> = BTreeMap::new();
    for entry in ordered {
        let record = match &entry.payload {
            EntryPayload::EquipmentAdded(r) | EntryPayload::EquipmentUpdated(r) => r,
            _ => continue,
        };
        items
            .entry(entry.entity_id.clone())
            .and_modify(|item| {
                item.record = record.clone();
                item.updated_at = entry.created_at;
            })
            .or_insert_with(|| Equipment {
                entity_id: entry.entity_id.clone(),
                record: record.clone(),
                added_at: entry.created_at,
                updated_at: entry.created_at,
            });
    }

    let mut list: Vec<Equipment> = items.into_values().collect();
    list.sort_by(|a, b| a.record.name.to_lowercase().cmp(&b.record.name.to_lowercase()));
    list
}
