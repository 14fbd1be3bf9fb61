//! core::entry
//!
//! The ledger entry: the atomic, immutable fact everything else is derived
//! from.
//!
//! # Invariants
//!
//! - Entries are append-only. Editing or deleting a logical object is a new
//!   entry referencing the same `entity_id`, never a mutation of history.
//! - The state of an entity is a pure function of its entries in canonical
//!   order, `(created_at, sequence)`.
//! - Each action type is legal for a fixed set of entity types (see
//!   [`ActionType::allowed_entity_types`]); stores reject anything else.
//!
//! # Example
//!
//! ```
//! use beanledger::core::entry::{ActionType, LedgerEntry};
//! use beanledger::core::entry::schema::{EntryPayload, EquipmentRecord};
//! use beanledger::core::types::{EntityId, EntityType, UserId};
//!
//! let entry = LedgerEntry::new(
//!     UserId::new("alice").unwrap(),
//!     EntityType::Equipment,
//!     EntityId::new("equipment-1").unwrap(),
//!     0.0,
//!     EntryPayload::EquipmentAdded(EquipmentRecord {
//!         name: "Grinder".into(),
//!         kind: "grinder".into(),
//!         brand: None,
//!         model: None,
//!         notes: None,
//!     }),
//! );
//! assert_eq!(entry.action_type(), ActionType::EquipmentAdded);
//! assert!(entry.check_constraints().is_ok());
//! ```

pub mod schema;

use serde::{Deserialize, Serialize};

use crate::core::types::{CoffeeKey, EntityId, EntityType, EntryId, TypeError, UserId, UtcTimestamp};
use schema::EntryPayload;

/// The closed set of actions that produce ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    GreenPurchase,
    RoastCompleted,
    Consumption,
    GreenAdjustment,
    RoastedAdjustment,
    RoastScheduled,
    RoastEdited,
    RoastDeleted,
    BrewLogged,
    EquipmentAdded,
    EquipmentUpdated,
}

impl ActionType {
    /// All action types, in declaration order.
    pub const ALL: [ActionType; 11] = [
        ActionType::GreenPurchase,
        ActionType::RoastCompleted,
        ActionType::Consumption,
        ActionType::GreenAdjustment,
        ActionType::RoastedAdjustment,
        ActionType::RoastScheduled,
        ActionType::RoastEdited,
        ActionType::RoastDeleted,
        ActionType::BrewLogged,
        ActionType::EquipmentAdded,
        ActionType::EquipmentUpdated,
    ];

    /// Wire name of the action type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::GreenPurchase => "green_purchase",
            ActionType::RoastCompleted => "roast_completed",
            ActionType::Consumption => "consumption",
            ActionType::GreenAdjustment => "green_adjustment",
            ActionType::RoastedAdjustment => "roasted_adjustment",
            ActionType::RoastScheduled => "roast_scheduled",
            ActionType::RoastEdited => "roast_edited",
            ActionType::RoastDeleted => "roast_deleted",
            ActionType::BrewLogged => "brew_logged",
            ActionType::EquipmentAdded => "equipment_added",
            ActionType::EquipmentUpdated => "equipment_updated",
        }
    }

    /// Entity types an entry with this action may target.
    pub fn allowed_entity_types(&self) -> &'static [EntityType] {
        match self {
            ActionType::GreenPurchase | ActionType::GreenAdjustment => &[EntityType::GreenCoffee],
            ActionType::RoastCompleted | ActionType::RoastedAdjustment => {
                &[EntityType::RoastedCoffee]
            }
            ActionType::Consumption => &[EntityType::GreenCoffee, EntityType::RoastedCoffee],
            ActionType::RoastScheduled | ActionType::RoastEdited | ActionType::RoastDeleted => {
                &[EntityType::RoastSchedule]
            }
            ActionType::BrewLogged => &[EntityType::Brew],
            ActionType::EquipmentAdded | ActionType::EquipmentUpdated => &[EntityType::Equipment],
        }
    }

    /// Whether this action only carries metadata (never moves weight).
    pub fn is_metadata_only(&self) -> bool {
        !self
            .allowed_entity_types()
            .iter()
            .any(EntityType::is_inventory)
    }
}

impl std::str::FromStr for ActionType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| TypeError::UnknownVariant {
                kind: "action type",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry as built by the factory, before the store has assigned
/// its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    /// Signed quantity delta in grams.
    pub amount_change: f64,
    pub payload: EntryPayload,
}

impl LedgerEntry {
    /// Create a new entry with a fresh id.
    pub fn new(
        user_id: UserId,
        entity_type: EntityType,
        entity_id: EntityId,
        amount_change: f64,
        payload: EntryPayload,
    ) -> Self {
        Self {
            id: EntryId::new(),
            user_id,
            entity_type,
            entity_id,
            amount_change,
            payload,
        }
    }

    /// The action type, derived from the payload.
    pub fn action_type(&self) -> ActionType {
        self.payload.action_type()
    }

    /// Normalized coffee name, if the payload names one.
    pub fn coffee_key(&self) -> Option<CoffeeKey> {
        self.payload
            .coffee_name()
            .and_then(|name| CoffeeKey::new(name).ok())
    }

    /// Whether this entry belongs to the schedule sub-ledger.
    pub fn is_schedule_entry(&self) -> bool {
        self.payload
            .schedule()
            .is_some_and(|meta| meta.schedule_entry)
    }

    /// Check the structural constraints every store enforces on insert.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first violated constraint.
    pub fn check_constraints(&self) -> Result<(), String> {
        let action = self.action_type();
        if !action.allowed_entity_types().contains(&self.entity_type) {
            return Err(format!(
                "action '{}' cannot target entity type '{}'",
                action, self.entity_type
            ));
        }
        if !self.amount_change.is_finite() {
            return Err(format!("amount_change must be finite, got {}", self.amount_change));
        }
        if action.is_metadata_only() && self.amount_change != 0.0 {
            return Err(format!(
                "action '{}' must not change amounts, got {}",
                action, self.amount_change
            ));
        }
        Ok(())
    }
}

/// A ledger entry as persisted, with its store-assigned position.
///
/// `sequence` is a per-store monotonic counter that breaks ties between
/// entries written within the same clock tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub sequence: u64,
    pub created_at: UtcTimestamp,
    pub entry: LedgerEntry,
}

impl StoredEntry {
    /// Canonical ordering key.
    pub fn order_key(&self) -> (UtcTimestamp, u64) {
        (self.created_at, self.sequence)
    }
}

impl std::ops::Deref for StoredEntry {
    type Target = LedgerEntry;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::schema::{Consumption, ConsumptionPurpose, EquipmentRecord};
    use super::*;

    fn user() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn consumption(amount: f64) -> EntryPayload {
        EntryPayload::Consumption(Consumption {
            coffee_name: "Kenya AA".into(),
            amount,
            purpose: ConsumptionPurpose::Manual,
            notes: None,
        })
    }

    mod action_type {
        use super::*;

        #[test]
        fn parse_roundtrip() {
            for a in ActionType::ALL {
                assert_eq!(a.as_str().parse::<ActionType>().unwrap(), a);
            }
        }

        #[test]
        fn unknown_rejected() {
            assert!("roast_started".parse::<ActionType>().is_err());
        }

        #[test]
        fn metadata_only_actions() {
            assert!(ActionType::RoastScheduled.is_metadata_only());
            assert!(ActionType::BrewLogged.is_metadata_only());
            assert!(ActionType::EquipmentUpdated.is_metadata_only());
            assert!(!ActionType::Consumption.is_metadata_only());
            assert!(!ActionType::GreenPurchase.is_metadata_only());
        }
    }

    mod constraints {
        use super::*;

        #[test]
        fn consumption_allowed_on_both_coffee_types() {
            for t in [EntityType::GreenCoffee, EntityType::RoastedCoffee] {
                let entry = LedgerEntry::new(
                    user(),
                    t,
                    EntityId::new("x").unwrap(),
                    -10.0,
                    consumption(10.0),
                );
                assert!(entry.check_constraints().is_ok());
            }
        }

        #[test]
        fn wrong_entity_type_rejected() {
            let entry = LedgerEntry::new(
                user(),
                EntityType::Brew,
                EntityId::new("x").unwrap(),
                -10.0,
                consumption(10.0),
            );
            let err = entry.check_constraints().unwrap_err();
            assert!(err.contains("cannot target"));
        }

        #[test]
        fn metadata_only_with_amount_rejected() {
            let entry = LedgerEntry::new(
                user(),
                EntityType::Equipment,
                EntityId::new("x").unwrap(),
                5.0,
                EntryPayload::EquipmentAdded(EquipmentRecord {
                    name: "Scale".into(),
                    kind: "scale".into(),
                    brand: None,
                    model: None,
                    notes: None,
                }),
            );
            assert!(entry.check_constraints().is_err());
        }

        #[test]
        fn non_finite_amount_rejected() {
            let entry = LedgerEntry::new(
                user(),
                EntityType::GreenCoffee,
                EntityId::new("x").unwrap(),
                f64::NAN,
                consumption(10.0),
            );
            assert!(entry.check_constraints().is_err());
        }
    }

    #[test]
    fn coffee_key_is_normalized() {
        let entry = LedgerEntry::new(
            user(),
            EntityType::RoastedCoffee,
            EntityId::new("x").unwrap(),
            -1.0,
            consumption(1.0),
        );
        assert_eq!(entry.coffee_key().unwrap().as_str(), "kenya aa");
        assert!(!entry.is_schedule_entry());
    }

    #[test]
    fn stored_entry_json_roundtrip() {
        let stored = StoredEntry {
            sequence: 7,
            created_at: UtcTimestamp::now(),
            entry: LedgerEntry::new(
                user(),
                EntityType::RoastedCoffee,
                EntityId::new("roasted-1").unwrap(),
                -12.5,
                consumption(12.5),
            ),
        };
        let json = serde_json::to_string(&stored).unwrap();
        let parsed: StoredEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(stored, parsed);
        assert_eq!(parsed.action_type(), ActionType::Consumption);
    }
}
