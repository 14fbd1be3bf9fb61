//! core::entry::schema
//!
//! Typed payloads carried by ledger entries.
//!
//! # Schema Design
//!
//! Every action type has exactly one payload struct. The payload enum is
//! adjacently tagged, so an entry serializes as
//! `{"action_type": "...", "metadata": {...}}` and the action type can never
//! disagree with the shape of its metadata.
//!
//! The aggregator interprets only a handful of well-known fields: the
//! coffee name (for grouping) and the schedule flags `schedule_entry`,
//! `completed` and `deleted`. Everything else is descriptive.
//!
//! # Example
//!
//! ```
//! use beanledger::core::entry::schema::{AdjustmentReason, EntryPayload};
//! use beanledger::core::types::EntityType;
//!
//! assert!(AdjustmentReason::Shrinkage.valid_for(EntityType::GreenCoffee));
//! assert!(!AdjustmentReason::Shrinkage.valid_for(EntityType::RoastedCoffee));
//!
//! let json = r#"{"action_type":"equipment_added","metadata":{"name":"Grinder","kind":"grinder"}}"#;
//! let payload: EntryPayload = serde_json::from_str(json).unwrap();
//! assert_eq!(payload.action_type().as_str(), "equipment_added");
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::entry::ActionType;
use crate::core::types::{EntityId, EntityType, EntryId, TypeError};

/// Payload of a ledger entry, one variant per action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", content = "metadata", rename_all = "snake_case")]
pub enum EntryPayload {
    GreenPurchase(GreenPurchase),
    RoastCompleted(RoastCompletion),
    Consumption(Consumption),
    GreenAdjustment(Adjustment),
    RoastedAdjustment(Adjustment),
    RoastScheduled(ScheduleMetadata),
    RoastEdited(ScheduleMetadata),
    RoastDeleted(ScheduleMetadata),
    BrewLogged(BrewLog),
    EquipmentAdded(EquipmentRecord),
    EquipmentUpdated(EquipmentRecord),
}

impl EntryPayload {
    /// The action type this payload belongs to.
    pub fn action_type(&self) -> ActionType {
        match self {
            EntryPayload::GreenPurchase(_) => ActionType::GreenPurchase,
            EntryPayload::RoastCompleted(_) => ActionType::RoastCompleted,
            EntryPayload::Consumption(_) => ActionType::Consumption,
            EntryPayload::GreenAdjustment(_) => ActionType::GreenAdjustment,
            EntryPayload::RoastedAdjustment(_) => ActionType::RoastedAdjustment,
            EntryPayload::RoastScheduled(_) => ActionType::RoastScheduled,
            EntryPayload::RoastEdited(_) => ActionType::RoastEdited,
            EntryPayload::RoastDeleted(_) => ActionType::RoastDeleted,
            EntryPayload::BrewLogged(_) => ActionType::BrewLogged,
            EntryPayload::EquipmentAdded(_) => ActionType::EquipmentAdded,
            EntryPayload::EquipmentUpdated(_) => ActionType::EquipmentUpdated,
        }
    }

    /// The coffee this payload refers to, if any.
    pub fn coffee_name(&self) -> Option<&str> {
        match self {
            EntryPayload::GreenPurchase(p) => Some(&p.name),
            EntryPayload::RoastCompleted(r) => Some(&r.coffee_name),
            EntryPayload::Consumption(c) => Some(&c.coffee_name),
            EntryPayload::GreenAdjustment(a) | EntryPayload::RoastedAdjustment(a) => {
                Some(&a.coffee_name)
            }
            EntryPayload::RoastScheduled(s)
            | EntryPayload::RoastEdited(s)
            | EntryPayload::RoastDeleted(s) => Some(&s.record.coffee_name),
            EntryPayload::BrewLogged(b) => Some(&b.coffee_name),
            EntryPayload::EquipmentAdded(_) | EntryPayload::EquipmentUpdated(_) => None,
        }
    }

    /// Roast batch number, if this is a completed roast.
    pub fn batch_number(&self) -> Option<u64> {
        match self {
            EntryPayload::RoastCompleted(r) => Some(r.batch_number),
            _ => None,
        }
    }

    /// Schedule metadata, if this is a schedule entry.
    pub fn schedule(&self) -> Option<&ScheduleMetadata> {
        match self {
            EntryPayload::RoastScheduled(s)
            | EntryPayload::RoastEdited(s)
            | EntryPayload::RoastDeleted(s) => Some(s),
            _ => None,
        }
    }

    /// The metadata object as a JSON value.
    ///
    /// Used to evaluate free-form metadata predicates.
    pub fn metadata_value(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => map
                .remove("metadata")
                .unwrap_or(serde_json::Value::Null),
            _ => serde_json::Value::Null,
        }
    }
}

/// A green coffee purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenPurchase {
    pub name: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    /// Purchased weight in grams.
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Roast curve measurements. All optional; recorded as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoastProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_temp: Option<f64>,
    /// Seconds from charge to first crack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_crack_secs: Option<u32>,
    /// Seconds from first crack to drop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_secs: Option<u32>,
}

/// A completed roast: the roasted-output side of the transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoastCompletion {
    pub coffee_name: String,
    pub green_weight: f64,
    pub roasted_weight: f64,
    pub weight_loss_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roast_level: Option<String>,
    pub roast_date: NaiveDate,
    pub batch_number: u64,
    #[serde(default)]
    pub profile: RoastProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Why coffee left inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsumptionPurpose {
    /// Green coffee drawn into a roast batch.
    Roast { batch_number: u64, roast_entity: EntityId },
    /// Roasted coffee used by a logged brew.
    Brew { brew_entity: EntityId },
    /// Anything else recorded by hand.
    Manual,
}

/// Coffee leaving inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    pub coffee_name: String,
    /// Consumed weight in grams (positive).
    pub amount: f64,
    pub purpose: ConsumptionPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Reason codes for manual inventory adjustments.
///
/// Green and roasted coffee share most codes; `shrinkage` applies only to
/// green coffee and `stale` only to roasted coffee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    PhysicalCount,
    Spillage,
    Shrinkage,
    Stale,
    Found,
    Other,
}

impl AdjustmentReason {
    /// All reason codes.
    pub const ALL: [AdjustmentReason; 6] = [
        AdjustmentReason::PhysicalCount,
        AdjustmentReason::Spillage,
        AdjustmentReason::Shrinkage,
        AdjustmentReason::Stale,
        AdjustmentReason::Found,
        AdjustmentReason::Other,
    ];

    /// Wire name of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::PhysicalCount => "physical_count",
            AdjustmentReason::Spillage => "spillage",
            AdjustmentReason::Shrinkage => "shrinkage",
            AdjustmentReason::Stale => "stale",
            AdjustmentReason::Found => "found",
            AdjustmentReason::Other => "other",
        }
    }

    /// Whether this reason may be used for the given entity type.
    pub fn valid_for(&self, entity_type: EntityType) -> bool {
        match (self, entity_type) {
            (AdjustmentReason::Shrinkage, EntityType::GreenCoffee) => true,
            (AdjustmentReason::Stale, EntityType::RoastedCoffee) => true,
            (AdjustmentReason::Shrinkage | AdjustmentReason::Stale, _) => false,
            (_, t) => t.is_inventory(),
        }
    }
}

impl std::str::FromStr for AdjustmentReason {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| TypeError::UnknownVariant {
                kind: "adjustment reason",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manual correction of an inventory amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub coffee_name: String,
    pub old_amount: f64,
    pub new_amount: f64,
    pub reason: AdjustmentReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Set on compensating entries: the entry this one reverses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverses: Option<EntryId>,
}

/// The user-editable part of a scheduled roast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub coffee_name: String,
    pub scheduled_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roast_level: Option<String>,
    /// Planned green weight in grams.
    pub green_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// What a completed schedule turned into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoastOutcome {
    pub batch_number: u64,
    pub roasted_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roast_entry: Option<EntryId>,
}

/// Metadata of a schedule entry.
///
/// Each schedule entry carries the full record as of that entry, so folding
/// only has to take the latest record. The terminal flags are sticky during
/// the fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMetadata {
    pub schedule_entry: bool,
    #[serde(flatten)]
    pub record: ScheduleRecord,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RoastOutcome>,
    #[serde(default)]
    pub deleted: bool,
}

impl ScheduleMetadata {
    /// Metadata for a live (non-terminal) schedule entry.
    pub fn open(record: ScheduleRecord) -> Self {
        Self {
            schedule_entry: true,
            record,
            completed: false,
            completed_date: None,
            outcome: None,
            deleted: false,
        }
    }
}

/// A logged brew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrewLog {
    pub coffee_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub dose_grams: f64,
    pub water_grams: f64,
    /// Water-to-coffee ratio (`water / dose`).
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grind_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brew_time_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_temp_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A piece of roasting or brewing equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ScheduleRecord {
        ScheduleRecord {
            coffee_name: "Kenya AA".into(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            roast_level: Some("light".into()),
            green_weight: 250.0,
            notes: None,
        }
    }

    mod payload {
        use super::*;

        #[test]
        fn json_has_action_type_tag() {
            let payload = EntryPayload::RoastScheduled(ScheduleMetadata::open(record()));
            let json = serde_json::to_string(&payload).unwrap();
            assert!(json.contains("\"action_type\":\"roast_scheduled\""));
            assert!(json.contains("\"metadata\""));
        }

        #[test]
        fn schedule_record_is_flattened_into_metadata() {
            let payload = EntryPayload::RoastScheduled(ScheduleMetadata::open(record()));
            let meta = payload.metadata_value();
            assert_eq!(meta["schedule_entry"], serde_json::Value::Bool(true));
            assert_eq!(meta["coffee_name"], "Kenya AA");
            assert_eq!(meta["completed"], serde_json::Value::Bool(false));
        }

        #[test]
        fn action_type_follows_variant() {
            let adj = Adjustment {
                coffee_name: "X".into(),
                old_amount: 50.0,
                new_amount: 40.0,
                reason: AdjustmentReason::PhysicalCount,
                notes: None,
                reverses: None,
            };
            assert_eq!(
                EntryPayload::GreenAdjustment(adj.clone()).action_type(),
                ActionType::GreenAdjustment
            );
            assert_eq!(
                EntryPayload::RoastedAdjustment(adj).action_type(),
                ActionType::RoastedAdjustment
            );
        }

        #[test]
        fn coffee_name_accessor() {
            let payload = EntryPayload::RoastEdited(ScheduleMetadata::open(record()));
            assert_eq!(payload.coffee_name(), Some("Kenya AA"));

            let equipment = EntryPayload::EquipmentAdded(EquipmentRecord {
                name: "Grinder".into(),
                kind: "grinder".into(),
                brand: None,
                model: None,
                notes: None,
            });
            assert_eq!(equipment.coffee_name(), None);
        }

        #[test]
        fn unknown_action_type_rejected() {
            let json = r#"{"action_type":"teleport","metadata":{}}"#;
            assert!(serde_json::from_str::<EntryPayload>(json).is_err());
        }
    }

    mod adjustment_reason {
        use super::*;

        #[test]
        fn shared_reasons_valid_for_both() {
            for reason in [
                AdjustmentReason::PhysicalCount,
                AdjustmentReason::Spillage,
                AdjustmentReason::Found,
                AdjustmentReason::Other,
            ] {
                assert!(reason.valid_for(EntityType::GreenCoffee));
                assert!(reason.valid_for(EntityType::RoastedCoffee));
            }
        }

        #[test]
        fn type_specific_reasons() {
            assert!(AdjustmentReason::Shrinkage.valid_for(EntityType::GreenCoffee));
            assert!(!AdjustmentReason::Shrinkage.valid_for(EntityType::RoastedCoffee));
            assert!(AdjustmentReason::Stale.valid_for(EntityType::RoastedCoffee));
            assert!(!AdjustmentReason::Stale.valid_for(EntityType::GreenCoffee));
        }

        #[test]
        fn non_inventory_entities_rejected() {
            assert!(!AdjustmentReason::Other.valid_for(EntityType::Brew));
        }

        #[test]
        fn parse() {
            assert_eq!(
                "physical_count".parse::<AdjustmentReason>().unwrap(),
                AdjustmentReason::PhysicalCount
            );
            assert!("lost_in_mail".parse::<AdjustmentReason>().is_err());
        }
    }
}
