//! ledger::factory
//!
//! Builds well-formed ledger entries from typed requests.
//!
//! # Design
//!
//! Builders are pure: no I/O, no clock, no store. They validate their input
//! and either return complete entries or a [`ValidationError`] naming the
//! offending field. Values are never coerced into range.
//!
//! # Example
//!
//! ```
//! use beanledger::ledger::factory::{self, NewRoast};
//! use beanledger::core::types::UserId;
//! use chrono::NaiveDate;
//!
//! let user = UserId::new("alice").unwrap();
//! let (roasted, green) = factory::build_roast_completed(
//!     &user,
//!     &NewRoast {
//!         coffee_name: "Ethiopia Sidamo".into(),
//!         green_weight: 220.0,
//!         roasted_weight: 185.0,
//!         roast_level: Some("city".into()),
//!         roast_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
//!         batch_number: None,
//!         profile: Default::default(),
//!         notes: None,
//!     },
//!     1,
//! )
//! .unwrap();
//!
//! assert_eq!(roasted.amount_change, 185.0);
//! assert_eq!(green.amount_change, -220.0);
//! ```

use chrono::NaiveDate;

use super::error::ValidationError;
use crate::core::entry::schema::{
    Adjustment, AdjustmentReason, BrewLog, Consumption, ConsumptionPurpose, EntryPayload,
    EquipmentRecord, GreenPurchase, RoastCompletion, RoastOutcome, RoastProfile,
    ScheduleMetadata, ScheduleRecord,
};
use crate::core::entry::LedgerEntry;
use crate::core::types::{CoffeeKey, EntityId, EntityType, UserId};

/// A roast to record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoast {
    pub coffee_name: String,
    pub green_weight: f64,
    pub roasted_weight: f64,
    pub roast_level: Option<String>,
    pub roast_date: NaiveDate,
    /// Explicit batch number; allocated by the store when absent.
    pub batch_number: Option<u64>,
    pub profile: RoastProfile,
    pub notes: Option<String>,
}

/// Coffee leaving inventory outside of a roast or brew.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConsumption {
    pub coffee_name: String,
    pub entity_type: EntityType,
    pub amount: f64,
    pub notes: Option<String>,
}

/// A correction from a known current amount to a counted amount.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentInput {
    pub coffee_name: String,
    pub old_amount: f64,
    pub new_amount: f64,
    pub reason: AdjustmentReason,
    pub notes: Option<String>,
}

/// A brew to log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBrew {
    pub coffee_name: String,
    pub method: Option<String>,
    pub dose_grams: f64,
    pub water_grams: f64,
    pub grind_size: Option<String>,
    pub brew_time_secs: Option<u32>,
    pub water_temp_c: Option<f64>,
    pub rating: Option<u8>,
    pub notes: Option<String>,
    /// Also draw the dose from roasted inventory.
    pub consume: bool,
}

/// Kind of schedule change.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleAction {
    Scheduled,
    Edited,
    Completed {
        date: NaiveDate,
        outcome: Option<RoastOutcome>,
    },
    Deleted,
}

/// Kind of equipment change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentChange {
    Added,
    Updated,
}

// =============================================================================
// Field validation
// =============================================================================

fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn require_positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::new(
            field,
            format!("must be a positive number of grams, got {}", value),
        ));
    }
    Ok(value)
}

fn require_non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(
            field,
            format!("cannot be negative, got {}", value),
        ));
    }
    Ok(value)
}

fn coffee_key(field: &'static str, name: &str) -> Result<CoffeeKey, ValidationError> {
    CoffeeKey::new(name).map_err(|e| ValidationError::new(field, e.to_string()))
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Builders
// =============================================================================

/// Build a green purchase entry (positive delta on the green lot).
///
/// # Errors
///
/// `name` and `origin` must be non-empty, `weight` positive, and `cost`
/// (if given) non-negative.
pub fn build_green_purchase(
    user: &UserId,
    input: &GreenPurchase,
) -> Result<LedgerEntry, ValidationError> {
    let name = require_text("name", &input.name)?;
    let origin = require_text("origin", &input.origin)?;
    let weight = require_positive("weight", input.weight)?;
    if let Some(cost) = input.cost {
        require_non_negative("cost", cost)?;
    }
    let key = coffee_key("name", &name)?;

    let payload = GreenPurchase {
        name,
        origin,
        farm: optional_text(&input.farm),
        variety: optional_text(&input.variety),
        process: optional_text(&input.process),
        supplier: optional_text(&input.supplier),
        notes: optional_text(&input.notes),
        ..input.clone()
    };

    Ok(LedgerEntry::new(
        user.clone(),
        EntityType::GreenCoffee,
        EntityId::for_coffee(user, EntityType::GreenCoffee, &key),
        weight,
        EntryPayload::GreenPurchase(payload),
    ))
}

/// Check a roast request without building anything.
///
/// Lets callers reject bad input before allocating a batch number.
pub fn validate_roast(input: &NewRoast) -> Result<(), ValidationError> {
    require_text("coffee_name", &input.coffee_name)?;
    let green = require_positive("green_weight", input.green_weight)?;
    let roasted = require_positive("roasted_weight", input.roasted_weight)?;
    if roasted > green {
        return Err(ValidationError::new(
            "roasted_weight",
            format!(
                "cannot exceed green weight ({}g roasted from {}g green)",
                roasted, green
            ),
        ));
    }
    if input.batch_number == Some(0) {
        return Err(ValidationError::new("batch_number", "must be at least 1"));
    }
    Ok(())
}

/// Weight lost during roasting, as a percentage of the green weight.
pub fn weight_loss_percentage(green_weight: f64, roasted_weight: f64) -> f64 {
    (green_weight - roasted_weight) / green_weight * 100.0
}

/// Build the two sides of a roast: `(roasted +, green -)`.
///
/// The roasted entry targets the batch entity; the green entry draws from
/// the green lot and references the batch.
pub fn build_roast_completed(
    user: &UserId,
    input: &NewRoast,
    batch_number: u64,
) -> Result<(LedgerEntry, LedgerEntry), ValidationError> {
    validate_roast(input)?;
    if batch_number == 0 {
        return Err(ValidationError::new("batch_number", "must be at least 1"));
    }
    let coffee_name = require_text("coffee_name", &input.coffee_name)?;
    let key = coffee_key("coffee_name", &coffee_name)?;
    let roast_entity = EntityId::for_roast_batch(user, &key, batch_number);

    let roasted = LedgerEntry::new(
        user.clone(),
        EntityType::RoastedCoffee,
        roast_entity.clone(),
        input.roasted_weight,
        EntryPayload::RoastCompleted(RoastCompletion {
            coffee_name: coffee_name.clone(),
            green_weight: input.green_weight,
            roasted_weight: input.roasted_weight,
            weight_loss_percentage: weight_loss_percentage(
                input.green_weight,
                input.roasted_weight,
            ),
            roast_level: optional_text(&input.roast_level),
            roast_date: input.roast_date,
            batch_number,
            profile: input.profile.clone(),
            notes: optional_text(&input.notes),
        }),
    );

    let green = LedgerEntry::new(
        user.clone(),
        EntityType::GreenCoffee,
        EntityId::for_coffee(user, EntityType::GreenCoffee, &key),
        -input.green_weight,
        EntryPayload::Consumption(Consumption {
            coffee_name,
            amount: input.green_weight,
            purpose: ConsumptionPurpose::Roast {
                batch_number,
                roast_entity,
            },
            notes: None,
        }),
    );

    Ok((roasted, green))
}

/// Build a manual consumption entry (`amount_change = -amount`).
pub fn build_consumption(
    user: &UserId,
    input: &NewConsumption,
) -> Result<LedgerEntry, ValidationError> {
    if !input.entity_type.is_inventory() {
        return Err(ValidationError::new(
            "entity_type",
            format!("cannot consume {}", input.entity_type),
        ));
    }
    let coffee_name = require_text("coffee_name", &input.coffee_name)?;
    let amount = require_positive("amount", input.amount)?;
    let key = coffee_key("coffee_name", &coffee_name)?;

    Ok(LedgerEntry::new(
        user.clone(),
        input.entity_type,
        EntityId::for_coffee(user, input.entity_type, &key),
        -amount,
        EntryPayload::Consumption(Consumption {
            coffee_name,
            amount,
            purpose: ConsumptionPurpose::Manual,
            notes: optional_text(&input.notes),
        }),
    ))
}

/// Build an adjustment entry (`amount_change = new - old`).
///
/// # Errors
///
/// `new_amount` must be non-negative and the reason must be valid for the
/// entity type.
pub fn build_adjustment(
    user: &UserId,
    entity_type: EntityType,
    input: &AdjustmentInput,
) -> Result<LedgerEntry, ValidationError> {
    if !entity_type.is_inventory() {
        return Err(ValidationError::new(
            "entity_type",
            format!("cannot adjust {}", entity_type),
        ));
    }
    let coffee_name = require_text("coffee_name", &input.coffee_name)?;
    let new_amount = require_non_negative("new_amount", input.new_amount)?;
    if !input.old_amount.is_finite() {
        return Err(ValidationError::new("old_amount", "must be finite"));
    }
    if !input.reason.valid_for(entity_type) {
        return Err(ValidationError::new(
            "reason",
            format!("'{}' does not apply to {}", input.reason, entity_type),
        ));
    }
    let key = coffee_key("coffee_name", &coffee_name)?;

    let adjustment = Adjustment {
        coffee_name,
        old_amount: input.old_amount,
        new_amount,
        reason: input.reason,
        notes: optional_text(&input.notes),
        reverses: None,
    };
    let payload = match entity_type {
        EntityType::GreenCoffee => EntryPayload::GreenAdjustment(adjustment),
        _ => EntryPayload::RoastedAdjustment(adjustment),
    };

    Ok(LedgerEntry::new(
        user.clone(),
        entity_type,
        EntityId::for_coffee(user, entity_type, &key),
        new_amount - input.old_amount,
        payload,
    ))
}

/// Build a schedule entry.
///
/// Completion is a `roast_edited` entry with `completed: true`; deletion is
/// `roast_deleted` with `deleted: true`. Amount is always zero.
pub fn build_schedule_action(
    user: &UserId,
    entity_id: &EntityId,
    record: &ScheduleRecord,
    action: ScheduleAction,
) -> Result<LedgerEntry, ValidationError> {
    let coffee_name = require_text("coffee_name", &record.coffee_name)?;
    coffee_key("coffee_name", &coffee_name)?;
    require_positive("green_weight", record.green_weight)?;

    let record = ScheduleRecord {
        coffee_name,
        roast_level: optional_text(&record.roast_level),
        notes: optional_text(&record.notes),
        ..record.clone()
    };
    let mut meta = ScheduleMetadata::open(record);

    let payload = match action {
        ScheduleAction::Scheduled => EntryPayload::RoastScheduled(meta),
        ScheduleAction::Edited => EntryPayload::RoastEdited(meta),
        ScheduleAction::Completed { date, outcome } => {
            meta.completed = true;
            meta.completed_date = Some(date);
            meta.outcome = outcome;
            EntryPayload::RoastEdited(meta)
        }
        ScheduleAction::Deleted => {
            meta.deleted = true;
            EntryPayload::RoastDeleted(meta)
        }
    };

    Ok(LedgerEntry::new(
        user.clone(),
        EntityType::RoastSchedule,
        entity_id.clone(),
        0.0,
        payload,
    ))
}

/// Build a brew entry and, if requested, the roasted consumption it causes.
pub fn build_brew(
    user: &UserId,
    input: &NewBrew,
) -> Result<(LedgerEntry, Option<LedgerEntry>), ValidationError> {
    let coffee_name = require_text("coffee_name", &input.coffee_name)?;
    let key = coffee_key("coffee_name", &coffee_name)?;
    let dose = require_positive("dose_grams", input.dose_grams)?;
    let water = require_positive("water_grams", input.water_grams)?;
    if let Some(rating) = input.rating {
        if !(1..=5).contains(&rating) {
            return Err(ValidationError::new(
                "rating",
                format!("must be between 1 and 5, got {}", rating),
            ));
        }
    }
    if let Some(temp) = input.water_temp_c {
        if !temp.is_finite() {
            return Err(ValidationError::new("water_temp_c", "must be finite"));
        }
    }

    let brew_entity = EntityId::random("brew");
    let brew = LedgerEntry::new(
        user.clone(),
        EntityType::Brew,
        brew_entity.clone(),
        0.0,
        EntryPayload::BrewLogged(BrewLog {
            coffee_name: coffee_name.clone(),
            method: optional_text(&input.method),
            dose_grams: dose,
            water_grams: water,
            ratio: water / dose,
            grind_size: optional_text(&input.grind_size),
            brew_time_secs: input.brew_time_secs,
            water_temp_c: input.water_temp_c,
            rating: input.rating,
            notes: optional_text(&input.notes),
        }),
    );

    let consumption = input.consume.then(|| {
        LedgerEntry::new(
            user.clone(),
            EntityType::RoastedCoffee,
            EntityId::for_coffee(user, EntityType::RoastedCoffee, &key),
            -dose,
            EntryPayload::Consumption(Consumption {
                coffee_name,
                amount: dose,
                purpose: ConsumptionPurpose::Brew { brew_entity },
                notes: None,
            }),
        )
    });

    Ok((brew, consumption))
}

/// Build an equipment entry.
pub fn build_equipment(
    user: &UserId,
    input: &EquipmentRecord,
    change: EquipmentChange,
) -> Result<LedgerEntry, ValidationError> {
    let name = require_text("name", &input.name)?;
    let kind = require_text("kind", &input.kind)?;
    let key = coffee_key("name", &name)?;

    let record = EquipmentRecord {
        name,
        kind,
        brand: optional_text(&input.brand),
        model: optional_text(&input.model),
        notes: optional_text(&input.notes),
    };
    let payload = match change {
        EquipmentChange::Added => EntryPayload::EquipmentAdded(record),
        EquipmentChange::Updated => EntryPayload::EquipmentUpdated(record),
    };

    Ok(LedgerEntry::new(
        user.clone(),
        EntityType::Equipment,
        EntityId::for_equipment(user, &key),
        0.0,
        payload,
    ))
}

/// Build the entry that reverses a roasted-side entry.
///
/// The result is a roasted adjustment with the opposite delta, reason
/// `other`, and `reverses` pointing at the original.
pub fn build_compensation(original: &LedgerEntry) -> Result<LedgerEntry, ValidationError> {
    if original.entity_type != EntityType::RoastedCoffee {
        return Err(ValidationError::new(
            "entity_type",
            format!("cannot compensate a {} entry", original.entity_type),
        ));
    }
    let coffee_name = original
        .payload
        .coffee_name()
        .ok_or_else(|| ValidationError::new("coffee_name", "original entry names no coffee"))?
        .to_string();

    Ok(LedgerEntry::new(
        original.user_id.clone(),
        EntityType::RoastedCoffee,
        original.entity_id.clone(),
        -original.amount_change,
        EntryPayload::RoastedAdjustment(Adjustment {
            coffee_name,
            old_amount: original.amount_change,
            new_amount: 0.0,
            reason: AdjustmentReason::Other,
            notes: Some(format!("reverses entry {}", original.id)),
            reverses: Some(original.id.clone()),
        }),
    ))
}
