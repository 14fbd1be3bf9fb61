//! schedule
//!
//! Roast schedules expressed as ledger entries.
//!
//! # State Machine
//!
//! ```text
//! scheduled --edit--> scheduled
//! scheduled --complete--> completed   (sticky)
//! scheduled --delete--> deleted       (sticky)
//! ```
//!
//! There is no mutable schedule table. A schedule's state is the fold of
//! its entries in canonical order: later entries override the record
//! fields, while the `completed` and `deleted` flags, once set, stay set.
//! Both states are terminal, so whichever flag lands first wins.
//!
//! # Modules
//!
//! - [`ledger`] - Operations that append schedule entries

pub mod ledger;

pub use ledger::ScheduleLedger;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::core::entry::schema::{RoastOutcome, ScheduleRecord};
use crate::core::entry::StoredEntry;
use crate::core::types::{EntityId, UtcTimestamp};

/// Lifecycle state of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    Scheduled,
    Completed,
    Deleted,
}

impl ScheduleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleState::Scheduled => "scheduled",
            ScheduleState::Completed => "completed",
            ScheduleState::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled roast as folded from its entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledRoast {
    pub id: EntityId,
    pub coffee_name: String,
    pub scheduled_date: NaiveDate,
    pub roast_level: Option<String>,
    /// Planned green weight in grams.
    pub green_weight: f64,
    pub notes: Option<String>,
    pub state: ScheduleState,
    pub completed: bool,
    pub completed_date: Option<NaiveDate>,
    pub deleted: bool,
    pub outcome: Option<RoastOutcome>,
    pub created_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,
}

impl ScheduledRoast {
    /// Neither completed nor deleted.
    pub fn is_open(&self) -> bool {
        self.state == ScheduleState::Scheduled
    }

    /// The editable record as of now.
    pub fn record(&self) -> ScheduleRecord {
        ScheduleRecord {
            coffee_name: self.coffee_name.clone(),
            scheduled_date: self.scheduled_date,
            roast_level: self.roast_level.clone(),
            green_weight: self.green_weight,
            notes: self.notes.clone(),
        }
    }

    /// Start a schedule from its first entry.
    ///
    /// Returns `None` if the entry is not a schedule entry.
    fn from_entry(stored: &StoredEntry) -> Option<Self> {
        let meta = stored.payload.schedule().filter(|m| m.schedule_entry)?;
        let record = &meta.record;
        let mut roast = Self {
            id: stored.entity_id.clone(),
            coffee_name: record.coffee_name.clone(),
            scheduled_date: record.scheduled_date,
            roast_level: record.roast_level.clone(),
            green_weight: record.green_weight,
            notes: record.notes.clone(),
            state: ScheduleState::Scheduled,
            completed: false,
            completed_date: None,
            deleted: false,
            outcome: None,
            created_at: stored.created_at,
            updated_at: stored.created_at,
        };
        roast.apply_flags(stored);
        Some(roast)
    }

    /// Fold one more entry of this schedule into the state.
    ///
    /// Entries of other entities or without the schedule marker are ignored.
    pub fn apply(&mut self, stored: &StoredEntry) {
        if stored.entity_id != self.id {
            return;
        }
        let Some(meta) = stored.payload.schedule().filter(|m| m.schedule_entry) else {
            return;
        };
        let record = &meta.record;
        self.coffee_name = record.coffee_name.clone();
        self.scheduled_date = record.scheduled_date;
        self.roast_level = record.roast_level.clone();
        self.green_weight = record.green_weight;
        self.notes = record.notes.clone();
        self.updated_at = self.updated_at.max(stored.created_at);
        self.apply_flags(stored);
    }

    fn apply_flags(&mut self, stored: &StoredEntry) {
        let Some(meta) = stored.payload.schedule() else {
            return;
        };
        let closed = self.completed || self.deleted;
        if meta.completed && !closed {
            self.completed = true;
            self.completed_date = meta.completed_date;
            self.outcome = meta.outcome.clone();
        } else if meta.deleted && !closed {
            self.deleted = true;
        }
        self.state = if self.deleted {
            ScheduleState::Deleted
        } else if self.completed {
            ScheduleState::Completed
        } else {
            ScheduleState::Scheduled
        };
    }
}

/// Fold the entries of a single schedule.
///
/// Entries are put into canonical order first. Returns `None` if none of
/// them is a schedule entry.
pub fn fold(entries: &[StoredEntry]) -> Option<ScheduledRoast> {
    let mut ordered: Vec<&StoredEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.order_key());

    let mut iter = ordered.into_iter();
    let mut state = iter.by_ref().find_map(ScheduledRoast::from_entry)?;
    for entry in iter {
        state.apply(entry);
    }
    Some(state)
}

/// Fold entries of many schedules, one result per entity.
///
/// Sorted by scheduled date, then creation time.
pub fn fold_all(entries: &[StoredEntry]) -> Vec<ScheduledRoast> {
    let mut by_entity: BTreeMap<&EntityId, Vec<StoredEntry>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.is_schedule_entry()) {
        by_entity.entry(&entry.entity_id).or_default().push(entry.clone());
    }

    let mut roasts: Vec<ScheduledRoast> = by_entity.values().filter_map(|e| fold(e)).collect();
    roasts.sort_by(|a, b| {
        a.scheduled_date
            .cmp(&b.scheduled_date)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    roasts
}

/// Fields to change on a schedule. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulePatch {
    pub coffee_name: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub roast_level: Option<String>,
    pub green_weight: Option<f64>,
    pub notes: Option<String>,
}

impl SchedulePatch {
    /// Apply the patch to a record.
    pub fn apply(&self, record: &ScheduleRecord) -> ScheduleRecord {
        ScheduleRecord {
            coffee_name: self
                .coffee_name
                .clone()
                .unwrap_or_else(|| record.coffee_name.clone()),
            scheduled_date: self.scheduled_date.unwrap_or(record.scheduled_date),
            roast_level: self.roast_level.clone().or_else(|| record.roast_level.clone()),
            green_weight: self.green_weight.unwrap_or(record.green_weight),
            notes: self.notes.clone().or_else(|| record.notes.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UserId;
    use crate::ledger::factory::{build_schedule_action, ScheduleAction};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn record(day: u32, weight: f64) -> ScheduleRecord {
        ScheduleRecord {
            coffee_name: "Kenya AA".into(),
            scheduled_date: date(day),
            roast_level: None,
            green_weight: weight,
            notes: None,
        }
    }

    fn entry(sequence: u64, id: &EntityId, record: ScheduleRecord, action: ScheduleAction) -> StoredEntry {
        StoredEntry {
            sequence,
            created_at: UtcTimestamp::now(),
            entry: build_schedule_action(&UserId::new("alice").unwrap(), id, &record, action)
                .unwrap(),
        }
    }

    #[test]
    fn later_entries_override_record() {
        let id = EntityId::random("schedule");
        let entries = vec![
            entry(1, &id, record(3, 250.0), ScheduleAction::Scheduled),
            entry(2, &id, record(4, 300.0), ScheduleAction::Edited),
        ];

        let roast = fold(&entries).unwrap();
        assert_eq!(roast.scheduled_date, date(4));
        assert_eq!(roast.green_weight, 300.0);
        assert!(roast.is_open());
    }

    #[test]
    fn completion_is_sticky() {
        let id = EntityId::random("schedule");
        let entries = vec![
            entry(1, &id, record(3, 250.0), ScheduleAction::Scheduled),
            entry(
                2,
                &id,
                record(3, 250.0),
                ScheduleAction::Completed {
                    date: date(3),
                    outcome: None,
                },
            ),
            entry(3, &id, record(9, 250.0), ScheduleAction::Edited),
        ];

        let roast = fold(&entries).unwrap();
        assert_eq!(roast.state, ScheduleState::Completed);
        assert!(roast.completed);
        assert_eq!(roast.completed_date, Some(date(3)));
    }

    #[test]
    fn delete_after_completion_is_ignored() {
        let id = EntityId::random("schedule");
        let entries = vec![
            entry(1, &id, record(3, 250.0), ScheduleAction::Scheduled),
            entry(
                2,
                &id,
                record(3, 250.0),
                ScheduleAction::Completed {
                    date: date(3),
                    outcome: None,
                },
            ),
            entry(3, &id, record(3, 250.0), ScheduleAction::Deleted),
        ];

        let roast = fold(&entries).unwrap();
        assert_eq!(roast.state, ScheduleState::Completed);
        assert!(roast.completed);
        assert!(!roast.deleted);
    }

    #[test]
    fn complete_after_deletion_is_ignored() {
        let id = EntityId::random("schedule");
        let entries = vec![
            entry(1, &id, record(3, 250.0), ScheduleAction::Scheduled),
            entry(2, &id, record(3, 250.0), ScheduleAction::Deleted),
            entry(
                3,
                &id,
                record(3, 250.0),
                ScheduleAction::Completed {
                    date: date(3),
                    outcome: None,
                },
            ),
        ];

        let roast = fold(&entries).unwrap();
        assert_eq!(roast.state, ScheduleState::Deleted);
        assert!(!roast.completed);
        assert_eq!(roast.completed_date, None);
    }

    #[test]
    fn fold_is_order_independent_of_input() {
        let id = EntityId::random("schedule");
        let mut entries = vec![
            entry(1, &id, record(3, 250.0), ScheduleAction::Scheduled),
            entry(2, &id, record(5, 250.0), ScheduleAction::Edited),
        ];
        let forward = fold(&entries).unwrap();
        entries.reverse();
        let backward = fold(&entries).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn fold_all_sorts_by_date() {
        let a = EntityId::random("schedule");
        let b = EntityId::random("schedule");
        let entries = vec![
            entry(1, &a, record(9, 250.0), ScheduleAction::Scheduled),
            entry(2, &b, record(2, 250.0), ScheduleAction::Scheduled),
        ];

        let all = fold_all(&entries);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b);
        assert_eq!(all[1].id, a);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let patched = SchedulePatch {
            green_weight: Some(500.0),
            ..Default::default()
        }
        .apply(&record(3, 250.0));

        assert_eq!(patched.green_weight, 500.0);
        assert_eq!(patched.scheduled_date, date(3));
        assert_eq!(patched.coffee_name, "Kenya AA");
    }
}
