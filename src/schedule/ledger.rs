//! schedule::ledger
//!
//! Schedule operations over an entry store.
//!
//! Every transition appends one entry; none ever rewrites history.
//! Transitions out of a terminal state are no-ops that return the current
//! state, except completing a deleted schedule, which is an error.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use beanledger::core::entry::schema::ScheduleRecord;
//! use beanledger::core::types::UserId;
//! use beanledger::schedule::ScheduleLedger;
//! use beanledger::store::memory::MemoryStore;
//! use beanledger::store::RetryPolicy;
//! use chrono::NaiveDate;
//!
//! # tokio_test::block_on(async {
//! let schedules = ScheduleLedger::new(Arc::new(MemoryStore::new()), RetryPolicy::none());
//! let user = UserId::new("alice").unwrap();
//! let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//!
//! schedules
//!     .create(&user, ScheduleRecord {
//!         coffee_name: "Kenya AA".into(),
//!         scheduled_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
//!         roast_level: None,
//!         green_weight: 250.0,
//!         notes: None,
//!     })
//!     .await
//!     .unwrap();
//!
//! let upcoming = schedules.list_upcoming(&user, 7, today).await.unwrap();
//! assert_eq!(upcoming.len(), 1);
//! # });
//! ```

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{debug, info};

use super::{fold, fold_all, SchedulePatch, ScheduledRoast};
use crate::core::entry::schema::{RoastOutcome, ScheduleRecord};
use crate::core::entry::{LedgerEntry, StoredEntry};
use crate::core::types::{CoffeeKey, EntityId, EntityType, UserId};
use crate::ledger::error::LedgerError;
use crate::ledger::factory::{build_schedule_action, ScheduleAction};
use crate::store::{EntryFilter, EntryStore, RetryPolicy, SortOrder};

/// Schedule sub-ledger.
#[derive(Debug)]
pub struct ScheduleLedger<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S> Clone for ScheduleLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry: self.retry,
        }
    }
}

impl<S: EntryStore> ScheduleLedger<S> {
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Create a schedule.
    pub async fn create(
        &self,
        user: &UserId,
        record: ScheduleRecord,
    ) -> Result<ScheduledRoast, LedgerError> {
        let id = EntityId::random("schedule");
        let entry = build_schedule_action(user, &id, &record, ScheduleAction::Scheduled)?;
        let stored = self.append(entry).await?;
        info!(user = %user, schedule = %id, "Scheduled roast");
        fold(std::slice::from_ref(&stored)).ok_or_else(|| not_found(&id))
    }

    /// Edit an open schedule.
    ///
    /// Editing a completed or deleted schedule changes nothing and returns
    /// its current state.
    pub async fn edit(
        &self,
        user: &UserId,
        id: &EntityId,
        patch: &SchedulePatch,
    ) -> Result<ScheduledRoast, LedgerError> {
        let mut current = self.require(user, id).await?;
        if !current.is_open() {
            debug!(schedule = %id, state = %current.state, "Ignoring edit of closed schedule");
            return Ok(current);
        }

        let record = patch.apply(&current.record());
        let entry = build_schedule_action(user, id, &record, ScheduleAction::Edited)?;
        let stored = self.append(entry).await?;
        current.apply(&stored);
        Ok(current)
    }

    /// Mark a schedule completed.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the schedule was deleted. Completing an
    /// already-completed schedule is a no-op.
    pub async fn complete(
        &self,
        user: &UserId,
        id: &EntityId,
        date: NaiveDate,
        outcome: Option<RoastOutcome>,
    ) -> Result<ScheduledRoast, LedgerError> {
        let mut current = self.require(user, id).await?;
        if current.deleted {
            return Err(LedgerError::InvalidTransition(format!(
                "schedule {} is deleted and cannot be completed",
                id
            )));
        }
        if current.completed {
            debug!(schedule = %id, "Schedule already completed");
            return Ok(current);
        }

        let entry = build_schedule_action(
            user,
            id,
            &current.record(),
            ScheduleAction::Completed { date, outcome },
        )?;
        let stored = self.append(entry).await?;
        current.apply(&stored);
        info!(user = %user, schedule = %id, "Completed scheduled roast");
        Ok(current)
    }

    /// Delete a schedule.
    ///
    /// Deleting twice, or deleting a completed schedule, is a no-op that
    /// returns the current state.
    pub async fn delete(&self, user: &UserId, id: &EntityId) -> Result<ScheduledRoast, LedgerError> {
        let mut current = self.require(user, id).await?;
        if !current.is_open() {
            debug!(schedule = %id, state = %current.state, "Ignoring delete of closed schedule");
            return Ok(current);
        }

        let entry = build_schedule_action(user, id, &current.record(), ScheduleAction::Deleted)?;
        let stored = self.append(entry).await?;
        current.apply(&stored);
        info!(user = %user, schedule = %id, "Deleted scheduled roast");
        Ok(current)
    }

    /// Current state of a schedule, if it exists for this user.
    pub async fn get(
        &self,
        user: &UserId,
        id: &EntityId,
    ) -> Result<Option<ScheduledRoast>, LedgerError> {
        let entries = self
            .retry
            .run("query_by_entity", || self.store.query_by_entity(user, id))
            .await?;
        Ok(fold(&entries))
    }

    /// All schedules that are not deleted, by scheduled date.
    pub async fn list(&self, user: &UserId) -> Result<Vec<ScheduledRoast>, LedgerError> {
        Ok(self
            .all(user)
            .await?
            .into_iter()
            .filter(|s| !s.deleted)
            .collect())
    }

    /// Open schedules dated from `today` through `today + horizon_days`.
    pub async fn list_upcoming(
        &self,
        user: &UserId,
        horizon_days: u32,
        today: NaiveDate,
    ) -> Result<Vec<ScheduledRoast>, LedgerError> {
        let until = today
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        Ok(self
            .all(user)
            .await?
            .into_iter()
            .filter(|s| s.is_open() && s.scheduled_date >= today && s.scheduled_date <= until)
            .collect())
    }

    /// Open schedules dated before `today`.
    pub async fn list_overdue(
        &self,
        user: &UserId,
        today: NaiveDate,
    ) -> Result<Vec<ScheduledRoast>, LedgerError> {
        Ok(self
            .all(user)
            .await?
            .into_iter()
            .filter(|s| s.is_open() && s.scheduled_date < today)
            .collect())
    }

    /// Find the open schedule a roast fulfils.
    ///
    /// Candidates share the coffee key, have the same roast level or none,
    /// and plan a green weight within `tolerance_grams` of the roast's.
    /// The earliest-dated candidate wins, then the earliest created.
    pub async fn find_match(
        &self,
        user: &UserId,
        key: &CoffeeKey,
        roast_level: Option<&str>,
        green_weight: f64,
        tolerance_grams: f64,
    ) -> Result<Option<ScheduledRoast>, LedgerError> {
        let level_matches = |planned: Option<&str>| match (planned, roast_level) {
            (None, _) => true,
            (Some(planned), Some(actual)) => planned.eq_ignore_ascii_case(actual.trim()),
            (Some(_), None) => false,
        };

        Ok(self.all(user).await?.into_iter().find(|s| {
            s.is_open()
                && CoffeeKey::new(&s.coffee_name).ok().as_ref() == Some(key)
                && level_matches(s.roast_level.as_deref())
                && (s.green_weight - green_weight).abs() <= tolerance_grams
        }))
    }

    async fn require(&self, user: &UserId, id: &EntityId) -> Result<ScheduledRoast, LedgerError> {
        self.get(user, id).await?.ok_or_else(|| not_found(id))
    }

    async fn all(&self, user: &UserId) -> Result<Vec<ScheduledRoast>, LedgerError> {
        let filter = EntryFilter::default()
            .entity_type(EntityType::RoastSchedule)
            .metadata_eq("schedule_entry", true)
            .order(SortOrder::Ascending);
        let entries = self
            .retry
            .run("query_by_user", || {
                self.store.query_by_user(user, &filter, None, 0)
            })
            .await?;
        Ok(fold_all(&entries))
    }

    async fn append(&self, entry: LedgerEntry) -> Result<StoredEntry, LedgerError> {
        Ok(self
            .retry
            .run("append", || self.store.append(entry.clone()))
            .await?)
    }
}

fn not_found(id: &EntityId) -> LedgerError {
    LedgerError::NotFound(format!("schedule {}", id))
}
