//! ledger::service
//!
//! The ledger façade: validates requests, appends entries, and answers
//! inventory questions by replaying the ledger.
//!
//! # Architecture
//!
//! Every operation:
//! 1. Builds entries with the pure [`factory`](super::factory)
//! 2. Sends store calls through the configured [`RetryPolicy`]
//! 3. Derives state by folding entries; nothing derived is ever stored
//!
//! # Roast Atomicity
//!
//! A roast writes two entries. On stores with atomic batches they are
//! written together. Otherwise the roasted side is written first; if the
//! green side then fails, a compensating roasted adjustment reverses it and
//! the original error is returned.
//!
//! # Adjustments
//!
//! An adjustment reads the current total and writes the difference, so two
//! concurrent adjustments of one group could both read the same total.
//! Within a process each `(user, entity type, coffee)` group is serialized
//! by its own async mutex. Across processes, callers can pass
//! `expected_current` and get a validation error if the total moved.
//!
//! # Example
//!
//! ```
//! use beanledger::core::entry::schema::GreenPurchase;
//! use beanledger::core::types::UserId;
//! use beanledger::ledger::LedgerService;
//! use beanledger::store::memory::MemoryStore;
//!
//! # tokio_test::block_on(async {
//! let service = LedgerService::new(MemoryStore::new());
//! let user = UserId::new("alice").unwrap();
//!
//! service
//!     .record_green_purchase(&user, &GreenPurchase {
//!         name: "Ethiopia Sidamo".into(),
//!         origin: "Ethiopia".into(),
//!         farm: None,
//!         variety: None,
//!         process: None,
//!         weight: 1000.0,
//!         cost: None,
//!         purchase_date: None,
//!         supplier: None,
//!         notes: None,
//!     })
//!     .await
//!     .unwrap();
//!
//! let inventory = service.get_inventory(&user).await.unwrap();
//! assert_eq!(inventory.green[0].amount, 1000.0);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::aggregate::{self, aggregate, InventorySnapshot};
use super::audit::{self, AuditReport};
use super::equipment::{fold_equipment, Equipment, EquipmentPatch};
use super::error::{ConsistencyWarning, LedgerError, ValidationError};
use super::factory::{
    self, AdjustmentInput, EquipmentChange, NewBrew, NewConsumption, NewRoast,
};
use crate::core::config::DEFAULT_MATCH_TOLERANCE_GRAMS;
use crate::core::entry::schema::{
    AdjustmentReason, EquipmentRecord, GreenPurchase, RoastOutcome,
};
use crate::core::entry::{LedgerEntry, StoredEntry};
use crate::core::types::{CoffeeKey, EntityId, EntityType, UserId, UtcTimestamp};
use crate::schedule::{ScheduleLedger, ScheduledRoast};
use crate::store::{EntryFilter, EntryStore, RetryPolicy, SortOrder};

/// Largest difference between `expected_current` and the actual total that
/// still counts as a match.
pub const EXPECTED_CURRENT_TOLERANCE: f64 = 1e-6;

/// Tunables for a [`LedgerService`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceOptions {
    pub retry: RetryPolicy,
    /// How far a roast's green weight may differ from a schedule's planned
    /// weight and still complete it.
    pub match_tolerance_grams: f64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            match_tolerance_grams: DEFAULT_MATCH_TOLERANCE_GRAMS,
        }
    }
}

/// Result of recording a roast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoastRecorded {
    pub roasted_entry: StoredEntry,
    pub green_consumption_entry: StoredEntry,
    pub batch_number: u64,
    /// The schedule this roast completed, if any.
    pub matched_schedule: Option<ScheduledRoast>,
}

/// Result of logging a brew.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrewRecorded {
    pub brew_entry: StoredEntry,
    pub consumption_entry: Option<StoredEntry>,
}

/// A request to set a coffee group's amount.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentRequest {
    pub coffee_name: String,
    pub new_amount: f64,
    pub reason: AdjustmentReason,
    pub notes: Option<String>,
    /// Fail unless the current total is this value.
    pub expected_current: Option<f64>,
}

type GroupLockKey = (UserId, EntityType, CoffeeKey);

/// The ledger façade.
pub struct LedgerService<S> {
    store: Arc<S>,
    options: ServiceOptions,
    schedule: ScheduleLedger<S>,
    group_locks: StdMutex<HashMap<GroupLockKey, Arc<Mutex<()>>>>,
}

impl<S: EntryStore> LedgerService<S> {
    /// Create a service with default options.
    pub fn new(store: S) -> Self {
        Self::with_options(store, ServiceOptions::default())
    }

    /// Create a service with explicit options.
    pub fn with_options(store: S, options: ServiceOptions) -> Self {
        let store = Arc::new(store);
        Self {
            schedule: ScheduleLedger::new(Arc::clone(&store), options.retry),
            store,
            options,
            group_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The schedule sub-ledger sharing this service's store.
    pub fn schedule(&self) -> &ScheduleLedger<S> {
        &self.schedule
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Record a green coffee purchase.
    pub async fn record_green_purchase(
        &self,
        user: &UserId,
        input: &GreenPurchase,
    ) -> Result<StoredEntry, LedgerError> {
        let entry = factory::build_green_purchase(user, input)?;
        let stored = self.append(entry).await?;
        info!(user = %user, coffee = %input.name, grams = input.weight, "Recorded green purchase");
        Ok(stored)
    }

    /// Record a completed roast and complete the schedule it fulfils.
    pub async fn record_roast_completed(
        &self,
        user: &UserId,
        input: &NewRoast,
    ) -> Result<RoastRecorded, LedgerError> {
        factory::validate_roast(input)?;

        let batch_number = match input.batch_number {
            Some(n) => n,
            None => {
                self.options
                    .retry
                    .run("next_batch_number", || self.store.next_batch_number(user))
                    .await?
            }
        };
        let (roasted, green) = factory::build_roast_completed(user, input, batch_number)?;

        let (roasted_entry, green_consumption_entry) = if self.store.atomic_batches() {
            let stored = self.append_all(vec![roasted, green]).await?;
            pair(stored)?
        } else {
            self.append_roast_sequential(roasted, green).await?
        };
        info!(
            user = %user,
            coffee = %input.coffee_name,
            batch = batch_number,
            "Recorded roast"
        );

        let matched_schedule = self
            .complete_matching_schedule(user, input, batch_number, &roasted_entry)
            .await;

        Ok(RoastRecorded {
            roasted_entry,
            green_consumption_entry,
            batch_number,
            matched_schedule,
        })
    }

    /// Write both roast sides one at a time, compensating on failure.
    async fn append_roast_sequential(
        &self,
        roasted: LedgerEntry,
        green: LedgerEntry,
    ) -> Result<(StoredEntry, StoredEntry), LedgerError> {
        let roasted_entry = self.append(roasted).await?;
        match self.append(green).await {
            Ok(green_entry) => Ok((roasted_entry, green_entry)),
            Err(err) => {
                self.compensate(&roasted_entry, &err).await;
                Err(err)
            }
        }
    }

    /// Reverse a roasted entry whose green side never landed.
    async fn compensate(&self, original: &StoredEntry, cause: &LedgerError) {
        let compensation = match factory::build_compensation(original) {
            Ok(entry) => entry,
            Err(e) => {
                error!(entry = %original.id, error = %e, "Cannot build compensating entry");
                return;
            }
        };
        match self.append(compensation).await {
            Ok(stored) => {
                let warning = ConsistencyWarning::CompensatingEntry {
                    original: original.id.clone(),
                    compensation: stored.id.clone(),
                    reason: cause.to_string(),
                };
                warn!("{}", warning);
            }
            Err(e) => {
                error!(
                    entry = %original.id,
                    error = %e,
                    "Compensating entry failed; roasted inventory overstated until audited"
                );
            }
        }
    }

    /// Complete the oldest open schedule this roast fulfils.
    ///
    /// The roast is already recorded, so a failure here is logged rather
    /// than returned.
    async fn complete_matching_schedule(
        &self,
        user: &UserId,
        input: &NewRoast,
        batch_number: u64,
        roasted_entry: &StoredEntry,
    ) -> Option<ScheduledRoast> {
        let key = CoffeeKey::new(&input.coffee_name).ok()?;
        let found = self
            .schedule
            .find_match(
                user,
                &key,
                input.roast_level.as_deref(),
                input.green_weight,
                self.options.match_tolerance_grams,
            )
            .await;

        let candidate = match found {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Schedule matching failed");
                return None;
            }
        };

        let outcome = RoastOutcome {
            batch_number,
            roasted_weight: input.roasted_weight,
            roast_entry: Some(roasted_entry.id.clone()),
        };
        match self
            .schedule
            .complete(user, &candidate.id, input.roast_date, Some(outcome))
            .await
        {
            Ok(done) => {
                debug!(schedule = %done.id, batch = batch_number, "Roast completed schedule");
                Some(done)
            }
            Err(e) => {
                warn!(schedule = %candidate.id, error = %e, "Could not complete matched schedule");
                None
            }
        }
    }

    /// Record coffee leaving inventory.
    pub async fn record_consumption(
        &self,
        user: &UserId,
        input: &NewConsumption,
    ) -> Result<StoredEntry, LedgerError> {
        let entry = factory::build_consumption(user, input)?;
        self.append(entry).await
    }

    /// Set a coffee group to a counted amount.
    ///
    /// # Errors
    ///
    /// `Validation` on bad input, or when `expected_current` does not match
    /// the current total.
    pub async fn record_adjustment(
        &self,
        user: &UserId,
        entity_type: EntityType,
        request: &AdjustmentRequest,
    ) -> Result<StoredEntry, LedgerError> {
        if !entity_type.is_inventory() {
            return Err(ValidationError::new(
                "entity_type",
                format!("cannot adjust {}", entity_type),
            )
            .into());
        }
        let key = CoffeeKey::new(&request.coffee_name)
            .map_err(|e| ValidationError::new("coffee_name", e.to_string()))?;

        let lock = self.group_lock(user, entity_type, &key);
        let _guard = lock.lock().await;

        let current = self.current_total(user, entity_type, &key).await?;
        if let Some(expected) = request.expected_current {
            if (expected - current).abs() > EXPECTED_CURRENT_TOLERANCE {
                return Err(ValidationError::new(
                    "expected_current",
                    format!(
                        "inventory changed: expected {}g but found {}g",
                        expected, current
                    ),
                )
                .into());
            }
        }

        let entry = factory::build_adjustment(
            user,
            entity_type,
            &AdjustmentInput {
                coffee_name: request.coffee_name.clone(),
                old_amount: current,
                new_amount: request.new_amount,
                reason: request.reason,
                notes: request.notes.clone(),
            },
        )?;
        let stored = self.append(entry).await?;
        info!(
            user = %user,
            coffee = %key,
            from = current,
            to = request.new_amount,
            "Recorded adjustment"
        );
        Ok(stored)
    }

    /// Log a brew, optionally drawing its dose from roasted inventory.
    pub async fn record_brew(
        &self,
        user: &UserId,
        input: &NewBrew,
    ) -> Result<BrewRecorded, LedgerError> {
        let (brew, consumption) = factory::build_brew(user, input)?;
        match consumption {
            None => Ok(BrewRecorded {
                brew_entry: self.append(brew).await?,
                consumption_entry: None,
            }),
            Some(consumption) if self.store.atomic_batches() => {
                let (brew_entry, consumption_entry) =
                    pair(self.append_all(vec![brew, consumption]).await?)?;
                Ok(BrewRecorded {
                    brew_entry,
                    consumption_entry: Some(consumption_entry),
                })
            }
            Some(consumption) => self.append_brew_sequential(brew, consumption).await,
        }
    }

    /// Write a brew and then its consumption.
    ///
    /// If the consumption fails the brew stays logged; the missing draw is
    /// reported as a warning and the error returned.
    async fn append_brew_sequential(
        &self,
        brew: LedgerEntry,
        consumption: LedgerEntry,
    ) -> Result<BrewRecorded, LedgerError> {
        let dose = -consumption.amount_change;
        let brew_entry = self.append(brew).await?;
        match self.append(consumption).await {
            Ok(consumption_entry) => Ok(BrewRecorded {
                brew_entry,
                consumption_entry: Some(consumption_entry),
            }),
            Err(err) => {
                let warning = ConsistencyWarning::UnconsumedBrew {
                    brew: brew_entry.id.clone(),
                    dose,
                    reason: err.to_string(),
                };
                warn!("{}", warning);
                Err(err)
            }
        }
    }

    /// Register a new piece of equipment.
    ///
    /// # Errors
    ///
    /// `Validation` if equipment with the same name already exists.
    pub async fn add_equipment(
        &self,
        user: &UserId,
        record: &EquipmentRecord,
    ) -> Result<Equipment, LedgerError> {
        let entry = factory::build_equipment(user, record, EquipmentChange::Added)?;
        if !self.entity_history(user, &entry.entity_id).await?.is_empty() {
            return Err(ValidationError::new(
                "name",
                format!("equipment '{}' already exists", record.name.trim()),
            )
            .into());
        }
        let stored = self.append(entry).await?;
        first_equipment(&[stored])
    }

    /// Change fields of existing equipment.
    pub async fn update_equipment(
        &self,
        user: &UserId,
        name: &str,
        patch: &EquipmentPatch,
    ) -> Result<Equipment, LedgerError> {
        let key = CoffeeKey::new(name).map_err(|e| ValidationError::new("name", e.to_string()))?;
        let id = EntityId::for_equipment(user, &key);
        let mut history = self.entity_history(user, &id).await?;
        let current = fold_equipment(&history)
            .pop()
            .ok_or_else(|| LedgerError::NotFound(format!("equipment '{}'", name.trim())))?;
        if patch.is_empty() {
            return Ok(current);
        }

        let record = patch.apply(&current.record);
        let entry = factory::build_equipment(user, &record, EquipmentChange::Updated)?;
        history.push(self.append(entry).await?);
        first_equipment(&history)
    }

    /// All equipment, by name.
    pub async fn list_equipment(&self, user: &UserId) -> Result<Vec<Equipment>, LedgerError> {
        let filter = EntryFilter::default()
            .entity_type(EntityType::Equipment)
            .order(SortOrder::Ascending);
        let entries = self.query(user, &filter, None, 0).await?;
        Ok(fold_equipment(&entries))
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Current inventory.
    pub async fn get_inventory(&self, user: &UserId) -> Result<InventorySnapshot, LedgerError> {
        self.snapshot_at(user, UtcTimestamp::now()).await
    }

    /// Inventory as it would be reported at `now`.
    ///
    /// `now` only affects `days_since_roast`.
    pub async fn snapshot_at(
        &self,
        user: &UserId,
        now: UtcTimestamp,
    ) -> Result<InventorySnapshot, LedgerError> {
        let entries = self.all_inventory_entries(user).await?;
        Ok(aggregate::snapshot(user, &entries, now))
    }

    /// A page of a user's entries, newest first.
    pub async fn get_entries(
        &self,
        user: &UserId,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<StoredEntry>, LedgerError> {
        self.query(user, &EntryFilter::default(), limit, offset)
            .await
    }

    /// Every entry of one entity, oldest first.
    pub async fn get_entity_history(
        &self,
        user: &UserId,
        entity_id: &EntityId,
    ) -> Result<Vec<StoredEntry>, LedgerError> {
        self.entity_history(user, entity_id).await
    }

    /// Recompute every inventory group and report inconsistencies.
    pub async fn audit(&self, user: &UserId) -> Result<AuditReport, LedgerError> {
        let entries = self.all_inventory_entries(user).await?;
        Ok(audit::audit(user, &entries))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn current_total(
        &self,
        user: &UserId,
        entity_type: EntityType,
        key: &CoffeeKey,
    ) -> Result<f64, LedgerError> {
        let filter = EntryFilter::default()
            .entity_type(entity_type)
            .order(SortOrder::Ascending);
        let entries = self.query(user, &filter, None, 0).await?;
        Ok(aggregate(
            entries
                .iter()
                .filter(|e| e.coffee_key().as_ref() == Some(key)),
        )
        .total)
    }

    async fn all_inventory_entries(&self, user: &UserId) -> Result<Vec<StoredEntry>, LedgerError> {
        let filter = EntryFilter::default().order(SortOrder::Ascending);
        Ok(self
            .query(user, &filter, None, 0)
            .await?
            .into_iter()
            .filter(|e| e.entity_type.is_inventory())
            .collect())
    }

    fn group_lock(&self, user: &UserId, entity_type: EntityType, key: &CoffeeKey) -> Arc<Mutex<()>> {
        let mut locks = self
            .group_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            locks
                .entry((user.clone(), entity_type, key.clone()))
                .or_default(),
        )
    }

    async fn append(&self, entry: LedgerEntry) -> Result<StoredEntry, LedgerError> {
        Ok(self
            .options
            .retry
            .run("append", || self.store.append(entry.clone()))
            .await?)
    }

    async fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<Vec<StoredEntry>, LedgerError> {
        Ok(self
            .options
            .retry
            .run("append_all", || self.store.append_all(entries.clone()))
            .await?)
    }

    async fn query(
        &self,
        user: &UserId,
        filter: &EntryFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<StoredEntry>, LedgerError> {
        Ok(self
            .options
            .retry
            .run("query_by_user", || {
                self.store.query_by_user(user, filter, limit, offset)
            })
            .await?)
    }

    async fn entity_history(
        &self,
        user: &UserId,
        entity_id: &EntityId,
    ) -> Result<Vec<StoredEntry>, LedgerError> {
        Ok(self
            .options
            .retry
            .run("query_by_entity", || {
                self.store.query_by_entity(user, entity_id)
            })
            .await?)
    }
}

/// Today's date in UTC.
pub fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

fn pair(stored: Vec<StoredEntry>) -> Result<(StoredEntry, StoredEntry), LedgerError> {
    let mut iter = stored.into_iter();
    match (iter.next(), iter.next()) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(LedgerError::Persistence(crate::store::StoreError::Io(
            "batch append returned fewer entries than written".to_string(),
        ))),
    }
}

fn first_equipment(entries: &[StoredEntry]) -> Result<Equipment, LedgerError> {
    fold_equipment(entries)
        .pop()
        .ok_or_else(|| LedgerError::NotFound("equipment".to_string()))
}
