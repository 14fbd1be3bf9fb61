//! store::memory
//!
//! In-process entry store for tests and embedding.
//!
//! # Design
//!
//! State lives behind an `Arc<Mutex<...>>`, so clones share one ledger.
//! Multi-entry appends are atomic by default; `with_atomic_batches(false)`
//! makes the store behave like a backend without transactions, which lets
//! tests exercise the compensation path. Failures can be injected with
//! [`FailOn`] and every call is recorded as a [`StoreOperation`].
//!
//! # Example
//!
//! ```
//! use beanledger::store::memory::{FailOn, MemoryStore};
//! use beanledger::store::{EntryStore, StoreError};
//!
//! let store = MemoryStore::new().fail_on(FailOn::NextAppends {
//!     count: 1,
//!     error: StoreError::Unavailable("simulated outage".into()),
//! });
//! assert!(store.atomic_batches());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::filter::{select, EntryFilter};
use super::{check_batch_unique, highest_batch, EntryStore, StoreError};
use crate::core::entry::{ActionType, LedgerEntry, StoredEntry};
use crate::core::types::{EntityId, EntityType, UserId, UtcTimestamp};

/// In-memory entry store.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Entries in append order.
    entries: Vec<StoredEntry>,
    /// Last assigned sequence number.
    last_sequence: u64,
    /// Last assigned `created_at`, so timestamps never go backwards.
    last_created_at: Option<UtcTimestamp>,
    /// Last allocated batch number per user.
    batches: HashMap<UserId, u64>,
    /// Whether `append_all` is all-or-nothing.
    atomic: bool,
    /// Failure configuration (for testing error paths).
    fail_on: Vec<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<StoreOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail the next `count` write calls, then succeed.
    NextAppends { count: usize, error: StoreError },
    /// Fail every write that contains an entry of this entity type.
    AppendOf {
        entity_type: EntityType,
        error: StoreError,
    },
    /// Fail every query.
    Query(StoreError),
    /// Fail batch-number allocation.
    NextBatch(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    Append {
        action_type: ActionType,
        entity_type: EntityType,
    },
    AppendAll {
        count: usize,
    },
    QueryByUser {
        user: UserId,
    },
    QueryByEntity {
        entity_id: EntityId,
    },
    NextBatchNumber {
        user: UserId,
    },
}

impl MemoryStore {
    /// Create an empty store with atomic batches.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                atomic: true,
                ..Default::default()
            })),
        }
    }

    /// Choose whether `append_all` is atomic.
    pub fn with_atomic_batches(self, atomic: bool) -> Self {
        self.state().atomic = atomic;
        self
    }

    /// Add a failure rule.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on.push(fail_on);
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.state().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// Every stored entry in append order (for test verification).
    pub fn all_entries(&self) -> Vec<StoredEntry> {
        self.state().entries.clone()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    fn state(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    /// Check failure rules for a write of the given entries.
    ///
    /// Consumes one `NextAppends` budget if it fires.
    fn check_write(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        for rule in self.fail_on.iter_mut() {
            match rule {
                FailOn::NextAppends { count, error } if *count > 0 => {
                    *count -= 1;
                    return Err(error.clone());
                }
                FailOn::AppendOf { entity_type, error }
                    if entries.iter().any(|e| e.entity_type == *entity_type) =>
                {
                    return Err(error.clone());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_query(&self) -> Result<(), StoreError> {
        for rule in &self.fail_on {
            if let FailOn::Query(error) = rule {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    fn check_next_batch(&self) -> Result<(), StoreError> {
        for rule in &self.fail_on {
            if let FailOn::NextBatch(error) = rule {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    /// Validate and insert entries as one unit.
    fn insert(&mut self, entries: Vec<LedgerEntry>) -> Result<Vec<StoredEntry>, StoreError> {
        for entry in &entries {
            entry.check_constraints().map_err(StoreError::Constraint)?;
        }
        check_batch_unique(&self.entries, &entries)?;
        self.check_write(&entries)?;

        let now = UtcTimestamp::now();
        let created_at = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created_at = Some(created_at);

        let mut stored = Vec::with_capacity(entries.len());
        for entry in entries {
            self.last_sequence += 1;
            debug!(
                sequence = self.last_sequence,
                action = %entry.action_type(),
                entity = %entry.entity_id,
                "Appending entry"
            );
            stored.push(StoredEntry {
                sequence: self.last_sequence,
                created_at,
                entry,
            });
        }
        self.entries.extend(stored.iter().cloned());
        Ok(stored)
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn atomic_batches(&self) -> bool {
        self.state().atomic
    }

    async fn append(&self, entry: LedgerEntry) -> Result<StoredEntry, StoreError> {
        let mut inner = self.state();
        inner.operations.push(StoreOperation::Append {
            action_type: entry.action_type(),
            entity_type: entry.entity_type,
        });
        let mut stored = inner.insert(vec![entry])?;
        stored
            .pop()
            .ok_or_else(|| StoreError::Io("append produced no entry".to_string()))
    }

    async fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<Vec<StoredEntry>, StoreError> {
        if !self.atomic_batches() {
            let mut stored = Vec::with_capacity(entries.len());
            for entry in entries {
                stored.push(self.append(entry).await?);
            }
            return Ok(stored);
        }

        let mut inner = self.state();
        inner.operations.push(StoreOperation::AppendAll {
            count: entries.len(),
        });
        inner.insert(entries)
    }

    async fn query_by_user(
        &self,
        user: &UserId,
        filter: &EntryFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let mut inner = self.state();
        inner
            .operations
            .push(StoreOperation::QueryByUser { user: user.clone() });
        inner.check_query()?;
        Ok(select(inner.entries.iter(), user, filter, limit, offset))
    }

    async fn query_by_entity(
        &self,
        user: &UserId,
        entity_id: &EntityId,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let mut inner = self.state();
        inner.operations.push(StoreOperation::QueryByEntity {
            entity_id: entity_id.clone(),
        });
        inner.check_query()?;
        let mut entries: Vec<StoredEntry> = inner
            .entries
            .iter()
            .filter(|e| &e.user_id == user && &e.entity_id == entity_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.order_key());
        Ok(entries)
    }

    async fn next_batch_number(&self, user: &UserId) -> Result<u64, StoreError> {
        let mut inner = self.state();
        inner
            .operations
            .push(StoreOperation::NextBatchNumber { user: user.clone() });
        inner.check_next_batch()?;
        let floor = highest_batch(&inner.entries, user);
        let counter = inner.batches.entry(user.clone()).or_insert(0);
        *counter = (*counter).max(floor) + 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::schema::{
        Consumption, ConsumptionPurpose, EntryPayload, EquipmentRecord, RoastCompletion,
    };
    use chrono::NaiveDate;
    use crate::store::SortOrder;

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn consumption(user: UserId, entity: &str, amount: f64) -> LedgerEntry {
        LedgerEntry::new(
            user,
            EntityType::RoastedCoffee,
            EntityId::new(entity).unwrap(),
            -amount,
            EntryPayload::Consumption(Consumption {
                coffee_name: "Kenya AA".into(),
                amount,
                purpose: ConsumptionPurpose::Manual,
                notes: None,
            }),
        )
    }

    fn roast(user: UserId, batch_number: u64) -> LedgerEntry {
        LedgerEntry::new(
            user,
            EntityType::RoastedCoffee,
            EntityId::new(format!("roast-{}", batch_number)).unwrap(),
            90.0,
            EntryPayload::RoastCompleted(RoastCompletion {
                coffee_name: "Kenya AA".into(),
                green_weight: 110.0,
                roasted_weight: 90.0,
                weight_loss_percentage: 18.18,
                roast_level: None,
                roast_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                batch_number,
                profile: Default::default(),
                notes: None,
            }),
        )
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequences() {
        let store = MemoryStore::new();
        let a = store.append(consumption(alice(), "roasted-1", 1.0)).await.unwrap();
        let b = store.append(consumption(alice(), "roasted-1", 2.0)).await.unwrap();

        assert!(b.sequence > a.sequence);
        assert!(b.order_key() > a.order_key());
    }

    #[tokio::test]
    async fn constraint_violation_rejected() {
        let store = MemoryStore::new();
        let bad = LedgerEntry::new(
            alice(),
            EntityType::GreenCoffee,
            EntityId::new("green-1").unwrap(),
            0.0,
            EntryPayload::EquipmentAdded(EquipmentRecord {
                name: "Grinder".into(),
                kind: "grinder".into(),
                brand: None,
                model: None,
                notes: None,
            }),
        );

        let result = store.append(bad).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn atomic_batch_all_or_nothing() {
        let store = MemoryStore::new().fail_on(FailOn::AppendOf {
            entity_type: EntityType::RoastedCoffee,
            error: StoreError::Unavailable("down".into()),
        });

        let result = store
            .append_all(vec![
                consumption(alice(), "roasted-1", 1.0),
                consumption(alice(), "roasted-2", 1.0),
            ])
            .await;

        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn non_atomic_batch_keeps_prefix() {
        let store = MemoryStore::new().with_atomic_batches(false);
        let store = store.fail_on(FailOn::AppendOf {
            entity_type: EntityType::GreenCoffee,
            error: StoreError::Unavailable("down".into()),
        });

        let green = LedgerEntry::new(
            alice(),
            EntityType::GreenCoffee,
            EntityId::new("green-1").unwrap(),
            -1.0,
            EntryPayload::Consumption(Consumption {
                coffee_name: "Kenya AA".into(),
                amount: 1.0,
                purpose: ConsumptionPurpose::Manual,
                notes: None,
            }),
        );
        let result = store
            .append_all(vec![consumption(alice(), "roasted-1", 1.0), green])
            .await;

        assert!(result.is_err());
        assert_eq!(store.len(), 1);
        assert!(!store.atomic_batches());
    }

    #[tokio::test]
    async fn next_appends_budget_is_consumed() {
        let store = MemoryStore::new().fail_on(FailOn::NextAppends {
            count: 1,
            error: StoreError::Unavailable("blip".into()),
        });

        assert!(store.append(consumption(alice(), "roasted-1", 1.0)).await.is_err());
        assert!(store.append(consumption(alice(), "roasted-1", 1.0)).await.is_ok());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn queries_are_scoped_per_user() {
        let store = MemoryStore::new();
        let bob = UserId::new("bob").unwrap();
        store.append(consumption(alice(), "roasted-1", 1.0)).await.unwrap();
        store.append(consumption(bob.clone(), "roasted-1", 1.0)).await.unwrap();

        let alice_entries = store
            .query_by_user(&alice(), &EntryFilter::default(), None, 0)
            .await
            .unwrap();
        assert_eq!(alice_entries.len(), 1);
        assert_eq!(alice_entries[0].user_id, alice());

        let history = store
            .query_by_entity(&bob, &EntityId::new("roasted-1").unwrap())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_id, bob);
    }

    #[tokio::test]
    async fn query_order_limit_offset() {
        let store = MemoryStore::new();
        for amount in [1.0, 2.0, 3.0, 4.0] {
            store.append(consumption(alice(), "roasted-1", amount)).await.unwrap();
        }

        let newest = store
            .query_by_user(&alice(), &EntryFilter::default(), Some(2), 0)
            .await
            .unwrap();
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].amount_change, -4.0);
        assert_eq!(newest[1].amount_change, -3.0);

        let oldest = store
            .query_by_user(
                &alice(),
                &EntryFilter::default().order(SortOrder::Ascending),
                Some(1),
                1,
            )
            .await
            .unwrap();
        assert_eq!(oldest.len(), 1);
        assert_eq!(oldest[0].amount_change, -2.0);
    }

    #[tokio::test]
    async fn batch_numbers_per_user() {
        let store = MemoryStore::new();
        let bob = UserId::new("bob").unwrap();

        assert_eq!(store.next_batch_number(&alice()).await.unwrap(), 1);
        assert_eq!(store.next_batch_number(&alice()).await.unwrap(), 2);
        assert_eq!(store.next_batch_number(&bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn allocation_skips_stored_batches() {
        let store = MemoryStore::new();
        store.append(roast(alice(), 1)).await.unwrap();
        store.append(roast(alice(), 4)).await.unwrap();

        assert_eq!(store.next_batch_number(&alice()).await.unwrap(), 5);
        assert_eq!(
            store.next_batch_number(&UserId::new("bob").unwrap()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn reused_batch_number_is_rejected() {
        let store = MemoryStore::new();
        store.append(roast(alice(), 2)).await.unwrap();

        let result = store.append(roast(alice(), 2)).await;
        assert_eq!(result, Err(StoreError::DuplicateBatch(2)));

        let in_one_write = store.append_all(vec![roast(alice(), 3), roast(alice(), 3)]).await;
        assert_eq!(in_one_write, Err(StoreError::DuplicateBatch(3)));
        assert_eq!(store.len(), 1);

        // Batch numbers are per user.
        store.append(roast(UserId::new("bob").unwrap(), 2)).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn operations_recorded() {
        let store = MemoryStore::new();
        store.append(consumption(alice(), "roasted-1", 1.0)).await.unwrap();
        store.next_batch_number(&alice()).await.unwrap();

        let ops = store.operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], StoreOperation::Append { .. }));
        assert!(matches!(ops[1], StoreOperation::NextBatchNumber { .. }));

        store.clear_operations();
        assert!(store.operations().is_empty());
    }
}
