//! store::filter
//!
//! Query filters shared by every store backend.

use serde_json::Value;

use crate::core::entry::{ActionType, LedgerEntry, StoredEntry};
use crate::core::types::{EntityType, UserId};

/// Result ordering for user queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first (replay order).
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

/// Equality test on one metadata field.
///
/// `key` may be a dotted path into nested objects, e.g.
/// `outcome.batch_number`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataPredicate {
    pub key: String,
    pub value: Value,
}

impl MetadataPredicate {
    /// Whether the metadata object satisfies this predicate.
    pub fn matches(&self, metadata: &Value) -> bool {
        let mut current = metadata;
        for part in self.key.split('.') {
            match current.get(part) {
                Some(next) => current = next,
                None => return false,
            }
        }
        *current == self.value
    }
}

/// Filter for [`super::EntryStore::query_by_user`].
///
/// # Example
///
/// ```
/// use beanledger::core::entry::ActionType;
/// use beanledger::store::{EntryFilter, SortOrder};
///
/// let filter = EntryFilter::default()
///     .action(ActionType::RoastEdited)
///     .metadata_eq("completed", true)
///     .order(SortOrder::Ascending);
/// assert_eq!(filter.metadata.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub action_type: Option<ActionType>,
    pub entity_type: Option<EntityType>,
    pub metadata: Vec<MetadataPredicate>,
    pub order: SortOrder,
}

impl EntryFilter {
    /// Restrict to one action type.
    pub fn action(mut self, action_type: ActionType) -> Self {
        self.action_type = Some(action_type);
        self
    }

    /// Restrict to one entity type.
    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Require a metadata field to equal a value.
    pub fn metadata_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.push(MetadataPredicate {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Set the result order.
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether an entry passes every condition of this filter.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if self.action_type.is_some_and(|a| a != entry.action_type()) {
            return false;
        }
        if self.entity_type.is_some_and(|t| t != entry.entity_type) {
            return false;
        }
        if self.metadata.is_empty() {
            return true;
        }
        let metadata = entry.payload.metadata_value();
        self.metadata.iter().all(|p| p.matches(&metadata))
    }
}

/// Apply a user query to a set of stored entries.
///
/// Backends load candidates however they like and delegate ordering and
/// paging here so every store answers identically.
pub fn select<'a>(
    entries: impl IntoIterator<Item = &'a StoredEntry>,
    user: &UserId,
    filter: &EntryFilter,
    limit: Option<usize>,
    offset: usize,
) -> Vec<StoredEntry> {
    let mut matched: Vec<&StoredEntry> = entries
        .into_iter()
        .filter(|e| &e.user_id == user && filter.matches(e))
        .collect();

    matched.sort_by_key(|e| e.order_key());
    if filter.order == SortOrder::Descending {
        matched.reverse();
    }

    matched
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}
