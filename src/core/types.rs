//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`UserId`] - Validated owner identifier
//! - [`EntryId`] - Unique ledger entry identifier
//! - [`EntityId`] - Logical object identifier shared by related entries
//! - [`CoffeeKey`] - Normalized coffee name used for grouping
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use beanledger::core::types::{CoffeeKey, EntityId, EntityType, UserId};
//!
//! let user = UserId::new("alice").unwrap();
//! let key = CoffeeKey::new("  Ethiopia   Sidamo ").unwrap();
//! assert_eq!(key.as_str(), "ethiopia sidamo");
//!
//! // Repeated purchases of the same coffee share one entity
//! let a = EntityId::for_coffee(&user, EntityType::GreenCoffee, &key);
//! let b = EntityId::for_coffee(&user, EntityType::GreenCoffee, &CoffeeKey::new("ETHIOPIA SIDAMO").unwrap());
//! assert_eq!(a, b);
//!
//! assert!(UserId::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("invalid coffee name: {0}")]
    InvalidCoffeeName(String),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// A validated user identifier.
///
/// Every query and aggregation is scoped to one user. The id is opaque to
/// the ledger; it only has to be non-empty, free of whitespace and control
/// characters, and at most 128 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a new validated user id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidUserId` if the id is empty, too long, or
    /// contains whitespace or control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidUserId("user id cannot be empty".into()));
        }
        if id.len() > 128 {
            return Err(TypeError::InvalidUserId(
                "user id cannot exceed 128 bytes".into(),
            ));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidUserId(format!(
                "user id '{}' cannot contain whitespace or control characters",
                id.escape_debug()
            )));
        }
        Ok(Self(id))
    }

    /// Get the user id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ledger entry.
///
/// Assigned once at creation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(String);

impl EntryId {
    /// Generate a new unique entry id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an EntryId from an existing string.
    ///
    /// Used when reading entries from disk.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of logical object a ledger entry affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    GreenCoffee,
    RoastedCoffee,
    RoastSchedule,
    Brew,
    Equipment,
}

impl EntityType {
    /// All entity types, in declaration order.
    pub const ALL: [EntityType; 5] = [
        EntityType::GreenCoffee,
        EntityType::RoastedCoffee,
        EntityType::RoastSchedule,
        EntityType::Brew,
        EntityType::Equipment,
    ];

    /// Wire name of the entity type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::GreenCoffee => "green_coffee",
            EntityType::RoastedCoffee => "roasted_coffee",
            EntityType::RoastSchedule => "roast_schedule",
            EntityType::Brew => "brew",
            EntityType::Equipment => "equipment",
        }
    }

    /// Whether entries of this type move coffee weight.
    pub fn is_inventory(&self) -> bool {
        matches!(self, EntityType::GreenCoffee | EntityType::RoastedCoffee)
    }
}

impl std::str::FromStr for EntityType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownVariant {
                kind: "entity type",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized coffee name.
///
/// Aggregation groups entries by logical coffee rather than by individual
/// entity id, so "Ethiopia Sidamo" and " ethiopia  SIDAMO" must land in the
/// same group. Normalization trims, collapses internal whitespace and
/// lowercases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CoffeeKey(String);

impl CoffeeKey {
    /// Normalize a coffee name into a grouping key.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCoffeeName` if the name is blank.
    pub fn new(name: impl AsRef<str>) -> Result<Self, TypeError> {
        let normalized = name
            .as_ref()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if normalized.is_empty() {
            return Err(TypeError::InvalidCoffeeName(
                "coffee name cannot be blank".into(),
            ));
        }
        Ok(Self(normalized))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CoffeeKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CoffeeKey> for String {
    fn from(key: CoffeeKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for CoffeeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the logical object a ledger entry affects.
///
/// Inventory entity ids are derived deterministically so that independent
/// writers agree on them without coordination. Schedule and brew records get
/// random ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an existing entity id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidEntityId` if the id is empty or contains
    /// whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidEntityId("entity id cannot be empty".into()));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidEntityId(format!(
                "entity id '{}' cannot contain whitespace",
                id.escape_debug()
            )));
        }
        Ok(Self(id))
    }

    /// Entity id of a coffee group (green lot or roasted stock).
    pub fn for_coffee(user: &UserId, entity_type: EntityType, key: &CoffeeKey) -> Self {
        let prefix = match entity_type {
            EntityType::GreenCoffee => "green",
            EntityType::RoastedCoffee => "roasted",
            other => other.as_str(),
        };
        Self(format!(
            "{}-{}",
            prefix,
            digest(&[user.as_str(), entity_type.as_str(), key.as_str()])
        ))
    }

    /// Entity id of a single roast batch.
    pub fn for_roast_batch(user: &UserId, key: &CoffeeKey, batch_number: u64) -> Self {
        Self(format!(
            "roast-{}",
            digest(&[user.as_str(), key.as_str(), &batch_number.to_string()])
        ))
    }

    /// Entity id of a piece of equipment, derived from its name.
    pub fn for_equipment(user: &UserId, name: &CoffeeKey) -> Self {
        Self(format!(
            "equipment-{}",
            digest(&[user.as_str(), EntityType::Equipment.as_str(), name.as_str()])
        ))
    }

    /// A fresh random id with the given prefix.
    pub fn random(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Uuid::new_v4()))
    }

    /// Get the entity id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First 16 bytes of SHA-256 over NUL-separated parts, hex encoded.
fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(&hasher.finalize()[..16])
}

impl TryFrom<String> for EntityId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp.
///
/// # Example
///
/// ```
/// use beanledger::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// println!("Current time: {}", now);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }

    /// The calendar date of this timestamp in UTC.
    pub fn date(&self) -> chrono::NaiveDate {
        self.0.date_naive()
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
