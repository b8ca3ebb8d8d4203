//! Identifiers for queued actions and captured failures.
//!
//! Both kinds are ULIDs. The kind is a zero-sized type parameter, so
//! `ActionId` and `FailureId` share one implementation and still cannot be
//! passed for one another.
//!
//! # Formats
//! - `Display` / `Debug`: kind prefix plus the ULID, `action-01HQ...`. This is
//!   what shows up in logs and in `ReducerError` messages.
//! - serde: the bare ULID string. Consumers of a serialized `FailureSummary`
//!   already know which kind a field holds.
//!
//! A ULID starts with its millisecond timestamp, so ids taken from the same
//! generator sort in creation order (within one millisecond the random tail
//! decides).

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

pub trait IdKind: Send + Sync + 'static {
    const PREFIX: &'static str;
}

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<K: IdKind> {
    ulid: Ulid,
    kind: PhantomData<K>,
}

impl<K: IdKind> Id<K> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            kind: PhantomData,
        }
    }

    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Creation time encoded in the ULID, millisecond precision.
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.ulid.timestamp_ms() as i64).unwrap_or_default()
    }
}

impl<K: IdKind> From<Ulid> for Id<K> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<K: IdKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", K::PREFIX, self.ulid)
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<K: IdKind> Serialize for Id<K> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        self.ulid.serialize(serializer)
    }
}

impl<'de, K: IdKind> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ulid::deserialize(deserializer).map(Self::from_ulid)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {}

impl IdKind for ActionKind {
    const PREFIX: &'static str = "action-";
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {}

impl IdKind for FailureKind {
    const PREFIX: &'static str = "failure-";
}

/// One dispatcher call.
pub type ActionId = Id<ActionKind>;

/// One `ErrorRecord`.
pub type FailureId = Id<FailureKind>;
