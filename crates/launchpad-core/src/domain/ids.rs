//! Strongly-typed identifiers.
//!
//! ULID-based, so ids sort by creation time. The phantom marker keeps a
//! `DeploymentId` from being passed where a `HistoryId` is expected.

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Marker trait for id kinds; supplies the Display prefix.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Mint an id whose timestamp half comes from the given instant.
    ///
    /// Taking the time as an argument keeps id generation deterministic
    /// under a fixed test clock.
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let ulid = Ulid::from_parts(now.timestamp_millis() as u64, rand::random());
        Self::from_ulid(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for deployment admissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Deployment {}

impl IdMarker for Deployment {
    fn prefix() -> &'static str {
        "dep-"
    }
}

/// Marker for history entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum History {}

impl IdMarker for History {
    fn prefix() -> &'static str {
        "hist-"
    }
}

/// Identifier of one admission: a single deploy attempt for an app name.
/// Commit paths compare it to detect a record replaced while the engine ran.
pub type DeploymentId = Id<Deployment>;

/// Identifier of a history entry (one record per deployment attempt).
pub type HistoryId = Id<History>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ids_are_distinct_types_with_prefixes() {
        let dep = DeploymentId::from_ulid(Ulid::new());
        let hist = HistoryId::from_ulid(Ulid::new());

        assert!(dep.to_string().starts_with("dep-"));
        assert!(hist.to_string().starts_with("hist-"));

        // The whole point: you can't accidentally mix these types.
        // let _: DeploymentId = hist; // <- does not compile
    }

    #[test]
    fn generated_ids_sort_by_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::seconds(5);

        let early = DeploymentId::generate_at(t0);
        let late = DeploymentId::generate_at(t1);

        assert!(early < late);
    }

    #[test]
    fn generate_at_pins_the_timestamp_half() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let a = HistoryId::generate_at(t0);
        let b = HistoryId::generate_at(t0);

        // Random halves differ, timestamp halves agree.
        assert_ne!(a, b);
        assert_eq!(a.as_ulid().timestamp_ms(), t0.timestamp_millis() as u64);
        assert_eq!(b.as_ulid().timestamp_ms(), t0.timestamp_millis() as u64);
    }

    #[test]
    fn ids_round_trip_through_serde() {
        let id = HistoryId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&id).unwrap();
        let back: HistoryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
