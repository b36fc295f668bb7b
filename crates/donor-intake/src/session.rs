//! Donor session state.
//!
//! The session holds at most one donor record for the lifetime of a kiosk
//! visit. It is owned by the kiosk and lent mutably to whichever screen is
//! active, so there is exactly one writer at a time.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::donor::{DonorId, DonorRecord};

/// Prefix of identifiers issued for donors that do not exist yet.
pub const TEMPORARY_ID_PREFIX: &str = "tmp-";

/// The current donor of a kiosk visit.
#[derive(Debug, Default)]
pub struct DonorSession {
    current: Option<DonorRecord>,
    last_temporary_millis: i64,
}

impl DonorSession {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active donor record, if any.
    #[must_use]
    pub fn current(&self) -> Option<&DonorRecord> {
        self.current.as_ref()
    }

    /// Replace the active record wholesale.
    pub fn replace(&mut self, record: DonorRecord) {
        debug!(donor_id = %record.id(), "Session donor replaced");
        self.current = Some(record);
    }

    /// Forget the active record.
    pub fn reset(&mut self) {
        if let Some(record) = self.current.take() {
            debug!(donor_id = %record.id(), "Session donor cleared");
        }
    }

    /// Whether a record is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Issue a time-based identifier for a donor that is about to be created.
    ///
    /// Identifiers are strictly increasing within one session, even when two
    /// are requested within the same millisecond or the clock steps back.
    pub fn issue_temporary_id(&mut self, now: DateTime<Utc>) -> DonorId {
        let millis = now.timestamp_millis().max(self.last_temporary_millis + 1);
        self.last_temporary_millis = millis;
        DonorId::temporary(TEMPORARY_ID_PREFIX, millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::donor::{BloodType, DonorIdentity};
    use chrono::TimeZone;

    fn record(id: &str, name: &str) -> DonorRecord {
        DonorRecord::new(
            DonorId::parse(id).unwrap(),
            DonorIdentity {
                full_name: name.to_string(),
                address: "Hue".to_string(),
                phone: "0905123456".to_string(),
                email: "x@example.com".to_string(),
                blood_type: BloodType::BPositive,
            },
        )
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = DonorSession::new();
        assert!(session.is_empty());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut session = DonorSession::new();
        let mut first = record("1", "First");
        first.donation_count = 7;
        session.replace(first);

        session.replace(record("2", "Second"));
        let current = session.current().unwrap();
        assert_eq!(current.id().as_str(), "2");
        assert_eq!(current.identity.full_name, "Second");
        assert_eq!(current.donation_count, 0);
    }

    #[test]
    fn test_reset_clears() {
        let mut session = DonorSession::new();
        session.replace(record("1", "First"));
        session.reset();
        assert!(session.is_empty());
        // Resetting an empty session is a no-op.
        session.reset();
        assert!(session.is_empty());
    }

    #[test]
    fn test_temporary_ids_are_time_based() {
        let mut session = DonorSession::new();
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = session.issue_temporary_id(now);
        assert_eq!(id.as_str(), "tmp-1700000000123");
    }

    #[test]
    fn test_temporary_ids_are_unique_within_session() {
        let mut session = DonorSession::new();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let earlier = Utc.timestamp_millis_opt(1_600_000_000_000).unwrap();

        let a = session.issue_temporary_id(now);
        let b = session.issue_temporary_id(now);
        let c = session.issue_temporary_id(earlier);

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(c.as_str(), "tmp-1700000000002");
    }
}
