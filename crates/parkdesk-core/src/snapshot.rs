//! Sequence-stamped snapshot cache
//!
//! Every refresh takes a ticket before its request goes out. A response is
//! applied only if its ticket is newer than the snapshot currently held, so
//! a slow response can never overwrite fresher data.

use chrono::{DateTime, Utc};
use tracing::debug;

/// Ticket identifying one refresh request, in issue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// What happened to a refresh response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the snapshot
    Applied { count: usize },
    /// A newer snapshot was already applied; the response was discarded
    Stale,
    /// The request failed; the previous snapshot is kept
    Failed { error: String },
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotCache<T> {
    issued: u64,
    applied: Option<RefreshTicket>,
    value: T,
    refreshed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl<T> SnapshotCache<T> {
    pub fn new(initial: T) -> Self {
        Self {
            issued: 0,
            applied: None,
            value: initial,
            refreshed_at: None,
            last_error: None,
        }
    }

    /// Issue a ticket for a refresh about to start
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    fn is_stale(&self, ticket: RefreshTicket) -> bool {
        self.applied.is_some_and(|applied| ticket <= applied)
    }

    /// Replace the snapshot wholesale unless the ticket is stale.
    ///
    /// Returns false when the response was discarded.
    pub fn apply(&mut self, ticket: RefreshTicket, value: T, at: DateTime<Utc>) -> bool {
        if self.is_stale(ticket) {
            debug!(
                ticket = ticket.0,
                applied = ?self.applied.map(|t| t.0),
                "Discarding stale snapshot"
            );
            return false;
        }

        self.value = value;
        self.applied = Some(ticket);
        self.refreshed_at = Some(at);
        self.last_error = None;
        true
    }

    /// Record a failed refresh. The snapshot is left untouched.
    ///
    /// Returns false when the failure belongs to a stale request.
    pub fn fail(&mut self, ticket: RefreshTicket, error: impl Into<String>) -> bool {
        if self.is_stale(ticket) {
            return false;
        }
        self.last_error = Some(error.into());
        true
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn applied_ticket(&self) -> Option<RefreshTicket> {
        self.applied
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_snapshot(&self) -> bool {
        self.applied.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    #[test]
    fn newer_response_replaces() {
        let mut cache = SnapshotCache::new(vec![1, 2, 3, 4, 5]);
        let t = cache.begin_refresh();

        assert!(cache.apply(t, vec![7, 8, 9], at(10, 0)));
        assert_eq!(cache.value(), &vec![7, 8, 9]);
        assert_eq!(cache.refreshed_at(), Some(at(10, 0)));
    }

    #[test]
    fn out_of_order_response_is_discarded() {
        let mut cache = SnapshotCache::new(Vec::<u32>::new());
        let slow = cache.begin_refresh();
        let fast = cache.begin_refresh();

        assert!(cache.apply(fast, vec![2], at(10, 1)));
        assert!(!cache.apply(slow, vec![1], at(10, 2)));
        assert_eq!(cache.value(), &vec![2]);
        assert_eq!(cache.applied_ticket(), Some(fast));
    }

    #[test]
    fn failure_keeps_snapshot_and_records_error() {
        let mut cache = SnapshotCache::new(Vec::<u32>::new());
        let t1 = cache.begin_refresh();
        cache.apply(t1, vec![1, 2], at(10, 0));

        let t2 = cache.begin_refresh();
        assert!(cache.fail(t2, "connection refused"));
        assert_eq!(cache.value(), &vec![1, 2]);
        assert_eq!(cache.last_error(), Some("connection refused"));

        // A later success clears the error
        let t3 = cache.begin_refresh();
        cache.apply(t3, vec![3], at(10, 1));
        assert_eq!(cache.last_error(), None);
    }

    #[test]
    fn stale_failure_is_ignored() {
        let mut cache = SnapshotCache::new(0u32);
        let old = cache.begin_refresh();
        let new = cache.begin_refresh();
        cache.apply(new, 5, at(10, 0));

        assert!(!cache.fail(old, "timeout"));
        assert_eq!(cache.last_error(), None);
    }

    #[test]
    fn older_success_after_newer_failure_still_applies() {
        let mut cache = SnapshotCache::new(0u32);
        let first = cache.begin_refresh();
        let second = cache.begin_refresh();

        cache.fail(second, "timeout");
        assert!(cache.apply(first, 9, at(10, 0)));
        assert_eq!(*cache.value(), 9);
    }
}
