//! Live view of active sessions
//!
//! Each successful refresh replaces the whole session set and the pricing
//! catalog. Nothing is merged field by field, so an exited vehicle cannot
//! come back from an older copy.

use chrono::{DateTime, Utc};
use parkdesk_api::{MonitorData, PricingRule, VehicleSession};
use parkdesk_util::SessionId;
use tracing::{debug, info, warn};

use crate::{
    PricingCatalog, RefreshOutcome, RefreshTicket, SnapshotCache, effective_base_hours,
};

/// Sessions and the catalog they are priced with
#[derive(Debug, Clone, Default)]
pub struct MonitorSnapshot {
    pub sessions: Vec<VehicleSession>,
    pub catalog: PricingCatalog,
}

/// Derived per-session status for display
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: VehicleSession,
    pub elapsed_hours: f64,
    /// None when the catalog has no rule for the vehicle class
    pub effective_base_hours: Option<u32>,
    pub is_overstay: bool,
}

pub struct SessionMonitor {
    cache: SnapshotCache<MonitorSnapshot>,
}

impl SessionMonitor {
    pub fn new() -> Self {
        Self {
            cache: SnapshotCache::new(MonitorSnapshot::default()),
        }
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.cache.begin_refresh()
    }

    /// Apply a monitor response.
    ///
    /// Non-active sessions in the response are dropped. A response whose
    /// pricing rules do not form a valid catalog is treated as a failed
    /// refresh.
    pub fn apply(
        &mut self,
        ticket: RefreshTicket,
        data: MonitorData,
        at: DateTime<Utc>,
    ) -> RefreshOutcome {
        let catalog = match PricingCatalog::from_rules(data.pricing_rules) {
            Ok(catalog) => catalog,
            Err(e) => return self.fail(ticket, e.to_string()),
        };

        let received = data.active_vehicles.len();
        let sessions: Vec<_> = data
            .active_vehicles
            .into_iter()
            .filter(VehicleSession::is_active)
            .collect();
        if sessions.len() != received {
            debug!(
                dropped = received - sessions.len(),
                "Dropped non-active sessions from snapshot"
            );
        }

        let count = sessions.len();
        if self
            .cache
            .apply(ticket, MonitorSnapshot { sessions, catalog }, at)
        {
            info!(count, ticket = ticket.sequence(), "Session snapshot applied");
            RefreshOutcome::Applied { count }
        } else {
            RefreshOutcome::Stale
        }
    }

    /// Record a failed refresh; the previous snapshot stays visible
    pub fn fail(&mut self, ticket: RefreshTicket, error: impl Into<String>) -> RefreshOutcome {
        let error = error.into();
        if self.cache.fail(ticket, error.clone()) {
            warn!(error = %error, "Session refresh failed, keeping previous snapshot");
            RefreshOutcome::Failed { error }
        } else {
            RefreshOutcome::Stale
        }
    }

    pub fn sessions(&self) -> &[VehicleSession] {
        &self.cache.value().sessions
    }

    pub fn catalog(&self) -> &PricingCatalog {
        &self.cache.value().catalog
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&VehicleSession> {
        self.sessions().iter().find(|s| &s.session_id == session_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.cache.last_error()
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.cache.refreshed_at()
    }

    pub fn has_snapshot(&self) -> bool {
        self.cache.has_snapshot()
    }

    /// Filtered sessions, longest-parked first
    pub fn visible(&self, filter: &str, now: DateTime<Utc>) -> Vec<SessionView> {
        let catalog = self.catalog();
        let mut views: Vec<_> = self
            .sessions()
            .iter()
            .filter(|s| matches_filter(s, filter))
            .map(|s| session_view(s, catalog.get(&s.vehicle_type), now))
            .collect();

        views.sort_by_key(|v| v.session.entry_time);
        views
    }
}

impl Default for SessionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Substring match on the raw phone number or the uppercase plate.
/// An empty filter matches everything.
pub fn matches_filter(session: &VehicleSession, filter: &str) -> bool {
    let term = filter.trim();
    if term.is_empty() {
        return true;
    }

    if session.driver_phone.contains(term) {
        return true;
    }

    session
        .vehicle_number
        .as_deref()
        .is_some_and(|plate| plate.to_uppercase().contains(&term.to_uppercase()))
}

/// Hours parked so far: server minutes when reported, else wall-clock.
pub fn elapsed_hours(session: &VehicleSession, now: DateTime<Utc>) -> f64 {
    if let Some(minutes) = session.duration_minutes {
        return minutes.max(0.0) / 60.0;
    }

    let elapsed_ms = now
        .signed_duration_since(session.entry_time)
        .num_milliseconds()
        .max(0);
    elapsed_ms as f64 / 3_600_000.0
}

/// Server overstay flag when present, else elapsed beyond the effective
/// base hours. Without a rule the vehicle is not flagged.
pub fn is_overstay(session: &VehicleSession, rule: Option<&PricingRule>, now: DateTime<Utc>) -> bool {
    if let Some(flag) = session.is_overstay {
        return flag;
    }

    rule.is_some_and(|rule| {
        elapsed_hours(session, now) > f64::from(effective_base_hours(session, rule))
    })
}

pub fn session_view(
    session: &VehicleSession,
    rule: Option<&PricingRule>,
    now: DateTime<Utc>,
) -> SessionView {
    SessionView {
        session: session.clone(),
        elapsed_hours: elapsed_hours(session, now),
        effective_base_hours: rule.map(|r| effective_base_hours(session, r)),
        is_overstay: is_overstay(session, rule, now),
    }
}
