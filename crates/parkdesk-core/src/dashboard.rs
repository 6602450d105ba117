//! Dashboard aggregation
//!
//! Revenue and completion counts come from the service's stats and are
//! never recomputed here: sessions that already exited are not in the
//! active set, so a local sum would undercount. Occupancy uses the
//! service's active-vehicle count. The class histogram and the overstay
//! count are derived from the active-vehicle list.

use chrono::{DateTime, Utc};
use parkdesk_api::{ActiveVehicleBrief, DashboardData, DashboardStats};
use tracing::{info, warn};

use crate::{RefreshOutcome, RefreshTicket, SnapshotCache};

/// Count of active vehicles in one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCount {
    pub label: String,
    pub count: usize,
}

/// Figures computed locally from the stats and the active-vehicle list
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFigures {
    /// The service's active-vehicle count
    pub active_count: usize,
    pub capacity: u32,
    /// 0..=100, clamped at full capacity
    pub occupancy_percent: f64,
    /// "2W" and "4W" first (always present), then other classes by name
    pub class_histogram: Vec<ClassCount>,
    pub overstay_count: usize,
}

impl DerivedFigures {
    pub fn occupancy_rounded(&self) -> u32 {
        self.occupancy_percent.round() as u32
    }

    pub fn class_count(&self, label: &str) -> usize {
        self.class_histogram
            .iter()
            .find(|c| c.label == label)
            .map_or(0, |c| c.count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    /// Trusted aggregates, exactly as the service reported them
    pub trusted: DashboardStats,
    pub derived: DerivedFigures,
}

/// Occupancy percentage: `min(active / capacity, 1) * 100`
pub fn occupancy_percent(active_count: usize, capacity: u32) -> f64 {
    if capacity == 0 {
        return if active_count > 0 { 100.0 } else { 0.0 };
    }
    (active_count as f64 / f64::from(capacity)).min(1.0) * 100.0
}

pub fn class_histogram(active: &[ActiveVehicleBrief]) -> Vec<ClassCount> {
    let mut histogram = vec![
        ClassCount {
            label: "2W".into(),
            count: 0,
        },
        ClassCount {
            label: "4W".into(),
            count: 0,
        },
    ];

    for vehicle in active {
        let label = vehicle.vehicle_type.class_label();
        match histogram.iter_mut().find(|c| c.label == label) {
            Some(entry) => entry.count += 1,
            None => histogram.push(ClassCount {
                label: label.to_string(),
                count: 1,
            }),
        }
    }

    histogram[2..].sort_by(|a, b| a.label.cmp(&b.label));
    histogram
}

/// Pure derivation from a stats snapshot and the active-vehicle list
pub fn summarize(
    stats: &DashboardStats,
    active: &[ActiveVehicleBrief],
    capacity: u32,
) -> DashboardSummary {
    let active_count = stats.active_vehicles as usize;

    DashboardSummary {
        trusted: stats.clone(),
        derived: DerivedFigures {
            active_count,
            capacity,
            occupancy_percent: occupancy_percent(active_count, capacity),
            class_histogram: class_histogram(active),
            overstay_count: active
                .iter()
                .filter(|v| v.is_overstay == Some(true))
                .count(),
        },
    }
}

/// Dashboard with its own refresh cycle, independent of the session monitor
pub struct DashboardAggregator {
    capacity: u32,
    cache: SnapshotCache<Option<DashboardData>>,
}

impl DashboardAggregator {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            cache: SnapshotCache::new(None),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.cache.begin_refresh()
    }

    pub fn apply(
        &mut self,
        ticket: RefreshTicket,
        data: DashboardData,
        at: DateTime<Utc>,
    ) -> RefreshOutcome {
        let count = data.active_vehicles.len();
        if self.cache.apply(ticket, Some(data), at) {
            info!(active = count, "Dashboard snapshot applied");
            RefreshOutcome::Applied { count }
        } else {
            RefreshOutcome::Stale
        }
    }

    pub fn fail(&mut self, ticket: RefreshTicket, error: impl Into<String>) -> RefreshOutcome {
        let error = error.into();
        if self.cache.fail(ticket, error.clone()) {
            warn!(error = %error, "Dashboard refresh failed, keeping previous figures");
            RefreshOutcome::Failed { error }
        } else {
            RefreshOutcome::Stale
        }
    }

    /// None until the first successful refresh
    pub fn summary(&self) -> Option<DashboardSummary> {
        self.cache
            .value()
            .as_ref()
            .map(|data| summarize(&data.stats, &data.active_vehicles, self.capacity))
    }

    pub fn last_error(&self) -> Option<&str> {
        self.cache.last_error()
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.cache.refreshed_at()
    }
}
