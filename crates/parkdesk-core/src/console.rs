//! Operator console
//!
//! Owns the session monitor and dashboard state, and routes every operator
//! action through the backend and the audit store. Views read from here;
//! only the refresh methods and completed actions mutate the snapshots.

use chrono::{DateTime, Utc};
use parkdesk_api::{
    CollectionReceipt, EntryReceipt, HistoryPage, HistoryQuery, VehicleType,
};
use parkdesk_backend::ParkingBackend;
use parkdesk_config::FacilitySettings;
use parkdesk_store::{AuditEvent, AuditEventType, Store, UnsettledCharge};
use parkdesk_util::{ChargeId, SessionId};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::{
    CoreError, CoreEvent, CoreResult, DashboardAggregator, DashboardSummary, EntryFee,
    EntryRequest, ExitQuote, ExitTransaction, ExitTransactionCoordinator, PricingCatalog,
    RefreshOutcome, RefreshSource, SessionMonitor, SessionView, compute_quote,
};

/// Freshness of one refresh cycle, for the "last updated" indicator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshStatus {
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub struct Console {
    backend: Arc<dyn ParkingBackend>,
    store: Arc<dyn Store>,
    monitor: Mutex<SessionMonitor>,
    dashboard: Mutex<DashboardAggregator>,
    exits: ExitTransactionCoordinator,
    facility: FacilitySettings,
    events: broadcast::Sender<CoreEvent>,
}

impl Console {
    pub fn new(
        backend: Arc<dyn ParkingBackend>,
        store: Arc<dyn Store>,
        facility: &FacilitySettings,
    ) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            exits: ExitTransactionCoordinator::new(backend.clone(), store.clone()),
            backend,
            store,
            monitor: Mutex::new(SessionMonitor::new()),
            dashboard: Mutex::new(DashboardAggregator::new(facility.capacity)),
            facility: facility.clone(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn facility(&self) -> &FacilitySettings {
        &self.facility
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.events.send(event);
    }

    fn emit_outcome(&self, source: RefreshSource, outcome: &RefreshOutcome) {
        match outcome {
            RefreshOutcome::Applied { count } => self.emit(CoreEvent::Refreshed {
                source,
                count: *count,
            }),
            RefreshOutcome::Failed { error } => self.emit(CoreEvent::RefreshFailed {
                source,
                error: error.clone(),
            }),
            RefreshOutcome::Stale => debug!(?source, "Discarded stale refresh response"),
        }
    }

    // Refresh cycles

    /// Fetch and replace the active-session snapshot.
    ///
    /// The lock is not held across the fetch; a response that arrives after
    /// a newer one has been applied is discarded.
    pub async fn refresh_sessions(&self) -> RefreshOutcome {
        let ticket = self.monitor.lock().await.begin_refresh();
        let result = self.backend.fetch_monitor_data().await;

        let outcome = {
            let mut monitor = self.monitor.lock().await;
            match result {
                Ok(data) => monitor.apply(ticket, data, parkdesk_util::now()),
                Err(e) => monitor.fail(ticket, e.to_string()),
            }
        };

        self.emit_outcome(RefreshSource::Sessions, &outcome);
        outcome
    }

    pub async fn refresh_dashboard(&self) -> RefreshOutcome {
        let ticket = self.dashboard.lock().await.begin_refresh();
        let result = self.backend.fetch_dashboard().await;

        let outcome = {
            let mut dashboard = self.dashboard.lock().await;
            match result {
                Ok(data) => dashboard.apply(ticket, data, parkdesk_util::now()),
                Err(e) => dashboard.fail(ticket, e.to_string()),
            }
        };

        self.emit_outcome(RefreshSource::Dashboard, &outcome);
        outcome
    }

    pub async fn refresh_all(&self) -> (RefreshOutcome, RefreshOutcome) {
        tokio::join!(self.refresh_sessions(), self.refresh_dashboard())
    }

    // Reads

    /// Filtered, entry-ordered view of the current snapshot
    pub async fn visible_sessions(&self, filter: &str, now: DateTime<Utc>) -> Vec<SessionView> {
        self.monitor.lock().await.visible(filter, now)
    }

    pub async fn sessions_status(&self) -> RefreshStatus {
        let monitor = self.monitor.lock().await;
        RefreshStatus {
            refreshed_at: monitor.last_refreshed_at(),
            last_error: monitor.last_error().map(str::to_string),
        }
    }

    pub async fn dashboard_summary(&self) -> Option<DashboardSummary> {
        self.dashboard.lock().await.summary()
    }

    pub async fn dashboard_status(&self) -> RefreshStatus {
        let dashboard = self.dashboard.lock().await;
        RefreshStatus {
            refreshed_at: dashboard.last_refreshed_at(),
            last_error: dashboard.last_error().map(str::to_string),
        }
    }

    pub fn unsettled_charges(&self) -> CoreResult<Vec<UnsettledCharge>> {
        Ok(self.store.list_unsettled_charges()?)
    }

    // Exit

    /// Freeze a quote for a session in the current snapshot
    pub async fn open_exit(&self, session_id: &SessionId, now: DateTime<Utc>) -> CoreResult<ExitQuote> {
        let monitor = self.monitor.lock().await;
        let session = monitor
            .session(session_id)
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
        let rule = monitor.catalog().lookup(&session.vehicle_type)?;
        Ok(compute_quote(session, rule, now))
    }

    /// Run the exit for a confirmed quote, then refresh both views if the
    /// vehicle actually left.
    pub async fn confirm_exit(&self, quote: ExitQuote) -> CoreResult<ExitTransaction> {
        let tx = self.exits.execute(quote).await?;

        self.emit(CoreEvent::ExitCompleted {
            session_id: tx.quote.session_id.clone(),
            state: tx.kind(),
            amount_due: tx.amount_outstanding(),
        });

        if tx.kind().has_exited() {
            self.refresh_all().await;
        }
        Ok(tx)
    }

    pub async fn collect_outstanding(&self, charge_id: &ChargeId) -> CoreResult<CollectionReceipt> {
        let receipt = self.exits.collect_outstanding(charge_id).await?;
        self.emit(CoreEvent::ChargeCollected {
            charge_id: charge_id.clone(),
        });
        self.refresh_dashboard().await;
        Ok(receipt)
    }

    // Entry

    /// Pricing for the entry form. Uses the monitor's catalog when it has
    /// one, otherwise fetches rules directly.
    pub async fn pricing_catalog(&self) -> CoreResult<PricingCatalog> {
        {
            let monitor = self.monitor.lock().await;
            if !monitor.catalog().is_empty() {
                return Ok(monitor.catalog().clone());
            }
        }

        let rules = self.backend.fetch_pricing_rules().await?;
        PricingCatalog::from_rules(rules)
    }

    pub async fn entry_fee(&self, vehicle_type: &VehicleType) -> CoreResult<EntryFee> {
        self.pricing_catalog().await?.entry_fee(vehicle_type)
    }

    pub async fn log_entry(&self, request: &EntryRequest) -> CoreResult<EntryReceipt> {
        let catalog = self.pricing_catalog().await?;
        let (input, fee) = request.validate(&catalog)?;

        let receipt = self.backend.log_vehicle_entry(&input).await?;

        if receipt.base_fee_paid != fee.base_fee {
            warn!(
                session_id = %receipt.session_id,
                expected = %fee.base_fee,
                charged = %receipt.base_fee_paid,
                "Base fee charged differs from catalog"
            );
        }
        info!(
            session_id = %receipt.session_id,
            vehicle_number = %input.vehicle_number,
            vehicle_type = %input.vehicle_type,
            "Entry logged"
        );

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::EntryLogged {
            session_id: receipt.session_id.clone(),
            vehicle_number: input.vehicle_number.clone(),
            vehicle_type: input.vehicle_type.to_string(),
            base_fee_paid: receipt.base_fee_paid,
        }));
        self.emit(CoreEvent::EntryLogged {
            session_id: receipt.session_id.clone(),
            vehicle_number: input.vehicle_number,
        });

        self.refresh_all().await;
        Ok(receipt)
    }

    // History

    pub async fn history(&self, query: &HistoryQuery) -> CoreResult<HistoryPage> {
        Ok(self.backend.transaction_history(query).await?)
    }
}
