//! In-memory parking service for unit/integration testing

use async_trait::async_trait;
use parkdesk_api::{
    ActiveVehicleBrief, CollectionReceipt, DashboardData, DashboardStats, EntryReceipt,
    ExitReceipt, HistoryPage, HistoryQuery, MonitorData, PricingRule, SessionStatus,
    VehicleEntryInput, VehicleSession,
};
use parkdesk_util::{ChargeId, SessionId, VehicleId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{BackendError, BackendResult, ParkingBackend};

/// Calls observed by the mock, for assertions
#[derive(Debug, Clone, Default)]
pub struct MockCalls {
    pub monitor_fetches: usize,
    pub rule_fetches: usize,
    pub dashboard_fetches: usize,
    pub entries: Vec<VehicleEntryInput>,
    pub exits: Vec<SessionId>,
    pub collections: Vec<ChargeId>,
    pub history_queries: Vec<HistoryQuery>,
}

/// Mock parking backend
///
/// Holds a tiny server-side state: sessions, rules, stats, and prepared
/// exit receipts. Exits mark the session exited so later fetches omit it.
pub struct MockBackend {
    next_id: AtomicU64,
    sessions: Arc<Mutex<Vec<VehicleSession>>>,
    rules: Arc<Mutex<Vec<PricingRule>>>,
    /// Explicit stats; when unset, stats report the active session count
    stats: Arc<Mutex<Option<DashboardStats>>>,
    history: Arc<Mutex<HistoryPage>>,
    exit_receipts: Arc<Mutex<HashMap<SessionId, ExitReceipt>>>,
    calls: Arc<Mutex<MockCalls>>,

    /// Configure monitor/dashboard/rule fetches to fail
    pub fail_fetch: Arc<Mutex<bool>>,

    /// Configure phase 1 of exits to fail
    pub fail_exit: Arc<Mutex<bool>>,

    /// Configure phase 2 of exits (payment collection) to fail
    pub fail_collect: Arc<Mutex<bool>>,

    /// Configure entries to be rejected
    pub fail_entry: Arc<Mutex<bool>>,

    /// Delay before phase 1 answers (simulates a slow service)
    pub exit_delay: Arc<Mutex<Option<Duration>>>,

    /// Delay before a monitor fetch answers. The response reflects the
    /// sessions at the time the request arrived.
    pub fetch_delay: Arc<Mutex<Option<Duration>>>,

    /// Answer payment collection with `is_collected: false`
    pub decline_collect: Arc<Mutex<bool>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: Arc::new(Mutex::new(Vec::new())),
            rules: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(None)),
            history: Arc::new(Mutex::new(HistoryPage::default())),
            exit_receipts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(MockCalls::default())),
            fail_fetch: Arc::new(Mutex::new(false)),
            fail_exit: Arc::new(Mutex::new(false)),
            fail_collect: Arc::new(Mutex::new(false)),
            fail_entry: Arc::new(Mutex::new(false)),
            exit_delay: Arc::new(Mutex::new(None)),
            fetch_delay: Arc::new(Mutex::new(None)),
            decline_collect: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_rules(self, rules: Vec<PricingRule>) -> Self {
        *self.rules.lock().unwrap() = rules;
        self
    }

    pub fn with_sessions(self, sessions: Vec<VehicleSession>) -> Self {
        *self.sessions.lock().unwrap() = sessions;
        self
    }

    /// Replace the server-side session list wholesale
    pub fn set_sessions(&self, sessions: Vec<VehicleSession>) {
        *self.sessions.lock().unwrap() = sessions;
    }

    pub fn set_stats(&self, stats: DashboardStats) {
        *self.stats.lock().unwrap() = Some(stats);
    }

    pub fn set_history(&self, page: HistoryPage) {
        *self.history.lock().unwrap() = page;
    }

    /// Prepare the receipt phase 1 returns for a session
    pub fn set_exit_receipt(&self, receipt: ExitReceipt) {
        self.exit_receipts
            .lock()
            .unwrap()
            .insert(receipt.session_id.clone(), receipt);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().unwrap() = fail;
    }

    pub fn set_fail_exit(&self, fail: bool) {
        *self.fail_exit.lock().unwrap() = fail;
    }

    pub fn set_fail_collect(&self, fail: bool) {
        *self.fail_collect.lock().unwrap() = fail;
    }

    pub fn set_fail_entry(&self, fail: bool) {
        *self.fail_entry.lock().unwrap() = fail;
    }

    pub fn set_exit_delay(&self, delay: Option<Duration>) {
        *self.exit_delay.lock().unwrap() = delay;
    }

    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn set_decline_collect(&self, decline: bool) {
        *self.decline_collect.lock().unwrap() = decline;
    }

    /// Snapshot of the calls made so far
    pub fn calls(&self) -> MockCalls {
        self.calls.lock().unwrap().clone()
    }

    /// Sessions the mock still considers active
    pub fn active_sessions(&self) -> Vec<VehicleSession> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect()
    }

    fn check_fetch(&self) -> BackendResult<()> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(BackendError::Transport("Mock fetch failure".into()));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParkingBackend for MockBackend {
    async fn fetch_monitor_data(&self) -> BackendResult<MonitorData> {
        self.calls.lock().unwrap().monitor_fetches += 1;
        self.check_fetch()?;

        let data = MonitorData {
            active_vehicles: self.active_sessions(),
            pricing_rules: self.rules.lock().unwrap().clone(),
        };

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(data)
    }

    async fn fetch_pricing_rules(&self) -> BackendResult<Vec<PricingRule>> {
        self.calls.lock().unwrap().rule_fetches += 1;
        self.check_fetch()?;

        Ok(self.rules.lock().unwrap().clone())
    }

    async fn fetch_dashboard(&self) -> BackendResult<DashboardData> {
        self.calls.lock().unwrap().dashboard_fetches += 1;
        self.check_fetch()?;

        let active = self.active_sessions();
        let stats = self.stats.lock().unwrap().clone().unwrap_or_else(|| DashboardStats {
            active_vehicles: u32::try_from(active.len()).unwrap_or(u32::MAX),
            ..DashboardStats::default()
        });

        let active_vehicles = active
            .into_iter()
            .map(|s| ActiveVehicleBrief {
                id: s.id,
                vehicle_type: s.vehicle_type,
                is_overstay: s.is_overstay,
            })
            .collect();

        Ok(DashboardData {
            stats,
            active_vehicles,
        })
    }

    async fn log_vehicle_entry(&self, input: &VehicleEntryInput) -> BackendResult<EntryReceipt> {
        self.calls.lock().unwrap().entries.push(input.clone());

        if *self.fail_entry.lock().unwrap() {
            return Err(BackendError::remote("Mock entry rejected"));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let base_fee = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.vehicle_type == input.vehicle_type)
            .map(|r| r.base_fee)
            .unwrap_or(Decimal::ZERO);

        let session = VehicleSession {
            id: VehicleId::new(format!("mock-v-{n}")),
            session_id: SessionId::new(format!("MOCK-{n:04}")),
            driver_phone: input.driver_phone.clone(),
            vehicle_type: input.vehicle_type.clone(),
            vehicle_number: Some(input.vehicle_number.clone()),
            entry_time: parkdesk_util::now(),
            status: SessionStatus::Active,
            base_fee_paid: base_fee,
            duration_minutes: None,
            is_overstay: None,
            overstay_minutes: None,
            declared_duration_hours: None,
        };

        let receipt = EntryReceipt {
            id: session.id.clone(),
            session_id: session.session_id.clone(),
            base_fee_paid: base_fee,
            vehicle_number: session.vehicle_number.clone(),
        };

        self.sessions.lock().unwrap().push(session);
        Ok(receipt)
    }

    async fn process_vehicle_exit(&self, session_id: &SessionId) -> BackendResult<ExitReceipt> {
        self.calls.lock().unwrap().exits.push(session_id.clone());

        let delay = *self.exit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_exit.lock().unwrap() {
            return Err(BackendError::remote("Mock exit failure"));
        }

        let base_fee = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .iter_mut()
                .find(|s| &s.session_id == session_id && s.is_active())
                .ok_or_else(|| BackendError::remote(format!("Session {session_id} is not active")))?;
            session.status = SessionStatus::Exited;
            session.base_fee_paid
        };

        let prepared = self.exit_receipts.lock().unwrap().remove(session_id);
        Ok(prepared.unwrap_or_else(|| ExitReceipt {
            session_id: session_id.clone(),
            total_amount: base_fee,
            overstay_fee: Decimal::ZERO,
            overstay_record: None,
        }))
    }

    async fn collect_overstay_payment(
        &self,
        charge_id: &ChargeId,
    ) -> BackendResult<CollectionReceipt> {
        self.calls.lock().unwrap().collections.push(charge_id.clone());

        if *self.fail_collect.lock().unwrap() {
            return Err(BackendError::Transport("Mock payment failure".into()));
        }

        Ok(CollectionReceipt {
            id: charge_id.clone(),
            is_collected: !*self.decline_collect.lock().unwrap(),
        })
    }

    async fn transaction_history(&self, query: &HistoryQuery) -> BackendResult<HistoryPage> {
        self.calls.lock().unwrap().history_queries.push(query.clone());
        self.check_fetch()?;

        Ok(self.history.lock().unwrap().clone())
    }
}
