//! Two-phase exit coordination
//!
//! Phase 1 finalizes the session remotely and returns the authoritative
//! fee. Phase 2 collects the overstay charge, and only runs when phase 1
//! assessed a fee and created a charge record. The phases are strictly
//! sequential and nothing is retried or compensated automatically.
//!
//! ```text
//! Quoted ──► ExitedPendingPayment ──► Settled
//!   │                    └──────────► PaymentOutstanding
//!   └──► Failed
//! ```

use parkdesk_api::{CollectionReceipt, ExitReceipt, OverstayRecord};
use parkdesk_backend::ParkingBackend;
use parkdesk_store::{AuditEvent, AuditEventType, Store, UnsettledCharge};
use parkdesk_util::{AttemptId, ChargeId};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::{CoreError, CoreResult, ExitQuote};

/// State of one exit attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ExitState {
    Quoted,
    /// The session is exited remotely; payment not yet settled
    ExitedPendingPayment,
    Settled {
        collection: Option<CollectionReceipt>,
    },
    /// The vehicle has left but the overstay charge is still owed
    PaymentOutstanding {
        charge: OverstayRecord,
        error: String,
    },
    /// Phase 1 was rejected; the session is still active
    Failed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStateKind {
    Quoted,
    ExitedPendingPayment,
    Settled,
    PaymentOutstanding,
    Failed,
}

impl ExitState {
    pub fn kind(&self) -> ExitStateKind {
        match self {
            ExitState::Quoted => ExitStateKind::Quoted,
            ExitState::ExitedPendingPayment => ExitStateKind::ExitedPendingPayment,
            ExitState::Settled { .. } => ExitStateKind::Settled,
            ExitState::PaymentOutstanding { .. } => ExitStateKind::PaymentOutstanding,
            ExitState::Failed { .. } => ExitStateKind::Failed,
        }
    }
}

impl ExitStateKind {
    pub fn can_advance_to(self, next: ExitStateKind) -> bool {
        use ExitStateKind::*;
        matches!(
            (self, next),
            (Quoted, ExitedPendingPayment)
                | (Quoted, Failed)
                | (ExitedPendingPayment, Settled)
                | (ExitedPendingPayment, PaymentOutstanding)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExitStateKind::Settled | ExitStateKind::PaymentOutstanding | ExitStateKind::Failed
        )
    }

    /// Whether the session has been finalized remotely
    pub fn has_exited(self) -> bool {
        matches!(
            self,
            ExitStateKind::ExitedPendingPayment
                | ExitStateKind::Settled
                | ExitStateKind::PaymentOutstanding
        )
    }
}

/// One exit attempt and everything it learned
#[derive(Debug, Clone)]
pub struct ExitTransaction {
    pub attempt_id: AttemptId,
    /// Frozen quote shown to the operator
    pub quote: ExitQuote,
    /// Phase 1 result, once received
    pub receipt: Option<ExitReceipt>,
    state: ExitState,
    trail: Vec<ExitStateKind>,
}

impl ExitTransaction {
    pub fn new(quote: ExitQuote) -> Self {
        Self {
            attempt_id: AttemptId::new(),
            quote,
            receipt: None,
            state: ExitState::Quoted,
            trail: vec![ExitStateKind::Quoted],
        }
    }

    fn advance(&mut self, next: ExitState) {
        let from = self.state.kind();
        let to = next.kind();
        debug_assert!(from.can_advance_to(to), "invalid exit transition {from:?} -> {to:?}");
        debug!(attempt_id = %self.attempt_id, ?from, ?to, "Exit state changed");
        self.trail.push(to);
        self.state = next;
    }

    pub fn state(&self) -> &ExitState {
        &self.state
    }

    pub fn kind(&self) -> ExitStateKind {
        self.state.kind()
    }

    /// Every state visited, in order
    pub fn trail(&self) -> &[ExitStateKind] {
        &self.trail
    }

    /// Authoritative overstay fee minus the quoted balance, once phase 1 answered
    pub fn quote_drift(&self) -> Option<Decimal> {
        self.receipt
            .as_ref()
            .map(|r| r.overstay_fee - self.quote.balance_due)
    }

    /// What the operator still has to collect by hand
    pub fn amount_outstanding(&self) -> Decimal {
        match &self.state {
            ExitState::PaymentOutstanding { charge, .. } => charge.fee_amount,
            ExitState::Failed { .. } | ExitState::Quoted => self.quote.balance_due,
            ExitState::ExitedPendingPayment => self
                .receipt
                .as_ref()
                .map_or(self.quote.balance_due, |r| r.overstay_fee),
            ExitState::Settled { .. } => Decimal::ZERO,
        }
    }
}

/// Clears the busy flag when dropped
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExitTransactionCoordinator {
    backend: Arc<dyn ParkingBackend>,
    store: Arc<dyn Store>,
    busy: AtomicBool,
}

impl ExitTransactionCoordinator {
    pub fn new(backend: Arc<dyn ParkingBackend>, store: Arc<dyn Store>) -> Self {
        Self {
            backend,
            store,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run both phases for a confirmed quote.
    ///
    /// Returns `ExitInProgress` if another exit from this console is in
    /// flight. Remote failures are reported through the transaction state,
    /// not as errors.
    pub async fn execute(&self, quote: ExitQuote) -> CoreResult<ExitTransaction> {
        let _guard = BusyGuard::acquire(&self.busy).ok_or(CoreError::ExitInProgress)?;

        let mut tx = ExitTransaction::new(quote);
        let session_id = tx.quote.session_id.clone();

        info!(
            session_id = %session_id,
            attempt_id = %tx.attempt_id,
            balance_due = %tx.quote.balance_due,
            "Processing exit"
        );

        let receipt = match self.backend.process_vehicle_exit(&session_id).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Exit rejected, session remains active");
                let _ = self.store.append_audit(AuditEvent::new(AuditEventType::ExitFailed {
                    attempt_id: tx.attempt_id,
                    session_id,
                    error: e.to_string(),
                }));
                tx.advance(ExitState::Failed {
                    error: e.to_string(),
                });
                return Ok(tx);
            }
        };

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::ExitFinalized {
            attempt_id: tx.attempt_id,
            session_id: session_id.clone(),
            total_amount: receipt.total_amount,
            overstay_fee: receipt.overstay_fee,
            quoted_balance: tx.quote.balance_due,
        }));

        if receipt.overstay_fee != tx.quote.balance_due {
            warn!(
                session_id = %session_id,
                quoted = %tx.quote.balance_due,
                assessed = %receipt.overstay_fee,
                "Assessed overstay fee differs from quote"
            );
        }

        let charge = receipt.collectable_charge().cloned();
        if charge.is_none() && receipt.overstay_fee > Decimal::ZERO {
            warn!(
                session_id = %session_id,
                overstay_fee = %receipt.overstay_fee,
                "Overstay fee assessed without a charge record, nothing to collect"
            );
        }

        tx.receipt = Some(receipt);
        tx.advance(ExitState::ExitedPendingPayment);

        let Some(charge) = charge else {
            info!(session_id = %session_id, "Exit settled");
            tx.advance(ExitState::Settled { collection: None });
            return Ok(tx);
        };

        let failure = match self.backend.collect_overstay_payment(&charge.id).await {
            Ok(collection) if collection.is_collected => {
                info!(
                    session_id = %session_id,
                    charge_id = %charge.id,
                    fee = %charge.fee_amount,
                    "Overstay payment collected, exit settled"
                );
                let _ = self.store.append_audit(AuditEvent::new(AuditEventType::PaymentCollected {
                    attempt_id: Some(tx.attempt_id),
                    charge_id: charge.id.clone(),
                    fee_amount: charge.fee_amount,
                }));
                tx.advance(ExitState::Settled {
                    collection: Some(collection),
                });
                return Ok(tx);
            }
            Ok(_) => CoreError::PaymentNotCollected(charge.id.clone()).to_string(),
            Err(e) => e.to_string(),
        };

        error!(
            session_id = %session_id,
            charge_id = %charge.id,
            fee = %charge.fee_amount,
            error = %failure,
            "Vehicle exited but overstay payment is outstanding"
        );

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::PaymentCollectionFailed {
                attempt_id: Some(tx.attempt_id),
                session_id: session_id.clone(),
                charge_id: charge.id.clone(),
                fee_amount: charge.fee_amount,
                error: failure.clone(),
            }));

        let ledger_entry = UnsettledCharge {
            charge_id: charge.id.clone(),
            session_id,
            vehicle_number: tx.quote.vehicle_number.clone(),
            fee_amount: charge.fee_amount,
            exited_at: parkdesk_util::now(),
            last_error: failure.clone(),
            settled_at: None,
        };
        if let Err(e) = self.store.record_unsettled_charge(&ledger_entry) {
            error!(charge_id = %charge.id, error = %e, "Failed to record unsettled charge");
        }

        tx.advance(ExitState::PaymentOutstanding {
            charge,
            error: failure,
        });
        Ok(tx)
    }

    /// Operator-initiated collection of a ledger charge.
    ///
    /// On failure the ledger keeps the charge with the new error. Once the
    /// service reports the charge collected this returns the receipt, even
    /// if settling the ledger entry fails.
    pub async fn collect_outstanding(&self, charge_id: &ChargeId) -> CoreResult<CollectionReceipt> {
        let charge = self
            .store
            .get_charge(charge_id)?
            .filter(|c| !c.is_settled())
            .ok_or_else(|| CoreError::ChargeNotFound(charge_id.clone()))?;

        info!(charge_id = %charge_id, fee = %charge.fee_amount, "Collecting outstanding charge");

        let failure = match self.backend.collect_overstay_payment(charge_id).await {
            Ok(collection) if collection.is_collected => {
                // Collected remotely: a ledger failure is logged, never returned
                let _ = self.store.append_audit(AuditEvent::new(AuditEventType::PaymentCollected {
                    attempt_id: None,
                    charge_id: charge_id.clone(),
                    fee_amount: charge.fee_amount,
                }));
                match self.store.mark_charge_settled(charge_id, parkdesk_util::now()) {
                    Ok(_) => {
                        let _ = self.store.append_audit(AuditEvent::new(
                            AuditEventType::ChargeReconciled {
                                charge_id: charge_id.clone(),
                            },
                        ));
                        info!(charge_id = %charge_id, "Outstanding charge settled");
                    }
                    Err(e) => error!(
                        charge_id = %charge_id,
                        error = %e,
                        "Charge collected but ledger not updated, do not collect again"
                    ),
                }
                return Ok(collection);
            }
            Ok(_) => CoreError::PaymentNotCollected(charge_id.clone()),
            Err(e) => CoreError::Backend(e),
        };

        warn!(charge_id = %charge_id, error = %failure, "Outstanding charge still unsettled");
        self.store.update_charge_error(charge_id, &failure.to_string())?;
        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::PaymentCollectionFailed {
                attempt_id: None,
                session_id: charge.session_id,
                charge_id: charge_id.clone(),
                fee_amount: charge.fee_amount,
                error: failure.to_string(),
            }));

        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_quote;
    use crate::test_support::*;
    use chrono::{DateTime, Utc};
    use parkdesk_backend::MockBackend;
    use parkdesk_store::{SqliteStore, StoreError, StoreResult};
    use parkdesk_util::SessionId;
    use std::time::Duration;

    fn setup() -> (Arc<MockBackend>, Arc<SqliteStore>, ExitTransactionCoordinator) {
        let mut s = session("PS-1", "car", at(9, 0));
        s.declared_duration_hours = Some(2);
        let backend = Arc::new(MockBackend::new().with_sessions(vec![s]));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let coordinator = ExitTransactionCoordinator::new(backend.clone(), store.clone());
        (backend, store, coordinator)
    }

    fn quote() -> ExitQuote {
        let mut s = session("PS-1", "car", at(9, 0));
        s.declared_duration_hours = Some(2);
        compute_quote(&s, &rule("car", 50, 2, 20), at(12, 30))
    }

    fn receipt_with_charge(fee: i64) -> ExitReceipt {
        ExitReceipt {
            session_id: SessionId::new("PS-1"),
            total_amount: Decimal::from(50 + fee),
            overstay_fee: Decimal::from(fee),
            overstay_record: Some(OverstayRecord {
                id: ChargeId::new("ovs-1"),
                fee_amount: Decimal::from(fee),
            }),
        }
    }

    #[test]
    fn transitions() {
        use ExitStateKind::*;
        assert!(Quoted.can_advance_to(ExitedPendingPayment));
        assert!(Quoted.can_advance_to(Failed));
        assert!(ExitedPendingPayment.can_advance_to(Settled));
        assert!(ExitedPendingPayment.can_advance_to(PaymentOutstanding));
        assert!(!Quoted.can_advance_to(Settled));
        assert!(!Failed.can_advance_to(ExitedPendingPayment));
        assert!(!Settled.can_advance_to(PaymentOutstanding));
        assert!(!PaymentOutstanding.can_advance_to(Settled));
        assert!(PaymentOutstanding.is_terminal() && PaymentOutstanding.has_exited());
        assert!(Failed.is_terminal() && !Failed.has_exited());
    }

    #[tokio::test]
    async fn zero_fee_never_collects() {
        let (backend, _store, coordinator) = setup();

        let mut q = quote();
        q.balance_due = Decimal::ZERO;
        let tx = coordinator.execute(q).await.unwrap();

        assert_eq!(tx.kind(), ExitStateKind::Settled);
        assert_eq!(
            tx.trail(),
            &[
                ExitStateKind::Quoted,
                ExitStateKind::ExitedPendingPayment,
                ExitStateKind::Settled
            ]
        );
        assert!(backend.calls().collections.is_empty());
        assert_eq!(backend.calls().exits.len(), 1);
    }

    #[tokio::test]
    async fn fee_with_record_collects_once() {
        let (backend, store, coordinator) = setup();
        backend.set_exit_receipt(receipt_with_charge(40));

        let tx = coordinator.execute(quote()).await.unwrap();

        assert_eq!(tx.kind(), ExitStateKind::Settled);
        assert_eq!(backend.calls().collections, vec![ChargeId::new("ovs-1")]);
        assert_eq!(tx.quote_drift(), Some(Decimal::ZERO));
        assert_eq!(tx.amount_outstanding(), Decimal::ZERO);
        assert!(store.list_unsettled_charges().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fee_without_record_settles_without_collecting() {
        let (backend, _store, coordinator) = setup();
        let mut receipt = receipt_with_charge(40);
        receipt.overstay_record = None;
        backend.set_exit_receipt(receipt);

        let tx = coordinator.execute(quote()).await.unwrap();

        assert_eq!(tx.kind(), ExitStateKind::Settled);
        assert!(backend.calls().collections.is_empty());
    }

    #[tokio::test]
    async fn phase_one_failure_leaves_session_active() {
        let (backend, store, coordinator) = setup();
        backend.set_fail_exit(true);

        let tx = coordinator.execute(quote()).await.unwrap();

        assert_eq!(tx.kind(), ExitStateKind::Failed);
        assert!(tx.receipt.is_none());
        assert_eq!(backend.active_sessions().len(), 1);
        assert!(backend.calls().collections.is_empty());

        let audits = store.get_recent_audits(5).unwrap();
        assert!(matches!(audits[0].event, AuditEventType::ExitFailed { .. }));

        // Safe to retry once the service recovers
        backend.set_fail_exit(false);
        let retry = coordinator.execute(quote()).await.unwrap();
        assert_eq!(retry.kind(), ExitStateKind::Settled);
    }

    #[tokio::test]
    async fn phase_two_failure_is_payment_outstanding() {
        let (backend, store, coordinator) = setup();
        backend.set_exit_receipt(receipt_with_charge(40));
        backend.set_fail_collect(true);

        let tx = coordinator.execute(quote()).await.unwrap();

        assert_eq!(tx.kind(), ExitStateKind::PaymentOutstanding);
        assert_eq!(tx.amount_outstanding(), Decimal::from(40));
        assert!(backend.active_sessions().is_empty());
        // No automatic retry
        assert_eq!(backend.calls().collections.len(), 1);

        let ledger = store.list_unsettled_charges().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].charge_id.as_str(), "ovs-1");
        assert_eq!(ledger[0].fee_amount, Decimal::from(40));
        assert_eq!(ledger[0].vehicle_number.as_deref(), Some("KL01ABPS-1"));
    }

    #[tokio::test]
    async fn uncollected_reply_is_payment_outstanding() {
        let (backend, store, coordinator) = setup();
        backend.set_exit_receipt(receipt_with_charge(40));
        backend.set_decline_collect(true);

        let tx = coordinator.execute(quote()).await.unwrap();

        assert_eq!(tx.kind(), ExitStateKind::PaymentOutstanding);
        assert_eq!(backend.calls().collections.len(), 1);

        let ledger = store.list_unsettled_charges().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger[0].last_error,
            CoreError::PaymentNotCollected(ChargeId::new("ovs-1")).to_string()
        );
    }

    #[tokio::test]
    async fn quote_drift_is_reported() {
        let (backend, _store, coordinator) = setup();
        backend.set_exit_receipt(receipt_with_charge(60));

        let tx = coordinator.execute(quote()).await.unwrap();
        assert_eq!(tx.quote_drift(), Some(Decimal::from(20)));
        // The frozen quote is never rewritten
        assert_eq!(tx.quote.balance_due, Decimal::from(40));
    }

    #[tokio::test]
    async fn concurrent_exit_rejected() {
        let (backend, _store, coordinator) = setup();
        backend.set_exit_delay(Some(Duration::from_millis(100)));
        let coordinator = Arc::new(coordinator);

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.execute(quote()).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(coordinator.is_busy());
        let second = coordinator.execute(quote()).await;
        assert!(matches!(second, Err(CoreError::ExitInProgress)));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.kind(), ExitStateKind::Settled);
        assert!(!coordinator.is_busy());
        assert_eq!(backend.calls().exits.len(), 1);
    }

    #[tokio::test]
    async fn manual_collection_declined_keeps_charge_open() {
        let (backend, store, coordinator) = setup();
        backend.set_exit_receipt(receipt_with_charge(40));
        backend.set_fail_collect(true);
        coordinator.execute(quote()).await.unwrap();

        backend.set_fail_collect(false);
        backend.set_decline_collect(true);
        let err = coordinator
            .collect_outstanding(&ChargeId::new("ovs-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::PaymentNotCollected(ref id) if id.as_str() == "ovs-1"));
        let open = store.list_unsettled_charges().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].last_error, err.to_string());
    }

    /// Store whose ledger settlement always fails
    struct SettleFailsStore(SqliteStore);

    impl Store for SettleFailsStore {
        fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
            self.0.append_audit(event)
        }

        fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
            self.0.get_recent_audits(limit)
        }

        fn record_unsettled_charge(&self, charge: &UnsettledCharge) -> StoreResult<()> {
            self.0.record_unsettled_charge(charge)
        }

        fn get_charge(&self, charge_id: &ChargeId) -> StoreResult<Option<UnsettledCharge>> {
            self.0.get_charge(charge_id)
        }

        fn list_unsettled_charges(&self) -> StoreResult<Vec<UnsettledCharge>> {
            self.0.list_unsettled_charges()
        }

        fn update_charge_error(&self, charge_id: &ChargeId, error: &str) -> StoreResult<()> {
            self.0.update_charge_error(charge_id, error)
        }

        fn mark_charge_settled(&self, _: &ChargeId, _: DateTime<Utc>) -> StoreResult<bool> {
            Err(StoreError::Database("disk I/O error".into()))
        }

        fn is_healthy(&self) -> bool {
            self.0.is_healthy()
        }
    }

    #[tokio::test]
    async fn collected_charge_is_reported_even_if_ledger_write_fails() {
        let backend = Arc::new(MockBackend::new());
        let store = Arc::new(SettleFailsStore(SqliteStore::in_memory().unwrap()));
        store
            .record_unsettled_charge(&UnsettledCharge {
                charge_id: ChargeId::new("ovs-1"),
                session_id: SessionId::new("PS-1"),
                vehicle_number: None,
                fee_amount: Decimal::from(40),
                exited_at: at(12, 30),
                last_error: "timeout".into(),
                settled_at: None,
            })
            .unwrap();
        let coordinator = ExitTransactionCoordinator::new(backend.clone(), store.clone());

        let receipt = coordinator
            .collect_outstanding(&ChargeId::new("ovs-1"))
            .await
            .unwrap();

        assert!(receipt.is_collected);
        assert_eq!(backend.calls().collections.len(), 1);
        let audits = store.get_recent_audits(10).unwrap();
        assert!(
            audits
                .iter()
                .any(|a| matches!(a.event, AuditEventType::PaymentCollected { .. }))
        );
    }

    #[tokio::test]
    async fn manual_collection_settles_ledger_entry() {
        let (backend, store, coordinator) = setup();
        backend.set_exit_receipt(receipt_with_charge(40));
        backend.set_fail_collect(true);
        coordinator.execute(quote()).await.unwrap();

        // Still failing: charge stays in the ledger with the new error
        let err = coordinator
            .collect_outstanding(&ChargeId::new("ovs-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Backend(_)));
        assert_eq!(store.list_unsettled_charges().unwrap().len(), 1);

        backend.set_fail_collect(false);
        let receipt = coordinator
            .collect_outstanding(&ChargeId::new("ovs-1"))
            .await
            .unwrap();
        assert!(receipt.is_collected);
        assert!(store.list_unsettled_charges().unwrap().is_empty());

        // Already settled
        assert!(matches!(
            coordinator.collect_outstanding(&ChargeId::new("ovs-1")).await,
            Err(CoreError::ChargeNotFound(_))
        ));
    }
}
