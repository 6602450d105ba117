//! Core events emitted by the console

use parkdesk_util::{ChargeId, SessionId};
use rust_decimal::Decimal;

use crate::ExitStateKind;

/// Which refresh cycle an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    Sessions,
    Dashboard,
}

/// Events emitted by the console for operator-facing views
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A refresh replaced a snapshot
    Refreshed { source: RefreshSource, count: usize },

    /// A refresh failed; the previous snapshot is still shown
    RefreshFailed { source: RefreshSource, error: String },

    /// A new entry was accepted
    EntryLogged {
        session_id: SessionId,
        vehicle_number: String,
    },

    /// An exit attempt reached a terminal state
    ExitCompleted {
        session_id: SessionId,
        state: ExitStateKind,
        amount_due: Decimal,
    },

    /// A ledger charge was collected by the operator
    ChargeCollected { charge_id: ChargeId },
}
