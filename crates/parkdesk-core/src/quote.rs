//! Exit quotes
//!
//! A quote is a pure function of (session, rule, now). Any partial hour is
//! billed as a full hour. The base fee is prepaid at entry, so only the
//! overstay fee is due at exit.

use chrono::{DateTime, Utc};
use parkdesk_api::{PricingRule, VehicleSession, VehicleType};
use parkdesk_util::SessionId;
use rust_decimal::Decimal;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// A computed, not-yet-committed exit amount
#[derive(Debug, Clone, PartialEq)]
pub struct ExitQuote {
    pub session_id: SessionId,
    pub vehicle_number: Option<String>,
    pub vehicle_type: VehicleType,
    pub entry_time: DateTime<Utc>,
    /// The frozen `now` this quote was computed at
    pub quoted_at: DateTime<Utc>,
    pub actual_duration_hours: u32,
    pub effective_base_hours: u32,
    pub overstay_hours: u32,
    pub base_fee: Decimal,
    pub overstay_fee: Decimal,
    pub total_cost: Decimal,
    pub balance_due: Decimal,
}

impl ExitQuote {
    pub fn has_overstay(&self) -> bool {
        self.overstay_hours > 0
    }
}

/// Billable hours between entry and `now`, rounded up.
///
/// A `now` before the entry (clock skew) bills zero hours.
pub fn billable_hours(entry_time: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let elapsed_ms = now.signed_duration_since(entry_time).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }
    let hours = elapsed_ms.div_euclid(MILLIS_PER_HOUR)
        + i64::from(elapsed_ms.rem_euclid(MILLIS_PER_HOUR) > 0);
    u32::try_from(hours).unwrap_or(u32::MAX)
}

/// Base hours the session is entitled to: the rule's default or the
/// declared duration, whichever is longer.
pub fn effective_base_hours(session: &VehicleSession, rule: &PricingRule) -> u32 {
    rule.base_hours
        .max(session.declared_duration_hours.unwrap_or(0))
}

/// Compute the exit quote for a session at a frozen `now`.
pub fn compute_quote(session: &VehicleSession, rule: &PricingRule, now: DateTime<Utc>) -> ExitQuote {
    let actual_duration_hours = billable_hours(session.entry_time, now);
    let effective_base_hours = effective_base_hours(session, rule);
    let overstay_hours = actual_duration_hours.saturating_sub(effective_base_hours);

    let overstay_fee = Decimal::from(overstay_hours) * rule.extra_hour_rate;
    let total_cost = rule.base_fee + overstay_fee;

    ExitQuote {
        session_id: session.session_id.clone(),
        vehicle_number: session.vehicle_number.clone(),
        vehicle_type: session.vehicle_type.clone(),
        entry_time: session.entry_time,
        quoted_at: now,
        actual_duration_hours,
        effective_base_hours,
        overstay_hours,
        base_fee: rule.base_fee,
        overstay_fee,
        total_cost,
        balance_due: overstay_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Duration;

    #[test]
    fn partial_hour_rounds_up() {
        assert_eq!(billable_hours(at(10, 0), at(11, 1)), 2);
        assert_eq!(billable_hours(at(10, 0), at(11, 0)), 1);
        assert_eq!(billable_hours(at(10, 0), at(10, 0) + Duration::milliseconds(1)), 1);
        assert_eq!(billable_hours(at(10, 0), at(10, 0)), 0);
    }

    #[test]
    fn clock_skew_bills_zero() {
        assert_eq!(billable_hours(at(10, 0), at(9, 30)), 0);

        let s = session("A", "car", at(10, 0));
        let quote = compute_quote(&s, &rule("car", 50, 2, 20), at(9, 30));
        assert_eq!(quote.actual_duration_hours, 0);
        assert_eq!(quote.overstay_fee, Decimal::ZERO);
        assert_eq!(quote.total_cost, Decimal::from(50));
    }

    #[test]
    fn declared_overstay_example() {
        let mut s = session("A", "car", at(9, 0));
        s.declared_duration_hours = Some(2);

        let quote = compute_quote(&s, &rule("car", 50, 2, 20), at(12, 30));
        assert_eq!(quote.actual_duration_hours, 4);
        assert_eq!(quote.effective_base_hours, 2);
        assert_eq!(quote.overstay_hours, 2);
        assert_eq!(quote.overstay_fee, Decimal::from(40));
        assert_eq!(quote.total_cost, Decimal::from(90));
        assert_eq!(quote.balance_due, Decimal::from(40));
        assert_eq!(quote.quoted_at, at(12, 30));
        assert!(quote.has_overstay());
    }

    #[test]
    fn undeclared_within_base_hours() {
        let s = session("A", "car", at(9, 0));

        let quote = compute_quote(&s, &rule("car", 50, 2, 20), at(10, 30));
        assert_eq!(quote.actual_duration_hours, 2);
        assert_eq!(quote.effective_base_hours, 2);
        assert_eq!(quote.overstay_hours, 0);
        assert_eq!(quote.balance_due, Decimal::ZERO);
        assert!(!quote.has_overstay());
    }

    #[test]
    fn longer_declaration_extends_base() {
        let mut s = session("A", "car", at(8, 0));
        s.declared_duration_hours = Some(5);

        let quote = compute_quote(&s, &rule("car", 50, 2, 20), at(13, 10));
        assert_eq!(quote.actual_duration_hours, 6);
        assert_eq!(quote.effective_base_hours, 5);
        assert_eq!(quote.overstay_hours, 1);
        assert_eq!(quote.balance_due, Decimal::from(20));
    }

    #[test]
    fn shorter_declaration_never_reduces_base() {
        let mut s = session("A", "car", at(8, 0));
        s.declared_duration_hours = Some(1);

        let quote = compute_quote(&s, &rule("car", 50, 3, 20), at(10, 45));
        assert_eq!(quote.effective_base_hours, 3);
        assert_eq!(quote.overstay_hours, 0);
    }

    #[test]
    fn overstay_never_negative_and_balance_matches_fee() {
        let r = rule("bike", 20, 2, 10);
        for minutes in [0i64, 30, 119, 120, 121, 600, 1441] {
            let s = session("A", "bike", at(0, 0));
            let quote = compute_quote(&s, &r, at(0, 0) + Duration::minutes(minutes));
            let entitled = quote.actual_duration_hours <= quote.effective_base_hours;
            assert_eq!(quote.overstay_hours == 0, entitled, "minutes={minutes}");
            assert_eq!(quote.balance_due, quote.overstay_fee);
            assert_eq!(quote.total_cost, quote.base_fee + quote.overstay_fee);
        }
    }
}
