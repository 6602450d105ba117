//! Plain-text rendering of console views

use parkdesk_api::{HistoryPage, format_amount};
use parkdesk_core::{DashboardSummary, ExitQuote, ExitState, ExitTransaction, RefreshStatus, SessionView};
use parkdesk_store::UnsettledCharge;
use parkdesk_util::{format_clock_time, format_datetime_full, format_duration, format_hours};
use std::fmt::Write;

pub fn session_table(views: &[SessionView], filter: &str) -> String {
    let mut out = String::new();

    if views.is_empty() {
        if filter.trim().is_empty() {
            let _ = writeln!(out, "No vehicles parked.");
        } else {
            let _ = writeln!(out, "No vehicles match {:?}.", filter.trim());
        }
        return out;
    }

    let _ = writeln!(
        out,
        "{:<12} {:<12} {:<6} {:<11} {:>6} {:>8} {:>5}  {}",
        "SESSION", "PLATE", "TYPE", "PHONE", "IN", "ELAPSED", "BASE", "STATUS"
    );
    for view in views {
        let s = &view.session;
        let base = view
            .effective_base_hours
            .map(|h| format!("{h}h"))
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{:<12} {:<12} {:<6} {:<11} {:>6} {:>7}h {:>5}  {}",
            s.session_id.as_str(),
            s.plate(),
            s.vehicle_type.class_label(),
            s.driver_phone,
            format_clock_time(&s.entry_time),
            format_hours(view.elapsed_hours),
            base,
            if view.is_overstay { "OVERSTAY" } else { "ok" }
        );
    }
    let overstays = views.iter().filter(|v| v.is_overstay).count();
    let _ = writeln!(out, "{} parked, {} overstaying", views.len(), overstays);
    out
}

pub fn dashboard_panel(summary: &DashboardSummary, symbol: &str) -> String {
    let mut out = String::new();
    let t = &summary.trusted;
    let d = &summary.derived;

    let _ = writeln!(out, "Today's overview");
    let _ = writeln!(
        out,
        "  Occupancy   {}/{} ({}%)",
        d.active_count,
        d.capacity,
        d.occupancy_rounded()
    );
    let classes: Vec<String> = d
        .class_histogram
        .iter()
        .map(|c| format!("{} {}", c.label, c.count))
        .collect();
    let _ = writeln!(out, "  By class    {}", classes.join(", "));
    let _ = writeln!(out, "  Overstaying {}", d.overstay_count);
    let _ = writeln!(out, "  Exits today {}", t.completed_today);
    let _ = writeln!(out, "  Base fees   {}", format_amount(symbol, t.base_fees_collected));
    let _ = writeln!(out, "  Overstay    {}", format_amount(symbol, t.overstay_fees_collected));
    let _ = writeln!(out, "  Revenue     {}", format_amount(symbol, t.total_revenue_today));
    out
}

pub fn refresh_footer(label: &str, status: &RefreshStatus) -> String {
    let updated = status
        .refreshed_at
        .as_ref()
        .map(format_clock_time)
        .unwrap_or_else(|| "never".into());
    match &status.last_error {
        Some(error) => format!("{label}: last updated {updated} (refresh failed: {error})"),
        None => format!("{label}: last updated {updated}"),
    }
}

pub fn quote_panel(quote: &ExitQuote, symbol: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Exit {} ({}, {})",
        quote.session_id,
        quote.vehicle_number.as_deref().unwrap_or("NO PLATE"),
        quote.vehicle_type
    );
    let _ = writeln!(out, "  Entered     {}", format_datetime_full(&quote.entry_time));
    let _ = writeln!(
        out,
        "  Duration    {} ({}h billed)",
        format_duration(quote.quoted_at - quote.entry_time),
        quote.actual_duration_hours
    );
    let _ = writeln!(out, "  Base        {}h included", quote.effective_base_hours);
    let _ = writeln!(out, "  Base fee    {} (paid at entry)", format_amount(symbol, quote.base_fee));
    if quote.has_overstay() {
        let _ = writeln!(
            out,
            "  Overstay    {}h = {}",
            quote.overstay_hours,
            format_amount(symbol, quote.overstay_fee)
        );
    }
    let _ = writeln!(out, "  Total       {}", format_amount(symbol, quote.total_cost));
    let _ = writeln!(out, "  Collect now {}", format_amount(symbol, quote.balance_due));
    out
}

pub fn exit_result(tx: &ExitTransaction, symbol: &str) -> String {
    let mut out = String::new();
    match tx.state() {
        ExitState::Settled { .. } => {
            let _ = writeln!(out, "Exit complete for {}.", tx.quote.session_id);
        }
        ExitState::PaymentOutstanding { charge, error } => {
            let _ = writeln!(
                out,
                "Vehicle exited, but overstay payment of {} was NOT collected: {error}",
                format_amount(symbol, charge.fee_amount)
            );
            let _ = writeln!(
                out,
                "Recorded as unsettled. Collect later with: parkdesk reconcile --collect {}",
                charge.id
            );
        }
        ExitState::Failed { error } => {
            let _ = writeln!(
                out,
                "Exit failed, vehicle is still parked: {error}. Safe to retry."
            );
        }
        ExitState::Quoted | ExitState::ExitedPendingPayment => {
            let _ = writeln!(out, "Exit incomplete ({:?}).", tx.kind());
        }
    }

    if let Some(receipt) = &tx.receipt {
        let _ = writeln!(
            out,
            "  Charged total {}, overstay {}",
            format_amount(symbol, receipt.total_amount),
            format_amount(symbol, receipt.overstay_fee)
        );
        if let Some(drift) = tx.quote_drift().filter(|d| !d.is_zero()) {
            let _ = writeln!(
                out,
                "  Note: service assessed {} vs quoted {} ({:+})",
                format_amount(symbol, receipt.overstay_fee),
                format_amount(symbol, tx.quote.balance_due),
                drift
            );
        }
    }
    out
}

pub fn history_table(page: &HistoryPage, page_no: u32, page_size: u32, symbol: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<12} {:<6} {:<19} {:<19} {:<9} {:>10}",
        "SESSION", "PLATE", "TYPE", "ENTRY", "EXIT", "STATUS", "TOTAL"
    );
    for r in &page.records {
        let _ = writeln!(
            out,
            "{:<12} {:<12} {:<6} {:<19} {:<19} {:<9} {:>10}",
            r.session_id.as_str(),
            r.vehicle_number.as_deref().unwrap_or("-"),
            r.vehicle_type.class_label(),
            format_datetime_full(&r.entry_time),
            r.exit_time
                .as_ref()
                .map(format_datetime_full)
                .unwrap_or_else(|| "-".into()),
            r.status.as_deref().unwrap_or("-"),
            r.total_amount
                .map(|a| format_amount(symbol, a))
                .unwrap_or_else(|| "-".into())
        );
    }
    let _ = writeln!(
        out,
        "Page {} of {} ({} records)",
        page_no,
        page.total_pages(page_size).max(1),
        page.total_count
    );
    out
}

pub fn ledger_table(charges: &[UnsettledCharge], symbol: &str) -> String {
    let mut out = String::new();
    if charges.is_empty() {
        let _ = writeln!(out, "No unsettled charges.");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<14} {:<12} {:<12} {:>10} {:<19}  {}",
        "CHARGE", "SESSION", "PLATE", "FEE", "EXITED", "LAST ERROR"
    );
    for c in charges {
        let _ = writeln!(
            out,
            "{:<14} {:<12} {:<12} {:>10} {:<19}  {}",
            c.charge_id.as_str(),
            c.session_id.as_str(),
            c.vehicle_number.as_deref().unwrap_or("-"),
            format_amount(symbol, c.fee_amount),
            format_datetime_full(&c.exited_at),
            c.last_error
        );
    }
    out
}
