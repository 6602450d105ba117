//! Currency display

use rust_decimal::{Decimal, RoundingStrategy};

/// Exact currency amount. Never a binary float.
pub type Amount = Decimal;

/// Format an amount with a currency symbol and two decimal places.
pub fn format_amount(symbol: &str, amount: Amount) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{}{:.2}", symbol, rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_two_places() {
        assert_eq!(format_amount("₹", Decimal::from(90)), "₹90.00");
        assert_eq!(format_amount("$", Decimal::new(12345, 3)), "$12.35");
        assert_eq!(format_amount("", Decimal::new(5, 1)), "0.50");
    }
}
