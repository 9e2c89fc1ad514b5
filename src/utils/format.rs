//! Currency and date formatting shared by every message builder.

use chrono::{DateTime, Utc};

/// Rupees with two decimals, e.g. `₹1234.50`.
pub fn format_amount(amount: f64) -> String {
    format!("₹{:.2}", amount)
}

/// e.g. `05 Mar 2024`
pub fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%d %b %Y").to_string()
}

/// e.g. `05 Mar`
pub fn format_short_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%d %b").to_string()
}

/// e.g. `March 2024`
pub fn format_month(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "₹0.00");
        assert_eq!(format_amount(1234.5), "₹1234.50");
        assert_eq!(format_amount(99.999), "₹100.00");
    }

    #[test]
    fn test_format_dates() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 18, 30, 0).unwrap();
        assert_eq!(format_date(&ts), "05 Mar 2024");
        assert_eq!(format_short_date(&ts), "05 Mar");
        assert_eq!(format_month(&ts), "March 2024");
    }
}
