//! Value formatting shared by the providers.

use chrono::NaiveDate;

/// Format a date for a field of `width` columns.
///
/// 8 → `YYYYMMDD`, 10 → `DD/MM/YYYY`, 6 → `DDMMYY`, 14 → `YYYYMMDD000000`;
/// other widths truncate the 8-column form.
pub fn format_date(date: NaiveDate, width: usize) -> String {
    let text = match width {
        6 => date.format("%d%m%y").to_string(),
        10 => date.format("%d/%m/%Y").to_string(),
        14 => format!("{}000000", date.format("%Y%m%d")),
        _ => date.format("%Y%m%d").to_string(),
    };
    text.chars().take(width).collect()
}

/// Digits of `integer` followed by `scale` digits of `fraction`, the implied
/// decimal point form used by positional feeds.
pub fn implied_decimal(integer: u64, fraction: u64, scale: u8) -> String {
    if scale == 0 {
        return integer.to_string();
    }
    let scale = usize::from(scale);
    let fraction = fraction.to_string();
    let fraction: String = fraction.chars().take(scale).collect();
    format!("{integer}{fraction:0>scale$}")
}

/// Largest value with `digits` decimal digits, capped to keep `u64` arithmetic safe.
pub fn max_for_digits(digits: usize) -> u64 {
    10u64.pow(digits.min(18) as u32).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_by_width() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(format_date(date, 8), "20240309");
        assert_eq!(format_date(date, 10), "09/03/2024");
        assert_eq!(format_date(date, 6), "090324");
        assert_eq!(format_date(date, 4), "2024");
    }

    #[test]
    fn implied_decimals() {
        assert_eq!(implied_decimal(12, 5, 2), "1205");
        assert_eq!(implied_decimal(1, 0, 2), "100");
        assert_eq!(implied_decimal(7, 3, 0), "7");
        assert_eq!(max_for_digits(3), 999);
    }
}
