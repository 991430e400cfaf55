//! Utility functions for formatting and common operations
//!
//! Centralized formatting of currency values for consistent CLI display.

use rust_decimal::Decimal;

/// Format a value as dollars with thousands separators: "$1,234.56".
///
/// # Examples
/// ```
/// use worth::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
/// assert_eq!(format_currency(dec!(-500)), "$-500.00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0)
}

/// Format as dollars, right-aligned to the given width (0 for no padding).
///
/// # Examples
/// ```
/// use worth::utils::format_currency_with_width;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency_with_width(dec!(100), 12), "     $100.00");
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize) -> String {
    let is_negative = value < Decimal::ZERO;
    let abs_value = value.abs();

    let formatted = format!("{:.2}", abs_value);
    let parts: Vec<&str> = formatted.split('.').collect();

    let integer_part = parts[0];
    let decimal_part = parts.get(1).unwrap_or(&"00");

    // Insert thousands separators into the integer part
    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let result = format!("${}{}.{}", sign, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}
