//! Locale-tolerant decimal parsing.
//!
//! Source files mix `12.5` and `12,5` for the same column. A single
//! comma (or a comma to the right of every period) is the decimal
//! separator; any other `,`/`.` is a digit group separator.

/// Parse a decimal string written with either `.` or `,` as the decimal separator.
///
/// Rules, applied after stripping whitespace:
/// - both `,` and `.` present: the rightmost one is the decimal separator,
///   the other is a group separator (`1.234,5` and `1,234.5` are both 1234.5);
/// - only `,` present: one comma is the decimal separator (`-23,55` is -23.55),
///   several are group separators (`1,234,567`);
/// - only `.` present: one period is the decimal separator, several are
///   group separators.
///
/// Non-finite results (`NaN`, `inf`) are rejected.
pub fn parse_locale_decimal(raw: &str) -> Result<f64, String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();

    if compact.is_empty() {
        return Err("empty value".to_string());
    }

    let normalized = normalize_separators(&compact);

    let value: f64 = normalized
        .parse()
        .map_err(|_| format!("not a decimal number: {:?}", raw))?;

    if !value.is_finite() {
        return Err(format!("not a finite number: {:?}", raw));
    }

    Ok(value)
}

/// Rewrites `compact` so that `.` is the only (optional) decimal separator.
fn normalize_separators(compact: &str) -> String {
    let last_comma = compact.rfind(',');
    let last_period = compact.rfind('.');

    let decimal = match (last_comma, last_period) {
        (Some(c), Some(p)) => Some(if c > p { ',' } else { '.' }),
        (Some(_), None) if compact.matches(',').count() == 1 => Some(','),
        (None, Some(_)) if compact.matches('.').count() == 1 => Some('.'),
        _ => None,
    };

    let decimal_pos = match decimal {
        Some(',') => last_comma,
        Some(_) => last_period,
        None => None,
    };

    compact
        .char_indices()
        .filter_map(|(i, c)| match c {
            ',' | '.' if Some(i) == decimal_pos => Some('.'),
            ',' | '.' => None,
            other => Some(other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_decimals() {
        assert_eq!(parse_locale_decimal("12.5"), Ok(12.5));
        assert_eq!(parse_locale_decimal("-9"), Ok(-9.0));
        assert_eq!(parse_locale_decimal(" 7.25 "), Ok(7.25));
    }

    #[test]
    fn test_comma_decimal_separator() {
        assert_eq!(parse_locale_decimal("38,7223"), Ok(38.7223));
        assert_eq!(parse_locale_decimal("-9,1393"), Ok(-9.1393));
    }

    #[test]
    fn test_grouping_separators() {
        assert_eq!(parse_locale_decimal("1.234,5"), Ok(1234.5));
        assert_eq!(parse_locale_decimal("1,234.5"), Ok(1234.5));
        assert_eq!(parse_locale_decimal("1,234,567"), Ok(1234567.0));
        assert_eq!(parse_locale_decimal("1.234.567"), Ok(1234567.0));
        assert_eq!(parse_locale_decimal("1 234,5"), Ok(1234.5));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_locale_decimal("").is_err());
        assert!(parse_locale_decimal("abc").is_err());
        assert!(parse_locale_decimal("NaN").is_err());
        assert!(parse_locale_decimal("inf").is_err());
    }
}
