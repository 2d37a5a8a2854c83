// Free-text numeric input: invalid amounts become None (or 0), never an error

/// Parse a user-typed amount like "1,234.50", "$900" or " 12.5 "
pub fn coerce_amount(input: &str) -> Option<f64> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn coerce_amount_or_zero(input: &str) -> f64 {
    coerce_amount(input).unwrap_or(0.0)
}

/// Optional amount field: blank or garbage both mean "not set"
pub fn coerce_optional_amount(input: Option<&str>) -> Option<f64> {
    input.and_then(coerce_amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_amount() {
        assert_eq!(coerce_amount("900"), Some(900.0));
        assert_eq!(coerce_amount(" 1,234.50 "), Some(1234.5));
        assert_eq!(coerce_amount("$250"), Some(250.0));
        assert_eq!(coerce_amount("-10.5"), Some(-10.5));
        assert_eq!(coerce_amount(""), None);
        assert_eq!(coerce_amount("abc"), None);
        assert_eq!(coerce_amount("NaN"), None);
        assert_eq!(coerce_amount("inf"), None);
    }

    #[test]
    fn test_coerce_defaults() {
        assert_eq!(coerce_amount_or_zero("nope"), 0.0);
        assert_eq!(coerce_amount_or_zero("3.5"), 3.5);
        assert_eq!(coerce_optional_amount(None), None);
        assert_eq!(coerce_optional_amount(Some("  ")), None);
        assert_eq!(coerce_optional_amount(Some("42")), Some(42.0));
    }
}
