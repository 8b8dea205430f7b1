/// Convert a raw integer balance into a human-readable decimal string.
///
/// The raw string is a base-10 integer in the token's smallest unit.
/// Trailing zeros in the fractional part are trimmed; a raw value shorter
/// than `decimals + 1` digits is left-padded with zeros first.
pub fn format_balance(raw: &str, decimals: u32) -> String {
    if raw.is_empty() || raw == "0" {
        return "0".to_string();
    }

    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw),
    };

    let mut digits = digits.to_string();
    while digits.len() <= decimals as usize {
        digits.insert(0, '0');
    }

    if decimals == 0 {
        return format!("{sign}{digits}");
    }

    let split = digits.len() - decimals as usize;
    let int_part = &digits[..split];
    let frac_part = digits[split..].trim_end_matches('0');

    if frac_part.is_empty() {
        format!("{sign}{int_part}")
    } else {
        format!("{sign}{int_part}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_unit() {
        assert_eq!(format_balance("1000000", 6), "1");
    }

    #[test]
    fn full_fraction() {
        assert_eq!(format_balance("1234567", 6), "1.234567");
    }

    #[test]
    fn trailing_zeros_trimmed() {
        assert_eq!(format_balance("1200000", 6), "1.2");
    }

    #[test]
    fn zero() {
        assert_eq!(format_balance("0", 6), "0");
        assert_eq!(format_balance("", 18), "0");
    }

    #[test]
    fn shorter_than_decimals_is_padded() {
        assert_eq!(format_balance("1", 6), "0.000001");
        assert_eq!(format_balance("123", 6), "0.000123");
    }

    #[test]
    fn zero_decimals() {
        assert_eq!(format_balance("42", 0), "42");
    }

    #[test]
    fn eighteen_decimals() {
        assert_eq!(format_balance("1000000000000000000", 18), "1");
        assert_eq!(format_balance("1500000000000000000", 18), "1.5");
    }

    #[test]
    fn negative_balance() {
        assert_eq!(format_balance("-1500000", 6), "-1.5");
    }
}
