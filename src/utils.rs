/// Tolerance used when comparing meter sizes parsed from free-form labels.
pub const SIZE_TOLERANCE: f64 = 1e-9;

/// Rounds a monetary amount to 2 decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Parses a meter size label as typed by administrators into inches.
///
/// Accepts decimals (`"0.75"`), integers (`"1"`), fractions (`"3/4"`) and
/// mixed numbers (`"1 1/4"`, `"1-1/4"`). Unit decorations such as `"`, `in`
/// or `inch` are ignored.
///
/// # Examples
/// - `"3/4\""` → 0.75
/// - `"1 1/2 inch"` → 1.5
/// - `"large"` → None
pub fn parse_size_label(label: &str) -> Option<f64> {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_digit() || c == '.' || c == '/' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    match tokens.as_slice() {
        [single] => parse_number(single),
        [whole, fraction] if !whole.contains('/') && fraction.contains('/') => {
            Some(parse_number(whole)? + parse_number(fraction)?)
        }
        _ => None,
    }
}

fn parse_number(token: &str) -> Option<f64> {
    let value = match token.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: f64 = numerator.parse().ok()?;
            let denominator: f64 = denominator.parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => token.parse().ok()?,
    };

    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(117.0 * 0.01), 1.17);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(2.345_000_1), 2.35);
    }

    #[test]
    fn test_parse_size_label() {
        assert_eq!(parse_size_label("0.75"), Some(0.75));
        assert_eq!(parse_size_label("1"), Some(1.0));
        assert_eq!(parse_size_label("3/4"), Some(0.75));
        assert_eq!(parse_size_label("3/4\""), Some(0.75));
        assert_eq!(parse_size_label("1 1/4"), Some(1.25));
        assert_eq!(parse_size_label("1-1/2 inch"), Some(1.5));
        assert_eq!(parse_size_label("2 in"), Some(2.0));
    }

    #[test]
    fn test_parse_size_label_rejects_unparseable() {
        assert_eq!(parse_size_label("large"), None);
        assert_eq!(parse_size_label(""), None);
        assert_eq!(parse_size_label("1/0"), None);
        assert_eq!(parse_size_label("1 2 3"), None);
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(0.1 + 0.2, 0.3, SIZE_TOLERANCE));
        assert!(!approx_eq(0.5, 0.75, SIZE_TOLERANCE));
    }
}
