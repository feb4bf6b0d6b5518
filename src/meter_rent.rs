use crate::utils::{approx_eq, parse_size_label, SIZE_TOLERANCE};
use log::debug;
use std::collections::BTreeMap;

/// Rent table keyed by free-form meter size labels.
pub type MeterRentPrices = BTreeMap<String, f64>;

/// One way of matching a numeric meter size to a rent table entry.
pub type RentLookupStrategy = fn(&MeterRentPrices, f64) -> Option<f64>;

/// Labels administrators commonly use for fractional meter sizes.
pub const FRACTION_LABELS: [(f64, &str); 5] = [
    (0.5, "1/2"),
    (0.75, "3/4"),
    (1.25, "1 1/4"),
    (1.5, "1 1/2"),
    (2.5, "2 1/2"),
];

/// Strategies tried in order until one yields a rent.
pub const LOOKUP_STRATEGIES: [(&str, RentLookupStrategy); 3] = [
    ("exact label", exact_label),
    ("numeric label", numeric_label),
    ("fraction label", fraction_label),
];

/// Resolves the monthly rent for a meter size, or 0.0 when no entry matches.
pub fn lookup_meter_rent(prices: &MeterRentPrices, meter_size: f64) -> f64 {
    for (name, strategy) in LOOKUP_STRATEGIES {
        if let Some(rent) = strategy(prices, meter_size) {
            debug!("Meter rent for size {} resolved by {} match: {}", meter_size, name, rent);
            return rent;
        }
    }

    debug!("No meter rent entry matches size {}", meter_size);
    0.0
}

/// Matches the label a number formats to, e.g. `0.5` → `"0.5"`, `1.0` → `"1"`.
pub fn exact_label(prices: &MeterRentPrices, meter_size: f64) -> Option<f64> {
    prices.get(&meter_size.to_string()).copied()
}

/// Parses every label as a number and takes the first equal to the size.
pub fn numeric_label(prices: &MeterRentPrices, meter_size: f64) -> Option<f64> {
    prices.iter().find_map(|(label, rent)| {
        parse_size_label(label)
            .filter(|size| approx_eq(*size, meter_size, SIZE_TOLERANCE))
            .map(|_| *rent)
    })
}

/// Last-resort match on the conventional fraction labels. Since
/// [`numeric_label`] already parses fractions and mixed numbers, this only
/// acts as a safety net when that parsing misses a label.
pub fn fraction_label(prices: &MeterRentPrices, meter_size: f64) -> Option<f64> {
    FRACTION_LABELS
        .iter()
        .find(|(size, _)| approx_eq(*size, meter_size, SIZE_TOLERANCE))
        .and_then(|(_, label)| prices.get(*label).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(entries: &[(&str, f64)]) -> MeterRentPrices {
        entries
            .iter()
            .map(|(label, rent)| (label.to_string(), *rent))
            .collect()
    }

    #[test]
    fn test_exact_label_match() {
        let table = prices(&[("0.5", 37.0), ("0.75", 45.0)]);
        assert_eq!(lookup_meter_rent(&table, 0.5), 37.0);
        assert_eq!(lookup_meter_rent(&table, 0.75), 45.0);
    }

    #[test]
    fn test_integer_size_matches_integer_label() {
        let table = prices(&[("1", 60.0), ("2", 90.0)]);
        assert_eq!(exact_label(&table, 1.0), Some(60.0));
        assert_eq!(lookup_meter_rent(&table, 2.0), 90.0);
    }

    #[test]
    fn test_numeric_label_match() {
        let table = prices(&[("3/4\"", 45.0), ("1 1/4 inch", 80.0), ("1.0", 60.0)]);
        assert_eq!(exact_label(&table, 0.75), None);
        assert_eq!(lookup_meter_rent(&table, 0.75), 45.0);
        assert_eq!(lookup_meter_rent(&table, 1.25), 80.0);
        assert_eq!(lookup_meter_rent(&table, 1.0), 60.0);
    }

    #[test]
    fn test_fraction_label_table() {
        let table = prices(&[("1 1/2", 70.0)]);
        assert_eq!(fraction_label(&table, 1.5), Some(70.0));
        assert_eq!(fraction_label(&table, 2.5), None);
    }

    #[test]
    fn test_fraction_labels_also_parse_numerically() {
        for (size, label) in FRACTION_LABELS {
            let table = prices(&[(label, 50.0)]);
            assert_eq!(numeric_label(&table, size), Some(50.0), "{}", label);
            assert_eq!(fraction_label(&table, size), Some(50.0), "{}", label);
        }
    }

    #[test]
    fn test_no_match_is_zero() {
        let table = prices(&[("0.5", 37.0), ("0.75", 45.0)]);
        assert_eq!(lookup_meter_rent(&table, 2.0), 0.0);
        assert_eq!(lookup_meter_rent(&MeterRentPrices::new(), 0.5), 0.0);
    }

    #[test]
    fn test_unparseable_labels_are_skipped() {
        let table = prices(&[("commercial", 500.0), ("half inch", 37.0), ("1/2", 35.0)]);
        assert_eq!(lookup_meter_rent(&table, 0.5), 35.0);
        assert_eq!(lookup_meter_rent(&table, 4.0), 0.0);
    }
}
