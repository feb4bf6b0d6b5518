use crate::engine::{BillCalculator, BillRequest};
use crate::error::{BillingError, Result};
use crate::schema::{CustomerType, TariffInfo};
use crate::BillCalculationResult;
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Resolved tariffs, one per customer type and year.
#[derive(Debug, Clone, Default)]
pub struct TariffBook {
    tariffs: BTreeMap<(CustomerType, i32), TariffInfo>,
}

impl TariffBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tariff, returning the one it replaced for the same type and year.
    pub fn insert(&mut self, tariff: TariffInfo) -> Option<TariffInfo> {
        let key = (tariff.customer_type, tariff.year);
        let replaced = self.tariffs.insert(key, tariff);
        if replaced.is_some() {
            warn!("Replaced existing {} tariff for {}", key.0, key.1);
        }
        replaced
    }

    pub fn get(&self, customer_type: CustomerType, year: i32) -> Option<&TariffInfo> {
        self.tariffs.get(&(customer_type, year))
    }

    /// The tariff for `year`, or the most recent one configured before it.
    ///
    /// Opt-in for callers that carry a tariff forward; [`TariffBook::get`]
    /// and [`TariffBook::calculate`] never fall back.
    pub fn resolve_or_earlier(
        &self,
        customer_type: CustomerType,
        year: i32,
    ) -> Option<&TariffInfo> {
        let found = self
            .tariffs
            .range((customer_type, i32::MIN)..=(customer_type, year))
            .next_back()
            .map(|(_, tariff)| tariff);

        if let Some(tariff) = found {
            if tariff.year != year {
                debug!(
                    "No {} tariff for {}, falling back to {}",
                    customer_type, year, tariff.year
                );
            }
        }

        found
    }

    pub fn resolve_for_date(
        &self,
        customer_type: CustomerType,
        date: NaiveDate,
    ) -> Option<&TariffInfo> {
        self.get(customer_type, date.year())
    }

    /// Prices a request against the tariff configured for exactly `year`.
    ///
    /// Unlike the calculator, a missing tariff is an error here so callers
    /// can tell it apart from a genuine zero bill.
    pub fn calculate(
        &self,
        customer_type: CustomerType,
        year: i32,
        request: &BillRequest,
    ) -> Result<BillCalculationResult> {
        let tariff = self
            .get(customer_type, year)
            .ok_or(BillingError::TariffNotFound {
                customer_type,
                year,
            })?;

        Ok(BillCalculator::new(tariff).calculate(request))
    }

    pub fn years(&self, customer_type: CustomerType) -> Vec<i32> {
        self.tariffs
            .keys()
            .filter(|(ct, _)| *ct == customer_type)
            .map(|(_, year)| *year)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tariffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tariffs.is_empty()
    }
}

impl FromIterator<TariffInfo> for TariffBook {
    fn from_iter<I: IntoIterator<Item = TariffInfo>>(iter: I) -> Self {
        let mut book = TariffBook::new();
        for tariff in iter {
            book.insert(tariff);
        }
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SewerageConnection, TariffTier};

    fn tariff(customer_type: CustomerType, year: i32, rate: f64) -> TariffInfo {
        TariffInfo {
            customer_type,
            year,
            tiers: vec![TariffTier::unbounded(rate)],
            sewerage_tiers: vec![],
            maintenance_percentage: 0.0,
            sanitation_percentage: 0.0,
            vat_rate: 0.0,
            domestic_vat_threshold_m3: 15.0,
            meter_rent_prices: Default::default(),
        }
    }

    fn book() -> TariffBook {
        vec![
            tariff(CustomerType::Domestic, 2022, 4.0),
            tariff(CustomerType::Domestic, 2024, 6.0),
            tariff(CustomerType::NonDomestic, 2024, 9.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_exact_year_lookup() {
        let book = book();
        assert_eq!(book.len(), 3);
        assert_eq!(book.get(CustomerType::Domestic, 2024).unwrap().tiers[0].rate, 6.0);
        assert!(book.get(CustomerType::Domestic, 2023).is_none());
    }

    #[test]
    fn test_resolve_or_earlier_falls_back_to_earlier_year() {
        let book = book();
        assert_eq!(book.resolve_or_earlier(CustomerType::Domestic, 2023).unwrap().year, 2022);
        assert_eq!(book.resolve_or_earlier(CustomerType::Domestic, 2030).unwrap().year, 2024);
        assert!(book.resolve_or_earlier(CustomerType::Domestic, 2021).is_none());
        assert!(book.resolve_or_earlier(CustomerType::NonDomestic, 2023).is_none());
        assert!(book.resolve_or_earlier(CustomerType::RentalDomestic, 2024).is_none());
    }

    #[test]
    fn test_calculate_does_not_fall_back_to_earlier_year() {
        let book: TariffBook = vec![tariff(CustomerType::Domestic, 2019, 4.0)]
            .into_iter()
            .collect();
        let request = BillRequest::new(10.0, 0.5, SewerageConnection::No);

        assert!(matches!(
            book.calculate(CustomerType::Domestic, 2024, &request),
            Err(BillingError::TariffNotFound { year: 2024, .. })
        ));
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert!(book.resolve_for_date(CustomerType::Domestic, date).is_none());

        let result = book.calculate(CustomerType::Domestic, 2019, &request).unwrap();
        assert_eq!(result.base_water_charge, 40.0);
    }

    #[test]
    fn test_resolve_for_date() {
        let book = book();
        let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(
            book.resolve_for_date(CustomerType::Domestic, date).unwrap().year,
            2024
        );
    }

    #[test]
    fn test_calculate_missing_tariff_is_error() {
        let book = book();
        let request = BillRequest::new(10.0, 0.5, SewerageConnection::No);

        let result = book.calculate(CustomerType::Domestic, 2024, &request).unwrap();
        assert_eq!(result.base_water_charge, 60.0);

        match book.calculate(CustomerType::RentalNonDomestic, 2024, &request) {
            Err(BillingError::TariffNotFound { customer_type, year }) => {
                assert_eq!(customer_type, CustomerType::RentalNonDomestic);
                assert_eq!(year, 2024);
            }
            other => panic!("expected TariffNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_replaces_same_key() {
        let mut book = book();
        let replaced = book.insert(tariff(CustomerType::Domestic, 2024, 7.0));
        assert_eq!(replaced.unwrap().tiers[0].rate, 6.0);
        assert_eq!(book.len(), 3);
        assert_eq!(book.years(CustomerType::Domestic), vec![2022, 2024]);
    }
}
