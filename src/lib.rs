//! # Water Billing Engine
//!
//! A library for computing itemized water and sewerage bills from tiered
//! tariff configurations.
//!
//! ## Core Concepts
//!
//! - **Tariff**: The rate configuration for one customer type and year ([`TariffInfo`])
//! - **Progressive tiering**: Domestic usage is split across bands, each slice billed at its own rate
//! - **Single-rate tiering**: Non-domestic usage is billed entirely at the rate of the first band covering it
//! - **Rental flat rate**: Rental classes are billed entirely at the fourth band's rate
//! - **Degraded bills**: Input that cannot be billed yields an all-zero result rather than an error
//!
//! ## Example
//!
//! ```rust
//! use water_billing_engine::*;
//!
//! let tariff = TariffInfo {
//!     customer_type: CustomerType::Domestic,
//!     year: 2024,
//!     tiers: vec![
//!         TariffTier::bounded(5.0, 5.0),
//!         TariffTier::bounded(8.0, 14.0),
//!         TariffTier::unbounded(10.0),
//!     ],
//!     sewerage_tiers: vec![],
//!     maintenance_percentage: 0.01,
//!     sanitation_percentage: 0.07,
//!     vat_rate: 0.15,
//!     domestic_vat_threshold_m3: 15.0,
//!     meter_rent_prices: [("0.5".to_string(), 37.0)].into_iter().collect(),
//! };
//!
//! let bill = calculate_bill(&tariff, 16.0, 0.5, SewerageConnection::No, None, None);
//! assert_eq!(bill.base_water_charge, 117.0);
//! assert_eq!(bill.total_bill, 180.91);
//! ```

pub mod engine;
pub mod error;
pub mod ingestion;
pub mod meter_rent;
pub mod schema;
pub mod tariff_book;
pub mod utils;

pub use engine::{calculate_bill, BillCalculator, BillRequest};
pub use error::{BillingError, Result};
pub use ingestion::{convert_records_to_book, NumericColumn, TariffRecord};
pub use meter_rent::lookup_meter_rent;
pub use schema::*;
pub use tariff_book::TariffBook;
pub use utils::round2;

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One tier's share of a charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TierBreakdown {
    /// Position of the tier after sorting by ascending limit
    pub tier_index: usize,
    pub rate: f64,
    pub limit: TierLimit,
    /// Cubic metres billed at this tier's rate
    pub units: f64,
    pub charge: f64,
}

/// An itemized bill. Every amount is non-negative and rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillCalculationResult {
    /// Sum of the unrounded components, rounded once
    pub total_bill: f64,
    pub base_water_charge: f64,
    pub maintenance_fee: f64,
    pub sanitation_fee: f64,
    pub vat_amount: f64,
    pub meter_rent: f64,
    pub sewerage_charge: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_tier_breakdown: Option<Vec<TierBreakdown>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sewerage_tier_breakdown: Option<Vec<TierBreakdown>>,
}

impl BillCalculationResult {
    /// The result for input that cannot be billed.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.total_bill == 0.0
            && self.base_water_charge == 0.0
            && self.maintenance_fee == 0.0
            && self.sanitation_fee == 0.0
            && self.vat_amount == 0.0
            && self.meter_rent == 0.0
            && self.sewerage_charge == 0.0
    }

    /// Sum of the rounded components. May differ from `total_bill` by a few
    /// cents, since the total is rounded from the unrounded components.
    pub fn component_sum(&self) -> f64 {
        self.base_water_charge
            + self.maintenance_fee
            + self.sanitation_fee
            + self.vat_amount
            + self.meter_rent
            + self.sewerage_charge
    }
}

pub struct BillingProcessor;

impl BillingProcessor {
    /// Validates the tariff, then prices the request against it.
    pub fn process(tariff: &TariffInfo, request: &BillRequest) -> Result<BillCalculationResult> {
        tariff.validate()?;

        info!(
            "Calculating bill with {} tariff for {}",
            tariff.customer_type, tariff.year
        );
        debug!(
            "Tariff has {} water tiers, {} sewerage tiers and {} meter rent entries",
            tariff.tiers.len(),
            tariff.sewerage_tiers.len(),
            tariff.meter_rent_prices.len()
        );

        let result = BillCalculator::new(tariff).calculate(request);

        if result.is_zero() {
            debug!("Bill degraded to zero for usage {} m³", request.usage_m3);
        }

        Ok(result)
    }
}

pub fn process_bill(tariff: &TariffInfo, request: &BillRequest) -> Result<BillCalculationResult> {
    BillingProcessor::process(tariff, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tariff() -> TariffInfo {
        TariffInfo {
            customer_type: CustomerType::NonDomestic,
            year: 2024,
            tiers: vec![
                TariffTier::bounded(6.0, 5.0),
                TariffTier::bounded(9.0, 14.0),
                TariffTier::unbounded(12.0),
            ],
            sewerage_tiers: vec![TariffTier::unbounded(2.0)],
            maintenance_percentage: 0.01,
            sanitation_percentage: 0.07,
            vat_rate: 0.15,
            domestic_vat_threshold_m3: 15.0,
            meter_rent_prices: BTreeMap::from([("1".to_string(), 60.0)]),
        }
    }

    #[test]
    fn test_end_to_end_processing() {
        let request = BillRequest::new(20.0, 1.0, SewerageConnection::Yes);
        let result = process_bill(&tariff(), &request).unwrap();

        assert_eq!(result.base_water_charge, 240.0);
        assert_eq!(result.maintenance_fee, 2.4);
        assert_eq!(result.sanitation_fee, 16.8);
        assert_eq!(result.vat_amount, 36.0);
        assert_eq!(result.meter_rent, 60.0);
        assert_eq!(result.sewerage_charge, 40.0);
        assert!((result.total_bill - 395.2).abs() < 0.001);
        assert!((result.total_bill - result.component_sum()).abs() < 0.01);
    }

    #[test]
    fn test_processing_rejects_invalid_tariff() {
        let mut tariff = tariff();
        tariff.maintenance_percentage = 1.5;

        let request = BillRequest::new(20.0, 1.0, SewerageConnection::No);
        assert!(matches!(
            BillingProcessor::process(&tariff, &request),
            Err(BillingError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let request = BillRequest::new(3.0, 1.0, SewerageConnection::No);
        let result = process_bill(&tariff(), &request).unwrap();

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"totalBill\""));
        assert!(json.contains("\"baseWaterCharge\""));
        assert!(json.contains("\"vatAmount\""));
        assert!(!json.contains("waterTierBreakdown"));
    }

    #[test]
    fn test_zero_result() {
        let zero = BillCalculationResult::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.component_sum(), 0.0);
        assert!(zero.water_tier_breakdown.is_none());
    }
}
