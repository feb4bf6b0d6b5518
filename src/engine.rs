use crate::meter_rent::lookup_meter_rent;
use crate::schema::*;
use crate::utils::round2;
use crate::{BillCalculationResult, TierBreakdown};
use log::debug;
use serde::{Deserialize, Serialize};

/// Zero-based position of the tier whose rate bills the whole volume for
/// rental customer classes.
pub const RENTAL_FLAT_TIER_INDEX: usize = 3;

/// Inputs for a single bill, alongside the tariff they are priced against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillRequest {
    /// Metered usage (m³). Drives VAT eligibility and the default
    /// base-charge and sewerage volumes.
    pub usage_m3: f64,
    /// Meter diameter in inches, used only for the rent lookup.
    pub meter_size: f64,
    pub sewerage_connection: SewerageConnection,
    #[serde(default)]
    pub sewerage_usage_m3: Option<f64>,
    /// Volume to price the base water charge on when it differs from the
    /// metered usage (e.g. a bulk meter billed on its delta).
    #[serde(default)]
    pub base_water_charge_usage_m3: Option<f64>,
    #[serde(default)]
    pub include_breakdown: bool,
}

impl BillRequest {
    pub fn new(usage_m3: f64, meter_size: f64, sewerage_connection: SewerageConnection) -> Self {
        Self {
            usage_m3,
            meter_size,
            sewerage_connection,
            sewerage_usage_m3: None,
            base_water_charge_usage_m3: None,
            include_breakdown: false,
        }
    }

    pub fn with_sewerage_usage(mut self, sewerage_usage_m3: f64) -> Self {
        self.sewerage_usage_m3 = Some(sewerage_usage_m3);
        self
    }

    pub fn with_base_charge_usage(mut self, base_water_charge_usage_m3: f64) -> Self {
        self.base_water_charge_usage_m3 = Some(base_water_charge_usage_m3);
        self
    }

    pub fn with_breakdown(mut self) -> Self {
        self.include_breakdown = true;
        self
    }

    pub fn base_charge_usage(&self) -> f64 {
        self.base_water_charge_usage_m3.unwrap_or(self.usage_m3)
    }

    pub fn sewerage_usage(&self) -> f64 {
        self.sewerage_usage_m3.unwrap_or(self.usage_m3)
    }
}

/// Charge for one schedule, with the slices that produced it.
#[derive(Debug, Clone, Default)]
pub struct TierCharge {
    pub amount: f64,
    pub slices: Vec<TierBreakdown>,
}

impl TierCharge {
    fn single(index: usize, tier: &TariffTier, units: f64) -> Self {
        let amount = units * tier.rate;
        Self {
            amount,
            slices: vec![TierBreakdown {
                tier_index: index,
                rate: tier.rate,
                limit: tier.limit,
                units,
                charge: amount,
            }],
        }
    }
}

/// Prices usage against one tariff. Tier lists are sorted by ascending
/// limit on construction; input order is not trusted.
pub struct BillCalculator<'a> {
    tariff: &'a TariffInfo,
    water_tiers: Vec<&'a TariffTier>,
    sewerage_tiers: Vec<&'a TariffTier>,
}

impl<'a> BillCalculator<'a> {
    pub fn new(tariff: &'a TariffInfo) -> Self {
        Self {
            tariff,
            water_tiers: sort_tiers(&tariff.tiers),
            sewerage_tiers: sort_tiers(&tariff.sewerage_tiers),
        }
    }

    pub fn tariff(&self) -> &TariffInfo {
        self.tariff
    }

    pub fn calculate(&self, request: &BillRequest) -> BillCalculationResult {
        let base_usage = request.base_charge_usage();

        if base_usage.is_nan() || base_usage < 0.0 || self.water_tiers.is_empty() {
            debug!(
                "Cannot bill {} tariff ({}) for usage {}: returning zero bill",
                self.tariff.customer_type, self.tariff.year, base_usage
            );
            return BillCalculationResult::zero();
        }

        let water = self.base_water_charge(base_usage);
        let maintenance_fee = self.tariff.maintenance_percentage * water.amount;
        let sanitation_fee = self.tariff.sanitation_percentage * water.amount;
        let vat_amount = self.vat_amount(water.amount, request.usage_m3);
        let meter_rent = self.meter_rent(request.meter_size);
        let sewerage = if request.sewerage_connection.is_connected() {
            self.sewerage_charge(request.sewerage_usage())
        } else {
            TierCharge::default()
        };

        let raw_total = water.amount
            + maintenance_fee
            + sanitation_fee
            + vat_amount
            + meter_rent
            + sewerage.amount;

        debug!(
            "{} bill for {} m³ (base on {} m³): water {:.4}, VAT {:.4}, rent {:.4}, sewerage {:.4}, total {:.4}",
            self.tariff.customer_type,
            request.usage_m3,
            base_usage,
            water.amount,
            vat_amount,
            meter_rent,
            sewerage.amount,
            raw_total
        );

        let (water_tier_breakdown, sewerage_tier_breakdown) = if request.include_breakdown {
            (
                Some(rounded_slices(water.slices)),
                Some(rounded_slices(sewerage.slices)),
            )
        } else {
            (None, None)
        };

        BillCalculationResult {
            total_bill: round2(raw_total),
            base_water_charge: round2(water.amount),
            maintenance_fee: round2(maintenance_fee),
            sanitation_fee: round2(sanitation_fee),
            vat_amount: round2(vat_amount),
            meter_rent: round2(meter_rent),
            sewerage_charge: round2(sewerage.amount),
            water_tier_breakdown,
            sewerage_tier_breakdown,
        }
    }

    /// Unrounded base water charge, selecting the tiering rule by customer class.
    pub fn base_water_charge(&self, usage_m3: f64) -> TierCharge {
        match self.tariff.customer_type {
            CustomerType::Domestic => progressive_charge(&self.water_tiers, usage_m3),
            CustomerType::RentalDomestic | CustomerType::RentalNonDomestic => {
                flat_rate_charge(&self.water_tiers, usage_m3)
            }
            CustomerType::NonDomestic => single_tier_charge(&self.water_tiers, usage_m3),
        }
    }

    /// Unrounded sewerage charge; zero when the tariff has no sewerage schedule.
    pub fn sewerage_charge(&self, usage_m3: f64) -> TierCharge {
        if self.sewerage_tiers.is_empty() {
            return TierCharge::default();
        }

        if self.tariff.customer_type.is_domestic_class() {
            progressive_charge(&self.sewerage_tiers, usage_m3)
        } else {
            single_tier_charge(&self.sewerage_tiers, usage_m3)
        }
    }

    /// VAT on the base water charge. Domestic classes only pay above the
    /// threshold; non-domestic classes always pay.
    pub fn vat_amount(&self, base_water_charge: f64, usage_m3: f64) -> f64 {
        let vat_due = if self.tariff.customer_type.is_domestic_class() {
            usage_m3 > self.tariff.domestic_vat_threshold_m3
        } else {
            true
        };

        if vat_due {
            base_water_charge * self.tariff.vat_rate
        } else {
            0.0
        }
    }

    pub fn meter_rent(&self, meter_size: f64) -> f64 {
        lookup_meter_rent(&self.tariff.meter_rent_prices, meter_size)
    }
}

/// Computes an itemized bill. Never fails: input that cannot be billed
/// yields an all-zero result.
pub fn calculate_bill(
    tariff: &TariffInfo,
    usage_m3: f64,
    meter_size: f64,
    sewerage_connection: SewerageConnection,
    sewerage_usage_m3: Option<f64>,
    base_water_charge_usage_m3: Option<f64>,
) -> BillCalculationResult {
    let request = BillRequest {
        usage_m3,
        meter_size,
        sewerage_connection,
        sewerage_usage_m3,
        base_water_charge_usage_m3,
        include_breakdown: false,
    };
    BillCalculator::new(tariff).calculate(&request)
}

pub fn sort_tiers(tiers: &[TariffTier]) -> Vec<&TariffTier> {
    let mut sorted: Vec<&TariffTier> = tiers.iter().collect();
    sorted.sort_by(|a, b| a.limit.as_f64().total_cmp(&b.limit.as_f64()));
    sorted
}

/// Splits usage across consecutive bands, each slice at its own rate.
///
/// Usage beyond the last bounded limit of a schedule with no unbounded tier
/// is not charged.
pub fn progressive_charge(tiers: &[&TariffTier], usage_m3: f64) -> TierCharge {
    let mut charge = TierCharge::default();
    if usage_m3.is_nan() || usage_m3 <= 0.0 {
        return charge;
    }

    let mut remaining = usage_m3;
    let mut last_limit = 0.0;

    for (index, tier) in tiers.iter().enumerate() {
        let block = (tier.limit.as_f64() - last_limit).max(0.0);
        let units = remaining.min(block);

        if units > 0.0 {
            let amount = units * tier.rate;
            charge.amount += amount;
            charge.slices.push(TierBreakdown {
                tier_index: index,
                rate: tier.rate,
                limit: tier.limit,
                units,
                charge: amount,
            });
        }

        remaining -= units;
        last_limit = tier.limit.as_f64();

        if remaining <= 0.0 {
            break;
        }
    }

    charge
}

/// Bills the whole volume at the rate of the first tier whose limit covers it.
/// Falls back to the last tier when no limit is high enough.
pub fn single_tier_charge(tiers: &[&TariffTier], usage_m3: f64) -> TierCharge {
    if usage_m3.is_nan() || usage_m3 <= 0.0 {
        return TierCharge::default();
    }

    let selected = tiers
        .iter()
        .position(|tier| tier.limit.covers(usage_m3))
        .or_else(|| tiers.len().checked_sub(1));

    match selected {
        Some(index) => TierCharge::single(index, tiers[index], usage_m3),
        None => TierCharge::default(),
    }
}

/// Bills the whole volume at the fourth tier's rate, or at the last tier's
/// rate when fewer than four tiers exist.
pub fn flat_rate_charge(tiers: &[&TariffTier], usage_m3: f64) -> TierCharge {
    if usage_m3.is_nan() || usage_m3 <= 0.0 || tiers.is_empty() {
        return TierCharge::default();
    }

    let index = if tiers.len() > RENTAL_FLAT_TIER_INDEX {
        RENTAL_FLAT_TIER_INDEX
    } else {
        tiers.len() - 1
    };

    TierCharge::single(index, tiers[index], usage_m3)
}

fn rounded_slices(slices: Vec<TierBreakdown>) -> Vec<TierBreakdown> {
    slices
        .into_iter()
        .map(|slice| TierBreakdown {
            charge: round2(slice.charge),
            ..slice
        })
        .collect()
}
