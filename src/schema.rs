use crate::error::{BillingError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Upper bound of cumulative usage (m³) covered by a tier.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "TierLimitRepr", into = "TierLimitRepr")]
pub enum TierLimit {
    Bounded(f64),
    /// The last, open-ended band of a schedule.
    Unbounded,
}

impl TierLimit {
    pub fn is_unbounded(&self) -> bool {
        match self {
            TierLimit::Bounded(limit) => limit.is_infinite(),
            TierLimit::Unbounded => true,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            TierLimit::Bounded(limit) => *limit,
            TierLimit::Unbounded => f64::INFINITY,
        }
    }

    /// Whether a whole usage volume falls inside this tier's upper bound.
    pub fn covers(&self, usage_m3: f64) -> bool {
        self.as_f64() >= usage_m3
    }
}

impl fmt::Display for TierLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierLimit::Bounded(limit) if limit.is_finite() => write!(f, "{}", limit),
            _ => write!(f, "Infinity"),
        }
    }
}

/// Wire shape of a tier limit as the tariff store emits it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
enum TierLimitRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<TierLimitRepr> for TierLimit {
    type Error = BillingError;

    fn try_from(repr: TierLimitRepr) -> Result<Self> {
        match repr {
            TierLimitRepr::Number(value) => number_to_limit(value, &value.to_string()),
            TierLimitRepr::Text(text) => text.parse(),
        }
    }
}

impl From<TierLimit> for TierLimitRepr {
    fn from(limit: TierLimit) -> Self {
        match limit {
            TierLimit::Bounded(value) if value.is_finite() => TierLimitRepr::Number(value),
            _ => TierLimitRepr::Text("Infinity".to_string()),
        }
    }
}

impl FromStr for TierLimit {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("infinity") || trimmed.eq_ignore_ascii_case("inf") {
            return Ok(TierLimit::Unbounded);
        }

        let value: f64 = trimmed
            .parse()
            .map_err(|_| BillingError::InvalidTierLimit(s.to_string()))?;
        number_to_limit(value, s)
    }
}

fn number_to_limit(value: f64, original: &str) -> Result<TierLimit> {
    if value.is_nan() || value < 0.0 {
        return Err(BillingError::InvalidTierLimit(original.to_string()));
    }
    if value.is_infinite() {
        return Ok(TierLimit::Unbounded);
    }
    Ok(TierLimit::Bounded(value))
}

impl JsonSchema for TierLimit {
    fn schema_name() -> String {
        "TierLimit".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        TierLimitRepr::json_schema(gen)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TariffTier {
    #[schemars(description = "Charge per cubic metre for usage falling in this band")]
    pub rate: f64,

    #[schemars(
        description = "Upper bound of cumulative usage (m³) for this band. Use \"Infinity\" for the last, unbounded band."
    )]
    pub limit: TierLimit,
}

impl TariffTier {
    pub fn new(rate: f64, limit: TierLimit) -> Self {
        Self { rate, limit }
    }

    pub fn bounded(rate: f64, limit: f64) -> Self {
        Self::new(rate, TierLimit::Bounded(limit))
    }

    pub fn unbounded(rate: f64) -> Self {
        Self::new(rate, TierLimit::Unbounded)
    }
}

/// Sewerage schedules share the water tier shape.
pub type SewerageTier = TariffTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum CustomerType {
    #[serde(rename = "Domestic")]
    #[schemars(description = "Households, billed progressively across tiers")]
    Domestic,

    #[serde(rename = "Non-domestic")]
    #[schemars(
        description = "Businesses and institutions: the whole volume is billed at the rate of the first tier covering it"
    )]
    NonDomestic,

    #[serde(rename = "rental Non domestic")]
    #[schemars(description = "Rented business premises, billed flat at the fourth tier's rate")]
    RentalNonDomestic,

    #[serde(rename = "rental domestic")]
    #[schemars(description = "Rented households, billed flat at the fourth tier's rate")]
    RentalDomestic,
}

impl CustomerType {
    pub const ALL: [CustomerType; 4] = [
        CustomerType::Domestic,
        CustomerType::NonDomestic,
        CustomerType::RentalNonDomestic,
        CustomerType::RentalDomestic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Domestic => "Domestic",
            CustomerType::NonDomestic => "Non-domestic",
            CustomerType::RentalNonDomestic => "rental Non domestic",
            CustomerType::RentalDomestic => "rental domestic",
        }
    }

    /// Domestic classes only pay VAT above the usage threshold and are
    /// billed progressively for sewerage.
    pub fn is_domestic_class(&self) -> bool {
        matches!(self, CustomerType::Domestic | CustomerType::RentalDomestic)
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        CustomerType::ALL
            .into_iter()
            .find(|ct| ct.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| BillingError::UnknownCustomerType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum SewerageConnection {
    Yes,
    #[default]
    No,
}

impl SewerageConnection {
    pub fn is_connected(&self) -> bool {
        matches!(self, SewerageConnection::Yes)
    }
}

impl From<bool> for SewerageConnection {
    fn from(connected: bool) -> Self {
        if connected {
            SewerageConnection::Yes
        } else {
            SewerageConnection::No
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TariffInfo {
    #[schemars(description = "Customer class this rate configuration applies to")]
    pub customer_type: CustomerType,

    #[schemars(description = "Calendar year this rate configuration applies to")]
    pub year: i32,

    #[schemars(description = "Water usage rate schedule, one entry per band")]
    pub tiers: Vec<TariffTier>,

    #[serde(default)]
    #[schemars(
        description = "Sewerage usage rate schedule. Only used for customers with a sewerage connection."
    )]
    pub sewerage_tiers: Vec<SewerageTier>,

    #[schemars(description = "Fraction (0-1) of the base water charge billed as maintenance")]
    pub maintenance_percentage: f64,

    #[schemars(description = "Fraction (0-1) of the base water charge billed as sanitation")]
    pub sanitation_percentage: f64,

    #[schemars(description = "Fraction (0-1) of the base water charge billed as VAT when VAT is due")]
    pub vat_rate: f64,

    #[schemars(
        description = "Usage (m³) above which domestic classes pay VAT. Non-domestic classes always pay VAT."
    )]
    pub domestic_vat_threshold_m3: f64,

    #[serde(default)]
    #[schemars(
        description = "Flat monthly rent keyed by meter size label (e.g. \"0.5\", \"1\", \"3/4\")"
    )]
    pub meter_rent_prices: BTreeMap<String, f64>,
}

impl TariffInfo {
    /// Checks the configuration before it is handed to the calculator.
    ///
    /// The calculator never fails on bad input; it degrades to zero charges.
    /// Callers that need to tell a misconfigured tariff apart from a genuine
    /// zero bill run this first.
    pub fn validate(&self) -> Result<()> {
        self.check_fraction("maintenance_percentage", self.maintenance_percentage)?;
        self.check_fraction("sanitation_percentage", self.sanitation_percentage)?;
        self.check_fraction("vat_rate", self.vat_rate)?;
        self.check_amount(
            "domestic_vat_threshold_m3",
            self.domestic_vat_threshold_m3,
        )?;

        for (field, tiers) in [("tiers", &self.tiers), ("sewerage_tiers", &self.sewerage_tiers)] {
            for (idx, tier) in tiers.iter().enumerate() {
                self.check_amount(&format!("{}[{}].rate", field, idx), tier.rate)?;
                if tier.limit.as_f64().is_nan() || tier.limit.as_f64() < 0.0 {
                    return Err(self.invalid(
                        &format!("{}[{}].limit", field, idx),
                        format!("limit {} must be a non-negative number", tier.limit),
                    ));
                }
            }
        }

        for (label, rent) in &self.meter_rent_prices {
            self.check_amount(&format!("meter_rent_prices[{}]", label), *rent)?;
        }

        Ok(())
    }

    fn check_fraction(&self, field: &str, value: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(self.invalid(field, format!("{} must be between 0.0 and 1.0", value)));
        }
        Ok(())
    }

    fn check_amount(&self, field: &str, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid(field, format!("{} must be a finite, non-negative number", value)));
        }
        Ok(())
    }

    fn invalid(&self, field: &str, details: String) -> BillingError {
        BillingError::ValidationError {
            customer_type: self.customer_type,
            year: self.year,
            field: field.to_string(),
            details,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(TariffInfo)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
