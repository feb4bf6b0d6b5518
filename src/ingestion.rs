use crate::error::{BillingError, Result};
use crate::schema::{CustomerType, TariffInfo, TariffTier};
use crate::tariff_book::TariffBook;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A numeric column as the hosted database returns it: `numeric` columns
/// frequently come back as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericColumn {
    Number(f64),
    Text(String),
}

impl NumericColumn {
    pub fn to_f64(&self, field: &str) -> Result<f64> {
        match self {
            NumericColumn::Number(value) => Ok(*value),
            NumericColumn::Text(text) => {
                text.trim()
                    .parse()
                    .map_err(|_| BillingError::InvalidNumber {
                        field: field.to_string(),
                        value: text.clone(),
                    })
            }
        }
    }
}

/// One row of the tariffs table before conversion into a [`TariffInfo`].
///
/// JSON columns may hold the structure itself or a JSON-encoded string of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffRecord {
    pub customer_type: String,
    pub year: i32,
    #[serde(default)]
    pub tiers: Value,
    #[serde(default)]
    pub sewerage_tiers: Value,
    pub maintenance_percentage: NumericColumn,
    pub sanitation_percentage: NumericColumn,
    pub vat_rate: NumericColumn,
    pub domestic_vat_threshold_m3: NumericColumn,
    #[serde(default)]
    pub meter_rent_prices: Value,
}

impl TariffRecord {
    pub fn into_tariff_info(self) -> Result<TariffInfo> {
        let customer_type: CustomerType = self.customer_type.parse()?;

        let tiers: Vec<TariffTier> = decode_json_column("tiers", self.tiers)?;
        let sewerage_tiers: Vec<TariffTier> =
            decode_json_column("sewerage_tiers", self.sewerage_tiers)?;
        let raw_rents: BTreeMap<String, NumericColumn> =
            decode_json_column("meter_rent_prices", self.meter_rent_prices)?;

        let meter_rent_prices = raw_rents
            .into_iter()
            .map(|(label, rent)| {
                let value = rent.to_f64(&format!("meter_rent_prices[{}]", label))?;
                Ok((label, value))
            })
            .collect::<Result<BTreeMap<String, f64>>>()?;

        debug!(
            "Ingested {} tariff for {}: {} water tiers, {} sewerage tiers, {} meter sizes",
            customer_type,
            self.year,
            tiers.len(),
            sewerage_tiers.len(),
            meter_rent_prices.len()
        );

        Ok(TariffInfo {
            customer_type,
            year: self.year,
            tiers,
            sewerage_tiers,
            maintenance_percentage: self.maintenance_percentage.to_f64("maintenance_percentage")?,
            sanitation_percentage: self.sanitation_percentage.to_f64("sanitation_percentage")?,
            vat_rate: self.vat_rate.to_f64("vat_rate")?,
            domestic_vat_threshold_m3: self
                .domestic_vat_threshold_m3
                .to_f64("domestic_vat_threshold_m3")?,
            meter_rent_prices,
        })
    }
}

/// Decodes a JSON column that may be null, a JSON-encoded string, or the
/// value itself. Null and blank strings decode to the type's default.
fn decode_json_column<T>(column: &str, value: Value) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    let malformed = |e: serde_json::Error| BillingError::MalformedRecord {
        column: column.to_string(),
        details: e.to_string(),
    };

    match value {
        Value::Null => Ok(T::default()),
        Value::String(encoded) if encoded.trim().is_empty() => Ok(T::default()),
        Value::String(encoded) => serde_json::from_str(&encoded).map_err(malformed),
        other => serde_json::from_value(other).map_err(malformed),
    }
}

pub fn convert_records_to_book(records: &[TariffRecord]) -> Result<TariffBook> {
    let mut book = TariffBook::new();

    for record in records {
        book.insert(record.clone().into_tariff_info()?);
    }

    info!(
        "Converted {} tariff records into {} tariffs",
        records.len(),
        book.len()
    );

    Ok(book)
}
