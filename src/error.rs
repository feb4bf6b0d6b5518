use crate::schema::CustomerType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Unknown customer type: {0}")]
    UnknownCustomerType(String),

    #[error("Invalid tier limit '{0}': expected a non-negative number or \"Infinity\"")]
    InvalidTierLimit(String),

    #[error("Invalid numeric value for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("Invalid {field} for {customer_type} tariff ({year}): {details}")]
    ValidationError {
        customer_type: CustomerType,
        year: i32,
        field: String,
        details: String,
    },

    #[error("No tariff configured for {customer_type} in {year}")]
    TariffNotFound {
        customer_type: CustomerType,
        year: i32,
    },

    #[error("Malformed tariff record column {column}: {details}")]
    MalformedRecord { column: String, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
