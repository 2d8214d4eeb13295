use thiserror::Error;

use crate::domain::ProviderKind;

/// Validation errors raised while building a quote request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cart must contain at least one line")]
    EmptyCart,
    #[error("cart line {index} must have a quantity greater than zero")]
    ZeroQuantity { index: usize },
    #[error("address field '{field}' cannot be empty")]
    EmptyAddressField { field: &'static str },
    #[error("country must be a 2-letter ISO code: '{value}'")]
    InvalidCountry { value: String },

    #[error("tier table cannot be empty")]
    EmptyTierTable,
    #[error("tier '{name}' max quantity {max} must exceed the previous tier's {previous}")]
    TierOrdering {
        name: String,
        max: u64,
        previous: u64,
    },
    #[error("tier '{name}' must have positive weight and dimensions")]
    TierGeometry { name: String },

    #[error("freight class breakpoints must be strictly descending")]
    FreightClassOrdering,

    #[error("unknown parcel carrier '{value}', expected one of postal, commercial")]
    InvalidParcelCarrier { value: String },
}

/// Terminal errors surfaced by the rate engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuoteError {
    #[error("shipping provider {provider} is unavailable")]
    ProviderUnavailable { provider: ProviderKind },

    #[error("shipping provider {provider} returned no rates")]
    NoRatesReturned { provider: ProviderKind },

    #[error(
        "package weight {weight_lbs} lb exceeds the small-parcel limit of {limit_lbs} lb"
    )]
    WeightExceedsCarrierLimit { weight_lbs: f64, limit_lbs: f64 },

    #[error("destination address is invalid: {reason}")]
    InvalidAddress { reason: String },
}

impl QuoteError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable { .. } => "quote.provider_unavailable",
            Self::NoRatesReturned { .. } => "quote.no_rates",
            Self::WeightExceedsCarrierLimit { .. } => "quote.weight_exceeds_limit",
            Self::InvalidAddress { .. } => "quote.invalid_address",
        }
    }

    /// Customer-facing text. Never includes carrier payloads.
    pub fn user_message(&self, support_contact: &str) -> String {
        match self {
            Self::ProviderUnavailable { .. } => format!(
                "We couldn't retrieve shipping rates right now. Please try again in a few \
                 minutes, or contact {support_contact} for help."
            ),
            Self::NoRatesReturned { .. } => format!(
                "No shipping options are available for this address. Please check the \
                 address or contact {support_contact} for a quote."
            ),
            Self::WeightExceedsCarrierLimit { .. } => format!(
                "This order is too heavy to ship as a parcel and freight rates are unavailable \
                 right now. Please contact {support_contact} to request a manual freight quote."
            ),
            Self::InvalidAddress { .. } => String::from(
                "We couldn't quote shipping to this address. Please check the street, city, \
                 state and ZIP code and try again.",
            ),
        }
    }
}

/// Configuration errors raised while loading settings or assembling an engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(String),

    #[error("missing required configuration: {0}")]
    MissingRequired(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_message_points_customer_at_support() {
        let error = QuoteError::WeightExceedsCarrierLimit {
            weight_lbs: 600.0,
            limit_lbs: 70.0,
        };

        let message = error.user_message("support@example.test");
        assert!(message.contains("support@example.test"));
        assert!(message.contains("manual freight quote"));
        assert!(!message.contains("600"));
    }

    #[test]
    fn codes_are_stable() {
        let error = QuoteError::NoRatesReturned {
            provider: ProviderKind::Freight,
        };
        assert_eq!(error.code(), "quote.no_rates");
    }
}
