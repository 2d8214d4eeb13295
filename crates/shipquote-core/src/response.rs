use serde::{Deserialize, Serialize};

use crate::domain::{NormalizedRate, ProviderKind};
use crate::engine::{QuoteFailure, RateQuoteResult};

/// One selectable shipping option as rendered at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateOption {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub estimated_days: Option<u32>,
    pub carrier: String,
    pub service: String,
    pub provider: ProviderKind,
}

impl From<&NormalizedRate> for RateOption {
    fn from(rate: &NormalizedRate) -> Self {
        Self {
            id: rate.id.clone(),
            name: rate.display_name.clone(),
            description: rate.estimated_delivery_text.clone(),
            price: rate.price_amount,
            estimated_days: rate.transit_days,
            carrier: rate.carrier_name.clone(),
            service: rate.service_name.clone(),
            provider: rate.provider,
        }
    }
}

/// Wire response returned to the checkout collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuoteResponse {
    pub success: bool,
    pub rates: Vec<RateOption>,
    pub provider: ProviderKind,
    pub expected_provider: ProviderKind,
    pub total_quantity: u64,
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RateQuoteResponse {
    pub fn from_result(result: &RateQuoteResult) -> Self {
        Self {
            success: true,
            rates: result.rates.iter().map(RateOption::from).collect(),
            provider: result.provider_used,
            expected_provider: result.expected_provider,
            total_quantity: result.total_quantity,
            fallback_used: result.fallback_used,
            error: None,
        }
    }

    /// Failure response: no rates, and a customer-facing message only.
    pub fn from_failure(failure: &QuoteFailure, support_contact: &str) -> Self {
        Self {
            success: false,
            rates: Vec::new(),
            provider: failure
                .attempted_provider
                .unwrap_or(failure.expected_provider),
            expected_provider: failure.expected_provider,
            total_quantity: failure.total_quantity,
            fallback_used: false,
            error: Some(failure.user_message(support_contact)),
        }
    }

    pub fn from_outcome(
        outcome: &Result<RateQuoteResult, QuoteFailure>,
        support_contact: &str,
    ) -> Self {
        match outcome {
            Ok(result) => Self::from_result(result),
            Err(failure) => Self::from_failure(failure, support_contact),
        }
    }
}
