use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Shipping path that produced a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    SmallParcel,
    Freight,
}

impl ProviderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SmallParcel => "SMALL_PARCEL",
            Self::Freight => "FREIGHT",
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appended to the display name of rates served by the small-parcel fallback.
pub const FALLBACK_LABEL: &str = "(parcel fallback - freight unavailable)";

/// Carrier-agnostic priced shipping option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRate {
    pub id: String,
    pub carrier_name: String,
    pub service_name: String,
    /// Zero means "contact for quote", never "free".
    pub price_amount: f64,
    pub currency: String,
    pub transit_days: Option<u32>,
    pub guaranteed_delivery: Option<bool>,
    pub provider: ProviderKind,
    pub display_name: String,
    pub estimated_delivery_text: String,
}

impl NormalizedRate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        carrier_name: impl Into<String>,
        service_name: impl Into<String>,
        price_amount: f64,
        currency: impl Into<String>,
        transit_days: Option<u32>,
        guaranteed_delivery: Option<bool>,
        provider: ProviderKind,
    ) -> Self {
        let carrier_name = carrier_name.into();
        let service_name = service_name.into();
        let price_amount = if price_amount.is_finite() && price_amount > 0.0 {
            price_amount
        } else {
            0.0
        };

        Self {
            id: id.into(),
            display_name: format!("{carrier_name} {service_name}"),
            estimated_delivery_text: delivery_text(price_amount, transit_days, guaranteed_delivery),
            carrier_name,
            service_name,
            price_amount,
            currency: currency.into(),
            transit_days,
            guaranteed_delivery,
            provider,
        }
    }

    pub fn is_contact_for_quote(&self) -> bool {
        self.price_amount == 0.0
    }

    pub fn mark_fallback(&mut self) {
        if !self.is_fallback() {
            self.display_name = format!("{} {FALLBACK_LABEL}", self.display_name);
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.display_name.ends_with(FALLBACK_LABEL)
    }
}

fn delivery_text(price: f64, transit_days: Option<u32>, guaranteed: Option<bool>) -> String {
    if price == 0.0 {
        return String::from("Contact us for a quote");
    }

    match (transit_days, guaranteed) {
        (Some(1), Some(true)) => String::from("Guaranteed delivery in 1 business day"),
        (Some(days), Some(true)) => format!("Guaranteed delivery in {days} business days"),
        (Some(1), _) => String::from("Estimated delivery in 1 business day"),
        (Some(days), _) => format!("Estimated delivery in {days} business days"),
        (None, _) => String::from("Delivery estimate unavailable"),
    }
}

/// Orders rates by ascending price with zero-priced rates last.
///
/// The sort is stable: equal prices, and all zero-priced rates, keep input order.
pub fn sort_rates(rates: &mut [NormalizedRate]) {
    rates.sort_by(|left, right| {
        match (left.is_contact_for_quote(), right.is_contact_for_quote()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => left.price_amount.total_cmp(&right.price_amount),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(id: &str, price: f64) -> NormalizedRate {
        NormalizedRate::new(
            id,
            "Carrier",
            "Ground",
            price,
            "USD",
            Some(3),
            None,
            ProviderKind::Freight,
        )
    }

    fn ids(rates: &[NormalizedRate]) -> Vec<&str> {
        rates.iter().map(|rate| rate.id.as_str()).collect()
    }

    #[test]
    fn zero_price_sorts_last() {
        let mut rates = vec![rate("a", 12.0), rate("b", 0.0), rate("c", 8.0)];
        sort_rates(&mut rates);

        assert_eq!(ids(&rates), vec!["c", "a", "b"]);
    }

    #[test]
    fn zero_priced_rates_keep_input_order() {
        let mut rates = vec![rate("z1", 0.0), rate("x", 5.0), rate("z2", 0.0), rate("z3", 0.0)];
        sort_rates(&mut rates);

        assert_eq!(ids(&rates), vec!["x", "z1", "z2", "z3"]);
    }

    #[test]
    fn equal_prices_are_stable() {
        let mut rates = vec![rate("first", 9.5), rate("second", 9.5), rate("cheap", 1.0)];
        sort_rates(&mut rates);

        assert_eq!(ids(&rates), vec!["cheap", "first", "second"]);
    }

    #[test]
    fn negative_or_nan_price_is_treated_as_contact_for_quote() {
        assert!(rate("neg", -4.0).is_contact_for_quote());
        assert!(rate("nan", f64::NAN).is_contact_for_quote());
    }

    #[test]
    fn fallback_marking_is_idempotent() {
        let mut value = rate("a", 10.0);
        value.mark_fallback();
        value.mark_fallback();

        assert!(value.is_fallback());
        assert_eq!(value.display_name.matches(FALLBACK_LABEL).count(), 1);
    }

    #[test]
    fn delivery_text_reflects_guarantee() {
        let guaranteed = NormalizedRate::new(
            "g",
            "C",
            "Air",
            30.0,
            "USD",
            Some(2),
            Some(true),
            ProviderKind::SmallParcel,
        );
        assert_eq!(guaranteed.estimated_delivery_text, "Guaranteed delivery in 2 business days");
        assert_eq!(rate("q", 0.0).estimated_delivery_text, "Contact us for a quote");
    }
}
