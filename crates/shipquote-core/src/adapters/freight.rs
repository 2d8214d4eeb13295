use std::sync::Arc;

use serde::Deserialize;
use time::macros::format_description;
use time::{Date, Weekday};
use tracing::info;
use uuid::Uuid;

use crate::adapters::{decode, CarrierGateway};
use crate::carrier::{CarrierAdapter, CarrierError, CarrierId, CartContext, RatesFuture};
use crate::clock::Clock;
use crate::domain::{
    Address, FreightClassTable, FreightItem, NormalizedRate, PackageTier, ProviderKind,
};
use crate::http_client::HttpRequest;

/// LTL freight adapter.
///
/// Converts the tier into one [`FreightItem`] and submits an origin to
/// destination quote with a next-business-day pickup.
pub struct LtlFreightAdapter {
    gateway: CarrierGateway,
    base_url: String,
    origin: Address,
    freight_classes: FreightClassTable,
    clock: Arc<dyn Clock>,
}

impl LtlFreightAdapter {
    pub fn new(
        gateway: CarrierGateway,
        base_url: impl Into<String>,
        origin: Address,
        freight_classes: FreightClassTable,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            origin,
            freight_classes,
            clock,
        }
    }

    fn pickup_date(&self) -> Result<String, CarrierError> {
        let today = self.clock.now().date();
        let pickup = next_business_day(today).ok_or_else(|| {
            CarrierError::invalid_request(self.id(), "no business day after the current date")
        })?;
        pickup
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|error| CarrierError::invalid_request(self.id(), error.to_string()))
    }

    fn quote_request(
        &self,
        destination: &Address,
        tier: &PackageTier,
        cart: &CartContext,
    ) -> Result<HttpRequest, CarrierError> {
        let item = FreightItem::from_tier(tier, &self.freight_classes);
        let body = serde_json::json!({
            "quoteRequestId": cart.request_id,
            "pickupDate": self.pickup_date()?,
            "origin": location(&self.origin),
            "destination": location(destination),
            "items": [item],
        });

        HttpRequest::post(format!("{}/api/v1/quotes", self.base_url))
            .with_json(&body)
            .map_err(|error| CarrierError::invalid_request(self.id(), error.message()))
    }
}

impl CarrierAdapter for LtlFreightAdapter {
    fn id(&self) -> CarrierId {
        CarrierId::LtlFreight
    }

    fn get_rates<'a>(
        &'a self,
        address: &'a Address,
        tier: &'a PackageTier,
        cart: &'a CartContext,
    ) -> RatesFuture<'a> {
        Box::pin(async move {
            let carrier = self.id();
            let request = self.quote_request(address, tier, cart)?;
            let response = self.gateway.send(request).await?;
            let payload: FreightQuoteResponse = decode(carrier, &response)?;

            if payload.carrier_prices.is_empty() {
                return Err(CarrierError::no_rates(carrier));
            }

            let rates: Vec<NormalizedRate> = payload
                .carrier_prices
                .into_iter()
                .map(normalize_price)
                .collect();
            info!(
                %carrier,
                quote_id = payload.quote_id.as_deref().unwrap_or("-"),
                count = rates.len(),
                "freight rates received"
            );
            Ok(rates)
        })
    }
}

/// First weekday strictly after `today`.
pub fn next_business_day(today: Date) -> Option<Date> {
    let mut day = today.next_day()?;
    while matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday) {
        day = day.next_day()?;
    }
    Some(day)
}

fn location(address: &Address) -> serde_json::Value {
    serde_json::json!({
        "postalCode": address.postal_code_5(),
        "city": address.city,
        "region": address.region_code(),
        "country": address.country_code(),
    })
}

fn normalize_price(price: CarrierPrice) -> NormalizedRate {
    let id = price
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    NormalizedRate::new(
        format!("freight-{id}"),
        price.carrier_name,
        price.service_level.unwrap_or_else(|| String::from("Standard LTL")),
        price.total.unwrap_or(0.0),
        price.currency.unwrap_or_else(|| String::from("USD")),
        price.transit_days,
        price.is_guaranteed,
        ProviderKind::Freight,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreightQuoteResponse {
    #[serde(default)]
    quote_id: Option<String>,
    #[serde(default)]
    carrier_prices: Vec<CarrierPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarrierPrice {
    #[serde(default)]
    id: Option<String>,
    carrier_name: String,
    #[serde(default)]
    service_level: Option<String>,
    #[serde(default)]
    total: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    transit_days: Option<u32>,
    #[serde(default)]
    is_guaranteed: Option<bool>,
}
