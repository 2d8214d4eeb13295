use serde::Deserialize;
use tracing::{info, warn};

use crate::adapters::{decode, leading_days, CarrierGateway};
use crate::carrier::{CarrierAdapter, CarrierError, CarrierId, CartContext, RatesFuture};
use crate::domain::{Address, NormalizedRate, PackageTier, ProviderKind};
use crate::http_client::HttpRequest;

const CARRIER_NAME: &str = "UPS";

/// Commercial small-parcel adapter.
///
/// Issues a single "Shop" request that prices every service the carrier
/// offers for the package, then maps service codes to readable names.
pub struct CommercialParcelAdapter {
    gateway: CarrierGateway,
    base_url: String,
    origin: Address,
}

impl CommercialParcelAdapter {
    pub fn new(gateway: CarrierGateway, base_url: impl Into<String>, origin: Address) -> Self {
        Self {
            gateway,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            origin,
        }
    }

    fn shop_request(
        &self,
        destination: &Address,
        tier: &PackageTier,
        cart: &CartContext,
    ) -> Result<HttpRequest, CarrierError> {
        let dims = tier.dimensions_in;
        let body = serde_json::json!({
            "RateRequest": {
                "Request": { "RequestOption": "Shop" },
                "Shipment": {
                    "Shipper": { "Name": self.origin.name, "Address": wire_address(&self.origin) },
                    "ShipFrom": { "Name": self.origin.name, "Address": wire_address(&self.origin) },
                    "ShipTo": { "Name": destination.name, "Address": wire_address(destination) },
                    "Package": {
                        "PackagingType": { "Code": "02" },
                        "Dimensions": {
                            "UnitOfMeasurement": { "Code": "IN" },
                            "Length": format_measure(dims.length),
                            "Width": format_measure(dims.width),
                            "Height": format_measure(dims.height),
                        },
                        "PackageWeight": {
                            "UnitOfMeasurement": { "Code": "LBS" },
                            "Weight": format_measure(tier.weight_lbs),
                        },
                    },
                },
            },
        });

        Ok(HttpRequest::post(format!("{}/api/rating/v2403/Shop", self.base_url))
            .with_json(&body)
            .map_err(|error| CarrierError::invalid_request(self.id(), error.message()))?
            .with_header("transId", cart.request_id.simple().to_string())
            .with_header("transactionSrc", "shipquote"))
    }
}

impl CarrierAdapter for CommercialParcelAdapter {
    fn id(&self) -> CarrierId {
        CarrierId::CommercialParcel
    }

    fn get_rates<'a>(
        &'a self,
        address: &'a Address,
        tier: &'a PackageTier,
        cart: &'a CartContext,
    ) -> RatesFuture<'a> {
        Box::pin(async move {
            let carrier = self.id();
            let request = self.shop_request(address, tier, cart)?;
            let response = self.gateway.send(request).await?;
            let payload: ShopResponse = decode(carrier, &response)?;

            let rates: Vec<NormalizedRate> = payload
                .rate_response
                .rated_shipment
                .into_vec()
                .into_iter()
                .filter_map(normalize_shipment)
                .collect();
            if rates.is_empty() {
                return Err(CarrierError::no_rates(carrier));
            }

            info!(%carrier, count = rates.len(), "commercial parcel rates received");
            Ok(rates)
        })
    }
}

fn wire_address(address: &Address) -> serde_json::Value {
    serde_json::json!({
        "AddressLine": [address.street],
        "City": address.city,
        "StateProvinceCode": address.region_code(),
        "PostalCode": address.postal_code_5(),
        "CountryCode": address.country_code(),
    })
}

fn format_measure(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

pub fn service_name(code: &str) -> Option<&'static str> {
    match code {
        "01" => Some("Next Day Air"),
        "02" => Some("2nd Day Air"),
        "03" => Some("Ground"),
        "12" => Some("3 Day Select"),
        "13" => Some("Next Day Air Saver"),
        "14" => Some("Next Day Air Early"),
        "59" => Some("2nd Day Air A.M."),
        _ => None,
    }
}

fn normalize_shipment(shipment: RatedShipment) -> Option<NormalizedRate> {
    let code = shipment.service.code;
    let charges = shipment
        .negotiated_rate_charges
        .map(|negotiated| negotiated.total_charge)
        .unwrap_or(shipment.total_charges);

    let price = match charges.monetary_value.trim().parse::<f64>() {
        Ok(price) => price,
        Err(_) => {
            warn!(service_code = %code, "skipping rated service with unreadable charge");
            return None;
        }
    };
    let transit_days = shipment
        .guaranteed_delivery
        .as_ref()
        .and_then(|guaranteed| guaranteed.business_days_in_transit.as_deref())
        .and_then(leading_days);
    let name = service_name(&code)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Service {code}"));

    Some(NormalizedRate::new(
        format!("commercial-{code}"),
        CARRIER_NAME,
        name,
        price,
        charges.currency_code,
        transit_days,
        shipment.guaranteed_delivery.map(|_| true),
        ProviderKind::SmallParcel,
    ))
}

#[derive(Debug, Deserialize)]
struct ShopResponse {
    #[serde(rename = "RateResponse")]
    rate_response: RateResponse,
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    #[serde(rename = "RatedShipment", default)]
    rated_shipment: OneOrMany<RatedShipment>,
}

/// The carrier collapses single-element arrays into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RatedShipment {
    service: ServiceCode,
    total_charges: Charges,
    #[serde(default)]
    negotiated_rate_charges: Option<NegotiatedCharges>,
    #[serde(default)]
    guaranteed_delivery: Option<GuaranteedDelivery>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceCode {
    code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Charges {
    #[serde(default = "default_currency")]
    currency_code: String,
    monetary_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NegotiatedCharges {
    total_charge: Charges,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GuaranteedDelivery {
    #[serde(default)]
    business_days_in_transit: Option<String>,
}

fn default_currency() -> String {
    String::from("USD")
}
