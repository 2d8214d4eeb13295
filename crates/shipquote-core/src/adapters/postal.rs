use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::adapters::{decode, leading_days, CarrierGateway};
use crate::carrier::{CarrierAdapter, CarrierError, CarrierId, CartContext, RatesFuture};
use crate::domain::{Address, NormalizedRate, PackageTier, ProviderKind};
use crate::http_client::HttpRequest;

pub const DEFAULT_PRIMARY_MAIL_CLASS: &str = "USPS_GROUND_ADVANTAGE";
pub const DEFAULT_ALTERNATE_MAIL_CLASSES: [&str; 3] =
    ["PRIORITY_MAIL", "PRIORITY_MAIL_EXPRESS", "PARCEL_SELECT"];

const CARRIER_NAME: &str = "USPS";

/// Postal small-parcel adapter.
///
/// Quotes the primary mail class first. When that class comes back empty the
/// alternate classes are queried concurrently, each under its own timeout, and
/// every rate they return is merged.
#[derive(Clone)]
pub struct PostalParcelAdapter {
    gateway: Arc<CarrierGateway>,
    base_url: String,
    origin: Address,
    primary_mail_class: String,
    alternate_mail_classes: Vec<String>,
}

impl PostalParcelAdapter {
    pub fn new(gateway: CarrierGateway, base_url: impl Into<String>, origin: Address) -> Self {
        Self {
            gateway: Arc::new(gateway),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            origin,
            primary_mail_class: String::from(DEFAULT_PRIMARY_MAIL_CLASS),
            alternate_mail_classes: DEFAULT_ALTERNATE_MAIL_CLASSES
                .iter()
                .map(|class| (*class).to_owned())
                .collect(),
        }
    }

    pub fn with_mail_classes(
        mut self,
        primary: impl Into<String>,
        alternates: impl IntoIterator<Item = String>,
    ) -> Self {
        self.primary_mail_class = primary.into();
        self.alternate_mail_classes = alternates.into_iter().collect();
        self
    }

    fn search_url(&self) -> String {
        format!("{}/prices/v3/total-rates/search", self.base_url)
    }

    async fn fan_out(
        &self,
        destination: &Address,
        tier: &PackageTier,
        cart: &CartContext,
    ) -> Vec<NormalizedRate> {
        let per_call = Duration::from_millis(self.gateway.timeout_ms());
        let mut tasks = JoinSet::new();
        for (position, mail_class) in self.alternate_mail_classes.iter().enumerate() {
            let adapter = self.clone();
            let destination = destination.clone();
            let tier = tier.clone();
            let cart = *cart;
            let mail_class = mail_class.clone();
            tasks.spawn(async move {
                let outcome = tokio::time::timeout(
                    per_call,
                    adapter.query_class(&destination, &tier, &cart, &mail_class),
                )
                .await;
                (position, mail_class, outcome)
            });
        }

        let mut answered = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, mail_class, Ok(Ok(rates)))) => {
                    debug!(%mail_class, count = rates.len(), "alternate mail class answered");
                    answered.push((position, rates));
                }
                Ok((_, mail_class, Ok(Err(error)))) => {
                    warn!(%mail_class, code = error.code(), "alternate mail class failed");
                }
                Ok((_, mail_class, Err(_))) => {
                    warn!(
                        %mail_class,
                        timeout_ms = self.gateway.timeout_ms(),
                        "alternate mail class timed out"
                    );
                }
                Err(error) => warn!(%error, "alternate mail class task aborted"),
            }
        }

        // Completion order is arbitrary; merge in configured class order.
        answered.sort_by_key(|(position, _)| *position);
        answered.into_iter().flat_map(|(_, rates)| rates).collect()
    }

    async fn query_class(
        &self,
        destination: &Address,
        tier: &PackageTier,
        cart: &CartContext,
        mail_class: &str,
    ) -> Result<Vec<NormalizedRate>, CarrierError> {
        let carrier = self.gateway.carrier();
        let dims = tier.dimensions_in;
        let body = serde_json::json!({
            "originZIPCode": self.origin.postal_code_5(),
            "destinationZIPCode": destination.postal_code_5(),
            "weight": tier.weight_lbs,
            "length": dims.length,
            "width": dims.width,
            "height": dims.height,
            "mailClass": mail_class,
            "priceType": "COMMERCIAL",
            "itemValue": 0,
        });
        let request = HttpRequest::post(self.search_url())
            .with_json(&body)
            .map_err(|error| CarrierError::invalid_request(carrier, error.message()))?
            .with_header("x-request-id", cart.request_id.to_string());

        let response = self.gateway.send(request).await?;
        let payload: PostalRatesPayload = decode(carrier, &response)?;

        Ok(payload
            .rate_options
            .into_iter()
            .enumerate()
            .map(|(index, option)| normalize_option(mail_class, index, option))
            .collect())
    }
}

impl CarrierAdapter for PostalParcelAdapter {
    fn id(&self) -> CarrierId {
        CarrierId::PostalParcel
    }

    fn get_rates<'a>(
        &'a self,
        address: &'a Address,
        tier: &'a PackageTier,
        cart: &'a CartContext,
    ) -> RatesFuture<'a> {
        Box::pin(async move {
            let primary = self
                .query_class(address, tier, cart, &self.primary_mail_class)
                .await?;
            if !primary.is_empty() {
                info!(
                    carrier = %self.id(),
                    mail_class = %self.primary_mail_class,
                    count = primary.len(),
                    "postal rates received"
                );
                return Ok(primary);
            }

            info!(
                carrier = %self.id(),
                alternates = self.alternate_mail_classes.len(),
                "primary mail class empty, querying alternates"
            );
            let merged = self.fan_out(address, tier, cart).await;
            if merged.is_empty() {
                return Err(CarrierError::no_rates(self.id()));
            }
            Ok(merged)
        })
    }
}

fn normalize_option(mail_class: &str, index: usize, option: PostalRateOption) -> NormalizedRate {
    let service_name = option
        .rates
        .first()
        .and_then(|line| line.description.clone())
        .unwrap_or_else(|| mail_class.replace('_', " "));
    let transit_days = option
        .commitment
        .as_ref()
        .and_then(|commitment| commitment.name.as_deref())
        .and_then(leading_days);
    let guaranteed = option
        .commitment
        .as_ref()
        .and_then(|commitment| commitment.guaranteed);

    NormalizedRate::new(
        format!("postal-{mail_class}-{index}"),
        CARRIER_NAME,
        service_name,
        option.total_base_price.unwrap_or(0.0),
        "USD",
        transit_days,
        guaranteed,
        ProviderKind::SmallParcel,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostalRatesPayload {
    #[serde(default)]
    rate_options: Vec<PostalRateOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostalRateOption {
    #[serde(default)]
    total_base_price: Option<f64>,
    #[serde(default)]
    rates: Vec<PostalRateLine>,
    #[serde(default)]
    commitment: Option<PostalCommitment>,
}

#[derive(Debug, Deserialize)]
struct PostalRateLine {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostalCommitment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guaranteed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Instant;

    use super::*;
    use crate::adapters::test_support::{token_cache, ScriptedHttpClient};
    use crate::carrier::CarrierErrorKind;
    use crate::domain::resolve_tier;
    use crate::http_client::{HttpClient, HttpError, HttpResponse};

    /// Answers by mail class; one class never answers in time.
    struct StallingTransport {
        stalled_class: &'static str,
    }

    impl HttpClient for StallingTransport {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async move {
                let mail_class = body_mail_class(&request);
                if mail_class == self.stalled_class {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                let body = if mail_class == DEFAULT_PRIMARY_MAIL_CLASS {
                    serde_json::json!({ "rateOptions": [] })
                } else {
                    serde_json::json!({
                        "rateOptions": [{
                            "totalBasePrice": 11.25,
                            "rates": [{ "description": mail_class }]
                        }]
                    })
                };
                Ok(HttpResponse::ok_json(body.to_string()))
            })
        }
    }

    fn origin() -> Address {
        Address::new("Warehouse", "100 Dock Rd", "Tempe", "AZ", "85281", "US")
    }

    fn destination() -> Address {
        Address::new("Buyer", "1 Main St", "Phoenix", "AZ", "85004-1234", "US")
    }

    fn adapter(http: Arc<ScriptedHttpClient>) -> PostalParcelAdapter {
        let gateway = CarrierGateway::new(
            CarrierId::PostalParcel,
            http,
            token_cache(CarrierId::PostalParcel),
        );
        PostalParcelAdapter::new(gateway, "https://postal.test/", origin()).with_mail_classes(
            "USPS_GROUND_ADVANTAGE",
            vec![String::from("PRIORITY_MAIL"), String::from("PRIORITY_MAIL_EXPRESS")],
        )
    }

    fn body_mail_class(request: &HttpRequest) -> String {
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().expect("json body")).expect("valid json");
        body["mailClass"].as_str().expect("mail class").to_owned()
    }

    #[tokio::test]
    async fn primary_class_rates_skip_alternates() {
        let http = Arc::new(ScriptedHttpClient::default().reply(
            "/total-rates/search",
            Ok(HttpResponse::ok_json(
                r#"{"rateOptions":[{"totalBasePrice":9.45,"rates":[{"description":"Ground Advantage"}],"commitment":{"name":"3 Days"}}]}"#,
            )),
        ));
        let adapter = adapter(http.clone());

        let rates = adapter
            .get_rates(&destination(), &resolve_tier(300), &CartContext::new(300))
            .await
            .expect("rates");

        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].display_name, "USPS Ground Advantage");
        assert_eq!(rates[0].transit_days, Some(3));
        assert_eq!(rates[0].provider, ProviderKind::SmallParcel);

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value =
            serde_json::from_str(requests[0].body.as_deref().expect("body")).expect("json");
        assert_eq!(body["destinationZIPCode"], "85004");
        assert_eq!(body["originZIPCode"], "85281");
        assert_eq!(body["weight"], 2.0);
    }

    #[tokio::test]
    async fn empty_primary_merges_alternate_classes() {
        let http = Arc::new(
            ScriptedHttpClient::default()
                .reply("/total-rates/search", Ok(HttpResponse::ok_json(r#"{"rateOptions":[]}"#)))
                .reply(
                    "/total-rates/search",
                    Ok(HttpResponse::ok_json(
                        r#"{"rateOptions":[{"totalBasePrice":14.10,"rates":[{"description":"Priority Mail"}]}]}"#,
                    )),
                ),
        );
        let adapter = adapter(http.clone());

        let rates = adapter
            .get_rates(&destination(), &resolve_tier(800), &CartContext::new(800))
            .await
            .expect("alternate rates");

        assert_eq!(rates.len(), 2);
        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(body_mail_class(&requests[0]), "USPS_GROUND_ADVANTAGE");
        let mut alternates: Vec<String> = requests[1..].iter().map(body_mail_class).collect();
        alternates.sort();
        assert_eq!(alternates, vec!["PRIORITY_MAIL", "PRIORITY_MAIL_EXPRESS"]);
    }

    #[tokio::test]
    async fn stalled_alternate_times_out_without_blocking_the_others() {
        let http = Arc::new(StallingTransport {
            stalled_class: "PRIORITY_MAIL",
        });
        let gateway = CarrierGateway::new(
            CarrierId::PostalParcel,
            http,
            token_cache(CarrierId::PostalParcel),
        )
        .with_timeout_ms(200);
        let adapter = PostalParcelAdapter::new(gateway, "https://postal.test", origin())
            .with_mail_classes(
                DEFAULT_PRIMARY_MAIL_CLASS,
                vec![String::from("PRIORITY_MAIL"), String::from("PARCEL_SELECT")],
            );

        let started = Instant::now();
        let rates = adapter
            .get_rates(&destination(), &resolve_tier(800), &CartContext::new(800))
            .await
            .expect("answering class still merges");
        let elapsed = started.elapsed();

        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].id, "postal-PARCEL_SELECT-0");
        assert_eq!(rates[0].display_name, "USPS PARCEL_SELECT");
        assert!(elapsed < Duration::from_secs(2), "fan-out took {elapsed:?}");
    }

    #[tokio::test]
    async fn all_classes_empty_is_no_rates() {
        let http = Arc::new(ScriptedHttpClient::default().reply(
            "/total-rates/search",
            Ok(HttpResponse::ok_json(r#"{"rateOptions":[]}"#)),
        ));

        let error = adapter(http)
            .get_rates(&destination(), &resolve_tier(10), &CartContext::new(10))
            .await
            .expect_err("nothing to quote");

        assert_eq!(error.kind(), CarrierErrorKind::NoRates);
    }

    #[tokio::test]
    async fn unreadable_body_is_unavailable() {
        let http = Arc::new(
            ScriptedHttpClient::default()
                .reply("/total-rates/search", Ok(HttpResponse::ok_json("<html>oops</html>"))),
        );

        let error = adapter(http)
            .get_rates(&destination(), &resolve_tier(10), &CartContext::new(10))
            .await
            .expect_err("html is not a rate payload");

        assert_eq!(error.kind(), CarrierErrorKind::Unavailable);
    }
}
