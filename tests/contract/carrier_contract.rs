use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use shipquote_core::{
    resolve_tier, Address, CarrierAdapter, CarrierCredentials, CarrierErrorKind, CarrierGateway,
    CarrierId, CartContext, CartLine, CircuitState, ClientCredentialsIssuer,
    CommercialParcelAdapter, CredentialEncoding, EngineConfig, FreightClassTable, HttpClient,
    HttpError, HttpRequest, HttpResponse, LtlFreightAdapter, ManualClock, PostalParcelAdapter,
    ProviderKind, RateEngine, RateRequest, TokenCache, FALLBACK_LABEL,
};
use time::macros::datetime;

/// Transport double: replies per URL fragment, last reply repeats.
#[derive(Default)]
struct FakeCarrierApi {
    routes: Mutex<Vec<(String, VecDeque<HttpResponse>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeCarrierApi {
    fn route(self, fragment: &str, status: u16, body: &str) -> Self {
        {
            let mut routes = self.routes.lock().expect("routes lock");
            let response = HttpResponse::new(status, body);
            match routes.iter_mut().find(|(route, _)| route == fragment) {
                Some((_, queue)) => queue.push_back(response),
                None => routes.push((fragment.to_owned(), VecDeque::from([response]))),
            }
        }
        self
    }

    fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|request| request.url.contains(fragment))
            .cloned()
            .collect()
    }
}

impl HttpClient for FakeCarrierApi {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests.lock().expect("requests lock").push(request.clone());
            let mut routes = self.routes.lock().expect("routes lock");
            let reply = routes
                .iter_mut()
                .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                .and_then(|(_, queue)| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                });
            Ok(reply.unwrap_or_else(|| HttpResponse::new(404, "")))
        })
    }
}

const TOKEN_BODY: &str = r#"{"access_token":"tok-1","token_type":"Bearer","expires_in":3600}"#;

fn origin() -> Address {
    Address::new("Warehouse", "100 Dock Rd", "Tempe", "AZ", "85281", "US")
}

fn destination() -> Address {
    Address::new("Buyer", "1 Main St", "Phoenix", "AZ", "85004", "US")
}

fn gateway(carrier: CarrierId, api: Arc<FakeCarrierApi>) -> CarrierGateway {
    let clock = Arc::new(ManualClock::new(datetime!(2024-06-05 15:00 UTC)));
    let issuer = ClientCredentialsIssuer::new(
        carrier,
        "https://auth.test/oauth/token",
        "client-id",
        "client-secret",
        CredentialEncoding::Form,
        api.clone(),
    );
    let tokens = TokenCache::new(clock, time::Duration::seconds(60)).with_issuer(Arc::new(issuer));
    CarrierGateway::new(carrier, api, Arc::new(tokens))
}

fn assert_contract(rates: &[shipquote_core::NormalizedRate], provider: ProviderKind) {
    assert!(!rates.is_empty(), "adapter must return at least one rate");
    for rate in rates {
        assert!(!rate.id.is_empty(), "rate id present");
        assert!(!rate.carrier_name.is_empty(), "carrier name present");
        assert!(rate.price_amount >= 0.0, "price is never negative");
        assert_eq!(rate.provider, provider, "provider tag for {}", rate.id);
        assert_eq!(rate.currency, "USD");
    }
}

#[tokio::test]
async fn postal_adapter_honors_contract() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth/token", 200, TOKEN_BODY)
            .route(
                "/total-rates/search",
                200,
                r#"{"rateOptions":[
                    {"totalBasePrice":12.40,"rates":[{"description":"Priority Mail"}],"commitment":{"name":"2 Days"}},
                    {"totalBasePrice":8.95,"rates":[{"description":"Ground Advantage"}],"commitment":{"name":"5 Days"}}
                ]}"#,
            ),
    );
    let adapter = PostalParcelAdapter::new(
        gateway(CarrierId::PostalParcel, api.clone()),
        "https://postal.test",
        origin(),
    );

    let rates = adapter
        .get_rates(&destination(), &resolve_tier(800), &CartContext::new(800))
        .await
        .expect("postal rates");

    assert_contract(&rates, ProviderKind::SmallParcel);
    let calls = api.requests_to("/total-rates/search");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].headers.get("authorization").map(String::as_str),
        Some("Bearer tok-1")
    );
}

#[tokio::test]
async fn commercial_adapter_honors_contract() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth/token", 200, TOKEN_BODY)
            .route(
                "/Shop",
                200,
                r#"{"RateResponse":{"RatedShipment":[
                    {"Service":{"Code":"03"},"TotalCharges":{"CurrencyCode":"USD","MonetaryValue":"16.80"}},
                    {"Service":{"Code":"02"},"TotalCharges":{"CurrencyCode":"USD","MonetaryValue":"34.10"},
                     "NegotiatedRateCharges":{"TotalCharge":{"CurrencyCode":"USD","MonetaryValue":"29.75"}}}
                ]}}"#,
            ),
    );
    let adapter = CommercialParcelAdapter::new(
        gateway(CarrierId::CommercialParcel, api),
        "https://commercial.test",
        origin(),
    );

    let rates = adapter
        .get_rates(&destination(), &resolve_tier(1_500), &CartContext::new(1_500))
        .await
        .expect("commercial rates");

    assert_contract(&rates, ProviderKind::SmallParcel);
    assert_eq!(rates[1].price_amount, 29.75);
}

#[tokio::test]
async fn freight_adapter_honors_contract() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth/token", 200, TOKEN_BODY)
            .route(
                "/api/v1/quotes",
                200,
                r#"{"quoteId":"Q-9","carrierPrices":[
                    {"id":"a","carrierName":"Estes","total":512.0,"transitDays":3},
                    {"id":"b","carrierName":"R+L","total":498.5,"transitDays":4}
                ]}"#,
            ),
    );
    let adapter = LtlFreightAdapter::new(
        gateway(CarrierId::LtlFreight, api),
        "https://freight.test",
        origin(),
        FreightClassTable::default(),
        Arc::new(ManualClock::new(datetime!(2024-06-05 15:00 UTC))),
    );

    let rates = adapter
        .get_rates(&destination(), &resolve_tier(120_000), &CartContext::new(120_000))
        .await
        .expect("freight rates");

    assert_contract(&rates, ProviderKind::Freight);
}

#[tokio::test]
async fn rejected_token_is_dropped_and_next_request_reauthenticates() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth/token", 200, TOKEN_BODY)
            .route("/total-rates/search", 401, "")
            .route(
                "/total-rates/search",
                200,
                r#"{"rateOptions":[{"totalBasePrice":9.10,"rates":[{"description":"Ground Advantage"}]}]}"#,
            ),
    );
    let adapter = PostalParcelAdapter::new(
        gateway(CarrierId::PostalParcel, api.clone()),
        "https://postal.test",
        origin(),
    )
    .with_mail_classes("USPS_GROUND_ADVANTAGE", Vec::new());

    let first = adapter
        .get_rates(&destination(), &resolve_tier(50), &CartContext::new(50))
        .await
        .expect_err("401 surfaces as unavailable");
    assert_eq!(first.kind(), CarrierErrorKind::Unavailable);

    let second = adapter
        .get_rates(&destination(), &resolve_tier(50), &CartContext::new(50))
        .await
        .expect("fresh token succeeds");
    assert_eq!(second.len(), 1);
    assert_eq!(api.requests_to("/oauth/token").len(), 2);
}

#[tokio::test]
async fn carrier_throttling_maps_to_rate_limited() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth/token", 200, TOKEN_BODY)
            .route("/Shop", 429, r#"{"response":{"errors":[{"code":"429"}]}}"#),
    );
    let adapter = CommercialParcelAdapter::new(
        gateway(CarrierId::CommercialParcel, api),
        "https://commercial.test",
        origin(),
    );

    let error = adapter
        .get_rates(&destination(), &resolve_tier(10), &CartContext::new(10))
        .await
        .expect_err("throttled");

    assert_eq!(error.kind(), CarrierErrorKind::RateLimited);
    assert!(error.retryable());
}

#[tokio::test]
async fn repeated_outages_open_the_circuit_and_stop_calling_the_carrier() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth/token", 200, TOKEN_BODY)
            .route("/api/v1/quotes", 503, "upstream down"),
    );
    let adapter = LtlFreightAdapter::new(
        gateway(CarrierId::LtlFreight, api.clone()),
        "https://freight.test",
        origin(),
        FreightClassTable::default(),
        Arc::new(ManualClock::new(datetime!(2024-06-05 15:00 UTC))),
    );
    let tier = resolve_tier(80_000);
    let cart = CartContext::new(80_000);

    for _ in 0..3 {
        let error = adapter
            .get_rates(&destination(), &tier, &cart)
            .await
            .expect_err("carrier is down");
        assert_eq!(error.kind(), CarrierErrorKind::Unavailable);
    }

    let short_circuited = adapter
        .get_rates(&destination(), &tier, &cart)
        .await
        .expect_err("circuit is open");

    assert_eq!(short_circuited.kind(), CarrierErrorKind::RateLimited);
    assert_eq!(api.requests_to("/api/v1/quotes").len(), 3);
}

#[tokio::test]
async fn gateway_reports_open_circuit_state() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth/token", 200, TOKEN_BODY)
            .route("/rates", 500, ""),
    );
    let gateway = gateway(CarrierId::PostalParcel, api);

    for _ in 0..3 {
        let _ = gateway.send(HttpRequest::post("https://postal.test/rates")).await;
    }

    assert_eq!(gateway.circuit_breaker().state(), CircuitState::Open);
}

#[tokio::test]
async fn engine_built_from_credentials_falls_back_through_live_adapters() {
    let api = Arc::new(
        FakeCarrierApi::default()
            .route("/oauth2/v3/token", 200, TOKEN_BODY)
            .route("/oauth/token", 200, TOKEN_BODY)
            .route("/api/v1/quotes", 502, "bad gateway")
            .route(
                "/total-rates/search",
                200,
                r#"{"rateOptions":[{"totalBasePrice":41.20,"rates":[{"description":"Ground Advantage"}],"commitment":{"name":"4 Days"}}]}"#,
            ),
    );
    let credentials = CarrierCredentials::from_lookup(|name| {
        let value = match name {
            "SHIPQUOTE_POSTAL_BASE_URL" => "https://postal.test",
            "SHIPQUOTE_FREIGHT_BASE_URL" => "https://freight.test",
            "SHIPQUOTE_POSTAL_CLIENT_ID" | "SHIPQUOTE_FREIGHT_CLIENT_ID" => "client-id",
            "SHIPQUOTE_POSTAL_CLIENT_SECRET" | "SHIPQUOTE_FREIGHT_CLIENT_SECRET" => "secret",
            "SHIPQUOTE_FREIGHT_USERNAME" => "dock",
            "SHIPQUOTE_FREIGHT_PASSWORD" => "hunter2",
            _ => return None,
        };
        Some(value.to_owned())
    });
    let engine = RateEngine::builder(EngineConfig::default())
        .with_credentials(credentials)
        .with_http_client(api.clone())
        .with_clock(Arc::new(ManualClock::new(datetime!(2024-06-05 15:00 UTC))))
        .build()
        .expect("engine builds");
    let request = RateRequest::new(destination(), vec![CartLine::new(50_000)]).expect("request");

    let result = engine.quote(&request).await.expect("parcel fallback");

    assert_eq!(result.provider_used, ProviderKind::SmallParcel);
    assert!(result.fallback_used);
    assert!(result.rates[0].display_name.ends_with(FALLBACK_LABEL));
    assert_eq!(api.requests_to("/api/v1/quotes").len(), 1);
    assert_eq!(api.requests_to("/oauth2/v3/token").len(), 1);
    assert_eq!(api.requests_to("freight.test/oauth/token").len(), 1);
}
