//! Carrier adapter implementations.
//!
//! Adapters share a [`CarrierGateway`]: the request budget, circuit breaker,
//! token cache and transport for one carrier. The gateway classifies HTTP
//! outcomes into [`CarrierError`] kinds so every adapter reports failures the
//! same way.

pub mod commercial;
pub mod freight;
pub mod postal;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::TokenCache;
use crate::carrier::{CarrierError, CarrierId};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::throttling::{CarrierQuota, CarrierThrottle};

pub use commercial::CommercialParcelAdapter;
pub use freight::LtlFreightAdapter;
pub use postal::PostalParcelAdapter;

/// Authenticated, guarded transport to a single carrier.
pub struct CarrierGateway {
    carrier: CarrierId,
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<TokenCache>,
    circuit_breaker: CircuitBreaker,
    throttle: CarrierThrottle,
    timeout_ms: u64,
}

impl CarrierGateway {
    pub fn new(
        carrier: CarrierId,
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            carrier,
            http_client,
            tokens,
            circuit_breaker: CircuitBreaker::new(carrier, CircuitBreakerConfig::default()),
            throttle: CarrierThrottle::new(carrier, CarrierQuota::default()),
            timeout_ms: 10_000,
        }
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = CircuitBreaker::new(self.carrier, config);
        self
    }

    pub fn with_quota(mut self, quota: CarrierQuota) -> Self {
        self.throttle = CarrierThrottle::new(self.carrier, quota);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub const fn carrier(&self) -> CarrierId {
        self.carrier
    }

    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Sends `request` with the carrier's bearer token and returns a 2xx response.
    ///
    /// A 401 drops the cached token so the next request re-authenticates;
    /// the rejected request itself is not replayed.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CarrierError> {
        let carrier = self.carrier;
        self.throttle.acquire()?;
        self.circuit_breaker.guard()?;

        let token = self.tokens.get_token(carrier).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            CarrierError::from_auth(carrier, &error)
        })?;

        let url = request.url.clone();
        let request = request
            .with_bearer(&token.value)
            .with_timeout_ms(self.timeout_ms);
        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            warn!(%carrier, %url, timed_out = error.timed_out(), "carrier request failed");
            CarrierError::from_transport(carrier, &error)
        })?;

        debug!(%carrier, %url, status = response.status, "carrier responded");
        match response.status {
            200..=299 => {
                self.circuit_breaker.record_success();
                Ok(response)
            }
            401 => {
                self.tokens.invalidate(carrier, &token.value).await;
                self.circuit_breaker.record_failure();
                Err(CarrierError::unavailable(
                    carrier,
                    format!("{carrier} rejected the bearer token (status 401)"),
                ))
            }
            400 | 404 | 422 => {
                self.circuit_breaker.record_success();
                Err(CarrierError::invalid_request(
                    carrier,
                    format!("{carrier} rejected the request (status {})", response.status),
                ))
            }
            429 => Err(CarrierError::rate_limited(
                carrier,
                format!("{carrier} throttled the request (status 429)"),
            )),
            status => {
                self.circuit_breaker.record_failure();
                Err(CarrierError::unavailable(
                    carrier,
                    format!("{carrier} returned status {status}"),
                ))
            }
        }
    }
}

/// Decodes a carrier body; unreadable payloads count as unavailability.
pub(crate) fn decode<T: DeserializeOwned>(
    carrier: CarrierId,
    response: &HttpResponse,
) -> Result<T, CarrierError> {
    serde_json::from_str(&response.body).map_err(|error| {
        CarrierError::unavailable(carrier, format!("{carrier} response is unreadable: {error}"))
    })
}

/// Leading integer of strings such as `"2 Days"` or `"3"`.
pub(crate) fn leading_days(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
