//! # Carrier Auth Cache
//!
//! Per-carrier OAuth2 token management with expiry-aware caching.
//!
//! ```text
//! get_token(carrier)
//!   ├─ slot lock (one per carrier) ─┐
//!   │   cached && now < expires_at ─┼─► return cached token (no network)
//!   │   otherwise                   │
//!   │     issuer.issue() ───────────┼─► token endpoint (client credentials / password grant)
//!   │     store with expires_at = issued + expires_in − safety margin
//!   └───────────────────────────────┘
//! ```
//!
//! Holding the carrier's slot lock across the handshake makes concurrent
//! callers for the same carrier wait for one authentication and then reuse
//! its token. Slots are independent: a failed handshake for one carrier
//! never touches another carrier's token.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::carrier::CarrierId;
use crate::clock::Clock;
use crate::http_client::{HttpClient, HttpRequest};

/// Lifetime assumed when a token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3_600;

/// Token handshake failures. Messages never contain credentials.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{carrier} rejected credentials (status {status})")]
    Rejected { carrier: CarrierId, status: u16 },

    #[error("{carrier} token endpoint unreachable: {message}")]
    Transport { carrier: CarrierId, message: String },

    #[error("{carrier} token response malformed: {message}")]
    MalformedResponse { carrier: CarrierId, message: String },

    #[error("no token issuer registered for {0}")]
    UnknownCarrier(CarrierId),
}

/// Cached bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct CarrierToken {
    pub value: String,
    pub token_type: String,
    /// Already reduced by the cache's safety margin.
    pub expires_at: OffsetDateTime,
}

impl CarrierToken {
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for CarrierToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierToken")
            .field("value", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Raw token as returned by a handshake, before the safety margin is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in_secs: u64,
}

pub type IssueFuture<'a> =
    Pin<Box<dyn Future<Output = Result<IssuedToken, AuthError>> + Send + 'a>>;

/// Carrier-specific authentication handshake.
pub trait TokenIssuer: Send + Sync {
    fn carrier(&self) -> CarrierId;

    fn issue(&self) -> IssueFuture<'_>;
}

struct TokenSlot {
    issuer: Arc<dyn TokenIssuer>,
    token: Mutex<Option<CarrierToken>>,
}

/// Process-wide token cache owned by an engine instance.
pub struct TokenCache {
    slots: HashMap<CarrierId, TokenSlot>,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
}

impl TokenCache {
    pub fn new(clock: Arc<dyn Clock>, safety_margin: Duration) -> Self {
        Self {
            slots: HashMap::new(),
            clock,
            safety_margin,
        }
    }

    /// Registers the handshake for a carrier, replacing any earlier issuer.
    pub fn with_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.slots.insert(
            issuer.carrier(),
            TokenSlot {
                issuer,
                token: Mutex::new(None),
            },
        );
        self
    }

    pub fn has_issuer(&self, carrier: CarrierId) -> bool {
        self.slots.contains_key(&carrier)
    }

    /// Returns a valid token for `carrier`, authenticating only when none is cached.
    pub async fn get_token(&self, carrier: CarrierId) -> Result<CarrierToken, AuthError> {
        let slot = self
            .slots
            .get(&carrier)
            .ok_or(AuthError::UnknownCarrier(carrier))?;

        let mut cached = slot.token.lock().await;
        let now = self.clock.now();
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(now) {
                debug!(
                    %carrier,
                    remaining_secs = (token.expires_at - now).whole_seconds(),
                    "using cached carrier token"
                );
                return Ok(token.clone());
            }
        }

        let issued = slot.issuer.issue().await.inspect_err(|error| {
            warn!(%carrier, %error, "carrier authentication failed");
        })?;

        let expires_at = self
            .expiry(now, issued.expires_in_secs)
            .ok_or_else(|| AuthError::MalformedResponse {
                carrier,
                message: format!("expires_in {} is out of range", issued.expires_in_secs),
            })
            .inspect_err(|error| {
                warn!(%carrier, %error, "carrier token lifetime rejected");
            })?;
        let token = CarrierToken {
            value: issued.access_token,
            token_type: issued.token_type,
            expires_at,
        };
        info!(%carrier, expires_in_secs = issued.expires_in_secs, "authenticated with carrier");

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token if it is still `rejected`, so the next call
    /// re-authenticates. A token refreshed by another request in the meantime
    /// is kept.
    pub async fn invalidate(&self, carrier: CarrierId, rejected: &str) {
        let Some(slot) = self.slots.get(&carrier) else {
            return;
        };

        let mut cached = slot.token.lock().await;
        if cached.as_ref().is_some_and(|token| token.value == rejected) {
            *cached = None;
            debug!(%carrier, "carrier token invalidated");
        } else {
            debug!(%carrier, "rejected token already replaced");
        }
    }

    /// `now + expires_in − safety margin`, floored at `now`. `None` when the
    /// carrier's lifetime does not fit a timestamp.
    fn expiry(&self, now: OffsetDateTime, expires_in_secs: u64) -> Option<OffsetDateTime> {
        let lifetime = Duration::seconds(i64::try_from(expires_in_secs).ok()?);
        let usable = lifetime.checked_sub(self.safety_margin)?.max(Duration::ZERO);
        now.checked_add(usable)
    }
}

/// How client credentials are sent to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEncoding {
    Json,
    Form,
}

/// OAuth2 client-credentials grant.
#[derive(Clone)]
pub struct ClientCredentialsIssuer {
    carrier: CarrierId,
    token_url: String,
    client_id: String,
    client_secret: String,
    encoding: CredentialEncoding,
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl ClientCredentialsIssuer {
    pub fn new(
        carrier: CarrierId,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        encoding: CredentialEncoding,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            carrier,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            encoding,
            http_client,
            timeout_ms: 10_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn build_request(&self) -> Result<HttpRequest, AuthError> {
        let request = HttpRequest::post(&self.token_url).with_timeout_ms(self.timeout_ms);
        match self.encoding {
            CredentialEncoding::Form => Ok(request.with_form(&[
                ("grant_type", "client_credentials"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])),
            CredentialEncoding::Json => request
                .with_json(&serde_json::json!({
                    "grant_type": "client_credentials",
                    "client_id": self.client_id,
                    "client_secret": self.client_secret,
                }))
                .map_err(|error| AuthError::MalformedResponse {
                    carrier: self.carrier,
                    message: error.message().to_owned(),
                }),
        }
    }
}

impl TokenIssuer for ClientCredentialsIssuer {
    fn carrier(&self) -> CarrierId {
        self.carrier
    }

    fn issue(&self) -> IssueFuture<'_> {
        Box::pin(async move {
            let request = self.build_request()?;
            exchange(self.carrier, self.http_client.as_ref(), request).await
        })
    }
}

/// OAuth2 resource-owner password grant.
#[derive(Clone)]
pub struct PasswordGrantIssuer {
    carrier: CarrierId,
    token_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl PasswordGrantIssuer {
    pub fn new(
        carrier: CarrierId,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            carrier,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
            http_client,
            timeout_ms: 10_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl TokenIssuer for PasswordGrantIssuer {
    fn carrier(&self) -> CarrierId {
        self.carrier
    }

    fn issue(&self) -> IssueFuture<'_> {
        Box::pin(async move {
            let request = HttpRequest::post(&self.token_url)
                .with_timeout_ms(self.timeout_ms)
                .with_form(&[
                    ("grant_type", "password"),
                    ("username", &self.username),
                    ("password", &self.password),
                    ("client_id", &self.client_id),
                    ("client_secret", &self.client_secret),
                ]);
            exchange(self.carrier, self.http_client.as_ref(), request).await
        })
    }
}

async fn exchange(
    carrier: CarrierId,
    http_client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<IssuedToken, AuthError> {
    let response = http_client
        .execute(request)
        .await
        .map_err(|error| AuthError::Transport {
            carrier,
            message: error.message().to_owned(),
        })?;

    if !response.is_success() {
        return Err(AuthError::Rejected {
            carrier,
            status: response.status,
        });
    }

    let payload: TokenResponse =
        serde_json::from_str(&response.body).map_err(|error| AuthError::MalformedResponse {
            carrier,
            message: error.to_string(),
        })?;

    if payload.access_token.trim().is_empty() {
        return Err(AuthError::MalformedResponse {
            carrier,
            message: String::from("empty access_token"),
        });
    }

    Ok(IssuedToken {
        access_token: payload.access_token,
        token_type: payload.token_type.unwrap_or_else(|| String::from("Bearer")),
        expires_in_secs: payload
            .expires_in
            .map(NumberOrString::as_secs)
            .transpose()
            .map_err(|message| AuthError::MalformedResponse { carrier, message })?
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<NumberOrString>,
}

/// Some carriers send `expires_in` as a quoted number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    fn as_secs(self) -> Result<u64, String> {
        match self {
            Self::Number(value) => Ok(value),
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| format!("expires_in is not a number: '{text}'")),
        }
    }
}
