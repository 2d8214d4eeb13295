//! Carrier adapter contract and adapter-level errors.
//!
//! Every carrier integration implements [`CarrierAdapter`]: it turns a
//! `(PackageTier, Address)` pair into carrier-specific requests and returns
//! [`NormalizedRate`] values. Nothing above this layer sees a carrier payload.
//!
//! | Carrier | Adapter | Provider | Auth |
//! |---------|---------|----------|------|
//! | [`CarrierId::PostalParcel`] | `PostalParcelAdapter` | small parcel | client credentials |
//! | [`CarrierId::CommercialParcel`] | `CommercialParcelAdapter` | small parcel | client credentials |
//! | [`CarrierId::LtlFreight`] | `LtlFreightAdapter` | freight | password grant |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::domain::{Address, NormalizedRate, PackageTier, ProviderKind};
use crate::http_client::HttpError;
use crate::ValidationError;

/// Carrier integrations known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierId {
    PostalParcel,
    CommercialParcel,
    LtlFreight,
}

impl CarrierId {
    pub const ALL: [Self; 3] = [Self::PostalParcel, Self::CommercialParcel, Self::LtlFreight];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostalParcel => "postal_parcel",
            Self::CommercialParcel => "commercial_parcel",
            Self::LtlFreight => "ltl_freight",
        }
    }

    pub const fn provider(self) -> ProviderKind {
        match self {
            Self::PostalParcel | Self::CommercialParcel => ProviderKind::SmallParcel,
            Self::LtlFreight => ProviderKind::Freight,
        }
    }
}

impl Display for CarrierId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which integration serves the small-parcel path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParcelCarrier {
    #[default]
    Postal,
    Commercial,
}

impl ParcelCarrier {
    pub const fn carrier_id(self) -> CarrierId {
        match self {
            Self::Postal => CarrierId::PostalParcel,
            Self::Commercial => CarrierId::CommercialParcel,
        }
    }
}

impl FromStr for ParcelCarrier {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postal" => Ok(Self::Postal),
            "commercial" => Ok(Self::Commercial),
            other => Err(ValidationError::InvalidParcelCarrier {
                value: other.to_owned(),
            }),
        }
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierErrorKind {
    /// Network failure, timeout, non-2xx or unreadable response.
    Unavailable,
    /// The call succeeded but produced zero usable rates.
    NoRates,
    /// Token handshake failed.
    Authentication,
    /// The carrier rejected the request itself, e.g. an unclassifiable address.
    InvalidRequest,
    /// Request budget or circuit breaker blocked the call.
    RateLimited,
}

/// Structured carrier error consumed by the fallback controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierError {
    carrier: CarrierId,
    kind: CarrierErrorKind,
    message: String,
    retryable: bool,
}

impl CarrierError {
    pub fn unavailable(carrier: CarrierId, message: impl Into<String>) -> Self {
        Self {
            carrier,
            kind: CarrierErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn no_rates(carrier: CarrierId) -> Self {
        Self {
            carrier,
            kind: CarrierErrorKind::NoRates,
            message: format!("{carrier} returned no rates"),
            retryable: false,
        }
    }

    pub fn invalid_request(carrier: CarrierId, message: impl Into<String>) -> Self {
        Self {
            carrier,
            kind: CarrierErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(carrier: CarrierId, message: impl Into<String>) -> Self {
        Self {
            carrier,
            kind: CarrierErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn from_auth(carrier: CarrierId, error: &AuthError) -> Self {
        Self {
            carrier,
            kind: CarrierErrorKind::Authentication,
            message: error.to_string(),
            retryable: true,
        }
    }

    pub fn from_transport(carrier: CarrierId, error: &HttpError) -> Self {
        let message = if error.timed_out() {
            format!("{carrier} timed out: {}", error.message())
        } else {
            format!("{carrier} transport error: {}", error.message())
        };
        Self {
            carrier,
            kind: CarrierErrorKind::Unavailable,
            message,
            retryable: error.retryable(),
        }
    }

    pub const fn carrier(&self) -> CarrierId {
        self.carrier
    }

    pub const fn kind(&self) -> CarrierErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// True when the carrier answered but had nothing to offer.
    pub const fn is_no_rates(&self) -> bool {
        matches!(self.kind, CarrierErrorKind::NoRates)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            CarrierErrorKind::Unavailable => "carrier.unavailable",
            CarrierErrorKind::NoRates => "carrier.no_rates",
            CarrierErrorKind::Authentication => "carrier.authentication",
            CarrierErrorKind::InvalidRequest => "carrier.invalid_request",
            CarrierErrorKind::RateLimited => "carrier.rate_limited",
        }
    }
}

impl Display for CarrierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for CarrierError {}

/// Per-request context handed to every adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartContext {
    pub total_quantity: u64,
    pub request_id: Uuid,
}

impl CartContext {
    pub fn new(total_quantity: u64) -> Self {
        Self {
            total_quantity,
            request_id: Uuid::new_v4(),
        }
    }
}

pub type RatesFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<NormalizedRate>, CarrierError>> + Send + 'a>>;

/// Carrier adapter contract.
///
/// Implementations authenticate through the shared token cache, call the
/// carrier, and map every service line into a [`NormalizedRate`] tagged with
/// [`provider`](CarrierAdapter::provider).
///
/// # Errors
///
/// - [`CarrierErrorKind::NoRates`] when the carrier answered with nothing usable
/// - any other kind when the carrier could not be reached or refused the call
pub trait CarrierAdapter: Send + Sync {
    fn id(&self) -> CarrierId;

    fn provider(&self) -> ProviderKind {
        self.id().provider()
    }

    fn get_rates<'a>(
        &'a self,
        address: &'a Address,
        tier: &'a PackageTier,
        cart: &'a CartContext,
    ) -> RatesFuture<'a>;
}
