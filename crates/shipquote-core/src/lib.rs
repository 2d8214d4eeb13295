//! # Shipquote Core
//!
//! Shipping-rate resolution engine: given a destination and a cart, pick a
//! package, pick a carrier, fetch rates and return one normalized, sorted list.
//!
//! ## Overview
//!
//! - **Tier table** mapping total unit quantity to a physical package
//! - **Freight classifier** deriving an NMFC class from package density
//! - **Token cache** with per-carrier single-flight OAuth2 handshakes
//! - **Carrier adapters** for a postal parcel, a commercial parcel and an LTL freight carrier
//! - **Fallback controller** routing by quantity with a weight-limited parcel fallback
//! - **Rate sorter** ordering by price with "contact for quote" rates last
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Carrier adapters and the guarded carrier gateway |
//! | [`auth`] | Carrier token cache and OAuth2 issuers |
//! | [`carrier`] | Adapter contract, carrier ids and carrier errors |
//! | [`circuit_breaker`] | Per-carrier circuit breaker |
//! | [`clock`] | Injectable wall clock |
//! | [`config`] | Engine configuration and carrier credentials |
//! | [`domain`] | Addresses, tiers, freight items and normalized rates |
//! | [`engine`] | Provider selection and fallback |
//! | [`error`] | Validation, configuration and quote errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`response`] | Wire response for the checkout collaborator |
//! | [`session`] | Generation gate that drops superseded quotes |
//! | [`throttling`] | Per-carrier request budget |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipquote_core::{
//!     Address, CarrierCredentials, CartLine, EngineConfig, RateEngine, RateQuoteResponse,
//!     RateRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::from_env()?;
//!     let support = config.support_contact.clone();
//!     let engine = RateEngine::builder(config)
//!         .with_credentials(CarrierCredentials::from_env())
//!         .build()?;
//!
//!     let request = RateRequest::new(
//!         Address::new("Buyer", "1 Main St", "Phoenix", "AZ", "85004", "US"),
//!         vec![CartLine::new(3_000)],
//!     )?;
//!     let outcome = engine.quote(&request).await;
//!     let response = RateQuoteResponse::from_outcome(&outcome, &support);
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  QuoteSession   │  generation gate
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   RateEngine    │────▶│    TierTable     │
//! │ (select/fallback)│    └──────────────────┘
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ CarrierAdapter  │────▶│  CarrierGateway  │ throttle, circuit, token
//! └─────────────────┘     └────────┬─────────┘
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │   HttpClient     │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapters fail with a structured [`CarrierError`]; the engine folds those
//! into a [`QuoteFailure`] whose [`QuoteError`] renders a customer-safe message:
//!
//! ```rust
//! use shipquote_core::{ProviderKind, QuoteError};
//!
//! let error = QuoteError::ProviderUnavailable { provider: ProviderKind::Freight };
//! assert!(error.user_message("support@example.com").contains("support@example.com"));
//! ```
//!
//! ## Security
//!
//! - Credentials are read from environment variables and never logged
//! - Tokens and secrets are redacted from `Debug` output
//! - Carrier payloads never reach customer-facing messages

pub mod adapters;
pub mod auth;
pub mod carrier;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod response;
pub mod session;
pub mod throttling;

// Carrier adapters
pub use adapters::{CarrierGateway, CommercialParcelAdapter, LtlFreightAdapter, PostalParcelAdapter};

// Auth
pub use auth::{
    AuthError, CarrierToken, ClientCredentialsIssuer, CredentialEncoding, IssuedToken,
    PasswordGrantIssuer, TokenCache, TokenIssuer,
};

// Adapter contract
pub use carrier::{
    CarrierAdapter, CarrierError, CarrierErrorKind, CarrierId, CartContext, ParcelCarrier,
    RatesFuture,
};

// Resilience
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use throttling::{CarrierQuota, CarrierThrottle};

pub use clock::{Clock, ManualClock, SystemClock};

// Configuration
pub use config::{CarrierCredentials, ClientAccount, EngineConfig, FreightAccount};

// Domain models
pub use domain::{
    classify, resolve_tier, sort_rates, Address, CartLine, DensityBreak, Dimensions,
    FreightClassTable, FreightItem, NormalizedRate, PackageTier, PackageType, ProviderKind,
    RateRequest, TierTable, FALLBACK_LABEL,
};

// Engine
pub use engine::{QuoteFailure, RateEngine, RateEngineBuilder, RateQuoteResult};

// Error types
pub use error::{ConfigError, QuoteError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

pub use response::{RateOption, RateQuoteResponse};
pub use session::{QuoteOutcome, QuoteSession};
