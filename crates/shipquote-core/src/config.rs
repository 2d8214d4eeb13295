//! Engine configuration.
//!
//! Configuration is explicit: an [`EngineConfig`] is handed to the engine at
//! construction and never read from globals afterwards. `from_env` loads it
//! from `SHIPQUOTE_*` variables with fallback to defaults.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SHIPQUOTE_SMALL_PARCEL_THRESHOLD` | `5000` (inclusive) |
//! | `SHIPQUOTE_SMALL_PARCEL_MAX_WEIGHT_LBS` | `70` |
//! | `SHIPQUOTE_TOKEN_SAFETY_MARGIN_SECS` | `60` |
//! | `SHIPQUOTE_REQUEST_TIMEOUT_MS` | `10000` |
//! | `SHIPQUOTE_SUPPORT_CONTACT` | `support@example.com` |
//! | `SHIPQUOTE_PARCEL_CARRIER` | `postal` |
//! | `SHIPQUOTE_ORIGIN_*` | built-in warehouse address |
//! | `SHIPQUOTE_POSTAL_MAIL_CLASS` | `USPS_GROUND_ADVANTAGE` |
//! | `SHIPQUOTE_POSTAL_ALTERNATE_MAIL_CLASSES` | `PRIORITY_MAIL,PRIORITY_MAIL_EXPRESS,PARCEL_SELECT` |
//! | `SHIPQUOTE_CIRCUIT_FAILURE_THRESHOLD` | `3` |
//! | `SHIPQUOTE_CIRCUIT_OPEN_SECS` | `30` |
//! | `SHIPQUOTE_CARRIER_REQUESTS_PER_MINUTE` | `120` |

use std::env;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;

use crate::adapters::postal::{DEFAULT_ALTERNATE_MAIL_CLASSES, DEFAULT_PRIMARY_MAIL_CLASS};
use crate::carrier::ParcelCarrier;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::domain::Address;
use crate::error::ConfigError;
use crate::throttling::CarrierQuota;

pub const DEFAULT_SMALL_PARCEL_THRESHOLD: u64 = 5_000;
pub const DEFAULT_SMALL_PARCEL_MAX_WEIGHT_LBS: f64 = 70.0;

/// Runtime settings for one engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Quantities at or below this go straight to small parcel.
    pub small_parcel_threshold: u64,
    /// Heaviest shipment the small-parcel carrier accepts.
    pub small_parcel_max_weight_lbs: f64,
    pub token_safety_margin: time::Duration,
    pub request_timeout_ms: u64,
    /// Contact channel quoted in customer-facing error messages.
    pub support_contact: String,
    pub parcel_carrier: ParcelCarrier,
    pub origin: Address,
    pub primary_mail_class: String,
    pub alternate_mail_classes: Vec<String>,
    pub circuit_breaker: CircuitBreakerConfig,
    pub carrier_quota: CarrierQuota,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            small_parcel_threshold: DEFAULT_SMALL_PARCEL_THRESHOLD,
            small_parcel_max_weight_lbs: DEFAULT_SMALL_PARCEL_MAX_WEIGHT_LBS,
            token_safety_margin: time::Duration::seconds(60),
            request_timeout_ms: 10_000,
            support_contact: String::from("support@example.com"),
            parcel_carrier: ParcelCarrier::Postal,
            origin: Address::new(
                "Shipping Dock",
                "1 Warehouse Way",
                "Tempe",
                "AZ",
                "85281",
                "US",
            ),
            primary_mail_class: String::from(DEFAULT_PRIMARY_MAIL_CLASS),
            alternate_mail_classes: DEFAULT_ALTERNATE_MAIL_CLASSES
                .iter()
                .map(|class| (*class).to_owned())
                .collect(),
            circuit_breaker: CircuitBreakerConfig::default(),
            carrier_quota: CarrierQuota::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let vars = Vars(&lookup);

        let origin = Address::new(
            vars.text("SHIPQUOTE_ORIGIN_NAME", &defaults.origin.name),
            vars.text("SHIPQUOTE_ORIGIN_STREET", &defaults.origin.street),
            vars.text("SHIPQUOTE_ORIGIN_CITY", &defaults.origin.city),
            vars.text("SHIPQUOTE_ORIGIN_REGION", &defaults.origin.region),
            vars.text("SHIPQUOTE_ORIGIN_POSTAL_CODE", &defaults.origin.postal_code),
            vars.text("SHIPQUOTE_ORIGIN_COUNTRY", &defaults.origin.country),
        );

        let alternate_mail_classes = match vars.get("SHIPQUOTE_POSTAL_ALTERNATE_MAIL_CLASSES") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|class| !class.is_empty())
                .map(str::to_owned)
                .collect(),
            None => defaults.alternate_mail_classes,
        };

        let parcel_carrier = match vars.get("SHIPQUOTE_PARCEL_CARRIER") {
            Some(value) => value.parse::<ParcelCarrier>()?,
            None => defaults.parcel_carrier,
        };

        let config = Self {
            small_parcel_threshold: vars.parse(
                "SHIPQUOTE_SMALL_PARCEL_THRESHOLD",
                defaults.small_parcel_threshold,
            )?,
            small_parcel_max_weight_lbs: vars.parse(
                "SHIPQUOTE_SMALL_PARCEL_MAX_WEIGHT_LBS",
                defaults.small_parcel_max_weight_lbs,
            )?,
            token_safety_margin: time::Duration::seconds(
                vars.parse("SHIPQUOTE_TOKEN_SAFETY_MARGIN_SECS", 60_i64)?,
            ),
            request_timeout_ms: vars.parse(
                "SHIPQUOTE_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )?,
            support_contact: vars.text("SHIPQUOTE_SUPPORT_CONTACT", &defaults.support_contact),
            parcel_carrier,
            origin,
            primary_mail_class: vars.text(
                "SHIPQUOTE_POSTAL_MAIL_CLASS",
                &defaults.primary_mail_class,
            ),
            alternate_mail_classes,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: vars.parse(
                    "SHIPQUOTE_CIRCUIT_FAILURE_THRESHOLD",
                    defaults.circuit_breaker.failure_threshold,
                )?,
                open_timeout: Duration::from_secs(vars.parse(
                    "SHIPQUOTE_CIRCUIT_OPEN_SECS",
                    defaults.circuit_breaker.open_timeout.as_secs(),
                )?),
            },
            carrier_quota: CarrierQuota {
                window: Duration::from_secs(60),
                limit: vars.parse(
                    "SHIPQUOTE_CARRIER_REQUESTS_PER_MINUTE",
                    defaults.carrier_quota.limit,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.small_parcel_max_weight_lbs.is_finite() && self.small_parcel_max_weight_lbs > 0.0)
        {
            return Err(ConfigError::InvalidValue(String::from(
                "SHIPQUOTE_SMALL_PARCEL_MAX_WEIGHT_LBS",
            )));
        }
        if self.token_safety_margin.is_negative() {
            return Err(ConfigError::InvalidValue(String::from(
                "SHIPQUOTE_TOKEN_SAFETY_MARGIN_SECS",
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "SHIPQUOTE_REQUEST_TIMEOUT_MS",
            )));
        }
        if self.primary_mail_class.trim().is_empty() {
            return Err(ConfigError::InvalidValue(String::from(
                "SHIPQUOTE_POSTAL_MAIL_CLASS",
            )));
        }
        self.origin.validate()?;
        Ok(())
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn text(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name.to_owned())),
            None => Ok(default),
        }
    }
}

/// OAuth client-credentials account with a carrier.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientAccount {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Password-grant account with the freight carrier.
#[derive(Clone, PartialEq, Eq)]
pub struct FreightAccount {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl Debug for ClientAccount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAccount")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Debug for FreightAccount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreightAccount")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Carrier accounts. A carrier with no account is unconfigured.
///
/// # Environment Variables
///
/// Each carrier reads `SHIPQUOTE_<CARRIER>_BASE_URL`,
/// `SHIPQUOTE_<CARRIER>_CLIENT_ID` and `SHIPQUOTE_<CARRIER>_CLIENT_SECRET`,
/// where `<CARRIER>` is `POSTAL`, `COMMERCIAL` or `FREIGHT`. The freight
/// password grant also needs `SHIPQUOTE_FREIGHT_USERNAME` and
/// `SHIPQUOTE_FREIGHT_PASSWORD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarrierCredentials {
    pub postal: Option<ClientAccount>,
    pub commercial: Option<ClientAccount>,
    pub freight: Option<FreightAccount>,
}

pub const DEFAULT_POSTAL_BASE_URL: &str = "https://apis.usps.com";
pub const DEFAULT_COMMERCIAL_BASE_URL: &str = "https://onlinetools.ups.com";

impl CarrierCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vars = Vars(&lookup);
        let client = |prefix: &str, default_base: Option<&str>| {
            let base_url = vars
                .get(&format!("{prefix}_BASE_URL"))
                .or_else(|| default_base.map(str::to_owned))?;
            Some(ClientAccount {
                base_url,
                client_id: vars.get(&format!("{prefix}_CLIENT_ID"))?,
                client_secret: vars.get(&format!("{prefix}_CLIENT_SECRET"))?,
            })
        };

        let postal = client("SHIPQUOTE_POSTAL", Some(DEFAULT_POSTAL_BASE_URL));
        let commercial = client("SHIPQUOTE_COMMERCIAL", Some(DEFAULT_COMMERCIAL_BASE_URL));
        let freight = client("SHIPQUOTE_FREIGHT", None).and_then(|account| {
            Some(FreightAccount {
                base_url: account.base_url,
                client_id: account.client_id,
                client_secret: account.client_secret,
                username: vars.get("SHIPQUOTE_FREIGHT_USERNAME")?,
                password: vars.get("SHIPQUOTE_FREIGHT_PASSWORD")?,
            })
        });

        Self {
            postal,
            commercial,
            freight,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ValidationError;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).expect("defaults are valid");

        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.small_parcel_threshold, 5_000);
        assert_eq!(config.small_parcel_max_weight_lbs, 70.0);
        assert_eq!(config.token_safety_margin, time::Duration::seconds(60));
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("SHIPQUOTE_SMALL_PARCEL_THRESHOLD", "2500"),
            ("SHIPQUOTE_PARCEL_CARRIER", "commercial"),
            ("SHIPQUOTE_POSTAL_ALTERNATE_MAIL_CLASSES", "PRIORITY_MAIL, ,MEDIA_MAIL"),
            ("SHIPQUOTE_ORIGIN_POSTAL_CODE", "10001"),
            ("SHIPQUOTE_ORIGIN_REGION", "NY"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.small_parcel_threshold, 2_500);
        assert_eq!(config.parcel_carrier, ParcelCarrier::Commercial);
        assert_eq!(config.alternate_mail_classes, vec!["PRIORITY_MAIL", "MEDIA_MAIL"]);
        assert_eq!(config.origin.postal_code, "10001");
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        let error = EngineConfig::from_lookup(lookup(&[("SHIPQUOTE_REQUEST_TIMEOUT_MS", "soon")]))
            .expect_err("not a number");

        assert_eq!(
            error,
            ConfigError::InvalidValue(String::from("SHIPQUOTE_REQUEST_TIMEOUT_MS"))
        );
    }

    #[test]
    fn unknown_parcel_carrier_is_rejected() {
        let error = EngineConfig::from_lookup(lookup(&[("SHIPQUOTE_PARCEL_CARRIER", "pigeon")]))
            .expect_err("unknown carrier");

        assert!(matches!(
            error,
            ConfigError::Validation(ValidationError::InvalidParcelCarrier { .. })
        ));
    }

    #[test]
    fn credentials_require_every_field() {
        let credentials = CarrierCredentials::from_lookup(lookup(&[
            ("SHIPQUOTE_POSTAL_CLIENT_ID", "postal-id"),
            ("SHIPQUOTE_POSTAL_CLIENT_SECRET", "postal-secret"),
            ("SHIPQUOTE_COMMERCIAL_CLIENT_ID", "ups-id"),
            ("SHIPQUOTE_FREIGHT_BASE_URL", "https://freight.test"),
            ("SHIPQUOTE_FREIGHT_CLIENT_ID", "f-id"),
            ("SHIPQUOTE_FREIGHT_CLIENT_SECRET", "f-secret"),
            ("SHIPQUOTE_FREIGHT_USERNAME", "shipper"),
        ]));

        let postal = credentials.postal.expect("postal configured");
        assert_eq!(postal.base_url, DEFAULT_POSTAL_BASE_URL);
        assert!(credentials.commercial.is_none());
        assert!(credentials.freight.is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let account = FreightAccount {
            base_url: String::from("https://freight.test"),
            client_id: String::from("id"),
            client_secret: String::from("s3cret"),
            username: String::from("shipper"),
            password: String::from("hunter2"),
        };

        let rendered = format!("{account:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("hunter2"));
    }
}
