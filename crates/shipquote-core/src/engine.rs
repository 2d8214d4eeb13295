//! # Provider Selector / Fallback Controller
//!
//! ```text
//! total ≤ threshold ──► SmallParcelOnly ──► small-parcel adapter (final)
//! total > threshold ──► FreightAttempt ──► freight adapter
//!                          │ ok, ≥1 rate ──► Done (FREIGHT)
//!                          │ failed / no rates
//!                          ▼
//!                       WeightCheck
//!                          │ shipment weight > limit ──► WeightExceedsCarrierLimit
//!                          ▼
//!                       SmallParcelFallback ──► rates tagged as fallback (SMALL_PARCEL)
//!                                               failure ──► ProviderUnavailable
//! ```
//!
//! Steps are strictly sequential: no fallback decision is made before the
//! freight attempt has finished.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::adapters::{
    CarrierGateway, CommercialParcelAdapter, LtlFreightAdapter, PostalParcelAdapter,
};
use crate::auth::{ClientCredentialsIssuer, CredentialEncoding, PasswordGrantIssuer, TokenCache};
use crate::carrier::{CarrierAdapter, CarrierError, CarrierId, CartContext, ParcelCarrier};
use crate::clock::{Clock, SystemClock};
use crate::config::{CarrierCredentials, EngineConfig};
use crate::domain::{
    sort_rates, FreightClassTable, NormalizedRate, PackageTier, ProviderKind, RateRequest,
    TierTable,
};
use crate::error::{ConfigError, QuoteError};
use crate::http_client::{HttpClient, ReqwestHttpClient};

/// Successful quote.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuoteResult {
    /// Sorted: ascending price, zero-priced rates last.
    pub rates: Vec<NormalizedRate>,
    pub provider_used: ProviderKind,
    /// Provider the quantity threshold alone selects.
    pub expected_provider: ProviderKind,
    pub total_quantity: u64,
    pub fallback_used: bool,
    pub tier_name: String,
    /// Carrier failures that led to a fallback. Never shown to customers.
    pub carrier_errors: Vec<CarrierError>,
    pub latency_ms: u64,
}

/// Terminal quote failure with the context needed to render a response.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteFailure {
    pub error: QuoteError,
    pub expected_provider: ProviderKind,
    /// Last provider the engine tried, if it got that far.
    pub attempted_provider: Option<ProviderKind>,
    pub total_quantity: u64,
    pub fallback_attempted: bool,
    pub carrier_errors: Vec<CarrierError>,
}

impl QuoteFailure {
    pub fn user_message(&self, support_contact: &str) -> String {
        self.error.user_message(support_contact)
    }
}

impl Display for QuoteFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.error, self.error.code())
    }
}

impl std::error::Error for QuoteFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Shipping-rate resolution engine.
pub struct RateEngine {
    config: EngineConfig,
    tiers: TierTable,
    small_parcel: Arc<dyn CarrierAdapter>,
    freight: Arc<dyn CarrierAdapter>,
}

impl RateEngine {
    pub fn builder(config: EngineConfig) -> RateEngineBuilder {
        RateEngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tier_table(&self) -> &TierTable {
        &self.tiers
    }

    /// Provider the quantity threshold selects. The boundary is inclusive.
    pub fn select_provider(&self, total_quantity: u64) -> ProviderKind {
        if total_quantity <= self.config.small_parcel_threshold {
            ProviderKind::SmallParcel
        } else {
            ProviderKind::Freight
        }
    }

    pub async fn quote(&self, request: &RateRequest) -> Result<RateQuoteResult, QuoteFailure> {
        let started = Instant::now();
        let total_quantity = request.total_quantity();
        let expected_provider = self.select_provider(total_quantity);
        let tier = self.tiers.resolve(total_quantity);
        let mut run = QuoteRun {
            expected_provider,
            total_quantity,
            tier,
            carrier_errors: Vec::new(),
            started,
        };

        info!(
            total_quantity,
            tier = %tier.tier_name,
            expected_provider = %expected_provider,
            "quote started"
        );

        if let Err(error) = request.destination_address.validate() {
            warn!(%error, "destination address rejected before carrier call");
            return Err(run.fail(
                QuoteError::InvalidAddress {
                    reason: error.to_string(),
                },
                None,
                false,
            ));
        }

        let address = &request.destination_address;
        let cart = CartContext::new(total_quantity);

        if expected_provider == ProviderKind::SmallParcel {
            return match self.small_parcel.get_rates(address, tier, &cart).await {
                Ok(rates) if !rates.is_empty() => {
                    Ok(run.finish(rates, ProviderKind::SmallParcel, false))
                }
                Ok(_) => Err(run.fail(
                    QuoteError::NoRatesReturned {
                        provider: ProviderKind::SmallParcel,
                    },
                    Some(ProviderKind::SmallParcel),
                    false,
                )),
                Err(error) => {
                    let terminal = primary_error(ProviderKind::SmallParcel, &error);
                    run.carrier_errors.push(error);
                    Err(run.fail(terminal, Some(ProviderKind::SmallParcel), false))
                }
            };
        }

        let freight_error = match self.freight.get_rates(address, tier, &cart).await {
            Ok(rates) if !rates.is_empty() => {
                return Ok(run.finish(rates, ProviderKind::Freight, false));
            }
            Ok(_) => CarrierError::no_rates(self.freight.id()),
            Err(error) => error,
        };
        warn!(
            code = freight_error.code(),
            message = freight_error.message(),
            "freight quote failed, evaluating fallback"
        );
        run.carrier_errors.push(freight_error);

        let shipment_weight = tier.shipment_weight_lbs();
        let limit = self.config.small_parcel_max_weight_lbs;
        if shipment_weight > limit {
            warn!(shipment_weight, limit, "shipment too heavy for small-parcel fallback");
            return Err(run.fail(
                QuoteError::WeightExceedsCarrierLimit {
                    weight_lbs: shipment_weight,
                    limit_lbs: limit,
                },
                Some(ProviderKind::Freight),
                false,
            ));
        }

        debug!(shipment_weight, limit, "falling back to small parcel");
        match self.small_parcel.get_rates(address, tier, &cart).await {
            Ok(mut rates) if !rates.is_empty() => {
                rates.iter_mut().for_each(NormalizedRate::mark_fallback);
                Ok(run.finish(rates, ProviderKind::SmallParcel, true))
            }
            Ok(_) => {
                run.carrier_errors
                    .push(CarrierError::no_rates(self.small_parcel.id()));
                Err(run.fail(
                    QuoteError::ProviderUnavailable {
                        provider: ProviderKind::SmallParcel,
                    },
                    Some(ProviderKind::SmallParcel),
                    true,
                ))
            }
            Err(error) => {
                run.carrier_errors.push(error);
                Err(run.fail(
                    QuoteError::ProviderUnavailable {
                        provider: ProviderKind::SmallParcel,
                    },
                    Some(ProviderKind::SmallParcel),
                    true,
                ))
            }
        }
    }
}

/// Maps a final-path carrier error to the engine error taxonomy.
fn primary_error(provider: ProviderKind, error: &CarrierError) -> QuoteError {
    if error.is_no_rates() {
        QuoteError::NoRatesReturned { provider }
    } else {
        QuoteError::ProviderUnavailable { provider }
    }
}

struct QuoteRun<'a> {
    expected_provider: ProviderKind,
    total_quantity: u64,
    tier: &'a PackageTier,
    carrier_errors: Vec<CarrierError>,
    started: Instant,
}

impl QuoteRun<'_> {
    fn finish(
        self,
        mut rates: Vec<NormalizedRate>,
        provider_used: ProviderKind,
        fallback_used: bool,
    ) -> RateQuoteResult {
        sort_rates(&mut rates);
        let latency_ms = elapsed_ms(self.started);
        info!(
            provider_used = %provider_used,
            fallback_used,
            count = rates.len(),
            latency_ms,
            "quote completed"
        );

        RateQuoteResult {
            rates,
            provider_used,
            expected_provider: self.expected_provider,
            total_quantity: self.total_quantity,
            fallback_used,
            tier_name: self.tier.tier_name.clone(),
            carrier_errors: self.carrier_errors,
            latency_ms,
        }
    }

    fn fail(
        self,
        error: QuoteError,
        attempted_provider: Option<ProviderKind>,
        fallback_attempted: bool,
    ) -> QuoteFailure {
        warn!(
            code = error.code(),
            expected_provider = %self.expected_provider,
            fallback_attempted,
            latency_ms = elapsed_ms(self.started),
            "quote failed"
        );

        QuoteFailure {
            error,
            expected_provider: self.expected_provider,
            attempted_provider,
            total_quantity: self.total_quantity,
            fallback_attempted,
            carrier_errors: self.carrier_errors,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    let elapsed = started.elapsed().as_millis();
    if elapsed > u128::from(u64::MAX) {
        u64::MAX
    } else {
        elapsed as u64
    }
}

/// Assembles a [`RateEngine`] from configuration, credentials and collaborators.
///
/// Adapters injected with `with_small_parcel_adapter` / `with_freight_adapter`
/// take precedence over credential-built ones, which is how tests swap in
/// fakes.
///
/// # Example
///
/// ```rust,ignore
/// use shipquote_core::{CarrierCredentials, EngineConfig, RateEngine};
///
/// let engine = RateEngine::builder(EngineConfig::from_env()?)
///     .with_credentials(CarrierCredentials::from_env())
///     .build()?;
/// ```
pub struct RateEngineBuilder {
    config: EngineConfig,
    tiers: TierTable,
    freight_classes: FreightClassTable,
    credentials: CarrierCredentials,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Arc<dyn Clock>,
    small_parcel: Option<Arc<dyn CarrierAdapter>>,
    freight: Option<Arc<dyn CarrierAdapter>>,
}

impl RateEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tiers: TierTable::default(),
            freight_classes: FreightClassTable::default(),
            credentials: CarrierCredentials::default(),
            http_client: None,
            clock: Arc::new(SystemClock),
            small_parcel: None,
            freight: None,
        }
    }

    pub fn with_tier_table(mut self, tiers: TierTable) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_freight_classes(mut self, freight_classes: FreightClassTable) -> Self {
        self.freight_classes = freight_classes;
        self
    }

    pub fn with_credentials(mut self, credentials: CarrierCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_small_parcel_adapter(mut self, adapter: Arc<dyn CarrierAdapter>) -> Self {
        self.small_parcel = Some(adapter);
        self
    }

    pub fn with_freight_adapter(mut self, adapter: Arc<dyn CarrierAdapter>) -> Self {
        self.freight = Some(adapter);
        self
    }

    pub fn build(self) -> Result<RateEngine, ConfigError> {
        self.config.validate()?;

        let http_client = self
            .http_client
            .clone()
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let tokens = self.token_cache(&http_client);

        let small_parcel = match &self.small_parcel {
            Some(adapter) => Arc::clone(adapter),
            None => self.build_small_parcel(&http_client, &tokens)?,
        };
        let freight = match &self.freight {
            Some(adapter) => Arc::clone(adapter),
            None => self.build_freight(&http_client, &tokens)?,
        };

        if small_parcel.provider() != ProviderKind::SmallParcel {
            return Err(ConfigError::InvalidValue(format!(
                "small-parcel slot holds {} adapter",
                small_parcel.id()
            )));
        }
        if freight.provider() != ProviderKind::Freight {
            return Err(ConfigError::InvalidValue(format!(
                "freight slot holds {} adapter",
                freight.id()
            )));
        }

        info!(
            small_parcel = %small_parcel.id(),
            freight = %freight.id(),
            threshold = self.config.small_parcel_threshold,
            "rate engine ready"
        );

        Ok(RateEngine {
            config: self.config,
            tiers: self.tiers,
            small_parcel,
            freight,
        })
    }

    fn token_cache(&self, http_client: &Arc<dyn HttpClient>) -> Arc<TokenCache> {
        let timeout_ms = self.config.request_timeout_ms;
        let mut cache = TokenCache::new(Arc::clone(&self.clock), self.config.token_safety_margin);

        if let Some(account) = &self.credentials.postal {
            cache = cache.with_issuer(Arc::new(
                ClientCredentialsIssuer::new(
                    CarrierId::PostalParcel,
                    format!("{}/oauth2/v3/token", account.base_url.trim_end_matches('/')),
                    account.client_id.clone(),
                    account.client_secret.clone(),
                    CredentialEncoding::Json,
                    Arc::clone(http_client),
                )
                .with_timeout_ms(timeout_ms),
            ));
        }
        if let Some(account) = &self.credentials.commercial {
            cache = cache.with_issuer(Arc::new(
                ClientCredentialsIssuer::new(
                    CarrierId::CommercialParcel,
                    format!(
                        "{}/security/v1/oauth/token",
                        account.base_url.trim_end_matches('/')
                    ),
                    account.client_id.clone(),
                    account.client_secret.clone(),
                    CredentialEncoding::Form,
                    Arc::clone(http_client),
                )
                .with_timeout_ms(timeout_ms),
            ));
        }
        if let Some(account) = &self.credentials.freight {
            cache = cache.with_issuer(Arc::new(
                PasswordGrantIssuer::new(
                    CarrierId::LtlFreight,
                    format!("{}/oauth/token", account.base_url.trim_end_matches('/')),
                    account.client_id.clone(),
                    account.client_secret.clone(),
                    account.username.clone(),
                    account.password.clone(),
                    Arc::clone(http_client),
                )
                .with_timeout_ms(timeout_ms),
            ));
        }

        Arc::new(cache)
    }

    fn gateway(
        &self,
        carrier: CarrierId,
        http_client: &Arc<dyn HttpClient>,
        tokens: &Arc<TokenCache>,
    ) -> CarrierGateway {
        CarrierGateway::new(carrier, Arc::clone(http_client), Arc::clone(tokens))
            .with_circuit_breaker(self.config.circuit_breaker)
            .with_quota(self.config.carrier_quota)
            .with_timeout_ms(self.config.request_timeout_ms)
    }

    fn build_small_parcel(
        &self,
        http_client: &Arc<dyn HttpClient>,
        tokens: &Arc<TokenCache>,
    ) -> Result<Arc<dyn CarrierAdapter>, ConfigError> {
        let origin = self.config.origin.clone();
        match self.config.parcel_carrier {
            ParcelCarrier::Postal => {
                let account = self.credentials.postal.as_ref().ok_or_else(|| {
                    ConfigError::MissingRequired(String::from(
                        "SHIPQUOTE_POSTAL_CLIENT_ID / SHIPQUOTE_POSTAL_CLIENT_SECRET",
                    ))
                })?;
                let gateway = self.gateway(CarrierId::PostalParcel, http_client, tokens);
                Ok(Arc::new(
                    PostalParcelAdapter::new(gateway, account.base_url.clone(), origin)
                        .with_mail_classes(
                            self.config.primary_mail_class.clone(),
                            self.config.alternate_mail_classes.clone(),
                        ),
                ))
            }
            ParcelCarrier::Commercial => {
                let account = self.credentials.commercial.as_ref().ok_or_else(|| {
                    ConfigError::MissingRequired(String::from(
                        "SHIPQUOTE_COMMERCIAL_CLIENT_ID / SHIPQUOTE_COMMERCIAL_CLIENT_SECRET",
                    ))
                })?;
                let gateway = self.gateway(CarrierId::CommercialParcel, http_client, tokens);
                Ok(Arc::new(CommercialParcelAdapter::new(
                    gateway,
                    account.base_url.clone(),
                    origin,
                )))
            }
        }
    }

    fn build_freight(
        &self,
        http_client: &Arc<dyn HttpClient>,
        tokens: &Arc<TokenCache>,
    ) -> Result<Arc<dyn CarrierAdapter>, ConfigError> {
        let account = self.credentials.freight.as_ref().ok_or_else(|| {
            ConfigError::MissingRequired(String::from(
                "SHIPQUOTE_FREIGHT_BASE_URL / CLIENT_ID / CLIENT_SECRET / USERNAME / PASSWORD",
            ))
        })?;
        let gateway = self.gateway(CarrierId::LtlFreight, http_client, tokens);
        Ok(Arc::new(LtlFreightAdapter::new(
            gateway,
            account.base_url.clone(),
            self.config.origin.clone(),
            self.freight_classes.clone(),
            Arc::clone(&self.clock),
        )))
    }
}
