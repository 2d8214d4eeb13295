use std::path::Path;

use shipquote_core::{
    Address, CarrierCredentials, CartLine, EngineConfig, RateEngine, RateQuoteResponse,
    RateRequest,
};
use tracing::info;

use crate::cli::QuoteArgs;
use crate::error::CliError;

use super::{CommandResult, QUOTE_FAILED_EXIT_CODE};

pub async fn run(args: &QuoteArgs) -> Result<CommandResult, CliError> {
    let request = build_request(args)?;

    let config = EngineConfig::from_env()?;
    let support_contact = config.support_contact.clone();
    let engine = RateEngine::builder(config)
        .with_credentials(CarrierCredentials::from_env())
        .build()?;

    info!(
        total_quantity = request.total_quantity(),
        postal_code = %request.destination_address.postal_code_5(),
        "quoting shipping rates"
    );
    let outcome = engine.quote(&request).await;
    let response = RateQuoteResponse::from_outcome(&outcome, &support_contact);

    let result = CommandResult::ok(serde_json::to_value(&response)?);
    if response.success {
        Ok(result)
    } else {
        Ok(result.with_exit_code(QUOTE_FAILED_EXIT_CODE))
    }
}

fn build_request(args: &QuoteArgs) -> Result<RateRequest, CliError> {
    if let Some(path) = &args.request {
        return load_request(path);
    }

    let (Some(postal_code), Some(quantity)) = (&args.postal_code, args.quantity) else {
        return Err(CliError::Command(String::from(
            "either --request or both --postal-code and --quantity are required",
        )));
    };

    let address = Address::new(
        "",
        args.street.as_str(),
        args.city.as_str(),
        args.region.as_str(),
        postal_code.as_str(),
        args.country.as_str(),
    );
    Ok(RateRequest::new(address, vec![CartLine::new(quantity)])?)
}

fn load_request(path: &Path) -> Result<RateRequest, CliError> {
    let raw = std::fs::read_to_string(path)?;
    let request: RateRequest = serde_json::from_str(&raw)?;
    request.validate_cart()?;
    Ok(request)
}
