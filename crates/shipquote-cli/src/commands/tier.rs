use serde::Serialize;
use shipquote_core::{EngineConfig, PackageTier, ProviderKind, TierTable};

use crate::cli::TierArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TierResponseData<'a> {
    total_quantity: u64,
    provider: ProviderKind,
    shipment_weight_lbs: f64,
    tier: &'a PackageTier,
}

pub fn run(args: &TierArgs) -> Result<CommandResult, CliError> {
    let config = EngineConfig::from_env()?;
    let tiers = TierTable::default();
    let tier = tiers.resolve(args.quantity);

    let provider = if args.quantity <= config.small_parcel_threshold {
        ProviderKind::SmallParcel
    } else {
        ProviderKind::Freight
    };

    let data = serde_json::to_value(TierResponseData {
        total_quantity: args.quantity,
        provider,
        shipment_weight_lbs: tier.shipment_weight_lbs(),
        tier,
    })?;
    Ok(CommandResult::ok(data))
}
