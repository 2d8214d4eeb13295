use serde::Serialize;
use shipquote_core::{Dimensions, FreightClassTable};

use crate::cli::FreightClassArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreightClassData {
    freight_class: String,
    density_lbs_per_cubic_foot: f64,
    cubic_feet: f64,
}

pub fn run(args: &FreightClassArgs) -> Result<CommandResult, CliError> {
    require_positive("weight", args.weight)?;
    require_positive("length", args.length)?;
    require_positive("width", args.width)?;
    require_positive("height", args.height)?;

    let dimensions = Dimensions::new(args.length, args.width, args.height);
    let cubic_feet = dimensions.cubic_feet();

    let freight_class = FreightClassTable::default()
        .classify(args.weight, dimensions)
        .to_owned();

    let data = serde_json::to_value(FreightClassData {
        freight_class,
        density_lbs_per_cubic_foot: args.weight / cubic_feet,
        cubic_feet,
    })?;
    Ok(CommandResult::ok(data))
}

fn require_positive(field: &str, value: f64) -> Result<(), CliError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CliError::Command(format!("--{field} must be a positive number, got {value}")))
    }
}
