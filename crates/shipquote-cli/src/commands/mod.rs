mod freight_class;
mod quote;
mod tier;

use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Exit code for a quote that completed with `success: false`.
pub const QUOTE_FAILED_EXIT_CODE: u8 = 3;

#[derive(Debug)]
pub struct CommandResult {
    pub data: Value,
    pub exit_code: u8,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self { data, exit_code: 0 }
    }

    pub fn with_exit_code(mut self, exit_code: u8) -> Self {
        self.exit_code = exit_code;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Quote(args) => quote::run(args).await,
        Command::Tier(args) => tier::run(args),
        Command::FreightClass(args) => freight_class::run(args),
    }
}
