//! CLI argument definitions for shipquote.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Quote shipping rates against live carriers |
//! | `tier` | Show the package tier and provider for a quantity |
//! | `freight-class` | Classify a package by density |
//!
//! # Examples
//!
//! ```bash
//! # Quote from a checkout request file
//! shipquote quote --request cart.json --pretty
//!
//! # Quote from flags
//! shipquote quote --postal-code 85004 --region AZ --quantity 3000
//!
//! # Inspect the tier table
//! shipquote tier 5001
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Shipping-rate resolution CLI.
///
/// Carrier credentials and engine settings are read from `SHIPQUOTE_*`
/// environment variables. Logs go to stderr; set `SHIPQUOTE_LOG=debug` for
/// decision-level tracing.
#[derive(Debug, Parser)]
#[command(name = "shipquote", author, version, about = "Shipping-rate resolution CLI")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Quote shipping rates for a destination and cart.
    Quote(QuoteArgs),
    /// Resolve the package tier for a total quantity.
    Tier(TierArgs),
    /// Compute the freight class for a package.
    FreightClass(FreightClassArgs),
}

#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    /// JSON file holding `{destinationAddress, cartLines}`.
    #[arg(long, conflicts_with_all = ["postal_code", "quantity"])]
    pub request: Option<PathBuf>,

    /// Destination postal code.
    #[arg(long, required_unless_present = "request", requires = "quantity")]
    pub postal_code: Option<String>,

    /// Destination state or region code.
    #[arg(long, default_value = "")]
    pub region: String,

    #[arg(long, default_value = "")]
    pub city: String,

    #[arg(long, default_value = "")]
    pub street: String,

    #[arg(long, default_value = "US")]
    pub country: String,

    /// Total unit quantity in the cart.
    #[arg(long, required_unless_present = "request")]
    pub quantity: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct TierArgs {
    /// Total unit quantity.
    pub quantity: u64,
}

#[derive(Debug, Clone, Args)]
pub struct FreightClassArgs {
    /// Weight in pounds.
    #[arg(long)]
    pub weight: f64,

    /// Length in inches.
    #[arg(long)]
    pub length: f64,

    /// Width in inches.
    #[arg(long)]
    pub width: f64,

    /// Height in inches.
    #[arg(long)]
    pub height: f64,
}
