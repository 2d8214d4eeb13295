//! # Domain Models
//!
//! Shipping domain types used by every layer of the engine.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Address`] | Ship-to / ship-from address |
//! | [`CartLine`] | Cart line; only quantity matters |
//! | [`RateRequest`] | Destination plus cart contents |
//! | [`PackageTier`] | Capacity-table row (quantity -> package) |
//! | [`TierTable`] | Ordered capacity table with a saturating ceiling |
//! | [`FreightClassTable`] | Density breakpoints -> freight class code |
//! | [`FreightItem`] | Line item submitted for a freight quote |
//! | [`NormalizedRate`] | Carrier-agnostic priced option |
//!
//! Tier resolution and freight classification are pure functions with no I/O.

mod address;
mod freight_class;
mod rate;
mod tier;

pub use address::{Address, CartLine, RateRequest};
pub use freight_class::{classify, DensityBreak, FreightClassTable, FreightItem};
pub use rate::{sort_rates, NormalizedRate, ProviderKind, FALLBACK_LABEL};
pub use tier::{resolve_tier, Dimensions, PackageTier, PackageType, TierTable};
