use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Physical packaging used for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageType {
    Bag,
    Box,
    Pallet,
}

impl PackageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bag => "BAG",
            Self::Box => "BOX",
            Self::Pallet => "PALLET",
        }
    }
}

impl Display for PackageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package dimensions in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    pub fn cubic_feet(self) -> f64 {
        self.length * self.width * self.height / 1_728.0
    }

    fn is_positive(self) -> bool {
        [self.length, self.width, self.height]
            .iter()
            .all(|value| value.is_finite() && *value > 0.0)
    }
}

/// One row of the capacity table: how an order of up to `max_quantity` units ships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageTier {
    pub tier_name: String,
    pub max_quantity: u64,
    pub package_count: u32,
    pub package_type: PackageType,
    /// Weight of a single package.
    pub weight_lbs: f64,
    /// Dimensions of a single package.
    pub dimensions_in: Dimensions,
}

impl PackageTier {
    pub fn new(
        tier_name: impl Into<String>,
        max_quantity: u64,
        package_count: u32,
        package_type: PackageType,
        weight_lbs: f64,
        dimensions_in: Dimensions,
    ) -> Self {
        Self {
            tier_name: tier_name.into(),
            max_quantity,
            package_count,
            package_type,
            weight_lbs,
            dimensions_in,
        }
    }

    /// Weight of the whole shipment across every package.
    pub fn shipment_weight_lbs(&self) -> f64 {
        self.weight_lbs * f64::from(self.package_count)
    }
}

/// Ordered capacity table. The last tier is the ceiling for every larger order.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: Vec<PackageTier>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

impl TierTable {
    pub fn new(tiers: Vec<PackageTier>) -> Result<Self, ValidationError> {
        let Some(first) = tiers.first() else {
            return Err(ValidationError::EmptyTierTable);
        };
        if first.max_quantity == 0 {
            return Err(ValidationError::TierOrdering {
                name: first.tier_name.clone(),
                max: 0,
                previous: 0,
            });
        }

        for tier in &tiers {
            if tier.package_count == 0
                || !(tier.weight_lbs.is_finite() && tier.weight_lbs > 0.0)
                || !tier.dimensions_in.is_positive()
            {
                return Err(ValidationError::TierGeometry {
                    name: tier.tier_name.clone(),
                });
            }
        }

        for pair in tiers.windows(2) {
            if pair[1].max_quantity <= pair[0].max_quantity {
                return Err(ValidationError::TierOrdering {
                    name: pair[1].tier_name.clone(),
                    max: pair[1].max_quantity,
                    previous: pair[0].max_quantity,
                });
            }
        }

        Ok(Self { tiers })
    }

    /// Returns the first tier that can hold `total_quantity`, saturating at the last tier.
    ///
    /// Never fails: a zero quantity resolves to the smallest tier and quantities past
    /// every threshold resolve to the largest. Maximum order size is enforced upstream.
    pub fn resolve(&self, total_quantity: u64) -> &PackageTier {
        let index = self
            .tiers
            .iter()
            .position(|tier| tier.max_quantity >= total_quantity)
            .unwrap_or(self.tiers.len() - 1);
        &self.tiers[index]
    }

    pub fn tiers(&self) -> &[PackageTier] {
        &self.tiers
    }
}

/// Resolves a tier from the built-in capacity table.
pub fn resolve_tier(total_quantity: u64) -> PackageTier {
    TierTable::default().resolve(total_quantity).clone()
}

/// Name, max quantity, package count, packaging, weight per package (lb),
/// length x width x height (in).
type TierRow = (&'static str, u64, u32, PackageType, f64, [f64; 3]);

const DEFAULT_TIER_ROWS: [TierRow; 11] = [
    ("Small Bag", 500, 1, PackageType::Bag, 2.0, [12.0, 9.0, 2.0]),
    ("Large Bag", 1_000, 1, PackageType::Bag, 3.5, [15.0, 12.0, 3.0]),
    ("Small Box", 2_500, 1, PackageType::Box, 6.0, [12.0, 12.0, 6.0]),
    ("Medium Box", 5_000, 1, PackageType::Box, 11.0, [16.0, 12.0, 8.0]),
    ("Large Box", 10_000, 1, PackageType::Box, 19.0, [18.0, 18.0, 12.0]),
    ("Master Carton", 25_000, 1, PackageType::Box, 36.0, [24.0, 18.0, 18.0]),
    ("Freight Carton", 50_000, 1, PackageType::Box, 65.0, [24.0, 20.0, 20.0]),
    ("Quarter Pallet", 100_000, 1, PackageType::Pallet, 150.0, [48.0, 40.0, 24.0]),
    ("Half Pallet", 250_000, 1, PackageType::Pallet, 320.0, [48.0, 40.0, 36.0]),
    ("Full Pallet", 500_000, 1, PackageType::Pallet, 600.0, [48.0, 40.0, 48.0]),
    ("Double Pallet", 1_000_000, 2, PackageType::Pallet, 600.0, [48.0, 40.0, 48.0]),
];

fn default_tiers() -> Vec<PackageTier> {
    DEFAULT_TIER_ROWS
        .iter()
        .map(|&(name, max_quantity, count, package_type, weight, [length, width, height])| {
            PackageTier::new(
                name,
                max_quantity,
                count,
                package_type,
                weight,
                Dimensions::new(length, width, height),
            )
        })
        .collect()
}
