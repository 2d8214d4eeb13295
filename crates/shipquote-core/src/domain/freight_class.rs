use serde::{Deserialize, Serialize};

use crate::domain::{Dimensions, PackageTier, PackageType};
use crate::ValidationError;

/// Density breakpoint: freight at or above `min_density` (lb/ft³) ships as `class_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityBreak {
    pub min_density: f64,
    pub class_code: String,
}

/// Density-to-class lookup ordered by descending density.
///
/// Breakpoints are carrier-contract values; the default follows the common
/// 18-class NMFC density scale.
#[derive(Debug, Clone, PartialEq)]
pub struct FreightClassTable {
    breaks: Vec<DensityBreak>,
    /// Class used when density falls below every breakpoint.
    lightest: String,
}

impl Default for FreightClassTable {
    fn default() -> Self {
        let breaks = [
            (50.0, "50"),
            (35.0, "55"),
            (30.0, "60"),
            (22.5, "65"),
            (15.0, "70"),
            (13.5, "77.5"),
            (12.0, "85"),
            (10.5, "92.5"),
            (9.0, "100"),
            (8.0, "110"),
            (7.0, "125"),
            (6.0, "150"),
            (5.0, "175"),
            (4.0, "200"),
            (3.0, "250"),
            (2.0, "300"),
            (1.0, "400"),
        ]
        .into_iter()
        .map(|(min_density, class_code)| DensityBreak {
            min_density,
            class_code: class_code.to_owned(),
        })
        .collect();

        Self {
            breaks,
            lightest: String::from("500"),
        }
    }
}

impl FreightClassTable {
    pub fn new(
        breaks: Vec<DensityBreak>,
        lightest: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let descending = breaks
            .windows(2)
            .all(|pair| pair[0].min_density > pair[1].min_density);
        if !descending {
            return Err(ValidationError::FreightClassOrdering);
        }

        Ok(Self {
            breaks,
            lightest: lightest.into(),
        })
    }

    /// Maps weight and dimensions to a class code. Denser freight gets a lower class.
    ///
    /// Callers guarantee non-zero dimensions; every tier table entry is validated for that.
    pub fn classify(&self, weight_lbs: f64, dimensions_in: Dimensions) -> &str {
        let density = weight_lbs / dimensions_in.cubic_feet();
        self.breaks
            .iter()
            .find(|entry| density >= entry.min_density)
            .map(|entry| entry.class_code.as_str())
            .unwrap_or(self.lightest.as_str())
    }
}

/// Classifies with the default density table.
pub fn classify(weight_lbs: f64, dimensions_in: Dimensions) -> String {
    FreightClassTable::default()
        .classify(weight_lbs, dimensions_in)
        .to_owned()
}

/// Line item submitted to the freight carrier for one quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreightItem {
    pub description: String,
    /// Total weight across every package.
    pub weight: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub quantity: u32,
    pub freight_class_code: String,
    pub is_stackable: bool,
    pub package_type: PackageType,
}

impl FreightItem {
    pub fn from_tier(tier: &PackageTier, classes: &FreightClassTable) -> Self {
        let dims = tier.dimensions_in;
        Self {
            description: format!(
                "{} ({} x {})",
                tier.tier_name, tier.package_count, tier.package_type
            ),
            weight: tier.shipment_weight_lbs(),
            length: dims.length,
            width: dims.width,
            height: dims.height,
            quantity: tier.package_count,
            freight_class_code: classes.classify(tier.weight_lbs, dims).to_owned(),
            is_stackable: tier.package_type != PackageType::Pallet,
            package_type: tier.package_type,
        }
    }
}
