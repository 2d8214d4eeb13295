use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Postal address used for ship-to and ship-from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub name: String,
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    String::from("US")
}

impl Address {
    pub fn new(
        name: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
        region: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            street: street.into(),
            city: city.into(),
            region: region.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }

    /// Checks the fields a carrier request cannot be built without.
    ///
    /// Full address validation happens upstream; this only rejects addresses
    /// that are degenerate enough that no carrier could classify them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.postal_code.trim().is_empty() {
            return Err(ValidationError::EmptyAddressField {
                field: "postalCode",
            });
        }
        if self.region.trim().is_empty() {
            return Err(ValidationError::EmptyAddressField { field: "region" });
        }

        let country = self.country.trim();
        if country.len() != 2 || !country.bytes().all(|byte| byte.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCountry {
                value: self.country.clone(),
            });
        }

        Ok(())
    }

    /// First five digits of a US ZIP+4, or the trimmed postal code otherwise.
    pub fn postal_code_5(&self) -> &str {
        let code = self.postal_code.trim();
        match code.split_once('-') {
            Some((zip, _)) => zip,
            None if code.len() > 5 && code.bytes().all(|byte| byte.is_ascii_digit()) => &code[..5],
            None => code,
        }
    }

    pub fn country_code(&self) -> String {
        self.country.trim().to_ascii_uppercase()
    }

    pub fn region_code(&self) -> String {
        self.region.trim().to_ascii_uppercase()
    }
}

/// One line of the shopper's cart. Only the quantity matters for shipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub quantity: u64,
}

impl CartLine {
    pub const fn new(quantity: u64) -> Self {
        Self { quantity }
    }
}

/// Rate-quote request supplied by the checkout collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequest {
    pub destination_address: Address,
    pub cart_lines: Vec<CartLine>,
}

impl RateRequest {
    pub fn new(
        destination_address: Address,
        cart_lines: Vec<CartLine>,
    ) -> Result<Self, ValidationError> {
        let request = Self {
            destination_address,
            cart_lines,
        };
        request.validate_cart()?;
        Ok(request)
    }

    pub fn validate_cart(&self) -> Result<(), ValidationError> {
        if self.cart_lines.is_empty() {
            return Err(ValidationError::EmptyCart);
        }
        if let Some(index) = self.cart_lines.iter().position(|line| line.quantity == 0) {
            return Err(ValidationError::ZeroQuantity { index });
        }
        Ok(())
    }

    pub fn total_quantity(&self) -> u64 {
        self.cart_lines
            .iter()
            .fold(0_u64, |total, line| total.saturating_add(line.quantity))
    }
}
