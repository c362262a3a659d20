//! # Validation Rules
//!
//! Pure validation for catalog input and taxpayer identifiers.
//!
//! ## Tax id check digit
//! National taxpayer ids are 11 numeric digits; the last one is a
//! modulus-11 check digit over the first ten, with weights
//! `[5, 4, 3, 2, 7, 6, 5, 4, 3, 2]`:
//!
//! ```text
//! r = (sum of digit[i] * weight[i]) % 11
//! check = r        if r < 2
//!         11 - r   otherwise
//! ```
//!
//! An empty or absent id is valid: it stands for an unidentified final
//! consumer.

use crate::error::ValidationError;
use crate::types::{Product, ProductFields};

/// Required length of a product business code.
pub const PRODUCT_ID_LENGTH: usize = 4;

/// Longest accepted product or customer name.
pub const MAX_NAME_LENGTH: usize = 100;

/// Highest representable price: $999,999.99.
pub const MAX_PRICE_CENTS: i64 = 99_999_999;

/// Highest quantity accepted on a single sale line. Keeps
/// `quantity * unit_price_cents` far below i64 overflow even at
/// [`MAX_PRICE_CENTS`].
pub const MAX_LINE_QUANTITY: i64 = 999_999;

const TAX_ID_WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

// =============================================================================
// Tax Id
// =============================================================================

/// Validates a taxpayer id against the modulus-11 check digit.
///
/// Hyphens and whitespace are ignored, so `20-44551555-9` and
/// `20445515559` are equivalent. Empty input is valid (unidentified final
/// consumer).
pub fn is_valid_tax_id(raw: &str) -> bool {
    let cleaned = clean_tax_id(raw);
    if cleaned.is_empty() {
        return true;
    }
    if cleaned.len() != 11 || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = cleaned.bytes().map(|b| (b - b'0') as u32).collect();
    let sum: u32 = digits[..10]
        .iter()
        .zip(TAX_ID_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    let remainder = sum % 11;
    let expected = if remainder < 2 { remainder } else { 11 - remainder };

    digits[10] == expected
}

/// Formats an 11-digit taxpayer id as `XX-XXXXXXXX-X`.
///
/// Input that is not 11 digits after cleaning is returned unchanged.
pub fn format_tax_id(raw: &str) -> String {
    let cleaned = clean_tax_id(raw);
    if cleaned.len() == 11 {
        format!("{}-{}-{}", &cleaned[..2], &cleaned[2..10], &cleaned[10..])
    } else {
        raw.to_string()
    }
}

fn clean_tax_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

// =============================================================================
// Product
// =============================================================================

/// Validates a product business code: exactly [`PRODUCT_ID_LENGTH`] ASCII
/// digits.
pub fn validate_product_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }
    if id.len() != PRODUCT_ID_LENGTH || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "id".to_string(),
            reason: format!("expected {} numeric digits", PRODUCT_ID_LENGTH),
        });
    }
    Ok(())
}

/// Validates the mutable fields of a product.
pub fn validate_product_fields(fields: &ProductFields) -> Result<(), ValidationError> {
    if fields.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    if fields.name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LENGTH,
        });
    }
    for (field, cents) in [
        ("cost", fields.cost_cents),
        ("sale_price", fields.sale_price_cents),
    ] {
        if cents <= 0 {
            return Err(ValidationError::MustBePositive {
                field: field.to_string(),
            });
        }
        if cents > MAX_PRICE_CENTS {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 1,
                max: MAX_PRICE_CENTS,
            });
        }
    }
    if fields.quantity < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a complete product for catalog insertion.
pub fn validate_new_product(product: &Product) -> Result<(), ValidationError> {
    validate_product_id(&product.id)?;
    validate_product_fields(&ProductFields::from_product(product))
}

// =============================================================================
// Unit Tests
// =============================================================================
