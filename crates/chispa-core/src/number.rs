//! # Invoice Numbers
//!
//! Fiscal invoice numbers in `PPPP-NNNNNNNN` form: a four-digit point of
//! sale, a hyphen, and an eight-digit zero-padded sequence. Sequences start
//! at 1 and increase monotonically per point of sale; a number is considered
//! used only once an invoice carrying it has been persisted.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Width of the point-of-sale prefix.
pub const POINT_OF_SALE_DIGITS: usize = 4;
/// Width of the sequence part.
pub const SEQUENCE_DIGITS: usize = 8;

/// A parsed fiscal invoice number.
///
/// ```
/// use chispa_core::number::InvoiceNumber;
///
/// let first = InvoiceNumber::first(1);
/// assert_eq!(first.to_string(), "0001-00000001");
/// assert_eq!(first.next().to_string(), "0001-00000002");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvoiceNumber {
    point_of_sale: u16,
    sequence: u64,
}

impl InvoiceNumber {
    /// Builds an invoice number from its parts.
    ///
    /// Parts out of the printable range (point of sale > 9999 or sequence
    /// > 99999999) are rejected, since they could not round-trip through
    /// the stored text form.
    pub fn new(point_of_sale: u16, sequence: u64) -> Result<Self, ValidationError> {
        if point_of_sale > 9999 {
            return Err(ValidationError::OutOfRange {
                field: "point_of_sale".to_string(),
                min: 0,
                max: 9999,
            });
        }
        if sequence == 0 || sequence > 99_999_999 {
            return Err(ValidationError::OutOfRange {
                field: "sequence".to_string(),
                min: 1,
                max: 99_999_999,
            });
        }
        Ok(InvoiceNumber {
            point_of_sale,
            sequence,
        })
    }

    /// The first number issued by a point of sale.
    pub fn first(point_of_sale: u16) -> Self {
        InvoiceNumber {
            point_of_sale,
            sequence: 1,
        }
    }

    /// The number immediately following this one.
    pub fn next(self) -> Self {
        InvoiceNumber {
            sequence: self.sequence + 1,
            ..self
        }
    }

    #[inline]
    pub fn point_of_sale(&self) -> u16 {
        self.point_of_sale
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The `PPPP-` prefix shared by all numbers of this point of sale.
    pub fn prefix(point_of_sale: u16) -> String {
        format!("{:04}-", point_of_sale)
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:08}", self.point_of_sale, self.sequence)
    }
}

impl FromStr for InvoiceNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "invoice_number".to_string(),
            reason: "expected PPPP-NNNNNNNN".to_string(),
        };

        let (pos, seq) = s.split_once('-').ok_or_else(invalid)?;
        if pos.len() != POINT_OF_SALE_DIGITS || seq.len() != SEQUENCE_DIGITS {
            return Err(invalid());
        }
        if !pos.bytes().all(|b| b.is_ascii_digit()) || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let point_of_sale: u16 = pos.parse().map_err(|_| invalid())?;
        let sequence: u64 = seq.parse().map_err(|_| invalid())?;
        InvoiceNumber::new(point_of_sale, sequence)
    }
}

// Serialized as the plain `PPPP-NNNNNNNN` string, which is also exactly
// what the ledger stores.
impl Serialize for InvoiceNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InvoiceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded() {
        let number = InvoiceNumber::new(1, 42).unwrap();
        assert_eq!(number.to_string(), "0001-00000042");
        assert_eq!(InvoiceNumber::first(31).to_string(), "0031-00000001");
    }

    #[test]
    fn parses_round_trip() {
        let number: InvoiceNumber = "0001-00000042".parse().unwrap();
        assert_eq!(number.point_of_sale(), 1);
        assert_eq!(number.sequence(), 42);
        assert_eq!(number.to_string(), "0001-00000042");
    }

    #[test]
    fn next_increments_sequence_only() {
        let number = InvoiceNumber::new(3, 99).unwrap();
        let next = number.next();
        assert_eq!(next.point_of_sale(), 3);
        assert_eq!(next.sequence(), 100);
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "",
            "0001",
            "1-1",
            "0001-0000001",    // sequence too short
            "00001-00000001",  // point of sale too long
            "0001-0000000a",
            "0001_00000001",
            "0001-00000000",   // sequence zero
        ] {
            assert!(bad.parse::<InvoiceNumber>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn serde_as_string() {
        let number = InvoiceNumber::new(1, 7).unwrap();
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, "\"0001-00000007\"");
        let back: InvoiceNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, number);
    }

    #[test]
    fn prefix_matches_display() {
        assert_eq!(InvoiceNumber::prefix(1), "0001-");
        assert!(InvoiceNumber::first(1).to_string().starts_with(&InvoiceNumber::prefix(1)));
    }
}
