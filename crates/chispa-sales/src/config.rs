//! # Issuance Configuration
//!
//! Seller identity and the knobs of the issuance workflow. Both structs
//! deserialize from the application's config file and carry defaults good
//! enough for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use chispa_core::money::TaxRate;
use chispa_fiscal::DocumentKind;

// =============================================================================
// Company
// =============================================================================

/// The issuing company as printed on every invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub tax_id: String,
    pub address: String,
    /// Free-text tax standing label printed in the header.
    pub tax_standing: String,
}

impl Default for CompanyInfo {
    fn default() -> Self {
        CompanyInfo {
            name: "Chispa Electricidad".to_string(),
            tax_id: "20-12345678-6".to_string(),
            address: "Av. San Martin 450".to_string(),
            tax_standing: "Registered Company".to_string(),
        }
    }
}

// =============================================================================
// Numbering
// =============================================================================

/// Where the next invoice number comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Numbering {
    /// Derived from the local ledger (highest stored sequence plus one).
    Local,
    /// Asked of the authority via `last_authorized_sequence`. Issuance
    /// fails if the authority does not track numbering.
    Authority,
}

// =============================================================================
// Issuance Config
// =============================================================================

/// Workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    /// Point of sale registered with the authority, 1..=9999.
    pub point_of_sale: u16,

    /// Document kind requested from the authority.
    pub document_kind: DocumentKind,

    /// Tax rate applied to every sale, in basis points.
    pub tax_rate_bps: u32,

    /// Source of invoice numbers.
    pub numbering: Numbering,

    /// How long to wait for the authorization service before treating it
    /// as unavailable.
    #[serde(with = "duration_secs")]
    pub authorizer_timeout: Duration,

    /// Directory rendered documents are written to.
    pub output_dir: PathBuf,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        IssuanceConfig {
            point_of_sale: 1,
            document_kind: DocumentKind::InvoiceB,
            tax_rate_bps: TaxRate::STANDARD.bps(),
            numbering: Numbering::Local,
            authorizer_timeout: Duration::from_secs(30),
            output_dir: PathBuf::from("./invoices"),
        }
    }
}

impl IssuanceConfig {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

/// Durations as whole seconds in config files.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = IssuanceConfig::default();
        assert_eq!(config.point_of_sale, 1);
        assert_eq!(config.document_kind, DocumentKind::InvoiceB);
        assert_eq!(config.tax_rate_bps, 2100);
        assert_eq!(config.numbering, Numbering::Local);
        assert_eq!(config.authorizer_timeout, Duration::from_secs(30));
    }

    #[test]
    fn deserializes_partial_config() {
        let config: IssuanceConfig =
            serde_json::from_str(r#"{"point_of_sale": 3, "authorizer_timeout": 5}"#).unwrap();
        assert_eq!(config.point_of_sale, 3);
        assert_eq!(config.authorizer_timeout, Duration::from_secs(5));
        // untouched fields keep their defaults
        assert_eq!(config.tax_rate_bps, 2100);
    }

    #[test]
    fn numbering_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Numbering::Authority).unwrap(),
            "\"authority\""
        );
    }
}
