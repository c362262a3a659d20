//! # Stub Authorizer
//!
//! A deterministic in-process authorizer for development and tests. It
//! approves everything by default, handing out the same well-known code the
//! authority's own test environment returns, with a ten-day expiry.

use async_trait::async_trait;
use chrono::Days;
use tracing::debug;

use crate::{AuthorizationOutcome, AuthorizationRequest, Authorizer, FiscalError};

/// The fixed code returned for approved requests.
pub const STUB_AUTHORIZATION_CODE: &str = "75319266109747";

/// Days an authorization code stays valid.
pub const CODE_VALIDITY_DAYS: u64 = 10;

/// Always-approving authorizer, optionally switched to reject or fail for
/// exercising the error paths.
#[derive(Debug, Clone, Default)]
pub struct StubAuthorizer {
    reject_with: Option<Vec<String>>,
    unavailable: bool,
}

impl StubAuthorizer {
    /// An authorizer that approves every request.
    pub fn approving() -> Self {
        StubAuthorizer::default()
    }

    /// An authorizer that rejects every request with the given reasons.
    pub fn rejecting(reasons: Vec<String>) -> Self {
        StubAuthorizer {
            reject_with: Some(reasons),
            unavailable: false,
        }
    }

    /// An authorizer that fails as unreachable.
    pub fn unavailable() -> Self {
        StubAuthorizer {
            reject_with: None,
            unavailable: true,
        }
    }
}

#[async_trait]
impl Authorizer for StubAuthorizer {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, FiscalError> {
        if self.unavailable {
            return Err(FiscalError::Unavailable(
                "stub configured as unreachable".to_string(),
            ));
        }

        if let Some(reasons) = &self.reject_with {
            debug!(sequence = request.sequence, "stub rejecting request");
            return Ok(AuthorizationOutcome::Rejected {
                reasons: reasons.clone(),
            });
        }

        let expires_on = request
            .issue_date
            .checked_add_days(Days::new(CODE_VALIDITY_DAYS))
            .ok_or_else(|| FiscalError::MalformedResponse("expiry date overflow".to_string()))?;

        debug!(
            point_of_sale = request.point_of_sale,
            sequence = request.sequence,
            total_cents = request.total_cents,
            "stub approving request"
        );

        Ok(AuthorizationOutcome::Approved {
            code: STUB_AUTHORIZATION_CODE.to_string(),
            expires_on,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomerDocument, DocumentKind};
    use chrono::NaiveDate;

    fn sample_request() -> AuthorizationRequest {
        AuthorizationRequest {
            point_of_sale: 1,
            sequence: 1,
            document_kind: DocumentKind::InvoiceB,
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            net_cents: 195_000,
            tax_cents: 40_950,
            total_cents: 235_950,
            customer_document: CustomerDocument::Unidentified,
        }
    }

    #[tokio::test]
    async fn approves_with_fixed_code_and_ten_day_expiry() {
        let outcome = StubAuthorizer::approving()
            .authorize(&sample_request())
            .await
            .unwrap();

        match outcome {
            AuthorizationOutcome::Approved { code, expires_on } => {
                assert_eq!(code, STUB_AUTHORIZATION_CODE);
                assert_eq!(expires_on, NaiveDate::from_ymd_opt(2024, 3, 25).unwrap());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_when_configured() {
        let outcome = StubAuthorizer::rejecting(vec!["invalid totals".to_string()])
            .authorize(&sample_request())
            .await
            .unwrap();

        match outcome {
            AuthorizationOutcome::Rejected { reasons } => {
                assert_eq!(reasons, vec!["invalid totals".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unavailable_when_configured() {
        let err = StubAuthorizer::unavailable()
            .authorize(&sample_request())
            .await
            .unwrap_err();
        assert!(matches!(err, FiscalError::Unavailable(_)));
    }

    #[tokio::test]
    async fn default_sequence_tracking_is_none() {
        let last = StubAuthorizer::approving()
            .last_authorized_sequence(1, DocumentKind::InvoiceB)
            .await
            .unwrap();
        assert_eq!(last, None);
    }
}
