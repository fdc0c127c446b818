//! Stored query enricher.

use super::slot::PatientIdSlot;
use crate::collaborators::{BoxFuture, Enricher};
use crate::error::EnrichError;
use crate::types::{EnterpriseIdentifier, RequestHandle};

/// Rewrites the `$XDSDocumentEntryPatientId` slot to the enterprise CX.
#[derive(Debug, Clone)]
pub struct SlotPatientIdEnricher {
    slot: PatientIdSlot,
}

impl SlotPatientIdEnricher {
    /// Creates the enricher
    ///
    /// # Errors
    ///
    /// Returns the regex error if the slot matcher fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            slot: PatientIdSlot::new()?,
        })
    }
}

impl Enricher for SlotPatientIdEnricher {
    fn enrich(
        &self,
        request_handler: RequestHandle,
        raw_message: String,
        enterprise_identifier: EnterpriseIdentifier,
    ) -> BoxFuture<Result<String, EnrichError>> {
        let result = self
            .slot
            .replace(&raw_message, &enterprise_identifier.to_cx())
            .ok_or(EnrichError::MissingPatientIdSlot);
        tracing::debug!(handle = %request_handler, ok = result.is_ok(), "Enriched registry stored query");
        Box::pin(async move { result })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use crate::adapters::slot::tests::find_documents;
    use crate::types::AuthorityRef;

    fn enterprise() -> EnterpriseIdentifier {
        EnterpriseIdentifier::new("EID001", AuthorityRef::new("ENT", "1.2.3.4"))
    }

    #[tokio::test]
    async fn test_enrich_rewrites_patient_id() {
        let enricher = SlotPatientIdEnricher::new().unwrap();

        let enriched = enricher
            .enrich(RequestHandle::new(), find_documents("12345^^^&1.2.3&ISO"), enterprise())
            .await
            .unwrap();

        assert_eq!(enriched, find_documents("EID001^^^ENT&1.2.3.4&ISO"));
    }

    #[tokio::test]
    async fn test_enrich_without_slot() {
        let enricher = SlotPatientIdEnricher::new().unwrap();

        let result = enricher
            .enrich(RequestHandle::new(), "<rim:AdhocQuery/>".to_string(), enterprise())
            .await;

        assert_eq!(result, Err(EnrichError::MissingPatientIdSlot));
    }
}
