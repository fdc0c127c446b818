//! Stored query parser.

use super::slot::PatientIdSlot;
use crate::collaborators::{BoxFuture, Parser};
use crate::error::ParseError;
use crate::types::{Identifier, RequestHandle};

/// Reads the patient identifier from the `$XDSDocumentEntryPatientId` slot.
#[derive(Debug, Clone)]
pub struct SlotPatientIdParser {
    slot: PatientIdSlot,
}

impl SlotPatientIdParser {
    /// Creates the parser
    ///
    /// # Errors
    ///
    /// Returns the regex error if the slot matcher fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            slot: PatientIdSlot::new()?,
        })
    }

    /// Parses synchronously
    ///
    /// # Errors
    ///
    /// - [`ParseError::MissingPatientId`] if there is no patient id slot
    /// - [`ParseError::MalformedIdentifier`] if its value is not CX
    pub fn parse_body(&self, raw_message: &str) -> Result<Identifier, ParseError> {
        let slot = self
            .slot
            .locate(raw_message)
            .ok_or(ParseError::MissingPatientId)?;
        Identifier::parse_cx(&slot.cx)
    }
}

impl Parser for SlotPatientIdParser {
    fn parse(
        &self,
        raw_message: String,
        request_handler: RequestHandle,
    ) -> BoxFuture<Result<Identifier, ParseError>> {
        let result = self.parse_body(&raw_message);
        tracing::debug!(handle = %request_handler, ok = result.is_ok(), "Parsed registry stored query");
        Box::pin(async move { result })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use crate::adapters::slot::tests::find_documents;
    use crate::types::AuthorityRef;

    #[tokio::test]
    async fn test_parse_find_documents_query() {
        let parser = SlotPatientIdParser::new().unwrap();

        let identifier = parser
            .parse(find_documents("12345^^^&1.2.3&ISO"), RequestHandle::new())
            .await
            .unwrap();

        assert_eq!(identifier.value(), "12345");
        assert_eq!(identifier.assigning_authority(), &AuthorityRef::new("", "1.2.3"));
    }

    #[test]
    fn test_parse_numeric_character_references() {
        let parser = SlotPatientIdParser::new().unwrap();
        let body = find_documents("PLACEHOLDER")
            .replace("PLACEHOLDER", "12345^^^&#38;1.2.3&#38;ISO");

        let identifier = parser.parse_body(&body).unwrap();

        assert_eq!(identifier.value(), "12345");
        assert_eq!(identifier.assigning_authority(), &AuthorityRef::new("", "1.2.3"));
    }

    #[test]
    fn test_missing_slot() {
        let parser = SlotPatientIdParser::new().unwrap();
        assert_eq!(
            parser.parse_body("<rim:AdhocQuery id=\"x\"/>"),
            Err(ParseError::MissingPatientId)
        );
    }

    #[test]
    fn test_malformed_slot_value() {
        let parser = SlotPatientIdParser::new().unwrap();
        assert!(matches!(
            parser.parse_body(&find_documents("12345")),
            Err(ParseError::MalformedIdentifier { .. })
        ));
    }
}
