//! Static cross-reference table.

use crate::collaborators::{BoxFuture, Resolver};
use crate::config::{keys, parse_properties, read_properties_file};
use crate::error::{ConfigError, ResolveError};
use crate::types::{AuthorityRef, EnterpriseIdentifier, Identifier, RequestHandle};
use std::collections::HashMap;
use std::path::Path;

/// In-memory PIX cross-reference.
///
/// Local identifiers are matched on value and authority OID; the namespace
/// name is ignored. The enterprise identifier is issued under whatever
/// authority the pipeline requests.
#[derive(Debug, Clone, Default)]
pub struct StaticCrossReference {
    entries: HashMap<(String, String), String>,
}

impl StaticCrossReference {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping from a local identifier to an enterprise id value
    #[must_use]
    pub fn with_entry(mut self, local: &Identifier, enterprise_id: impl Into<String>) -> Self {
        self.entries.insert(Self::key(local), enterprise_id.into());
        self
    }

    /// Parses `local_cx=enterprise_id` lines
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed local CX or an empty
    /// enterprise id.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Self::from_pairs(parse_properties(contents))
    }

    /// Loads a `local_cx=enterprise_id` file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or holds a bad line.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let table = Self::from_pairs(read_properties_file(path)?)?;
        tracing::info!(path = %path.display(), entries = table.len(), "Loaded patient cross-reference table");
        Ok(table)
    }

    fn from_pairs(pairs: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut table = Self::new();
        for (local_cx, enterprise_id) in pairs {
            let invalid = |reason: String| ConfigError::Invalid {
                key: keys::XREF_FILE.to_string(),
                value: format!("{local_cx}={enterprise_id}"),
                reason,
            };
            let local = Identifier::parse_cx(&local_cx).map_err(|e| invalid(e.to_string()))?;
            if enterprise_id.is_empty() {
                return Err(invalid("enterprise id is empty".to_string()));
            }
            table = table.with_entry(&local, enterprise_id);
        }
        Ok(table)
    }

    /// Number of mappings
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks a local identifier up
    #[must_use]
    pub fn lookup(&self, local: &Identifier, authority: &AuthorityRef) -> Option<EnterpriseIdentifier> {
        self.entries
            .get(&Self::key(local))
            .map(|value| EnterpriseIdentifier::new(value.clone(), authority.clone()))
    }

    fn key(local: &Identifier) -> (String, String) {
        (
            local.value().to_string(),
            local.assigning_authority().universal_id.clone(),
        )
    }
}

impl Resolver for StaticCrossReference {
    fn resolve(
        &self,
        request_handler: RequestHandle,
        local: Identifier,
        enterprise_authority: AuthorityRef,
    ) -> BoxFuture<Result<Option<EnterpriseIdentifier>, ResolveError>> {
        let resolved = self.lookup(&local, &enterprise_authority);
        tracing::debug!(
            handle = %request_handler,
            local = %local,
            found = resolved.is_some(),
            "Cross-referenced patient identifier"
        );
        Box::pin(async move { Ok(resolved) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;

    fn authority() -> AuthorityRef {
        AuthorityRef::new("ENT", "1.2.3.4")
    }

    #[tokio::test]
    async fn test_resolve_known_and_unknown() {
        let table = StaticCrossReference::parse(
            "# facility 1.2.3\n12345^^^&1.2.3&ISO=EID001\n67890^^^CLINIC&1.2.3&ISO = EID002\n",
        )
        .unwrap();
        assert_eq!(table.len(), 2);

        let known = table
            .resolve(
                RequestHandle::new(),
                Identifier::parse_cx("67890^^^&1.2.3&ISO").unwrap(),
                authority(),
            )
            .await
            .unwrap();
        assert_eq!(known, Some(EnterpriseIdentifier::new("EID002", authority())));

        let unknown = table
            .resolve(
                RequestHandle::new(),
                Identifier::parse_cx("12345^^^&9.9.9&ISO").unwrap(),
                authority(),
            )
            .await
            .unwrap();
        assert_eq!(unknown, None);
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(matches!(
            StaticCrossReference::parse("not-a-cx=EID001"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            StaticCrossReference::parse("12345^^^&1.2.3&ISO="),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            StaticCrossReference::load(Path::new("/nonexistent/xref.properties")),
            Err(ConfigError::Io { .. })
        ));
    }
}
