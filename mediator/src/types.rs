//! Domain types for the Registry Stored Query pipeline.

use crate::error::ParseError;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// An identifier-issuing domain (HL7 assigning authority).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorityRef {
    /// Namespace name, may be empty
    pub name: String,
    /// ISO OID of the authority
    pub universal_id: String,
}

impl AuthorityRef {
    /// Creates an authority reference
    #[must_use]
    pub fn new(name: impl Into<String>, universal_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            universal_id: universal_id.into(),
        }
    }
}

/// A patient identifier qualified by its assigning authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    value: String,
    assigning_authority: AuthorityRef,
}

impl Identifier {
    /// Creates an identifier
    #[must_use]
    pub fn new(value: impl Into<String>, assigning_authority: AuthorityRef) -> Self {
        Self {
            value: value.into(),
            assigning_authority,
        }
    }

    /// Identifier value within its authority
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Authority that issued the identifier
    #[must_use]
    pub const fn assigning_authority(&self) -> &AuthorityRef {
        &self.assigning_authority
    }

    /// Parses an HL7 CX rendering such as `12345^^^&1.2.3&ISO`.
    ///
    /// The fourth component carries the authority as
    /// `namespace&universalId&universalIdType`; the namespace may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedIdentifier`] if the value or the
    /// authority's universal id is missing.
    pub fn parse_cx(cx: &str) -> Result<Self, ParseError> {
        let malformed = |reason: &str| ParseError::MalformedIdentifier {
            value: cx.to_string(),
            reason: reason.to_string(),
        };

        let cx = cx.trim();
        let mut components = cx.split('^');
        let value = components.next().unwrap_or_default().trim();
        if value.is_empty() {
            return Err(malformed("identifier value is empty"));
        }

        let authority = components
            .nth(2)
            .ok_or_else(|| malformed("assigning authority component is missing"))?;
        let mut parts = authority.split('&');
        let name = parts.next().unwrap_or_default();
        let universal_id = parts.next().unwrap_or_default();
        if universal_id.is_empty() {
            return Err(malformed("assigning authority has no universal id"));
        }

        Ok(Self::new(value, AuthorityRef::new(name, universal_id)))
    }

    /// Renders the identifier as HL7 CX (`value^^^name&universalId&ISO`).
    #[must_use]
    pub fn to_cx(&self) -> String {
        format!(
            "{}^^^{}&{}&ISO",
            self.value, self.assigning_authority.name, self.assigning_authority.universal_id
        )
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cx())
    }
}

/// An identifier resolved against the configured enterprise authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnterpriseIdentifier(Identifier);

impl EnterpriseIdentifier {
    /// Creates an enterprise identifier
    #[must_use]
    pub fn new(value: impl Into<String>, authority: AuthorityRef) -> Self {
        Self(Identifier::new(value, authority))
    }

    /// Enterprise identifier value
    #[must_use]
    pub fn value(&self) -> &str {
        self.0.value()
    }

    /// CX rendering of the enterprise identifier
    #[must_use]
    pub fn to_cx(&self) -> String {
        self.0.to_cx()
    }
}

impl fmt::Display for EnterpriseIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque token identifying one inbound transport request.
///
/// Every collaborator reply carries the handle it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(Uuid);

impl RequestHandle {
    /// Mints a fresh random handle
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Terminal response delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishRequest {
    /// HTTP status code
    pub status: u16,
    /// Content type of `body`
    pub content_type: String,
    /// Response body
    pub body: String,
}

impl FinishRequest {
    /// A plain text response
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: body.into(),
        }
    }

    /// The patient identifier could not be cross-referenced
    #[must_use]
    pub fn unknown_patient() -> Self {
        Self::text(404, "Unknown patient identifier")
    }

    /// The request deadline expired
    #[must_use]
    pub fn timed_out() -> Self {
        Self::text(504, "Registry stored query timed out")
    }
}

/// An HTTP request the mediator sends to a downstream system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediatorHttpRequest {
    /// Name of the orchestration step, for logs
    pub orchestration: String,
    /// HTTP method
    pub method: String,
    /// URL scheme
    pub scheme: String,
    /// Target host
    pub host: String,
    /// Target port
    pub port: u16,
    /// Target path
    pub path: String,
    /// Request body
    pub body: String,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Query parameters
    pub query_params: BTreeMap<String, String>,
}

impl MediatorHttpRequest {
    /// Absolute URL of the target, without query parameters.
    ///
    /// Transports append `query_params` with percent-encoding.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }

    /// Value of a header, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response received from a downstream system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediatorHttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content type of `body`
    pub content_type: String,
    /// Response body
    pub body: String,
}

impl MediatorHttpResponse {
    /// Relays the response to the caller unchanged.
    #[must_use]
    pub fn into_finish_request(self) -> FinishRequest {
        FinishRequest {
            status: self.status,
            content_type: self.content_type,
            body: self.body,
        }
    }
}

impl From<MediatorHttpResponse> for FinishRequest {
    fn from(response: MediatorHttpResponse) -> Self {
        response.into_finish_request()
    }
}

/// A request as received from the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncomingRequest {
    /// HTTP method
    pub method: String,
    /// Raw stored query body
    pub body: String,
    /// Request headers
    pub headers: BTreeMap<String, String>,
}

impl IncomingRequest {
    /// A POST with the given body and no headers
    #[must_use]
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;

    #[test]
    fn test_parse_cx_without_namespace() {
        let id = Identifier::parse_cx("12345^^^&1.2.3&ISO").unwrap();
        assert_eq!(id.value(), "12345");
        assert_eq!(id.assigning_authority(), &AuthorityRef::new("", "1.2.3"));
    }

    #[test]
    fn test_parse_cx_with_namespace() {
        let id = Identifier::parse_cx(" 76cc765a442f410^^^FACILITY&1.3.6.1.4.1.21367&ISO ").unwrap();
        assert_eq!(id.value(), "76cc765a442f410");
        assert_eq!(id.assigning_authority().name, "FACILITY");
        assert_eq!(id.assigning_authority().universal_id, "1.3.6.1.4.1.21367");
        assert_eq!(id.to_cx(), "76cc765a442f410^^^FACILITY&1.3.6.1.4.1.21367&ISO");
    }

    #[test]
    fn test_parse_cx_rejects_missing_authority() {
        assert!(matches!(
            Identifier::parse_cx("12345"),
            Err(ParseError::MalformedIdentifier { .. })
        ));
        assert!(matches!(
            Identifier::parse_cx("12345^^^&&ISO"),
            Err(ParseError::MalformedIdentifier { .. })
        ));
        assert!(matches!(
            Identifier::parse_cx("^^^&1.2.3&ISO"),
            Err(ParseError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_url_excludes_query_params() {
        let mut request = MediatorHttpRequest {
            orchestration: "xds-b-registry".to_string(),
            method: "POST".to_string(),
            scheme: "http".to_string(),
            host: "registry.example.org".to_string(),
            port: 5000,
            path: "/xdsregistry".to_string(),
            body: String::new(),
            headers: BTreeMap::from([(
                "Content-Type".to_string(),
                "application/soap+xml".to_string(),
            )]),
            query_params: BTreeMap::new(),
        };
        assert_eq!(request.url(), "http://registry.example.org:5000/xdsregistry");
        assert_eq!(request.header("content-type"), Some("application/soap+xml"));

        request
            .query_params
            .insert("patient id".to_string(), "a&b=c".to_string());
        assert_eq!(request.url(), "http://registry.example.org:5000/xdsregistry");
    }

    #[test]
    fn test_response_passes_through_unchanged() {
        let response = MediatorHttpResponse {
            status: 503,
            content_type: "application/soap+xml".to_string(),
            body: "<Fault/>".to_string(),
        };
        let finish: FinishRequest = response.into();
        assert_eq!(finish.status, 503);
        assert_eq!(finish.content_type, "application/soap+xml");
        assert_eq!(finish.body, "<Fault/>");
    }

    #[test]
    fn test_request_handles_are_unique() {
        assert_ne!(RequestHandle::new(), RequestHandle::new());
    }
}
