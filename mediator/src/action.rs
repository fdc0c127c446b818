//! Events a pipeline reacts to.

use crate::context::RespondTo;
use crate::error::{EnrichError, ParseError, ResolveError, TransportError};
use crate::types::{
    EnterpriseIdentifier, Identifier, IncomingRequest, MediatorHttpResponse, RequestHandle,
};

/// The inbound request plus the transport's correlation data.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Transport-level request handle
    pub request_handler: RequestHandle,
    /// Where the response goes
    pub respond_to: RespondTo,
    /// The request itself
    pub request: IncomingRequest,
}

/// Every event a Registry Stored Query pipeline can receive.
///
/// Replies carry the handle of the request they were issued for.
#[derive(Debug, Clone)]
pub enum RegistryQueryAction {
    /// A stored query arrived from the transport layer
    InboundRequest(InboundRequest),

    /// Parser extracted the local patient identifier
    Parsed {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Local identifier
        identifier: Identifier,
    },

    /// Parser rejected the body
    ParseFailed {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Why
        error: ParseError,
    },

    /// Resolver answered; `None` means the identifier is unknown
    Resolved {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Enterprise identifier, if the patient is known
        enterprise_identifier: Option<EnterpriseIdentifier>,
    },

    /// Resolver could not perform the lookup
    ResolutionFailed {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Why
        error: ResolveError,
    },

    /// Enricher rewrote the stored query
    Enriched {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Rewritten stored query
        enriched_message: String,
    },

    /// Enricher could not rewrite the stored query
    EnrichmentFailed {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Why
        error: EnrichError,
    },

    /// The registry answered (any status)
    Forwarded {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Registry response
        response: MediatorHttpResponse,
    },

    /// No response could be obtained from the registry
    ForwardFailed {
        /// Request the reply belongs to
        handle: RequestHandle,
        /// Why
        error: TransportError,
    },

    /// The per-request deadline fired
    DeadlineElapsed {
        /// Request the deadline was set for
        handle: RequestHandle,
    },
}

impl RegistryQueryAction {
    /// Short event name used in logs and violations
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InboundRequest(_) => "InboundRequest",
            Self::Parsed { .. } => "Parsed",
            Self::ParseFailed { .. } => "ParseFailed",
            Self::Resolved { .. } => "Resolved",
            Self::ResolutionFailed { .. } => "ResolutionFailed",
            Self::Enriched { .. } => "Enriched",
            Self::EnrichmentFailed { .. } => "EnrichmentFailed",
            Self::Forwarded { .. } => "Forwarded",
            Self::ForwardFailed { .. } => "ForwardFailed",
            Self::DeadlineElapsed { .. } => "DeadlineElapsed",
        }
    }

    /// Request handle the event belongs to
    #[must_use]
    pub const fn handle(&self) -> RequestHandle {
        match self {
            Self::InboundRequest(inbound) => inbound.request_handler,
            Self::Parsed { handle, .. }
            | Self::ParseFailed { handle, .. }
            | Self::Resolved { handle, .. }
            | Self::ResolutionFailed { handle, .. }
            | Self::Enriched { handle, .. }
            | Self::EnrichmentFailed { handle, .. }
            | Self::Forwarded { handle, .. }
            | Self::ForwardFailed { handle, .. }
            | Self::DeadlineElapsed { handle } => *handle,
        }
    }

    /// Builds the reply for a parser result
    #[must_use]
    pub fn from_parse(handle: RequestHandle, result: Result<Identifier, ParseError>) -> Self {
        match result {
            Ok(identifier) => Self::Parsed { handle, identifier },
            Err(error) => Self::ParseFailed { handle, error },
        }
    }

    /// Builds the reply for a resolver result
    #[must_use]
    pub fn from_resolution(
        handle: RequestHandle,
        result: Result<Option<EnterpriseIdentifier>, ResolveError>,
    ) -> Self {
        match result {
            Ok(enterprise_identifier) => Self::Resolved {
                handle,
                enterprise_identifier,
            },
            Err(error) => Self::ResolutionFailed { handle, error },
        }
    }

    /// Builds the reply for an enricher result
    #[must_use]
    pub fn from_enrichment(handle: RequestHandle, result: Result<String, EnrichError>) -> Self {
        match result {
            Ok(enriched_message) => Self::Enriched {
                handle,
                enriched_message,
            },
            Err(error) => Self::EnrichmentFailed { handle, error },
        }
    }

    /// Builds the reply for a forwarder result
    #[must_use]
    pub fn from_forward(
        handle: RequestHandle,
        result: Result<MediatorHttpResponse, TransportError>,
    ) -> Self {
        match result {
            Ok(response) => Self::Forwarded { handle, response },
            Err(error) => Self::ForwardFailed { handle, error },
        }
    }
}
