//! Collaborator contracts.
//!
//! The pipeline never parses, resolves, enriches or transports anything
//! itself; it calls these traits and reacts to their results. Each call
//! returns a boxed future so implementations can be shared as
//! `Arc<dyn Trait>` inside the environment.

use crate::error::{EnrichError, ParseError, ProtocolViolation, ResolveError, TransportError};
use crate::types::{
    AuthorityRef, EnterpriseIdentifier, Identifier, MediatorHttpRequest, MediatorHttpResponse,
    RequestHandle,
};
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by collaborators
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Extracts the local patient identifier from a stored query.
pub trait Parser: Send + Sync {
    /// Parse `raw_message`, producing exactly one result per call.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the body holds no usable patient identifier.
    fn parse(
        &self,
        raw_message: String,
        request_handler: RequestHandle,
    ) -> BoxFuture<Result<Identifier, ParseError>>;
}

/// Maps a local identifier to the enterprise authority (PIX query).
pub trait Resolver: Send + Sync {
    /// Resolve `local` against `enterprise_authority`.
    ///
    /// `Ok(None)` means the patient is unknown, which is a normal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] only if the lookup could not be performed.
    fn resolve(
        &self,
        request_handler: RequestHandle,
        local: Identifier,
        enterprise_authority: AuthorityRef,
    ) -> BoxFuture<Result<Option<EnterpriseIdentifier>, ResolveError>>;
}

/// Rewrites a stored query to carry the enterprise identifier.
pub trait Enricher: Send + Sync {
    /// Return `raw_message` rewritten for `enterprise_identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError`] if the message cannot be rewritten.
    fn enrich(
        &self,
        request_handler: RequestHandle,
        raw_message: String,
        enterprise_identifier: EnterpriseIdentifier,
    ) -> BoxFuture<Result<String, EnrichError>>;
}

/// Sends an HTTP request to the downstream registry.
pub trait Forwarder: Send + Sync {
    /// Perform `request` and return whatever the registry answered.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response could be obtained.
    fn forward(
        &self,
        request_handler: RequestHandle,
        request: MediatorHttpRequest,
    ) -> BoxFuture<Result<MediatorHttpResponse, TransportError>>;
}

/// Receives protocol violations escalated by pipelines.
pub trait Supervisor: Send + Sync {
    /// Handle a violation. The pipeline keeps running regardless.
    fn escalate(&self, violation: ProtocolViolation);
}

/// Supervisor that writes escalations to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSupervisor;

impl Supervisor for LogSupervisor {
    fn escalate(&self, violation: ProtocolViolation) {
        tracing::warn!(
            phase = %violation.phase,
            event = violation.event,
            reason = %violation.reason,
            "Escalated protocol violation"
        );
    }
}
