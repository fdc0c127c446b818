//! Error types for the registry mediator.
//!
//! Errors produced by collaborators travel inside actions, so they are
//! `Clone + PartialEq` and carry their causes as strings.

use crate::state::Phase;
use registry_mediator_runtime::StoreError;
use thiserror::Error;

/// Failure to extract a patient identifier from a stored query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The query has no `$XDSDocumentEntryPatientId` slot
    #[error("no $XDSDocumentEntryPatientId slot found")]
    MissingPatientId,

    /// The slot value is not a CX identifier
    #[error("malformed patient identifier '{value}': {reason}")]
    MalformedIdentifier {
        /// Raw slot value
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// Parser rejected the body for another reason
    #[error("{0}")]
    Rejected(String),
}

/// Failure of the cross-reference lookup itself.
///
/// An unknown identifier is not an error; resolvers return `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The PIX manager could not be reached
    #[error("PIX manager unavailable: {0}")]
    Unavailable(String),

    /// The PIX manager answered with an error
    #[error("PIX query failed: {0}")]
    QueryFailed(String),
}

/// Failure to rewrite a stored query with the enterprise identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    /// No patient id slot to rewrite
    #[error("stored query has no $XDSDocumentEntryPatientId slot to enrich")]
    MissingPatientIdSlot,

    /// Enricher rejected the message for another reason
    #[error("{0}")]
    Rejected(String),
}

/// Failure to obtain any response from the downstream registry.
///
/// HTTP error statuses are responses, not transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The outbound request could not be built
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response within the transport timeout
    #[error("request timed out")]
    Timeout,

    /// The response body could not be relayed as text
    #[error("registry response body is not UTF-8: {0}")]
    InvalidBody(String),

    /// Any other I/O failure while sending or reading
    #[error("{0}")]
    Io(String),
}

/// Failure to hand the terminal response to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// A response was already delivered for this request
    #[error("a response was already delivered for this request")]
    AlreadyResponded,

    /// The caller stopped waiting before the response arrived
    #[error("caller is no longer waiting for a response")]
    CallerGone,
}

/// Failure of the dispatcher to obtain a response for a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The per-request store rejected the inbound request
    #[error("pipeline store error: {0}")]
    Store(#[from] StoreError),

    /// The pipeline ended without delivering a response
    #[error("pipeline finished without a response")]
    NoResponse,
}

/// Invalid or missing configuration, reported before the server starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key is absent or empty
    #[error("missing required configuration key '{key}'")]
    Missing {
        /// Property key
        key: String,
    },

    /// A key is present but its value is unusable
    #[error("invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        /// Property key
        key: String,
        /// Offending value
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// A referenced file could not be read
    #[error("cannot read '{path}': {reason}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        reason: String,
    },
}

/// An event that does not fit the pipeline's current phase.
///
/// Violations are recorded and escalated; they never end the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("protocol violation in phase {phase}: {event} ({reason})")]
pub struct ProtocolViolation {
    /// Phase the pipeline was in when the event arrived
    pub phase: Phase,
    /// Kind of the offending event
    pub event: &'static str,
    /// Why the event was rejected
    pub reason: String,
}
