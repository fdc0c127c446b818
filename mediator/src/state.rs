//! Pipeline state.

use crate::context::RequestContext;
use crate::error::ProtocolViolation;
use std::fmt;

/// Where a pipeline is in the Registry Stored Query sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Waiting for the inbound request
    #[default]
    Start,
    /// Parser invoked
    AwaitingParse,
    /// Resolver invoked
    AwaitingResolution,
    /// Enricher invoked
    AwaitingEnrichment,
    /// Forwarder invoked
    AwaitingForward,
    /// Response delivered
    Done,
}

impl Phase {
    /// Whether the pipeline has delivered its response
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "Start",
            Self::AwaitingParse => "AwaitingParse",
            Self::AwaitingResolution => "AwaitingResolution",
            Self::AwaitingEnrichment => "AwaitingEnrichment",
            Self::AwaitingForward => "AwaitingForward",
            Self::Done => "Done",
        };
        f.write_str(name)
    }
}

/// State of one Registry Stored Query pipeline.
#[derive(Debug, Clone, Default)]
pub struct RegistryQueryState {
    /// Current phase
    pub phase: Phase,
    /// Request context, present once the inbound request arrived
    pub context: Option<RequestContext>,
    /// Events rejected so far
    pub violations: Vec<ProtocolViolation>,
}

impl RegistryQueryState {
    /// Creates a pipeline waiting for its inbound request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
