//! Injected dependencies of the Registry Stored Query reducer.

use crate::collaborators::{Enricher, Forwarder, LogSupervisor, Parser, Resolver, Supervisor};
use crate::config::MediatorConfig;
use registry_mediator_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Environment for one or many pipelines.
///
/// Cloning is cheap; every collaborator is shared behind an `Arc`.
#[derive(Clone)]
pub struct RegistryEnvironment {
    /// Read-only configuration
    pub config: Arc<MediatorConfig>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Stored query parser
    pub parser: Arc<dyn Parser>,
    /// PIX cross-reference resolver
    pub resolver: Arc<dyn Resolver>,
    /// Stored query enricher
    pub enricher: Arc<dyn Enricher>,
    /// Registry transport
    pub forwarder: Arc<dyn Forwarder>,
    /// Receives protocol violations
    pub supervisor: Arc<dyn Supervisor>,
}

impl RegistryEnvironment {
    /// Creates an environment that escalates violations to the log
    #[must_use]
    pub fn new(
        config: Arc<MediatorConfig>,
        clock: Arc<dyn Clock>,
        parser: Arc<dyn Parser>,
        resolver: Arc<dyn Resolver>,
        enricher: Arc<dyn Enricher>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            config,
            clock,
            parser,
            resolver,
            enricher,
            forwarder,
            supervisor: Arc::new(LogSupervisor),
        }
    }

    /// Replaces the violation supervisor
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Per-request deadline
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.config.request_timeout
    }
}
