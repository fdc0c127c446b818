//! Recording collaborator doubles for tests and local runs.
//!
//! Every double records the calls it receives so tests can assert on what
//! the pipeline asked for, not only on what it answered.

use crate::collaborators::{BoxFuture, Enricher, Forwarder, Parser, Resolver, Supervisor};
use crate::config::{MediatorConfig, RegistryEndpoint, ServerConfig};
use crate::environment::RegistryEnvironment;
use crate::error::{EnrichError, ParseError, ProtocolViolation, ResolveError, TransportError};
use crate::types::{
    AuthorityRef, EnterpriseIdentifier, Identifier, MediatorHttpRequest, MediatorHttpResponse,
    RequestHandle,
};
use registry_mediator_core::environment::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Thread-safe list of recorded calls
#[derive(Debug)]
pub struct CallLog<T> {
    calls: Mutex<Vec<T>>,
}

impl<T: Clone> CallLog<T> {
    fn record(&self, call: T) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Copy of every call so far
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no call was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

async fn pause(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

/// Parser treating the whole body as a CX identifier, or always failing.
#[derive(Debug, Default)]
pub struct RecordingParser {
    failure: Option<ParseError>,
    /// `(raw_message, handle)` per call
    pub calls: CallLog<(String, RequestHandle)>,
}

impl RecordingParser {
    /// Parser that reads the body as CX
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that always fails with `error`
    #[must_use]
    pub fn failing(error: ParseError) -> Self {
        Self {
            failure: Some(error),
            calls: CallLog::default(),
        }
    }
}

impl Parser for RecordingParser {
    fn parse(
        &self,
        raw_message: String,
        request_handler: RequestHandle,
    ) -> BoxFuture<Result<Identifier, ParseError>> {
        self.calls.record((raw_message.clone(), request_handler));
        let result = match &self.failure {
            Some(error) => Err(error.clone()),
            None => Identifier::parse_cx(&raw_message),
        };
        Box::pin(async move { result })
    }
}

/// One recorded resolver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveCall {
    /// Request the call was made for
    pub handle: RequestHandle,
    /// Local identifier
    pub local: Identifier,
    /// Requested enterprise authority
    pub authority: AuthorityRef,
}

/// Resolver backed by a map from local CX to enterprise id value.
#[derive(Debug, Default)]
pub struct RecordingResolver {
    entries: HashMap<String, String>,
    failure: Option<ResolveError>,
    latency: Option<Duration>,
    /// Calls received
    pub calls: CallLog<ResolveCall>,
}

impl RecordingResolver {
    /// Resolver that knows no patients
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `local CX → enterprise id` entry
    #[must_use]
    pub fn with_entry(mut self, local_cx: impl Into<String>, enterprise_id: impl Into<String>) -> Self {
        self.entries.insert(local_cx.into(), enterprise_id.into());
        self
    }

    /// Waits `latency` before answering
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Resolver that always fails with `error`
    #[must_use]
    pub fn failing(error: ResolveError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }
}

impl Resolver for RecordingResolver {
    fn resolve(
        &self,
        request_handler: RequestHandle,
        local: Identifier,
        enterprise_authority: AuthorityRef,
    ) -> BoxFuture<Result<Option<EnterpriseIdentifier>, ResolveError>> {
        let result = match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self
                .entries
                .get(&local.to_cx())
                .map(|value| EnterpriseIdentifier::new(value.clone(), enterprise_authority.clone()))),
        };
        self.calls.record(ResolveCall {
            handle: request_handler,
            local,
            authority: enterprise_authority,
        });
        let latency = self.latency;
        Box::pin(async move {
            pause(latency).await;
            result
        })
    }
}

/// Enricher rendering a template with `{id}` replaced by the enterprise id.
#[derive(Debug)]
pub struct RecordingEnricher {
    template: String,
    failure: Option<EnrichError>,
    /// `(handle, raw_message, enterprise identifier)` per call
    pub calls: CallLog<(RequestHandle, String, EnterpriseIdentifier)>,
}

impl RecordingEnricher {
    /// Enricher producing `template` with `{id}` substituted
    #[must_use]
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            failure: None,
            calls: CallLog::default(),
        }
    }

    /// Enricher that always fails with `error`
    #[must_use]
    pub fn failing(error: EnrichError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }
}

impl Default for RecordingEnricher {
    fn default() -> Self {
        Self::with_template(r#"<Query id="{id}"/>"#)
    }
}

impl Enricher for RecordingEnricher {
    fn enrich(
        &self,
        request_handler: RequestHandle,
        raw_message: String,
        enterprise_identifier: EnterpriseIdentifier,
    ) -> BoxFuture<Result<String, EnrichError>> {
        let result = match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.template.replace("{id}", enterprise_identifier.value())),
        };
        self.calls
            .record((request_handler, raw_message, enterprise_identifier));
        Box::pin(async move { result })
    }
}

/// Forwarder that records requests and answers with a canned response.
///
/// Without a canned response it echoes the request body back as a 200
/// SOAP response.
#[derive(Debug, Default)]
pub struct RecordingForwarder {
    response: Option<Result<MediatorHttpResponse, TransportError>>,
    latency: Option<Duration>,
    /// Requests received
    pub requests: CallLog<MediatorHttpRequest>,
}

impl RecordingForwarder {
    /// Forwarder echoing request bodies
    #[must_use]
    pub fn echo() -> Self {
        Self::default()
    }

    /// Forwarder answering every request with `response`
    #[must_use]
    pub fn responding(response: MediatorHttpResponse) -> Self {
        Self {
            response: Some(Ok(response)),
            ..Self::default()
        }
    }

    /// Forwarder failing every request with `error`
    #[must_use]
    pub fn failing(error: TransportError) -> Self {
        Self {
            response: Some(Err(error)),
            ..Self::default()
        }
    }

    /// Waits `latency` before answering
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl Forwarder for RecordingForwarder {
    fn forward(
        &self,
        _request_handler: RequestHandle,
        request: MediatorHttpRequest,
    ) -> BoxFuture<Result<MediatorHttpResponse, TransportError>> {
        let result = self.response.clone().unwrap_or_else(|| {
            Ok(MediatorHttpResponse {
                status: 200,
                content_type: "application/soap+xml".to_string(),
                body: request.body.clone(),
            })
        });
        self.requests.record(request);
        let latency = self.latency;
        Box::pin(async move {
            pause(latency).await;
            result
        })
    }
}

/// Supervisor collecting escalated violations
#[derive(Debug, Default)]
pub struct RecordingSupervisor {
    /// Violations received
    pub violations: CallLog<ProtocolViolation>,
}

impl Supervisor for RecordingSupervisor {
    fn escalate(&self, violation: ProtocolViolation) {
        self.violations.record(violation);
    }
}

/// One of each recording double, shared with the environment they build.
#[derive(Debug, Clone)]
pub struct MockCollaborators {
    /// Parser double
    pub parser: Arc<RecordingParser>,
    /// Resolver double
    pub resolver: Arc<RecordingResolver>,
    /// Enricher double
    pub enricher: Arc<RecordingEnricher>,
    /// Forwarder double
    pub forwarder: Arc<RecordingForwarder>,
    /// Supervisor double
    pub supervisor: Arc<RecordingSupervisor>,
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self {
            parser: Arc::new(RecordingParser::new()),
            resolver: Arc::new(RecordingResolver::new()),
            enricher: Arc::new(RecordingEnricher::default()),
            forwarder: Arc::new(RecordingForwarder::echo()),
            supervisor: Arc::new(RecordingSupervisor::default()),
        }
    }
}

impl MockCollaborators {
    /// Builds an environment wired to these doubles
    #[must_use]
    pub fn environment(&self, config: MediatorConfig, clock: Arc<dyn Clock>) -> RegistryEnvironment {
        RegistryEnvironment::new(
            Arc::new(config),
            clock,
            Arc::clone(&self.parser) as Arc<dyn Parser>,
            Arc::clone(&self.resolver) as Arc<dyn Resolver>,
            Arc::clone(&self.enricher) as Arc<dyn Enricher>,
            Arc::clone(&self.forwarder) as Arc<dyn Forwarder>,
        )
        .with_supervisor(Arc::clone(&self.supervisor) as Arc<dyn Supervisor>)
    }
}

/// Configuration pointing at `registry.example.org:5000/xdsregistry` with
/// enterprise authority `ENT` / `1.2.3.4` and a 60 s deadline.
#[must_use]
pub fn test_config() -> MediatorConfig {
    MediatorConfig {
        name: "xds-mediator".to_string(),
        enterprise_authority: AuthorityRef::new("ENT", "1.2.3.4"),
        registry: RegistryEndpoint {
            scheme: "http".to_string(),
            host: "registry.example.org".to_string(),
            port: 5000,
            path: "/xdsregistry".to_string(),
        },
        request_timeout: Duration::from_secs(60),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        registry_route: "/xds-registry".to_string(),
        xref_file: None,
    }
}
