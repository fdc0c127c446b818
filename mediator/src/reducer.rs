//! Registry Stored Query orchestration.
//!
//! One reducer instance drives one request: parse the stored query, resolve
//! the patient identifier against the enterprise authority, enrich the
//! query, forward it to the XDS.b registry and relay the answer. Every
//! collaborator call is an effect whose result comes back as the next
//! action; the reducer itself never waits.

use crate::action::{InboundRequest, RegistryQueryAction};
use crate::config::RegistryEndpoint;
use crate::context::RequestContext;
use crate::environment::RegistryEnvironment;
use crate::error::ProtocolViolation;
use crate::metrics::{self, Outcome};
use crate::state::{Phase, RegistryQueryState};
use crate::types::{EnterpriseIdentifier, FinishRequest, Identifier, MediatorHttpRequest};
use registry_mediator_core::effect::Effect;
use registry_mediator_core::environment::Clock;
use registry_mediator_core::reducer::Reducer;
use registry_mediator_core::{SmallVec, async_effect, delay, smallvec};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Orchestration name of the registry call
pub const REGISTRY_ORCHESTRATION: &str = "xds-b-registry";

/// Content type of stored queries sent to the registry
pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml";

type Effects = SmallVec<[Effect<RegistryQueryAction>; 4]>;

/// Builds the request forwarding an enriched stored query to the registry.
#[must_use]
pub fn forward_request(registry: &RegistryEndpoint, enriched_message: String) -> MediatorHttpRequest {
    MediatorHttpRequest {
        orchestration: REGISTRY_ORCHESTRATION.to_string(),
        method: "POST".to_string(),
        scheme: registry.scheme.clone(),
        host: registry.host.clone(),
        port: registry.port,
        path: registry.path.clone(),
        body: enriched_message,
        headers: BTreeMap::from([("Content-Type".to_string(), SOAP_CONTENT_TYPE.to_string())]),
        query_params: BTreeMap::new(),
    }
}

/// Reducer for the Registry Stored Query pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryQueryReducer;

impl RegistryQueryReducer {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn start(
        state: &mut RegistryQueryState,
        inbound: InboundRequest,
        env: &RegistryEnvironment,
    ) -> Effects {
        let InboundRequest {
            request_handler: handle,
            respond_to,
            request,
        } = inbound;

        tracing::info!(%handle, method = %request.method, "Parsing registry stored query request");

        state.context = Some(RequestContext::new(
            handle,
            respond_to,
            request.body.clone(),
            env.clock.now(),
        ));
        state.phase = Phase::AwaitingParse;

        let parser = Arc::clone(&env.parser);
        let body = request.body;

        smallvec![
            async_effect! {
                let result = parser.parse(body, handle).await;
                Some(RegistryQueryAction::from_parse(handle, result))
            },
            delay! {
                duration: env.deadline(),
                action: RegistryQueryAction::DeadlineElapsed { handle }
            },
        ]
    }

    /// Handles every event after the inbound request
    fn advance(
        state: &mut RegistryQueryState,
        context: &mut RequestContext,
        action: RegistryQueryAction,
        env: &RegistryEnvironment,
    ) -> Effects {
        let event = action.kind();
        if action.handle() != context.request_handler {
            return Self::violation(
                state,
                env,
                event,
                format!(
                    "event for request {} reached pipeline of request {}",
                    action.handle(),
                    context.request_handler
                ),
            );
        }

        match (state.phase, action) {
            (Phase::AwaitingParse, RegistryQueryAction::Parsed { identifier, .. }) => {
                Self::resolve(state, context, identifier, env)
            },
            (Phase::AwaitingParse, RegistryQueryAction::ParseFailed { error, .. }) => {
                tracing::warn!(handle = %context.request_handler, %error, "Failed to parse registry stored query");
                Self::finish(
                    state,
                    context,
                    env,
                    FinishRequest::text(400, format!("Invalid registry stored query: {error}")),
                    Outcome::ParseFailed,
                )
            },
            (
                Phase::AwaitingResolution,
                RegistryQueryAction::Resolved {
                    enterprise_identifier: Some(enterprise_identifier),
                    ..
                },
            ) => Self::enrich(state, context, enterprise_identifier, env),
            (
                Phase::AwaitingResolution,
                RegistryQueryAction::Resolved {
                    enterprise_identifier: None,
                    ..
                },
            ) => {
                tracing::info!(handle = %context.request_handler, "Could not resolve patient identifier");
                Self::finish(
                    state,
                    context,
                    env,
                    FinishRequest::unknown_patient(),
                    Outcome::NotFound,
                )
            },
            (Phase::AwaitingResolution, RegistryQueryAction::ResolutionFailed { error, .. }) => {
                tracing::warn!(handle = %context.request_handler, %error, "Patient identifier resolution failed");
                Self::finish(
                    state,
                    context,
                    env,
                    FinishRequest::text(500, error.to_string()),
                    Outcome::ResolutionFailed,
                )
            },
            (Phase::AwaitingEnrichment, RegistryQueryAction::Enriched { enriched_message, .. }) => {
                Self::forward(state, context, enriched_message, env)
            },
            (Phase::AwaitingEnrichment, RegistryQueryAction::EnrichmentFailed { error, .. }) => {
                tracing::warn!(handle = %context.request_handler, %error, "Failed to enrich registry stored query");
                Self::finish(
                    state,
                    context,
                    env,
                    FinishRequest::text(500, error.to_string()),
                    Outcome::EnrichmentFailed,
                )
            },
            (Phase::AwaitingForward, RegistryQueryAction::Forwarded { response, .. }) => {
                tracing::info!(
                    handle = %context.request_handler,
                    status = response.status,
                    "Received response from XDS.b Registry"
                );
                Self::finish(
                    state,
                    context,
                    env,
                    response.into_finish_request(),
                    Outcome::Forwarded,
                )
            },
            (Phase::AwaitingForward, RegistryQueryAction::ForwardFailed { error, .. }) => {
                tracing::warn!(handle = %context.request_handler, %error, "XDS.b Registry unreachable");
                Self::finish(
                    state,
                    context,
                    env,
                    FinishRequest::text(502, format!("XDS.b registry unavailable: {error}")),
                    Outcome::ForwardFailed,
                )
            },
            (phase, RegistryQueryAction::DeadlineElapsed { .. }) if phase.is_terminal() => {
                tracing::trace!(handle = %context.request_handler, "Deadline elapsed after response, ignoring");
                SmallVec::new()
            },
            (phase, RegistryQueryAction::DeadlineElapsed { .. }) => {
                tracing::warn!(handle = %context.request_handler, %phase, "Registry stored query deadline elapsed");
                Self::finish(
                    state,
                    context,
                    env,
                    FinishRequest::timed_out(),
                    Outcome::TimedOut,
                )
            },
            (phase, _) if phase.is_terminal() => Self::violation(
                state,
                env,
                event,
                "pipeline already delivered its response".to_string(),
            ),
            (phase, _) => Self::violation(
                state,
                env,
                event,
                format!("event not expected while {phase}"),
            ),
        }
    }

    fn resolve(
        state: &mut RegistryQueryState,
        context: &mut RequestContext,
        identifier: Identifier,
        env: &RegistryEnvironment,
    ) -> Effects {
        let handle = context.request_handler;
        tracing::info!(%handle, %identifier, "Parsed contents. Resolving patient enterprise identifier");

        context.identifier = Some(identifier.clone());
        state.phase = Phase::AwaitingResolution;

        let resolver = Arc::clone(&env.resolver);
        let authority = env.config.enterprise_authority.clone();

        smallvec![async_effect! {
            let result = resolver.resolve(handle, identifier, authority).await;
            Some(RegistryQueryAction::from_resolution(handle, result))
        }]
    }

    fn enrich(
        state: &mut RegistryQueryState,
        context: &mut RequestContext,
        enterprise_identifier: EnterpriseIdentifier,
        env: &RegistryEnvironment,
    ) -> Effects {
        let handle = context.request_handler;
        tracing::info!(%handle, enterprise_identifier = %enterprise_identifier, "Resolved patient enterprise identifier. Enriching message");

        context.enterprise_identifier = Some(enterprise_identifier.clone());
        state.phase = Phase::AwaitingEnrichment;

        let enricher = Arc::clone(&env.enricher);
        let raw_message = context.raw_message.clone().unwrap_or_default();

        smallvec![async_effect! {
            let result = enricher.enrich(handle, raw_message, enterprise_identifier).await;
            Some(RegistryQueryAction::from_enrichment(handle, result))
        }]
    }

    fn forward(
        state: &mut RegistryQueryState,
        context: &mut RequestContext,
        enriched_message: String,
        env: &RegistryEnvironment,
    ) -> Effects {
        let handle = context.request_handler;
        let request = forward_request(&env.config.registry, enriched_message.clone());
        tracing::info!(%handle, url = %request.url(), "Sending enriched request to XDS.b Registry");

        context.raw_message = None;
        context.enriched_message = Some(enriched_message);
        context.forward_request = Some(request.clone());
        state.phase = Phase::AwaitingForward;

        let forwarder = Arc::clone(&env.forwarder);

        smallvec![async_effect! {
            let result = forwarder.forward(handle, request).await;
            Some(RegistryQueryAction::from_forward(handle, result))
        }]
    }

    /// Ends the pipeline with `response`
    fn finish(
        state: &mut RegistryQueryState,
        context: &mut RequestContext,
        env: &RegistryEnvironment,
        response: FinishRequest,
        outcome: Outcome,
    ) -> Effects {
        let handle = context.request_handler;
        let elapsed = env.clock.now().signed_duration_since(context.received_at);

        tracing::info!(
            %handle,
            status = response.status,
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.num_milliseconds(),
            "Registry stored query completed"
        );
        metrics::record_completion(
            outcome,
            elapsed.to_std().map(|d| d.as_secs_f64()).unwrap_or_default(),
        );

        context.final_response = Some(response.clone());
        state.phase = Phase::Done;

        let respond_to = context.respond_to.clone();

        smallvec![async_effect! {
            if let Err(error) = respond_to.deliver(response) {
                tracing::error!(%handle, %error, "Failed to deliver registry stored query response");
            }
            None::<RegistryQueryAction>
        }]
    }

    /// Records and escalates an event that does not fit the current phase
    fn violation(
        state: &mut RegistryQueryState,
        env: &RegistryEnvironment,
        event: &'static str,
        reason: String,
    ) -> Effects {
        let violation = ProtocolViolation {
            phase: state.phase,
            event,
            reason,
        };

        tracing::error!(
            phase = %violation.phase,
            event,
            reason = %violation.reason,
            "Protocol violation in registry stored query pipeline"
        );
        metrics::record_violation();
        state.violations.push(violation.clone());

        let supervisor = Arc::clone(&env.supervisor);

        smallvec![async_effect! {
            supervisor.escalate(violation);
            None::<RegistryQueryAction>
        }]
    }
}

impl Reducer for RegistryQueryReducer {
    type State = RegistryQueryState;
    type Action = RegistryQueryAction;
    type Environment = RegistryEnvironment;

    fn reduce(
        &self,
        state: &mut RegistryQueryState,
        action: RegistryQueryAction,
        env: &RegistryEnvironment,
    ) -> Effects {
        let action = match action {
            RegistryQueryAction::InboundRequest(inbound) if state.phase == Phase::Start => {
                return Self::start(state, inbound, env);
            },
            // The duplicate's responder is dropped with it, so its caller is not left waiting.
            RegistryQueryAction::InboundRequest(inbound) => {
                return Self::violation(
                    state,
                    env,
                    "InboundRequest",
                    format!(
                        "pipeline already serves a request, rejected request {}",
                        inbound.request_handler
                    ),
                );
            },
            reply => reply,
        };

        let Some(mut context) = state.context.take() else {
            let event = action.kind();
            return Self::violation(state, env, event, "no request in flight".to_string());
        };

        let effects = Self::advance(state, &mut context, action, env);
        state.context = Some(context);
        effects
    }
}
