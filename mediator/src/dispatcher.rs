//! Per-request pipeline creation and cleanup.
//!
//! Every inbound stored query gets its own `Store` holding a fresh
//! [`RegistryQueryState`]. Pipelines share only the read-only environment,
//! so no request can observe another's context.

use crate::action::{InboundRequest, RegistryQueryAction};
use crate::context::RespondTo;
use crate::environment::RegistryEnvironment;
use crate::error::DispatchError;
use crate::metrics;
use crate::reducer::RegistryQueryReducer;
use crate::state::RegistryQueryState;
use crate::types::{FinishRequest, IncomingRequest, RequestHandle};
use registry_mediator_runtime::Store;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Store type running one Registry Stored Query pipeline
pub type RegistryQueryStore =
    Store<RegistryQueryState, RegistryQueryAction, RegistryEnvironment, RegistryQueryReducer>;

/// How long a finished pipeline may take to drain its remaining effects
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Counts a pipeline as in flight until dropped
struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        let now = counter.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::set_in_flight(now);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let now = self.counter.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        metrics::set_in_flight(now);
    }
}

/// Entry point turning inbound requests into pipelines.
#[derive(Clone)]
pub struct RegistryQueryDispatcher {
    env: RegistryEnvironment,
    in_flight: Arc<AtomicUsize>,
    drain_timeout: Duration,
}

impl RegistryQueryDispatcher {
    /// Creates a dispatcher sharing `env` between all pipelines
    #[must_use]
    pub fn new(env: RegistryEnvironment) -> Self {
        Self {
            env,
            in_flight: Arc::new(AtomicUsize::new(0)),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Sets how long finished pipelines may drain before their store closes
    #[must_use]
    pub const fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Pipelines created and not yet cleaned up
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Environment shared by the pipelines
    #[must_use]
    pub const fn environment(&self) -> &RegistryEnvironment {
        &self.env
    }

    /// Runs one request through a fresh pipeline and returns its response.
    ///
    /// The pipeline's store is shut down in the background once the
    /// response is out; replies arriving meanwhile are still reduced (and
    /// recorded as violations), later ones are dropped by the closed store.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Store`] if the pipeline rejected the request
    /// - [`DispatchError::NoResponse`] if the pipeline ended without answering
    pub async fn dispatch(&self, request: IncomingRequest) -> Result<FinishRequest, DispatchError> {
        let handle = RequestHandle::new();
        let (respond_to, response) = RespondTo::channel();
        let guard = InFlightGuard::enter(&self.in_flight);

        let store: RegistryQueryStore = Store::new(
            RegistryQueryState::new(),
            RegistryQueryReducer::new(),
            self.env.clone(),
        );

        let sent = store
            .send(RegistryQueryAction::InboundRequest(InboundRequest {
                request_handler: handle,
                respond_to,
                request,
            }))
            .await;

        let result = match sent {
            Ok(()) => response.await.map_err(|_| DispatchError::NoResponse),
            Err(error) => Err(DispatchError::Store(error)),
        };

        let drain_timeout = self.drain_timeout;
        tokio::spawn(async move {
            if let Err(error) = store.shutdown(drain_timeout).await {
                tracing::warn!(%handle, %error, "Registry stored query pipeline did not drain cleanly");
            }
            drop(guard);
        });

        result
    }
}
