//! # Registry Mediator Runtime
//!
//! Runtime implementation for reducer-driven request pipelines.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Spawns effect descriptions and feeds actions back to the reducer
//! - **Lifecycle**: Graceful shutdown that cancels timers and drains in-flight effects
//!
//! ## Example
//!
//! ```ignore
//! use registry_mediator_runtime::Store;
//!
//! let store = Store::new(
//!     RegistryQueryState::default(),
//!     RegistryQueryReducer,
//!     environment,
//! );
//!
//! // Send an action
//! store.send(RegistryQueryAction::InboundRequest(request)).await?;
//!
//! // Read state
//! let phase = store.state(|s| s.phase).await;
//! ```

use registry_mediator_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Prometheus metrics exporter and metric descriptions
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and no longer accepts actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown did not drain all effects in time
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use error::StoreError;

/// Guard that decrements the pending effect counter on drop
///
/// Runs even if the effect panics.
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicUsize, Duration, Effect, Ordering, PendingGuard, Reducer, RwLock,
        StoreError, watch,
    };

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`, so actions are reduced strictly one at a time)
    /// 2. Reducer (control logic)
    /// 3. Environment (injected collaborators)
    /// 4. Effect execution (with feedback loop)
    ///
    /// # Lifecycle
    ///
    /// `shutdown()` stops accepting external actions and cancels pending
    /// `Effect::Delay` timers immediately. Actions produced by in-flight
    /// `Effect::Future`s still reach the reducer while the store drains;
    /// once drained the store is closed and any later feedback is dropped
    /// with a warning.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = Store::new(
    ///     RegistryQueryState::default(),
    ///     RegistryQueryReducer,
    ///     environment,
    /// );
    ///
    /// store.send(RegistryQueryAction::InboundRequest(request)).await?;
    /// ```
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
        cancel_timers: Arc<watch::Sender<bool>>,
        pending_effects: Arc<AtomicUsize>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        S: Send + Sync + 'static,
        A: Send + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            let (cancel_timers, _) = watch::channel(false);

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                closed: Arc::new(AtomicBool::new(false)),
                cancel_timers: Arc::new(cancel_timers),
                pending_effects: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Gracefully shut the store down
        ///
        /// 1. Rejects new external actions
        /// 2. Cancels pending `Effect::Delay` timers
        /// 3. Waits for in-flight effects (their actions are still reduced)
        /// 4. Closes the store
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still
        /// running when `timeout` expires. The store is closed either way.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::debug!("Initiating store shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);
            let _ = self.cancel_timers.send(true);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    self.closed.store(true, Ordering::Release);
                    tracing::debug!("All effects completed, store closed");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    self.closed.store(true, Ordering::Release);
                    tracing::warn!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running", pending
                    );
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Spawns the returned effects
        ///
        /// `send()` returns once the effects are started, not when they finish.
        /// Concurrent `send()` calls serialize at the reducer.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            self.dispatch(action).await;
            Ok(())
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let phase = store.state(|s| s.phase).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Feed an action produced by an effect back into the reducer
        async fn feedback(&self, action: A) {
            if self.closed.load(Ordering::Acquire) {
                tracing::warn!("Dropping action produced after store was closed");
                metrics::counter!("store.closed.dropped_actions").increment(1);
                return;
            }

            self.dispatch(action).await;
        }

        async fn dispatch(&self, action: A) {
            tracing::trace!("Processing action");
            metrics::counter!("store.commands.total").increment(1);

            let effects = {
                let mut state = self.state.write().await;

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect);
            }
        }

        /// Spawn an effect
        ///
        /// Effects are fire-and-forget: a panicking effect is logged by tokio
        /// and the pending counter is still released by its guard.
        fn execute_effect(&self, effect: Effect<A>) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let guard = PendingGuard::enter(&self.pending_effects);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;

                        if let Some(action) = fut.await {
                            store.feedback(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let guard = PendingGuard::enter(&self.pending_effects);
                    let store = self.clone();
                    let mut cancelled = self.cancel_timers.subscribe();

                    tokio::spawn(async move {
                        let _guard = guard;

                        // The watch borrow is released inside the cancel branch,
                        // so nothing non-Send lives across the feedback await.
                        let fired = tokio::select! {
                            () = tokio::time::sleep(duration) => true,
                            () = async {
                                let _ = cancelled.wait_for(|cancel| *cancel).await;
                            } => false,
                        };

                        if fired {
                            store.feedback(*action).await;
                        } else {
                            tracing::trace!("Effect::Delay cancelled by shutdown");
                        }
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                closed: Arc::clone(&self.closed),
                cancel_timers: Arc::clone(&self.cancel_timers),
                pending_effects: Arc::clone(&self.pending_effects),
            }
        }
    }
}

pub use store::Store;
