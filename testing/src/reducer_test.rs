//! Ergonomic testing utilities for reducers
//!
//! A fluent Given-When-Then harness. Pipelines are driven by a sequence of
//! events, so a test may queue several actions; state assertions see the
//! state after the last one and effect assertions see the effects the last
//! action produced.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use registry_mediator_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use registry_mediator_testing::ReducerTest;
///
/// ReducerTest::new(RegistryQueryReducer)
///     .with_env(test_environment())
///     .given_state(RegistryQueryState::default())
///     .when_action(RegistryQueryAction::InboundRequest(request))
///     .when_action(RegistryQueryAction::Parsed { handle, identifier })
///     .then_state(|state| {
///         assert_eq!(state.phase, Phase::AwaitingResolution);
///     })
///     .then_effects(|effects| {
///         assert_eq!(effects.len(), 1);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Queue an action (When). May be called repeatedly; actions are reduced in order.
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the state after the last action (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, environment, or at least one action is not
    /// set, or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let mut last_effects = Vec::new();
        for action in self.actions {
            last_effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&last_effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use registry_mediator_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || effects.iter().all(|e| matches!(e, Effect::None)),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that effects contain at least one Delay effect
    ///
    /// # Panics
    ///
    /// Panics if no Delay effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_delay_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Delay { .. })),
            "Expected at least one Delay effect, but none found"
        );
    }

    /// Count the Future effects (collaborator calls, deliveries) in a list
    #[must_use]
    pub fn count_future_effects<A>(effects: &[Effect<A>]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Future(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_mediator_core::{SmallVec, smallvec};
    use std::time::Duration;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Light {
        Red,
        Green,
    }

    #[derive(Clone, Debug)]
    enum Signal {
        Go,
        Stop,
    }

    struct LightReducer;

    impl Reducer for LightReducer {
        type State = Light;
        type Action = Signal;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match (*state, action) {
                (Light::Red, Signal::Go) => {
                    *state = Light::Green;
                    smallvec![Effect::Delay {
                        duration: Duration::from_secs(30),
                        action: Box::new(Signal::Stop),
                    }]
                },
                (Light::Green, Signal::Stop) => {
                    *state = Light::Red;
                    smallvec![Effect::None]
                },
                _ => SmallVec::new(),
            }
        }
    }

    #[test]
    fn test_single_action() {
        ReducerTest::new(LightReducer)
            .with_env(())
            .given_state(Light::Red)
            .when_action(Signal::Go)
            .then_state(|state| assert_eq!(*state, Light::Green))
            .then_effects(assertions::assert_has_delay_effect)
            .run();
    }

    #[test]
    fn test_effects_come_from_last_action() {
        ReducerTest::new(LightReducer)
            .with_env(())
            .given_state(Light::Red)
            .when_action(Signal::Go)
            .when_action(Signal::Stop)
            .then_state(|state| assert_eq!(*state, Light::Red))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn test_unmatched_action_produces_nothing() {
        ReducerTest::new(LightReducer)
            .with_env(())
            .given_state(Light::Red)
            .when_action(Signal::Stop)
            .then_effects(|effects| assertions::assert_effects_count(effects, 0))
            .run();
    }

    #[test]
    fn test_count_future_effects() {
        let effects: Vec<Effect<Signal>> = vec![
            Effect::Future(Box::pin(async { Some(Signal::Go) })),
            Effect::None,
        ];

        assertions::assert_has_future_effect(&effects);
        assert_eq!(assertions::count_future_effects(&effects), 1);
    }
}
