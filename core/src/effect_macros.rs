//! Declarative macros for ergonomic effect construction
//!
//! Collaborator calls in a reducer are almost always "run this future and
//! feed its result back as the next action", so these macros keep the
//! `Box::pin` noise out of reducer bodies.

/// Create an `Effect::Future` from an async block body
///
/// The body must evaluate to `Option<Action>`. `Some` is fed back into the
/// reducer by the runtime, `None` ends the effect silently.
///
/// # Example
///
/// ```rust,ignore
/// use registry_mediator_core::async_effect;
///
/// async_effect! {
///     let identifier = parser.parse(&body, &handle).await;
///     Some(RegistryQueryAction::from_parse(handle, identifier))
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use registry_mediator_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(60),
///     action: RegistryQueryAction::DeadlineElapsed { handle }
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
