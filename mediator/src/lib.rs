//! # Registry Mediator
//!
//! Mediates IHE XDS.b Registry Stored Queries between document consumers
//! and an XDS.b registry that only knows enterprise patient identifiers.
//!
//! Each inbound stored query runs through one pipeline:
//!
//! 1. **Parse** the body for the local patient identifier
//! 2. **Resolve** it against the enterprise assigning authority (PIX)
//! 3. **Enrich** the query with the enterprise identifier
//! 4. **Forward** it to the registry and relay the answer unchanged
//!
//! A patient unknown to the PIX manager short-circuits with
//! `404 Unknown patient identifier`; the registry is never contacted.
//!
//! The pipeline is a [`RegistryQueryReducer`] run by a per-request
//! `Store`. Collaborators are injected through [`RegistryEnvironment`], so
//! the same reducer drives the production adapters and the recording
//! doubles in [`mocks`].
//!
//! ## Example
//!
//! ```ignore
//! use registry_mediator::{IncomingRequest, RegistryQueryDispatcher};
//!
//! let dispatcher = RegistryQueryDispatcher::new(environment);
//! let response = dispatcher.dispatch(IncomingRequest::post(body)).await?;
//! ```

pub mod action;
pub mod adapters;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod mocks;
pub mod reducer;
pub mod server;
pub mod state;
pub mod types;

pub use action::{InboundRequest, RegistryQueryAction};
pub use collaborators::{Enricher, Forwarder, LogSupervisor, Parser, Resolver, Supervisor};
pub use config::MediatorConfig;
pub use context::{RequestContext, RespondTo};
pub use dispatcher::{RegistryQueryDispatcher, RegistryQueryStore};
pub use environment::RegistryEnvironment;
pub use error::{
    ConfigError, DeliveryError, DispatchError, EnrichError, ParseError, ProtocolViolation,
    ResolveError, TransportError,
};
pub use reducer::RegistryQueryReducer;
pub use state::{Phase, RegistryQueryState};
pub use types::{
    AuthorityRef, EnterpriseIdentifier, FinishRequest, Identifier, IncomingRequest,
    MediatorHttpRequest, MediatorHttpResponse, RequestHandle,
};
