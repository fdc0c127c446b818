//! Per-request context and the one-shot response channel.

use crate::error::DeliveryError;
use crate::types::{
    EnterpriseIdentifier, FinishRequest, Identifier, MediatorHttpRequest, RequestHandle,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Where the terminal response for one request goes.
///
/// Clones share the same channel, and the channel accepts exactly one
/// response: the first `deliver` takes the sender, later calls fail with
/// [`DeliveryError::AlreadyResponded`].
#[derive(Clone)]
pub struct RespondTo {
    sender: Arc<Mutex<Option<oneshot::Sender<FinishRequest>>>>,
}

impl RespondTo {
    /// Creates a response channel and the receiver the caller awaits.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<FinishRequest>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Delivers the terminal response.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::AlreadyResponded`] if a response was already delivered
    /// - [`DeliveryError::CallerGone`] if the receiver was dropped
    pub fn deliver(&self, response: FinishRequest) -> Result<(), DeliveryError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(DeliveryError::AlreadyResponded)?;

        sender.send(response).map_err(|_| DeliveryError::CallerGone)
    }

    /// Whether a response has been delivered (or attempted)
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for RespondTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RespondTo")
            .field("delivered", &self.is_delivered())
            .finish()
    }
}

/// Everything one pipeline knows about its request.
///
/// Created on the inbound request, filled in step by step, and dropped
/// together with the pipeline's store once the response is out.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Transport-level request this context serves
    pub request_handler: RequestHandle,
    /// Where the terminal response goes
    pub respond_to: RespondTo,
    /// Original stored query, kept until the enriched message exists
    pub raw_message: Option<String>,
    /// When the request entered the pipeline
    pub received_at: DateTime<Utc>,
    /// Local patient identifier from the parser
    pub identifier: Option<Identifier>,
    /// Resolved enterprise identifier
    pub enterprise_identifier: Option<EnterpriseIdentifier>,
    /// Stored query rewritten with the enterprise identifier
    pub enriched_message: Option<String>,
    /// Request sent to the registry
    pub forward_request: Option<MediatorHttpRequest>,
    /// Response delivered to the caller
    pub final_response: Option<FinishRequest>,
}

impl RequestContext {
    /// Starts a context for a freshly received request
    #[must_use]
    pub const fn new(
        request_handler: RequestHandle,
        respond_to: RespondTo,
        raw_message: String,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_handler,
            respond_to,
            raw_message: Some(raw_message),
            received_at,
            identifier: None,
            enterprise_identifier: None,
            enriched_message: None,
            forward_request: None,
            final_response: None,
        }
    }
}
