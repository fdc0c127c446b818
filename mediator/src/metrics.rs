//! Pipeline metrics.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Completed requests, labelled by `outcome`
pub const REQUESTS_TOTAL: &str = "mediator_requests_total";
/// Rejected pipeline events
pub const PROTOCOL_VIOLATIONS_TOTAL: &str = "mediator_protocol_violations_total";
/// Pipelines currently running
pub const IN_FLIGHT_REQUESTS: &str = "mediator_in_flight_requests";
/// Time from inbound request to delivered response
pub const REQUEST_DURATION_SECONDS: &str = "mediator_request_duration_seconds";

/// How a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Registry response relayed
    Forwarded,
    /// Patient identifier unknown to the PIX manager
    NotFound,
    /// Stored query could not be parsed
    ParseFailed,
    /// Cross-reference lookup failed
    ResolutionFailed,
    /// Stored query could not be enriched
    EnrichmentFailed,
    /// Registry unreachable
    ForwardFailed,
    /// Deadline expired
    TimedOut,
}

impl Outcome {
    /// Label value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forwarded => "forwarded",
            Self::NotFound => "not_found",
            Self::ParseFailed => "parse_failed",
            Self::ResolutionFailed => "resolution_failed",
            Self::EnrichmentFailed => "enrichment_failed",
            Self::ForwardFailed => "forward_failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Describe the mediator metrics. Call after the recorder is installed.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Registry stored queries answered, by outcome");
    describe_counter!(
        PROTOCOL_VIOLATIONS_TOTAL,
        "Pipeline events that did not match the current phase"
    );
    describe_gauge!(IN_FLIGHT_REQUESTS, "Registry stored query pipelines in flight");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Time from inbound request to delivered response"
    );
}

pub(crate) fn record_completion(outcome: Outcome, elapsed_seconds: f64) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS).record(elapsed_seconds);
}

pub(crate) fn record_violation() {
    counter!(PROTOCOL_VIOLATIONS_TOTAL).increment(1);
}

#[allow(clippy::cast_precision_loss)] // In-flight counts stay far below 2^52
pub(crate) fn set_in_flight(count: usize) {
    gauge!(IN_FLIGHT_REQUESTS).set(count as f64);
}
