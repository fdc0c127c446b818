//! Reference collaborators.
//!
//! These let the binary run end to end: a regex-based stored query parser
//! and enricher, a static cross-reference table standing in for a PIX
//! manager, and a reqwest transport to the XDS.b registry.

mod enricher;
mod http;
mod parser;
mod resolver;
mod slot;

pub use enricher::SlotPatientIdEnricher;
pub use http::HttpForwarder;
pub use parser::SlotPatientIdParser;
pub use resolver::StaticCrossReference;
pub use slot::{PatientIdSlot, SlotValue};
