//! Human-decision processing and the article state machine.
//!
//! A decision is a single conditional mutation: validate the
//! `(state, decision)` pair, apply modifications, bump the version,
//! append an audit entry, and write with a version precondition. After a
//! successful transition one downstream event is emitted best-effort.

mod events;
mod processor;
mod state;

pub use events::{DownstreamEvent, EventBus, LoggingEventBus};
pub use processor::{
    BatchOutcome, DecisionOutcome, DecisionProcessor, DecisionRequest, Modifications,
};
pub use state::{allowed_transition, is_valid_transition, verify_audit_chain};
