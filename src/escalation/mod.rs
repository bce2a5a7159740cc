//! Escalation into the human review queue.
//!
//! When triage decides REVIEW, the escalator scores the article's
//! priority, transitions it to REVIEW atomically with its escalation
//! record, estimates the queue position, and notifies the reviewer list.
//! Notification failure never fails the escalation.

mod notify;
mod priority;
mod queue;

pub use notify::{LoggingNotificationSink, Notification, NotificationSink};
pub use priority::{PriorityFactors, PriorityScorer};
pub use queue::{Escalator, ReviewQueue};
