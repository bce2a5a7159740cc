//! Per-article pipeline orchestration.
//!
//! Given a feed id and a since-cursor, the orchestrator pulls parsed
//! articles from the feed parser and runs each through
//! relevance → dedup → guardrail → triage → store → dispatch, with
//! bounded concurrency across articles and strict sequencing within one.
//! A failing article never takes down the batch.

mod orchestrator;
mod retry;
mod trace;

pub use orchestrator::{ArticleOutcome, FeedRunSummary, Orchestrator, PipelineConfig};
pub use retry::{retry_transient, RetryConfig};
pub use trace::{ProcessingTrace, StepOutcome, StepTrace};
