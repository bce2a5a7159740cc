//! # sentinel-core
//!
//! An automated cybersecurity-intelligence triage pipeline. Articles
//! arrive from RSS/Atom feeds, get scored against a configured watchlist,
//! deduplicated against recent coverage, passed through a multi-layer
//! content-safety guardrail, and routed to one of three terminal
//! dispositions: publish automatically, queue for human review, or drop.
//!
//! ## Core Components
//!
//! - **Registry**: feed and keyword configuration with fuzzy matching
//! - **Relevance**: keyword hits + model relevance + entity extraction
//! - **Dedup**: heuristic fingerprints with a semantic fallback stage
//! - **Guardrail**: schema, PII, CVE, and bias/sensationalism checks
//! - **Triage**: the pure threshold matrix deciding each article's fate
//! - **Escalation**: priority-scored review queue with notifications
//! - **Decision**: human decisions, the state machine, and audit trail
//! - **Pipeline**: the per-article orchestrator with bounded concurrency
//!
//! ## Example
//!
//! ```rust,ignore
//! use sentinel_core::{triage, RelevanceResult, GuardrailResult};
//!
//! let action = triage::decide(&relevance, &guardrail);
//! println!("triage action: {}", action.action);
//! ```

pub mod article;
pub mod comments;
pub mod decision;
pub mod dedup;
pub mod error;
pub mod escalation;
pub mod feed;
pub mod guardrail;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod relevance;
pub mod store;
pub mod triage;

// Re-exports for convenience
pub use article::{
    Article, ArticleState, AuditAction, AuditEntry, Decision, EntityExtraction, EscalationReason,
    EscalationRecord, KeywordMatch, Priority, TriageAction,
};
pub use comments::{
    build_tree, flatten_tree, thread_stats, Comment, CommentNode, CommentStore, ThreadStats,
    Visibility,
};
pub use decision::{
    allowed_transition, is_valid_transition, verify_audit_chain, BatchOutcome, DecisionOutcome,
    DecisionProcessor, DecisionRequest, DownstreamEvent, EventBus, LoggingEventBus, Modifications,
};
pub use dedup::{
    ArticleFingerprint, ClusterManager, DedupEngine, DedupMethod, DuplicationResult,
    HeuristicDeduplicator, SemanticDeduplicator,
};
pub use error::{Error, Result};
pub use escalation::{
    Escalator, LoggingNotificationSink, Notification, NotificationSink, PriorityFactors,
    PriorityScorer, ReviewQueue,
};
pub use feed::{FeedParser, ParsedArticle};
pub use guardrail::{
    GuardrailResult, GuardrailValidator, PiiDetector, Severity, Violation, ViolationKind,
};
pub use models::{
    AnthropicModels, EmbeddingModel, EntityExtractionModel, ModelConfig, ModerationAssessment,
    ModerationModel, PiiModel, PiiSpan, RelevanceAssessment, RelevanceModel, VoyageEmbeddings,
};
pub use pipeline::{
    ArticleOutcome, FeedRunSummary, Orchestrator, PipelineConfig, ProcessingTrace, RetryConfig,
    StepOutcome,
};
pub use query::{ArticleSummary, QueryFacade, ReportFilter, ReportRow, SummaryPage};
pub use registry::{
    FeedConfig, FeedRegistry, FeedsConfig, KeywordConfig, KeywordMatcher, KeywordRegistry,
    KeywordsConfig, MatchSettings,
};
pub use relevance::{RelevanceEvaluator, RelevanceResult};
pub use store::{
    BlobStore, EntityStore, QueryPage, RangeBound, SqliteBlobStore, SqliteEntityStore,
    SqliteVectorIndex, VectorHit, VectorIndex, VectorRecord, WriteOp,
};
pub use triage::TriageResult;
