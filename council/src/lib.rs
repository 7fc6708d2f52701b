//! Critique Council Core
//!
//! This library runs a council of independent critique agents against a
//! piece of text and synthesizes their findings:
//! - Each agent recursively decomposes the content into a tree of claims,
//!   gated by depth, slice length, and assessed confidence
//! - A peer-consensus heuristic proposes bounded confidence adjustments
//!   against each agent's own claims, with no model call involved
//! - A single arbiter reviews the adjusted trees and contributes its own
//!   adjustments plus an overall score
//! - Synthesis filters, deduplicates, and labels the surviving claims into
//!   the final point list
//!
//! The core is fully synchronous and single-threaded. Everything that talks
//! to a model goes through the [`ModelCall`] and [`DirectiveSource`] seams;
//! the deterministic [`ScriptedModel`] implements both for tests and
//! offline runs.
//!
//! # Usage
//!
//! ```
//! use council::{CouncilConfig, CouncilOrchestrator, ExtractedPoint, ScriptedModel};
//! use serde_json::json;
//!
//! let model = ScriptedModel::new();
//! model.set_default(council::PromptKind::Assessment, json!({
//!     "claim": "The argument rests on an unstated premise.",
//!     "evidence": "The second paragraph assumes what it sets out to show.",
//!     "confidence": 0.8,
//!     "severity": "high",
//! }));
//! model.set_default(council::PromptKind::Decomposition, json!([]));
//! model.set_default(council::PromptKind::Arbitration, json!({"adjustments": []}));
//!
//! let orchestrator = CouncilOrchestrator::new(
//!     Box::new(model.clone()),
//!     Box::new(model),
//!     CouncilConfig::default(),
//! )
//! .unwrap();
//!
//! let content = "A long argument whose premises deserve careful scrutiny \
//!                from more than one critical perspective.";
//! let verdict = orchestrator.run(content, vec![ExtractedPoint::new("p-1", "the premise")]);
//! assert!(!verdict.no_findings);
//! ```

pub mod adjustment;
pub mod config;
pub mod context;
pub mod critique;
pub mod model;
pub mod orchestrator;
pub mod points;
pub mod synthesis;

// Re-export the orchestration surface
pub use orchestrator::{CouncilError, CouncilOrchestrator, CouncilVerdict, ScoreMetrics};

// Re-export configuration types
pub use config::{ConfigError, CouncilConfig};

// Re-export the critique data model
pub use critique::builder::TreeBuilder;
pub use critique::{severity_score, AgentCritiqueResult, CritiqueNode, FlatNode};

// Re-export adjustment types
pub use adjustment::{
    apply_to_tree, collect_arbitration, fold_self_critique, self_critique, AdjustmentRecord,
    AppliedDelta, SelfCritiqueFeedback,
};

// Re-export synthesis types
pub use synthesis::{synthesize, SignificantPoint, Synthesis};

// Re-export the collaborator seams
pub use model::{DirectiveSource, ModelCall, ModelReply, ModelRequest, PromptKind, ScriptedModel};

// Re-export run plumbing
pub use context::RunContext;
pub use points::{ExtractedPoint, PointQueue};
