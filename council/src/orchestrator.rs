//! Council orchestration — five sequential phases over a fixed roster.
//!
//! The orchestrator owns the collaborator seams and the validated
//! configuration. A run walks point assignment, initial critique,
//! self-critique, arbitration, and synthesis in strict order; agents are
//! always processed sequentially, and no phase re-enters an earlier one.
//! `run` is infallible: every collaborator failure is absorbed into the
//! verdict as a degraded partial result.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::adjustment::{
    apply_to_tree, collect_arbitration, fold_self_critique, self_critique, AdjustmentRecord,
    SelfCritiqueFeedback,
};
use crate::config::{ConfigError, CouncilConfig};
use crate::context::RunContext;
use crate::critique::builder::TreeBuilder;
use crate::critique::AgentCritiqueResult;
use crate::model::{DirectiveSource, ModelCall, ModelRequest, PromptKind};
use crate::points::{ExtractedPoint, PointQueue};
use crate::synthesis::{synthesize, SignificantPoint};

/// Error from council construction.
#[derive(Debug, Error)]
pub enum CouncilError {
    /// The configuration failed validation.
    #[error("invalid council configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Aggregate score view over a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetrics {
    /// The arbiter's overall score, when arbitration produced one.
    pub overall_score: Option<f64>,
    /// Synthesized points labelled critical or high.
    pub high_severity_points: usize,
    /// Synthesized points labelled medium.
    pub medium_severity_points: usize,
    /// Synthesized points labelled low.
    pub low_severity_points: usize,
}

/// The complete result record of one council run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilVerdict {
    /// Unique id of the run.
    pub run_id: String,
    /// Longer templated summary of the outcome.
    pub final_assessment: String,
    /// Single-sentence summary of the outcome.
    pub final_assessment_summary: String,
    /// Per-agent critique results carrying the fully adjusted trees.
    pub adjusted_critique_trees: Vec<AgentCritiqueResult>,
    /// Per-agent self-critique feedback, roster order.
    pub self_critique_feedback: Vec<SelfCritiqueFeedback>,
    /// Adjustments the arbiter proposed, as received.
    pub arbitration_adjustments: Vec<AdjustmentRecord>,
    /// The arbiter's overall score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbiter_overall_score: Option<f64>,
    /// The arbiter's justification for its score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbiter_score_justification: Option<String>,
    /// Failure message when arbitration degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbiter_error: Option<String>,
    /// True when synthesis produced no significant points.
    pub no_findings: bool,
    /// Synthesized significant points.
    pub points: Vec<SignificantPoint>,
    /// Aggregate score view.
    pub score_metrics: ScoreMetrics,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

/// Parsed arbitration reply.
#[derive(Debug, Deserialize)]
struct ArbitrationPayload {
    #[serde(default)]
    adjustments: Vec<AdjustmentRecord>,
    #[serde(default)]
    overall_score: Option<f64>,
    #[serde(default)]
    score_justification: Option<String>,
}

#[derive(Debug, Default)]
struct ArbitrationOutcome {
    adjustments: Vec<AdjustmentRecord>,
    overall_score: Option<f64>,
    score_justification: Option<String>,
    error: Option<String>,
}

impl ArbitrationOutcome {
    fn skipped() -> Self {
        Self::default()
    }

    fn degraded(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }
}

/// Drives a critique council end-to-end.
pub struct CouncilOrchestrator {
    model: Box<dyn ModelCall>,
    directives: Box<dyn DirectiveSource>,
    config: CouncilConfig,
}

impl CouncilOrchestrator {
    /// Create an orchestrator over the given collaborators.
    ///
    /// Validates the configuration up front; a constructed orchestrator can
    /// no longer fail on configuration grounds.
    pub fn new(
        model: Box<dyn ModelCall>,
        directives: Box<dyn DirectiveSource>,
        config: CouncilConfig,
    ) -> Result<Self, CouncilError> {
        config.validate()?;
        Ok(Self {
            model,
            directives,
            config,
        })
    }

    /// The validated configuration in use.
    pub fn config(&self) -> &CouncilConfig {
        &self.config
    }

    /// Arbiter role for this run mode.
    pub fn arbiter_role(&self) -> &'static str {
        if self.config.scientific_mode {
            "Scientific Arbiter"
        } else {
            "Philosophical Arbiter"
        }
    }

    /// Run the council against `content` with pre-extracted points.
    ///
    /// Always returns a well-formed verdict. Empty or whitespace-only
    /// content short-circuits before any agent is invoked.
    pub fn run(&self, content: &str, points: Vec<ExtractedPoint>) -> CouncilVerdict {
        let ctx = RunContext::new();
        tracing::info!(
            run_id = %ctx.run_id,
            agents = self.config.roster_size(),
            points = points.len(),
            content_chars = content.chars().count(),
            "Council run started"
        );

        let (results, feedback, arbitration) = if content.trim().is_empty() {
            tracing::info!(
                run_id = %ctx.run_id,
                "Content is empty; run short-circuits with no findings"
            );
            (Vec::new(), Vec::new(), ArbitrationOutcome::skipped())
        } else {
            self.execute_phases(content, points, &ctx)
        };

        let synthesis = synthesize(&results, &self.config);
        let score_metrics = ScoreMetrics {
            overall_score: arbitration.overall_score,
            high_severity_points: synthesis.high_severity_points,
            medium_severity_points: synthesis.medium_severity_points,
            low_severity_points: synthesis.low_severity_points,
        };

        let verdict = CouncilVerdict {
            run_id: ctx.run_id.clone(),
            final_assessment: synthesis.final_assessment,
            final_assessment_summary: synthesis.final_assessment_summary,
            adjusted_critique_trees: results,
            self_critique_feedback: feedback,
            arbitration_adjustments: arbitration.adjustments,
            arbiter_overall_score: arbitration.overall_score,
            arbiter_score_justification: arbitration.score_justification,
            arbiter_error: arbitration.error,
            no_findings: synthesis.points.is_empty(),
            points: synthesis.points,
            score_metrics,
            duration_ms: ctx.elapsed_ms(),
        };

        tracing::info!(
            run_id = %ctx.run_id,
            points = verdict.points.len(),
            no_findings = verdict.no_findings,
            duration_ms = verdict.duration_ms,
            "Council run completed"
        );
        verdict
    }

    fn execute_phases(
        &self,
        content: &str,
        points: Vec<ExtractedPoint>,
        ctx: &RunContext,
    ) -> (
        Vec<AgentCritiqueResult>,
        Vec<SelfCritiqueFeedback>,
        ArbitrationOutcome,
    ) {
        // Phase 1: point assignment.
        let assignments = self.assign_points(&points);
        tracing::info!(
            run_id = %ctx.run_id,
            event = "point_assignment",
            status = "completed",
            points = points.len(),
            "Points assigned across the roster"
        );

        // Phase 2: initial critique, one agent at a time.
        tracing::info!(
            run_id = %ctx.run_id,
            event = "initial_critique",
            status = "started",
            agents = self.config.roster_size(),
            "Starting initial critique"
        );
        let mut results = Vec::with_capacity(self.config.roster_size());
        for (style, queue) in self.config.agent_styles.iter().zip(assignments) {
            match self.directives.directives_for(style) {
                Ok(directives) => {
                    let builder = TreeBuilder::new(self.model.as_ref(), &self.config);
                    let tree = builder.build(content, &directives, style, 0, queue, ctx);
                    results.push(AgentCritiqueResult::completed(style, tree));
                }
                Err(error) => {
                    tracing::warn!(
                        run_id = %ctx.run_id,
                        agent_style = %style,
                        error = %error,
                        "Agent critique failed; recording error entry"
                    );
                    results.push(AgentCritiqueResult::failed(style, &error.to_string()));
                }
            }
        }
        let errored = results.iter().filter(|r| r.is_errored()).count();
        tracing::info!(
            run_id = %ctx.run_id,
            event = "initial_critique",
            status = "completed",
            errored,
            elapsed_ms = ctx.elapsed_ms(),
            "Initial critique completed"
        );

        // Phase 3: self-critique. Deltas are folded and applied here;
        // arbitration always sees the adjusted trees.
        let feedback: Vec<SelfCritiqueFeedback> = (0..results.len())
            .map(|index| self_critique(&results, index, &self.config))
            .collect();
        let pending = fold_self_critique(&feedback);
        for result in &mut results {
            if let Some(tree) = &mut result.critique_tree {
                apply_to_tree(tree, &pending);
            }
        }
        tracing::info!(
            run_id = %ctx.run_id,
            event = "self_critique",
            status = "completed",
            adjustments = feedback.iter().map(|f| f.adjustments.len()).sum::<usize>(),
            elapsed_ms = ctx.elapsed_ms(),
            "Self-critique completed and applied"
        );

        // Phase 4: arbitration over the adjusted trees.
        let arbitration = self.arbitrate(&results, ctx);

        // Phase 5: apply arbitration adjustments.
        if !arbitration.adjustments.is_empty() {
            let pending = collect_arbitration(&arbitration.adjustments);
            for result in &mut results {
                if let Some(tree) = &mut result.critique_tree {
                    apply_to_tree(tree, &pending);
                }
            }
        }

        (results, feedback, arbitration)
    }

    /// Shuffle the points, then hand `floor(M / A)` to each agent in roster
    /// order with the remainder going to the last agent.
    fn assign_points(&self, points: &[ExtractedPoint]) -> Vec<PointQueue> {
        let agents = self.config.roster_size();
        let mut shuffled: Vec<ExtractedPoint> = points.to_vec();
        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        shuffled.shuffle(&mut rng);

        let per_agent = shuffled.len() / agents;
        let mut queues = Vec::with_capacity(agents);
        let mut cursor = 0;
        for index in 0..agents {
            let share = if index == agents - 1 {
                shuffled.len() - cursor
            } else {
                per_agent
            };
            queues.push(PointQueue::new(shuffled[cursor..cursor + share].to_vec()));
            cursor += share;
        }
        queues
    }

    fn arbitrate(&self, results: &[AgentCritiqueResult], ctx: &RunContext) -> ArbitrationOutcome {
        let candidates: Vec<&AgentCritiqueResult> =
            results.iter().filter(|r| !r.is_errored()).collect();
        if candidates.is_empty() {
            tracing::info!(
                run_id = %ctx.run_id,
                event = "arbitration",
                status = "skipped",
                "No successful critiques; arbitration skipped"
            );
            return ArbitrationOutcome::skipped();
        }

        let role = self.arbiter_role();
        let context = json!({
            "arbiter_role": role,
            "critiques": candidates,
        });
        let reply = match self
            .model
            .call(ModelRequest::structured(PromptKind::Arbitration, &context))
        {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    run_id = %ctx.run_id,
                    event = "arbitration",
                    status = "degraded",
                    error = %error,
                    "Arbitration call failed"
                );
                return ArbitrationOutcome::degraded(error.to_string());
            }
        };

        match serde_json::from_value::<ArbitrationPayload>(reply.payload) {
            Ok(payload) => {
                tracing::info!(
                    run_id = %ctx.run_id,
                    event = "arbitration",
                    status = "completed",
                    arbiter = role,
                    adjustments = payload.adjustments.len(),
                    elapsed_ms = ctx.elapsed_ms(),
                    "Arbitration completed"
                );
                ArbitrationOutcome {
                    adjustments: payload.adjustments,
                    overall_score: payload.overall_score,
                    score_justification: payload.score_justification,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(
                    run_id = %ctx.run_id,
                    event = "arbitration",
                    status = "degraded",
                    error = %error,
                    "Arbitration payload did not parse"
                );
                ArbitrationOutcome::degraded(format!("arbitration payload did not parse: {error}"))
            }
        }
    }
}
