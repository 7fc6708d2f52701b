//! Recursive critique-tree construction for a single agent.
//!
//! One [`TreeBuilder::build`] call produces one node: it assesses the
//! content slice, applies the confidence gate, asks for a decomposition into
//! sub-topics, and recurses over contiguous slices of the content. Every
//! collaborator failure is absorbed at this level; the builder never
//! propagates an error upward.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::CouncilConfig;
use crate::context::RunContext;
use crate::critique::CritiqueNode;
use crate::model::{ModelCall, ModelRequest, PromptKind};
use crate::points::{ExtractedPoint, PointQueue};

/// Content slices shorter than this are not worth a model call.
const MIN_SLICE_CHARS: usize = 50;

/// Claim recorded when the assessment call fails outright.
const PLACEHOLDER_CLAIM: &str = "Assessment unavailable for this content slice.";

/// Evidence recorded when the assessment call fails outright.
const PLACEHOLDER_EVIDENCE: &str = "The assessment call failed; no evidence was produced.";

/// Structured assessment of one content slice.
#[derive(Debug, Deserialize)]
struct Assessment {
    #[serde(default)]
    claim: String,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    recommendation: String,
    #[serde(default)]
    concession: String,
}

impl Assessment {
    fn placeholder() -> Self {
        Self {
            claim: PLACEHOLDER_CLAIM.to_string(),
            evidence: PLACEHOLDER_EVIDENCE.to_string(),
            confidence: 0.0,
            severity: String::new(),
            recommendation: String::new(),
            concession: String::new(),
        }
    }
}

/// Shape of a decomposition reply.
#[derive(Debug, PartialEq, Eq)]
enum DecompositionPayload {
    /// Sub-topic strings, possibly empty.
    Topics(Vec<String>),
    /// Anything else; carries the object keys that were observed.
    Unrecognized(Vec<String>),
}

impl DecompositionPayload {
    /// Accepts a bare array of strings, or an object carrying the array
    /// under one of `topics`, `items`, `subtopics`.
    fn parse(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::Topics(collect_strings(items)),
            Value::Object(map) => {
                for key in ["topics", "items", "subtopics"] {
                    if let Some(Value::Array(items)) = map.get(key) {
                        return Self::Topics(collect_strings(items));
                    }
                }
                Self::Unrecognized(map.keys().cloned().collect())
            }
            _ => Self::Unrecognized(Vec::new()),
        }
    }
}

fn collect_strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}

/// Builds one agent's critique tree through the model seam.
pub struct TreeBuilder<'a> {
    model: &'a dyn ModelCall,
    config: &'a CouncilConfig,
}

impl<'a> TreeBuilder<'a> {
    /// Create a builder over the given model seam and configuration.
    pub fn new(model: &'a dyn ModelCall, config: &'a CouncilConfig) -> Self {
        Self { model, config }
    }

    /// Build the critique node for one content slice, recursing into
    /// sub-topics.
    ///
    /// Returns `None` when the branch is gated: depth exhausted, content too
    /// short, or assessed confidence below the threshold. Gated branches at
    /// depth or length make no model call at all.
    pub fn build(
        &self,
        content: &str,
        style_directives: &str,
        agent_style: &str,
        depth: usize,
        points: PointQueue,
        ctx: &RunContext,
    ) -> Option<CritiqueNode> {
        if depth >= self.config.max_depth {
            tracing::debug!(agent_style, depth, "Depth limit reached; branch not expanded");
            return None;
        }
        let chars = content.chars().count();
        if chars < MIN_SLICE_CHARS {
            tracing::debug!(
                agent_style,
                depth,
                chars,
                "Content slice below minimum length; branch not expanded"
            );
            return None;
        }

        let (own_point, remaining) = match points.take_front() {
            Some((point, rest)) => (Some(point), rest),
            None => (None, points),
        };

        let assessment = self.assess(content, style_directives, agent_style, depth, &own_point);
        let confidence = assessment.confidence.clamp(0.0, 1.0);

        if confidence < self.config.confidence_threshold {
            tracing::debug!(
                agent_style,
                depth,
                confidence,
                threshold = self.config.confidence_threshold,
                "Confidence below threshold; branch pruned"
            );
            return None;
        }

        let topics = self.decompose(content, agent_style, depth, &assessment.claim, ctx);

        let mut node = CritiqueNode::new(
            &assessment.claim,
            &assessment.evidence,
            confidence,
            &assessment.severity,
        )
        .with_recommendation(&assessment.recommendation)
        .with_concession(&assessment.concession);
        if let Some(point) = &own_point {
            node = node.with_point(&point.id);
        }

        if !topics.is_empty() {
            let slices = split_even(content, topics.len());
            let child_points = remaining.distribute(topics.len());
            for (slice, child_queue) in slices.iter().zip(child_points) {
                if let Some(child) = self.build(
                    slice,
                    style_directives,
                    agent_style,
                    depth + 1,
                    child_queue,
                    ctx,
                ) {
                    node.add_sub_critique(child);
                }
            }
        }

        Some(node)
    }

    fn assess(
        &self,
        content: &str,
        style_directives: &str,
        agent_style: &str,
        depth: usize,
        own_point: &Option<ExtractedPoint>,
    ) -> Assessment {
        let context = json!({
            "content": content,
            "style_directives": style_directives,
            "agent_style": agent_style,
            "depth": depth,
            "assigned_point": own_point.as_ref().map(|p| p.text.as_str()),
        });
        let reply = match self
            .model
            .call(ModelRequest::structured(PromptKind::Assessment, &context))
        {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    agent_style,
                    depth,
                    error = %error,
                    "Assessment call failed; recording placeholder claim"
                );
                return Assessment::placeholder();
            }
        };
        match serde_json::from_value::<Assessment>(reply.payload) {
            Ok(assessment) => assessment,
            Err(error) => {
                tracing::warn!(
                    agent_style,
                    depth,
                    error = %error,
                    "Assessment payload did not parse; recording placeholder claim"
                );
                Assessment::placeholder()
            }
        }
    }

    fn decompose(
        &self,
        content: &str,
        agent_style: &str,
        depth: usize,
        claim: &str,
        ctx: &RunContext,
    ) -> Vec<String> {
        let context = json!({
            "content": content,
            "agent_style": agent_style,
            "depth": depth,
            "claim": claim,
        });
        let reply = match self
            .model
            .call(ModelRequest::structured(PromptKind::Decomposition, &context))
        {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    agent_style,
                    depth,
                    error = %error,
                    "Decomposition call failed; continuing without sub-topics"
                );
                return Vec::new();
            }
        };
        match DecompositionPayload::parse(&reply.payload) {
            DecompositionPayload::Topics(topics) => topics,
            DecompositionPayload::Unrecognized(keys) => {
                ctx.warn_decomposition_once(agent_style, &keys);
                Vec::new()
            }
        }
    }
}

/// Split `content` into `n` contiguous slices of equal character count, the
/// last slice absorbing the remainder.
fn split_even(content: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let size = chars.len() / n;
    (0..n)
        .map(|i| {
            let start = i * size;
            let end = if i == n - 1 { chars.len() } else { start + size };
            chars[start..end].iter().collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedModel;

    fn long_content(chars: usize) -> String {
        "abcdefghij".chars().cycle().take(chars).collect()
    }

    fn assessment_payload(confidence: f64, severity: &str) -> Value {
        json!({
            "claim": format!("claim at confidence {confidence}"),
            "evidence": "supporting evidence for the claim",
            "confidence": confidence,
            "severity": severity,
        })
    }

    fn permissive_config() -> CouncilConfig {
        CouncilConfig {
            max_depth: 3,
            confidence_threshold: 0.4,
            ..Default::default()
        }
    }

    #[test]
    fn test_depth_gate_makes_no_call() {
        let model = ScriptedModel::new();
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let result = builder.build(
            &long_content(200),
            "directives",
            "Stoic",
            3,
            PointQueue::empty(),
            &ctx,
        );
        assert!(result.is_none());
        assert_eq!(model.calls(PromptKind::Assessment), 0);
        assert_eq!(model.calls(PromptKind::Decomposition), 0);
    }

    #[test]
    fn test_short_content_gate_makes_no_call() {
        let model = ScriptedModel::new();
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let result = builder.build(
            "too short",
            "directives",
            "Stoic",
            0,
            PointQueue::empty(),
            &ctx,
        );
        assert!(result.is_none());
        assert_eq!(model.calls(PromptKind::Assessment), 0);
    }

    #[test]
    fn test_confidence_gate_skips_decomposition() {
        let model = ScriptedModel::new();
        model.push_reply(PromptKind::Assessment, assessment_payload(0.2, "low"));
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let result = builder.build(
            &long_content(200),
            "directives",
            "Stoic",
            0,
            PointQueue::empty(),
            &ctx,
        );
        assert!(result.is_none());
        assert_eq!(model.calls(PromptKind::Assessment), 1);
        assert_eq!(model.calls(PromptKind::Decomposition), 0);
    }

    #[test]
    fn test_assessment_failure_records_placeholder() {
        let model = ScriptedModel::new();
        model.push_failure(PromptKind::Assessment, "backend down");
        model.set_default(PromptKind::Decomposition, json!([]));
        let config = CouncilConfig {
            confidence_threshold: 0.0,
            ..permissive_config()
        };
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let node = builder
            .build(
                &long_content(200),
                "directives",
                "Stoic",
                0,
                PointQueue::empty(),
                &ctx,
            )
            .unwrap();
        assert_eq!(node.claim, PLACEHOLDER_CLAIM);
        assert_eq!(node.evidence, PLACEHOLDER_EVIDENCE);
        assert_eq!(node.confidence, 0.0);
    }

    #[test]
    fn test_unparseable_assessment_records_placeholder() {
        let model = ScriptedModel::new();
        model.push_reply(PromptKind::Assessment, json!("not an object"));
        model.set_default(PromptKind::Decomposition, json!([]));
        let config = CouncilConfig {
            confidence_threshold: 0.0,
            ..permissive_config()
        };
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let node = builder
            .build(
                &long_content(200),
                "directives",
                "Stoic",
                0,
                PointQueue::empty(),
                &ctx,
            )
            .unwrap();
        assert_eq!(node.claim, PLACEHOLDER_CLAIM);
    }

    #[test]
    fn test_out_of_range_confidence_clamped_at_intake() {
        let model = ScriptedModel::new();
        model.push_reply(PromptKind::Assessment, assessment_payload(1.4, "high"));
        model.set_default(PromptKind::Decomposition, json!([]));
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let node = builder
            .build(
                &long_content(200),
                "directives",
                "Stoic",
                0,
                PointQueue::empty(),
                &ctx,
            )
            .unwrap();
        assert_eq!(node.confidence, 1.0);
    }

    #[test]
    fn test_recursion_over_bare_array_topics() {
        let model = ScriptedModel::new();
        // Root assessment, then one per child slice.
        model.push_reply(PromptKind::Assessment, assessment_payload(0.9, "high"));
        model.push_reply(PromptKind::Assessment, assessment_payload(0.8, "medium"));
        model.push_reply(PromptKind::Assessment, assessment_payload(0.7, "low"));
        model.push_reply(PromptKind::Decomposition, json!(["part one", "part two"]));
        model.set_default(PromptKind::Decomposition, json!([]));
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let node = builder
            .build(
                &long_content(200),
                "directives",
                "Stoic",
                0,
                PointQueue::empty(),
                &ctx,
            )
            .unwrap();
        assert_eq!(node.sub_critiques.len(), 2);
        assert_eq!(model.calls(PromptKind::Assessment), 3);
        // Children each asked for their own decomposition.
        assert_eq!(model.calls(PromptKind::Decomposition), 3);
        assert!(!ctx.decomposition_warned());
    }

    #[test]
    fn test_object_payload_with_topics_key() {
        for key in ["topics", "items", "subtopics"] {
            let payload = json!({ key: ["a", "b"] });
            assert_eq!(
                DecompositionPayload::parse(&payload),
                DecompositionPayload::Topics(vec!["a".to_string(), "b".to_string()])
            );
        }
    }

    #[test]
    fn test_unrecognized_payload_warns_once_and_yields_leaf() {
        let model = ScriptedModel::new();
        model.set_default(PromptKind::Assessment, assessment_payload(0.9, "high"));
        model.set_default(PromptKind::Decomposition, json!({"sections": ["a", "b"]}));
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let node = builder
            .build(
                &long_content(200),
                "directives",
                "Stoic",
                0,
                PointQueue::empty(),
                &ctx,
            )
            .unwrap();
        assert!(node.sub_critiques.is_empty());
        assert!(ctx.decomposition_warned());
    }

    #[test]
    fn test_decomposition_failure_yields_leaf() {
        let model = ScriptedModel::new();
        model.push_reply(PromptKind::Assessment, assessment_payload(0.9, "high"));
        model.push_failure(PromptKind::Decomposition, "backend down");
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let node = builder
            .build(
                &long_content(200),
                "directives",
                "Stoic",
                0,
                PointQueue::empty(),
                &ctx,
            )
            .unwrap();
        assert!(node.sub_critiques.is_empty());
        assert!(!ctx.decomposition_warned());
    }

    #[test]
    fn test_point_assignment_root_then_children() {
        let model = ScriptedModel::new();
        model.set_default(PromptKind::Assessment, assessment_payload(0.9, "high"));
        model.push_reply(PromptKind::Decomposition, json!(["left", "right"]));
        model.set_default(PromptKind::Decomposition, json!([]));
        let config = permissive_config();
        let builder = TreeBuilder::new(&model, &config);
        let ctx = RunContext::new();

        let points = PointQueue::new(vec![
            ExtractedPoint::new("p-0", "first point"),
            ExtractedPoint::new("p-1", "second point"),
            ExtractedPoint::new("p-2", "third point"),
        ]);
        let node = builder
            .build(&long_content(240), "directives", "Stoic", 0, points, &ctx)
            .unwrap();

        assert_eq!(node.assigned_point_id.as_deref(), Some("p-0"));
        let child_points: Vec<Option<&str>> = node
            .sub_critiques
            .iter()
            .map(|c| c.assigned_point_id.as_deref())
            .collect();
        assert_eq!(child_points, vec![Some("p-1"), Some("p-2")]);
    }

    #[test]
    fn test_split_even_covers_content() {
        let slices = split_even("abcdefghij", 3);
        assert_eq!(slices, vec!["abc", "def", "ghij"]);
        assert_eq!(split_even("ab", 1), vec!["ab"]);
    }

    #[test]
    fn test_parse_non_collection_payload_unrecognized() {
        assert_eq!(
            DecompositionPayload::parse(&json!("just text")),
            DecompositionPayload::Unrecognized(Vec::new())
        );
        assert_eq!(
            DecompositionPayload::parse(&json!({"other": 1, "keys": 2})),
            DecompositionPayload::Unrecognized(vec!["keys".to_string(), "other".to_string()])
        );
    }
}
