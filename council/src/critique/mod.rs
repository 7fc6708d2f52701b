//! Critique-tree data model — nodes, per-agent results, severity lexicon.
//!
//! A critique tree is built once per agent during the initial critique
//! phase, mutated in place by the adjustment passes, read by synthesis, and
//! discarded at the end of the run.

pub mod builder;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Numeric score for a severity label.
///
/// Labels are matched case-insensitively against a closed lexicon; unknown
/// or absent labels score 0.5.
pub fn severity_score(label: &str) -> f64 {
    match label.trim().to_lowercase().as_str() {
        "critical" => 1.0,
        "severe" => 0.9,
        "major" => 0.8,
        "high" => 0.75,
        "significant" => 0.65,
        "medium" | "moderate" => 0.5,
        "balanced" => 0.45,
        "low" => 0.3,
        "minor" => 0.2,
        "info" => 0.1,
        "none" => 0.0,
        _ => 0.5,
    }
}

/// One claim in a critique tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueNode {
    /// Unique id, the target key for confidence adjustments.
    pub id: String,
    /// The claim this node makes about its content slice.
    pub claim: String,
    /// Supporting evidence for the claim.
    #[serde(default)]
    pub evidence: String,
    /// Confidence in the claim. Held within [0, 1] by every write path.
    pub confidence: f64,
    /// Severity label from the open vocabulary (see [`severity_score`]).
    #[serde(default)]
    pub severity: String,
    /// Suggested remediation, if the agent offered one.
    #[serde(default)]
    pub recommendation: String,
    /// The agent's own concession against its claim.
    #[serde(default)]
    pub concession: String,
    /// Extracted point this node argues, when one was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_point_id: Option<String>,
    /// Arbiter comment attached during arbitration application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbitration: Option<String>,
    /// Child critiques, in decomposition order.
    #[serde(default)]
    pub sub_critiques: Vec<CritiqueNode>,
}

impl CritiqueNode {
    /// Create a leaf node with a fresh id.
    pub fn new(claim: &str, evidence: &str, confidence: f64, severity: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            claim: claim.to_string(),
            evidence: evidence.to_string(),
            confidence,
            severity: severity.to_string(),
            recommendation: String::new(),
            concession: String::new(),
            assigned_point_id: None,
            arbitration: None,
            sub_critiques: Vec::new(),
        }
    }

    /// Set the assigned extracted point.
    pub fn with_point(mut self, point_id: &str) -> Self {
        self.assigned_point_id = Some(point_id.to_string());
        self
    }

    /// Set the recommendation text.
    pub fn with_recommendation(mut self, recommendation: &str) -> Self {
        self.recommendation = recommendation.to_string();
        self
    }

    /// Set the concession text.
    pub fn with_concession(mut self, concession: &str) -> Self {
        self.concession = concession.to_string();
        self
    }

    /// Append a child critique.
    pub fn add_sub_critique(&mut self, child: CritiqueNode) {
        self.sub_critiques.push(child);
    }

    /// Numeric severity of this node.
    pub fn severity_score(&self) -> f64 {
        severity_score(&self.severity)
    }

    /// Total number of nodes in this subtree, the root included.
    pub fn node_count(&self) -> usize {
        1 + self
            .sub_critiques
            .iter()
            .map(CritiqueNode::node_count)
            .sum::<usize>()
    }

    /// Flatten the subtree in depth-first pre-order, tagging each node with
    /// its depth relative to this root.
    pub fn flatten(&self) -> Vec<FlatNode<'_>> {
        let mut out = Vec::new();
        self.collect(0, &mut out);
        out
    }

    fn collect<'a>(&'a self, depth: usize, out: &mut Vec<FlatNode<'a>>) {
        out.push(FlatNode { depth, node: self });
        for child in &self.sub_critiques {
            child.collect(depth + 1, out);
        }
    }
}

/// A node paired with its depth, as produced by [`CritiqueNode::flatten`].
#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'a> {
    /// Depth relative to the flattened root (root = 0).
    pub depth: usize,
    /// The node itself.
    pub node: &'a CritiqueNode,
}

/// Outcome of one agent's critique phase.
///
/// A tree of `None` with no error means the agent's whole critique was
/// gated away (low confidence or short content), which is a valid outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCritiqueResult {
    /// The agent's style name.
    pub agent_style: String,
    /// The critique tree, when one was produced.
    pub critique_tree: Option<CritiqueNode>,
    /// Failure message, when the agent could not run at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentCritiqueResult {
    /// A completed critique (possibly gated to no tree).
    pub fn completed(agent_style: &str, critique_tree: Option<CritiqueNode>) -> Self {
        Self {
            agent_style: agent_style.to_string(),
            critique_tree,
            error: None,
        }
    }

    /// A failed critique.
    pub fn failed(agent_style: &str, error: &str) -> Self {
        Self {
            agent_style: agent_style.to_string(),
            critique_tree: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether this agent failed outright.
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> CritiqueNode {
        let mut root = CritiqueNode::new("root claim", "root evidence", 0.8, "high");
        let mut left = CritiqueNode::new("left claim", "left evidence", 0.6, "medium");
        left.add_sub_critique(CritiqueNode::new("leaf claim", "", 0.5, "low"));
        root.add_sub_critique(left);
        root.add_sub_critique(CritiqueNode::new("right claim", "", 0.7, "critical"));
        root
    }

    #[test]
    fn test_severity_lexicon() {
        assert_eq!(severity_score("critical"), 1.0);
        assert_eq!(severity_score("Critical"), 1.0);
        assert_eq!(severity_score("  HIGH  "), 0.75);
        assert_eq!(severity_score("moderate"), 0.5);
        assert_eq!(severity_score("medium"), 0.5);
        assert_eq!(severity_score("none"), 0.0);
    }

    #[test]
    fn test_unknown_severity_scores_half() {
        assert_eq!(severity_score("catastrophic"), 0.5);
        assert_eq!(severity_score(""), 0.5);
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = CritiqueNode::new("a", "", 0.5, "low");
        let b = CritiqueNode::new("a", "", 0.5, "low");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_flatten_is_preorder_with_depth() {
        let tree = sample_tree();
        let flat = tree.flatten();
        let claims: Vec<&str> = flat.iter().map(|f| f.node.claim.as_str()).collect();
        assert_eq!(
            claims,
            vec!["root claim", "left claim", "leaf claim", "right claim"]
        );
        let depths: Vec<usize> = flat.iter().map(|f| f.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_node_count() {
        assert_eq!(sample_tree().node_count(), 4);
        assert_eq!(CritiqueNode::new("x", "", 0.1, "low").node_count(), 1);
    }

    #[test]
    fn test_builder_setters() {
        let node = CritiqueNode::new("claim", "evidence", 0.9, "major")
            .with_point("point-1")
            .with_recommendation("tighten the argument")
            .with_concession("none");
        assert_eq!(node.assigned_point_id.as_deref(), Some("point-1"));
        assert_eq!(node.recommendation, "tighten the argument");
        assert_eq!(node.concession, "none");
        assert!(node.arbitration.is_none());
    }

    #[test]
    fn test_agent_result_constructors() {
        let ok = AgentCritiqueResult::completed("Stoic", Some(sample_tree()));
        assert!(!ok.is_errored());
        assert!(ok.critique_tree.is_some());

        let gated = AgentCritiqueResult::completed("Stoic", None);
        assert!(!gated.is_errored());

        let failed = AgentCritiqueResult::failed("Skeptic", "directives unavailable");
        assert!(failed.is_errored());
        assert!(failed.critique_tree.is_none());
    }

    #[test]
    fn test_node_serde_roundtrip() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let parsed: CritiqueNode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tree);
        // Unset options are omitted from the wire form.
        assert!(!json.contains("assigned_point_id"));
        assert!(!json.contains("arbitration"));
    }
}
