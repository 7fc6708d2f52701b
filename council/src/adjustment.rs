//! Confidence adjustment — the self-critique heuristic and tree application.
//!
//! Self-critique is a pure numeric pass: each agent's claims are measured
//! against the peer pool and out-of-consensus confidences attract a bounded
//! delta. No model call is involved. Arbitration deltas arrive from the
//! arbiter as a flat list. Both are applied through the same in-place tree
//! walk, which owns the [0, 1] clamping invariant.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::CouncilConfig;
use crate::critique::{AgentCritiqueResult, CritiqueNode};

/// Peer confidence differences inside this tolerance leave the consensus
/// term silent.
const CONFIDENCE_TOLERANCE: f64 = 0.05;

/// Peer severity gaps inside this tolerance leave the severity term silent.
const SEVERITY_TOLERANCE: f64 = 0.15;

/// Concession penalty: base plus a per-character rate, capped.
const CONCESSION_BASE: f64 = 0.04;
const CONCESSION_CAP: f64 = 0.1;

/// Per-character rate shared by the two length-derived terms.
const LENGTH_RATE: f64 = 0.0005;

/// Concession texts that count as no concession at all.
const TRIVIAL_CONCESSIONS: [&str; 6] = ["", "none", "n/a", "na", "no concession", "not applicable"];

/// Severe claims (score at or above this) with evidence shorter than
/// [`THIN_EVIDENCE_MAX_CHARS`] lose [`THIN_EVIDENCE_PENALTY`].
const THIN_EVIDENCE_MIN_SEVERITY: f64 = 0.6;
const THIN_EVIDENCE_MAX_CHARS: usize = 40;
const THIN_EVIDENCE_PENALTY: f64 = -0.05;

/// Mild claims (score at or below this) with long evidence and unsettled
/// confidence gain up to [`VERBOSE_EVIDENCE_CAP`].
const VERBOSE_EVIDENCE_MAX_SEVERITY: f64 = 0.45;
const VERBOSE_EVIDENCE_MIN_CHARS: usize = 120;
const VERBOSE_EVIDENCE_MAX_CONFIDENCE: f64 = 0.6;
const VERBOSE_EVIDENCE_CAP: f64 = 0.08;

/// Depth attenuation never drops below this factor.
const DEPTH_FACTOR_FLOOR: f64 = 0.45;

/// One proposed confidence delta against a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    /// Id of the claim node this delta targets.
    pub target_claim_id: String,
    /// Signed delta; may exceed [0, 1] bounds before application clamps.
    #[serde(default)]
    pub confidence_delta: f64,
    /// Why the delta was proposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Arbiter comment to attach to the node on application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbitration_comment: Option<String>,
}

/// One agent's self-critique output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCritiqueFeedback {
    /// The agent whose claims were reviewed.
    pub agent_style: String,
    /// Proposed deltas against that agent's own claims.
    pub adjustments: Vec<AdjustmentRecord>,
    /// Failure message, unused by the heuristic but kept on the wire shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A folded delta ready for one application pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedDelta {
    /// Net signed delta for the target claim.
    pub delta: f64,
    /// Arbiter comment, when the delta came from arbitration.
    pub comment: Option<String>,
}

/// Run the self-critique heuristic for the agent at `own_index`.
///
/// The peer pool is every other agent's flattened tree. A node with an
/// assigned point is only compared against peer nodes arguing the same
/// point; unassigned nodes are compared against the whole pool. Agents
/// without a tree yield an empty adjustment list.
pub fn self_critique(
    results: &[AgentCritiqueResult],
    own_index: usize,
    config: &CouncilConfig,
) -> SelfCritiqueFeedback {
    let own = &results[own_index];
    let peer_nodes: Vec<&CritiqueNode> = results
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != own_index)
        .filter_map(|(_, result)| result.critique_tree.as_ref())
        .flat_map(|tree| tree.flatten())
        .map(|flat| flat.node)
        .collect();

    let mut adjustments = Vec::new();
    if let Some(tree) = &own.critique_tree {
        for flat in tree.flatten() {
            if let Some(record) = node_adjustment(flat.node, flat.depth, &peer_nodes, config) {
                adjustments.push(record);
            }
        }
    }

    SelfCritiqueFeedback {
        agent_style: own.agent_style.clone(),
        adjustments,
        error: None,
    }
}

fn node_adjustment(
    node: &CritiqueNode,
    depth: usize,
    peers: &[&CritiqueNode],
    config: &CouncilConfig,
) -> Option<AdjustmentRecord> {
    let scope: Vec<&CritiqueNode> = match &node.assigned_point_id {
        Some(point) => peers
            .iter()
            .copied()
            .filter(|peer| peer.assigned_point_id.as_deref() == Some(point.as_str()))
            .collect(),
        None => peers.to_vec(),
    };

    let mut sum = 0.0;
    let mut fired = 0usize;
    let mut reasons: Vec<String> = Vec::new();
    let own_severity = node.severity_score();

    if !scope.is_empty() {
        let mean_confidence =
            scope.iter().map(|peer| peer.confidence).sum::<f64>() / scope.len() as f64;
        let diff = mean_confidence - node.confidence;
        if diff.abs() >= CONFIDENCE_TOLERANCE {
            sum += (diff * config.consensus_weight).clamp(-config.max_delta, config.max_delta);
            fired += 1;
            reasons.push(format!(
                "peer confidence mean {:.2} against own {:.2}",
                mean_confidence, node.confidence
            ));
        }

        let mean_severity =
            scope.iter().map(|peer| peer.severity_score()).sum::<f64>() / scope.len() as f64;
        let gap = mean_severity - own_severity;
        if gap.abs() >= SEVERITY_TOLERANCE {
            sum += (gap * config.severity_weight).clamp(-config.max_delta, config.max_delta);
            fired += 1;
            reasons.push(format!(
                "peer severity mean {:.2} against own {:.2}",
                mean_severity, own_severity
            ));
        }
    }

    if !is_trivial_concession(&node.concession) {
        let chars = node.concession.chars().count() as f64;
        sum -= (CONCESSION_BASE + LENGTH_RATE * chars).min(CONCESSION_CAP);
        fired += 1;
        reasons.push("concession offered against the claim".to_string());
    }

    let evidence_chars = node.evidence.chars().count();
    if own_severity >= THIN_EVIDENCE_MIN_SEVERITY && evidence_chars < THIN_EVIDENCE_MAX_CHARS {
        sum += THIN_EVIDENCE_PENALTY;
        fired += 1;
        reasons.push("evidence too thin for the claimed severity".to_string());
    } else if own_severity <= VERBOSE_EVIDENCE_MAX_SEVERITY
        && evidence_chars > VERBOSE_EVIDENCE_MIN_CHARS
        && node.confidence < VERBOSE_EVIDENCE_MAX_CONFIDENCE
    {
        sum += (LENGTH_RATE * evidence_chars as f64).min(VERBOSE_EVIDENCE_CAP);
        fired += 1;
        reasons.push("extensive evidence for a mild claim".to_string());
    }

    if fired == 0 {
        return None;
    }

    let depth_factor = (1.0 - config.depth_decay * depth as f64).max(DEPTH_FACTOR_FLOOR);
    let delta = (sum * depth_factor).clamp(-config.max_delta, config.max_delta);
    if delta.abs() < config.minimum_delta {
        return None;
    }

    Some(AdjustmentRecord {
        target_claim_id: node.id.clone(),
        confidence_delta: delta,
        reasoning: Some(reasons.join("; ")),
        arbitration_comment: None,
    })
}

fn is_trivial_concession(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    TRIVIAL_CONCESSIONS.contains(&normalized.as_str())
}

/// Fold all self-critique feedback into one pending map, summing deltas that
/// target the same claim.
pub fn fold_self_critique(feedback: &[SelfCritiqueFeedback]) -> HashMap<String, AppliedDelta> {
    let mut pending: HashMap<String, AppliedDelta> = HashMap::new();
    for entry in feedback {
        for record in &entry.adjustments {
            pending
                .entry(record.target_claim_id.clone())
                .or_default()
                .delta += record.confidence_delta;
        }
    }
    pending
}

/// Collapse arbitration records into one pending map; for repeated targets
/// the last record wins outright.
pub fn collect_arbitration(records: &[AdjustmentRecord]) -> HashMap<String, AppliedDelta> {
    let mut pending = HashMap::new();
    for record in records {
        pending.insert(
            record.target_claim_id.clone(),
            AppliedDelta {
                delta: record.confidence_delta,
                comment: record.arbitration_comment.clone(),
            },
        );
    }
    pending
}

/// Apply pending deltas to a tree in place.
///
/// Every touched confidence is clamped into [0, 1]; a clamp that changed
/// the raw sum is logged. Comments attach to the node whenever present,
/// whether or not the delta moved the confidence.
pub fn apply_to_tree(node: &mut CritiqueNode, pending: &HashMap<String, AppliedDelta>) {
    if let Some(applied) = pending.get(&node.id) {
        let raw = node.confidence + applied.delta;
        let clamped = raw.clamp(0.0, 1.0);
        if clamped != raw {
            tracing::warn!(
                claim_id = %node.id,
                original = node.confidence,
                delta = applied.delta,
                raw,
                clamped,
                "Adjusted confidence clamped into [0, 1]"
            );
        }
        node.confidence = clamped;
        if let Some(comment) = &applied.comment {
            node.arbitration = Some(comment.clone());
        }
    }
    for child in &mut node.sub_critiques {
        apply_to_tree(child, pending);
    }
}
