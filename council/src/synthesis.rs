//! Synthesis — filter, deduplicate, label, and aggregate adjusted trees.
//!
//! Runs after all adjustments have been applied. Traversal order is fixed
//! (roster order, then pre-order within each tree), which makes
//! deduplication deterministic: the first agent to state a claim keeps it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::CouncilConfig;
use crate::critique::AgentCritiqueResult;

/// One synthesized finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantPoint {
    /// Area label derived from the contributing agent's style.
    pub area: String,
    /// The claim text.
    pub critique: String,
    /// Severity label as the agent stated it.
    pub severity: String,
    /// Adjusted confidence, rounded to two decimals.
    pub confidence: f64,
    /// Arbiter comment, when arbitration attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbitration: Option<String>,
}

/// Aggregated synthesis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    /// Deduplicated significant points, in traversal order.
    pub points: Vec<SignificantPoint>,
    /// Longer templated summary of the outcome.
    pub final_assessment: String,
    /// Single-sentence summary of the outcome.
    pub final_assessment_summary: String,
    /// Points labelled critical or high.
    pub high_severity_points: usize,
    /// Points labelled medium.
    pub medium_severity_points: usize,
    /// Points labelled low.
    pub low_severity_points: usize,
}

/// Synthesize the final point list from all agents' adjusted trees.
///
/// Entries with an error or no tree are skipped. A node qualifies when its
/// adjusted confidence reaches the synthesis threshold; qualifying claims
/// are deduplicated by exact claim text across the whole council.
pub fn synthesize(results: &[AgentCritiqueResult], config: &CouncilConfig) -> Synthesis {
    let mut points = Vec::new();
    let mut seen_claims: HashSet<String> = HashSet::new();

    for result in results {
        if result.is_errored() {
            continue;
        }
        let Some(tree) = &result.critique_tree else {
            continue;
        };
        let area = area_label(&result.agent_style, config);
        for flat in tree.flatten() {
            let node = flat.node;
            if node.confidence < config.synthesis_confidence_threshold {
                continue;
            }
            if !seen_claims.insert(node.claim.clone()) {
                continue;
            }
            points.push(SignificantPoint {
                area: area.clone(),
                critique: node.claim.clone(),
                severity: node.severity.clone(),
                confidence: round_two(node.confidence),
                arbitration: node.arbitration.clone(),
            });
        }
    }

    let mut high = 0;
    let mut medium = 0;
    let mut low = 0;
    for point in &points {
        match point.severity.to_lowercase().as_str() {
            "critical" | "high" => high += 1,
            "medium" => medium += 1,
            "low" => low += 1,
            _ => {}
        }
    }

    let (final_assessment, final_assessment_summary) = assessment_texts(points.len());

    tracing::info!(
        points = points.len(),
        high_severity = high,
        medium_severity = medium,
        low_severity = low,
        "Synthesis complete"
    );

    Synthesis {
        points,
        final_assessment,
        final_assessment_summary,
        high_severity_points: high,
        medium_severity_points: medium,
        low_severity_points: low,
    }
}

/// Resolve the area label for an agent style.
///
/// A per-style override (specific key first, then `default`) wins over the
/// cohort rendering. Overrides may carry a `{style}` placeholder; an
/// override that already names the style is used verbatim, any other
/// override is prefixed to the style.
fn area_label(style: &str, config: &CouncilConfig) -> String {
    let overriding = config
        .agent_area_labels
        .get(style)
        .or_else(|| config.agent_area_labels.get("default"));

    if let Some(label) = overriding {
        if label.contains("{style}") {
            return label.replace("{style}", style);
        }
        if label.contains(style) {
            return label.clone();
        }
        return format!("{}: {}", label, style);
    }

    format!("{}: {}", cohort_label(config), style)
}

fn cohort_label(config: &CouncilConfig) -> String {
    let key = if config.scientific_mode {
        "scientific"
    } else {
        "philosophical"
    };
    config
        .cohort_labels
        .get(key)
        .or_else(|| config.cohort_labels.get("default"))
        .cloned()
        .unwrap_or_else(|| "Council".to_string())
}

fn assessment_texts(count: usize) -> (String, String) {
    if count == 0 {
        let summary = "No points met the significance threshold for reporting.".to_string();
        let long = "No points met the significance threshold for reporting across the \
                    council's adjusted critiques."
            .to_string();
        return (long, summary);
    }
    let summary = format!(
        "Council identified {} primary point(s) requiring attention.",
        count
    );
    let long = format!(
        "Council synthesis complete: {} primary point(s) met the significance threshold \
         after adjustment and deduplication.",
        count
    );
    (long, summary)
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::CritiqueNode;

    fn node(claim: &str, confidence: f64, severity: &str) -> CritiqueNode {
        CritiqueNode::new(claim, "evidence", confidence, severity)
    }

    fn completed(style: &str, tree: CritiqueNode) -> AgentCritiqueResult {
        AgentCritiqueResult::completed(style, Some(tree))
    }

    #[test]
    fn test_threshold_filters_points() {
        let mut tree = node("keep me", 0.8, "high");
        tree.add_sub_critique(node("drop me", 0.2, "high"));
        let results = vec![completed("Stoic", tree)];

        let synthesis = synthesize(&results, &CouncilConfig::default());
        assert_eq!(synthesis.points.len(), 1);
        assert_eq!(synthesis.points[0].critique, "keep me");
    }

    #[test]
    fn test_dedup_first_agent_wins() {
        let results = vec![
            completed("Stoic", node("shared claim", 0.8, "high")),
            completed("Skeptic", node("shared claim", 0.9, "critical")),
        ];

        let synthesis = synthesize(&results, &CouncilConfig::default());
        assert_eq!(synthesis.points.len(), 1);
        assert!(synthesis.points[0].area.contains("Stoic"));
        assert_eq!(synthesis.points[0].severity, "high");
    }

    #[test]
    fn test_errored_and_empty_entries_skipped() {
        let results = vec![
            AgentCritiqueResult::failed("Stoic", "directives unavailable"),
            AgentCritiqueResult::completed("Skeptic", None),
            completed("Empiricist", node("real claim", 0.8, "medium")),
        ];

        let synthesis = synthesize(&results, &CouncilConfig::default());
        assert_eq!(synthesis.points.len(), 1);
        assert!(synthesis.points[0].area.contains("Empiricist"));
    }

    #[test]
    fn test_cohort_label_by_mode() {
        let results = vec![completed("Stoic", node("claim", 0.8, "high"))];

        let config = CouncilConfig::default();
        let synthesis = synthesize(&results, &config);
        assert_eq!(synthesis.points[0].area, "Philosophical: Stoic");

        let config = CouncilConfig {
            scientific_mode: true,
            ..Default::default()
        };
        let results = vec![completed("Stoic", node("claim", 0.8, "high"))];
        let synthesis = synthesize(&results, &config);
        assert_eq!(synthesis.points[0].area, "Scientific: Stoic");
    }

    #[test]
    fn test_area_override_resolution() {
        let mut config = CouncilConfig::default();
        config
            .agent_area_labels
            .insert("default".to_string(), "Focus {style}".to_string());
        config
            .agent_area_labels
            .insert("Stoic".to_string(), "Stoic Mentor".to_string());

        // Specific override already names the style: used verbatim.
        assert_eq!(area_label("Stoic", &config), "Stoic Mentor");
        // Default override carries the template placeholder.
        assert_eq!(area_label("Skeptic", &config), "Focus Skeptic");

        // An override naming neither the style nor the placeholder is
        // prefixed.
        config
            .agent_area_labels
            .insert("default".to_string(), "Audit".to_string());
        assert_eq!(area_label("Skeptic", &config), "Audit: Skeptic");
    }

    #[test]
    fn test_confidence_rounded_two_decimals() {
        let results = vec![completed("Stoic", node("claim", 0.81234, "high"))];
        let synthesis = synthesize(&results, &CouncilConfig::default());
        assert_eq!(synthesis.points[0].confidence, 0.81);
    }

    #[test]
    fn test_severity_histogram() {
        let mut tree = node("a", 0.8, "Critical");
        tree.add_sub_critique(node("b", 0.8, "high"));
        tree.add_sub_critique(node("c", 0.8, "medium"));
        tree.add_sub_critique(node("d", 0.8, "low"));
        tree.add_sub_critique(node("e", 0.8, "significant"));
        let results = vec![completed("Stoic", tree)];

        let synthesis = synthesize(&results, &CouncilConfig::default());
        assert_eq!(synthesis.high_severity_points, 2);
        assert_eq!(synthesis.medium_severity_points, 1);
        assert_eq!(synthesis.low_severity_points, 1);
        // "significant" is outside the three buckets.
        assert_eq!(synthesis.points.len(), 5);
    }

    #[test]
    fn test_zero_point_texts() {
        let synthesis = synthesize(&[], &CouncilConfig::default());
        assert_eq!(
            synthesis.final_assessment_summary,
            "No points met the significance threshold for reporting."
        );
        assert!(synthesis
            .final_assessment
            .starts_with("No points met the significance threshold"));
        assert_eq!(synthesis.high_severity_points, 0);
    }

    #[test]
    fn test_point_count_in_texts() {
        let results = vec![
            completed("Stoic", node("first", 0.8, "high")),
            completed("Skeptic", node("second", 0.8, "low")),
        ];
        let synthesis = synthesize(&results, &CouncilConfig::default());
        assert_eq!(
            synthesis.final_assessment_summary,
            "Council identified 2 primary point(s) requiring attention."
        );
        assert!(synthesis.final_assessment.contains("2 primary point(s)"));
    }

    #[test]
    fn test_arbitration_comment_carried() {
        let mut tree = node("claim", 0.8, "high");
        tree.arbitration = Some("arbiter agrees".to_string());
        let results = vec![completed("Stoic", tree)];

        let synthesis = synthesize(&results, &CouncilConfig::default());
        assert_eq!(
            synthesis.points[0].arbitration.as_deref(),
            Some("arbiter agrees")
        );
    }

    #[test]
    fn test_traversal_order_roster_then_preorder() {
        let mut first = node("a", 0.8, "high");
        first.add_sub_critique(node("b", 0.8, "high"));
        let second = node("c", 0.8, "high");
        let results = vec![completed("Stoic", first), completed("Skeptic", second)];

        let synthesis = synthesize(&results, &CouncilConfig::default());
        let claims: Vec<&str> = synthesis
            .points
            .iter()
            .map(|p| p.critique.as_str())
            .collect();
        assert_eq!(claims, vec!["a", "b", "c"]);
    }
}
