use crate::config::TriageConfig;
use crate::enrich::{SuggestRequest, Suggester, suggest_with_budget};
use crate::schema::{AiAnalysis, Issue, Urgency, now_rfc3339};
use crate::scoring::{departments_for, estimate_resources, impact_assessment, priority_score};
use crate::similar::{Candidate, duplicate_score, rank_similar};
use crate::triage::{extract_keywords, infer_category};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Assemble the complete triage record for an issue: category inference
/// (upstream-enriched when a suggester is wired in, deterministic fallback
/// otherwise), priority/urgency scoring, department routing, similar-issue
/// ranking, and resource estimation. The record is built whole; a caller
/// that fails partway writes nothing.
pub fn analyze_issue<R: Rng>(
    issue: &Issue,
    candidates: &[Candidate],
    suggester: Option<(Arc<dyn Suggester>, Duration)>,
    config: &TriageConfig,
    rng: &mut R,
) -> AiAnalysis {
    let guess = suggester
        .and_then(|(suggester, budget)| {
            suggest_with_budget(
                suggester,
                SuggestRequest {
                    title: issue.title.clone(),
                    description: issue.description.clone(),
                },
                budget,
            )
        })
        .unwrap_or_else(|| {
            debug!(issue = %issue.id, "using keyword heuristic for category inference");
            infer_category(&issue.title, &issue.description, &issue.ai_tags, rng)
        });

    let text = format!("{} {}", issue.title, issue.description);
    let priority = priority_score(guess.category, issue.votes, config);
    let urgency = Urgency::from_priority(priority);
    let similar = rank_similar(&issue.id, guess.category, &text, candidates, config.max_similar);

    let analysis = AiAnalysis {
        issue_id: issue.id.clone(),
        category: guess.category,
        category_confidence: guess.confidence,
        alternative_categories: guess.alternatives,
        keywords: extract_keywords(&text),
        duplicate_score: duplicate_score(&similar),
        similar_issues: similar,
        priority_score: priority,
        urgency,
        impact_assessment: impact_assessment(priority).to_string(),
        assigned_departments: departments_for(guess.category),
        estimated_response_hours: config.response_hours.for_urgency(urgency),
        resources: estimate_resources(guess.category, rng),
        created_at: now_rfc3339(),
    };
    info!(
        issue = %analysis.issue_id,
        category = %analysis.category,
        priority = analysis.priority_score,
        urgency = %analysis.urgency,
        "issue analyzed"
    );
    analysis
}
