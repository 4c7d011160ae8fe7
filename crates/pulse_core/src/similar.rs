use crate::schema::{Category, SimilarIssue};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A stored issue reduced to what similarity ranking needs.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub category: Category,
    pub title: String,
    pub description: String,
}

/// Rank same-category candidates by token overlap with the analyzed text.
/// Never includes the issue itself or a cross-category candidate, and
/// returns at most `max` entries. Scores land in [0.3, 0.8]: 0.3 means no
/// shared tokens, 0.8 an identical token set.
pub fn rank_similar(
    issue_id: &str,
    category: Category,
    text: &str,
    candidates: &[Candidate],
    max: usize,
) -> Vec<SimilarIssue> {
    let target = tokenize(text);
    let mut ranked: Vec<SimilarIssue> = candidates
        .iter()
        .filter(|candidate| candidate.id != issue_id && candidate.category == category)
        .map(|candidate| {
            let other = tokenize(&format!("{} {}", candidate.title, candidate.description));
            SimilarIssue {
                id: candidate.id.clone(),
                score: 0.3 + 0.5 * jaccard(&target, &other),
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked.truncate(max);
    ranked
}

/// 0 when nothing similar was found, otherwise the best similarity capped
/// at 0.7.
pub fn duplicate_score(similar: &[SimilarIssue]) -> f64 {
    similar
        .iter()
        .map(|entry| entry.score)
        .fold(0.0, f64::max)
        .min(0.7)
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 3)
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, category: Category, title: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            category,
            title: title.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn excludes_self_and_other_categories() {
        let pool = vec![
            candidate("i-1", Category::RoadDamage, "pothole on main street"),
            candidate("i-2", Category::RoadDamage, "cracked road surface"),
            candidate("i-3", Category::WaterLeakage, "pothole full of water"),
        ];
        let ranked = rank_similar("i-1", Category::RoadDamage, "pothole on main street", &pool, 3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "i-2");
    }

    #[test]
    fn caps_results_at_max() {
        let pool: Vec<Candidate> = (0..10)
            .map(|n| candidate(&format!("i-{n}"), Category::GarbageWaste, "trash pileup"))
            .collect();
        let ranked = rank_similar("other", Category::GarbageWaste, "trash pileup", &pool, 3);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn scores_stay_in_the_documented_band() {
        let identical = candidate("i-2", Category::TreeHazard, "fallen tree across elm street");
        let disjoint = candidate("i-3", Category::TreeHazard, "different words entirely");
        let ranked = rank_similar(
            "i-1",
            Category::TreeHazard,
            "fallen tree across elm street",
            &[identical, disjoint],
            3,
        );
        assert_eq!(ranked[0].id, "i-2");
        assert!((ranked[0].score - 0.8).abs() < 1e-9);
        assert_eq!(ranked[1].id, "i-3");
        assert!((ranked[1].score - 0.3).abs() < 1e-9);
        for entry in &ranked {
            assert!((0.3..=0.8).contains(&entry.score));
        }
    }

    #[test]
    fn ranking_is_deterministic_with_id_tiebreak() {
        let pool = vec![
            candidate("i-b", Category::RoadDamage, "same words here"),
            candidate("i-a", Category::RoadDamage, "same words here"),
        ];
        let ranked = rank_similar("i-z", Category::RoadDamage, "same words here", &pool, 3);
        assert_eq!(ranked[0].id, "i-a");
        assert_eq!(ranked[1].id, "i-b");
    }

    #[test]
    fn duplicate_score_is_zero_without_matches_and_capped() {
        assert_eq!(duplicate_score(&[]), 0.0);
        let high = vec![SimilarIssue {
            id: "i-2".into(),
            score: 0.8,
        }];
        assert_eq!(duplicate_score(&high), 0.7);
        let low = vec![SimilarIssue {
            id: "i-3".into(),
            score: 0.35,
        }];
        assert_eq!(duplicate_score(&low), 0.35);
    }
}
