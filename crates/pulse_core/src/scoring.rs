use crate::config::TriageConfig;
use crate::schema::{Category, Department, ResourceEstimate};
use rand::Rng;

/// Priority in 1..=5: base score, a bonus for safety-sensitive categories,
/// and a vote-driven bonus, rounded then clamped.
pub fn priority_score(category: Category, votes: u32, config: &TriageConfig) -> u8 {
    let mut score = config.base_priority;
    if category.is_safety_sensitive() {
        score += config.safety_bonus;
    }
    if votes > config.vote_surge_threshold {
        score += config.vote_surge_bonus;
    } else if votes > config.vote_notable_threshold {
        score += config.vote_notable_bonus;
    }
    (score.round() as i64).clamp(1, 5) as u8
}

const IMPACT: [&str; 5] = [
    "Minimal impact on community",
    "Low impact on small number of residents",
    "Moderate impact on local area",
    "Significant impact on neighborhood",
    "Critical impact requiring immediate attention",
];

pub fn impact_assessment(priority: u8) -> &'static str {
    IMPACT[priority.saturating_sub(1).min(4) as usize]
}

/// Deterministic department routing. Exhaustive over the category enum, so
/// adding a category without a routing entry fails to compile.
pub fn departments_for(category: Category) -> Vec<Department> {
    match category {
        Category::RoadDamage | Category::SidewalkDamage => {
            vec![Department::PublicWorks, Department::Transportation]
        }
        Category::Construction => vec![Department::PublicWorks],
        Category::GarbageWaste => vec![Department::Sanitation, Department::PublicWorks],
        Category::EnvironmentalHazard => {
            vec![Department::EnvironmentalServices, Department::Sanitation]
        }
        Category::WaterLeakage => vec![Department::Utilities, Department::PublicWorks],
        Category::DrainageBlockage => vec![Department::Utilities, Department::PublicWorks],
        Category::StreetLightIssue => vec![Department::Utilities, Department::Transportation],
        Category::ElectricalHazard => vec![Department::Utilities],
        Category::TreeHazard => {
            vec![Department::ParksAndRecreation, Department::PublicWorks]
        }
        Category::ParkMaintenance => vec![Department::ParksAndRecreation],
    }
}

pub fn equipment_for(category: Category) -> Vec<String> {
    let items: &[&str] = match category {
        Category::RoadDamage => &["Asphalt", "Compactor", "Truck"],
        Category::WaterLeakage => &["Pipe Wrenches", "Replacement Pipes", "Sealant"],
        Category::TreeHazard => &["Chainsaw", "Safety Equipment", "Chipper"],
        Category::GarbageWaste => &["Collection Truck", "Bins", "Protective Gloves"],
        Category::StreetLightIssue => &["Bucket Truck", "Replacement Fixtures", "Voltage Tester"],
        Category::DrainageBlockage => &["Drain Rods", "Jetting Unit", "Pump"],
        _ => &["Basic Tools", "Safety Equipment"],
    };
    items.iter().map(|item| (*item).to_string()).collect()
}

/// Crew-size and labor estimate. Bounded ranges, with the RNG injected so
/// a seeded source makes the estimate reproducible.
pub fn estimate_resources<R: Rng>(category: Category, rng: &mut R) -> ResourceEstimate {
    ResourceEstimate {
        personnel: rng.gen_range(1..=3),
        estimated_hours: rng.gen_range(2..=9),
        equipment: equipment_for(category),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Urgency;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config() -> TriageConfig {
        TriageConfig::default()
    }

    #[test]
    fn pothole_with_twelve_votes_scores_four() {
        // Road Damage is not safety-sensitive: 3 base + 1 vote surge = 4.
        assert_eq!(priority_score(Category::RoadDamage, 12, &config()), 4);
    }

    #[test]
    fn water_leak_with_three_votes_scores_four_high() {
        // 3 base + 1 safety + 0 votes = 4.
        let priority = priority_score(Category::WaterLeakage, 3, &config());
        assert_eq!(priority, 4);
        assert_eq!(Urgency::from_priority(priority), Urgency::High);
    }

    #[test]
    fn notable_votes_round_the_half_bonus_up() {
        // 3 + 0.5 rounds to 4 for a non-safety category with 6..=10 votes.
        assert_eq!(priority_score(Category::GarbageWaste, 6, &config()), 4);
        assert_eq!(priority_score(Category::GarbageWaste, 5, &config()), 3);
    }

    #[test]
    fn safety_and_surge_cap_at_five() {
        assert_eq!(priority_score(Category::TreeHazard, 11, &config()), 5);
        assert_eq!(priority_score(Category::WaterLeakage, 100, &config()), 5);
    }

    #[test]
    fn priority_is_bounded_and_monotonic_in_votes() {
        for category in Category::ALL {
            let mut last = 0u8;
            for votes in 0..40u32 {
                let priority = priority_score(category, votes, &config());
                assert!((1..=5).contains(&priority));
                assert!(priority >= last, "{category} dropped at {votes} votes");
                last = priority;
            }
        }
    }

    #[test]
    fn safety_categories_outrank_others_at_equal_votes() {
        for votes in [0, 3, 7, 15] {
            let safety = priority_score(Category::WaterLeakage, votes, &config());
            let plain = priority_score(Category::GarbageWaste, votes, &config());
            assert!(safety > plain);
        }
    }

    #[test]
    fn departments_are_deterministic_and_never_empty() {
        for category in Category::ALL {
            let first = departments_for(category);
            assert!(!first.is_empty(), "{category} routed nowhere");
            assert_eq!(first, departments_for(category));
        }
    }

    #[test]
    fn impact_text_tracks_priority() {
        assert_eq!(impact_assessment(1), "Minimal impact on community");
        assert_eq!(
            impact_assessment(5),
            "Critical impact requiring immediate attention"
        );
        assert_eq!(impact_assessment(0), impact_assessment(1));
        assert_eq!(impact_assessment(7), impact_assessment(5));
    }

    #[test]
    fn resource_estimates_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for category in Category::ALL {
            let estimate = estimate_resources(category, &mut rng);
            assert!((1..=3).contains(&estimate.personnel));
            assert!((2..=9).contains(&estimate.estimated_hours));
            assert!(!estimate.equipment.is_empty());
        }
    }

    #[test]
    fn equipment_tables_match_category() {
        assert_eq!(
            equipment_for(Category::RoadDamage),
            vec!["Asphalt", "Compactor", "Truck"]
        );
        assert_eq!(
            equipment_for(Category::ParkMaintenance),
            vec!["Basic Tools", "Safety Equipment"]
        );
    }
}
