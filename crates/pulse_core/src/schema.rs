use crate::error::PulseError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Closed set of report categories. Dashboards key off the display names,
/// so the serde renames are part of the stable interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Category {
    #[serde(rename = "Road Damage")]
    RoadDamage,
    #[serde(rename = "Sidewalk Damage")]
    SidewalkDamage,
    #[serde(rename = "Construction")]
    Construction,
    #[serde(rename = "Garbage & Waste")]
    GarbageWaste,
    #[serde(rename = "Environmental Hazard")]
    EnvironmentalHazard,
    #[serde(rename = "Water Leakage")]
    WaterLeakage,
    #[serde(rename = "Drainage Blockage")]
    DrainageBlockage,
    #[serde(rename = "Street Light Issue")]
    StreetLightIssue,
    #[serde(rename = "Electrical Hazard")]
    ElectricalHazard,
    #[serde(rename = "Tree Hazard")]
    TreeHazard,
    #[serde(rename = "Park Maintenance")]
    ParkMaintenance,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::RoadDamage,
        Category::SidewalkDamage,
        Category::Construction,
        Category::GarbageWaste,
        Category::EnvironmentalHazard,
        Category::WaterLeakage,
        Category::DrainageBlockage,
        Category::StreetLightIssue,
        Category::ElectricalHazard,
        Category::TreeHazard,
        Category::ParkMaintenance,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::RoadDamage => "Road Damage",
            Category::SidewalkDamage => "Sidewalk Damage",
            Category::Construction => "Construction",
            Category::GarbageWaste => "Garbage & Waste",
            Category::EnvironmentalHazard => "Environmental Hazard",
            Category::WaterLeakage => "Water Leakage",
            Category::DrainageBlockage => "Drainage Blockage",
            Category::StreetLightIssue => "Street Light Issue",
            Category::ElectricalHazard => "Electrical Hazard",
            Category::TreeHazard => "Tree Hazard",
            Category::ParkMaintenance => "Park Maintenance",
        }
    }

    /// Categories that carry an inherent public-safety risk and earn a
    /// priority bonus during scoring.
    pub const fn is_safety_sensitive(self) -> bool {
        matches!(self, Category::WaterLeakage | Category::TreeHazard)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PulseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| PulseError::InvalidInput(format!("unknown category: {value}")))
    }
}

/// Linear triage lifecycle. Transitions only move forward; `fake` is a
/// terminal soft-mark reachable from `new` or `verified` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    New,
    Verified,
    InProgress,
    Resolved,
    Fake,
}

impl IssueStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            IssueStatus::New => "new",
            IssueStatus::Verified => "verified",
            IssueStatus::InProgress => "in-progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Fake => "fake",
        }
    }

    const fn rank(self) -> Option<u8> {
        match self {
            IssueStatus::New => Some(0),
            IssueStatus::Verified => Some(1),
            IssueStatus::InProgress => Some(2),
            IssueStatus::Resolved => Some(3),
            IssueStatus::Fake => None,
        }
    }

    pub fn can_transition_to(self, next: IssueStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(_), None) => matches!(self, IssueStatus::New | IssueStatus::Verified),
            (Some(from), Some(to)) => to > from,
            (None, _) => false,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = PulseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(IssueStatus::New),
            "verified" => Ok(IssueStatus::Verified),
            "in-progress" => Ok(IssueStatus::InProgress),
            "resolved" => Ok(IssueStatus::Resolved),
            "fake" => Ok(IssueStatus::Fake),
            other => Err(PulseError::InvalidInput(format!("unknown status: {other}"))),
        }
    }
}

/// Where the problem is: a free-text address or a geocoded point.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Address(String),
    Point { lat: f64, lng: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: IssueStatus,
    pub location: Location,
    pub votes: u32,
    pub reporter: String, // opaque identity from the auth provider
    pub created_at: String,
    pub updated_at: String,
    pub media: Vec<String>,   // image/video/audio URLs
    pub ai_tags: Vec<String>, // labels from image analysis, if any
}

impl Issue {
    /// Submission-time validation. A missing identity is an auth failure,
    /// not a generic one, so the caller can route to a login flow.
    pub fn validate(&self) -> Result<(), PulseError> {
        if self.reporter.trim().is_empty() {
            return Err(PulseError::AuthenticationRequired);
        }
        if self.title.trim().is_empty() {
            return Err(PulseError::InvalidInput("title must not be empty".into()));
        }
        Ok(())
    }
}

/// Ordinal urgency labels, derived from the priority score by a single
/// monotonic mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    Low,
    LowMedium,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub const fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::LowMedium => "Low-Medium",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
            Urgency::Critical => "Critical",
        }
    }

    pub fn from_priority(priority: u8) -> Urgency {
        const LADDER: [Urgency; 5] = [
            Urgency::Low,
            Urgency::LowMedium,
            Urgency::Medium,
            Urgency::High,
            Urgency::Critical,
        ];
        let index = priority.saturating_sub(1).min(4);
        LADDER[index as usize]
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of municipal departments an issue can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Department {
    #[serde(rename = "Public Works")]
    PublicWorks,
    #[serde(rename = "Transportation")]
    Transportation,
    #[serde(rename = "Utilities")]
    Utilities,
    #[serde(rename = "Sanitation")]
    Sanitation,
    #[serde(rename = "Parks & Recreation")]
    ParksAndRecreation,
    #[serde(rename = "Environmental Services")]
    EnvironmentalServices,
}

impl Department {
    pub const fn as_str(self) -> &'static str {
        match self {
            Department::PublicWorks => "Public Works",
            Department::Transportation => "Transportation",
            Department::Utilities => "Utilities",
            Department::Sanitation => "Sanitation",
            Department::ParksAndRecreation => "Parks & Recreation",
            Department::EnvironmentalServices => "Environmental Services",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryConfidence {
    pub category: Category,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SimilarIssue {
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceEstimate {
    pub personnel: u32,
    pub estimated_hours: u32,
    pub equipment: Vec<String>,
}

/// Complete triage record for one issue, latest-wins. Always assembled and
/// written whole, never field-patched.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AiAnalysis {
    pub issue_id: String,
    pub category: Category,
    pub category_confidence: f64,
    pub alternative_categories: Vec<CategoryConfidence>,
    pub keywords: Vec<String>,
    pub similar_issues: Vec<SimilarIssue>,
    pub duplicate_score: f64,
    pub priority_score: u8,
    pub urgency: Urgency,
    pub impact_assessment: String,
    pub assigned_departments: Vec<Department>,
    pub estimated_response_hours: u32,
    pub resources: ResourceEstimate,
    pub created_at: String,
}

/// One voter's endorsement of one issue. At most one row per (issue, voter).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Vote {
    pub issue_id: String,
    pub voter: String,
    pub created_at: String,
}

/// Current UTC time as RFC3339, matching the timestamp format the store
/// writes with SQLite's strftime.
pub fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339).unwrap_or_else(|_| now.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_roundtrips_through_display_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("Wormholes".parse::<Category>().is_err());
    }

    #[test]
    fn status_transitions_are_forward_only() {
        assert!(IssueStatus::New.can_transition_to(IssueStatus::Verified));
        assert!(IssueStatus::New.can_transition_to(IssueStatus::InProgress));
        assert!(IssueStatus::Verified.can_transition_to(IssueStatus::Resolved));
        assert!(!IssueStatus::Resolved.can_transition_to(IssueStatus::New));
        assert!(!IssueStatus::InProgress.can_transition_to(IssueStatus::Verified));
        assert!(!IssueStatus::New.can_transition_to(IssueStatus::New));
    }

    #[test]
    fn fake_is_reachable_from_new_and_verified_only() {
        assert!(IssueStatus::New.can_transition_to(IssueStatus::Fake));
        assert!(IssueStatus::Verified.can_transition_to(IssueStatus::Fake));
        assert!(!IssueStatus::InProgress.can_transition_to(IssueStatus::Fake));
        assert!(!IssueStatus::Resolved.can_transition_to(IssueStatus::Fake));
        assert!(!IssueStatus::Fake.can_transition_to(IssueStatus::New));
        assert!(!IssueStatus::Fake.can_transition_to(IssueStatus::Resolved));
    }

    #[test]
    fn urgency_ladder_is_monotonic_in_priority() {
        assert_eq!(Urgency::from_priority(1), Urgency::Low);
        assert_eq!(Urgency::from_priority(2), Urgency::LowMedium);
        assert_eq!(Urgency::from_priority(3), Urgency::Medium);
        assert_eq!(Urgency::from_priority(4), Urgency::High);
        assert_eq!(Urgency::from_priority(5), Urgency::Critical);
        // Out-of-range inputs clamp instead of panicking.
        assert_eq!(Urgency::from_priority(0), Urgency::Low);
        assert_eq!(Urgency::from_priority(9), Urgency::Critical);
        for p in 1..5u8 {
            assert!(Urgency::from_priority(p) < Urgency::from_priority(p + 1));
        }
    }

    #[test]
    fn validation_distinguishes_auth_from_bad_input() {
        let mut issue = Issue {
            id: "i-1".into(),
            title: "Broken lamp".into(),
            description: String::new(),
            category: Category::StreetLightIssue,
            status: IssueStatus::New,
            location: Location::Address("Elm St".into()),
            votes: 0,
            reporter: "citizen-9".into(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            media: Vec::new(),
            ai_tags: Vec::new(),
        };
        assert!(issue.validate().is_ok());

        issue.reporter = "  ".into();
        assert!(matches!(
            issue.validate(),
            Err(PulseError::AuthenticationRequired)
        ));

        issue.reporter = "citizen-9".into();
        issue.title = String::new();
        assert!(matches!(issue.validate(), Err(PulseError::InvalidInput(_))));
    }

    #[test]
    fn analysis_json_shape_is_stable() {
        let analysis = AiAnalysis {
            issue_id: "i-1".into(),
            category: Category::RoadDamage,
            category_confidence: 0.89,
            alternative_categories: vec![CategoryConfidence {
                category: Category::SidewalkDamage,
                confidence: 0.42,
            }],
            keywords: vec!["pothole".into(), "road".into(), "light".into()],
            similar_issues: Vec::new(),
            duplicate_score: 0.0,
            priority_score: 4,
            urgency: Urgency::High,
            impact_assessment: "Significant impact on neighborhood".into(),
            assigned_departments: vec![Department::PublicWorks, Department::Transportation],
            estimated_response_hours: 36,
            resources: ResourceEstimate {
                personnel: 2,
                estimated_hours: 5,
                equipment: vec!["Asphalt".into()],
            },
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["category"], "Road Damage");
        assert_eq!(value["urgency"], "high");
        assert_eq!(value["assigned_departments"][0], "Public Works");
        assert_eq!(value["priority_score"], 4);
    }
}
