use anyhow::Result;
use pulse_core::db;
use pulse_core::schema::{AiAnalysis, Issue, Location, Urgency, now_rfc3339};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct DigestPaths {
    pub root: PathBuf,
    pub index_dir: PathBuf,
    pub issues_dir: PathBuf,
}

impl DigestPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            index_dir: root.join("00_Index"),
            issues_dir: root.join("Issues"),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.index_dir)?;
        fs::create_dir_all(&self.issues_dir)?;
        Ok(())
    }
}

/// Render the triage queue as a Markdown digest: one note per issue plus
/// index files grouped by urgency and by department.
pub fn build_digest(conn: &Connection, digest_root: &Path) -> Result<()> {
    let paths = DigestPaths::new(digest_root);
    paths.ensure()?;

    let issues = db::list_issues(conn, None, None)?;

    // Critical first; untriaged issues go in their own bucket at the end.
    let mut urgency_buckets: BTreeMap<std::cmp::Reverse<u8>, Vec<String>> = BTreeMap::new();
    let mut untriaged: Vec<String> = Vec::new();
    let mut department_counts: BTreeMap<String, usize> = BTreeMap::new();

    for issue in &issues {
        let analysis = db::get_analysis(conn, &issue.id)?;
        write_issue_note(&paths, issue, analysis.as_ref())?;

        let link = format!("- [[Issues/{}|{}]] ({} votes)", issue.id, issue.title, issue.votes);
        match &analysis {
            Some(analysis) => {
                urgency_buckets
                    .entry(std::cmp::Reverse(analysis.priority_score))
                    .or_default()
                    .push(link);
                for department in &analysis.assigned_departments {
                    *department_counts.entry(department.to_string()).or_insert(0) += 1;
                }
            }
            None => untriaged.push(link),
        }
    }

    write_issue_index(&paths, &urgency_buckets, &untriaged)?;
    write_department_index(&paths, &department_counts)?;

    info!(issues = issues.len(), root = %digest_root.display(), "digest built");
    Ok(())
}

fn write_issue_index(
    paths: &DigestPaths,
    urgency_buckets: &BTreeMap<std::cmp::Reverse<u8>, Vec<String>>,
    untriaged: &[String],
) -> Result<()> {
    let mut lines: Vec<String> = Vec::new();
    lines.push("# MOC - Issues".to_string());
    lines.push(String::new());
    lines.push("This index is generated. Do not edit manually.".to_string());
    lines.push(format!("Generated: {}", now_rfc3339()));
    lines.push(String::new());

    for (key, links) in urgency_buckets {
        lines.push(format!("## {}", Urgency::from_priority(key.0)));
        lines.push(String::new());
        lines.extend(links.iter().cloned());
        lines.push(String::new());
    }

    if !untriaged.is_empty() {
        lines.push("## Untriaged".to_string());
        lines.push(String::new());
        lines.extend(untriaged.iter().cloned());
        lines.push(String::new());
    }

    if urgency_buckets.is_empty() && untriaged.is_empty() {
        lines.push("_No issues reported._".to_string());
    }

    fs::write(paths.index_dir.join("MOC - Issues.md"), lines.join("\n"))?;
    Ok(())
}

fn write_department_index(
    paths: &DigestPaths,
    department_counts: &BTreeMap<String, usize>,
) -> Result<()> {
    let mut lines: Vec<String> = Vec::new();
    lines.push("# MOC - Departments".to_string());
    lines.push(String::new());
    lines.push("This index is generated. Do not edit manually.".to_string());
    lines.push(String::new());

    if department_counts.is_empty() {
        lines.push("_No triaged issues yet._".to_string());
    } else {
        let mut counts: Vec<(&String, &usize)> = department_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (department, count) in counts {
            lines.push(format!("- {department} ({count})"));
        }
    }

    fs::write(
        paths.index_dir.join("MOC - Departments.md"),
        lines.join("\n"),
    )?;
    Ok(())
}

fn write_issue_note(paths: &DigestPaths, issue: &Issue, analysis: Option<&AiAnalysis>) -> Result<()> {
    let note_path = paths.issues_dir.join(format!("{}.md", issue.id));

    let mut md = String::new();
    md.push_str("---\n");
    md.push_str(&format!("id: {}\n", issue.id));
    md.push_str(&format!("category: {}\n", issue.category));
    md.push_str(&format!("status: {}\n", issue.status));
    md.push_str(&format!("votes: {}\n", issue.votes));
    if let Some(analysis) = analysis {
        md.push_str(&format!("priority: {}\n", analysis.priority_score));
        md.push_str(&format!("urgency: {}\n", analysis.urgency));
    }
    md.push_str("---\n\n");

    md.push_str(&format!("# {}\n\n", issue.title));

    md.push_str("## Report\n");
    md.push_str(&format!("- Location: {}\n", location_label(&issue.location)));
    md.push_str(&format!("- Reporter: `{}`\n", issue.reporter));
    md.push_str(&format!("- Votes: {}\n", issue.votes));
    md.push_str(&format!("- Created: `{}`\n\n", issue.created_at));

    if !issue.description.trim().is_empty() {
        md.push_str(&issue.description);
        md.push_str("\n\n");
    }

    md.push_str("## Triage\n");
    match analysis {
        Some(analysis) => {
            md.push_str(&format!(
                "- Priority: {} ({})\n",
                analysis.priority_score, analysis.urgency
            ));
            md.push_str(&format!("- Impact: {}\n", analysis.impact_assessment));
            let departments: Vec<String> = analysis
                .assigned_departments
                .iter()
                .map(|d| d.to_string())
                .collect();
            md.push_str(&format!("- Departments: {}\n", departments.join(", ")));
            md.push_str(&format!(
                "- Estimated response: {}h\n",
                analysis.estimated_response_hours
            ));
            md.push_str(&format!(
                "- Crew: {} personnel, ~{}h, equipment: {}\n",
                analysis.resources.personnel,
                analysis.resources.estimated_hours,
                analysis.resources.equipment.join(", ")
            ));
            md.push_str(&format!("- Keywords: {}\n", analysis.keywords.join(", ")));
            if analysis.similar_issues.is_empty() {
                md.push_str("- Similar issues: none\n");
            } else {
                md.push_str("- Similar issues:\n");
                for similar in &analysis.similar_issues {
                    md.push_str(&format!(
                        "  - [[Issues/{}]] (score {:.2})\n",
                        similar.id, similar.score
                    ));
                }
                md.push_str(&format!(
                    "- Duplicate score: {:.2}\n",
                    analysis.duplicate_score
                ));
            }
        }
        None => md.push_str("_Not yet analyzed._\n"),
    }

    fs::write(note_path, md)?;
    Ok(())
}

fn location_label(location: &Location) -> String {
    match location {
        Location::Address(address) => address.clone(),
        Location::Point { lat, lng } => format!("{lat:.5}, {lng:.5}"),
    }
}
