use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use pulse_core::analysis::analyze_issue;
use pulse_core::config::TriageConfig;
use pulse_core::schema::{Category, Issue, IssueStatus, Location, now_rfc3339};
use pulse_core::{db, ledger};
use rand::SeedableRng;
use rand::rngs::StdRng;
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "civicpulse")]
#[command(about = "CivicPulse issue triage CLI", long_about = None)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, default_value = "civicpulse.db")]
    db: PathBuf,

    /// Triage config file (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an issue report and run triage analysis on it
    Report {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Reporter identity from the auth provider
        #[arg(long)]
        reporter: String,
        /// Explicit category; inferred from the text when omitted
        #[arg(long)]
        category: Option<String>,
        /// Free-text address
        #[arg(long, conflicts_with_all = ["lat", "lng"])]
        address: Option<String>,
        #[arg(long, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lng: Option<f64>,
        /// Attached media URL (repeatable)
        #[arg(long = "media")]
        media: Vec<String>,
        /// Image-analysis tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Seed for the randomized analysis branches
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Toggle a vote on an issue
    Vote {
        #[arg(long)]
        issue: String,
        /// Voter identity from the auth provider
        #[arg(long)]
        voter: String,
    },
    /// Re-run triage analysis for an existing issue
    Analyze {
        #[arg(long)]
        issue: String,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List issues, optionally filtered by category and status
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Advance an issue along the triage lifecycle
    Status {
        #[arg(long)]
        issue: String,
        /// Target status: new, verified, in-progress, resolved, fake
        #[arg(long)]
        to: String,
    },
    /// Render the Markdown triage digest
    Digest {
        /// Output directory
        #[arg(long, default_value = "digest")]
        out: PathBuf,
    },
    /// Recompute vote counters from the ledger rows
    Reconcile,
    /// Export canonical JSON Schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!(db = %cli.db.display(), "using store");
    let config = match &cli.config {
        Some(path) => TriageConfig::load_from_path(path)?,
        None => TriageConfig::default(),
    };

    match cli.command {
        Commands::Report {
            title,
            description,
            reporter,
            category,
            address,
            lat,
            lng,
            media,
            tags,
            seed,
        } => {
            let submission = Submission {
                title,
                description,
                reporter,
                category,
                address,
                lat,
                lng,
                media,
                tags,
                seed,
            };
            report(&cli.db, &config, submission)
        }
        Commands::Vote { issue, voter } => vote(&cli.db, &issue, &voter),
        Commands::Analyze { issue, seed } => analyze(&cli.db, &config, &issue, seed),
        Commands::List { category, status } => list(&cli.db, category, status),
        Commands::Status { issue, to } => status(&cli.db, &issue, &to),
        Commands::Digest { out } => {
            let conn = db::open(&cli.db.to_string_lossy())?;
            digest::build_digest(&conn, &out)?;
            println!("Digest written to {}", out.display());
            Ok(())
        }
        Commands::Reconcile => {
            let conn = db::open(&cli.db.to_string_lossy())?;
            let corrected = ledger::reconcile_votes(&conn)?;
            println!("Reconciled vote counters for {corrected} issue(s)");
            Ok(())
        }
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
    }
}

struct Submission {
    title: String,
    description: String,
    reporter: String,
    category: Option<String>,
    address: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    media: Vec<String>,
    tags: Vec<String>,
    seed: Option<u64>,
}

fn report(db_path: &Path, config: &TriageConfig, submission: Submission) -> Result<()> {
    let location = match (submission.address, submission.lat, submission.lng) {
        (Some(address), _, _) => Location::Address(address),
        (None, Some(lat), Some(lng)) => Location::Point { lat, lng },
        _ => bail!("a location is required: pass --address or --lat/--lng"),
    };

    let mut rng = seeded_rng(submission.seed);

    // Form-time quick path: suggest a category from the text unless the
    // reporter picked one.
    let category = match submission.category {
        Some(name) => name.parse::<Category>()?,
        None => {
            let guess = pulse_core::triage::infer_category(
                &submission.title,
                &submission.description,
                &submission.tags,
                &mut rng,
            );
            println!(
                "Suggested category: {} (confidence {:.2})",
                guess.category, guess.confidence
            );
            guess.category
        }
    };

    let now = now_rfc3339();
    let issue = Issue {
        id: uuid::Uuid::new_v4().to_string(),
        title: submission.title,
        description: submission.description,
        category,
        status: IssueStatus::New,
        location,
        votes: 0,
        reporter: submission.reporter,
        created_at: now.clone(),
        updated_at: now,
        media: submission.media,
        ai_tags: submission.tags,
    };
    issue.validate()?;

    let conn = db::open(&db_path.to_string_lossy())?;
    db::upsert_issue(&conn, &issue)?;

    // Post-submission deeper analysis. No hosted suggester is wired in
    // here, so the deterministic heuristic is the decision path.
    let candidates = db::candidates_for(&conn, issue.category, &issue.id)?;
    let analysis = analyze_issue(&issue, &candidates, None, config, &mut rng);
    db::upsert_analysis(&conn, &analysis)?;

    println!("Reported issue {}", issue.id);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn vote(db_path: &Path, issue: &str, voter: &str) -> Result<()> {
    let mut conn = db::open(&db_path.to_string_lossy())?;
    let receipt = ledger::toggle_vote(&mut conn, issue, voter)?;
    match receipt.outcome {
        ledger::VoteOutcome::Cast => {
            println!("Vote cast on {issue}; total votes: {}", receipt.votes)
        }
        ledger::VoteOutcome::Retracted => {
            println!("Vote retracted from {issue}; total votes: {}", receipt.votes)
        }
    }
    Ok(())
}

fn analyze(db_path: &Path, config: &TriageConfig, issue_id: &str, seed: Option<u64>) -> Result<()> {
    let conn = db::open(&db_path.to_string_lossy())?;
    let issue = db::get_issue(&conn, issue_id)?;
    let candidates = db::candidates_for(&conn, issue.category, &issue.id)?;
    let mut rng = seeded_rng(seed);
    let analysis = analyze_issue(&issue, &candidates, None, config, &mut rng);
    db::upsert_analysis(&conn, &analysis)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn list(db_path: &Path, category: Option<String>, status: Option<String>) -> Result<()> {
    let category = category.map(|name| name.parse::<Category>()).transpose()?;
    let status = status.map(|name| name.parse::<IssueStatus>()).transpose()?;

    let conn = db::open(&db_path.to_string_lossy())?;
    let issues = db::list_issues(&conn, category, status)?;
    if issues.is_empty() {
        println!("No issues found.");
        return Ok(());
    }
    for issue in issues {
        let triage = match db::get_analysis(&conn, &issue.id)? {
            Some(analysis) => format!("P{} {}", analysis.priority_score, analysis.urgency),
            None => "untriaged".to_string(),
        };
        println!(
            "{}  [{}] {} | {} | {} votes | {}",
            issue.id, issue.status, issue.title, issue.category, issue.votes, triage
        );
    }
    Ok(())
}

fn status(db_path: &Path, issue: &str, to: &str) -> Result<()> {
    let next = to.parse::<IssueStatus>()?;
    let conn = db::open(&db_path.to_string_lossy())?;
    db::set_status(&conn, issue, next)?;
    println!("Issue {issue} moved to {next}");
    Ok(())
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    let issue_schema = schema_for!(pulse_core::schema::Issue);
    fs::write(
        out_dir.join("Issue.schema.json"),
        serde_json::to_string_pretty(&issue_schema)?,
    )?;

    // Officials' dashboards key off these field names; the exported schema
    // is the stability contract for the analysis record.
    let analysis_schema = schema_for!(pulse_core::schema::AiAnalysis);
    fs::write(
        out_dir.join("AiAnalysis.schema.json"),
        serde_json::to_string_pretty(&analysis_schema)?,
    )?;

    let vote_schema = schema_for!(pulse_core::schema::Vote);
    fs::write(
        out_dir.join("Vote.schema.json"),
        serde_json::to_string_pretty(&vote_schema)?,
    )?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
