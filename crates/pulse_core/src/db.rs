use crate::error::{PulseError, Result};
use crate::schema::{AiAnalysis, Category, Issue, IssueStatus, now_rfc3339};
use crate::similar::Candidate;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          description TEXT NOT NULL,
          category TEXT NOT NULL,
          status TEXT NOT NULL,
          location_json TEXT NOT NULL,
          votes INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
          reporter TEXT NOT NULL,
          media_json TEXT NOT NULL,
          ai_tags_json TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_issues_category ON issues(category);
        CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);

        CREATE TABLE IF NOT EXISTS analyses (
          issue_id TEXT PRIMARY KEY REFERENCES issues(id),
          analysis_json TEXT NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS votes (
          issue_id TEXT NOT NULL REFERENCES issues(id),
          voter TEXT NOT NULL,
          created_at TEXT NOT NULL,
          UNIQUE (issue_id, voter)
        );

        CREATE INDEX IF NOT EXISTS idx_votes_issue ON votes(issue_id);
        "#,
    )?;
    Ok(())
}

pub fn upsert_issue(conn: &Connection, issue: &Issue) -> Result<()> {
    let location_json = serde_json::to_string(&issue.location)?;
    let media_json = serde_json::to_string(&issue.media)?;
    let ai_tags_json = serde_json::to_string(&issue.ai_tags)?;

    conn.execute(
        r#"
        INSERT INTO issues (
          id, title, description, category, status, location_json,
          votes, reporter, media_json, ai_tags_json, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(id) DO UPDATE SET
          title=excluded.title,
          description=excluded.description,
          category=excluded.category,
          status=excluded.status,
          location_json=excluded.location_json,
          votes=excluded.votes,
          reporter=excluded.reporter,
          media_json=excluded.media_json,
          ai_tags_json=excluded.ai_tags_json,
          updated_at=excluded.updated_at
        "#,
        params![
            issue.id,
            issue.title,
            issue.description,
            issue.category.as_str(),
            issue.status.as_str(),
            location_json,
            issue.votes,
            issue.reporter,
            media_json,
            ai_tags_json,
            issue.created_at,
            issue.updated_at,
        ],
    )?;

    Ok(())
}

pub fn get_issue(conn: &Connection, id: &str) -> Result<Issue> {
    let row = conn
        .query_row(
            &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
            [id],
            issue_row,
        )
        .optional()?;
    match row {
        Some(raw) => raw.try_into(),
        None => Err(PulseError::NotFound(format!("issue {id}"))),
    }
}

pub fn list_issues(
    conn: &Connection,
    category: Option<Category>,
    status: Option<IssueStatus>,
) -> Result<Vec<Issue>> {
    let mut sql = format!("SELECT {ISSUE_COLUMNS} FROM issues");
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();
    if let Some(category) = category {
        args.push(category.as_str().to_string());
        clauses.push(format!("category = ?{}", args.len()));
    }
    if let Some(status) = status {
        args.push(status.as_str().to_string());
        clauses.push(format!("status = ?{}", args.len()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), issue_row)?;
    let mut issues = Vec::new();
    for row in rows {
        issues.push(row?.try_into()?);
    }
    Ok(issues)
}

/// Advance an issue along the triage lifecycle. Backward moves and
/// fake-marks outside new/verified are rejected as `InvalidInput`.
pub fn set_status(conn: &Connection, id: &str, next: IssueStatus) -> Result<()> {
    let issue = get_issue(conn, id)?;
    if !issue.status.can_transition_to(next) {
        return Err(PulseError::InvalidInput(format!(
            "cannot move issue {id} from {} to {next}",
            issue.status
        )));
    }
    conn.execute(
        "UPDATE issues SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, next.as_str(), now_rfc3339()],
    )?;
    Ok(())
}

/// Latest-wins: the analysis row is always replaced whole.
pub fn upsert_analysis(conn: &Connection, analysis: &AiAnalysis) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1)",
        [&analysis.issue_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(PulseError::NotFound(format!("issue {}", analysis.issue_id)));
    }

    let analysis_json = serde_json::to_string(analysis)?;
    conn.execute(
        r#"
        INSERT INTO analyses (issue_id, analysis_json, created_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(issue_id) DO UPDATE SET
          analysis_json=excluded.analysis_json,
          created_at=excluded.created_at
        "#,
        params![analysis.issue_id, analysis_json, analysis.created_at],
    )?;
    Ok(())
}

pub fn get_analysis(conn: &Connection, issue_id: &str) -> Result<Option<AiAnalysis>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT analysis_json FROM analyses WHERE issue_id = ?1",
            [issue_id],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Same-category issues other than the one being analyzed, as similarity
/// candidates.
pub fn candidates_for(
    conn: &Connection,
    category: Category,
    exclude_id: &str,
) -> Result<Vec<Candidate>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description FROM issues WHERE category = ?1 AND id <> ?2 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![category.as_str(), exclude_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let mut candidates = Vec::new();
    for row in rows {
        let (id, title, description) = row?;
        candidates.push(Candidate {
            id,
            category,
            title,
            description,
        });
    }
    Ok(candidates)
}

const ISSUE_COLUMNS: &str = "id, title, description, category, status, location_json, \
     votes, reporter, media_json, ai_tags_json, created_at, updated_at";

struct IssueRow {
    id: String,
    title: String,
    description: String,
    category: String,
    status: String,
    location_json: String,
    votes: i64,
    reporter: String,
    media_json: String,
    ai_tags_json: String,
    created_at: String,
    updated_at: String,
}

fn issue_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        status: row.get(4)?,
        location_json: row.get(5)?,
        votes: row.get(6)?,
        reporter: row.get(7)?,
        media_json: row.get(8)?,
        ai_tags_json: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl TryFrom<IssueRow> for Issue {
    type Error = PulseError;

    fn try_from(row: IssueRow) -> Result<Issue> {
        Ok(Issue {
            category: row.category.parse()?,
            status: row.status.parse()?,
            location: serde_json::from_str(&row.location_json)?,
            votes: u32::try_from(row.votes).map_err(|_| {
                PulseError::ConstraintViolation(format!("negative vote count on issue {}", row.id))
            })?,
            media: serde_json::from_str(&row.media_json)?,
            ai_tags: serde_json::from_str(&row.ai_tags_json)?,
            id: row.id,
            title: row.title,
            description: row.description,
            reporter: row.reporter,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
