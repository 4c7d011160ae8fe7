use crate::error::{PulseError, Result};
use crate::schema::{Vote, now_rfc3339};
use rusqlite::{Connection, params};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Cast,
    Retracted,
}

#[derive(Debug, Clone, Copy)]
pub struct VoteReceipt {
    pub outcome: VoteOutcome,
    pub votes: u32,
}

/// Toggle a voter's endorsement of an issue. A first call casts the vote,
/// a second retracts it. The membership row and the denormalized counter
/// move in one transaction, so no state is observable where they disagree;
/// the UNIQUE (issue_id, voter) constraint holds the invariant under
/// concurrent toggles.
pub fn toggle_vote(conn: &mut Connection, issue_id: &str, voter: &str) -> Result<VoteReceipt> {
    if voter.trim().is_empty() {
        return Err(PulseError::AuthenticationRequired);
    }

    let tx = conn.transaction()?;

    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1)",
        [issue_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(PulseError::NotFound(format!("issue {issue_id}")));
    }

    let now = now_rfc3339();
    let removed = tx.execute(
        "DELETE FROM votes WHERE issue_id = ?1 AND voter = ?2",
        params![issue_id, voter],
    )?;
    let outcome = if removed > 0 {
        tx.execute(
            "UPDATE issues SET votes = votes - 1, updated_at = ?2 WHERE id = ?1 AND votes > 0",
            params![issue_id, now],
        )?;
        VoteOutcome::Retracted
    } else {
        tx.execute(
            "INSERT INTO votes (issue_id, voter, created_at) VALUES (?1, ?2, ?3)",
            params![issue_id, voter, now],
        )?;
        tx.execute(
            "UPDATE issues SET votes = votes + 1, updated_at = ?2 WHERE id = ?1",
            params![issue_id, now],
        )?;
        VoteOutcome::Cast
    };

    let votes: u32 = tx.query_row(
        "SELECT votes FROM issues WHERE id = ?1",
        [issue_id],
        |row| row.get(0),
    )?;
    tx.commit()?;

    debug!(issue = issue_id, voter, ?outcome, votes, "vote toggled");
    Ok(VoteReceipt { outcome, votes })
}

pub fn has_voted(conn: &Connection, issue_id: &str, voter: &str) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM votes WHERE issue_id = ?1 AND voter = ?2)",
        params![issue_id, voter],
        |row| row.get(0),
    )?;
    Ok(found)
}

pub fn votes_for(conn: &Connection, issue_id: &str) -> Result<Vec<Vote>> {
    let mut stmt = conn.prepare(
        "SELECT issue_id, voter, created_at FROM votes WHERE issue_id = ?1 ORDER BY created_at, voter",
    )?;
    let rows = stmt.query_map([issue_id], |row| {
        Ok(Vote {
            issue_id: row.get(0)?,
            voter: row.get(1)?,
            created_at: row.get(2)?,
        })
    })?;
    let mut votes = Vec::new();
    for row in rows {
        votes.push(row?);
    }
    Ok(votes)
}

/// Re-derive every issue's counter from the ledger rows. The ledger is the
/// single source of truth; this repairs any drift in the denormalized
/// counts and returns how many issues were corrected.
pub fn reconcile_votes(conn: &Connection) -> Result<usize> {
    let corrected = conn.execute(
        r#"
        UPDATE issues SET votes = (
          SELECT COUNT(*) FROM votes WHERE votes.issue_id = issues.id
        )
        WHERE votes <> (
          SELECT COUNT(*) FROM votes WHERE votes.issue_id = issues.id
        )
        "#,
        [],
    )?;
    Ok(corrected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::schema::{Category, Issue, IssueStatus, Location};

    fn seed_issue(conn: &Connection, id: &str) {
        let issue = Issue {
            id: id.to_string(),
            title: "leaking hydrant".into(),
            description: "steady leak".into(),
            category: Category::WaterLeakage,
            status: IssueStatus::New,
            location: Location::Address("Main St".into()),
            votes: 0,
            reporter: "citizen-1".into(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            media: Vec::new(),
            ai_tags: Vec::new(),
        };
        db::upsert_issue(conn, &issue).unwrap();
    }

    #[test]
    fn toggle_moves_count_by_exactly_one() {
        let mut conn = db::open_in_memory().unwrap();
        seed_issue(&conn, "i-1");

        let receipt = toggle_vote(&mut conn, "i-1", "voter-a").unwrap();
        assert_eq!(receipt.outcome, VoteOutcome::Cast);
        assert_eq!(receipt.votes, 1);

        let receipt = toggle_vote(&mut conn, "i-1", "voter-a").unwrap();
        assert_eq!(receipt.outcome, VoteOutcome::Retracted);
        assert_eq!(receipt.votes, 0);
    }

    #[test]
    fn vote_retract_revote_leaves_a_single_record() {
        let mut conn = db::open_in_memory().unwrap();
        seed_issue(&conn, "i-1");

        toggle_vote(&mut conn, "i-1", "voter-a").unwrap();
        toggle_vote(&mut conn, "i-1", "voter-a").unwrap();
        let receipt = toggle_vote(&mut conn, "i-1", "voter-a").unwrap();

        assert_eq!(receipt.outcome, VoteOutcome::Cast);
        assert_eq!(receipt.votes, 1);
        assert_eq!(votes_for(&conn, "i-1").unwrap().len(), 1);
        assert_eq!(db::get_issue(&conn, "i-1").unwrap().votes, 1);
    }

    #[test]
    fn distinct_voters_accumulate() {
        let mut conn = db::open_in_memory().unwrap();
        seed_issue(&conn, "i-1");

        toggle_vote(&mut conn, "i-1", "voter-a").unwrap();
        toggle_vote(&mut conn, "i-1", "voter-b").unwrap();
        toggle_vote(&mut conn, "i-1", "voter-c").unwrap();

        let issue = db::get_issue(&conn, "i-1").unwrap();
        assert_eq!(issue.votes, 3);
        assert!(has_voted(&conn, "i-1", "voter-b").unwrap());
        assert!(!has_voted(&conn, "i-1", "voter-z").unwrap());
    }

    #[test]
    fn anonymous_voters_are_rejected() {
        let mut conn = db::open_in_memory().unwrap();
        seed_issue(&conn, "i-1");
        assert!(matches!(
            toggle_vote(&mut conn, "i-1", "  "),
            Err(PulseError::AuthenticationRequired)
        ));
        assert_eq!(db::get_issue(&conn, "i-1").unwrap().votes, 0);
    }

    #[test]
    fn voting_on_a_missing_issue_is_not_found() {
        let mut conn = db::open_in_memory().unwrap();
        assert!(matches!(
            toggle_vote(&mut conn, "ghost", "voter-a"),
            Err(PulseError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_insert_surfaces_as_constraint_violation() {
        let conn = db::open_in_memory().unwrap();
        seed_issue(&conn, "i-1");
        conn.execute(
            "INSERT INTO votes (issue_id, voter, created_at) VALUES ('i-1', 'voter-a', '2026-01-01')",
            [],
        )
        .unwrap();
        let err: PulseError = conn
            .execute(
                "INSERT INTO votes (issue_id, voter, created_at) VALUES ('i-1', 'voter-a', '2026-01-02')",
                [],
            )
            .unwrap_err()
            .into();
        assert!(matches!(err, PulseError::ConstraintViolation(_)));
    }

    #[test]
    fn reconcile_repairs_counter_drift() {
        let mut conn = db::open_in_memory().unwrap();
        seed_issue(&conn, "i-1");
        seed_issue(&conn, "i-2");
        toggle_vote(&mut conn, "i-1", "voter-a").unwrap();
        toggle_vote(&mut conn, "i-1", "voter-b").unwrap();

        // Simulate drift from a lost client-side update.
        conn.execute("UPDATE issues SET votes = 7 WHERE id = 'i-1'", [])
            .unwrap();

        let corrected = reconcile_votes(&conn).unwrap();
        assert_eq!(corrected, 1);
        assert_eq!(db::get_issue(&conn, "i-1").unwrap().votes, 2);
        assert_eq!(db::get_issue(&conn, "i-2").unwrap().votes, 0);
    }
}
