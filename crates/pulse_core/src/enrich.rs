use crate::error::Result;
use crate::schema::{Category, CategoryConfidence};
use crate::triage::CategoryGuess;
use serde_json::Value;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Request forwarded to a third-party inference endpoint.
#[derive(Debug, Clone)]
pub struct SuggestRequest {
    pub title: String,
    pub description: String,
}

/// Seam for hosted inference (LLM categorization). Implementations own
/// their transport; the core only sees a JSON payload or an error.
pub trait Suggester: Send + Sync {
    fn suggest(&self, request: &SuggestRequest) -> Result<Value>;
}

/// Run the suggester under a hard time budget. Every failure mode — error,
/// timeout, malformed payload — collapses to `None`, which callers treat
/// as "use the deterministic fallback". The user never sees an upstream
/// failure, only a lower-confidence result.
pub fn suggest_with_budget(
    suggester: Arc<dyn Suggester>,
    request: SuggestRequest,
    budget: Duration,
) -> Option<CategoryGuess> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver may be gone if we already timed out; nothing to do then.
        let _ = tx.send(suggester.suggest(&request));
    });

    match rx.recv_timeout(budget) {
        Ok(Ok(payload)) => {
            let parsed = parse_suggestion(&payload);
            if parsed.is_none() {
                warn!("upstream suggestion failed shape validation, falling back");
            }
            parsed
        }
        Ok(Err(err)) => {
            warn!(error = %err, "upstream suggester failed, falling back");
            None
        }
        Err(_) => {
            warn!(budget_ms = budget.as_millis() as u64, "upstream suggester timed out, falling back");
            None
        }
    }
}

/// Validate the upstream JSON shape before trusting it: the category must
/// parse into the closed enum and every confidence must sit in [0, 1] with
/// alternatives strictly below the primary pick.
pub fn parse_suggestion(payload: &Value) -> Option<CategoryGuess> {
    let category: Category = payload.get("category")?.as_str()?.parse().ok()?;
    let confidence = payload.get("confidence")?.as_f64()?;
    if !(0.0..=1.0).contains(&confidence) {
        return None;
    }

    let mut alternatives = Vec::new();
    if let Some(entries) = payload.get("alternatives").and_then(Value::as_array) {
        for entry in entries {
            let alt_category: Category = entry.get("category")?.as_str()?.parse().ok()?;
            let alt_confidence = entry.get("confidence")?.as_f64()?;
            if !(0.0..=1.0).contains(&alt_confidence) || alt_confidence >= confidence {
                return None;
            }
            alternatives.push(CategoryConfidence {
                category: alt_category,
                confidence: alt_confidence,
            });
        }
    }

    Some(CategoryGuess {
        category,
        confidence,
        alternatives,
        keywords: Vec::new(),
    })
}
