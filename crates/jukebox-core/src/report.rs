// Boundary between the finished game and whatever publishes its results.
//
// The state machine builds a `GameResults` summary and hands it to a
// `ResultReporter`. Rendering formats and output sinks live in the bot crate.

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::game::{Review, Session};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// One panelist's line in the final results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelistResult {
    pub name: String,
    pub description: String,
    pub url: String,
    pub average_score: Option<f64>,
    pub reviews: Vec<Review>,
}

/// Everything a report needs about a finished game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameResults {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration_secs: i64,
    /// Panelists in presentation order.
    pub panelists: Vec<PanelistResult>,
    /// Name of the winning panelist, if anyone played.
    pub winner: Option<String>,
}

impl GameResults {
    pub fn from_session(session: &Session, finished_at: DateTime<Local>) -> Self {
        let started_at = session.started_at().unwrap_or(finished_at);
        let panelists = session
            .participants()
            .iter()
            .map(|p| {
                let (description, url) = p
                    .item()
                    .map(|item| (item.description.clone(), item.url.clone()))
                    .unwrap_or_default();
                PanelistResult {
                    name: p.name().to_string(),
                    description,
                    url,
                    average_score: p.average_score(),
                    reviews: p.reviews().to_vec(),
                }
            })
            .collect();

        GameResults {
            started_at,
            finished_at,
            duration_secs: (finished_at - started_at).num_seconds(),
            panelists,
            winner: session.winner().map(|p| p.name().to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to render results: {0}")]
    Render(String),

    #[error("failed to write results to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Publishes the results of a finished game.
pub trait ResultReporter {
    /// Render and store the results. Returns the location readers can open
    /// (e.g. a public URL), or `None` when the sink has no addressable
    /// location.
    fn publish(&mut self, results: &GameResults) -> Result<Option<String>, ReportError>;
}

/// Reporter that discards everything. Useful when results are not wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ResultReporter for NullReporter {
    fn publish(&mut self, _results: &GameResults) -> Result<Option<String>, ReportError> {
        Ok(None)
    }
}
