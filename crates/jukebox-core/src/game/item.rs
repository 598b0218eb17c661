// Submitted songs, received reviews, and score aggregation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GameError;

/// Trailing `N/M` rating token. Only the numerator is kept; the denominator
/// is accepted as-is.
static RATING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)/([0-9]+)$").expect("rating pattern is valid"));

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A song entry: what the panelist said about it and where to find it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub description: String,
    pub url: String,
    /// Mean rating, filled in once every review for the round is in.
    pub average_score: Option<f64>,
}

impl Item {
    /// Parse a submission: every whitespace token but the last is the
    /// description, the last one must be an absolute `http` or `https` URL.
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some((last, rest)) = tokens.split_last() else {
            return Err(GameError::EmptySubmission);
        };

        let url = Url::parse(last)
            .ok()
            .filter(is_web_link)
            .ok_or_else(|| GameError::UnparsableLocator {
                token: last.to_string(),
            })?;

        Ok(Item {
            description: rest.join(" "),
            url: url.to_string(),
            average_score: None,
        })
    }
}

/// Links end up in the published results, so only web schemes are allowed.
fn is_web_link(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Description: {}, URL: {}", self.description, self.url)
    }
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// One panelist's verdict on the song currently being presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Display name of the reviewer.
    pub from: String,
    pub comment: String,
    pub rating: u32,
}

impl Review {
    /// Parse `"<comment> N/M"`. Trailing whitespace is ignored.
    ///
    /// The rating token must be separated from the comment by whitespace, so
    /// a bare `"10/10"` is rejected with [`GameError::MissingSeparator`].
    pub fn parse(reviewer: &str, raw: &str) -> Result<Self, GameError> {
        let text = raw.trim_end();
        let unparsable = || GameError::UnparsableRating {
            text: raw.to_string(),
        };

        let caps = RATING_PATTERN.captures(text).ok_or_else(unparsable)?;
        let (Some(token), Some(numerator)) = (caps.get(0), caps.get(1)) else {
            return Err(unparsable());
        };
        let rating: u32 = numerator.as_str().parse().map_err(|_| unparsable())?;

        let before = &text[..token.start()];
        if !before.ends_with(char::is_whitespace) {
            return Err(GameError::MissingSeparator);
        }

        Ok(Review {
            from: reviewer.to_string(),
            comment: before.trim_end().to_string(),
            rating,
        })
    }
}

/// Arithmetic mean of the ratings. A single review yields its rating
/// exactly; no reviews yields `None`.
pub fn average_score(reviews: &[Review]) -> Option<f64> {
    match reviews {
        [] => None,
        [single] => Some(f64::from(single.rating)),
        many => {
            let sum: u64 = many.iter().map(|r| u64::from(r.rating)).sum();
            Some(sum as f64 / many.len() as f64)
        }
    }
}
