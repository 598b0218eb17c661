// Error taxonomy for everything a single inbound command can get wrong.
//
// None of these escape the state machine: each one either produces a reply
// to the sender or is logged and dropped.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("invalid command syntax")]
    InvalidSyntax,

    #[error("participant has already joined")]
    DuplicateJoin,

    #[error("need at least {required} participants, have {joined}")]
    NotEnoughParticipants { required: usize, joined: usize },

    #[error("wrong command `{keyword}` for the current state")]
    WrongCommand { keyword: String },

    #[error("empty submission")]
    EmptySubmission,

    #[error("could not parse `{token}` as a song URL")]
    UnparsableLocator { token: String },

    #[error("song already submitted")]
    AlreadySubmitted,

    #[error("sender is not a participant")]
    NotParticipant,

    #[error("could not find a rating in `{text}`")]
    UnparsableRating { text: String },

    #[error("rating is not separated from the review with a space")]
    MissingSeparator,

    #[error("participant tried to review their own song")]
    SelfReview,

    #[error("participant already reviewed the current song")]
    AlreadyReviewed,

    #[error("reviewer is not registered")]
    UnknownReviewer,

    #[error("no song is being presented")]
    NothingPresented,
}

impl GameError {
    /// The reply sent back to the sender, or `None` when the error is only
    /// logged.
    pub fn user_message(&self) -> Option<String> {
        let msg = match self {
            GameError::InvalidSyntax
            | GameError::UnknownReviewer
            | GameError::NothingPresented => return None,
            GameError::DuplicateJoin => "You are already in the game".to_string(),
            GameError::NotEnoughParticipants { required, .. } => {
                format!("At least {required} panelists are needed before continuing")
            }
            GameError::WrongCommand { .. } => "Aww cute, but it's a wrong command.".to_string(),
            GameError::EmptySubmission => {
                "Song given in the malformed form: add a description and a link".to_string()
            }
            GameError::UnparsableLocator { .. } => {
                "Song given in the malformed form: the last item must be an http(s) link"
                    .to_string()
            }
            GameError::AlreadySubmitted => "Song already added".to_string(),
            GameError::NotParticipant => "You haven't joined the game".to_string(),
            GameError::UnparsableRating { .. } => "Did you forgot to give the points? \
                Those should be in 10/10 format and as a last item."
                .to_string(),
            GameError::MissingSeparator => {
                "Check that the scoring is last item and separated with a space: ... 5/10"
                    .to_string()
            }
            GameError::SelfReview => "You naughty. It's not possible to review own songs".to_string(),
            GameError::AlreadyReviewed => "You have already reviewed this song".to_string(),
        };
        Some(msg)
    }
}
