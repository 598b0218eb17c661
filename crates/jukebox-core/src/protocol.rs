// Wire protocol: turns one raw chat line into a structured command.
//
// Every accepted line looks like `<prefix> <keyword> [free text...]`. The
// keyword is classified through a static table; the free text is kept
// byte-for-byte so ratings and URLs survive untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Numeric sender identity supplied by the chat transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub i64);

/// Chat (group or private) a message came from or is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Keyword table
// ---------------------------------------------------------------------------

/// Literal every command line has to start with.
pub const PREFIX: &str = "levyraati";

/// What a command keyword asks the game to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Start,
    Join,
    Continue,
    Present,
    Review,
    /// Keyword not in the table. Still a syntactically valid command: before a
    /// session exists any keyword starts one.
    Other,
}

const KEYWORDS: &[(CommandKind, &[&str])] = &[
    (CommandKind::Start, &["aloita"]),
    (CommandKind::Join, &["liity"]),
    (CommandKind::Continue, &["jatka"]),
    (CommandKind::Present, &["esitä", "esitys"]),
    (CommandKind::Review, &["arvio", "arvioi", "arvostele"]),
];

impl CommandKind {
    /// Classify a keyword by exact match against the keyword table.
    pub fn classify(keyword: &str) -> Self {
        KEYWORDS
            .iter()
            .find(|(_, words)| words.contains(&keyword))
            .map(|(kind, _)| *kind)
            .unwrap_or(CommandKind::Other)
    }

    /// All synonyms accepted for this kind. Empty for `Other`.
    pub fn words(self) -> &'static [&'static str] {
        KEYWORDS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, words)| *words)
            .unwrap_or(&[])
    }

    /// Synonyms joined as an alternation, e.g. `(esitä|esitys)`.
    pub fn alternation(self) -> String {
        let words = self.words();
        if words.len() == 1 {
            words[0].to_string()
        } else {
            format!("({})", words.join("|"))
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// One raw inbound chat line plus the sender metadata the transport gives us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub text: String,
    pub sender_id: ParticipantId,
    /// Sender's handle; may be empty.
    pub username: String,
    pub first_name: String,
    pub chat_id: ChatId,
}

/// A parsed command. Produced once per inbound line and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    /// The keyword exactly as typed.
    pub keyword: String,
    /// Everything after the keyword, untouched.
    pub text: String,
    pub sender: ParticipantId,
    pub sender_name: String,
    pub chat: ChatId,
}

/// Parse a raw inbound message into a [`Command`].
///
/// Fails with [`GameError::InvalidSyntax`] when the line has no keyword or
/// does not start with [`PREFIX`]. Callers drop such lines silently since the
/// group chat carries plenty of unrelated traffic.
pub fn parse_command(msg: &InboundMessage) -> Result<Command, GameError> {
    let mut tokens = msg.text.splitn(3, char::is_whitespace);

    let prefix = tokens.next().unwrap_or_default();
    let keyword = tokens
        .next()
        .filter(|k| !k.is_empty())
        .ok_or(GameError::InvalidSyntax)?;
    if prefix != PREFIX {
        return Err(GameError::InvalidSyntax);
    }
    let text = tokens.next().unwrap_or_default();

    Ok(Command {
        kind: CommandKind::classify(keyword),
        keyword: keyword.to_string(),
        text: text.to_string(),
        sender: msg.sender_id,
        sender_name: display_name(&msg.username, &msg.first_name),
        chat: msg.chat_id,
    })
}

/// Prefer the handle; fall back to the given name.
pub fn display_name(username: &str, first_name: &str) -> String {
    if username.is_empty() {
        first_name.to_string()
    } else {
        username.to_string()
    }
}
