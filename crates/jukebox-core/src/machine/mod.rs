// Session state machine.
//
// `Jury` owns the session and the current state. Each inbound command is fed
// through `transition::step` until the machine settles in a state that waits
// for the next command. Everything the game wants to say is collected in a
// `Reaction` for the caller to deliver.

pub mod shuffle;
mod transition;

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::error::GameError;
use crate::game::Session;
use crate::protocol::{ChatId, Command};
use crate::report::ResultReporter;
use shuffle::Shuffler;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Nothing happening. Passes straight through to `StartGame`.
    Init,
    StartGame,
    WaitForJoins,
    AddItem,
    IntroduceItem,
    WaitForReviews,
    RevealReviews,
    StopGame,
    /// Session over. The driver resets to `Init`.
    Terminal,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::Init => "Init",
            State::StartGame => "StartGame",
            State::WaitForJoins => "WaitForJoins",
            State::AddItem => "AddItem",
            State::IntroduceItem => "IntroduceItem",
            State::WaitForReviews => "WaitForReviews",
            State::RevealReviews => "RevealReviews",
            State::StopGame => "StopGame",
            State::Terminal => "Terminal",
        }
    }

    /// States that consume an inbound command. The rest run on their own.
    pub fn awaits_command(self) -> bool {
        matches!(
            self,
            State::StartGame | State::WaitForJoins | State::AddItem | State::WaitForReviews
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A message the game wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Broadcast to the group chat. `paced` messages may be delayed by the
    /// driver so reveals don't arrive in one burst.
    Channel { text: String, paced: bool },
    /// Sent back to the chat a command came from.
    Reply { chat: ChatId, text: String },
}

impl Outgoing {
    pub fn text(&self) -> &str {
        match self {
            Outgoing::Channel { text, .. } | Outgoing::Reply { text, .. } => text,
        }
    }
}

/// Everything that resulted from handling one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Messages in delivery order.
    pub outgoing: Vec<Outgoing>,
    /// Every state the machine moved into, in order.
    pub visited: Vec<State>,
}

impl Reaction {
    /// Texts of all channel broadcasts, in order.
    pub fn channel_texts(&self) -> Vec<&str> {
        self.outgoing
            .iter()
            .filter(|o| matches!(o, Outgoing::Channel { .. }))
            .map(Outgoing::text)
            .collect()
    }

    /// Texts of all replies, in order.
    pub fn reply_texts(&self) -> Vec<&str> {
        self.outgoing
            .iter()
            .filter(|o| matches!(o, Outgoing::Reply { .. }))
            .map(Outgoing::text)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    /// Denominator shown when ratings are revealed.
    pub rating_scale: u32,
    /// Panelists needed before the game may continue past joining.
    pub min_participants: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            rating_scale: 10,
            min_participants: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// What a transition can reach besides the session: the rules, the injected
/// strategies, and the outbox.
pub(crate) struct Context<'a> {
    pub rules: &'a Rules,
    pub shuffler: &'a mut dyn Shuffler,
    pub reporter: &'a mut dyn ResultReporter,
    outgoing: Vec<Outgoing>,
}

impl<'a> Context<'a> {
    fn new(
        rules: &'a Rules,
        shuffler: &'a mut dyn Shuffler,
        reporter: &'a mut dyn ResultReporter,
    ) -> Self {
        Context {
            rules,
            shuffler,
            reporter,
            outgoing: Vec::new(),
        }
    }

    pub fn announce(&mut self, text: impl Into<String>) {
        self.outgoing.push(Outgoing::Channel {
            text: text.into(),
            paced: false,
        });
    }

    pub fn announce_paced(&mut self, text: impl Into<String>) {
        self.outgoing.push(Outgoing::Channel {
            text: text.into(),
            paced: true,
        });
    }

    pub fn reply(&mut self, chat: ChatId, text: impl Into<String>) {
        self.outgoing.push(Outgoing::Reply {
            chat,
            text: text.into(),
        });
    }

    /// Tell the sender what went wrong, or just log it when the error has no
    /// user-facing message.
    pub fn reject(&mut self, cmd: &Command, err: GameError) {
        match err.user_message() {
            Some(text) => {
                warn!(
                    "Rejected `{}` from {} ({}): {}",
                    cmd.keyword, cmd.sender_name, cmd.sender, err
                );
                self.reply(cmd.chat, text);
            }
            None => {
                error!(
                    "Dropped `{}` from {} ({}): {}",
                    cmd.keyword, cmd.sender_name, cmd.sender, err
                );
            }
        }
    }

    fn into_outgoing(self) -> Vec<Outgoing> {
        self.outgoing
    }
}

// ---------------------------------------------------------------------------
// Jury
// ---------------------------------------------------------------------------

/// Drives one session at a time.
pub struct Jury {
    rules: Rules,
    state: State,
    session: Session,
    shuffler: Box<dyn Shuffler + Send>,
    reporter: Box<dyn ResultReporter + Send>,
}

impl Jury {
    pub fn new(
        rules: Rules,
        shuffler: Box<dyn Shuffler + Send>,
        reporter: Box<dyn ResultReporter + Send>,
    ) -> Self {
        Jury {
            rules,
            state: State::Init,
            session: Session::new(),
            shuffler,
            reporter,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Feed one command through the machine.
    ///
    /// The command is consumed by the first state that waits for input. System
    /// states in between run immediately. Reaching `Terminal` resets the
    /// session and returns the machine to `Init`.
    pub fn handle(&mut self, cmd: &Command) -> Reaction {
        let mut ctx = Context::new(&self.rules, &mut *self.shuffler, &mut *self.reporter);
        let mut pending = Some(cmd);
        let mut visited = Vec::new();

        loop {
            let input = if self.state.awaits_command() {
                match pending.take() {
                    Some(cmd) => Some(cmd),
                    None => break,
                }
            } else {
                None
            };

            let next = transition::step(self.state, &mut self.session, input, &mut ctx);
            if next != self.state {
                debug!("State {} -> {}", self.state, next);
            }
            visited.push(next);

            if next == State::Terminal {
                info!("Session over, waiting for a new game");
                self.session = Session::new();
                self.state = State::Init;
                break;
            }
            self.state = next;
        }

        Reaction {
            outgoing: ctx.into_outgoing(),
            visited,
        }
    }
}
