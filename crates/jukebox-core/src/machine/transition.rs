// Per-state transition functions.

use chrono::Local;
use tracing::{debug, error, info};

use super::{Context, State};
use crate::error::GameError;
use crate::game::Session;
use crate::protocol::{Command, CommandKind, PREFIX};
use crate::report::{GameResults, ReportError};

/// Run one state. `cmd` is `Some` only for states that wait for input.
pub(super) fn step(
    state: State,
    session: &mut Session,
    cmd: Option<&Command>,
    ctx: &mut Context<'_>,
) -> State {
    debug!("State: {}", state);
    match (state, cmd) {
        (State::Init, _) => State::StartGame,
        (State::StartGame, Some(cmd)) => start_game(session, cmd, ctx),
        (State::WaitForJoins, Some(cmd)) => wait_for_joins(session, cmd, ctx),
        (State::AddItem, Some(cmd)) => add_item(session, cmd, ctx),
        (State::IntroduceItem, _) => introduce_item(session, ctx),
        (State::WaitForReviews, Some(cmd)) => wait_for_reviews(session, cmd, ctx),
        (State::RevealReviews, _) => reveal_reviews(session, ctx),
        (State::StopGame, _) => stop_game(session, ctx),
        (State::Terminal, _) => State::Terminal,
        (waiting, None) => waiting,
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

fn start_game(session: &mut Session, cmd: &Command, ctx: &mut Context<'_>) -> State {
    session.start(cmd.sender, Local::now());
    session.add_participant(cmd.sender, &cmd.sender_name);
    info!(
        "User {} with ID {} started a new game",
        cmd.sender_name, cmd.sender
    );
    ctx.announce(format!(
        "User {} started a new game, join by using command: {} {}",
        cmd.sender_name,
        PREFIX,
        CommandKind::Join.alternation()
    ));
    State::WaitForJoins
}

fn wait_for_joins(session: &mut Session, cmd: &Command, ctx: &mut Context<'_>) -> State {
    match cmd.kind {
        CommandKind::Join => {
            if session.add_participant(cmd.sender, &cmd.sender_name) {
                ctx.announce(format!("User {} joined the game", cmd.sender_name));
            } else {
                ctx.reject(cmd, GameError::DuplicateJoin);
            }
            State::WaitForJoins
        }
        CommandKind::Continue => {
            let joined = session.participants().len();
            let required = ctx.rules.min_participants;
            if joined < required {
                ctx.reject(cmd, GameError::NotEnoughParticipants { required, joined });
                return State::WaitForJoins;
            }

            info!("User {} wants to proceed with {} panelists", cmd.sender_name, joined);
            ctx.announce(format!("User {} wants to proceed, continuing...", cmd.sender_name));
            ctx.announce(format!(
                "Add song with the following command and format in private chat with the bot: \
                 {} {} description here https://link-as-last-item",
                PREFIX,
                CommandKind::Present.alternation()
            ));
            ctx.announce(format!(
                "Add review similar way (only integers): {} {} description here 5/{}",
                PREFIX,
                CommandKind::Review.alternation(),
                ctx.rules.rating_scale
            ));
            State::AddItem
        }
        _ => {
            debug!(
                "Ignoring `{}` from {} while waiting for joins",
                cmd.keyword, cmd.sender_name
            );
            State::WaitForJoins
        }
    }
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

fn add_item(session: &mut Session, cmd: &Command, ctx: &mut Context<'_>) -> State {
    if cmd.kind != CommandKind::Present {
        ctx.reject(
            cmd,
            GameError::WrongCommand {
                keyword: cmd.keyword.clone(),
            },
        );
        return State::AddItem;
    }

    match session.submit_item(cmd.sender, &cmd.text) {
        Ok(item) => info!(
            "Panelist {} with ID {} added a song: {}",
            cmd.sender_name, cmd.sender, item
        ),
        Err(err) => {
            ctx.reject(cmd, err);
            return State::AddItem;
        }
    }
    let name = session
        .find(cmd.sender)
        .map_or(cmd.sender_name.as_str(), |p| p.name());
    ctx.announce(format!("Panelist {} added a song", name));

    if !session.all_items_submitted() {
        return State::AddItem;
    }

    info!("All songs submitted, continuing");
    ctx.announce("All songs submitted, continuing...");
    ctx.shuffler.shuffle(session.participants_mut());
    State::IntroduceItem
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

fn introduce_item(session: &mut Session, ctx: &mut Context<'_>) -> State {
    let Some(presenter) = session.present_next() else {
        error!("No unpresented songs left, nothing to review");
        return State::WaitForReviews;
    };

    let name = presenter.name().to_string();
    let details = presenter.item().map(ToString::to_string).unwrap_or_default();
    info!("Current presenter {} with song {}", name, details);
    ctx.announce(format!(
        "The next song comes from the panelist {} and the song's details: {}",
        name, details
    ));
    State::WaitForReviews
}

fn wait_for_reviews(session: &mut Session, cmd: &Command, ctx: &mut Context<'_>) -> State {
    if cmd.kind != CommandKind::Review {
        ctx.reject(
            cmd,
            GameError::WrongCommand {
                keyword: cmd.keyword.clone(),
            },
        );
        return State::WaitForReviews;
    }

    let from = match session.add_review(cmd.sender, &cmd.text) {
        Ok(review) => review.from.clone(),
        Err(err) => {
            ctx.reject(cmd, err);
            return State::WaitForReviews;
        }
    };
    info!(
        "Panelist {} reviewed the song {}",
        from,
        session
            .presenter()
            .and_then(|p| p.item())
            .map(|item| item.url.as_str())
            .unwrap_or_default()
    );
    ctx.announce(format!("Panelist {} reviewed the song", from));

    if !session.round_complete() {
        return State::WaitForReviews;
    }

    ctx.announce("Everybody has reviewed the song, continuing...");
    State::RevealReviews
}

fn reveal_reviews(session: &mut Session, ctx: &mut Context<'_>) -> State {
    let scale = ctx.rules.rating_scale;
    if let Some(presenter) = session.presenter() {
        for review in presenter.reviews() {
            ctx.announce_paced(format!(
                "{} wrote: {}. The song rating was: {}/{}",
                review.from, review.comment, review.rating, scale
            ));
        }
    }

    let average = session.finalize_round().unwrap_or(0.0);
    let url = session
        .presenter()
        .and_then(|p| p.item())
        .map(|item| item.url.clone())
        .unwrap_or_default();
    info!("Song {} scored {:.2}", url, average);
    ctx.announce(format!(
        "Eventually the song {} ended up catching {:.2} points",
        url, average
    ));

    if session.presenter_is_last() {
        return State::StopGame;
    }
    session.reset_review_flags();
    State::IntroduceItem
}

// ---------------------------------------------------------------------------
// Wrap-up
// ---------------------------------------------------------------------------

fn stop_game(session: &mut Session, ctx: &mut Context<'_>) -> State {
    ctx.announce("Ending the game");

    let results = GameResults::from_session(session, Local::now());
    info!(
        "Game results: {} panelists, duration {}s, winner {:?}",
        results.panelists.len(),
        results.duration_secs,
        results.winner
    );

    match ctx.reporter.publish(&results) {
        Ok(Some(location)) => ctx.announce(format!("Results are available in {}", location)),
        Ok(None) => debug!("Results published without a location"),
        Err(err @ ReportError::Write { .. }) => {
            error!("Failed to create results file: {}", err);
            ctx.announce("Failed to create results file");
        }
        Err(err @ ReportError::Render(_)) => {
            error!("Rendering the results failed: {}", err);
            ctx.announce("Failed to render the results");
        }
    }

    if let Some(winner) = session.winner() {
        let url = winner.item().map(|item| item.url.as_str()).unwrap_or_default();
        ctx.announce(format!(
            "Game has ended. The winner song came from {} and was {} with {:.2} average score",
            winner.name(),
            url,
            winner.average_score().unwrap_or(0.0)
        ));
    }

    session.finish();
    State::Terminal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::shuffle::KeepOrder;
    use crate::machine::Rules;
    use crate::protocol::ParticipantId;
    use crate::report::NullReporter;

    #[test]
    fn introduce_with_every_song_presented_waits_silently() {
        let rules = Rules::default();
        let mut shuffler = KeepOrder;
        let mut reporter = NullReporter;
        let mut ctx = Context::new(&rules, &mut shuffler, &mut reporter);

        let mut session = Session::new();
        session.start(ParticipantId(1), Local::now());
        session.add_participant(ParticipantId(1), "Santana");
        assert!(session.present_next().is_some());

        assert_eq!(introduce_item(&mut session, &mut ctx), State::WaitForReviews);
        assert!(ctx.into_outgoing().is_empty());
    }
}
