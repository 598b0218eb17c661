// The session aggregate: who is playing, in which order, and whose song is
// currently on air.

use chrono::{DateTime, Local};
use tracing::{debug, info};

use super::item::{Item, Review};
use super::participant::Participant;
use crate::error::GameError;
use crate::protocol::ParticipantId;

/// One complete game run, from the first command to the final ranking.
///
/// Participants are unique by sender identity and keep their arrival order,
/// which is also the presentation order until the order is shuffled once all
/// songs are in.
#[derive(Debug, Clone, Default)]
pub struct Session {
    started_at: Option<DateTime<Local>>,
    starter: Option<ParticipantId>,
    participants: Vec<Participant>,
    /// Index into `participants` of the current presenter.
    presenter: Option<usize>,
    all_items_submitted: bool,
    active: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Lifecycle ---

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn starter(&self) -> Option<ParticipantId> {
        self.starter
    }

    /// Record the start time and who started the game. The starter still has
    /// to be registered with [`Session::add_participant`].
    pub fn start(&mut self, starter: ParticipantId, now: DateTime<Local>) {
        self.started_at = Some(now);
        self.starter = Some(starter);
        self.active = true;
    }

    pub fn finish(&mut self) {
        self.active = false;
    }

    // --- Registry ---

    /// Register a participant. Returns `false` and changes nothing when the
    /// identity is already registered.
    pub fn add_participant(&mut self, id: ParticipantId, name: &str) -> bool {
        if self.find(id).is_some() {
            info!("Panelist {} with ID {} has already joined the game", name, id);
            return false;
        }
        self.participants.push(Participant::new(id, name));
        info!("Panelist {} with ID {} joined the game", name, id);
        true
    }

    pub fn find(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == id)
    }

    fn position(&self, id: ParticipantId) -> Option<usize> {
        self.participants.iter().position(|p| p.id() == id)
    }

    /// Participants in presentation order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub(crate) fn participants_mut(&mut self) -> &mut [Participant] {
        &mut self.participants
    }

    /// True iff every participant has submitted a song.
    pub fn all_submitted(&self) -> bool {
        self.participants.iter().all(Participant::has_submitted)
    }

    pub fn all_items_submitted(&self) -> bool {
        self.all_items_submitted
    }

    // --- Submissions ---

    /// Store a song for a registered participant who has not submitted yet.
    pub fn submit_item(&mut self, id: ParticipantId, text: &str) -> Result<&Item, GameError> {
        let idx = self.position(id).ok_or(GameError::NotParticipant)?;
        self.participants[idx].submit_item(text)?;
        if self.all_submitted() {
            self.all_items_submitted = true;
        }
        self.participants[idx]
            .item()
            .ok_or(GameError::EmptySubmission)
    }

    // --- Rounds ---

    pub fn presenter(&self) -> Option<&Participant> {
        self.presenter.map(|idx| &self.participants[idx])
    }

    /// Make the first participant whose song has not been presented the
    /// presenter. Returns `None` when every song has been presented.
    pub fn present_next(&mut self) -> Option<&Participant> {
        let idx = self.participants.iter().position(|p| !p.is_presented())?;
        self.participants[idx].mark_presented();
        self.presenter = Some(idx);
        Some(&self.participants[idx])
    }

    /// Record a review of the current presenter's song.
    ///
    /// The self-review check comes first so a presenter is always told they
    /// cannot review their own song, whatever they typed.
    pub fn add_review(&mut self, reviewer: ParticipantId, raw: &str) -> Result<&Review, GameError> {
        let host_idx = self.presenter.ok_or(GameError::NothingPresented)?;
        if self.participants[host_idx].id() == reviewer {
            return Err(GameError::SelfReview);
        }
        let reviewer_idx = self.position(reviewer).ok_or(GameError::UnknownReviewer)?;
        if self.participants[reviewer_idx].review_given() {
            return Err(GameError::AlreadyReviewed);
        }

        let review = Review::parse(self.participants[reviewer_idx].name(), raw)?;
        self.participants[reviewer_idx].set_review_given(true);

        let host = &mut self.participants[host_idx];
        host.receive_review(review);
        host.reviews().last().ok_or(GameError::NothingPresented)
    }

    /// Every participant except the presenter reviews each song.
    pub fn reviews_expected(&self) -> usize {
        self.participants.len().saturating_sub(1)
    }

    pub fn round_complete(&self) -> bool {
        let received = self.presenter().map_or(0, |p| p.reviews().len());
        let expected = self.reviews_expected();
        debug!("Expected reviews {}, so far received {}", expected, received);
        received == expected
    }

    /// Compute and store the presenter's average score.
    pub fn finalize_round(&mut self) -> Option<f64> {
        let idx = self.presenter?;
        self.participants[idx].finalize_score()
    }

    /// Whether the current presenter is last in presentation order, i.e. this
    /// was the final round.
    pub fn presenter_is_last(&self) -> bool {
        match (self.presenter, self.participants.len()) {
            (Some(idx), len) => idx + 1 == len,
            _ => false,
        }
    }

    /// Clear every participant's review flag before the next round.
    pub fn reset_review_flags(&mut self) {
        for p in &mut self.participants {
            p.set_review_given(false);
        }
    }

    /// The participant with the strictly highest average score. Ties go to
    /// whoever comes first in presentation order.
    pub fn winner(&self) -> Option<&Participant> {
        let score = |p: &Participant| p.average_score().unwrap_or(f64::NEG_INFINITY);
        let mut participants = self.participants.iter();
        let mut best = participants.next()?;
        for p in participants {
            if score(p) > score(best) {
                best = p;
            }
        }
        Some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(names: &[(i64, &str)]) -> Session {
        let mut session = Session::new();
        for (id, name) in names {
            session.add_participant(ParticipantId(*id), name);
        }
        session
    }

    fn submit_all(session: &mut Session) {
        let ids: Vec<ParticipantId> = session.participants().iter().map(|p| p.id()).collect();
        for id in ids {
            session
                .submit_item(id, &format!("song of {id} https://example.com/{id}"))
                .unwrap();
        }
    }

    #[test]
    fn new_session_is_not_started() {
        let session = Session::new();
        assert!(!session.is_started());
        assert!(!session.is_active());
        assert!(session.participants().is_empty());
        assert!(session.presenter().is_none());
    }

    #[test]
    fn start_records_starter() {
        let mut session = Session::new();
        session.start(ParticipantId(666), Local::now());
        assert!(session.is_started());
        assert!(session.is_active());
        assert_eq!(session.starter(), Some(ParticipantId(666)));
    }

    #[test]
    fn participants_keep_arrival_order() {
        let session = session_with(&[(666, "Santana"), (7, "Pjotr"), (123, "Jesus")]);
        let names: Vec<&str> = session.participants().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Santana", "Pjotr", "Jesus"]);
    }

    #[test]
    fn duplicate_identity_is_not_added() {
        let mut session = session_with(&[(666, "Santana"), (7, "Pjotr")]);
        assert!(!session.add_participant(ParticipantId(7), "Pjotr again"));
        assert_eq!(session.participants().len(), 2);
        assert_eq!(session.find(ParticipantId(7)).unwrap().name(), "Pjotr");
    }

    #[test]
    fn find_unknown_identity() {
        let session = session_with(&[(1, "A")]);
        assert!(session.find(ParticipantId(2)).is_none());
    }

    #[test]
    fn all_submitted_tracks_every_participant() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        assert!(!session.all_submitted());
        session
            .submit_item(ParticipantId(1), "a https://example.com/a")
            .unwrap();
        assert!(!session.all_submitted());
        assert!(!session.all_items_submitted());
        session
            .submit_item(ParticipantId(2), "b https://example.com/b")
            .unwrap();
        assert!(session.all_submitted());
        assert!(session.all_items_submitted());
    }

    #[test]
    fn submission_from_stranger_rejected() {
        let mut session = session_with(&[(1, "A")]);
        assert_eq!(
            session
                .submit_item(ParticipantId(99), "x https://example.com/x")
                .unwrap_err(),
            GameError::NotParticipant
        );
    }

    #[test]
    fn second_submission_rejected() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        session
            .submit_item(ParticipantId(1), "a https://example.com/a")
            .unwrap();
        assert_eq!(
            session
                .submit_item(ParticipantId(1), "again https://example.com/again")
                .unwrap_err(),
            GameError::AlreadySubmitted
        );
    }

    #[test]
    fn present_next_walks_participants_in_order() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        submit_all(&mut session);

        assert_eq!(session.present_next().unwrap().name(), "A");
        assert!(session.presenter().unwrap().review_given());
        assert!(!session.presenter_is_last());

        assert_eq!(session.present_next().unwrap().name(), "B");
        assert!(session.presenter_is_last());

        assert!(session.present_next().is_none());
    }

    #[test]
    fn self_review_rejected_even_when_malformed() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        submit_all(&mut session);
        session.present_next();

        assert_eq!(
            session.add_review(ParticipantId(1), "great 10/10").unwrap_err(),
            GameError::SelfReview
        );
        assert_eq!(
            session.add_review(ParticipantId(1), "no rating").unwrap_err(),
            GameError::SelfReview
        );
    }

    #[test]
    fn review_before_presentation_rejected() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        assert_eq!(
            session.add_review(ParticipantId(2), "great 10/10").unwrap_err(),
            GameError::NothingPresented
        );
    }

    #[test]
    fn review_from_stranger_rejected() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        submit_all(&mut session);
        session.present_next();
        assert_eq!(
            session.add_review(ParticipantId(3), "great 10/10").unwrap_err(),
            GameError::UnknownReviewer
        );
    }

    #[test]
    fn second_review_in_same_round_rejected() {
        let mut session = session_with(&[(1, "A"), (2, "B"), (3, "C")]);
        submit_all(&mut session);
        session.present_next();

        session.add_review(ParticipantId(2), "great 10/10").unwrap();
        assert_eq!(
            session.add_review(ParticipantId(2), "changed my mind 1/10").unwrap_err(),
            GameError::AlreadyReviewed
        );
        assert_eq!(session.presenter().unwrap().reviews().len(), 1);
        assert!(!session.round_complete());
    }

    #[test]
    fn malformed_review_does_not_mark_reviewer() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        submit_all(&mut session);
        session.present_next();

        assert!(session.add_review(ParticipantId(2), "no points").is_err());
        assert!(!session.find(ParticipantId(2)).unwrap().review_given());
        let review = session.add_review(ParticipantId(2), "ok then 4/10").unwrap();
        assert_eq!(review.from, "B");
        assert_eq!(review.rating, 4);
    }

    #[test]
    fn round_completes_after_everyone_but_presenter() {
        let mut session = session_with(&[(1, "A"), (2, "B"), (3, "C")]);
        submit_all(&mut session);
        session.present_next();
        assert_eq!(session.reviews_expected(), 2);

        session.add_review(ParticipantId(2), "great 10/10").unwrap();
        assert!(!session.round_complete());
        session.add_review(ParticipantId(3), "meh 5/10").unwrap();
        assert!(session.round_complete());
        assert_eq!(session.finalize_round(), Some(7.5));
        assert_eq!(session.presenter().unwrap().average_score(), Some(7.5));
    }

    #[test]
    fn reset_review_flags_clears_everyone() {
        let mut session = session_with(&[(1, "A"), (2, "B")]);
        submit_all(&mut session);
        session.present_next();
        session.add_review(ParticipantId(2), "great 10/10").unwrap();

        session.reset_review_flags();
        assert!(session.participants().iter().all(|p| !p.review_given()));
    }

    fn scored_session(scores: &[u32]) -> Session {
        let names: Vec<(i64, String)> = (0..scores.len())
            .map(|i| (i as i64 + 1, format!("P{i}")))
            .collect();
        let refs: Vec<(i64, &str)> = names.iter().map(|(id, n)| (*id, n.as_str())).collect();
        let mut session = session_with(&refs);
        // One review per round is enough to set a score; the reviewer is
        // always the next participant in line.
        submit_all(&mut session);
        for (i, score) in scores.iter().enumerate() {
            session.present_next();
            let reviewer = ParticipantId(((i + 1) % scores.len()) as i64 + 1);
            session
                .add_review(reviewer, &format!("verdict {score}/10"))
                .unwrap();
            session.finalize_round();
            session.reset_review_flags();
        }
        session
    }

    #[test]
    fn winner_is_highest_average() {
        let session = scored_session(&[3, 9, 5]);
        assert_eq!(session.winner().unwrap().name(), "P1");
    }

    #[test]
    fn winner_tie_goes_to_first_in_order() {
        let session = scored_session(&[8, 8, 2]);
        assert_eq!(session.winner().unwrap().name(), "P0");
    }

    #[test]
    fn winner_can_be_last_participant() {
        // A scan that stops one short of the end would crown P0 here.
        let session = scored_session(&[5, 4, 9]);
        assert_eq!(session.winner().unwrap().name(), "P2");
    }

    #[test]
    fn winner_of_empty_session_is_none() {
        assert!(Session::new().winner().is_none());
    }
}
