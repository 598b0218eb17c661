// A single panelist and the bookkeeping for their song and reviews.

use super::item::{average_score, Item, Review};
use crate::error::GameError;
use crate::protocol::ParticipantId;

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    id: ParticipantId,
    name: String,
    item: Option<Item>,
    reviews: Vec<Review>,
    item_presented: bool,
    review_given: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Participant {
            id,
            name: name.into(),
            item: None,
            reviews: Vec::new(),
            item_presented: false,
            review_given: false,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    /// Reviews received for this participant's song, in arrival order.
    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn has_submitted(&self) -> bool {
        self.item.is_some()
    }

    pub fn is_presented(&self) -> bool {
        self.item_presented
    }

    /// Whether this participant is done reviewing the current song. Always
    /// true for the presenter.
    pub fn review_given(&self) -> bool {
        self.review_given
    }

    pub fn average_score(&self) -> Option<f64> {
        self.item.as_ref().and_then(|item| item.average_score)
    }

    /// Store the song. The song can only be set once.
    pub fn submit_item(&mut self, text: &str) -> Result<&Item, GameError> {
        if self.item.is_some() {
            return Err(GameError::AlreadySubmitted);
        }
        Ok(&*self.item.insert(Item::parse(text)?))
    }

    pub(crate) fn mark_presented(&mut self) {
        self.item_presented = true;
        self.review_given = true;
    }

    pub(crate) fn set_review_given(&mut self, given: bool) {
        self.review_given = given;
    }

    pub(crate) fn receive_review(&mut self, review: Review) {
        self.reviews.push(review);
    }

    /// Compute the mean of the received reviews and store it on the item.
    pub(crate) fn finalize_score(&mut self) -> Option<f64> {
        let average = average_score(&self.reviews);
        if let Some(item) = self.item.as_mut() {
            item.average_score = average;
        }
        average
    }
}
