// Game model: songs, reviews, panelists, and the session that holds them.

pub mod item;
pub mod participant;
pub mod session;

pub use item::{average_score, Item, Review};
pub use participant::Participant;
pub use session::Session;
