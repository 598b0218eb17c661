// Library root for the jukebox jury game core: command parsing, the game
// model, and the session state machine. Transport, configuration, and report
// rendering live in the bot crate.

pub mod error;
pub mod game;
pub mod machine;
pub mod protocol;
pub mod report;
