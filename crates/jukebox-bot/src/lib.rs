// Library root for the Telegram front end: re-exports all modules so
// integration tests can drive the app without a network.

pub mod app;
pub mod config;
pub mod pacing;
pub mod report;
pub mod telegram;
