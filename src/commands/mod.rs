// Commands module - handles CLI command execution

pub mod replay;

pub use replay::{ReplaySummary, handle_replay};
