pub mod backup;
pub mod delete;
pub mod expire;
pub mod menu;
pub mod ping;
pub mod restore;
mod root;
pub mod sweep;

pub use root::{parse, Command, Options, SweepCommand};

/// How a command ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The user asked to leave the menu.
    ExitRequested,
}
