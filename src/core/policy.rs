use std::time::Duration;

use serde::Deserialize;

/// What a mutation does when a single key fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OnKeyError {
    /// Stop the operation.
    Abort,
    /// Log the failure and continue with the next key.
    Skip,
}

/// Command used to remove keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// UNLINK, memory is reclaimed in the background.
    Unlink,
    /// DEL, blocks the store until the value is freed.
    Del,
}

/// Pause for `pause` after every `every` deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub every: u64,
    pub pause: Duration,
}

impl Throttle {
    pub const DEFAULT_EVERY: u64 = 1000;
    pub const DEFAULT_PAUSE: Duration = Duration::from_secs(10);

    // Whether to pause after `done` deletions.
    pub(crate) fn due(&self, done: u64) -> bool {
        self.every > 0 && done > 0 && done % self.every == 0
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            every: Throttle::DEFAULT_EVERY,
            pause: Throttle::DEFAULT_PAUSE,
        }
    }
}

/// Knobs shared by every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub expire_after: Duration,
    pub on_key_error: OnKeyError,
    pub delete_mode: DeleteMode,
    pub throttle: Throttle,
}

impl Policy {
    pub const DEFAULT_EXPIRE_AFTER: Duration = Duration::from_secs(60 * 60);
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            expire_after: Policy::DEFAULT_EXPIRE_AFTER,
            on_key_error: OnKeyError::Skip,
            delete_mode: DeleteMode::Unlink,
            throttle: Throttle::default(),
        }
    }
}
