#![allow(clippy::module_inception)]

pub mod backup;
pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;

pub use crate::error::SweepError;
pub type Result<T, E = crate::error::SweepError> = std::result::Result<T, E>;

pub use protocol::{Key, Value};

pub(crate) mod common {
    pub(crate) type Error = crate::error::internal::Error;
    pub(crate) type ErrorKind = crate::error::internal::ErrorKind;

    pub use crate::error::SweepError;
    pub use crate::Result;

    pub use tracing::{debug, error, info, trace, warn};
}
