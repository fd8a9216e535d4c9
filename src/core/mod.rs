//! Scan, classify and mutate keys that have no expiration.

use std::collections::BTreeMap;

use crate::protocol::{Key, Value};

mod classify;
pub use self::classify::{classify, resolve, TtlState};

mod scan;
pub use self::scan::{scan_and_classify, KeyStream, Resolve};

mod mutate;
pub use self::mutate::{delete, delete_via_iterator, expire, restore, MutationSummary, Operation};

mod policy;
pub use self::policy::{DeleteMode, OnKeyError, Policy, Throttle};

mod workflow;
pub use self::workflow::{Settings, Workflow};

/// Keys selected for one operation. Values are absent for key only work.
pub type KeySet = BTreeMap<Key, Option<Value>>;

/// A key that has no expiration, with its value when it was resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub key: Key,
    pub value: Option<Value>,
}
