use std::time::Duration;

use crate::client::{Store, Ttl};
use crate::common::{debug, warn};
use crate::protocol::{Key, Value};

/// Expiration state of a key as far as the maintenance operations care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// Key exists and never expires.
    NoExpiry,
    /// Key expires on its own, nothing to do.
    Expires(Duration),
    /// Key vanished or the ttl query failed.
    Unknown,
}

/// Query the ttl of key. Never fails, problems map to `Unknown`.
pub async fn classify(store: &mut dyn Store, key: &Key) -> TtlState {
    match store.ttl(key).await {
        Ok(Ttl::Persistent) => TtlState::NoExpiry,
        Ok(Ttl::Expires(ttl)) => TtlState::Expires(ttl),
        Ok(Ttl::Missing) => {
            debug!(%key, "key vanished before ttl query");
            TtlState::Unknown
        }
        Err(err) => {
            warn!(%key, %err, "ttl query failed, skip key");
            TtlState::Unknown
        }
    }
}

/// Fetch the value of a key without expiration. None when it is gone or GET fails.
pub async fn resolve(store: &mut dyn Store, key: &Key) -> Option<Value> {
    match store.get(key).await {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            debug!(%key, "key vanished before get");
            None
        }
        Err(err) => {
            warn!(%key, %err, "get failed, skip key");
            None
        }
    }
}
