use std::fmt;

use crate::client::Store;
use crate::common::{error, info, warn, Result, SweepError};
use crate::core::policy::{DeleteMode, OnKeyError, Policy};
use crate::core::scan::KeyStream;
use crate::core::{KeyRecord, KeySet};
use crate::protocol::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Expire,
    Delete,
    Restore,
    DeleteViaIterator,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Expire => "expire",
            Operation::Delete => "delete",
            Operation::Restore => "restore",
            Operation::DeleteViaIterator => "delete via iterator",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per key outcome counts of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationSummary {
    pub operation: Operation,
    pub attempted: u64,
    pub succeeded: u64,
    // The key was gone by the time the command reached the store.
    pub missing: u64,
    pub failed: u64,
    pub pauses: u64,
}

impl MutationSummary {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            attempted: 0,
            succeeded: 0,
            missing: 0,
            failed: 0,
            pauses: 0,
        }
    }

    fn log(&self) {
        info!(
            attempted = self.attempted,
            succeeded = self.succeeded,
            missing = self.missing,
            failed = self.failed,
            pauses = self.pauses,
            "completed {}",
            self.operation
        );
    }
}

impl fmt::Display for MutationSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} attempted, {} succeeded, {} missing, {} failed",
            self.operation, self.attempted, self.succeeded, self.missing, self.failed
        )?;
        if self.pauses > 0 {
            write!(f, ", {} pauses", self.pauses)?;
        }
        Ok(())
    }
}

// Apply the key error policy to a failed command.
fn key_failed(
    policy: &Policy,
    summary: &mut MutationSummary,
    key: &Key,
    err: SweepError,
) -> Result<()> {
    summary.failed += 1;
    match policy.on_key_error {
        OnKeyError::Skip => {
            error!(%key, %err, "failed to {} key", summary.operation);
            Ok(())
        }
        OnKeyError::Abort => Err(SweepError::KeyOperationAborted {
            operation: summary.operation.name(),
            key: key.to_string(),
            source: Box::new(err),
        }),
    }
}

async fn remove(store: &mut dyn Store, key: &Key, mode: DeleteMode) -> Result<bool> {
    match mode {
        DeleteMode::Unlink => store.unlink(key).await,
        DeleteMode::Del => store.delete(key).await,
    }
}

/// Set the policy expiration on every key. Running it twice leaves the same ttl.
pub async fn expire(
    store: &mut dyn Store,
    keys: &KeySet,
    policy: &Policy,
) -> Result<MutationSummary> {
    let mut summary = MutationSummary::new(Operation::Expire);

    for key in keys.keys() {
        summary.attempted += 1;
        match store.expire(key, policy.expire_after).await {
            Ok(true) => {
                summary.succeeded += 1;
                info!(%key, ttl_secs = policy.expire_after.as_secs(), "updated ttl");
            }
            Ok(false) => {
                summary.missing += 1;
                warn!(%key, "key no longer exists, ttl not updated");
            }
            Err(err) => key_failed(policy, &mut summary, key, err)?,
        }
    }

    summary.log();
    Ok(summary)
}

/// Remove every key with the policy delete mode.
pub async fn delete(
    store: &mut dyn Store,
    keys: &KeySet,
    policy: &Policy,
) -> Result<MutationSummary> {
    let mut summary = MutationSummary::new(Operation::Delete);

    for key in keys.keys() {
        summary.attempted += 1;
        info!(%key, "deleting key");
        match remove(store, key, policy.delete_mode).await {
            Ok(true) => summary.succeeded += 1,
            Ok(false) => {
                summary.missing += 1;
                warn!(%key, "key no longer exists");
            }
            Err(err) => key_failed(policy, &mut summary, key, err)?,
        }
    }

    summary.log();
    Ok(summary)
}

/// Write every value back without expiration, replacing what is there.
pub async fn restore(
    store: &mut dyn Store,
    keys: &KeySet,
    policy: &Policy,
) -> Result<MutationSummary> {
    let mut summary = MutationSummary::new(Operation::Restore);

    for (key, value) in keys {
        summary.attempted += 1;
        let value = match value {
            Some(value) => value,
            None => {
                let err = SweepError::MissingValue {
                    key: key.to_string(),
                };
                key_failed(policy, &mut summary, key, err)?;
                continue;
            }
        };

        match store.set(key, value).await {
            Ok(()) => {
                summary.succeeded += 1;
                info!(%key, "restored key");
            }
            Err(err) => key_failed(policy, &mut summary, key, err)?,
        }
    }

    summary.log();
    Ok(summary)
}

/// Delete keys without expiration while scanning, never holding the key list.
///
/// After every `policy.throttle.every` confirmed deletions the walk sleeps for
/// `policy.throttle.pause` to spread the load on the store.
pub async fn delete_via_iterator(
    store: &mut dyn Store,
    mut stream: KeyStream,
    policy: &Policy,
) -> Result<MutationSummary> {
    let mut summary = MutationSummary::new(Operation::DeleteViaIterator);

    while let Some(KeyRecord { key, .. }) = stream.next(store).await? {
        summary.attempted += 1;
        match remove(store, &key, policy.delete_mode).await {
            Ok(true) => {
                summary.succeeded += 1;
                info!(%key, deleted = summary.succeeded, "deleted key");

                if policy.throttle.due(summary.succeeded) {
                    summary.pauses += 1;
                    info!(
                        deleted = summary.succeeded,
                        pause_secs = policy.throttle.pause.as_secs(),
                        "pausing deletion"
                    );
                    if !policy.throttle.pause.is_zero() {
                        tokio::time::sleep(policy.throttle.pause).await;
                    }
                }
            }
            Ok(false) => summary.missing += 1,
            Err(err) => key_failed(policy, &mut summary, &key, err)?,
        }
    }

    summary.log();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::memory::{Command, MemoryStore};
    use crate::client::Ttl;
    use crate::core::policy::Throttle;
    use crate::core::scan::Resolve;
    use crate::protocol::Value;

    fn key_set(keys: &[&str]) -> KeySet {
        keys.iter()
            .map(|k| (Key::new(*k).unwrap(), Some(Value::new(k.as_bytes()).unwrap())))
            .collect()
    }

    fn no_pause() -> Policy {
        Policy {
            throttle: Throttle {
                every: 1000,
                pause: Duration::ZERO,
            },
            ..Policy::default()
        }
    }

    #[test]
    fn expire_is_idempotent() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new();
            store.insert("a", "1", None);
            store.insert("b", "2", None);
            let keys = key_set(&["a", "b", "gone"]);
            let policy = Policy::default();

            let first = expire(&mut store, &keys, &policy).await.unwrap();
            let after_first = store.remaining_ttl("a");
            let second = expire(&mut store, &keys, &policy).await.unwrap();

            assert_eq!(first.succeeded, 2);
            assert_eq!(first.missing, 1);
            assert_eq!(second.succeeded, 2);
            assert_eq!(after_first, Ttl::Expires(Duration::from_secs(3600)));
            assert_eq!(store.remaining_ttl("a"), Ttl::Expires(Duration::from_secs(3600)));
        })
    }

    #[test]
    fn skip_policy_continues_after_failure() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new();
            for k in ["a", "b", "c"] {
                store.insert(k, k, None);
            }
            store.fail(Command::Unlink, "b");

            let summary = delete(&mut store, &key_set(&["a", "b", "c"]), &Policy::default())
                .await
                .unwrap();

            assert_eq!(summary.attempted, 3);
            assert_eq!(summary.succeeded, 2);
            assert_eq!(summary.failed, 1);
            assert!(store.value("b").is_some());
            assert_eq!(store.calls(Command::Delete), 0);
        })
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new();
            for k in ["a", "b", "c"] {
                store.insert(k, k, None);
            }
            store.fail(Command::Delete, "b");
            let policy = Policy {
                on_key_error: OnKeyError::Abort,
                delete_mode: DeleteMode::Del,
                ..Policy::default()
            };

            let err = delete(&mut store, &key_set(&["a", "b", "c"]), &policy)
                .await
                .unwrap_err();

            assert!(err.is_fatal());
            assert!(matches!(
                err,
                SweepError::KeyOperationAborted { operation: "delete", ref key, .. } if key == "b"
            ));
            assert!(store.value("a").is_none());
            assert!(store.value("c").is_some());
        })
    }

    #[test]
    fn restore_overwrites_without_expiration() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new();
            store.insert("a", "old", Some(Duration::from_secs(60)));

            let mut keys = key_set(&["a", "b"]);
            keys.insert(Key::new("no-value").unwrap(), None);

            let summary = restore(&mut store, &keys, &Policy::default()).await.unwrap();

            assert_eq!(summary.succeeded, 2);
            assert_eq!(summary.failed, 1);
            assert_eq!(store.value("a"), Some(Value::new(b"a".as_ref()).unwrap()));
            assert_eq!(store.remaining_ttl("a"), Ttl::Persistent);
            assert_eq!(store.remaining_ttl("b"), Ttl::Persistent);
        })
    }

    #[test]
    fn restore_missing_value_follows_policy() {
        tokio_test::block_on(async move {
            let mut keys = key_set(&["a", "c"]);
            keys.insert(Key::new("b").unwrap(), None);
            let policy = Policy {
                on_key_error: OnKeyError::Abort,
                ..Policy::default()
            };

            let mut store = MemoryStore::new();
            let err = restore(&mut store, &keys, &policy).await.unwrap_err();

            assert!(err.is_fatal());
            assert!(matches!(
                err,
                SweepError::KeyOperationAborted { operation: "restore", ref key, ref source }
                    if key == "b" && matches!(**source, SweepError::MissingValue { .. })
            ));
            assert!(store.value("a").is_some());
            assert!(store.value("c").is_none());
            assert_eq!(store.calls(Command::Set), 1);
        })
    }

    fn populate(store: &mut MemoryStore, no_ttl: usize) {
        for i in 0..no_ttl {
            store.insert(&format!("key:{}", i), "v", None);
        }
        for i in 0..25 {
            store.insert(&format!("volatile:{}", i), "v", Some(Duration::from_secs(600)));
        }
    }

    #[test]
    fn iterator_delete_pauses_once_per_thousand() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new().with_page_size(100);
            populate(&mut store, 1000);

            let stream = KeyStream::new("*", Resolve::Keys);
            let summary = delete_via_iterator(&mut store, stream, &no_pause())
                .await
                .unwrap();

            assert_eq!(summary.succeeded, 1000);
            assert_eq!(summary.pauses, 1);
            assert_eq!(store.len(), 25);
            assert_eq!(store.calls(Command::Get), 0);
        })
    }

    #[test]
    fn iterator_delete_below_threshold_never_pauses() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new().with_page_size(100);
            populate(&mut store, 999);

            let stream = KeyStream::new("*", Resolve::Keys);
            let summary = delete_via_iterator(&mut store, stream, &no_pause())
                .await
                .unwrap();

            assert_eq!(summary.succeeded, 999);
            assert_eq!(summary.pauses, 0);
        })
    }

    #[test]
    fn iterator_delete_skips_unreadable_ttl() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new();
            populate(&mut store, 5);
            store.fail(Command::Ttl, "key:2");

            let stream = KeyStream::new("*", Resolve::Keys);
            let summary = delete_via_iterator(&mut store, stream, &no_pause())
                .await
                .unwrap();

            assert_eq!(summary.attempted, 4);
            assert_eq!(summary.succeeded, 4);
            assert_eq!(summary.failed, 0);
            assert!(store.value("key:2").is_some());
        })
    }

    #[test]
    fn iterator_delete_sleeps_for_pause() {
        tokio_test::block_on(async move {
            let mut store = MemoryStore::new();
            populate(&mut store, 4);
            let policy = Policy {
                throttle: Throttle {
                    every: 2,
                    pause: Duration::from_millis(20),
                },
                ..Policy::default()
            };

            let start = std::time::Instant::now();
            let stream = KeyStream::new("key:*", Resolve::Keys);
            let summary = delete_via_iterator(&mut store, stream, &policy)
                .await
                .unwrap();

            assert_eq!(summary.pauses, 2);
            assert!(start.elapsed() >= Duration::from_millis(40));
        })
    }
}
