use std::collections::VecDeque;

use crate::client::Store;
use crate::common::{debug, info, warn, Result, SweepError};
use crate::core::classify::{classify, resolve, TtlState};
use crate::core::{KeyRecord, KeySet};
use crate::protocol::Key;

/// Whether scanned keys are returned with their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolve {
    Keys,
    Values,
}

/// Cursor walk over the keyspace that hands out keys one at a time.
///
/// At most one SCAN reply is buffered, so memory stays flat however large the
/// keyspace is. The store is borrowed per call, which lets the caller mutate
/// keys between two calls to [`KeyStream::next`].
#[derive(Debug)]
pub struct KeyStream {
    pattern: String,
    count: Option<u64>,
    resolve: Resolve,
    cursor: u64,
    pending: VecDeque<Key>,
    finished: bool,
    scanned: u64,
    matched: u64,
    unreadable: u64,
}

impl KeyStream {
    pub fn new(pattern: impl Into<String>, resolve: Resolve) -> Self {
        Self {
            pattern: pattern.into(),
            count: None,
            resolve,
            cursor: 0,
            pending: VecDeque::new(),
            finished: false,
            scanned: 0,
            matched: 0,
            unreadable: 0,
        }
    }

    /// COUNT hint sent with every SCAN.
    pub fn with_count(mut self, count: Option<u64>) -> Self {
        self.count = count;
        self
    }

    /// Keys the store returned so far.
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// Keys without expiration handed out so far.
    pub fn matched(&self) -> u64 {
        self.matched
    }

    /// Keys passed over because their name is not valid utf-8.
    pub fn unreadable(&self) -> u64 {
        self.unreadable
    }

    /// Next key matching the pattern, whatever its ttl.
    /// A failing SCAN aborts the walk for good.
    pub async fn next_key(&mut self, store: &mut dyn Store) -> Result<Option<Key>> {
        loop {
            if let Some(key) = self.pending.pop_front() {
                self.scanned += 1;
                return Ok(Some(key));
            }
            if self.finished {
                return Ok(None);
            }

            let page = store
                .scan(self.cursor, &self.pattern, self.count)
                .await
                .map_err(|source| SweepError::ScanAborted {
                    cursor: self.cursor,
                    source: Box::new(source),
                })?;

            debug!(cursor = self.cursor, next = page.cursor, keys = page.keys.len(), "scan");

            for raw in page.unreadable {
                self.scanned += 1;
                self.unreadable += 1;
                warn!(key = %String::from_utf8_lossy(&raw), "skip key that is not valid utf-8");
            }

            self.cursor = page.cursor;
            self.finished = page.cursor == 0;
            self.pending.extend(page.keys);
        }
    }

    /// Next key without expiration. Keys with a ttl, vanished keys and keys
    /// whose ttl or value cannot be read are passed over.
    pub async fn next(&mut self, store: &mut dyn Store) -> Result<Option<KeyRecord>> {
        while let Some(key) = self.next_key(store).await? {
            debug!(%key, "scanning key");

            if classify(store, &key).await != TtlState::NoExpiry {
                continue;
            }

            let value = match self.resolve {
                Resolve::Keys => None,
                Resolve::Values => match resolve(store, &key).await {
                    Some(value) => Some(value),
                    None => continue,
                },
            };

            info!(%key, "key has no ttl");
            self.matched += 1;
            return Ok(Some(KeyRecord { key, value }));
        }

        Ok(None)
    }
}

/// Collect every key without expiration into memory.
///
/// Memory grows with the number of matching keys and their values, use
/// [`KeyStream`] directly when the set can be large and need not be held at once.
pub async fn scan_and_classify(
    store: &mut dyn Store,
    pattern: &str,
    count: Option<u64>,
    resolve: Resolve,
) -> Result<KeySet> {
    let mut stream = KeyStream::new(pattern, resolve).with_count(count);
    let mut keys = KeySet::new();

    while let Some(KeyRecord { key, value }) = stream.next(store).await? {
        keys.insert(key, value);
    }

    info!(
        scanned = stream.scanned(),
        unreadable = stream.unreadable(),
        total = keys.len(),
        "completed scan of keys without ttl"
    );

    Ok(keys)
}
