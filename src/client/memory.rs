//! In process [`Store`] with redis like SCAN and TTL semantics.
//!
//! Keys carry an insertion sequence number which doubles as the scan cursor,
//! so deleting keys mid scan never makes the walk skip a surviving key.
//! Individual commands can be made to fail per key to exercise error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::client::{ScanPage, Store, Ttl};
use crate::common::SweepError;
use crate::{Key, Result, Value};

/// Commands a [`MemoryStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Scan,
    Ttl,
    Get,
    Set,
    Expire,
    Delete,
    Unlink,
}

impl Command {
    fn name(self) -> &'static str {
        match self {
            Command::Scan => "SCAN",
            Command::Ttl => "TTL",
            Command::Get => "GET",
            Command::Set => "SET",
            Command::Expire => "EXPIRE",
            Command::Delete => "DEL",
            Command::Unlink => "UNLINK",
        }
    }
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<Key, Entry>,
    // seq -> key, the scan order.
    order: BTreeMap<u64, Key>,
    next_seq: u64,
    page_size: usize,
    failing: HashSet<(Command, Key)>,
    // Fail the nth SCAN call (0 based).
    failing_scan: Option<usize>,
    calls: HashMap<Command, usize>,
    // Key names that are not utf-8, reported by the first SCAN page.
    unreadable: Vec<Vec<u8>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    const DEFAULT_PAGE_SIZE: usize = 10;

    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 1,
            page_size: MemoryStore::DEFAULT_PAGE_SIZE,
            failing: HashSet::new(),
            failing_scan: None,
            calls: HashMap::new(),
            unreadable: Vec::new(),
        }
    }

    /// Number of keys a SCAN call walks before returning.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = std::cmp::max(page_size, 1);
        self
    }

    /// Insert a key with an optional time to live.
    pub fn insert(&mut self, key: &str, value: impl AsRef<[u8]>, ttl: Option<Duration>) {
        let key = Key::new_unchecked(key);
        let value = Value::new_unchecked(value.as_ref());
        self.put(key, value, ttl.map(|ttl| Instant::now() + ttl));
    }

    /// Make SCAN report a key name that is not valid utf-8.
    pub fn insert_unreadable(&mut self, raw: impl Into<Vec<u8>>) {
        self.unreadable.push(raw.into());
    }

    pub fn fail(&mut self, command: Command, key: &str) {
        self.failing.insert((command, Key::new_unchecked(key)));
    }

    pub fn fail_scan_call(&mut self, nth: usize) {
        self.failing_scan = Some(nth);
    }

    pub fn calls(&self, command: Command) -> usize {
        self.calls.get(&command).copied().unwrap_or(0)
    }

    pub fn len(&mut self) -> usize {
        self.evict_expired();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub fn value(&mut self, key: &str) -> Option<Value> {
        self.evict_expired();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn remaining_ttl(&mut self, key: &str) -> Ttl {
        self.evict_expired();
        match self.entries.get(key) {
            Some(entry) => ttl_of(entry),
            None => Ttl::Missing,
        }
    }

    fn put(&mut self, key: Key, value: Value, expires_at: Option<Instant>) {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                entry.expires_at = expires_at;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.order.insert(seq, key.clone());
                self.entries.insert(
                    key,
                    Entry {
                        seq,
                        value,
                        expires_at,
                    },
                );
            }
        }
    }

    fn remove(&mut self, key: &Key) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<Key> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at.map_or(false, |at| at <= now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }

    fn record(&mut self, command: Command, key: Option<&Key>) -> Result<()> {
        let n = self.calls.entry(command).or_insert(0);
        *n += 1;
        let nth = *n - 1;

        let failing = match key {
            Some(key) => self.failing.contains(&(command, key.clone())),
            None => command == Command::Scan && self.failing_scan == Some(nth),
        };
        if failing {
            return Err(SweepError::Store {
                command: command.name(),
                message: "ERR injected failure".into(),
            });
        }

        self.evict_expired();
        Ok(())
    }
}

fn ttl_of(entry: &Entry) -> Ttl {
    match entry.expires_at {
        None => Ttl::Persistent,
        Some(at) => {
            let remaining = at.saturating_duration_since(Instant::now());
            // redis rounds to the nearest second.
            Ttl::Expires(Duration::from_secs((remaining.as_millis() as u64 + 500) / 1000))
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&mut self) -> Result<chrono::Duration> {
        Ok(chrono::Duration::zero())
    }

    async fn scan(&mut self, cursor: u64, pattern: &str, count: Option<u64>) -> Result<ScanPage> {
        self.record(Command::Scan, None)?;

        let page_size = count.map_or(self.page_size, |n| std::cmp::max(n as usize, 1));
        let mut keys = Vec::new();
        let mut last = None;
        for (seq, key) in self.order.range(cursor..).take(page_size) {
            if glob_match(pattern.as_bytes(), key.as_bytes()) {
                keys.push(key.clone());
            }
            last = Some(*seq);
        }

        let unreadable = if cursor == 0 {
            self.unreadable
                .iter()
                .filter(|raw| glob_match(pattern.as_bytes(), raw))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let cursor = match last {
            Some(last) if self.order.range(last + 1..).next().is_some() => last + 1,
            _ => 0,
        };

        Ok(ScanPage {
            cursor,
            keys,
            unreadable,
        })
    }

    async fn ttl(&mut self, key: &Key) -> Result<Ttl> {
        self.record(Command::Ttl, Some(key))?;
        Ok(match self.entries.get(key) {
            Some(entry) => ttl_of(entry),
            None => Ttl::Missing,
        })
    }

    async fn get(&mut self, key: &Key) -> Result<Option<Value>> {
        self.record(Command::Get, Some(key))?;
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&mut self, key: &Key, value: &Value) -> Result<()> {
        self.record(Command::Set, Some(key))?;
        self.put(key.clone(), value.clone(), None);
        Ok(())
    }

    async fn expire(&mut self, key: &Key, ttl: Duration) -> Result<bool> {
        self.record(Command::Expire, Some(key))?;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&mut self, key: &Key) -> Result<bool> {
        self.record(Command::Delete, Some(key))?;
        Ok(self.remove(key))
    }

    async fn unlink(&mut self, key: &Key) -> Result<bool> {
        self.record(Command::Unlink, Some(key))?;
        Ok(self.remove(key))
    }
}

// Glob style matching as SCAN MATCH does it: `*`, `?`, `[...]` and `\` escapes.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position to resume from after the last `*`.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(&pattern[p..], text[t]) {
                        if matched {
                            p += next;
                            t += 1;
                            continue;
                        }
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }

        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

// Match one byte against a `[...]` class at the start of pattern.
// Return whether it matched and the class length, None when unterminated.
fn match_class(pattern: &[u8], c: u8) -> Option<(bool, usize)> {
    let mut i = 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
