use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Key, Result, Value};

#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod tcp;

/// Remaining time to live reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key exists and never expires.
    Persistent,
    /// Key exists and expires after the duration.
    Expires(Duration),
    /// Key does not exist.
    Missing,
}

impl Ttl {
    // TTL command reply: -1 no expiration, -2 missing, otherwise seconds.
    pub(crate) fn from_reply(n: i64) -> Ttl {
        match n {
            -1 => Ttl::Persistent,
            n if n >= 0 => Ttl::Expires(Duration::from_secs(n as u64)),
            _ => Ttl::Missing,
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ttl::Persistent => f.write_str("no expiration"),
            Ttl::Expires(d) => write!(f, "{}s", d.as_secs()),
            Ttl::Missing => f.write_str("missing"),
        }
    }
}

/// One SCAN reply. `cursor` 0 means the iteration is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<Key>,
    /// Raw names of keys that are not valid utf-8. They cannot be written to
    /// a backup file or addressed by the other operations.
    pub unreadable: Vec<Vec<u8>>,
}

/// Primitives the maintenance operations need from the store.
#[async_trait]
pub trait Store: Send {
    /// Return ping latency.
    async fn ping(&mut self) -> Result<chrono::Duration>;
    /// Cursor based scan. `count` is a batch size hint, None lets the store decide.
    async fn scan(&mut self, cursor: u64, pattern: &str, count: Option<u64>) -> Result<ScanPage>;
    async fn ttl(&mut self, key: &Key) -> Result<Ttl>;
    async fn get(&mut self, key: &Key) -> Result<Option<Value>>;
    /// Write the value without expiration, replacing any current value.
    async fn set(&mut self, key: &Key, value: &Value) -> Result<()>;
    /// Return false when the key does not exist.
    async fn expire(&mut self, key: &Key, ttl: Duration) -> Result<bool>;
    /// Blocking delete. Return false when the key does not exist.
    async fn delete(&mut self, key: &Key) -> Result<bool>;
    /// Non blocking delete. Return false when the key does not exist.
    async fn unlink(&mut self, key: &Key) -> Result<bool>;
}

#[async_trait]
impl<S> Store for Box<S>
where
    S: Store + ?Sized,
{
    async fn ping(&mut self) -> Result<chrono::Duration> {
        (**self).ping().await
    }
    async fn scan(&mut self, cursor: u64, pattern: &str, count: Option<u64>) -> Result<ScanPage> {
        (**self).scan(cursor, pattern, count).await
    }
    async fn ttl(&mut self, key: &Key) -> Result<Ttl> {
        (**self).ttl(key).await
    }
    async fn get(&mut self, key: &Key) -> Result<Option<Value>> {
        (**self).get(key).await
    }
    async fn set(&mut self, key: &Key, value: &Value) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn expire(&mut self, key: &Key, ttl: Duration) -> Result<bool> {
        (**self).expire(key, ttl).await
    }
    async fn delete(&mut self, key: &Key) -> Result<bool> {
        (**self).delete(key).await
    }
    async fn unlink(&mut self, key: &Key) -> Result<bool> {
        (**self).unlink(key).await
    }
}
