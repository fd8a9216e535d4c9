use std::path::PathBuf;

use crate::backup::{Codec, EncodeSummary, RecordShape, DEFAULT_DELIMITER};
use crate::client::Store;
use crate::common::{info, Result};
use crate::core::mutate::{self, MutationSummary};
use crate::core::policy::Policy;
use crate::core::scan::{scan_and_classify, KeyStream, Resolve};
use crate::core::KeySet;

/// Everything an operation needs besides the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub policy: Policy,
    pub backup_path: PathBuf,
    pub delimiter: String,
    pub shape: RecordShape,
    pub pattern: String,
    pub scan_count: Option<u64>,
}

impl Settings {
    pub const DEFAULT_BACKUP_PATH: &'static str = "./backup.txt";
    pub const DEFAULT_PATTERN: &'static str = "*";
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            backup_path: PathBuf::from(Settings::DEFAULT_BACKUP_PATH),
            delimiter: DEFAULT_DELIMITER.to_owned(),
            shape: RecordShape::Full,
            pattern: Settings::DEFAULT_PATTERN.to_owned(),
            scan_count: None,
        }
    }
}

/// The maintenance operations, bound to one store and one set of settings.
///
/// Every operation builds its key set from scratch and drops it on return.
pub struct Workflow<S> {
    store: S,
    settings: Settings,
}

impl<S> Workflow<S>
where
    S: Store,
{
    pub fn new(store: S, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn codec(&self, shape: RecordShape) -> Codec {
        Codec::new(self.settings.delimiter.clone(), shape)
    }

    pub async fn ping(&mut self) -> Result<chrono::Duration> {
        let latency = self.store.ping().await?;
        info!(latency_ms = latency.num_milliseconds(), "PONG");
        Ok(latency)
    }

    /// Scan for keys without ttl and replace the backup file with them.
    /// `printable_only` leaves out values that are not printable ascii.
    pub async fn backup(&mut self, printable_only: bool) -> Result<EncodeSummary> {
        let resolve = match self.settings.shape {
            RecordShape::Full => Resolve::Values,
            RecordShape::KeyOnly => Resolve::Keys,
        };
        let keys = scan_and_classify(
            &mut self.store,
            &self.settings.pattern,
            self.settings.scan_count,
            resolve,
        )
        .await?;

        let summary = self
            .codec(self.settings.shape)
            .printable_only(printable_only)
            .write_file(&keys, &self.settings.backup_path)
            .await?;

        info!(
            total = keys.len(),
            written = summary.written,
            "completed backup of keys without ttl"
        );
        Ok(summary)
    }

    async fn read_backup(&self, shape: RecordShape) -> Result<KeySet> {
        let decoded = self
            .codec(shape)
            .read_file(&self.settings.backup_path)
            .await?;
        Ok(decoded.entries)
    }

    /// Give every key in the backup file the default expiration.
    pub async fn expire(&mut self) -> Result<MutationSummary> {
        let keys = self.read_backup(self.settings.shape).await?;
        mutate::expire(&mut self.store, &keys, &self.settings.policy).await
    }

    /// Delete every key in the backup file.
    pub async fn delete(&mut self) -> Result<MutationSummary> {
        let keys = self.read_backup(self.settings.shape).await?;
        mutate::delete(&mut self.store, &keys, &self.settings.policy).await
    }

    /// Write every pair in the backup file back without expiration.
    pub async fn restore(&mut self) -> Result<MutationSummary> {
        // Restoring needs values whatever shape backups are written in.
        let keys = self.read_backup(RecordShape::Full).await?;
        mutate::restore(&mut self.store, &keys, &self.settings.policy).await
    }

    /// Delete keys without ttl straight from the scan, with throttling.
    pub async fn sweep(&mut self) -> Result<MutationSummary> {
        let stream = KeyStream::new(self.settings.pattern.clone(), Resolve::Keys)
            .with_count(self.settings.scan_count);
        mutate::delete_via_iterator(&mut self.store, stream, &self.settings.policy).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::memory::MemoryStore;
    use crate::client::Ttl;

    fn workflow(store: MemoryStore, dir: &tempfile::TempDir) -> Workflow<MemoryStore> {
        let settings = Settings {
            backup_path: dir.path().join("backup.txt"),
            ..Settings::default()
        };
        Workflow::new(store, settings)
    }

    #[test]
    fn backup_then_restore() {
        tokio_test::block_on(async move {
            let dir = tempfile::tempdir().unwrap();
            let mut store = MemoryStore::new();
            store.insert("a", "1", None);
            store.insert("b", "2", None);
            store.insert("c", "3", Some(Duration::from_secs(60)));

            let mut wf = workflow(store, &dir);
            let summary = wf.backup(true).await.unwrap();
            assert_eq!(summary.written, 2);

            let written = std::fs::read(dir.path().join("backup.txt")).unwrap();
            assert_eq!(written, b"a###1\nb###2\n");

            let mut restored = Workflow::new(MemoryStore::new(), wf.settings().clone());
            let summary = restored.restore().await.unwrap();
            assert_eq!(summary.succeeded, 2);

            let store = restored.store_mut();
            assert_eq!(store.remaining_ttl("a"), Ttl::Persistent);
            assert_eq!(store.remaining_ttl("b"), Ttl::Persistent);
            assert!(store.value("c").is_none());
        })
    }

    #[test]
    fn key_only_backup_drives_expire() {
        tokio_test::block_on(async move {
            let dir = tempfile::tempdir().unwrap();
            let mut store = MemoryStore::new();
            store.insert("a", [0xff_u8, 0x00], None);
            store.insert("b", "2", None);

            let settings = Settings {
                backup_path: dir.path().join("keys.txt"),
                shape: RecordShape::KeyOnly,
                ..Settings::default()
            };
            let mut wf = Workflow::new(store, settings);
            wf.backup(false).await.unwrap();
            assert_eq!(std::fs::read(dir.path().join("keys.txt")).unwrap(), b"a\nb\n");

            let summary = wf.expire().await.unwrap();
            assert_eq!(summary.succeeded, 2);
            assert_eq!(
                wf.store_mut().remaining_ttl("a"),
                Ttl::Expires(Policy::DEFAULT_EXPIRE_AFTER)
            );
        })
    }

    #[test]
    fn missing_backup_file_fails_operation() {
        tokio_test::block_on(async move {
            let dir = tempfile::tempdir().unwrap();
            let mut wf = workflow(MemoryStore::new(), &dir);

            let err = wf.delete().await.unwrap_err();
            assert!(matches!(err, crate::SweepError::BackupOpen { .. }));
            assert!(!err.is_fatal());
        })
    }
}
