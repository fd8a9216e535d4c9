use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::backup::{RecordShape, DEFAULT_DELIMITER};
use crate::common::{Result, SweepError};
use crate::core::{DeleteMode, OnKeyError, Policy, Settings, Throttle};

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub sweep: SweepConfig,
}

impl Config {
    pub fn override_merge(&mut self, other: &mut Config) {
        self.store.override_merge(&mut other.store);
        self.sweep.override_merge(&mut other.sweep);
    }
}

// Where the store lives and how to log in.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    // store host.
    host: Option<String>,
    // store port.
    port: Option<u16>,
    // AUTH username, empty for the password only form.
    username: Option<String>,
    // AUTH password, empty skips AUTH.
    password: Option<String>,
    // logical database selected after connecting.
    db: Option<u32>,
    // pem file of trusted certificates. enables tls when set.
    tls_ca: Option<PathBuf>,
}

impl StoreConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 6379;
    pub const DEFAULT_DB: u32 = 0;

    pub fn set_host(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.host = Some(val)
        }
    }
    pub fn set_port(&mut self, val: Option<u16>) {
        if let Some(val) = val {
            self.port = Some(val)
        }
    }
    pub fn set_username(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.username = Some(val)
        }
    }
    pub fn set_password(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.password = Some(val)
        }
    }
    pub fn set_db(&mut self, val: Option<u32>) {
        if let Some(val) = val {
            self.db = Some(val)
        }
    }
    pub fn set_tls_ca(&mut self, val: &mut Option<PathBuf>) {
        if let Some(val) = val.take() {
            self.tls_ca = Some(val)
        }
    }
    pub fn override_merge(&mut self, other: &mut StoreConfig) {
        self.set_host(&mut other.host);
        self.set_port(other.port);
        self.set_username(&mut other.username);
        self.set_password(&mut other.password);
        self.set_db(other.db);
        self.set_tls_ca(&mut other.tls_ca);
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(StoreConfig::DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(StoreConfig::DEFAULT_PORT)
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    pub fn db(&self) -> u32 {
        self.db.unwrap_or(StoreConfig::DEFAULT_DB)
    }

    pub fn tls_ca(&self) -> Option<&PathBuf> {
        self.tls_ca.as_ref()
    }
}

// What the maintenance operations touch and how carefully.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SweepConfig {
    // backup file path.
    backup_path: Option<PathBuf>,
    // separator between key and value in the backup file.
    delimiter: Option<String>,
    // full (key and value) or key_only records.
    record_shape: Option<RecordShape>,
    // SCAN MATCH pattern.
    pattern: Option<String>,
    // SCAN COUNT hint.
    scan_count: Option<u64>,
    // ttl given by the expire operation.
    expire_after_seconds: Option<u64>,
    // deletions between two pauses of the sweep.
    throttle_every: Option<u64>,
    // length of each pause.
    throttle_pause_seconds: Option<u64>,
    // abort or skip when one key fails.
    on_key_error: Option<OnKeyError>,
    // unlink or del.
    delete_mode: Option<DeleteMode>,
}

impl SweepConfig {
    pub const DEFAULT_BACKUP_PATH: &'static str = Settings::DEFAULT_BACKUP_PATH;
    pub const DEFAULT_PATTERN: &'static str = Settings::DEFAULT_PATTERN;

    pub fn set_backup_path(&mut self, val: &mut Option<PathBuf>) {
        if let Some(val) = val.take() {
            self.backup_path = Some(val)
        }
    }
    pub fn set_delimiter(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.delimiter = Some(val)
        }
    }
    pub fn set_record_shape(&mut self, val: Option<RecordShape>) {
        if let Some(val) = val {
            self.record_shape = Some(val)
        }
    }
    pub fn set_pattern(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.pattern = Some(val)
        }
    }
    pub fn set_scan_count(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.scan_count = Some(std::cmp::max(val, 1))
        }
    }
    pub fn set_expire_after_seconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.expire_after_seconds = Some(std::cmp::max(val, 1))
        }
    }
    pub fn set_throttle_every(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.throttle_every = Some(val)
        }
    }
    pub fn set_throttle_pause_seconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.throttle_pause_seconds = Some(val)
        }
    }
    pub fn set_on_key_error(&mut self, val: Option<OnKeyError>) {
        if let Some(val) = val {
            self.on_key_error = Some(val)
        }
    }
    pub fn set_delete_mode(&mut self, val: Option<DeleteMode>) {
        if let Some(val) = val {
            self.delete_mode = Some(val)
        }
    }
    pub fn override_merge(&mut self, other: &mut SweepConfig) {
        self.set_backup_path(&mut other.backup_path);
        self.set_delimiter(&mut other.delimiter);
        self.set_record_shape(other.record_shape);
        self.set_pattern(&mut other.pattern);
        self.set_scan_count(other.scan_count);
        self.set_expire_after_seconds(other.expire_after_seconds);
        self.set_throttle_every(other.throttle_every);
        self.set_throttle_pause_seconds(other.throttle_pause_seconds);
        self.set_on_key_error(other.on_key_error);
        self.set_delete_mode(other.delete_mode);
    }

    /// Resolve defaults. An empty delimiter would make every record ambiguous.
    pub fn settings(&self) -> Result<Settings> {
        let delimiter = self
            .delimiter
            .clone()
            .unwrap_or_else(|| DEFAULT_DELIMITER.to_owned());
        if delimiter.is_empty() {
            return Err(SweepError::Config {
                description: "delimiter must not be empty".into(),
            });
        }
        if delimiter.contains('\n') || delimiter.contains('\r') {
            return Err(SweepError::Config {
                description: "delimiter must not contain a line break".into(),
            });
        }

        let defaults = Policy::default();
        let policy = Policy {
            expire_after: self
                .expire_after_seconds
                .map(Duration::from_secs)
                .unwrap_or(Policy::DEFAULT_EXPIRE_AFTER),
            on_key_error: self.on_key_error.unwrap_or(defaults.on_key_error),
            delete_mode: self.delete_mode.unwrap_or(defaults.delete_mode),
            throttle: Throttle {
                every: self.throttle_every.unwrap_or(Throttle::DEFAULT_EVERY),
                pause: self
                    .throttle_pause_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(Throttle::DEFAULT_PAUSE),
            },
        };

        Ok(Settings {
            policy,
            backup_path: self
                .backup_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(SweepConfig::DEFAULT_BACKUP_PATH)),
            delimiter,
            shape: self.record_shape.unwrap_or_default(),
            pattern: self
                .pattern
                .clone()
                .unwrap_or_else(|| SweepConfig::DEFAULT_PATTERN.to_owned()),
            scan_count: self.scan_count,
        })
    }
}
