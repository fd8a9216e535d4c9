use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::backup::RecordShape;
use crate::cli::{backup, delete, expire, menu, ping, restore, sweep, Outcome};
use crate::common::debug;
use crate::config::{Config, Initializer};
use crate::core::{DeleteMode, OnKeyError};
use crate::Result;

/// Find, back up, expire, delete and restore keys without ttl
#[derive(Parser, Debug)]
#[command(version, propagate_version = true, subcommand_required = true)]
pub struct SweepCommand {
    /// Store and operation options
    #[command(flatten)]
    pub options: Options,
    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Options, overriding the configuration file
#[derive(Args, Debug, Default)]
pub struct Options {
    /// Configuration file path
    #[arg(long, short = 'C', env = "TTLSWEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Store host
    #[arg(long, env = "TTLSWEEP_HOST", global = true)]
    pub host: Option<String>,
    /// Store port
    #[arg(long, env = "TTLSWEEP_PORT", global = true)]
    pub port: Option<u16>,
    /// AUTH username
    #[arg(long, env = "TTLSWEEP_USERNAME", global = true)]
    pub username: Option<String>,
    /// AUTH password, AUTH is skipped when empty
    #[arg(long, env = "TTLSWEEP_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,
    /// Logical database
    #[arg(long, env = "TTLSWEEP_DB", global = true)]
    pub db: Option<u32>,
    /// Pem file of trusted certificates, connects over tls when given
    #[arg(long, env = "TTLSWEEP_TLS_CA", global = true)]
    pub tls_ca: Option<PathBuf>,
    /// Backup file path
    #[arg(long, env = "TTLSWEEP_BACKUP_PATH", global = true)]
    pub backup_path: Option<PathBuf>,
    /// Separator between key and value in the backup file
    #[arg(long, env = "TTLSWEEP_DELIMITER", global = true)]
    pub delimiter: Option<String>,
    /// Backup record layout
    #[arg(long, value_enum, env = "TTLSWEEP_RECORD_SHAPE", global = true)]
    pub record_shape: Option<RecordShape>,
    /// SCAN MATCH pattern
    #[arg(long, env = "TTLSWEEP_PATTERN", global = true)]
    pub pattern: Option<String>,
    /// SCAN COUNT hint
    #[arg(long, env = "TTLSWEEP_SCAN_COUNT", global = true)]
    pub scan_count: Option<u64>,
    /// Ttl set by expire
    #[arg(long, env = "TTLSWEEP_EXPIRE_AFTER_SECONDS", global = true)]
    pub expire_after_seconds: Option<u64>,
    /// Deletions between two pauses of sweep, 0 never pauses
    #[arg(long, env = "TTLSWEEP_THROTTLE_EVERY", global = true)]
    pub throttle_every: Option<u64>,
    /// Pause length of sweep
    #[arg(long, env = "TTLSWEEP_THROTTLE_PAUSE_SECONDS", global = true)]
    pub throttle_pause_seconds: Option<u64>,
    /// What to do when one key fails
    #[arg(long, value_enum, env = "TTLSWEEP_ON_KEY_ERROR", global = true)]
    pub on_key_error: Option<OnKeyError>,
    /// Command used to remove keys
    #[arg(long, value_enum, env = "TTLSWEEP_DELETE_MODE", global = true)]
    pub delete_mode: Option<DeleteMode>,
}

impl Options {
    /// Load the configuration file if any and apply the options on top of it.
    pub async fn initialize(self) -> Result<Initializer> {
        let Options {
            config,
            mut host,
            port,
            mut username,
            mut password,
            db,
            mut tls_ca,
            mut backup_path,
            mut delimiter,
            record_shape,
            mut pattern,
            scan_count,
            expire_after_seconds,
            throttle_every,
            throttle_pause_seconds,
            on_key_error,
            delete_mode,
        } = self;

        let mut initializer = match config {
            Some(path) => Initializer::load_config_file(path).await?,
            None => Initializer::default(),
        };

        let mut config = {
            let mut config = Config::default();

            config.store.set_host(&mut host);
            config.store.set_port(port);
            config.store.set_username(&mut username);
            config.store.set_password(&mut password);
            config.store.set_db(db);
            config.store.set_tls_ca(&mut tls_ca);

            config.sweep.set_backup_path(&mut backup_path);
            config.sweep.set_delimiter(&mut delimiter);
            config.sweep.set_record_shape(record_shape);
            config.sweep.set_pattern(&mut pattern);
            config.sweep.set_scan_count(scan_count);
            config.sweep.set_expire_after_seconds(expire_after_seconds);
            config.sweep.set_throttle_every(throttle_every);
            config.sweep.set_throttle_pause_seconds(throttle_pause_seconds);
            config.sweep.set_on_key_error(on_key_error);
            config.sweep.set_delete_mode(delete_mode);
            config
        };

        initializer.config.override_merge(&mut config);

        debug!(
            host = initializer.config.store.host(),
            port = initializer.config.store.port(),
            "{:?}",
            initializer.config.sweep
        );

        Ok(initializer)
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ping the store
    Ping(ping::PingCommand),
    /// Back up keys without ttl
    Backup(backup::BackupCommand),
    /// Set the expiration on every backed up key
    Expire(expire::ExpireCommand),
    /// Delete every backed up key
    Delete(delete::DeleteCommand),
    /// Write backed up pairs back without expiration
    Restore(restore::RestoreCommand),
    /// Delete keys without ttl while scanning
    Sweep(sweep::SweepKeysCommand),
    /// Interactive menu
    Menu(menu::MenuCommand),
}

impl Command {
    pub async fn run(self, options: Options) -> Result<Outcome> {
        let mut workflow = options.initialize().await?.workflow().await?;

        match self {
            Command::Ping(ping) => ping.run(&mut workflow).await,
            Command::Backup(backup) => backup.run(&mut workflow).await,
            Command::Expire(expire) => expire.run(&mut workflow).await,
            Command::Delete(delete) => delete.run(&mut workflow).await,
            Command::Restore(restore) => restore.run(&mut workflow).await,
            Command::Sweep(sweep) => sweep.run(&mut workflow).await,
            Command::Menu(menu) => menu.run(&mut workflow).await,
        }
    }
}

/// Parse command line args
pub fn parse() -> SweepCommand {
    SweepCommand::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let SweepCommand { options, command } = SweepCommand::parse_from([
            "ttlsweep",
            "--port",
            "6380",
            "--record-shape",
            "key-only",
            "--on-key-error",
            "abort",
            "backup",
            "--no-filter",
        ]);
        assert!(matches!(command, Command::Backup(_)));

        let initializer = tokio_test::block_on(options.initialize()).unwrap();
        let config = initializer.config;
        assert_eq!(config.store.port(), 6380);
        assert_eq!(config.store.host(), "localhost");

        let settings = config.sweep.settings().unwrap();
        assert_eq!(settings.shape, RecordShape::KeyOnly);
        assert_eq!(settings.policy.on_key_error, OnKeyError::Abort);
        assert_eq!(settings.policy.delete_mode, DeleteMode::Unlink);
    }

    #[test]
    fn config_file_below_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "store:\n  host: cache\n  port: 7000\nsweep:\n  pattern: \"tmp:*\"\n")
            .unwrap();

        let options = Options {
            config: Some(path),
            port: Some(7001),
            ..Options::default()
        };
        let config = tokio_test::block_on(options.initialize()).unwrap().config;

        assert_eq!(config.store.host(), "cache");
        assert_eq!(config.store.port(), 7001);
        assert_eq!(config.sweep.settings().unwrap().pattern, "tmp:*");
    }
}
