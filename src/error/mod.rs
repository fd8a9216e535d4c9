pub(crate) mod internal;

use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum SweepError {
    Io(io::Error),
    // Socket or framing failure while talking to the store.
    Internal(internal::Error),
    // The store rejected AUTH.
    Unauthenticated,
    // The store answered with an error reply.
    Store {
        command: &'static str,
        message: String,
    },
    // The store answered with a frame the command does not expect.
    UnexpectedResponse {
        command: &'static str,
        response: String,
    },
    // The store closed the connection.
    ConnectionClosed,
    // Key exceeds the maximum number of bytes.
    MaxKeyBytes {
        key: String,
        max_bytes: usize,
    },
    // Value exceeds the maximum number of bytes.
    MaxValueBytes {
        max_bytes: usize,
    },
    // Backup file could not be opened.
    BackupOpen {
        path: PathBuf,
        source: io::Error,
    },
    // Backup file could not be flushed or synced after writing.
    BackupFinalize {
        path: PathBuf,
        source: io::Error,
    },
    // SCAN failed mid walk. No partial result is returned.
    ScanAborted {
        cursor: u64,
        source: Box<SweepError>,
    },
    // Restore found a key without a value to write.
    MissingValue {
        key: String,
    },
    // A per key mutation failed under the abort policy.
    KeyOperationAborted {
        operation: &'static str,
        key: String,
        source: Box<SweepError>,
    },
    Config {
        description: String,
    },
    Tls {
        description: String,
    },
}

impl SweepError {
    /// Errors after which continuing the session would be unsafe.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SweepError::KeyOperationAborted { .. } | SweepError::BackupFinalize { .. }
        )
    }
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SweepError::Io(err) => err.fmt(f),
            SweepError::Internal(err) => err.fmt(f),
            SweepError::Unauthenticated => f.write_str("unauthenticated"),
            SweepError::Store { command, message } => {
                write!(f, "{} failed: {}", command, message)
            }
            SweepError::UnexpectedResponse { command, response } => {
                write!(f, "unexpected response to {}: {}", command, response)
            }
            SweepError::ConnectionClosed => f.write_str("connection closed by store"),
            SweepError::MaxKeyBytes { key, max_bytes } => {
                write!(f, "max key bytes({}) exceeded. key: {:30}", max_bytes, key)
            }
            SweepError::MaxValueBytes { max_bytes } => {
                write!(f, "value exceeds maximum bytes({})", max_bytes)
            }
            SweepError::BackupOpen { path, source } => {
                write!(f, "open backup file {}: {}", path.display(), source)
            }
            SweepError::BackupFinalize { path, source } => {
                write!(f, "finalize backup file {}: {}", path.display(), source)
            }
            SweepError::ScanAborted { cursor, source } => {
                write!(f, "scan aborted at cursor {}: {}", cursor, source)
            }
            SweepError::MissingValue { key } => write!(f, "no value to restore for key {}", key),
            SweepError::KeyOperationAborted {
                operation,
                key,
                source,
            } => write!(f, "{} aborted at key {}: {}", operation, key, source),
            SweepError::Config { description } => write!(f, "config error. {}", description),
            SweepError::Tls { description } => write!(f, "tls error. {}", description),
        }
    }
}

impl error::Error for SweepError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            SweepError::Io(err) => Some(err),
            SweepError::Internal(err) => Some(err),
            SweepError::BackupOpen { source, .. } => Some(source),
            SweepError::BackupFinalize { source, .. } => Some(source),
            SweepError::ScanAborted { source, .. } => Some(source.as_ref()),
            SweepError::KeyOperationAborted { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for SweepError {
    fn from(err: io::Error) -> Self {
        SweepError::Io(err)
    }
}

impl From<internal::Error> for SweepError {
    fn from(err: internal::Error) -> Self {
        SweepError::Internal(err)
    }
}

impl From<internal::ErrorKind> for SweepError {
    fn from(kind: internal::ErrorKind) -> Self {
        SweepError::Internal(internal::Error::from(kind))
    }
}

impl From<serde_yaml::Error> for SweepError {
    fn from(err: serde_yaml::Error) -> Self {
        SweepError::Config {
            description: err.to_string(),
        }
    }
}

impl From<tokio_rustls::rustls::Error> for SweepError {
    fn from(err: tokio_rustls::rustls::Error) -> Self {
        SweepError::Tls {
            description: err.to_string(),
        }
    }
}
