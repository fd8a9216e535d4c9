use std::path::Path;

use tokio::fs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::backup::{Disposition, RecordShape, SkipReason, DEFAULT_DELIMITER, OTP_MARKER};
use crate::common::{debug, info, warn, Result, SweepError};
use crate::core::KeySet;
use crate::protocol::{Key, Value};

/// Encodes and decodes backup records.
#[derive(Debug, Clone)]
pub struct Codec {
    delimiter: Vec<u8>,
    shape: RecordShape,
    printable_only: bool,
}

/// Result of writing a backup.
#[derive(Debug, Default)]
pub struct EncodeSummary {
    pub written: usize,
    pub skipped: Vec<(Key, SkipReason)>,
}

/// Result of reading a backup.
#[derive(Debug, Default)]
pub struct Decoded {
    pub entries: KeySet,
    // (1 based line number, reason)
    pub skipped: Vec<(usize, SkipReason)>,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(DEFAULT_DELIMITER, RecordShape::Full)
    }
}

impl Codec {
    pub fn new(delimiter: impl Into<String>, shape: RecordShape) -> Self {
        Self {
            delimiter: delimiter.into().into_bytes(),
            shape,
            printable_only: false,
        }
    }

    /// Leave out values that are not printable ascii when writing.
    pub fn printable_only(mut self, printable_only: bool) -> Self {
        self.printable_only = printable_only;
        self
    }

    pub fn shape(&self) -> RecordShape {
        self.shape
    }

    /// Decide whether the entry can be written so that it reads back unchanged.
    pub fn disposition(&self, key: &Key, value: Option<&Value>) -> Disposition {
        if let Some(value) = value {
            if self.printable_only && !value.is_ascii_printable() {
                return Disposition::Skipped(SkipReason::NotPrintable);
            }
        }

        let value = match self.shape {
            RecordShape::Full => match value {
                Some(value) => Some(value),
                None => return Disposition::Skipped(SkipReason::MissingValue),
            },
            RecordShape::KeyOnly => None,
        };

        let fields = std::iter::once(key.as_bytes()).chain(value.map(|v| &v[..]));
        for field in fields {
            if field.is_empty() {
                return Disposition::Skipped(SkipReason::EmptySegment);
            }
            if field.iter().any(|&b| b == b'\n' || b == b'\r') {
                return Disposition::Skipped(SkipReason::ContainsLineBreak);
            }
            if contains(field, &self.delimiter) {
                return Disposition::Skipped(SkipReason::ContainsDelimiter);
            }
        }

        // A key ending or a value starting with part of the delimiter moves
        // the split point of the joined record, e.g. `user#` + `###` + `1`.
        if let Some(value) = value {
            let mut record = Vec::with_capacity(key.len() + self.delimiter.len() + value.len());
            record.extend_from_slice(key.as_bytes());
            record.extend_from_slice(&self.delimiter);
            record.extend_from_slice(value);
            if split(&record, &self.delimiter) != [key.as_bytes(), &value[..]] {
                return Disposition::Skipped(SkipReason::ContainsDelimiter);
            }
        }

        Disposition::Included
    }

    // Append one record, including the trailing newline, to dst.
    // The caller checked disposition() first.
    fn encode_record(&self, key: &Key, value: Option<&Value>, dst: &mut Vec<u8>) {
        dst.extend_from_slice(key.as_bytes());
        if let (RecordShape::Full, Some(value)) = (self.shape, value) {
            dst.extend_from_slice(&self.delimiter);
            dst.extend_from_slice(value);
        }
        dst.push(b'\n');
    }

    /// Write every includable entry to writer.
    /// flush is left to the caller.
    pub async fn encode_to<W>(&self, entries: &KeySet, mut writer: W) -> Result<EncodeSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let mut summary = EncodeSummary::default();
        let mut buf = Vec::with_capacity(256);

        for (key, value) in entries {
            match self.disposition(key, value.as_ref()) {
                Disposition::Included => {
                    buf.clear();
                    self.encode_record(key, value.as_ref(), &mut buf);
                    writer.write_all(&buf).await?;
                    summary.written += 1;
                }
                Disposition::Skipped(reason) => {
                    warn!(%key, %reason, "skip backup entry");
                    summary.skipped.push((key.clone(), reason));
                }
            }
        }

        Ok(summary)
    }

    /// Replace the file at path with the encoded entries.
    pub async fn write_file(
        &self,
        entries: &KeySet,
        path: impl AsRef<Path>,
    ) -> Result<EncodeSummary> {
        let path = path.as_ref();

        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|source| SweepError::BackupOpen {
                path: path.to_path_buf(),
                source,
            })?;

        let mut writer = BufWriter::new(file);
        let summary = self.encode_to(entries, &mut writer).await?;

        let finalize = |source| SweepError::BackupFinalize {
            path: path.to_path_buf(),
            source,
        };
        writer.flush().await.map_err(finalize)?;
        writer.get_ref().sync_all().await.map_err(finalize)?;

        info!(
            path = %path.display(),
            written = summary.written,
            skipped = summary.skipped.len(),
            "backup written"
        );

        Ok(summary)
    }

    /// Parse one line without its line terminator.
    pub fn decode_line(&self, line: &[u8]) -> Result<(Key, Option<Value>), SkipReason> {
        if contains(line, OTP_MARKER) {
            return Err(SkipReason::ContainsOtp);
        }

        let segments = split(line, &self.delimiter);
        let (key, value) = match (self.shape, segments.as_slice()) {
            (RecordShape::Full, [key, value]) => (*key, Some(*value)),
            (RecordShape::KeyOnly, [key]) => (*key, None),
            (_, segments) => {
                return Err(SkipReason::Malformed {
                    segments: segments.len(),
                })
            }
        };

        if key.is_empty() || value.map_or(false, |v| v.is_empty()) {
            return Err(SkipReason::EmptySegment);
        }

        let key = std::str::from_utf8(key)
            .ok()
            .and_then(|key| Key::new(key).ok())
            .ok_or(SkipReason::InvalidKey)?;
        let value = value.map(|v| Value::new_unchecked(v));

        Ok((key, value))
    }

    /// Read records until EOF. A missing final newline is fine.
    pub async fn decode_from<R>(&self, mut reader: R) -> Result<Decoded>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut decoded = Decoded::default();
        let mut line = Vec::with_capacity(256);
        let mut line_number = 0;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            line_number += 1;

            let mut record = line.as_slice();
            if let Some(stripped) = record.strip_suffix(b"\n") {
                record = stripped;
            }
            if let Some(stripped) = record.strip_suffix(b"\r") {
                record = stripped;
            }
            if record.is_empty() {
                continue;
            }

            match self.decode_line(record) {
                Ok((key, value)) => {
                    debug!(%key, line = line_number, "read backup entry");
                    decoded.entries.insert(key, value);
                }
                Err(reason) => {
                    warn!(line = line_number, %reason, "skip backup line");
                    decoded.skipped.push((line_number, reason));
                }
            }
        }

        Ok(decoded)
    }

    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<Decoded> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .await
            .map_err(|source| SweepError::BackupOpen {
                path: path.to_path_buf(),
                source,
            })?;

        let decoded = self.decode_from(BufReader::new(file)).await?;

        info!(
            path = %path.display(),
            entries = decoded.entries.len(),
            skipped = decoded.skipped.len(),
            "backup read"
        );

        Ok(decoded)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn split<'a>(line: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while !delimiter.is_empty() && i + delimiter.len() <= line.len() {
        if &line[i..i + delimiter.len()] == delimiter {
            segments.push(&line[start..i]);
            i += delimiter.len();
            start = i;
        } else {
            i += 1;
        }
    }
    segments.push(&line[start..]);
    segments
}
