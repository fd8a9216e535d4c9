use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::common::{self, ErrorKind};

pub(crate) const DELIMITER: &[u8] = b"\r\n";

// RESP2 frames.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Null,
    Array(Vec<Frame>),
}

pub(crate) mod frameprefix {
    pub(crate) const SIMPLE: u8 = b'+';
    pub(crate) const ERROR: u8 = b'-';
    pub(crate) const INTEGER: u8 = b':';
    pub(crate) const BULK: u8 = b'$';
    pub(crate) const ARRAY: u8 = b'*';
}

#[derive(Debug)]
pub(crate) enum Error {
    /// Not enough data is available to decode a frame from buffer.
    Incomplete,
    Invalid(String),
}

impl From<Error> for common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Incomplete => ErrorKind::ConnectionResetByPeer.into(),
            Error::Invalid(description) => ErrorKind::NetworkFraming(description).into(),
        }
    }
}

type ByteCursor<'a> = std::io::Cursor<&'a [u8]>;

impl Frame {
    // Commands are sent as an array of bulk strings.
    pub(crate) fn command<I, T>(parts: I) -> Frame
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        Frame::Array(parts.into_iter().map(|p| Frame::Bulk(p.into())).collect())
    }

    pub(crate) fn check(src: &mut ByteCursor) -> Result<(), Error> {
        match cursor::get_u8(src)? {
            frameprefix::SIMPLE | frameprefix::ERROR | frameprefix::INTEGER => {
                cursor::get_line(src)?;
                Ok(())
            }
            frameprefix::BULK => match cursor::get_decimal(src)? {
                -1 => Ok(()),
                len if len >= 0 => {
                    // skip bytes length + delimiter
                    cursor::skip(src, len as usize + DELIMITER.len())
                }
                len => Err(Error::Invalid(format!("invalid bulk length {}", len))),
            },
            frameprefix::ARRAY => match cursor::get_decimal(src)? {
                -1 => Ok(()),
                len if len >= 0 => {
                    for _ in 0..len {
                        Frame::check(src)?;
                    }
                    Ok(())
                }
                len => Err(Error::Invalid(format!("invalid array length {}", len))),
            },
            prefix => Err(Error::Invalid(format!("unknown frame prefix {:#04x}", prefix))),
        }
    }

    // Assume check() already succeeded on the same bytes.
    pub(crate) fn parse(src: &mut ByteCursor) -> Result<Frame, Error> {
        match cursor::get_u8(src)? {
            frameprefix::SIMPLE => Ok(Frame::Simple(cursor::get_string(src)?)),
            frameprefix::ERROR => Ok(Frame::Error(cursor::get_string(src)?)),
            frameprefix::INTEGER => Ok(Frame::Integer(cursor::get_decimal(src)?)),
            frameprefix::BULK => match cursor::get_decimal(src)? {
                -1 => Ok(Frame::Null),
                len => {
                    let len = len as usize;
                    let n = len + DELIMITER.len();
                    if src.remaining() < n {
                        return Err(Error::Incomplete);
                    }
                    let value = Vec::from(&src.chunk()[..len]);

                    cursor::skip(src, n)?;

                    Ok(Frame::Bulk(value))
                }
            },
            frameprefix::ARRAY => match cursor::get_decimal(src)? {
                -1 => Ok(Frame::Null),
                len => {
                    let mut frames = Vec::with_capacity(len as usize);
                    for _ in 0..len {
                        frames.push(Frame::parse(src)?);
                    }
                    Ok(Frame::Array(frames))
                }
            },
            prefix => Err(Error::Invalid(format!("unknown frame prefix {:#04x}", prefix))),
        }
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(frameprefix::SIMPLE);
                dst.put_slice(s.as_bytes());
                dst.put_slice(DELIMITER);
            }
            Frame::Error(s) => {
                dst.put_u8(frameprefix::ERROR);
                dst.put_slice(s.as_bytes());
                dst.put_slice(DELIMITER);
            }
            Frame::Integer(n) => {
                dst.put_u8(frameprefix::INTEGER);
                dst.put_slice(n.to_string().as_bytes());
                dst.put_slice(DELIMITER);
            }
            Frame::Bulk(val) => {
                dst.put_u8(frameprefix::BULK);
                dst.put_slice(val.len().to_string().as_bytes());
                dst.put_slice(DELIMITER);
                dst.put_slice(val);
                dst.put_slice(DELIMITER);
            }
            Frame::Null => {
                dst.put_slice(b"$-1");
                dst.put_slice(DELIMITER);
            }
            Frame::Array(frames) => {
                dst.put_u8(frameprefix::ARRAY);
                dst.put_slice(frames.len().to_string().as_bytes());
                dst.put_slice(DELIMITER);
                for frame in frames {
                    frame.encode(dst);
                }
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(n) => write!(f, ":{}", n),
            Frame::Bulk(val) => write!(f, "${:?}", String::from_utf8_lossy(val)),
            Frame::Null => f.write_str("(nil)"),
            Frame::Array(frames) => {
                f.write_str("[")?;
                for (i, frame) in frames.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    frame.fmt(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

// cursor utilities.
mod cursor {
    use super::*;

    pub(super) fn get_u8(src: &mut ByteCursor) -> Result<u8, Error> {
        if !src.has_remaining() {
            return Err(Error::Incomplete);
        }
        Ok(src.get_u8())
    }

    pub(super) fn skip(src: &mut ByteCursor, n: usize) -> Result<(), Error> {
        if src.remaining() < n {
            return Err(Error::Incomplete);
        }
        src.advance(n);
        Ok(())
    }

    pub(super) fn get_decimal(src: &mut ByteCursor) -> Result<i64, Error> {
        let line = get_line(src)?;

        let (negative, digits) = match line.split_first() {
            Some((b'-', rest)) => (true, rest),
            _ => (false, line),
        };

        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(Error::Invalid("invalid protocol decimal format".into()));
        }

        atoi::atoi::<i64>(digits)
            .map(|n| if negative { -n } else { n })
            .ok_or_else(|| Error::Invalid("invalid protocol decimal format".into()))
    }

    pub(super) fn get_string(src: &mut ByteCursor) -> Result<String, Error> {
        let line = get_line(src)?.to_vec();
        String::from_utf8(line).map_err(|e| Error::Invalid(e.to_string()))
    }

    pub(super) fn get_line<'a>(src: &'a mut ByteCursor) -> Result<&'a [u8], Error> {
        let start = src.position() as usize;
        let len = src.get_ref().len();
        if len < 2 {
            return Err(Error::Incomplete);
        }
        let end = len - 1;

        for i in start..end {
            if src.get_ref()[i] == DELIMITER[0] && src.get_ref()[i + 1] == DELIMITER[1] {
                src.set_position((i + 2) as u64);

                return Ok(&src.get_ref()[start..i]);
            }
        }

        Err(Error::Incomplete)
    }
}
