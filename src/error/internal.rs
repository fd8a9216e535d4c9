use std::error;
use std::fmt;
use std::io;

use backtrace::Backtrace;

// Failures below the store client: socket io and RESP framing.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    backtrace: Option<Backtrace>,
}

#[derive(Debug)]
pub enum ErrorKind {
    Io(io::Error),
    // Peer closed the connection in the middle of a frame.
    ConnectionResetByPeer,
    // Bytes on the wire do not form a RESP frame.
    NetworkFraming(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ErrorKind::Io(err) => err.fmt(f),
            ErrorKind::ConnectionResetByPeer => f.write_str("connection reset by peer"),
            ErrorKind::NetworkFraming(description) => {
                write!(f, "network framing error. {}", description)
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::from(ErrorKind::Io(err))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::with_backtrace(kind)
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_eof(&self) -> bool {
        match self.kind() {
            ErrorKind::Io(err) => err.kind().eq(&io::ErrorKind::UnexpectedEof),
            ErrorKind::ConnectionResetByPeer => true,
            _ => false,
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_ref()
    }

    fn with_backtrace(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Some(Backtrace::new()),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}
