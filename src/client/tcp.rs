use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{self, pki_types::ServerName};
use tokio_rustls::TlsConnector;

use crate::client::{ScanPage, Store, Ttl};
use crate::common::{debug, SweepError};
use crate::protocol::connection::Connection;
use crate::protocol::frame::Frame;
use crate::{Key, Result, Value};

/// RESP client speaking to a redis compatible store.
pub struct Client<T = TcpStream> {
    connection: Connection<T>,
}

impl Client<TcpStream> {
    pub async fn from_addr(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Client::new(TcpStream::connect(addr).await?))
    }
}

impl Client<TlsStream<TcpStream>> {
    /// Connect over tls, trusting the certificates in the given pem file.
    pub async fn tls_from_addr(
        host: impl Into<String>,
        port: u16,
        ca_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let host = host.into();

        let mut roots = rustls::RootCertStore::empty();
        let mut reader = BufReader::new(std::fs::File::open(ca_path.as_ref())?);
        for cert in rustls_pemfile::certs(&mut reader) {
            roots.add(cert?)?;
        }

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));

        let domain = ServerName::try_from(host.as_str())
            .map(|name| name.to_owned())
            .map_err(|e| SweepError::Tls {
                description: format!("invalid server name {}: {}", host, e),
            })?;

        let stream = TcpStream::connect((host.as_str(), port)).await?;
        let stream = connector.connect(domain, stream).await?;

        Ok(Client::new(stream))
    }
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: T) -> Self {
        Self {
            connection: Connection::new(stream, Some(1024 * 4)),
        }
    }

    /// Send AUTH. An empty username uses the password only form.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let mut args = Vec::with_capacity(2);
        if !username.is_empty() {
            args.push(username.as_bytes().to_vec());
        }
        args.push(password.as_bytes().to_vec());

        match self.request("AUTH", args).await {
            Ok(frame) => expect_ok("AUTH", frame),
            Err(SweepError::Store { message, .. }) => {
                debug!("auth rejected: {}", message);
                Err(SweepError::Unauthenticated)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn select(&mut self, db: u32) -> Result<()> {
        let frame = self
            .request("SELECT", vec![db.to_string().into_bytes()])
            .await?;
        expect_ok("SELECT", frame)
    }

    async fn request(&mut self, command: &'static str, args: Vec<Vec<u8>>) -> Result<Frame> {
        let mut parts = Vec::with_capacity(args.len() + 1);
        parts.push(command.as_bytes().to_vec());
        parts.extend(args);

        self.connection.write_frame(&Frame::command(parts)).await?;

        match self.connection.read_frame().await? {
            Some(Frame::Error(message)) => Err(SweepError::Store { command, message }),
            Some(frame) => Ok(frame),
            None => Err(SweepError::ConnectionClosed),
        }
    }

    async fn request_integer(&mut self, command: &'static str, args: Vec<Vec<u8>>) -> Result<i64> {
        match self.request(command, args).await? {
            Frame::Integer(n) => Ok(n),
            frame => Err(unexpected(command, frame)),
        }
    }
}

#[async_trait]
impl<T> Store for Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn ping(&mut self) -> Result<chrono::Duration> {
        let start = Utc::now();
        match self.request("PING", Vec::new()).await? {
            Frame::Simple(pong) if pong == "PONG" => Ok(Utc::now() - start),
            frame => Err(unexpected("PING", frame)),
        }
    }

    async fn scan(&mut self, cursor: u64, pattern: &str, count: Option<u64>) -> Result<ScanPage> {
        let mut args = vec![
            cursor.to_string().into_bytes(),
            b"MATCH".to_vec(),
            pattern.as_bytes().to_vec(),
        ];
        if let Some(count) = count {
            args.push(b"COUNT".to_vec());
            args.push(count.to_string().into_bytes());
        }

        let frame = self.request("SCAN", args).await?;
        let (next, keys) = match frame {
            Frame::Array(mut frames) if frames.len() == 2 => {
                let keys = frames.pop();
                let next = frames.pop();
                match (next, keys) {
                    (Some(Frame::Bulk(next)), Some(Frame::Array(keys))) => (next, keys),
                    (next, keys) => {
                        return Err(SweepError::UnexpectedResponse {
                            command: "SCAN",
                            response: format!("cursor {:?} keys {:?}", next, keys),
                        })
                    }
                }
            }
            frame => return Err(unexpected("SCAN", frame)),
        };

        let cursor = std::str::from_utf8(&next)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| SweepError::UnexpectedResponse {
                command: "SCAN",
                response: format!("cursor {}", String::from_utf8_lossy(&next)),
            })?;

        let mut page = ScanPage {
            cursor,
            keys: Vec::with_capacity(keys.len()),
            unreadable: Vec::new(),
        };
        for frame in keys {
            match frame {
                Frame::Bulk(raw) => match Key::from_store(raw) {
                    Ok(key) => page.keys.push(key),
                    Err(raw) => page.unreadable.push(raw),
                },
                frame => return Err(unexpected("SCAN", frame)),
            }
        }

        Ok(page)
    }

    async fn ttl(&mut self, key: &Key) -> Result<Ttl> {
        let n = self
            .request_integer("TTL", vec![key.as_bytes().to_vec()])
            .await?;
        Ok(Ttl::from_reply(n))
    }

    async fn get(&mut self, key: &Key) -> Result<Option<Value>> {
        match self.request("GET", vec![key.as_bytes().to_vec()]).await? {
            Frame::Bulk(value) => Ok(Some(Value::new_unchecked(value))),
            Frame::Null => Ok(None),
            frame => Err(unexpected("GET", frame)),
        }
    }

    async fn set(&mut self, key: &Key, value: &Value) -> Result<()> {
        let frame = self
            .request("SET", vec![key.as_bytes().to_vec(), value.to_vec()])
            .await?;
        expect_ok("SET", frame)
    }

    async fn expire(&mut self, key: &Key, ttl: Duration) -> Result<bool> {
        let n = self
            .request_integer(
                "EXPIRE",
                vec![
                    key.as_bytes().to_vec(),
                    ttl.as_secs().to_string().into_bytes(),
                ],
            )
            .await?;
        Ok(n == 1)
    }

    async fn delete(&mut self, key: &Key) -> Result<bool> {
        let n = self
            .request_integer("DEL", vec![key.as_bytes().to_vec()])
            .await?;
        Ok(n > 0)
    }

    async fn unlink(&mut self, key: &Key) -> Result<bool> {
        let n = self
            .request_integer("UNLINK", vec![key.as_bytes().to_vec()])
            .await?;
        Ok(n > 0)
    }
}

fn expect_ok(command: &'static str, frame: Frame) -> Result<()> {
    match frame {
        Frame::Simple(s) if s == "OK" => Ok(()),
        frame => Err(unexpected(command, frame)),
    }
}

fn unexpected(command: &'static str, frame: Frame) -> SweepError {
    SweepError::UnexpectedResponse {
        command,
        response: frame.to_string(),
    }
}
