use std::io::Cursor;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::common::{trace, ErrorKind, Result};
use crate::protocol::frame::{self, Frame};

pub(crate) struct Connection<T = TcpStream> {
    stream: BufWriter<T>,
    // The buffer for reading frames.
    buffer: BytesMut,
    // The buffer for encoding frames.
    write_buffer: BytesMut,
}

impl<T> Connection<T>
where
    T: AsyncWrite + AsyncRead + Unpin,
{
    pub(crate) fn new(stream: T, buffer_size: Option<usize>) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(buffer_size.unwrap_or(4 * 1024)),
            write_buffer: BytesMut::with_capacity(1024),
        }
    }

    pub(crate) async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_buffer.clear();
        frame.encode(&mut self.write_buffer);

        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    // Ok(None) means the peer closed the connection cleanly between frames.
    pub(crate) async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                trace!(%frame, "read frame");
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(crate::common::Error::from(ErrorKind::ConnectionResetByPeer).into())
                };
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Frame>> {
        use frame::Error::Incomplete;

        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(_) => {
                let len = buf.position() as usize;
                buf.set_position(0);
                let frame = Frame::parse(&mut buf).map_err(crate::common::Error::from)?;
                self.buffer.advance(len);

                Ok(Some(frame))
            }
            Err(Incomplete) => Ok(None),
            Err(e) => Err(crate::common::Error::from(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_over_duplex() {
        tokio_test::block_on(async move {
            let (client, server) = tokio::io::duplex(64);
            let mut client_conn = Connection::new(client, None);
            let mut server_conn = Connection::new(server, Some(16));

            let frames: Vec<Frame> = vec![
                Frame::command(vec!["SCAN", "0", "MATCH", "*"]),
                Frame::Simple("OK".into()),
                Frame::Error("ERR unknown command".into()),
                Frame::Integer(-2),
                Frame::Null,
                Frame::Bulk(vec![0xff; 200]),
                Frame::Array(vec![
                    Frame::Bulk(b"0".to_vec()),
                    Frame::Array(vec![Frame::Bulk(b"key".to_vec())]),
                ]),
            ];
            let frames_clone = frames.clone();

            let write_handle = tokio::spawn(async move {
                for frame in frames {
                    client_conn.write_frame(&frame).await.unwrap();
                }
            });

            let read_handle = tokio::spawn(async move {
                for want in frames_clone {
                    let got = server_conn.read_frame().await.unwrap().unwrap();
                    assert_eq!(want, got);
                }
                assert!(server_conn.read_frame().await.unwrap().is_none());
            });

            write_handle.await.unwrap();
            read_handle.await.unwrap();
        })
    }

    #[test]
    fn truncated_frame_is_reset_by_peer() {
        tokio_test::block_on(async move {
            let (mut client, server) = tokio::io::duplex(64);
            let mut server_conn = Connection::new(server, None);

            client.write_all(b"$10\r\nabc").await.unwrap();
            drop(client);

            let err = server_conn.read_frame().await.unwrap_err();
            assert!(matches!(err, crate::SweepError::Internal(ref e) if e.is_eof()));
        })
    }
}
