use std::net::SocketAddr;
use std::time::Duration;

use cd11_rs_protocol::{Cd11Error, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    read_timeout: Duration,
}

impl Connection {
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        debug!(addr, "TCP connecting");
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Timeout(connect_timeout))?
            .map_err(ClientError::Io)?;
        Ok(Self::from_stream(stream, read_timeout))
    }

    /// Connect with the local endpoint pinned to a specific address.
    pub async fn connect_from(
        local: SocketAddr,
        addr: SocketAddr,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        debug!(%local, %addr, "TCP connecting from pinned local address");
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.bind(local)?;
        let stream = tokio::time::timeout(connect_timeout, socket.connect(addr))
            .await
            .map_err(|_| ClientError::Timeout(connect_timeout))?
            .map_err(ClientError::Io)?;
        Ok(Self::from_stream(stream, read_timeout))
    }

    fn from_stream(stream: TcpStream, read_timeout: Duration) -> Self {
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            read_timeout,
        }
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        self.writer.write_all(&bytes).await.map_err(ClientError::Io)?;
        self.writer.flush().await.map_err(ClientError::Io)?;
        Ok(())
    }

    /// Read the next whole frame, growing the buffer as the decoder
    /// reports how many bytes it still needs.
    pub async fn read_frame(&mut self, timeout: Duration) -> Result<Frame> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match Frame::decode(&buf) {
                Ok((frame, _consumed)) => return Ok(frame),
                Err(Cd11Error::FrameTooShort { expected, .. }) => {
                    let old = buf.len();
                    buf.resize(expected.max(old + 1), 0);
                    self.read_exact(&mut buf[old..], timeout).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn read_next(&mut self) -> Result<Frame> {
        self.read_frame(self.read_timeout).await
    }

    async fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.reader.read_exact(buf))
            .await
            .map_err(|_| {
                warn!(?timeout, "read timeout");
                ClientError::Timeout(timeout)
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => ClientError::Disconnected,
                _ => ClientError::Io(e),
            })?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(ClientError::Io)?;
        Ok(())
    }
}
