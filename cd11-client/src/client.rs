//! High-level sending-side socket.

use std::net::SocketAddr;
use std::time::Duration;

use cd11_rs_protocol::{ChannelSubframe, Frame, FrameFactory, GapList};
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::{ClientError, Result};

/// Configuration for [`Cd11Client`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Station name stamped as the frame creator. Default: `"TEST"`.
    pub station: String,
    /// Frame destination identifier. Default: `"0"`.
    pub destination: String,
    /// TCP connect timeout. Default: 5 s.
    pub connect_timeout: Duration,
    /// Default read timeout. Default: 10 s.
    pub read_timeout: Duration,
    /// Authentication key identifier stamped on trailers. Default: 0.
    pub auth_key_id: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            station: "TEST".to_owned(),
            destination: "0".to_owned(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            auth_key_id: 0,
        }
    }
}

/// Sending-side CD 1.1 socket: frames and writes data, alert, acknack,
/// and option frames, and reads whatever the receiver sends back.
pub struct Cd11Client {
    connection: Option<Connection>,
    factory: FrameFactory,
    config: ClientConfig,
}

impl Cd11Client {
    /// Connect with default configuration.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_config(addr, ClientConfig::default()).await
    }

    pub async fn connect_with_config(addr: &str, config: ClientConfig) -> Result<Self> {
        let connection =
            Connection::connect(addr, config.connect_timeout, config.read_timeout).await?;
        info!(addr, station = %config.station, "connected");
        Ok(Self::assemble(connection, config))
    }

    /// Connect with the local endpoint pinned to a specific address and
    /// port, for receivers that check the provider address.
    pub async fn connect_from(
        local: SocketAddr,
        addr: SocketAddr,
        config: ClientConfig,
    ) -> Result<Self> {
        let connection =
            Connection::connect_from(local, addr, config.connect_timeout, config.read_timeout)
                .await?;
        info!(%addr, station = %config.station, "connected");
        Ok(Self::assemble(connection, config))
    }

    fn assemble(connection: Connection, config: ClientConfig) -> Self {
        let factory = FrameFactory::new(config.station.clone(), config.destination.clone())
            .with_auth_key(config.auth_key_id);
        Self {
            connection: Some(connection),
            factory,
            config,
        }
    }

    pub fn station(&self) -> &str {
        &self.config.station
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(ClientError::NotConnected)
    }

    /// Encode and send a data frame built from the given channel
    /// subframes under the given sequence number.
    pub async fn send_data_frame(
        &mut self,
        subframes: Vec<ChannelSubframe>,
        sequence: u64,
    ) -> Result<()> {
        let frame = self.factory.data(subframes, sequence);
        self.send_frame(&frame).await
    }

    /// Send an alert frame carrying a free-text message, used to request
    /// graceful remote teardown.
    pub async fn send_alert(&mut self, message: &str) -> Result<()> {
        let frame = self.factory.alert(message);
        self.send_frame(&frame).await
    }

    /// Report this sender's view of a frame-set.
    pub async fn send_acknack(&mut self, frameset: &str, gaps: &GapList) -> Result<()> {
        let frame = self.factory.acknack(frameset, gaps);
        self.send_frame(&frame).await
    }

    pub async fn send_option_request(
        &mut self,
        option_type: u32,
        option_value: Vec<u8>,
    ) -> Result<()> {
        let frame = self.factory.option_request(option_type, option_value);
        self.send_frame(&frame).await
    }

    pub async fn send_custom_reset(&mut self) -> Result<()> {
        let frame = self.factory.custom_reset();
        self.send_frame(&frame).await
    }

    /// Send an already-built frame.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        debug!(kind = %frame.frame_type(), sequence = frame.header.sequence, "sending frame");
        self.connection()?.send_frame(frame).await
    }

    /// Read the next decodable frame, failing with
    /// [`ClientError::Timeout`] after the configured read timeout.
    pub async fn read(&mut self) -> Result<Frame> {
        self.connection()?.read_next().await
    }

    /// Read the next decodable frame with an explicit timeout.
    pub async fn read_with_timeout(&mut self, timeout: Duration) -> Result<Frame> {
        self.connection()?.read_frame(timeout).await
    }

    /// Close the socket. Safe to call more than once.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut connection) = self.connection.take() {
            connection.shutdown().await?;
            info!(station = %self.config.station, "disconnected");
        }
        Ok(())
    }
}
