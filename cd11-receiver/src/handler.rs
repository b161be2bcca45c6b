//! Per-connection protocol dispatch.
//!
//! [`ConnectionHandler`] holds the protocol state for one accepted
//! connection (gap list, station identity) and decides what each inbound
//! frame does. [`ConnectionDriver`] owns the socket halves and runs the
//! read/dispatch/write loop as a task, including the periodic acknack
//! timer.

use std::sync::Arc;
use std::time::Duration;

use cd11_rs_protocol::{
    Cd11Error, ChannelSubframe, Frame, FrameFactory, FramePayload, GapList,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::error::{ReceiverError, Result};
use crate::record::StationDataRecord;

/// How often a live connection reports its gap list to the station.
pub const ACKNACK_INTERVAL: Duration = Duration::from_secs(55);

/// Maps the 10-byte site/channel/location string of a channel subframe
/// to a logical channel name. Returning `None` marks the channel
/// unresolvable; its samples are consumed but never published.
pub trait ChannelNameResolver: Send + Sync {
    fn resolve(&self, channel_string: &str) -> Option<String>;
}

/// Persistence collaborator for gap state. Halting frames clear it; a
/// failure there is fatal to the connection being torn down.
pub trait GapStateStore: Send + Sync {
    fn clear_gap_state(&self, station: &str) -> std::io::Result<()>;
}

/// Resolver that derives "SITE.CHAN" from the channel string.
pub struct PassthroughResolver;

impl ChannelNameResolver for PassthroughResolver {
    fn resolve(&self, channel_string: &str) -> Option<String> {
        if channel_string.len() < 8 {
            return None;
        }
        let site = channel_string[..5].trim();
        let channel = channel_string[5..8].trim();
        if site.is_empty() || channel.is_empty() {
            return None;
        }
        Some(format!("{site}.{channel}"))
    }
}

/// Gap state store with no backing storage.
pub struct NoopGapState;

impl GapStateStore for NoopGapState {
    fn clear_gap_state(&self, _station: &str) -> std::io::Result<()> {
        Ok(())
    }
}

/// The external collaborators every station consumer shares.
#[derive(Clone)]
pub struct StationServices {
    pub resolver: Arc<dyn ChannelNameResolver>,
    pub gap_state: Arc<dyn GapStateStore>,
}

impl StationServices {
    /// Passthrough resolution, no gap-state persistence.
    pub fn passthrough() -> Self {
        Self {
            resolver: Arc::new(PassthroughResolver),
            gap_state: Arc::new(NoopGapState),
        }
    }
}

/// What the driver must do after one frame is dispatched.
#[derive(Debug)]
pub(crate) enum Dispatch {
    Continue,
    /// Write this frame back to the station, then continue.
    Reply(Box<Frame>),
    /// Dispose the connection's I/O, then forward this frame.
    Halt(Box<Frame>),
}

pub(crate) struct ConnectionHandler {
    station: String,
    frameset: String,
    processing_disabled: bool,
    factory: FrameFactory,
    gaps: GapList,
    resolver: Arc<dyn ChannelNameResolver>,
    gap_state: Arc<dyn GapStateStore>,
    records: mpsc::Sender<StationDataRecord>,
    frames: Option<mpsc::Sender<Frame>>,
}

impl ConnectionHandler {
    pub fn new(
        station: &str,
        processing_disabled: bool,
        services: StationServices,
        records: mpsc::Sender<StationDataRecord>,
        frames: Option<mpsc::Sender<Frame>>,
    ) -> Self {
        Self {
            station: station.to_owned(),
            frameset: format!("{station}:0"),
            processing_disabled,
            factory: FrameFactory::new("DC", station),
            gaps: GapList::new(),
            resolver: services.resolver,
            gap_state: services.gap_state,
            records,
            frames,
        }
    }

    /// Process one inbound frame in arrival order.
    pub async fn dispatch(&mut self, frame: Frame) -> Result<Dispatch> {
        match &frame.payload {
            FramePayload::Acknack(p) => {
                // A valid acknack confirms the sender's view of the
                // frame-set; tracked gaps are no longer meaningful.
                if p.frameset == self.frameset && p.lowest <= p.highest {
                    debug!(station = %self.station, "acknack validated, resetting gap list");
                    self.gaps.reset();
                } else {
                    debug!(
                        station = %self.station,
                        frameset = %p.frameset,
                        "ignoring acknack for foreign or inconsistent frame-set"
                    );
                }
                self.forward(frame).await;
                Ok(Dispatch::Continue)
            }
            FramePayload::Data(p) => {
                if !self.processing_disabled {
                    for subframe in &p.subframes {
                        self.publish(subframe, frame.header.sequence).await?;
                    }
                }
                self.gaps.observe(frame.header.sequence);
                Ok(Dispatch::Continue)
            }
            FramePayload::CommandResponse(_) => {
                self.gaps.observe(frame.header.sequence);
                self.forward(frame).await;
                Ok(Dispatch::Continue)
            }
            FramePayload::OptionRequest(p) => {
                let reply = self.factory.option_response(p);
                self.forward(frame).await;
                Ok(Dispatch::Reply(Box::new(reply)))
            }
            FramePayload::Alert(_) | FramePayload::CustomReset(_) => {
                self.gap_state
                    .clear_gap_state(&self.station)
                    .map_err(|source| ReceiverError::GapStateClear {
                        station: self.station.clone(),
                        source,
                    })?;
                Ok(Dispatch::Halt(Box::new(frame)))
            }
            FramePayload::ConnectionRequest(_)
            | FramePayload::ConnectionResponse(_)
            | FramePayload::OptionResponse(_)
            | FramePayload::CommandRequest(_) => {
                trace!(station = %self.station, kind = %frame.frame_type(), "pass-through frame");
                self.forward(frame).await;
                Ok(Dispatch::Continue)
            }
        }
    }

    async fn publish(&self, subframe: &ChannelSubframe, sequence: u64) -> Result<()> {
        let channel_string = subframe.channel_string()?;
        let Some(channel) = self.resolver.resolve(&channel_string) else {
            debug!(
                station = %self.station,
                channel_string,
                "unresolvable channel, samples dropped"
            );
            return Ok(());
        };
        let record = StationDataRecord {
            station: self.station.clone(),
            channel,
            location: subframe.location.clone(),
            timestamp_ms: subframe.timestamp_ms,
            time_length_ms: subframe.time_length_ms,
            sample_count: subframe.sample_count,
            sequence,
            payload: subframe.data.clone(),
        };
        if self.records.send(record).await.is_err() {
            warn!(station = %self.station, "record channel closed, dropping record");
        }
        Ok(())
    }

    pub async fn forward(&self, frame: Frame) {
        if let Some(tx) = &self.frames {
            tx.send(frame).await.ok();
        }
    }

    /// Acknack reporting this connection's current gap list.
    pub fn acknack_frame(&self) -> Frame {
        self.factory.acknack(&self.frameset, &self.gaps)
    }

    pub fn alert_frame(&self, message: &str) -> Frame {
        self.factory.alert(message)
    }

    #[cfg(test)]
    fn gaps_mut(&mut self) -> &mut GapList {
        &mut self.gaps
    }
}

/// Runs one accepted connection to completion.
pub(crate) struct ConnectionDriver {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    handler: ConnectionHandler,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConnectionDriver {
    pub fn new(
        stream: TcpStream,
        handler: ConnectionHandler,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            handler,
            shutdown_rx,
        }
    }

    /// Read/dispatch/write loop. Returns when the peer closes, a halting
    /// frame is processed, shutdown is signalled, or a fatal error ends
    /// the connection.
    pub async fn run(mut self) -> Result<()> {
        let mut acknack = tokio::time::interval(ACKNACK_INTERVAL);
        acknack.set_missed_tick_behavior(MissedTickBehavior::Delay);
        acknack.tick().await; // the immediate first tick

        let mut buf: Vec<u8> = Vec::with_capacity(8192);
        let mut chunk = [0u8; 4096];

        loop {
            // Drain every complete frame already buffered.
            loop {
                match Frame::decode(&buf) {
                    Ok((frame, consumed)) => {
                        buf.drain(..consumed);
                        trace!(kind = %frame.frame_type(), sequence = frame.header.sequence, "frame received");
                        match self.handler.dispatch(frame).await? {
                            Dispatch::Continue => {}
                            Dispatch::Reply(reply) => self.write_frame(&reply).await?,
                            Dispatch::Halt(frame) => {
                                self.dispose().await;
                                self.handler.forward(*frame).await;
                                return Ok(());
                            }
                        }
                    }
                    Err(Cd11Error::FrameTooShort { .. }) => break, // need more bytes
                    Err(e) => {
                        warn!(error = %e, "undecodable frame, closing connection");
                        return Err(e.into());
                    }
                }
            }

            tokio::select! {
                result = self.reader.read(&mut chunk) => {
                    let n = result?;
                    if n == 0 {
                        debug!("peer closed connection");
                        return Ok(());
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                _ = acknack.tick() => {
                    let frame = self.handler.acknack_frame();
                    self.write_frame(&frame).await?;
                    trace!("periodic acknack sent");
                }
                _ = self.shutdown_rx.changed() => {
                    debug!("shutdown received, alerting station");
                    let alert = self.handler.alert_frame("data consumer shutting down");
                    if let Err(e) = self.write_frame(&alert).await {
                        debug!(error = %e, "alert not delivered");
                    }
                    self.dispose().await;
                    return Ok(());
                }
            }
        }
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Release both halves of the socket as one step.
    async fn dispose(&mut self) {
        self.writer.shutdown().await.ok();
    }
}
