//! Per-station listener lifecycle.
//!
//! A [`DataConsumer`] owns one bound listening socket for one station
//! and drives every accepted connection through a connection handler,
//! one at a time. Its lifecycle is observable through a watch channel so
//! callers can rendezvous with startup and shutdown instead of polling.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use cd11_rs_protocol::Frame;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{ReceiverError, Result};
use crate::handler::{ConnectionDriver, ConnectionHandler, StationServices};
use crate::record::StationDataRecord;

/// Static per-station configuration.
#[derive(Clone, Debug)]
pub struct StationConsumerConfig {
    pub station: String,
    /// Listen port; 0 lets the OS choose.
    pub port: u16,
    /// Provider address this station is expected to connect from. A
    /// mismatch is logged, not rejected.
    pub expected_address: Option<IpAddr>,
    /// Whether this station should be listened to at all.
    pub acquired: bool,
    /// Accept connections and gap-track frames but never publish.
    pub frame_processing_disabled: bool,
}

impl StationConsumerConfig {
    pub fn new(station: impl Into<String>, port: u16) -> Self {
        Self {
            station: station.into(),
            port,
            expected_address: None,
            acquired: true,
            frame_processing_disabled: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Created,
    Starting,
    /// Bound and accepting at this address.
    Running(SocketAddr),
    Stopping,
    Stopped,
}

/// Handle to one station's running listener.
pub struct DataConsumer {
    station: String,
    state_rx: watch::Receiver<ConsumerState>,
    shutdown_tx: watch::Sender<bool>,
}

impl DataConsumer {
    /// Spawn the accept loop and return immediately. Use
    /// [`wait_until_ready`](Self::wait_until_ready) to rendezvous with
    /// the socket actually accepting.
    pub fn start(
        config: StationConsumerConfig,
        services: StationServices,
        records: mpsc::Sender<StationDataRecord>,
        frames: Option<mpsc::Sender<Frame>>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConsumerState::Created);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let station = config.station.clone();
        tokio::spawn(accept_loop(
            config,
            services,
            records,
            frames,
            state_tx,
            shutdown_rx,
        ));
        Self {
            station,
            state_rx,
            shutdown_tx,
        }
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn state(&self) -> ConsumerState {
        self.state_rx.borrow().clone()
    }

    /// Resolves once the listener is bound and accepting, with the local
    /// address. Errors if the consumer stopped before binding.
    pub async fn wait_until_ready(&mut self) -> Result<SocketAddr> {
        loop {
            let state = self.state_rx.borrow().clone();
            match state {
                ConsumerState::Running(addr) => return Ok(addr),
                ConsumerState::Stopped => {
                    return Err(ReceiverError::NeverStarted(self.station.clone()));
                }
                _ => {}
            }
            if self.state_rx.changed().await.is_err() {
                return Err(ReceiverError::NeverStarted(self.station.clone()));
            }
        }
    }

    /// Request shutdown: the listener closes and any active connection
    /// is alerted and released. Returns immediately.
    pub fn stop(&self) {
        self.shutdown_tx.send(true).ok();
    }

    /// Resolves once the worker has fully exited.
    pub async fn wait_until_stopped(&mut self) {
        loop {
            if *self.state_rx.borrow() == ConsumerState::Stopped {
                return;
            }
            if self.state_rx.changed().await.is_err() {
                return; // worker gone, nothing left to wait for
            }
        }
    }
}

async fn accept_loop(
    config: StationConsumerConfig,
    services: StationServices,
    records: mpsc::Sender<StationDataRecord>,
    frames: Option<mpsc::Sender<Frame>>,
    state_tx: watch::Sender<ConsumerState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    state_tx.send(ConsumerState::Starting).ok();

    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(station = %config.station, port = config.port, error = %e, "bind failed");
            state_tx.send(ConsumerState::Stopped).ok();
            return;
        }
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(station = %config.station, error = %e, "local address unavailable");
            state_tx.send(ConsumerState::Stopped).ok();
            return;
        }
    };

    state_tx.send(ConsumerState::Running(addr)).ok();
    info!(station = %config.station, %addr, "data consumer listening");

    loop {
        let (stream, peer) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(station = %config.station, error = %e, "accept error");
                        continue;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                debug!(station = %config.station, "shutdown signal received");
                break;
            }
        };

        if let Some(expected) = config.expected_address {
            if peer.ip() != expected {
                warn!(
                    station = %config.station,
                    %peer,
                    %expected,
                    "connection from unexpected provider address"
                );
            }
        }
        info!(station = %config.station, %peer, "accepted station connection");
        stream.set_nodelay(true).ok();

        let handler = ConnectionHandler::new(
            &config.station,
            config.frame_processing_disabled,
            services.clone(),
            records.clone(),
            frames.clone(),
        );
        let driver = ConnectionDriver::new(stream, handler, shutdown_rx.clone());
        // Connections are served one at a time, in arrival order.
        if let Err(e) = driver.run().await {
            warn!(station = %config.station, error = %e, "connection ended with error");
        }
        if *shutdown_rx.borrow() {
            break;
        }
    }

    state_tx.send(ConsumerState::Stopping).ok();
    drop(listener);
    state_tx.send(ConsumerState::Stopped).ok();
}
