//! Async CD 1.1 receiver for continuous station data acquisition.
//!
//! Run one listening socket per configured station, reconcile sequence
//! gaps with periodic acknacks, and fan decoded channel data out to a
//! record channel.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> cd11_rs_receiver::Result<()> {
//! use cd11_rs_receiver::{ConsumerManager, StationConsumerConfig, StationServices};
//! use tokio::sync::mpsc;
//!
//! let (records_tx, mut records_rx) = mpsc::channel(1024);
//! let manager = ConsumerManager::new(StationServices::passthrough(), records_tx);
//!
//! manager.add_data_consumer(StationConsumerConfig::new("MKAR", 8100)).await?;
//!
//! while let Some(record) = records_rx.recv().await {
//!     println!("{} {} samples", record.key(), record.sample_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod error;
pub mod handler;
pub mod record;
pub(crate) mod registry;

pub use consumer::{ConsumerState, DataConsumer, StationConsumerConfig};
pub use error::{ReceiverError, Result};
pub use handler::{
    ACKNACK_INTERVAL, ChannelNameResolver, GapStateStore, NoopGapState, PassthroughResolver,
    StationServices,
};
pub use record::StationDataRecord;

use std::net::SocketAddr;

use cd11_rs_protocol::Frame;
use tokio::sync::mpsc;
use tracing::{info, warn};

use registry::ConsumerRegistry;

/// Owns the fleet of per-station data consumers.
///
/// Consumers are registered under the port they actually bound, so
/// configurations with port 0 work in tests and deployments alike.
pub struct ConsumerManager {
    registry: ConsumerRegistry,
    services: StationServices,
    records: mpsc::Sender<StationDataRecord>,
    frames: Option<mpsc::Sender<Frame>>,
}

impl ConsumerManager {
    pub fn new(services: StationServices, records: mpsc::Sender<StationDataRecord>) -> Self {
        Self {
            registry: ConsumerRegistry::new(),
            services,
            records,
            frames: None,
        }
    }

    /// Also forward non-data frames (acknack, alert, command traffic) to
    /// this channel for out-of-band consumers.
    pub fn with_frame_tap(mut self, frames: mpsc::Sender<Frame>) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Start a consumer for every acquired station in the list. Stations
    /// marked not acquired are skipped entirely, never bound or
    /// registered. A station that fails to start is logged and does not
    /// stop the rest of the fleet.
    pub async fn start(&self, configs: Vec<StationConsumerConfig>) {
        for config in configs {
            if !config.acquired {
                info!(station = %config.station, "station not acquired, skipping");
                continue;
            }
            let station = config.station.clone();
            if let Err(e) = self.add_data_consumer(config).await {
                warn!(station = %station, error = %e, "data consumer failed to start");
            }
        }
    }

    /// Start one consumer and register it once its listener is bound.
    /// Returns the bound address.
    pub async fn add_data_consumer(&self, config: StationConsumerConfig) -> Result<SocketAddr> {
        if config.port != 0 && self.registry.contains(config.port) {
            return Err(ReceiverError::PortAlreadyRegistered(config.port));
        }
        let mut consumer = DataConsumer::start(
            config,
            self.services.clone(),
            self.records.clone(),
            self.frames.clone(),
        );
        let addr = consumer.wait_until_ready().await?;
        self.registry.insert(addr.port(), consumer)?;
        Ok(addr)
    }

    /// Stop and unregister the consumer on a port. Returns false when no
    /// consumer is registered there.
    pub async fn remove_data_consumer(&self, port: u16) -> Result<bool> {
        let Some(mut consumer) = self.registry.remove(port) else {
            return Ok(false);
        };
        info!(station = %consumer.station(), port, "stopping data consumer");
        consumer.stop();
        consumer.wait_until_stopped().await;
        Ok(true)
    }

    pub fn is_port_registered(&self, port: u16) -> bool {
        self.registry.contains(port)
    }

    pub fn total_consumers(&self) -> usize {
        self.registry.len()
    }

    /// Registered ports, ascending.
    pub fn ports(&self) -> Vec<u16> {
        self.registry.ports()
    }

    /// Stop every consumer and wait for all of them to exit. Safe to
    /// call with nothing running.
    pub async fn stop(&self) {
        let consumers = self.registry.drain();
        for consumer in &consumers {
            consumer.stop();
        }
        for mut consumer in consumers {
            consumer.wait_until_stopped().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use cd11_rs_client::{Cd11Client, ClientConfig, ClientError};
    use cd11_rs_protocol::{ChannelSubframe, CompressionFormat, FramePayload, GapList, SensorType};

    fn client_config(station: &str) -> ClientConfig {
        ClientConfig {
            station: station.to_owned(),
            destination: "DC".to_owned(),
            read_timeout: Duration::from_secs(2),
            ..ClientConfig::default()
        }
    }

    fn subframe(site: &str, channel: &str) -> ChannelSubframe {
        ChannelSubframe {
            authentication_on: false,
            compression: CompressionFormat::None,
            sensor_type: SensorType::Seismic,
            is_calibration: false,
            site: site.into(),
            channel: channel.into(),
            location: "01".into(),
            data_format: "s4".into(),
            calibration_factor: 0.0,
            calibration_period: 0.0,
            timestamp_ms: 1_700_000_000_000,
            time_length_ms: 10_000,
            sample_count: 400,
            channel_status: Vec::new(),
            data: vec![3; 12],
            subframe_count: 0,
            auth_key_id: 0,
            auth_value: Vec::new(),
        }
    }

    async fn manager() -> (ConsumerManager, tokio::sync::mpsc::Receiver<StationDataRecord>) {
        let (records_tx, records_rx) = tokio::sync::mpsc::channel(64);
        let manager = ConsumerManager::new(StationServices::passthrough(), records_tx);
        (manager, records_rx)
    }

    #[tokio::test]
    async fn add_and_remove_consumers() {
        let (manager, _records) = manager().await;
        assert_eq!(manager.total_consumers(), 0);

        let a = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();
        let b = manager
            .add_data_consumer(StationConsumerConfig::new("I51GB", 0))
            .await
            .unwrap();
        assert_eq!(manager.total_consumers(), 2);
        assert!(manager.is_port_registered(a.port()));
        assert!(manager.is_port_registered(b.port()));

        assert!(manager.remove_data_consumer(a.port()).await.unwrap());
        assert_eq!(manager.total_consumers(), 1);
        assert!(!manager.is_port_registered(a.port()));

        // removing again reports nothing to do
        assert!(!manager.remove_data_consumer(a.port()).await.unwrap());

        manager.stop().await;
        assert_eq!(manager.total_consumers(), 0);
    }

    #[tokio::test]
    async fn duplicate_port_is_rejected() {
        let (manager, _records) = manager().await;
        let addr = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();

        let err = manager
            .add_data_consumer(StationConsumerConfig::new("I51GB", addr.port()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiverError::PortAlreadyRegistered(p) if p == addr.port()));
        assert_eq!(manager.total_consumers(), 1);
        manager.stop().await;
    }

    #[tokio::test]
    async fn start_skips_unacquired_stations() {
        let (manager, _records) = manager().await;

        let mut idle = StationConsumerConfig::new("I51GB", 0);
        idle.acquired = false;
        manager
            .start(vec![StationConsumerConfig::new("MKAR", 0), idle])
            .await;

        assert_eq!(manager.total_consumers(), 1);
        manager.stop().await;
    }

    #[tokio::test]
    async fn stop_with_no_consumers_is_a_noop() {
        let (manager, _records) = manager().await;
        manager.stop().await;
        assert_eq!(manager.total_consumers(), 0);
    }

    #[tokio::test]
    async fn data_frame_is_published_as_records() {
        let (manager, mut records) = manager().await;
        let addr = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();

        let mut client =
            Cd11Client::connect_with_config(&addr.to_string(), client_config("MKAR"))
                .await
                .unwrap();
        client
            .send_data_frame(vec![subframe("MK01", "SHZ"), subframe("MK02", "SHN")], 42)
            .await
            .unwrap();

        let r1 = records.recv().await.unwrap();
        assert_eq!(r1.station, "MKAR");
        assert_eq!(r1.channel, "MK01.SHZ");
        assert_eq!(r1.sequence, 42);
        assert_eq!(r1.payload, vec![3; 12]);
        let r2 = records.recv().await.unwrap();
        assert_eq!(r2.channel, "MK02.SHN");

        client.disconnect().await.unwrap();
        manager.stop().await;
    }

    #[tokio::test]
    async fn disabled_station_publishes_nothing() {
        let (manager, mut records) = manager().await;
        let mut config = StationConsumerConfig::new("MKAR", 0);
        config.frame_processing_disabled = true;
        let addr = manager.add_data_consumer(config).await.unwrap();

        let mut client =
            Cd11Client::connect_with_config(&addr.to_string(), client_config("MKAR"))
                .await
                .unwrap();
        client
            .send_data_frame(vec![subframe("MK01", "SHZ")], 1)
            .await
            .unwrap();

        let outcome =
            tokio::time::timeout(Duration::from_millis(300), records.recv()).await;
        assert!(outcome.is_err(), "no record expected for a disabled station");

        client.disconnect().await.unwrap();
        manager.stop().await;
    }

    #[tokio::test]
    async fn alert_frame_tears_the_connection_down_and_is_forwarded() {
        let (frames_tx, mut frames_rx) = tokio::sync::mpsc::channel(8);
        let (records_tx, _records_rx) = tokio::sync::mpsc::channel(8);
        let manager = ConsumerManager::new(StationServices::passthrough(), records_tx)
            .with_frame_tap(frames_tx);
        let addr = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();

        let mut client =
            Cd11Client::connect_with_config(&addr.to_string(), client_config("MKAR"))
                .await
                .unwrap();
        client.send_alert("station going down").await.unwrap();

        // Forwarded only after the connection's I/O is released.
        let forwarded = frames_rx.recv().await.unwrap();
        match &forwarded.payload {
            FramePayload::Alert(p) => assert_eq!(p.message, "station going down"),
            other => panic!("expected alert, got {other:?}"),
        }
        let read = client.read().await;
        assert!(matches!(read, Err(ClientError::Disconnected)));

        manager.stop().await;
    }

    #[tokio::test]
    async fn custom_reset_also_tears_down() {
        let (frames_tx, mut frames_rx) = tokio::sync::mpsc::channel(8);
        let (records_tx, _records_rx) = tokio::sync::mpsc::channel(8);
        let manager = ConsumerManager::new(StationServices::passthrough(), records_tx)
            .with_frame_tap(frames_tx);
        let addr = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();

        let mut client =
            Cd11Client::connect_with_config(&addr.to_string(), client_config("MKAR"))
                .await
                .unwrap();
        client.send_custom_reset().await.unwrap();

        let forwarded = frames_rx.recv().await.unwrap();
        assert!(matches!(forwarded.payload, FramePayload::CustomReset(_)));

        manager.stop().await;
    }

    #[tokio::test]
    async fn option_request_is_answered_on_the_wire() {
        let (manager, _records) = manager().await;
        let addr = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();

        let mut client =
            Cd11Client::connect_with_config(&addr.to_string(), client_config("MKAR"))
                .await
                .unwrap();
        client.send_option_request(1, b"MKAR".to_vec()).await.unwrap();

        let reply = client.read().await.unwrap();
        match &reply.payload {
            FramePayload::OptionResponse(p) => {
                assert_eq!(p.option_type, 1);
                assert_eq!(p.option_value, b"MKAR");
            }
            other => panic!("expected option response, got {other:?}"),
        }

        client.disconnect().await.unwrap();
        manager.stop().await;
    }

    #[tokio::test]
    async fn acknack_from_station_is_forwarded_to_the_tap() {
        let (frames_tx, mut frames_rx) = tokio::sync::mpsc::channel(8);
        let (records_tx, _records_rx) = tokio::sync::mpsc::channel(8);
        let manager = ConsumerManager::new(StationServices::passthrough(), records_tx)
            .with_frame_tap(frames_tx);
        let addr = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();

        let mut client =
            Cd11Client::connect_with_config(&addr.to_string(), client_config("MKAR"))
                .await
                .unwrap();
        let mut gaps = GapList::new();
        gaps.observe(1);
        gaps.observe(4);
        client.send_acknack("MKAR:0", &gaps).await.unwrap();

        let forwarded = frames_rx.recv().await.unwrap();
        match &forwarded.payload {
            FramePayload::Acknack(p) => {
                assert_eq!(p.frameset, "MKAR:0");
                assert_eq!((p.lowest, p.highest), (1, 4));
            }
            other => panic!("expected acknack, got {other:?}"),
        }

        client.disconnect().await.unwrap();
        manager.stop().await;
    }

    #[tokio::test]
    async fn shutdown_alerts_the_connected_station() {
        let (manager, _records) = manager().await;
        let addr = manager
            .add_data_consumer(StationConsumerConfig::new("MKAR", 0))
            .await
            .unwrap();

        let mut client =
            Cd11Client::connect_with_config(&addr.to_string(), client_config("MKAR"))
                .await
                .unwrap();
        // Nudge the consumer into serving this connection before stopping.
        client.send_data_frame(vec![subframe("MK01", "SHZ")], 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stop = tokio::spawn(async move {
            manager.stop().await;
        });

        let frame = client.read().await.unwrap();
        match &frame.payload {
            FramePayload::Alert(p) => {
                assert_eq!(p.message, "data consumer shutting down")
            }
            other => panic!("expected shutdown alert, got {other:?}"),
        }
        stop.await.unwrap();
    }
}
