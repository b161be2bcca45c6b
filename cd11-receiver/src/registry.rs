//! Registry of live data consumers, keyed by listen port.
//!
//! Owned by the consumer manager; all mutation goes through its
//! add/remove operations so status queries stay atomic with respect to
//! concurrent lifecycle changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::consumer::DataConsumer;
use crate::error::{ReceiverError, Result};

/// Thread-safe consumer registry. Clone is cheap (Arc).
#[derive(Clone, Default)]
pub struct ConsumerRegistry {
    inner: Arc<Mutex<HashMap<u16, DataConsumer>>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer under its port. Duplicate ports are an error,
    /// never a silent replacement.
    pub(crate) fn insert(&self, port: u16, consumer: DataConsumer) -> Result<()> {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(&port) {
            return Err(ReceiverError::PortAlreadyRegistered(port));
        }
        map.insert(port, consumer);
        Ok(())
    }

    /// Remove and return the consumer for a port, if any.
    pub(crate) fn remove(&self, port: u16) -> Option<DataConsumer> {
        self.inner.lock().unwrap().remove(&port)
    }

    /// Remove and return every registered consumer.
    pub(crate) fn drain(&self) -> Vec<DataConsumer> {
        self.inner.lock().unwrap().drain().map(|(_, c)| c).collect()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.inner.lock().unwrap().contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Registered ports, ascending.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.inner.lock().unwrap().keys().copied().collect();
        ports.sort_unstable();
        ports
    }
}
