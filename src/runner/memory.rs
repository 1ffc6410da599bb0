//! In-memory transport and discovery, for tests and debugging.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::{Instant, sleep};

use super::transport::{BoxFuture, DiscoveredDevice, Discovery, Transport};
use crate::{
    foundation::error::{CanvasError, CanvasResult},
    protocol::{message::Message, serial::Serial},
};

/// One recorded send.
#[derive(Debug, Clone)]
pub struct Sent {
    pub at: Instant,
    pub serial: Serial,
    pub msgs: Vec<Message>,
}

#[derive(Debug, Default)]
struct TransportState {
    sent: Vec<Sent>,
    failing: HashSet<Serial>,
    delays: HashMap<Serial, Duration>,
}

/// Records every send instead of putting it on the network.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends to `serial` fail from now on.
    pub fn fail(&self, serial: Serial) {
        self.state().failing.insert(serial);
    }

    /// Sends to `serial` take `delay` before they complete.
    pub fn delay(&self, serial: Serial, delay: Duration) {
        self.state().delays.insert(serial, delay);
    }

    /// Every completed send, oldest first.
    pub fn sent(&self) -> Vec<Sent> {
        self.state().sent.clone()
    }

    pub fn sent_to(&self, serial: Serial) -> Vec<Sent> {
        self.state()
            .sent
            .iter()
            .filter(|s| s.serial == serial)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.state().sent.clear();
    }
}

impl Transport for MemoryTransport {
    fn send(&self, serial: Serial, msgs: Vec<Message>) -> BoxFuture<'_, CanvasResult<()>> {
        Box::pin(async move {
            let delay = self.state().delays.get(&serial).copied();
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            let mut state = self.state();
            if state.failing.contains(&serial) {
                return Err(CanvasError::delivery(format!("{serial} is unreachable")));
            }
            state.sent.push(Sent {
                at: Instant::now(),
                serial,
                msgs,
            });
            Ok(())
        })
    }
}

/// Discovery over a fixed, editable set of devices.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    devices: Arc<Mutex<Vec<DiscoveredDevice>>>,
}

impl StaticDiscovery {
    pub fn new(devices: impl IntoIterator<Item = DiscoveredDevice>) -> Self {
        Self {
            devices: Arc::new(Mutex::new(devices.into_iter().collect())),
        }
    }

    fn devices(&self) -> std::sync::MutexGuard<'_, Vec<DiscoveredDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a device findable, replacing one with the same serial.
    pub fn add(&self, device: DiscoveredDevice) {
        let mut devices = self.devices();
        devices.retain(|d| d.serial != device.serial);
        devices.push(device);
    }

    pub fn remove(&self, serial: Serial) {
        self.devices().retain(|d| d.serial != serial);
    }
}

impl Discovery for StaticDiscovery {
    fn find(&self) -> BoxFuture<'_, CanvasResult<Vec<Serial>>> {
        let serials = self.devices().iter().map(|d| d.serial).collect();
        Box::pin(async move { Ok(serials) })
    }

    fn describe<'a>(
        &'a self,
        serials: &'a [Serial],
    ) -> BoxFuture<'a, CanvasResult<Vec<DiscoveredDevice>>> {
        let found = self
            .devices()
            .iter()
            .filter(|d| serials.contains(&d.serial))
            .cloned()
            .collect();
        Box::pin(async move { Ok(found) })
    }
}
