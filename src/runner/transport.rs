//! Seams to the network: sending packets and finding devices.

use std::{future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

use crate::{
    canvas::{color::Color, device::Capability},
    foundation::error::CanvasResult,
    layout::coords::ChainItem,
    protocol::{message::Message, serial::Serial},
};

/// Boxed, sendable future returned by the object-safe seams below.
///
/// Same shape as `futures::future::BoxFuture`, spelled out so the crate needs nothing beyond
/// tokio for its async plumbing.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Delivers packets to one device.
///
/// Resolves once the device has taken the packets (acknowledged them, when they ask for it).
pub trait Transport: Send + Sync + 'static {
    fn send(&self, serial: Serial, msgs: Vec<Message>) -> BoxFuture<'_, CanvasResult<()>>;
}

/// What discovery knows about a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub serial: Serial,
    pub capability: Capability,
    pub chain: Vec<ChainItem>,
    /// Colors per chain item as read off the device, in device order.
    #[serde(default)]
    pub colors: Vec<Vec<Color>>,
}

impl DiscoveredDevice {
    /// A chain of `count` 8x8 tiles laid out in a row.
    pub fn tiles(serial: Serial, count: usize) -> Self {
        Self {
            serial,
            capability: Capability::matrix("Tile"),
            chain: (0..count)
                .map(|i| ChainItem::new(i as f64, 0.0, 8, 8))
                .collect(),
            colors: Vec::new(),
        }
    }

    /// A light strip with `zones` zones.
    pub fn strip(serial: Serial, zones: u32, extended: bool) -> Self {
        Self {
            serial,
            capability: Capability::strip("Strip", extended),
            chain: vec![ChainItem::new(0.0, 0.0, zones, 1)],
            colors: Vec::new(),
        }
    }

    /// Every chain item reads back as `color`.
    pub fn with_color(mut self, color: Color) -> Self {
        self.colors = self
            .chain
            .iter()
            .map(|item| vec![color; (item.width * item.height) as usize])
            .collect();
        self
    }
}

/// Finds devices and describes them.
pub trait Discovery: Send + Sync + 'static {
    /// Serials currently reachable.
    fn find(&self) -> BoxFuture<'_, CanvasResult<Vec<Serial>>>;

    /// Chain, capability and current colors for each of `serials` that answered.
    fn describe<'a>(&'a self, serials: &'a [Serial]) -> BoxFuture<'a, CanvasResult<Vec<DiscoveredDevice>>>;
}
