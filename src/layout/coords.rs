//! Per-device part placement, kept in discovery order.

use std::{collections::HashMap, sync::Arc};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::rearrange::{Arrangement, LayoutFlags, Rearranger};
use crate::canvas::{
    color::Color,
    device::Device,
    orientation::nearest_orientation,
    part::Part,
    point::{Bounds, Point},
};
use crate::protocol::serial::Serial;

/// One entry of a device's chain as discovery reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainItem {
    pub user_x: f64,
    pub user_y: f64,
    pub width: u32,
    pub height: u32,
    /// Accelerometer reading `(x, y, z)`; `(-1, -1, -1)` when unknown.
    #[serde(default = "unknown_accel")]
    pub accel: (i32, i32, i32),
}

fn unknown_accel() -> (i32, i32, i32) {
    (-1, -1, -1)
}

impl ChainItem {
    pub fn new(user_x: f64, user_y: f64, width: u32, height: u32) -> Self {
        Self {
            user_x,
            user_y,
            width,
            height,
            accel: unknown_accel(),
        }
    }
}

/// The parts of one device.
#[derive(Debug, Clone)]
pub struct DeviceCoords {
    device: Arc<Device>,
    parts: Vec<Part>,
}

impl DeviceCoords {
    /// Parts for a device's chain.
    ///
    /// `colors` are per chain item in device order, as read off the device; they become each
    /// part's original colors once turned into canvas order.
    pub fn from_chain<R: Rng + ?Sized>(
        device: Arc<Device>,
        chain: &[ChainItem],
        colors: Option<&[Vec<Color>]>,
        rng: &mut R,
    ) -> Self {
        let parts = chain
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let (x, y, z) = item.accel;
                let mut part = Part::new(
                    Arc::clone(&device),
                    u8::try_from(i).unwrap_or(u8::MAX),
                    item.user_x,
                    item.user_y,
                    item.width,
                    item.height,
                )
                .with_orientation(nearest_orientation(x, y, z))
                .with_random_orientation(&mut *rng);
                if let Some(read) = colors.and_then(|c| c.get(i)) {
                    let original = part.reverse_orient(read);
                    part = part.with_original_colors(original);
                }
                part
            })
            .collect();
        Self { device, parts }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn serial(&self) -> Serial {
        self.device.serial
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Every known device's parts plus the strategy that places them.
#[derive(Debug, Clone, Default)]
pub struct Coords {
    order: Vec<Serial>,
    by_device: HashMap<Serial, DeviceCoords>,
    rearranger: Rearranger,
}

impl Coords {
    pub fn new(flags: LayoutFlags) -> Self {
        Self {
            rearranger: Rearranger::from_flags(flags),
            ..Self::default()
        }
    }

    pub fn rearranger(&self) -> Rearranger {
        self.rearranger
    }

    /// Change strategy and re-place every part.
    pub fn set_layout(&mut self, flags: LayoutFlags) {
        self.rearranger = Rearranger::from_flags(flags);
        self.rearrange();
    }

    /// Add (or replace) a device, then re-place everything. Returns the device's placed parts.
    pub fn add_device(&mut self, coords: DeviceCoords) -> &DeviceCoords {
        let serial = coords.serial();
        if !self.by_device.contains_key(&serial) {
            self.order.push(serial);
        }
        self.by_device.insert(serial, coords);
        self.rearrange();
        &self.by_device[&serial]
    }

    pub fn remove_device(&mut self, serial: Serial) -> Option<DeviceCoords> {
        self.order.retain(|s| *s != serial);
        let removed = self.by_device.remove(&serial);
        self.rearrange();
        removed
    }

    /// Take over every device from `other`.
    pub fn steal(&mut self, other: Coords) {
        let Coords {
            order,
            mut by_device,
            ..
        } = other;
        for serial in order {
            if let Some(coords) = by_device.remove(&serial) {
                if !self.by_device.contains_key(&serial) {
                    self.order.push(serial);
                }
                self.by_device.insert(serial, coords);
            }
        }
        self.rearrange();
    }

    /// Re-place every part from its reported position. Running it twice changes nothing.
    pub fn rearrange(&mut self) {
        let all: Vec<Part> = self.parts().cloned().collect();
        let placed: HashMap<_, Part> = self
            .rearranger
            .arrange(&all)
            .into_iter()
            .map(|p| (p.key(), p))
            .collect();
        for coords in self.by_device.values_mut() {
            for part in &mut coords.parts {
                if let Some(new) = placed.get(&part.key()) {
                    *part = new.clone();
                }
            }
        }
    }

    pub fn for_serial(&self, serial: Serial) -> Option<&DeviceCoords> {
        self.by_device.get(&serial)
    }

    pub fn has_serial(&self, serial: Serial) -> bool {
        self.by_device.contains_key(&serial)
    }

    pub fn serials(&self) -> &[Serial] {
        &self.order
    }

    /// Placed parts, device by device in the order devices were added.
    pub fn parts(&self) -> impl Iterator<Item = &Part> + '_ {
        self.order
            .iter()
            .filter_map(|s| self.by_device.get(s))
            .flat_map(|c| c.parts.iter())
    }

    pub fn len(&self) -> usize {
        self.by_device.values().map(DeviceCoords::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_device.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.parts()
            .map(Part::bounds)
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn all_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.parts().flat_map(|p| p.points().iter().copied())
    }

    /// Jittered sample grid over the bounds grown by `extra_proportion` on each side.
    ///
    /// Steps between samples are picked uniformly from `1..=spread`.
    pub fn spread_points<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        extra_proportion: f64,
        spread: u32,
    ) -> Vec<Point> {
        let Some(bounds) = self.bounds() else {
            return Vec::new();
        };
        let spread = spread.max(1) as i32;
        let mut b = bounds;
        if spread > 1 {
            let grow_x = (f64::from(bounds.width()) * extra_proportion) as i32;
            let grow_y = (f64::from(bounds.height()) * extra_proportion) as i32;
            b = Bounds::new(
                b.left - grow_x,
                b.right + grow_x,
                b.top + grow_y,
                b.bottom - grow_y,
            );
        }

        let mut points = Vec::new();
        let mut col = b.left;
        while col < b.right {
            let mut row = b.top;
            while row > b.bottom {
                points.push(Point::new(col, row));
                row -= rng.random_range(1..=spread);
            }
            col += rng.random_range(1..=spread);
        }
        points
    }
}
