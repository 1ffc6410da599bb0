use std::{cmp::Ordering, hash::Hash, sync::Arc};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    color::Color,
    device::Device,
    orientation::Orientation,
    point::{Bounds, Point},
};
use crate::protocol::{
    message::Message,
    multizone::MultizoneMessages,
    packets::{SetColor, SetLightPower},
    serial::Serial,
    set64::Set64,
};

/// Canvas units per device-reported position unit.
pub const USER_SCALE: f64 = 8.0;

/// How a part's colors are turned into packets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgOptions {
    /// Ask the device to acknowledge every packet.
    pub acks: bool,
    /// Transition duration in seconds.
    pub duration: f64,
    /// Use the part's random orientation instead of its measured one.
    pub randomize: bool,
    /// Prepend a power-on packet.
    pub power_on: bool,
}

impl Default for MsgOptions {
    fn default() -> Self {
        Self {
            acks: false,
            duration: 1.0,
            randomize: false,
            power_on: false,
        }
    }
}

/// One rectangular sub-unit of a device (a tile, or a whole strip or bulb).
///
/// Identity is `(device serial, part_number)`; position, size and colors don't take part in
/// equality, so a moved part still finds itself in sets and maps.
#[derive(Debug, Clone)]
pub struct Part {
    device: Arc<Device>,
    part_number: u8,
    user_x: f64,
    user_y: f64,
    reported: (f64, f64),
    width: u32,
    height: u32,
    bounds: Bounds,
    points: Arc<[Point]>,
    /// Measured orientation.
    pub orientation: Orientation,
    /// Alternative orientation used when an animation asks for random orientations.
    pub random_orientation: Orientation,
    original_colors: Option<Arc<[Color]>>,
    colors: Option<Arc<[Color]>>,
}

impl Part {
    pub fn new(
        device: Arc<Device>,
        part_number: u8,
        user_x: f64,
        user_y: f64,
        width: u32,
        height: u32,
    ) -> Self {
        let mut part = Self {
            device,
            part_number,
            user_x,
            user_y,
            reported: (user_x, user_y),
            width,
            height,
            bounds: Bounds::new(0, 0, 0, 0),
            points: Arc::from(Vec::new()),
            orientation: Orientation::RightSideUp,
            random_orientation: Orientation::RightSideUp,
            original_colors: None,
            colors: None,
        };
        part.update(user_x, user_y, width, height);
        part
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Pick the random orientation once, from the caller's generator.
    pub fn with_random_orientation<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.random_orientation = Orientation::random(rng);
        self
    }

    /// Colors read off the device when it was attached, in canvas order.
    pub fn with_original_colors(mut self, colors: Vec<Color>) -> Self {
        self.original_colors = Some(Arc::from(colors));
        self
    }

    pub fn key(&self) -> (Serial, u8) {
        (self.device.serial, self.part_number)
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn serial(&self) -> Serial {
        self.device.serial
    }

    pub fn part_number(&self) -> u8 {
        self.part_number
    }

    pub fn user_x(&self) -> f64 {
        self.user_x
    }

    pub fn user_y(&self) -> f64 {
        self.user_y
    }

    /// Position the device reported, kept across [`Part::relocated`] and [`Part::update`].
    pub fn reported_position(&self) -> (f64, f64) {
        self.reported
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn left(&self) -> i32 {
        self.bounds.left
    }

    pub fn right(&self) -> i32 {
        self.bounds.right
    }

    pub fn top(&self) -> i32 {
        self.bounds.top
    }

    pub fn bottom(&self) -> i32 {
        self.bounds.bottom
    }

    /// Points covered by this part, top row first.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn original_colors(&self) -> Option<&[Color]> {
        self.original_colors.as_deref()
    }

    /// Colors most recently sent to this part, in canvas order.
    pub fn colors(&self) -> Option<&[Color]> {
        self.colors.as_deref()
    }

    pub fn set_colors(&mut self, colors: Vec<Color>) {
        self.colors = Some(Arc::from(colors));
    }

    /// Move or resize the part, recomputing its rectangle and points.
    pub fn update(&mut self, user_x: f64, user_y: f64, width: u32, height: u32) {
        self.user_x = user_x;
        self.user_y = user_y;
        self.width = width;
        self.height = height;

        let left = (user_x * USER_SCALE) as i32;
        let top = (user_y * USER_SCALE) as i32;
        self.bounds = Bounds::new(left, left + width as i32, top, top - height as i32);
        self.points = self.bounds.all_points().collect();
    }

    /// Same part, placed somewhere else.
    pub fn relocated(&self, user_x: f64, user_y: f64) -> Self {
        let mut part = self.clone();
        part.update(user_x, user_y, self.width, self.height);
        part
    }

    pub fn reorient<T: Clone>(&self, colors: &[T], randomize: bool) -> Vec<T> {
        let o = if randomize {
            self.random_orientation
        } else {
            self.orientation
        };
        o.reorient(colors, self.width as usize, self.height as usize)
    }

    /// Colors as read from the device back into canvas order.
    pub fn reverse_orient<T: Clone>(&self, colors: &[T]) -> Vec<T> {
        self.orientation
            .reverse_reorient(colors, self.width as usize, self.height as usize)
    }

    /// Packets that put `colors` (canvas order, one per point) on this part.
    pub fn msgs(&self, colors: &[Color], opts: &MsgOptions) -> Vec<Message> {
        let serial = self.device.serial;
        let mut msgs = Vec::new();
        if opts.power_on {
            msgs.push(Message::SetLightPower(SetLightPower::new(
                serial,
                u16::MAX,
                opts.duration,
            )));
        }

        let cap = &self.device.cap;
        if cap.has_matrix {
            let colors = self.reorient(colors, opts.randomize);
            msgs.push(Message::Set64(Set64::for_tile(
                serial,
                self.part_number,
                u8::try_from(self.width).unwrap_or(u8::MAX),
                opts.duration,
                opts.acks,
                &colors,
            )));
        } else if cap.has_multizone {
            msgs.extend(MultizoneMessages::new(serial, cap, colors, opts.duration).msgs());
        } else if let Some(first) = colors.first() {
            msgs.push(Message::SetColor(SetColor::new(
                serial,
                *first,
                opts.duration,
            )));
        }
        msgs
    }
}

impl PartialEq for Part {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Part {}

impl Hash for Part {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Part {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Part {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
