//! Hand-packed "set 64 colors on a tile" packet.

use super::{
    cache::{EncodeCache, unpack_color},
    header::{self, Frame, HEADER_SIZE, read_u32, secs_to_ms, write_u32},
    serial::Serial,
};
use crate::canvas::color::Color;
use crate::foundation::error::{CanvasError, CanvasResult};

/// Message type of the tile color-set packet.
pub const SET64_TYPE: u16 = 715;
/// Colors carried by one packet.
pub const SET64_COLORS: usize = 64;
/// Total packet size in bytes.
pub const SET64_SIZE: usize = HEADER_SIZE + 10 + SET64_COLORS * 8;

const TILE_INDEX: usize = HEADER_SIZE;
const LENGTH: usize = HEADER_SIZE + 1;
const X: usize = HEADER_SIZE + 3;
const Y: usize = HEADER_SIZE + 4;
const WIDTH: usize = HEADER_SIZE + 5;
const DURATION: usize = HEADER_SIZE + 6;
const COLORS: usize = HEADER_SIZE + 10;

fn seed() -> [u8; SET64_SIZE] {
    let mut buf = [0u8; SET64_SIZE];
    buf[..HEADER_SIZE].copy_from_slice(&header::template(SET64_TYPE, SET64_SIZE as u16));
    buf[LENGTH] = 1;
    buf[WIDTH] = 8;
    buf
}

/// Fixed-size tile packet; every field is read and written in place.
///
/// Cloning copies the whole buffer, so a clone can be edited while the original is in flight.
#[derive(Clone, PartialEq, Eq)]
pub struct Set64 {
    buf: Box<[u8; SET64_SIZE]>,
}

impl std::fmt::Debug for Set64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Set64")
            .field("target", &self.target().ok())
            .field("tile_index", &self.tile_index())
            .field("width", &self.width())
            .field("duration", &self.duration())
            .field("ack_required", &self.ack_required())
            .finish_non_exhaustive()
    }
}

impl Default for Set64 {
    fn default() -> Self {
        Self {
            buf: Box::new(seed()),
        }
    }
}

impl Frame for Set64 {
    fn buf(&self) -> &[u8] {
        &self.buf[..]
    }

    fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }
}

impl Set64 {
    /// Packet for one tile with every common field filled in.
    pub fn for_tile(
        target: Serial,
        tile_index: u8,
        width: u8,
        duration: f64,
        ack_required: bool,
        colors: &[Color],
    ) -> Self {
        let mut msg = Self::default();
        msg.set_target(target);
        msg.set_tile_index(tile_index);
        msg.set_width(width);
        msg.set_duration(duration);
        msg.set_ack_required(ack_required);
        msg.set_colors(colors);
        msg
    }

    pub fn from_bytes(bytes: &[u8]) -> CanvasResult<Self> {
        let buf: [u8; SET64_SIZE] = bytes.try_into().map_err(|_| {
            CanvasError::protocol(format!(
                "Set64 must be {SET64_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        let msg = Self { buf: Box::new(buf) };
        if msg.pkt_type() != SET64_TYPE {
            return Err(CanvasError::protocol(format!(
                "expected message type {SET64_TYPE}, got {}",
                msg.pkt_type()
            )));
        }
        Ok(msg)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..]
    }

    pub fn tile_index(&self) -> u8 {
        self.buf[TILE_INDEX]
    }

    pub fn set_tile_index(&mut self, value: u8) {
        self.buf[TILE_INDEX] = value;
    }

    pub fn length(&self) -> u8 {
        self.buf[LENGTH]
    }

    pub fn set_length(&mut self, value: u8) {
        self.buf[LENGTH] = value;
    }

    pub fn x(&self) -> u8 {
        self.buf[X]
    }

    pub fn set_x(&mut self, value: u8) {
        self.buf[X] = value;
    }

    pub fn y(&self) -> u8 {
        self.buf[Y]
    }

    pub fn set_y(&mut self, value: u8) {
        self.buf[Y] = value;
    }

    pub fn width(&self) -> u8 {
        self.buf[WIDTH]
    }

    pub fn set_width(&mut self, value: u8) {
        self.buf[WIDTH] = value;
    }

    /// Transition duration in seconds.
    pub fn duration(&self) -> f64 {
        f64::from(self.duration_ms()) / 1000.0
    }

    pub fn duration_ms(&self) -> u32 {
        read_u32(&self.buf[..], DURATION)
    }

    pub fn set_duration(&mut self, secs: f64) {
        write_u32(&mut self.buf[..], DURATION, secs_to_ms(secs));
    }

    /// Decoded colors, quantized to the wire precision.
    pub fn colors(&self) -> Vec<Color> {
        self.buf[COLORS..]
            .chunks_exact(8)
            .map(unpack_color)
            .collect()
    }

    /// Write up to 64 colors; slots past the end of `colors` are left as they were.
    pub fn set_colors(&mut self, colors: &[Color]) {
        let cache = EncodeCache::global();
        for (slot, color) in self.buf[COLORS..]
            .chunks_exact_mut(8)
            .zip(colors.iter().take(SET64_COLORS))
        {
            slot.copy_from_slice(&cache.color_bytes(*color));
        }
    }
}
