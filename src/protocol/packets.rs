//! The smaller fixed-layout packets: single bulb color, power and strip zones.

use super::{
    cache::{EncodeCache, unpack_color},
    header::{self, Frame, HEADER_SIZE, read_u16, read_u32, secs_to_ms, write_u16, write_u32},
    serial::Serial,
};
use crate::canvas::color::Color;
use crate::foundation::error::{CanvasError, CanvasResult};

pub const SET_COLOR_TYPE: u16 = 102;
pub const SET_LIGHT_POWER_TYPE: u16 = 117;
pub const SET_COLOR_ZONES_TYPE: u16 = 501;
pub const SET_EXTENDED_COLOR_ZONES_TYPE: u16 = 510;

/// Zones carried by one extended multizone packet.
pub const EXTENDED_ZONES: usize = 82;

const SET_COLOR_SIZE: usize = HEADER_SIZE + 13;
const SET_LIGHT_POWER_SIZE: usize = HEADER_SIZE + 6;
const SET_COLOR_ZONES_SIZE: usize = HEADER_SIZE + 15;
const SET_EXTENDED_COLOR_ZONES_SIZE: usize = HEADER_SIZE + 8 + EXTENDED_ZONES * 8;

/// Zone apply mode: write the change immediately.
const APPLY: u8 = 1;

fn seeded<const N: usize>(pkt_type: u16, target: Serial) -> [u8; N] {
    let mut buf = [0u8; N];
    buf[..HEADER_SIZE].copy_from_slice(&header::template(pkt_type, N as u16));
    buf[8..16].copy_from_slice(&target.target());
    buf
}

fn parse<const N: usize>(bytes: &[u8], pkt_type: u16) -> CanvasResult<[u8; N]> {
    let buf: [u8; N] = bytes.try_into().map_err(|_| {
        CanvasError::protocol(format!(
            "message type {pkt_type} must be {N} bytes, got {}",
            bytes.len()
        ))
    })?;
    let got = read_u16(&buf, 32);
    if got != pkt_type {
        return Err(CanvasError::protocol(format!(
            "expected message type {pkt_type}, got {got}"
        )));
    }
    Ok(buf)
}

macro_rules! frame_impl {
    ($ty:ty) => {
        impl Frame for $ty {
            fn buf(&self) -> &[u8] {
                &self.buf[..]
            }

            fn buf_mut(&mut self) -> &mut [u8] {
                &mut self.buf[..]
            }
        }

        impl $ty {
            pub fn as_bytes(&self) -> &[u8] {
                &self.buf[..]
            }
        }
    };
}

/// Set one color on a whole device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetColor {
    buf: [u8; SET_COLOR_SIZE],
}

frame_impl!(SetColor);

impl SetColor {
    pub fn new(target: Serial, color: Color, duration: f64) -> Self {
        let mut buf = seeded::<SET_COLOR_SIZE>(SET_COLOR_TYPE, target);
        buf[37..45].copy_from_slice(&EncodeCache::global().color_bytes(color));
        write_u32(&mut buf, 45, secs_to_ms(duration));
        Self { buf }
    }

    pub fn from_bytes(bytes: &[u8]) -> CanvasResult<Self> {
        Ok(Self {
            buf: parse(bytes, SET_COLOR_TYPE)?,
        })
    }

    pub fn color(&self) -> Color {
        unpack_color(&self.buf[37..45])
    }

    pub fn duration(&self) -> f64 {
        f64::from(read_u32(&self.buf, 45)) / 1000.0
    }
}

/// Turn a device on or off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLightPower {
    buf: [u8; SET_LIGHT_POWER_SIZE],
}

frame_impl!(SetLightPower);

impl SetLightPower {
    pub fn new(target: Serial, level: u16, duration: f64) -> Self {
        let mut buf = seeded::<SET_LIGHT_POWER_SIZE>(SET_LIGHT_POWER_TYPE, target);
        write_u16(&mut buf, 36, level);
        write_u32(&mut buf, 38, secs_to_ms(duration));
        Self { buf }
    }

    pub fn from_bytes(bytes: &[u8]) -> CanvasResult<Self> {
        Ok(Self {
            buf: parse(bytes, SET_LIGHT_POWER_TYPE)?,
        })
    }

    pub fn level(&self) -> u16 {
        read_u16(&self.buf, 36)
    }

    pub fn duration(&self) -> f64 {
        f64::from(read_u32(&self.buf, 38)) / 1000.0
    }
}

/// Set an inclusive range of strip zones to one color (legacy multizone protocol).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetColorZones {
    buf: [u8; SET_COLOR_ZONES_SIZE],
}

frame_impl!(SetColorZones);

impl SetColorZones {
    pub fn new(target: Serial, start_index: u8, end_index: u8, color: Color, duration: f64) -> Self {
        let mut buf = seeded::<SET_COLOR_ZONES_SIZE>(SET_COLOR_ZONES_TYPE, target);
        buf[36] = start_index;
        buf[37] = end_index;
        buf[38..46].copy_from_slice(&EncodeCache::global().color_bytes(color));
        write_u32(&mut buf, 46, secs_to_ms(duration));
        buf[50] = APPLY;
        Self { buf }
    }

    pub fn from_bytes(bytes: &[u8]) -> CanvasResult<Self> {
        Ok(Self {
            buf: parse(bytes, SET_COLOR_ZONES_TYPE)?,
        })
    }

    pub fn start_index(&self) -> u8 {
        self.buf[36]
    }

    pub fn end_index(&self) -> u8 {
        self.buf[37]
    }

    pub fn color(&self) -> Color {
        unpack_color(&self.buf[38..46])
    }

    pub fn duration(&self) -> f64 {
        f64::from(read_u32(&self.buf, 46)) / 1000.0
    }
}

/// Set up to [`EXTENDED_ZONES`] strip zones in one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetExtendedColorZones {
    buf: Box<[u8; SET_EXTENDED_COLOR_ZONES_SIZE]>,
}

frame_impl!(SetExtendedColorZones);

impl SetExtendedColorZones {
    /// Colors past [`EXTENDED_ZONES`] are ignored; callers chunk longer strips.
    pub fn new(target: Serial, zone_index: u16, colors: &[Color], duration: f64) -> Self {
        let mut buf = Box::new(seeded::<SET_EXTENDED_COLOR_ZONES_SIZE>(
            SET_EXTENDED_COLOR_ZONES_TYPE,
            target,
        ));
        let count = colors.len().min(EXTENDED_ZONES);
        write_u32(&mut buf[..], 36, secs_to_ms(duration));
        buf[40] = APPLY;
        write_u16(&mut buf[..], 41, zone_index);
        buf[43] = count as u8;

        let cache = EncodeCache::global();
        for (slot, color) in buf[44..].chunks_exact_mut(8).zip(&colors[..count]) {
            slot.copy_from_slice(&cache.color_bytes(*color));
        }
        Self { buf }
    }

    pub fn from_bytes(bytes: &[u8]) -> CanvasResult<Self> {
        Ok(Self {
            buf: Box::new(parse(bytes, SET_EXTENDED_COLOR_ZONES_TYPE)?),
        })
    }

    pub fn duration(&self) -> f64 {
        f64::from(read_u32(&self.buf[..], 36)) / 1000.0
    }

    pub fn zone_index(&self) -> u16 {
        read_u16(&self.buf[..], 41)
    }

    pub fn colors_count(&self) -> u8 {
        self.buf[43]
    }

    /// The first `colors_count` zone colors.
    pub fn colors(&self) -> Vec<Color> {
        self.buf[44..]
            .chunks_exact(8)
            .take(usize::from(self.colors_count()))
            .map(unpack_color)
            .collect()
    }
}
