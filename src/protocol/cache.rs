//! Process-wide bounded cache for the hot encode path.
//!
//! The same handful of colors are written into every frame, so their packed bytes are memoized.
//! The cache is created on first use, never cleared, and evicts least-recently-used entries past
//! its capacity. Targets need no cache: a [`Serial`](super::serial::Serial) already holds its
//! bytes.

use std::{
    num::NonZeroUsize,
    sync::{LazyLock, Mutex, PoisonError},
};

use lru::LruCache;

use crate::canvas::color::Color;

/// Default number of packed colors kept.
pub const COLOR_CACHE_CAPACITY: usize = 8000;

/// Bounded LRU map of packed colors.
#[derive(Debug)]
pub struct EncodeCache {
    colors: Mutex<LruCache<Color, [u8; 8]>>,
}

static GLOBAL: LazyLock<EncodeCache> = LazyLock::new(|| EncodeCache::new(COLOR_CACHE_CAPACITY));

impl EncodeCache {
    /// A capacity of zero is bumped to one.
    pub fn new(color_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(color_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            colors: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The shared cache used by every packet in the process.
    pub fn global() -> &'static EncodeCache {
        &GLOBAL
    }

    /// Packed `hue, saturation, brightness, kelvin` as four little-endian u16.
    pub fn color_bytes(&self, color: Color) -> [u8; 8] {
        let mut colors = self.colors.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bytes) = colors.get(&color) {
            return *bytes;
        }
        let bytes = pack_color(color);
        colors.put(color, bytes);
        bytes
    }

    pub fn colors_cached(&self) -> usize {
        self.colors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Scale a value into the 16-bit wire range; out-of-range input saturates.
pub(crate) fn scale_u16(value: f64, max: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    (65535.0 * (value / max)).round().clamp(0.0, 65535.0) as u16
}

pub(crate) fn pack_color(color: Color) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..2].copy_from_slice(&scale_u16(color.hue, 360.0).to_le_bytes());
    out[2..4].copy_from_slice(&scale_u16(color.saturation, 1.0).to_le_bytes());
    out[4..6].copy_from_slice(&scale_u16(color.brightness, 1.0).to_le_bytes());
    out[6..8].copy_from_slice(&color.kelvin.to_le_bytes());
    out
}

pub(crate) fn unpack_color(bytes: &[u8]) -> Color {
    let word = |i: usize| f64::from(u16::from_le_bytes([bytes[i], bytes[i + 1]]));
    Color::new(
        word(0) * 360.0 / 65535.0,
        word(2) / 65535.0,
        word(4) / 65535.0,
        u16::from_le_bytes([bytes[6], bytes[7]]),
    )
}
