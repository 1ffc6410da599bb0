use std::{cmp::Ordering, f64::consts::PI, fmt, hash::Hash, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{CanvasError, CanvasResult};

/// Kelvin used whenever a color carries `0` or no kelvin at all.
pub const DEFAULT_KELVIN: u16 = 3500;

/// One HSBK color value.
///
/// `hue` is in degrees `[0, 360)`, `saturation` and `brightness` are in `[0, 1]`. Equality and
/// hashing compare the exact stored values.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Color {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
    pub kelvin: u16,
}

impl Color {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0);
    pub const WHITE: Self = Self::new(0.0, 0.0, 1.0, DEFAULT_KELVIN);
    /// Black at the default kelvin, used for "off" points.
    pub const OFF: Self = Self::new(0.0, 0.0, 0.0, DEFAULT_KELVIN);

    pub const fn new(hue: f64, saturation: f64, brightness: f64, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, u16) {
        (self.hue, self.saturation, self.brightness, self.kelvin)
    }

    pub fn with_hue(self, hue: f64) -> Self {
        Self { hue, ..self }
    }

    pub fn with_saturation(self, saturation: f64) -> Self {
        Self { saturation, ..self }
    }

    pub fn with_brightness(self, brightness: f64) -> Self {
        Self { brightness, ..self }
    }

    pub fn with_kelvin(self, kelvin: u16) -> Self {
        Self { kelvin, ..self }
    }

    /// Copy with any of the components replaced.
    pub fn clone_with(
        self,
        hue: Option<f64>,
        saturation: Option<f64>,
        brightness: Option<f64>,
        kelvin: Option<u16>,
    ) -> Self {
        Self::new(
            hue.unwrap_or(self.hue),
            saturation.unwrap_or(self.saturation),
            brightness.unwrap_or(self.brightness),
            kelvin.unwrap_or(self.kelvin),
        )
    }

    /// Circular mean of the hues, arithmetic mean of everything else.
    ///
    /// A kelvin of `0` counts as 3500. No colors at all averages to [`Color::WHITE`], and a list of
    /// identical colors averages to that color.
    pub fn average<I>(colors: I) -> Self
    where
        I: IntoIterator<Item = Color>,
    {
        let mut count = 0usize;
        let mut first: Option<Color> = None;
        let mut uniform = true;
        let (mut hue_x, mut hue_y) = (0.0f64, 0.0f64);
        let (mut saturation, mut brightness, mut kelvin) = (0.0f64, 0.0f64, 0u64);

        for color in colors {
            match first {
                None => first = Some(color),
                Some(f) if f != color => uniform = false,
                Some(_) => {}
            }
            let angle = color.hue * 2.0 * PI / 360.0;
            hue_x += angle.sin();
            hue_y += angle.cos();
            saturation += color.saturation;
            brightness += color.brightness;
            kelvin += if color.kelvin == 0 {
                u64::from(DEFAULT_KELVIN)
            } else {
                u64::from(color.kelvin)
            };
            count += 1;
        }

        let Some(first) = first else {
            return Self::WHITE;
        };
        // Identical inputs come back untouched rather than through the trig round trip.
        if uniform {
            return first;
        }

        let mut hue = hue_x.atan2(hue_y) / (2.0 * PI);
        if hue < 0.0 {
            hue += 1.0;
        }
        let n = count as f64;
        Self::new(
            hue * 360.0,
            saturation / n,
            brightness / n,
            (kelvin / count as u64) as u16,
        )
    }

    /// Keep this hue within 90 degrees of `other`, moving it towards `other` when further away.
    pub fn limit_distance_to(self, other: &Color) -> Self {
        let raw = (self.hue - other.hue).abs();
        let dist = if raw > 180.0 { 360.0 - raw } else { raw };
        if dist <= 90.0 {
            return self;
        }

        let mut hue = if (other.hue + dist).rem_euclid(360.0) == self.hue {
            self.hue + 90.0
        } else {
            self.hue - 90.0
        };
        if hue < 0.0 {
            hue += 360.0;
        }
        self.with_hue(hue)
    }

    fn key(&self) -> (u64, u64, u64, u16) {
        // +0.0 and -0.0 must hash the same since they compare equal.
        fn bits(v: f64) -> u64 {
            if v == 0.0 { 0 } else { v.to_bits() }
        }
        (
            bits(self.hue),
            bits(self.saturation),
            bits(self.brightness),
            self.kelvin,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::OFF
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Color {}

impl Hash for Color {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Color {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Color {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hue
            .total_cmp(&other.hue)
            .then(self.saturation.total_cmp(&other.saturation))
            .then(self.brightness.total_cmp(&other.brightness))
            .then(self.kelvin.cmp(&other.kelvin))
    }
}

impl From<(f64, f64, f64, u16)> for Color {
    fn from((h, s, b, k): (f64, f64, f64, u16)) -> Self {
        Self::new(h, s, b, k)
    }
}

impl From<Color> for (f64, f64, f64, u16) {
    fn from(c: Color) -> Self {
        c.as_tuple()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hue:{} saturation:{} brightness:{} kelvin:{}",
            self.hue, self.saturation, self.brightness, self.kelvin
        )
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Arr(Vec<f64>),
            Obj {
                #[serde(default)]
                hue: f64,
                #[serde(default)]
                saturation: f64,
                #[serde(default = "one")]
                brightness: f64,
                #[serde(default = "default_kelvin")]
                kelvin: u16,
            },
        }

        fn one() -> f64 {
            1.0
        }

        fn default_kelvin() -> u16 {
            DEFAULT_KELVIN
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Obj {
                hue,
                saturation,
                brightness,
                kelvin,
            } => Ok(Self::new(hue, saturation, brightness, kelvin)),
            Repr::Arr(v) => match v.as_slice() {
                [h, s, b] => Ok(Self::new(*h, *s, *b, DEFAULT_KELVIN)),
                [h, s, b, k] => Ok(Self::new(*h, *s, *b, k.clamp(0.0, 65535.0) as u16)),
                _ => Err(serde::de::Error::custom(
                    "hsbk array must have len 3 ([h,s,b]) or 4 ([h,s,b,k])",
                )),
            },
        }
    }
}

impl FromStr for Color {
    type Err = CanvasError;

    /// Accepts a color name, `#rrggbb`, or `hue:H saturation:S brightness:B kelvin:K` (any subset).
    fn from_str(s: &str) -> CanvasResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CanvasError::configuration("empty color string"));
        }

        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }

        if let Some(color) = named(s) {
            return Ok(color);
        }

        let mut color = Self::WHITE;
        for word in s.split_whitespace() {
            let Some((key, value)) = word.split_once(':') else {
                return Err(CanvasError::configuration(format!(
                    "unknown color \"{s}\""
                )));
            };
            let invalid =
                || CanvasError::configuration(format!("invalid {key} value \"{value}\""));
            match key {
                "hue" => color.hue = value.parse::<f64>().map_err(|_| invalid())?,
                "saturation" => color.saturation = value.parse::<f64>().map_err(|_| invalid())?,
                "brightness" => color.brightness = value.parse::<f64>().map_err(|_| invalid())?,
                "kelvin" => color.kelvin = value.parse::<u16>().map_err(|_| invalid())?,
                _ => {
                    return Err(CanvasError::configuration(format!(
                        "unknown color component \"{key}\""
                    )));
                }
            }
        }
        Ok(color)
    }
}

fn named(name: &str) -> Option<Color> {
    let hue = match name.to_ascii_lowercase().as_str() {
        "white" => return Some(Color::WHITE),
        "black" | "off" => return Some(Color::OFF),
        "red" => 0.0,
        "orange" => 36.0,
        "yellow" => 60.0,
        "green" => 120.0,
        "cyan" => 180.0,
        "blue" => 250.0,
        "purple" => 280.0,
        "pink" => 325.0,
        _ => return None,
    };
    Some(Color::new(hue, 1.0, 1.0, DEFAULT_KELVIN))
}

fn parse_hex(s: &str) -> CanvasResult<Color> {
    fn hex_byte(pair: &str) -> CanvasResult<f64> {
        u8::from_str_radix(pair, 16)
            .map(|v| f64::from(v) / 255.0)
            .map_err(|_| CanvasError::configuration(format!("invalid hex byte \"{pair}\"")))
    }

    if s.len() != 6 || !s.is_ascii() {
        return Err(CanvasError::configuration(
            "hex color must be #RRGGBB (case-insensitive)",
        ));
    }
    let (r, g, b) = (hex_byte(&s[0..2])?, hex_byte(&s[2..4])?, hex_byte(&s[4..6])?);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    Ok(Color::new(hue, saturation, max, DEFAULT_KELVIN))
}
