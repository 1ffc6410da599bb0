//! What devices show where an animation draws nothing.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    canvas::{color::Color, part::Part, point::Point, store::Canvas},
    foundation::error::{CanvasError, CanvasResult},
};

/// Background policy for an animation run.
///
/// Parsed from `clear`, `maintain`, `maintain:<color>`, `as_start` or `as_start:<color>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Background {
    /// Undrawn points are off.
    #[default]
    Clear,
    /// Undrawn points keep the colors the device had before the animation, or the given color.
    Maintain(Option<Color>),
    /// The first canvas starts with the device's colors, or the given color.
    AsStart(Option<Color>),
}

impl Background {
    /// Default used between animations of a playlist.
    pub fn for_transition() -> Self {
        Self::AsStart(None)
    }

    fn with_color(self, color: Option<Color>) -> Self {
        let color = color.map(|c| {
            if c.brightness == 0.0 {
                c.with_brightness(0.3)
            } else {
                c
            }
        });
        match self {
            Self::Clear => Self::Clear,
            Self::Maintain(_) => Self::Maintain(color),
            Self::AsStart(_) => Self::AsStart(color),
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self {
            Self::Clear => None,
            Self::Maintain(c) | Self::AsStart(c) => *c,
        }
    }

    /// Color for points nothing else covers.
    pub fn empty_color(&self) -> Color {
        self.color().unwrap_or(Color::OFF)
    }

    fn paints_plain(&self) -> bool {
        matches!(self, Self::Clear) || self.color().is_some()
    }

    /// Canvas kept behind the animation for the lifetime of a device, if this policy keeps one.
    pub fn background_canvas(&self, colors: &[Vec<Color>], parts: &[Part]) -> Option<Canvas> {
        matches!(self, Self::Maintain(_)).then(|| {
            let mut canvas = Canvas::new();
            self.add_to_canvas(&mut canvas, colors, parts);
            canvas
        })
    }

    /// Seed the first canvas of an animation for a device that joins mid-run.
    pub fn add_start(&self, canvas: &mut Canvas, colors: &[Vec<Color>], parts: &[Part]) {
        if matches!(self, Self::AsStart(_)) {
            self.add_to_canvas(canvas, colors, parts);
        }
    }

    /// Paint `parts` with either the plain background color or the device colors
    /// (one list per part, canvas order).
    pub fn add_to_canvas(&self, canvas: &mut Canvas, colors: &[Vec<Color>], parts: &[Part]) {
        if self.paints_plain() {
            let color = self.empty_color();
            for part in parts {
                for point in part.points() {
                    canvas.set(*point, color);
                }
            }
            return;
        }
        for (part, colors) in parts.iter().zip(colors) {
            for (point, color) in part.points().iter().zip(colors) {
                canvas.set(*point, *color);
            }
        }
    }

    /// Resolve a point the animation didn't draw.
    pub fn fallback(&self, background_canvas: Option<&Canvas>, point: Point) -> Color {
        background_canvas
            .and_then(|c| c.get(point))
            .unwrap_or_else(|| self.empty_color())
    }
}

impl FromStr for Background {
    type Err = CanvasError;

    fn from_str(s: &str) -> CanvasResult<Self> {
        let s = s.trim();
        let (name, color) = match s.split_once(':') {
            Some((name, color)) => (name, Some(color.parse::<Color>()?)),
            None => (s, None),
        };
        let base = match name {
            "clear" if color.is_none() => Self::Clear,
            "maintain" => Self::Maintain(None),
            "as_start" => Self::AsStart(None),
            _ => {
                return Err(CanvasError::configuration(format!(
                    "background must be clear, maintain, as_start, maintain:<color> or \
                     as_start:<color>, got {s:?}"
                )));
            }
        };
        Ok(base.with_color(color))
    }
}

impl TryFrom<String> for Background {
    type Error = CanvasError;

    fn try_from(value: String) -> CanvasResult<Self> {
        value.parse()
    }
}

impl From<Background> for String {
    fn from(value: Background) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, color) = match self {
            Self::Clear => ("clear", None),
            Self::Maintain(c) => ("maintain", *c),
            Self::AsStart(c) => ("as_start", *c),
        };
        match color {
            Some(c) => write!(
                f,
                "{name}:hue:{} saturation:{} brightness:{} kelvin:{}",
                c.hue, c.saturation, c.brightness, c.kelvin
            ),
            None => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        canvas::device::{Capability, Device},
        protocol::serial::Serial,
    };

    fn part() -> Part {
        let device = Arc::new(Device::new(
            Serial([0xd0, 0x73, 0xd5, 0, 0, 1]),
            Capability::matrix("Tile"),
        ));
        Part::new(device, 0, 0.0, 0.0, 2, 2)
    }

    fn device_colors() -> Vec<Vec<Color>> {
        vec![(0..4).map(|i| Color::new(f64::from(i) * 10.0, 1.0, 1.0, 3500)).collect()]
    }

    #[test]
    fn parses_every_form() {
        assert_eq!("clear".parse::<Background>().unwrap(), Background::Clear);
        assert_eq!(
            "maintain".parse::<Background>().unwrap(),
            Background::Maintain(None)
        );
        assert_eq!(
            "as_start".parse::<Background>().unwrap(),
            Background::AsStart(None)
        );
        let b: Background = "maintain:red".parse().unwrap();
        assert_eq!(b.color().unwrap().hue, 0.0);
        assert_eq!(b.color().unwrap().brightness, 1.0);
    }

    #[test]
    fn zero_brightness_color_is_raised() {
        let b: Background = "as_start:hue:120 brightness:0".parse().unwrap();
        assert_eq!(b.empty_color().brightness, 0.3);
        assert_eq!(b.empty_color().hue, 120.0);
    }

    #[test]
    fn bad_option_is_a_configuration_error() {
        for bad in ["paint", "clear:red", "maintain:notacolor", ""] {
            let err = bad.parse::<Background>().unwrap_err();
            assert!(
                err.to_string().starts_with("configuration error:"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn default_empty_color_is_off() {
        assert_eq!(Background::Clear.empty_color(), Color::new(0.0, 0.0, 0.0, 3500));
    }

    #[test]
    fn maintain_keeps_device_colors_behind_the_animation() {
        let bg = Background::Maintain(None);
        let p = part();
        let canvas = bg.background_canvas(&device_colors(), &[p.clone()]).unwrap();
        let first = p.points()[0];
        assert_eq!(bg.fallback(Some(&canvas), first).hue, 0.0);
        assert_eq!(bg.fallback(Some(&canvas), p.points()[3]).hue, 30.0);
        assert_eq!(bg.fallback(Some(&canvas), Point::new(100, 100)), Color::OFF);
        assert!(Background::Clear.background_canvas(&device_colors(), &[p]).is_none());
    }

    #[test]
    fn as_start_seeds_only_the_start_canvas() {
        let p = part();
        let mut canvas = Canvas::new();
        Background::Clear.add_start(&mut canvas, &device_colors(), &[p.clone()]);
        assert!(canvas.is_empty());
        Background::AsStart(None).add_start(&mut canvas, &device_colors(), &[p.clone()]);
        assert_eq!(canvas.get(p.points()[2]).unwrap().hue, 20.0);
    }

    #[test]
    fn plain_color_overrides_device_colors() {
        let p = part();
        let bg: Background = "as_start:blue".parse().unwrap();
        let mut canvas = Canvas::new();
        bg.add_to_canvas(&mut canvas, &device_colors(), &[p.clone()]);
        for point in p.points() {
            assert_eq!(canvas.get(*point).unwrap().hue, 250.0);
        }
    }

    #[test]
    fn serde_uses_the_string_form() {
        let b: Background = serde_json::from_str(r#""maintain""#).unwrap();
        assert_eq!(b, Background::Maintain(None));
        assert_eq!(serde_json::to_string(&Background::Clear).unwrap(), r#""clear""#);
        let round: Background =
            serde_json::from_str(&serde_json::to_string(&"as_start:green".parse::<Background>().unwrap()).unwrap())
                .unwrap();
        assert_eq!(round.empty_color().hue, 120.0);
    }
}
