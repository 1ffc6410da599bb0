//! Strategies that re-place parts for different animation layouts.
//!
//! Every strategy works from each part's reported position, so running one again over parts it
//! already moved gives the same result.

use serde::{Deserialize, Serialize};

use crate::canvas::{
    part::{Part, USER_SCALE},
    store::Canvas,
};

/// Layout flags an animation asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutFlags {
    pub coords_separate: bool,
    pub coords_straight: bool,
    pub coords_vertically_aligned: bool,
}

/// Turns the full set of parts into their new placements.
///
/// The returned parts keep their identity; order doesn't matter.
pub trait Arrangement: Send + Sync {
    fn arrange(&self, parts: &[Part]) -> Vec<Part>;
}

/// Parts where their devices say they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsReported;

impl Arrangement for AsReported {
    fn arrange(&self, parts: &[Part]) -> Vec<Part> {
        parts
            .iter()
            .map(|p| {
                let (x, y) = p.reported_position();
                p.relocated(x, y)
            })
            .collect()
    }
}

/// Side by side, each keeping its reported height.
///
/// Devices keep the order they are given in. Within a device, parts go left to right by their
/// reported position.
#[derive(Debug, Clone, Copy, Default)]
pub struct Separate;

impl Arrangement for Separate {
    fn arrange(&self, parts: &[Part]) -> Vec<Part> {
        let mut devices: Vec<Vec<&Part>> = Vec::new();
        for part in parts {
            match devices.iter_mut().find(|d| d[0].serial() == part.serial()) {
                Some(device) => device.push(part),
                None => devices.push(vec![part]),
            }
        }

        let mut user_x = 0.0;
        devices
            .into_iter()
            .flat_map(|mut device| {
                device.sort_by(|a, b| {
                    let (ax, ay) = a.reported_position();
                    let (bx, by) = b.reported_position();
                    ax.total_cmp(&bx)
                        .then(ay.total_cmp(&by))
                        .then((a.width(), a.height()).cmp(&(b.width(), b.height())))
                        .then(a.part_number().cmp(&b.part_number()))
                });
                device
            })
            .map(|p| {
                let placed = p.relocated(user_x, p.reported_position().1);
                user_x += f64::from(p.width()) / USER_SCALE;
                placed
            })
            .collect()
    }
}

/// One row at height zero, ordered by reported x across every device.
#[derive(Debug, Clone, Copy, Default)]
pub struct Straight;

impl Arrangement for Straight {
    fn arrange(&self, parts: &[Part]) -> Vec<Part> {
        let mut sorted: Vec<&Part> = parts.iter().collect();
        sorted.sort_by(|a, b| {
            a.reported_position()
                .0
                .total_cmp(&b.reported_position().0)
                .then(a.key().cmp(&b.key()))
        });

        let mut user_x = 0.0;
        sorted
            .into_iter()
            .map(|p| {
                let placed = p.relocated(user_x, 0.0);
                user_x += f64::from(p.width()) / USER_SCALE;
                placed
            })
            .collect()
    }
}

/// Reported x, height zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerticalAlignment;

impl Arrangement for VerticalAlignment {
    fn arrange(&self, parts: &[Part]) -> Vec<Part> {
        parts
            .iter()
            .map(|p| p.relocated(p.reported_position().0, 0.0))
            .collect()
    }
}

/// The strategy selected by a set of layout flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rearranger {
    #[default]
    AsReported,
    Separate,
    Straight,
    VerticalAlignment,
}

impl Rearranger {
    /// Vertical alignment wins over straight, which wins over separate.
    pub fn from_flags(flags: LayoutFlags) -> Self {
        if flags.coords_vertically_aligned {
            Self::VerticalAlignment
        } else if flags.coords_straight {
            Self::Straight
        } else if flags.coords_separate {
            Self::Separate
        } else {
            Self::AsReported
        }
    }
}

impl Arrangement for Rearranger {
    fn arrange(&self, parts: &[Part]) -> Vec<Part> {
        match self {
            Self::AsReported => AsReported.arrange(parts),
            Self::Separate => Separate.arrange(parts),
            Self::Straight => Straight.arrange(parts),
            Self::VerticalAlignment => VerticalAlignment.arrange(parts),
        }
    }
}

/// New canvas holding the re-placed parts, optionally carrying the colors from their old spots.
pub fn rearrange(canvas: &Canvas, arrangement: &dyn Arrangement, keep_colors: bool) -> Canvas {
    let mut new = Canvas::new();
    for placed in arrangement.arrange(canvas.parts()) {
        let colors = keep_colors
            .then(|| canvas.part(placed.key()))
            .flatten()
            .map(|old| {
                old.points()
                    .iter()
                    .map(|p| canvas.get(*p))
                    .collect::<Vec<_>>()
            });
        let points = placed.points().to_vec();
        new.add_part(placed);
        if let Some(colors) = colors {
            for (point, color) in points.into_iter().zip(colors) {
                if let Some(color) = color {
                    new.set(point, color);
                }
            }
        }
    }
    new
}
