//! Nearest-neighbour gap filling.

use super::{color::Color, point::Point, store::Canvas};
use crate::foundation::error::CanvasResult;

/// Neighbours consulted per point by [`filled_blur`].
pub const BLUR_NEIGHBOURS: usize = 2;

/// Repeat each color by how much closer it is than the furthest candidate.
///
/// A candidate at distance `d` appears `floor(max / d)` times; one at distance zero appears once.
pub fn weighted_points(candidates: &[(i64, Color)]) -> Vec<Color> {
    let Some(greatest) = candidates.iter().map(|(d, _)| *d).max() else {
        return Vec::new();
    };

    let mut weighted = Vec::with_capacity(candidates.len());
    for (dist, color) in candidates {
        if *dist == 0 {
            weighted.push(*color);
        } else {
            let copies = usize::try_from(greatest / dist).unwrap_or(0);
            weighted.extend(std::iter::repeat_n(*color, copies));
        }
    }
    weighted
}

/// Average of the distance-weighted candidates; no candidates gives [`Color::WHITE`].
pub fn weighted_average(candidates: &[(i64, Color)]) -> Color {
    Color::average(weighted_points(candidates))
}

/// Fill `points` from their nearest stored neighbours.
///
/// Every value is computed from the canvas as it was before the call, then written. Needs a
/// canvas with a spatial index.
pub fn filled_blur<I>(canvas: &mut Canvas, points: I) -> CanvasResult<()>
where
    I: IntoIterator<Item = Point>,
{
    let mut blurred = Vec::new();
    for point in points {
        let close = canvas.closest_points(point, BLUR_NEIGHBOURS)?;
        blurred.push((point, weighted_average(&close)));
    }
    for (point, color) in blurred {
        canvas.set(point, color);
    }
    Ok(())
}
