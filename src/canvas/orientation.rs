//! Physical tile orientation and the color permutations it implies.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Four rotations, each optionally mirrored left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    RightSideUp,
    RotatedRight,
    UpsideDown,
    RotatedLeft,
    MirroredRightSideUp,
    MirroredRotatedRight,
    MirroredUpsideDown,
    MirroredRotatedLeft,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Self::RightSideUp,
        Self::RotatedRight,
        Self::UpsideDown,
        Self::RotatedLeft,
        Self::MirroredRightSideUp,
        Self::MirroredRotatedRight,
        Self::MirroredUpsideDown,
        Self::MirroredRotatedLeft,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    fn mirrored(self) -> bool {
        matches!(
            self,
            Self::MirroredRightSideUp
                | Self::MirroredRotatedRight
                | Self::MirroredUpsideDown
                | Self::MirroredRotatedLeft
        )
    }

    /// Clockwise quarter turns applied to canvas colors before they reach the device.
    fn quarter_turns(self) -> u8 {
        match self {
            Self::RightSideUp | Self::MirroredRightSideUp => 0,
            Self::RotatedLeft | Self::MirroredRotatedLeft => 1,
            Self::UpsideDown | Self::MirroredUpsideDown => 2,
            Self::RotatedRight | Self::MirroredRotatedRight => 3,
        }
    }

    /// Orientation whose reorder undoes this one on a square tile.
    pub fn reverse(self) -> Self {
        match self {
            Self::RotatedLeft => Self::RotatedRight,
            Self::RotatedRight => Self::RotatedLeft,
            other => other,
        }
    }

    /// `perm[i]` is the canvas index that lands at device index `i`.
    pub fn permutation(self, width: usize, height: usize) -> Vec<usize> {
        let turns = self.quarter_turns();
        let (out_w, out_h) = if turns % 2 == 1 {
            (height, width)
        } else {
            (width, height)
        };

        let mut perm = Vec::with_capacity(width * height);
        for y in 0..out_h {
            for x in 0..out_w {
                let (mut col, row) = match turns {
                    0 => (x, y),
                    1 => (y, height - 1 - x),
                    2 => (width - 1 - x, height - 1 - y),
                    _ => (width - 1 - y, x),
                };
                if self.mirrored() {
                    col = width - 1 - col;
                }
                perm.push(row * width + col);
            }
        }
        perm
    }

    /// Canvas row-major colors into device scan order.
    ///
    /// A list of 64 that doesn't fill `width * height` is treated as a full 8x8 tile. Any other
    /// mismatched length is returned unchanged.
    pub fn reorient<T: Clone>(self, items: &[T], width: usize, height: usize) -> Vec<T> {
        let Some((width, height)) = grid(items.len(), width, height) else {
            return items.to_vec();
        };
        if self == Self::RightSideUp {
            return items.to_vec();
        }
        self.permutation(width, height)
            .into_iter()
            .map(|i| items[i].clone())
            .collect()
    }

    /// Device scan order back into canvas row-major order; the exact inverse of [`reorient`].
    ///
    /// [`reorient`]: Orientation::reorient
    pub fn reverse_reorient<T: Clone>(self, items: &[T], width: usize, height: usize) -> Vec<T> {
        let Some((width, height)) = grid(items.len(), width, height) else {
            return items.to_vec();
        };
        if self == Self::RightSideUp {
            return items.to_vec();
        }
        let mut out = items.to_vec();
        for (device_index, canvas_index) in self.permutation(width, height).into_iter().enumerate()
        {
            out[canvas_index] = items[device_index].clone();
        }
        out
    }
}

fn grid(len: usize, width: usize, height: usize) -> Option<(usize, usize)> {
    if len == width * height {
        Some((width, height))
    } else if len == TILE_SIZE * TILE_SIZE {
        Some((TILE_SIZE, TILE_SIZE))
    } else {
        None
    }
}

const TILE_SIZE: usize = 8;

/// Orientation closest to an accelerometer reading taken from the tile.
///
/// A reading of all `-1` means the device couldn't measure, and face up/down both map to
/// [`Orientation::RightSideUp`].
pub fn nearest_orientation(x: i32, y: i32, z: i32) -> Orientation {
    if (x, y, z) == (-1, -1, -1) {
        return Orientation::RightSideUp;
    }

    let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
    if ax > ay && ax > az {
        if x > 0 {
            Orientation::RotatedRight
        } else {
            Orientation::RotatedLeft
        }
    } else if az > ax && az > ay {
        Orientation::RightSideUp
    } else if y > 0 {
        Orientation::UpsideDown
    } else {
        Orientation::RightSideUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_orientation_round_trips() {
        let colors: Vec<u32> = (0..64).collect();
        for o in Orientation::ALL {
            let there = o.reorient(&o.reverse_reorient(&colors, 8, 8), 8, 8);
            assert_eq!(there, colors, "{o:?}");
            let back = o.reverse_reorient(&o.reorient(&colors, 8, 8), 8, 8);
            assert_eq!(back, colors, "{o:?}");
        }
    }

    #[test]
    fn permutations_are_bijections_on_rectangles() {
        for o in Orientation::ALL {
            let mut perm = o.permutation(5, 3);
            perm.sort_unstable();
            assert_eq!(perm, (0..15).collect::<Vec<_>>(), "{o:?}");
        }
    }

    #[test]
    fn reverse_matches_inverse_on_squares() {
        let colors: Vec<u32> = (0..64).collect();
        for o in Orientation::ALL {
            assert_eq!(
                o.reverse().reorient(&colors, 8, 8),
                o.reverse_reorient(&colors, 8, 8),
                "{o:?}"
            );
        }
    }

    #[test]
    fn upside_down_reverses_the_list() {
        let colors: Vec<u32> = (0..4).collect();
        assert_eq!(
            Orientation::UpsideDown.reorient(&colors, 2, 2),
            vec![3, 2, 1, 0]
        );
        assert_eq!(
            Orientation::MirroredRightSideUp.reorient(&colors, 2, 2),
            vec![1, 0, 3, 2]
        );
    }

    #[test]
    fn odd_lengths_are_untouched() {
        let colors = vec![1, 2, 3];
        assert_eq!(Orientation::RotatedLeft.reorient(&colors, 8, 8), colors);
        assert_eq!(Orientation::RotatedLeft.reverse_reorient(&colors, 4, 5), colors);
    }

    #[test]
    fn full_tile_of_colors_on_a_small_part_turns_as_8x8() {
        let colors: Vec<usize> = (0..64).collect();
        let turned = Orientation::RotatedLeft.reorient(&colors, 4, 5);
        assert_ne!(turned, colors);
        assert_eq!(turned, Orientation::RotatedLeft.reorient(&colors, 8, 8));
        assert_eq!(Orientation::RotatedLeft.reverse_reorient(&turned, 4, 5), colors);
    }

    #[test]
    fn nearest_orientation_from_gravity() {
        assert_eq!(nearest_orientation(-1, -1, -1), Orientation::RightSideUp);
        assert_eq!(nearest_orientation(100, 5, 2), Orientation::RotatedRight);
        assert_eq!(nearest_orientation(-100, 5, 2), Orientation::RotatedLeft);
        assert_eq!(nearest_orientation(1, 100, 2), Orientation::UpsideDown);
        assert_eq!(nearest_orientation(1, -100, 2), Orientation::RightSideUp);
        assert_eq!(nearest_orientation(1, 2, 100), Orientation::RightSideUp);
    }
}
