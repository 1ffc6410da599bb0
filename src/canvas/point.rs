use serde::{Deserialize, Serialize};

/// One logical pixel. Rows grow upwards; iteration goes from the highest row down.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Point {
    pub col: i32,
    pub row: i32,
}

impl Point {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Degenerate bounds covering just this point.
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.col, self.col, self.row, self.row)
    }

    /// Position relative to the top-left of `bounds`, with rows counted downwards.
    pub fn relative(&self, bounds: &Bounds) -> Point {
        Point::new(self.col - bounds.left, bounds.top - self.row)
    }

    /// Squared euclidean distance.
    pub fn distance_sq(&self, other: &Point) -> i64 {
        let dc = i64::from(self.col) - i64::from(other.col);
        let dr = i64::from(self.row) - i64::from(other.row);
        dc * dc + dr * dr
    }
}

impl From<(i32, i32)> for Point {
    fn from((col, row): (i32, i32)) -> Self {
        Self::new(col, row)
    }
}

/// Rectangle in canvas space: columns `left..right`, rows `top` down to (not including)
/// `bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Bounds {
    pub const fn new(left: i32, right: i32, top: i32, bottom: i32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.top - self.bottom
    }

    /// `((left, right), (top, bottom), (width, height))`.
    pub fn as_tuple(&self) -> ((i32, i32), (i32, i32), (i32, i32)) {
        (
            (self.left, self.right),
            (self.top, self.bottom),
            (self.width(), self.height()),
        )
    }

    /// Smallest bounds covering both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds::new(
            self.left.min(other.left),
            self.right.max(other.right),
            self.top.max(other.top),
            self.bottom.min(other.bottom),
        )
    }

    pub fn expand(&self, amount: i32) -> Bounds {
        Bounds::new(
            self.left - amount,
            self.right + amount,
            self.top + amount,
            self.bottom - amount,
        )
    }

    pub fn contains(&self, point: &Point) -> bool {
        (self.left..self.right).contains(&point.col) && point.row <= self.top && point.row > self.bottom
    }

    pub fn row(&self, row: i32) -> impl Iterator<Item = Point> + use<> {
        (self.left..self.right).map(move |col| Point::new(col, row))
    }

    pub fn col(&self, col: i32) -> impl Iterator<Item = Point> + use<> {
        ((self.bottom + 1)..=self.top)
            .rev()
            .map(move |row| Point::new(col, row))
    }

    /// Row numbers from the top down.
    pub fn rows(&self) -> impl Iterator<Item = i32> + use<> {
        ((self.bottom + 1)..=self.top).rev()
    }

    pub fn cols(&self) -> impl Iterator<Item = i32> + use<> {
        self.left..self.right
    }

    /// Every point, row by row from the top, each row left to right.
    pub fn all_points(&self) -> impl Iterator<Item = Point> + use<> {
        let bounds = *self;
        bounds.rows().flat_map(move |row| bounds.row(row))
    }

    pub fn count_points(&self) -> usize {
        (self.width().max(0) as usize) * (self.height().max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_order_lexicographically() {
        let mut points = vec![Point::new(1, 0), Point::new(0, 5), Point::new(0, -1)];
        points.sort();
        assert_eq!(
            points,
            vec![Point::new(0, -1), Point::new(0, 5), Point::new(1, 0)]
        );
    }

    #[test]
    fn all_points_goes_top_down() {
        let bounds = Bounds::new(1, 3, 5, 3);
        let points: Vec<_> = bounds.all_points().collect();
        assert_eq!(
            points,
            vec![
                Point::new(1, 5),
                Point::new(2, 5),
                Point::new(1, 4),
                Point::new(2, 4)
            ]
        );
        assert_eq!(bounds.count_points(), 4);
        assert!(bounds.contains(&Point::new(2, 4)));
        assert!(!bounds.contains(&Point::new(2, 3)));
    }

    #[test]
    fn expand_and_union() {
        let a = Bounds::new(0, 8, 16, 7);
        assert_eq!(a.expand(1), Bounds::new(-1, 9, 17, 6));
        let b = Bounds::new(-8, -1, 24, 14);
        assert_eq!(a.union(&b).as_tuple(), ((-8, 8), (24, 7), (16, 17)));
    }

    #[test]
    fn relative_counts_rows_down() {
        let bounds = Bounds::new(4, 12, 20, 12);
        assert_eq!(Point::new(5, 18).relative(&bounds), Point::new(1, 2));
    }
}
