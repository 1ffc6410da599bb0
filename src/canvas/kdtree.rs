//! Static 2-d tree over stored canvas points for nearest-neighbour queries.

use std::collections::BinaryHeap;

use super::{color::Color, point::Point};

/// Balanced tree laid out implicitly in one vector: each range's middle element splits it.
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    items: Vec<(Point, Color)>,
}

fn axis_value(point: &Point, axis: usize) -> i32 {
    if axis == 0 { point.col } else { point.row }
}

fn build(items: &mut [(Point, Color)], depth: usize) {
    if items.len() <= 1 {
        return;
    }
    let axis = depth % 2;
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| {
        axis_value(&a.0, axis)
            .cmp(&axis_value(&b.0, axis))
            .then(a.0.cmp(&b.0))
    });
    let (left, right) = items.split_at_mut(mid);
    build(left, depth + 1);
    build(&mut right[1..], depth + 1);
}

impl KdTree {
    pub fn new(points: impl IntoIterator<Item = (Point, Color)>) -> Self {
        let mut items: Vec<_> = points.into_iter().collect();
        build(&mut items, 0);
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Up to `k` entries closest to `target` as `(squared distance, point, color)`, nearest first.
    pub fn nearest(&self, target: Point, k: usize) -> Vec<(i64, Point, Color)> {
        if k == 0 || self.items.is_empty() {
            return Vec::new();
        }
        let mut best = BinaryHeap::with_capacity(k + 1);
        self.search(0, self.items.len(), 0, target, k, &mut best);

        let mut found: Vec<(i64, usize)> = best.into_vec();
        found.sort_unstable();
        found
            .into_iter()
            .map(|(dist, i)| (dist, self.items[i].0, self.items[i].1))
            .collect()
    }

    fn search(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        target: Point,
        k: usize,
        best: &mut BinaryHeap<(i64, usize)>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let point = self.items[mid].0;
        let dist = point.distance_sq(&target);

        if best.len() < k {
            best.push((dist, mid));
        } else if best.peek().is_some_and(|&(worst, _)| dist < worst) {
            best.pop();
            best.push((dist, mid));
        }

        let axis = depth % 2;
        let diff = i64::from(axis_value(&target, axis)) - i64::from(axis_value(&point, axis));
        let (near, far) = if diff < 0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };

        self.search(near.0, near.1, depth + 1, target, k, best);
        let must_cross = best.len() < k || best.peek().is_some_and(|&(worst, _)| diff * diff < worst);
        if must_cross {
            self.search(far.0, far.1, depth + 1, target, k, best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute(points: &[(Point, Color)], target: Point, k: usize) -> Vec<i64> {
        let mut d: Vec<i64> = points.iter().map(|(p, _)| p.distance_sq(&target)).collect();
        d.sort_unstable();
        d.truncate(k);
        d
    }

    #[test]
    fn matches_brute_force() {
        let points: Vec<(Point, Color)> = (0..40)
            .map(|i| {
                let p = Point::new((i * 7) % 13 - 6, (i * 5) % 11 - 5);
                (p, Color::new(f64::from(i), 1.0, 1.0, 3500))
            })
            .collect();
        let tree = KdTree::new(points.clone());
        for target in [Point::new(0, 0), Point::new(-6, 5), Point::new(10, -10)] {
            for k in [1, 2, 5] {
                let got: Vec<i64> = tree.nearest(target, k).iter().map(|r| r.0).collect();
                assert_eq!(got, brute(&points, target, k), "{target:?} k={k}");
            }
        }
    }

    #[test]
    fn empty_tree_finds_nothing() {
        assert!(KdTree::default().nearest(Point::new(0, 0), 3).is_empty());
        let tree = KdTree::new([(Point::new(1, 1), Color::WHITE)]);
        assert_eq!(tree.nearest(Point::new(1, 1), 4).len(), 1);
    }
}
