//! The shared sparse pixel store and the device parts painted onto it.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use super::{
    color::Color,
    kdtree::KdTree,
    part::{MsgOptions, Part},
    point::{Bounds, Point},
};
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::protocol::{message::Message, serial::Serial};

/// Procedural color source consulted by [`Canvas::get`].
pub type ColorFn = Arc<dyn Fn(Point) -> Option<Color> + Send + Sync>;

/// One source of colors for [`Canvas::layered_msgs`]. `None` defers to the next layer.
pub trait Layer {
    fn color(&self, point: Point, canvas: &Canvas) -> Option<Color>;
}

impl<F> Layer for F
where
    F: Fn(Point, &Canvas) -> Option<Color>,
{
    fn color(&self, point: Point, canvas: &Canvas) -> Option<Color> {
        self(point, canvas)
    }
}

/// How [`Canvas::get`] resolves a point.
///
/// Priority is fixed: a computed function first, then stored points, then a fallback function
/// for points that aren't stored.
#[derive(Clone, Default)]
pub enum Fill {
    /// Stored points only.
    #[default]
    Stored,
    /// The function wins whenever it yields a color.
    Computed(ColorFn),
    /// Stored points, then the function for anything missing.
    Fallback(ColorFn),
    /// Computed, then stored, then fallback.
    Layered { computed: ColorFn, fallback: ColorFn },
}

impl Fill {
    fn computed(&self) -> Option<&ColorFn> {
        match self {
            Fill::Computed(f) | Fill::Layered { computed: f, .. } => Some(f),
            _ => None,
        }
    }

    fn fallback(&self) -> Option<&ColorFn> {
        match self {
            Fill::Fallback(f) | Fill::Layered { fallback: f, .. } => Some(f),
            _ => None,
        }
    }

    fn is_stored(&self) -> bool {
        matches!(self, Fill::Stored)
    }
}

impl fmt::Debug for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Fill::Stored => "Stored",
            Fill::Computed(_) => "Computed",
            Fill::Fallback(_) => "Fallback",
            Fill::Layered { .. } => "Layered",
        })
    }
}

/// Key identifying a part: `(device serial, part number)`.
pub type PartKey = (Serial, u8);

/// Packets and resolved colors for one part.
#[derive(Debug, Clone)]
pub struct PartFrame {
    pub key: PartKey,
    pub msgs: Vec<Message>,
    /// Colors sent, in canvas order (before orientation is applied).
    pub colors: Vec<Color>,
}

/// Sparse 2-d color store plus the parts registered on it.
///
/// Bounds only ever grow: they cover every point ever set and every part ever added, and deleting
/// points leaves them alone.
#[derive(Clone, Default)]
pub struct Canvas {
    points: HashMap<Point, Color>,
    parts: Vec<Part>,
    part_index: HashMap<PartKey, usize>,
    point_to_parts: HashMap<Point, Vec<PartKey>>,
    bounds: Option<Bounds>,
    fill: Fill,
    spatial: Option<OnceLock<KdTree>>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("points", &self.points.len())
            .field("parts", &self.parts.len())
            .field("bounds", &self.bounds)
            .field("fill", &self.fill)
            .field("spatial", &self.spatial.is_some())
            .finish()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvas that supports [`Canvas::closest_points`] and blurring.
    pub fn with_spatial_index() -> Self {
        Self {
            spatial: Some(OnceLock::new()),
            ..Self::default()
        }
    }

    /// Copy of this canvas with spatial queries enabled.
    pub fn clone_with_index(&self) -> Self {
        let mut canvas = self.clone();
        canvas.spatial = Some(OnceLock::new());
        canvas
    }

    pub fn has_spatial_index(&self) -> bool {
        self.spatial.is_some()
    }

    fn invalidate_index(&mut self) {
        if self.spatial.is_some() {
            self.spatial = Some(OnceLock::new());
        }
    }

    fn grow(&mut self, bounds: Bounds) {
        self.bounds = Some(match self.bounds {
            Some(current) => current.union(&bounds),
            None => bounds,
        });
    }

    pub fn fill(&self) -> &Fill {
        &self.fill
    }

    pub fn set_fill(&mut self, fill: Fill) {
        self.fill = fill;
    }

    /// Colors from `f` override stored points.
    pub fn set_color_fn<F>(&mut self, f: F)
    where
        F: Fn(Point) -> Option<Color> + Send + Sync + 'static,
    {
        let computed: ColorFn = Arc::new(f);
        self.fill = match self.fill.fallback() {
            Some(fallback) => Fill::Layered {
                computed,
                fallback: Arc::clone(fallback),
            },
            None => Fill::Computed(computed),
        };
    }

    /// Colors from `f` fill points that aren't stored.
    pub fn set_default_color_fn<F>(&mut self, f: F)
    where
        F: Fn(Point) -> Option<Color> + Send + Sync + 'static,
    {
        let fallback: ColorFn = Arc::new(f);
        self.fill = match self.fill.computed() {
            Some(computed) => Fill::Layered {
                computed: Arc::clone(computed),
                fallback,
            },
            None => Fill::Fallback(fallback),
        };
    }

    pub fn get(&self, point: Point) -> Option<Color> {
        if let Some(color) = self.fill.computed().and_then(|f| f(point)) {
            return Some(color);
        }
        if let Some(color) = self.points.get(&point) {
            return Some(*color);
        }
        self.fill.fallback().and_then(|f| f(point))
    }

    /// The stored color only, ignoring fill functions.
    pub fn stored(&self, point: Point) -> Option<Color> {
        self.points.get(&point).copied()
    }

    pub fn set(&mut self, point: Point, color: Color) {
        if self.points.insert(point, color).is_none() {
            self.grow(point.bounds());
        }
        self.invalidate_index();
    }

    pub fn delete(&mut self, point: Point) -> Option<Color> {
        let removed = self.points.remove(&point);
        if removed.is_some() {
            self.invalidate_index();
        }
        removed
    }

    pub fn contains(&self, point: Point) -> bool {
        self.points.contains_key(&point)
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when there is nothing to draw: no parts, no points and no fill function.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.points.is_empty() && self.fill.is_stored()
    }

    /// Stored `(point, color)` pairs in no particular order.
    pub fn pairs(&self) -> impl Iterator<Item = (Point, Color)> + '_ {
        self.points.iter().map(|(p, c)| (*p, *c))
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Middle of the bounds, or the origin for an empty canvas.
    pub fn center(&self) -> Point {
        match self.bounds {
            Some(b) => Point::new(b.left + b.width() / 2, b.bottom + b.height() / 2),
            None => Point::new(0, 0),
        }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, key: PartKey) -> Option<&Part> {
        self.part_index.get(&key).map(|i| &self.parts[*i])
    }

    pub fn part_mut(&mut self, key: PartKey) -> Option<&mut Part> {
        self.part_index.get(&key).map(|i| &mut self.parts[*i])
    }

    pub fn devices(&self) -> Vec<Serial> {
        let mut serials: Vec<Serial> = self.parts.iter().map(Part::serial).collect();
        serials.sort();
        serials.dedup();
        serials
    }

    pub fn parts_for_point(&self, point: Point) -> Vec<&Part> {
        self.point_to_parts
            .get(&point)
            .into_iter()
            .flatten()
            .filter_map(|key| self.part(*key))
            .collect()
    }

    pub fn devices_for_point(&self, point: Point) -> Vec<Serial> {
        let mut serials: Vec<Serial> = self
            .parts_for_point(point)
            .into_iter()
            .map(Part::serial)
            .collect();
        serials.dedup();
        serials
    }

    pub fn add_part(&mut self, part: Part) {
        self.add_parts([(part, None)]);
    }

    /// Register parts, optionally painting each with its colors (canvas order, one per point).
    ///
    /// A part that is already registered is replaced, which is how moved parts are updated.
    pub fn add_parts<I>(&mut self, parts: I)
    where
        I: IntoIterator<Item = (Part, Option<Vec<Color>>)>,
    {
        for (part, colors) in parts {
            let key = part.key();
            if let Some(old) = self.part(key).cloned() {
                for point in old.points() {
                    if let Some(keys) = self.point_to_parts.get_mut(point) {
                        keys.retain(|k| *k != key);
                    }
                }
            }

            if let Some(colors) = colors {
                for (point, color) in part.points().iter().zip(colors) {
                    self.set(*point, color);
                }
            }
            for point in part.points() {
                self.point_to_parts.entry(*point).or_default().push(key);
            }
            self.grow(part.bounds());

            match self.part_index.get(&key) {
                Some(i) => self.parts[*i] = part,
                None => {
                    self.part_index.insert(key, self.parts.len());
                    self.parts.push(part);
                }
            }
        }
    }

    /// One canvas holding every part and stored point of `canvases`. Later canvases win where
    /// they overlap.
    pub fn combine<'a, I>(canvases: I) -> Self
    where
        I: IntoIterator<Item = &'a Canvas>,
    {
        let mut combined = Self::new();
        for canvas in canvases {
            combined.add_parts(canvas.parts.iter().map(|part| (part.clone(), None)));
            for (point, color) in canvas.pairs() {
                combined.set(point, color);
            }
        }
        combined
    }

    /// Drop every part belonging to `serial`; their points stay painted.
    pub fn remove_device(&mut self, serial: Serial) {
        self.parts.retain(|p| p.serial() != serial);
        self.part_index = self
            .parts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.key(), i))
            .collect();
        for keys in self.point_to_parts.values_mut() {
            keys.retain(|(s, _)| *s != serial);
        }
    }

    /// True if every colored point on every part matches the given components.
    pub fn is_parts(
        &self,
        hue: Option<f64>,
        saturation: Option<f64>,
        brightness: Option<f64>,
        kelvin: Option<u16>,
    ) -> bool {
        self.parts
            .iter()
            .flat_map(|part| part.points().iter())
            .filter_map(|point| self.get(*point))
            .all(|c| {
                hue.is_none_or(|h| c.hue == h)
                    && saturation.is_none_or(|s| c.saturation == s)
                    && brightness.is_none_or(|b| c.brightness == b)
                    && kelvin.is_none_or(|k| c.kelvin == k)
            })
    }

    /// Point's color with some components replaced; missing points start from zero.
    pub fn override_color(
        &self,
        point: Point,
        hue: Option<f64>,
        saturation: Option<f64>,
        brightness: Option<f64>,
        kelvin: Option<u16>,
    ) -> Color {
        self.get(point)
            .unwrap_or(Color::ZERO)
            .clone_with(hue, saturation, brightness, kelvin)
    }

    /// Stored color shifted by the given amounts.
    ///
    /// Hue wraps around, saturation and brightness clamp to `0..=1` and kelvin saturates. With
    /// `ignore_empty`, points with no color or a zero color give `None`.
    pub fn adjust(
        &self,
        point: Point,
        hue_change: Option<f64>,
        saturation_change: Option<f64>,
        brightness_change: Option<f64>,
        kelvin_change: Option<i32>,
        ignore_empty: bool,
    ) -> Option<Color> {
        let current = self.points.get(&point).copied();
        if ignore_empty && current.is_none_or(|c| c == Color::ZERO) {
            return None;
        }
        let c = current.unwrap_or(Color::ZERO);
        let kelvin = i64::from(c.kelvin) + i64::from(kelvin_change.unwrap_or(0));
        Some(Color::new(
            (c.hue + hue_change.unwrap_or(0.0)).rem_euclid(360.0),
            (c.saturation + saturation_change.unwrap_or(0.0)).clamp(0.0, 1.0),
            (c.brightness + brightness_change.unwrap_or(0.0)).clamp(0.0, 1.0),
            u16::try_from(kelvin.max(0)).unwrap_or(u16::MAX),
        ))
    }

    /// Stored color made dimmer by `amount`, or `None` once it would reach black.
    pub fn dim(&self, point: Point, amount: f64) -> Option<Color> {
        let current = self.points.get(&point)?;
        let brightness = current.brightness - amount;
        (current.brightness > 0.0 && brightness > 0.0).then(|| current.with_brightness(brightness))
    }

    /// Average of the colors at `points`, skipping points with no color.
    pub fn average(&self, points: &[Point]) -> Color {
        Color::average(points.iter().filter_map(|p| self.get(*p)))
    }

    /// The 8 neighbours of `point`, or only the stored ones unless `all_points`.
    pub fn surrounding_points(&self, point: Point, all_points: bool) -> Vec<Point> {
        let Point { col, row } = point;
        [
            (col - 1, row + 1),
            (col, row + 1),
            (col + 1, row + 1),
            (col - 1, row),
            (col + 1, row),
            (col - 1, row - 1),
            (col, row - 1),
            (col + 1, row - 1),
        ]
        .into_iter()
        .map(Point::from)
        .filter(|p| all_points || self.points.contains_key(p))
        .collect()
    }

    pub fn has_neighbour(&self, point: Point) -> bool {
        !self.surrounding_points(point, false).is_empty()
    }

    /// Paint a part using tile-relative coordinates: `(0, 0)` is its top-left and `y` grows
    /// downwards. Returning `None` leaves that point alone.
    pub fn set_all_points_for_part<F>(&mut self, key: PartKey, mut f: F) -> CanvasResult<()>
    where
        F: FnMut(i32, i32) -> Option<Color>,
    {
        let part = self
            .part(key)
            .cloned()
            .ok_or_else(|| CanvasError::validation(format!("unknown part {}:{}", key.0, key.1)))?;
        let bounds = part.bounds();
        for point in part.points() {
            let rel = point.relative(&bounds);
            if let Some(color) = f(rel.col, rel.row) {
                self.set(*point, color);
            }
        }
        Ok(())
    }

    /// The `k` stored points nearest `point` as `(squared distance, color)`, nearest first.
    pub fn closest_points(&self, point: Point, k: usize) -> CanvasResult<Vec<(i64, Color)>> {
        let spatial = self.spatial.as_ref().ok_or_else(|| {
            CanvasError::configuration(
                "closest_points needs a canvas created with a spatial index",
            )
        })?;
        let tree = spatial.get_or_init(|| KdTree::new(self.pairs()));
        Ok(tree
            .nearest(point, k)
            .into_iter()
            .map(|(dist, _, color)| (dist, color))
            .collect())
    }

    /// Resolve every point of `parts` and build their packets.
    ///
    /// Points this canvas has no color for are asked of `fallback`, which sees the part and the
    /// point.
    pub fn messages_for<'p, I, F>(&self, parts: I, opts: &MsgOptions, mut fallback: F) -> Vec<PartFrame>
    where
        I: IntoIterator<Item = &'p Part>,
        F: FnMut(&Part, Point) -> Color,
    {
        let mut cache: HashMap<Point, Color> = HashMap::new();
        parts
            .into_iter()
            .map(|part| {
                let colors: Vec<Color> = part
                    .points()
                    .iter()
                    .map(|point| match cache.get(point) {
                        Some(c) => *c,
                        None => {
                            let c = self.get(*point).unwrap_or_else(|| fallback(part, *point));
                            cache.insert(*point, c);
                            c
                        }
                    })
                    .collect();
                PartFrame {
                    key: part.key(),
                    msgs: part.msgs(&colors, opts),
                    colors,
                }
            })
            .collect()
    }

    /// Packets for every registered part; unfilled points are sent as zero.
    pub fn msgs(&self, opts: &MsgOptions) -> Vec<Message> {
        self.messages_for(&self.parts, opts, |_, _| Color::ZERO)
            .into_iter()
            .flat_map(|frame| frame.msgs)
            .collect()
    }

    /// Packets for every registered part, with each point colored by `layers`.
    ///
    /// The first layer with a color wins, or with `average` every layer's color is averaged.
    /// No layers means the canvas's own colors. Points nothing colors are sent as zero. Each
    /// resolved color is also written to `onto`.
    pub fn layered_msgs(
        &self,
        layers: &[&dyn Layer],
        average: bool,
        opts: &MsgOptions,
        mut onto: Option<&mut Canvas>,
    ) -> Vec<Message> {
        let resolve = |point: Point| -> Option<Color> {
            if layers.is_empty() {
                return self.get(point);
            }
            let mut found = layers.iter().filter_map(|layer| layer.color(point, self));
            if !average {
                return found.next();
            }
            let colors: Vec<Color> = found.collect();
            (!colors.is_empty()).then(|| Color::average(colors))
        };

        let mut cache: HashMap<Point, Color> = HashMap::new();
        let mut msgs = Vec::new();
        for part in &self.parts {
            let colors: Vec<Color> = part
                .points()
                .iter()
                .map(|point| {
                    *cache.entry(*point).or_insert_with(|| {
                        let c = resolve(*point).unwrap_or(Color::ZERO);
                        if let Some(onto) = onto.as_deref_mut() {
                            onto.set(*point, c);
                        }
                        c
                    })
                })
                .collect();
            msgs.extend(part.msgs(&colors, opts));
        }
        msgs
    }

    /// Packets putting back the colors each part had when it was attached.
    pub fn restore_msgs(&self, duration: f64) -> Vec<Message> {
        let opts = MsgOptions {
            acks: true,
            duration,
            randomize: false,
            power_on: false,
        };
        self.parts
            .iter()
            .filter_map(|part| part.original_colors().map(|colors| part.msgs(colors, &opts)))
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::device::{Capability, Device};

    fn device(n: u8) -> Arc<Device> {
        Arc::new(Device::new(
            Serial([0xd0, 0x73, 0xd5, 0, 0, n]),
            Capability::matrix("Tile"),
        ))
    }

    fn red() -> Color {
        Color::new(0.0, 1.0, 1.0, 3500)
    }

    fn bulb(n: u8) -> Arc<Device> {
        Arc::new(Device::new(
            Serial([0xd0, 0x73, 0xd5, 0, 0, n]),
            Capability::bulb("Bulb"),
        ))
    }

    fn strip(n: u8, extended: bool) -> Arc<Device> {
        Arc::new(Device::new(
            Serial([0xd0, 0x73, 0xd5, 0, 0, n]),
            Capability::strip("Strip", extended),
        ))
    }

    #[test]
    fn bounds_grow_from_points() {
        let mut canvas = Canvas::new();
        assert_eq!(canvas.bounds(), None);
        canvas.set(Point::new(1, 2), red());
        assert_eq!(canvas.bounds().unwrap().as_tuple(), ((1, 1), (2, 2), (0, 0)));
        canvas.set(Point::new(-3, 5), red());
        assert_eq!(canvas.bounds().unwrap().as_tuple(), ((-3, 1), (5, 2), (4, 3)));
    }

    #[test]
    fn bounds_never_shrink_on_delete() {
        let mut canvas = Canvas::new();
        canvas.set(Point::new(0, 0), red());
        canvas.set(Point::new(10, 10), red());
        let before = canvas.bounds();
        canvas.delete(Point::new(10, 10));
        canvas.delete(Point::new(0, 0));
        assert_eq!(canvas.bounds(), before);
        assert_eq!(canvas.len(), 0);
    }

    #[test]
    fn bounds_cover_parts() {
        let mut canvas = Canvas::new();
        canvas.add_part(Part::new(device(1), 2, -1.0, 3.0, 7, 10));
        canvas.add_part(Part::new(device(1), 1, 0.0, 2.0, 8, 9));
        assert_eq!(canvas.bounds().unwrap().as_tuple(), ((-8, 8), (24, 7), (16, 17)));
    }

    #[test]
    fn add_parts_paints_and_indexes() {
        let mut canvas = Canvas::new();
        let part = Part::new(device(1), 0, 0.0, 1.0, 2, 2);
        let colors = vec![red(), Color::WHITE, red(), Color::WHITE];
        canvas.add_parts([(part.clone(), Some(colors))]);

        assert_eq!(canvas.get(Point::new(1, 8)), Some(Color::WHITE));
        assert_eq!(canvas.get(Point::new(0, 7)), Some(red()));
        assert_eq!(canvas.parts_for_point(Point::new(0, 7)), vec![&part]);
        assert_eq!(canvas.devices_for_point(Point::new(0, 7)), vec![part.serial()]);
        assert!(canvas.parts_for_point(Point::new(5, 5)).is_empty());

        let moved = part.relocated(1.0, 1.0);
        canvas.add_part(moved);
        assert_eq!(canvas.parts().len(), 1);
        assert!(canvas.parts_for_point(Point::new(0, 7)).is_empty());
        assert_eq!(canvas.parts()[0].left(), 8);
    }

    #[test]
    fn fill_priority() {
        let mut canvas = Canvas::new();
        canvas.set(Point::new(0, 0), red());
        assert_eq!(canvas.get(Point::new(1, 0)), None);

        canvas.set_default_color_fn(|_| Some(Color::WHITE));
        assert_eq!(canvas.get(Point::new(0, 0)), Some(red()));
        assert_eq!(canvas.get(Point::new(1, 0)), Some(Color::WHITE));

        canvas.set_color_fn(|p| (p.col == 0).then_some(Color::OFF));
        assert!(matches!(canvas.fill(), Fill::Layered { .. }));
        assert_eq!(canvas.get(Point::new(0, 0)), Some(Color::OFF));
        assert_eq!(canvas.get(Point::new(1, 0)), Some(Color::WHITE));
        assert_eq!(canvas.stored(Point::new(0, 0)), Some(red()));
    }

    #[test]
    fn emptiness() {
        let mut canvas = Canvas::new();
        assert!(canvas.is_empty());
        canvas.set_color_fn(|_| None);
        assert!(!canvas.is_empty());
    }

    #[test]
    fn closest_points_needs_index() {
        let canvas = Canvas::new();
        let err = canvas.closest_points(Point::new(0, 0), 2).unwrap_err();
        assert!(matches!(err, CanvasError::Configuration(_)));

        let mut canvas = canvas.clone_with_index();
        canvas.set(Point::new(3, 0), red());
        canvas.set(Point::new(0, 1), Color::WHITE);
        let found = canvas.closest_points(Point::new(0, 0), 2).unwrap();
        assert_eq!(found, vec![(1, Color::WHITE), (9, red())]);

        canvas.delete(Point::new(0, 1));
        assert_eq!(canvas.closest_points(Point::new(0, 0), 2).unwrap(), vec![(9, red())]);
    }

    #[test]
    fn dim_and_override() {
        let mut canvas = Canvas::new();
        canvas.set(Point::new(0, 0), red().with_brightness(0.5));
        assert_eq!(canvas.dim(Point::new(0, 0), 0.25).unwrap().brightness, 0.25);
        assert_eq!(canvas.dim(Point::new(0, 0), 0.5), None);
        assert_eq!(canvas.dim(Point::new(9, 9), 0.1), None);
        assert_eq!(
            canvas.override_color(Point::new(9, 9), Some(10.0), None, None, None),
            Color::new(10.0, 0.0, 0.0, 0)
        );
    }

    #[test]
    fn set_all_points_for_part_is_tile_relative() {
        let mut canvas = Canvas::new();
        let part = Part::new(device(2), 0, 1.0, 1.0, 2, 2);
        let key = part.key();
        canvas.add_part(part);
        canvas
            .set_all_points_for_part(key, |x, y| {
                (x == 1 && y == 1).then_some(Color::WHITE)
            })
            .unwrap();
        assert_eq!(canvas.len(), 1);
        assert_eq!(canvas.get(Point::new(9, 7)), Some(Color::WHITE));
        assert!(canvas.set_all_points_for_part((key.0, 9), |_, _| None).is_err());
    }

    #[test]
    fn msgs_cover_every_part() {
        let mut canvas = Canvas::new();
        canvas.add_part(Part::new(device(1), 0, 0.0, 0.0, 8, 8));
        canvas.add_part(Part::new(device(1), 1, 1.0, 0.0, 8, 8));
        canvas.set(Point::new(0, 0), red());
        let msgs = canvas.msgs(&MsgOptions::default());
        assert_eq!(msgs.len(), 2);

        let frames = canvas.messages_for(canvas.parts(), &MsgOptions::default(), |_, _| Color::WHITE);
        assert_eq!(frames[0].colors.len(), 64);
        assert_eq!(frames[0].colors[0], red());
        assert_eq!(
            frames[0].colors.iter().filter(|c| **c == Color::WHITE).count(),
            63
        );
        assert!(frames[1].colors.iter().all(|c| *c == Color::WHITE));
    }

    #[test]
    fn restore_uses_original_colors() {
        let mut canvas = Canvas::new();
        canvas.add_part(Part::new(device(1), 0, 0.0, 0.0, 8, 8).with_original_colors(vec![red(); 64]));
        canvas.add_part(Part::new(device(1), 1, 1.0, 0.0, 8, 8));
        let msgs = canvas.restore_msgs(2.0);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].ack_required());
    }

    #[test]
    fn adjust_shifts_stored_colors() {
        let mut canvas = Canvas::new();
        canvas.set(Point::new(0, 0), Color::new(350.0, 0.9, 0.5, 3500));
        canvas.set(Point::new(1, 0), Color::ZERO);

        let moved = canvas
            .adjust(Point::new(0, 0), Some(20.0), Some(0.5), Some(-0.2), Some(-500), true)
            .unwrap();
        assert_eq!(moved.hue, 10.0);
        assert_eq!(moved.saturation, 1.0);
        assert!((moved.brightness - 0.3).abs() < 1e-9);
        assert_eq!(moved.kelvin, 3000);

        let down = canvas
            .adjust(Point::new(0, 0), Some(-360.0), None, Some(-2.0), Some(-9000), true)
            .unwrap();
        assert_eq!((down.hue, down.brightness, down.kelvin), (350.0, 0.0, 0));

        assert_eq!(canvas.adjust(Point::new(1, 0), Some(5.0), None, None, None, true), None);
        assert_eq!(canvas.adjust(Point::new(7, 7), Some(5.0), None, None, None, true), None);
        assert_eq!(
            canvas.adjust(Point::new(7, 7), Some(5.0), None, Some(0.5), None, false),
            Some(Color::new(5.0, 0.0, 0.5, 0))
        );
    }

    #[test]
    fn combined_canvases_match_adding_everything_to_one() {
        let part1 = Part::new(device(1), 0, 0.0, 0.0, 8, 8);
        let colors1: Vec<Color> = (0..64).map(|i| Color::new(f64::from(i), 1.0, 1.0, 3500)).collect();
        let part2 = Part::new(device(1), 1, 1.0, 1.0, 8, 8);
        let colors2: Vec<Color> = (0..64)
            .map(|i| Color::new(f64::from(i + 100), 1.0, 1.0, 3500))
            .collect();

        let mut all = Canvas::new();
        all.add_parts([
            (part1.clone(), Some(colors1.clone())),
            (part2.clone(), Some(colors2.clone())),
        ]);
        let mut one = Canvas::new();
        one.add_parts([(part1, Some(colors1))]);
        let mut two = Canvas::new();
        two.add_parts([(part2, Some(colors2))]);

        let made = Canvas::combine([&one, &two]);

        let mut expected_parts = all.parts().to_vec();
        let mut made_parts = made.parts().to_vec();
        expected_parts.sort();
        made_parts.sort();
        assert_eq!(made_parts, expected_parts);

        let sorted = |c: &Canvas| {
            let mut pairs: Vec<(Point, Color)> = c.pairs().collect();
            pairs.sort_by_key(|(p, _)| (p.col, p.row));
            pairs
        };
        assert_eq!(sorted(&made), sorted(&all));
        assert_eq!(made.bounds(), all.bounds());

        let mut hues: Vec<f64> = made.pairs().map(|(_, c)| c.hue).collect();
        hues.sort_by(f64::total_cmp);
        let expected: Vec<f64> = (0..64).chain(100..164).map(f64::from).collect();
        assert_eq!(hues, expected);
    }

    #[test]
    fn layered_msgs_pick_first_or_average() {
        let mut canvas = Canvas::new();
        let part = Part::new(bulb(3), 0, 0.0, 0.0, 1, 1);
        let point = part.points()[0];
        canvas.add_part(part);

        let dim = |_: Point, _: &Canvas| Some(Color::new(120.0, 1.0, 0.2, 3500));
        let bright = |_: Point, _: &Canvas| Some(Color::new(120.0, 1.0, 0.6, 3500));
        let nothing = |_: Point, _: &Canvas| -> Option<Color> { None };
        let opts = MsgOptions::default();

        let sent = |msgs: Vec<Message>| match &msgs[..] {
            [Message::SetColor(m)] => m.color(),
            other => panic!("unexpected {other:?}"),
        };

        let first = sent(canvas.layered_msgs(&[&nothing, &dim, &bright], false, &opts, None));
        assert!((first.brightness - 0.2).abs() < 0.01);

        let mut onto = Canvas::new();
        let averaged = sent(canvas.layered_msgs(&[&dim, &nothing, &bright], true, &opts, Some(&mut onto)));
        assert!((averaged.brightness - 0.4).abs() < 0.01);
        assert!((averaged.hue - 120.0).abs() < 0.01);
        let stored = onto.get(point).unwrap();
        assert!((stored.brightness - 0.4).abs() < 1e-9);

        let empty = sent(canvas.layered_msgs(&[&nothing], true, &opts, None));
        assert_eq!(empty.brightness, 0.0);
    }

    #[test]
    fn long_extended_strip_is_sent_in_chunks() {
        let mut canvas = Canvas::new();
        let part = Part::new(strip(4, true), 0, 0.0, 0.0, 100, 1);
        let colors = (0..100).map(|i| Color::new(f64::from(i), 1.0, 1.0, 3500)).collect();
        canvas.add_parts([(part, Some(colors))]);

        let chunks: Vec<(u16, u8)> = canvas
            .msgs(&MsgOptions::default())
            .iter()
            .map(|msg| match msg {
                Message::SetExtendedColorZones(m) => (m.zone_index(), m.colors_count()),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(chunks, vec![(0, 82), (82, 18)]);
    }

    #[test]
    fn legacy_strip_is_sent_as_runs() {
        let mut canvas = Canvas::new();
        let part = Part::new(strip(5, false), 0, 0.0, 0.0, 10, 1);
        let blue = Color::new(240.0, 1.0, 1.0, 3500);
        let colors = [vec![red(); 5], vec![blue; 5]].concat();
        canvas.add_parts([(part, Some(colors))]);

        let runs: Vec<(u8, u8)> = canvas
            .msgs(&MsgOptions::default())
            .iter()
            .map(|msg| match msg {
                Message::SetColorZones(m) => (m.start_index(), m.end_index()),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(runs, vec![(0, 4), (5, 9)]);
    }
}
