//! Built-in animations for trying things out without any devices.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    event::{AnimationEvent, Step},
    settings::AnimationSettings,
    traits::Animation,
};
use crate::{
    canvas::{color::Color, point::Point, store::Canvas},
    foundation::error::CanvasResult,
};

/// A rainbow moving left to right across every part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Sweep {
    /// Degrees of hue the pattern moves per tick.
    pub speed: f64,
    /// Degrees of hue between neighbouring columns.
    pub spread: f64,
    pub brightness: f64,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            speed: 6.0,
            spread: 4.0,
            brightness: 0.6,
        }
    }
}

impl Animation for Sweep {
    type State = f64;

    fn name(&self) -> &str {
        "sweep"
    }

    fn settings(&self) -> AnimationSettings {
        let mut settings = AnimationSettings {
            every: 0.1,
            ..AnimationSettings::default()
        };
        settings.layout.coords_straight = true;
        settings
    }

    fn process_event(&mut self, event: AnimationEvent<'_>, offset: &mut f64) -> CanvasResult<Step> {
        if !event.is_tick() {
            return Ok(Step::Continue);
        }
        *offset = (*offset + self.speed).rem_euclid(360.0);

        let (start, spread, brightness) = (*offset, self.spread, self.brightness);
        let mut canvas = Canvas::new();
        canvas.set_default_color_fn(move |point: Point| {
            let hue = (start + f64::from(point.col) * spread).rem_euclid(360.0);
            Some(Color::new(hue, 1.0, brightness, 3500))
        });
        Ok(Step::Frame(canvas))
    }
}

/// Random points that fade in and out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Twinkles {
    pub num_twinkles: usize,
    pub fade_in_speed: f64,
    pub fade_out_speed: f64,
}

impl Default for Twinkles {
    fn default() -> Self {
        Self {
            num_twinkles: 20,
            fade_in_speed: 0.125,
            fade_out_speed: 0.078,
        }
    }
}

#[derive(Debug, Default)]
pub struct TwinklesState {
    twinkles: HashMap<Point, (Color, bool)>,
}

impl TwinklesState {
    pub fn len(&self) -> usize {
        self.twinkles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.twinkles.is_empty()
    }
}

impl Twinkles {
    fn place<R: Rng + ?Sized>(&self, state: &mut TwinklesState, rng: &mut R, points: &[Point]) {
        if points.is_empty() {
            return;
        }
        let missing = self.num_twinkles.saturating_sub(state.twinkles.len());
        if missing == 0 {
            return;
        }
        for _ in 0..rng.random_range(0..=missing) {
            let point = points[rng.random_range(0..points.len())];
            let brightness = f64::from(rng.random_range(1..10u8)) / 10.0;
            let color = Color::new(
                f64::from(rng.random_range(0..360u16)),
                f64::from(rng.random_range(5..10u8)) / 10.0,
                brightness,
                rng.random_range(2500..9000),
            );
            state
                .twinkles
                .entry(point)
                .or_insert((color, brightness < 0.6));
        }
    }

    fn fade(&self, state: &mut TwinklesState) {
        state.twinkles.retain(|_, (color, _)| color.brightness > 0.0);
        for (color, rising) in state.twinkles.values_mut() {
            if *rising {
                color.brightness += self.fade_out_speed;
                if color.brightness >= 1.0 {
                    color.brightness = 1.0;
                    *rising = false;
                }
            } else {
                color.brightness = (color.brightness - self.fade_in_speed).max(0.0);
            }
        }
    }
}

impl Animation for Twinkles {
    type State = TwinklesState;

    fn name(&self) -> &str {
        "twinkles"
    }

    fn settings(&self) -> AnimationSettings {
        let mut settings = AnimationSettings::default();
        settings.layout.coords_straight = true;
        settings
    }

    fn process_event(
        &mut self,
        mut event: AnimationEvent<'_>,
        state: &mut TwinklesState,
    ) -> CanvasResult<Step> {
        if !event.is_tick() {
            return Ok(Step::Continue);
        }
        let points: Vec<Point> = event.coords.all_points().collect();
        self.place(state, event.rng(), &points);
        self.fade(state);

        let mut canvas = Canvas::new();
        for (point, (color, _)) in &state.twinkles {
            canvas.set(*point, *color);
        }
        Ok(Step::Frame(canvas))
    }
}
