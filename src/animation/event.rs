use std::{any::Any, fmt};

use rand::rngs::StdRng;

use super::{settings::AnimationSettings, sink::Delivery};
use crate::{canvas::store::Canvas, layout::coords::Coords, protocol::serial::Serial};

/// Payload produced by an animation's own event source.
pub type UserEvent = Box<dyn Any + Send>;

/// What happened.
pub enum EventKind<'a> {
    Started,
    NewDevice(Serial),
    Tick,
    UserEvent(UserEvent),
    /// The animation's event source failed.
    Error(anyhow::Error),
    /// The canvas returned for the last tick went out.
    SentMessages(&'a [Delivery]),
    Ended,
}

impl fmt::Debug for EventKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("Started"),
            Self::NewDevice(serial) => write!(f, "NewDevice({serial})"),
            Self::Tick => f.write_str("Tick"),
            Self::UserEvent(_) => f.write_str("UserEvent"),
            Self::Error(err) => write!(f, "Error({err})"),
            Self::SentMessages(d) => write!(f, "SentMessages({} devices)", d.len()),
            Self::Ended => f.write_str("Ended"),
        }
    }
}

/// What the animation wants after an event.
#[derive(Debug)]
pub enum Step {
    /// Nothing to send.
    Continue,
    /// The error event was dealt with. Anything else returned for an error ends the run.
    Handled,
    /// Send this canvas to every device. Only honoured for ticks and the end event.
    Frame(Canvas),
    /// Stop the animation.
    Finish(String),
}

impl Step {
    pub fn finish(reason: impl Into<String>) -> Self {
        Self::Finish(reason.into())
    }
}

/// An event handed to [`Animation::process_event`](super::traits::Animation::process_event).
pub struct AnimationEvent<'a> {
    pub kind: EventKind<'a>,
    /// The canvas last sent (or the start canvas).
    pub canvas: &'a Canvas,
    /// Every attached device's parts, placed for this animation.
    pub coords: &'a Coords,
    pub settings: &'a AnimationSettings,
    /// Ticks seen so far.
    pub iteration: u64,
    rng: &'a mut StdRng,
    new_every: &'a mut Option<f64>,
}

impl<'a> AnimationEvent<'a> {
    pub(crate) fn new(
        kind: EventKind<'a>,
        canvas: &'a Canvas,
        coords: &'a Coords,
        settings: &'a AnimationSettings,
        iteration: u64,
        rng: &'a mut StdRng,
        new_every: &'a mut Option<f64>,
    ) -> Self {
        Self {
            kind,
            canvas,
            coords,
            settings,
            iteration,
            rng,
            new_every,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self.kind, EventKind::Started)
    }

    pub fn is_new_device(&self) -> bool {
        matches!(self.kind, EventKind::NewDevice(_))
    }

    pub fn is_tick(&self) -> bool {
        matches!(self.kind, EventKind::Tick)
    }

    pub fn is_user_event(&self) -> bool {
        matches!(self.kind, EventKind::UserEvent(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error(_))
    }

    pub fn is_sent_messages(&self) -> bool {
        matches!(self.kind, EventKind::SentMessages(_))
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, EventKind::Ended)
    }

    /// The user event payload, if it is a `T`.
    pub fn user_event<T: Any>(&self) -> Option<&T> {
        match &self.kind {
            EventKind::UserEvent(value) => value.downcast_ref(),
            _ => None,
        }
    }

    /// Seeded generator for the run.
    pub fn rng(&mut self) -> &mut StdRng {
        self.rng
    }

    /// Tick every `seconds` from now on. The next tick is measured from the last one.
    pub fn change_every(&mut self, seconds: f64) {
        *self.new_every = Some(seconds);
    }
}

impl fmt::Debug for AnimationEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationEvent")
            .field("kind", &self.kind)
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}
