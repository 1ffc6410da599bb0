//! Tilecanvas paints animations onto matrix and strip lights.
//!
//! The pieces, bottom up:
//!
//! - A sparse [`Canvas`] of colors over a shared point grid, with [`Part`]s placing each tile or
//!   strip on it
//! - [`Coords`] and the layout strategies that decide where parts sit
//! - Hand-packed wire packets ([`Set64`] and friends) built straight from canvas colors
//! - An [`AnimationRuntime`] that ticks an [`Animation`] and pushes frames into a [`FrameSink`]
//! - An [`AnimationRunner`] that discovers devices and keeps animations running on them
#![forbid(unsafe_code)]

pub mod animation;
pub mod canvas;
pub mod foundation;
pub mod layout;
pub mod protocol;
pub mod runner;

pub use crate::animation::background::Background;
pub use crate::animation::event::{AnimationEvent, EventKind, Step};
pub use crate::animation::runtime::{AnimationRuntime, Ending, Phase};
pub use crate::animation::settings::{AnimationSettings, SettingsOverrides};
pub use crate::animation::sink::{FrameSink, InMemorySink, SentFrame};
pub use crate::animation::traits::{Animation, DynAnimation, boxed};
pub use crate::canvas::color::Color;
pub use crate::canvas::part::Part;
pub use crate::canvas::point::{Bounds, Point};
pub use crate::canvas::store::Canvas;
pub use crate::foundation::error::{CanvasError, CanvasResult};
pub use crate::foundation::shutdown::Shutdown;
pub use crate::layout::coords::{ChainItem, Coords, DeviceCoords};
pub use crate::layout::rearrange::LayoutFlags;
pub use crate::protocol::message::Message;
pub use crate::protocol::serial::Serial;
pub use crate::protocol::set64::Set64;
pub use crate::runner::options::RunOptions;
pub use crate::runner::{AnimationRunner, Playlist, PlaylistItem};
