use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use crate::{
    foundation::error::CanvasResult,
    protocol::{message::Message, serial::Serial},
};

/// Packets for one device in one frame.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub serial: Serial,
    pub msgs: Vec<Message>,
}

/// Everything sent for one computed canvas.
#[derive(Debug, Clone)]
pub struct SentFrame {
    /// Frames sent so far by this runtime, starting at 0.
    pub index: u64,
    pub at: Instant,
    /// How long each device gets before its delivery counts as failed.
    pub message_timeout: Duration,
    pub deliveries: Vec<Delivery>,
}

impl SentFrame {
    pub fn serials(&self) -> impl Iterator<Item = Serial> + '_ {
        self.deliveries.iter().map(|d| d.serial)
    }

    pub fn msgs_for(&self, serial: Serial) -> Option<&[Message]> {
        self.deliveries
            .iter()
            .find(|d| d.serial == serial)
            .map(|d| d.msgs.as_slice())
    }
}

/// Receives frames in the order the runtime computes them.
///
/// `push_frame` must not wait for delivery; a slow device may not hold up the animation.
pub trait FrameSink: Send {
    fn push_frame(&mut self, frame: &SentFrame) -> CanvasResult<()>;
}

/// In-memory sink for tests and debugging. Clones share the recorded frames.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    frames: Arc<Mutex<Vec<SentFrame>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<SentFrame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for InMemorySink {
    fn push_frame(&mut self, frame: &SentFrame) -> CanvasResult<()> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.clone());
        Ok(())
    }
}
