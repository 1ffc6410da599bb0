//! Dispatch of computed frames to the transport.
//!
//! Every delivery runs as its own task, so one slow or unreachable device never holds up the
//! others in the same frame, nor the animation computing the next one. Frames for one device may
//! land out of order in fast mode; only [`Cannon::fire_first`] orders anything.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    sync::{Semaphore, watch},
    task::JoinSet,
    time::timeout,
};
use tracing::{debug, warn};

use super::transport::Transport;
use crate::{
    animation::sink::{FrameSink, SentFrame},
    foundation::error::{CanvasError, CanvasResult},
    protocol::{message::Message, serial::Serial},
};

/// Told about every failed delivery.
pub type ErrorSink = Arc<dyn Fn(Serial, &CanvasError) + Send + Sync>;

fn log_errors() -> ErrorSink {
    Arc::new(|serial: Serial, err: &CanvasError| warn!(%serial, error = %err, "delivery failed"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannonMode {
    /// Send everything straight away.
    Fast,
    /// At most `inflight_limit` sends per device at once. A frame that can't get a slot within
    /// `wait_timeout` is dropped for that device.
    Noisy {
        inflight_limit: usize,
        wait_timeout: Duration,
    },
}

struct Inner {
    transport: Arc<dyn Transport>,
    mode: CannonMode,
    errors: ErrorSink,
    tasks: Mutex<JoinSet<()>>,
    slots: Mutex<HashMap<Serial, Arc<Semaphore>>>,
    /// Flips to true once a device's leading send is done.
    gates: Mutex<HashMap<Serial, watch::Receiver<bool>>>,
}

/// Cheap to clone; clones share in-flight tasks.
#[derive(Clone)]
pub struct Cannon {
    inner: Arc<Inner>,
}

impl fmt::Debug for Cannon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cannon")
            .field("mode", &self.inner.mode)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Cannon {
    pub fn new(transport: Arc<dyn Transport>, mode: CannonMode) -> Self {
        Self::with_errors(transport, mode, log_errors())
    }

    pub fn fast(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, CannonMode::Fast)
    }

    pub fn noisy(transport: Arc<dyn Transport>, inflight_limit: usize, wait_timeout: Duration) -> Self {
        Self::new(
            transport,
            CannonMode::Noisy {
                inflight_limit: inflight_limit.max(1),
                wait_timeout,
            },
        )
    }

    pub fn with_errors(transport: Arc<dyn Transport>, mode: CannonMode, errors: ErrorSink) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                mode,
                errors,
                tasks: Mutex::new(JoinSet::new()),
                slots: Mutex::new(HashMap::new()),
                gates: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn mode(&self) -> CannonMode {
        self.inner.mode
    }

    /// Deliveries not finished yet.
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Send `msgs` to `serial` in the background. A send that takes longer than `limit` is a
    /// delivery failure for that device.
    ///
    /// Waits for an earlier [`fire_first`](Self::fire_first) to the same device before sending.
    pub fn fire(&self, serial: Serial, msgs: Vec<Message>, limit: Duration) {
        if msgs.is_empty() {
            return;
        }
        let gate = self
            .inner
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&serial)
            .cloned();
        let wait = async move {
            if let Some(mut gate) = gate {
                // Err means the leading send's task is gone; go ahead either way.
                let _ = gate.wait_for(|done| *done).await;
            }
        };
        self.spawn(serial, wait, msgs, limit, None);
    }

    /// Like [`fire`](Self::fire), but everything fired to `serial` afterwards waits until this
    /// send completes, fails or times out. Used to turn a device on before its first frame.
    pub fn fire_first(&self, serial: Serial, msgs: Vec<Message>, limit: Duration) {
        let (done, gate) = watch::channel(msgs.is_empty());
        self.inner
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(serial, gate);
        if msgs.is_empty() {
            return;
        }
        self.spawn(serial, std::future::ready(()), msgs, limit, Some(done));
    }

    fn spawn<W>(
        &self,
        serial: Serial,
        wait: W,
        msgs: Vec<Message>,
        limit: Duration,
        done: Option<watch::Sender<bool>>,
    ) where
        W: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            wait.await;
            let result = deliver(&inner, serial, msgs, limit).await;
            if let Some(done) = done {
                done.send_replace(true);
            }
            if let Err(err) = result {
                (inner.errors)(serial, &err);
            }
        });
    }

    /// Wait for every delivery fired so far, including ones fired while waiting.
    pub async fn drain(&self) {
        loop {
            let mut tasks = std::mem::take(
                &mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if tasks.is_empty() {
                return;
            }
            while tasks.join_next().await.is_some() {}
        }
    }
}

fn slot(inner: &Inner, serial: Serial, limit: usize) -> Arc<Semaphore> {
    let mut slots = inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(
        slots
            .entry(serial)
            .or_insert_with(|| Arc::new(Semaphore::new(limit))),
    )
}

async fn deliver(inner: &Inner, serial: Serial, msgs: Vec<Message>, limit: Duration) -> CanvasResult<()> {
    let _permit = match inner.mode {
        CannonMode::Fast => None,
        CannonMode::Noisy {
            inflight_limit,
            wait_timeout,
        } => {
            let sem = slot(inner, serial, inflight_limit);
            match timeout(wait_timeout, sem.acquire_owned()).await {
                Ok(Ok(permit)) => Some(permit),
                Ok(Err(_)) => return Err(CanvasError::Cancelled),
                Err(_) => {
                    debug!(%serial, "device still busy, dropping frame");
                    return Ok(());
                }
            }
        }
    };

    match timeout(limit, inner.transport.send(serial, msgs)).await {
        Ok(result) => result,
        Err(_) => Err(CanvasError::delivery(format!(
            "{serial} did not answer within {limit:?}"
        ))),
    }
}

impl FrameSink for Cannon {
    fn push_frame(&mut self, frame: &SentFrame) -> CanvasResult<()> {
        for delivery in &frame.deliveries {
            self.fire(delivery.serial, delivery.msgs.clone(), frame.message_timeout);
        }
        Ok(())
    }
}
