//! Finds devices and keeps animations running on them.
//!
//! The runner polls discovery on a fixed interval. Devices it has not seen before are turned on
//! and handed to an animation: the shared one when devices are combined, or a fresh one per
//! device otherwise. The run ends when it is cancelled or when every animation has finished.

pub mod cannon;
pub mod memory;
pub mod options;
pub mod transport;

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::{
    sync::mpsc,
    task::JoinSet,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

use self::{
    cannon::{Cannon, CannonMode, ErrorSink},
    options::RunOptions,
    transport::{DiscoveredDevice, Discovery, Transport},
};
use crate::{
    animation::{
        background::Background,
        device::AnimationDevice,
        runtime::AnimationRuntime,
        traits::{Animation, DynAnimation, boxed},
    },
    canvas::device::Device,
    foundation::{
        error::{CanvasError, CanvasResult},
        shutdown::Shutdown,
    },
    layout::coords::DeviceCoords,
    protocol::{message::Message, packets::SetLightPower, serial::Serial},
};

/// Makes a fresh animation each time a playlist reaches it.
pub type AnimationFactory = Arc<dyn Fn() -> Box<dyn DynAnimation> + Send + Sync>;

/// Serials already claimed by a runner. Share one set between runners that must not fight over
/// the same devices.
pub type KnownSerials = Arc<Mutex<HashSet<Serial>>>;

/// Per-device send limit for reinstating colors at the end of a run.
const REINSTATE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct PlaylistItem {
    make: AnimationFactory,
    background: Background,
}

impl PlaylistItem {
    pub fn new<F>(make: F, background: Background) -> Self
    where
        F: Fn() -> Box<dyn DynAnimation> + Send + Sync + 'static,
    {
        Self {
            make: Arc::new(make),
            background,
        }
    }

    /// Plays a copy of `animation` each time.
    pub fn of<A>(animation: A, background: Background) -> Self
    where
        A: Animation + Clone + Sync,
    {
        Self::new(move || boxed(animation.clone()), background)
    }

    pub fn background(&self) -> Background {
        self.background
    }
}

impl fmt::Debug for PlaylistItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaylistItem")
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

/// Animations played in order on every runtime the runner starts.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    items: Vec<PlaylistItem>,
    transition: Option<PlaylistItem>,
    repeat: bool,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(item: PlaylistItem) -> Self {
        Self::new().then(item)
    }

    pub fn then(mut self, item: PlaylistItem) -> Self {
        self.items.push(item);
        self
    }

    /// Played between two animations unless the first one sets `skip_next_transition`.
    pub fn with_transition(mut self, item: PlaylistItem) -> Self {
        self.transition = Some(item);
        self
    }

    /// Start over after the last animation instead of finishing.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct AnimationRunner {
    transport: Arc<dyn Transport>,
    discovery: Arc<dyn Discovery>,
    options: RunOptions,
    playlist: Arc<Playlist>,
    shutdown: Shutdown,
    known: KnownSerials,
    errors: Option<ErrorSink>,
}

impl AnimationRunner {
    /// `shutdown` ends the run when cancelled; the runner cancels it itself once every
    /// animation has finished, so pass a child of any handle that must outlive the run.
    pub fn new(
        transport: Arc<dyn Transport>,
        discovery: Arc<dyn Discovery>,
        options: RunOptions,
        playlist: Playlist,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            transport,
            discovery,
            options,
            playlist: Arc::new(playlist),
            shutdown,
            known: KnownSerials::default(),
            errors: None,
        }
    }

    pub fn with_known_serials(mut self, known: KnownSerials) -> Self {
        self.known = known;
        self
    }

    /// Told about every failed delivery instead of logging it.
    pub fn with_errors(mut self, errors: ErrorSink) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn known_serials(&self) -> KnownSerials {
        Arc::clone(&self.known)
    }

    fn cannon(&self) -> Cannon {
        let mode = match self.options.noisy_network.inflight_limit() {
            Some(inflight_limit) => CannonMode::Noisy {
                inflight_limit: inflight_limit.max(1),
                wait_timeout: self.options.message_timeout(),
            },
            None => CannonMode::Fast,
        };
        let transport = Arc::clone(&self.transport);
        match &self.errors {
            Some(errors) => Cannon::with_errors(transport, mode, Arc::clone(errors)),
            None => Cannon::new(transport, mode),
        }
    }

    /// Run until cancelled or until every animation has finished.
    #[tracing::instrument(skip_all, fields(combined = self.options.combined))]
    pub async fn run(self) -> CanvasResult<()> {
        self.options.validate()?;
        let cannon = self.cannon();
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut tasks = JoinSet::new();
        let mut combined: Option<mpsc::UnboundedSender<AnimationDevice>> = None;
        let mut reinstate: Vec<(Serial, Vec<Message>)> = Vec::new();

        let mut rediscover = interval(self.options.rediscover_every());
        rediscover.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "animation task failed");
                    }
                    if tasks.is_empty() {
                        info!("every animation has finished");
                        self.shutdown.cancel();
                        break;
                    }
                },
                _ = rediscover.tick() => {
                    let devices = self.collect_devices(&mut rng).await;
                    for device in &devices {
                        let serial = device.serial();
                        reinstate.push((serial, device.reinstate_msgs().to_vec()));
                        let on = SetLightPower::new(serial, u16::MAX, 1.0);
                        cannon.fire_first(serial, vec![Message::SetLightPower(on)], self.options.message_timeout());
                    }
                    if !devices.is_empty() {
                        self.start_animations(devices, &cannon, &mut rng, &mut combined, &mut tasks);
                    }
                },
            }
        }

        drop(combined);
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "animation task failed");
            }
        }
        cannon.drain().await;

        if self.options.reinstate_on_end {
            info!(devices = reinstate.len(), "reinstating device colors");
            for (serial, msgs) in reinstate {
                cannon.fire(serial, msgs, REINSTATE_TIMEOUT);
            }
            cannon.drain().await;
        }
        Ok(())
    }

    fn start_animations(
        &self,
        devices: Vec<AnimationDevice>,
        cannon: &Cannon,
        rng: &mut StdRng,
        combined: &mut Option<mpsc::UnboundedSender<AnimationDevice>>,
        tasks: &mut JoinSet<()>,
    ) {
        if !self.options.combined {
            for device in devices {
                let mut runtime = self.runtime(cannon, rng);
                runtime.attach(device);
                tasks.spawn(animate(runtime, Arc::clone(&self.playlist)));
            }
            return;
        }

        if let Some(tx) = combined.as_ref() {
            for device in devices {
                let serial = device.serial();
                if tx.send(device).is_err() {
                    debug!(%serial, "combined animation already over");
                }
            }
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut runtime = self.runtime(cannon, rng).with_arrivals(rx);
        for device in devices {
            runtime.attach(device);
        }
        tasks.spawn(animate(runtime, Arc::clone(&self.playlist)));
        *combined = Some(tx);
    }

    fn runtime(&self, cannon: &Cannon, rng: &mut StdRng) -> AnimationRuntime {
        AnimationRuntime::new(cannon.clone(), self.shutdown.clone())
            .with_seed(rng.random())
            .with_overrides(self.options.animation_options)
    }

    /// Devices found since the last round, ready to animate.
    async fn collect_devices(&self, rng: &mut StdRng) -> Vec<AnimationDevice> {
        let described = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Vec::new(),
            described = self.describe_new() => described,
        };
        let described = match described {
            Ok(described) => described,
            Err(err) => {
                warn!(error = %err, "discovery failed");
                return Vec::new();
            }
        };

        let mut devices = Vec::with_capacity(described.len());
        for found in described {
            let fresh = self
                .known
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(found.serial);
            if !fresh {
                continue;
            }
            if found.chain.is_empty() {
                debug!(serial = %found.serial, "device reported no chain, skipping");
                continue;
            }
            info!(serial = %found.serial, parts = found.chain.len(), "found device");
            devices.push(self.prepare(found, rng));
        }
        devices
    }

    async fn describe_new(&self) -> CanvasResult<Vec<DiscoveredDevice>> {
        let serials = self.discovery.find().await?;
        let fresh: Vec<Serial> = {
            let known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
            serials.into_iter().filter(|s| !known.contains(s)).collect()
        };
        if fresh.is_empty() {
            return Ok(Vec::new());
        }
        self.discovery.describe(&fresh).await
    }

    fn prepare(&self, found: DiscoveredDevice, rng: &mut StdRng) -> AnimationDevice {
        let device = Arc::new(Device::new(found.serial, found.capability));
        let colors = (!found.colors.is_empty()).then_some(found.colors.as_slice());
        let coords = DeviceCoords::from_chain(device, &found.chain, colors, rng);
        AnimationDevice::new(coords, self.options.reinstate_duration)
    }
}

/// Play the playlist on one runtime until it is done or the run is cancelled.
async fn animate(mut runtime: AnimationRuntime, playlist: Arc<Playlist>) {
    let mut skip_transition = true;
    loop {
        let mut played = false;
        for item in &playlist.items {
            if !skip_transition && let Some(transition) = &playlist.transition {
                match play(&mut runtime, transition).await {
                    Ok(()) => {}
                    Err(CanvasError::Cancelled) => return,
                    Err(err) => warn!(error = %err, "transition could not start"),
                }
            }
            match play(&mut runtime, item).await {
                Ok(()) => played = true,
                Err(CanvasError::Cancelled) => return,
                Err(err) => error!(error = %err, "animation could not start"),
            }
            skip_transition = runtime.settings().skip_next_transition;
        }
        if !playlist.repeat || !played {
            return;
        }
    }
}

async fn play(runtime: &mut AnimationRuntime, item: &PlaylistItem) -> CanvasResult<()> {
    let ending = runtime.run((item.make)(), item.background).await?;
    debug!(?ending, frames = runtime.frames_sent(), "playlist item done");
    Ok(())
}
