//! Drives animations over a set of devices.
//!
//! One runtime serves one canvas: a single device when devices are animated independently, or
//! every device when they share an animation. Animations run one after another on the same
//! runtime so devices keep their last colors between them.

use std::time::Duration;

use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    sync::mpsc,
    time::{Instant, sleep},
};
use tracing::{debug, error, info, warn};

use super::{
    background::Background,
    device::AnimationDevice,
    event::{AnimationEvent, EventKind, Step},
    settings::{AnimationSettings, SettingsOverrides},
    sink::{Delivery, FrameSink, SentFrame},
    ticker::Ticker,
    traits::DynAnimation,
};
use crate::{
    canvas::{part::Part, store::Canvas},
    foundation::{
        error::{CanvasError, CanvasResult},
        shutdown::Shutdown,
    },
    layout::coords::{Coords, DeviceCoords},
    protocol::serial::Serial,
};

/// Devices handed to a running animation.
pub type DeviceArrivals = mpsc::UnboundedReceiver<AnimationDevice>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Streaming,
    Ending,
    Done,
}

/// How an animation stopped, when it wasn't cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ending {
    /// The animation asked to stop, or failed and was stopped.
    Finished(String),
    /// Its ticker and event source ran out.
    Exhausted,
}

enum Halt {
    Finish(String),
    Cancelled,
}

type Flow<T> = Result<T, Halt>;

pub struct AnimationRuntime {
    devices: Vec<AnimationDevice>,
    reported: Coords,
    placed: Coords,
    canvas: Canvas,
    background: Background,
    settings: AnimationSettings,
    overrides: SettingsOverrides,
    sink: Box<dyn FrameSink>,
    shutdown: Shutdown,
    arrivals: Option<DeviceArrivals>,
    rng: StdRng,
    phase: Phase,
    active: bool,
    iteration: u64,
    frames_sent: u64,
    new_every: Option<f64>,
}

impl AnimationRuntime {
    pub fn new(sink: impl FrameSink + 'static, shutdown: Shutdown) -> Self {
        Self {
            devices: Vec::new(),
            reported: Coords::default(),
            placed: Coords::default(),
            canvas: Canvas::new(),
            background: Background::default(),
            settings: AnimationSettings::default(),
            overrides: SettingsOverrides::default(),
            sink: Box::new(sink),
            shutdown,
            arrivals: None,
            rng: StdRng::from_os_rng(),
            phase: Phase::NotStarted,
            active: false,
            iteration: 0,
            frames_sent: 0,
            new_every: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Devices sent on this channel join whichever animation is running.
    pub fn with_arrivals(mut self, arrivals: DeviceArrivals) -> Self {
        self.arrivals = Some(arrivals);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn devices(&self) -> &[AnimationDevice] {
        &self.devices
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Parts as placed for the current animation.
    pub fn coords(&self) -> &Coords {
        &self.placed
    }

    /// Settings of the current (or last) animation, overrides applied.
    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Register a device. While an animation runs its background is seeded and its colors
    /// computed from the current canvas; its first frame goes out with the next tick.
    pub fn attach(&mut self, mut device: AnimationDevice) {
        let serial = device.serial();
        self.reported.add_device(device.coords().clone());
        self.placed.add_device(device.coords().clone());

        if self.active {
            let placed = placed_parts(&self.placed, serial);
            if !self.settings.skip_background {
                self.background
                    .add_start(&mut self.canvas, device.colors(), placed);
            }
            device.set_animation(&self.settings, &self.background, placed);
            device.messages_for(&self.canvas, placed, &self.settings, &self.background);
        }

        match self.devices.iter_mut().find(|d| d.serial() == serial) {
            Some(existing) => *existing = device,
            None => self.devices.push(device),
        }
    }

    fn set_animation(&mut self, settings: AnimationSettings, background: Background) {
        self.settings = settings;
        self.background = background;
        self.canvas = Canvas::new();
        self.placed = self.reported.clone();
        self.placed.set_layout(settings.layout);

        for device in &mut self.devices {
            let placed = placed_parts(&self.placed, device.serial());
            if !self.settings.skip_background {
                self.background
                    .add_to_canvas(&mut self.canvas, device.colors(), placed);
            }
            device.set_animation(&self.settings, &self.background, placed);
        }

        self.active = true;
        self.iteration = 0;
        self.new_every = None;
        self.phase = Phase::NotStarted;
    }

    /// Play one animation until it finishes, runs out, or the run is cancelled.
    ///
    /// Once started, an animation always gets a settle frame: one tick interval after it stops,
    /// its end event is processed and the resulting canvas sent, even when cancelled.
    /// Cancellation is reported as [`CanvasError::Cancelled`] after that.
    #[tracing::instrument(skip_all, fields(animation = %animation.name()))]
    pub async fn run(
        &mut self,
        mut animation: Box<dyn DynAnimation>,
        background: Background,
    ) -> CanvasResult<Ending> {
        let mut settings = animation.settings();
        self.overrides.apply(&mut settings);
        settings.validate()?;
        self.set_animation(settings, background);
        let anim = animation.as_mut();

        info!(devices = self.devices.len(), %background, "animation starting");
        if let Err(halt) = self.dispatch(anim, EventKind::Started, false) {
            self.phase = Phase::Done;
            return finish(Err(halt));
        }

        self.phase = Phase::Streaming;
        let result = match self.announce_devices(anim) {
            Ok(()) => self.stream(anim).await,
            Err(halt) => Err(halt),
        };

        self.phase = Phase::Ending;
        self.settle(anim).await;
        self.phase = Phase::Done;

        finish(result)
    }

    fn announce_devices(&mut self, anim: &mut dyn DynAnimation) -> Flow<()> {
        let serials: Vec<Serial> = self.devices.iter().map(AnimationDevice::serial).collect();
        for serial in serials {
            self.dispatch(anim, EventKind::NewDevice(serial), false)?;
        }
        Ok(())
    }

    async fn stream(&mut self, anim: &mut dyn DynAnimation) -> Flow<Ending> {
        let mut ticker = Ticker::new(self.settings.tick_interval(), self.settings.max_time());
        let mut user = anim.user_events();
        let mut arrivals = self.arrivals.take();
        let shutdown = self.shutdown.clone();

        let result = loop {
            if ticker.is_done() && user.is_none() {
                break Ok(Ending::Exhausted);
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Err(Halt::Cancelled),
                device = async {
                    match arrivals.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => match device {
                    Some(device) => {
                        if let Err(halt) = self.join(anim, device) {
                            break Err(halt);
                        }
                    }
                    None => arrivals = None,
                },
                event = async {
                    match user.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    let step = match event {
                        Some(Ok(value)) => self.dispatch(anim, EventKind::UserEvent(value), false),
                        Some(Err(err)) => {
                            warn!(error = %err, "animation event source failed");
                            self.handle_error(anim, err).map(|()| None)
                        }
                        None => {
                            user = None;
                            Ok(None)
                        }
                    };
                    if let Err(halt) = step {
                        break Err(halt);
                    }
                },
                tick = ticker.tick(), if !ticker.is_done() => {
                    if let Some(iteration) = tick {
                        self.iteration = iteration;
                        if let Err(halt) = self.on_tick(anim) {
                            break Err(halt);
                        }
                    }
                },
            }

            if let Some(every) = self.take_new_every() {
                ticker.change_every(every);
            }
        };

        self.arrivals = arrivals;
        result
    }

    fn join(&mut self, anim: &mut dyn DynAnimation, device: AnimationDevice) -> Flow<()> {
        let serial = device.serial();
        info!(%serial, "device joined animation");
        self.attach(device);
        self.dispatch(anim, EventKind::NewDevice(serial), false)
            .map(|_| ())
    }

    fn on_tick(&mut self, anim: &mut dyn DynAnimation) -> Flow<()> {
        if self.devices.is_empty() {
            return Ok(());
        }
        if let Some(canvas) = self.dispatch(anim, EventKind::Tick, false)? {
            self.send_canvas(anim, canvas)?;
        }
        Ok(())
    }

    async fn settle(&mut self, anim: &mut dyn DynAnimation) {
        sleep(self.settings.tick_interval()).await;
        match self.dispatch(anim, EventKind::Ended, true) {
            Ok(Some(canvas)) => {
                if let Err(Halt::Finish(reason)) = self.send_canvas(anim, canvas) {
                    debug!(%reason, "finished while settling");
                }
            }
            Ok(None) => {}
            Err(Halt::Finish(reason)) => debug!(%reason, "end event finished"),
            Err(Halt::Cancelled) => {}
        }
    }

    fn send_canvas(&mut self, anim: &mut dyn DynAnimation, canvas: Canvas) -> Flow<()> {
        if canvas.is_empty() {
            return Ok(());
        }
        self.canvas = canvas;
        if self.devices.is_empty() {
            return Ok(());
        }

        let deliveries: Vec<Delivery> = self
            .devices
            .iter_mut()
            .map(|device| {
                let serial = device.serial();
                let placed = placed_parts(&self.placed, serial);
                let msgs =
                    device.messages_for(&self.canvas, placed, &self.settings, &self.background);
                Delivery { serial, msgs }
            })
            .collect();

        let frame = SentFrame {
            index: self.frames_sent,
            at: Instant::now(),
            message_timeout: self.settings.message_timeout(),
            deliveries,
        };
        self.frames_sent += 1;
        if let Err(err) = self.sink.push_frame(&frame) {
            warn!(error = %err, frame = frame.index, "frame sink rejected a frame");
        }

        self.dispatch(anim, EventKind::SentMessages(&frame.deliveries), false)
            .map(|_| ())
    }

    /// Hand an event to the animation. `force` delivers it even after cancellation.
    ///
    /// Returns the canvas to send, if the event may produce one.
    fn dispatch(
        &mut self,
        anim: &mut dyn DynAnimation,
        kind: EventKind<'_>,
        force: bool,
    ) -> Flow<Option<Canvas>> {
        let frames_allowed = matches!(kind, EventKind::Tick | EventKind::Ended);
        match self.call(anim, kind, force)? {
            Ok(Step::Continue | Step::Handled) => Ok(None),
            Ok(Step::Frame(canvas)) => Ok(frames_allowed.then_some(canvas)),
            Ok(Step::Finish(reason)) => Err(Halt::Finish(reason)),
            Err(CanvasError::Configuration(msg)) => {
                error!(animation = anim.name(), "{msg}");
                Err(Halt::Finish(msg))
            }
            Err(err) => {
                error!(animation = anim.name(), error = %err, "unexpected animation error");
                Err(Halt::Finish("Animation failed to process event".to_owned()))
            }
        }
    }

    /// Offer a failed event source to the animation. Only [`Step::Handled`] keeps the run going.
    fn handle_error(&mut self, anim: &mut dyn DynAnimation, err: anyhow::Error) -> Flow<()> {
        match self.call(anim, EventKind::Error(err), false)? {
            Ok(Step::Handled | Step::Frame(_)) => Ok(()),
            Ok(Step::Finish(reason)) => Err(Halt::Finish(reason)),
            Ok(Step::Continue) => {
                error!(animation = anim.name(), "unhandled error");
                Err(Halt::Finish("Unhandled error".to_owned()))
            }
            Err(err) => {
                error!(animation = anim.name(), error = %err, "failed to process error");
                Err(Halt::Finish("Failed to process error".to_owned()))
            }
        }
    }

    fn call(
        &mut self,
        anim: &mut dyn DynAnimation,
        kind: EventKind<'_>,
        force: bool,
    ) -> Flow<CanvasResult<Step>> {
        if !force && self.shutdown.is_cancelled() {
            return Err(Halt::Cancelled);
        }

        let event = AnimationEvent::new(
            kind,
            &self.canvas,
            &self.placed,
            &self.settings,
            self.iteration,
            &mut self.rng,
            &mut self.new_every,
        );

        match anim.process_event(event) {
            Err(err) if err.is_cancelled() => Err(Halt::Cancelled),
            result => Ok(result),
        }
    }

    fn take_new_every(&mut self) -> Option<Duration> {
        let every = self.new_every.take()?;
        if !every.is_finite() || every <= 0.0 {
            warn!(every, "ignoring invalid tick interval");
            return None;
        }
        self.settings.every = every;
        Some(self.settings.tick_interval())
    }
}

fn placed_parts(coords: &Coords, serial: Serial) -> &[Part] {
    coords
        .for_serial(serial)
        .map(DeviceCoords::parts)
        .unwrap_or(&[])
}

fn finish(result: Flow<Ending>) -> CanvasResult<Ending> {
    let ending = match result {
        Ok(ending) => ending,
        Err(Halt::Finish(reason)) => Ending::Finished(reason),
        Err(Halt::Cancelled) => {
            info!("animation cancelled");
            return Err(CanvasError::Cancelled);
        }
    };
    info!(?ending, "animation ended");
    Ok(ending)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        animation::{
            sink::InMemorySink,
            traits::{Animation, UserEvents, boxed},
        },
        canvas::{
            color::Color,
            device::{Capability, Device},
            point::Point,
        },
        layout::coords::ChainItem,
    };

    type Script = Box<dyn FnMut(&mut AnimationEvent<'_>) -> CanvasResult<Step> + Send>;

    struct Scripted {
        settings: AnimationSettings,
        script: Script,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Animation for Scripted {
        type State = ();

        fn settings(&self) -> AnimationSettings {
            self.settings
        }

        fn process_event(&mut self, mut event: AnimationEvent<'_>, _: &mut ()) -> CanvasResult<Step> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{:?}", event.kind));
            (self.script)(&mut event)
        }
    }

    fn scripted(
        every: f64,
        num_seconds: Option<f64>,
        script: impl FnMut(&mut AnimationEvent<'_>) -> CanvasResult<Step> + Send + 'static,
    ) -> (Box<dyn DynAnimation>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let anim = boxed(Scripted {
            settings: AnimationSettings {
                every,
                num_seconds,
                ..AnimationSettings::default()
            },
            script: Box::new(script),
            log: Arc::clone(&log),
        });
        (anim, log)
    }

    fn tile(n: u8) -> AnimationDevice {
        let device = Arc::new(Device::new(
            Serial([0xd0, 0x73, 0xd5, 0, 0, n]),
            Capability::matrix("Tile"),
        ));
        let coords = DeviceCoords::from_chain(
            device,
            &[ChainItem::new(f64::from(n), 0.0, 8, 8)],
            None,
            &mut StdRng::seed_from_u64(u64::from(n)),
        );
        AnimationDevice::new(coords, 1.0)
    }

    fn lit(hue: f64) -> Canvas {
        let mut canvas = Canvas::new();
        canvas.set(Point::new(0, 0), Color::new(hue, 1.0, 1.0, 3500));
        canvas
    }

    fn runtime(sink: &InMemorySink, shutdown: &Shutdown) -> AnimationRuntime {
        let mut rt = AnimationRuntime::new(sink.clone(), shutdown.clone()).with_seed(3);
        rt.attach(tile(1));
        rt
    }

    fn secs_since(start: Instant, frame: &SentFrame) -> f64 {
        (frame.at - start).as_secs_f64()
    }

    #[tokio::test(start_paused = true)]
    async fn started_then_devices_then_ticks() {
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        rt.attach(tile(2));
        let (anim, log) = scripted(1.0, Some(1.5), |_| Ok(Step::Continue));

        let ending = rt.run(anim, Background::Clear).await.unwrap();
        assert_eq!(ending, Ending::Exhausted);
        assert_eq!(rt.phase(), Phase::Done);
        let log = log.lock().unwrap().clone();
        assert_eq!(log[0], "Started");
        assert!(log[1].starts_with("NewDevice(d073d5000001"));
        assert!(log[2].starts_with("NewDevice(d073d5000002"));
        assert_eq!(&log[3..], ["Tick", "Tick", "Ended"]);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_without_change_sends_nothing() {
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let (anim, _) = scripted(0.5, Some(3.0), |_| Ok(Step::Continue));
        rt.run(anim, Background::Clear).await.unwrap();
        assert!(sink.is_empty());
        assert_eq!(rt.frames_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_canvas_sends_nothing() {
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let (anim, _) = scripted(0.5, Some(2.0), |_| Ok(Step::Frame(Canvas::new())));
        rt.run(anim, Background::Clear).await.unwrap();
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn finish_sends_one_settle_frame_after_every() {
        let start = Instant::now();
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let (anim, log) = scripted(1.0, None, |event| {
            if event.is_end() {
                return Ok(Step::Frame(lit(250.0)));
            }
            if event.is_tick() {
                if event.iteration == 3 {
                    return Ok(Step::finish("done"));
                }
                return Ok(Step::Frame(lit(0.0)));
            }
            Ok(Step::Continue)
        });

        let ending = rt.run(anim, Background::Clear).await.unwrap();
        assert_eq!(ending, Ending::Finished("done".into()));

        let frames = sink.frames();
        let at: Vec<f64> = frames.iter().map(|f| secs_since(start, f)).collect();
        assert_eq!(at, vec![0.0, 1.0, 3.0]);
        assert_eq!(frames[2].index, 2);
        assert!(log.lock().unwrap().iter().filter(|l| *l == "SentMessages(1 devices)").count() == 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_process_event_finishes_before_starting() {
        struct Lazy;
        impl Animation for Lazy {
            type State = ();
        }

        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let ending = rt.run(boxed(Lazy), Background::Clear).await.unwrap();
        assert_eq!(
            ending,
            Ending::Finished("Animation does not implement process_event".into())
        );
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_error_becomes_finish() {
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let (anim, log) = scripted(1.0, None, |event| {
            if event.is_tick() {
                return Err(CanvasError::animation("boom"));
            }
            Ok(Step::Continue)
        });
        let ending = rt.run(anim, Background::Clear).await.unwrap();
        assert_eq!(
            ending,
            Ending::Finished("Animation failed to process event".into())
        );
        assert_eq!(log.lock().unwrap().last().unwrap(), "Ended");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_still_settles_then_propagates() {
        let start = Instant::now();
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let (anim, _) = scripted(1.0, None, |event| {
            if event.is_end() {
                Ok(Step::Frame(lit(120.0)))
            } else {
                Ok(Step::Continue)
            }
        });

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let err = rt.run(anim, Background::Clear).await.unwrap_err();
        assert!(err.is_cancelled());
        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(secs_since(start, &frames[0]), 3.5);
    }

    #[tokio::test(start_paused = true)]
    async fn no_devices_means_no_ticks() {
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = AnimationRuntime::new(sink.clone(), shutdown);
        let (anim, log) = scripted(1.0, Some(3.0), |_| Ok(Step::Frame(lit(0.0))));
        rt.run(anim, Background::Clear).await.unwrap();
        assert_eq!(log.lock().unwrap().clone(), vec!["Started", "Ended"]);
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn change_every_reschedules_next_tick() {
        let start = Instant::now();
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let (anim, _) = scripted(1.0, Some(5.5), |event| {
            if !event.is_tick() {
                return Ok(Step::Continue);
            }
            if event.iteration == 2 {
                event.change_every(3.0);
            }
            Ok(Step::Frame(lit(0.0)))
        });
        rt.run(anim, Background::Clear).await.unwrap();
        let at: Vec<f64> = sink.frames().iter().map(|f| secs_since(start, f)).collect();
        assert_eq!(at, vec![0.0, 1.0, 4.0]);
        assert_eq!(rt.settings().every, 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn user_events_and_errors_reach_the_animation() {
        struct Listener {
            rx: Option<UserEvents>,
            seen: Arc<Mutex<Vec<String>>>,
        }
        impl Animation for Listener {
            type State = u32;

            fn settings(&self) -> AnimationSettings {
                AnimationSettings {
                    every: 1.0,
                    num_seconds: Some(0.5),
                    ..AnimationSettings::default()
                }
            }

            fn process_event(
                &mut self,
                event: AnimationEvent<'_>,
                count: &mut u32,
            ) -> CanvasResult<Step> {
                if let Some(n) = event.user_event::<u32>() {
                    *count += n;
                    self.seen.lock().unwrap().push(format!("value {count}"));
                }
                if let EventKind::Error(err) = &event.kind {
                    self.seen.lock().unwrap().push(format!("error {err}"));
                    return Ok(Step::Handled);
                }
                Ok(Step::Continue)
            }

            fn user_events(&mut self) -> Option<UserEvents> {
                self.rx.take()
            }
        }

        let (tx, rx) = mpsc::channel(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let anim = boxed(Listener {
            rx: Some(rx),
            seen: Arc::clone(&seen),
        });
        tokio::spawn(async move {
            sleep(Duration::from_secs(2)).await;
            tx.send(Ok(Box::new(5u32) as _)).await.unwrap();
            tx.send(Err(anyhow::anyhow!("sensor gone"))).await.unwrap();
            tx.send(Ok(Box::new(2u32) as _)).await.unwrap();
        });

        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        let ending = rt.run(anim, Background::Clear).await.unwrap();
        assert_eq!(ending, Ending::Exhausted);
        assert_eq!(
            seen.lock().unwrap().clone(),
            vec!["value 5", "error sensor gone", "value 7"]
        );
    }

    struct Flaky {
        rx: Option<UserEvents>,
        reply: fn() -> CanvasResult<Step>,
    }

    impl Animation for Flaky {
        type State = ();

        fn settings(&self) -> AnimationSettings {
            AnimationSettings {
                every: 1.0,
                num_seconds: None,
                ..AnimationSettings::default()
            }
        }

        fn process_event(&mut self, event: AnimationEvent<'_>, _: &mut ()) -> CanvasResult<Step> {
            if event.is_error() {
                return (self.reply)();
            }
            Ok(Step::Continue)
        }

        fn user_events(&mut self) -> Option<UserEvents> {
            self.rx.take()
        }
    }

    async fn run_flaky(reply: fn() -> CanvasResult<Step>) -> Ending {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            sleep(Duration::from_millis(1500)).await;
            tx.send(Err(anyhow::anyhow!("sensor gone"))).await.unwrap();
        });
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = runtime(&sink, &shutdown);
        rt.run(boxed(Flaky { rx: Some(rx), reply }), Background::Clear)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn error_left_unhandled_finishes_the_run() {
        let ending = run_flaky(|| Ok(Step::Continue)).await;
        assert_eq!(ending, Ending::Finished("Unhandled error".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn error_handler_failing_finishes_the_run() {
        let ending = run_flaky(|| Err(CanvasError::animation("worse"))).await;
        assert_eq!(ending, Ending::Finished("Failed to process error".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn error_handler_may_choose_its_own_reason() {
        let ending = run_flaky(|| Ok(Step::finish("sensor lost"))).await;
        assert_eq!(ending, Ending::Finished("sensor lost".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn device_joining_mid_run_gets_the_next_frame() {
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut rt = runtime(&sink, &shutdown).with_arrivals(rx);
        let (anim, log) = scripted(1.0, Some(6.5), |event| {
            if event.is_tick() {
                Ok(Step::Frame(lit(f64::from(event.iteration as u32) * 10.0)))
            } else {
                Ok(Step::Continue)
            }
        });

        tokio::spawn(async move {
            sleep(Duration::from_millis(4500)).await;
            tx.send(tile(2)).unwrap();
        });

        rt.run(anim, Background::Clear).await.unwrap();
        let frames = sink.frames();
        assert_eq!(frames.len(), 7);
        for frame in &frames[..5] {
            assert_eq!(frame.deliveries.len(), 1);
        }
        assert_eq!(frames[5].deliveries.len(), 2);
        assert!(frames[5].msgs_for(Serial([0xd0, 0x73, 0xd5, 0, 0, 2])).is_some());
        let joined = log
            .lock()
            .unwrap()
            .iter()
            .position(|l| l.starts_with("NewDevice(d073d5000002"))
            .unwrap();
        assert_eq!(log.lock().unwrap()[joined - 1], "SentMessages(1 devices)");
        assert_eq!(rt.devices().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn layout_flags_place_devices_for_the_animation() {
        let sink = InMemorySink::new();
        let shutdown = Shutdown::new();
        let mut rt = AnimationRuntime::new(sink, shutdown);
        rt.attach(tile(1));
        rt.attach(tile(1 + 4));
        let mut settings = AnimationSettings {
            every: 1.0,
            num_seconds: Some(0.5),
            ..AnimationSettings::default()
        };
        settings.layout.coords_separate = true;
        let anim = boxed(Scripted {
            settings,
            script: Box::new(|_| Ok(Step::Continue)),
            log: Arc::default(),
        });
        rt.run(anim, Background::Clear).await.unwrap();
        let lefts: Vec<i32> = rt.coords().parts().map(|p| p.left()).collect();
        assert_eq!(lefts, vec![0, 8]);
    }
}
