//! Render/worker coordination
//!
//! Two periodic contexts share one [`Player`] behind a mutex:
//! - the render context (fast period) applies triggers, ticks playback and
//!   draws;
//! - the worker context (slower period) polls gestures and handles commands.
//!
//! The worker never touches the player's buffers. It posts intents: trigger
//! requests go into the coalescing [`TriggerCell`], everything else travels
//! over the bounded mailboxes. Every lock acquisition is time-bounded; a
//! timeout skips the cycle and is counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cybird_core::{
    CybirdError, CybirdResult, Gesture, HeapGauge, SubjectId, TaskMessage, TriggerKind,
    TriggerRequest,
};
use cybird_store::{DirStorage, FrameStore, ReadPacing};
use parking_lot::{Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::{
    mailbox, unix_now, AnimationController, CoordinatorConfig, Extent, FixedRate,
    MailboxReceiver, MailboxSender, RenderSink, RuntimeConfig, SightingStats, SubjectRegistry,
    TriggerCell,
};

/// Source of recognized gestures (the motion sensor driver)
pub trait GestureSource: Send {
    /// Next recognized gesture, if any
    fn poll(&mut self) -> Option<Gesture>;
}

/// A sensor that never reports anything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGestures;

impl GestureSource for NoGestures {
    fn poll(&mut self) -> Option<Gesture> {
        None
    }
}

/// Replays a fixed list of gestures, one per poll
#[derive(Clone, Debug, Default)]
pub struct ScriptedGestures {
    queue: VecDeque<Option<Gesture>>,
}

impl ScriptedGestures {
    pub fn new(script: impl IntoIterator<Item = Option<Gesture>>) -> Self {
        ScriptedGestures {
            queue: script.into_iter().collect(),
        }
    }
}

impl GestureSource for ScriptedGestures {
    fn poll(&mut self) -> Option<Gesture> {
        self.queue.pop_front().flatten()
    }
}

/// Everything the render context mutates
pub struct Player {
    controller: AnimationController,
    registry: SubjectRegistry,
    sightings: SightingStats,
    sink: Box<dyn RenderSink>,
    rng: StdRng,
    extent: Extent,
}

impl Player {
    pub fn new(
        controller: AnimationController,
        registry: SubjectRegistry,
        sightings: SightingStats,
        sink: Box<dyn RenderSink>,
    ) -> Self {
        let extent = controller.config().target_extent;
        Player {
            controller,
            registry,
            sightings,
            sink,
            rng: StdRng::from_entropy(),
            extent,
        }
    }

    /// Build a player over the card described by `config`.
    ///
    /// Frames are read from `paths.subjects_root` with the configured read
    /// pacing. The registry falls back to the built-in subjects and has its
    /// frame counts pre-scanned. Sightings persist to `paths.stats`.
    pub fn from_config(
        config: &RuntimeConfig,
        heap: HeapGauge,
        sink: Box<dyn RenderSink>,
    ) -> CybirdResult<Self> {
        config.validate()?;
        let paths = &config.paths;

        let store = FrameStore::new(Arc::new(DirStorage::new(&paths.subjects_root)), heap)
            .with_pacing(ReadPacing::from(&config.read_pacing));

        let mut registry = SubjectRegistry::load_or_default(&paths.registry);
        registry.scan_frame_counts(&store);
        let sightings = SightingStats::open(&paths.stats);

        info!(
            root = %paths.subjects_root.display(),
            subjects = registry.len(),
            sightings = sightings.total_encounters(),
            "player configured"
        );
        let controller = AnimationController::new(store, config.playback.clone());
        Ok(Player::new(controller, registry, sightings, sink))
    }

    /// Deterministic subject selection
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn controller(&self) -> &AnimationController {
        &self.controller
    }

    pub fn registry(&self) -> &SubjectRegistry {
        &self.registry
    }

    pub fn sightings(&self) -> &SightingStats {
        &self.sightings
    }

    /// Start the subject named by `request`, or a weighted random one.
    ///
    /// Returns the subject that started playing.
    pub fn apply_trigger(&mut self, request: TriggerRequest, now: Instant) -> CybirdResult<SubjectId> {
        let info = self.registry.resolve(request.target, &mut self.rng)?.clone();

        self.sink.clear();
        let shown = self.controller.start(&info, now)?;
        shown.render(self.sink.as_mut(), self.extent);

        if info.needs_discovery() {
            if let Some(session) = self.controller.session() {
                self.registry.set_frame_count(info.id, session.frame_count());
            }
        }
        if request.record_stats {
            self.sightings.record(info.id, &info.name, unix_now());
        }

        info!(subject = %info.id, name = %info.name, kind = ?request.kind, "playing subject");
        Ok(info.id)
    }

    /// Advance playback and draw if the frame changed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.controller.poll(now) {
            Some(shown) => {
                shown.render(self.sink.as_mut(), self.extent);
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) {
        if self.controller.stop() {
            self.sink.clear();
        }
    }

    pub fn show_stats(&self) {
        self.sightings.log_summary(self.registry.len());
    }

    /// Flush statistics to disk
    pub fn save_stats(&self) -> CybirdResult<()> {
        self.sightings.save()
    }
}

/// Coordinator counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub render_ticks: u64,
    pub worker_ticks: u64,
    pub frames_drawn: u64,
    pub triggers_applied: u64,
    pub triggers_rejected: u64,
    pub triggers_coalesced: u64,
    pub gestures: u64,
    pub messages: u64,
    pub lock_timeouts: u64,
    pub queue_full_drops: u64,
}

#[derive(Default)]
struct Counters {
    render_ticks: AtomicU64,
    worker_ticks: AtomicU64,
    frames_drawn: AtomicU64,
    triggers_applied: AtomicU64,
    triggers_rejected: AtomicU64,
    gestures: AtomicU64,
    messages: AtomicU64,
    lock_timeouts: AtomicU64,
    queue_full_drops: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct Shared {
    player: Mutex<Player>,
    triggers: TriggerCell,
    counters: Counters,
}

impl Shared {
    fn lock_player(&self, timeout: Duration) -> Option<MutexGuard<'_, Player>> {
        let guard = self.player.try_lock_for(timeout);
        if guard.is_none() {
            bump(&self.counters.lock_timeouts);
            debug!(timeout_ms = timeout.as_millis() as u64, "player lock timed out, skipping cycle");
        }
        guard
    }

    fn stats(&self) -> RuntimeStats {
        let c = &self.counters;
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        RuntimeStats {
            render_ticks: load(&c.render_ticks),
            worker_ticks: load(&c.worker_ticks),
            frames_drawn: load(&c.frames_drawn),
            triggers_applied: load(&c.triggers_applied),
            triggers_rejected: load(&c.triggers_rejected),
            triggers_coalesced: self.triggers.coalesced(),
            gestures: load(&c.gestures),
            messages: load(&c.messages),
            lock_timeouts: load(&c.lock_timeouts),
            queue_full_drops: load(&c.queue_full_drops),
        }
    }
}

/// The render context: applies the latest trigger and ticks playback
pub struct RenderContext {
    shared: Arc<Shared>,
    inbox: MailboxReceiver<TaskMessage>,
    lock_timeout: Duration,
    drain_limit: usize,
}

impl RenderContext {
    /// One render period
    pub fn step(&mut self, now: Instant) {
        bump(&self.shared.counters.render_ticks);
        let Some(mut player) = self.shared.lock_player(self.lock_timeout) else {
            return;
        };

        for msg in self.inbox.drain(self.drain_limit) {
            bump(&self.shared.counters.messages);
            match msg {
                TaskMessage::Trigger(request) => {
                    self.shared.triggers.request(request);
                }
                TaskMessage::StopPlayback => player.stop(),
                TaskMessage::ShowStats => player.show_stats(),
                TaskMessage::Gesture(gesture) => {
                    debug!(?gesture, "gesture delivered to render context, ignored");
                }
            }
        }

        if let Some(request) = self.shared.triggers.take() {
            match player.apply_trigger(request, now) {
                Ok(_) => bump(&self.shared.counters.triggers_applied),
                Err(e) => {
                    bump(&self.shared.counters.triggers_rejected);
                    warn!(?request, error = %e, "trigger rejected");
                }
            }
        }

        if player.poll(now) {
            bump(&self.shared.counters.frames_drawn);
        }
    }
}

/// The worker context: gestures and commands
pub struct WorkerContext {
    shared: Arc<Shared>,
    inbox: MailboxReceiver<TaskMessage>,
    render_tx: MailboxSender<TaskMessage>,
    gestures: Box<dyn GestureSource>,
    next_sensor_poll: Option<Instant>,
    config: CoordinatorConfig,
}

impl WorkerContext {
    /// One worker period
    pub fn step(&mut self, now: Instant) {
        bump(&self.shared.counters.worker_ticks);

        let due = self.next_sensor_poll.map_or(true, |t| now >= t);
        if due {
            self.next_sensor_poll = Some(now + self.config.sensor_poll_interval);
            if let Some(gesture) = self.gestures.poll() {
                self.on_gesture(gesture);
            }
        }

        let limit = self.config.system_queue_capacity;
        for msg in self.inbox.drain(limit) {
            bump(&self.shared.counters.messages);
            match msg {
                TaskMessage::Gesture(gesture) => self.on_gesture(gesture),
                TaskMessage::Trigger(request) => {
                    self.shared.triggers.request(request);
                }
                TaskMessage::ShowStats => {
                    if let Some(player) = self.shared.lock_player(self.config.lock_timeout) {
                        player.show_stats();
                    }
                }
                TaskMessage::StopPlayback => self.forward(TaskMessage::StopPlayback),
            }
        }
    }

    fn on_gesture(&mut self, gesture: Gesture) {
        bump(&self.shared.counters.gestures);
        if !self.config.gesture_trigger_enabled {
            debug!(?gesture, "gesture ignored, triggering disabled");
            return;
        }
        info!(?gesture, "gesture detected, requesting random subject");
        self.shared
            .triggers
            .request(TriggerRequest::random(TriggerKind::Gesture));
    }

    fn forward(&self, msg: TaskMessage) {
        if let Err(e) = self.render_tx.send_with_backoff(msg, self.config.send_backoff) {
            if e.is_contention() {
                bump(&self.shared.counters.queue_full_drops);
            }
            warn!(error = %e, "message to render context dropped");
        }
    }
}

/// Cloneable entry point for command sources
#[derive(Clone)]
pub struct CoordinatorHandle {
    shared: Arc<Shared>,
    worker_tx: MailboxSender<TaskMessage>,
    known: Arc<Vec<SubjectId>>,
    config: CoordinatorConfig,
}

impl CoordinatorHandle {
    /// Post a trigger, replacing any pending one.
    ///
    /// Targets not in the registry are rejected here.
    pub fn trigger(&self, request: TriggerRequest) -> CybirdResult<()> {
        if let Some(id) = request.target {
            if !self.known.contains(&id) {
                return Err(CybirdError::UnknownSubject(id));
            }
        }
        self.shared.triggers.request(request);
        Ok(())
    }

    pub fn trigger_random(&self) -> CybirdResult<()> {
        self.trigger(TriggerRequest::random(TriggerKind::Manual))
    }

    pub fn trigger_subject(&self, id: SubjectId) -> CybirdResult<()> {
        self.trigger(TriggerRequest::subject(id, TriggerKind::Manual))
    }

    /// Play a subject without counting the sighting
    pub fn preview(&self, id: SubjectId) -> CybirdResult<()> {
        self.trigger(TriggerRequest::preview(id))
    }

    /// Send a message to the worker context
    pub fn send(&self, msg: TaskMessage) -> CybirdResult<()> {
        let result = self.worker_tx.send_with_backoff(msg, self.config.send_backoff);
        if matches!(result, Err(CybirdError::QueueFull)) {
            bump(&self.shared.counters.queue_full_drops);
        }
        result
    }

    pub fn gesture(&self, gesture: Gesture) -> CybirdResult<()> {
        self.send(TaskMessage::Gesture(gesture))
    }

    pub fn show_stats(&self) -> CybirdResult<()> {
        self.send(TaskMessage::ShowStats)
    }

    pub fn stop_playback(&self) -> CybirdResult<()> {
        self.send(TaskMessage::StopPlayback)
    }

    /// Whether a trigger is waiting for the render context
    pub fn trigger_pending(&self) -> bool {
        self.shared.triggers.is_pending()
    }

    pub fn stats(&self) -> RuntimeStats {
        self.shared.stats()
    }

    /// Read player state under the lock
    pub fn inspect<R>(&self, f: impl FnOnce(&Player) -> R) -> CybirdResult<R> {
        let player = self
            .shared
            .lock_player(self.config.lock_timeout)
            .ok_or(CybirdError::LockTimeout)?;
        Ok(f(&player))
    }
}

/// Owns both contexts until they are spawned or stepped by hand
pub struct Coordinator {
    render: RenderContext,
    worker: WorkerContext,
    handle: CoordinatorHandle,
}

impl Coordinator {
    pub fn new(player: Player, gestures: Box<dyn GestureSource>, config: CoordinatorConfig) -> Self {
        let known = Arc::new(player.registry().subjects().iter().map(|s| s.id).collect::<Vec<_>>());
        let shared = Arc::new(Shared {
            player: Mutex::new(player),
            triggers: TriggerCell::new(),
            counters: Counters::default(),
        });

        let (render_tx, render_rx) = mailbox(config.ui_queue_capacity);
        let (worker_tx, worker_rx) = mailbox(config.system_queue_capacity);

        Coordinator {
            render: RenderContext {
                shared: Arc::clone(&shared),
                inbox: render_rx,
                lock_timeout: config.render_lock_timeout,
                drain_limit: config.ui_queue_capacity,
            },
            worker: WorkerContext {
                shared: Arc::clone(&shared),
                inbox: worker_rx,
                render_tx,
                gestures,
                next_sensor_poll: None,
                config: config.clone(),
            },
            handle: CoordinatorHandle {
                shared,
                worker_tx,
                known,
                config,
            },
        }
    }

    /// Player and both contexts from one configuration, over an unbounded heap
    pub fn from_config(
        config: &RuntimeConfig,
        sink: Box<dyn RenderSink>,
        gestures: Box<dyn GestureSource>,
    ) -> CybirdResult<Self> {
        let player = Player::from_config(config, HeapGauge::unbounded(), sink)?;
        Ok(Coordinator::new(player, gestures, config.coordinator.clone()))
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Queue the startup subject
    pub fn request_initial(&self) {
        self.handle
            .shared
            .triggers
            .request(TriggerRequest::random(TriggerKind::Auto));
    }

    /// Run one render period on the calling thread
    pub fn render_step(&mut self, now: Instant) {
        self.render.step(now);
    }

    /// Run one worker period on the calling thread
    pub fn worker_step(&mut self, now: Instant) {
        self.worker.step(now);
    }

    /// Request the startup subject and run both contexts on their own threads
    pub fn spawn(self) -> CybirdResult<CoordinatorThreads> {
        self.request_initial();

        let Coordinator {
            mut render,
            mut worker,
            handle,
        } = self;
        let shutdown = Arc::new(AtomicBool::new(false));
        let render_period = handle.config.render_period;
        let worker_period = handle.config.worker_period;

        let stop = Arc::clone(&shutdown);
        let render_thread = std::thread::Builder::new()
            .name("cybird-render".into())
            .spawn(move || {
                let mut rate = FixedRate::new(render_period);
                while !stop.load(Ordering::Acquire) {
                    render.step(Instant::now());
                    rate.wait();
                }
                debug!(overruns = rate.overruns(), "render context exited");
            })
            .map_err(CybirdError::Spawn)?;

        let stop = Arc::clone(&shutdown);
        let worker_thread = std::thread::Builder::new()
            .name("cybird-worker".into())
            .spawn(move || {
                let mut rate = FixedRate::new(worker_period);
                while !stop.load(Ordering::Acquire) {
                    worker.step(Instant::now());
                    rate.wait();
                }
                debug!(overruns = rate.overruns(), "worker context exited");
            });
        let worker_thread = match worker_thread {
            Ok(thread) => thread,
            Err(e) => {
                shutdown.store(true, Ordering::Release);
                let _ = render_thread.join();
                return Err(CybirdError::Spawn(e));
            }
        };

        info!("coordinator started");
        Ok(CoordinatorThreads {
            handle,
            shutdown,
            render: Some(render_thread),
            worker: Some(worker_thread),
        })
    }
}

/// Running contexts. Dropping it stops both threads.
pub struct CoordinatorThreads {
    handle: CoordinatorHandle,
    shutdown: Arc<AtomicBool>,
    render: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl CoordinatorThreads {
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Stop both contexts, then stop playback and flush statistics
    pub fn shutdown(mut self) -> CybirdResult<RuntimeStats> {
        self.join();
        let mut player = self
            .handle
            .shared
            .lock_player(self.handle.config.lock_timeout)
            .ok_or(CybirdError::LockTimeout)?;
        player.stop();
        player.save_stats()?;
        drop(player);
        info!("coordinator stopped");
        Ok(self.handle.stats())
    }

    fn join(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for thread in [self.render.take(), self.worker.take()].into_iter().flatten() {
            if thread.join().is_err() {
                warn!("context thread panicked");
            }
        }
    }
}

impl Drop for CoordinatorThreads {
    fn drop(&mut self) {
        self.join();
    }
}
