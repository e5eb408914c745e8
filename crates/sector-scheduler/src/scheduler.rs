//! The world loop.
//!
//! One task owns the world (`L`) and consumes two inputs: the immediate
//! queue fed by connection tasks, and the deferred queue of timers it
//! fills itself. Immediate events always go first. A due deferred entry
//! runs only when the immediate queue is empty.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use sector_protocol::{ClientPacket, PacketKind, PlayerId};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::{
    Continuation, CorrelationKey, CorrelationRegistry, DeferredQueue, Event,
    EventReceiver, Handled, HandlerError, Resume, SpecialEvent, Step,
    Suspension,
};

// ---------------------------------------------------------------------------
// Logic and handler tables
// ---------------------------------------------------------------------------

/// World state driven by the scheduler.
pub trait WorldLogic: Send + Sized + 'static {
    /// Internal event type.
    type Special: SpecialEvent;

    /// Builds the dispatch tables. Called once, before the loop starts.
    fn handlers() -> Handlers<Self>;
}

/// Handler for one packet kind.
pub type PacketHandler<L> =
    fn(&mut L, PlayerId, ClientPacket) -> Result<Handled<L>, HandlerError>;

/// Handler for one special event name.
pub type SpecialHandler<L> =
    fn(&mut L, <L as WorldLogic>::Special) -> Result<Handled<L>, HandlerError>;

/// Dispatch tables: packet kind → handler, special name → handler.
pub struct Handlers<L: WorldLogic> {
    packets: HashMap<PacketKind, PacketHandler<L>>,
    specials: HashMap<&'static str, SpecialHandler<L>>,
}

impl<L: WorldLogic> Default for Handlers<L> {
    fn default() -> Self {
        Self {
            packets: HashMap::new(),
            specials: HashMap::new(),
        }
    }
}

impl<L: WorldLogic> Handlers<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `kind`, replacing any previous one.
    pub fn on_packet(mut self, kind: PacketKind, handler: PacketHandler<L>) -> Self {
        self.packets.insert(kind, handler);
        self
    }

    /// Registers the handler for special events named `name`.
    pub fn on_special(mut self, name: &'static str, handler: SpecialHandler<L>) -> Self {
        self.specials.insert(name, handler);
        self
    }

    pub fn packet(&self, kind: PacketKind) -> Option<PacketHandler<L>> {
        self.packets.get(&kind).copied()
    }

    pub fn special(&self, name: &str) -> Option<SpecialHandler<L>> {
        self.specials.get(name).copied()
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    pub fn special_count(&self) -> usize {
        self.specials.len()
    }
}

// ---------------------------------------------------------------------------
// Configuration and metrics
// ---------------------------------------------------------------------------

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// A single dispatch taking longer than this is logged at `warn`.
    pub slow_dispatch_warn: Duration,
    /// Yield to the runtime after this many back-to-back events.
    pub yield_every: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slow_dispatch_warn: Duration::from_millis(50),
            yield_every: 64,
        }
    }
}

impl SchedulerConfig {
    /// Fixes out-of-range values.
    pub fn validated(mut self) -> Self {
        if self.yield_every == 0 {
            warn!("yield_every must be at least 1, using 1");
            self.yield_every = 1;
        }
        self
    }
}

/// Counters updated by the loop.
#[derive(Debug, Clone, Default)]
pub struct SchedulerMetrics {
    /// Events handed to a handler (packets and specials).
    pub events_dispatched: u64,
    /// Packets delivered to a waiting continuation instead of a handler.
    pub packets_intercepted: u64,
    /// Events with no registered handler.
    pub unhandled_events: u64,
    pub continuations_started: u64,
    pub continuations_completed: u64,
    /// Suspensions discarded (shutdown or duplicate reservation).
    pub continuations_dropped: u64,
    /// Reply reservations that hit their deadline.
    pub reply_timeouts: u64,
    pub handler_errors: u64,
    pub handler_panics: u64,
    pub slow_dispatches: u64,
    pub max_dispatch_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

enum Wake<L> {
    Resume(Box<dyn Continuation<L>>),
    ReplyDeadline { key: CorrelationKey, serial: u64 },
}

enum Wakeup<S> {
    Event(Event<S>),
    InboxClosed,
    Timer,
    Shutdown,
}

/// The single authoritative consumer of world events.
pub struct Scheduler<L: WorldLogic> {
    logic: L,
    handlers: Handlers<L>,
    events: EventReceiver<L::Special>,
    deferred: DeferredQueue<Wake<L>>,
    correlations: CorrelationRegistry<Box<dyn Continuation<L>>>,
    config: SchedulerConfig,
    metrics: SchedulerMetrics,
    shutting_down: bool,
    inbox_closed: bool,
}

impl<L: WorldLogic> Scheduler<L> {
    pub fn new(logic: L, events: EventReceiver<L::Special>, config: SchedulerConfig) -> Self {
        let handlers = L::handlers();
        debug!(
            packet_handlers = handlers.packet_count(),
            special_handlers = handlers.special_count(),
            "scheduler created"
        );
        Self {
            logic,
            handlers,
            events,
            deferred: DeferredQueue::new(),
            correlations: CorrelationRegistry::new(),
            config: config.validated(),
            metrics: SchedulerMetrics::default(),
            shutting_down: false,
            inbox_closed: false,
        }
    }

    pub fn logic(&self) -> &L {
        &self.logic
    }

    pub fn logic_mut(&mut self) -> &mut L {
        &mut self.logic
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Outstanding reply reservations.
    pub fn pending_replies(&self) -> usize {
        self.correlations.len()
    }

    /// Entries in the deferred queue.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Earliest deferred wake time.
    pub fn next_wake(&self) -> Option<Instant> {
        self.deferred.next_wake()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Processes at most one unit of work at `now`: the next immediate
    /// event, else the earliest due deferred entry.
    ///
    /// Returns `false` when there was nothing to do.
    pub fn step(&mut self, now: Instant) -> bool {
        self.observe_shutdown();
        match self.events.rx.try_recv() {
            Ok(event) => {
                self.dispatch(event, now);
                return true;
            }
            Err(TryRecvError::Disconnected) => self.inbox_closed = true,
            Err(TryRecvError::Empty) => {}
        }
        if let Some((_, wake)) = self.deferred.pop_due(now) {
            self.fire(wake, now);
            return true;
        }
        false
    }

    /// Shutdown requested and nothing left in either queue.
    pub fn is_drained(&self) -> bool {
        self.shutting_down && self.deferred.is_empty() && self.events.rx.is_empty()
    }

    /// Runs until shutdown is requested and both queues are empty.
    /// Returns the world state.
    pub async fn run(mut self) -> L {
        info!("world loop started");
        let mut burst = 0u32;
        loop {
            if self.step(Instant::now()) {
                burst += 1;
                if burst >= self.config.yield_every {
                    burst = 0;
                    tokio::task::yield_now().await;
                }
                continue;
            }
            burst = 0;

            self.observe_shutdown();
            if self.is_drained() {
                break;
            }

            let far = Instant::now() + Duration::from_secs(3600);
            let wake = self.deferred.next_wake().unwrap_or(far);
            let inbox_open = !self.inbox_closed;
            let watching = !self.shutting_down;

            let wakeup = tokio::select! {
                event = self.events.rx.recv(), if inbox_open => match event {
                    Some(event) => Wakeup::Event(event),
                    None => Wakeup::InboxClosed,
                },
                () = tokio::time::sleep_until(wake) => Wakeup::Timer,
                _ = self.events.shutdown.changed(), if watching => Wakeup::Shutdown,
            };

            match wakeup {
                Wakeup::Event(event) => self.dispatch(event, Instant::now()),
                Wakeup::InboxClosed => self.inbox_closed = true,
                Wakeup::Timer => {}
                Wakeup::Shutdown => self.begin_shutdown(),
            }
        }
        info!(
            dispatched = self.metrics.events_dispatched,
            intercepted = self.metrics.packets_intercepted,
            dropped = self.metrics.continuations_dropped,
            "world loop stopped"
        );
        self.logic
    }

    fn observe_shutdown(&mut self) {
        if !self.shutting_down && (self.inbox_closed || *self.events.shutdown.borrow()) {
            self.begin_shutdown();
        }
    }

    fn begin_shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;
        info!(
            deferred = self.deferred.len(),
            pending_replies = self.correlations.len(),
            "world loop draining for shutdown"
        );
    }

    // -- Dispatch -----------------------------------------------------------

    fn dispatch(&mut self, event: Event<L::Special>, now: Instant) {
        let started = std::time::Instant::now();
        let label: &'static [u8];

        match event {
            Event::Packet { player, inbound } => {
                let kind = inbound.packet.kind();
                label = kind.tag();
                let key = CorrelationKey {
                    player,
                    correlation: inbound.correlation,
                    kind,
                };
                if let Some(waiter) = self.correlations.take_match(&key) {
                    trace!(%key, "packet intercepted by waiting continuation");
                    self.metrics.packets_intercepted += 1;
                    self.drive(waiter, Resume::Reply(inbound), now);
                } else if let Some(handler) = self.handlers.packet(kind) {
                    trace!(%player, %kind, "dispatching packet");
                    self.metrics.events_dispatched += 1;
                    let logic = &mut self.logic;
                    let outcome = guarded(|| handler(logic, player, inbound.packet));
                    self.finish(outcome, kind.tag(), now);
                } else {
                    debug!(%player, %kind, "no handler for packet");
                    self.metrics.unhandled_events += 1;
                }
            }
            Event::Special(special) => {
                let name = special.name();
                label = name.as_bytes();
                if let Some(handler) = self.handlers.special(name) {
                    trace!(name, "dispatching special event");
                    self.metrics.events_dispatched += 1;
                    let logic = &mut self.logic;
                    let outcome = guarded(|| handler(logic, special));
                    self.finish(outcome, name.as_bytes(), now);
                } else {
                    debug!(name, "no handler for special event");
                    self.metrics.unhandled_events += 1;
                }
            }
        }

        self.record_dispatch_time(started.elapsed(), label);
    }

    fn finish(&mut self, outcome: Outcome<Handled<L>>, what: &[u8], now: Instant) {
        match outcome {
            Outcome::Ok(Handled::Done) => {}
            Outcome::Ok(Handled::Spawn(cont)) => {
                self.metrics.continuations_started += 1;
                self.drive(cont, Resume::Start, now);
            }
            Outcome::Err(e) => {
                self.metrics.handler_errors += 1;
                warn!(handler = %String::from_utf8_lossy(what), error = %e, "handler failed");
            }
            Outcome::Panicked(msg) => {
                self.metrics.handler_panics += 1;
                error!(handler = %String::from_utf8_lossy(what), panic = %msg, "handler panicked");
            }
        }
    }

    fn fire(&mut self, wake: Wake<L>, now: Instant) {
        match wake {
            Wake::Resume(cont) => self.drive(cont, Resume::Woke, now),
            Wake::ReplyDeadline { key, serial } => {
                if let Some(cont) = self.correlations.expire(&key, serial) {
                    debug!(%key, label = cont.label(), "reply deadline passed");
                    self.metrics.reply_timeouts += 1;
                    self.drive(cont, Resume::TimedOut, now);
                }
            }
        }
    }

    /// Resumes a continuation and parks it again if it suspends.
    fn drive(&mut self, mut cont: Box<dyn Continuation<L>>, input: Resume, now: Instant) {
        let label = cont.label();
        let logic = &mut self.logic;
        let step = catch_unwind(AssertUnwindSafe(|| cont.resume(logic, input)));

        match step {
            Ok(Step::Complete) => {
                trace!(label, "continuation completed");
                self.metrics.continuations_completed += 1;
            }
            Ok(Step::Suspend(suspension)) => self.suspend(cont, suspension, now),
            Err(panic) => {
                self.metrics.handler_panics += 1;
                error!(label, panic = %panic_message(&*panic), "continuation panicked");
            }
        }
    }

    fn suspend(&mut self, cont: Box<dyn Continuation<L>>, suspension: Suspension, now: Instant) {
        if self.shutting_down {
            debug!(label = cont.label(), ?suspension, "dropping suspension during shutdown");
            self.metrics.continuations_dropped += 1;
            return;
        }
        match suspension {
            Suspension::Sleep(d) => {
                trace!(label = cont.label(), delay_ms = d.as_millis() as u64, "continuation sleeping");
                self.deferred.push(now + d, Wake::Resume(cont));
            }
            Suspension::AwaitPacket {
                player,
                correlation,
                kind,
                timeout,
            } => {
                let key = CorrelationKey {
                    player,
                    correlation,
                    kind,
                };
                let label = cont.label();
                let deadline = now + timeout;
                match self.correlations.register(key, deadline, cont) {
                    Ok(serial) => {
                        trace!(%key, label, "continuation awaiting reply");
                        self.deferred.push(deadline, Wake::ReplyDeadline { key, serial });
                    }
                    Err(e) => {
                        error!(error = %e, label, "dropping continuation");
                        self.metrics.continuations_dropped += 1;
                    }
                }
            }
        }
    }

    fn record_dispatch_time(&mut self, elapsed: Duration, what: &[u8]) {
        if elapsed > self.metrics.max_dispatch_time {
            self.metrics.max_dispatch_time = elapsed;
        }
        if elapsed >= self.config.slow_dispatch_warn {
            self.metrics.slow_dispatches += 1;
            warn!(
                event = %String::from_utf8_lossy(what),
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                threshold_ms = self.config.slow_dispatch_warn.as_secs_f64() * 1000.0,
                "slow dispatch"
            );
        }
    }
}

enum Outcome<T> {
    Ok(T),
    Err(HandlerError),
    Panicked(String),
}

fn guarded<T>(f: impl FnOnce() -> Result<T, HandlerError>) -> Outcome<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(v)) => Outcome::Ok(v),
        Ok(Err(e)) => Outcome::Err(e),
        Err(panic) => Outcome::Panicked(panic_message(&*panic)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
