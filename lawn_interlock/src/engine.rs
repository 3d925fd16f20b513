//! Interlock engine.
//!
//! Owns the state machine and is the only writer of the published state.
//! Runs on the control loop thread; everything else talks to it through an
//! [`InterlockHandle`] (input queue) or an [`ActuatorGate`] (commands).
//!
//! ## Tick
//! 1. Drain the input queue. Stops and acknowledgments apply immediately,
//!    in arrival order; pushed hazards join this tick's poll cycle.
//! 2. Poll every sensor.
//! 3. Classify and apply the most severe decision, or a clean cycle.
//! 4. Retry unacknowledged actuator stops.
//! 5. Check the cutoff watchdog.
//!
//! ## Transition order
//! publish state → audit → event bus → actuator. EMERGENCY is visible to
//! the gate and recorded before the emergency stop is issued.

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use lawn_common::actuator::ActuatorDriver;
use lawn_common::interlock::audit::Trigger;
use lawn_common::interlock::config::{InterlockConfig, ResponseConfig};
use lawn_common::interlock::hazard::{HazardEvent, RequiredAction};
use lawn_common::interlock::motion::CommandSource;
use lawn_common::interlock::state::InterlockState;
use lawn_common::time::Timestamp;
use lawn_common::watchdog::HardCutoff;

use crate::audit::{AuditLog, JsonLinesSink, MemorySink};
use crate::classifier::HazardClassifier;
use crate::error::InterlockError;
use crate::events::{EventBus, InterlockEvent};
use crate::gate::{ActuatorGate, SharedDriver};
use crate::sensor::{PollCycle, SensorHub, SensorRegistry};
use crate::state::{InterlockStateMachine, MachineInput, SafetyStateCell, TransitionResult};
use crate::watchdog::CutoffWatchdog;

// ─── Inputs ─────────────────────────────────────────────────────────

enum Request {
    Hazard(HazardEvent),
    EmergencyStop { source: CommandSource, at: Timestamp },
    Acknowledge { operator: String },
}

/// Cloneable entry point for everything outside the control loop.
///
/// Requests are queued and applied at the start of the next tick.
#[derive(Clone)]
pub struct InterlockHandle {
    tx: Sender<Request>,
    state: Arc<SafetyStateCell>,
    bus: EventBus,
}

impl InterlockHandle {
    /// Push a hazard detected outside the polled sensors.
    pub fn report_hazard(&self, event: HazardEvent) -> Result<(), InterlockError> {
        self.send(Request::Hazard(event))
    }

    /// Request EMERGENCY (physical button, UI, host).
    pub fn emergency_stop(&self, source: CommandSource) -> Result<(), InterlockError> {
        self.send(Request::EmergencyStop {
            source,
            at: Timestamp::now(),
        })
    }

    /// Operator acknowledgment. A rejection is published as
    /// [`InterlockEvent::AcknowledgeRejected`].
    pub fn acknowledge(&self, operator: &str) -> Result<(), InterlockError> {
        self.send(Request::Acknowledge {
            operator: operator.to_owned(),
        })
    }

    #[inline]
    pub fn state(&self) -> InterlockState {
        self.state.load()
    }

    pub fn subscribe(&self) -> Receiver<InterlockEvent> {
        self.bus.subscribe()
    }

    fn send(&self, req: Request) -> Result<(), InterlockError> {
        self.tx.send(req).map_err(|_| InterlockError::QueueClosed)
    }
}

// ─── Response Statistics ────────────────────────────────────────────

/// O(1) latency accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub sum_us: u64,
}

impl LatencyStats {
    pub const fn new() -> Self {
        Self {
            count: 0,
            min_us: u64::MAX,
            max_us: 0,
            sum_us: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let us = latency.as_micros() as u64;
        self.count += 1;
        self.min_us = self.min_us.min(us);
        self.max_us = self.max_us.max(us);
        self.sum_us += us;
    }

    pub fn avg_us(&self) -> u64 {
        if self.count == 0 { 0 } else { self.sum_us / self.count }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Detection-to-response latencies.
///
/// `publication` is detection → state published. `emergency_cutoff` is
/// detection → actuator acknowledged the emergency stop, checked against
/// the emergency budget. `boundary_halt` is detection → drive halted,
/// checked against the boundary budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseStats {
    pub publication: LatencyStats,
    pub emergency_cutoff: LatencyStats,
    pub boundary_halt: LatencyStats,
    pub emergency_breaches: u64,
    pub boundary_breaches: u64,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub state: InterlockState,
    pub transitions: u32,
    /// Hazard events classified this tick.
    pub events: usize,
    /// The poll cycle was complete and reported nothing.
    pub clean: bool,
}

// ─── Pending Actuator Work ──────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct PendingCutoff {
    detected_at: Timestamp,
    attempts: u32,
    unresponsive_logged: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingHalt {
    detected_at: Timestamp,
    attempts: u32,
}

// ─── Engine ─────────────────────────────────────────────────────────

pub struct InterlockEngine {
    machine: InterlockStateMachine,
    classifier: HazardClassifier,
    hub: SensorHub,
    tx: Sender<Request>,
    rx: Receiver<Request>,
    cell: Arc<SafetyStateCell>,
    driver: SharedDriver,
    gate: ActuatorGate,
    audit: AuditLog,
    bus: EventBus,
    watchdog: Arc<CutoffWatchdog>,
    response: ResponseConfig,
    stats: ResponseStats,
    /// Emergency stop issued but not yet acknowledged.
    cutoff: Option<PendingCutoff>,
    /// Driver acknowledged the emergency stop for the current EMERGENCY.
    cutoff_confirmed: bool,
    halt: Option<PendingHalt>,
    tick_started: Instant,
    tick_now: Timestamp,
}

impl InterlockEngine {
    pub fn new(
        config: &InterlockConfig,
        hub: SensorHub,
        driver: Box<dyn ActuatorDriver>,
        relay: Box<dyn HardCutoff>,
        audit: AuditLog,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let cell = Arc::new(SafetyStateCell::new());
        let bus = EventBus::new();
        let driver: SharedDriver = Arc::new(Mutex::new(driver));
        let gate = ActuatorGate::new(cell.clone(), driver.clone(), config.gate, bus.clone());
        let watchdog = Arc::new(CutoffWatchdog::new(
            Duration::from_millis(config.response.watchdog_timeout_ms),
            relay,
            audit.clone(),
            bus.clone(),
        ));

        info!(
            sensors = hub.len(),
            emergency_budget_ms = config.response.emergency_budget_ms,
            boundary_budget_ms = config.response.boundary_budget_ms,
            "interlock engine initialized"
        );

        Self {
            machine: InterlockStateMachine::new(),
            classifier: HazardClassifier::new(config.classifier),
            hub,
            tx,
            rx,
            cell,
            driver,
            gate,
            audit,
            bus,
            watchdog,
            response: config.response,
            stats: ResponseStats::default(),
            cutoff: None,
            cutoff_confirmed: false,
            halt: None,
            tick_started: Instant::now(),
            tick_now: Timestamp::ZERO,
        }
    }

    /// Build sensors from the registry and the audit log from `[audit]`.
    pub fn from_config(
        config: &InterlockConfig,
        registry: &SensorRegistry,
        driver: Box<dyn ActuatorDriver>,
        relay: Box<dyn HardCutoff>,
    ) -> Result<Self, InterlockError> {
        let hub = registry.build_hub(config)?;
        let audit = match &config.audit.path {
            Some(path) => AuditLog::start(Box::new(JsonLinesSink::open(Path::new(path))?), &config.audit)?,
            None => AuditLog::start(Box::new(MemorySink::new()), &config.audit)?,
        };
        Ok(Self::new(config, hub, driver, relay, audit))
    }

    pub fn handle(&self) -> InterlockHandle {
        InterlockHandle {
            tx: self.tx.clone(),
            state: self.cell.clone(),
            bus: self.bus.clone(),
        }
    }

    pub fn gate(&self) -> ActuatorGate {
        self.gate.clone()
    }

    #[inline]
    pub fn state(&self) -> InterlockState {
        self.machine.state()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn hub(&self) -> &SensorHub {
        &self.hub
    }

    pub fn watchdog(&self) -> Arc<CutoffWatchdog> {
        self.watchdog.clone()
    }

    pub fn response_stats(&self) -> ResponseStats {
        self.stats
    }

    /// Actuator acknowledged the emergency stop of the current EMERGENCY.
    pub fn cutoff_confirmed(&self) -> bool {
        self.cutoff_confirmed
    }

    /// Run one tick at `now`.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        self.tick_started = Instant::now();
        self.tick_now = now;
        let mut transitions = 0;

        // 1. Inputs.
        let mut pushed = PollCycle::new();
        while let Ok(req) = self.rx.try_recv() {
            match req {
                Request::Hazard(event) => pushed.push(event),
                Request::EmergencyStop { source, at } => {
                    info!(?source, "emergency stop requested");
                    let result = self.machine.handle(MachineInput::ExplicitStop);
                    transitions += self.apply(result, at.min(now));
                }
                Request::Acknowledge { operator } => {
                    let result = self.machine.handle(MachineInput::Acknowledge {
                        cutoff_confirmed: self.cutoff_confirmed,
                    });
                    match result {
                        TransitionResult::Rejected(reason) => {
                            warn!(%operator, state = %self.machine.state(), reason, "acknowledgment rejected");
                            self.bus.publish(InterlockEvent::AcknowledgeRejected {
                                operator,
                                state: self.machine.state(),
                                reason,
                            });
                        }
                        result => {
                            if result.is_changed() {
                                info!(%operator, "acknowledgment accepted");
                            }
                            transitions += self.apply(result, now);
                        }
                    }
                }
            }
        }

        // 2. Sensors.
        let mut cycle = self.hub.poll(now);
        for event in pushed.events.iter().copied() {
            cycle.push(event);
        }
        cycle.overflowed |= pushed.overflowed;

        // 3. Decide.
        let clean = cycle.is_clean();
        match self.classifier.classify_all(cycle.events.iter()) {
            Some(decision) if decision.required_action > RequiredAction::None => {
                let detected_at = decision.event.detected_at();
                let result = self.machine.handle(MachineInput::Decision(decision));
                transitions += self.apply(result, detected_at);
            }
            _ if clean => {
                let result = self.machine.handle(MachineInput::CleanCycle);
                transitions += self.apply(result, now);
            }
            _ => {}
        }

        // 4. Actuator follow-up for stops issued on earlier ticks.
        self.service_actuator();

        // 5. Watchdog.
        self.watchdog.check(self.published_now());

        let state = self.machine.state();
        debug!(%state, events = cycle.events.len(), transitions, clean, "tick");
        TickReport {
            state,
            transitions,
            events: cycle.events.len(),
            clean,
        }
    }

    /// Tick time advanced by the wall time spent inside this tick.
    #[inline]
    fn published_now(&self) -> Timestamp {
        self.tick_now.offset_by(self.tick_started.elapsed())
    }

    fn apply(&mut self, result: TransitionResult, detected_at: Timestamp) -> u32 {
        let TransitionResult::Changed { from, to, trigger } = result else {
            return 0;
        };

        self.cell.publish(to);
        let at = self.published_now();
        let entry = self.audit.record(from, to, trigger, at);
        self.bus.publish(InterlockEvent::StateChanged { from, to, trigger, at });
        self.bus.publish(InterlockEvent::Audit(entry));

        let latency = at.saturating_since(detected_at);
        self.stats.publication.record(latency);
        let latency_ms = latency.as_millis() as u64;
        match to {
            InterlockState::Emergency | InterlockState::BoundaryStop => {
                warn!(%from, %to, trigger = trigger.label(), latency_ms, seq = entry.seq, "interlock state changed")
            }
            _ => info!(%from, %to, trigger = trigger.label(), latency_ms, seq = entry.seq, "interlock state changed"),
        }

        if from == InterlockState::Emergency {
            self.cutoff = None;
            self.watchdog.disarm();
        }
        if from == InterlockState::BoundaryStop {
            self.halt = None;
        }

        match to {
            InterlockState::Emergency => {
                self.cutoff_confirmed = false;
                self.halt = None;
                self.cutoff = Some(PendingCutoff {
                    detected_at,
                    attempts: 0,
                    unresponsive_logged: false,
                });
                self.watchdog.arm(detected_at);
                self.issue_emergency_stop();
            }
            InterlockState::BoundaryStop => {
                self.halt = Some(PendingHalt { detected_at, attempts: 0 });
                self.issue_halt();
            }
            _ => {}
        }
        1
    }

    fn service_actuator(&mut self) {
        if self.cutoff.is_some() {
            self.issue_emergency_stop();
        }
        if self.halt.is_some() {
            self.issue_halt();
        }
    }

    fn issue_emergency_stop(&mut self) {
        let result = self.driver.lock().emergency_stop();
        let at = self.published_now();
        let budget = Duration::from_millis(self.response.emergency_budget_ms);
        let Some(pending) = self.cutoff.as_mut() else {
            return;
        };
        pending.attempts += 1;
        let elapsed = at.saturating_since(pending.detected_at);

        match result {
            Ok(()) => {
                let attempts = pending.attempts;
                self.cutoff = None;
                self.cutoff_confirmed = true;
                self.watchdog.disarm();
                self.stats.emergency_cutoff.record(elapsed);
                let elapsed_ms = elapsed.as_millis() as u64;
                if elapsed > budget {
                    self.stats.emergency_breaches += 1;
                    error!(elapsed_ms, budget_ms = self.response.emergency_budget_ms, attempts, "emergency cutoff exceeded response budget");
                } else {
                    info!(elapsed_ms, attempts, "emergency cutoff acknowledged");
                }
            }
            Err(e) => {
                if elapsed > budget && !pending.unresponsive_logged {
                    pending.unresponsive_logged = true;
                    let elapsed_ms = elapsed.as_millis() as u64;
                    error!(error = %e, elapsed_ms, attempts = pending.attempts, "actuator unresponsive to emergency stop");
                    let entry = self.audit.record(
                        InterlockState::Emergency,
                        InterlockState::Emergency,
                        Trigger::ActuatorUnresponsive { elapsed_ms },
                        at,
                    );
                    self.bus.publish(InterlockEvent::Audit(entry));
                } else {
                    warn!(error = %e, attempts = pending.attempts, "emergency stop not acknowledged, retrying next tick");
                }
            }
        }
    }

    fn issue_halt(&mut self) {
        let result = self.driver.lock().halt_drive();
        let at = self.published_now();
        let Some(pending) = self.halt.as_mut() else {
            return;
        };
        pending.attempts += 1;
        match result {
            Ok(()) => {
                let elapsed = at.saturating_since(pending.detected_at);
                let attempts = pending.attempts;
                self.halt = None;
                self.stats.boundary_halt.record(elapsed);
                let elapsed_ms = elapsed.as_millis() as u64;
                if elapsed > Duration::from_millis(self.response.boundary_budget_ms) {
                    self.stats.boundary_breaches += 1;
                    error!(elapsed_ms, budget_ms = self.response.boundary_budget_ms, attempts, "boundary stop exceeded response budget");
                } else {
                    debug!(elapsed_ms, attempts, "drive halted");
                }
            }
            Err(e) => warn!(error = %e, attempts = pending.attempts, "drive halt failed, retrying next tick"),
        }
    }
}
