//! Per-tick sensor polling.
//!
//! `SensorHub::poll()` visits every registered source exactly once. Each
//! source is timed against the per-sensor budget; an error, an overrun or a
//! stale sample produces a `SensorFault` event for that slot. So does a
//! sample that had to drop readings. Readings that arrived alongside a fault
//! are still normalized and reported.

use std::time::{Duration, Instant};

use heapless::Vec as HVec;
use static_assertions::const_assert;
use tracing::{debug, info, warn};

use lawn_common::consts::{MAX_EVENTS_PER_TICK, MAX_SENSORS};
use lawn_common::interlock::config::{AdapterConfig, CycleConfig};
use lawn_common::interlock::hazard::{HazardEvent, HazardKind, HazardSet, SensorSlot};
use lawn_common::time::Timestamp;

use super::{SensorError, SensorSource, normalize};

// ─── Poll Cycle ─────────────────────────────────────────────────────

// One bit per slot in `PollCycle::faulted`.
const_assert!(MAX_SENSORS <= u16::BITS as usize);

/// Outcome of one hub poll.
#[derive(Debug, Clone, Default)]
pub struct PollCycle {
    /// Normalized hazards, including one `SensorFault` per faulted slot.
    pub events: HVec<HazardEvent, MAX_EVENTS_PER_TICK>,
    /// Bit `n` set when slot `n` faulted this cycle.
    pub faulted: u16,
    /// Event capacity was exceeded and lower-priority events were dropped.
    pub overflowed: bool,
}

impl PollCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every source answered in time with fresh data and nothing was dropped.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.faulted == 0 && !self.overflowed
    }

    /// Complete and no hazard of any kind reported.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.is_complete() && self.events.is_empty()
    }

    /// Kinds present this cycle.
    pub fn kinds(&self) -> HazardSet {
        self.events
            .iter()
            .fold(HazardSet::empty(), |acc, e| acc | e.kind().flag())
    }

    /// Add an event. When full, the lowest-priority event is replaced if the
    /// new one outranks it; either way the cycle is marked overflowed.
    pub fn push(&mut self, event: HazardEvent) {
        let Err(event) = self.events.push(event) else {
            return;
        };
        self.overflowed = true;
        let new_rank = kind_rank(event.kind());
        let weakest = self
            .events
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| kind_rank(e.kind()))
            .map(|(i, e)| (i, kind_rank(e.kind())));
        if let Some((idx, rank)) = weakest {
            if new_rank > rank {
                self.events[idx] = event;
            }
        }
    }

    fn mark_faulted(&mut self, slot: SensorSlot, now: Timestamp) {
        self.faulted |= 1 << slot;
        self.push(HazardEvent::sensor_fault(slot, now));
    }
}

/// Retention priority when a cycle overflows.
const fn kind_rank(kind: HazardKind) -> u8 {
    match kind {
        HazardKind::Person | HazardKind::Pet | HazardKind::Cliff | HazardKind::Tilt => 3,
        HazardKind::BoundaryViolation => 2,
        HazardKind::SensorFault => 1,
        HazardKind::Obstacle => 0,
    }
}

// ─── Sensor Hub ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SlotHealth {
    consecutive_faults: u32,
    total_faults: u64,
}

/// Owns every registered sensor source. Lives on the control loop thread.
pub struct SensorHub {
    sources: Vec<Box<dyn SensorSource>>,
    health: Vec<SlotHealth>,
    adapter: AdapterConfig,
    budget: Duration,
    stale: Duration,
}

impl SensorHub {
    pub fn new(adapter: AdapterConfig, cycle: &CycleConfig) -> Self {
        Self {
            sources: Vec::with_capacity(MAX_SENSORS),
            health: Vec::with_capacity(MAX_SENSORS),
            adapter,
            budget: Duration::from_micros(cycle.sensor_budget_us as u64),
            stale: Duration::from_millis(cycle.sensor_stale_ms),
        }
    }

    /// Register a source. Returns its slot.
    pub fn add(&mut self, source: Box<dyn SensorSource>) -> Result<SensorSlot, SensorError> {
        if self.sources.len() >= MAX_SENSORS {
            return Err(SensorError::CapacityExceeded(MAX_SENSORS));
        }
        let slot = self.sources.len() as SensorSlot;
        info!(slot, name = source.name(), kind = source.kind().as_str(), "sensor registered");
        self.sources.push(source);
        self.health.push(SlotHealth::default());
        Ok(slot)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Name of the source in `slot`.
    pub fn name(&self, slot: SensorSlot) -> Option<&str> {
        self.sources.get(slot as usize).map(|s| s.name())
    }

    /// Lifetime fault count for `slot`.
    pub fn fault_count(&self, slot: SensorSlot) -> u64 {
        self.health
            .get(slot as usize)
            .map_or(0, |h| h.total_faults)
    }

    /// Poll every source once.
    pub fn poll(&mut self, now: Timestamp) -> PollCycle {
        let mut cycle = PollCycle::new();

        for (idx, source) in self.sources.iter_mut().enumerate() {
            let slot = idx as SensorSlot;
            let started = Instant::now();
            let result = source.poll(now);
            let elapsed = started.elapsed();

            let mut fault: Option<SensorError> = None;
            match result {
                Ok(sample) => {
                    let age = now.saturating_since(sample.taken_at);
                    if age > self.stale {
                        fault = Some(SensorError::Stale {
                            age_ms: age.as_millis() as u64,
                        });
                    }
                    for reading in sample.readings.iter() {
                        if let Some(ev) = normalize(reading, slot, sample.taken_at, &self.adapter) {
                            cycle.push(ev);
                        }
                    }
                    if sample.is_truncated() {
                        cycle.overflowed = true;
                        if fault.is_none() {
                            fault = Some(SensorError::ReadFailed(format!(
                                "{} readings over per-poll capacity dropped",
                                sample.dropped
                            )));
                        }
                    }
                }
                Err(e) => fault = Some(e),
            }
            if fault.is_none() && elapsed > self.budget {
                fault = Some(SensorError::ReadFailed(format!(
                    "poll took {} µs (budget {} µs)",
                    elapsed.as_micros(),
                    self.budget.as_micros()
                )));
            }

            let health = &mut self.health[idx];
            match fault {
                Some(err) => {
                    if health.consecutive_faults == 0 {
                        warn!(slot, name = source.name(), error = %err, "sensor fault");
                    }
                    health.consecutive_faults += 1;
                    health.total_faults += 1;
                    cycle.mark_faulted(slot, now);
                }
                None => {
                    if health.consecutive_faults > 0 {
                        info!(
                            slot,
                            name = source.name(),
                            faulted_polls = health.consecutive_faults,
                            "sensor recovered"
                        );
                    }
                    health.consecutive_faults = 0;
                }
            }
        }

        if cycle.overflowed {
            warn!(capacity = MAX_EVENTS_PER_TICK, "hazard events exceeded per-tick capacity");
        }
        debug!(events = cycle.events.len(), faulted = cycle.faulted, "poll cycle");
        cycle
    }
}
