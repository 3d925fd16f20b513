//! Simulated hazard sensors.
//!
//! - [`SimSensor`] reports whatever its handle was last told to report.
//! - [`ScriptedSensor`] replays readings by poll number, built from
//!   `[[sensors]]` params.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;

use lawn_common::time::Timestamp;

use crate::sensor::{RawReading, Sample, SensorError, SensorKind, SensorSource};

// ─── Handle-Driven Sensor ───────────────────────────────────────────

#[derive(Default)]
struct SimShared {
    readings: Mutex<Vec<RawReading>>,
    error: Mutex<Option<SensorError>>,
    delay_us: AtomicU64,
    age_us: AtomicU64,
    polls: AtomicU64,
}

pub struct SimSensor {
    name: String,
    kind: SensorKind,
    shared: Arc<SimShared>,
}

#[derive(Clone)]
pub struct SimSensorHandle {
    shared: Arc<SimShared>,
}

impl SimSensor {
    pub fn new(name: &str, kind: SensorKind) -> (Self, SimSensorHandle) {
        let shared = Arc::new(SimShared::default());
        (
            Self {
                name: name.to_owned(),
                kind,
                shared: shared.clone(),
            },
            SimSensorHandle { shared },
        )
    }
}

impl SensorSource for SimSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn poll(&mut self, now: Timestamp) -> Result<Sample, SensorError> {
        self.shared.polls.fetch_add(1, Ordering::AcqRel);
        let delay = self.shared.delay_us.load(Ordering::Acquire);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }
        if let Some(e) = self.shared.error.lock().clone() {
            return Err(e);
        }
        let age = self.shared.age_us.load(Ordering::Acquire);
        let taken_at = Timestamp::from_micros(now.as_micros().saturating_sub(age));
        Ok(Sample::from_readings(taken_at, &self.shared.readings.lock()))
    }
}

impl SimSensorHandle {
    /// Report these readings on every poll until changed.
    pub fn set(&self, readings: &[RawReading]) {
        *self.shared.readings.lock() = readings.to_vec();
    }

    pub fn clear(&self) {
        self.shared.readings.lock().clear();
    }

    /// Fail every poll with `error` (or stop failing with `None`).
    pub fn fail(&self, error: Option<SensorError>) {
        *self.shared.error.lock() = error;
    }

    /// Block inside `poll()` for this long.
    pub fn set_delay(&self, delay: Duration) {
        self.shared.delay_us.store(delay.as_micros() as u64, Ordering::Release);
    }

    /// Report samples taken this long before the poll.
    pub fn set_age(&self, age: Duration) {
        self.shared.age_us.store(age.as_micros() as u64, Ordering::Release);
    }

    pub fn polls(&self) -> u64 {
        self.shared.polls.load(Ordering::Acquire)
    }
}

// ─── Scripted Sensor ────────────────────────────────────────────────

/// One scripted reading, active for polls `from_poll..until_poll`
/// (1-based, `until_poll` exclusive, open-ended if absent).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptStep {
    pub from_poll: u64,
    #[serde(default)]
    pub until_poll: Option<u64>,
    pub reading: RawReading,
}

impl ScriptStep {
    #[inline]
    fn active(&self, poll: u64) -> bool {
        poll >= self.from_poll && self.until_poll.is_none_or(|until| poll < until)
    }
}

/// `params` of a scripted `[[sensors]]` entry.
///
/// ```toml
/// [[sensors]]
/// name = "front_tof"
/// kind = "proximity"
/// params.script = [
///     { from_poll = 40, until_poll = 80, reading = { type = "proximity", target = "person", distance_m = 2.5, confidence = 0.9 } },
/// ]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScriptParams {
    pub script: Vec<ScriptStep>,
    /// Every poll after this one fails.
    pub fail_after_poll: Option<u64>,
}

pub struct ScriptedSensor {
    name: String,
    kind: SensorKind,
    params: ScriptParams,
    polls: u64,
}

impl ScriptedSensor {
    pub fn new(name: &str, kind: SensorKind, params: ScriptParams) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            params,
            polls: 0,
        }
    }
}

impl SensorSource for ScriptedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn poll(&mut self, now: Timestamp) -> Result<Sample, SensorError> {
        self.polls += 1;
        let n = self.polls;
        if self.params.fail_after_poll.is_some_and(|last_good| n > last_good) {
            return Err(SensorError::ReadFailed(format!("{}: scripted failure", self.name)));
        }
        let mut sample = Sample::empty(now);
        for step in self.params.script.iter().filter(|s| s.active(n)) {
            sample.push(step.reading);
        }
        Ok(sample)
    }
}
