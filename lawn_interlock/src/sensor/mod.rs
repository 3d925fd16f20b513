//! Hazard sensor adapter.
//!
//! Heterogeneous sensors implement [`SensorSource`] and report
//! [`RawReading`]s. The [`SensorHub`] polls every source once per tick,
//! normalizes readings into `HazardEvent`s and turns every failure (error,
//! overrun, stale sample) into a `SensorFault` event for that sensor.
//!
//! Blocking drivers are wrapped in a [`ThreadedSource`] so a slow bus never
//! stalls the control loop.

pub mod hub;
pub mod normalize;
pub mod registry;
pub mod threaded;

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lawn_common::consts::MAX_READINGS_PER_POLL;
use lawn_common::time::Timestamp;

pub use hub::{PollCycle, SensorHub};
pub use normalize::normalize;
pub use registry::{SensorFactory, SensorRegistry};
pub use threaded::ThreadedSource;

/// Readings returned by one poll of one source.
pub type Readings = HVec<RawReading, MAX_READINGS_PER_POLL>;

// ─── Errors ─────────────────────────────────────────────────────────

/// Error types for sensor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// Device or bus unavailable.
    #[error("sensor '{0}' unavailable")]
    Unavailable(String),

    /// Device returned an error or garbage frame.
    #[error("sensor read failed: {0}")]
    ReadFailed(String),

    /// Latest sample is older than the staleness threshold.
    #[error("sample stale ({age_ms} ms old)")]
    Stale { age_ms: u64 },

    /// Background sampler has not produced anything yet.
    #[error("no sample yet")]
    NoData,

    /// No factory registered under this kind name.
    #[error("unknown sensor kind: {0}")]
    UnknownKind(String),

    /// Bad `params` for a sensor entry.
    #[error("invalid sensor parameters: {0}")]
    InvalidParams(String),

    /// Hub already holds the maximum number of sources.
    #[error("sensor capacity ({0}) exceeded")]
    CapacityExceeded(usize),
}

// ─── Sensor Kind ────────────────────────────────────────────────────

/// Physical sensor family. Also the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SensorKind {
    /// Ultrasonic / ToF range finder.
    Proximity = 0,
    /// IMU.
    Tilt = 1,
    /// Downward range finder.
    Cliff = 2,
    /// GPS position vs. geofence.
    Boundary = 3,
    /// Camera detector.
    Vision = 4,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        Self::Proximity,
        Self::Tilt,
        Self::Cliff,
        Self::Boundary,
        Self::Vision,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Proximity => "proximity",
            Self::Tilt => "tilt",
            Self::Cliff => "cliff",
            Self::Boundary => "boundary",
            Self::Vision => "vision",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

// ─── Raw Readings ───────────────────────────────────────────────────

/// What a proximity or vision detection was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetClass {
    Person,
    Pet,
    Obstacle,
}

/// Un-normalized sensor output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawReading {
    /// Range to the nearest target [m].
    Proximity {
        target: TargetClass,
        distance_m: f64,
        confidence: f64,
    },
    /// Chassis attitude [deg].
    Tilt { roll_deg: f64, pitch_deg: f64 },
    /// Measured drop below the deck [m].
    Cliff { depth_m: f64 },
    /// Geofence check. `outside_m` is the distance past the fence.
    Boundary { inside: bool, outside_m: f64 },
    /// Camera detection with optional range estimate.
    Vision {
        target: TargetClass,
        distance_m: Option<f64>,
        confidence: f64,
    },
}

impl RawReading {
    /// Retention priority when a sample is over capacity. Readings that can
    /// escalate to an emergency outrank boundary reports, which outrank
    /// plain obstacles.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Proximity { target, .. } | Self::Vision { target, .. } => match target {
                TargetClass::Person | TargetClass::Pet => 3,
                TargetClass::Obstacle => 0,
            },
            Self::Tilt { .. } | Self::Cliff { .. } => 3,
            Self::Boundary { .. } => 2,
        }
    }
}

/// One timestamped poll result.
///
/// `taken_at` is when the hardware produced the data, not when the hub read
/// it. Detection latency is measured from here.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub taken_at: Timestamp,
    pub readings: Readings,
    /// Readings the source reported but that did not fit. Non-zero faults
    /// the slot for this cycle.
    pub dropped: usize,
}

impl Sample {
    pub fn empty(taken_at: Timestamp) -> Self {
        Self {
            taken_at,
            readings: Readings::new(),
            dropped: 0,
        }
    }

    /// Build from a slice. Past `MAX_READINGS_PER_POLL` the lowest-ranked
    /// readings are dropped and counted.
    pub fn from_readings(taken_at: Timestamp, readings: &[RawReading]) -> Self {
        let mut out = Self::empty(taken_at);
        for r in readings {
            out.push(*r);
        }
        out
    }

    /// Add a reading. When full, the lowest-ranked reading is replaced if
    /// the new one outranks it; either way one reading is counted dropped.
    pub fn push(&mut self, reading: RawReading) {
        let Err(reading) = self.readings.push(reading) else {
            return;
        };
        self.dropped += 1;
        let weakest = self
            .readings
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| r.rank())
            .map(|(i, r)| (i, r.rank()));
        if let Some((idx, rank)) = weakest {
            if reading.rank() > rank {
                self.readings[idx] = reading;
            }
        }
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

// ─── Sensor Source ──────────────────────────────────────────────────

/// Capability interface for anything that can report hazards.
///
/// # Contract
///
/// - `poll()` must not block. It returns the freshest data available at
///   `now` or an error. A source that cannot answer without blocking should
///   be wrapped in a [`ThreadedSource`].
/// - A source is polled from the control loop thread only.
pub trait SensorSource: Send {
    /// Unique configured name (e.g. "front_tof").
    fn name(&self) -> &str;

    fn kind(&self) -> SensorKind;

    fn poll(&mut self, now: Timestamp) -> Result<Sample, SensorError>;
}
