//! Hazard event and safety decision types.
//!
//! `HazardEvent` is produced by the sensor adapter and consumed once by the
//! classifier. `SafetyDecision` is derived from it deterministically and
//! consumed by the state machine in the same tick. Both are `Copy` and have
//! no mutating API after construction.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Sensor slot index (position in the sensor hub, 0-based).
pub type SensorSlot = u8;

// ─── Hazard Kind ────────────────────────────────────────────────────

/// Class of sensed condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HazardKind {
    /// Human detected (vision or proximity classification).
    Person = 0,
    /// Animal detected.
    Pet = 1,
    /// Generic obstacle in the path.
    Obstacle = 2,
    /// Drop-off ahead; `distance_m` carries the measured depth.
    Cliff = 3,
    /// Chassis tilt; `angle_deg` carries the absolute tilt.
    Tilt = 4,
    /// Geofence crossed.
    BoundaryViolation = 5,
    /// A sensor is unavailable, erroring or stalled.
    SensorFault = 6,
}

impl HazardKind {
    pub const ALL: [HazardKind; 7] = [
        Self::Person,
        Self::Pet,
        Self::Obstacle,
        Self::Cliff,
        Self::Tilt,
        Self::BoundaryViolation,
        Self::SensorFault,
    ];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Person),
            1 => Some(Self::Pet),
            2 => Some(Self::Obstacle),
            3 => Some(Self::Cliff),
            4 => Some(Self::Tilt),
            5 => Some(Self::BoundaryViolation),
            6 => Some(Self::SensorFault),
            _ => None,
        }
    }

    /// Single-bit mask for this kind.
    #[inline]
    pub const fn flag(self) -> HazardSet {
        HazardSet::from_bits_truncate(1 << self as u8)
    }
}

bitflags! {
    /// Set of hazard kinds seen in one poll cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HazardSet: u8 {
        const PERSON             = 0x01;
        const PET                = 0x02;
        const OBSTACLE           = 0x04;
        const CLIFF              = 0x08;
        const TILT               = 0x10;
        const BOUNDARY_VIOLATION = 0x20;
        const SENSOR_FAULT       = 0x40;
    }
}

impl HazardSet {
    /// Kinds that can escalate to an emergency stop.
    pub const LIFE_SAFETY_MASK: Self = Self::from_bits_truncate(
        Self::PERSON.bits() | Self::PET.bits() | Self::CLIFF.bits() | Self::TILT.bits(),
    );

    #[inline]
    pub const fn has_life_safety(&self) -> bool {
        self.intersects(Self::LIFE_SAFETY_MASK)
    }
}

// ─── Hazard Event ───────────────────────────────────────────────────

/// Normalized hazard report.
///
/// Confidence is clamped to `[0, 1]`; a NaN confidence is treated as
/// certain (1.0). Non-finite distances and angles are stored as `None`,
/// which the classifier treats as "inside the stop threshold".
///
/// Deserialization goes through the same normalization as [`HazardEvent::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "HazardEventFields")]
pub struct HazardEvent {
    kind: HazardKind,
    distance_m: Option<f64>,
    angle_deg: Option<f64>,
    detected_at: Timestamp,
    confidence: f64,
    sensor: Option<SensorSlot>,
}

impl HazardEvent {
    pub fn new(kind: HazardKind, detected_at: Timestamp, confidence: f64) -> Self {
        Self {
            kind,
            distance_m: None,
            angle_deg: None,
            detected_at,
            confidence: normalize_confidence(confidence),
            sensor: None,
        }
    }

    /// Fault report for a sensor that errored, stalled or returned stale data.
    pub fn sensor_fault(sensor: SensorSlot, detected_at: Timestamp) -> Self {
        Self::new(HazardKind::SensorFault, detected_at, 1.0).with_sensor(sensor)
    }

    #[must_use]
    pub fn with_distance(mut self, distance_m: f64) -> Self {
        self.distance_m = finite(distance_m).map(f64::abs);
        self
    }

    #[must_use]
    pub fn with_angle(mut self, angle_deg: f64) -> Self {
        self.angle_deg = finite(angle_deg);
        self
    }

    #[must_use]
    pub fn with_sensor(mut self, sensor: SensorSlot) -> Self {
        self.sensor = Some(sensor);
        self
    }

    #[inline]
    pub const fn kind(&self) -> HazardKind {
        self.kind
    }

    #[inline]
    pub const fn distance_m(&self) -> Option<f64> {
        self.distance_m
    }

    #[inline]
    pub const fn angle_deg(&self) -> Option<f64> {
        self.angle_deg
    }

    #[inline]
    pub const fn detected_at(&self) -> Timestamp {
        self.detected_at
    }

    #[inline]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    #[inline]
    pub const fn sensor(&self) -> Option<SensorSlot> {
        self.sensor
    }
}

/// Serialized layout of [`HazardEvent`], accepted as-is from the wire.
#[derive(Deserialize)]
struct HazardEventFields {
    kind: HazardKind,
    #[serde(default)]
    distance_m: Option<f64>,
    #[serde(default)]
    angle_deg: Option<f64>,
    detected_at: Timestamp,
    confidence: f64,
    #[serde(default)]
    sensor: Option<SensorSlot>,
}

impl From<HazardEventFields> for HazardEvent {
    fn from(f: HazardEventFields) -> Self {
        let mut event = Self::new(f.kind, f.detected_at, f.confidence);
        if let Some(d) = f.distance_m {
            event = event.with_distance(d);
        }
        if let Some(a) = f.angle_deg {
            event = event.with_angle(a);
        }
        if let Some(slot) = f.sensor {
            event = event.with_sensor(slot);
        }
        event
    }
}

fn normalize_confidence(c: f64) -> f64 {
    if c.is_nan() { 1.0 } else { c.clamp(0.0, 1.0) }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

// ─── Safety Decision ────────────────────────────────────────────────

/// Hazard severity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Severity {
    Advisory = 0,
    Warning = 1,
    Critical = 2,
}

/// Response required by a decision. Ordered by precedence for tie-breaks:
/// `EmergencyStop > BoundaryStop > SlowDown > None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequiredAction {
    None = 0,
    SlowDown = 1,
    BoundaryStop = 2,
    EmergencyStop = 3,
}

impl RequiredAction {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::SlowDown),
            2 => Some(Self::BoundaryStop),
            3 => Some(Self::EmergencyStop),
            _ => None,
        }
    }
}

impl Default for RequiredAction {
    fn default() -> Self {
        Self::None
    }
}

/// Classified hazard. `decided_at` equals the event's detection time so
/// classification stays a pure function of the event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyDecision {
    pub event: HazardEvent,
    pub severity: Severity,
    pub required_action: RequiredAction,
    pub decided_at: Timestamp,
}

impl SafetyDecision {
    pub fn new(event: HazardEvent, severity: Severity, required_action: RequiredAction) -> Self {
        Self {
            event,
            severity,
            required_action,
            decided_at: event.detected_at(),
        }
    }
}
