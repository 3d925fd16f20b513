//! Raw reading → `HazardEvent` normalization.
//!
//! Readings below the adapter's report thresholds are not hazards and yield
//! `None`. A reading whose measurement is not a finite number is always
//! reported, with the measurement left empty, so the classifier can treat
//! it as inside the stop threshold.

use lawn_common::interlock::config::AdapterConfig;
use lawn_common::interlock::hazard::{HazardEvent, HazardKind, SensorSlot};
use lawn_common::time::Timestamp;

use super::{RawReading, TargetClass};

/// Normalize one reading from the sensor in `slot`, sampled at `taken_at`.
pub fn normalize(
    reading: &RawReading,
    slot: SensorSlot,
    taken_at: Timestamp,
    cfg: &AdapterConfig,
) -> Option<HazardEvent> {
    let event = match *reading {
        RawReading::Proximity {
            target,
            distance_m,
            confidence,
        } => {
            let ev = HazardEvent::new(target_kind(target), taken_at, confidence);
            if !distance_m.is_finite() {
                ev
            } else if distance_m.abs() <= cfg.proximity_report_range_m {
                ev.with_distance(distance_m)
            } else {
                return None;
            }
        }
        RawReading::Tilt {
            roll_deg,
            pitch_deg,
        } => {
            let angle = combined_tilt_deg(roll_deg, pitch_deg);
            let ev = HazardEvent::new(HazardKind::Tilt, taken_at, 1.0);
            if !angle.is_finite() {
                ev
            } else if angle > cfg.tilt_report_angle_deg {
                ev.with_angle(angle)
            } else {
                return None;
            }
        }
        RawReading::Cliff { depth_m } => {
            let ev = HazardEvent::new(HazardKind::Cliff, taken_at, 1.0);
            if !depth_m.is_finite() {
                ev
            } else if depth_m.abs() >= cfg.cliff_report_depth_m {
                ev.with_distance(depth_m)
            } else {
                return None;
            }
        }
        RawReading::Boundary { inside, outside_m } => {
            if inside {
                return None;
            }
            HazardEvent::new(HazardKind::BoundaryViolation, taken_at, 1.0).with_distance(outside_m)
        }
        RawReading::Vision {
            target,
            distance_m,
            confidence,
        } => {
            let ev = HazardEvent::new(target_kind(target), taken_at, confidence);
            match distance_m {
                Some(d) if d.is_finite() && d.abs() > cfg.proximity_report_range_m => return None,
                Some(d) => ev.with_distance(d),
                None => ev,
            }
        }
    };
    Some(event.with_sensor(slot))
}

fn target_kind(target: TargetClass) -> HazardKind {
    match target {
        TargetClass::Person => HazardKind::Person,
        TargetClass::Pet => HazardKind::Pet,
        TargetClass::Obstacle => HazardKind::Obstacle,
    }
}

/// Angle between the chassis normal and vertical for the given roll and
/// pitch [deg]. Anything at or past 90° on either axis reads as 90°.
pub fn combined_tilt_deg(roll_deg: f64, pitch_deg: f64) -> f64 {
    if !(roll_deg.is_finite() && pitch_deg.is_finite()) {
        return f64::NAN;
    }
    if roll_deg.abs() >= 90.0 || pitch_deg.abs() >= 90.0 {
        return 90.0;
    }
    let tr = roll_deg.to_radians().tan();
    let tp = pitch_deg.to_radians().tan();
    (tr * tr + tp * tp).sqrt().atan().to_degrees()
}
