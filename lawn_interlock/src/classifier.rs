//! Hazard classifier (pure).
//!
//! Maps a `HazardEvent` to a `SafetyDecision` using fixed thresholds:
//!
//! | Hazard | Condition | Result |
//! |--------|-----------|--------|
//! | Person | distance ≤ 3.0 m | Critical / EmergencyStop |
//! | Pet | distance ≤ 1.5 m | Critical / EmergencyStop |
//! | Cliff | depth ≥ 0.15 m | Critical / EmergencyStop |
//! | Tilt | angle > 15° | Critical / EmergencyStop |
//! | BoundaryViolation | always | Warning / BoundaryStop |
//! | Obstacle | distance < 1.0 m | Warning / SlowDown |
//! | anything else | confidence ≥ 0.6 | Warning / SlowDown |
//! | anything else | confidence < 0.6 | Advisory / None |
//!
//! A Person, Pet, Cliff or Tilt event with no usable measurement is treated
//! as inside its stop threshold. The classifier holds only its immutable
//! thresholds, so the same event always yields the same decision.

use lawn_common::interlock::config::ClassifierConfig;
use lawn_common::interlock::hazard::{
    HazardEvent, HazardKind, RequiredAction, SafetyDecision, Severity,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct HazardClassifier {
    cfg: ClassifierConfig,
}

impl HazardClassifier {
    pub const fn new(cfg: ClassifierConfig) -> Self {
        Self { cfg }
    }

    #[inline]
    pub const fn config(&self) -> &ClassifierConfig {
        &self.cfg
    }

    /// Classify one event.
    pub fn classify(&self, event: &HazardEvent) -> SafetyDecision {
        let (severity, action) = match event.kind() {
            HazardKind::Person => self.within_or_scaled(event, event.distance_m(), self.cfg.person_stop_distance_m),
            HazardKind::Pet => self.within_or_scaled(event, event.distance_m(), self.cfg.pet_stop_distance_m),
            HazardKind::Cliff => match event.distance_m() {
                Some(depth) if depth < self.cfg.cliff_stop_depth_m => self.scaled(event),
                _ => CRITICAL,
            },
            HazardKind::Tilt => match event.angle_deg() {
                Some(angle) if angle.abs() <= self.cfg.tilt_stop_angle_deg => self.scaled(event),
                _ => CRITICAL,
            },
            HazardKind::BoundaryViolation => (Severity::Warning, RequiredAction::BoundaryStop),
            HazardKind::Obstacle => match event.distance_m() {
                Some(d) if d < self.cfg.obstacle_slowdown_distance_m => SLOW_DOWN,
                _ => self.scaled(event),
            },
            HazardKind::SensorFault => self.scaled(event),
        };
        SafetyDecision::new(*event, severity, action)
    }

    /// Emergency stop at or inside `limit`, or when the distance is unknown.
    fn within_or_scaled(
        &self,
        event: &HazardEvent,
        distance: Option<f64>,
        limit: f64,
    ) -> (Severity, RequiredAction) {
        match distance {
            Some(d) if d > limit => self.scaled(event),
            _ => CRITICAL,
        }
    }

    fn scaled(&self, event: &HazardEvent) -> (Severity, RequiredAction) {
        if event.confidence() >= self.cfg.warning_confidence {
            SLOW_DOWN
        } else {
            (Severity::Advisory, RequiredAction::None)
        }
    }

    /// Classify a batch and return the winning decision, if any.
    pub fn classify_all<'a, I>(&self, events: I) -> Option<SafetyDecision>
    where
        I: IntoIterator<Item = &'a HazardEvent>,
    {
        most_severe(events.into_iter().map(|e| self.classify(e)))
    }
}

const CRITICAL: (Severity, RequiredAction) = (Severity::Critical, RequiredAction::EmergencyStop);
const SLOW_DOWN: (Severity, RequiredAction) = (Severity::Warning, RequiredAction::SlowDown);

/// Deterministic tie-break across decisions made in the same tick.
///
/// Highest `required_action` wins; equal actions go to the higher severity,
/// then to the earliest detection, then to the lower sensor slot and hazard
/// kind, so the winner never depends on input order.
pub fn most_severe<I>(decisions: I) -> Option<SafetyDecision>
where
    I: IntoIterator<Item = SafetyDecision>,
{
    decisions.into_iter().reduce(|best, d| {
        if outranks(&d, &best) { d } else { best }
    })
}

fn outranks(a: &SafetyDecision, b: &SafetyDecision) -> bool {
    let key = |d: &SafetyDecision| {
        (
            d.required_action,
            d.severity,
            std::cmp::Reverse(d.event.detected_at()),
            std::cmp::Reverse(d.event.sensor().unwrap_or(u8::MAX)),
            std::cmp::Reverse(d.event.kind() as u8),
        )
    };
    key(a) > key(b)
}
