//! System-wide constants for the LawnBerry safety stack.
//!
//! Single source of truth for response budgets, classifier thresholds and
//! fixed capacities. Imported by all crates; no duplication permitted.

use static_assertions::const_assert;

// ─── Response Budgets ───────────────────────────────────────────────

/// Hazard detection → actuator cutoff acknowledgment [ms].
pub const EMERGENCY_RESPONSE_BUDGET_MS: u64 = 100;

/// Boundary violation detection → drive halt [ms].
pub const BOUNDARY_RESPONSE_BUDGET_MS: u64 = 200;

/// Default window before an unacknowledged emergency stop escalates to the
/// hardware relay [ms].
pub const CUTOFF_WATCHDOG_TIMEOUT_MS: u64 = 250;

// ─── Control Loop ───────────────────────────────────────────────────

/// Default control loop tick (20 Hz = 50 000 µs).
pub const TICK_US: u32 = 50_000;

/// Slowest permitted tick. Anything slower cannot meet the emergency budget
/// with margin.
pub const TICK_US_MAX: u32 = 50_000;

/// Fastest permitted tick.
pub const TICK_US_MIN: u32 = 1_000;

/// Default per-sensor poll budget inside one tick [µs].
pub const SENSOR_BUDGET_US: u32 = 20_000;

/// Default age after which a threaded sensor sample counts as stale [ms].
pub const SENSOR_STALE_MS: u64 = 200;

// ─── Capacities ─────────────────────────────────────────────────────

/// Maximum number of registered sensor sources.
pub const MAX_SENSORS: usize = 16;

/// Maximum hazard events carried by one poll cycle.
pub const MAX_EVENTS_PER_TICK: usize = 32;

/// Maximum raw readings a single source may return per poll.
pub const MAX_READINGS_PER_POLL: usize = 8;

/// Default bound on audit entries waiting for persistence.
pub const AUDIT_MAX_PENDING: usize = 4096;

// ─── Classifier Thresholds ──────────────────────────────────────────

/// Person within this distance forces an emergency stop [m].
pub const PERSON_STOP_DISTANCE_M: f64 = 3.0;

/// Pet within this distance forces an emergency stop [m].
pub const PET_STOP_DISTANCE_M: f64 = 1.5;

/// Cliff drop at or beyond this depth forces an emergency stop [m].
pub const CLIFF_STOP_DEPTH_M: f64 = 0.15;

/// Tilt strictly above this angle forces an emergency stop [deg].
pub const TILT_STOP_ANGLE_DEG: f64 = 15.0;

/// Obstacles closer than this are always at least a slow-down [m].
pub const OBSTACLE_SLOWDOWN_DISTANCE_M: f64 = 1.0;

/// Confidence at or above which a non-critical hazard becomes a warning.
pub const WARNING_CONFIDENCE: f64 = 0.6;

// ─── Reduced Envelope (WARNING) ─────────────────────────────────────

/// Linear speed cap while in WARNING [m/s].
pub const REDUCED_LINEAR_VELOCITY: f64 = 0.3;

/// Angular speed cap while in WARNING [rad/s].
pub const REDUCED_ANGULAR_VELOCITY: f64 = 0.5;

const_assert!(EMERGENCY_RESPONSE_BUDGET_MS < BOUNDARY_RESPONSE_BUDGET_MS);
const_assert!(TICK_US_MAX as u64 / 1000 < EMERGENCY_RESPONSE_BUDGET_MS);
const_assert!(MAX_SENSORS <= MAX_EVENTS_PER_TICK);
