//! Configuration structures for the safety interlock.
//!
//! All config types use `serde::Deserialize` for TOML loading. Optional
//! sections fall back to the documented defaults in [`crate::consts`].
//!
//! Classifier thresholds may only be configured toward more conservative
//! values than the documented ones; `validate()` rejects anything weaker.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig, Validate};
use crate::consts::{
    AUDIT_MAX_PENDING, BOUNDARY_RESPONSE_BUDGET_MS, CLIFF_STOP_DEPTH_M,
    CUTOFF_WATCHDOG_TIMEOUT_MS, EMERGENCY_RESPONSE_BUDGET_MS, MAX_SENSORS,
    OBSTACLE_SLOWDOWN_DISTANCE_M, PERSON_STOP_DISTANCE_M, PET_STOP_DISTANCE_M,
    REDUCED_ANGULAR_VELOCITY, REDUCED_LINEAR_VELOCITY, SENSOR_BUDGET_US, SENSOR_STALE_MS,
    TICK_US, TICK_US_MAX, TICK_US_MIN, TILT_STOP_ANGLE_DEG, WARNING_CONFIDENCE,
};

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level interlock configuration. Immutable once the control loop starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterlockConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

impl InterlockConfig {
    /// Defaults for every section with the given service name.
    pub fn with_service_name(name: &str) -> Self {
        Self {
            shared: SharedConfig {
                log_level: Default::default(),
                service_name: name.to_string(),
            },
            cycle: CycleConfig::default(),
            adapter: AdapterConfig::default(),
            classifier: ClassifierConfig::default(),
            response: ResponseConfig::default(),
            gate: GateConfig::default(),
            audit: AuditConfig::default(),
            sensors: Vec::new(),
        }
    }
}

impl Validate for InterlockConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.cycle.validate().map_err(ConfigError::ValidationError)?;
        self.adapter.validate().map_err(ConfigError::ValidationError)?;
        self.classifier.validate().map_err(ConfigError::ValidationError)?;
        self.response.validate().map_err(ConfigError::ValidationError)?;
        self.gate.validate().map_err(ConfigError::ValidationError)?;
        self.audit.validate().map_err(ConfigError::ValidationError)?;
        validate_sensors(&self.sensors).map_err(ConfigError::ValidationError)?;
        validate_coverage(&self.adapter, &self.classifier).map_err(ConfigError::ValidationError)?;

        // Hazard landing just after a poll is handled one tick later; two
        // ticks must fit inside the emergency budget.
        let two_ticks_ms = 2 * self.cycle.tick_us as u64 / 1000;
        if two_ticks_ms > self.response.emergency_budget_ms {
            return Err(ConfigError::ValidationError(format!(
                "tick_us {} too slow for emergency_budget_ms {}",
                self.cycle.tick_us, self.response.emergency_budget_ms
            )));
        }
        Ok(())
    }
}

/// The adapter must report everything the classifier could stop on. A
/// reading filtered out before classification can never trip an emergency.
fn validate_coverage(adapter: &AdapterConfig, classifier: &ClassifierConfig) -> Result<(), String> {
    let widest_stop = classifier
        .person_stop_distance_m
        .max(classifier.pet_stop_distance_m);
    if adapter.proximity_report_range_m < widest_stop {
        return Err(format!(
            "proximity_report_range_m {} shorter than stop distance {widest_stop}",
            adapter.proximity_report_range_m
        ));
    }
    if adapter.tilt_report_angle_deg >= classifier.tilt_stop_angle_deg {
        return Err(format!(
            "tilt_report_angle_deg {} must be below tilt_stop_angle_deg {}",
            adapter.tilt_report_angle_deg, classifier.tilt_stop_angle_deg
        ));
    }
    if adapter.cliff_report_depth_m >= classifier.cliff_stop_depth_m {
        return Err(format!(
            "cliff_report_depth_m {} must be below cliff_stop_depth_m {}",
            adapter.cliff_report_depth_m, classifier.cliff_stop_depth_m
        ));
    }
    Ok(())
}

// ─── Cycle ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Control loop period [µs] (default: 50 000 = 20 Hz).
    #[serde(default = "default_tick_us")]
    pub tick_us: u32,
    /// Per-sensor poll budget [µs] (default: 20 000).
    #[serde(default = "default_sensor_budget_us")]
    pub sensor_budget_us: u32,
    /// Threaded sensor sample staleness threshold [ms] (default: 200).
    #[serde(default = "default_sensor_stale_ms")]
    pub sensor_stale_ms: u64,
}

fn default_tick_us() -> u32 {
    TICK_US
}
fn default_sensor_budget_us() -> u32 {
    SENSOR_BUDGET_US
}
fn default_sensor_stale_ms() -> u64 {
    SENSOR_STALE_MS
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            tick_us: TICK_US,
            sensor_budget_us: SENSOR_BUDGET_US,
            sensor_stale_ms: SENSOR_STALE_MS,
        }
    }
}

impl CycleConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_us < TICK_US_MIN || self.tick_us > TICK_US_MAX {
            return Err(format!(
                "tick_us {} out of range [{}, {}]",
                self.tick_us, TICK_US_MIN, TICK_US_MAX
            ));
        }
        if self.sensor_budget_us == 0 || self.sensor_budget_us >= self.tick_us {
            return Err(format!(
                "sensor_budget_us {} must be in (0, tick_us={})",
                self.sensor_budget_us, self.tick_us
            ));
        }
        if self.sensor_stale_ms == 0 {
            return Err("sensor_stale_ms must be > 0".to_string());
        }
        Ok(())
    }
}

// ─── Adapter ────────────────────────────────────────────────────────

/// Raw-reading → hazard normalization thresholds.
///
/// Readings below these levels are not hazards and produce no event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Proximity targets farther than this are ignored [m].
    #[serde(default = "default_proximity_report_range")]
    pub proximity_report_range_m: f64,
    /// Tilt below this is ignored [deg].
    #[serde(default = "default_tilt_report_angle")]
    pub tilt_report_angle_deg: f64,
    /// Drop shallower than this is ignored [m].
    #[serde(default = "default_cliff_report_depth")]
    pub cliff_report_depth_m: f64,
}

fn default_proximity_report_range() -> f64 {
    5.0
}
fn default_tilt_report_angle() -> f64 {
    5.0
}
fn default_cliff_report_depth() -> f64 {
    0.05
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            proximity_report_range_m: 5.0,
            tilt_report_angle_deg: 5.0,
            cliff_report_depth_m: 0.05,
        }
    }
}

impl AdapterConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Reporting must cover the stop thresholds or hazards would vanish
        // before classification.
        if !(self.proximity_report_range_m >= PERSON_STOP_DISTANCE_M) {
            return Err(format!(
                "proximity_report_range_m {} must be >= {PERSON_STOP_DISTANCE_M}",
                self.proximity_report_range_m
            ));
        }
        if !(self.tilt_report_angle_deg >= 0.0 && self.tilt_report_angle_deg < TILT_STOP_ANGLE_DEG) {
            return Err(format!(
                "tilt_report_angle_deg {} must be in [0, {TILT_STOP_ANGLE_DEG})",
                self.tilt_report_angle_deg
            ));
        }
        if !(self.cliff_report_depth_m >= 0.0 && self.cliff_report_depth_m < CLIFF_STOP_DEPTH_M) {
            return Err(format!(
                "cliff_report_depth_m {} must be in [0, {CLIFF_STOP_DEPTH_M})",
                self.cliff_report_depth_m
            ));
        }
        Ok(())
    }
}

// ─── Classifier ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Person at or within this distance → emergency stop [m] (min 3.0).
    #[serde(default = "default_person_stop")]
    pub person_stop_distance_m: f64,
    /// Pet at or within this distance → emergency stop [m] (min 1.5).
    #[serde(default = "default_pet_stop")]
    pub pet_stop_distance_m: f64,
    /// Cliff at or beyond this depth → emergency stop [m] (max 0.15).
    #[serde(default = "default_cliff_stop")]
    pub cliff_stop_depth_m: f64,
    /// Tilt strictly above this → emergency stop [deg] (max 15).
    #[serde(default = "default_tilt_stop")]
    pub tilt_stop_angle_deg: f64,
    /// Obstacles within this distance → at least slow-down [m].
    #[serde(default = "default_obstacle_slowdown")]
    pub obstacle_slowdown_distance_m: f64,
    /// Confidence at or above which a non-critical hazard is a warning.
    #[serde(default = "default_warning_confidence")]
    pub warning_confidence: f64,
}

fn default_person_stop() -> f64 {
    PERSON_STOP_DISTANCE_M
}
fn default_pet_stop() -> f64 {
    PET_STOP_DISTANCE_M
}
fn default_cliff_stop() -> f64 {
    CLIFF_STOP_DEPTH_M
}
fn default_tilt_stop() -> f64 {
    TILT_STOP_ANGLE_DEG
}
fn default_obstacle_slowdown() -> f64 {
    OBSTACLE_SLOWDOWN_DISTANCE_M
}
fn default_warning_confidence() -> f64 {
    WARNING_CONFIDENCE
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            person_stop_distance_m: PERSON_STOP_DISTANCE_M,
            pet_stop_distance_m: PET_STOP_DISTANCE_M,
            cliff_stop_depth_m: CLIFF_STOP_DEPTH_M,
            tilt_stop_angle_deg: TILT_STOP_ANGLE_DEG,
            obstacle_slowdown_distance_m: OBSTACLE_SLOWDOWN_DISTANCE_M,
            warning_confidence: WARNING_CONFIDENCE,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.person_stop_distance_m >= PERSON_STOP_DISTANCE_M) {
            return Err(format!(
                "person_stop_distance_m {} weaker than {PERSON_STOP_DISTANCE_M}",
                self.person_stop_distance_m
            ));
        }
        if !(self.pet_stop_distance_m >= PET_STOP_DISTANCE_M) {
            return Err(format!(
                "pet_stop_distance_m {} weaker than {PET_STOP_DISTANCE_M}",
                self.pet_stop_distance_m
            ));
        }
        if !(self.cliff_stop_depth_m > 0.0 && self.cliff_stop_depth_m <= CLIFF_STOP_DEPTH_M) {
            return Err(format!(
                "cliff_stop_depth_m {} must be in (0, {CLIFF_STOP_DEPTH_M}]",
                self.cliff_stop_depth_m
            ));
        }
        if !(self.tilt_stop_angle_deg > 0.0 && self.tilt_stop_angle_deg <= TILT_STOP_ANGLE_DEG) {
            return Err(format!(
                "tilt_stop_angle_deg {} must be in (0, {TILT_STOP_ANGLE_DEG}]",
                self.tilt_stop_angle_deg
            ));
        }
        if !(self.obstacle_slowdown_distance_m >= 0.0 && self.obstacle_slowdown_distance_m.is_finite()) {
            return Err(format!(
                "obstacle_slowdown_distance_m {} must be finite and >= 0",
                self.obstacle_slowdown_distance_m
            ));
        }
        if !(0.0..=1.0).contains(&self.warning_confidence) {
            return Err(format!(
                "warning_confidence {} out of range [0, 1]",
                self.warning_confidence
            ));
        }
        Ok(())
    }
}

// ─── Response ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Detection → emergency cutoff budget [ms] (max 100).
    #[serde(default = "default_emergency_budget")]
    pub emergency_budget_ms: u64,
    /// Detection → boundary stop budget [ms] (max 200).
    #[serde(default = "default_boundary_budget")]
    pub boundary_budget_ms: u64,
    /// Unacknowledged emergency stop → hardware relay [ms].
    #[serde(default = "default_watchdog_timeout")]
    pub watchdog_timeout_ms: u64,
}

fn default_emergency_budget() -> u64 {
    EMERGENCY_RESPONSE_BUDGET_MS
}
fn default_boundary_budget() -> u64 {
    BOUNDARY_RESPONSE_BUDGET_MS
}
fn default_watchdog_timeout() -> u64 {
    CUTOFF_WATCHDOG_TIMEOUT_MS
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            emergency_budget_ms: EMERGENCY_RESPONSE_BUDGET_MS,
            boundary_budget_ms: BOUNDARY_RESPONSE_BUDGET_MS,
            watchdog_timeout_ms: CUTOFF_WATCHDOG_TIMEOUT_MS,
        }
    }
}

impl ResponseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.emergency_budget_ms == 0 || self.emergency_budget_ms > EMERGENCY_RESPONSE_BUDGET_MS {
            return Err(format!(
                "emergency_budget_ms {} out of range [1, {EMERGENCY_RESPONSE_BUDGET_MS}]",
                self.emergency_budget_ms
            ));
        }
        if self.boundary_budget_ms == 0 || self.boundary_budget_ms > BOUNDARY_RESPONSE_BUDGET_MS {
            return Err(format!(
                "boundary_budget_ms {} out of range [1, {BOUNDARY_RESPONSE_BUDGET_MS}]",
                self.boundary_budget_ms
            ));
        }
        if self.watchdog_timeout_ms <= self.emergency_budget_ms {
            return Err(format!(
                "watchdog_timeout_ms {} must exceed emergency_budget_ms {}",
                self.watchdog_timeout_ms, self.emergency_budget_ms
            ));
        }
        Ok(())
    }
}

// ─── Gate ───────────────────────────────────────────────────────────

/// Reduced motion envelope applied while in WARNING.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateConfig {
    /// [m/s]
    #[serde(default = "default_reduced_linear")]
    pub reduced_linear_velocity: f64,
    /// [rad/s]
    #[serde(default = "default_reduced_angular")]
    pub reduced_angular_velocity: f64,
}

fn default_reduced_linear() -> f64 {
    REDUCED_LINEAR_VELOCITY
}
fn default_reduced_angular() -> f64 {
    REDUCED_ANGULAR_VELOCITY
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            reduced_linear_velocity: REDUCED_LINEAR_VELOCITY,
            reduced_angular_velocity: REDUCED_ANGULAR_VELOCITY,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("reduced_linear_velocity", self.reduced_linear_velocity),
            ("reduced_angular_velocity", self.reduced_angular_velocity),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("{name} {v} must be finite and > 0"));
            }
        }
        Ok(())
    }
}

// ─── Audit ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file for persisted entries. `None` keeps the session log
    /// in memory only.
    #[serde(default)]
    pub path: Option<String>,
    /// Entries allowed to wait for persistence before non-emergency entries
    /// are evicted.
    #[serde(default = "default_audit_max_pending")]
    pub max_pending: usize,
    /// Flusher retry period after a failed write [ms].
    #[serde(default = "default_audit_retry_ms")]
    pub retry_interval_ms: u64,
}

fn default_audit_max_pending() -> usize {
    AUDIT_MAX_PENDING
}
fn default_audit_retry_ms() -> u64 {
    100
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_pending: AUDIT_MAX_PENDING,
            retry_interval_ms: 100,
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_pending < 16 {
            return Err(format!("max_pending {} must be >= 16", self.max_pending));
        }
        if self.retry_interval_ms == 0 {
            return Err("retry_interval_ms must be > 0".to_string());
        }
        if let Some(p) = &self.path {
            if p.trim().is_empty() {
                return Err("audit path cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

// ─── Sensors ────────────────────────────────────────────────────────

/// One sensor source, built through the sensor registry by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Unique sensor name (used in logs and fault reports).
    pub name: String,
    /// Registry key: `proximity`, `tilt`, `cliff`, `boundary`, `vision`.
    pub kind: String,
    /// Driver-specific parameters.
    #[serde(default)]
    pub params: toml::Table,
}

fn validate_sensors(sensors: &[SensorConfig]) -> Result<(), String> {
    if sensors.len() > MAX_SENSORS {
        return Err(format!(
            "{} sensors configured, maximum is {MAX_SENSORS}",
            sensors.len()
        ));
    }
    let mut seen = HashSet::new();
    for s in sensors {
        if s.name.trim().is_empty() {
            return Err("sensor name cannot be empty".to_string());
        }
        if !seen.insert(s.name.as_str()) {
            return Err(format!("duplicate sensor name '{}'", s.name));
        }
    }
    Ok(())
}
