//! Shipped configuration → registry-built engine.

use std::path::PathBuf;

use lawn_common::config::{ConfigError, ConfigLoader, Validate};
use lawn_common::interlock::config::{InterlockConfig, SensorConfig};
use lawn_common::interlock::state::InterlockState as S;

use lawn_interlock::drivers::default_registry;
use lawn_interlock::drivers::simulation::{SimActuator, SimRelay};
use lawn_interlock::{InterlockEngine, InterlockError};

use super::support::{Bench, config, person_at, t};

fn shipped_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join("interlock.toml")
}

#[test]
fn shipped_config_loads_and_validates() {
    let cfg = InterlockConfig::load_validated(&shipped_config_path()).expect("shipped config");
    assert_eq!(cfg.sensors.len(), 5);
    assert_eq!(cfg.response.emergency_budget_ms, 100);
    assert_eq!(cfg.response.boundary_budget_ms, 200);
    assert!(default_registry().build_hub(&cfg).is_ok());
}

#[test]
fn shipped_script_runs_warning_then_emergency() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = InterlockConfig::load_validated(&shipped_config_path()).expect("shipped config");
    let audit_path = dir.path().join("interlock.jsonl");
    cfg.audit.path = Some(audit_path.display().to_string());

    let (actuator, _) = SimActuator::new();
    let (relay, _) = SimRelay::new();
    let mut engine =
        InterlockEngine::from_config(&cfg, &default_registry(), Box::new(actuator), Box::new(relay)).expect("engine");

    let mut states = Vec::new();
    for poll in 1..=200u64 {
        states.push(engine.tick(t(poll * 50)).state);
    }
    assert_eq!(states[38], S::Safe);
    assert_eq!(states[39], S::Warning); // poll 40
    assert_eq!(states[78], S::Warning);
    assert_eq!(states[79], S::Safe); // poll 80
    assert_eq!(states[158], S::Safe);
    assert_eq!(states[159], S::Emergency); // poll 160
    assert_eq!(states[199], S::Emergency);

    engine.audit().close();
    assert!(audit_path.exists());
    assert_eq!(engine.audit().stats().persisted, 3);
}

#[test]
fn weaker_thresholds_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("weak.toml");
    std::fs::write(
        &path,
        r#"
[shared]
service_name = "weak"

[classifier]
person_stop_distance_m = 2.0
"#,
    )
    .expect("write config");
    assert!(matches!(
        InterlockConfig::load_validated(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn stop_distance_beyond_report_range_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wide.toml");
    std::fs::write(
        &path,
        r#"
[shared]
service_name = "wide"

[classifier]
person_stop_distance_m = 6.0
"#,
    )
    .expect("write config");
    assert!(matches!(
        InterlockConfig::load_validated(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn stricter_tilt_and_cliff_stops_need_lower_report_floors() {
    let mut cfg = InterlockConfig::with_service_name("strict");
    cfg.classifier.tilt_stop_angle_deg = 4.0;
    assert!(cfg.validate().is_err());
    cfg.adapter.tilt_report_angle_deg = 2.0;
    assert!(cfg.validate().is_ok());

    cfg.classifier.cliff_stop_depth_m = 0.03;
    assert!(cfg.validate().is_err());
    cfg.adapter.cliff_report_depth_m = 0.01;
    assert!(cfg.validate().is_ok());
}

#[test]
fn widened_stop_distance_is_enforced_end_to_end() {
    let mut cfg = config();
    cfg.classifier.person_stop_distance_m = 6.0;
    cfg.adapter.proximity_report_range_m = 7.0;
    cfg.validate().expect("widened config");

    let mut b = Bench::with_config(cfg);
    b.front.set(&[person_at(5.5)]);
    assert_eq!(b.engine.tick(t(0)).state, S::Emergency);
}

#[test]
fn slow_tick_for_emergency_budget_is_rejected() {
    let mut cfg = InterlockConfig::with_service_name("slow");
    cfg.response.emergency_budget_ms = 60;
    cfg.response.watchdog_timeout_ms = 120;
    assert!(cfg.validate().is_err());
    cfg.cycle.tick_us = 25_000;
    cfg.cycle.sensor_budget_us = 10_000;
    assert!(cfg.validate().is_ok());
}

#[test]
fn unknown_sensor_kind_fails_engine_construction() {
    let mut cfg = InterlockConfig::with_service_name("bad-kind");
    cfg.sensors.push(SensorConfig {
        name: "lidar".into(),
        kind: "lidar".into(),
        params: Default::default(),
    });
    let (actuator, _) = SimActuator::new();
    let (relay, _) = SimRelay::new();
    let result = InterlockEngine::from_config(&cfg, &default_registry(), Box::new(actuator), Box::new(relay));
    assert!(matches!(result, Err(InterlockError::Sensor(_))));
}
