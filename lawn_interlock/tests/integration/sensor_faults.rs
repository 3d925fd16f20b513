//! Sensor faults fail safe: they hold WARNING and block recovery.

use std::time::Duration;

use lawn_common::prelude::*;
use InterlockState as S;

use lawn_common::consts::MAX_READINGS_PER_POLL;
use lawn_interlock::sensor::{RawReading, SensorError, TargetClass};

use super::support::{Bench, person_at, t};

#[test]
fn failing_sensor_enters_warning_and_recovers() {
    let mut b = Bench::new();
    b.imu.fail(Some(SensorError::Unavailable("imu offline".into())));
    let rep = b.engine.tick(t(0));
    assert_eq!(rep.state, S::Warning);
    assert!(!rep.clean);
    assert!(matches!(
        b.engine.audit().history()[0].trigger,
        Trigger::Hazard { event } if event.kind() == HazardKind::SensorFault
    ));

    for i in 1..10 {
        assert_eq!(b.engine.tick(t(i * 50)).state, S::Warning);
    }
    b.imu.fail(None);
    assert_eq!(b.engine.tick(t(500)).state, S::Safe);
    assert_eq!(b.engine.hub().fault_count(2), 10);
}

#[test]
fn slow_sensor_counts_as_faulted() {
    let mut b = Bench::new();
    b.cliff.set_delay(Duration::from_millis(30));
    assert_eq!(b.engine.tick(t(0)).state, S::Warning);
    b.cliff.set_delay(Duration::ZERO);
    assert_eq!(b.engine.tick(t(50)).state, S::Safe);
}

#[test]
fn stale_sample_counts_as_faulted() {
    let mut b = Bench::new();
    b.fence.set_age(Duration::from_millis(500));
    assert_eq!(b.engine.tick(t(1000)).state, S::Warning);
    b.fence.set_age(Duration::ZERO);
    assert_eq!(b.engine.tick(t(1050)).state, S::Safe);
}

#[test]
fn stale_sample_still_reports_its_hazard() {
    let mut b = Bench::new();
    b.front.set(&[person_at(2.0)]);
    b.front.set_age(Duration::from_millis(400));
    assert_eq!(b.engine.tick(t(1000)).state, S::Emergency);

    // Latency is measured from when the data was taken.
    let stats = b.engine.response_stats();
    assert!(stats.emergency_cutoff.max_us >= 400_000);
    assert_eq!(stats.emergency_breaches, 1);
}

#[test]
fn faulted_sensor_blocks_recovery() {
    let mut b = Bench::new();
    let handle = b.engine.handle();
    b.front.set(&[person_at(2.0)]);
    b.engine.tick(t(0));
    b.all_clear();

    b.camera.fail(Some(SensorError::NoData));
    handle.acknowledge("operator").expect("queue open");
    assert_eq!(b.engine.tick(t(50)).state, S::Recovering);
    for i in 2..20 {
        assert_eq!(b.engine.tick(t(i * 50)).state, S::Recovering);
    }
    b.camera.fail(None);
    assert_eq!(b.engine.tick(t(1000)).state, S::Safe);
}

#[test]
fn person_behind_a_full_sample_still_stops_the_mower() {
    let mut b = Bench::new();
    let clutter = RawReading::Proximity {
        target: TargetClass::Obstacle,
        distance_m: 4.0,
        confidence: 0.3,
    };
    let mut readings = vec![clutter; MAX_READINGS_PER_POLL];
    readings.push(person_at(1.0));
    b.front.set(&readings);

    let rep = b.engine.tick(t(0));
    assert_eq!(rep.state, S::Emergency);
    assert!(!rep.clean);
    assert_eq!(b.engine.hub().fault_count(0), 1);
}
