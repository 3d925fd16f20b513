//! Persisted audit log round trip through the engine.

use std::path::Path;

use lawn_common::interlock::audit::Trigger;
use lawn_common::interlock::config::InterlockConfig;
use lawn_common::interlock::hazard::{HazardEvent, HazardKind};
use lawn_common::interlock::motion::CommandSource;
use lawn_common::interlock::state::InterlockState as S;

use lawn_interlock::InterlockEngine;
use lawn_interlock::audit::{AuditLog, JsonLinesSink, read_json_lines, replay, split_sessions};
use lawn_interlock::drivers::simulation::{SimActuator, SimRelay, SimSensor};
use lawn_interlock::sensor::{SensorHub, SensorKind};

use super::support::{Bench, config, person_at, t};

// ── Helpers ──

/// Engine with one proximity sensor, logging to `path`.
fn file_engine(path: &Path) -> (InterlockEngine, lawn_interlock::drivers::simulation::SimSensorHandle) {
    let config: InterlockConfig = config();
    let mut hub = SensorHub::new(config.adapter, &config.cycle);
    let (front, front_handle) = SimSensor::new("front_tof", SensorKind::Proximity);
    hub.add(Box::new(front)).expect("hub capacity");
    let (actuator, _) = SimActuator::new();
    let (relay, _) = SimRelay::new();
    let sink = JsonLinesSink::open(path).expect("open audit file");
    let audit = AuditLog::start(Box::new(sink), &config.audit).expect("audit start");
    (
        InterlockEngine::new(&config, hub, Box::new(actuator), Box::new(relay), audit),
        front_handle,
    )
}

/// Person → ack → clear, then a manual stop.
fn run_session(engine: &mut InterlockEngine, front: &lawn_interlock::drivers::simulation::SimSensorHandle) {
    let handle = engine.handle();
    front.set(&[person_at(2.0)]);
    engine.tick(t(0));
    front.clear();
    handle.acknowledge("operator").expect("queue open");
    engine.tick(t(50));
    handle.emergency_stop(CommandSource::ManualControl).expect("queue open");
    engine.tick(t(100));
}

// ── Tests ──

#[test]
fn persisted_log_replays_to_the_live_state_sequence() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("audit").join("interlock.jsonl");
    let (mut engine, front) = file_engine(&path);
    run_session(&mut engine, &front);

    let live = engine.audit().history();
    engine.audit().close();
    assert_eq!(engine.audit().stats().persisted, live.len() as u64);

    let persisted = read_json_lines(&path).expect("read back");
    assert_eq!(persisted, live);

    let states = replay(&persisted).expect("replay");
    assert_eq!(states, vec![S::Safe, S::Emergency, S::Recovering, S::Safe, S::Emergency]);
    assert_eq!(*states.last().expect("non-empty"), engine.state());
    assert_eq!(persisted[3].trigger, Trigger::Manual);
}

#[test]
fn appended_sessions_replay_independently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("interlock.jsonl");

    for _ in 0..2 {
        let (mut engine, front) = file_engine(&path);
        run_session(&mut engine, &front);
        engine.audit().close();
    }

    let sessions = split_sessions(read_json_lines(&path).expect("read back"));
    assert_eq!(sessions.len(), 2);
    for s in &sessions {
        assert_eq!(s[0].seq, 1);
        assert_eq!(replay(s).expect("replay").len(), 5);
    }
}

#[test]
fn sink_failures_do_not_hold_back_transitions() {
    let mut b = Bench::new();
    b.sink.fail_next(2);
    let handle = b.engine.handle();

    handle
        .report_hazard(HazardEvent::new(HazardKind::Person, t(0), 0.9).with_distance(1.0))
        .expect("queue open");
    assert_eq!(b.engine.tick(t(10)).state, S::Emergency);
    assert!(b.actuator.is_cut_off());
    assert_eq!(b.engine.audit().len(), 1);

    b.engine.audit().close();
    let stats = b.engine.audit().stats();
    assert!(stats.write_failures >= 1);
    assert_eq!(b.sink.entries(), b.engine.audit().history());
}

#[test]
fn unresponsive_actuator_is_audited_as_a_fault() {
    let mut b = Bench::new();
    b.actuator.set_unresponsive(true);
    b.front.set(&[person_at(1.0)]);
    b.engine.tick(t(0));
    b.engine.tick(t(120));
    b.engine.tick(t(300));

    let log = b.engine.audit().history();
    let faults: Vec<_> = log.iter().filter(|e| !e.is_transition()).collect();
    assert_eq!(faults.len(), 2);
    assert!(matches!(faults[0].trigger, Trigger::ActuatorUnresponsive { .. }));
    assert!(matches!(faults[1].trigger, Trigger::HardCutoff { .. }));
    assert!(faults.iter().all(|e| e.to_state == S::Emergency));

    // Fault notes do not change the replayed state sequence.
    assert_eq!(replay(&log).expect("replay"), vec![S::Safe, S::Emergency]);
    assert!(b.relay.is_tripped());
}
