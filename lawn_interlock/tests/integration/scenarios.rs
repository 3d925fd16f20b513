//! End-to-end hazard scenarios through real sensor polling.

use lawn_common::interlock::audit::Trigger;
use lawn_common::interlock::hazard::HazardKind;
use lawn_common::interlock::motion::{CommandSource, MotionCommand};
use lawn_common::interlock::state::InterlockState as S;

use lawn_interlock::BlockReason;
use lawn_interlock::events::InterlockEvent;
use lawn_interlock::sensor::{RawReading, TargetClass};

use super::support::{Bench, outside_fence, person_at, t};

fn nav_drive() -> MotionCommand {
    MotionCommand::drive(0.8, 0.0, true, CommandSource::Navigation)
}

// ── Emergency ──

#[test]
fn person_within_three_metres_locks_out_all_motion() {
    let mut b = Bench::new();
    let gate = b.engine.gate();
    assert!(gate.submit(nav_drive()).is_ok());

    b.front.set(&[person_at(2.5)]);
    let rep = b.engine.tick(t(1000));
    assert_eq!(rep.state, S::Emergency);
    assert!(b.actuator.is_cut_off());

    let before = b.actuator.forwarded_count();
    for cmd in [
        nav_drive(),
        MotionCommand::stop(CommandSource::ManualControl),
        MotionCommand::blade_disable(CommandSource::Service),
    ] {
        let blocked = gate.submit(cmd).expect_err("emergency must block");
        assert_eq!(blocked.reason, BlockReason::SafetyLockout);
        assert_eq!(blocked.state, S::Emergency);
    }
    assert_eq!(b.actuator.forwarded_count(), before);
}

#[test]
fn person_beyond_three_metres_is_only_a_warning() {
    let mut b = Bench::new();
    b.front.set(&[person_at(3.5)]);
    assert_eq!(b.engine.tick(t(0)).state, S::Warning);
    assert_eq!(b.actuator.emergency_stops(), 0);
}

#[test]
fn vision_person_without_range_is_an_emergency() {
    let mut b = Bench::new();
    b.camera.set(&[RawReading::Vision {
        target: TargetClass::Person,
        distance_m: None,
        confidence: 0.3,
    }]);
    assert_eq!(b.engine.tick(t(0)).state, S::Emergency);
}

#[test]
fn pet_cliff_and_tilt_each_trigger_emergency() {
    let cases: [(fn(&Bench), HazardKind); 3] = [
        (
            |b| {
                b.front.set(&[RawReading::Proximity {
                    target: TargetClass::Pet,
                    distance_m: 1.2,
                    confidence: 0.8,
                }])
            },
            HazardKind::Pet,
        ),
        (|b| b.cliff.set(&[RawReading::Cliff { depth_m: 0.2 }]), HazardKind::Cliff),
        (
            |b| {
                b.imu.set(&[RawReading::Tilt {
                    roll_deg: 18.0,
                    pitch_deg: 2.0,
                }])
            },
            HazardKind::Tilt,
        ),
    ];

    for (setup, kind) in cases {
        let mut b = Bench::new();
        setup(&b);
        assert_eq!(b.engine.tick(t(0)).state, S::Emergency, "{kind:?}");
        let log = b.engine.audit().history();
        assert!(
            matches!(log[0].trigger, Trigger::Hazard { event } if event.kind() == kind),
            "{kind:?}: {:?}",
            log[0].trigger
        );
    }
}

#[test]
fn shallow_cliff_and_gentle_slope_are_ignored() {
    let mut b = Bench::new();
    b.cliff.set(&[RawReading::Cliff { depth_m: 0.02 }]);
    b.imu.set(&[RawReading::Tilt {
        roll_deg: 3.0,
        pitch_deg: 1.0,
    }]);
    let rep = b.engine.tick(t(0));
    assert_eq!(rep.state, S::Safe);
    assert!(rep.clean);
}

#[test]
fn emergency_wins_over_simultaneous_boundary() {
    let mut b = Bench::new();
    b.fence.set(&[outside_fence(0.5)]);
    b.front.set(&[person_at(1.0)]);
    assert_eq!(b.engine.tick(t(0)).state, S::Emergency);
    assert_eq!(b.engine.audit().len(), 1);
}

#[test]
fn emergency_never_clears_on_its_own() {
    let mut b = Bench::new();
    b.front.set(&[person_at(2.0)]);
    b.engine.tick(t(0));
    b.all_clear();
    for i in 1..=1000 {
        assert_eq!(b.engine.tick(t(i * 50)).state, S::Emergency);
    }
    assert_eq!(b.engine.audit().len(), 1);
}

// ── Boundary ──

#[test]
fn boundary_exit_halts_and_allows_only_zero_velocity() {
    let mut b = Bench::new();
    b.fence.set(&[outside_fence(0.3)]);
    assert_eq!(b.engine.tick(t(0)).state, S::BoundaryStop);
    assert_eq!(b.actuator.halts(), 1);

    let gate = b.engine.gate();
    let blocked = gate.submit(nav_drive()).expect_err("drive out of fence");
    assert_eq!(blocked.reason, BlockReason::SafetyLockout);
    assert!(gate.submit(MotionCommand::blade_disable(CommandSource::Navigation)).is_ok());
    assert!(gate.submit(MotionCommand::stop(CommandSource::Navigation)).is_ok());

    // Back inside the fence is not enough; an operator must acknowledge.
    b.all_clear();
    for i in 1..=50 {
        assert_eq!(b.engine.tick(t(i * 50)).state, S::BoundaryStop);
    }
    b.engine.handle().acknowledge("operator").expect("queue open");
    assert_eq!(b.engine.tick(t(3000)).state, S::Safe);
    assert!(gate.submit(nav_drive()).is_ok());
}

#[test]
fn person_during_boundary_stop_escalates() {
    let mut b = Bench::new();
    b.fence.set(&[outside_fence(0.3)]);
    b.engine.tick(t(0));
    b.front.set(&[person_at(2.0)]);
    assert_eq!(b.engine.tick(t(50)).state, S::Emergency);
    let states: Vec<_> = b.engine.audit().history().iter().map(|e| e.to_state).collect();
    assert_eq!(states, vec![S::BoundaryStop, S::Emergency]);
}

// ── Warning ──

#[test]
fn warning_clamps_and_clears_after_clean_cycle() {
    let mut b = Bench::new();
    b.front.set(&[RawReading::Proximity {
        target: TargetClass::Obstacle,
        distance_m: 0.7,
        confidence: 0.9,
    }]);
    assert_eq!(b.engine.tick(t(0)).state, S::Warning);

    let ex = b
        .engine
        .gate()
        .submit(MotionCommand::drive(1.2, -1.5, true, CommandSource::Navigation))
        .expect("warning allows reduced motion");
    assert!(ex.clamped);
    let fwd = b.actuator.last_forwarded().expect("forwarded");
    assert!(fwd.linear_velocity.abs() <= 0.3 + 1e-9);
    assert!(fwd.angular_velocity.abs() <= 0.5 + 1e-9);

    b.all_clear();
    let rep = b.engine.tick(t(50));
    assert_eq!(rep.state, S::Safe);
    assert!(rep.clean);
}

// ── Recovery ──

#[test]
fn full_emergency_recovery_cycle() {
    let mut b = Bench::new();
    let handle = b.engine.handle();
    let events = handle.subscribe();

    b.camera.set(&[RawReading::Vision {
        target: TargetClass::Person,
        distance_m: Some(1.8),
        confidence: 0.95,
    }]);
    b.engine.tick(t(0));
    assert_eq!(handle.state(), S::Emergency);

    // The person walks off but an obstacle is still reported: RECOVERING holds.
    b.camera.set(&[RawReading::Vision {
        target: TargetClass::Obstacle,
        distance_m: Some(0.6),
        confidence: 0.9,
    }]);
    handle.acknowledge("operator").expect("queue open");
    assert_eq!(b.engine.tick(t(50)).state, S::Recovering);
    let gate = b.engine.gate();
    assert!(gate.submit(nav_drive()).is_err());
    assert!(gate.submit(MotionCommand::stop(CommandSource::ManualControl)).is_ok());

    b.all_clear();
    assert_eq!(b.engine.tick(t(100)).state, S::Safe);
    assert!(gate.submit(nav_drive()).is_ok());

    let history = b.engine.audit().history();
    let seqs: Vec<_> = history.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(history[1].trigger, Trigger::Recovery);
    assert_eq!((history[2].from_state, history[2].to_state), (S::Recovering, S::Safe));

    let changes = events
        .try_iter()
        .filter(|e| matches!(e, InterlockEvent::StateChanged { .. }))
        .count();
    assert_eq!(changes, 3);
}

#[test]
fn acknowledging_with_person_still_present_re_enters_emergency() {
    let mut b = Bench::new();
    let handle = b.engine.handle();
    b.front.set(&[person_at(2.0)]);
    b.engine.tick(t(0));

    handle.acknowledge("operator").expect("queue open");
    assert_eq!(b.engine.tick(t(50)).state, S::Emergency);
    let states: Vec<_> = b.engine.audit().history().iter().map(|e| e.to_state).collect();
    assert_eq!(states, vec![S::Emergency, S::Recovering, S::Emergency]);
    assert_eq!(b.actuator.emergency_stops(), 2);
}

#[test]
fn acknowledge_in_safe_is_rejected() {
    let mut b = Bench::new();
    let handle = b.engine.handle();
    let events = handle.subscribe();
    handle.acknowledge("operator").expect("queue open");
    assert_eq!(b.engine.tick(t(0)).state, S::Safe);
    assert!(b.engine.audit().is_empty());
    assert!(events.try_iter().any(|e| matches!(
        e,
        InterlockEvent::AcknowledgeRejected { state: S::Safe, .. }
    )));
}
