//! Command gate under concurrent submitters.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use lawn_common::interlock::motion::{CommandSource, MotionCommand};
use lawn_common::interlock::state::InterlockState as S;

use lawn_interlock::BlockReason;

use super::support::{Bench, person_at, t};

const SUBMITTERS: usize = 4;

#[test]
fn no_command_reaches_actuator_after_emergency_stop() {
    for round in 0..20 {
        let mut b = Bench::new();
        let stop = Arc::new(AtomicBool::new(false));
        let blocked = Arc::new(AtomicU64::new(0));

        let workers: Vec<_> = (0..SUBMITTERS)
            .map(|i| {
                let gate = b.engine.gate();
                let stop = stop.clone();
                let blocked = blocked.clone();
                thread::spawn(move || {
                    let source = if i % 2 == 0 {
                        CommandSource::Navigation
                    } else {
                        CommandSource::ManualControl
                    };
                    while !stop.load(Ordering::Acquire) {
                        match gate.submit(MotionCommand::drive(0.5, 0.1, true, source)) {
                            Ok(_) => {}
                            Err(bl) => {
                                assert_eq!(bl.reason, BlockReason::SafetyLockout);
                                assert_eq!(bl.state, S::Emergency);
                                blocked.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(2));
        b.front.set(&[person_at(2.0)]);
        assert_eq!(b.engine.tick(t(round * 100)).state, S::Emergency);

        // Let the submitters hammer the locked gate for a while.
        thread::sleep(Duration::from_millis(5));
        let after_stop = b.actuator.forwarded_count();
        thread::sleep(Duration::from_millis(5));
        stop.store(true, Ordering::Release);
        for w in workers {
            w.join().expect("submitter panicked");
        }

        // A forward after the cutoff would have cleared it.
        assert!(b.actuator.is_cut_off(), "round {round}: command forwarded after cutoff");
        assert_eq!(b.actuator.forwarded_count(), after_stop);
        assert!(blocked.load(Ordering::Relaxed) > 0);
    }
}

#[test]
fn blocked_commands_are_published() {
    let mut b = Bench::new();
    let events = b.engine.handle().subscribe();
    b.front.set(&[person_at(1.0)]);
    b.engine.tick(t(0));

    let gate = b.engine.gate();
    let cmd = MotionCommand::drive(0.4, 0.0, false, CommandSource::ManualControl);
    assert!(gate.submit(cmd).is_err());

    let blocked: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            lawn_interlock::events::InterlockEvent::CommandBlocked { command, state, reason } => {
                Some((command, state, reason))
            }
            _ => None,
        })
        .collect();
    assert_eq!(blocked, vec![(cmd, S::Emergency, "SAFETY_LOCKOUT")]);
}

#[test]
fn non_finite_command_is_invalid_outside_emergency() {
    let b = Bench::new();
    let gate = b.engine.gate();
    let bad = MotionCommand::drive(f64::NAN, 0.0, true, CommandSource::Navigation);
    let blocked = gate.submit(bad).expect_err("NaN velocity");
    assert_eq!(blocked.reason, BlockReason::InvalidCommand);
    assert_eq!(b.actuator.forwarded_count(), 0);
}

#[test]
fn actuator_failure_is_reported_not_swallowed() {
    let b = Bench::new();
    b.actuator.set_forward_failure(true);
    let blocked = b
        .engine
        .gate()
        .submit(MotionCommand::drive(0.4, 0.0, true, CommandSource::Navigation))
        .expect_err("bus down");
    assert!(matches!(blocked.reason, BlockReason::ActuatorFault(_)));
    assert_eq!(blocked.reason.code(), "ACTUATOR_FAULT");
    assert_eq!(blocked.state, S::Safe);
}

#[test]
fn drive_response_serializes_status_reason() {
    let mut b = Bench::new();
    b.front.set(&[person_at(1.0)]);
    b.engine.tick(t(0));
    let outcome = b
        .engine
        .gate()
        .submit(MotionCommand::drive(0.4, 0.0, true, CommandSource::Navigation));
    let json = serde_json::to_value(lawn_interlock::DriveResponse::from(&outcome)).expect("serialize");
    assert_eq!(json["status_reason"], "SAFETY_LOCKOUT");
    assert_eq!(json["state"], "EMERGENCY");
}
