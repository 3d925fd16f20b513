//! Interlock state machine.
//!
//! SAFE ↔ WARNING, any → BOUNDARY_STOP (except EMERGENCY), any → EMERGENCY,
//! EMERGENCY/BOUNDARY_STOP → RECOVERING on acknowledgment only,
//! RECOVERING → SAFE after a clean poll cycle.
//!
//! The machine is pure: it never touches hardware, clocks or logs. The
//! engine feeds it inputs on the control loop thread and acts on the
//! returned transition.

use lawn_common::interlock::audit::Trigger;
use lawn_common::interlock::hazard::{RequiredAction, SafetyDecision};
use lawn_common::interlock::state::InterlockState;

/// Inputs that drive the interlock state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MachineInput {
    /// Winning decision of a tick (see `classifier::most_severe`).
    Decision(SafetyDecision),
    /// Physical button, UI or host stop request.
    ExplicitStop,
    /// Operator acknowledgment. `cutoff_confirmed` is false while the
    /// actuator has not yet acknowledged an emergency stop.
    Acknowledge { cutoff_confirmed: bool },
    /// Complete poll cycle with no hazard reported.
    CleanCycle,
}

/// Result of feeding one input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionResult {
    Changed {
        from: InterlockState,
        to: InterlockState,
        trigger: Trigger,
    },
    /// Input accepted but the state stays as it is.
    Unchanged,
    Rejected(&'static str),
}

impl TransitionResult {
    #[inline]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Global interlock state machine.
#[derive(Debug, Clone)]
pub struct InterlockStateMachine {
    state: InterlockState,
}

impl InterlockStateMachine {
    pub const fn new() -> Self {
        Self {
            state: InterlockState::Safe,
        }
    }

    #[inline]
    pub const fn state(&self) -> InterlockState {
        self.state
    }

    /// Apply one input.
    pub fn handle(&mut self, input: MachineInput) -> TransitionResult {
        use InterlockState as S;

        let (next, trigger) = match input {
            MachineInput::ExplicitStop => (S::Emergency, Trigger::Manual),

            MachineInput::Decision(d) => {
                let trigger = Trigger::Hazard { event: d.event };
                let next = match (self.state, d.required_action) {
                    (_, RequiredAction::EmergencyStop) => S::Emergency,
                    (S::Emergency, RequiredAction::BoundaryStop) => S::Emergency,
                    (_, RequiredAction::BoundaryStop) => S::BoundaryStop,
                    (S::Safe, RequiredAction::SlowDown) => S::Warning,
                    // RECOVERING stays put: the hazard resets the clean-cycle wait.
                    (s, RequiredAction::SlowDown | RequiredAction::None) => s,
                };
                (next, trigger)
            }

            MachineInput::Acknowledge { cutoff_confirmed } => match self.state {
                S::Emergency if !cutoff_confirmed => {
                    return TransitionResult::Rejected("emergency cutoff not confirmed by actuator");
                }
                S::Emergency | S::BoundaryStop => (S::Recovering, Trigger::Recovery),
                S::Recovering => return TransitionResult::Rejected("already recovering"),
                S::Safe | S::Warning => return TransitionResult::Rejected("nothing to acknowledge"),
            },

            MachineInput::CleanCycle => match self.state {
                S::Warning => (S::Safe, Trigger::Cleared),
                S::Recovering => (S::Safe, Trigger::Recovery),
                // Latched states never clear on their own.
                s => (s, Trigger::Cleared),
            },
        };

        if next == self.state {
            return TransitionResult::Unchanged;
        }
        let from = self.state;
        self.state = next;
        TransitionResult::Changed {
            from,
            to: next,
            trigger,
        }
    }

    /// Force EMERGENCY regardless of the current state. Returns the
    /// transition if the state actually changed.
    pub fn force_emergency(&mut self) -> TransitionResult {
        self.handle(MachineInput::ExplicitStop)
    }
}

impl Default for InterlockStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
