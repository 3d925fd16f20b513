//! Motion command types.
//!
//! Defines `CommandSource` and `MotionCommand`. Commands are created by
//! upstream control logic and only reach hardware through the actuator gate.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Velocities with magnitude below this are treated as zero [m/s, rad/s].
pub const ZERO_VELOCITY_EPSILON: f64 = 1e-6;

/// Origin of a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CommandSource {
    /// Autonomous navigation / mowing planner.
    Navigation = 0,
    /// Manual drive from the web dashboard.
    ManualControl = 1,
    /// Internal safety logic (stop commands).
    Safety = 2,
    /// Maintenance or bench testing.
    Service = 3,
}

impl CommandSource {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Navigation),
            1 => Some(Self::ManualControl),
            2 => Some(Self::Safety),
            3 => Some(Self::Service),
            _ => None,
        }
    }
}

impl Default for CommandSource {
    fn default() -> Self {
        Self::Navigation
    }
}

/// Drive and blade command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Forward velocity [m/s] (negative = reverse).
    pub linear_velocity: f64,
    /// Yaw rate [rad/s].
    pub angular_velocity: f64,
    /// Blade motor enable.
    pub blade_enable: bool,
    pub source: CommandSource,
    pub issued_at: Timestamp,
}

impl MotionCommand {
    pub fn drive(
        linear_velocity: f64,
        angular_velocity: f64,
        blade_enable: bool,
        source: CommandSource,
    ) -> Self {
        Self {
            linear_velocity,
            angular_velocity,
            blade_enable,
            source,
            issued_at: Timestamp::now(),
        }
    }

    /// Zero velocity, blade off.
    pub fn stop(source: CommandSource) -> Self {
        Self::drive(0.0, 0.0, false, source)
    }

    /// Zero velocity, blade off. Alias kept for call sites that only care
    /// about the blade.
    pub fn blade_disable(source: CommandSource) -> Self {
        Self::stop(source)
    }

    #[must_use]
    pub fn at(mut self, issued_at: Timestamp) -> Self {
        self.issued_at = issued_at;
        self
    }

    /// Both velocities are finite numbers.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.linear_velocity.is_finite() && self.angular_velocity.is_finite()
    }

    #[inline]
    pub fn has_linear_motion(&self) -> bool {
        self.linear_velocity.abs() > ZERO_VELOCITY_EPSILON
    }

    #[inline]
    pub fn has_angular_motion(&self) -> bool {
        self.angular_velocity.abs() > ZERO_VELOCITY_EPSILON
    }

    /// Any commanded wheel motion.
    #[inline]
    pub fn has_motion(&self) -> bool {
        self.has_linear_motion() || self.has_angular_motion()
    }

    /// No wheel motion and blade off.
    #[inline]
    pub fn is_full_stop(&self) -> bool {
        !self.has_motion() && !self.blade_enable
    }
}
