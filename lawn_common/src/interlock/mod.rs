//! Safety interlock shared types.
//!
//! Used by `lawn_interlock` and by host processes that embed it:
//! - [`hazard`] - hazard events, severities and decisions
//! - [`state`] - the global interlock state
//! - [`motion`] - drive/blade commands
//! - [`audit`] - audit entries and triggers
//! - [`config`] - `InterlockConfig` and its sections

pub mod audit;
pub mod config;
pub mod hazard;
pub mod motion;
pub mod state;
