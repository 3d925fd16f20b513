//! LawnBerry Common Library
//!
//! This crate provides the shared domain types, constants and configuration
//! loading utilities for the LawnBerry safety crates.
//!
//! # Module Structure
//!
//! - [`interlock`] - Hazard, state, command and audit types plus `InterlockConfig`
//! - [`actuator`] - Drive/blade hardware driver contract
//! - [`watchdog`] - Hardware E-stop relay contract
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Response budgets, thresholds and capacities
//! - [`time`] - Monotonic timestamps
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! lawn = { package = "lawn_common", path = "../lawn_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use lawn_common::consts::*;
//! use lawn_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod actuator;
pub mod config;
pub mod consts;
pub mod interlock;
pub mod prelude;
pub mod time;
pub mod watchdog;
