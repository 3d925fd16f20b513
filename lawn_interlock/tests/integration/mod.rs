mod support;

mod audit_replay;
mod config_loading;
mod gate_lockout;
mod response_timing;
mod scenarios;
mod sensor_faults;
