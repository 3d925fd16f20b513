//! Shared bench: one engine with a simulated sensor of every kind.

use lawn_common::interlock::config::InterlockConfig;
use lawn_common::time::Timestamp;

use lawn_interlock::InterlockEngine;
use lawn_interlock::audit::{AuditLog, MemorySink};
use lawn_interlock::drivers::simulation::{
    SimActuator, SimActuatorHandle, SimRelay, SimRelayHandle, SimSensor, SimSensorHandle,
};
use lawn_interlock::sensor::{RawReading, SensorHub, SensorKind, TargetClass};

pub struct Bench {
    pub engine: InterlockEngine,
    pub actuator: SimActuatorHandle,
    pub relay: SimRelayHandle,
    pub sink: MemorySink,
    pub front: SimSensorHandle,
    pub camera: SimSensorHandle,
    pub imu: SimSensorHandle,
    pub cliff: SimSensorHandle,
    pub fence: SimSensorHandle,
}

impl Bench {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: InterlockConfig) -> Self {
        let mut hub = SensorHub::new(config.adapter, &config.cycle);
        let mut add = |name: &str, kind: SensorKind| {
            let (sensor, handle) = SimSensor::new(name, kind);
            hub.add(Box::new(sensor)).expect("hub capacity");
            handle
        };
        let front = add("front_tof", SensorKind::Proximity);
        let camera = add("front_cam", SensorKind::Vision);
        let imu = add("imu", SensorKind::Tilt);
        let cliff = add("deck_cliff", SensorKind::Cliff);
        let fence = add("gps_fence", SensorKind::Boundary);

        let (actuator, actuator_handle) = SimActuator::new();
        let (relay, relay_handle) = SimRelay::new();
        let sink = MemorySink::new();
        let audit = AuditLog::start(Box::new(sink.clone()), &config.audit).expect("audit start");
        let engine = InterlockEngine::new(&config, hub, Box::new(actuator), Box::new(relay), audit);

        Self {
            engine,
            actuator: actuator_handle,
            relay: relay_handle,
            sink,
            front,
            camera,
            imu,
            cliff,
            fence,
        }
    }

    /// Clear every sensor.
    pub fn all_clear(&self) {
        for s in [&self.front, &self.camera, &self.imu, &self.cliff, &self.fence] {
            s.clear();
            s.fail(None);
        }
    }
}

pub fn config() -> InterlockConfig {
    InterlockConfig::with_service_name("interlock-it")
}

pub fn t(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

pub fn person_at(distance_m: f64) -> RawReading {
    RawReading::Proximity {
        target: TargetClass::Person,
        distance_m,
        confidence: 0.9,
    }
}

pub fn outside_fence(outside_m: f64) -> RawReading {
    RawReading::Boundary {
        inside: false,
        outside_m,
    }
}
