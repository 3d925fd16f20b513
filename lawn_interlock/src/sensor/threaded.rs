//! Background sampling for blocking sensor drivers.
//!
//! A `ThreadedSource` runs the blocking read on its own thread and keeps only
//! the latest result. `poll()` never waits on the device: it hands back the
//! last sample, or `SensorError::Stale` once that sample is older than the
//! configured threshold (a hung bus shows up as staleness, not as a stall).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use lawn_common::time::Timestamp;

use super::{RawReading, Sample, SensorError, SensorKind, SensorSource};

type Latest = Arc<Mutex<Option<Result<Sample, SensorError>>>>;

/// Wraps a blocking sampler in a background thread.
pub struct ThreadedSource {
    name: String,
    kind: SensorKind,
    latest: Latest,
    stale: Duration,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedSource {
    /// Spawn the sampling thread.
    ///
    /// `sample` is called back to back, sleeping `period` between calls. It
    /// may block for as long as the device needs.
    pub fn spawn<F>(
        name: &str,
        kind: SensorKind,
        period: Duration,
        stale: Duration,
        mut sample: F,
    ) -> Result<Self, SensorError>
    where
        F: FnMut() -> Result<Vec<RawReading>, SensorError> + Send + 'static,
    {
        let latest: Latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let thread_latest = latest.clone();
        let thread_running = running.clone();
        let thread_name = name.to_string();
        let worker = thread::Builder::new()
            .name(format!("sensor-{name}"))
            .spawn(move || {
                debug!(sensor = %thread_name, "sampler started");
                while thread_running.load(Ordering::Acquire) {
                    let result = sample().map(|r| Sample::from_readings(Timestamp::now(), &r));
                    if let Err(e) = &result {
                        debug!(sensor = %thread_name, error = %e, "sample failed");
                    }
                    *thread_latest.lock() = Some(result);
                    thread::sleep(period);
                }
                debug!(sensor = %thread_name, "sampler stopped");
            })
            .map_err(|e| SensorError::Unavailable(format!("{name}: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            kind,
            latest,
            stale,
            running,
            worker: Some(worker),
        })
    }
}

impl SensorSource for ThreadedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn poll(&mut self, now: Timestamp) -> Result<Sample, SensorError> {
        let latest = self.latest.lock().clone();
        let sample = latest.ok_or(SensorError::NoData)??;
        let age = now.saturating_since(sample.taken_at);
        if age > self.stale {
            return Err(SensorError::Stale {
                age_ms: age.as_millis() as u64,
            });
        }
        Ok(sample)
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            // A sampler stuck in a device read cannot be interrupted; detach it.
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                warn!(sensor = %self.name, "sampler thread still busy at shutdown, detaching");
            }
        }
    }
}
