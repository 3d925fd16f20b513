//! Append-only audit log.
//!
//! `AuditLog::record()` runs on the control loop thread (and on the cutoff
//! watchdog thread) and never waits on storage. It assigns the sequence
//! number, appends to the in-memory session history and hands the entry to
//! a background flusher over a channel. The flusher writes batches to an
//! [`AuditSink`], retries failed writes, and keeps its pending buffer
//! bounded by evicting the oldest entries that are not emergency related.
//! Emergency-related entries are never evicted.
//!
//! [`replay()`] rebuilds the sequence of states visited from an ordered log.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use lawn_common::interlock::audit::{AuditEntry, Trigger};
use lawn_common::interlock::config::AuditConfig;
use lawn_common::interlock::state::InterlockState;
use lawn_common::time::Timestamp;

/// Attempts made to persist what is left after `close()` before giving up.
const FINAL_FLUSH_ATTEMPTS: u32 = 3;

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Injected or sink-specific failure.
    #[error("audit sink failed: {0}")]
    Sink(String),
}

/// Replay found a log that does not describe a valid state sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("sequence gap: expected seq {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    #[error("entry {seq} starts in {found} but the log was in {expected}")]
    Discontinuity {
        seq: u64,
        expected: InterlockState,
        found: InterlockState,
    },
}

// ─── Sinks ──────────────────────────────────────────────────────────

/// Durable destination for audit entries. Runs on the flusher thread.
///
/// A failed `write()` is retried later with the same entries (plus any
/// that arrived since), so sinks must tolerate seeing an entry twice.
pub trait AuditSink: Send + 'static {
    fn write(&mut self, entries: &[AuditEntry]) -> Result<(), AuditError>;
}

/// One JSON object per line, appended to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
    last_seq: u64,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it (and its directory) if needed.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), "audit file opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            last_seq: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonLinesSink {
    fn write(&mut self, entries: &[AuditEntry]) -> Result<(), AuditError> {
        for entry in entries {
            if entry.seq <= self.last_seq {
                continue;
            }
            serde_json::to_writer(&mut self.writer, entry)?;
            self.writer.write_all(b"\n")?;
            self.last_seq = entry.seq;
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Read every entry from a JSON-lines audit file, in file order.
pub fn read_json_lines(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

/// Split an appended multi-session file at each `seq == 1`.
pub fn split_sessions(entries: Vec<AuditEntry>) -> Vec<Vec<AuditEntry>> {
    let mut sessions: Vec<Vec<AuditEntry>> = Vec::new();
    for e in entries {
        match sessions.last_mut() {
            Some(cur) if e.seq != 1 => cur.push(e),
            _ => sessions.push(vec![e]),
        }
    }
    sessions
}

/// In-memory sink with failure and latency injection, for tests and
/// simulation runs without an audit path.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
    fail_next: Arc<AtomicU32>,
    delay_ms: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries persisted so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Make the next `n` writes fail.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Sleep this long in every write.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl AuditSink for MemorySink {
    fn write(&mut self, entries: &[AuditEntry]) -> Result<(), AuditError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AuditError::Sink("injected failure".into()));
        }
        let mut stored = self.entries.lock();
        let last = stored.last().map_or(0, |e| e.seq);
        stored.extend(entries.iter().filter(|e| e.seq > last).copied());
        Ok(())
    }
}

// ─── Audit Log ──────────────────────────────────────────────────────

/// Flusher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub recorded: u64,
    pub persisted: u64,
    pub evicted: u64,
    pub write_failures: u64,
}

#[derive(Default)]
struct Counters {
    persisted: AtomicU64,
    evicted: AtomicU64,
    write_failures: AtomicU64,
}

struct LogState {
    history: Vec<AuditEntry>,
    tx: Option<Sender<AuditEntry>>,
}

struct Shared {
    state: Mutex<LogState>,
    counters: Arc<Counters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Session audit log. Clones share the same log.
#[derive(Clone)]
pub struct AuditLog {
    shared: Arc<Shared>,
}

impl AuditLog {
    /// Start the flusher thread writing to `sink`.
    pub fn start(sink: Box<dyn AuditSink>, cfg: &AuditConfig) -> Result<Self, AuditError> {
        let (tx, rx) = mpsc::channel();
        let counters = Arc::new(Counters::default());
        let flusher = Flusher {
            rx,
            sink,
            pending: VecDeque::new(),
            max_pending: cfg.max_pending,
            retry: Duration::from_millis(cfg.retry_interval_ms),
            counters: counters.clone(),
        };
        let worker = thread::Builder::new()
            .name("audit-flush".into())
            .spawn(move || flusher.run())?;

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LogState {
                    history: Vec::new(),
                    tx: Some(tx),
                }),
                counters,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    /// Append one entry. Never blocks on persistence.
    pub fn record(
        &self,
        from_state: InterlockState,
        to_state: InterlockState,
        trigger: Trigger,
        timestamp: Timestamp,
    ) -> AuditEntry {
        let mut st = self.shared.state.lock();
        let entry = AuditEntry {
            seq: st.history.len() as u64 + 1,
            from_state,
            to_state,
            trigger,
            timestamp,
        };
        st.history.push(entry);
        let sent = st.tx.as_ref().is_some_and(|tx| tx.send(entry).is_ok());
        if !sent {
            warn!(seq = entry.seq, "audit flusher unavailable, entry kept in memory only");
        }
        entry
    }

    /// Full session history, oldest first.
    pub fn history(&self) -> Vec<AuditEntry> {
        self.shared.state.lock().history.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> AuditStats {
        let c = &self.shared.counters;
        AuditStats {
            recorded: self.len() as u64,
            persisted: c.persisted.load(Ordering::Relaxed),
            evicted: c.evicted.load(Ordering::Relaxed),
            write_failures: c.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting entries for persistence, flush what is pending and
    /// join the flusher. Idempotent.
    pub fn close(&self) {
        self.shared.state.lock().tx = None;
        if let Some(worker) = self.shared.worker.lock().take() {
            if worker.join().is_err() {
                error!("audit flusher panicked");
            }
        }
    }
}

// ─── Flusher ────────────────────────────────────────────────────────

struct Flusher {
    rx: Receiver<AuditEntry>,
    sink: Box<dyn AuditSink>,
    pending: VecDeque<AuditEntry>,
    max_pending: usize,
    retry: Duration,
    counters: Arc<Counters>,
}

impl Flusher {
    fn run(mut self) {
        let mut open = true;
        let mut final_attempts = 0u32;

        while open || !self.pending.is_empty() {
            if open {
                let received = if self.pending.is_empty() {
                    self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
                } else {
                    self.rx.recv_timeout(self.retry)
                };
                match received {
                    Ok(entry) => self.enqueue(entry),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => open = false,
                }
                while let Ok(entry) = self.rx.try_recv() {
                    self.enqueue(entry);
                }
            }

            if self.pending.is_empty() {
                continue;
            }
            match self.sink.write(self.pending.make_contiguous()) {
                Ok(()) => {
                    let n = self.pending.len() as u64;
                    self.counters.persisted.fetch_add(n, Ordering::Relaxed);
                    debug!(entries = n, "audit batch persisted");
                    self.pending.clear();
                }
                Err(e) => {
                    let failures = self.counters.write_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(error = %e, pending = self.pending.len(), failures, "audit write failed, will retry");
                    if !open {
                        final_attempts += 1;
                        if final_attempts >= FINAL_FLUSH_ATTEMPTS {
                            error!(lost = self.pending.len(), "audit entries could not be persisted at shutdown");
                            return;
                        }
                        thread::sleep(self.retry);
                    }
                }
            }
        }
        debug!("audit flusher stopped");
    }

    fn enqueue(&mut self, entry: AuditEntry) {
        self.pending.push_back(entry);
        if self.pending.len() <= self.max_pending {
            return;
        }
        match self.pending.iter().position(|e| !e.is_emergency_related()) {
            Some(idx) => {
                if let Some(dropped) = self.pending.remove(idx) {
                    let evicted = self.counters.evicted.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(seq = dropped.seq, evicted, "audit buffer full, evicted non-emergency entry");
                }
            }
            None => {
                debug!(pending = self.pending.len(), "audit buffer over bound with emergency entries only");
            }
        }
    }
}

// ─── Replay ─────────────────────────────────────────────────────────

/// Rebuild the states visited by an ordered session log.
///
/// Starts from `SAFE`. Every transition entry must start in the current
/// state and appends its `to_state`; fault entries (`from == to`) must
/// match the current state and add nothing. Sequence numbers must be
/// contiguous from the first entry.
pub fn replay(entries: &[AuditEntry]) -> Result<Vec<InterlockState>, ReplayError> {
    let mut states = vec![InterlockState::Safe];
    let mut current = InterlockState::Safe;
    let mut expected_seq = entries.first().map_or(1, |e| e.seq);

    for e in entries {
        if e.seq != expected_seq {
            return Err(ReplayError::SequenceGap {
                expected: expected_seq,
                found: e.seq,
            });
        }
        expected_seq += 1;
        if e.from_state != current {
            return Err(ReplayError::Discontinuity {
                seq: e.seq,
                expected: current,
                found: e.from_state,
            });
        }
        if e.is_transition() {
            current = e.to_state;
            states.push(current);
        }
    }
    Ok(states)
}
