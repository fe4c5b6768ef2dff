//! Shared fixtures for unit tests.


use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::{Condvar, Mutex};

use crate::{
    cache::InstrumentedMethodCache,
    logger::{CaptureSink, LogEntry},
    probes::{InstallBatch, NativeBridge, ProbeEntryPoint},
    Error, Result,
};

#[derive(Default)]
struct Gate {
    state: Mutex<(bool, bool)>,
    changed: Condvar,
}

/// Sink collecting entries in memory, optionally blocking or panicking.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
    gate: Option<Gate>,
    panic_on: Option<String>,
}

impl MemorySink {
    /// A sink whose writes block until [`MemorySink::release`] is called.
    pub fn blocking() -> Self {
        MemorySink {
            gate: Some(Gate::default()),
            ..Self::default()
        }
    }

    /// A sink that panics when asked to write `message`.
    pub fn panicking_on(message: &str) -> Self {
        MemorySink {
            panic_on: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(LogEntry::message).collect()
    }

    /// Blocks until a write is parked on the gate.
    pub fn wait_until_blocked(&self) {
        if let Some(gate) = &self.gate {
            let mut state = gate.state.lock();
            while !state.0 {
                gate.changed.wait(&mut state);
            }
        }
    }

    /// Lets parked and future writes through.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.state.lock().1 = true;
            gate.changed.notify_all();
        }
    }
}

impl CaptureSink for MemorySink {
    fn write(&self, entry: &LogEntry) {
        if let Some(gate) = &self.gate {
            let mut state = gate.state.lock();
            state.0 = true;
            gate.changed.notify_all();
            while !state.1 {
                gate.changed.wait(&mut state);
            }
        }

        let message = entry.message();
        if self.panic_on.as_deref() == Some(message.as_str()) {
            panic!("sink refused {message}");
        }
        self.entries.lock().push(entry.clone());
    }
}

/// Native bridge recording every call, optionally refusing installs.
#[derive(Default)]
pub struct RecordingBridge {
    pub installs: Mutex<Vec<InstallBatch>>,
    pub uninstalls: Mutex<usize>,
    pub entry_point: Mutex<Option<Arc<ProbeEntryPoint>>>,
    pub fail_install: AtomicBool,
    /// Cache whose size is sampled on every install
    pub watched_cache: Mutex<Option<Arc<InstrumentedMethodCache>>>,
    pub cache_len_at_install: Mutex<Vec<usize>>,
}

impl RecordingBridge {
    pub fn failing() -> Self {
        let bridge = Self::default();
        bridge.fail_install.store(true, Ordering::SeqCst);
        bridge
    }

    pub fn install_count(&self) -> usize {
        self.installs.lock().len()
    }

    pub fn uninstall_count(&self) -> usize {
        *self.uninstalls.lock()
    }
}

impl NativeBridge for RecordingBridge {
    fn install(&self, batch: &InstallBatch) -> Result<()> {
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(Error::Native("install refused".into()));
        }
        if let Some(cache) = self.watched_cache.lock().as_ref() {
            self.cache_len_at_install.lock().push(cache.len());
        }
        self.installs.lock().push(batch.clone());
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        *self.uninstalls.lock() += 1;
        Ok(())
    }

    fn register_entry_point(&self, entry_point: Arc<ProbeEntryPoint>) -> Result<()> {
        *self.entry_point.lock() = Some(entry_point);
        Ok(())
    }
}
