//! Installation and removal of probes, and the callback instrumented code invokes.
//!
//! The [`ProbeManager`] owns the `Idle`/`Capturing` transition. Install and uninstall are
//! serialized by one lock that is never taken on the probe path; probes only read the
//! [`InstrumentedMethodCache`] and an atomic state flag.
//!
//! # Lifecycle
//!
//! 1. [`ProbeManager::start_capturing`] clears the cache, builds an entry per method, and
//!    installs all probes with a single [`NativeBridge::install`] call.
//! 2. Instrumented call sites invoke [`ProbeEntryPoint::invoke`], which forwards to the
//!    manager's [`ProbeHandler`] implementation: arguments are formatted and handed to the
//!    [`CaptureLogger`].
//! 3. [`ProbeManager::stop_capturing`] clears the cache and removes all probes.
//!
//! Starting while capturing and stopping while idle are reported as outcomes, not errors.

mod argument;
mod bridge;
mod entry;

pub use argument::{ArgumentValue, ProbeContext, TraceIdFormat};
pub use bridge::{InstallBatch, NativeBridge};
pub use entry::{ProbeEntryPoint, ProbeHandler, UNRECOVERABLE_INTERNAL_FAULT};

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    cache::InstrumentedMethodCache,
    classifier::SignatureClassifier,
    config::CaptureConfig,
    logger::{ArgumentFormatter, CaptureLogger, LogEntry},
    resolver::ResolvedMethod,
    Result,
};

const IDLE: u8 = 0;
const CAPTURING: u8 = 1;

/// Result of [`ProbeManager::start_capturing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Probes were installed on this many methods
    Started {
        /// Number of instrumented methods
        methods: usize,
    },
    /// A session is already active; nothing changed
    AlreadyCapturing,
    /// No method was left to instrument after exclusions; nothing changed
    NothingToCapture,
}

/// Result of [`ProbeManager::stop_capturing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Probes were removed
    Stopped,
    /// No session was active; nothing changed
    NotCapturing,
}

/// Coordinates probe installation with the native layer.
pub struct ProbeManager {
    bridge: Arc<dyn NativeBridge>,
    cache: Arc<InstrumentedMethodCache>,
    logger: Arc<CaptureLogger>,
    classifier: SignatureClassifier,
    config: CaptureConfig,
    formatter: ArgumentFormatter,
    state: AtomicU8,
    transition: Mutex<()>,
}

impl ProbeManager {
    /// Creates an idle manager.
    #[must_use]
    pub fn new(
        bridge: Arc<dyn NativeBridge>,
        cache: Arc<InstrumentedMethodCache>,
        logger: Arc<CaptureLogger>,
        config: &CaptureConfig,
    ) -> Self {
        ProbeManager {
            bridge,
            cache,
            logger,
            classifier: SignatureClassifier::with_max_depth(config.max_recursion_depth),
            config: config.clone(),
            formatter: ArgumentFormatter,
            state: AtomicU8::new(IDLE),
            transition: Mutex::new(()),
        }
    }

    /// Returns `true` while probes are installed.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.state.load(Ordering::Acquire) == CAPTURING
    }

    /// The cache probes read from.
    #[must_use]
    pub fn cache(&self) -> &Arc<InstrumentedMethodCache> {
        &self.cache
    }

    /// The logger captured calls are delivered to.
    #[must_use]
    pub fn logger(&self) -> &Arc<CaptureLogger> {
        &self.logger
    }

    /// Instruments `methods`.
    ///
    /// Methods declared in an excluded namespace are skipped. The install is all or nothing:
    /// on failure the cache is cleared again and the manager stays idle.
    ///
    /// # Errors
    /// Returns the native layer's error if the install was refused.
    pub fn start_capturing(&self, methods: &[ResolvedMethod]) -> Result<StartOutcome> {
        if methods.is_empty() {
            return Ok(StartOutcome::NothingToCapture);
        }

        let _transition = self.transition.lock();
        if self.is_capturing() {
            debug!(target: "callscope::probes", "start ignored, already capturing");
            return Ok(StartOutcome::AlreadyCapturing);
        }

        self.cache.clear();

        let selected: Vec<ResolvedMethod> = methods
            .iter()
            .filter(|resolved| {
                let excluded = self
                    .config
                    .is_namespace_excluded(resolved.method.namespace());
                if excluded {
                    debug!(
                        target: "callscope::probes",
                        method = %resolved.method.name,
                        namespace = resolved.method.namespace(),
                        "skipping method in excluded namespace"
                    );
                }
                !excluded
            })
            .cloned()
            .collect();

        if selected.is_empty() {
            return Ok(StartOutcome::NothingToCapture);
        }

        let entries = self.cache.populate(&selected, &self.classifier);
        let batch = InstallBatch::from_methods(&entries);

        if let Err(error) = self.bridge.install(&batch) {
            self.cache.clear();
            warn!(
                target: "callscope::probes",
                %error,
                methods = batch.len(),
                "probe install failed"
            );
            return Err(error);
        }

        self.state.store(CAPTURING, Ordering::Release);
        info!(target: "callscope::probes", methods = batch.len(), "probes installed");
        Ok(StartOutcome::Started {
            methods: batch.len(),
        })
    }

    /// Removes every probe.
    ///
    /// The cache is cleared before the native uninstall, so probes still firing during the
    /// removal find no entry and return immediately. The manager is idle afterwards even if
    /// the native layer reported an error.
    ///
    /// # Errors
    /// Returns the native layer's error if the uninstall failed.
    pub fn stop_capturing(&self) -> Result<StopOutcome> {
        let _transition = self.transition.lock();
        if !self.is_capturing() {
            return Ok(StopOutcome::NotCapturing);
        }

        self.state.store(IDLE, Ordering::Release);
        self.cache.clear();
        let result = self.bridge.uninstall();
        self.cache.clear();

        match result {
            Ok(()) => {
                info!(target: "callscope::probes", "probes removed");
                Ok(StopOutcome::Stopped)
            }
            Err(error) => {
                warn!(target: "callscope::probes", %error, "probe uninstall failed");
                Err(error)
            }
        }
    }
}

impl ProbeHandler for ProbeManager {
    fn on_enter(&self, method_id: u64, args: &[ArgumentValue], context: &ProbeContext) {
        if !self.is_capturing() {
            return;
        }
        let Some(method) = self.cache.get(method_id) else {
            return;
        };

        let current = std::thread::current();
        let thread_name = context.thread_name.as_deref().or(current.name());
        if thread_name.is_some_and(|name| self.logger.is_thread_excluded(name)) {
            return;
        }

        let arguments: Vec<String> = args
            .iter()
            .enumerate()
            .filter(|(index, _)| method.supported.contains(*index))
            .map(|(_, value)| self.formatter.format(value))
            .collect();

        self.logger
            .enqueue_from(thread_name, LogEntry::new(&method, arguments, context));
    }
}
