use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::{after, bounded, never, select, Receiver, Sender};
use parking_lot::Mutex;
use strum::{EnumIter, FromRepr, IntoStaticStr};
use tracing::{debug, error, info, warn};

use crate::{
    cache::InstrumentedMethodCache,
    config::CaptureConfig,
    logger::{CaptureLogger, CaptureSink},
    probes::{
        NativeBridge, ProbeEntryPoint, ProbeManager, StartOutcome, StopOutcome,
        UNRECOVERABLE_INTERNAL_FAULT,
    },
    protocol::{
        result_code, Command, CommandHandler, ControlEvent, EventStream, RESULT_SUCCESS,
    },
    resolver::MethodResolver,
    runtime::ModuleCatalog,
    session::CaptureRequest,
    Error, Result,
};

/// Name of the thread processing start requests and session timers.
pub const SESSION_THREAD_NAME: &str = "callscope-session";

/// How long a stop waits for queued entries to be written before publishing `Flush`.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum SessionState {
    /// No session
    Idle = 0,
    /// Matching requested methods against the loaded modules
    Resolving = 1,
    /// Handing probes to the native layer
    Installing = 2,
    /// Probes installed, entries are being captured
    Capturing = 3,
    /// Removing probes
    Stopping = 4,
}

enum Job {
    Start {
        request: CaptureRequest,
        reply: Sender<Result<StartOutcome>>,
    },
}

/// State shared by the service handle and its worker thread.
struct SessionCore {
    catalog: Arc<dyn ModuleCatalog>,
    probes: Arc<ProbeManager>,
    logger: Arc<CaptureLogger>,
    events: EventStream,
    state: AtomicU8,
}

impl SessionCore {
    fn state(&self) -> SessionState {
        SessionState::from_repr(self.state.load(Ordering::Acquire)).unwrap_or(SessionState::Idle)
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn start(&self, request: &CaptureRequest) -> Result<StartOutcome> {
        if !self.transition(SessionState::Idle, SessionState::Resolving) {
            debug!(
                target: "callscope::session",
                state = ?self.state(),
                "start ignored, session active"
            );
            return Ok(StartOutcome::AlreadyCapturing);
        }

        let resolver = MethodResolver::new(self.catalog.as_ref());
        let resolved = match resolver.resolve_all(&request.methods) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.set_state(SessionState::Idle);
                self.report_failure(&error);
                return Err(error);
            }
        };

        self.set_state(SessionState::Installing);
        match self.probes.start_capturing(&resolved) {
            Ok(StartOutcome::Started { methods }) => {
                self.set_state(SessionState::Capturing);
                info!(
                    target: "callscope::session",
                    methods,
                    duration = ?request.duration,
                    "capture session started"
                );
                self.events.publish(ControlEvent::CapturingStarted);
                Ok(StartOutcome::Started { methods })
            }
            Ok(outcome) => {
                self.set_state(SessionState::Idle);
                debug!(target: "callscope::session", ?outcome, "nothing installed");
                Ok(outcome)
            }
            Err(error) => {
                self.set_state(SessionState::Idle);
                self.report_failure(&error);
                Err(error)
            }
        }
    }

    fn stop(&self) -> Result<StopOutcome> {
        if !self.transition(SessionState::Capturing, SessionState::Stopping) {
            return Ok(StopOutcome::NotCapturing);
        }

        let result = self.probes.stop_capturing();
        self.set_state(SessionState::Idle);

        if let Err(error) = &result {
            self.report_failure(error);
        } else {
            info!(target: "callscope::session", "capture session stopped");
        }
        self.events.publish(ControlEvent::CapturingStopped);

        match self.logger.flush(FLUSH_TIMEOUT) {
            Ok(()) => self.events.publish(ControlEvent::Flush),
            Err(error) => {
                warn!(target: "callscope::session", %error, "capture log did not drain after stop");
            }
        }

        result.map(|_| StopOutcome::Stopped)
    }

    fn report_failure(&self, error: &Error) {
        warn!(target: "callscope::session", %error, "capture failed");
        self.events.publish(ControlEvent::FailedToCapture {
            failure_type: failure_type(error).to_string(),
            failure_message: error.to_string(),
        });
    }
}

fn failure_type(error: &Error) -> &'static str {
    match error {
        Error::UnresolvedMethods(_) => "UnresolvedMethod",
        Error::Native(_) | Error::Protocol(_) | Error::CommandFailed { .. } | Error::Io(_) => {
            "ProtocolError"
        }
        _ => UNRECOVERABLE_INTERNAL_FAULT,
    }
}

/// Orchestrates capture sessions: resolve, install, capture for a duration, stop.
///
/// Start requests go through a single-slot queue processed by a dedicated worker thread;
/// a second caller blocks until the outstanding request has been handled. The worker also
/// owns the duration timer, so an expiring session is stopped without any caller.
/// [`CaptureService::stop`] may be called from any thread; it races the timer through an
/// atomic state transition and exactly one of them performs the stop.
///
/// Dropping the service force-stops an active session, shuts down the logger and
/// unregisters the probe handler.
///
/// # Examples
///
/// ```rust,ignore
/// let service =
///     CaptureService::new(catalog, bridge, Arc::new(TracingSink), CaptureConfig::default())?;
/// let started = service.start_json(r#"{
///     "methods": [{ "moduleName": "App.dll", "className": "Foo", "methodName": "Bar" }],
///     "duration": "PT30S"
/// }"#)?;
/// ```
pub struct CaptureService {
    core: Arc<SessionCore>,
    config: CaptureConfig,
    entry_point: Arc<ProbeEntryPoint>,
    jobs: Sender<Job>,
    shutdown: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureService {
    /// Wires the pipeline together and registers the probe entry point with `bridge`.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for an invalid configuration, the bridge's error if
    /// the entry point cannot be registered, and [`Error::Io`] if a thread cannot be spawned.
    pub fn new(
        catalog: Arc<dyn ModuleCatalog>,
        bridge: Arc<dyn NativeBridge>,
        sink: Arc<dyn CaptureSink>,
        config: CaptureConfig,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventStream::new();
        let logger = Arc::new(CaptureLogger::start(sink, &config)?);
        let probes = Arc::new(ProbeManager::new(
            Arc::clone(&bridge),
            Arc::new(InstrumentedMethodCache::new()),
            Arc::clone(&logger),
            &config,
        ));

        let entry_point = Arc::new(ProbeEntryPoint::new(events.clone()));
        entry_point.register(probes.clone());
        bridge.register_entry_point(Arc::clone(&entry_point))?;

        let core = Arc::new(SessionCore {
            catalog,
            probes,
            logger,
            events,
            state: AtomicU8::new(SessionState::Idle as u8),
        });

        let (jobs, job_queue) = bounded(1);
        let (shutdown, shutdown_signal) = bounded(1);
        let worker_core = Arc::clone(&core);
        let worker = std::thread::Builder::new()
            .name(SESSION_THREAD_NAME.to_string())
            .spawn(move || run(&worker_core, &job_queue, &shutdown_signal))?;

        Ok(CaptureService {
            core,
            config,
            entry_point,
            jobs,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Starts a session and waits until it is capturing or has failed.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedMethods`] if any description matched nothing (nothing is
    /// installed), the native layer's error if the install failed, and
    /// [`Error::ChannelClosed`] after [`CaptureService::shutdown`].
    pub fn start(&self, request: CaptureRequest) -> Result<StartOutcome> {
        let (reply, outcome) = bounded(1);
        self.jobs
            .send(Job::Start { request, reply })
            .map_err(|_| Error::ChannelClosed)?;
        outcome.recv().map_err(|_| Error::ChannelClosed)?
    }

    /// Parses a JSON request and starts a session.
    ///
    /// # Errors
    /// See [`CaptureRequest::from_json`] and [`CaptureService::start`].
    pub fn start_json(&self, json: &str) -> Result<StartOutcome> {
        self.start(CaptureRequest::from_json(json, &self.config)?)
    }

    /// Stops the active session, if any.
    ///
    /// Publishes `Capturing/Stop` and, once queued entries have been written, `Flush`.
    ///
    /// # Errors
    /// Returns the native layer's error if probes could not be removed; the session is idle
    /// regardless.
    pub fn stop(&self) -> Result<StopOutcome> {
        self.core.stop()
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    /// Returns `true` while probes are installed.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.core.probes.is_capturing()
    }

    /// Number of captured entries dropped because the log queue was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.core.logger.dropped_count()
    }

    /// Session events.
    #[must_use]
    pub fn events(&self) -> &EventStream {
        &self.core.events
    }

    /// The entry point registered with the native layer.
    #[must_use]
    pub fn entry_point(&self) -> &Arc<ProbeEntryPoint> {
        &self.entry_point
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Stops the worker, force-stops any active session and shuts the logger down.
    ///
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        let _ = self.shutdown.try_send(());
        if worker.join().is_err() {
            error!(target: "callscope::session", "session worker panicked");
        }

        if let Err(error) = self.core.stop() {
            warn!(target: "callscope::session", %error, "forced stop failed during shutdown");
        }
        self.entry_point.unregister();
        self.core.logger.shutdown();
        debug!(target: "callscope::session", "capture service shut down");
    }
}

impl Drop for CaptureService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl CommandHandler for CaptureService {
    fn handle(&self, command: Command) -> i32 {
        let result = match command {
            Command::StartCapturing(payload) => CaptureRequest::from_payload(payload, &self.config)
                .and_then(|request| self.start(request))
                .map(|_| ()),
            Command::StopCapturing => self.stop().map(|_| ()),
        };

        match result {
            Ok(()) => RESULT_SUCCESS,
            Err(error) => result_code(&error),
        }
    }
}

fn run(core: &SessionCore, jobs: &Receiver<Job>, shutdown: &Receiver<()>) {
    let mut deadline: Receiver<Instant> = never();

    loop {
        select! {
            recv(jobs) -> job => match job {
                Ok(Job::Start { request, reply }) => {
                    let outcome = core.start(&request);
                    if matches!(outcome, Ok(StartOutcome::Started { .. })) {
                        deadline = after(request.duration);
                    }
                    // The requester may have given up waiting
                    let _ = reply.send(outcome);
                }
                Err(_) => break,
            },
            recv(deadline) -> _ => {
                deadline = never();
                debug!(target: "callscope::session", "capture duration elapsed");
                if let Err(error) = core.stop() {
                    warn!(target: "callscope::session", %error, "timed stop failed");
                }
            },
            recv(shutdown) -> _ => break,
        }
    }
}
