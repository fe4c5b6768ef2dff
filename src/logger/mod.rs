//! Delivery of captured calls to a [`CaptureSink`] without stalling the application.
//!
//! Application threads only format arguments and hand the finished [`LogEntry`] to a
//! bounded queue; one dedicated consumer thread writes entries to the sink. When the queue
//! is full the entry is dropped and counted, and a warning is emitted at most once per
//! configured interval. Producers never block and never observe an error.
//!
//! # Delivery Modes
//!
//! - [`CaptureLogger::enqueue`] - background delivery through the queue (captured calls)
//! - [`CaptureLogger::log_inline`] - synchronous write on the calling thread, for low volume
//!   diagnostics
//!
//! # Feedback Loops
//!
//! Threads whose names are listed in [`CaptureConfig::excluded_thread_names`] (by default the
//! host's console logger thread and the consumer thread itself) never produce entries, so a
//! sink that calls instrumented code cannot feed itself.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use callscope::config::CaptureConfig;
//! use callscope::logger::{CaptureLogger, EnqueueOutcome, LogEntry, TracingSink};
//!
//! let logger = CaptureLogger::start(Arc::new(TracingSink), &CaptureConfig::default())?;
//! assert_eq!(logger.enqueue(LogEntry::diagnostic("hello")), EnqueueOutcome::Queued);
//! logger.shutdown();
//! assert_eq!(logger.enqueue(LogEntry::diagnostic("late")), EnqueueOutcome::Completed);
//! # Ok::<(), callscope::Error>(())
//! ```

mod entry;
mod format;
mod sink;

pub use entry::{CaptureScope, LogEntry};
pub use format::{ArgumentFormatter, UNSUPPORTED_TEXT};
pub use sink::{CaptureSink, JsonLinesSink, TracingSink};

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::{config::CaptureConfig, Error, Result};

const NEVER_WARNED: u64 = u64::MAX;

/// Result of handing an entry to the background queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The entry will be written by the consumer thread
    Queued,
    /// The queue was full; the entry was discarded and counted
    Dropped,
    /// The calling thread is excluded from producing entries
    Excluded,
    /// The logger was shut down; the entry was discarded
    Completed,
}

enum Message {
    Entry(LogEntry),
    Flush(Sender<()>),
}

/// Bounded, drop-on-full capture logger with a dedicated consumer thread.
pub struct CaptureLogger {
    sender: Sender<Message>,
    shutdown: Sender<()>,
    completed: AtomicBool,
    dropped: AtomicU64,
    last_drop_warning: AtomicU64,
    started: Instant,
    drop_warning_interval: Duration,
    excluded_threads: Vec<String>,
    sink: Arc<dyn CaptureSink>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureLogger {
    /// Spawns the consumer thread and returns the running logger.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for an invalid configuration and [`Error::Io`] if the
    /// consumer thread cannot be spawned.
    pub fn start(sink: Arc<dyn CaptureSink>, config: &CaptureConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = bounded(config.queue_capacity);
        let (shutdown, shutdown_signal) = bounded(1);

        let consumer_sink = Arc::clone(&sink);
        // std threads have no portable priority control, the consumer runs at default priority
        let consumer = std::thread::Builder::new()
            .name(config.consumer_thread_name.clone())
            .spawn(move || consume(&receiver, &shutdown_signal, consumer_sink.as_ref()))?;

        let mut excluded_threads = config.excluded_thread_names.clone();
        if !excluded_threads.contains(&config.consumer_thread_name) {
            excluded_threads.push(config.consumer_thread_name.clone());
        }

        Ok(CaptureLogger {
            sender,
            shutdown,
            completed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            last_drop_warning: AtomicU64::new(NEVER_WARNED),
            started: Instant::now(),
            drop_warning_interval: config.drop_warning_interval,
            excluded_threads,
            sink,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Hands an entry to the consumer thread without blocking.
    ///
    /// The calling thread's name (from `std::thread`) decides exclusion; hosts that know the
    /// managed thread name use [`CaptureLogger::enqueue_from`].
    pub fn enqueue(&self, entry: LogEntry) -> EnqueueOutcome {
        let current = std::thread::current();
        self.enqueue_from(current.name(), entry)
    }

    /// Same as [`CaptureLogger::enqueue`] with an explicit producer thread name.
    pub fn enqueue_from(&self, thread_name: Option<&str>, entry: LogEntry) -> EnqueueOutcome {
        if self.completed.load(Ordering::Acquire) {
            return EnqueueOutcome::Completed;
        }
        if thread_name.is_some_and(|name| self.is_thread_excluded(name)) {
            return EnqueueOutcome::Excluded;
        }

        match self.sender.try_send(Message::Entry(entry)) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                self.maybe_warn_dropped(dropped);
                EnqueueOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => EnqueueOutcome::Completed,
        }
    }

    /// Writes an entry synchronously on the calling thread.
    pub fn log_inline(&self, entry: &LogEntry) {
        self.sink.write(entry);
    }

    /// Returns `true` if entries produced on a thread with this name are discarded.
    #[must_use]
    pub fn is_thread_excluded(&self, name: &str) -> bool {
        self.excluded_threads.iter().any(|excluded| excluded == name)
    }

    /// Total number of entries dropped because the queue was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns `true` once [`CaptureLogger::shutdown`] was called.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Waits until every entry queued before this call was written, or `timeout` elapsed.
    ///
    /// # Errors
    /// Returns [`Error::ChannelClosed`] if the logger is shut down or the wait timed out.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        if self.is_completed() {
            return Err(Error::ChannelClosed);
        }

        let (ack, acked) = bounded(1);
        self.sender
            .send_timeout(Message::Flush(ack), timeout)
            .map_err(|_| Error::ChannelClosed)?;
        acked.recv_timeout(timeout).map_err(|_| Error::ChannelClosed)
    }

    /// Marks the queue complete, drains it and joins the consumer thread.
    ///
    /// Calling it again is a no-op. Entries enqueued afterwards are reported as
    /// [`EnqueueOutcome::Completed`].
    pub fn shutdown(&self) {
        if self.completed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Consumer already gone means there is nothing left to signal
        let _ = self.shutdown.try_send(());

        if let Some(consumer) = self.consumer.lock().take() {
            if consumer.join().is_err() {
                error!(target: "callscope::logger", "capture logger consumer panicked");
            }
        }
        self.sink.flush();
    }

    fn maybe_warn_dropped(&self, dropped: u64) {
        #[allow(clippy::cast_possible_truncation)]
        let now = self.started.elapsed().as_millis() as u64;
        #[allow(clippy::cast_possible_truncation)]
        let interval = self.drop_warning_interval.as_millis() as u64;

        let last = self.last_drop_warning.load(Ordering::Relaxed);
        if last != NEVER_WARNED && now.saturating_sub(last) < interval {
            return;
        }

        if self
            .last_drop_warning
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            warn!(
                target: "callscope::logger",
                dropped,
                "capture log queue is full, entries are being dropped"
            );
        }
    }
}

impl Drop for CaptureLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn consume(entries: &Receiver<Message>, shutdown: &Receiver<()>, sink: &dyn CaptureSink) {
    debug!(target: "callscope::logger", "capture logger consumer started");

    loop {
        select! {
            recv(entries) -> message => match message {
                Ok(message) => handle(message, sink),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                while let Ok(message) = entries.try_recv() {
                    handle(message, sink);
                }
                break;
            }
        }
    }

    debug!(target: "callscope::logger", "capture logger consumer stopped");
}

fn handle(message: Message, sink: &dyn CaptureSink) {
    match message {
        Message::Entry(entry) => {
            if catch_unwind(AssertUnwindSafe(|| sink.write(&entry))).is_err() {
                error!(target: "callscope::logger", "capture sink panicked, entry lost");
            }
        }
        Message::Flush(ack) => {
            sink.flush();
            let _ = ack.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use super::*;
    use crate::test::MemorySink;

    fn config(capacity: usize) -> CaptureConfig {
        CaptureConfig::default().with_queue_capacity(capacity)
    }

    #[test]
    fn test_entries_reach_sink() {
        let sink = Arc::new(MemorySink::default());
        let logger = CaptureLogger::start(sink.clone(), &config(16)).unwrap();

        for i in 0..5 {
            assert_eq!(
                logger.enqueue(LogEntry::diagnostic(format!("entry {i}"))),
                EnqueueOutcome::Queued
            );
        }
        logger.flush(Duration::from_secs(5)).unwrap();

        assert_eq!(sink.messages().len(), 5);
        assert_eq!(sink.messages()[4], "entry 4");
        logger.shutdown();
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let sink = Arc::new(MemorySink::blocking());
        let logger = CaptureLogger::start(sink.clone(), &config(2)).unwrap();

        // The first entry is taken by the consumer, which then blocks inside the sink
        assert_eq!(logger.enqueue(LogEntry::diagnostic("held")), EnqueueOutcome::Queued);
        sink.wait_until_blocked();

        assert_eq!(logger.enqueue(LogEntry::diagnostic("a")), EnqueueOutcome::Queued);
        assert_eq!(logger.enqueue(LogEntry::diagnostic("b")), EnqueueOutcome::Queued);
        for _ in 0..10 {
            assert_eq!(logger.enqueue(LogEntry::diagnostic("c")), EnqueueOutcome::Dropped);
        }
        assert_eq!(logger.dropped_count(), 10);

        sink.release();
        logger.shutdown();
        assert_eq!(sink.messages(), vec!["held", "a", "b"]);
    }

    #[test]
    fn test_excluded_threads() {
        let sink = Arc::new(MemorySink::default());
        let logger = Arc::new(
            CaptureLogger::start(sink.clone(), &config(16).with_excluded_thread("noisy")).unwrap(),
        );

        assert_eq!(
            logger.enqueue_from(Some("noisy"), LogEntry::diagnostic("x")),
            EnqueueOutcome::Excluded
        );
        assert_eq!(
            logger.enqueue_from(Some(".NET Console Logger"), LogEntry::diagnostic("x")),
            EnqueueOutcome::Excluded
        );

        let worker = Arc::clone(&logger);
        let outcome = thread::Builder::new()
            .name("callscope-capture-logger".into())
            .spawn(move || worker.enqueue(LogEntry::diagnostic("self")))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::Excluded);
        logger.shutdown();
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_shutdown_drains_and_is_idempotent() {
        let sink = Arc::new(MemorySink::default());
        let logger = CaptureLogger::start(sink.clone(), &config(64)).unwrap();
        for _ in 0..20 {
            logger.enqueue(LogEntry::diagnostic("e"));
        }

        logger.shutdown();
        logger.shutdown();
        assert!(logger.is_completed());
        assert_eq!(sink.messages().len(), 20);
        assert_eq!(
            logger.enqueue(LogEntry::diagnostic("late")),
            EnqueueOutcome::Completed
        );
        assert!(logger.flush(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_concurrent_producers() {
        let sink = Arc::new(MemorySink::default());
        let logger = Arc::new(CaptureLogger::start(sink.clone(), &config(1024)).unwrap());
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = Arc::clone(&logger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..100 {
                        logger.enqueue(LogEntry::diagnostic(format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        logger.shutdown();
        assert_eq!(
            sink.messages().len() as u64 + logger.dropped_count(),
            400
        );
    }

    #[test]
    fn test_panicking_sink_keeps_consumer_alive() {
        let sink = Arc::new(MemorySink::panicking_on("bad"));
        let logger = CaptureLogger::start(sink.clone(), &config(8)).unwrap();
        logger.enqueue(LogEntry::diagnostic("bad"));
        logger.enqueue(LogEntry::diagnostic("good"));
        logger.flush(Duration::from_secs(5)).unwrap();
        assert_eq!(sink.messages(), vec!["good"]);
        logger.shutdown();
    }
}
