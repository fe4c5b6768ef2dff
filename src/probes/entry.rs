//! The callback instrumented call sites invoke.

use std::{
    any::Any,
    cell::Cell,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tracing::error;

use crate::{
    probes::{ArgumentValue, ProbeContext},
    protocol::{ControlEvent, EventStream},
};

/// Failure type reported when a probe handler panics.
pub const UNRECOVERABLE_INTERNAL_FAULT: &str = "UnrecoverableInternalFault";

thread_local! {
    static IN_PROBE: Cell<bool> = const { Cell::new(false) };
}

/// Receives probe invocations once the entry point has filtered them.
pub trait ProbeHandler: Send + Sync {
    /// Called with the id of the entered method and one value per argument.
    fn on_enter(&self, method_id: u64, args: &[ArgumentValue], context: &ProbeContext);
}

/// Marks the current thread as running a probe until dropped.
struct ReentrancyGuard;

impl ReentrancyGuard {
    fn enter() -> Option<Self> {
        IN_PROBE.with(|in_probe| (!in_probe.replace(true)).then_some(ReentrancyGuard))
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        IN_PROBE.with(|in_probe| in_probe.set(false));
    }
}

/// Single registration slot for the active [`ProbeHandler`].
///
/// One entry point is created at startup and handed to the native layer through
/// [`crate::probes::NativeBridge::register_entry_point`]. Handlers are swapped in and out
/// under a write lock; invocations only clone the current handler under a read lock.
///
/// Invocations never propagate failures into the instrumented application: a nested
/// invocation on the same thread is ignored, and a panicking handler is reported as
/// [`ControlEvent::FailedToCapture`] and swallowed.
pub struct ProbeEntryPoint {
    handler: RwLock<Option<Arc<dyn ProbeHandler>>>,
    events: EventStream,
    faults: AtomicU64,
}

impl ProbeEntryPoint {
    /// Creates an entry point with an empty slot, reporting faults on `events`.
    #[must_use]
    pub fn new(events: EventStream) -> Self {
        ProbeEntryPoint {
            handler: RwLock::new(None),
            events,
            faults: AtomicU64::new(0),
        }
    }

    /// Installs `handler`, returning the previously registered one.
    pub fn register(&self, handler: Arc<dyn ProbeHandler>) -> Option<Arc<dyn ProbeHandler>> {
        self.handler.write().replace(handler)
    }

    /// Empties the slot, returning the handler that was registered.
    pub fn unregister(&self) -> Option<Arc<dyn ProbeHandler>> {
        self.handler.write().take()
    }

    /// Returns `true` if a handler is registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Number of handler panics caught so far.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Dispatches one probe invocation.
    pub fn invoke(&self, method_id: u64, args: &[ArgumentValue], context: &ProbeContext) {
        let Some(_guard) = ReentrancyGuard::enter() else {
            return;
        };

        let Some(handler) = self.handler.read().clone() else {
            return;
        };

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| {
            handler.on_enter(method_id, args, context);
        })) {
            self.faults.fetch_add(1, Ordering::Relaxed);
            let message = panic_message(panic.as_ref());
            error!(
                target: "callscope::probes",
                method_id,
                %message,
                "probe handler panicked"
            );
            self.events.publish(ControlEvent::FailedToCapture {
                failure_type: UNRECOVERABLE_INTERNAL_FAULT.to_string(),
                failure_message: message,
            });
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "probe handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicUsize, OnceLock};

    use super::*;
    use crate::protocol::EventKind;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        entry: OnceLock<Arc<ProbeEntryPoint>>,
    }

    impl ProbeHandler for Counting {
        fn on_enter(&self, method_id: u64, args: &[ArgumentValue], context: &ProbeContext) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Simulates an instrumented method called while formatting an argument
            if let Some(entry) = self.entry.get() {
                entry.invoke(method_id, args, context);
            }
        }
    }

    struct Panicking;

    impl ProbeHandler for Panicking {
        fn on_enter(&self, _: u64, _: &[ArgumentValue], _: &ProbeContext) {
            panic!("boom");
        }
    }

    #[test]
    fn test_empty_slot_is_noop() {
        let entry = ProbeEntryPoint::new(EventStream::new());
        assert!(!entry.is_registered());
        entry.invoke(1, &[], &ProbeContext::default());
        assert_eq!(entry.fault_count(), 0);
    }

    #[test]
    fn test_reentrant_invocation_ignored() {
        let entry = Arc::new(ProbeEntryPoint::new(EventStream::new()));
        let handler = Arc::new(Counting::default());
        let _ = handler.entry.set(Arc::clone(&entry));
        entry.register(handler.clone());

        entry.invoke(7, &[ArgumentValue::I32(1)], &ProbeContext::default());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        // The guard is released once the outer invocation returns
        entry.invoke(7, &[], &ProbeContext::default());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_swap_returns_previous() {
        let entry = ProbeEntryPoint::new(EventStream::new());
        assert!(entry.register(Arc::new(Counting::default())).is_none());
        assert!(entry.register(Arc::new(Panicking)).is_some());
        assert!(entry.unregister().is_some());
        assert!(entry.unregister().is_none());
    }

    #[test]
    fn test_panic_is_reported_not_propagated() {
        let events = EventStream::new();
        let failures = events.subscribe(Some(EventKind::FailedToCapture));
        let entry = ProbeEntryPoint::new(events);
        entry.register(Arc::new(Panicking));

        entry.invoke(3, &[], &ProbeContext::default());

        assert_eq!(entry.fault_count(), 1);
        match failures.try_recv() {
            Some(ControlEvent::FailedToCapture {
                failure_type,
                failure_message,
            }) => {
                assert_eq!(failure_type, UNRECOVERABLE_INTERNAL_FAULT);
                assert_eq!(failure_message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }

        // The thread is usable again after the fault
        entry.register(Arc::new(Counting::default()));
        entry.invoke(3, &[], &ProbeContext::default());
        assert_eq!(entry.fault_count(), 1);
    }
}
