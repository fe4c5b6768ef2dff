//! Capture session orchestration.
//!
//! A session moves through `Idle → Resolving → Installing → Capturing → Stopping → Idle`.
//! [`CaptureService`] drives the transitions: it resolves a [`CaptureRequest`] against the
//! loaded modules, installs probes through the [`crate::probes::ProbeManager`], stops the
//! session when its duration elapses or on request, and publishes every transition on its
//! [`crate::protocol::EventStream`].

mod request;
mod service;

pub use request::{CaptureRequest, RequestPayload};
pub use service::{CaptureService, SessionState, SESSION_THREAD_NAME};
