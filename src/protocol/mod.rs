//! The control channel between the managed controller and the native instrumentation
//! component.
//!
//! Two paths share this module:
//!
//! - **Commands** (managed to native) are length-prefixed [`frame::CommandFrame`]s answered by
//!   a fixed-size [`frame::StatusFrame`]. [`CommandClient`] issues them; [`CommandDispatcher`]
//!   serves them on the receiving side through a [`CommandHandler`].
//! - **Events** (native to managed) are named [`ControlEvent`]s fanned out by an
//!   [`EventStream`] to subscribers filtering on an [`EventKind`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use callscope::protocol::{ControlEvent, EventKind, EventStream};
//!
//! let events = EventStream::new();
//! let started = events.subscribe(Some(EventKind::CapturingStarted));
//! events.publish(ControlEvent::CapturingStarted);
//! assert_eq!(started.try_recv(), Some(ControlEvent::CapturingStarted));
//! ```

mod client;
mod command;
mod dispatcher;
mod events;
pub mod frame;

pub use client::CommandClient;
pub use command::{Command, MessageType, PayloadType};
pub use dispatcher::{
    result_code, CommandDispatcher, CommandHandler, E_FAIL, E_INVALIDARG, E_UNEXPECTED,
    RESULT_SUCCESS,
};
pub use events::{ControlEvent, EventKind, EventStream, Subscription};
