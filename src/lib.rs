// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # callscope
//!
//! [![Crates.io](https://img.shields.io/crates/v/callscope.svg)](https://crates.io/crates/callscope)
//! [![Documentation](https://docs.rs/callscope/badge.svg)](https://docs.rs/callscope)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/callscope/blob/main/LICENSE-APACHE)
//!
//! Live argument capture for running .NET processes. `callscope` decides, per parameter of a
//! requested method, how its value can be boxed by an injected probe, installs probes for a
//! bounded time through a native instrumentation layer, and logs every call with its
//! pretty-printed arguments without ever blocking or failing the instrumented application.
//!
//! ## Features
//!
//! - **🔍 Signature classification** - Primitive, reference, value type and generic
//!   instantiation parameters mapped to boxing instructions, with an ECMA-335 signature
//!   fallback for value types defined in other modules
//! - **🎯 Method resolution** - Human readable method descriptions matched against the loaded
//!   modules, with optional overload filtering and all-or-nothing batches
//! - **⚡ Lock-free probe path** - Probes read a concurrent cache and hand entries to a bounded
//!   queue; a full queue drops and counts instead of blocking
//! - **🛡️ Fault isolation** - Re-entrancy guard and panic boundary at the probe entry point
//! - **📡 Control protocol** - Length-prefixed command frames, status replies and named events
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callscope::prelude::*;
//!
//! # fn bridge() -> Arc<dyn NativeBridge> { unimplemented!() }
//! let catalog = Arc::new(StaticCatalog::new());
//! // ... catalog.add(LoadedModule::new(1, "App.dll").with_method(...)) for every loaded module
//!
//! let service = CaptureService::new(
//!     catalog,
//!     bridge(),
//!     Arc::new(TracingSink),
//!     CaptureConfig::default(),
//! )?;
//!
//! let started = service.start_json(r#"{
//!     "methods": [{ "moduleName": "App.dll", "className": "Foo", "methodName": "Bar" }],
//!     "duration": "PT30S"
//! }"#)?;
//! println!("{started:?}");
//! # Ok::<(), callscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`runtime`] - The live process as supplied by the host: modules, types, methods
//! - [`metadata`] - Metadata tokens and ECMA-335 signature decoding
//! - [`classifier`] - Per-parameter [`classifier::BoxingInstruction`]s
//! - [`resolver`] - [`resolver::MethodDescription`] to [`resolver::ResolvedMethod`]
//! - [`cache`] - Instrumented methods and their pretty-print templates, keyed by method id
//! - [`probes`] - Install/uninstall coordination and the probe entry point
//! - [`logger`] - Background capture logging and argument formatting
//! - [`protocol`] - Command frames, status frames and control events
//! - [`session`] - The capture session state machine
//! - [`config`] - Tunables of the pipeline
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Threads
//!
//! Probes fire on arbitrary application threads and only read shared state. One consumer
//! thread writes captured entries, one session thread processes start requests and
//! duration timers, and stop requests may arrive from any thread.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use callscope::prelude::*;
///
/// let config = CaptureConfig::default().with_queue_capacity(256);
/// assert!(config.validate().is_ok());
/// ```
pub mod prelude;

/// Metadata tokens and ECMA-335 signature decoding
///
/// # Key Components
///
/// - [`metadata::token::Token`] - Metadata table references
/// - [`metadata::signatures`] - Method and local variable signature parsing
pub mod metadata;

/// The runtime view of the target process: loaded modules, types and methods.
pub mod runtime;

/// Classification of method parameters into boxing instructions.
pub mod classifier;

/// Resolution of method descriptions against the loaded modules.
pub mod resolver;

/// The instrumented method cache and pretty-print templates.
pub mod cache;

/// Probe installation and the probe entry point.
pub mod probes;

/// Background capture logging.
pub mod logger;

/// The control channel with the native instrumentation component.
pub mod protocol;

/// Capture session orchestration.
pub mod session;

/// Configuration of the capture pipeline.
pub mod config;

/// Helpers shared across modules.
pub mod utils;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use callscope::{config::CaptureConfig, Result};
///
/// fn load(json: &str) -> Result<CaptureConfig> {
///     CaptureConfig::from_json(json)
/// }
/// # assert!(load("{}").is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `callscope` Error type
///
/// # Examples
///
/// ```rust
/// use callscope::{config::CaptureConfig, session::CaptureRequest, Error};
///
/// match CaptureRequest::from_json(r#"{"methods":[]}"#, &CaptureConfig::default()) {
///     Ok(request) => println!("{} methods", request.methods.len()),
///     Err(Error::InvalidRequest(reason)) => println!("rejected: {reason}"),
///     Err(e) => println!("Error: {e}"),
/// }
/// ```
pub use error::Error;

/// Low-level little-endian byte cursor
///
/// # Example
///
/// ```rust
/// use callscope::Parser;
///
/// let mut parser = Parser::new(&[0x01, 0x00, 0x00, 0x00]);
/// assert_eq!(parser.read_le::<u32>()?, 1);
/// # Ok::<(), callscope::Error>(())
/// ```
pub use file::parser::{Parser, ReadLe};
