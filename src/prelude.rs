//! # callscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the callscope library. Import it to get quick access to everything needed to embed
//! the capture pipeline in a host.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all callscope operations
pub use crate::Error;

/// The result type used throughout callscope
pub use crate::Result;

/// Configuration of the capture pipeline
pub use crate::config::CaptureConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Capture session orchestration
pub use crate::session::{CaptureRequest, CaptureService, RequestPayload, SessionState};

// ================================================================================================
// Runtime Model
// ================================================================================================

/// The live process view supplied by the host
pub use crate::runtime::{
    LoadedModule, MethodInfo, ModuleCatalog, ParamModifier, ParameterInfo, PrimitiveType,
    RuntimeType, StaticCatalog, TypeKind,
};

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

// ================================================================================================
// Classification, Resolution and Caching
// ================================================================================================

/// Parameter classification
pub use crate::classifier::{BoxingInstruction, SignatureClassifier};

/// Method resolution
pub use crate::resolver::{MethodDescription, MethodResolver, ResolvedMethod};

/// Instrumented method metadata
pub use crate::cache::{InstrumentedMethod, InstrumentedMethodCache};

// ================================================================================================
// Probes and Logging
// ================================================================================================

/// Probe coordination and the native bridge
pub use crate::probes::{
    ArgumentValue, InstallBatch, NativeBridge, ProbeContext, ProbeEntryPoint, ProbeHandler,
    ProbeManager, StartOutcome, StopOutcome, TraceIdFormat,
};

/// Capture logging
pub use crate::logger::{
    ArgumentFormatter, CaptureLogger, CaptureSink, EnqueueOutcome, JsonLinesSink, LogEntry,
    TracingSink,
};

// ================================================================================================
// Control Protocol
// ================================================================================================

/// Commands, status codes and events
pub use crate::protocol::{
    Command, CommandClient, CommandDispatcher, CommandHandler, ControlEvent, EventKind,
    EventStream, Subscription,
};
