//! Argument values and call context delivered by an instrumented call site.

use strum::{EnumIter, IntoStaticStr};

/// A boxed argument as delivered to the probe callback.
///
/// Values arrive in argument order, one per [`crate::classifier::BoxingInstruction`]; the
/// native layer passes [`ArgumentValue::Unsupported`] for arguments it was told not to box.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// A null reference
    Null,
    /// `bool`
    Bool(bool),
    /// `char`
    Char(char),
    /// `sbyte`
    I8(i8),
    /// `byte`
    U8(u8),
    /// `short`
    I16(i16),
    /// `ushort`
    U16(u16),
    /// `int`
    I32(i32),
    /// `uint`
    U32(u32),
    /// `long`
    I64(i64),
    /// `ulong`
    U64(u64),
    /// `nint`
    IntPtr(isize),
    /// `nuint`
    UIntPtr(usize),
    /// `float`
    Single(f32),
    /// `double`
    Double(f64),
    /// `string`
    String(String),
    /// Any other object, with the result of its `ToString()` if the host could obtain one
    Object {
        /// Full name of the runtime type
        type_name: String,
        /// Display text, if available
        display: Option<String>,
    },
    /// The argument was not captured
    Unsupported,
}

/// Format of an ambient distributed trace id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum TraceIdFormat {
    /// W3C trace context (`00-<trace>-<span>-<flags>`)
    W3C,
    /// Hierarchical request id (`|root.1.`)
    Hierarchical,
}

/// Ambient information about the thread a probe fired on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeContext {
    /// Current activity id, if tracing is active on the calling thread
    pub trace_id: Option<String>,
    /// Format of `trace_id`
    pub trace_format: Option<TraceIdFormat>,
    /// Managed thread name; the OS thread name is used when absent
    pub thread_name: Option<String>,
}

impl ProbeContext {
    /// A context carrying a trace id.
    #[must_use]
    pub fn traced(trace_id: impl Into<String>, format: TraceIdFormat) -> Self {
        ProbeContext {
            trace_id: Some(trace_id.into()),
            trace_format: Some(format),
            thread_name: None,
        }
    }

    /// Sets the calling thread's name.
    #[must_use]
    pub fn on_thread(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }
}
