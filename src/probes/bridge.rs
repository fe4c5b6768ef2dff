//! Seam between the probe coordinator and the native instrumentation layer.

use std::sync::Arc;

use crate::{cache::InstrumentedMethod, probes::ProbeEntryPoint, Result};

/// Arguments of one native install call.
///
/// All vectors have one element per method and share its index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallBatch {
    /// Stable method ids
    pub method_ids: Vec<u64>,
    /// Encoded boxing instructions of each method
    pub boxing_tokens: Vec<Vec<u32>>,
    /// Number of arguments of each method, implicit `this` included
    pub argument_counts: Vec<u32>,
}

impl InstallBatch {
    /// Collects the install arguments of `methods`.
    #[must_use]
    pub fn from_methods(methods: &[Arc<InstrumentedMethod>]) -> Self {
        let mut batch = InstallBatch {
            method_ids: Vec::with_capacity(methods.len()),
            boxing_tokens: Vec::with_capacity(methods.len()),
            argument_counts: Vec::with_capacity(methods.len()),
        };

        for method in methods {
            batch.method_ids.push(method.id);
            batch.boxing_tokens.push(method.boxing_tokens());
            #[allow(clippy::cast_possible_truncation)]
            batch.argument_counts.push(method.argument_count() as u32);
        }

        batch
    }

    /// Number of methods in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.method_ids.len()
    }

    /// Returns `true` if the batch holds no method.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.method_ids.is_empty()
    }
}

/// The native instrumentation layer.
///
/// Implementations wrap the FFI surface of the profiler component. Every call is synchronous
/// and the batch is only borrowed for its duration.
pub trait NativeBridge: Send + Sync {
    /// Instruments every method of `batch`, or none of them.
    ///
    /// # Errors
    /// Returns [`crate::Error::Native`] if the native layer refused the batch.
    fn install(&self, batch: &InstallBatch) -> Result<()>;

    /// Removes every installed probe.
    ///
    /// # Errors
    /// Returns [`crate::Error::Native`] if the native layer failed to remove the probes.
    fn uninstall(&self) -> Result<()>;

    /// Hands the callback that instrumented call sites invoke to the native layer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Native`] if the callback could not be registered.
    fn register_entry_point(&self, entry_point: Arc<ProbeEntryPoint>) -> Result<()>;
}
