//! Registry of the methods instrumented by the current capture session.
//!
//! The cache is the only structure written by the controlling thread and read by arbitrary
//! application threads. Entries are built completely before they are published and are
//! shared as `Arc<InstrumentedMethod>`, so a probe either sees a whole entry or none; a probe
//! still holding an entry after [`InstrumentedMethodCache::clear`] keeps a valid snapshot.
//!
//! # Examples
//!
//! ```rust
//! use callscope::cache::InstrumentedMethodCache;
//! use callscope::classifier::SignatureClassifier;
//! use callscope::resolver::{MethodDescription, MethodResolver};
//! use callscope::runtime::{LoadedModule, MethodInfo, ParameterInfo, RuntimeType, StaticCatalog};
//! use callscope::metadata::token::Token;
//!
//! let catalog = StaticCatalog::new();
//! catalog.add(LoadedModule::new(1, "App.dll").with_method(
//!     MethodInfo::new(Token::new(0x0600_0001), Some(RuntimeType::class("", "Foo")), "Bar")
//!         .with_param(ParameterInfo::new("s", RuntimeType::string())),
//! ));
//!
//! let methods = MethodResolver::new(&catalog)
//!     .resolve_all(&[MethodDescription::new("App.dll", "Foo", "Bar")])?;
//!
//! let cache = InstrumentedMethodCache::new();
//! let entries = cache.populate(&methods, &SignatureClassifier::new());
//! assert_eq!(entries[0].template, "Foo.Bar(s: {0})");
//! assert!(cache.get(entries[0].id).is_some());
//! # Ok::<(), callscope::Error>(())
//! ```

mod template;

pub use template::{build_template, declaring_type_label, UNSUPPORTED_PLACEHOLDER};

use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    classifier::{BoxingInstruction, SignatureClassifier},
    resolver::ResolvedMethod,
    utils::BitSet,
};

/// Capture metadata of one instrumented method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedMethod {
    /// Process-wide stable method id
    pub id: u64,
    /// One instruction per argument, implicit `this` first
    pub instructions: Vec<BoxingInstruction>,
    /// Argument positions whose instruction is not [`BoxingInstruction::Unsupported`]
    pub supported: BitSet,
    /// Pretty-print template with one placeholder per supported argument
    pub template: String,
    /// Number of supported arguments (placeholders in `template`)
    pub supported_argument_count: usize,
    /// File name of the defining module
    pub module_name: String,
    /// Display name of the declaring type
    pub type_name: String,
    /// Method name without generic arity
    pub method_name: String,
    /// Namespace of the declaring type
    pub namespace: String,
}

impl InstrumentedMethod {
    /// Classifies the arguments of `resolved` and derives its template.
    #[must_use]
    pub fn build(resolved: &ResolvedMethod, classifier: &SignatureClassifier) -> Self {
        let method = &resolved.method;
        let instructions = classifier.classify(&resolved.module, method);
        let supported = BitSet::from_fn(instructions.len(), |index| {
            instructions[index].is_supported()
        });

        InstrumentedMethod {
            id: resolved.id(),
            template: build_template(method, &instructions),
            supported_argument_count: supported.count(),
            supported,
            instructions,
            module_name: resolved.module.name.clone(),
            type_name: declaring_type_label(method.declaring_type.as_ref()),
            method_name: crate::runtime::strip_arity(&method.name).to_string(),
            namespace: method.namespace().to_string(),
        }
    }

    /// Total number of arguments, including the implicit `this`.
    #[must_use]
    pub fn argument_count(&self) -> usize {
        self.instructions.len()
    }

    /// The native stream encoding of the boxing instructions.
    #[must_use]
    pub fn boxing_tokens(&self) -> Vec<u32> {
        BoxingInstruction::encode_all(&self.instructions)
    }
}

/// Concurrent map from method id to [`InstrumentedMethod`].
#[derive(Default)]
pub struct InstrumentedMethodCache {
    methods: DashMap<u64, Arc<InstrumentedMethod>>,
}

impl InstrumentedMethodCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an entry. Returns `false`, leaving the existing entry untouched, if the id is
    /// already present.
    pub fn insert(&self, method: Arc<InstrumentedMethod>) -> bool {
        match self.methods.entry(method.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(method);
                true
            }
        }
    }

    /// Builds entries for `methods` in parallel, publishes them, and returns them in input
    /// order. Methods already present are returned as the existing entry.
    pub fn populate(
        &self,
        methods: &[ResolvedMethod],
        classifier: &SignatureClassifier,
    ) -> Vec<Arc<InstrumentedMethod>> {
        let built: Vec<Arc<InstrumentedMethod>> = methods
            .par_iter()
            .map(|resolved| Arc::new(InstrumentedMethod::build(resolved, classifier)))
            .collect();

        built
            .into_iter()
            .map(|entry| {
                Arc::clone(
                    self.methods
                        .entry(entry.id)
                        .or_insert_with(|| Arc::clone(&entry))
                        .value(),
                )
            })
            .collect()
    }

    /// Looks up the entry of a method id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Arc<InstrumentedMethod>> {
        self.methods.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.methods.clear();
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` if the cache holds no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
