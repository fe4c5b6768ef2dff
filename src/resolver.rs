//! Resolution of textual method descriptions against the loaded modules of a process.
//!
//! A [`MethodDescription`] names a module file, a declaring type and a method, and optionally
//! pins an overload by its parameter type names. The [`MethodResolver`] takes one snapshot of
//! the catalog and resolves descriptions against it; a batch resolves completely or not at all.
//!
//! # Examples
//!
//! ```rust
//! use callscope::resolver::{MethodDescription, MethodResolver};
//! use callscope::runtime::{
//!     LoadedModule, MethodInfo, ParameterInfo, PrimitiveType, RuntimeType, StaticCatalog,
//! };
//! use callscope::metadata::token::Token;
//!
//! let foo = RuntimeType::class("", "Foo");
//! let catalog = StaticCatalog::new();
//! catalog.add(
//!     LoadedModule::new(1, "App.dll")
//!         .with_method(
//!             MethodInfo::new(Token::new(0x0600_0001), Some(foo.clone()), "Bar")
//!                 .with_param(ParameterInfo::new("x", RuntimeType::primitive(PrimitiveType::Int32))),
//!         )
//!         .with_method(
//!             MethodInfo::new(Token::new(0x0600_0002), Some(foo), "Bar")
//!                 .with_param(ParameterInfo::new("x", RuntimeType::string())),
//!         ),
//! );
//!
//! let resolver = MethodResolver::new(&catalog);
//! let all = resolver.resolve(&MethodDescription::new("app.dll", "Foo", "Bar"));
//! assert_eq!(all.len(), 2);
//!
//! let one = resolver.resolve(
//!     &MethodDescription::new("App.dll", "Foo", "Bar").with_parameter_types(["System.String"]),
//! );
//! assert_eq!(one.len(), 1);
//! ```

use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    runtime::{strip_arity, LoadedModule, MethodInfo, ModuleCatalog, ParameterInfo},
    Error, Result,
};

/// A human supplied description of the method(s) to capture.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescription {
    /// File name of the defining module, matched case-insensitively
    pub module_name: String,
    /// Full name of the declaring type (`Namespace.Type`)
    pub class_name: String,
    /// Method name
    pub method_name: String,
    /// Restrict to the overload whose parameter types equal `parameter_types`
    #[serde(default)]
    pub filter_by_parameters: bool,
    /// Parameter type names in declaration order, instantiations included
    /// (``System.Collections.Generic.List`1[System.Int32]``)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_types: Option<Vec<String>>,
}

impl MethodDescription {
    /// Describes every overload of `class_name.method_name` in `module_name`.
    #[must_use]
    pub fn new(
        module_name: impl Into<String>,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        MethodDescription {
            module_name: module_name.into(),
            class_name: class_name.into(),
            method_name: method_name.into(),
            filter_by_parameters: false,
            parameter_types: None,
        }
    }

    /// Restricts the description to a single overload.
    #[must_use]
    pub fn with_parameter_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_by_parameters = true;
        self.parameter_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// `Namespace.Type.Method`, as used in diagnostics.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.class_name.is_empty() {
            self.method_name.clone()
        } else {
            format!("{}.{}", self.class_name, self.method_name)
        }
    }

    fn matches_module(&self, module: &LoadedModule) -> bool {
        module.name.eq_ignore_ascii_case(&self.module_name)
    }

    fn matches_method(&self, method: &MethodInfo) -> bool {
        let declaring = method.declaring_type_name();
        let type_matches =
            declaring == self.class_name || strip_arity(&declaring) == self.class_name;
        let name_matches =
            method.name == self.method_name || strip_arity(&method.name) == self.method_name;

        type_matches && name_matches && self.matches_parameters(&method.parameters)
    }

    fn matches_parameters(&self, parameters: &[ParameterInfo]) -> bool {
        if !self.filter_by_parameters {
            return true;
        }

        let expected = self.parameter_types.as_deref().unwrap_or_default();
        expected.len() == parameters.len()
            && expected
                .iter()
                .zip(parameters)
                .all(|(name, parameter)| *name == parameter.ty.reflection_name())
    }
}

/// A method found in a loaded module.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    /// Defining module
    pub module: Arc<LoadedModule>,
    /// The method
    pub method: Arc<MethodInfo>,
}

impl ResolvedMethod {
    /// Process-wide stable identifier of the method.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.module.method_id(&self.method)
    }
}

/// Resolves [`MethodDescription`]s against one snapshot of the loaded modules.
pub struct MethodResolver {
    modules: Vec<Arc<LoadedModule>>,
}

impl MethodResolver {
    /// Snapshots the executable modules of `catalog`.
    ///
    /// Dynamic and reflection-only modules are skipped: their code either cannot run or
    /// cannot be instrumented.
    pub fn new<C: ModuleCatalog + ?Sized>(catalog: &C) -> Self {
        let modules = catalog
            .loaded_modules()
            .into_iter()
            .filter(|module| module.is_executable())
            .collect();
        MethodResolver { modules }
    }

    /// Every method matching `description`; empty if none does.
    #[must_use]
    pub fn resolve(&self, description: &MethodDescription) -> Vec<ResolvedMethod> {
        self.modules
            .iter()
            .filter(|module| description.matches_module(module))
            .flat_map(|module| {
                module
                    .methods
                    .iter()
                    .filter(|method| description.matches_method(method))
                    .map(|method| ResolvedMethod {
                        module: Arc::clone(module),
                        method: Arc::clone(method),
                    })
            })
            .collect()
    }

    /// Resolves a whole batch.
    ///
    /// Methods matched by more than one description are returned once, in first-match order.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedMethods`] with the indices of every description that matched
    /// nothing; in that case no method of the batch is returned.
    pub fn resolve_all(&self, descriptions: &[MethodDescription]) -> Result<Vec<ResolvedMethod>> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();
        let mut unresolved = Vec::new();

        for (index, description) in descriptions.iter().enumerate() {
            let matches = self.resolve(description);
            if matches.is_empty() {
                debug!(
                    target: "callscope::resolver",
                    index,
                    module = %description.module_name,
                    method = %description.qualified_name(),
                    "method description matched nothing"
                );
                unresolved.push(index);
                continue;
            }

            resolved.extend(matches.into_iter().filter(|m| seen.insert(m.id())));
        }

        if unresolved.is_empty() {
            Ok(resolved)
        } else {
            Err(Error::UnresolvedMethods(unresolved))
        }
    }
}
