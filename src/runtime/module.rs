//! Loaded modules and the catalog the host exposes them through.

use std::sync::Arc;

use uguid::Guid;

use crate::{metadata::token::Token, runtime::method::MethodInfo};

/// A row of a module's `TypeRef` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRow {
    /// `TypeRef` token
    pub token: Token,
    /// Referenced namespace
    pub namespace: String,
    /// Referenced type name
    pub name: String,
}

/// A `StandAloneSig` row holding a local variable signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandAloneSig {
    /// `StandAloneSig` token
    pub token: Token,
    /// Raw `LocalVarSig` blob
    pub blob: Vec<u8>,
}

/// A module loaded in the target process.
///
/// Only the metadata the capture pipeline consumes is carried: enough to enumerate methods,
/// to translate a foreign value type into a module-local `TypeRef`, and to scan local
/// variable signatures for generic instantiations.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    /// Catalog assigned identifier, unique for the lifetime of the process
    pub id: u32,
    /// File name of the module (`App.dll`)
    pub name: String,
    /// Module version id
    pub mvid: Guid,
    /// Emitted at runtime (`Reflection.Emit`)
    pub is_dynamic: bool,
    /// Loaded for inspection only; its code cannot run
    pub is_reflection_only: bool,
    /// `TypeRef` table
    pub type_refs: Vec<TypeRefRow>,
    /// Local variable signatures from the `StandAloneSig` table
    pub local_signatures: Vec<StandAloneSig>,
    /// Methods defined in this module
    pub methods: Vec<Arc<MethodInfo>>,
}

impl LoadedModule {
    /// Creates an empty module.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        LoadedModule {
            id,
            name: name.into(),
            mvid: Guid::from_bytes([0; 16]),
            is_dynamic: false,
            is_reflection_only: false,
            type_refs: Vec::new(),
            local_signatures: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Sets the module version id.
    #[must_use]
    pub fn with_mvid(mut self, mvid: Guid) -> Self {
        self.mvid = mvid;
        self
    }

    /// Marks the module as dynamically emitted.
    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    /// Marks the module as reflection-only.
    #[must_use]
    pub fn reflection_only(mut self) -> Self {
        self.is_reflection_only = true;
        self
    }

    /// Adds a `TypeRef` row.
    #[must_use]
    pub fn with_type_ref(
        mut self,
        token: Token,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.type_refs.push(TypeRefRow {
            token,
            namespace: namespace.into(),
            name: name.into(),
        });
        self
    }

    /// Adds a local variable signature.
    #[must_use]
    pub fn with_local_signature(mut self, token: Token, blob: Vec<u8>) -> Self {
        self.local_signatures.push(StandAloneSig { token, blob });
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    /// Returns `true` if instrumented code from this module can execute.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        !self.is_dynamic && !self.is_reflection_only
    }

    /// Finds the `TypeRef` row naming `namespace.name`.
    #[must_use]
    pub fn find_type_ref(&self, namespace: &str, name: &str) -> Option<Token> {
        self.type_refs
            .iter()
            .find(|row| row.namespace == namespace && row.name == name)
            .map(|row| row.token)
    }

    /// Derives the process-wide identifier of a method of this module.
    ///
    /// The catalog id occupies the upper 32 bits and the `MethodDef` token the lower 32,
    /// which keeps ids distinct across modules and stable across lookups.
    #[must_use]
    pub fn method_id(&self, method: &MethodInfo) -> u64 {
        (u64::from(self.id) << 32) | u64::from(method.token.value())
    }
}

/// Source of the modules currently loaded in the target process.
pub trait ModuleCatalog: Send + Sync {
    /// Snapshot of every loaded module, including dynamic and reflection-only ones.
    fn loaded_modules(&self) -> Vec<Arc<LoadedModule>>;
}

/// An append-only catalog fed by module load notifications.
#[derive(Default)]
pub struct StaticCatalog {
    modules: boxcar::Vec<Arc<LoadedModule>>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loaded module and returns the shared handle.
    pub fn add(&self, module: LoadedModule) -> Arc<LoadedModule> {
        let module = Arc::new(module);
        self.modules.push(Arc::clone(&module));
        module
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.count()
    }

    /// Returns `true` if no module was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModuleCatalog for StaticCatalog {
    fn loaded_modules(&self) -> Vec<Arc<LoadedModule>> {
        self.modules
            .iter()
            .map(|(_, module)| Arc::clone(module))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_id_stable_and_distinct() {
        let method = MethodInfo::new(Token::new(0x0600_0002), None, "Main");
        let first = LoadedModule::new(1, "App.dll");
        let second = LoadedModule::new(2, "Lib.dll");

        assert_eq!(first.method_id(&method), first.method_id(&method));
        assert_ne!(first.method_id(&method), second.method_id(&method));
        assert_eq!(first.method_id(&method), 0x0000_0001_0600_0002);
    }

    #[test]
    fn test_find_type_ref() {
        let module = LoadedModule::new(1, "App.dll").with_type_ref(
            Token::new(0x0100_0004),
            "System",
            "Guid",
        );
        assert_eq!(
            module.find_type_ref("System", "Guid"),
            Some(Token::new(0x0100_0004))
        );
        assert_eq!(module.find_type_ref("System", "TimeSpan"), None);
    }

    #[test]
    fn test_catalog_snapshot() {
        let catalog = StaticCatalog::new();
        assert!(catalog.is_empty());
        catalog.add(LoadedModule::new(1, "App.dll"));
        catalog.add(LoadedModule::new(2, "Dyn").dynamic());

        let modules = catalog.loaded_modules();
        assert_eq!(modules.len(), 2);
        assert!(modules[0].is_executable());
        assert!(!modules[1].is_executable());
    }
}
