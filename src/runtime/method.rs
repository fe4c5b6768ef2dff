//! Method descriptions as enumerated from a loaded module.

use crate::{metadata::token::Token, runtime::types::RuntimeType};

/// How a parameter is passed, as declared in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamModifier {
    /// Passed by value
    #[default]
    None,
    /// `in` (read-only reference)
    In,
    /// `out`
    Out,
    /// `ref`
    Ref,
}

impl ParamModifier {
    /// The keyword rendered before the parameter name, if any.
    #[must_use]
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            ParamModifier::None => None,
            ParamModifier::In => Some("in"),
            ParamModifier::Out => Some("out"),
            ParamModifier::Ref => Some("ref"),
        }
    }
}

/// A declared parameter of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Parameter name; may be empty for compiler generated methods
    pub name: String,
    /// Parameter type (a by-ref type for `ref`/`out`/`in` parameters)
    pub ty: RuntimeType,
    /// Declared passing modifier
    pub modifier: ParamModifier,
}

impl ParameterInfo {
    /// A by-value parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: RuntimeType) -> Self {
        ParameterInfo {
            name: name.into(),
            ty,
            modifier: ParamModifier::None,
        }
    }

    /// A by-reference parameter; `ty` is the referenced type and gets wrapped.
    #[must_use]
    pub fn by_ref(name: impl Into<String>, ty: RuntimeType, modifier: ParamModifier) -> Self {
        ParameterInfo {
            name: name.into(),
            ty: RuntimeType::by_ref(ty),
            modifier,
        }
    }

    /// Effective modifier: a by-ref type without a declared keyword renders as `ref`.
    #[must_use]
    pub fn effective_modifier(&self) -> ParamModifier {
        match (self.modifier, &self.ty.kind) {
            (ParamModifier::None, crate::runtime::TypeKind::ByRef) => ParamModifier::Ref,
            (modifier, _) => modifier,
        }
    }
}

/// A method as enumerated from a loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// `MethodDef` token inside the owning module
    pub token: Token,
    /// Method name, with a generic arity suffix if the runtime reports one
    pub name: String,
    /// Declaring type; `None` for global (module-level) functions
    pub declaring_type: Option<RuntimeType>,
    /// `true` for static methods (no implicit `this`)
    pub is_static: bool,
    /// Generic method arguments (or parameters of an open generic method)
    pub generic_args: Vec<RuntimeType>,
    /// Declared parameters, excluding the implicit `this`
    pub parameters: Vec<ParameterInfo>,
    /// Raw `MethodDefSig` blob; empty if unavailable
    pub signature: Vec<u8>,
}

impl MethodInfo {
    /// Creates a static method without parameters.
    #[must_use]
    pub fn new(token: Token, declaring_type: Option<RuntimeType>, name: impl Into<String>) -> Self {
        MethodInfo {
            token,
            name: name.into(),
            declaring_type,
            is_static: true,
            generic_args: Vec::new(),
            parameters: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// Marks the method as an instance method.
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_param(mut self, parameter: ParameterInfo) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the generic method arguments.
    #[must_use]
    pub fn with_generic_args(mut self, args: Vec<RuntimeType>) -> Self {
        self.generic_args = args;
        self
    }

    /// Sets the raw signature blob.
    #[must_use]
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Returns `true` if an implicit `this` is passed.
    #[must_use]
    pub fn has_this(&self) -> bool {
        !self.is_static
    }

    /// Full name of the declaring type, or an empty string for global functions.
    #[must_use]
    pub fn declaring_type_name(&self) -> String {
        self.declaring_type
            .as_ref()
            .map(RuntimeType::full_name)
            .unwrap_or_default()
    }

    /// Namespace of the declaring type, or an empty string.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.declaring_type
            .as_ref()
            .map_or("", |ty| ty.namespace.as_str())
    }
}
