//! Runtime type descriptions as reported by the host's type introspection.

use std::fmt::Write as _;

use strum::{EnumIter, IntoStaticStr};

use crate::metadata::token::Token;

/// Scalar types with a fixed boxing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum PrimitiveType {
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.SByte`
    SByte,
    /// `System.Byte`
    Byte,
    /// `System.Int16`
    Int16,
    /// `System.UInt16`
    UInt16,
    /// `System.Int32`
    Int32,
    /// `System.UInt32`
    UInt32,
    /// `System.Int64`
    Int64,
    /// `System.UInt64`
    UInt64,
    /// `System.IntPtr`
    IntPtr,
    /// `System.UIntPtr`
    UIntPtr,
    /// `System.Single`
    Single,
    /// `System.Double`
    Double,
}

impl PrimitiveType {
    /// The CLR type name inside the `System` namespace
    #[must_use]
    pub fn type_name(self) -> &'static str {
        self.into()
    }
}

/// Shape of a runtime type, as far as capture is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A scalar primitive
    Primitive(PrimitiveType),
    /// `System.String`
    String,
    /// `System.Object`
    Object,
    /// Any other reference type
    Class,
    /// An interface
    Interface,
    /// A user-defined struct
    ValueType,
    /// An enumeration (a value type)
    Enum,
    /// Multi-dimensional array
    Array {
        /// Number of dimensions
        rank: u32,
    },
    /// Single dimension, zero based array
    SzArray,
    /// Managed reference (`ref`/`out`/`in` parameters)
    ByRef,
    /// Unmanaged pointer
    Pointer,
    /// Stack-only struct (`ref struct`, e.g. `Span<T>`)
    ByRefLike,
    /// Open generic parameter
    GenericParameter {
        /// Position in the declaring generic parameter list
        index: u32,
        /// `true` for method generic parameters, `false` for type parameters
        method: bool,
    },
    /// Function pointer
    FunctionPointer,
}

/// A type as seen through runtime introspection.
///
/// `element` is set for by-ref, pointer and array types; `generic_args` holds the type
/// arguments of a constructed generic type (or the parameters of an open definition).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeType {
    /// Simple name, including an arity suffix for generic types (``List`1``)
    pub name: String,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Kind of the type
    pub kind: TypeKind,
    /// File name of the defining module, if known
    pub module: Option<String>,
    /// `TypeDef` token in the defining module, if known
    pub token: Option<Token>,
    /// Generic arguments
    pub generic_args: Vec<RuntimeType>,
    /// Element type for by-ref, pointer and array types
    pub element: Option<Box<RuntimeType>>,
}

impl RuntimeType {
    /// Creates a type with the given shape and no module information.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        RuntimeType {
            name: name.into(),
            namespace: namespace.into(),
            kind,
            module: None,
            token: None,
            generic_args: Vec::new(),
            element: None,
        }
    }

    /// A primitive from the `System` namespace.
    #[must_use]
    pub fn primitive(primitive: PrimitiveType) -> Self {
        Self::new("System", primitive.type_name(), TypeKind::Primitive(primitive))
    }

    /// `System.String`
    #[must_use]
    pub fn string() -> Self {
        Self::new("System", "String", TypeKind::String)
    }

    /// `System.Object`
    #[must_use]
    pub fn object() -> Self {
        Self::new("System", "Object", TypeKind::Object)
    }

    /// A reference type.
    #[must_use]
    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Class)
    }

    /// A struct.
    #[must_use]
    pub fn value_type(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::ValueType)
    }

    /// A generic parameter, e.g. `T` at position 0 of its declaring type.
    #[must_use]
    pub fn generic_parameter(name: impl Into<String>, index: u32, method: bool) -> Self {
        Self::new("", name, TypeKind::GenericParameter { index, method })
    }

    /// `T&`
    #[must_use]
    pub fn by_ref(element: RuntimeType) -> Self {
        Self::wrap(element, TypeKind::ByRef, "&")
    }

    /// `T*`
    #[must_use]
    pub fn pointer(element: RuntimeType) -> Self {
        Self::wrap(element, TypeKind::Pointer, "*")
    }

    /// `T[]`
    #[must_use]
    pub fn sz_array(element: RuntimeType) -> Self {
        Self::wrap(element, TypeKind::SzArray, "[]")
    }

    fn wrap(element: RuntimeType, kind: TypeKind, suffix: &str) -> Self {
        let mut wrapped = Self::new(
            element.namespace.clone(),
            format!("{}{}", element.name, suffix),
            kind,
        );
        wrapped.element = Some(Box::new(element));
        wrapped
    }

    /// Records the defining module and its `TypeDef` token.
    #[must_use]
    pub fn defined_in(mut self, module: impl Into<String>, token: Token) -> Self {
        self.module = Some(module.into());
        self.token = Some(token);
        self
    }

    /// Sets the generic arguments.
    #[must_use]
    pub fn with_generic_args(mut self, args: Vec<RuntimeType>) -> Self {
        self.generic_args = args;
        self
    }

    /// `Namespace.Name`, or just `Name` in the global namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns `true` for structs, enums, primitives and stack-only types.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Primitive(_) | TypeKind::ValueType | TypeKind::Enum | TypeKind::ByRefLike
        )
    }

    /// Returns `true` if the type or any of its components is an open generic parameter.
    #[must_use]
    pub fn contains_generic_parameters(&self) -> bool {
        matches!(self.kind, TypeKind::GenericParameter { .. })
            || self
                .generic_args
                .iter()
                .any(RuntimeType::contains_generic_parameters)
            || self
                .element
                .as_deref()
                .is_some_and(RuntimeType::contains_generic_parameters)
    }

    /// Name in the form reflection's `Type.ToString()` produces, used for overload filters.
    ///
    /// Instantiations list their arguments, so ``List`1`` over `Int32` is
    /// ``System.Collections.Generic.List`1[System.Int32]``. By-ref, pointer and array types
    /// append `&`, `*`, `[]` or `[,]` to the name of their element type.
    #[must_use]
    pub fn reflection_name(&self) -> String {
        if let Some(element) = &self.element {
            return format!("{}{}", element.reflection_name(), self.element_suffix());
        }

        let mut name = self.full_name();
        if !self.generic_args.is_empty() {
            let args: Vec<String> = self
                .generic_args
                .iter()
                .map(RuntimeType::reflection_name)
                .collect();
            let _ = write!(name, "[{}]", args.join(","));
        }
        name
    }

    fn element_suffix(&self) -> String {
        match self.kind {
            TypeKind::ByRef => "&".to_string(),
            TypeKind::Pointer => "*".to_string(),
            TypeKind::Array { rank } => {
                format!("[{}]", ",".repeat(rank.saturating_sub(1) as usize))
            }
            _ => "[]".to_string(),
        }
    }

    /// Human readable name: arity suffix replaced by the generic argument names.
    ///
    /// ``Dictionary`2`` with arguments `String` and `Int32` renders as
    /// `Dictionary<String, Int32>`. Namespaces are kept only when `qualified` is set, and
    /// only for the outermost type.
    #[must_use]
    pub fn display_name(&self, qualified: bool) -> String {
        if let Some(element) = &self.element {
            return format!("{}{}", element.display_name(qualified), self.element_suffix());
        }

        let base = strip_arity(&self.name);
        let mut rendered = if qualified && !self.namespace.is_empty() {
            format!("{}.{}", self.namespace, base)
        } else {
            base.to_string()
        };

        if !self.generic_args.is_empty() {
            rendered.push('<');
            for (index, arg) in self.generic_args.iter().enumerate() {
                if index > 0 {
                    rendered.push_str(", ");
                }
                let _ = write!(rendered, "{}", arg.display_name(false));
            }
            rendered.push('>');
        }

        rendered
    }
}

/// Removes a trailing generic arity marker (`` `N ``) from a type or method name.
#[must_use]
pub fn strip_arity(name: &str) -> &str {
    match name.rfind('`') {
        Some(position) if name[position + 1..].chars().all(|c| c.is_ascii_digit()) => {
            &name[..position]
        }
        _ => name,
    }
}
