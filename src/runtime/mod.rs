//! The view of the target process the capture pipeline works from.
//!
//! Attaching to a live process is the host's job; this module only defines the data the host
//! hands over: the loaded modules ([`LoadedModule`]) reachable through a [`ModuleCatalog`],
//! the methods they define ([`MethodInfo`]), and the introspected types of their
//! parameters ([`RuntimeType`]).
//!
//! # Examples
//!
//! ```rust
//! use callscope::metadata::token::Token;
//! use callscope::runtime::{
//!     LoadedModule, MethodInfo, ModuleCatalog, ParameterInfo, PrimitiveType, RuntimeType,
//!     StaticCatalog,
//! };
//!
//! let catalog = StaticCatalog::new();
//! catalog.add(
//!     LoadedModule::new(1, "App.dll").with_method(
//!         MethodInfo::new(Token::new(0x0600_0001), Some(RuntimeType::class("", "Foo")), "Bar")
//!             .with_param(ParameterInfo::new("x", RuntimeType::primitive(PrimitiveType::Int32))),
//!     ),
//! );
//! assert_eq!(catalog.loaded_modules().len(), 1);
//! ```

mod method;
mod module;
mod types;

pub use method::{MethodInfo, ParamModifier, ParameterInfo};
pub use module::{LoadedModule, ModuleCatalog, StandAloneSig, StaticCatalog, TypeRefRow};
pub use types::{strip_arity, PrimitiveType, RuntimeType, TypeKind};
