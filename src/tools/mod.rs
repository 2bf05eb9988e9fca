//! Tool dispatch table
//!
//! The single place where model-requested side effects enter the trusted
//! system.

mod registry;

pub use registry::{ParamKind, ParamSpec, ToolDeclaration, ToolHandler, ToolRegistry};
