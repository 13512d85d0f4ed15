// stdargs — Argument formats for array-language built-ins
//
// Library root. Format text compiles to a `ParameterSpecList` once; the
// binder checks and shapes a call's arguments against it.

pub mod binder;
pub mod descriptor;
pub mod diag;
pub mod dim_resolve;
pub mod error;
pub mod host;
pub mod lexer;
pub mod memstore;
pub mod parser;
pub mod registry;
pub mod spec;
pub mod type_infer;
