//! Gisp - an embeddable Lisp-like expression interpreter
//!
//! This crate parses a small textual grammar into atoms, bracket expressions and calls,
//! and evaluates them against a layered environment: local bindings first, then any
//! number of read-only builtin toolboxes.
//!
//! ```text
//! (var xs (list 10 20 30))   ; typed slot holding a shared list
//! xs[1]                      ; => 20
//! xs[0:2]                    ; => [10 20]
//! (set xs[-1] 99)            ; in-place write, xs is now [10 20 99]
//! (var n::int (len xs))      ; slot constrained to int
//! ```
//!
//! ## Typing
//!
//! Every slot carries a [`Type`]: a [`TypeTag`] plus an optional flag. Assignments are
//! validated against it, and an atom written `name::tag` checks the value it resolves to.
//!
//! ## Functions
//!
//! A [`Function`] is an ordered list of [`Functor`] overloads. Calls evaluate arguments
//! left to right and try each overload in registration order; the first one that does
//! not reject the argument shape wins.
//!
//! ## Modules
//!
//! - `ast`: values, type tags, atoms and the evaluable expression tree
//! - `slot`: typed mutable variable cells
//! - `function`: functors and overloaded functions
//! - `env`: the environment protocol and toolboxes
//! - `bracket`: index, slice and map-key access
//! - `parser`: nom grammar for the textual surface
//! - `builtinops`: the core builtin toolbox
//! - `json`: serde_json interop
//! - `gisp`: the interpreter driver

use thiserror::Error;

/// Maximum nesting depth accepted by the parser
pub const MAX_PARSE_DEPTH: usize = 64;

/// Tunable limits of an interpreter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_parse_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_parse_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GispError {
    #[error("Parse error at position {position}: {message}")]
    ParseFailure { position: usize, message: String },
    #[error("var {0} exists")]
    NameExists(String),
    #[error("{name} is not assignable: {reason}")]
    NotAssignable { name: String, reason: String },
    #[error("Setable var {0} not found")]
    NotFound(String),
    #[error("Type error: expected {expected} but got {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Index {index} out of range for length {len}")]
    OutOfRange { index: i64, len: usize },
    #[error("Unsupported shape: {0}")]
    UnsupportedShape(String),
    #[error("No overload of {name} matches arguments ({args})")]
    NoMatchingOverload { name: String, args: String },
    #[error("Arity error: expected {expected} arguments, got {got}")]
    ArityError { expected: usize, got: usize },
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Evaluation error: {0}")]
    EvalError(String),
}

impl GispError {
    pub fn arity_error(expected: usize, got: usize) -> Self {
        GispError::ArityError { expected, got }
    }

    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        GispError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Errors of this class make overload resolution try the next functor
    pub fn is_argument_mismatch(&self) -> bool {
        matches!(
            self,
            GispError::ArityError { .. } | GispError::TypeMismatch { .. }
        )
    }
}

pub mod ast;
pub mod bracket;
pub mod builtinops;
pub mod env;
pub mod function;
pub mod gisp;
pub mod json;
pub mod parser;
pub mod slot;

pub use ast::{Atom, Expr, Key, Lisp, Type, TypeTag, Value};
pub use bracket::{Bracket, BracketExpr};
pub use builtinops::CoreToolbox;
pub use env::{Binding, Env, Toolbox};
pub use function::{Arity, Function, Functor, Native};
pub use gisp::Gisp;
pub use json::JsonToolbox;
pub use slot::Var;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_mismatch_class() {
        assert!(GispError::arity_error(1, 2).is_argument_mismatch());
        assert!(GispError::type_mismatch("int", "\"a\"").is_argument_mismatch());
        assert!(!GispError::EvalError("boom".to_string()).is_argument_mismatch());
        assert!(!GispError::OutOfRange { index: 3, len: 2 }.is_argument_mismatch());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            GispError::NameExists("x".to_string()).to_string(),
            "var x exists"
        );
        assert_eq!(
            GispError::arity_error(2, 3).to_string(),
            "Arity error: expected 2 arguments, got 3"
        );
    }
}
