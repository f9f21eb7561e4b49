use crate::GispError;
use crate::ast::Value;
use crate::function::{Function, Functor};
use crate::slot::Var;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// A read-only source of builtin bindings
///
/// Implementations hand out detached copies of containers so that bracket writes in a
/// program never reach the toolbox itself.
pub trait Toolbox {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Toolbox for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::deep_clone)
    }
}

impl Toolbox for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::deep_clone)
    }
}

/// What a name can be bound to in an environment
#[derive(Debug, Clone)]
pub enum Binding {
    Var(Var),
    Function(Rc<Function>),
}

/// Name resolution and binding mutation
///
/// Local bindings always shadow the builtins; `lookup` tries [`Env::local`] and then
/// [`Env::global`].
pub trait Env {
    /// Bind `name` to `slot`. Fails if `name` is already bound here.
    fn defvar(&mut self, name: &str, slot: Var) -> Result<(), GispError>;

    /// Bind `name` to a new function, or append an overload to an existing one.
    fn defun(&mut self, name: &str, functor: Rc<dyn Functor>) -> Result<(), GispError>;

    /// Assign to an existing local variable.
    fn setvar(&mut self, name: &str, value: Value) -> Result<(), GispError>;

    /// Look up only this environment's own bindings.
    fn local(&self, name: &str) -> Option<Value>;

    /// Look up the builtin toolboxes.
    fn global(&self, name: &str) -> Option<Value>;

    fn lookup(&self, name: &str) -> Option<Value> {
        self.local(name).or_else(|| self.global(name))
    }
}
