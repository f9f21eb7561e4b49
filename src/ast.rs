use crate::GispError;
use crate::bracket::Bracket;
use crate::env::Env;
use crate::function::Function;
use crate::slot::Var;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Closed classifier over runtime values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    /// Wildcard, matches every value
    Any,
    Nil,
    Int,
    Float,
    Bool,
    Str,
    Atom,
    List,
    Map,
    Function,
}

impl TypeTag {
    /// Map a `::name` suffix keyword to its tag
    pub fn from_keyword(keyword: &str) -> Option<TypeTag> {
        let tag = match keyword {
            "any" => TypeTag::Any,
            "nil" => TypeTag::Nil,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "bool" => TypeTag::Bool,
            "string" => TypeTag::Str,
            "atom" => TypeTag::Atom,
            "list" => TypeTag::List,
            "map" => TypeTag::Map,
            "func" => TypeTag::Function,
            _ => return None,
        };
        Some(tag)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            TypeTag::Any => "any",
            TypeTag::Nil => "nil",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Bool => "bool",
            TypeTag::Str => "string",
            TypeTag::Atom => "atom",
            TypeTag::List => "list",
            TypeTag::Map => "map",
            TypeTag::Function => "func",
        }
    }

    /// The runtime classification of a value. Never returns `Any`.
    pub fn of(value: &Value) -> TypeTag {
        match value {
            Value::Nil => TypeTag::Nil,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Bool(_) => TypeTag::Bool,
            Value::Str(_) => TypeTag::Str,
            Value::Atom(_) => TypeTag::Atom,
            Value::List(_) => TypeTag::List,
            Value::Map(_) => TypeTag::Map,
            Value::Function(_) => TypeTag::Function,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        *self == TypeTag::Any || *self == TypeTag::of(value)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A type tag plus the nilable flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    pub tag: TypeTag,
    pub option: bool,
}

impl Type {
    pub const ANY: Type = Type::new(TypeTag::Any);

    pub const fn new(tag: TypeTag) -> Self {
        Type { tag, option: false }
    }

    pub const fn optional(tag: TypeTag) -> Self {
        Type { tag, option: true }
    }

    /// Infer the declared type of a slot from the value it is created with
    pub fn infer(value: &Value, option: bool) -> Self {
        Type {
            tag: TypeTag::of(value),
            option,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.tag.accepts(value) || (self.option && value.is_nil())
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::ANY
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if self.option {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// The hashable subset of values, usable as map keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Bool(bool),
    Str(String),
    Atom(String),
}

impl TryFrom<&Value> for Key {
    type Error = GispError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(n) => Ok(Key::Int(*n)),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Str(s) => Ok(Key::Str(s.clone())),
            Value::Atom(atom) => Ok(Key::Atom(atom.name.clone())),
            other => Err(GispError::type_mismatch("hashable key", other)),
        }
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Int(n) => Value::Int(n),
            Key::Bool(b) => Value::Bool(b),
            Key::Str(s) => Value::Str(s),
            Key::Atom(name) => Value::Atom(Atom::any(name)),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{}", n),
            Key::Bool(b) => write!(f, "{}", b),
            Key::Str(s) => write!(f, "{:?}", s),
            Key::Atom(name) => write!(f, "'{}", name),
        }
    }
}

/// Runtime values
///
/// Lists and maps are shared: cloning a `Value` clones the handle, so a write through
/// one binding is visible through every other binding holding the same container.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absent marker: unset optional slots, missing map keys
    #[default]
    Nil,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// A quoted name
    Atom(Atom),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<BTreeMap<Key, Value>>>),
    Function(Rc<Function>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: impl IntoIterator<Item = (Key, Value)>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn type_tag(&self) -> TypeTag {
        TypeTag::of(self)
    }

    /// Copy with fresh containers all the way down. Functions stay shared.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::List(items) => {
                Value::list(items.borrow().iter().map(Value::deep_clone).collect())
            }
            Value::Map(entries) => Value::map(
                entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.deep_clone())),
            ),
            other => other.clone(),
        }
    }

    /// Whether this value is, or transitively holds, the container at `target`
    pub fn holds_container(&self, target: *const ()) -> bool {
        match self {
            Value::List(items) => {
                Rc::as_ptr(items) as *const () == target
                    || items.borrow().iter().any(|item| item.holds_container(target))
            }
            Value::Map(entries) => {
                Rc::as_ptr(entries) as *const () == target
                    || entries
                        .borrow()
                        .values()
                        .any(|value| value.holds_container(target))
            }
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Atom(a), Value::Atom(b)) => a.name == b.name,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            // Functions compare by identity, not by their overloads
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Atom(atom) => write!(f, "'{}", atom.name),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "#<function:{}>", func.name()),
        }
    }
}

/// A named, optionally typed leaf that resolves through the environment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub name: String,
    pub ty: Type,
}

impl Atom {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Atom {
            name: name.into(),
            ty,
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Atom::new(name, Type::ANY)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ty == Type::ANY {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}::{}", self.name, self.ty)
        }
    }
}

/// Evaluable expression protocol implemented by every AST node
pub trait Lisp {
    fn eval(&self, env: &mut dyn Env) -> Result<Value, GispError>;
}

impl Lisp for Atom {
    fn eval(&self, env: &mut dyn Env) -> Result<Value, GispError> {
        let value = env
            .lookup(&self.name)
            .ok_or_else(|| GispError::UnboundVariable(self.name.clone()))?;
        if !self.ty.accepts(&value) {
            return Err(GispError::type_mismatch(self.ty, &value));
        }
        Ok(value)
    }
}

/// Expression tree produced by the parser
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Already a value, evaluates to itself
    Literal(Value),
    Atom(Atom),
    Bracket(Bracket),
    /// `(head arg...)`
    Call { head: Box<Expr>, args: Vec<Expr> },
    /// `(var name::type value)`
    Define { atom: Atom, value: Box<Expr> },
    /// `(set target value)`
    Assign { target: Box<Expr>, value: Box<Expr> },
}

impl Expr {
    /// Evaluate each expression in order, stopping at the first error
    pub fn eval_all(exprs: &[Expr], env: &mut dyn Env) -> Result<Vec<Value>, GispError> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(expr.eval(env)?);
        }
        Ok(values)
    }
}

impl Lisp for Expr {
    fn eval(&self, env: &mut dyn Env) -> Result<Value, GispError> {
        tracing::trace!(expr = %self, "eval");
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Atom(atom) => atom.eval(env),
            Expr::Bracket(bracket) => bracket.eval(env),
            Expr::Call { head, args } => {
                let func = head.eval(env)?;
                let args = Expr::eval_all(args, env)?;
                match func {
                    Value::Function(func) => func.call(env, &args),
                    other => Err(GispError::EvalError(format!(
                        "Cannot apply non-function: {}",
                        other
                    ))),
                }
            }
            Expr::Define { atom, value } => {
                let value = value.eval(env)?;
                let mut slot = Var::new(atom.ty);
                slot.set(value.clone())?;
                env.defvar(&atom.name, slot)?;
                Ok(value)
            }
            Expr::Assign { target, value } => {
                let value = value.eval(env)?;
                match target.as_ref() {
                    Expr::Atom(atom) => {
                        env.setvar(&atom.name, value.clone())?;
                        Ok(value)
                    }
                    Expr::Bracket(bracket) => bracket.set_item_by(env, value),
                    other => Err(GispError::UnsupportedShape(format!(
                        "cannot assign to {}",
                        other
                    ))),
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Atom(atom) => write!(f, "{}", atom),
            Expr::Bracket(bracket) => write!(f, "{}", bracket),
            Expr::Call { head, args } => {
                write!(f, "({}", head)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Define { atom, value } => write!(f, "(var {} {})", atom, value),
            Expr::Assign { target, value } => write!(f, "(set {} {})", target, value),
        }
    }
}
