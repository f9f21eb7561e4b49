//! Bracket expressions: `obj[i]`, `obj[lo:hi]`, `obj[lo:hi:step]` and `map[key]`.
//!
//! Reads produce a new value; writes (`(set obj[i] v)`) mutate the shared container in
//! place and return it. Negative indices count from the end, so `xs[-1]` is the last
//! element. Index reads and writes accept positions in `[0, len)`, slice bounds accept
//! `[0, len]` and the optional third bound is a positive step. The step is a stride, not a
//! position, so it skips index normalization: it only has to be at least 1, and a step
//! longer than the slice simply yields its first element.

use crate::GispError;
use crate::ast::{Expr, Key, Lisp, Value};
use crate::env::Env;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// The shapes a bracket can operate on, classified once per evaluation
enum Indexable {
    Sequence(Rc<RefCell<Vec<Value>>>),
    Text(String),
    Mapping(Rc<RefCell<BTreeMap<Key, Value>>>),
    Other(Value),
}

impl From<Value> for Indexable {
    fn from(value: Value) -> Self {
        match value {
            Value::List(items) => Indexable::Sequence(items),
            Value::Str(text) => Indexable::Text(text),
            Value::Map(entries) => Indexable::Mapping(entries),
            other => Indexable::Other(other),
        }
    }
}

/// Normalize a possibly negative index into a position in `[0, len)`
pub fn normalize_index(index: i64, len: usize) -> Result<usize, GispError> {
    let position = if index < 0 { len as i64 + index } else { index };
    if position < 0 || position >= len as i64 {
        return Err(GispError::OutOfRange { index, len });
    }
    Ok(position as usize)
}

/// Like [`normalize_index`] but `len` itself is a valid slice bound
fn normalize_bound(index: i64, len: usize) -> Result<usize, GispError> {
    let position = if index < 0 { len as i64 + index } else { index };
    if position < 0 || position > len as i64 {
        return Err(GispError::OutOfRange { index, len });
    }
    Ok(position as usize)
}

fn expect_int(value: &Value) -> Result<i64, GispError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(GispError::type_mismatch("int index", other)),
    }
}

/// Resolved slice bounds
struct Bounds {
    start: usize,
    end: usize,
    step: usize,
}

/// `obj[expr...]` with one to three index expressions
#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    obj: Box<Expr>,
    expr: Vec<Expr>,
}

impl Bracket {
    pub fn new(obj: Expr, expr: Vec<Expr>) -> Self {
        Bracket {
            obj: Box::new(obj),
            expr,
        }
    }

    pub fn obj(&self) -> &Expr {
        &self.obj
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.expr
    }

    fn eval_index(&self, env: &mut dyn Env, len: usize) -> Result<usize, GispError> {
        let index = self.expr[0].eval(env)?;
        normalize_index(expect_int(&index)?, len)
    }

    fn eval_bounds(&self, env: &mut dyn Env, len: usize) -> Result<Bounds, GispError> {
        let items = Expr::eval_all(&self.expr, env)?;
        let raw = items.iter().map(expect_int).collect::<Result<Vec<_>, _>>()?;
        let start = normalize_bound(raw[0], len)?;
        let end = normalize_bound(raw[1], len)?;
        if start > end {
            return Err(GispError::OutOfRange { index: raw[0], len });
        }
        let step = match raw.get(2) {
            None => 1,
            Some(&step) if step >= 1 => step as usize,
            Some(&step) => return Err(GispError::OutOfRange { index: step, len }),
        };
        Ok(Bounds { start, end, step })
    }

    fn eval_sequence(
        &self,
        env: &mut dyn Env,
        items: &RefCell<Vec<Value>>,
    ) -> Result<Value, GispError> {
        let len = items.borrow().len();
        match self.expr.len() {
            1 => {
                let position = self.eval_index(env, len)?;
                items
                    .borrow()
                    .get(position)
                    .cloned()
                    .ok_or(GispError::OutOfRange {
                        index: position as i64,
                        len,
                    })
            }
            2 | 3 => {
                let bounds = self.eval_bounds(env, len)?;
                let items = items.borrow();
                let end = bounds.end.min(items.len());
                let start = bounds.start.min(end);
                Ok(Value::list(
                    items[start..end]
                        .iter()
                        .step_by(bounds.step)
                        .cloned()
                        .collect(),
                ))
            }
            _ => Err(GispError::UnsupportedShape(format!(
                "Unknown how to index or slice {}",
                self
            ))),
        }
    }

    fn eval_text(&self, env: &mut dyn Env, text: &str) -> Result<Value, GispError> {
        let len = text.chars().count();
        match self.expr.len() {
            1 => {
                let position = self.eval_index(env, len)?;
                Ok(text
                    .chars()
                    .nth(position)
                    .map(|c| Value::Str(c.to_string()))
                    .unwrap_or(Value::Nil))
            }
            2 | 3 => {
                let bounds = self.eval_bounds(env, len)?;
                Ok(Value::Str(
                    text.chars()
                        .skip(bounds.start)
                        .take(bounds.end - bounds.start)
                        .step_by(bounds.step)
                        .collect(),
                ))
            }
            _ => Err(GispError::UnsupportedShape(format!(
                "Unknown how to index or slice {}",
                self
            ))),
        }
    }

    fn eval_key(&self, env: &mut dyn Env) -> Result<Key, GispError> {
        let key = self.expr[0].eval(env)?;
        Key::try_from(&key)
    }

    /// A container may not end up inside itself
    fn reject_cycle(&self, item: &Value, target: *const ()) -> Result<(), GispError> {
        if item.holds_container(target) {
            return Err(GispError::UnsupportedShape(format!(
                "{} cannot hold a container that holds it",
                self
            )));
        }
        Ok(())
    }

    /// Write `item` into the container this bracket refers to.
    ///
    /// Maps take exactly one key, sequences exactly one index; slice assignment is not
    /// supported. Returns the mutated container.
    pub fn set_item_by(&self, env: &mut dyn Env, item: Value) -> Result<Value, GispError> {
        let obj = self.obj.eval(env)?;
        match Indexable::from(obj) {
            Indexable::Mapping(entries) => {
                if self.expr.len() != 1 {
                    return Err(GispError::UnsupportedShape(format!(
                        "{} = {} accepts only one key",
                        self, item
                    )));
                }
                let key = self.eval_key(env)?;
                self.reject_cycle(&item, Rc::as_ptr(&entries) as *const ())?;
                tracing::debug!(%key, %item, "map write");
                entries.borrow_mut().insert(key, item);
                Ok(Value::Map(entries))
            }
            Indexable::Sequence(items) => {
                if self.expr.len() != 1 {
                    return Err(GispError::UnsupportedShape(format!(
                        "{} = {} accepts only one index",
                        self, item
                    )));
                }
                let len = items.borrow().len();
                let position = self.eval_index(env, len)?;
                self.reject_cycle(&item, Rc::as_ptr(&items) as *const ())?;
                tracing::debug!(position, %item, "sequence write");
                match items.borrow_mut().get_mut(position) {
                    Some(slot) => *slot = item,
                    None => {
                        return Err(GispError::OutOfRange {
                            index: position as i64,
                            len,
                        });
                    }
                };
                Ok(Value::List(items))
            }
            Indexable::Text(text) => Err(GispError::UnsupportedShape(format!(
                "{:?} is neither sequence nor mapping",
                text
            ))),
            Indexable::Other(other) => Err(GispError::UnsupportedShape(format!(
                "{} is neither sequence nor mapping",
                other
            ))),
        }
    }
}

impl Lisp for Bracket {
    fn eval(&self, env: &mut dyn Env) -> Result<Value, GispError> {
        let obj = self.obj.eval(env)?;
        match Indexable::from(obj) {
            Indexable::Sequence(items) => self.eval_sequence(env, &items),
            Indexable::Text(text) => self.eval_text(env, &text),
            Indexable::Mapping(entries) => {
                if self.expr.len() != 1 {
                    return Err(GispError::UnsupportedShape(format!(
                        "Unknown how to parse map {}",
                        self
                    )));
                }
                let key = self.eval_key(env)?;
                Ok(entries.borrow().get(&key).cloned().unwrap_or(Value::Nil))
            }
            Indexable::Other(_) => Err(GispError::UnsupportedShape(format!(
                "Unknown how to parse formal as {}",
                self
            ))),
        }
    }
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.obj)?;
        for (i, expr) in self.expr.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{}", expr)?;
        }
        write!(f, "]")
    }
}

/// A parsed `[...]` suffix waiting for the object it applies to
#[derive(Debug, Clone, PartialEq)]
pub struct BracketExpr {
    pub exprs: Vec<Expr>,
}

impl BracketExpr {
    pub fn new(exprs: Vec<Expr>) -> Self {
        BracketExpr { exprs }
    }

    /// Build the bracket node from exactly one object expression
    pub fn task(&self, args: Vec<Expr>) -> Result<Expr, GispError> {
        match <[Expr; 1]>::try_from(args) {
            Ok([obj]) => Ok(Expr::Bracket(Bracket::new(obj, self.exprs.clone()))),
            Err(args) => Err(GispError::arity_error(1, args.len())),
        }
    }
}
