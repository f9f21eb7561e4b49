//! Functors and overloaded functions.
//!
//! A [`Functor`] is one concrete implementation; it decides for itself whether it accepts
//! a given argument list. A [`Function`] owns an ordered list of functors and dispatches a
//! call to the first one that does not reject the arguments with an arity or type error.

use crate::GispError;
use crate::ast::{Atom, TypeTag, Value};
use crate::env::Env;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One overload of a function
pub trait Functor {
    /// Returns an error for which [`GispError::is_argument_mismatch`] holds when the
    /// arguments do not fit this overload.
    fn call(&self, env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError>;
}

impl<F> Functor for F
where
    F: Fn(&mut dyn Env, &[Value]) -> Result<Value, GispError>,
{
    fn call(&self, env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
        self(env, args)
    }
}

/// Represents the expected number of arguments for an operation
#[derive(Debug, Clone, PartialEq)]
pub enum Arity {
    /// Exactly n arguments required
    Exact(usize),
    /// At least n arguments required
    AtLeast(usize),
}

impl Arity {
    /// Check if the given number of arguments is valid for this arity constraint
    pub fn validate(&self, arg_count: usize) -> Result<(), GispError> {
        let (valid, expected) = match self {
            Arity::Exact(n) => (arg_count == *n, *n),
            Arity::AtLeast(n) => (arg_count >= *n, *n),
        };
        if valid {
            Ok(())
        } else {
            Err(GispError::arity_error(expected, arg_count))
        }
    }
}

pub type NativeFn = fn(&mut dyn Env, &[Value]) -> Result<Value, GispError>;

/// A functor backed by a Rust function with a declared signature
///
/// `params` constrains the leading arguments positionally; when `rest` is set, any
/// number of further arguments of that tag are accepted.
#[derive(Clone)]
pub struct Native {
    pub params: &'static [TypeTag],
    pub rest: Option<TypeTag>,
    pub func: NativeFn,
}

impl Native {
    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.params.len()),
            None => Arity::Exact(self.params.len()),
        }
    }

    fn check(&self, args: &[Value]) -> Result<(), GispError> {
        self.arity().validate(args.len())?;
        for (i, arg) in args.iter().enumerate() {
            let tag = self.params.get(i).copied().or(self.rest).unwrap_or(TypeTag::Any);
            if !tag.accepts(arg) {
                return Err(GispError::type_mismatch(tag, arg));
            }
        }
        Ok(())
    }
}

impl Functor for Native {
    fn call(&self, env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
        self.check(args)?;
        (self.func)(env, args)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native")
            .field("params", &self.params)
            .field("rest", &self.rest)
            .finish()
    }
}

/// A named callable backed by an ordered list of overloads
pub struct Function {
    head: Atom,
    overloads: RefCell<Vec<Rc<dyn Functor>>>,
}

impl Function {
    pub fn new(name: impl Into<String>, functor: Rc<dyn Functor>) -> Self {
        Function::from_overloads(name, vec![functor])
    }

    pub fn from_overloads(name: impl Into<String>, overloads: Vec<Rc<dyn Functor>>) -> Self {
        Function {
            head: Atom::any(name),
            overloads: RefCell::new(overloads),
        }
    }

    pub fn name(&self) -> &str {
        &self.head.name
    }

    pub fn head(&self) -> &Atom {
        &self.head
    }

    /// Append an overload; it is tried after all existing ones
    pub fn overload(&self, functor: Rc<dyn Functor>) {
        self.overloads.borrow_mut().push(functor);
    }

    pub fn overload_count(&self) -> usize {
        self.overloads.borrow().len()
    }

    /// Try each overload in registration order with already evaluated arguments
    pub fn call(&self, env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
        // A functor may define new overloads while it runs
        let overloads = self.overloads.borrow().clone();
        for (index, functor) in overloads.iter().enumerate() {
            match functor.call(env, args) {
                Err(err) if err.is_argument_mismatch() => {
                    tracing::trace!(function = %self.head.name, index, %err, "overload rejected");
                }
                result => {
                    tracing::debug!(function = %self.head.name, index, "overload selected");
                    return result;
                }
            }
        }
        Err(GispError::NoMatchingOverload {
            name: self.head.name.clone(),
            args: args
                .iter()
                .map(|arg| arg.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        })
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("head", &self.head)
            .field("overloads", &self.overload_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gisp::Gisp;

    fn int_only(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
        Ok(Value::from(format!("int:{}", args[0])))
    }

    fn str_only(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
        Ok(Value::from(format!("str:{}", args[0])))
    }

    fn describe() -> Function {
        let f = Function::new(
            "describe",
            Rc::new(Native {
                params: &[TypeTag::Int],
                rest: None,
                func: int_only,
            }),
        );
        f.overload(Rc::new(Native {
            params: &[TypeTag::Str],
            rest: None,
            func: str_only,
        }));
        f
    }

    #[test]
    fn test_arity_validate() {
        assert!(Arity::Exact(2).validate(2).is_ok());
        assert!(Arity::Exact(2).validate(1).is_err());
        assert!(Arity::AtLeast(1).validate(5).is_ok());
        assert_eq!(
            Arity::AtLeast(1).validate(0).unwrap_err(),
            GispError::arity_error(1, 0)
        );
    }

    #[test]
    fn test_first_matching_overload_wins() {
        let mut env = Gisp::default();
        let f = describe();
        assert_eq!(f.overload_count(), 2);
        assert_eq!(f.call(&mut env, &[Value::Int(1)]).unwrap(), Value::from("int:1"));
        assert_eq!(
            f.call(&mut env, &[Value::from("a")]).unwrap(),
            Value::from("str:\"a\"")
        );
    }

    #[test]
    fn test_no_matching_overload() {
        let mut env = Gisp::default();
        let err = describe().call(&mut env, &[Value::Bool(true)]).unwrap_err();
        assert_eq!(
            err,
            GispError::NoMatchingOverload {
                name: "describe".to_string(),
                args: "true".to_string(),
            }
        );
    }

    #[test]
    fn test_non_mismatch_error_is_returned_directly() {
        let mut env = Gisp::default();
        let f = Function::new(
            "boom",
            Rc::new(|_: &mut dyn Env, _: &[Value]| -> Result<Value, GispError> {
                Err(GispError::EvalError("boom".to_string()))
            }),
        );
        f.overload(Rc::new(|_: &mut dyn Env, _: &[Value]| -> Result<Value, GispError> {
            Ok(Value::Int(1))
        }));
        assert_eq!(
            f.call(&mut env, &[]).unwrap_err(),
            GispError::EvalError("boom".to_string())
        );
    }

    #[test]
    fn test_rest_parameters() {
        let mut env = Gisp::default();
        let count = Native {
            params: &[TypeTag::Str],
            rest: Some(TypeTag::Int),
            func: |_, args| Ok(Value::Int(args.len() as i64)),
        };
        assert_eq!(
            count.call(&mut env, &[Value::from("a"), Value::Int(1), Value::Int(2)]).unwrap(),
            Value::Int(3)
        );
        assert!(count.call(&mut env, &[]).unwrap_err().is_argument_mismatch());
        assert!(
            count
                .call(&mut env, &[Value::from("a"), Value::Bool(true)])
                .unwrap_err()
                .is_argument_mismatch()
        );
    }
}
