//! The core builtin toolbox.
//!
//! Operations are registered once in a static table, each with one or more overloads.
//! An overload is a [`Native`] functor: its declared parameter tags decide whether it
//! accepts a call, so `(+ 1 2)`, `(+ 1.5 2.5)` and `(+ "a" "b")` each reach a different
//! implementation through the ordinary try-in-order resolution.
//!
//! ```text
//! (+ 1 2 3)            ; 6
//! (+ "ab" "cd")        ; "abcd"
//! (len (list 1 2))     ; 2
//! (dict "a" 1 "b" 2)   ; {"a" 1, "b" 2}
//! ```
//!
//! Integer arithmetic detects overflow and reports it as an evaluation error rather
//! than wrapping.

use crate::GispError;
use crate::ast::{Key, TypeTag, Value};
use crate::env::{Env, Toolbox};
use crate::function::{Function, Functor, Native};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

/// Definition of a built-in operation
#[derive(Debug)]
pub struct BuiltinOp {
    pub id: &'static str,
    /// Tried in order
    pub overloads: &'static [Native],
}

impl BuiltinOp {
    /// Build a fresh function value for this operation
    pub fn to_function(&self) -> Function {
        Function::from_overloads(
            self.id,
            self.overloads
                .iter()
                .map(|native| Rc::new(native.clone()) as Rc<dyn Functor>)
                .collect(),
        )
    }
}

fn ints(args: &[Value]) -> impl Iterator<Item = i64> + '_ {
    args.iter().filter_map(|arg| match arg {
        Value::Int(n) => Some(*n),
        _ => None,
    })
}

fn floats(args: &[Value]) -> impl Iterator<Item = f64> + '_ {
    args.iter().filter_map(|arg| match arg {
        Value::Float(x) => Some(*x),
        _ => None,
    })
}

fn overflow(op: &str) -> GispError {
    GispError::EvalError(format!("Integer overflow in {}", op))
}

fn add_ints(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    let mut sum = 0i64;
    for n in ints(args) {
        sum = sum.checked_add(n).ok_or_else(|| overflow("addition"))?;
    }
    Ok(Value::Int(sum))
}

fn add_floats(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    Ok(Value::Float(floats(args).sum()))
}

fn concat(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    let mut text = String::new();
    for arg in args {
        if let Value::Str(s) = arg {
            text.push_str(s);
        }
    }
    Ok(Value::Str(text))
}

fn sub_ints(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    let mut values = ints(args);
    let first = values.next().unwrap_or_default();
    if args.len() == 1 {
        return first.checked_neg().map(Value::Int).ok_or_else(|| overflow("negation"));
    }
    let mut result = first;
    for n in values {
        result = result.checked_sub(n).ok_or_else(|| overflow("subtraction"))?;
    }
    Ok(Value::Int(result))
}

fn sub_floats(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    let mut values = floats(args);
    let first = values.next().unwrap_or_default();
    if args.len() == 1 {
        return Ok(Value::Float(-first));
    }
    Ok(Value::Float(values.fold(first, |acc, x| acc - x)))
}

fn mul_ints(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    let mut product = 1i64;
    for n in ints(args) {
        product = product
            .checked_mul(n)
            .ok_or_else(|| overflow("multiplication"))?;
    }
    Ok(Value::Int(product))
}

fn mul_floats(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    Ok(Value::Float(floats(args).product()))
}

// Chained comparison over adjacent pairs, one generator per numeric kind
macro_rules! comparison {
    ($name:ident, $extract:ident, $op:tt) => {
        fn $name(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
            let values: Vec<_> = $extract(args).collect();
            Ok(Value::Bool(values.windows(2).all(|pair| pair[0] $op pair[1])))
        }
    };
}

comparison!(lt_ints, ints, <);
comparison!(gt_ints, ints, >);
comparison!(lt_floats, floats, <);
comparison!(gt_floats, floats, >);

fn equal(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    Ok(Value::Bool(args[0] == args[1]))
}

fn not(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    Ok(Value::Bool(!matches!(args[0], Value::Bool(true))))
}

fn list(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    Ok(Value::list(args.to_vec()))
}

fn dict(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    if args.len() % 2 != 0 {
        return Err(GispError::EvalError(
            "dict requires key/value pairs".to_string(),
        ));
    }
    let mut entries = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        entries.push((Key::try_from(&pair[0])?, pair[1].clone()));
    }
    Ok(Value::map(entries))
}

fn len_list(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    match &args[0] {
        Value::List(items) => Ok(Value::Int(items.borrow().len() as i64)),
        other => Err(GispError::type_mismatch(TypeTag::List, other)),
    }
}

fn len_str(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(GispError::type_mismatch(TypeTag::Str, other)),
    }
}

fn len_map(_env: &mut dyn Env, args: &[Value]) -> Result<Value, GispError> {
    match &args[0] {
        Value::Map(entries) => Ok(Value::Int(entries.borrow().len() as i64)),
        other => Err(GispError::type_mismatch(TypeTag::Map, other)),
    }
}

const fn variadic(tag: TypeTag, func: crate::function::NativeFn) -> Native {
    Native {
        params: &[],
        rest: Some(tag),
        func,
    }
}

/// Global registry of all built-in operations
static BUILTIN_OPS: &[BuiltinOp] = &[
    BuiltinOp {
        id: "+",
        overloads: &[
            variadic(TypeTag::Int, add_ints),
            variadic(TypeTag::Float, add_floats),
            variadic(TypeTag::Str, concat),
        ],
    },
    BuiltinOp {
        id: "-",
        overloads: &[
            Native {
                params: &[TypeTag::Int],
                rest: Some(TypeTag::Int),
                func: sub_ints,
            },
            Native {
                params: &[TypeTag::Float],
                rest: Some(TypeTag::Float),
                func: sub_floats,
            },
        ],
    },
    BuiltinOp {
        id: "*",
        overloads: &[
            Native {
                params: &[TypeTag::Int],
                rest: Some(TypeTag::Int),
                func: mul_ints,
            },
            Native {
                params: &[TypeTag::Float],
                rest: Some(TypeTag::Float),
                func: mul_floats,
            },
        ],
    },
    BuiltinOp {
        id: "<",
        overloads: &[
            Native {
                params: &[TypeTag::Int, TypeTag::Int],
                rest: Some(TypeTag::Int),
                func: lt_ints,
            },
            Native {
                params: &[TypeTag::Float, TypeTag::Float],
                rest: Some(TypeTag::Float),
                func: lt_floats,
            },
        ],
    },
    BuiltinOp {
        id: ">",
        overloads: &[
            Native {
                params: &[TypeTag::Int, TypeTag::Int],
                rest: Some(TypeTag::Int),
                func: gt_ints,
            },
            Native {
                params: &[TypeTag::Float, TypeTag::Float],
                rest: Some(TypeTag::Float),
                func: gt_floats,
            },
        ],
    },
    BuiltinOp {
        id: "=",
        overloads: &[Native {
            params: &[TypeTag::Any, TypeTag::Any],
            rest: None,
            func: equal,
        }],
    },
    BuiltinOp {
        id: "not",
        overloads: &[Native {
            params: &[TypeTag::Bool],
            rest: None,
            func: not,
        }],
    },
    BuiltinOp {
        id: "list",
        overloads: &[variadic(TypeTag::Any, list)],
    },
    BuiltinOp {
        id: "dict",
        overloads: &[variadic(TypeTag::Any, dict)],
    },
    BuiltinOp {
        id: "len",
        overloads: &[
            Native {
                params: &[TypeTag::List],
                rest: None,
                func: len_list,
            },
            Native {
                params: &[TypeTag::Str],
                rest: None,
                func: len_str,
            },
            Native {
                params: &[TypeTag::Map],
                rest: None,
                func: len_map,
            },
        ],
    },
];

static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.id, op)).collect());

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Toolbox exposing [`BUILTIN_OPS`] as function values
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreToolbox;

impl Toolbox for CoreToolbox {
    fn lookup(&self, name: &str) -> Option<Value> {
        find_builtin_op(name).map(|op| Value::Function(Rc::new(op.to_function())))
    }
}
