use crate::ast::{Expr, Lisp, Type, Value};
use crate::builtinops::CoreToolbox;
use crate::env::{Binding, Env, Toolbox};
use crate::function::{Function, Functor};
use crate::parser::{Grammar, skip, to_parse_failure};
use crate::slot::Var;
use crate::{GispError, Limits};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// Fixed description of an environment, supplied at construction
pub struct Meta {
    pub category: String,
    /// Fallback lookup sources, consulted in key order
    pub builtins: BTreeMap<String, Box<dyn Toolbox>>,
}

/// The interpreter: owns the local bindings and runs programs against them
pub struct Gisp {
    meta: Meta,
    content: HashMap<String, Binding>,
    limits: Limits,
}

impl Gisp {
    pub fn new(builtins: BTreeMap<String, Box<dyn Toolbox>>) -> Self {
        Gisp {
            meta: Meta {
                category: "gisp".to_string(),
                builtins,
            },
            content: HashMap::new(),
            limits: Limits::default(),
        }
    }

    /// An interpreter whose only toolbox is [`CoreToolbox`]
    pub fn with_core() -> Self {
        let mut builtins: BTreeMap<String, Box<dyn Toolbox>> = BTreeMap::new();
        builtins.insert("core".to_string(), Box::new(CoreToolbox));
        Gisp::new(builtins)
    }

    /// Construct with builtins and define every `ext` entry as a variable
    pub fn with_ext(
        builtins: BTreeMap<String, Box<dyn Toolbox>>,
        ext: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, GispError> {
        let mut gisp = Gisp::new(builtins);
        for (name, value) in ext {
            gisp.def_as(&name, value)?;
        }
        Ok(gisp)
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.content.get(name)
    }

    /// Local bindings sorted by name
    pub fn bindings(&self) -> Vec<(&str, &Binding)> {
        let mut bindings: Vec<_> = self
            .content
            .iter()
            .map(|(name, binding)| (name.as_str(), binding))
            .collect();
        bindings.sort_by_key(|(name, _)| *name);
        bindings
    }

    /// Define a variable whose type is inferred from `value`
    pub fn def_as(&mut self, name: &str, value: Value) -> Result<(), GispError> {
        let slot = Var::with_value(Type::infer(&value, false), value)?;
        self.defvar(name, slot)
    }

    /// Like [`Gisp::def_as`], but the slot also accepts nil
    pub fn def_opt_as(&mut self, name: &str, value: Value) -> Result<(), GispError> {
        let slot = Var::with_value(Type::infer(&value, true), value)?;
        self.defvar(name, slot)
    }

    /// Parse and evaluate a program form by form, returning the last result.
    ///
    /// The first parse or evaluation error aborts the run. Forms evaluated before the
    /// error keep their effects.
    #[tracing::instrument(level = "debug", skip(self, code), fields(len = code.len()))]
    pub fn parse(&mut self, code: &str) -> Result<Value, GispError> {
        let grammar = Grammar::new(self.limits);
        let mut rest = code;
        let mut last = Value::Nil;
        loop {
            let (next, _) = skip(rest).map_err(|e| to_parse_failure(code, e))?;
            if next.is_empty() {
                return Ok(last);
            }
            let (next, form) = grammar
                .value(next, 0)
                .map_err(|e| to_parse_failure(code, e))?;
            tracing::debug!(form = %form, "evaluating top-level form");
            last = form.eval(self)?;
            rest = next;
        }
    }

    /// Evaluate already parsed forms in order, returning the last result
    pub fn eval(&mut self, forms: &[Expr]) -> Result<Value, GispError> {
        let mut last = Value::Nil;
        for form in forms {
            last = form.eval(self)?;
        }
        Ok(last)
    }
}

impl Default for Gisp {
    fn default() -> Self {
        Gisp::new(BTreeMap::new())
    }
}

impl Env for Gisp {
    fn defvar(&mut self, name: &str, slot: Var) -> Result<(), GispError> {
        if self.content.contains_key(name) {
            return Err(GispError::NameExists(name.to_string()));
        }
        if !slot.is_set() && !slot.ty().accepts(&Value::Nil) {
            return Err(GispError::type_mismatch(slot.ty(), Value::Nil));
        }
        tracing::debug!(name, ty = %slot.ty(), "defvar");
        self.content.insert(name.to_string(), Binding::Var(slot));
        Ok(())
    }

    fn defun(&mut self, name: &str, functor: Rc<dyn Functor>) -> Result<(), GispError> {
        match self.content.get(name) {
            Some(Binding::Function(function)) => {
                function.overload(functor);
                tracing::debug!(name, overloads = function.overload_count(), "overload appended");
                Ok(())
            }
            Some(Binding::Var(_)) => Err(GispError::NameExists(name.to_string())),
            None => {
                tracing::debug!(name, "defun");
                self.content.insert(
                    name.to_string(),
                    Binding::Function(Rc::new(Function::new(name, functor))),
                );
                Ok(())
            }
        }
    }

    fn setvar(&mut self, name: &str, value: Value) -> Result<(), GispError> {
        match self.content.get_mut(name) {
            Some(Binding::Var(slot)) => {
                tracing::debug!(name, %value, "setvar");
                slot.set(value)
            }
            Some(Binding::Function(_)) => Err(GispError::NotAssignable {
                name: name.to_string(),
                reason: "is a function".to_string(),
            }),
            None => Err(GispError::NotFound(name.to_string())),
        }
    }

    fn local(&self, name: &str) -> Option<Value> {
        match self.content.get(name)? {
            Binding::Var(slot) => Some(slot.get()),
            Binding::Function(function) => Some(Value::Function(function.clone())),
        }
    }

    fn global(&self, name: &str) -> Option<Value> {
        self.meta
            .builtins
            .values()
            .find_map(|toolbox| toolbox.lookup(name))
    }
}

impl fmt::Debug for Gisp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gisp")
            .field("category", &self.meta.category)
            .field("builtins", &self.meta.builtins.keys().collect::<Vec<_>>())
            .field("content", &self.content)
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Atom, TypeTag};
    use crate::bracket::Bracket;
    use pretty_assertions::assert_eq;

    fn constant(n: i64) -> Rc<dyn Functor> {
        Rc::new(move |_: &mut dyn Env, _: &[Value]| -> Result<Value, GispError> {
            Ok(Value::Int(n))
        })
    }

    fn toolbox(entries: &[(&str, Value)]) -> Box<dyn Toolbox> {
        let map: HashMap<String, Value> = entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Box::new(map)
    }

    #[test]
    fn test_defvar_rejects_redefinition() {
        let mut gisp = Gisp::default();
        gisp.def_as("x", Value::Int(1)).unwrap();
        assert_eq!(
            gisp.def_as("x", Value::Int(1)).unwrap_err(),
            GispError::NameExists("x".to_string())
        );
        assert_eq!(
            gisp.defvar("x", Var::new(Type::ANY)).unwrap_err(),
            GispError::NameExists("x".to_string())
        );
        assert_eq!(gisp.local("x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_defvar_rejects_unset_required_slot() {
        let mut gisp = Gisp::default();
        assert!(gisp.defvar("n", Var::new(Type::new(TypeTag::Int))).is_err());
        gisp.defvar("m", Var::new(Type::optional(TypeTag::Int))).unwrap();
        assert_eq!(gisp.local("m"), Some(Value::Nil));
    }

    #[test]
    fn test_def_as_infers_type() {
        let mut gisp = Gisp::default();
        gisp.def_as("n", Value::Int(1)).unwrap();
        assert!(matches!(
            gisp.setvar("n", Value::from("one")),
            Err(GispError::TypeMismatch { .. })
        ));
        assert!(gisp.setvar("n", Value::Nil).is_err());
        gisp.setvar("n", Value::Int(2)).unwrap();
        assert_eq!(gisp.local("n"), Some(Value::Int(2)));

        gisp.def_opt_as("o", Value::Int(1)).unwrap();
        gisp.setvar("o", Value::Nil).unwrap();
        assert_eq!(gisp.local("o"), Some(Value::Nil));
    }

    #[test]
    fn test_defun_accumulates_overloads() {
        let mut gisp = Gisp::default();
        for n in 0..3 {
            gisp.defun("f", constant(n)).unwrap();
        }
        match gisp.binding("f") {
            Some(Binding::Function(f)) => assert_eq!(f.overload_count(), 3),
            other => panic!("expected a function, got {:?}", other),
        }
        // first registered overload accepts everything
        assert_eq!(gisp.parse("(f)").unwrap(), Value::Int(0));
    }

    #[test]
    fn test_defun_on_variable_fails() {
        let mut gisp = Gisp::default();
        gisp.def_as("v", Value::Int(1)).unwrap();
        assert!(gisp.defun("v", constant(1)).is_err());
        assert_eq!(gisp.local("v"), Some(Value::Int(1)));
    }

    #[test]
    fn test_setvar_errors() {
        let mut gisp = Gisp::default();
        gisp.defun("f", constant(1)).unwrap();
        assert!(matches!(
            gisp.setvar("f", Value::Int(2)),
            Err(GispError::NotAssignable { .. })
        ));
        assert_eq!(
            gisp.setvar("missing", Value::Int(2)).unwrap_err(),
            GispError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn test_local_shadows_global() {
        let mut builtins = BTreeMap::new();
        builtins.insert("a".to_string(), toolbox(&[("x", Value::Int(1)), ("y", Value::Int(2))]));
        let mut gisp = Gisp::new(builtins);
        assert_eq!(gisp.lookup("x"), Some(Value::Int(1)));
        gisp.def_as("x", Value::Int(10)).unwrap();
        assert_eq!(gisp.lookup("x"), Some(Value::Int(10)));
        assert_eq!(gisp.local("y"), None);
        assert_eq!(gisp.global("y"), Some(Value::Int(2)));
        assert_eq!(gisp.lookup("z"), None);
    }

    #[test]
    fn test_builtins_consulted_in_key_order() {
        let mut builtins = BTreeMap::new();
        builtins.insert("b".to_string(), toolbox(&[("x", Value::from("from b"))]));
        builtins.insert("a".to_string(), toolbox(&[("x", Value::from("from a"))]));
        let gisp = Gisp::new(builtins);
        assert_eq!(gisp.global("x"), Some(Value::from("from a")));
    }

    #[test]
    fn test_with_ext() {
        let gisp = Gisp::with_ext(
            BTreeMap::new(),
            [("limit".to_string(), Value::Int(5))],
        )
        .unwrap();
        assert_eq!(gisp.local("limit"), Some(Value::Int(5)));
    }

    #[test]
    fn test_bindings_sorted() {
        let mut gisp = Gisp::default();
        gisp.def_as("b", Value::Int(1)).unwrap();
        gisp.defun("a", constant(1)).unwrap();
        gisp.def_as("c", Value::Nil).unwrap();
        let names: Vec<_> = gisp.bindings().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_returns_last_form() {
        let mut gisp = Gisp::with_core();
        assert_eq!(gisp.parse("").unwrap(), Value::Nil);
        assert_eq!(gisp.parse("(var x 1) (var y 2) (+ x y)").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_parse_aborts_on_first_error() {
        let mut gisp = Gisp::with_core();
        let err = gisp.parse("(var a 1) missing (var b 2)").unwrap_err();
        assert_eq!(err, GispError::UnboundVariable("missing".to_string()));
        assert_eq!(gisp.local("a"), Some(Value::Int(1)));
        assert_eq!(gisp.local("b"), None);
        assert!(matches!(
            gisp.parse("(var c 3) (oops"),
            Err(GispError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_eval_forms() {
        let mut gisp = Gisp::default();
        gisp.def_as("xs", Value::list(vec![Value::Int(7), Value::Int(8)]))
            .unwrap();
        let forms = vec![
            Expr::Literal(Value::from("passthrough")),
            Expr::Bracket(Bracket::new(
                Expr::Atom(Atom::any("xs")),
                vec![Expr::Literal(Value::Int(1))],
            )),
        ];
        assert_eq!(gisp.eval(&forms).unwrap(), Value::Int(8));
        assert_eq!(gisp.eval(&forms[..1]).unwrap(), Value::from("passthrough"));
        assert_eq!(gisp.eval(&[]).unwrap(), Value::Nil);
    }
}
