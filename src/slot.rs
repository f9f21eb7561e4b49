use crate::GispError;
use crate::ast::{Type, Value};

/// A typed, mutable cell holding exactly one value
///
/// The stored value always satisfies the declared type. An optional slot may also be
/// empty, in which case [`Var::get`] returns [`Value::Nil`].
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    ty: Type,
    value: Option<Value>,
}

impl Var {
    /// An empty slot of the given type
    pub fn new(ty: Type) -> Self {
        Var { ty, value: None }
    }

    /// Create a slot and set its initial value in one step
    pub fn with_value(ty: Type, value: Value) -> Result<Self, GispError> {
        let mut slot = Var::new(ty);
        slot.set(value)?;
        Ok(slot)
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn set(&mut self, value: Value) -> Result<(), GispError> {
        if !self.ty.accepts(&value) {
            return Err(GispError::type_mismatch(self.ty, &value));
        }
        self.value = Some(value);
        Ok(())
    }

    pub fn get(&self) -> Value {
        self.value.clone().unwrap_or(Value::Nil)
    }
}
