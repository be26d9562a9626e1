//! Constant expressions

use super::{Expression, ExpressionClass, ExpressionKind, Notify, SubWatch};
use crate::{Error, Object, Result, Value, ValueType, WeakObject};
use std::fmt;

pub(crate) struct ConstantExpression {
    value: Value,
}

impl ExpressionClass for ConstantExpression {
    fn type_name(&self) -> &'static str {
        "ConstantExpression"
    }

    fn is_static(&self) -> bool {
        true
    }

    fn evaluate(&self, _value_type: &ValueType, _this: Option<&Object>) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn watch_size(&self) -> usize {
        0
    }

    fn watch(&self, _this: Option<WeakObject>, _notify: Notify) -> SubWatch {
        SubWatch::Static
    }
}

impl fmt::Debug for ConstantExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Constant").field(&self.value).finish()
    }
}

impl Expression {
    /// Create an expression that always evaluates to `value`
    ///
    /// An object stored here is kept alive by the expression; use
    /// [`Expression::object`] to refer to an object without owning it.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::alloc(
            value.value_type(),
            ExpressionKind::Constant(ConstantExpression { value }),
        )
    }

    /// Create a constant with an explicitly declared type
    ///
    /// Useful to declare an object constant by a base class, or a null
    /// object of a specific class.
    pub fn constant_typed(value_type: ValueType, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        if !value_type.accepts(&value) {
            return Err(Error::InvalidValue {
                expected: value_type.to_string(),
                got: value.value_type().to_string(),
            });
        }
        Ok(Self::alloc(
            value_type,
            ExpressionKind::Constant(ConstantExpression { value }),
        ))
    }
}
