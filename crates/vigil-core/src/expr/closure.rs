//! Closure expressions

use super::{Expression, ExpressionClass, ExpressionKind, Notify, SubWatch};
use crate::{Error, Object, Result, Value, ValueType, WeakObject};
use std::fmt;
use std::rc::Rc;

/// A shared, opaque function invoked by closure expressions
///
/// The first argument is the context object, or the null object when there
/// is none; the parameter values follow in order. Returning `None` fails
/// the evaluation.
#[derive(Clone)]
pub struct Closure(Rc<dyn Fn(&[Value]) -> Option<Value>>);

impl Closure {
    pub fn new(f: impl Fn(&[Value]) -> Option<Value> + 'static) -> Self {
        Closure(Rc::new(f))
    }

    pub fn invoke(&self, args: &[Value]) -> Option<Value> {
        (self.0)(args)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure(..)")
    }
}

pub(crate) struct ClosureExpression {
    closure: Closure,
    params: Vec<Expression>,
}

impl ExpressionClass for ClosureExpression {
    fn type_name(&self) -> &'static str {
        "ClosureExpression"
    }

    fn is_static(&self) -> bool {
        self.params.iter().all(Expression::is_static)
    }

    fn evaluate(&self, value_type: &ValueType, this: Option<&Object>) -> Result<Value> {
        let mut args = Vec::with_capacity(self.params.len() + 1);
        args.push(Value::Object(this.cloned()));
        for param in &self.params {
            args.push(param.evaluate(this)?);
        }

        let result = self.closure.invoke(&args).ok_or(Error::ClosureFailed)?;
        if !value_type.accepts(&result) {
            return Err(Error::TypeError {
                expected: value_type.to_string(),
                got: result.value_type().to_string(),
            });
        }
        Ok(result)
    }

    fn watch_size(&self) -> usize {
        1 + self.params.iter().map(Expression::watch_size).sum::<usize>()
    }

    fn watch(&self, this: Option<WeakObject>, notify: Notify) -> SubWatch {
        let subs = self
            .params
            .iter()
            .filter(|param| !param.is_static())
            .map(|param| param.subwatch(this.clone(), Rc::clone(&notify)))
            .collect();
        SubWatch::Closure(ClosureWatch { subs })
    }
}

impl fmt::Debug for ClosureExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("Closure");
        for param in &self.params {
            tuple.field(param);
        }
        tuple.finish()
    }
}

/// Sub-watches of the non-static parameters
///
/// Any parameter firing is reported as one notification of the closure.
pub(crate) struct ClosureWatch {
    subs: Vec<SubWatch>,
}

impl ClosureWatch {
    pub(crate) fn unwatch(self) {
        for sub in self.subs {
            sub.unwatch();
        }
    }
}

impl Expression {
    /// Create an expression calling `f` with the context object and the
    /// values of `params`
    ///
    /// The result must conform to `value_type`. The expression is static
    /// when all of its parameters are.
    pub fn closure(
        value_type: ValueType,
        params: impl IntoIterator<Item = Expression>,
        f: impl Fn(&[Value]) -> Option<Value> + 'static,
    ) -> Self {
        Self::closure_with(value_type, params, Closure::new(f))
    }

    /// Like [`Expression::closure`], sharing an existing [`Closure`]
    pub fn closure_with(
        value_type: ValueType,
        params: impl IntoIterator<Item = Expression>,
        closure: Closure,
    ) -> Self {
        Self::alloc(
            value_type,
            ExpressionKind::Closure(ClosureExpression {
                closure,
                params: params.into_iter().collect(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Class, ParamSpec};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn concat(args: &[Value]) -> Option<Value> {
        let mut out = String::new();
        for arg in &args[1..] {
            out.push_str(arg.as_str()?);
        }
        Some(Value::String(out))
    }

    #[test]
    fn test_static_closure() {
        let expr = Expression::closure(
            ValueType::String,
            [Expression::constant("a"), Expression::constant("b")],
            concat,
        );
        assert_eq!(expr.evaluate(None).unwrap(), Value::from("ab"));
        assert!(expr.is_static());
        assert_eq!(expr.watch_size(), 0);
    }

    #[test]
    fn test_context_is_first_argument() {
        let class = Class::builder("Thing").build().unwrap();
        let object = Object::new(&class);
        let expr = Expression::closure(ValueType::Bool, [], |args| {
            Some(Value::Bool(args[0].as_object().is_some()))
        });
        assert_eq!(expr.evaluate(Some(&object)).unwrap(), Value::Bool(true));
        assert_eq!(expr.evaluate(None).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_failing_parameter_short_circuits() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let class = Class::builder("Window")
            .property(ParamSpec::new("title", ValueType::String))
            .build()
            .unwrap();
        let title = Expression::property(&class, None, "title").unwrap();
        let expr = Expression::closure(ValueType::String, [title], move |args| {
            seen.set(seen.get() + 1);
            concat(args)
        });
        assert_eq!(
            expr.evaluate(None),
            Err(Error::NoSourceObject("title".into()))
        );
        assert_eq!(calls.get(), 0);
        assert!(!expr.is_static());
        assert_eq!(expr.watch_size(), 2);
    }

    #[test]
    fn test_closure_result_checked() {
        let none = Expression::closure(ValueType::Int, [], |_| None);
        assert_eq!(none.evaluate(None), Err(Error::ClosureFailed));

        let wrong = Expression::closure(ValueType::Int, [], |_| Some(Value::from("x")));
        assert!(matches!(wrong.evaluate(None), Err(Error::TypeError { .. })));
    }

    #[test]
    fn test_shared_closure() {
        let closure = Closure::new(concat);
        let a = Expression::closure_with(
            ValueType::String,
            [Expression::constant("x")],
            closure.clone(),
        );
        let b = Expression::closure_with(ValueType::String, [Expression::constant("y")], closure);
        assert_eq!(a.evaluate(None).unwrap(), Value::from("x"));
        assert_eq!(b.evaluate(None).unwrap(), Value::from("y"));
    }

    #[test]
    fn test_children_released_with_parent() {
        let child = Expression::constant(1i64);
        let parent = Expression::closure(ValueType::Int, [child.clone()], |args| {
            args.get(1).cloned()
        });
        assert_eq!(child.ref_count(), 2);
        drop(parent);
        assert_eq!(child.ref_count(), 1);
    }

    #[test]
    fn test_debug() {
        let expr = Expression::closure(ValueType::Int, [Expression::constant(1i64)], |_| None);
        assert_eq!(format!("{:?}", expr), "Closure(Constant(Int(1)))");
    }
}
