//! Expression engine
//!
//! An [`Expression`] is an immutable, reference-counted tree describing how
//! to compute a [`Value`] from an optional context object ("this"). Four
//! node kinds make up the tree:
//!
//! - **constant**: a fixed value; always static.
//! - **object**: a weak reference to an object; fails once it is destroyed.
//! - **property**: reads a property off the context object or off the
//!   object its source expression evaluates to.
//! - **closure**: calls a function with the context object followed by the
//!   values of its parameter expressions.
//!
//! Evaluation is a snapshot. To follow changes, [`Expression::watch`]
//! installs a [`Watch`](crate::Watch) whose notify callback fires whenever a
//! later evaluation could produce a different result. Notify may fire
//! without an actual change; it never stays silent when the value changed.

mod closure;
mod constant;
mod object;
mod property;

pub use closure::Closure;

use crate::{Object, Result, Value, ValueType, WeakObject};
use closure::{ClosureExpression, ClosureWatch};
use constant::ConstantExpression;
use object::{ObjectExpression, ObjectWatch};
use property::{PropertyExpression, PropertyWatch};
use std::fmt;
use std::rc::Rc;

/// Callback fired by a sub-watch when its part of the tree may have changed
pub(crate) type Notify = Rc<dyn Fn()>;

/// Operations every node kind implements
trait ExpressionClass {
    /// Diagnostic name of the node kind
    fn type_name(&self) -> &'static str;

    /// True if evaluation with the same context always yields the same value
    fn is_static(&self) -> bool;

    fn evaluate(&self, value_type: &ValueType, this: Option<&Object>) -> Result<Value>;

    /// Number of sub-watch nodes a watch on a non-static node allocates
    fn watch_size(&self) -> usize;

    /// Install the node's sub-watch; only called on non-static nodes
    fn watch(&self, this: Option<WeakObject>, notify: Notify) -> SubWatch;
}

enum ExpressionKind {
    Constant(ConstantExpression),
    Object(ObjectExpression),
    Property(PropertyExpression),
    Closure(ClosureExpression),
}

impl ExpressionKind {
    fn class(&self) -> &dyn ExpressionClass {
        match self {
            ExpressionKind::Constant(expr) => expr,
            ExpressionKind::Object(expr) => expr,
            ExpressionKind::Property(expr) => expr,
            ExpressionKind::Closure(expr) => expr,
        }
    }
}

struct ExpressionInner {
    value_type: ValueType,
    kind: ExpressionKind,
}

/// Shared handle to an immutable expression node
///
/// Cloning retains the node, dropping releases it; the last release
/// releases the node's children, closure and weak references. Parents own
/// their children: constructors take child expressions by value.
#[derive(Clone)]
pub struct Expression(Rc<ExpressionInner>);

impl Expression {
    fn alloc(value_type: ValueType, kind: ExpressionKind) -> Self {
        Expression(Rc::new(ExpressionInner { value_type, kind }))
    }

    /// The type of value this expression evaluates to; fixed for its lifetime
    pub fn value_type(&self) -> &ValueType {
        &self.0.value_type
    }

    /// Diagnostic name of the node kind, e.g. `"PropertyExpression"`
    pub fn type_name(&self) -> &'static str {
        self.0.kind.class().type_name()
    }

    /// Evaluate against an optional context object
    ///
    /// Fails without a value when a referenced object is gone, a type check
    /// fails, or a closure produces nothing usable. Closures may have side
    /// effects; nothing else here does.
    pub fn evaluate(&self, this: Option<&Object>) -> Result<Value> {
        let result = self.0.kind.class().evaluate(&self.0.value_type, this);
        if let Err(err) = &result {
            tracing::trace!(expression = self.type_name(), error = %err, "evaluation failed");
        }
        result
    }

    /// Check if this expression never needs to be watched
    ///
    /// A static expression returns the same value every time it is
    /// evaluated with the same context.
    pub fn is_static(&self) -> bool {
        self.0.kind.class().is_static()
    }

    /// Number of sub-watch nodes a watch on this expression allocates
    ///
    /// Static subtrees take no space.
    pub fn watch_size(&self) -> usize {
        if self.is_static() {
            0
        } else {
            self.0.kind.class().watch_size()
        }
    }

    pub(crate) fn subwatch(&self, this: Option<WeakObject>, notify: Notify) -> SubWatch {
        if self.is_static() {
            return SubWatch::Static;
        }
        self.0.kind.class().watch(this, notify)
    }

    /// Number of handles sharing this node
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Check if two handles refer to the same node
    pub fn ptr_eq(&self, other: &Expression) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ExpressionKind::Constant(expr) => fmt::Debug::fmt(expr, f),
            ExpressionKind::Object(expr) => fmt::Debug::fmt(expr, f),
            ExpressionKind::Property(expr) => fmt::Debug::fmt(expr, f),
            ExpressionKind::Closure(expr) => fmt::Debug::fmt(expr, f),
        }
    }
}

/// Per-node watch state, mirroring the non-static shape of the tree
pub(crate) enum SubWatch {
    Static,
    Object(ObjectWatch),
    Property(Rc<PropertyWatch>),
    Closure(ClosureWatch),
}

impl SubWatch {
    /// Tear down this sub-watch and everything below it
    pub(crate) fn unwatch(self) {
        match self {
            SubWatch::Static => {}
            SubWatch::Object(watch) => watch.unwatch(),
            SubWatch::Property(watch) => watch.unwatch(),
            SubWatch::Closure(watch) => watch.unwatch(),
        }
    }
}
