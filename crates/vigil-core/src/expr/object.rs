//! Weak object reference expressions

use super::{Expression, ExpressionClass, ExpressionKind, Notify, SubWatch};
use crate::{Error, HandlerId, Object, Result, Value, ValueType, WeakObject};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// State shared between the node and the destroy handler on its object
struct ObjectRef {
    /// Cleared when the object is destroyed
    object: RefCell<Option<WeakObject>>,
    listeners: RefCell<IndexMap<u64, Notify>>,
    next_listener: Cell<u64>,
}

impl ObjectRef {
    fn target(&self) -> Option<Object> {
        self.object.borrow().as_ref().and_then(WeakObject::upgrade)
    }

    fn destroyed(&self) {
        self.object.borrow_mut().take();

        let ids: Vec<u64> = self.listeners.borrow().keys().copied().collect();
        tracing::debug!(listeners = ids.len(), "referenced object destroyed");
        for id in ids {
            let notify = self.listeners.borrow().get(&id).cloned();
            if let Some(notify) = notify {
                notify();
            }
        }
    }
}

pub(crate) struct ObjectExpression {
    state: Rc<ObjectRef>,
    handler: HandlerId,
}

impl ExpressionClass for ObjectExpression {
    fn type_name(&self) -> &'static str {
        "ObjectExpression"
    }

    fn is_static(&self) -> bool {
        false
    }

    fn evaluate(&self, _value_type: &ValueType, _this: Option<&Object>) -> Result<Value> {
        self.state
            .target()
            .map(|object| Value::Object(Some(object)))
            .ok_or(Error::ObjectDestroyed)
    }

    fn watch_size(&self) -> usize {
        1
    }

    fn watch(&self, _this: Option<WeakObject>, notify: Notify) -> SubWatch {
        let id = self.state.next_listener.get() + 1;
        self.state.next_listener.set(id);
        self.state.listeners.borrow_mut().insert(id, notify);
        SubWatch::Object(ObjectWatch {
            state: Rc::clone(&self.state),
            id,
        })
    }
}

impl Drop for ObjectExpression {
    fn drop(&mut self) {
        let object = self.state.object.borrow_mut().take();
        if let Some(object) = object.as_ref().and_then(WeakObject::upgrade_for_teardown) {
            object.disconnect_destroy(self.handler);
        }
    }
}

impl fmt::Debug for ObjectExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.target() {
            Some(object) => f.debug_tuple("Object").field(&object).finish(),
            None => write!(f, "Object(<destroyed>)"),
        }
    }
}

/// Listener registration of one watch on an object expression
pub(crate) struct ObjectWatch {
    state: Rc<ObjectRef>,
    id: u64,
}

impl ObjectWatch {
    pub(crate) fn unwatch(self) {
        let removed = self.state.listeners.borrow_mut().shift_remove(&self.id);
        drop(removed);
    }
}

impl Expression {
    /// Create an expression evaluating to `object` without owning it
    ///
    /// Once the object is destroyed, evaluation fails and every watch on
    /// this expression is notified. Use this instead of
    /// [`Expression::constant`] to avoid a reference cycle back to an
    /// object that owns the expression.
    pub fn object(object: &Object) -> Self {
        let state = Rc::new(ObjectRef {
            object: RefCell::new(Some(object.downgrade())),
            listeners: RefCell::new(IndexMap::new()),
            next_listener: Cell::new(0),
        });
        let weak = Rc::downgrade(&state);
        let handler = object.connect_destroy(move |_| {
            if let Some(state) = weak.upgrade() {
                state.destroyed();
            }
        });

        Self::alloc(
            ValueType::object_of(object.class()),
            ExpressionKind::Object(ObjectExpression { state, handler }),
        )
    }
}
