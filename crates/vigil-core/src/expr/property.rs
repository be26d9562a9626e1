//! Property lookup expressions
//!
//! A property expression reads one property off a *source object*: the
//! value of its source expression, or the context object when it has none.
//! Watching it subscribes to the source object's notify signal for that one
//! property. When the source expression itself may have changed, the
//! subscription is moved to whatever object the source now resolves to, so
//! no handler is ever left behind on a previous source.

use super::{Expression, ExpressionClass, ExpressionKind, Notify, SubWatch};
use crate::{
    Class, ClassRegistry, Error, HandlerId, Object, ParamSpec, Result, Value, ValueType, WeakObject,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub(crate) struct PropertyExpression {
    source: Option<Expression>,
    pspec: Rc<ParamSpec>,
}

/// Resolve the object a lookup of `pspec` reads from
fn source_object(
    source: Option<&Expression>,
    pspec: &ParamSpec,
    this: Option<&Object>,
) -> Result<Object> {
    let object = match source {
        None => this
            .cloned()
            .ok_or_else(|| Error::NoSourceObject(pspec.name().to_string()))?,
        Some(source) => match source.evaluate(this)? {
            Value::Object(Some(object)) => object,
            Value::Object(None) => return Err(Error::NoSourceObject(pspec.name().to_string())),
            other => {
                return Err(Error::TypeError {
                    expected: ValueType::object().to_string(),
                    got: other.value_type().to_string(),
                })
            }
        },
    };

    if !object.is_a(pspec.owner_type()) {
        return Err(Error::TypeError {
            expected: pspec.owner_type().to_string(),
            got: object.type_name().to_string(),
        });
    }
    Ok(object)
}

impl ExpressionClass for PropertyExpression {
    fn type_name(&self) -> &'static str {
        "PropertyExpression"
    }

    fn is_static(&self) -> bool {
        false
    }

    fn evaluate(&self, _value_type: &ValueType, this: Option<&Object>) -> Result<Value> {
        let object = source_object(self.source.as_ref(), &self.pspec, this)?;
        object.get_property(self.pspec.name())
    }

    fn watch_size(&self) -> usize {
        1 + self.source.as_ref().map_or(0, Expression::watch_size)
    }

    fn watch(&self, this: Option<WeakObject>, notify: Notify) -> SubWatch {
        let watch = Rc::new(PropertyWatch {
            source: self.source.clone(),
            pspec: Rc::clone(&self.pspec),
            this,
            notify,
            connection: RefCell::new(None),
            sub: RefCell::new(None),
        });

        if let Some(source) = self.source.as_ref().filter(|source| !source.is_static()) {
            let weak = Rc::downgrade(&watch);
            let sub = source.subwatch(
                watch.this.clone(),
                Rc::new(move || {
                    if let Some(watch) = weak.upgrade() {
                        watch.source_changed();
                    }
                }),
            );
            *watch.sub.borrow_mut() = Some(sub);
        }

        watch.connect();
        SubWatch::Property(watch)
    }
}

impl fmt::Debug for PropertyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("Property");
        tuple.field(&format_args!("{}.{}", self.pspec.owner_type(), self.pspec.name()));
        if let Some(source) = &self.source {
            tuple.field(source);
        }
        tuple.finish()
    }
}

/// Watch state of one property expression
pub(crate) struct PropertyWatch {
    source: Option<Expression>,
    pspec: Rc<ParamSpec>,
    this: Option<WeakObject>,
    notify: Notify,
    /// Object currently subscribed to, and the handler on it
    connection: RefCell<Option<(WeakObject, HandlerId)>>,
    /// Sub-watch of a non-static source expression
    sub: RefCell<Option<SubWatch>>,
}

impl PropertyWatch {
    fn connect(self: &Rc<Self>) {
        let this = self.this.as_ref().and_then(WeakObject::upgrade);
        let object = match source_object(self.source.as_ref(), &self.pspec, this.as_ref()) {
            Ok(object) => object,
            Err(err) => {
                tracing::trace!(
                    property = self.pspec.name(),
                    error = %err,
                    "no source object to watch"
                );
                return;
            }
        };

        let weak = Rc::downgrade(self);
        let handler = object.connect_notify(Some(self.pspec.name()), move |_, _| {
            if let Some(watch) = weak.upgrade() {
                let notify = Rc::clone(&watch.notify);
                notify();
            }
        });
        *self.connection.borrow_mut() = Some((object.downgrade(), handler));
    }

    fn disconnect(&self) {
        let connection = self.connection.borrow_mut().take();
        if let Some((object, handler)) = connection {
            if let Some(object) = object.upgrade_for_teardown() {
                object.disconnect(handler);
            }
        }
    }

    /// The source may now resolve to a different object
    fn source_changed(self: &Rc<Self>) {
        self.disconnect();
        self.connect();
        let notify = Rc::clone(&self.notify);
        notify();
    }

    pub(crate) fn unwatch(self: Rc<Self>) {
        self.disconnect();
        let sub = self.sub.borrow_mut().take();
        if let Some(sub) = sub {
            sub.unwatch();
        }
    }
}

impl Expression {
    /// Create an expression looking up `property_name` on an object of
    /// type `this_type`
    ///
    /// The object is the value of `source`, or the context object when
    /// `source` is `None`. Evaluation fails if that object is not an
    /// instance of the class declaring the property. Fails here if
    /// `this_type` has no such property.
    pub fn property(
        this_type: &Class,
        source: Option<Expression>,
        property_name: &str,
    ) -> Result<Self> {
        let Some(pspec) = this_type.find_property(property_name) else {
            tracing::warn!(
                class = this_type.name(),
                property = property_name,
                "type does not have a property with this name"
            );
            return Err(Error::PropertyNotFound {
                class: this_type.name().to_string(),
                property: property_name.to_string(),
            });
        };

        Ok(Self::alloc(
            pspec.value_type().clone(),
            ExpressionKind::Property(PropertyExpression { source, pspec }),
        ))
    }

    /// Like [`Expression::property`], resolving the type by name
    pub fn property_by_name(
        registry: &ClassRegistry,
        type_name: &str,
        source: Option<Expression>,
        property_name: &str,
    ) -> Result<Self> {
        let class = registry.lookup(type_name).inspect_err(|_| {
            tracing::warn!(class = type_name, "type is not registered");
        })?;
        Self::property(class, source, property_name)
    }
}
