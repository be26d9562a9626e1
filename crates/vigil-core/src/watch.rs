//! Live subscriptions on expressions
//!
//! A [`Watch`] pairs an expression with a context object and calls a notify
//! callback whenever re-evaluating could yield a different value. The watch
//! owns a tree of sub-watches mirroring the non-static part of the
//! expression, plus a destroy listener on the context: when the context
//! dies the watch notifies once and removes itself.

use crate::expr::SubWatch;
use crate::{Error, Expression, HandlerId, Object, Result, Value, WeakObject};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type DestroyHook = Box<dyn FnOnce()>;

struct WatchInner {
    /// `None` once unwatched
    expression: RefCell<Option<Expression>>,
    this: Option<WeakObject>,
    /// Destroy handler on the context object
    this_handler: Cell<Option<HandlerId>>,
    notify: Rc<dyn Fn()>,
    destroy: RefCell<Option<DestroyHook>>,
    sub: RefCell<Option<SubWatch>>,
    /// Holds the watch alive while it is installed
    keep_alive: RefCell<Option<Rc<WatchInner>>>,
}

impl WatchInner {
    fn is_watching(&self) -> bool {
        self.expression.borrow().is_some()
    }

    fn deliver(&self) {
        if !self.is_watching() {
            return;
        }
        tracing::trace!("watch notified");
        let notify = Rc::clone(&self.notify);
        notify();
    }

    fn context_destroyed(&self) {
        // The destroy handler has already been consumed
        self.this_handler.set(None);
        if !self.is_watching() {
            return;
        }
        tracing::debug!("watch context destroyed");
        self.deliver();
        self.unwatch();
    }

    fn unwatch(&self) {
        let Some(expression) = self.expression.borrow_mut().take() else {
            return;
        };
        tracing::debug!(expression = expression.type_name(), "unwatching");

        let sub = self.sub.borrow_mut().take();
        if let Some(sub) = sub {
            sub.unwatch();
        }

        if let Some(handler) = self.this_handler.take() {
            let this = self.this.as_ref().and_then(WeakObject::upgrade_for_teardown);
            if let Some(this) = this {
                this.disconnect_destroy(handler);
            }
        }

        let destroy = self.destroy.borrow_mut().take();
        if let Some(destroy) = destroy {
            destroy();
        }

        drop(expression);
        let keep_alive = self.keep_alive.borrow_mut().take();
        drop(keep_alive);
    }
}

/// Handle to a live subscription
///
/// Handles are cheap to clone. Dropping them does not remove the
/// subscription; call [`Watch::unwatch`], or let the context object die.
#[derive(Clone)]
pub struct Watch(Rc<WatchInner>);

impl Watch {
    /// Evaluate the watched expression with the watched context
    ///
    /// Fails with [`Error::Unwatched`] once the watch has been removed.
    pub fn evaluate(&self) -> Result<Value> {
        let expression = self.0.expression.borrow().clone().ok_or(Error::Unwatched)?;
        let this = self.this();
        expression.evaluate(this.as_ref())
    }

    /// Remove the subscription
    ///
    /// Tears down every sub-watch and the context listener, runs the destroy
    /// hook and releases the expression. Calling it again, or after the
    /// context has died, does nothing.
    pub fn unwatch(&self) {
        self.0.unwatch();
    }

    pub fn is_watching(&self) -> bool {
        self.0.is_watching()
    }

    /// The watched expression, while the watch is installed
    pub fn expression(&self) -> Option<Expression> {
        self.0.expression.borrow().clone()
    }

    /// The context object, if it had one and it is still alive
    pub fn this(&self) -> Option<Object> {
        self.0.this.as_ref().and_then(WeakObject::upgrade)
    }

    pub fn ptr_eq(&self, other: &Watch) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("expression", &*self.0.expression.borrow())
            .field("this", &self.0.this)
            .finish()
    }
}

impl Expression {
    /// Watch this expression for changes when evaluated with `this`
    ///
    /// `notify` is called whenever a later evaluation may produce a
    /// different value, and once more if `this` is destroyed, after which
    /// the watch removes itself.
    pub fn watch(&self, this: Option<&Object>, notify: impl Fn() + 'static) -> Watch {
        self.install(this, Rc::new(notify), None)
    }

    /// Like [`Expression::watch`], running `destroy` exactly once when the
    /// watch is removed
    pub fn watch_with_destroy(
        &self,
        this: Option<&Object>,
        notify: impl Fn() + 'static,
        destroy: impl FnOnce() + 'static,
    ) -> Watch {
        self.install(this, Rc::new(notify), Some(Box::new(destroy)))
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(expression = self.type_name(), watch_size = self.watch_size())
    )]
    fn install(
        &self,
        this: Option<&Object>,
        notify: Rc<dyn Fn()>,
        destroy: Option<DestroyHook>,
    ) -> Watch {
        let inner = Rc::new(WatchInner {
            expression: RefCell::new(Some(self.clone())),
            this: this.map(Object::downgrade),
            this_handler: Cell::new(None),
            notify,
            destroy: RefCell::new(destroy),
            sub: RefCell::new(None),
            keep_alive: RefCell::new(None),
        });
        let watch = Watch(Rc::clone(&inner));

        if let Some(this) = this.filter(|this| this.is_disposed()) {
            tracing::debug!(object = %this.id(), "context already disposed, watch not installed");
            inner.unwatch();
            return watch;
        }

        *inner.keep_alive.borrow_mut() = Some(Rc::clone(&inner));

        let weak: Weak<WatchInner> = Rc::downgrade(&inner);
        let sub = self.subwatch(
            inner.this.clone(),
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.deliver();
                }
            }),
        );
        *inner.sub.borrow_mut() = Some(sub);

        if let Some(this) = this {
            let weak = Rc::downgrade(&inner);
            let handler = this.connect_destroy(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.context_destroyed();
                }
            });
            inner.this_handler.set(Some(handler));
        }

        tracing::debug!("watch installed");
        watch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Class, ParamSpec, ValueType};
    use pretty_assertions::assert_eq;

    fn window_class() -> Class {
        Class::builder("Window")
            .property(ParamSpec::new("title", ValueType::String))
            .build()
            .unwrap()
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        (count, move || seen.set(seen.get() + 1))
    }

    #[test]
    fn test_watch_title() {
        let window = Object::new(&window_class());
        window.set_property("title", "Hi").unwrap();
        let expr = Expression::property(window.class(), None, "title").unwrap();

        let (count, notify) = counter();
        let watch = expr.watch(Some(&window), notify);
        assert_eq!(watch.evaluate().unwrap(), Value::from("Hi"));

        window.set_property("title", "Bye").unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(watch.evaluate().unwrap(), Value::from("Bye"));
        watch.unwatch();
    }

    #[test]
    fn test_watch_retains_expression() {
        let expr = Expression::constant(1i64);
        let watch = expr.watch(None, || {});
        assert_eq!(expr.ref_count(), 2);
        assert!(watch.expression().unwrap().ptr_eq(&expr));

        watch.unwatch();
        assert_eq!(expr.ref_count(), 1);
        assert!(watch.expression().is_none());
    }

    #[test]
    fn test_unwatch_twice() {
        let destroyed = Rc::new(Cell::new(0));
        let seen = Rc::clone(&destroyed);
        let watch = Expression::constant(1i64).watch_with_destroy(None, || {}, move || {
            seen.set(seen.get() + 1)
        });
        watch.unwatch();
        watch.unwatch();
        assert_eq!(destroyed.get(), 1);
        assert!(!watch.is_watching());
        assert_eq!(watch.evaluate(), Err(Error::Unwatched));
    }

    #[test]
    fn test_dropping_handle_keeps_watching() {
        let window = Object::new(&window_class());
        let expr = Expression::property(window.class(), None, "title").unwrap();
        let (count, notify) = counter();
        drop(expr.watch(Some(&window), notify));

        window.set_property("title", "Bye").unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_context_death_notifies_once_and_unwatches() {
        let window = Object::new(&window_class());
        let expr = Expression::property(window.class(), None, "title").unwrap();
        let (count, notify) = counter();
        let destroyed = Rc::new(Cell::new(false));
        let seen = Rc::clone(&destroyed);
        let watch = expr.watch_with_destroy(Some(&window), notify, move || seen.set(true));

        drop(window);
        assert_eq!(count.get(), 1);
        assert!(destroyed.get());
        assert!(!watch.is_watching());
        assert!(watch.this().is_none());

        watch.unwatch();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_watch_on_disposed_context() {
        let window = Object::new(&window_class());
        window.dispose();
        let destroyed = Rc::new(Cell::new(false));
        let seen = Rc::clone(&destroyed);
        let watch = Expression::constant(1i64).watch_with_destroy(
            Some(&window),
            || panic!("notified"),
            move || seen.set(true),
        );
        assert!(!watch.is_watching());
        assert!(destroyed.get());
    }

    #[test]
    fn test_unwatch_from_notify() {
        let window = Object::new(&window_class());
        let expr = Expression::property(window.class(), None, "title").unwrap();
        let slot: Rc<RefCell<Option<Watch>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));

        let inner_slot = Rc::clone(&slot);
        let seen = Rc::clone(&count);
        let watch = expr.watch(Some(&window), move || {
            seen.set(seen.get() + 1);
            if let Some(watch) = inner_slot.borrow().as_ref() {
                watch.unwatch();
            }
        });
        *slot.borrow_mut() = Some(watch.clone());

        window.set_property("title", "a").unwrap();
        window.set_property("title", "b").unwrap();
        assert_eq!(count.get(), 1);
        assert!(!watch.is_watching());
    }

    #[test]
    fn test_static_watch_never_fires() {
        let window = Object::new(&window_class());
        let expr = Expression::closure(
            ValueType::Int,
            [Expression::constant(2i64)],
            |args| args[1].as_int().map(|n| Value::Int(n * 2)),
        );
        let watch = expr.watch(Some(&window), || panic!("static watch fired"));
        window.set_property("title", "x").unwrap();
        assert_eq!(watch.evaluate().unwrap(), Value::Int(4));
        watch.unwatch();
    }
}
