//! One-way bindings from expressions to object properties

use crate::{Error, Expression, Object, ParamSpec, Result, Watch, WeakObject};
use std::cell::RefCell;
use std::rc::Rc;

/// State of one binding, owned by its target object
pub(crate) struct Binding {
    /// Cleared once the target starts disposing
    target: RefCell<Option<WeakObject>>,
    pspec: Rc<ParamSpec>,
    watch: RefCell<Option<Watch>>,
}

impl Binding {
    /// Evaluate and write the result into the target
    fn update(&self) {
        let target = self.target.borrow().as_ref().and_then(WeakObject::upgrade);
        let Some(target) = target else {
            return;
        };
        let watch = self.watch.borrow().clone();
        let Some(watch) = watch else {
            return;
        };

        match watch.evaluate() {
            Ok(value) => {
                if let Err(err) = target.set_property(self.pspec.name(), value) {
                    tracing::warn!(
                        object = %target.id(),
                        property = self.pspec.name(),
                        error = %err,
                        "binding could not write value"
                    );
                }
            }
            Err(err) => {
                tracing::trace!(
                    property = self.pspec.name(),
                    error = %err,
                    "binding kept last value"
                );
            }
        }
    }

    pub(crate) fn invalidate(&self) {
        self.target.borrow_mut().take();
    }

    pub(crate) fn release_watch(&self) {
        let watch = self.watch.borrow_mut().take();
        if let Some(watch) = watch {
            watch.unwatch();
        }
    }

    /// The watch was removed by its owner or by context death
    fn watch_destroyed(&self) {
        let target = self.target.borrow_mut().take();
        if let Some(target) = target.as_ref().and_then(WeakObject::upgrade_for_teardown) {
            target.detach_binding(self);
        }
        let watch = self.watch.borrow_mut().take();
        drop(watch);
    }
}

impl Expression {
    /// Keep `property` on `target` equal to this expression evaluated with
    /// `this`
    ///
    /// The value is written once immediately and again on every change.
    /// When an evaluation fails the property keeps its last value. The
    /// binding ends when the returned watch is unwatched, when `this` dies,
    /// or when `target` is disposed.
    pub fn bind(self, target: &Object, property: &str, this: Option<&Object>) -> Result<Watch> {
        let Some(pspec) = target.class().find_property(property) else {
            tracing::warn!(
                class = target.type_name(),
                property,
                "cannot bind to a property that does not exist"
            );
            return Err(Error::PropertyNotFound {
                class: target.type_name().to_string(),
                property: property.to_string(),
            });
        };
        if !pspec.is_writable() {
            tracing::warn!(
                class = target.type_name(),
                property,
                "cannot bind to a property that is not writable"
            );
            return Err(Error::PropertyNotWritable {
                class: target.type_name().to_string(),
                property: property.to_string(),
            });
        }
        if target.is_disposed() {
            return Err(Error::ObjectDisposed(target.id()));
        }

        let binding = Rc::new(Binding {
            target: RefCell::new(Some(target.downgrade())),
            pspec,
            watch: RefCell::new(None),
        });

        let on_notify = Rc::downgrade(&binding);
        let on_destroy = Rc::downgrade(&binding);
        let watch = self.watch_with_destroy(
            this,
            move || {
                if let Some(binding) = on_notify.upgrade() {
                    binding.update();
                }
            },
            move || {
                if let Some(binding) = on_destroy.upgrade() {
                    binding.watch_destroyed();
                }
            },
        );

        if watch.is_watching() {
            *binding.watch.borrow_mut() = Some(watch.clone());
            target.attach_binding(Rc::clone(&binding));
            binding.update();
        }
        Ok(watch)
    }
}
