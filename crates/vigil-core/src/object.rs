//! Objects: property storage, change notification and destruction tracking
//!
//! This is the reflective object system the expression engine observes.
//! Objects are single-threaded shared handles (`Rc`), so everything here is
//! `!Send`. Two signals are offered:
//!
//! - **notify**: emitted after a property value changes, optionally filtered
//!   to a single property name.
//! - **destroy**: emitted once when the object is disposed, either explicitly
//!   via [`Object::dispose`] or when the last handle is dropped. Destroy
//!   handlers never keep the object alive.
//!
//! Handlers are always invoked with no interior borrow held, so they may
//! freely read or write properties, connect or disconnect handlers, or
//! dispose other objects. A handler disconnected while an emission is in
//! progress is not called.

use crate::bind::Binding;
use crate::{Class, Error, HandlerId, ObjectId, ParamSpec, Result, Value, ValueMap};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type NotifyCallback = Rc<dyn Fn(&Object, &ParamSpec)>;
type DestroyCallback = Box<dyn FnOnce(ObjectId)>;

struct NotifyHandler {
    /// Property name filter, `None` to receive every change
    detail: Option<String>,
    callback: NotifyCallback,
}

pub(crate) struct ObjectInner {
    id: ObjectId,
    class: Class,
    properties: RefCell<ValueMap>,
    notify_handlers: RefCell<IndexMap<HandlerId, NotifyHandler>>,
    destroy_handlers: RefCell<IndexMap<HandlerId, DestroyCallback>>,
    /// Bindings writing into this object
    bindings: RefCell<Vec<Rc<Binding>>>,
    next_handler: Cell<u64>,
    disposed: Cell<bool>,
}

impl ObjectInner {
    fn next_handler_id(&self) -> HandlerId {
        let id = self.next_handler.get() + 1;
        self.next_handler.set(id);
        HandlerId::new(id)
    }

    fn run_dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        tracing::debug!(object = %self.id, class = self.class.name(), "disposing object");

        // Invalidate every binding before any handler runs, so nothing
        // writes into this object while it is being torn down.
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        for binding in &bindings {
            binding.invalidate();
        }

        loop {
            let next = self.destroy_handlers.borrow_mut().shift_remove_index(0);
            match next {
                Some((_, callback)) => callback(self.id),
                None => break,
            }
        }
        self.notify_handlers.borrow_mut().clear();

        for binding in bindings {
            binding.release_watch();
        }
    }
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        self.run_dispose();
    }
}

/// Shared handle to an object instance
///
/// Cloning an `Object` creates a new handle to the same instance; equality
/// is identity.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    /// Create an instance of `class` with every property at its default
    pub fn new(class: &Class) -> Self {
        let properties = class
            .list_properties()
            .iter()
            .map(|pspec| (pspec.name().to_string(), pspec.default_value().clone()))
            .collect();

        Object(Rc::new(ObjectInner {
            id: ObjectId::next(),
            class: class.clone(),
            properties: RefCell::new(properties),
            notify_handlers: RefCell::new(IndexMap::new()),
            destroy_handlers: RefCell::new(IndexMap::new()),
            bindings: RefCell::new(Vec::new()),
            next_handler: Cell::new(0),
            disposed: Cell::new(false),
        }))
    }

    /// Create an instance with initial property values
    ///
    /// This is the only way to set construct-only properties. No notify is
    /// emitted for initial values.
    pub fn with_properties<I, K, V>(class: &Class, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let object = Object::new(class);
        for (name, value) in values {
            let name = name.as_ref();
            let value = value.into();
            let pspec = object.find_property(name)?;
            if !pspec.is_writable() && !pspec.is_construct_only() {
                return Err(object.not_writable(&pspec));
            }
            check_type(&pspec, &value)?;
            object
                .0
                .properties
                .borrow_mut()
                .insert(pspec.name().to_string(), value);
        }
        Ok(object)
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn class(&self) -> &Class {
        &self.0.class
    }

    /// Name of this object's class
    pub fn type_name(&self) -> &str {
        self.0.class.name()
    }

    /// Check if this object's class is, or derives from, the named type
    pub fn is_a(&self, type_name: &str) -> bool {
        self.0.class.is_a(type_name)
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }

    /// Create a non-owning handle
    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    /// Check if two handles refer to the same instance
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn find_property(&self, name: &str) -> Result<Rc<ParamSpec>> {
        self.0
            .class
            .find_property(name)
            .ok_or_else(|| Error::PropertyNotFound {
                class: self.type_name().to_string(),
                property: name.to_string(),
            })
    }

    fn not_writable(&self, pspec: &ParamSpec) -> Error {
        Error::PropertyNotWritable {
            class: self.type_name().to_string(),
            property: pspec.name().to_string(),
        }
    }

    /// Read a property
    pub fn get_property(&self, name: &str) -> Result<Value> {
        let pspec = self.find_property(name)?;
        if !pspec.is_readable() {
            return Err(Error::PropertyNotReadable {
                class: self.type_name().to_string(),
                property: name.to_string(),
            });
        }
        Ok(self
            .0
            .properties
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| pspec.default_value().clone()))
    }

    /// Write a property and emit notify if the value changed
    ///
    /// Setting a value equal to the current one is a no-op.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let pspec = self.find_property(name)?;
        if self.is_disposed() {
            return Err(Error::ObjectDisposed(self.id()));
        }
        if !pspec.is_writable() {
            return Err(self.not_writable(&pspec));
        }
        check_type(&pspec, &value)?;

        let changed = {
            let mut properties = self.0.properties.borrow_mut();
            if properties.get(name) == Some(&value) {
                false
            } else {
                properties.insert(name.to_string(), value);
                true
            }
        };
        if changed {
            self.emit_notify(&pspec);
        }
        Ok(())
    }

    /// Emit notify for a property without changing it
    ///
    /// Used by objects whose property is derived from other state.
    pub fn notify(&self, name: &str) -> Result<()> {
        let pspec = self.find_property(name)?;
        self.emit_notify(&pspec);
        Ok(())
    }

    fn emit_notify(&self, pspec: &ParamSpec) {
        let ids: Vec<HandlerId> = self
            .0
            .notify_handlers
            .borrow()
            .iter()
            .filter(|(_, handler)| {
                handler
                    .detail
                    .as_deref()
                    .map_or(true, |detail| detail == pspec.name())
            })
            .map(|(id, _)| *id)
            .collect();

        tracing::trace!(
            object = %self.id(),
            property = pspec.name(),
            handlers = ids.len(),
            "notify"
        );
        for id in ids {
            let callback = self
                .0
                .notify_handlers
                .borrow()
                .get(&id)
                .map(|handler| Rc::clone(&handler.callback));
            if let Some(callback) = callback {
                callback(self, pspec);
            }
        }
    }

    /// Connect to the notify signal, for one property or for all of them
    pub fn connect_notify(
        &self,
        detail: Option<&str>,
        callback: impl Fn(&Object, &ParamSpec) + 'static,
    ) -> HandlerId {
        let id = self.0.next_handler_id();
        self.0.notify_handlers.borrow_mut().insert(
            id,
            NotifyHandler {
                detail: detail.map(str::to_string),
                callback: Rc::new(callback),
            },
        );
        id
    }

    /// Disconnect a notify handler; returns false if it was not connected
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let removed = self.0.notify_handlers.borrow_mut().shift_remove(&id);
        removed.is_some()
    }

    /// Register a one-shot callback run when this object is disposed
    ///
    /// The callback does not keep the object alive. Connecting to an object
    /// that is already disposed drops the callback without running it.
    pub fn connect_destroy(&self, callback: impl FnOnce(ObjectId) + 'static) -> HandlerId {
        let id = self.0.next_handler_id();
        if self.is_disposed() {
            tracing::trace!(object = %self.id(), "destroy handler on disposed object dropped");
            return id;
        }
        self.0
            .destroy_handlers
            .borrow_mut()
            .insert(id, Box::new(callback));
        id
    }

    /// Remove a destroy callback; returns false if it was not connected
    pub fn disconnect_destroy(&self, id: HandlerId) -> bool {
        let removed = self.0.destroy_handlers.borrow_mut().shift_remove(&id);
        removed.is_some()
    }

    /// Destroy this object
    ///
    /// Bindings targeting it stop writing, destroy handlers run in
    /// registration order, notify handlers are dropped. Weak handles stop
    /// upgrading. Disposing twice is a no-op.
    pub fn dispose(&self) {
        self.0.run_dispose();
    }

    /// Number of bindings currently writing into this object
    pub fn binding_count(&self) -> usize {
        self.0.bindings.borrow().len()
    }

    pub(crate) fn attach_binding(&self, binding: Rc<Binding>) {
        self.0.bindings.borrow_mut().push(binding);
    }

    pub(crate) fn detach_binding(&self, binding: &Binding) {
        let removed = {
            let mut bindings = self.0.bindings.borrow_mut();
            bindings
                .iter()
                .position(|b| std::ptr::eq(Rc::as_ptr(b), binding))
                .map(|index| bindings.remove(index))
        };
        drop(removed);
    }
}

fn check_type(pspec: &ParamSpec, value: &Value) -> Result<()> {
    if pspec.value_type().accepts(value) {
        Ok(())
    } else {
        Err(Error::InvalidValue {
            expected: pspec.value_type().to_string(),
            got: value.value_type().to_string(),
        })
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("class", &self.type_name())
            .finish()
    }
}

/// Non-owning handle to an object
///
/// Upgrading fails once the object has been disposed, even if strong
/// handles to it still exist.
#[derive(Clone, Default)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    /// Get a strong handle if the object is still alive
    pub fn upgrade(&self) -> Option<Object> {
        self.0
            .upgrade()
            .filter(|inner| !inner.disposed.get())
            .map(Object)
    }

    /// Like `upgrade`, but also reaches disposed objects that are still
    /// allocated; only for disconnecting handlers.
    pub(crate) fn upgrade_for_teardown(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }

    /// Check if the object is still alive
    pub fn is_alive(&self) -> bool {
        self.upgrade().is_some()
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(object) => f.debug_tuple("WeakObject").field(&object).finish(),
            None => write!(f, "WeakObject(<destroyed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueType;

    fn window_class() -> Class {
        Class::builder("Window")
            .property(ParamSpec::new("title", ValueType::String).with_default("Untitled"))
            .property(ParamSpec::new("width", ValueType::Int))
            .property(ParamSpec::new("handle", ValueType::Int).construct_only())
            .property(ParamSpec::new("mapped", ValueType::Bool).read_only())
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults_and_set() {
        let window = Object::new(&window_class());
        assert_eq!(window.get_property("title").unwrap(), Value::from("Untitled"));
        window.set_property("title", "Hi").unwrap();
        assert_eq!(window.get_property("title").unwrap(), Value::from("Hi"));
    }

    #[test]
    fn test_set_errors() {
        let window = Object::new(&window_class());
        assert!(matches!(
            window.set_property("nope", 1i64),
            Err(Error::PropertyNotFound { .. })
        ));
        assert!(matches!(
            window.set_property("width", "wide"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            window.set_property("handle", 3i64),
            Err(Error::PropertyNotWritable { .. })
        ));
        assert!(matches!(
            window.set_property("mapped", true),
            Err(Error::PropertyNotWritable { .. })
        ));
    }

    #[test]
    fn test_construct_only_at_construction() {
        let window =
            Object::with_properties(&window_class(), [("handle", 9i64), ("width", 640i64)])
                .unwrap();
        assert_eq!(window.get_property("handle").unwrap(), Value::Int(9));
        assert_eq!(window.get_property("width").unwrap(), Value::Int(640));

        let err = Object::with_properties(&window_class(), [("mapped", true)]).unwrap_err();
        assert!(matches!(err, Error::PropertyNotWritable { .. }));
    }

    #[test]
    fn test_notify_only_on_change() {
        let window = Object::new(&window_class());
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        window.connect_notify(Some("title"), move |_, pspec| {
            assert_eq!(pspec.name(), "title");
            seen.set(seen.get() + 1);
        });

        window.set_property("title", "A").unwrap();
        window.set_property("title", "A").unwrap();
        window.set_property("width", 5i64).unwrap();
        assert_eq!(count.get(), 1);

        window.notify("title").unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_handler_disconnected_during_emission_is_skipped() {
        let window = Object::new(&window_class());
        let second_ran = Rc::new(Cell::new(false));
        let second_id = Rc::new(Cell::new(None));

        let target = Rc::clone(&second_id);
        window.connect_notify(None, move |object, _| {
            if let Some(id) = target.get() {
                object.disconnect(id);
            }
        });
        let ran = Rc::clone(&second_ran);
        let id = window.connect_notify(None, move |_, _| ran.set(true));
        second_id.set(Some(id));

        window.set_property("width", 1i64).unwrap();
        assert!(!second_ran.get());
    }

    #[test]
    fn test_destroy_on_drop() {
        let window = Object::new(&window_class());
        let weak = window.downgrade();
        let destroyed = Rc::new(Cell::new(None));
        let slot = Rc::clone(&destroyed);
        let id = window.id();
        window.connect_destroy(move |object_id| slot.set(Some(object_id)));

        assert!(weak.is_alive());
        drop(window);
        assert_eq!(destroyed.get(), Some(id));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_explicit_dispose() {
        let window = Object::new(&window_class());
        let weak = window.downgrade();
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        window.connect_destroy(move |_| seen.set(seen.get() + 1));
        let removed = window.connect_destroy(|_| panic!("disconnected handler ran"));
        assert!(window.disconnect_destroy(removed));

        window.dispose();
        window.dispose();
        assert_eq!(count.get(), 1);
        assert!(window.is_disposed());
        assert!(weak.upgrade().is_none());
        assert!(matches!(
            window.set_property("width", 1i64),
            Err(Error::ObjectDisposed(_))
        ));

        // Connecting after disposal never fires
        window.connect_destroy(|_| panic!("handler on disposed object ran"));
    }
}
