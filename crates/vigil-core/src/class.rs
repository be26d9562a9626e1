//! Classes and property descriptors
//!
//! A `Class` is the reflection half of the object system: it names a type,
//! links it to its parent and declares the properties its instances carry.
//! Expressions resolve property descriptors against classes when they are
//! built, so a lookup on a missing property fails at construction rather
//! than at evaluation.

use crate::{Error, Result, Value, ValueType};
use bitflags::bitflags;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Name of the root type every class derives from
pub const OBJECT_TYPE_NAME: &str = "Object";

bitflags! {
    /// Access flags of a property
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u8 {
        const READABLE = 1;
        const WRITABLE = 1 << 1;
        /// Only settable while the object is being constructed
        const CONSTRUCT_ONLY = 1 << 2;
        const READWRITE = Self::READABLE.bits() | Self::WRITABLE.bits();
    }
}

/// Descriptor of a single property: name, value type, owning class, access
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    value_type: ValueType,
    owner: String,
    flags: ParamFlags,
    default: Value,
}

impl ParamSpec {
    /// Create a readable and writable property with the type's default value
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let default = value_type.default_value();
        Self {
            name: name.into(),
            value_type,
            owner: String::new(),
            flags: ParamFlags::READWRITE,
            default,
        }
    }

    /// Replace the access flags
    pub fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Make this property read-only
    pub fn read_only(self) -> Self {
        self.with_flags(ParamFlags::READABLE)
    }

    /// Make this property settable only at construction
    pub fn construct_only(self) -> Self {
        self.with_flags(ParamFlags::READWRITE | ParamFlags::CONSTRUCT_ONLY)
    }

    /// Set a default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Name of the class that declared this property
    pub fn owner_type(&self) -> &str {
        &self.owner
    }

    pub fn flags(&self) -> ParamFlags {
        self.flags
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn is_readable(&self) -> bool {
        self.flags.contains(ParamFlags::READABLE)
    }

    /// Writable after construction
    pub fn is_writable(&self) -> bool {
        self.flags.contains(ParamFlags::WRITABLE) && !self.is_construct_only()
    }

    pub fn is_construct_only(&self) -> bool {
        self.flags.contains(ParamFlags::CONSTRUCT_ONLY)
    }
}

struct ClassInner {
    name: String,
    parent: Option<Class>,
    properties: IndexMap<String, Rc<ParamSpec>>,
}

/// A named object type with its property table
///
/// Cloning a `Class` is cheap; clones share the same definition.
#[derive(Clone)]
pub struct Class(Rc<ClassInner>);

impl Class {
    /// Start defining a class
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            parent: None,
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&Class> {
        self.0.parent.as_ref()
    }

    /// Iterate over this class and its ancestors, most derived first
    pub fn ancestors(&self) -> impl Iterator<Item = &Class> {
        std::iter::successors(Some(self), |class| class.parent())
    }

    /// Check if this class is, or derives from, the named type
    pub fn is_a(&self, type_name: &str) -> bool {
        type_name == OBJECT_TYPE_NAME || self.ancestors().any(|class| class.name() == type_name)
    }

    /// Find a property declared on this class or inherited from an ancestor
    pub fn find_property(&self, name: &str) -> Option<Rc<ParamSpec>> {
        self.ancestors()
            .find_map(|class| class.0.properties.get(name).cloned())
    }

    /// Properties declared by this class itself
    pub fn own_properties(&self) -> impl Iterator<Item = &Rc<ParamSpec>> {
        self.0.properties.values()
    }

    /// All properties, inherited ones first
    pub fn list_properties(&self) -> Vec<Rc<ParamSpec>> {
        let mut chain: Vec<&Class> = self.ancestors().collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|class| class.own_properties().cloned())
            .collect()
    }

    /// Check if two handles refer to the same class definition
    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name())
            .field("parent", &self.parent().map(Class::name))
            .field("properties", &self.0.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Class`]
pub struct ClassBuilder {
    name: String,
    parent: Option<Class>,
    properties: Vec<ParamSpec>,
}

impl ClassBuilder {
    /// Derive from `parent`
    pub fn parent(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Declare a property
    pub fn property(mut self, pspec: ParamSpec) -> Self {
        self.properties.push(pspec);
        self
    }

    /// Finish the class
    ///
    /// Fails if a property is declared twice (including over an inherited
    /// one) or its default value does not match its type.
    pub fn build(self) -> Result<Class> {
        let mut properties = IndexMap::new();
        for mut pspec in self.properties {
            let inherited = self
                .parent
                .as_ref()
                .and_then(|parent| parent.find_property(pspec.name()))
                .is_some();
            if inherited || properties.contains_key(pspec.name()) {
                return Err(Error::DuplicateProperty {
                    class: self.name,
                    property: pspec.name,
                });
            }
            if !pspec.value_type.accepts(&pspec.default) {
                return Err(Error::InvalidValue {
                    expected: pspec.value_type.to_string(),
                    got: pspec.default.value_type().to_string(),
                });
            }
            pspec.owner = self.name.clone();
            properties.insert(pspec.name.clone(), Rc::new(pspec));
        }

        Ok(Class(Rc::new(ClassInner {
            name: self.name,
            parent: self.parent,
            properties,
        })))
    }
}

/// Registry of classes by name, in registration order
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, Class>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; names must be unique
    pub fn register(&mut self, class: Class) -> Result<()> {
        if self.classes.contains_key(class.name()) {
            return Err(Error::DuplicateClass(class.name().to_string()));
        }
        self.classes.insert(class.name().to_string(), class);
        Ok(())
    }

    /// Register a class, replacing any class of the same name
    pub fn replace(&mut self, class: Class) -> Option<Class> {
        self.classes.insert(class.name().to_string(), class)
    }

    pub fn get(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    /// Look up a class, failing with [`Error::ClassNotFound`]
    pub fn lookup(&self, name: &str) -> Result<&Class> {
        self.get(name)
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> Class {
        Class::builder("Widget")
            .property(ParamSpec::new("visible", ValueType::Bool).with_default(true))
            .build()
            .unwrap()
    }

    #[test]
    fn test_inherited_property_lookup() {
        let widget = widget();
        let window = Class::builder("Window")
            .parent(&widget)
            .property(ParamSpec::new("title", ValueType::String))
            .build()
            .unwrap();

        let title = window.find_property("title").unwrap();
        assert_eq!(title.owner_type(), "Window");
        let visible = window.find_property("visible").unwrap();
        assert_eq!(visible.owner_type(), "Widget");
        assert!(window.find_property("missing").is_none());

        let names: Vec<_> = window
            .list_properties()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["visible", "title"]);
    }

    #[test]
    fn test_is_a() {
        let widget = widget();
        let window = Class::builder("Window").parent(&widget).build().unwrap();
        assert!(window.is_a("Window"));
        assert!(window.is_a("Widget"));
        assert!(window.is_a(OBJECT_TYPE_NAME));
        assert!(!widget.is_a("Window"));
    }

    #[test]
    fn test_flags() {
        let rw = ParamSpec::new("a", ValueType::Int);
        assert!(rw.is_readable() && rw.is_writable());
        let ro = ParamSpec::new("b", ValueType::Int).read_only();
        assert!(ro.is_readable() && !ro.is_writable());
        let co = ParamSpec::new("c", ValueType::Int).construct_only();
        assert!(co.is_construct_only() && !co.is_writable());
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let widget = widget();
        let err = Class::builder("Window")
            .parent(&widget)
            .property(ParamSpec::new("visible", ValueType::Bool))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty { .. }));
    }

    #[test]
    fn test_bad_default_rejected() {
        let err = Class::builder("Counter")
            .property(ParamSpec::new("count", ValueType::Int).with_default("zero"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn test_registry() {
        let mut registry = ClassRegistry::new();
        registry.register(widget()).unwrap();
        assert!(registry.contains("Widget"));
        assert!(matches!(
            registry.register(widget()),
            Err(Error::DuplicateClass(_))
        ));
        assert!(registry.replace(widget()).is_some());
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.lookup("Nope"),
            Err(Error::ClassNotFound(_))
        ));
    }
}
