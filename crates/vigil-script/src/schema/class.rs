//! Class definition schema

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use vigil_core::{ParamFlags, ParamSpec, Value, ValueType, OBJECT_TYPE_NAME};

/// Definition of a class (e.g., Widget, Window, Label)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Unique class name
    pub name: String,
    /// Parent class; none or `"Object"` for a root class
    #[serde(default)]
    pub parent: Option<String>,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Properties declared by this class
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

/// A file holding several class definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDefs {
    pub classes: Vec<ClassDef>,
}

/// Definition of a property on a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Property type
    pub value_type: ValueType,
    #[serde(default = "default_true")]
    pub readable: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
    /// Only settable while constructing the object
    #[serde(default)]
    pub construct_only: bool,
    /// Default value; the type's zero value when absent
    #[serde(default)]
    pub default: Option<Value>,
    /// Description
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

impl ClassDef {
    /// Create a new root class definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            description: String::new(),
            properties: Vec::new(),
        }
    }

    /// Set the parent class
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add a property definition
    pub fn with_property(mut self, prop: PropertyDef) -> Self {
        self.properties.push(prop);
        self
    }

    /// Parent class name, `None` for a root class
    pub fn parent_name(&self) -> Option<&str> {
        self.parent
            .as_deref()
            .filter(|parent| *parent != OBJECT_TYPE_NAME)
    }

    /// Check the definition on its own, without resolving other classes
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidSchema("class with empty name".to_string()));
        }
        if self.name == OBJECT_TYPE_NAME {
            return Err(Error::InvalidSchema(format!(
                "`{}` is the implicit root class and cannot be redefined",
                OBJECT_TYPE_NAME
            )));
        }
        for prop in &self.properties {
            if prop.name.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "class {} has a property with an empty name",
                    self.name
                )));
            }
            if !prop.readable && !prop.writable && !prop.construct_only {
                return Err(Error::InvalidSchema(format!(
                    "property {}.{} is neither readable nor writable",
                    self.name, prop.name
                )));
            }
        }
        Ok(())
    }
}

impl PropertyDef {
    /// Create a readable and writable property
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            readable: true,
            writable: true,
            construct_only: false,
            default: None,
            description: String::new(),
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn flags(&self) -> ParamFlags {
        let mut flags = ParamFlags::empty();
        if self.readable {
            flags |= ParamFlags::READABLE;
        }
        if self.writable || self.construct_only {
            flags |= ParamFlags::WRITABLE;
        }
        if self.construct_only {
            flags |= ParamFlags::CONSTRUCT_ONLY;
        }
        flags
    }

    /// Convert to a property descriptor
    pub fn to_param_spec(&self) -> ParamSpec {
        let pspec =
            ParamSpec::new(self.name.clone(), self.value_type.clone()).with_flags(self.flags());
        match &self.default {
            Some(value) => pspec.with_default(value.clone()),
            None => pspec,
        }
    }
}
