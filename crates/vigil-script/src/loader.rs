//! RON class schema loader

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::schema::class::ClassDefs;
use crate::schema::ClassDef;
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use vigil_core::{Class, ClassRegistry, ValueType, OBJECT_TYPE_NAME};

/// Loader for RON class schemas
///
/// A schema file holds either a single class, or a `(classes: [...])` list.
/// Definitions accumulate across calls; [`Loader::finish`] builds them.
pub struct Loader {
    config: LoaderConfig,
    defs: IndexMap<String, ClassDef>,
}

impl Loader {
    /// Create a new loader with the default configuration
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        Self {
            config,
            defs: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load class definitions from a RON string
    ///
    /// Content with a `classes:` field is read as a list, anything else as a
    /// single class, so parse errors point at the shape that was meant.
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let defs = if content.contains("classes:") {
            ron::from_str::<ClassDefs>(content)?.classes
        } else {
            vec![ron::from_str::<ClassDef>(content)?]
        };
        for def in defs {
            self.add_def(def)?;
        }
        Ok(())
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        self.load_str(&content)?;
        tracing::debug!(path = %path.display(), classes = self.defs.len(), "loaded schema file");
        Ok(())
    }

    /// Load all RON files from a directory
    ///
    /// Files are read in name order. Subdirectories are visited when the
    /// configuration is recursive.
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for file_path in entries {
            if file_path.is_dir() {
                if self.config.recursive {
                    self.load_directory(&file_path)?;
                }
            } else if file_path.extension().is_some_and(|ext| ext == "ron") {
                self.load_file(&file_path)?;
            }
        }

        Ok(())
    }

    /// Add one class definition
    pub fn add_def(&mut self, def: ClassDef) -> Result<()> {
        def.validate()?;
        if self.defs.contains_key(&def.name) {
            if !self.config.allow_redefinition {
                return Err(Error::DuplicateDefinition(def.name));
            }
            tracing::debug!(class = %def.name, "class redefined");
        }
        self.defs.insert(def.name.clone(), def);
        Ok(())
    }

    /// Get the current definitions (for inspection during loading)
    pub fn defs(&self) -> &IndexMap<String, ClassDef> {
        &self.defs
    }

    /// Resolve parents and build every loaded class
    ///
    /// Classes are registered parents first, otherwise in load order.
    pub fn finish(self) -> Result<ClassRegistry> {
        let mut registry = ClassRegistry::new();
        let mut visiting = Vec::new();
        for name in self.defs.keys() {
            self.build(name, &mut registry, &mut visiting)?;
        }

        for class in registry.iter() {
            for pspec in class.own_properties() {
                if let ValueType::Object(target) = pspec.value_type() {
                    if target != OBJECT_TYPE_NAME && !registry.contains(target) {
                        return Err(Error::InvalidSchema(format!(
                            "property {}.{} refers to unknown class {}",
                            class.name(),
                            pspec.name(),
                            target
                        )));
                    }
                }
            }
        }

        tracing::debug!(classes = registry.len(), "class registry built");
        Ok(registry)
    }

    fn build(
        &self,
        name: &str,
        registry: &mut ClassRegistry,
        visiting: &mut Vec<String>,
    ) -> Result<Class> {
        if let Some(class) = registry.get(name) {
            return Ok(class.clone());
        }
        if visiting.iter().any(|visited| visited == name) {
            return Err(Error::InheritanceCycle(name.to_string()));
        }
        let def = self
            .defs
            .get(name)
            .ok_or_else(|| vigil_core::Error::ClassNotFound(name.to_string()))?;

        visiting.push(name.to_string());
        let parent = match def.parent_name() {
            None => None,
            Some(parent) if self.defs.contains_key(parent) => {
                Some(self.build(parent, registry, visiting)?)
            }
            Some(parent) => {
                return Err(Error::UnknownParent {
                    class: name.to_string(),
                    parent: parent.to_string(),
                })
            }
        };
        visiting.pop();

        let mut builder = Class::builder(name);
        if let Some(parent) = &parent {
            builder = builder.parent(parent);
        }
        for prop in &def.properties {
            builder = builder.property(prop.to_param_spec());
        }
        let class = builder.build()?;
        registry.register(class.clone())?;
        Ok(class)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
