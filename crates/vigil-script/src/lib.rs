//! Vigil Script - RON class schemas
//!
//! Loads class definitions for the vigil object system from RON:
//! - Class definitions with an optional parent class
//! - Property definitions with type, access flags and default value
//! - Loader configuration
//!
//! Classes may be declared in any order and across any number of files;
//! [`Loader::finish`] resolves parents and builds a
//! [`ClassRegistry`](vigil_core::ClassRegistry).

mod config;
mod error;
mod loader;
mod schema;

pub use config::LoaderConfig;
pub use error::{Error, Result};
pub use loader::Loader;
pub use schema::class::{ClassDefs, PropertyDef};
pub use schema::ClassDef;
