//! Schema definitions for RON class files

pub mod class;

pub use class::ClassDef;
