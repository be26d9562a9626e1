//! Vigil Core - Observable expressions over a reflective object graph
//!
//! This crate provides:
//! - A small object system (`Class`, `ParamSpec`, `Object`) with typed
//!   properties, change notification and destroy tracking
//! - Dynamic values (`Value`, `ValueType`)
//! - Immutable, shared expression trees (`Expression`) that evaluate lazily
//!   against an optional context object
//! - Watches that report when a result may have changed
//! - Bindings that keep an object property in sync with an expression
//!
//! ## Example
//!
//! ```
//! use vigil_core::{Class, Expression, Object, ParamSpec, Value, ValueType};
//!
//! let window = Class::builder("Window")
//!     .property(ParamSpec::new("title", ValueType::String))
//!     .build()?;
//! let label = Class::builder("Label")
//!     .property(ParamSpec::new("text", ValueType::String))
//!     .build()?;
//!
//! let win = Object::new(&window);
//! let lbl = Object::new(&label);
//! win.set_property("title", "Hi")?;
//!
//! let title = Expression::property(&window, None, "title")?;
//! let _binding = title.bind(&lbl, "text", Some(&win))?;
//! win.set_property("title", "Bye")?;
//! assert_eq!(lbl.get_property("text")?, Value::from("Bye"));
//! # Ok::<(), vigil_core::Error>(())
//! ```
//!
//! Everything here is single-threaded; handles are `Rc`-based and `!Send`.

mod bind;
mod class;
mod error;
mod expr;
mod identity;
mod object;
mod value;
mod watch;

pub use class::{Class, ClassBuilder, ClassRegistry, ParamFlags, ParamSpec, OBJECT_TYPE_NAME};
pub use error::{Error, Result};
pub use expr::{Closure, Expression};
pub use identity::{HandlerId, ObjectId};
pub use object::{Object, WeakObject};
pub use value::{Value, ValueMap, ValueType};
pub use watch::Watch;
