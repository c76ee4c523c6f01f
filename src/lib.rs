//! Risse - the core runtime of the Risse scripting language
//!
//! Provides the value model and object system a script front end builds on.
//!
//! # Features
//! - Copy-on-write strings and a tagged `Variant` value
//! - A single `Operate` dispatch for member get/set/call/new/delete
//! - Classes with native instance state and construct/initialize chaining
//! - Array and Dictionary with structured-data output and a reader for it
//! - Threads, coroutines and per-object locks
//! - Lazily materialised exceptions with a class hierarchy
//!
//! # Example
//! ```
//! use risse::{Dispatch, Engine, Variant};
//!
//! let engine = Engine::new();
//! let array = engine.eval_structured("[1, 2, 3]").unwrap();
//! assert_eq!(array.get_property(&engine, "count").unwrap(), Variant::from(3));
//! ```

// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod package;
pub mod value;

// Structured-data reader
pub mod parser;

// Built-in classes
pub mod builtins;

// Runtime support
pub mod runtime;

// Utilities
pub mod util;

// Re-export main types
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ErrorKind, RtResult, RuntimeError, TemporaryException};
pub use runtime::{Args, Dispatch, ObjectRef, RString};
pub use value::Variant;
