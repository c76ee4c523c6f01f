//! Runtime support
//!
//! This module contains the core runtime types:
//! - String handling (RString)
//! - Objects, member tables and attributes
//! - Function and property objects
//! - The Operate dispatch and class protocol
//! - Array and Dictionary storage and structured output
//! - Synchronization helpers

pub mod array;
pub mod attribute;
pub mod class;
pub mod dictionary;
pub mod function;
pub mod object;
pub mod operate;
pub mod property;
pub mod string;
pub mod structured;
pub mod sync;

pub use attribute::{MemberAttribute, OperateFlags};
pub use class::{ClassInfo, CoreClasses};
pub use function::{Args, CallInfo, NO_ARGS};
pub use object::{ObjectRef, WeakObjectRef};
pub use operate::Dispatch;
pub use string::RString;
