//! Native function and property adapters
//!
//! Host code is exposed to scripts as objects whose body is a
//! [`NativeFunction`] or a [`NativeProperty`]. Both receive a [`CallInfo`]
//! describing the engine, the resolved `this` and the arguments.

use crate::engine::Engine;
use crate::error::{RetCode, RtResult, RuntimeError, TemporaryException};
use crate::runtime::attribute::OperateFlags;
use crate::runtime::object::{NativeClassId, ObjectRef};
use crate::runtime::string::RString;
use crate::value::Variant;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

static VOID: Variant = Variant::Void;

/// Empty argument list
pub static NO_ARGS: Args = Args::new();

/// Call arguments
///
/// Ordinary arguments and block arguments are kept apart and counted
/// separately.
#[derive(Debug, Clone, Default)]
pub struct Args {
    args: Vec<Variant>,
    block: Vec<Variant>,
}

impl Args {
    /// Empty argument list
    pub const fn new() -> Self {
        Args {
            args: Vec::new(),
            block: Vec::new(),
        }
    }

    /// Arguments with block arguments
    pub fn with_block(args: Vec<Variant>, block: Vec<Variant>) -> Self {
        Args { args, block }
    }

    /// Number of ordinary arguments
    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Ordinary argument, or void when missing
    #[inline]
    pub fn get(&self, index: usize) -> &Variant {
        self.args.get(index).unwrap_or(&VOID)
    }

    /// Ordinary argument, if given
    #[inline]
    pub fn arg(&self, index: usize) -> Option<&Variant> {
        self.args.get(index)
    }

    /// Ordinary arguments
    #[inline]
    pub fn as_slice(&self) -> &[Variant] {
        &self.args
    }

    /// Number of block arguments
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block.len()
    }

    /// Block argument, or void when missing
    #[inline]
    pub fn block(&self, index: usize) -> &Variant {
        self.block.get(index).unwrap_or(&VOID)
    }

    /// Require between `min` and `max` (inclusive) ordinary arguments
    pub fn expect_count(&self, min: usize, max: Option<usize>) -> RtResult<()> {
        let given = self.args.len();
        if given < min || max.is_some_and(|max| given > max) {
            return Err(TemporaryException::bad_argument_count(given, expected(min, max)).into());
        }
        Ok(())
    }

    /// Require between `min` and `max` (inclusive) block arguments
    pub fn expect_block_count(&self, min: usize, max: Option<usize>) -> RtResult<()> {
        let given = self.block.len();
        if given < min || max.is_some_and(|max| given > max) {
            return Err(TemporaryException::bad_block_argument_count(given, expected(min, max)).into());
        }
        Ok(())
    }
}

fn expected(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{}..{}", min, max),
        None => format!("at least {}", min),
    }
}

impl From<Vec<Variant>> for Args {
    fn from(args: Vec<Variant>) -> Self {
        Args {
            args,
            block: Vec::new(),
        }
    }
}

impl<const N: usize> From<[Variant; N]> for Args {
    fn from(args: [Variant; N]) -> Self {
        Args::from(Vec::from(args))
    }
}

/// Everything a native method gets to see about its call
pub struct CallInfo<'a> {
    pub engine: &'a Engine,
    /// Resolved `this`
    pub this: &'a Variant,
    pub args: &'a Args,
    pub flags: OperateFlags,
}

impl<'a> CallInfo<'a> {
    pub fn new(engine: &'a Engine, this: &'a Variant, args: &'a Args) -> Self {
        CallInfo {
            engine,
            this,
            args,
            flags: OperateFlags::empty(),
        }
    }

    /// Ordinary argument, or void when missing
    #[inline]
    pub fn arg(&self, index: usize) -> &Variant {
        self.args.get(index)
    }

    /// `this` as an object
    pub fn this_object(&self) -> RtResult<&ObjectRef> {
        self.this
            .as_object()
            .ok_or_else(|| TemporaryException::bad_context().into())
    }

    /// Native state of `this` registered under `id`
    ///
    /// Fails when `this` does not carry that native state, e.g. a method
    /// called on an instance of an unrelated class.
    pub fn native<T: Any + Send + Sync>(&self, id: NativeClassId) -> RtResult<Arc<T>> {
        self.this_object()?
            .native::<T>(id)
            .ok_or_else(|| RuntimeError::operate(RetCode::NativeStateCorrupted, &RString::empty()))
    }
}

/// Signature of native methods
pub type MethodFn = dyn Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync;

/// Signature of native property getters
pub type GetterFn = dyn Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync;

/// Signature of native property setters
pub type SetterFn = dyn Fn(&CallInfo<'_>, &Variant) -> RtResult<()> + Send + Sync;

/// Host function
#[derive(Clone)]
pub struct NativeFunction {
    name: RString,
    method: Arc<MethodFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<RString>, method: F) -> Self
    where
        F: Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync + 'static,
    {
        NativeFunction {
            name: name.into(),
            method: Arc::new(method),
        }
    }

    #[inline]
    pub fn name(&self) -> &RString {
        &self.name
    }

    /// Invoke the function
    pub fn call(&self, engine: &Engine, this: &Variant, args: &Args, flags: OperateFlags) -> RtResult<Variant> {
        let info = CallInfo {
            engine,
            this,
            args,
            flags,
        };
        (self.method)(&info)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// Host property
#[derive(Clone)]
pub struct NativeProperty {
    name: RString,
    getter: Option<Arc<GetterFn>>,
    setter: Option<Arc<SetterFn>>,
}

impl NativeProperty {
    pub fn new(name: impl Into<RString>, getter: Option<Arc<GetterFn>>, setter: Option<Arc<SetterFn>>) -> Self {
        NativeProperty {
            name: name.into(),
            getter,
            setter,
        }
    }

    #[inline]
    pub fn name(&self) -> &RString {
        &self.name
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the property
    pub fn get(&self, engine: &Engine, this: &Variant) -> RtResult<Variant> {
        let Some(getter) = &self.getter else {
            return Err(RuntimeError::operate(RetCode::PropertyCannotBeRead, &self.name));
        };
        getter(&CallInfo::new(engine, this, &NO_ARGS))
    }

    /// Write the property
    pub fn set(&self, engine: &Engine, this: &Variant, value: &Variant) -> RtResult<()> {
        let Some(setter) = &self.setter else {
            return Err(RuntimeError::operate(RetCode::PropertyCannotBeWritten, &self.name));
        };
        setter(&CallInfo::new(engine, this, &NO_ARGS), value)
    }
}

impl fmt::Debug for NativeProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NativeProperty({}, get={}, set={})",
            self.name,
            self.is_readable(),
            self.is_writable()
        )
    }
}
