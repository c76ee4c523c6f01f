//! Runtime error types
//!
//! Failures travel through two channels. Dispatch failures that can be
//! characterised where they happen are returned as [`RetCode`]s wrapped in
//! [`RuntimeError::Operate`]; everything else is raised as a
//! [`TemporaryException`], a token carrying the exception class name and
//! message arguments. Both are turned into real script exception objects
//! lazily, once an [`Engine`] is at hand ([`RuntimeError::into_exception`]).

use crate::engine::Engine;
use crate::runtime::operate::Dispatch;
use crate::runtime::string::RString;
use crate::value::Variant;
use std::fmt;

/// Result type of every fallible runtime operation
pub type RtResult<T> = Result<T, RuntimeError>;

/// Result code of a dispatch call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetCode {
    NoError,
    MemberNotFound,
    MemberIsReadOnly,
    MemberIsFinal,
    PropertyCannotBeRead,
    PropertyCannotBeWritten,
    NotImplemented,
    BadArgumentCount,
    InvalidObject,
    NativeStateCorrupted,
}

impl RetCode {
    /// Error kind this code is reported as
    pub fn kind(self) -> ErrorKind {
        match self {
            RetCode::NoError => ErrorKind::Exception,
            RetCode::MemberNotFound => ErrorKind::MemberNotFound,
            RetCode::MemberIsReadOnly
            | RetCode::MemberIsFinal
            | RetCode::PropertyCannotBeRead
            | RetCode::PropertyCannotBeWritten => ErrorKind::IllegalMemberAccess,
            RetCode::NotImplemented => ErrorKind::UnsupportedOperation,
            RetCode::BadArgumentCount => ErrorKind::BadArgumentCount,
            RetCode::InvalidObject => ErrorKind::InvalidObject,
            RetCode::NativeStateCorrupted => ErrorKind::BadContext,
        }
    }
}

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Exception,
    Runtime,
    Compile,
    Instantiation,
    BadContext,
    UnsupportedOperation,
    Arithmetic,
    IllegalArgument,
    NullObject,
    IllegalArgumentClass,
    BadArgumentCount,
    IllegalMemberAccess,
    MemberNotFound,
    IllegalState,
    InvalidObject,
    Coroutine,
    Io,
    CharConversion,
    Import,
    InaccessibleResource,
    /// A thrown value that is not an instance of a known exception class
    Script,
}

/// One row of the exception class table
#[derive(Debug, Clone, Copy)]
pub struct ExceptionClassInfo {
    pub kind: ErrorKind,
    pub class_name: &'static str,
    /// Superclass name; None means the root `Object` class
    pub parent: Option<&'static str>,
}

/// Package the exception classes are registered in
pub const EXCEPTION_PACKAGE: &str = "risse";

/// Exception classes, parents before children
pub const EXCEPTION_CLASSES: &[ExceptionClassInfo] = &[
    ExceptionClassInfo { kind: ErrorKind::Exception, class_name: "Throwable", parent: None },
    ExceptionClassInfo { kind: ErrorKind::Exception, class_name: "Exception", parent: Some("Throwable") },
    ExceptionClassInfo { kind: ErrorKind::Runtime, class_name: "RuntimeException", parent: Some("Exception") },
    ExceptionClassInfo { kind: ErrorKind::Compile, class_name: "CompileException", parent: Some("Exception") },
    ExceptionClassInfo { kind: ErrorKind::Import, class_name: "ImportException", parent: Some("Exception") },
    ExceptionClassInfo { kind: ErrorKind::Io, class_name: "IOException", parent: Some("Exception") },
    ExceptionClassInfo { kind: ErrorKind::CharConversion, class_name: "CharConversionException", parent: Some("IOException") },
    ExceptionClassInfo { kind: ErrorKind::Instantiation, class_name: "InstantiationException", parent: Some("RuntimeException") },
    ExceptionClassInfo { kind: ErrorKind::Instantiation, class_name: "ClassDefinitionException", parent: Some("InstantiationException") },
    ExceptionClassInfo { kind: ErrorKind::BadContext, class_name: "BadContextException", parent: Some("RuntimeException") },
    ExceptionClassInfo { kind: ErrorKind::UnsupportedOperation, class_name: "UnsupportedOperationException", parent: Some("RuntimeException") },
    ExceptionClassInfo { kind: ErrorKind::Arithmetic, class_name: "ArithmeticException", parent: Some("RuntimeException") },
    ExceptionClassInfo { kind: ErrorKind::IllegalArgument, class_name: "ArgumentException", parent: Some("RuntimeException") },
    ExceptionClassInfo { kind: ErrorKind::IllegalArgument, class_name: "IllegalArgumentException", parent: Some("ArgumentException") },
    ExceptionClassInfo { kind: ErrorKind::NullObject, class_name: "NullObjectException", parent: Some("ArgumentException") },
    ExceptionClassInfo { kind: ErrorKind::IllegalArgumentClass, class_name: "IllegalArgumentClassException", parent: Some("IllegalArgumentException") },
    ExceptionClassInfo { kind: ErrorKind::BadArgumentCount, class_name: "BadArgumentCountException", parent: Some("ArgumentException") },
    ExceptionClassInfo { kind: ErrorKind::IllegalMemberAccess, class_name: "MemberAccessException", parent: Some("RuntimeException") },
    ExceptionClassInfo { kind: ErrorKind::MemberNotFound, class_name: "NoSuchMemberException", parent: Some("MemberAccessException") },
    ExceptionClassInfo { kind: ErrorKind::IllegalMemberAccess, class_name: "IllegalMemberAccessException", parent: Some("MemberAccessException") },
    ExceptionClassInfo { kind: ErrorKind::IllegalState, class_name: "IllegalStateException", parent: Some("RuntimeException") },
    ExceptionClassInfo { kind: ErrorKind::InvalidObject, class_name: "InvalidObjectException", parent: Some("IllegalStateException") },
    ExceptionClassInfo { kind: ErrorKind::Coroutine, class_name: "CoroutineException", parent: Some("IllegalStateException") },
    ExceptionClassInfo { kind: ErrorKind::InaccessibleResource, class_name: "InaccessibleResourceException", parent: Some("RuntimeException") },
];

impl ErrorKind {
    /// Canonical exception class of this kind
    pub fn class_name(self) -> &'static str {
        EXCEPTION_CLASSES
            .iter()
            .find(|info| info.kind == self)
            .map(|info| info.class_name)
            .unwrap_or("Exception")
    }

    /// Kind of an exception class, by name
    pub fn from_class_name(name: &str) -> Option<ErrorKind> {
        EXCEPTION_CLASSES
            .iter()
            .find(|info| info.class_name == name)
            .map(|info| info.kind)
    }
}

/// Deferred exception
///
/// Created where no engine is reachable; converted into an instance of
/// `class_name` by [`RuntimeError::into_exception`].
#[derive(Debug, Clone, PartialEq)]
pub struct TemporaryException {
    pub kind: ErrorKind,
    pub class_name: &'static str,
    template: &'static str,
    args: Vec<RString>,
}

impl TemporaryException {
    /// Create an exception token of the kind's canonical class
    pub fn new(kind: ErrorKind, template: &'static str, args: Vec<RString>) -> Self {
        TemporaryException {
            kind,
            class_name: kind.class_name(),
            template,
            args,
        }
    }

    /// Create an exception token of an explicit class
    pub fn with_class(
        kind: ErrorKind,
        class_name: &'static str,
        template: &'static str,
        args: Vec<RString>,
    ) -> Self {
        TemporaryException {
            kind,
            class_name,
            template,
            args,
        }
    }

    /// Message with the template arguments expanded
    pub fn message(&self) -> RString {
        RString::format(self.template, &self.args)
    }

    /// Template arguments
    pub fn args(&self) -> &[RString] {
        &self.args
    }

    fn named(kind: ErrorKind, with_name: &'static str, without: &'static str, name: &RString) -> Self {
        if name.is_empty() {
            Self::new(kind, without, Vec::new())
        } else {
            Self::new(kind, with_name, vec![name.clone()])
        }
    }

    pub fn member_not_found(name: &RString) -> Self {
        Self::named(ErrorKind::MemberNotFound, "member \"%1\" not found", "member not found", name)
    }

    pub fn member_read_only(name: &RString) -> Self {
        Self::named(
            ErrorKind::IllegalMemberAccess,
            "member \"%1\" is read-only",
            "member is read-only",
            name,
        )
    }

    pub fn member_final(name: &RString) -> Self {
        Self::named(
            ErrorKind::IllegalMemberAccess,
            "member \"%1\" is final, cannot be overridden",
            "member is final, cannot be overridden",
            name,
        )
    }

    pub fn property_cannot_be_read(name: &RString) -> Self {
        Self::named(
            ErrorKind::IllegalMemberAccess,
            "property \"%1\" cannot be read",
            "property cannot be read",
            name,
        )
    }

    pub fn property_cannot_be_written(name: &RString) -> Self {
        Self::named(
            ErrorKind::IllegalMemberAccess,
            "property \"%1\" cannot be written",
            "property cannot be written",
            name,
        )
    }

    pub fn bad_argument_count(given: usize, expected: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::BadArgumentCount,
            "bad argument count (%1 given, but %2 expected)",
            vec![RString::from(given.to_string()), RString::from(expected.to_string())],
        )
    }

    pub fn bad_block_argument_count(given: usize, expected: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::BadArgumentCount,
            "bad block argument count (%1 given, but %2 expected)",
            vec![RString::from(given.to_string()), RString::from(expected.to_string())],
        )
    }

    pub fn not_implemented() -> Self {
        Self::new(ErrorKind::UnsupportedOperation, "operation is not implemented", Vec::new())
    }

    pub fn cannot_call_non_function() -> Self {
        Self::new(ErrorKind::UnsupportedOperation, "cannot call non-function object", Vec::new())
    }

    pub fn divide_by_zero() -> Self {
        Self::new(ErrorKind::Arithmetic, "attempt to divide by zero", Vec::new())
    }

    pub fn null_object() -> Self {
        Self::new(ErrorKind::NullObject, "null object was given", Vec::new())
    }

    pub fn illegal_argument(message: &str) -> Self {
        Self::new(ErrorKind::IllegalArgument, "%1", vec![RString::from(message)])
    }

    pub fn index_out_of_range(index: i64) -> Self {
        Self::new(
            ErrorKind::IllegalArgument,
            "index %1 is out of range",
            vec![RString::from(index.to_string())],
        )
    }

    pub fn illegal_argument_class(method: &RString, class_name: &RString) -> Self {
        Self::new(
            ErrorKind::IllegalArgumentClass,
            "cannot accept instance of class %2 as argument for method %1()",
            vec![method.clone(), class_name.clone()],
        )
    }

    pub fn specify_instance_of(class_name: &RString) -> Self {
        Self::new(
            ErrorKind::IllegalArgumentClass,
            "specify instance of class %1",
            vec![class_name.clone()],
        )
    }

    pub fn bad_context() -> Self {
        Self::new(
            ErrorKind::BadContext,
            "given context is not compatible with this method/property",
            Vec::new(),
        )
    }

    pub fn invalid_object() -> Self {
        Self::new(ErrorKind::InvalidObject, "object has been invalidated", Vec::new())
    }

    pub fn invalid_utf8() -> Self {
        Self::new(ErrorKind::CharConversion, "invalid UTF-8 string", Vec::new())
    }

    pub fn utf32_out_of_range() -> Self {
        Self::new(ErrorKind::CharConversion, "UTF-32 code out of range", Vec::new())
    }

    pub fn package_not_found(package: &str) -> Self {
        Self::new(ErrorKind::Import, "package \"%1\" not found", vec![RString::from(package)])
    }

    pub fn package_being_initialized(package: &str) -> Self {
        Self::new(
            ErrorKind::Import,
            "package \"%1\" is being initialized, cannot be imported",
            vec![RString::from(package)],
        )
    }

    pub fn cannot_import_ids(ids: &[RString]) -> Self {
        let list = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
        Self::new(
            ErrorKind::Import,
            "one or more identifiers could not be imported: %1",
            vec![RString::from(list)],
        )
    }

    pub fn non_extensible_superclass() -> Self {
        Self::with_class(
            ErrorKind::Instantiation,
            "ClassDefinitionException",
            "cannot create subclass of non-extensible superclass",
            Vec::new(),
        )
    }

    pub fn superclass_is_not_class() -> Self {
        Self::with_class(
            ErrorKind::Instantiation,
            "ClassDefinitionException",
            "the superclass is not a class",
            Vec::new(),
        )
    }

    pub fn instance_from_non_class() -> Self {
        Self::new(
            ErrorKind::Instantiation,
            "cannot create instance from non-class object",
            Vec::new(),
        )
    }

    pub fn cannot_instantiate() -> Self {
        Self::new(ErrorKind::Instantiation, "cannot create instance from this class", Vec::new())
    }

    pub fn too_many_native_instances() -> Self {
        Self::new(
            ErrorKind::Instantiation,
            "too many native instances are attached to the object",
            Vec::new(),
        )
    }

    pub fn could_not_create_coroutine() -> Self {
        Self::new(ErrorKind::Coroutine, "could not create coroutine", Vec::new())
    }

    pub fn coroutine_exited() -> Self {
        Self::new(ErrorKind::Coroutine, "coroutine has already exited", Vec::new())
    }

    pub fn coroutine_running() -> Self {
        Self::new(ErrorKind::Coroutine, "coroutine is currently running", Vec::new())
    }

    pub fn coroutine_not_started() -> Self {
        Self::new(ErrorKind::Coroutine, "coroutine has not started yet", Vec::new())
    }

    pub fn coroutine_not_running() -> Self {
        Self::new(ErrorKind::Coroutine, "coroutine is not running", Vec::new())
    }

    pub fn inaccessible_resource(what: &str) -> Self {
        Self::new(
            ErrorKind::InaccessibleResource,
            "%1 is no longer accessible",
            vec![RString::from(what)],
        )
    }

    pub fn illegal_state(message: &str) -> Self {
        Self::new(ErrorKind::IllegalState, "%1", vec![RString::from(message)])
    }

    pub fn compile_error(message: &str, position: usize) -> Self {
        Self::new(
            ErrorKind::Compile,
            "%1 at %2",
            vec![RString::from(message), RString::from(position.to_string())],
        )
    }
}

impl fmt::Display for TemporaryException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message())
    }
}

impl std::error::Error for TemporaryException {}

/// Error raised by a runtime operation
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Dispatch failure reported through the result-code channel
    Operate { code: RetCode, member: RString },
    /// Exception not yet converted into a script object
    Temporary(TemporaryException),
    /// A thrown script value (usually an exception instance)
    Thrown(Variant),
}

impl RuntimeError {
    /// Wrap a dispatch result code
    pub fn operate(code: RetCode, member: &RString) -> Self {
        RuntimeError::Operate {
            code,
            member: member.clone(),
        }
    }

    /// Kind of the error
    ///
    /// For thrown objects the class chain is searched for the nearest
    /// known exception class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Operate { code, .. } => code.kind(),
            RuntimeError::Temporary(e) => e.kind,
            RuntimeError::Thrown(value) => thrown_kind(value),
        }
    }

    /// Result code carried by the error, if it came from the result-code channel
    pub fn ret_code(&self) -> Option<RetCode> {
        match self {
            RuntimeError::Operate { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Convert a result code into its exception token
    pub fn to_temporary(&self) -> Option<TemporaryException> {
        match self {
            RuntimeError::Operate { code, member } => Some(code_exception(*code, member)),
            RuntimeError::Temporary(e) => Some(e.clone()),
            RuntimeError::Thrown(_) => None,
        }
    }

    /// Message text of the error
    pub fn message(&self) -> RString {
        match self {
            RuntimeError::Thrown(value) => thrown_message(value),
            _ => self
                .to_temporary()
                .map(|e| e.message())
                .unwrap_or_default(),
        }
    }

    /// Convert into a script exception value
    ///
    /// Looks the exception class up in the engine and instantiates it with
    /// the formatted message. If instantiation itself fails the message is
    /// returned as a plain string.
    pub fn into_exception(self, engine: &Engine) -> Variant {
        let temporary = match self {
            RuntimeError::Thrown(value) => return value,
            RuntimeError::Operate { code, member } => code_exception(code, &member),
            RuntimeError::Temporary(e) => e,
        };
        let message = temporary.message();
        let Some(class) = engine.exception_class(temporary.class_name) else {
            return Variant::String(message);
        };
        let args = crate::runtime::function::Args::from(vec![Variant::String(message.clone())]);
        match Variant::object(class).create_new(engine, &args) {
            Ok(exception) => exception,
            Err(e) => {
                log::warn!("failed to instantiate {}: {}", temporary.class_name, e);
                Variant::String(message)
            }
        }
    }

    /// Convert into a thrown exception value, keeping the error channel
    pub fn into_thrown(self, engine: &Engine) -> RuntimeError {
        RuntimeError::Thrown(self.into_exception(engine))
    }
}

fn code_exception(code: RetCode, member: &RString) -> TemporaryException {
    match code {
        RetCode::NoError => TemporaryException::new(ErrorKind::Exception, "no error", Vec::new()),
        RetCode::MemberNotFound => TemporaryException::member_not_found(member),
        RetCode::MemberIsReadOnly => TemporaryException::member_read_only(member),
        RetCode::MemberIsFinal => TemporaryException::member_final(member),
        RetCode::PropertyCannotBeRead => TemporaryException::property_cannot_be_read(member),
        RetCode::PropertyCannotBeWritten => TemporaryException::property_cannot_be_written(member),
        RetCode::NotImplemented => TemporaryException::not_implemented(),
        RetCode::BadArgumentCount => {
            TemporaryException::new(ErrorKind::BadArgumentCount, "bad argument count", Vec::new())
        }
        RetCode::InvalidObject => TemporaryException::invalid_object(),
        RetCode::NativeStateCorrupted => TemporaryException::bad_context(),
    }
}

fn thrown_kind(value: &Variant) -> ErrorKind {
    let Some(object) = value.as_object() else {
        return ErrorKind::Script;
    };
    let mut class = object.class();
    while let Some(c) = class {
        if let Some(kind) = c.class_name().and_then(|n| ErrorKind::from_class_name(&n.to_string())) {
            return kind;
        }
        class = c.super_class();
    }
    ErrorKind::Script
}

fn thrown_message(value: &Variant) -> RString {
    match value {
        Variant::Object(ov) => match ov.object.own_value(&RString::from("message")) {
            Some(Variant::String(message)) => message,
            _ => RString::from("(object)"),
        },
        other => RString::from(other.to_string()),
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Thrown(value) => {
                let class = value
                    .as_object()
                    .and_then(|o| o.class())
                    .and_then(|c| c.class_name());
                match class {
                    Some(name) => write!(f, "{}: {}", name, thrown_message(value)),
                    None => write!(f, "{}", thrown_message(value)),
                }
            }
            _ => match self.to_temporary() {
                Some(e) => write!(f, "{}", e),
                None => Ok(()),
            },
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<TemporaryException> for RuntimeError {
    fn from(e: TemporaryException) -> Self {
        RuntimeError::Temporary(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let name = RString::from("foo");
        assert_eq!(
            TemporaryException::member_not_found(&name).message(),
            "member \"foo\" not found"
        );
        assert_eq!(
            TemporaryException::member_not_found(&RString::empty()).message(),
            "member not found"
        );
        assert_eq!(
            TemporaryException::bad_argument_count(1, 2).message(),
            "bad argument count (1 given, but 2 expected)"
        );
        assert_eq!(
            TemporaryException::bad_block_argument_count(0, 1).message(),
            "bad block argument count (0 given, but 1 expected)"
        );
        assert_eq!(
            TemporaryException::illegal_argument_class(&RString::from("push"), &RString::from("Array"))
                .message(),
            "cannot accept instance of class Array as argument for method push()"
        );
    }

    #[test]
    fn test_ret_code_conversion() {
        let err = RuntimeError::operate(RetCode::MemberIsFinal, &RString::from("x"));
        assert_eq!(err.kind(), ErrorKind::IllegalMemberAccess);
        assert_eq!(err.ret_code(), Some(RetCode::MemberIsFinal));
        assert_eq!(
            err.to_string(),
            "IllegalMemberAccessException: member \"x\" is final, cannot be overridden"
        );
    }

    #[test]
    fn test_class_table() {
        assert_eq!(ErrorKind::MemberNotFound.class_name(), "NoSuchMemberException");
        assert_eq!(ErrorKind::from_class_name("ImportException"), Some(ErrorKind::Import));
        assert_eq!(ErrorKind::from_class_name("NoSuchClass"), None);
        // every parent is declared before its children
        for (i, info) in EXCEPTION_CLASSES.iter().enumerate() {
            if let Some(parent) = info.parent {
                assert!(EXCEPTION_CLASSES[..i].iter().any(|p| p.class_name == parent));
            }
        }
    }

    #[test]
    fn test_non_extensible_uses_class_definition_exception() {
        let e = TemporaryException::non_extensible_superclass();
        assert_eq!(e.kind, ErrorKind::Instantiation);
        assert_eq!(e.class_name, "ClassDefinitionException");
    }
}
