//! Script-visible built-in classes
//!
//! [`Builtins::new`] creates every class that is not one of the four core
//! classes and binds its native members. It runs before the [`Engine`]
//! exists; native members reach the engine through their [`CallInfo`].
//!
//! [`Engine`]: crate::Engine
//! [`CallInfo`]: crate::runtime::function::CallInfo

pub mod array;
pub mod coroutine;
pub mod dictionary;
pub mod exception;
pub mod function;
pub mod object;
pub mod primitive;
pub mod thread;

use crate::runtime::attribute::MemberAttribute;
use crate::runtime::class::CoreClasses;
use crate::runtime::function::CallInfo;
use crate::runtime::object::{NativeClassId, NativeClassRegistry, ObjectRef};
use crate::value::{Variant, VariantType};

/// Ids of the native states attached by built-in classes
#[derive(Debug, Clone, Copy)]
pub struct NativeIds {
    pub array: NativeClassId,
    pub dictionary: NativeClassId,
    pub thread: NativeClassId,
    pub coroutine: NativeClassId,
}

/// The built-in classes of one engine
pub struct Builtins {
    pub ids: NativeIds,
    pub primitive_class: ObjectRef,
    pub number_class: ObjectRef,
    pub string_class: ObjectRef,
    pub integer_class: ObjectRef,
    pub real_class: ObjectRef,
    pub boolean_class: ObjectRef,
    pub void_class: ObjectRef,
    pub null_class: ObjectRef,
    pub array_class: ObjectRef,
    pub dictionary_class: ObjectRef,
    pub source_point_class: ObjectRef,
    pub thread_class: ObjectRef,
    pub coroutine_class: ObjectRef,
    exceptions: Vec<(&'static str, ObjectRef)>,
}

impl Builtins {
    /// Create and bind every built-in class
    pub fn new(core: &CoreClasses, registry: &NativeClassRegistry) -> Self {
        let ids = NativeIds {
            array: registry.register("Array"),
            dictionary: registry.register("Dictionary"),
            thread: registry.register("Thread"),
            coroutine: registry.register("Coroutine"),
        };

        object::register(core);
        function::register(core);

        let primitives = primitive::register(core);
        let array_class = array::register(core);
        let dictionary_class = dictionary::register(core);
        let (source_point_class, exceptions) = exception::register(core);
        let thread_class = thread::register(core);
        let coroutine_class = coroutine::register(core);

        Builtins {
            ids,
            primitive_class: primitives.primitive,
            number_class: primitives.number,
            string_class: primitives.string,
            integer_class: primitives.integer,
            real_class: primitives.real,
            boolean_class: primitives.boolean,
            void_class: primitives.void,
            null_class: primitives.null,
            array_class,
            dictionary_class,
            source_point_class,
            thread_class,
            coroutine_class,
            exceptions,
        }
    }

    /// Class whose members primitives of type `ty` respond with
    pub fn primitive_class(&self, ty: VariantType) -> Option<&ObjectRef> {
        match ty {
            VariantType::Void => Some(&self.void_class),
            VariantType::Null => Some(&self.null_class),
            VariantType::Boolean => Some(&self.boolean_class),
            VariantType::Integer => Some(&self.integer_class),
            VariantType::Real => Some(&self.real_class),
            VariantType::String => Some(&self.string_class),
            VariantType::Object => None,
        }
    }

    /// Exception class by name
    pub fn exception_class(&self, name: &str) -> Option<&ObjectRef> {
        self.exceptions
            .iter()
            .find(|(class_name, _)| *class_name == name)
            .map(|(_, class)| class)
    }

    /// Every built-in class
    pub fn classes(&self) -> Vec<ObjectRef> {
        let mut classes = vec![
            self.primitive_class.clone(),
            self.number_class.clone(),
            self.string_class.clone(),
            self.integer_class.clone(),
            self.real_class.clone(),
            self.boolean_class.clone(),
            self.void_class.clone(),
            self.null_class.clone(),
            self.array_class.clone(),
            self.dictionary_class.clone(),
            self.source_point_class.clone(),
            self.thread_class.clone(),
            self.coroutine_class.clone(),
        ];
        classes.extend(self.exceptions.iter().map(|(_, class)| class.clone()));
        classes
    }
}

/// Default attribute for bound members
pub(crate) const fn method() -> MemberAttribute {
    MemberAttribute::default_member()
}

/// A `construct` that attaches nothing
pub(crate) fn bind_empty_construct(core: &CoreClasses, class: &ObjectRef) {
    core.bind_function(class, "construct", method(), |_| Ok(Variant::Void));
}

/// An `initialize` that only chains to the superclass
pub(crate) fn bind_chained_initialize(core: &CoreClasses, class: &ObjectRef) {
    let defining = class.downgrade();
    core.bind_function(class, "initialize", method(), move |call: &CallInfo<'_>| {
        match defining.upgrade() {
            Some(class) => crate::runtime::class::call_super(call.engine, &class, "initialize", call.this, call.args),
            None => Ok(Variant::Void),
        }
    });
}
