//! Classes and instantiation
//!
//! A class is an object whose body is a [`ClassInfo`]. Instantiating a class
//! runs three steps:
//!
//! 1. ovulate: the nearest class in the chain with an ovulate hook creates
//!    the raw object (otherwise a plain object is made);
//! 2. fertilize: each class from the root down runs its own `construct`
//!    with the new object as `this`, attaching native state;
//! 3. initialize: the most derived `initialize` is called with the
//!    arguments given to `new`; it is responsible for calling its
//!    superclass's `initialize` (see [`call_super`]).
//!
//! [`CoreClasses`] builds the four classes everything else hangs off
//! (`Object`, `Class`, `Function`, `Property`) without needing an engine.

use crate::config::MemberTableConfig;
use crate::engine::Engine;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::attribute::{MemberAttribute, PropertyControl};
use crate::runtime::function::{
    Args, CallInfo, GetterFn, NO_ARGS, NativeFunction, NativeProperty, SetterFn,
};
use crate::runtime::object::{ObjectBody, ObjectRef, ObjectRegistry};
use crate::runtime::operate::{Dispatch, find_in_class_chain};
use crate::runtime::property::SymbolFlags;
use crate::runtime::string::RString;
use crate::value::Variant;
use std::fmt;
use std::sync::Arc;

/// Hook creating the raw instance of a class
pub type OvulateFn = dyn Fn(&Engine, &ObjectRef) -> RtResult<ObjectRef> + Send + Sync;

/// Class description carried by class objects
pub struct ClassInfo {
    name: RString,
    super_class: Option<ObjectRef>,
    instantiable: bool,
    extensible: bool,
    ovulate: Option<Arc<OvulateFn>>,
}

impl ClassInfo {
    pub fn new(name: impl Into<RString>, super_class: Option<ObjectRef>) -> Self {
        ClassInfo {
            name: name.into(),
            super_class,
            instantiable: true,
            extensible: true,
            ovulate: None,
        }
    }

    /// Forbid instantiation
    pub fn abstract_class(mut self) -> Self {
        self.instantiable = false;
        self
    }

    /// Forbid subclassing
    pub fn sealed(mut self) -> Self {
        self.extensible = false;
        self
    }

    /// Create raw instances with `ovulate`
    pub fn with_ovulate<F>(mut self, ovulate: F) -> Self
    where
        F: Fn(&Engine, &ObjectRef) -> RtResult<ObjectRef> + Send + Sync + 'static,
    {
        self.ovulate = Some(Arc::new(ovulate));
        self
    }

    #[inline]
    pub fn name(&self) -> &RString {
        &self.name
    }

    #[inline]
    pub fn super_class(&self) -> Option<&ObjectRef> {
        self.super_class.as_ref()
    }

    #[inline]
    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.extensible
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("super_class", &self.super_class)
            .field("instantiable", &self.instantiable)
            .field("extensible", &self.extensible)
            .finish()
    }
}

/// The classes created before anything else
pub struct CoreClasses {
    pub object_class: ObjectRef,
    pub class_class: ObjectRef,
    pub function_class: ObjectRef,
    pub property_class: ObjectRef,
    config: MemberTableConfig,
    objects: ObjectRegistry,
}

impl CoreClasses {
    /// Create `Object`, `Class`, `Function` and `Property`
    ///
    /// `Class` is an instance of itself and `Object` is an instance of
    /// `Class`; the resulting cycles are broken by invalidating the classes.
    pub fn bootstrap(config: &MemberTableConfig) -> Self {
        let object_class = ObjectRef::new(ObjectBody::Class(ClassInfo::new("Object", None)), None, config);
        let class_class = ObjectRef::new(
            ObjectBody::Class(ClassInfo::new("Class", Some(object_class.clone()))),
            None,
            config,
        );
        object_class.set_class(Some(class_class.clone()));
        class_class.set_class(Some(class_class.clone()));

        let function_class = ObjectRef::new(
            ObjectBody::Class(ClassInfo::new("Function", Some(object_class.clone())).abstract_class()),
            Some(class_class.clone()),
            config,
        );
        let property_class = ObjectRef::new(
            ObjectBody::Class(ClassInfo::new("Property", Some(object_class.clone())).abstract_class()),
            Some(class_class.clone()),
            config,
        );
        log::trace!("core classes bootstrapped");

        let objects = ObjectRegistry::new();
        for class in [&object_class, &class_class, &function_class, &property_class] {
            objects.track(class);
        }
        CoreClasses {
            object_class,
            class_class,
            function_class,
            property_class,
            config: *config,
            objects,
        }
    }

    /// Allocate and track an object
    fn alloc(&self, body: ObjectBody, class: &ObjectRef) -> ObjectRef {
        let object = ObjectRef::new(body, Some(class.clone()), &self.config);
        self.objects.track(&object);
        object
    }

    /// Every object created through these classes
    #[inline]
    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    /// Member table sizing used for new objects
    #[inline]
    pub fn config(&self) -> &MemberTableConfig {
        &self.config
    }

    /// Create a plain object of `class` without running constructors
    pub fn new_object(&self, class: &ObjectRef) -> ObjectRef {
        self.alloc(ObjectBody::Plain, class)
    }

    /// Create a class
    ///
    /// Fails when `info`'s superclass is not a class or is sealed.
    pub fn new_class(&self, info: ClassInfo) -> RtResult<ObjectRef> {
        if let Some(super_class) = info.super_class() {
            let Some(super_info) = super_class.class_info() else {
                return Err(TemporaryException::superclass_is_not_class().into());
            };
            if !super_info.is_extensible() {
                return Err(TemporaryException::non_extensible_superclass().into());
            }
        }
        log::trace!("new class {}", info.name());
        Ok(self.alloc(ObjectBody::Class(info), &self.class_class))
    }

    /// Create a class extending `super_class`, which is known to be extensible
    pub(crate) fn builtin_class(&self, name: &str, super_class: &ObjectRef) -> ObjectRef {
        self.alloc(
            ObjectBody::Class(ClassInfo::new(name, Some(super_class.clone()))),
            &self.class_class,
        )
    }

    /// Wrap a host closure as a function object
    pub fn new_function<F>(&self, name: impl Into<RString>, method: F) -> ObjectRef
    where
        F: Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync + 'static,
    {
        self.alloc(ObjectBody::Function(NativeFunction::new(name, method)), &self.function_class)
    }

    /// Wrap host accessors as a property object
    pub fn new_property(
        &self,
        name: impl Into<RString>,
        getter: Option<Arc<GetterFn>>,
        setter: Option<Arc<SetterFn>>,
    ) -> ObjectRef {
        self.alloc(
            ObjectBody::Property(NativeProperty::new(name, getter, setter)),
            &self.property_class,
        )
    }

    /// Bind a host method into a class
    ///
    /// The method is stored with a dynamic context so it binds to whichever
    /// instance it is read through.
    pub fn bind_function<F>(&self, class: &ObjectRef, name: &str, attribute: MemberAttribute, method: F)
    where
        F: Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync + 'static,
    {
        let function = self.new_function(name, method);
        log::trace!("bind {:?}.{}", class, name);
        class.define_member(name, Variant::dynamic(function), attribute, SymbolFlags::empty());
    }

    /// Bind host accessors into a class as a property member
    pub fn bind_property(
        &self,
        class: &ObjectRef,
        name: &str,
        attribute: MemberAttribute,
        getter: Option<Arc<GetterFn>>,
        setter: Option<Arc<SetterFn>>,
    ) {
        let property = self.new_property(name, getter, setter);
        log::trace!("bind property {:?}.{}", class, name);
        class.define_member(
            name,
            Variant::dynamic(property),
            attribute.with_property(PropertyControl::Property),
            SymbolFlags::empty(),
        );
    }

    /// Bind a read-only property
    pub fn bind_getter<G>(&self, class: &ObjectRef, name: &str, getter: G)
    where
        G: Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync + 'static,
    {
        self.bind_property(
            class,
            name,
            MemberAttribute::default_member(),
            Some(Arc::new(getter)),
            None,
        );
    }

    /// Bind a read/write property
    pub fn bind_accessors<G, S>(&self, class: &ObjectRef, name: &str, getter: G, setter: S)
    where
        G: Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync + 'static,
        S: Fn(&CallInfo<'_>, &Variant) -> RtResult<()> + Send + Sync + 'static,
    {
        self.bind_property(
            class,
            name,
            MemberAttribute::default_member(),
            Some(Arc::new(getter)),
            Some(Arc::new(setter)),
        );
    }

    /// Every core class
    pub fn all(&self) -> [&ObjectRef; 4] {
        [
            &self.object_class,
            &self.class_class,
            &self.function_class,
            &self.property_class,
        ]
    }
}

/// Create an instance of `class`: ovulate, fertilize, then initialize
pub fn instantiate(engine: &Engine, class: &ObjectRef, args: &Args) -> RtResult<Variant> {
    let Some(info) = class.class_info() else {
        return Err(TemporaryException::instance_from_non_class().into());
    };
    if !info.is_instantiable() {
        return Err(TemporaryException::cannot_instantiate().into());
    }

    let object = ovulate(engine, class)?;
    object.set_class(Some(class.clone()));
    fertilize(engine, class, &object)?;

    let instance = Variant::object(object);
    instance.invoke(engine, "initialize", args)?;
    Ok(instance)
}

/// Create the raw object through the nearest ovulate hook
fn ovulate(engine: &Engine, class: &ObjectRef) -> RtResult<ObjectRef> {
    let mut current = Some(class.clone());
    while let Some(c) = current {
        if let Some(hook) = c.class_info().and_then(|info| info.ovulate.clone()) {
            return hook(engine, class);
        }
        current = c.super_class();
    }
    Ok(engine.core().new_object(class))
}

/// Run every class's own `construct` on `object`, superclasses first
pub fn fertilize(engine: &Engine, class: &ObjectRef, object: &ObjectRef) -> RtResult<()> {
    if let Some(super_class) = class.super_class() {
        fertilize(engine, &super_class, object)?;
    }
    if let Some((construct, _)) = class.own_member(&RString::from("construct")) {
        construct.call_with_this(engine, Variant::object(object.clone()), &NO_ARGS)?;
    }
    Ok(())
}

/// Call the superclass's version of a method
///
/// `class` is the class defining the calling method; lookup starts at its
/// superclass.
pub fn call_super(
    engine: &Engine,
    class: &ObjectRef,
    name: &str,
    this: &Variant,
    args: &Args,
) -> RtResult<Variant> {
    let name = RString::from(name);
    match find_in_class_chain(class.super_class(), &name) {
        Some((method, _)) => method.call_with_this(engine, this.clone(), args),
        None => Ok(Variant::Void),
    }
}

/// Class of a value: its object class, or the built-in class of its primitive type
pub fn class_of(engine: &Engine, value: &Variant) -> Option<ObjectRef> {
    match value.as_object() {
        Some(object) => object.class(),
        None => engine.primitive_class(value.get_type()),
    }
}

/// Check if `value` is an instance of the class `target` or one of its subclasses
pub fn is_instance(engine: &Engine, value: &Variant, target: &Variant) -> bool {
    let Some(target) = target.as_object() else {
        return false;
    };
    let mut class = class_of(engine, value);
    while let Some(c) = class {
        if c.ptr_eq(target) {
            return true;
        }
        class = c.super_class();
    }
    false
}
