//! Script engine
//!
//! The [`Engine`] owns everything that would otherwise be process-global:
//! the core classes, the built-in classes, the native class id registry,
//! the package manager and the global namespace. Several engines can live
//! side by side; cloning an engine is cheap and shares its state.

use crate::builtins::Builtins;
use crate::config::EngineConfig;
use crate::error::{EXCEPTION_PACKAGE, RtResult};
use crate::package::PackageManager;
use crate::parser;
use crate::runtime::array::ArrayInstance;
use crate::runtime::class::{ClassInfo, CoreClasses};
use crate::runtime::dictionary::DictionaryInstance;
use crate::runtime::function::{CallInfo, GetterFn, NO_ARGS, SetterFn};
use crate::runtime::object::{NativeClassRegistry, ObjectRef};
use crate::runtime::operate::Dispatch;
use crate::runtime::string::RString;
use crate::runtime::structured;
use crate::value::{Variant, VariantType};
use std::fmt;
use std::sync::Arc;

struct EngineInner {
    config: EngineConfig,
    native_ids: NativeClassRegistry,
    core: CoreClasses,
    builtins: Builtins,
    packages: PackageManager,
    global: ObjectRef,
}

/// Risse runtime instance
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine
    ///
    /// Bootstraps the core classes, registers the built-in classes into the
    /// `risse` package and imports that package into the global namespace.
    pub fn with_config(config: EngineConfig) -> Self {
        log::debug!("engine bootstrap");
        let native_ids = NativeClassRegistry::new();
        let core = CoreClasses::bootstrap(&config.member_table);
        let builtins = Builtins::new(&core, &native_ids);
        let global = core.new_object(&core.object_class);

        let engine = Engine {
            inner: Arc::new(EngineInner {
                config,
                native_ids,
                core,
                builtins,
                packages: PackageManager::new(),
                global,
            }),
        };
        if let Err(e) = engine.install_builtin_package() {
            log::error!("failed to install the {} package: {}", EXCEPTION_PACKAGE, e);
        }
        engine
    }

    fn install_builtin_package(&self) -> RtResult<()> {
        let classes = self.builtin_classes();
        self.packages().define(self, EXCEPTION_PACKAGE, |namespace| {
            for class in &classes {
                if let Some(name) = class.class_name() {
                    Variant::object(namespace.clone()).set_property(
                        self,
                        name,
                        Variant::object(class.clone()),
                    )?;
                }
            }
            Ok(())
        })?;
        self.import(EXCEPTION_PACKAGE, &Variant::object(self.global().clone()), None)
    }

    fn builtin_classes(&self) -> Vec<ObjectRef> {
        let mut classes: Vec<ObjectRef> = self.core().all().into_iter().cloned().collect();
        classes.extend(self.builtins().classes());
        classes
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[inline]
    pub fn core(&self) -> &CoreClasses {
        &self.inner.core
    }

    #[inline]
    pub fn builtins(&self) -> &Builtins {
        &self.inner.builtins
    }

    #[inline]
    pub fn native_ids(&self) -> &NativeClassRegistry {
        &self.inner.native_ids
    }

    #[inline]
    pub fn packages(&self) -> &PackageManager {
        &self.inner.packages
    }

    /// The global namespace object
    #[inline]
    pub fn global(&self) -> &ObjectRef {
        &self.inner.global
    }

    /// Check if two handles refer to the same engine
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a plain instance of `Object` without running constructors
    pub fn new_object(&self) -> ObjectRef {
        self.core().new_object(&self.core().object_class)
    }

    /// Wrap a host closure as a function object
    pub fn new_function<F>(&self, name: impl Into<RString>, method: F) -> ObjectRef
    where
        F: Fn(&CallInfo<'_>) -> RtResult<Variant> + Send + Sync + 'static,
    {
        self.core().new_function(name, method)
    }

    /// Wrap host accessors as a property object
    pub fn new_property(
        &self,
        name: impl Into<RString>,
        getter: Option<Arc<GetterFn>>,
        setter: Option<Arc<SetterFn>>,
    ) -> ObjectRef {
        self.core().new_property(name, getter, setter)
    }

    /// Create a class
    pub fn new_class(&self, info: ClassInfo) -> RtResult<ObjectRef> {
        self.core().new_class(info)
    }

    /// Create an Array holding `values`
    pub fn new_array(&self, values: Vec<Variant>) -> RtResult<Variant> {
        let array = Variant::object(self.builtins().array_class.clone()).create_new(self, &NO_ARGS)?;
        if let Some(state) = array.as_object().and_then(|o| self.array_state(o)) {
            state.lock().assign(values);
        }
        Ok(array)
    }

    /// Create a Dictionary holding `entries`
    pub fn new_dictionary(&self, entries: Vec<(RString, Variant)>) -> RtResult<Variant> {
        let dictionary =
            Variant::object(self.builtins().dictionary_class.clone()).create_new(self, &NO_ARGS)?;
        if let Some(state) = dictionary.as_object().and_then(|o| self.dictionary_state(o)) {
            let mut state = state.lock();
            for (key, value) in entries {
                state.set(key, value);
            }
        }
        Ok(dictionary)
    }

    /// Array state of `object`, if it is an Array
    pub fn array_state(&self, object: &ObjectRef) -> Option<Arc<ArrayInstance>> {
        object.native::<ArrayInstance>(self.builtins().ids.array)
    }

    /// Dictionary state of `object`, if it is a Dictionary
    pub fn dictionary_state(&self, object: &ObjectRef) -> Option<Arc<DictionaryInstance>> {
        object.native::<DictionaryInstance>(self.builtins().ids.dictionary)
    }

    /// Built-in class of a primitive type
    pub fn primitive_class(&self, ty: VariantType) -> Option<ObjectRef> {
        self.builtins().primitive_class(ty).cloned()
    }

    /// Exception class by name
    pub fn exception_class(&self, name: &str) -> Option<ObjectRef> {
        self.builtins().exception_class(name).cloned()
    }

    /// Look up a global binding
    pub fn global_value(&self, name: &str) -> Option<Variant> {
        self.global().own_value(&RString::from(name))
    }

    /// Import a package into `into`; `ids` of None imports every visible member
    pub fn import(&self, path: &str, into: &Variant, ids: Option<&[&str]>) -> RtResult<()> {
        self.packages().import(self, path, into, ids)
    }

    /// Serialise a value as structured data
    pub fn to_structured(&self, value: &Variant) -> RtResult<RString> {
        structured::to_structured_string(self, value)
    }

    /// Read a structured-data literal
    pub fn eval_structured(&self, source: &str) -> RtResult<Variant> {
        parser::parse_structured(self, source)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Engine({:p})", Arc::as_ptr(&self.inner))
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        log::debug!("engine teardown");
        // The class graph is cyclic (Class is its own class); invalidating
        // breaks the cycles so the classes are freed.
        self.global.invalidate();
        self.packages.invalidate_all();
        for class in self.builtins.classes() {
            class.invalidate();
        }
        for class in self.core.all() {
            class.invalidate();
        }
        // Anything left is kept alive only by a cycle or by a host handle
        self.core.objects().invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_engines_are_independent() {
        let a = Engine::new();
        let b = Engine::new();
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
        let class_a = a.global_value("Array").unwrap();
        let class_b = b.global_value("Array").unwrap();
        assert!(!class_a.disc_equal(&class_b));
    }

    #[test]
    fn test_builtins_are_imported_as_const() {
        let engine = Engine::new();
        let global = Variant::object(engine.global().clone());
        for name in ["Object", "Class", "Array", "Dictionary", "Exception", "Thread", "Coroutine"] {
            assert!(engine.global_value(name).is_some(), "{} missing", name);
        }
        let err = global.set_property(&engine, "Array", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalMemberAccess);
    }

    #[test]
    fn test_teardown_frees_classes() {
        let engine = Engine::new();
        let weak = engine.core().class_class.downgrade();
        let array_weak = engine.builtins().array_class.downgrade();
        drop(engine);
        assert!(weak.upgrade().is_none());
        assert!(array_weak.upgrade().is_none());
    }

    #[test]
    fn test_teardown_frees_cyclic_objects() {
        let engine = Engine::new();
        let array = engine.new_array(vec![Variant::from(1)]).unwrap();
        array.invoke(&engine, "push", &crate::runtime::function::Args::from([array.clone()]))
            .unwrap();
        let a = Variant::object(engine.new_object());
        let b = Variant::object(engine.new_object());
        a.set_property(&engine, "peer", b.clone()).unwrap();
        b.set_property(&engine, "peer", a.clone()).unwrap();

        let weak: Vec<_> = [&array, &a, &b]
            .iter()
            .map(|v| v.as_object().unwrap().downgrade())
            .collect();
        drop((array, a, b));
        assert!(weak.iter().all(|w| w.is_alive()));

        drop(engine);
        assert!(weak.iter().all(|w| !w.is_alive()));
    }

    #[test]
    fn test_exception_conversion() {
        let engine = Engine::new();
        let err = Variant::object(engine.new_object())
            .get_property(&engine, "missing")
            .unwrap_err();
        let exception = err.into_exception(&engine);
        let class = engine.exception_class("NoSuchMemberException").unwrap();
        assert!(exception.is_instance_of(&engine, &Variant::object(class)).unwrap());
        assert_eq!(
            exception.get_property(&engine, "message").unwrap(),
            Variant::from("member \"missing\" not found")
        );
    }
}
