//! Packages and import
//!
//! A package is a namespace object registered under a dotted path such as
//! `risse.lang`. Packages are either defined eagerly with
//! [`PackageManager::define`] or registered with a lazy initializer that runs
//! on first use. Importing copies the package's bindings into a target
//! object and marks them const.

use crate::engine::Engine;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::attribute::{MemberAttribute, Mutability, OperateFlags};
use crate::runtime::object::ObjectRef;
use crate::runtime::operate::{Dispatch, enum_members};
use crate::runtime::string::RString;
use crate::runtime::sync;
use crate::util::unicode::{is_id_continue, is_id_start};
use crate::value::Variant;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lazy package initializer; fills the namespace object it is given
pub type PackageInitializer = dyn Fn(&Engine, &ObjectRef) -> RtResult<()> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageState {
    Initializing,
    Ready,
}

struct Package {
    state: PackageState,
    namespace: ObjectRef,
}

/// Registry of packages
#[derive(Default)]
pub struct PackageManager {
    packages: Mutex<HashMap<String, Package>>,
    initializers: Mutex<HashMap<String, Arc<PackageInitializer>>>,
}

/// Check a dotted package path: non-empty identifier components
fn validate_path(path: &str) -> RtResult<()> {
    let valid = !path.is_empty()
        && path.split('.').all(|part| {
            let mut chars = part.chars();
            chars.next().is_some_and(is_id_start) && chars.all(is_id_continue)
        });
    if valid {
        Ok(())
    } else {
        Err(TemporaryException::illegal_argument(&format!("invalid package name \"{}\"", path)).into())
    }
}

impl PackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lazy initializer for `path`
    pub fn register<F>(&self, path: &str, initializer: F) -> RtResult<()>
    where
        F: Fn(&Engine, &ObjectRef) -> RtResult<()> + Send + Sync + 'static,
    {
        validate_path(path)?;
        sync::lock(&self.initializers).insert(path.to_string(), Arc::new(initializer));
        Ok(())
    }

    /// Define (or extend) a package by running `init` on its namespace
    ///
    /// Fails while the same package is still being initialized.
    pub fn define<F>(&self, engine: &Engine, path: &str, init: F) -> RtResult<ObjectRef>
    where
        F: FnOnce(&ObjectRef) -> RtResult<()>,
    {
        validate_path(path)?;
        let (namespace, created) = {
            let mut packages = sync::lock(&self.packages);
            match packages.get_mut(path) {
                Some(package) if package.state == PackageState::Initializing => {
                    return Err(TemporaryException::package_being_initialized(path).into());
                }
                Some(package) => {
                    package.state = PackageState::Initializing;
                    (package.namespace.clone(), false)
                }
                None => {
                    let namespace = engine.new_object();
                    packages.insert(
                        path.to_string(),
                        Package {
                            state: PackageState::Initializing,
                            namespace: namespace.clone(),
                        },
                    );
                    (namespace, true)
                }
            }
        };

        log::debug!("initializing package {}", path);
        let result = init(&namespace);

        let mut packages = sync::lock(&self.packages);
        match result {
            Ok(()) => {
                if let Some(package) = packages.get_mut(path) {
                    package.state = PackageState::Ready;
                }
                Ok(namespace)
            }
            // An extension that fails leaves the existing package usable
            Err(e) if !created => {
                if let Some(package) = packages.get_mut(path) {
                    package.state = PackageState::Ready;
                }
                Err(e)
            }
            Err(e) => {
                let removed = packages.remove(path);
                drop(packages);
                if let Some(package) = removed {
                    package.namespace.invalidate();
                }
                Err(e)
            }
        }
    }

    /// Namespace of a package, running its lazy initializer if needed
    pub fn namespace(&self, engine: &Engine, path: &str) -> RtResult<ObjectRef> {
        if let Some(package) = sync::lock(&self.packages).get(path) {
            return match package.state {
                PackageState::Ready => Ok(package.namespace.clone()),
                PackageState::Initializing => Err(TemporaryException::package_being_initialized(path).into()),
            };
        }
        let initializer = sync::lock(&self.initializers).get(path).cloned();
        match initializer {
            Some(initializer) => self.define(engine, path, |namespace| initializer(engine, namespace)),
            None => Err(TemporaryException::package_not_found(path).into()),
        }
    }

    /// Check if a package has been initialized
    pub fn is_loaded(&self, path: &str) -> bool {
        sync::lock(&self.packages)
            .get(path)
            .is_some_and(|p| p.state == PackageState::Ready)
    }

    /// Import bindings of `path` into `into`
    ///
    /// With `ids` of None every visible member is imported; otherwise only
    /// the named ones, and any that do not exist are reported together.
    /// Imported bindings are const.
    pub fn import(&self, engine: &Engine, path: &str, into: &Variant, ids: Option<&[&str]>) -> RtResult<()> {
        let namespace = self.namespace(engine, path)?;
        match ids {
            None => enum_members(
                engine,
                &Variant::object(namespace),
                OperateFlags::empty(),
                |name, _, value| {
                    bind_import(engine, into, name, value)?;
                    Ok(true)
                },
            ),
            Some(ids) => {
                let mut missing = Vec::new();
                for id in ids {
                    let name = RString::from(*id);
                    match namespace.own_value(&name) {
                        Some(value) => bind_import(engine, into, &name, &value)?,
                        None => missing.push(name),
                    }
                }
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(TemporaryException::cannot_import_ids(&missing).into())
                }
            }
        }
    }

    /// Invalidate every package namespace
    pub(crate) fn invalidate_all(&self) {
        let packages = std::mem::take(&mut *sync::lock(&self.packages));
        sync::lock(&self.initializers).clear();
        for (_, package) in packages {
            package.namespace.invalidate();
        }
    }
}

fn bind_import(engine: &Engine, into: &Variant, name: &RString, value: &Variant) -> RtResult<()> {
    if let Some(target) = into.as_object() {
        if target.own_value(name).is_some_and(|existing| existing.disc_equal(value)) {
            return Ok(());
        }
    }
    into.set_property_with(
        engine,
        name,
        value.clone(),
        OperateFlags::MEMBER_ENSURE | OperateFlags::INSTANCE_MEMBER_ONLY | OperateFlags::IGNORE_PROPERTY,
        MemberAttribute::unspecified(),
    )?;
    into.set_attribute(
        engine,
        name,
        MemberAttribute::unspecified().with_mutability(Mutability::Const),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_path_validation() {
        assert!(validate_path("risse.lang").is_ok());
        assert!(validate_path("a").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("a..b").is_err());
        assert!(validate_path("1abc").is_err());
    }

    #[test]
    fn test_lazy_initializer_runs_once() {
        let engine = Engine::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        engine
            .packages()
            .register("util.math", move |engine, namespace| {
                counter.fetch_add(1, Ordering::SeqCst);
                Variant::object(namespace.clone()).set_property(engine, "pi", 3.25)
            })
            .unwrap();
        assert!(!engine.packages().is_loaded("util.math"));

        let target = Variant::object(engine.new_object());
        engine.import("util.math", &target, None).unwrap();
        engine.import("util.math", &target, Some(&["pi"])).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(target.get_property(&engine, "pi").unwrap(), Variant::from(3.25));

        // imported bindings are const
        let err = target.set_property(&engine, "pi", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalMemberAccess);
    }

    #[test]
    fn test_missing_package_and_ids() {
        let engine = Engine::new();
        let target = Variant::object(engine.new_object());
        let err = engine.import("no.such", &target, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Import);
        assert_eq!(err.message(), "package \"no.such\" not found");

        engine
            .packages()
            .define(&engine, "demo", |namespace| {
                Variant::object(namespace.clone()).set_property(&engine, "a", 1)
            })
            .unwrap();
        let err = engine
            .import("demo", &target, Some(&["a", "b", "c"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Import);
        assert_eq!(err.message(), "one or more identifiers could not be imported: b, c");
        // the ones that exist were still imported
        assert_eq!(target.get_property(&engine, "a").unwrap(), Variant::from(1));
    }

    #[test]
    fn test_reentrant_definition_is_refused() {
        let engine = Engine::new();
        let err = engine
            .packages()
            .define(&engine, "cyclic", |_| {
                engine.packages().define(&engine, "cyclic", |_| Ok(())).map(|_| ())
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Import);
        assert_eq!(
            err.message(),
            "package \"cyclic\" is being initialized, cannot be imported"
        );
        assert!(!engine.packages().is_loaded("cyclic"));
    }

    #[test]
    fn test_failed_definition_rollback() {
        let engine = Engine::new();
        let packages = engine.packages();
        packages
            .define(&engine, "demo", |namespace| {
                Variant::object(namespace.clone()).set_property(&engine, "a", 1)
            })
            .unwrap();
        // extending a ready package and failing keeps it
        assert!(packages
            .define(&engine, "demo", |_| Err(TemporaryException::illegal_state("broken").into()))
            .is_err());
        assert!(packages.is_loaded("demo"));
        let target = Variant::object(engine.new_object());
        engine.import("demo", &target, None).unwrap();
        assert_eq!(target.get_property(&engine, "a").unwrap(), Variant::from(1));

        // a brand new package that fails is removed and its namespace invalidated
        let mut partial = None;
        assert!(packages
            .define(&engine, "fresh", |namespace| {
                partial = Some(namespace.clone());
                Err(TemporaryException::illegal_state("broken").into())
            })
            .is_err());
        assert!(!packages.is_loaded("fresh"));
        assert!(!partial.unwrap().is_valid());
        let err = engine.import("fresh", &target, None).unwrap_err();
        assert_eq!(err.message(), "package \"fresh\" not found");
    }

    #[test]
    fn test_wildcard_skips_hidden() {
        let engine = Engine::new();
        engine
            .packages()
            .define(&engine, "mixed", |namespace| {
                let ns = Variant::object(namespace.clone());
                ns.set_property(&engine, "visible", 1)?;
                ns.set_property_with(
                    &engine,
                    "internal",
                    2,
                    OperateFlags::MEMBER_ENSURE | OperateFlags::HIDDEN_MEMBER,
                    MemberAttribute::unspecified(),
                )
            })
            .unwrap();
        let target = Variant::object(engine.new_object());
        engine.import("mixed", &target, None).unwrap();
        assert!(target.get_property_or_void(&engine, "visible").unwrap().to_bool());
        assert!(target.get_property_or_void(&engine, "internal").unwrap().is_void());
    }
}
