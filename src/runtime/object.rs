//! Risse object representation
//!
//! An [`Object`] is a member table plus a class link, up to
//! [`MAX_NATIVE_INSTANCES`] native-state slots, a validity flag and a
//! reentrant lock. What an object does when it is itself called, read or
//! instantiated is decided by its [`ObjectBody`].
//!
//! Objects are shared through [`ObjectRef`] (strong) and [`WeakObjectRef`]
//! (used for bound contexts). [`ObjectRef::invalidate`] clears the member
//! table, the native slots and the class link, which breaks reference cycles
//! running through the object.

use crate::config::MemberTableConfig;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::attribute::MemberAttribute;
use crate::runtime::class::ClassInfo;
use crate::runtime::function::{NativeFunction, NativeProperty};
use crate::runtime::property::{MemberTable, SymbolFlags};
use crate::runtime::string::RString;
use crate::runtime::sync::{self, CriticalSection, Synchronizer};
use crate::value::Variant;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Maximum number of native-state slots per object
pub const MAX_NATIVE_INSTANCES: usize = 4;

/// Identifier of a native class, used to key native-state slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeClassId(u32);

impl NativeClassId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Registry handing out native class ids
///
/// The same name always maps to the same id.
#[derive(Debug, Default)]
pub struct NativeClassRegistry {
    next: AtomicU32,
    ids: Mutex<HashMap<String, NativeClassId>>,
}

impl NativeClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or allocate the id of a native class
    pub fn register(&self, name: &str) -> NativeClassId {
        let mut ids = sync::lock(&self.ids);
        *ids.entry(name.to_string())
            .or_insert_with(|| NativeClassId(self.next.fetch_add(1, Ordering::Relaxed) + 1))
    }

    /// Look up the id of a registered native class
    pub fn lookup(&self, name: &str) -> Option<NativeClassId> {
        sync::lock(&self.ids).get(name).copied()
    }
}

/// Entries the object registry holds before its first prune
const REGISTRY_PRUNE_MIN: usize = 256;

#[derive(Default)]
struct RegistryInner {
    objects: Vec<WeakObjectRef>,
    prune_at: usize,
}

/// Weak list of every object an engine created
///
/// Objects caught in reference cycles are never dropped by counting alone;
/// invalidating the survivors when the engine goes away breaks those cycles.
#[derive(Default)]
pub struct ObjectRegistry {
    inner: Mutex<RegistryInner>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created object
    pub fn track(&self, object: &ObjectRef) {
        let mut inner = sync::lock(&self.inner);
        inner.objects.push(object.downgrade());
        if inner.objects.len() >= inner.prune_at.max(REGISTRY_PRUNE_MIN) {
            inner.objects.retain(WeakObjectRef::is_alive);
            inner.prune_at = inner.objects.len() * 2;
        }
    }

    /// Number of tracked objects that are still alive
    pub fn live_count(&self) -> usize {
        sync::lock(&self.inner)
            .objects
            .iter()
            .filter(|o| o.is_alive())
            .count()
    }

    /// Invalidate every object still alive and forget them all
    pub fn invalidate_all(&self) {
        let objects = std::mem::take(&mut sync::lock(&self.inner).objects);
        // Hold every survivor while invalidating so none is freed mid-walk
        let survivors: Vec<ObjectRef> = objects.iter().filter_map(WeakObjectRef::upgrade).collect();
        log::debug!("invalidating {} surviving objects", survivors.len());
        for object in &survivors {
            object.invalidate();
        }
    }
}

/// Per-object native state
type NativeSlot = (NativeClassId, Arc<dyn Any + Send + Sync>);

/// What an object does when it is operated on directly
pub enum ObjectBody {
    /// Ordinary object; only its members respond
    Plain,
    /// A class
    Class(ClassInfo),
    /// A host function
    Function(NativeFunction),
    /// A host property (getter/setter pair)
    Property(NativeProperty),
}

/// Risse object
pub struct Object {
    body: ObjectBody,
    class: RwLock<Option<ObjectRef>>,
    members: RwLock<MemberTable>,
    natives: RwLock<Vec<NativeSlot>>,
    valid: AtomicBool,
    cs: CriticalSection,
}

/// Strong reference to an object
#[derive(Clone)]
pub struct ObjectRef(Arc<Object>);

/// Weak reference to an object
#[derive(Clone)]
pub struct WeakObjectRef(Weak<Object>);

impl ObjectRef {
    /// Create an object
    pub fn new(body: ObjectBody, class: Option<ObjectRef>, config: &MemberTableConfig) -> Self {
        ObjectRef(Arc::new(Object {
            body,
            class: RwLock::new(class),
            members: RwLock::new(MemberTable::with_config(config)),
            natives: RwLock::new(Vec::new()),
            valid: AtomicBool::new(true),
            cs: CriticalSection::new(),
        }))
    }

    /// Check if two references point to the same object
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity of the object
    #[inline]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Create a weak reference
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    #[inline]
    pub fn body(&self) -> &ObjectBody {
        &self.0.body
    }

    /// Class description, if this object is a class
    pub fn class_info(&self) -> Option<&ClassInfo> {
        match &self.0.body {
            ObjectBody::Class(info) => Some(info),
            _ => None,
        }
    }

    /// Check if this object is a class
    #[inline]
    pub fn is_class(&self) -> bool {
        self.class_info().is_some()
    }

    /// Name of this class, if this object is a class
    pub fn class_name(&self) -> Option<RString> {
        self.class_info().map(|info| info.name().clone())
    }

    /// Superclass, if this object is a class with one
    pub fn super_class(&self) -> Option<ObjectRef> {
        self.class_info().and_then(|info| info.super_class().cloned())
    }

    /// The class this object is an instance of
    pub fn class(&self) -> Option<ObjectRef> {
        sync::read(&self.0.class).clone()
    }

    /// Change the class this object is an instance of
    pub fn set_class(&self, class: Option<ObjectRef>) {
        *sync::write(&self.0.class) = class;
    }

    /// Check if the object has not been invalidated
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.valid.load(Ordering::Acquire)
    }

    /// Invalidate the object
    ///
    /// Drops its members, native state and class link. Returns true only for
    /// the call that actually performed the invalidation.
    pub fn invalidate(&self) -> bool {
        if !self.0.valid.swap(false, Ordering::AcqRel) {
            return false;
        }
        let _sync = self.synchronize();
        // Move the contents out so their destructors run without our locks held
        let members = std::mem::take(&mut *self.members_mut());
        let natives = std::mem::take(&mut *sync::write(&self.0.natives));
        let class = sync::write(&self.0.class).take();
        log::trace!("invalidated {:?}", self);
        drop(members);
        drop(natives);
        drop(class);
        true
    }

    /// Read access to the member table
    ///
    /// The guard must not be held across calls back into the runtime.
    pub fn members(&self) -> RwLockReadGuard<'_, MemberTable> {
        sync::read(&self.0.members)
    }

    /// Write access to the member table
    pub fn members_mut(&self) -> RwLockWriteGuard<'_, MemberTable> {
        sync::write(&self.0.members)
    }

    /// Value of an own member, read without dispatch
    pub fn own_value(&self, name: &RString) -> Option<Variant> {
        self.members().get(name).map(|sym| sym.value.clone())
    }

    /// Value and attribute of an own member
    pub fn own_member(&self, name: &RString) -> Option<(Variant, MemberAttribute)> {
        self.members()
            .get(name)
            .map(|sym| (sym.value.clone(), sym.attribute))
    }

    /// Insert a member directly, bypassing dispatch rules
    pub fn define_member(
        &self,
        name: impl Into<RString>,
        value: Variant,
        attribute: MemberAttribute,
        flags: SymbolFlags,
    ) {
        self.members_mut().insert(name.into(), value, attribute, flags);
    }

    /// Hold the object's lock until the returned guard is dropped
    pub fn synchronize(&self) -> Synchronizer<'_> {
        self.0.cs.synchronize()
    }

    /// Attach native state
    ///
    /// Replaces the state already attached under `id`.
    pub fn set_native<T: Any + Send + Sync>(&self, id: NativeClassId, state: Arc<T>) -> RtResult<()> {
        let mut natives = sync::write(&self.0.natives);
        if let Some(slot) = natives.iter_mut().find(|(slot_id, _)| *slot_id == id) {
            slot.1 = state;
            return Ok(());
        }
        if natives.len() >= MAX_NATIVE_INSTANCES {
            return Err(TemporaryException::too_many_native_instances().into());
        }
        natives.push((id, state));
        Ok(())
    }

    /// Native state attached under `id`, if it has type `T`
    pub fn native<T: Any + Send + Sync>(&self, id: NativeClassId) -> Option<Arc<T>> {
        let natives = sync::read(&self.0.natives);
        let (_, state) = natives.iter().find(|(slot_id, _)| *slot_id == id)?;
        Arc::clone(state).downcast::<T>().ok()
    }

    /// Check if native state is attached under `id`
    pub fn has_native(&self, id: NativeClassId) -> bool {
        sync::read(&self.0.natives).iter().any(|(slot_id, _)| *slot_id == id)
    }

    /// Number of attached native states
    pub fn native_count(&self) -> usize {
        sync::read(&self.0.natives).len()
    }

    /// Number of strong references to the object
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl WeakObjectRef {
    /// Upgrade to a strong reference if the object is still alive
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Check if any strong reference remains
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    #[inline]
    pub fn ptr_eq(&self, other: &WeakObjectRef) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.id());
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.body() {
            ObjectBody::Class(info) => write!(f, "(class {})", info.name()),
            ObjectBody::Function(func) => write!(f, "(function {})", func.name()),
            ObjectBody::Property(prop) => write!(f, "(property {})", prop.name()),
            ObjectBody::Plain => write!(f, "(object 0x{:x})", self.id()),
        }
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(obj) => write!(f, "Weak{:?}", obj),
            None => write!(f, "Weak(<dropped>)"),
        }
    }
}
