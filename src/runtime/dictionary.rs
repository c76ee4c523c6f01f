//! Dictionary storage
//!
//! A dictionary maps string keys to values through its own [`MemberTable`],
//! separate from the dictionary object's members. Reading a missing key
//! yields the dictionary's default value.

use crate::config::MemberTableConfig;
use crate::runtime::attribute::MemberAttribute;
use crate::runtime::property::{MemberTable, SymbolFlags};
use crate::runtime::string::RString;
use crate::runtime::sync;
use crate::value::Variant;
use std::sync::{Mutex, MutexGuard};

/// Entries plus the value returned for missing keys
#[derive(Debug, Clone, Default)]
pub struct DictionaryState {
    table: MemberTable,
    pub default_value: Variant,
}

impl DictionaryState {
    pub fn new(config: &MemberTableConfig) -> Self {
        DictionaryState {
            table: MemberTable::with_config(config),
            default_value: Variant::Void,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Value under `key`, if present
    pub fn get(&self, key: &RString) -> Option<Variant> {
        self.table.get(key).map(|sym| sym.value.clone())
    }

    /// Value under `key`, or the default value
    pub fn get_or_default(&self, key: &RString) -> Variant {
        self.get(key).unwrap_or_else(|| self.default_value.clone())
    }

    pub fn set(&mut self, key: RString, value: Variant) {
        self.table
            .insert(key, value, MemberAttribute::default_member(), SymbolFlags::empty());
    }

    /// Remove `key`; returns the removed value
    pub fn delete(&mut self, key: &RString) -> Option<Variant> {
        self.table.remove(key)
    }

    pub fn has(&self, key: &RString) -> bool {
        self.table.has(key)
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Key/value pairs in table order
    pub fn entries(&self) -> Vec<(RString, Variant)> {
        self.table
            .iter()
            .map(|sym| (sym.name.clone(), sym.value.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<RString> {
        self.table.iter().map(|sym| sym.name.clone()).collect()
    }

    pub fn values(&self) -> Vec<Variant> {
        self.table.iter().map(|sym| sym.value.clone()).collect()
    }
}

/// Native state of Dictionary instances
#[derive(Debug, Default)]
pub struct DictionaryInstance {
    state: Mutex<DictionaryState>,
}

impl DictionaryInstance {
    pub fn new(state: DictionaryState) -> Self {
        DictionaryInstance {
            state: Mutex::new(state),
        }
    }

    /// Lock the entries
    ///
    /// The guard must not be held while calling back into scripts.
    pub fn lock(&self) -> MutexGuard<'_, DictionaryState> {
        sync::lock(&self.state)
    }

    pub fn entries(&self) -> Vec<(RString, Variant)> {
        self.lock().entries()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
