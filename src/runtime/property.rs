//! Member table
//!
//! Every object stores its members in a chained hash table keyed by name.
//!
//! Layout:
//! - buckets[2^k]: indices into `symbols` (1-based, 0 = end of chain)
//! - symbols[]: symbol records; each carries the index of the next record
//!   in its chain
//! - first_free: head of the list of removed records available for reuse
//!
//! When the number of live symbols would exceed the configured load, the
//! bucket array doubles and every live symbol is re-inserted at the head of
//! its new chain. Each rehash bumps `rehash_magic`, which lets holders of a
//! [`LookupHint`] notice that their cached position may be stale.

use crate::config::MemberTableConfig;
use crate::runtime::attribute::MemberAttribute;
use crate::runtime::string::RString;
use crate::value::Variant;
use bitflags::bitflags;

bitflags! {
    /// Management flags of a symbol record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SymbolFlags: u8 {
        /// The record holds a live member
        const USING = 0x01;
        /// The member is being initialised
        const INITIALIZING = 0x02;
        /// Excluded from default enumeration, copying and import
        const HIDDEN = 0x04;
        /// Class-level (static) member
        const STATIC = 0x08;
    }
}

/// Symbol record
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Member name
    pub name: RString,
    /// Hash of `name`
    hash: u32,
    /// Management flags
    pub flags: SymbolFlags,
    /// Member attribute
    pub attribute: MemberAttribute,
    /// Member value
    pub value: Variant,
    /// Next record in the chain (1-based, 0 = end)
    next: u32,
}

impl Symbol {
    fn new(name: RString, value: Variant, attribute: MemberAttribute, flags: SymbolFlags) -> Self {
        let hash = name.hash_hint();
        Symbol {
            name,
            hash,
            flags: flags | SymbolFlags::USING,
            attribute,
            value,
            next: 0,
        }
    }

    /// Check if the record holds a live member
    #[inline]
    pub fn is_using(&self) -> bool {
        self.flags.contains(SymbolFlags::USING)
    }

    /// Check if the member is hidden
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(SymbolFlags::HIDDEN)
    }

    /// Precomputed hash of the name
    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }
}

/// Cached position of a symbol
///
/// Valid only while the table's rehash magic matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupHint {
    magic: u32,
    index: Option<usize>,
}

/// Member table
#[derive(Debug, Clone)]
pub struct MemberTable {
    /// Number of live symbols
    count: usize,
    /// Bucket count - 1
    mask: u32,
    /// Symbol records
    symbols: Vec<Symbol>,
    /// Chain heads
    buckets: Vec<u32>,
    /// Head of the free list (1-based, 0 = empty)
    first_free: u32,
    /// Number of rehashes performed so far
    rehash_magic: u32,
    /// Live symbols per 100 buckets allowed before doubling
    max_load_percent: u32,
}

impl MemberTable {
    /// Create an empty table with the default sizing
    pub fn new() -> Self {
        Self::with_config(&MemberTableConfig::default())
    }

    /// Create an empty table with explicit sizing
    pub fn with_config(config: &MemberTableConfig) -> Self {
        let size = config.initial_buckets();
        MemberTable {
            count: 0,
            mask: (size - 1) as u32,
            symbols: Vec::new(),
            buckets: vec![0; size],
            first_free: 0,
            rehash_magic: 0,
            max_load_percent: config.max_load_percent.max(1),
        }
    }

    /// Number of live members
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of buckets (always a power of two)
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of rehashes performed so far
    #[inline]
    pub fn rehash_magic(&self) -> u32 {
        self.rehash_magic
    }

    /// Find a member by name
    ///
    /// Returns the symbol index if found.
    pub fn find(&self, name: &RString) -> Option<usize> {
        if self.count == 0 {
            return None;
        }

        let hash = name.hash_hint();
        let mut idx = self.buckets[(hash & self.mask) as usize];

        while idx != 0 {
            let sym_idx = (idx - 1) as usize;
            let sym = &self.symbols[sym_idx];
            if sym.hash == hash && sym.name == *name {
                return Some(sym_idx);
            }
            idx = sym.next;
        }

        None
    }

    /// Find a member, reusing a cached position when still valid
    pub fn find_with_hint(&self, name: &RString, hint: &mut LookupHint) -> Option<usize> {
        if hint.magic == self.rehash_magic {
            if let Some(index) = hint.index {
                if let Some(sym) = self.symbols.get(index) {
                    if sym.is_using() && sym.name == *name {
                        return Some(index);
                    }
                }
            }
        }
        let found = self.find(name);
        *hint = LookupHint {
            magic: self.rehash_magic,
            index: found,
        };
        found
    }

    /// Get a member by name
    pub fn get(&self, name: &RString) -> Option<&Symbol> {
        self.find(name).map(|idx| &self.symbols[idx])
    }

    /// Get a mutable member by name
    pub fn get_mut(&mut self, name: &RString) -> Option<&mut Symbol> {
        self.find(name).map(move |idx| &mut self.symbols[idx])
    }

    /// Symbol record at an index returned by [`MemberTable::find`]
    pub fn symbol(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index).filter(|s| s.is_using())
    }

    /// Check if a member exists
    pub fn has(&self, name: &RString) -> bool {
        self.find(name).is_some()
    }

    /// Insert or replace a member
    ///
    /// An existing member keeps its record and gets the new value, attribute
    /// and flags. Returns the symbol index.
    pub fn insert(
        &mut self,
        name: RString,
        value: Variant,
        attribute: MemberAttribute,
        flags: SymbolFlags,
    ) -> usize {
        if let Some(idx) = self.find(&name) {
            let sym = &mut self.symbols[idx];
            sym.value = value;
            sym.attribute = attribute;
            sym.flags = flags | SymbolFlags::USING;
            return idx;
        }

        let limit = self.buckets.len() * self.max_load_percent as usize / 100;
        if self.count + 1 > limit.max(1) {
            self.rehash();
        }

        let mut sym = Symbol::new(name, value, attribute, flags);
        let bucket = (sym.hash & self.mask) as usize;
        sym.next = self.buckets[bucket];

        // Reuse a removed record or append
        let sym_idx = if self.first_free != 0 {
            let idx = (self.first_free - 1) as usize;
            self.first_free = self.symbols[idx].next;
            self.symbols[idx] = sym;
            idx
        } else {
            self.symbols.push(sym);
            self.symbols.len() - 1
        };

        self.buckets[bucket] = (sym_idx + 1) as u32;
        self.count += 1;
        sym_idx
    }

    /// Remove a member by name
    ///
    /// Returns the removed value if the member existed.
    pub fn remove(&mut self, name: &RString) -> Option<Variant> {
        if self.count == 0 {
            return None;
        }

        let hash = name.hash_hint();
        let bucket = (hash & self.mask) as usize;

        let mut prev_idx: Option<usize> = None;
        let mut idx = self.buckets[bucket];

        while idx != 0 {
            let sym_idx = (idx - 1) as usize;
            let sym = &self.symbols[sym_idx];

            if sym.hash == hash && sym.name == *name {
                let next = sym.next;
                match prev_idx {
                    Some(prev) => self.symbols[prev].next = next,
                    None => self.buckets[bucket] = next,
                }

                // Tombstone the record and put it on the free list
                let sym = &mut self.symbols[sym_idx];
                let value = std::mem::take(&mut sym.value);
                sym.name = RString::empty();
                sym.flags = SymbolFlags::empty();
                sym.attribute = MemberAttribute::unspecified();
                sym.next = self.first_free;
                self.first_free = (sym_idx + 1) as u32;

                self.count -= 1;
                return Some(value);
            }

            prev_idx = Some(sym_idx);
            idx = sym.next;
        }

        None
    }

    /// Remove every member, keeping the current bucket count
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.buckets.iter_mut().for_each(|b| *b = 0);
        self.first_free = 0;
        self.count = 0;
    }

    /// Double the bucket array and re-chain every live symbol
    fn rehash(&mut self) {
        let new_size = self.buckets.len() * 2;
        self.mask = (new_size - 1) as u32;
        self.buckets = vec![0; new_size];

        for i in 0..self.symbols.len() {
            if !self.symbols[i].is_using() {
                continue;
            }
            let bucket = (self.symbols[i].hash & self.mask) as usize;
            self.symbols[i].next = self.buckets[bucket];
            self.buckets[bucket] = (i + 1) as u32;
        }

        self.rehash_magic = self.rehash_magic.wrapping_add(1);
    }

    /// Iterate over live members, hidden ones included
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.is_using())
    }

    /// Iterate over live members, skipping hidden ones unless asked
    pub fn iter_visible(&self, include_hidden: bool) -> impl Iterator<Item = &Symbol> {
        self.iter().filter(move |s| include_hidden || !s.is_hidden())
    }

    /// Names of the visible members
    pub fn names(&self) -> Vec<RString> {
        self.iter_visible(false).map(|s| s.name.clone()).collect()
    }

    /// Length of the chain starting at `bucket`
    #[cfg(test)]
    fn chain_len(&self, bucket: usize) -> usize {
        let mut len = 0;
        let mut idx = self.buckets[bucket];
        while idx != 0 {
            len += 1;
            idx = self.symbols[(idx - 1) as usize].next;
        }
        len
    }
}

impl Default for MemberTable {
    fn default() -> Self {
        Self::new()
    }
}
