//! Member attributes and dispatch flags

use bitflags::bitflags;
use std::fmt;

/// Whether a member may be reassigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    #[default]
    None,
    Var,
    Const,
}

/// Whether a member may be overridden by subclasses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Override {
    #[default]
    None,
    Virtual,
    Final,
}

/// Whether a member is a plain field or a property with accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyControl {
    #[default]
    None,
    Field,
    Property,
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    None,
    Public,
    Internal,
    Protected,
    Private,
}

/// Member attribute
///
/// Each part may be `None`, meaning "not specified". [`MemberAttribute::overwrite`]
/// merges only the specified parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberAttribute {
    pub mutability: Mutability,
    pub override_control: Override,
    pub property: PropertyControl,
    pub access: Access,
}

impl MemberAttribute {
    /// Attribute of a freshly defined member: var, virtual, field, public
    pub const fn default_member() -> Self {
        MemberAttribute {
            mutability: Mutability::Var,
            override_control: Override::Virtual,
            property: PropertyControl::Field,
            access: Access::Public,
        }
    }

    /// Nothing specified
    pub const fn unspecified() -> Self {
        MemberAttribute {
            mutability: Mutability::None,
            override_control: Override::None,
            property: PropertyControl::None,
            access: Access::None,
        }
    }

    pub const fn with_mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub const fn with_override(mut self, override_control: Override) -> Self {
        self.override_control = override_control;
        self
    }

    pub const fn with_property(mut self, property: PropertyControl) -> Self {
        self.property = property;
        self
    }

    pub const fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.mutability == Mutability::Const
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        self.override_control == Override::Final
    }

    #[inline]
    pub fn is_property(&self) -> bool {
        self.property == PropertyControl::Property
    }

    /// Check if any part is specified
    pub fn has_any(&self) -> bool {
        self.mutability != Mutability::None
            || self.override_control != Override::None
            || self.property != PropertyControl::None
            || self.access != Access::None
    }

    /// Copy the specified parts of `rhs` into self
    ///
    /// Returns true if anything changed.
    pub fn overwrite(&mut self, rhs: &MemberAttribute) -> bool {
        let before = *self;
        if rhs.mutability != Mutability::None {
            self.mutability = rhs.mutability;
        }
        if rhs.override_control != Override::None {
            self.override_control = rhs.override_control;
        }
        if rhs.property != PropertyControl::None {
            self.property = rhs.property;
        }
        if rhs.access != Access::None {
            self.access = rhs.access;
        }
        before != *self
    }
}

impl fmt::Display for MemberAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        match self.access {
            Access::None => {}
            Access::Public => parts.push("public"),
            Access::Internal => parts.push("internal"),
            Access::Protected => parts.push("protected"),
            Access::Private => parts.push("private"),
        }
        match self.mutability {
            Mutability::None => {}
            Mutability::Var => parts.push("var"),
            Mutability::Const => parts.push("const"),
        }
        match self.override_control {
            Override::None => {}
            Override::Virtual => parts.push("virtual"),
            Override::Final => parts.push("final"),
        }
        match self.property {
            PropertyControl::None => {}
            PropertyControl::Field => parts.push("field"),
            PropertyControl::Property => parts.push("property"),
        }
        f.write_str(&parts.join(" "))
    }
}

bitflags! {
    /// Flags modifying a dispatch call
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OperateFlags: u32 {
        /// Create the member if it does not exist (set-style operations)
        const MEMBER_ENSURE = 0x1000;
        /// Look only at the object's own table, not its class chain
        const INSTANCE_MEMBER_ONLY = 0x2000;
        /// Only report members marked final
        const FINAL_ONLY = 0x4000;
        /// Resolve through the class chain with the caller's `this`
        const USE_CLASS_MEMBERS_RULE = 0x8000;
        /// Fail with "member not found" instead of yielding void
        const MUST_EXIST = 0x10000;
        /// Include hidden members in enumeration
        const INCLUDE_HIDDEN = 0x20000;
        /// Treat property members as plain values
        const IGNORE_PROPERTY = 0x40000;
        /// Create the member hidden
        const HIDDEN_MEMBER = 0x80000;
    }
}
