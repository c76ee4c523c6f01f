//! Risse value representation
//!
//! [`Variant`] is the tagged union passed through every dispatch call. It is a
//! closed set of primitives plus object references; an object variant also
//! carries a [`Context`] telling which object acts as `this` when the value
//! is invoked.
//!
//! Coercion rules used throughout the runtime:
//! - void and null convert to `""`/`"null"`, 0 and false
//! - strings convert to numbers by parsing; unparsable text yields 0
//! - objects convert to true, 0 and `"(object)"` without an engine;
//!   [`Variant::stringify`] asks the object's `toString` instead

use crate::engine::Engine;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::object::{ObjectRef, WeakObjectRef};
use crate::runtime::operate::{Dispatch, OpCode};
use crate::runtime::string::RString;
use crate::util::dtoa::{ParsedNumber, parse_number, real_to_string};
use std::cmp::Ordering;
use std::fmt;

/// Type of a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    Void,
    Null,
    Boolean,
    Integer,
    Real,
    String,
    Object,
}

impl VariantType {
    /// Name of the built-in class for values of this type
    pub fn class_name(self) -> &'static str {
        match self {
            VariantType::Void => "Void",
            VariantType::Null => "Null",
            VariantType::Boolean => "Boolean",
            VariantType::Integer => "Integer",
            VariantType::Real => "Real",
            VariantType::String => "String",
            VariantType::Object => "Object",
        }
    }
}

/// The `this` binding carried by an object variant
#[derive(Clone, Default)]
pub enum Context {
    /// No binding; the object itself acts as `this`
    #[default]
    Unbound,
    /// Resolved at access time to the object the value was read from
    Dynamic,
    /// Bound to a specific object
    Bound(WeakObjectRef),
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Unbound => write!(f, "Unbound"),
            Context::Dynamic => write!(f, "Dynamic"),
            Context::Bound(weak) => match weak.upgrade() {
                Some(obj) => write!(f, "Bound({:?})", obj),
                None => write!(f, "Bound(<dropped>)"),
            },
        }
    }
}

/// Object reference plus `this` binding
#[derive(Clone, Debug)]
pub struct ObjectValue {
    pub object: ObjectRef,
    pub context: Context,
}

/// Risse value
#[derive(Clone, Default)]
pub enum Variant {
    #[default]
    Void,
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(RString),
    Object(ObjectValue),
}

impl Variant {
    /// Object variant without a context
    pub fn object(object: ObjectRef) -> Self {
        Variant::Object(ObjectValue {
            object,
            context: Context::Unbound,
        })
    }

    /// Object variant bound to `this`
    pub fn bound(object: ObjectRef, this: &ObjectRef) -> Self {
        Variant::Object(ObjectValue {
            object,
            context: Context::Bound(this.downgrade()),
        })
    }

    /// Object variant whose context resolves at access time
    pub fn dynamic(object: ObjectRef) -> Self {
        Variant::Object(ObjectValue {
            object,
            context: Context::Dynamic,
        })
    }

    /// String variant from anything string-like
    pub fn string(s: impl Into<RString>) -> Self {
        Variant::String(s.into())
    }

    /// Get the value type
    #[inline]
    pub fn get_type(&self) -> VariantType {
        match self {
            Variant::Void => VariantType::Void,
            Variant::Null => VariantType::Null,
            Variant::Boolean(_) => VariantType::Boolean,
            Variant::Integer(_) => VariantType::Integer,
            Variant::Real(_) => VariantType::Real,
            Variant::String(_) => VariantType::String,
            Variant::Object(_) => VariantType::Object,
        }
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Variant::Void)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Variant::Object(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Variant::String(_))
    }

    /// Check if the value is an integer or a real
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Variant::Integer(_) | Variant::Real(_))
    }

    /// Get the referenced object
    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Variant::Object(ov) => Some(&ov.object),
            _ => None,
        }
    }

    /// Get the string value
    #[inline]
    pub fn as_string(&self) -> Option<&RString> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the context of an object variant
    #[inline]
    pub fn context(&self) -> Option<&Context> {
        match self {
            Variant::Object(ov) => Some(&ov.context),
            _ => None,
        }
    }

    /// Object this variant is bound to, if the binding is still alive
    pub fn bound_this(&self) -> Option<ObjectRef> {
        match self {
            Variant::Object(ObjectValue {
                context: Context::Bound(weak),
                ..
            }) => weak.upgrade(),
            _ => None,
        }
    }

    /// Same object with a different context
    pub fn with_context(&self, context: Context) -> Variant {
        match self {
            Variant::Object(ov) => Variant::Object(ObjectValue {
                object: ov.object.clone(),
                context,
            }),
            other => other.clone(),
        }
    }

    /// Convert to boolean
    pub fn to_bool(&self) -> bool {
        match self {
            Variant::Void | Variant::Null => false,
            Variant::Boolean(b) => *b,
            Variant::Integer(i) => *i != 0,
            Variant::Real(r) => *r != 0.0 && !r.is_nan(),
            Variant::String(s) => !s.is_empty(),
            Variant::Object(_) => true,
        }
    }

    /// Convert to integer (reals are truncated)
    pub fn to_integer(&self) -> i64 {
        match self.to_number() {
            Variant::Integer(i) => i,
            Variant::Real(r) => r as i64,
            _ => 0,
        }
    }

    /// Convert to real
    pub fn to_real(&self) -> f64 {
        match self.to_number() {
            Variant::Integer(i) => i as f64,
            Variant::Real(r) => r,
            _ => 0.0,
        }
    }

    /// Convert to an integer or real variant
    pub fn to_number(&self) -> Variant {
        match self {
            Variant::Integer(_) | Variant::Real(_) => self.clone(),
            Variant::Boolean(b) => Variant::Integer(*b as i64),
            Variant::String(s) => match parse_number(&s.to_string()) {
                Some(ParsedNumber::Integer(i)) => Variant::Integer(i),
                Some(ParsedNumber::Real(r)) => Variant::Real(r),
                None => Variant::Integer(0),
            },
            Variant::Void | Variant::Null | Variant::Object(_) => Variant::Integer(0),
        }
    }

    /// Convert to string without consulting objects
    pub fn to_rstring(&self) -> RString {
        match self {
            Variant::Void => RString::empty(),
            Variant::Null => RString::from("null"),
            Variant::Boolean(b) => RString::from(if *b { "true" } else { "false" }),
            Variant::Integer(i) => RString::from(i.to_string()),
            Variant::Real(r) => RString::from(real_to_string(*r)),
            Variant::String(s) => s.clone(),
            Variant::Object(_) => RString::from("(object)"),
        }
    }

    /// Convert to string, asking objects for their `toString`
    pub fn stringify(&self, engine: &Engine) -> RtResult<RString> {
        match self {
            Variant::Object(_) => {
                let result = self.invoke(engine, "toString", &Default::default())?;
                match result {
                    Variant::Object(_) => Ok(RString::from("(object)")),
                    other => Ok(other.to_rstring()),
                }
            }
            other => Ok(other.to_rstring()),
        }
    }

    /// Readable rendering for messages and debugging
    pub fn as_human_readable(&self, max_len: usize) -> RString {
        match self {
            Variant::Void => RString::from("void"),
            Variant::String(s) => s.as_human_readable(max_len),
            Variant::Object(ov) => RString::from(format!("{:?}", ov.object)),
            other => other.to_rstring(),
        }
    }

    /// Identity comparison; object variants must also share their context
    pub fn strict_equal(&self, rhs: &Variant) -> bool {
        match (self, rhs) {
            (Variant::Object(a), Variant::Object(b)) => {
                a.object.ptr_eq(&b.object)
                    && match (&a.context, &b.context) {
                        (Context::Unbound, Context::Unbound) => true,
                        (Context::Dynamic, Context::Dynamic) => true,
                        (Context::Bound(x), Context::Bound(y)) => x.ptr_eq(y),
                        _ => false,
                    }
            }
            _ => self.disc_equal(rhs),
        }
    }

    /// Discernible equality (`===`): same type and same value
    pub fn disc_equal(&self, rhs: &Variant) -> bool {
        match (self, rhs) {
            (Variant::Void, Variant::Void) | (Variant::Null, Variant::Null) => true,
            (Variant::Boolean(a), Variant::Boolean(b)) => a == b,
            (Variant::Integer(a), Variant::Integer(b)) => a == b,
            (Variant::Real(a), Variant::Real(b)) => a == b,
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Object(a), Variant::Object(b)) => a.object.ptr_eq(&b.object),
            _ => false,
        }
    }

    /// Normal equality (`==`)
    ///
    /// Void and null equal each other, strings compare as strings, a string
    /// against a number compares numerically, objects compare by identity.
    pub fn equal(&self, rhs: &Variant) -> bool {
        match (self, rhs) {
            (Variant::Void | Variant::Null, Variant::Void | Variant::Null) => true,
            (Variant::Object(a), Variant::Object(b)) => a.object.ptr_eq(&b.object),
            (Variant::Object(_), _) | (_, Variant::Object(_)) => false,
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Integer(a), Variant::Integer(b)) => a == b,
            _ => self.to_real() == rhs.to_real(),
        }
    }

    /// Normal ordering (`<`)
    ///
    /// Two strings compare code-point-wise; any other pair compares
    /// numerically.
    pub fn lesser(&self, rhs: &Variant) -> bool {
        self.compare(rhs) == Some(Ordering::Less)
    }

    /// Normal ordering (`>`)
    pub fn greater(&self, rhs: &Variant) -> bool {
        self.compare(rhs) == Some(Ordering::Greater)
    }

    /// Ordering used by `<`, `>`, `<=`, `>=`; None when unordered (NaN)
    pub fn compare(&self, rhs: &Variant) -> Option<Ordering> {
        match (self, rhs) {
            (Variant::String(a), Variant::String(b)) => Some(a.cmp(b)),
            (Variant::Integer(a), Variant::Integer(b)) => Some(a.cmp(b)),
            _ => self.to_real().partial_cmp(&rhs.to_real()),
        }
    }

    /// Apply a unary operator to a primitive value
    pub fn unary(&self, code: OpCode) -> RtResult<Variant> {
        Ok(match code {
            OpCode::LogNot => Variant::Boolean(!self.to_bool()),
            OpCode::BitNot => Variant::Integer(!self.to_integer()),
            OpCode::Plus => self.to_number(),
            OpCode::Minus => match self.to_number() {
                Variant::Integer(i) => Variant::Integer(i.wrapping_neg()),
                Variant::Real(r) => Variant::Real(-r),
                other => other,
            },
            _ => return Err(TemporaryException::not_implemented().into()),
        })
    }

    /// Apply a binary operator to primitive values
    pub fn binary(&self, code: OpCode, rhs: &Variant) -> RtResult<Variant> {
        Ok(match code {
            OpCode::Add => {
                if self.is_string() || rhs.is_string() {
                    Variant::String(self.to_rstring().concat(&rhs.to_rstring()))
                } else {
                    self.arith(rhs, i64::wrapping_add, |a, b| a + b)
                }
            }
            OpCode::Sub => self.arith(rhs, i64::wrapping_sub, |a, b| a - b),
            OpCode::Mul => self.arith(rhs, i64::wrapping_mul, |a, b| a * b),
            OpCode::Div => Variant::Real(self.to_real() / rhs.to_real()),
            OpCode::Idiv => {
                let divisor = rhs.to_integer();
                if divisor == 0 {
                    return Err(TemporaryException::divide_by_zero().into());
                }
                Variant::Integer(self.to_integer().wrapping_div(divisor))
            }
            OpCode::Mod => {
                let divisor = rhs.to_integer();
                if divisor == 0 {
                    return Err(TemporaryException::divide_by_zero().into());
                }
                Variant::Integer(self.to_integer().wrapping_rem(divisor))
            }
            OpCode::BitAnd => Variant::Integer(self.to_integer() & rhs.to_integer()),
            OpCode::BitOr => Variant::Integer(self.to_integer() | rhs.to_integer()),
            OpCode::BitXor => Variant::Integer(self.to_integer() ^ rhs.to_integer()),
            OpCode::LShift => {
                Variant::Integer(self.to_integer().wrapping_shl(rhs.to_integer() as u32 & 63))
            }
            OpCode::RShift => {
                Variant::Integer(self.to_integer().wrapping_shr(rhs.to_integer() as u32 & 63))
            }
            OpCode::RBitShift => Variant::Integer(
                ((self.to_integer() as u64) >> (rhs.to_integer() as u32 & 63)) as i64,
            ),
            OpCode::Equal => Variant::Boolean(self.equal(rhs)),
            OpCode::NotEqual => Variant::Boolean(!self.equal(rhs)),
            OpCode::DiscEqual => Variant::Boolean(self.disc_equal(rhs)),
            OpCode::DiscNotEqual => Variant::Boolean(!self.disc_equal(rhs)),
            OpCode::Lesser => Variant::Boolean(self.lesser(rhs)),
            OpCode::Greater => Variant::Boolean(self.greater(rhs)),
            OpCode::LesserOrEqual => Variant::Boolean(matches!(
                self.compare(rhs),
                Some(Ordering::Less | Ordering::Equal)
            )),
            OpCode::GreaterOrEqual => Variant::Boolean(matches!(
                self.compare(rhs),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            _ => return Err(TemporaryException::not_implemented().into()),
        })
    }

    fn arith(&self, rhs: &Variant, int_op: fn(i64, i64) -> i64, real_op: fn(f64, f64) -> f64) -> Variant {
        match (self.to_number(), rhs.to_number()) {
            (Variant::Integer(a), Variant::Integer(b)) => Variant::Integer(int_op(a, b)),
            (a, b) => Variant::Real(real_op(a.to_real(), b.to_real())),
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.disc_equal(other)
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Void => write!(f, "void"),
            Variant::Null => write!(f, "null"),
            Variant::Boolean(b) => write!(f, "{}", b),
            Variant::Integer(i) => write!(f, "{}", i),
            Variant::Real(r) => write!(f, "{}", real_to_string(*r)),
            Variant::String(s) => write!(f, "{:?}", s),
            Variant::Object(ov) => write!(f, "{:?}", ov.object),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rstring())
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Boolean(b)
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Variant::Integer(i)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Variant::Integer(i as i64)
    }
}

impl From<usize> for Variant {
    fn from(i: usize) -> Self {
        Variant::Integer(i as i64)
    }
}

impl From<f64> for Variant {
    fn from(r: f64) -> Self {
        Variant::Real(r)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(RString::from(s))
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(RString::from(s))
    }
}

impl From<RString> for Variant {
    fn from(s: RString) -> Self {
        Variant::String(s)
    }
}

impl From<ObjectRef> for Variant {
    fn from(o: ObjectRef) -> Self {
        Variant::object(o)
    }
}
