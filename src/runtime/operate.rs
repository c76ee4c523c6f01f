//! The operate protocol
//!
//! Every interaction with a value goes through one entry point,
//! [`Dispatch::operate`], which takes an [`Operation`]: an operation code, a
//! member name (empty = act on the value itself), flags, an attribute, the
//! arguments and the `this` the caller wants to use.
//!
//! Member resolution on an object:
//! 1. the object's own member table,
//! 2. then its class, that class's superclass and so on, with the instance
//!    as `this`.
//!
//! Values stored with a dynamic context are rebound to the object they are
//! read through. Property members are read and written through their
//! accessors unless [`OperateFlags::IGNORE_PROPERTY`] is given.
//!
//! Primitive values resolve members through their built-in class
//! (`Integer`, `String`, ...) with the primitive itself as `this`.

use crate::engine::Engine;
use crate::error::{RetCode, RtResult, RuntimeError, TemporaryException};
use crate::runtime::attribute::{MemberAttribute, OperateFlags};
use crate::runtime::class;
use crate::runtime::function::{Args, NO_ARGS};
use crate::runtime::object::{ObjectBody, ObjectRef};
use crate::runtime::property::SymbolFlags;
use crate::runtime::string::RString;
use crate::value::{Context, Variant};

/// Operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Read a member
    DGet,
    /// Write a member
    DSet,
    /// Delete a member
    DDelete,
    /// Indexed read (`a[b]`)
    IGet,
    /// Indexed write (`a[b] = c`)
    ISet,
    /// Indexed delete
    IDelete,
    /// Call
    FuncCall,
    /// Instantiate
    New,
    /// Class membership test
    InstanceOf,
    /// Change a member's attribute
    SetAttribute,

    LogNot,
    BitNot,
    Plus,
    Minus,

    BitOr,
    BitXor,
    BitAnd,
    NotEqual,
    Equal,
    DiscNotEqual,
    DiscEqual,
    Lesser,
    Greater,
    LesserOrEqual,
    GreaterOrEqual,
    RBitShift,
    LShift,
    RShift,
    Mod,
    Div,
    Idiv,
    Mul,
    Add,
    Sub,
}

impl OpCode {
    /// Member name an object implements to overload this operator
    pub fn operator_name(self) -> Option<&'static str> {
        Some(match self {
            OpCode::IGet => "[]",
            OpCode::ISet => "[]=",
            OpCode::IDelete => "delete[]",
            OpCode::LogNot => "!",
            OpCode::BitNot => "~",
            OpCode::Plus => "+@",
            OpCode::Minus => "-@",
            OpCode::BitOr => "|",
            OpCode::BitXor => "^",
            OpCode::BitAnd => "&",
            OpCode::NotEqual => "!=",
            OpCode::Equal => "==",
            OpCode::DiscNotEqual => "!==",
            OpCode::DiscEqual => "===",
            OpCode::Lesser => "<",
            OpCode::Greater => ">",
            OpCode::LesserOrEqual => "<=",
            OpCode::GreaterOrEqual => ">=",
            OpCode::RBitShift => ">>>",
            OpCode::LShift => "<<",
            OpCode::RShift => ">>",
            OpCode::Mod => "%",
            OpCode::Div => "/",
            OpCode::Idiv => "\\",
            OpCode::Mul => "*",
            OpCode::Add => "+",
            OpCode::Sub => "-",
            _ => return None,
        })
    }

    #[inline]
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            OpCode::LogNot | OpCode::BitNot | OpCode::Plus | OpCode::Minus
        )
    }

    #[inline]
    pub fn is_binary(self) -> bool {
        self.operator_name().is_some()
            && !self.is_unary()
            && !matches!(self, OpCode::IGet | OpCode::ISet | OpCode::IDelete)
    }
}

/// One dispatch request
#[derive(Debug, Clone)]
pub struct Operation<'a> {
    pub code: OpCode,
    /// Member name; empty to act on the value itself
    pub name: RString,
    pub flags: OperateFlags,
    pub attribute: MemberAttribute,
    pub args: &'a Args,
    /// Requested `this`; void to use the value being operated on
    pub this: Variant,
}

impl Operation<'static> {
    /// Operation on the value itself
    pub fn new(code: OpCode) -> Self {
        Operation {
            code,
            name: RString::empty(),
            flags: OperateFlags::empty(),
            attribute: MemberAttribute::unspecified(),
            args: &NO_ARGS,
            this: Variant::Void,
        }
    }

    /// Operation on a named member
    pub fn member(code: OpCode, name: impl Into<RString>) -> Self {
        Operation {
            name: name.into(),
            ..Operation::new(code)
        }
    }
}

impl<'a> Operation<'a> {
    pub fn with_args<'b>(self, args: &'b Args) -> Operation<'b> {
        Operation {
            code: self.code,
            name: self.name,
            flags: self.flags,
            attribute: self.attribute,
            args,
            this: self.this,
        }
    }

    pub fn with_flags(mut self, flags: OperateFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_attribute(mut self, attribute: MemberAttribute) -> Self {
        self.attribute = attribute;
        self
    }

    pub fn with_this(mut self, this: Variant) -> Self {
        self.this = this;
        self
    }

    /// Same operation acting on the value itself
    fn on_self(&self) -> Operation<'a> {
        Operation {
            code: self.code,
            name: RString::empty(),
            flags: self.flags,
            attribute: self.attribute,
            args: self.args,
            this: Variant::Void,
        }
    }
}

/// Values that respond to the operate protocol
pub trait Dispatch {
    /// Perform one operation
    fn operate(&self, engine: &Engine, op: Operation<'_>) -> RtResult<Variant>;

    /// Read a member that must exist
    fn get_property(&self, engine: &Engine, name: impl Into<RString>) -> RtResult<Variant> {
        self.operate(
            engine,
            Operation::member(OpCode::DGet, name).with_flags(OperateFlags::MUST_EXIST),
        )
    }

    /// Read a member, yielding void when it is absent
    fn get_property_or_void(&self, engine: &Engine, name: impl Into<RString>) -> RtResult<Variant> {
        self.operate(engine, Operation::member(OpCode::DGet, name))
    }

    /// Write a member, creating it if needed
    fn set_property(&self, engine: &Engine, name: impl Into<RString>, value: impl Into<Variant>) -> RtResult<()> {
        self.set_property_with(
            engine,
            name,
            value,
            OperateFlags::MEMBER_ENSURE,
            MemberAttribute::unspecified(),
        )
    }

    /// Write a member with explicit flags and attribute
    fn set_property_with(
        &self,
        engine: &Engine,
        name: impl Into<RString>,
        value: impl Into<Variant>,
        flags: OperateFlags,
        attribute: MemberAttribute,
    ) -> RtResult<()> {
        let args = Args::from([value.into()]);
        self.operate(
            engine,
            Operation::member(OpCode::DSet, name)
                .with_flags(flags)
                .with_attribute(attribute)
                .with_args(&args),
        )
        .map(|_| ())
    }

    /// Delete an own member; true if it existed
    fn delete_member(&self, engine: &Engine, name: impl Into<RString>) -> RtResult<bool> {
        self.operate(engine, Operation::member(OpCode::DDelete, name))
            .map(|v| v.to_bool())
    }

    /// Change the attribute of an own member
    fn set_attribute(&self, engine: &Engine, name: impl Into<RString>, attribute: MemberAttribute) -> RtResult<()> {
        self.operate(
            engine,
            Operation::member(OpCode::SetAttribute, name).with_attribute(attribute),
        )
        .map(|_| ())
    }

    /// Call a method
    fn invoke(&self, engine: &Engine, name: impl Into<RString>, args: &Args) -> RtResult<Variant> {
        self.operate(engine, Operation::member(OpCode::FuncCall, name).with_args(args))
    }

    /// Call the value itself
    fn call(&self, engine: &Engine, args: &Args) -> RtResult<Variant> {
        self.operate(engine, Operation::new(OpCode::FuncCall).with_args(args))
    }

    /// Call the value itself with an explicit `this`
    fn call_with_this(&self, engine: &Engine, this: Variant, args: &Args) -> RtResult<Variant> {
        self.operate(
            engine,
            Operation::new(OpCode::FuncCall).with_args(args).with_this(this),
        )
    }

    /// Instantiate the value, which must be a class
    fn create_new(&self, engine: &Engine, args: &Args) -> RtResult<Variant> {
        self.operate(engine, Operation::new(OpCode::New).with_args(args))
    }

    /// Check if the value is an instance of `class`
    fn is_instance_of(&self, engine: &Engine, class: &Variant) -> RtResult<bool> {
        let args = Args::from([class.clone()]);
        self.operate(engine, Operation::new(OpCode::InstanceOf).with_args(&args))
            .map(|v| v.to_bool())
    }

    /// Indexed read
    fn index_get(&self, engine: &Engine, key: Variant) -> RtResult<Variant> {
        let args = Args::from([key]);
        self.operate(engine, Operation::new(OpCode::IGet).with_args(&args))
    }

    /// Indexed write
    fn index_set(&self, engine: &Engine, key: Variant, value: Variant) -> RtResult<()> {
        let args = Args::from([key, value]);
        self.operate(engine, Operation::new(OpCode::ISet).with_args(&args))
            .map(|_| ())
    }

    /// Apply a binary operator with the value on the left
    fn binary_op(&self, engine: &Engine, code: OpCode, rhs: &Variant) -> RtResult<Variant> {
        let args = Args::from([rhs.clone()]);
        self.operate(engine, Operation::new(code).with_args(&args))
    }

    /// Apply a unary operator
    fn unary_op(&self, engine: &Engine, code: OpCode) -> RtResult<Variant> {
        self.operate(engine, Operation::new(code))
    }
}

impl Dispatch for Variant {
    fn operate(&self, engine: &Engine, op: Operation<'_>) -> RtResult<Variant> {
        match self {
            Variant::Object(ov) => {
                let this = resolve_this(&ov.object, &ov.context, &op);
                operate_object(&ov.object, engine, &op, &this)
            }
            _ => operate_primitive(self, engine, &op),
        }
    }
}

impl Dispatch for ObjectRef {
    fn operate(&self, engine: &Engine, op: Operation<'_>) -> RtResult<Variant> {
        let this = resolve_this(self, &Context::Unbound, &op);
        operate_object(self, engine, &op, &this)
    }
}

/// `this` for an operation on an object value
///
/// A live bound context wins unless the class-members rule is requested;
/// otherwise the caller's `this`, otherwise the object itself.
fn resolve_this(object: &ObjectRef, context: &Context, op: &Operation<'_>) -> Variant {
    if !op.flags.contains(OperateFlags::USE_CLASS_MEMBERS_RULE) {
        if let Some(bound) = bound_object(context) {
            return Variant::object(bound);
        }
    }
    if !op.this.is_void() {
        return op.this.clone();
    }
    Variant::object(object.clone())
}

fn bound_object(context: &Context) -> Option<ObjectRef> {
    match context {
        Context::Bound(weak) => weak.upgrade(),
        _ => None,
    }
}

/// Find a member in `owner`'s own table, then along a class chain
///
/// `owner` is None for primitives, which only have their class chain.
pub(crate) fn find_member(
    owner: Option<&ObjectRef>,
    class: Option<ObjectRef>,
    name: &RString,
    flags: OperateFlags,
) -> Option<(Variant, MemberAttribute)> {
    let found = owner.and_then(|o| o.own_member(name)).or_else(|| {
        if flags.contains(OperateFlags::INSTANCE_MEMBER_ONLY) {
            None
        } else {
            find_in_class_chain(class, name)
        }
    });
    match found {
        Some((_, attr)) if flags.contains(OperateFlags::FINAL_ONLY) && !attr.is_final() => None,
        other => other,
    }
}

/// Walk `class` and its superclasses reading their own tables
pub(crate) fn find_in_class_chain(
    mut class: Option<ObjectRef>,
    name: &RString,
) -> Option<(Variant, MemberAttribute)> {
    while let Some(c) = class {
        if let Some(found) = c.own_member(name) {
            return Some(found);
        }
        class = c.super_class();
    }
    None
}

/// Rebind a dynamically bound value to `this`
fn bind_to(value: Variant, this: &Variant) -> Variant {
    match (&value, this) {
        (Variant::Object(ov), Variant::Object(target)) if matches!(ov.context, Context::Dynamic) => {
            Variant::bound(ov.object.clone(), &target.object)
        }
        _ => value,
    }
}

/// Produce the value of a found member as seen through `this`
fn read_member(
    engine: &Engine,
    value: Variant,
    attr: MemberAttribute,
    flags: OperateFlags,
    this: &Variant,
) -> RtResult<Variant> {
    if attr.is_property() && !flags.contains(OperateFlags::IGNORE_PROPERTY) {
        return value.operate(engine, Operation::new(OpCode::DGet).with_this(this.clone()));
    }
    Ok(bind_to(value, this))
}

fn write_property(engine: &Engine, accessor: &Variant, value: &Variant, this: &Variant) -> RtResult<()> {
    let args = Args::from([value.clone()]);
    accessor
        .operate(
            engine,
            Operation::new(OpCode::DSet)
                .with_args(&args)
                .with_this(this.clone()),
        )
        .map(|_| ())
}

fn not_found(name: &RString) -> RuntimeError {
    RuntimeError::operate(RetCode::MemberNotFound, name)
}

fn operate_object(object: &ObjectRef, engine: &Engine, op: &Operation<'_>, this: &Variant) -> RtResult<Variant> {
    if !object.is_valid() {
        return Err(RuntimeError::operate(RetCode::InvalidObject, &op.name));
    }
    if op.name.is_empty() {
        return operate_self(object, engine, op, this);
    }

    if matches!(op.code, OpCode::DGet | OpCode::DSet | OpCode::DDelete) {
        if let Some(index) = op.name.parse_index() {
            if let Some(result) = route_index(object, engine, op, index, this)? {
                return Ok(result);
            }
        }
    }

    match op.code {
        OpCode::DGet => get_member(object, engine, &op.name, op.flags, this),
        OpCode::DSet => set_member(
            object,
            engine,
            &op.name,
            op.args.get(0),
            op.flags,
            op.attribute,
            this,
        )
        .map(|_| Variant::Void),
        OpCode::DDelete => delete_member(object, &op.name, op.flags),
        OpCode::SetAttribute => set_member_attribute(object, &op.name, op.attribute),
        OpCode::FuncCall => {
            let Some((value, attr)) = find_member(Some(object), object.class(), &op.name, op.flags) else {
                return Err(not_found(&op.name));
            };
            let callee = read_member(engine, value, attr, op.flags, this)?;
            call_member(engine, &callee, op, this)
        }
        _ => {
            let member = get_member(
                object,
                engine,
                &op.name,
                op.flags | OperateFlags::MUST_EXIST,
                this,
            )?;
            member.operate(engine, op.on_self())
        }
    }
}

/// Call a resolved member: a live bound context overrides the accessing `this`
fn call_member(engine: &Engine, callee: &Variant, op: &Operation<'_>, this: &Variant) -> RtResult<Variant> {
    let call_this = callee
        .context()
        .and_then(bound_object)
        .map(Variant::object)
        .unwrap_or_else(|| this.clone());
    callee.operate(
        engine,
        Operation::new(OpCode::FuncCall)
            .with_args(op.args)
            .with_flags(op.flags - OperateFlags::MUST_EXIST)
            .with_this(call_this),
    )
}

/// Send numeric member names to the indexed accessors, when the class defines them
fn route_index(
    object: &ObjectRef,
    engine: &Engine,
    op: &Operation<'_>,
    index: i64,
    this: &Variant,
) -> RtResult<Option<Variant>> {
    let (accessor, args) = match op.code {
        OpCode::DGet => ("[]", Args::from([Variant::Integer(index)])),
        OpCode::DSet => ("[]=", Args::from([Variant::Integer(index), op.args.get(0).clone()])),
        _ => ("delete[]", Args::from([Variant::Integer(index)])),
    };
    let Some((method, _)) = find_in_class_chain(object.class(), &RString::from(accessor)) else {
        return Ok(None);
    };
    let method = bind_to(method, this);
    method
        .operate(
            engine,
            Operation::new(OpCode::FuncCall)
                .with_args(&args)
                .with_this(this.clone()),
        )
        .map(Some)
}

fn get_member(
    object: &ObjectRef,
    engine: &Engine,
    name: &RString,
    flags: OperateFlags,
    this: &Variant,
) -> RtResult<Variant> {
    match find_member(Some(object), object.class(), name, flags) {
        Some((value, attr)) => read_member(engine, value, attr, flags, this),
        None if flags.contains(OperateFlags::MUST_EXIST) => Err(not_found(name)),
        None => Ok(Variant::Void),
    }
}

fn set_member(
    object: &ObjectRef,
    engine: &Engine,
    name: &RString,
    value: &Variant,
    flags: OperateFlags,
    attribute: MemberAttribute,
    this: &Variant,
) -> RtResult<()> {
    let _sync = object.synchronize();
    let ignore_property = flags.contains(OperateFlags::IGNORE_PROPERTY);

    if let Some((current, attr)) = object.own_member(name) {
        if attr.is_property() && !ignore_property {
            return write_property(engine, &current, value, this);
        }
        if attr.is_const() {
            return Err(RuntimeError::operate(RetCode::MemberIsReadOnly, name));
        }
        if attr.is_final() {
            return Err(RuntimeError::operate(RetCode::MemberIsFinal, name));
        }
        let mut members = object.members_mut();
        if let Some(sym) = members.get_mut(name) {
            sym.value = value.clone();
            if attribute.has_any() {
                sym.attribute.overwrite(&attribute);
            }
        }
        return Ok(());
    }

    if !flags.contains(OperateFlags::INSTANCE_MEMBER_ONLY) {
        if let Some((current, attr)) = find_in_class_chain(object.class(), name) {
            if attr.is_property() && !ignore_property {
                return write_property(engine, &current, value, this);
            }
            if attr.is_final() {
                return Err(RuntimeError::operate(RetCode::MemberIsFinal, name));
            }
            if attr.is_const() {
                return Err(RuntimeError::operate(RetCode::MemberIsReadOnly, name));
            }
        }
    }

    if !flags.contains(OperateFlags::MEMBER_ENSURE) {
        return Err(not_found(name));
    }

    // A class may not shadow a final member of its superclasses
    if let Some(super_class) = object.super_class() {
        let finals = find_member(
            None,
            Some(super_class),
            name,
            OperateFlags::FINAL_ONLY,
        );
        if finals.is_some() {
            return Err(RuntimeError::operate(RetCode::MemberIsFinal, name));
        }
    }

    let mut attr = MemberAttribute::default_member();
    attr.overwrite(&attribute);
    let symbol_flags = if flags.contains(OperateFlags::HIDDEN_MEMBER) {
        SymbolFlags::HIDDEN
    } else {
        SymbolFlags::empty()
    };
    object.define_member(name.clone(), value.clone(), attr, symbol_flags);
    Ok(())
}

fn delete_member(object: &ObjectRef, name: &RString, flags: OperateFlags) -> RtResult<Variant> {
    let _sync = object.synchronize();
    match object.own_member(name) {
        Some((_, attr)) if attr.is_const() => Err(RuntimeError::operate(RetCode::MemberIsReadOnly, name)),
        Some(_) => {
            object.members_mut().remove(name);
            Ok(Variant::Boolean(true))
        }
        None if flags.contains(OperateFlags::MUST_EXIST) => Err(not_found(name)),
        None => Ok(Variant::Boolean(false)),
    }
}

fn set_member_attribute(object: &ObjectRef, name: &RString, attribute: MemberAttribute) -> RtResult<Variant> {
    let _sync = object.synchronize();
    let mut members = object.members_mut();
    let Some(sym) = members.get_mut(name) else {
        return Err(not_found(name));
    };
    sym.attribute.overwrite(&attribute);
    Ok(Variant::Void)
}

/// Operation with an empty name: act on the object itself
fn operate_self(object: &ObjectRef, engine: &Engine, op: &Operation<'_>, this: &Variant) -> RtResult<Variant> {
    match (op.code, object.body()) {
        (OpCode::FuncCall, ObjectBody::Function(function)) => {
            function.call(engine, this, op.args, op.flags)
        }
        (OpCode::DGet, ObjectBody::Property(property)) => property.get(engine, this),
        (OpCode::DSet, ObjectBody::Property(property)) => {
            property.set(engine, this, op.args.get(0)).map(|_| Variant::Void)
        }
        (OpCode::New, ObjectBody::Class(_)) => {
            Variant::object(object.clone()).invoke(engine, "new", op.args)
        }
        (OpCode::New, _) => Err(TemporaryException::instance_from_non_class().into()),
        (OpCode::FuncCall, _) => Err(TemporaryException::cannot_call_non_function().into()),
        (OpCode::DGet, _) => Ok(Variant::object(object.clone())),
        (OpCode::InstanceOf, _) => {
            let target = op.args.get(0);
            Ok(Variant::Boolean(class::is_instance(engine, this, target)))
        }
        (OpCode::IGet, _) => match overloaded_operator(object, engine, op, this)? {
            Some(result) => Ok(result),
            None => {
                let name = op.args.get(0).stringify(engine)?;
                get_member(object, engine, &name, op.flags, this)
            }
        },
        (OpCode::ISet, _) => match overloaded_operator(object, engine, op, this)? {
            Some(result) => Ok(result),
            None => {
                let name = op.args.get(0).stringify(engine)?;
                set_member(
                    object,
                    engine,
                    &name,
                    op.args.get(1),
                    op.flags | OperateFlags::MEMBER_ENSURE,
                    op.attribute,
                    this,
                )
                .map(|_| Variant::Void)
            }
        },
        (OpCode::IDelete, _) => match overloaded_operator(object, engine, op, this)? {
            Some(result) => Ok(result),
            None => {
                let name = op.args.get(0).stringify(engine)?;
                delete_member(object, &name, op.flags)
            }
        },
        (code, _) if code.is_unary() || code.is_binary() => {
            if let Some(result) = overloaded_operator(object, engine, op, this)? {
                return Ok(result);
            }
            let rhs = op.args.get(0);
            let identical = rhs
                .as_object()
                .is_some_and(|other| other.ptr_eq(object));
            match code {
                OpCode::Equal | OpCode::DiscEqual => Ok(Variant::Boolean(identical)),
                OpCode::NotEqual | OpCode::DiscNotEqual => Ok(Variant::Boolean(!identical)),
                OpCode::LogNot => Ok(Variant::Boolean(false)),
                _ => Err(RuntimeError::operate(RetCode::NotImplemented, &op.name)),
            }
        }
        _ => Err(RuntimeError::operate(RetCode::NotImplemented, &op.name)),
    }
}

/// Call the member overloading `op.code`, if the object has one
fn overloaded_operator(
    object: &ObjectRef,
    engine: &Engine,
    op: &Operation<'_>,
    this: &Variant,
) -> RtResult<Option<Variant>> {
    let Some(name) = op.code.operator_name() else {
        return Ok(None);
    };
    let Some((method, _)) = find_member(Some(object), object.class(), &RString::from(name), op.flags) else {
        return Ok(None);
    };
    let method = bind_to(method, this);
    call_member(engine, &method, op, this).map(Some)
}

/// Operations on void, null, booleans, numbers and strings
fn operate_primitive(value: &Variant, engine: &Engine, op: &Operation<'_>) -> RtResult<Variant> {
    if op.name.is_empty() {
        return match op.code {
            code if code.is_unary() => value.unary(code),
            code if code.is_binary() => {
                let rhs = op.args.get(0);
                if code == OpCode::Add && value.is_string() && rhs.is_object() {
                    let rhs = rhs.stringify(engine)?;
                    return Ok(Variant::String(value.to_rstring().concat(&rhs)));
                }
                value.binary(code, rhs)
            }
            OpCode::DGet => Ok(value.clone()),
            OpCode::FuncCall => Err(TemporaryException::cannot_call_non_function().into()),
            OpCode::New => Err(TemporaryException::instance_from_non_class().into()),
            OpCode::InstanceOf => Ok(Variant::Boolean(class::is_instance(
                engine,
                value,
                op.args.get(0),
            ))),
            OpCode::IGet | OpCode::ISet | OpCode::IDelete => {
                let Some(name) = op.code.operator_name() else {
                    return Err(RuntimeError::operate(RetCode::NotImplemented, &op.name));
                };
                let class = engine.primitive_class(value.get_type());
                match find_in_class_chain(class, &RString::from(name)) {
                    Some((method, _)) => call_member(engine, &bind_to(method, value), op, value),
                    None => Err(RuntimeError::operate(RetCode::NotImplemented, &op.name)),
                }
            }
            _ => Err(RuntimeError::operate(RetCode::NotImplemented, &op.name)),
        };
    }

    let class = engine.primitive_class(value.get_type());
    let found = find_member(None, class, &op.name, op.flags);
    match op.code {
        OpCode::DGet => match found {
            Some((member, attr)) => read_member(engine, member, attr, op.flags, value),
            None if op.flags.contains(OperateFlags::MUST_EXIST) => Err(not_found(&op.name)),
            None => Ok(Variant::Void),
        },
        OpCode::DSet => match found {
            Some((accessor, attr)) if attr.is_property() => {
                write_property(engine, &accessor, op.args.get(0), value).map(|_| Variant::Void)
            }
            _ => Err(RuntimeError::operate(RetCode::MemberIsReadOnly, &op.name)),
        },
        OpCode::FuncCall => {
            let Some((member, attr)) = found else {
                return Err(not_found(&op.name));
            };
            let callee = read_member(engine, member, attr, op.flags, value)?;
            call_member(engine, &callee, op, value)
        }
        _ => {
            let Some((member, attr)) = found else {
                return Err(not_found(&op.name));
            };
            let member = read_member(engine, member, attr, op.flags, value)?;
            member.operate(engine, op.on_self())
        }
    }
}

/// Enumerate the members of a value
///
/// Dictionaries yield their entries; other objects yield their own members,
/// hidden ones only with [`OperateFlags::INCLUDE_HIDDEN`]. The callback
/// returns false to stop. Members are snapshotted first, so the callback
/// may modify the object.
pub fn enum_members<F>(engine: &Engine, value: &Variant, flags: OperateFlags, mut callback: F) -> RtResult<()>
where
    F: FnMut(&RString, MemberAttribute, &Variant) -> RtResult<bool>,
{
    let Some(object) = value.as_object() else {
        return Ok(());
    };
    if !object.is_valid() {
        return Err(RuntimeError::operate(RetCode::InvalidObject, &RString::empty()));
    }
    if let Some(dictionary) = engine.dictionary_state(object) {
        for (key, item) in dictionary.entries() {
            if !callback(&key, MemberAttribute::default_member(), &item)? {
                break;
            }
        }
        return Ok(());
    }
    let snapshot: Vec<_> = object
        .members()
        .iter_visible(flags.contains(OperateFlags::INCLUDE_HIDDEN))
        .map(|sym| (sym.name.clone(), sym.attribute, sym.value.clone()))
        .collect();
    for (name, attr, item) in snapshot {
        if !callback(&name, attr, &item)? {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::attribute::{Mutability, Override};

    #[test]
    fn test_operator_names() {
        assert_eq!(OpCode::Add.operator_name(), Some("+"));
        assert_eq!(OpCode::IGet.operator_name(), Some("[]"));
        assert_eq!(OpCode::DGet.operator_name(), None);
        assert!(OpCode::Minus.is_unary());
        assert!(OpCode::Lesser.is_binary());
        assert!(!OpCode::ISet.is_binary());
    }

    #[test]
    fn test_own_before_class() {
        let engine = Engine::new();
        let object = engine.new_object();
        let class = object.class().unwrap();
        class.define_member(
            "shared",
            Variant::from(1),
            MemberAttribute::default_member(),
            SymbolFlags::empty(),
        );
        let value = Variant::object(object.clone());
        assert_eq!(value.get_property(&engine, "shared").unwrap(), Variant::from(1));

        value.set_property(&engine, "shared", 2).unwrap();
        assert_eq!(value.get_property(&engine, "shared").unwrap(), Variant::from(2));
        // the class table is untouched
        assert_eq!(class.own_value(&RString::from("shared")), Some(Variant::from(1)));
        class.members_mut().remove(&RString::from("shared"));
    }

    #[test]
    fn test_missing_member() {
        let engine = Engine::new();
        let value = Variant::object(engine.new_object());
        assert!(value.get_property_or_void(&engine, "nothing").unwrap().is_void());
        let err = value.get_property(&engine, "nothing").unwrap_err();
        assert_eq!(err.ret_code(), Some(RetCode::MemberNotFound));
        assert_eq!(err.kind(), ErrorKind::MemberNotFound);
        assert_eq!(err.message(), "member \"nothing\" not found");

        let err = value
            .set_property_with(&engine, "nothing", 1, OperateFlags::empty(), MemberAttribute::unspecified())
            .unwrap_err();
        assert_eq!(err.ret_code(), Some(RetCode::MemberNotFound));
    }

    #[test]
    fn test_const_and_final_members() {
        let engine = Engine::new();
        let value = Variant::object(engine.new_object());
        let konst = MemberAttribute::unspecified().with_mutability(Mutability::Const);
        value
            .set_property_with(&engine, "k", 1, OperateFlags::MEMBER_ENSURE, konst)
            .unwrap();
        let err = value.set_property(&engine, "k", 2).unwrap_err();
        assert_eq!(err.ret_code(), Some(RetCode::MemberIsReadOnly));
        assert_eq!(err.kind(), ErrorKind::IllegalMemberAccess);
        assert_eq!(value.get_property(&engine, "k").unwrap(), Variant::from(1));

        let fin = MemberAttribute::unspecified().with_override(Override::Final);
        value
            .set_property_with(&engine, "f", 1, OperateFlags::MEMBER_ENSURE, fin)
            .unwrap();
        let err = value.set_property(&engine, "f", 2).unwrap_err();
        assert_eq!(err.ret_code(), Some(RetCode::MemberIsFinal));
    }

    #[test]
    fn test_hidden_members_skip_enumeration() {
        let engine = Engine::new();
        let value = Variant::object(engine.new_object());
        value.set_property(&engine, "shown", 1).unwrap();
        value
            .set_property_with(
                &engine,
                "secret",
                2,
                OperateFlags::MEMBER_ENSURE | OperateFlags::HIDDEN_MEMBER,
                MemberAttribute::unspecified(),
            )
            .unwrap();

        let mut names = Vec::new();
        enum_members(&engine, &value, OperateFlags::empty(), |name, _, _| {
            names.push(name.to_string());
            Ok(true)
        })
        .unwrap();
        assert_eq!(names, vec!["shown".to_string()]);

        let mut count = 0;
        enum_members(&engine, &value, OperateFlags::INCLUDE_HIDDEN, |_, _, _| {
            count += 1;
            Ok(true)
        })
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_delete_member() {
        let engine = Engine::new();
        let value = Variant::object(engine.new_object());
        value.set_property(&engine, "x", 1).unwrap();
        assert!(value.delete_member(&engine, "x").unwrap());
        assert!(!value.delete_member(&engine, "x").unwrap());
        assert!(value.get_property_or_void(&engine, "x").unwrap().is_void());
    }

    #[test]
    fn test_invalid_object() {
        let engine = Engine::new();
        let object = engine.new_object();
        object.invalidate();
        let err = Variant::object(object)
            .get_property(&engine, "x")
            .unwrap_err();
        assert_eq!(err.ret_code(), Some(RetCode::InvalidObject));
        assert_eq!(err.kind(), ErrorKind::InvalidObject);
    }

    #[test]
    fn test_call_non_function() {
        let engine = Engine::new();
        let value = Variant::object(engine.new_object());
        let err = value.call(&engine, &NO_ARGS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(err.message(), "cannot call non-function object");

        let err = Variant::from(3).call(&engine, &NO_ARGS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_dynamic_method_binds_to_receiver() {
        let engine = Engine::new();
        let function = engine.new_function("whoami", |call| Ok(call.this.clone()));
        let a = engine.new_object();
        let b = engine.new_object();
        a.define_member(
            "whoami",
            Variant::dynamic(function),
            MemberAttribute::default_member(),
            SymbolFlags::empty(),
        );

        let result = Variant::object(a.clone()).invoke(&engine, "whoami", &NO_ARGS).unwrap();
        assert!(result.as_object().unwrap().ptr_eq(&a));

        // reading binds the method to a; calling it later keeps a
        let method = Variant::object(a.clone()).get_property(&engine, "whoami").unwrap();
        assert!(method.bound_this().unwrap().ptr_eq(&a));
        let result = method
            .call_with_this(&engine, Variant::object(b.clone()), &NO_ARGS)
            .unwrap();
        assert!(result.as_object().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_class_members_rule_uses_callers_this() {
        let engine = Engine::new();
        let function = engine.new_function("whoami", |call| Ok(call.this.clone()));
        let a = engine.new_object();
        let b = engine.new_object();
        let bound = Variant::bound(function, &a);
        let result = bound
            .operate(
                &engine,
                Operation::new(OpCode::FuncCall)
                    .with_flags(OperateFlags::USE_CLASS_MEMBERS_RULE)
                    .with_this(Variant::object(b.clone())),
            )
            .unwrap();
        assert!(result.as_object().unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_object_identity_operators() {
        let engine = Engine::new();
        let a = Variant::object(engine.new_object());
        let b = Variant::object(engine.new_object());
        assert!(a.binary_op(&engine, OpCode::DiscEqual, &a).unwrap().to_bool());
        assert!(!a.binary_op(&engine, OpCode::Equal, &b).unwrap().to_bool());
        let err = a.binary_op(&engine, OpCode::Sub, &b).unwrap_err();
        assert_eq!(err.ret_code(), Some(RetCode::NotImplemented));
    }

    #[test]
    fn test_primitive_operators() {
        let engine = Engine::new();
        let sum = Variant::from(2).binary_op(&engine, OpCode::Add, &Variant::from(3)).unwrap();
        assert_eq!(sum, Variant::from(5));
        let neg = Variant::from(2.5).unary_op(&engine, OpCode::Minus).unwrap();
        assert_eq!(neg, Variant::from(-2.5));
        let err = Variant::from(1)
            .binary_op(&engine, OpCode::Idiv, &Variant::from(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn test_property_member_accessors() {
        let engine = Engine::new();
        let object = engine.new_object();
        let store = engine.new_object();
        let getter_store = store.clone();
        let setter_store = store.clone();
        let property = engine.new_property(
            "level",
            Some(std::sync::Arc::new(move |_call: &crate::runtime::function::CallInfo<'_>| {
                Ok(getter_store
                    .own_value(&RString::from("raw"))
                    .unwrap_or(Variant::Integer(0)))
            })),
            Some(std::sync::Arc::new(
                move |_call: &crate::runtime::function::CallInfo<'_>, value: &Variant| {
                    setter_store.define_member(
                        "raw",
                        Variant::Integer(value.to_integer() * 10),
                        MemberAttribute::default_member(),
                        SymbolFlags::empty(),
                    );
                    Ok(())
                },
            )),
        );
        object.define_member(
            "level",
            Variant::object(property),
            MemberAttribute::default_member()
                .with_property(crate::runtime::attribute::PropertyControl::Property),
            SymbolFlags::empty(),
        );
        let value = Variant::object(object);
        value.set_property(&engine, "level", 4).unwrap();
        assert_eq!(value.get_property(&engine, "level").unwrap(), Variant::from(40));

        let raw = value
            .operate(
                &engine,
                Operation::member(OpCode::DGet, "level").with_flags(OperateFlags::IGNORE_PROPERTY),
            )
            .unwrap();
        assert!(raw.is_object());
    }

    #[test]
    fn test_indexed_access_on_plain_object() {
        let engine = Engine::new();
        let value = Variant::object(engine.new_object());
        value
            .index_set(&engine, Variant::from("key"), Variant::from(9))
            .unwrap();
        assert_eq!(value.get_property(&engine, "key").unwrap(), Variant::from(9));
        assert_eq!(value.index_get(&engine, Variant::from("key")).unwrap(), Variant::from(9));
    }
}
