//! Classes of primitive values
//!
//! Primitives are not objects; operations naming a member on a primitive
//! are looked up in the class for its type with the primitive itself as
//! `this`. Each class defines its own `new`, which converts its argument
//! instead of instantiating.

use super::method;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::class::CoreClasses;
use crate::runtime::function::CallInfo;
use crate::runtime::object::ObjectRef;
use crate::runtime::string::RString;
use crate::value::Variant;

pub(super) struct Primitives {
    pub primitive: ObjectRef,
    pub number: ObjectRef,
    pub string: ObjectRef,
    pub integer: ObjectRef,
    pub real: ObjectRef,
    pub boolean: ObjectRef,
    pub void: ObjectRef,
    pub null: ObjectRef,
}

pub(super) fn register(core: &CoreClasses) -> Primitives {
    let primitive = core.builtin_class("Primitive", &core.object_class);
    let number = core.builtin_class("Number", &primitive);
    let string = core.builtin_class("String", &primitive);
    let integer = core.builtin_class("Integer", &number);
    let real = core.builtin_class("Real", &number);
    let boolean = core.builtin_class("Boolean", &primitive);
    let void = core.builtin_class("Void", &primitive);
    let null = core.builtin_class("Null", &primitive);

    register_primitive(core, &primitive);
    register_string(core, &string);

    for abstract_class in [&primitive, &number] {
        core.bind_function(abstract_class, "new", method(), |_| {
            Err(TemporaryException::cannot_instantiate().into())
        });
    }
    core.bind_function(&integer, "new", method(), |call| Ok(Variant::Integer(call.arg(0).to_integer())));
    core.bind_function(&real, "new", method(), |call| Ok(Variant::Real(call.arg(0).to_real())));
    core.bind_function(&boolean, "new", method(), |call| Ok(Variant::Boolean(call.arg(0).to_bool())));
    core.bind_function(&void, "new", method(), |_| Ok(Variant::Void));
    core.bind_function(&null, "new", method(), |_| Ok(Variant::Null));

    Primitives {
        primitive,
        number,
        string,
        integer,
        real,
        boolean,
        void,
        null,
    }
}

fn register_primitive(core: &CoreClasses, class: &ObjectRef) {
    core.bind_function(class, "toString", method(), |call| Ok(Variant::String(call.this.to_rstring())));
    core.bind_function(class, "toInteger", method(), |call| Ok(Variant::Integer(call.this.to_integer())));
    core.bind_function(class, "toReal", method(), |call| Ok(Variant::Real(call.this.to_real())));
    core.bind_function(class, "toBoolean", method(), |call| Ok(Variant::Boolean(call.this.to_bool())));
    core.bind_function(class, "toNumber", method(), |call| Ok(call.this.to_number()));
    core.bind_function(class, "dump", method(), |call| {
        call.engine.to_structured(call.this).map(Variant::String)
    });
}

fn this_string(call: &CallInfo<'_>) -> RString {
    call.this.to_rstring()
}

/// Non-negative integer argument, if given
fn count_arg(value: &Variant) -> Option<usize> {
    match value {
        Variant::Void => None,
        other => Some(usize::try_from(other.to_integer()).unwrap_or(0)),
    }
}

fn char_at(s: &RString, index: i64) -> RString {
    let index = if index < 0 { index + s.len() as i64 } else { index };
    match usize::try_from(index) {
        Ok(i) if i < s.len() => s.substring(i, 1),
        _ => RString::empty(),
    }
}

fn register_string(core: &CoreClasses, class: &ObjectRef) {
    core.bind_function(class, "new", method(), |call| {
        call.arg(0).stringify(call.engine).map(Variant::String)
    });

    core.bind_getter(class, "length", |call| Ok(Variant::from(this_string(call).len())));

    core.bind_function(class, "charAt", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        Ok(Variant::String(char_at(&this_string(call), call.arg(0).to_integer())))
    });
    core.bind_function(class, "[]", method(), |call| {
        Ok(Variant::String(char_at(&this_string(call), call.arg(0).to_integer())))
    });

    // substring(offset, length = to end)
    core.bind_function(class, "substring", method(), |call| {
        call.args.expect_count(1, Some(2))?;
        let s = this_string(call);
        let offset = count_arg(call.arg(0)).unwrap_or(0);
        let length = count_arg(call.arg(1)).unwrap_or(RString::NPOS);
        Ok(Variant::String(s.substring(offset, length)))
    });

    core.bind_function(class, "indexOf", method(), |call| -> RtResult<Variant> {
        call.args.expect_count(1, Some(2))?;
        let needle = call.arg(0).stringify(call.engine)?;
        let from = count_arg(call.arg(1)).unwrap_or(0);
        Ok(match this_string(call).find(&needle, from) {
            Some(i) => Variant::from(i),
            None => Variant::Integer(-1),
        })
    });

    core.bind_function(class, "startsWith", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let prefix = call.arg(0).stringify(call.engine)?;
        Ok(Variant::Boolean(this_string(call).starts_with(&prefix)))
    });

    // replace(old, new, all = true)
    core.bind_function(class, "replace", method(), |call| {
        call.args.expect_count(2, Some(3))?;
        let old = call.arg(0).stringify(call.engine)?;
        let new = call.arg(1).stringify(call.engine)?;
        let all = call.args.arg(2).is_none_or(Variant::to_bool);
        Ok(Variant::String(this_string(call).replace(&old, &new, all)))
    });

    core.bind_function(class, "times", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let count = count_arg(call.arg(0)).unwrap_or(0);
        this_string(call).times(count).map(Variant::String)
    });

    core.bind_function(class, "escape", method(), |call| {
        Ok(Variant::String(this_string(call).escape(usize::MAX, false)))
    });

    core.bind_function(class, "toUpperCase", method(), |call| {
        Ok(Variant::String(this_string(call).to_uppercase()))
    });
    core.bind_function(class, "toLowerCase", method(), |call| {
        Ok(Variant::String(this_string(call).to_lowercase()))
    });
}
