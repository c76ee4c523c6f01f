//! Exception classes and SourcePoint
//!
//! `Throwable` carries `message`, `trace` (an Array of source points) and
//! `cause`. Every other exception class in [`EXCEPTION_CLASSES`] derives from
//! it and only chains its `initialize`.

use super::{bind_chained_initialize, bind_empty_construct, method};
use crate::error::{EXCEPTION_CLASSES, RtResult};
use crate::runtime::attribute::{MemberAttribute, OperateFlags};
use crate::runtime::class::{CoreClasses, call_super, instantiate};
use crate::runtime::function::{CallInfo, NO_ARGS};
use crate::runtime::object::ObjectRef;
use crate::runtime::operate::Dispatch;
use crate::runtime::string::RString;
use crate::value::Variant;

/// Create a member on `this` regardless of what the class chain defines
fn ensure_member(call: &CallInfo<'_>, name: &str, value: Variant) -> RtResult<()> {
    call.this.set_property_with(
        call.engine,
        name,
        value,
        OperateFlags::MEMBER_ENSURE | OperateFlags::INSTANCE_MEMBER_ONLY,
        MemberAttribute::unspecified(),
    )
}

pub(super) fn register(core: &CoreClasses) -> (ObjectRef, Vec<(&'static str, ObjectRef)>) {
    let source_point = register_source_point(core);

    let mut classes: Vec<(&'static str, ObjectRef)> = Vec::with_capacity(EXCEPTION_CLASSES.len());
    for info in EXCEPTION_CLASSES {
        let parent = match info.parent {
            None => core.object_class.clone(),
            Some(parent) => match classes.iter().find(|(name, _)| *name == parent) {
                Some((_, class)) => class.clone(),
                None => {
                    log::error!("exception class {} listed before its parent {}", info.class_name, parent);
                    continue;
                }
            },
        };
        let class = core.builtin_class(info.class_name, &parent);
        if info.parent.is_none() {
            register_throwable(core, &class);
        } else {
            bind_empty_construct(core, &class);
            bind_chained_initialize(core, &class);
        }
        classes.push((info.class_name, class));
    }
    (source_point, classes)
}

fn register_throwable(core: &CoreClasses, class: &ObjectRef) {
    core.bind_function(class, "construct", method(), |call| {
        ensure_member(call, "message", Variant::string(""))?;
        ensure_member(call, "trace", call.engine.new_array(Vec::new())?)?;
        ensure_member(call, "cause", Variant::Null)?;
        Ok(Variant::Void)
    });

    // initialize(message = "")
    let defining = class.downgrade();
    core.bind_function(class, "initialize", method(), move |call| {
        if let Some(class) = defining.upgrade() {
            call_super(call.engine, &class, "initialize", call.this, &NO_ARGS)?;
        }
        if let Some(message) = call.args.arg(0) {
            let message = message.stringify(call.engine)?;
            call.this.set_property(call.engine, "message", message)?;
        }
        Ok(Variant::Void)
    });

    core.bind_function(class, "addTrace", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let trace = call.this.get_property(call.engine, "trace")?;
        trace.invoke(call.engine, "push", call.args)?;
        Ok(Variant::Void)
    });

    // "message at <first trace point>"
    core.bind_function(class, "toString", method(), |call| {
        let message = call.this.get_property(call.engine, "message")?.stringify(call.engine)?;
        let trace = call.this.get_property(call.engine, "trace")?;
        let first = match trace.as_object().and_then(|o| call.engine.array_state(o)) {
            Some(array) if !array.is_empty() => array.lock().get(0),
            _ => return Ok(Variant::String(message)),
        };
        let point = first.stringify(call.engine)?;
        Ok(Variant::string(format!("{} at {}", message, point)))
    });

    // An exception class converts itself into an instance; an instance stays as is
    core.bind_function(class, "toException", method(), |call| {
        match call.this.as_object() {
            Some(object) if object.is_class() => instantiate(call.engine, object, call.args),
            _ => Ok(call.this.clone()),
        }
    });
}

fn register_source_point(core: &CoreClasses) -> ObjectRef {
    let class = core.builtin_class("SourcePoint", &core.object_class);

    core.bind_function(&class, "construct", method(), |call| {
        ensure_member(call, "package", Variant::Null)?;
        ensure_member(call, "position", Variant::Integer(-1))?;
        ensure_member(call, "function", Variant::Null)?;
        Ok(Variant::Void)
    });

    // initialize(package, position, function)
    core.bind_function(&class, "initialize", method(), |call| {
        call.args.expect_count(0, Some(3))?;
        let source_point = &call.engine.builtins().source_point_class;
        call_super(call.engine, source_point, "initialize", call.this, &NO_ARGS)?;
        for (index, name) in ["package", "position", "function"].into_iter().enumerate() {
            if let Some(value) = call.args.arg(index) {
                call.this.set_property(call.engine, name, value.clone())?;
            }
        }
        Ok(Variant::Void)
    });

    // "package:position: in function"
    core.bind_function(&class, "toString", method(), |call| {
        let engine = call.engine;
        let package = call.this.get_property(engine, "package")?;
        let position = call.this.get_property(engine, "position")?;
        let function = call.this.get_property(engine, "function")?;

        let mut out = String::new();
        if package.is_null() || package.is_void() {
            out.push_str("<unknown>");
        } else {
            out.push_str(&package.stringify(engine)?.to_string());
        }
        out.push(':');
        match position.to_integer() {
            p if p < 0 => out.push_str("<unknown>"),
            p => out.push_str(&p.to_string()),
        }
        if !(function.is_null() || function.is_void()) {
            let name = match function.get_property_or_void(engine, "name")? {
                Variant::String(name) => name,
                other => other.stringify(engine)?,
            };
            out.push_str(": in ");
            out.push_str(&name.to_string());
        }
        Ok(Variant::String(RString::from(out)))
    });

    class
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::{EXCEPTION_CLASSES, ErrorKind, RuntimeError};
    use crate::runtime::function::{Args, NO_ARGS};
    use crate::runtime::operate::Dispatch;
    use crate::value::Variant;

    fn class(engine: &Engine, name: &str) -> Variant {
        Variant::object(engine.exception_class(name).unwrap())
    }

    #[test]
    fn test_every_class_is_registered_under_its_parent() {
        let engine = Engine::new();
        for info in EXCEPTION_CLASSES {
            let class = engine.exception_class(info.class_name).unwrap();
            let super_name = class.super_class().and_then(|s| s.class_name()).unwrap();
            assert_eq!(super_name, info.parent.unwrap_or("Object"));
        }
    }

    #[test]
    fn test_construct_and_initialize() {
        let engine = Engine::new();
        let e = class(&engine, "IllegalArgumentException")
            .create_new(&engine, &Args::from([Variant::from("bad value")]))
            .unwrap();
        assert_eq!(e.get_property(&engine, "message").unwrap(), Variant::from("bad value"));
        assert!(e.get_property(&engine, "cause").unwrap().is_null());
        assert!(e
            .is_instance_of(&engine, &class(&engine, "RuntimeException"))
            .unwrap());
        assert_eq!(e.stringify(&engine).unwrap(), "bad value");

        let bare = class(&engine, "Exception").create_new(&engine, &NO_ARGS).unwrap();
        assert_eq!(bare.get_property(&engine, "message").unwrap(), Variant::from(""));
    }

    #[test]
    fn test_trace_and_to_string() {
        let engine = Engine::new();
        let e = class(&engine, "Exception")
            .create_new(&engine, &Args::from([Variant::from("boom")]))
            .unwrap();
        let source_point = Variant::object(engine.builtins().source_point_class.clone());
        let function = Variant::object(engine.new_function("main", |_| Ok(Variant::Void)));
        let point = source_point
            .create_new(
                &engine,
                &Args::from([Variant::from("demo.rs"), Variant::from(12), function]),
            )
            .unwrap();
        assert_eq!(point.stringify(&engine).unwrap(), "demo.rs:12: in main");
        e.invoke(&engine, "addTrace", &Args::from([point])).unwrap();
        assert_eq!(e.stringify(&engine).unwrap(), "boom at demo.rs:12: in main");

        let unknown = source_point.create_new(&engine, &NO_ARGS).unwrap();
        assert_eq!(unknown.stringify(&engine).unwrap(), "<unknown>:<unknown>");
    }

    #[test]
    fn test_to_exception() {
        let engine = Engine::new();
        // class objects do not see instance methods; call it explicitly
        let to_exception = engine
            .exception_class("Throwable")
            .unwrap()
            .own_value(&"toException".into())
            .unwrap();
        let from_class = to_exception
            .call_with_this(&engine, class(&engine, "IOException"), &Args::from([Variant::from("disk")]))
            .unwrap();
        assert_eq!(from_class.get_property(&engine, "message").unwrap(), Variant::from("disk"));
        assert!(from_class.is_instance_of(&engine, &class(&engine, "IOException")).unwrap());
        let same = from_class.invoke(&engine, "toException", &NO_ARGS).unwrap();
        assert!(same.as_object().unwrap().ptr_eq(from_class.as_object().unwrap()));
    }

    #[test]
    fn test_thrown_kind_follows_class_chain() {
        let engine = Engine::new();
        let e = class(&engine, "CharConversionException")
            .create_new(&engine, &Args::from([Variant::from("bad utf-8")]))
            .unwrap();
        let err = RuntimeError::Thrown(e);
        assert_eq!(err.kind(), ErrorKind::CharConversion);
        assert_eq!(err.message(), "bad utf-8");
        assert_eq!(err.to_string(), "CharConversionException: bad utf-8");
    }
}
