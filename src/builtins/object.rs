//! Object and Class members

use super::{bind_empty_construct, method};
use crate::error::{RtResult, TemporaryException};
use crate::runtime::class::{self, CoreClasses};
use crate::runtime::attribute::OperateFlags;
use crate::runtime::function::{Args, CallInfo};
use crate::runtime::operate::{Dispatch, find_member};
use crate::runtime::string::RString;
use crate::value::Variant;

pub(super) fn register(core: &CoreClasses) {
    register_object(core);
    register_class(core);
}

fn register_object(core: &CoreClasses) {
    let object = &core.object_class;

    bind_empty_construct(core, object);
    core.bind_function(object, "initialize", method(), |_| Ok(Variant::Void));

    core.bind_function(object, "toString", method(), |call| {
        let name = class::class_of(call.engine, call.this)
            .and_then(|c| c.class_name())
            .unwrap_or_else(|| RString::from("Object"));
        Ok(Variant::string(format!("({} object)", name)))
    });

    core.bind_getter(object, "class", |call| {
        Ok(class::class_of(call.engine, call.this)
            .map(Variant::object)
            .unwrap_or(Variant::Null))
    });

    core.bind_function(object, "isInstanceOf", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        Ok(Variant::Boolean(class::is_instance(call.engine, call.this, call.arg(0))))
    });

    core.bind_function(object, "hasMember", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let name = call.arg(0).stringify(call.engine)?;
        let class = class::class_of(call.engine, call.this);
        let found = find_member(call.this.as_object(), class, &name, OperateFlags::empty());
        Ok(Variant::Boolean(found.is_some()))
    });

    core.bind_function(object, "invalidate", method(), |call| {
        Ok(Variant::Boolean(call.this_object()?.invalidate()))
    });

    core.bind_getter(object, "isValid", |call| {
        Ok(Variant::Boolean(call.this.as_object().is_none_or(|o| o.is_valid())))
    });

    // synchronize(function): run function holding the object's lock
    core.bind_function(object, "synchronize", method(), |call| {
        call.args.expect_count(1, None)?;
        let object = call.this_object()?;
        let _guard = object.synchronize();
        let rest = Args::from(call.args.as_slice()[1..].to_vec());
        call.arg(0).call(call.engine, &rest)
    });
}

fn register_class(core: &CoreClasses) {
    let class = &core.class_class;

    core.bind_function(class, "new", method(), |call: &CallInfo<'_>| {
        let target = call.this_object()?;
        class::instantiate(call.engine, target, call.args)
    });

    core.bind_getter(class, "name", |call| {
        let target = call.this_object()?;
        target
            .class_name()
            .map(Variant::String)
            .ok_or_else(|| TemporaryException::specify_instance_of(&RString::from("Class")).into())
    });

    core.bind_getter(class, "superClass", |call| {
        Ok(call
            .this_object()?
            .super_class()
            .map(Variant::object)
            .unwrap_or(Variant::Null))
    });

    core.bind_function(class, "toString", method(), |call| -> RtResult<Variant> {
        let name = call.this_object()?.class_name().unwrap_or_default();
        Ok(Variant::string(format!("(class {})", name)))
    });
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::ErrorKind;
    use crate::runtime::class::ClassInfo;
    use crate::runtime::function::{Args, NO_ARGS};
    use crate::runtime::operate::Dispatch;
    use crate::value::Variant;

    #[test]
    fn test_to_string_and_class() {
        let engine = Engine::new();
        let object = Variant::object(engine.new_object());
        assert_eq!(object.stringify(&engine).unwrap(), "(Object object)");
        let class = object.get_property(&engine, "class").unwrap();
        assert!(class.as_object().unwrap().ptr_eq(&engine.core().object_class));
        assert_eq!(class.get_property(&engine, "name").unwrap(), Variant::from("Object"));
        assert_eq!(class.stringify(&engine).unwrap(), "(class Object)");
        assert!(class.get_property(&engine, "superClass").unwrap().is_null());
    }

    #[test]
    fn test_new_runs_initialize_with_args() {
        let engine = Engine::new();
        let core = engine.core();
        let point = core
            .new_class(ClassInfo::new("Point", Some(core.object_class.clone())))
            .unwrap();
        core.bind_function(&point, "initialize", super::method(), |call| {
            let this = call.this;
            this.set_property(call.engine, "x", call.arg(0).clone())?;
            this.set_property(call.engine, "y", call.arg(1).clone())?;
            Ok(Variant::Void)
        });
        let p = Variant::object(point.clone())
            .create_new(&engine, &Args::from([Variant::from(1), Variant::from(2)]))
            .unwrap();
        assert_eq!(p.get_property(&engine, "y").unwrap(), Variant::from(2));
        assert!(p
            .invoke(&engine, "isInstanceOf", &Args::from([Variant::object(point)]))
            .unwrap()
            .to_bool());
        assert!(p.invoke(&engine, "hasMember", &Args::from([Variant::from("x")])).unwrap().to_bool());
        assert!(p.invoke(&engine, "hasMember", &Args::from([Variant::from("toString")])).unwrap().to_bool());
        assert!(!p.invoke(&engine, "hasMember", &Args::from([Variant::from("z")])).unwrap().to_bool());
    }

    #[test]
    fn test_invalidate_then_access() {
        let engine = Engine::new();
        let object = Variant::object(engine.new_object());
        object.set_property(&engine, "a", 1).unwrap();
        assert!(object.invoke(&engine, "invalidate", &NO_ARGS).unwrap().to_bool());
        let err = object.get_property(&engine, "a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidObject);
    }

    #[test]
    fn test_synchronize_calls_function() {
        let engine = Engine::new();
        let object = Variant::object(engine.new_object());
        let f = engine.new_function("twice", |call| Ok(Variant::from(call.arg(0).to_integer() * 2)));
        let result = object
            .invoke(&engine, "synchronize", &Args::from([Variant::object(f), Variant::from(21)]))
            .unwrap();
        assert_eq!(result, Variant::from(42));
    }
}
