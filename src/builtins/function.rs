//! Function and Property members

use super::method;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::class::CoreClasses;
use crate::runtime::function::{Args, CallInfo};
use crate::runtime::object::ObjectBody;
use crate::runtime::operate::Dispatch;
use crate::runtime::string::RString;
use crate::value::Variant;

fn body_name(call: &CallInfo<'_>) -> RtResult<Variant> {
    let object = call.this_object()?;
    match object.body() {
        ObjectBody::Function(function) => Ok(Variant::String(function.name().clone())),
        ObjectBody::Property(property) => Ok(Variant::String(property.name().clone())),
        _ => Err(TemporaryException::specify_instance_of(&RString::from("Function")).into()),
    }
}

pub(super) fn register(core: &CoreClasses) {
    let function = &core.function_class;

    core.bind_getter(function, "name", body_name);

    // call(args...): invoke with the function's own binding
    core.bind_function(function, "call", method(), |call| {
        call.this.call(call.engine, call.args)
    });

    // apply(this, args...): invoke with an explicit `this`
    core.bind_function(function, "apply", method(), |call| {
        call.args.expect_count(1, None)?;
        let rest = Args::from(call.args.as_slice()[1..].to_vec());
        call.this.call_with_this(call.engine, call.arg(0).clone(), &rest)
    });

    core.bind_function(function, "bind", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let function = call.this_object()?;
        let target = call
            .arg(0)
            .as_object()
            .ok_or_else(TemporaryException::null_object)?;
        Ok(Variant::bound(function.clone(), target))
    });

    core.bind_getter(&core.property_class, "name", body_name);
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::runtime::function::Args;
    use crate::runtime::operate::Dispatch;
    use crate::value::Variant;

    #[test]
    fn test_call_apply_bind() {
        let engine = Engine::new();
        let f = Variant::object(engine.new_function("echoThis", |call| Ok(call.this.clone())));
        assert_eq!(f.get_property(&engine, "name").unwrap(), Variant::from("echoThis"));

        let target = engine.new_object();
        let result = f
            .invoke(&engine, "apply", &Args::from([Variant::object(target.clone())]))
            .unwrap();
        assert!(result.as_object().unwrap().ptr_eq(&target));

        let bound = f
            .invoke(&engine, "bind", &Args::from([Variant::object(target.clone())]))
            .unwrap();
        let result = bound.call(&engine, &Args::new()).unwrap();
        assert!(result.as_object().unwrap().ptr_eq(&target));
    }

    #[test]
    fn test_call_passes_arguments() {
        let engine = Engine::new();
        let add = Variant::object(engine.new_function("add", |call| {
            Ok(Variant::from(call.arg(0).to_integer() + call.arg(1).to_integer()))
        }));
        let result = add
            .invoke(&engine, "call", &Args::from([Variant::from(2), Variant::from(3)]))
            .unwrap();
        assert_eq!(result, Variant::from(5));
    }
}
