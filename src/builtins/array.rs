//! The Array class

use super::method;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::array::{ArrayInstance, SortOrder, sort_values};
use crate::runtime::class::{CoreClasses, call_super};
use crate::runtime::function::{CallInfo, NO_ARGS};
use crate::runtime::object::ObjectRef;
use crate::runtime::string::RString;
use crate::runtime::structured;
use crate::value::Variant;
use std::sync::Arc;

fn state(call: &CallInfo<'_>) -> RtResult<Arc<ArrayInstance>> {
    call.native::<ArrayInstance>(call.engine.builtins().ids.array)
}

/// Elements of an Array argument
fn array_arg(call: &CallInfo<'_>, value: &Variant, method: &str) -> RtResult<Vec<Variant>> {
    match value.as_object().and_then(|o| call.engine.array_state(o)) {
        Some(array) => Ok(array.snapshot()),
        None => Err(illegal_class(call, value, method)),
    }
}

fn illegal_class(call: &CallInfo<'_>, value: &Variant, method: &str) -> crate::error::RuntimeError {
    let class_name = crate::runtime::class::class_of(call.engine, value)
        .and_then(|c| c.class_name())
        .unwrap_or_default();
    TemporaryException::illegal_argument_class(&RString::from(method), &class_name).into()
}

fn join(call: &CallInfo<'_>, items: &[Variant], separator: &RString) -> RtResult<RString> {
    let mut out = RString::empty();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.append(separator);
        }
        out.append(&item.stringify(call.engine)?);
    }
    Ok(out)
}

pub(super) fn register(core: &CoreClasses) -> ObjectRef {
    let class = core.builtin_class("Array", &core.object_class);

    core.bind_function(&class, "construct", method(), |call| {
        let id = call.engine.builtins().ids.array;
        call.this_object()?.set_native(id, Arc::new(ArrayInstance::default()))?;
        Ok(Variant::Void)
    });

    // initialize(values...): the array holds its arguments
    core.bind_function(&class, "initialize", method(), |call| {
        let array_class = &call.engine.builtins().array_class;
        call_super(call.engine, array_class, "initialize", call.this, &NO_ARGS)?;
        state(call)?.lock().assign(call.args.as_slice().to_vec());
        Ok(Variant::Void)
    });

    core.bind_function(&class, "[]", method(), |call| {
        Ok(state(call)?.lock().get(call.arg(0).to_integer()))
    });
    core.bind_function(&class, "[]=", method(), |call| {
        state(call)?.lock().set(call.arg(0).to_integer(), call.arg(1).clone())?;
        Ok(Variant::Void)
    });
    core.bind_function(&class, "delete[]", method(), |call| {
        state(call)?.lock().erase(call.arg(0).to_integer())
    });

    for name in ["length", "count"] {
        core.bind_accessors(
            &class,
            name,
            |call| Ok(Variant::from(state(call)?.len())),
            |call, value| {
                let len = usize::try_from(value.to_integer())
                    .map_err(|_| TemporaryException::illegal_argument("array length must not be negative"))?;
                state(call)?.lock().set_len(len);
                Ok(())
            },
        );
    }
    core.bind_accessors(
        &class,
        "default",
        |call| Ok(state(call)?.lock().default_value.clone()),
        |call, value| {
            state(call)?.lock().default_value = value.clone();
            Ok(())
        },
    );
    core.bind_accessors(
        &class,
        "filler",
        |call| Ok(state(call)?.lock().filler.clone()),
        |call, value| {
            state(call)?.lock().filler = value.clone();
            Ok(())
        },
    );

    core.bind_function(&class, "push", method(), |call| {
        state(call)?.lock().push(call.args.as_slice().iter().cloned());
        Ok(call.this.clone())
    });
    core.bind_function(&class, "pop", method(), |call| Ok(state(call)?.lock().pop()));
    core.bind_function(&class, "shift", method(), |call| Ok(state(call)?.lock().shift()));
    core.bind_function(&class, "unshift", method(), |call| {
        state(call)?.lock().unshift(call.args.as_slice());
        Ok(call.this.clone())
    });
    // insert(index, values...)
    core.bind_function(&class, "insert", method(), |call| {
        call.args.expect_count(1, None)?;
        let index = call.arg(0).to_integer();
        state(call)?.lock().insert(index, &call.args.as_slice()[1..])?;
        Ok(call.this.clone())
    });
    core.bind_function(&class, "erase", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        state(call)?.lock().erase(call.arg(0).to_integer())
    });
    // remove(value, all = true): number of removed elements
    core.bind_function(&class, "remove", method(), |call| {
        call.args.expect_count(1, Some(2))?;
        let all = call.args.arg(1).is_none_or(Variant::to_bool);
        Ok(Variant::from(state(call)?.lock().remove(call.arg(0), all)))
    });
    core.bind_function(&class, "clear", method(), |call| {
        state(call)?.lock().clear();
        Ok(call.this.clone())
    });
    for name in ["find", "indexOf"] {
        core.bind_function(&class, name, method(), |call| {
            call.args.expect_count(1, Some(2))?;
            let from = usize::try_from(call.arg(1).to_integer()).unwrap_or(0);
            Ok(match state(call)?.lock().find(call.arg(0), from) {
                Some(i) => Variant::from(i),
                None => Variant::Integer(-1),
            })
        });
    }
    core.bind_function(&class, "reverse", method(), |call| {
        state(call)?.lock().reverse();
        Ok(call.this.clone())
    });

    core.bind_function(&class, "concat", method(), |call| {
        let mut items = state(call)?.snapshot();
        for value in call.args.as_slice() {
            items.extend(array_arg(call, value, "concat")?);
        }
        call.engine.new_array(items)
    });

    core.bind_function(&class, "join", method(), |call| {
        let separator = match call.args.arg(0) {
            Some(sep) => sep.stringify(call.engine)?,
            None => RString::from(","),
        };
        let items = state(call)?.snapshot();
        join(call, &items, &separator).map(Variant::String)
    });

    // sort(order = "+", stable = false)
    core.bind_function(&class, "sort", method(), |call| {
        let order = SortOrder::from_arg(call.arg(0));
        let stable = call.arg(1).to_bool();
        let array = state(call)?;
        // the comparator may call back into scripts: sort a copy unlocked
        let mut items = array.snapshot();
        sort_values(call.engine, &mut items, &order, stable)?;
        array.lock().assign(items);
        Ok(call.this.clone())
    });

    // assign(source): copy the elements of another array
    core.bind_function(&class, "assign", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let items = array_arg(call, call.arg(0), "assign")?;
        state(call)?.lock().assign(items);
        Ok(call.this.clone())
    });

    // assignStruct(source): deep copy of another array
    core.bind_function(&class, "assignStruct", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        array_arg(call, call.arg(0), "assignStruct")?;
        let copy = structured::deep_copy(call.engine, call.arg(0))?;
        let items = copy
            .as_object()
            .and_then(|o| call.engine.array_state(o))
            .map(|a| a.snapshot())
            .unwrap_or_default();
        state(call)?.lock().assign(items);
        Ok(call.this.clone())
    });

    core.bind_function(&class, "dump", method(), |call| {
        call.engine.to_structured(call.this).map(Variant::String)
    });

    core.bind_function(&class, "toString", method(), |call| {
        let items = state(call)?.snapshot();
        join(call, &items, &RString::from(",")).map(Variant::String)
    });

    class
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::ErrorKind;
    use crate::runtime::function::{Args, NO_ARGS};
    use crate::runtime::operate::Dispatch;
    use crate::value::Variant;

    fn ints(values: &[i64]) -> Vec<Variant> {
        values.iter().map(|&v| Variant::from(v)).collect()
    }

    fn contents(engine: &Engine, array: &Variant) -> Vec<Variant> {
        engine.array_state(array.as_object().unwrap()).unwrap().snapshot()
    }

    #[test]
    fn test_new_with_arguments() {
        let engine = Engine::new();
        let class = Variant::object(engine.builtins().array_class.clone());
        let array = class
            .create_new(&engine, &Args::from(ints(&[1, 2, 3])))
            .unwrap();
        assert_eq!(array.get_property(&engine, "length").unwrap(), Variant::from(3));
        assert_eq!(array.index_get(&engine, Variant::from(-1)).unwrap(), Variant::from(3));
        assert!(array.index_get(&engine, Variant::from(10)).unwrap().is_void());
    }

    #[test]
    fn test_erase_middle() {
        let engine = Engine::new();
        let array = engine.new_array(ints(&[10, 20, 30])).unwrap();
        let removed = array.invoke(&engine, "erase", &Args::from([Variant::from(1)])).unwrap();
        assert_eq!(removed, Variant::from(20));
        assert_eq!(contents(&engine, &array), ints(&[10, 30]));

        let err = array
            .invoke(&engine, "erase", &Args::from([Variant::from(5)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    }

    #[test]
    fn test_write_past_end_uses_filler() {
        let engine = Engine::new();
        let array = engine.new_array(Vec::new()).unwrap();
        array.set_property(&engine, "filler", 0).unwrap();
        array.set_property(&engine, "default", -1).unwrap();
        array.index_set(&engine, Variant::from(2), Variant::from(9)).unwrap();
        assert_eq!(contents(&engine, &array), ints(&[0, 0, 9]));
        assert_eq!(array.index_get(&engine, Variant::from(7)).unwrap(), Variant::from(-1));

        array.set_property(&engine, "count", 1).unwrap();
        assert_eq!(contents(&engine, &array), ints(&[0]));
    }

    #[test]
    fn test_numeric_member_names_route_to_elements() {
        let engine = Engine::new();
        let array = engine.new_array(ints(&[5, 6])).unwrap();
        assert_eq!(array.get_property(&engine, "1").unwrap(), Variant::from(6));
        array.set_property(&engine, "0", 7).unwrap();
        assert_eq!(contents(&engine, &array), ints(&[7, 6]));
    }

    #[test]
    fn test_stack_and_queue_operations() {
        let engine = Engine::new();
        let array = engine.new_array(Vec::new()).unwrap();
        array
            .invoke(&engine, "push", &Args::from(ints(&[1, 2])))
            .unwrap();
        array.invoke(&engine, "unshift", &Args::from(ints(&[0]))).unwrap();
        assert_eq!(contents(&engine, &array), ints(&[0, 1, 2]));
        assert_eq!(array.invoke(&engine, "pop", &NO_ARGS).unwrap(), Variant::from(2));
        assert_eq!(array.invoke(&engine, "shift", &NO_ARGS).unwrap(), Variant::from(0));
        array.invoke(&engine, "clear", &NO_ARGS).unwrap();
        assert!(array.invoke(&engine, "pop", &NO_ARGS).unwrap().is_void());
    }

    #[test]
    fn test_remove_find_reverse_join() {
        let engine = Engine::new();
        let array = engine.new_array(ints(&[1, 2, 1, 3])).unwrap();
        assert_eq!(
            array.invoke(&engine, "find", &Args::from(ints(&[1, 1]))).unwrap(),
            Variant::from(2)
        );
        assert_eq!(
            array.invoke(&engine, "remove", &Args::from(ints(&[1]))).unwrap(),
            Variant::from(2)
        );
        array.invoke(&engine, "reverse", &NO_ARGS).unwrap();
        assert_eq!(
            array.invoke(&engine, "join", &Args::from([Variant::from("-")])).unwrap(),
            Variant::from("3-2")
        );
        assert_eq!(array.stringify(&engine).unwrap(), "3,2");
    }

    #[test]
    fn test_sort_modes() {
        let engine = Engine::new();
        let array = engine
            .new_array(vec![Variant::from("10"), Variant::from("9"), Variant::from("100")])
            .unwrap();
        array.invoke(&engine, "sort", &Args::from([Variant::from("0")])).unwrap();
        assert_eq!(
            contents(&engine, &array),
            vec![Variant::from("9"), Variant::from("10"), Variant::from("100")]
        );
        array.invoke(&engine, "sort", &Args::from([Variant::from("z")])).unwrap();
        assert_eq!(
            contents(&engine, &array),
            vec![Variant::from("9"), Variant::from("100"), Variant::from("10")]
        );

        let greater = engine.new_function("greater", |call| {
            Ok(Variant::from(call.arg(0).to_integer() > call.arg(1).to_integer()))
        });
        let numbers = engine.new_array(ints(&[2, 3, 1])).unwrap();
        numbers
            .invoke(&engine, "sort", &Args::from([Variant::object(greater)]))
            .unwrap();
        assert_eq!(contents(&engine, &numbers), ints(&[3, 2, 1]));
    }

    #[test]
    fn test_concat_and_assign_check_argument_class() {
        let engine = Engine::new();
        let a = engine.new_array(ints(&[1])).unwrap();
        let b = engine.new_array(ints(&[2, 3])).unwrap();
        let c = a.invoke(&engine, "concat", &Args::from([b.clone()])).unwrap();
        assert_eq!(contents(&engine, &c), ints(&[1, 2, 3]));
        assert_eq!(contents(&engine, &a), ints(&[1]));

        a.invoke(&engine, "assign", &Args::from([b])).unwrap();
        assert_eq!(contents(&engine, &a), ints(&[2, 3]));

        let err = a
            .invoke(&engine, "assign", &Args::from([Variant::from(5)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgumentClass);
        assert_eq!(
            err.message(),
            "cannot accept instance of class Integer as argument for method assign()"
        );
    }

    #[test]
    fn test_assign_struct_copies_nested_arrays() {
        let engine = Engine::new();
        let inner = engine.new_array(ints(&[1])).unwrap();
        let source = engine.new_array(vec![inner.clone()]).unwrap();
        let target = engine.new_array(Vec::new()).unwrap();
        target.invoke(&engine, "assignStruct", &Args::from([source])).unwrap();
        let copied = target.index_get(&engine, Variant::from(0)).unwrap();
        assert!(!copied.as_object().unwrap().ptr_eq(inner.as_object().unwrap()));
        assert_eq!(
            target.invoke(&engine, "dump", &NO_ARGS).unwrap(),
            Variant::from("[\n [\n  1\n ]\n]")
        );
    }

    #[test]
    fn test_methods_refuse_foreign_this() {
        let engine = Engine::new();
        let push = engine
            .builtins()
            .array_class
            .own_value(&"push".into())
            .unwrap();
        let err = push
            .call_with_this(&engine, Variant::object(engine.new_object()), &NO_ARGS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadContext);
    }
}
