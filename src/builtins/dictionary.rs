//! The Dictionary class

use super::method;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::attribute::OperateFlags;
use crate::runtime::class::{CoreClasses, call_super, class_of};
use crate::runtime::dictionary::{DictionaryInstance, DictionaryState};
use crate::runtime::function::{Args, CallInfo, NO_ARGS};
use crate::runtime::object::ObjectRef;
use crate::runtime::operate::{Dispatch, enum_members};
use crate::runtime::string::RString;
use crate::runtime::structured;
use crate::value::Variant;
use std::sync::Arc;

fn state(call: &CallInfo<'_>) -> RtResult<Arc<DictionaryInstance>> {
    call.native::<DictionaryInstance>(call.engine.builtins().ids.dictionary)
}

fn key(call: &CallInfo<'_>, index: usize) -> RtResult<RString> {
    call.arg(index).stringify(call.engine)
}

/// Key/value pairs of an assignment source
///
/// Dictionaries give their entries, arrays are read as alternating keys and
/// values, other objects give their visible members.
fn source_entries(call: &CallInfo<'_>, source: &Variant, method: &str) -> RtResult<Vec<(RString, Variant)>> {
    let engine = call.engine;
    let Some(object) = source.as_object() else {
        let class_name = class_of(engine, source)
            .and_then(|c| c.class_name())
            .unwrap_or_default();
        return Err(TemporaryException::illegal_argument_class(&RString::from(method), &class_name).into());
    };
    if let Some(dictionary) = engine.dictionary_state(object) {
        return Ok(dictionary.entries());
    }
    if let Some(array) = engine.array_state(object) {
        let items = array.snapshot();
        let mut entries = Vec::with_capacity(items.len() / 2);
        for pair in items.chunks(2) {
            let value = pair.get(1).cloned().unwrap_or_default();
            entries.push((pair[0].stringify(engine)?, value));
        }
        return Ok(entries);
    }
    let mut entries = Vec::new();
    enum_members(engine, source, OperateFlags::empty(), |name, _, value| {
        entries.push((name.clone(), value.clone()));
        Ok(true)
    })?;
    Ok(entries)
}

pub(super) fn register(core: &CoreClasses) -> ObjectRef {
    let class = core.builtin_class("Dictionary", &core.object_class);

    core.bind_function(&class, "construct", method(), |call| {
        let engine = call.engine;
        let state = DictionaryState::new(&engine.config().member_table);
        call.this_object()?
            .set_native(engine.builtins().ids.dictionary, Arc::new(DictionaryInstance::new(state)))?;
        Ok(Variant::Void)
    });
    core.bind_function(&class, "initialize", method(), |call| {
        let dictionary_class = &call.engine.builtins().dictionary_class;
        call_super(call.engine, dictionary_class, "initialize", call.this, &NO_ARGS)
    });

    core.bind_function(&class, "[]", method(), |call| {
        let key = key(call, 0)?;
        Ok(state(call)?.lock().get_or_default(&key))
    });
    core.bind_function(&class, "[]=", method(), |call| {
        let key = key(call, 0)?;
        state(call)?.lock().set(key, call.arg(1).clone());
        Ok(Variant::Void)
    });
    core.bind_function(&class, "delete[]", method(), |call| {
        let key = key(call, 0)?;
        Ok(state(call)?.lock().delete(&key).unwrap_or_default())
    });

    core.bind_getter(&class, "count", |call| Ok(Variant::from(state(call)?.len())));
    core.bind_accessors(
        &class,
        "default",
        |call| Ok(state(call)?.lock().default_value.clone()),
        |call, value| {
            state(call)?.lock().default_value = value.clone();
            Ok(())
        },
    );

    core.bind_function(&class, "clear", method(), |call| {
        state(call)?.lock().clear();
        Ok(call.this.clone())
    });
    core.bind_function(&class, "delete", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let key = key(call, 0)?;
        Ok(state(call)?.lock().delete(&key).unwrap_or_default())
    });
    core.bind_function(&class, "has", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let key = key(call, 0)?;
        Ok(Variant::Boolean(state(call)?.lock().has(&key)))
    });
    core.bind_function(&class, "keys", method(), |call| {
        let keys = state(call)?.lock().keys();
        call.engine.new_array(keys.into_iter().map(Variant::String).collect())
    });
    core.bind_function(&class, "values", method(), |call| {
        let values = state(call)?.lock().values();
        call.engine.new_array(values)
    });

    // assign(source, clear = true)
    core.bind_function(&class, "assign", method(), |call| {
        call.args.expect_count(1, Some(2))?;
        let entries = source_entries(call, call.arg(0), "assign")?;
        let clear = call.args.arg(1).is_none_or(Variant::to_bool);
        let dictionary = state(call)?;
        let mut state = dictionary.lock();
        if clear {
            state.clear();
        }
        for (key, value) in entries {
            state.set(key, value);
        }
        Ok(call.this.clone())
    });

    // assignStruct(source): deep copy of another dictionary
    core.bind_function(&class, "assignStruct", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let source = call.arg(0);
        if source.as_object().and_then(|o| call.engine.dictionary_state(o)).is_none() {
            let class_name = class_of(call.engine, source)
                .and_then(|c| c.class_name())
                .unwrap_or_default();
            return Err(
                TemporaryException::illegal_argument_class(&RString::from("assignStruct"), &class_name).into(),
            );
        }
        let copy = structured::deep_copy(call.engine, source)?;
        let entries = copy
            .as_object()
            .and_then(|o| call.engine.dictionary_state(o))
            .map(|d| d.entries())
            .unwrap_or_default();
        let dictionary = state(call)?;
        let mut state = dictionary.lock();
        state.clear();
        for (key, value) in entries {
            state.set(key, value);
        }
        Ok(call.this.clone())
    });

    // eachPair(function): call function(key, value) for every entry
    core.bind_function(&class, "eachPair", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let entries = state(call)?.entries();
        for (key, value) in entries {
            call.arg(0).call(call.engine, &Args::from([Variant::String(key), value]))?;
        }
        Ok(Variant::Void)
    });

    core.bind_function(&class, "dump", method(), |call| {
        call.engine.to_structured(call.this).map(Variant::String)
    });

    class
}
