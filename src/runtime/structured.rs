//! Structured data output and deep copy
//!
//! Arrays and dictionaries serialise to text that the structured-data
//! reader in [`crate::parser`] reads back:
//!
//! ```text
//! [
//!  1,
//!  "two",
//!  %[
//!   "key" => 3.5
//!  ]
//! ]
//! ```
//!
//! An object already being written higher up the stack is written as
//! `null /* object recursion detected */`; other objects are written as a
//! commented null.

use crate::engine::Engine;
use crate::error::RtResult;
use crate::runtime::object::ObjectRef;
use crate::runtime::string::RString;
use crate::util::dtoa::real_to_string;
use crate::value::Variant;

const RECURSION_MARKER: &str = "null /* object recursion detected */";

/// Serialise `value` as structured data
pub fn to_structured_string(engine: &Engine, value: &Variant) -> RtResult<RString> {
    let mut writer = StructuredWriter::new(engine);
    writer.write_value(value, "")?;
    Ok(RString::from(writer.out))
}

struct StructuredWriter<'e> {
    engine: &'e Engine,
    unit: &'e str,
    out: String,
    stack: Vec<ObjectRef>,
}

impl<'e> StructuredWriter<'e> {
    fn new(engine: &'e Engine) -> Self {
        StructuredWriter {
            engine,
            unit: &engine.config().structured_indent,
            out: String::new(),
            stack: Vec::new(),
        }
    }

    fn write_value(&mut self, value: &Variant, indent: &str) -> RtResult<()> {
        match value {
            Variant::Void => self.out.push_str("void"),
            Variant::Null => self.out.push_str("null"),
            Variant::Boolean(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Variant::Integer(i) => self.out.push_str(&i.to_string()),
            Variant::Real(r) => self.out.push_str(&real_to_string(*r)),
            Variant::String(s) => self.out.push_str(&s.as_token_string().to_string()),
            Variant::Object(ov) => self.write_object(&ov.object, value, indent)?,
        }
        Ok(())
    }

    fn write_object(&mut self, object: &ObjectRef, value: &Variant, indent: &str) -> RtResult<()> {
        if self.stack.iter().any(|o| o.ptr_eq(object)) {
            self.out.push_str(RECURSION_MARKER);
            return Ok(());
        }
        if let Some(array) = self.engine.array_state(object) {
            let items = array.snapshot();
            self.stack.push(object.clone());
            let result = self.write_array(&items, indent);
            self.stack.pop();
            return result;
        }
        if let Some(dictionary) = self.engine.dictionary_state(object) {
            let entries = dictionary.entries();
            self.stack.push(object.clone());
            let result = self.write_dictionary(&entries, indent);
            self.stack.pop();
            return result;
        }
        let text = value.stringify(self.engine)?;
        self.out.push_str("null /* (object) ");
        self.out.push_str(&text.as_token_string().to_string());
        self.out.push_str(" */");
        Ok(())
    }

    fn write_array(&mut self, items: &[Variant], indent: &str) -> RtResult<()> {
        let inner = format!("{}{}", indent, self.unit);
        self.out.push_str("[\n");
        for (i, item) in items.iter().enumerate() {
            self.out.push_str(&inner);
            self.write_value(item, &inner)?;
            self.out.push_str(if i + 1 < items.len() { ",\n" } else { "\n" });
        }
        self.out.push_str(indent);
        self.out.push(']');
        Ok(())
    }

    fn write_dictionary(&mut self, entries: &[(RString, Variant)], indent: &str) -> RtResult<()> {
        let inner = format!("{}{}", indent, self.unit);
        self.out.push_str("%[\n");
        for (i, (key, item)) in entries.iter().enumerate() {
            self.out.push_str(&inner);
            self.out.push_str(&key.as_token_string().to_string());
            self.out.push_str(" => ");
            self.write_value(item, &inner)?;
            self.out.push_str(if i + 1 < entries.len() { ",\n" } else { "\n" });
        }
        self.out.push_str(indent);
        self.out.push(']');
        Ok(())
    }
}

/// Deep copy of arrays and dictionaries
///
/// Nested arrays and dictionaries are copied recursively; any other value
/// is shared. An object reached again through its own contents is shared
/// rather than copied a second time.
pub fn deep_copy(engine: &Engine, value: &Variant) -> RtResult<Variant> {
    let mut stack = Vec::new();
    copy_value(engine, value, &mut stack)
}

fn copy_value(engine: &Engine, value: &Variant, stack: &mut Vec<ObjectRef>) -> RtResult<Variant> {
    let Some(object) = value.as_object() else {
        return Ok(value.clone());
    };
    if stack.iter().any(|o| o.ptr_eq(object)) {
        return Ok(value.clone());
    }
    if let Some(array) = engine.array_state(object) {
        stack.push(object.clone());
        let items = array
            .snapshot()
            .iter()
            .map(|item| copy_value(engine, item, stack))
            .collect::<RtResult<Vec<_>>>();
        stack.pop();
        return engine.new_array(items?);
    }
    if let Some(dictionary) = engine.dictionary_state(object) {
        stack.push(object.clone());
        let entries = dictionary
            .entries()
            .into_iter()
            .map(|(key, item)| Ok((key, copy_value(engine, &item, stack)?)))
            .collect::<RtResult<Vec<_>>>();
        stack.pop();
        return engine.new_dictionary(entries?);
    }
    Ok(value.clone())
}
