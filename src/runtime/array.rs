//! Array storage
//!
//! Arrays are dense: every index from 0 to `len - 1` holds a value. Negative
//! indices count from the end. Reads past the end yield the array's default
//! value; writes past the end first fill the gap with the filler value.

use crate::engine::Engine;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::function::Args;
use crate::runtime::operate::Dispatch;
use crate::runtime::sync;
use crate::value::Variant;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Elements plus the values used for missing slots
#[derive(Debug, Clone, Default)]
pub struct ArrayState {
    items: VecDeque<Variant>,
    /// Returned when reading outside the array
    pub default_value: Variant,
    /// Stored into gaps created by writing past the end
    pub filler: Variant,
}

impl ArrayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Variant>) -> Self {
        ArrayState {
            items: values.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve a possibly negative index against the current length
    fn normalize(&self, index: i64) -> Option<usize> {
        let index = if index < 0 {
            index + self.items.len() as i64
        } else {
            index
        };
        usize::try_from(index).ok()
    }

    /// Element at `index`, or the default value when out of range
    pub fn get(&self, index: i64) -> Variant {
        self.normalize(index)
            .and_then(|i| self.items.get(i))
            .cloned()
            .unwrap_or_else(|| self.default_value.clone())
    }

    /// Store `value` at `index`, growing the array with the filler if needed
    pub fn set(&mut self, index: i64, value: Variant) -> RtResult<()> {
        let Some(i) = self.normalize(index) else {
            return Err(TemporaryException::index_out_of_range(index).into());
        };
        if i >= self.items.len() {
            self.items.resize(i + 1, self.filler.clone());
        }
        self.items[i] = value;
        Ok(())
    }

    pub fn push(&mut self, values: impl IntoIterator<Item = Variant>) {
        self.items.extend(values);
    }

    /// Remove the last element; void when empty
    pub fn pop(&mut self) -> Variant {
        self.items.pop_back().unwrap_or_default()
    }

    /// Remove the first element; void when empty
    pub fn shift(&mut self) -> Variant {
        self.items.pop_front().unwrap_or_default()
    }

    /// Prepend values, keeping their order
    pub fn unshift(&mut self, values: &[Variant]) {
        for value in values.iter().rev() {
            self.items.push_front(value.clone());
        }
    }

    /// Insert values before `index`
    pub fn insert(&mut self, index: i64, values: &[Variant]) -> RtResult<()> {
        let Some(i) = self.normalize(index) else {
            return Err(TemporaryException::index_out_of_range(index).into());
        };
        if i > self.items.len() {
            self.items.resize(i, self.filler.clone());
        }
        for (offset, value) in values.iter().enumerate() {
            self.items.insert(i + offset, value.clone());
        }
        Ok(())
    }

    /// Remove and return the element at `index`
    pub fn erase(&mut self, index: i64) -> RtResult<Variant> {
        self.normalize(index)
            .and_then(|i| self.items.remove(i))
            .ok_or_else(|| TemporaryException::index_out_of_range(index).into())
    }

    /// Remove elements discernibly equal to `value`; returns how many went
    pub fn remove(&mut self, value: &Variant, all: bool) -> usize {
        if all {
            let before = self.items.len();
            self.items.retain(|item| !item.disc_equal(value));
            return before - self.items.len();
        }
        match self.items.iter().position(|item| item.disc_equal(value)) {
            Some(i) => {
                self.items.remove(i);
                1
            }
            None => 0,
        }
    }

    /// Index of the first element discernibly equal to `value`, from `from`
    pub fn find(&self, value: &Variant, from: usize) -> Option<usize> {
        self.items
            .iter()
            .skip(from)
            .position(|item| item.disc_equal(value))
            .map(|i| i + from)
    }

    /// Truncate or extend with the filler
    pub fn set_len(&mut self, len: usize) {
        self.items.resize(len, self.filler.clone());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn reverse(&mut self) {
        self.items.make_contiguous().reverse();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<Variant> {
        self.items.iter().cloned().collect()
    }

    /// Replace every element
    pub fn assign(&mut self, values: Vec<Variant>) {
        self.items = values.into();
    }
}

/// Native state of Array instances
#[derive(Debug, Default)]
pub struct ArrayInstance {
    state: Mutex<ArrayState>,
}

impl ArrayInstance {
    pub fn new(state: ArrayState) -> Self {
        ArrayInstance {
            state: Mutex::new(state),
        }
    }

    /// Lock the elements
    ///
    /// The guard must not be held while calling back into scripts.
    pub fn lock(&self) -> MutexGuard<'_, ArrayState> {
        sync::lock(&self.state)
    }

    /// Copy of the elements
    pub fn snapshot(&self) -> Vec<Variant> {
        self.lock().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Ordering requested from `sort`
#[derive(Debug, Clone)]
pub enum SortOrder {
    /// `+`: normal ascending
    Ascending,
    /// `-`: normal descending
    Descending,
    /// `0`: numeric ascending
    NumericAscending,
    /// `9`: numeric descending
    NumericDescending,
    /// `a`: string ascending
    StringAscending,
    /// `z`: string descending
    StringDescending,
    /// A function answering "is the first argument less than the second"
    Function(Variant),
}

impl SortOrder {
    /// Decode the sort argument: a mode string, a function, or nothing
    pub fn from_arg(arg: &Variant) -> Self {
        match arg {
            Variant::Object(_) => SortOrder::Function(arg.clone()),
            Variant::String(mode) => match mode.char_at(0) {
                Some('-') => SortOrder::Descending,
                Some('0') => SortOrder::NumericAscending,
                Some('9') => SortOrder::NumericDescending,
                Some('a') => SortOrder::StringAscending,
                Some('z') => SortOrder::StringDescending,
                _ => SortOrder::Ascending,
            },
            _ => SortOrder::Ascending,
        }
    }
}

fn numeric_compare(a: &Variant, b: &Variant) -> Ordering {
    let ordering = match (a, b) {
        (Variant::String(_), Variant::String(_)) => a.to_number().compare(&b.to_number()),
        _ => a.compare(b),
    };
    ordering.unwrap_or(Ordering::Equal)
}

fn string_compare(engine: &Engine, a: &Variant, b: &Variant) -> RtResult<Ordering> {
    match (a, b) {
        (Variant::String(x), Variant::String(y)) => Ok(x.cmp(y)),
        _ => Ok(a.stringify(engine)?.cmp(&b.stringify(engine)?)),
    }
}

fn function_compare(engine: &Engine, less: &Variant, a: &Variant, b: &Variant) -> RtResult<Ordering> {
    let forward = Args::from([a.clone(), b.clone()]);
    if less.call(engine, &forward)?.to_bool() {
        return Ok(Ordering::Less);
    }
    let backward = Args::from([b.clone(), a.clone()]);
    if less.call(engine, &backward)?.to_bool() {
        return Ok(Ordering::Greater);
    }
    Ok(Ordering::Equal)
}

/// Sort `items` in place
///
/// The first comparison error stops further calls to the comparator and is
/// returned; the order of `items` is then unspecified.
pub fn sort_values(engine: &Engine, items: &mut [Variant], order: &SortOrder, stable: bool) -> RtResult<()> {
    let mut failure = None;
    let mut compare = |a: &Variant, b: &Variant| -> Ordering {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let result = match order {
            SortOrder::Ascending => Ok(a.compare(b).unwrap_or(Ordering::Equal)),
            SortOrder::Descending => Ok(b.compare(a).unwrap_or(Ordering::Equal)),
            SortOrder::NumericAscending => Ok(numeric_compare(a, b)),
            SortOrder::NumericDescending => Ok(numeric_compare(b, a)),
            SortOrder::StringAscending => string_compare(engine, a, b),
            SortOrder::StringDescending => string_compare(engine, b, a),
            SortOrder::Function(less) => function_compare(engine, less, a, b),
        };
        result.unwrap_or_else(|e| {
            failure = Some(e);
            Ordering::Equal
        })
    };
    if stable {
        items.sort_by(&mut compare);
    } else {
        items.sort_unstable_by(&mut compare);
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ints(values: &[i64]) -> Vec<Variant> {
        values.iter().map(|&v| Variant::Integer(v)).collect()
    }

    #[test]
    fn test_negative_index_and_default() {
        let mut array = ArrayState::from_values(ints(&[1, 2, 3]));
        assert_eq!(array.get(-1), Variant::Integer(3));
        assert!(array.get(10).is_void());
        array.default_value = Variant::Integer(-1);
        assert_eq!(array.get(10), Variant::Integer(-1));
        assert_eq!(array.get(-4), Variant::Integer(-1));
    }

    #[test]
    fn test_set_past_end_uses_filler() {
        let mut array = ArrayState::new();
        array.filler = Variant::Null;
        array.set(3, Variant::Integer(7)).unwrap();
        assert_eq!(array.len(), 4);
        assert!(array.get(0).is_null());
        assert_eq!(array.get(3), Variant::Integer(7));

        let err = array.set(-10, Variant::Integer(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    }

    #[test]
    fn test_push_pop_shift_unshift() {
        let mut array = ArrayState::new();
        array.push(ints(&[2, 3]));
        array.unshift(&ints(&[0, 1]));
        assert_eq!(array.to_vec(), ints(&[0, 1, 2, 3]));
        assert_eq!(array.pop(), Variant::Integer(3));
        assert_eq!(array.shift(), Variant::Integer(0));
        assert_eq!(array.to_vec(), ints(&[1, 2]));
        array.clear();
        assert!(array.pop().is_void());
    }

    #[test]
    fn test_insert_and_erase() {
        let mut array = ArrayState::from_values(ints(&[1, 4]));
        array.insert(1, &ints(&[2, 3])).unwrap();
        assert_eq!(array.to_vec(), ints(&[1, 2, 3, 4]));
        assert_eq!(array.erase(-1).unwrap(), Variant::Integer(4));
        let err = array.erase(10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert_eq!(err.message(), "index 10 is out of range");
    }

    #[test]
    fn test_remove() {
        let mut array = ArrayState::from_values(ints(&[1, 2, 1, 3, 1]));
        assert_eq!(array.remove(&Variant::Integer(1), false), 1);
        assert_eq!(array.to_vec(), ints(&[2, 1, 3, 1]));
        assert_eq!(array.remove(&Variant::Integer(1), true), 2);
        assert_eq!(array.to_vec(), ints(&[2, 3]));
        // 2.0 is not discernibly equal to 2
        assert_eq!(array.remove(&Variant::Real(2.0), true), 0);
    }

    #[test]
    fn test_set_len_and_reverse() {
        let mut array = ArrayState::from_values(ints(&[1, 2, 3]));
        array.reverse();
        assert_eq!(array.to_vec(), ints(&[3, 2, 1]));
        array.set_len(1);
        assert_eq!(array.to_vec(), ints(&[3]));
        array.set_len(2);
        assert!(array.get(1).is_void());
        assert_eq!(array.find(&Variant::Integer(3), 0), Some(0));
        assert_eq!(array.find(&Variant::Integer(3), 1), None);
    }

    #[test]
    fn test_sort_order_from_arg() {
        assert!(matches!(SortOrder::from_arg(&Variant::Void), SortOrder::Ascending));
        assert!(matches!(SortOrder::from_arg(&Variant::from("9")), SortOrder::NumericDescending));
        assert!(matches!(SortOrder::from_arg(&Variant::from("z")), SortOrder::StringDescending));
    }

    #[test]
    fn test_sort_modes() {
        let engine = Engine::new();
        let mut items = vec![Variant::from("10"), Variant::from("9"), Variant::from("100")];
        sort_values(&engine, &mut items, &SortOrder::NumericAscending, true).unwrap();
        assert_eq!(items, vec![Variant::from("9"), Variant::from("10"), Variant::from("100")]);

        sort_values(&engine, &mut items, &SortOrder::StringAscending, true).unwrap();
        assert_eq!(items, vec![Variant::from("10"), Variant::from("100"), Variant::from("9")]);

        let mut items = ints(&[3, 1, 2]);
        sort_values(&engine, &mut items, &SortOrder::Descending, false).unwrap();
        assert_eq!(items, ints(&[3, 2, 1]));
    }

    #[test]
    fn test_sort_with_function() {
        let engine = Engine::new();
        let greater = Variant::object(engine.new_function("greater", |call| {
            Ok(Variant::Boolean(call.arg(0).greater(call.arg(1))))
        }));
        let mut items = ints(&[1, 3, 2]);
        sort_values(&engine, &mut items, &SortOrder::Function(greater), true).unwrap();
        assert_eq!(items, ints(&[3, 2, 1]));
    }

    #[test]
    fn test_sort_propagates_comparator_error() {
        let engine = Engine::new();
        let failing = Variant::object(engine.new_function("failing", |_| {
            Err(TemporaryException::illegal_argument("no order").into())
        }));
        let mut items = ints(&[1, 3, 2]);
        let err = sort_values(&engine, &mut items, &SortOrder::Function(failing), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    }
}
