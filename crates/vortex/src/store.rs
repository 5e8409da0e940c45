//! Change-tracking views over state containers.
//!
//! A [`TrackedObject`] or [`TrackedArray`] wraps a shared container together
//! with the dotted path that led to it. Writes through a view compare against
//! the current value and report the changed path to a single callback, which
//! is how the engine learns what to re-render.

use crate::value::{ArrayRef, ObjectRef, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

pub type ChangeCallback = Rc<dyn Fn(&str)>;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    EmptyPath,
    NotAContainer { path: String },
    InvalidIndex { path: String, segment: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::EmptyPath => write!(f, "cannot write to the empty path"),
            StoreError::NotAContainer { path } => {
                write!(f, "'{path}' is not an object or array")
            }
            StoreError::InvalidIndex { path, segment } => {
                write!(f, "'{segment}' is not a valid index into array '{path}'")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Result of reading one property through a tracked view.
#[derive(Clone, Debug)]
pub enum Read {
    Value(Value),
    Object(TrackedObject),
    Array(TrackedArray),
}

impl Read {
    /// The untracked value behind this read.
    pub fn into_value(self) -> Value {
        match self {
            Read::Value(value) => value,
            Read::Object(object) => Value::Object(object.raw().clone()),
            Read::Array(array) => Value::Array(array.raw().clone()),
        }
    }

    pub fn as_object(&self) -> Option<&TrackedObject> {
        match self {
            Read::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&TrackedArray> {
        match self {
            Read::Array(array) => Some(array),
            _ => None,
        }
    }
}

/// Make `root` observable. Every write below it reports its dotted path.
pub fn wrap(root: ObjectRef, on_change: ChangeCallback) -> TrackedObject {
    TrackedObject::new(root, String::new(), on_change)
}

pub fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[derive(Clone)]
enum ChildView {
    Object(TrackedObject),
    Array(TrackedArray),
}

/// Reuse the cached view for `value` if it still wraps the same container.
fn view_for(
    children: &RefCell<FxHashMap<String, ChildView>>,
    key: &str,
    value: Value,
    path: impl FnOnce() -> String,
    on_change: &ChangeCallback,
) -> Read {
    let mut children = children.borrow_mut();
    match value {
        Value::Object(object) => {
            if let Some(ChildView::Object(view)) = children.get(key)
                && Rc::ptr_eq(view.raw(), &object)
            {
                return Read::Object(view.clone());
            }
            let view = TrackedObject::new(object, path(), on_change.clone());
            children.insert(key.to_string(), ChildView::Object(view.clone()));
            Read::Object(view)
        }
        Value::Array(array) => {
            if let Some(ChildView::Array(view)) = children.get(key)
                && Rc::ptr_eq(view.raw(), &array)
            {
                return Read::Array(view.clone());
            }
            let view = TrackedArray::new(array, path(), on_change.clone());
            children.insert(key.to_string(), ChildView::Array(view.clone()));
            Read::Array(view)
        }
        value => Read::Value(value),
    }
}

struct Tracked<T> {
    raw: T,
    path: String,
    on_change: ChangeCallback,
    children: RefCell<FxHashMap<String, ChildView>>,
}

impl<T> Tracked<T> {
    fn notify(&self, path: &str) {
        log::trace!(target: "vortex", "change at '{path}'");
        (self.on_change)(path);
    }
}

#[derive(Clone)]
pub struct TrackedObject {
    inner: Rc<Tracked<ObjectRef>>,
}

impl TrackedObject {
    fn new(raw: ObjectRef, path: String, on_change: ChangeCallback) -> Self {
        Self {
            inner: Rc::new(Tracked {
                raw,
                path,
                on_change,
                children: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    /// Dotted path from the root; empty for the root itself.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn raw(&self) -> &ObjectRef {
        &self.inner.raw
    }

    /// The backing container as a plain value, for read-only evaluation.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.inner.raw.clone())
    }

    pub fn ptr_eq(&self, other: &TrackedObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.raw.borrow().keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.raw.borrow().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Read {
        let value = self.inner.raw.borrow().get(key).cloned().unwrap_or_default();
        let inner = &self.inner;
        view_for(
            &inner.children,
            key,
            value,
            || child_path(&inner.path, key),
            &inner.on_change,
        )
    }

    /// Returns whether the value changed (and a notification fired).
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        {
            let mut fields = self.inner.raw.borrow_mut();
            let unchanged = fields
                .get(key)
                .map_or(matches!(value, Value::Undefined), |old| old.strict_equals(&value));
            if unchanged {
                return false;
            }
            fields.insert(key.to_string(), value);
        }
        self.inner.children.borrow_mut().remove(key);
        self.inner.notify(&child_path(&self.inner.path, key));
        true
    }

    pub fn get_path(&self, path: &str) -> Result<Read, StoreError> {
        let mut current = Read::Object(self.clone());
        let mut walked = self.inner.path.clone();
        for segment in path.split('.').filter(|segment| !segment.is_empty()) {
            current = match &current {
                Read::Object(object) => object.get(segment),
                Read::Array(array) => array.get_segment(segment)?,
                Read::Value(_) => return Err(StoreError::NotAContainer { path: walked }),
            };
            walked = child_path(&walked, segment);
        }
        Ok(current)
    }

    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<bool, StoreError> {
        let (parent, key) = match path.rsplit_once('.') {
            Some((parent, key)) => (parent, key),
            None => ("", path),
        };
        if key.is_empty() {
            return Err(StoreError::EmptyPath);
        }
        match self.get_path(parent)? {
            Read::Object(object) => Ok(object.set(key, value)),
            Read::Array(array) => {
                let index = parse_index(array.path(), key)?;
                Ok(array.set(index, value))
            }
            Read::Value(_) => Err(StoreError::NotAContainer {
                path: child_path(&self.inner.path, parent),
            }),
        }
    }
}

impl fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TrackedObject")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

fn parse_index(path: &str, segment: &str) -> Result<usize, StoreError> {
    segment.parse().map_err(|_| StoreError::InvalidIndex {
        path: path.to_string(),
        segment: segment.to_string(),
    })
}

#[derive(Clone)]
pub struct TrackedArray {
    inner: Rc<Tracked<ArrayRef>>,
}

impl TrackedArray {
    fn new(raw: ArrayRef, path: String, on_change: ChangeCallback) -> Self {
        Self {
            inner: Rc::new(Tracked {
                raw,
                path,
                on_change,
                children: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn raw(&self) -> &ArrayRef {
        &self.inner.raw
    }

    pub fn ptr_eq(&self, other: &TrackedArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.raw.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.raw.borrow().clone()
    }

    pub fn get(&self, index: usize) -> Read {
        let value = self
            .inner
            .raw
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default();
        let inner = &self.inner;
        let key = index.to_string();
        view_for(
            &inner.children,
            &key,
            value,
            || child_path(&inner.path, &key),
            &inner.on_change,
        )
    }

    fn get_segment(&self, segment: &str) -> Result<Read, StoreError> {
        if segment == "length" {
            return Ok(Read::Value(Value::from(self.len() as f64)));
        }
        parse_index(&self.inner.path, segment).map(|index| self.get(index))
    }

    /// Writing past the end pads with `undefined`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        let value = value.into();
        {
            let mut items = self.inner.raw.borrow_mut();
            let unchanged = items
                .get(index)
                .map_or(matches!(value, Value::Undefined), |old| old.strict_equals(&value));
            if unchanged {
                return false;
            }
            if index >= items.len() {
                items.resize(index + 1, Value::Undefined);
            }
            items[index] = value;
        }
        self.inner.children.borrow_mut().remove(&index.to_string());
        self.inner
            .notify(&child_path(&self.inner.path, &index.to_string()));
        true
    }

    /// Runs a structural operation, then reports the array's own path once.
    fn mutate<R>(&self, operation: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let result = operation(&mut *self.inner.raw.borrow_mut());
        self.inner.children.borrow_mut().clear();
        self.inner.notify(&self.inner.path);
        result
    }

    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.push(value);
            items.len()
        })
    }

    pub fn pop(&self) -> Option<Value> {
        self.mutate(Vec::pop)
    }

    pub fn shift(&self) -> Option<Value> {
        self.mutate(|items| (!items.is_empty()).then(|| items.remove(0)))
    }

    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Removes `delete_count` items at `start` and inserts `items` there.
    /// Out-of-range arguments are clamped.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        self.mutate(|current| {
            let start = start.min(current.len());
            let end = start.saturating_add(delete_count).min(current.len());
            current.splice(start..end, items).collect()
        })
    }

    /// Sorts by display string, `undefined` last.
    pub fn sort(&self) {
        self.mutate(|items| {
            items.sort_by(|left, right| match (left, right) {
                (Value::Undefined, Value::Undefined) => Ordering::Equal,
                (Value::Undefined, _) => Ordering::Greater,
                (_, Value::Undefined) => Ordering::Less,
                _ => left.to_display_string().cmp(&right.to_display_string()),
            })
        })
    }

    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.mutate(|items| items.sort_by(compare))
    }

    pub fn reverse(&self) {
        self.mutate(|items| items.reverse())
    }
}

impl fmt::Debug for TrackedArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TrackedArray")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tracked(json: serde_json::Value) -> (TrackedObject, Rc<RefCell<Vec<String>>>) {
        let Value::Object(root) = Value::from(json) else {
            panic!("state must be an object");
        };
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        let state = wrap(root, Rc::new(move |path: &str| sink.borrow_mut().push(path.to_string())));
        (state, changes)
    }

    #[test]
    fn test_nested_write_reports_access_chain() {
        let (state, changes) = tracked(json!({"user": {"address": {"city": "Oslo"}}}));
        let Read::Object(user) = state.get("user") else {
            panic!("user should be an object");
        };
        let Read::Object(address) = user.get("address") else {
            panic!("address should be an object");
        };
        assert_eq!(address.path(), "user.address");
        assert!(address.set("city", "Bergen"));
        assert_eq!(*changes.borrow(), vec!["user.address.city".to_string()]);
    }

    #[test]
    fn test_equal_write_is_silent() {
        let (state, changes) = tracked(json!({"count": 1, "name": "a"}));
        assert!(!state.set("count", 1));
        assert!(!state.set("name", "a"));
        assert!(!state.set("missing", Value::Undefined));
        assert!(changes.borrow().is_empty());
        assert!(state.set("count", 2));
        assert_eq!(*changes.borrow(), vec!["count".to_string()]);
    }

    #[test]
    fn test_structural_array_mutation_notifies_once() {
        let (state, changes) = tracked(json!({"todos": {"items": [3, 1, 2]}}));
        let Ok(Read::Array(items)) = state.get_path("todos.items") else {
            panic!("items should be an array");
        };
        items.push(4);
        items.sort();
        items.reverse();
        assert_eq!(items.splice(0, 2, [Value::from("x")]).len(), 2);
        assert_eq!(items.shift(), Some(Value::from("x")));
        assert_eq!(
            *changes.borrow(),
            vec!["todos.items".to_string(); 5]
        );
        assert_eq!(items.to_vec(), vec![Value::from(2), Value::from(1)]);
    }

    #[test]
    fn test_views_are_cached_until_replaced() {
        let (state, _changes) = tracked(json!({"user": {"name": "a"}}));
        let first = state.get("user");
        let second = state.get("user");
        let (Some(first), Some(second)) = (first.as_object(), second.as_object()) else {
            panic!("user should be an object");
        };
        assert!(first.ptr_eq(second));

        state.set("user", Value::from(json!({"name": "b"})));
        let replaced = state.get("user");
        let Some(replaced) = replaced.as_object() else {
            panic!("user should still be an object");
        };
        assert!(!replaced.ptr_eq(first));
        assert_eq!(
            replaced.get("name").into_value(),
            Value::from("b")
        );
    }

    #[test]
    fn test_get_and_set_path() {
        let (state, changes) = tracked(json!({"form": {"fields": [{"value": ""}]}, "flag": true}));
        assert_eq!(state.set_path("form.fields.0.value", "hi"), Ok(true));
        assert_eq!(*changes.borrow(), vec!["form.fields.0.value".to_string()]);
        assert_eq!(
            state.get_path("form.fields.0.value").map(Read::into_value),
            Ok(Value::from("hi"))
        );
        assert_eq!(
            state.get_path("form.fields.length").map(Read::into_value),
            Ok(Value::from(1.0))
        );
        assert_eq!(
            state.set_path("flag.inner", 1),
            Err(StoreError::NotAContainer {
                path: "flag".to_string()
            })
        );
        assert_eq!(state.set_path("", 1), Err(StoreError::EmptyPath));
    }
}
