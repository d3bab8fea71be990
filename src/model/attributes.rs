//! Attribute values and the ordered attribute store every part carries.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::io::{ContentSource, TextSource};

/// An arbitrary value shared by reference, compared by identity.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

/// Value of an attribute or book item.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Date(NaiveDate),
    Content(ContentSource),
    Text(TextSource),
    Opaque(Opaque),
}

impl Value {
    /// Name of the variant, used in type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Content(_) => "content",
            Value::Text(_) => "text",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Opaque::new(value))
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Integer(n) => Ok(*n),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.mismatch("boolean")),
        }
    }

    pub fn as_date(&self) -> Result<NaiveDate> {
        match self {
            Value::Date(d) => Ok(*d),
            other => Err(other.mismatch("date")),
        }
    }

    pub fn as_content(&self) -> Result<&ContentSource> {
        match self {
            Value::Content(c) => Ok(c),
            other => Err(other.mismatch("content")),
        }
    }

    pub fn as_text(&self) -> Result<&TextSource> {
        match self {
            Value::Text(t) => Ok(t),
            other => Err(other.mismatch("text")),
        }
    }

    /// Borrow an opaque value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Result<&T> {
        match self {
            Value::Opaque(o) => o.downcast_ref().ok_or(Error::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: "opaque",
            }),
            other => Err(other.mismatch("opaque")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%-m-%-d")),
            Value::Content(c) => f.write_str(c.name()),
            Value::Text(t) => match t.text() {
                Ok(text) => f.write_str(&text),
                Err(_) => f.write_str("<text>"),
            },
            Value::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<ContentSource> for Value {
    fn from(c: ContentSource) -> Self {
        Value::Content(c)
    }
}

impl From<TextSource> for Value {
    fn from(t: TextSource) -> Self {
        Value::Text(t)
    }
}

/// A change to an attribute store, delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeEvent<'a> {
    /// `name` was added or now holds a different value.
    Changed { name: &'a str, value: &'a Value },
    /// `name` was removed; `value` is what it held.
    Removed { name: &'a str, value: &'a Value },
}

impl AttributeEvent<'_> {
    pub fn name(&self) -> &str {
        match self {
            AttributeEvent::Changed { name, .. } | AttributeEvent::Removed { name, .. } => name,
        }
    }
}

/// Handle returned by [`Attributes::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&AttributeEvent<'_>) + Send>;

/// Name/value pairs kept in insertion order, with change notification.
///
/// Setting a value equal to the current one and removing an absent name are
/// no-ops and notify nobody.
#[derive(Default)]
pub struct Attributes {
    entries: Vec<(String, Value)>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    /// The value of `name`, or `default` when absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.get(name).unwrap_or(default)
    }

    /// Set `name` to `value`. Returns true if the store changed.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let index = match self.position(name) {
            Some(i) if self.entries[i].1 == value => return false,
            Some(i) => {
                self.entries[i].1 = value;
                i
            }
            None => {
                self.entries.push((name.to_string(), value));
                self.entries.len() - 1
            }
        };

        let (name, value) = &self.entries[index];
        let event = AttributeEvent::Changed { name, value };
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
        true
    }

    /// Remove `name`, returning the value it held.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.position(name)?;
        let (name, value) = self.entries.remove(index);

        let event = AttributeEvent::Removed {
            name: &name,
            value: &value,
        };
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
        Some(value)
    }

    /// Register an observer called after every change.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&AttributeEvent<'_>) + Send + 'static,
    {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Drop an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(other, _)| *other != id);
        self.observers.len() != before
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(other, _)| other == name)
    }
}

/// Clones the entries only; observers stay with the original store.
impl Clone for Attributes {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
