//! Named, runtime-tunable parameters.
//!
//! Grounded on the source's `PropRegistry`/`Property` hierarchy: each
//! property stores a current value and fires a typed callback when the host
//! writes it. Delegates (the callback) are attached strictly *after*
//! construction — never passed in during `new` — because the original C++
//! documented a real bug (crash-on-construct) from handing `this` to a
//! property before the owning stage finished building itself. That rule is
//! preserved here as a hard API shape: there is no constructor parameter
//! that accepts a delegate, only [`Property::set_delegate`], callable once
//! the owner already exists.
//!
//! The rule is specifically about handing out `this` early, not about when
//! `set_delegate` is called. [`PropRegistry::bind_bool`] and its siblings
//! call it from inside a stage's own `new`, but the delegate they install
//! closes over a freshly allocated [`BoundCell`] — never over the stage —
//! so there is no back-reference to a half-built object. Every tunable
//! stage field is one of these cells: the stage reads it each frame rather
//! than caching a value that a later property write would leave stale.

use crate::error::GestureError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::activity_log::ActivityLog;

/// A shared cell a stage reads each frame instead of caching a stale copy
/// of a property's value. Returned by [`PropRegistry::bind_bool`] and its
/// siblings.
pub type BoundCell<T> = Rc<RefCell<T>>;

/// A property's current value, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    DoubleArray(Vec<f64>),
    IntArray(Vec<i32>),
}

impl PropValue {
    fn kind_name(&self) -> &'static str {
        match self {
            PropValue::Bool(_) => "bool",
            PropValue::Int(_) => "int",
            PropValue::Double(_) => "double",
            PropValue::String(_) => "string",
            PropValue::DoubleArray(_) => "double[]",
            PropValue::IntArray(_) => "int[]",
        }
    }

    fn same_kind(&self, other: &PropValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Callback fired after a property's value changes. Attached post-
/// construction via [`Property::set_delegate`].
pub type Delegate = Rc<RefCell<dyn FnMut(&str, &PropValue)>>;

/// One named, typed, tunable value.
pub struct Property {
    name: String,
    value: PropValue,
    delegate: Option<Delegate>,
}

impl Property {
    fn new(name: impl Into<String>, value: PropValue) -> Self {
        Self {
            name: name.into(),
            value,
            delegate: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropValue {
        &self.value
    }

    /// Attaches a delegate. Must only be called once the owning stage is
    /// fully constructed; never call this from inside a stage's own `new`.
    pub fn set_delegate(&mut self, delegate: Delegate) {
        self.delegate = Some(delegate);
    }

    fn set_value(&mut self, value: PropValue) -> Result<(), GestureError> {
        if !self.value.same_kind(&value) {
            return Err(GestureError::PropertyTypeMismatch {
                name: self.name.clone(),
            });
        }
        self.value = value;
        if let Some(delegate) = &self.delegate {
            (delegate.borrow_mut())(&self.name, &self.value);
        }
        Ok(())
    }
}

/// Registry of every tunable property in one chain, shared by every stage.
pub struct PropRegistry {
    props: HashMap<String, Property>,
    log: Weak<RefCell<ActivityLog>>,
}

impl PropRegistry {
    pub fn new() -> Self {
        Self {
            props: HashMap::new(),
            log: Weak::new(),
        }
    }

    /// Attaches the log that scalar property writes should be recorded to.
    /// Array properties are not logged, matching the source (only scalar
    /// writes go through `HandleGesturesPropWritten`'s logging path).
    pub fn attach_log(&mut self, log: &Rc<RefCell<ActivityLog>>) {
        self.log = Rc::downgrade(log);
    }

    pub fn register_bool(&mut self, name: &str, default: bool) -> &mut Property {
        self.props
            .entry(name.to_string())
            .or_insert_with(|| Property::new(name, PropValue::Bool(default)))
    }

    pub fn register_int(&mut self, name: &str, default: i32) -> &mut Property {
        self.props
            .entry(name.to_string())
            .or_insert_with(|| Property::new(name, PropValue::Int(default)))
    }

    pub fn register_double(&mut self, name: &str, default: f64) -> &mut Property {
        self.props
            .entry(name.to_string())
            .or_insert_with(|| Property::new(name, PropValue::Double(default)))
    }

    pub fn register_string(&mut self, name: &str, default: &str) -> &mut Property {
        self.props.entry(name.to_string()).or_insert_with(|| {
            Property::new(name, PropValue::String(default.to_string()))
        })
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.props.get(name)
    }

    /// Writes a new value for `name`. Rejects a type mismatch, keeping the
    /// old value, per `PropertyTypeMismatch`'s propagation policy; logs a
    /// `PropChange` entry for scalar kinds when an ActivityLog is attached
    /// and the value actually changed (testable property 8: writing the
    /// same value twice logs exactly one entry, not two).
    pub fn set(&mut self, name: &str, value: PropValue) -> Result<(), GestureError> {
        let prop = self
            .props
            .get_mut(name)
            .ok_or_else(|| GestureError::PropertyTypeMismatch {
                name: name.to_string(),
            })?;
        let changed = prop.value() != &value;
        let is_scalar = !matches!(value, PropValue::DoubleArray(_) | PropValue::IntArray(_));
        prop.set_value(value.clone())?;
        if is_scalar && changed {
            if let Some(log) = self.log.upgrade() {
                log.borrow_mut().push_prop_change(name, &value);
            }
        }
        Ok(())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.props.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.props.keys().map(|s| s.as_str())
    }

    /// Registers `name` (if not already present) and attaches a delegate
    /// that mirrors every write into the returned cell. The owning stage
    /// keeps its own clone of the cell and reads it each frame instead of
    /// caching a value that would otherwise go stale the moment a host
    /// writes the property through the registry.
    ///
    /// This does not violate the "no delegate during construction" rule
    /// above: the delegate closes over the cell, an object independent of
    /// the stage, never over the stage (`self`) itself, so it is safe to
    /// attach from inside a stage's own `new`.
    pub fn bind_bool(&mut self, name: &str, default: bool) -> BoundCell<bool> {
        self.register_bool(name, default);
        let cell = Rc::new(RefCell::new(default));
        let write = Rc::clone(&cell);
        let delegate: Delegate = Rc::new(RefCell::new(move |_: &str, v: &PropValue| {
            if let PropValue::Bool(b) = v {
                *write.borrow_mut() = *b;
            }
        }));
        if let Some(prop) = self.props.get_mut(name) {
            prop.set_delegate(delegate);
        }
        cell
    }

    pub fn bind_int(&mut self, name: &str, default: i32) -> BoundCell<i32> {
        self.register_int(name, default);
        let cell = Rc::new(RefCell::new(default));
        let write = Rc::clone(&cell);
        let delegate: Delegate = Rc::new(RefCell::new(move |_: &str, v: &PropValue| {
            if let PropValue::Int(i) = v {
                *write.borrow_mut() = *i;
            }
        }));
        if let Some(prop) = self.props.get_mut(name) {
            prop.set_delegate(delegate);
        }
        cell
    }

    pub fn bind_double(&mut self, name: &str, default: f64) -> BoundCell<f64> {
        self.register_double(name, default);
        let cell = Rc::new(RefCell::new(default));
        let write = Rc::clone(&cell);
        let delegate: Delegate = Rc::new(RefCell::new(move |_: &str, v: &PropValue| {
            if let PropValue::Double(d) = v {
                *write.borrow_mut() = *d;
            }
        }));
        if let Some(prop) = self.props.get_mut(name) {
            prop.set_delegate(delegate);
        }
        cell
    }

    pub fn bind_string(&mut self, name: &str, default: &str) -> BoundCell<String> {
        self.register_string(name, default);
        let cell = Rc::new(RefCell::new(default.to_string()));
        let write = Rc::clone(&cell);
        let delegate: Delegate = Rc::new(RefCell::new(move |_: &str, v: &PropValue| {
            if let PropValue::String(s) = v {
                *write.borrow_mut() = s.clone();
            }
        }));
        if let Some(prop) = self.props.get_mut(name) {
            prop.set_delegate(delegate);
        }
        cell
    }
}

impl Default for PropRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_read_default() {
        let mut reg = PropRegistry::new();
        reg.register_double("Tap Timeout", 0.2);
        assert_eq!(reg.get("Tap Timeout").unwrap().value(), &PropValue::Double(0.2));
    }

    #[test]
    fn set_rejects_type_mismatch_and_keeps_old_value() {
        let mut reg = PropRegistry::new();
        reg.register_double("Tap Timeout", 0.2);
        let err = reg.set("Tap Timeout", PropValue::Bool(true));
        assert!(err.is_err());
        assert_eq!(reg.get("Tap Timeout").unwrap().value(), &PropValue::Double(0.2));
    }

    #[test]
    fn delegate_fires_on_write_and_only_after_attach() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut reg = PropRegistry::new();
        reg.register_bool("Tap Enable", true);

        let seen_clone = seen.clone();
        let delegate: Delegate = Rc::new(RefCell::new(move |name: &str, v: &PropValue| {
            seen_clone.borrow_mut().push((name.to_string(), v.clone()));
        }));
        reg.props.get_mut("Tap Enable").unwrap().set_delegate(delegate);

        reg.set("Tap Enable", PropValue::Bool(false)).unwrap();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].0, "Tap Enable");
    }

    #[test]
    fn repeated_identical_write_logs_exactly_one_entry() {
        // Testable property 8: writing the same value twice produces
        // exactly one PropChange entry in the log, not two.
        use crate::activity_log::ActivityLog;
        use std::cell::RefCell;
        use std::rc::Rc;

        let log = Rc::new(RefCell::new(ActivityLog::new(8192)));
        let mut reg = PropRegistry::new();
        reg.attach_log(&log);
        reg.register_int("Sensitivity", 3);
        reg.set("Sensitivity", PropValue::Int(5)).unwrap();
        reg.set("Sensitivity", PropValue::Int(5)).unwrap();
        assert_eq!(reg.get("Sensitivity").unwrap().value(), &PropValue::Int(5));
        assert_eq!(log.borrow().size(), 1);
    }

    #[test]
    fn bound_cell_tracks_writes_made_through_the_registry() {
        let mut reg = PropRegistry::new();
        let cell = reg.bind_double("Tap Timeout", 0.2);
        assert_eq!(*cell.borrow(), 0.2);
        reg.set("Tap Timeout", PropValue::Double(0.5)).unwrap();
        assert_eq!(*cell.borrow(), 0.5);
    }
}
