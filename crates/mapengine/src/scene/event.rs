use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::CommandQueue;
use super::object::Body;

/// Loosely typed value for timed attribute changes and the run diary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            AttrValue::Float(value) => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            AttrValue::Int(value) => Some(*value != 0),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value.into())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

pub type EventCallback = Box<dyn FnOnce(&mut Body, &mut CommandQueue)>;

pub enum EventAction {
    Assign { attribute: String, value: AttrValue },
    Invoke(EventCallback),
}

impl fmt::Debug for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventAction::Assign { attribute, value } => f
                .debug_struct("Assign")
                .field("attribute", attribute)
                .field("value", value)
                .finish(),
            EventAction::Invoke(_) => f.write_str("Invoke(..)"),
        }
    }
}

/// A deferred change to the owning object, applied after `countdown` ticks.
///
/// Events are keyed: adding an event whose key is already pending replaces the pending one.
#[derive(Debug)]
pub struct Event {
    countdown: i64,
    key: String,
    action: EventAction,
}

impl Event {
    /// Sets `attribute` to `value`; the attribute name doubles as the key.
    pub fn assign(ticks: i64, attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let attribute = attribute.into();
        Self {
            countdown: ticks,
            key: attribute.clone(),
            action: EventAction::Assign {
                attribute,
                value: value.into(),
            },
        }
    }

    pub fn invoke<F>(ticks: i64, key: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce(&mut Body, &mut CommandQueue) + 'static,
    {
        Self {
            countdown: ticks,
            key: key.into(),
            action: EventAction::Invoke(Box::new(callback)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn countdown(&self) -> i64 {
        self.countdown
    }

    /// Counts one tick down. Returns true once the event is due.
    pub(crate) fn tick(&mut self) -> bool {
        self.countdown -= 1;
        self.countdown <= 0
    }

    pub(crate) fn apply(self, body: &mut Body, commands: &mut CommandQueue) {
        match self.action {
            EventAction::Assign { attribute, value } => body.set_attribute(&attribute, value),
            EventAction::Invoke(callback) => callback(body, commands),
        }
    }
}

/// Game state that outlives scenes: lives, inventory, story flags. Cleared by a hard reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diary {
    entries: HashMap<String, AttrValue>,
}

impl Diary {
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
