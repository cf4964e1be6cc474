//! Module tables
//!
//! A [`Module`] is a named set of native functions that a session exposes as
//! one table, both as a global and to `require`.

use crate::aggregate::encode_aggregate;
use crate::function::NativeFunction;
use crate::kind::{Classify, Kind};
use crate::stack::State;
use crate::value::Encode;

/// A named table of native functions
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    functions: Vec<(String, NativeFunction)>,
}

impl Module {
    /// An empty module exposed under `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Add a function under `name`, replacing any earlier one with that name
    pub fn function(mut self, name: impl Into<String>, func: NativeFunction) -> Self {
        let name = name.into();
        self.functions.retain(|(existing, _)| *existing != name);
        self.functions.push((name, func));
        self
    }

    /// Global name and `require` key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of functions in the module
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when no function has been added
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Function names in registration order
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|(name, _)| name.as_str())
    }
}

impl Classify for Module {
    const KIND: Kind = Kind::Aggregate;
}

impl Encode for Module {
    fn encode(&self, state: State) {
        encode_aggregate(state, self.functions.len(), |fields| {
            for (name, func) in &self.functions {
                fields.field(name, func);
            }
        });
    }
}
