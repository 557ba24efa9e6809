//! # Evaluator
//!
//! Resolution of `Dynamic` nodes in rule consequents.
//!
//! The rule engine owns its evaluator; there is no process-wide registry.
//! `FunctionRegistry` is the bundled implementation: expressions are function
//! names looked up in a table filled by the caller at startup.

use crate::matcher::Bindings;
use crate::nodes::NodeFactory;
use crate::types::Node;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Computes the value of a dynamic node for one firing.
pub trait Evaluator {
    /// Evaluate `expression` under the firing's bindings.
    ///
    /// Returning `None` abandons the firing.
    fn evaluate(&self, expression: &str, bindings: &Bindings, nodes: &mut NodeFactory) -> Option<Node>;
}

/// A registered function.
pub type Function = Box<dyn Fn(&Bindings, &mut NodeFactory) -> Option<Node>>;

/// Name -> function table.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Function>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under `name`, replacing any previous entry.
    pub fn register(
        &mut self,
        name: &str,
        function: impl Fn(&Bindings, &mut NodeFactory) -> Option<Node> + 'static,
    ) -> &mut Self {
        self.functions.insert(name.to_string(), Box::new(function));
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Evaluator for FunctionRegistry {
    fn evaluate(&self, expression: &str, bindings: &Bindings, nodes: &mut NodeFactory) -> Option<Node> {
        let name = expression.trim();
        let Some(function) = self.functions.get(name) else {
            warn!(function = name, "unknown function in dynamic node");
            return None;
        };
        function(bindings, nodes)
    }
}
