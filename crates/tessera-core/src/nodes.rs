//! # Node Factory
//!
//! Creates and interns node handles.
//!
//! IRIs and literals are interned: asking twice for the same content returns
//! handles that share one allocation, so identity checks are pointer tests.
//! Blank nodes get fresh ids from a counter that never reuses a value.

use crate::interner::{StringInterner, StringKey};
use crate::types::{
    AnonymousNode, BlankNode, DynamicNode, IriNode, LiteralNode, Node, VariableNode,
};
use crate::vocab;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// Prefix of IRIs minted for unbound graph variables in rule consequents.
pub const SKOLEM_PREFIX: &str = "urn:tessera:skolem:";

/// One interned literal: (datatype key, language key, handle).
type LiteralEntry = (StringKey, Option<StringKey>, LiteralNode);

/// Shared source of blank ids.
///
/// A rule engine allocates generated blank nodes from its input store's
/// counter, so ids stay unique in every store the engine writes to.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlankCounter(Rc<Cell<u64>>);

impl BlankCounter {
    pub(crate) fn allocate(&self) -> BlankNode {
        let id = self.0.get();
        self.0.set(id + 1);
        BlankNode::new(id)
    }

    /// Never hand out `id` or anything below it again.
    pub(crate) fn reserve(&self, id: u64) {
        if self.0.get() <= id {
            self.0.set(id + 1);
        }
    }

    fn watermark(&self) -> u64 {
        self.0.get()
    }
}

/// Factory and interning table for every node of one store.
#[derive(Debug, Clone, Default)]
pub struct NodeFactory {
    strings: StringInterner,
    iris: BTreeMap<StringKey, IriNode>,
    /// Literals bucketed by lexical form.
    literals: BTreeMap<StringKey, Vec<LiteralEntry>>,
    blanks: BlankCounter,
    next_skolem: u64,
}

impl NodeFactory {
    /// Create an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the IRI node for `iri`.
    pub fn iri_node(&mut self, iri: &str) -> IriNode {
        let key = self.strings.store(iri);
        if let Some(node) = self.iris.get(&key) {
            return node.clone();
        }
        let shared = self
            .strings
            .retrieve_shared(key)
            .unwrap_or_else(|| Arc::from(iri));
        let node = IriNode::from_shared(shared);
        self.iris.insert(key, node.clone());
        node
    }

    /// Look up an IRI node without creating it.
    #[must_use]
    pub fn existing_iri_node(&self, iri: &str) -> Option<IriNode> {
        let key = self.strings.contains(iri)?;
        self.iris.get(&key).cloned()
    }

    /// Key of an interned IRI, if it was ever created through this factory.
    pub(crate) fn existing_iri_key(&self, iri: &IriNode) -> Option<StringKey> {
        let key = self.strings.contains(iri.value())?;
        self.iris.contains_key(&key).then_some(key)
    }

    /// Key of an IRI, interning it when needed.
    pub(crate) fn iri_key(&mut self, iri: &IriNode) -> StringKey {
        let key = self.strings.store(iri.value());
        self.iris.entry(key).or_insert_with(|| iri.clone());
        key
    }

    /// The IRI node behind an interned key.
    pub(crate) fn resolve_iri(&self, key: StringKey) -> Option<IriNode> {
        self.iris.get(&key).cloned()
    }

    /// Create a fresh blank node. Ids are never reused.
    pub fn blank_node(&mut self) -> BlankNode {
        self.blanks.allocate()
    }

    /// Upper bound (exclusive) of the blank ids handed out or reserved so far.
    #[must_use]
    pub fn blank_watermark(&self) -> u64 {
        self.blanks.watermark()
    }

    /// Keep `id` out of future allocations. Stores call this for every blank
    /// they receive from elsewhere.
    pub(crate) fn reserve_blank(&mut self, id: u64) {
        self.blanks.reserve(id);
    }

    /// Handle on the blank id counter of this factory.
    pub(crate) fn blank_counter(&self) -> BlankCounter {
        self.blanks.clone()
    }

    /// Get or create a literal node.
    ///
    /// An empty language tag is the same as no tag. When `datatype` is absent,
    /// `xsd:string` is used, or `rdf:langString` for tagged literals.
    pub fn literal_node(
        &mut self,
        lexical: &str,
        datatype: Option<&str>,
        lang: Option<&str>,
    ) -> LiteralNode {
        let lang = lang.filter(|tag| !tag.is_empty());
        let datatype = match (datatype, lang) {
            (Some(datatype), _) if !datatype.is_empty() => datatype,
            (_, Some(_)) => vocab::RDF_LANG_STRING,
            _ => vocab::XSD_STRING,
        };

        let lexical_key = self.strings.store(lexical);
        let datatype_key = self.strings.store(datatype);
        let lang_key = lang.map(|tag| self.strings.store(tag));

        let bucket = self.literals.entry(lexical_key).or_default();
        if let Some((_, _, node)) = bucket
            .iter()
            .find(|(dt, tag, _)| *dt == datatype_key && *tag == lang_key)
        {
            return node.clone();
        }

        let shared = |key: StringKey, fallback: &str| {
            self.strings
                .retrieve_shared(key)
                .unwrap_or_else(|| Arc::from(fallback))
        };
        let node = LiteralNode::from_parts(
            shared(lexical_key, lexical),
            shared(datatype_key, datatype),
            lang_key.zip(lang).map(|(key, tag)| shared(key, tag)),
        );
        self.literals
            .entry(lexical_key)
            .or_default()
            .push((datatype_key, lang_key, node.clone()));
        node
    }

    /// Create a variable node. Variables are not interned.
    #[must_use]
    pub fn variable_node(&self, name: &str) -> VariableNode {
        VariableNode::new(name)
    }

    /// Create an anonymous individual node.
    #[must_use]
    pub fn anonymous_node(&self, id: &str) -> AnonymousNode {
        AnonymousNode::new(id)
    }

    /// Create a dynamic node over an expression.
    #[must_use]
    pub fn dynamic_node(&self, expression: &str) -> DynamicNode {
        DynamicNode::new(expression)
    }

    /// Mint an IRI that no node of this factory uses yet.
    pub fn fresh_iri_node(&mut self) -> IriNode {
        loop {
            let candidate = format!("{SKOLEM_PREFIX}{}", self.next_skolem);
            self.next_skolem += 1;
            if self.strings.contains(&candidate).is_none() {
                return self.iri_node(&candidate);
            }
        }
    }

    /// Shorthand: intern an IRI and wrap it as a `Node`.
    pub fn iri(&mut self, iri: &str) -> Node {
        Node::Iri(self.iri_node(iri))
    }

    /// Shorthand: plain `xsd:string` literal as a `Node`.
    pub fn literal(&mut self, lexical: &str) -> Node {
        Node::Literal(self.literal_node(lexical, None, None))
    }

    /// Number of interned IRIs.
    #[must_use]
    pub fn iri_count(&self) -> usize {
        self.iris.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
