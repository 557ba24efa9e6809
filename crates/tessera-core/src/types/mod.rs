//! # Core Type Definitions
//!
//! This module contains the value types shared by every Tessera component:
//! - Node handles (`IriNode`, `BlankNode`, `LiteralNode`, `VariableNode`,
//!   `AnonymousNode`, `DynamicNode`) and the closed `Node` variant over them
//! - The immutable `Quad`
//! - Store result codes (`AddResult`, `RemoveResult`)
//! - Error types (`TesseraError`)
//!
//! ## Identity
//!
//! IRI and literal handles are reference-counted. A `NodeFactory` hands out
//! the same allocation for equal content, so `Node::same` is a pointer test.
//! `==` falls back to content comparison, which keeps quads comparable across
//! stores that do not share a factory.
//!
//! ## Determinism Guarantees
//!
//! Every type here implements `Ord`, so bindings, solutions and listings can
//! live in `BTreeMap`/`BTreeSet` and come out in a stable order.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// NODE HANDLES
// =============================================================================

/// An IRI node. Produced by `NodeFactory::iri_node`.
#[derive(Debug, Clone)]
pub struct IriNode(Arc<str>);

impl IriNode {
    pub(crate) fn from_shared(value: Arc<str>) -> Self {
        Self(value)
    }

    /// The IRI text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Pointer identity: true only for handles from the same interned allocation.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for IriNode {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || self.0 == other.0
    }
}

impl Eq for IriNode {}

impl Hash for IriNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialOrd for IriNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IriNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// A blank node, identified by a store-assigned id that is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlankNode(u64);

impl BlankNode {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The blank node id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Lexical form, datatype IRI and optional language tag of a literal.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LiteralData {
    lexical: Arc<str>,
    datatype: Arc<str>,
    lang: Option<Arc<str>>,
}

/// A literal node. Produced by `NodeFactory::literal_node`.
#[derive(Debug, Clone)]
pub struct LiteralNode(Arc<LiteralData>);

impl LiteralNode {
    pub(crate) fn from_parts(lexical: Arc<str>, datatype: Arc<str>, lang: Option<Arc<str>>) -> Self {
        Self(Arc::new(LiteralData {
            lexical,
            datatype,
            lang,
        }))
    }

    /// The lexical form.
    #[must_use]
    pub fn lexical(&self) -> &str {
        &self.0.lexical
    }

    /// The datatype IRI.
    #[must_use]
    pub fn datatype(&self) -> &str {
        &self.0.datatype
    }

    /// The language tag, if any.
    #[must_use]
    pub fn lang(&self) -> Option<&str> {
        self.0.lang.as_deref()
    }

    /// Pointer identity: true only for handles from the same interned allocation.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for LiteralNode {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || self.0 == other.0
    }
}

impl Eq for LiteralNode {}

impl Hash for LiteralNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialOrd for LiteralNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LiteralNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// A named variable. Acts as a wildcard in match/count and binds in patterns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableNode(Arc<str>);

impl VariableNode {
    /// Create a variable with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The variable name, without the leading `?`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// An OWL anonymous individual. Modelled, but not storable as a subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnonymousNode(Arc<str>);

impl AnonymousNode {
    /// Create an anonymous individual with the given identifier.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    /// The individual's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// A node whose value is computed by an `Evaluator` when a rule fires.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DynamicNode(Arc<str>);

impl DynamicNode {
    /// Create a dynamic node over the given expression.
    #[must_use]
    pub fn new(expression: &str) -> Self {
        Self(Arc::from(expression))
    }

    /// The expression handed to the evaluator.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// NODE
// =============================================================================

/// Discriminant of a `Node`, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Iri,
    Blank,
    Literal,
    Variable,
    Anonymous,
    Dynamic,
}

/// A node in any position of a quad or pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Iri(IriNode),
    Blank(BlankNode),
    Literal(LiteralNode),
    Variable(VariableNode),
    Anonymous(AnonymousNode),
    Dynamic(DynamicNode),
}

impl Node {
    /// Shorthand for a variable node.
    #[must_use]
    pub fn variable(name: &str) -> Self {
        Self::Variable(VariableNode::new(name))
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Iri(_) => NodeKind::Iri,
            Self::Blank(_) => NodeKind::Blank,
            Self::Literal(_) => NodeKind::Literal,
            Self::Variable(_) => NodeKind::Variable,
            Self::Anonymous(_) => NodeKind::Anonymous,
            Self::Dynamic(_) => NodeKind::Dynamic,
        }
    }

    /// Identity test: pointer equality for interned kinds, value equality otherwise.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Iri(a), Self::Iri(b)) => a.same(b),
            (Self::Literal(a), Self::Literal(b)) => a.same(b),
            _ => self == other,
        }
    }

    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// A ground node can be stored: neither a variable nor an unevaluated expression.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        !matches!(self, Self::Variable(_) | Self::Dynamic(_))
    }

    /// Graph role: IRI or blank.
    #[must_use]
    pub fn can_be_graph(&self) -> bool {
        matches!(self, Self::Iri(_) | Self::Blank(_))
    }

    /// Subject role: IRI or blank.
    #[must_use]
    pub fn can_be_subject(&self) -> bool {
        matches!(self, Self::Iri(_) | Self::Blank(_))
    }

    /// Property role: IRI only.
    #[must_use]
    pub fn can_be_property(&self) -> bool {
        matches!(self, Self::Iri(_))
    }

    #[must_use]
    pub fn as_iri(&self) -> Option<&IriNode> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blank(&self) -> Option<BlankNode> {
        match self {
            Self::Blank(blank) => Some(*blank),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&LiteralNode> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_variable(&self) -> Option<&VariableNode> {
        match self {
            Self::Variable(variable) => Some(variable),
            _ => None,
        }
    }
}

impl From<IriNode> for Node {
    fn from(node: IriNode) -> Self {
        Self::Iri(node)
    }
}

impl From<BlankNode> for Node {
    fn from(node: BlankNode) -> Self {
        Self::Blank(node)
    }
}

impl From<LiteralNode> for Node {
    fn from(node: LiteralNode) -> Self {
        Self::Literal(node)
    }
}

impl From<VariableNode> for Node {
    fn from(node: VariableNode) -> Self {
        Self::Variable(node)
    }
}

impl From<AnonymousNode> for Node {
    fn from(node: AnonymousNode) -> Self {
        Self::Anonymous(node)
    }
}

impl From<DynamicNode> for Node {
    fn from(node: DynamicNode) -> Self {
        Self::Dynamic(node)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{}>", iri.value()),
            Self::Blank(blank) => write!(f, "_:b{}", blank.id()),
            Self::Literal(literal) => match literal.lang() {
                Some(lang) => write!(f, "{:?}@{}", literal.lexical(), lang),
                None => write!(f, "{:?}^^<{}>", literal.lexical(), literal.datatype()),
            },
            Self::Variable(variable) => write!(f, "?{}", variable.name()),
            Self::Anonymous(anon) => write!(f, "_:anon-{}", anon.id()),
            Self::Dynamic(dynamic) => write!(f, "{{{}}}", dynamic.expression()),
        }
    }
}

// =============================================================================
// QUAD
// =============================================================================

/// Position of a node inside a quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuadPosition {
    Graph,
    Subject,
    Property,
    Object,
}

impl fmt::Display for QuadPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Graph => "graph",
            Self::Subject => "subject",
            Self::Property => "property",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// An immutable (graph, subject, property, object) fact or pattern.
///
/// Patterns are quads that contain `Variable` nodes. Every quad handed out by
/// the store is an independent value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quad {
    graph: Node,
    subject: Node,
    property: Node,
    object: Node,
}

impl Quad {
    /// Create a new quad.
    #[must_use]
    pub fn new(
        graph: impl Into<Node>,
        subject: impl Into<Node>,
        property: impl Into<Node>,
        object: impl Into<Node>,
    ) -> Self {
        Self {
            graph: graph.into(),
            subject: subject.into(),
            property: property.into(),
            object: object.into(),
        }
    }

    #[must_use]
    pub fn graph(&self) -> &Node {
        &self.graph
    }

    #[must_use]
    pub fn subject(&self) -> &Node {
        &self.subject
    }

    #[must_use]
    pub fn property(&self) -> &Node {
        &self.property
    }

    #[must_use]
    pub fn object(&self) -> &Node {
        &self.object
    }

    /// Node at the given position.
    #[must_use]
    pub fn get(&self, position: QuadPosition) -> &Node {
        match position {
            QuadPosition::Graph => &self.graph,
            QuadPosition::Subject => &self.subject,
            QuadPosition::Property => &self.property,
            QuadPosition::Object => &self.object,
        }
    }

    /// The same triple placed in another graph.
    #[must_use]
    pub fn with_graph(&self, graph: Node) -> Self {
        Self {
            graph,
            subject: self.subject.clone(),
            property: self.property.clone(),
            object: self.object.clone(),
        }
    }

    /// Check whether no position holds a variable or a dynamic node.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.nodes().all(|(_, node)| node.is_ground())
    }

    /// Iterate over (position, node) pairs in graph, subject, property, object order.
    pub fn nodes(&self) -> impl Iterator<Item = (QuadPosition, &Node)> {
        [
            (QuadPosition::Graph, &self.graph),
            (QuadPosition::Subject, &self.subject),
            (QuadPosition::Property, &self.property),
            (QuadPosition::Object, &self.object),
        ]
        .into_iter()
    }

    /// Variables used by this quad, in position order (repeats included).
    pub fn variables(&self) -> impl Iterator<Item = &VariableNode> {
        self.nodes().filter_map(|(_, node)| node.as_variable())
    }

    /// Decompose into (graph, subject, property, object).
    #[must_use]
    pub fn into_parts(self) -> (Node, Node, Node, Node) {
        (self.graph, self.subject, self.property, self.object)
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} .",
            self.subject, self.property, self.object, self.graph
        )
    }
}

// =============================================================================
// STORE RESULT CODES
// =============================================================================

/// Outcome of adding one quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddResult {
    /// Multiplicity went 0 -> 1. Listeners are notified.
    New,
    /// The quad was present; its multiplicity grew silently.
    Incremented,
}

/// Outcome of removing one quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveResult {
    /// The quad was absent. Not an error.
    NotFound,
    /// Multiplicity dropped but stays above zero. Silent.
    Decremented,
    /// Multiplicity went 1 -> 0. Listeners are notified.
    Removed,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Tessera.
///
/// - Rejected mutations leave the store unmodified
/// - Removing an absent quad is a reported no-op, never an error
/// - The core never panics; every failure surfaces here
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TesseraError {
    /// The subject is neither an IRI nor a blank node.
    #[error("Unsupported subject node type: {0} (subject must be an IRI or a blank node)")]
    UnsupportedSubjectType(String),

    /// A graph, property or object position holds a node it cannot hold.
    #[error("Unsupported node type in {position} position: {node}")]
    UnsupportedNodeType { position: QuadPosition, node: String },

    /// The fixpoint loop reached the configured iteration bound.
    #[error("Fixpoint not reached after {0} iterations")]
    IterationLimit(usize),

    /// The rule definition cannot be registered.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// The query cannot be executed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// No registered rule has this IRI.
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dataset file could not be converted into quads and rules.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
