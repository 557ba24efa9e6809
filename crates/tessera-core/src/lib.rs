//! # tessera-core
//!
//! An embeddable RDF quad store with incremental forward-chaining rules.
//!
//! This crate holds every piece of semantics:
//! - the string interner and node factory behind node identity
//! - the multiplicity-counted quad index and its change notifications
//! - the pattern-matcher contract and the bundled join matcher
//! - the rule engine (fire / unfire to fixpoint) and the snapshot query engine
//! - built-in entailment rules and the auto-flushing `Session`
//!
//! ## Architectural Constraints
//!
//! - Single-threaded and synchronous: no async, no locks, no network
//! - No process-wide state: evaluators and configuration are passed in
//! - Deterministic: ordered maps everywhere output order is observable
//! - Fallible operations return `Result<T, TesseraError>`; nothing panics

// =============================================================================
// MODULES
// =============================================================================

pub mod change;
pub mod engine;
pub mod entailment;
pub mod evaluator;
mod index;
pub mod interner;
pub mod matcher;
pub mod nodes;
pub mod query;
pub mod rule;
pub mod session;
pub mod store;
pub mod types;
pub mod vocab;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    AddResult, AnonymousNode, BlankNode, DynamicNode, IriNode, LiteralNode, Node, NodeKind, Quad,
    QuadPosition, RemoveResult, TesseraError, VariableNode,
};

// =============================================================================
// RE-EXPORTS: Store and Engines
// =============================================================================

pub use change::{Change, ChangeInbox, ChangeListener, Changeset, SharedListener};
pub use engine::{EngineConfig, Explanation, FlushReport, RuleEngine};
pub use entailment::{EntailmentRegime, rdfs_rules};
pub use evaluator::{Evaluator, FunctionRegistry};
pub use interner::{StringInterner, StringKey};
pub use matcher::{
    Bindings, JoinMatcher, MatchStatus, MatchStep, MatcherRuleId, PatternMatcher, PatternSet,
    Token, TokenActivable, TokenId,
};
pub use nodes::NodeFactory;
pub use query::{Query, QueryEngine, Solution};
pub use rule::{Rule, RuleBuilder};
pub use session::Session;
pub use store::QuadStore;
