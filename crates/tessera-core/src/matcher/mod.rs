//! # Pattern Matcher Contract
//!
//! What the rule and query engines need from an incremental multi-pattern
//! matcher, and the bundled implementation (`JoinMatcher`).
//!
//! The engines register a `PatternSet` with an activation callback, then feed
//! fact deltas through `inject_positives` / `inject_negatives`. The matcher
//! answers through the callback: one `Token` per satisfying binding of the
//! whole pattern set, activated when it appears and deactivated when it
//! disappears. Tokens are owned by the matcher; engines only keep them as
//! keys and read their bindings.

mod join;

pub use join::JoinMatcher;

use crate::types::{Node, Quad, VariableNode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Variable -> value map of one match.
pub type Bindings = BTreeMap<VariableNode, Node>;

// =============================================================================
// TOKENS
// =============================================================================

/// Identifier of a token, unique within one matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TokenId(pub u64);

/// One satisfying binding of a rule's whole antecedent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    id: TokenId,
    bindings: Arc<Bindings>,
    facts: Arc<[Quad]>,
}

impl Token {
    #[must_use]
    pub fn new(id: TokenId, bindings: Bindings, facts: Vec<Quad>) -> Self {
        Self {
            id,
            bindings: Arc::new(bindings),
            facts: facts.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// The value bound to `variable`, if any.
    #[must_use]
    pub fn binding(&self, variable: &VariableNode) -> Option<&Node> {
        self.bindings.get(variable)
    }

    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// The facts supporting this match, one per positive pattern.
    #[must_use]
    pub fn facts(&self) -> &[Quad] {
        &self.facts
    }
}

/// Receiver of token activations.
pub trait TokenActivable {
    fn activate_token(&mut self, token: &Token);

    fn deactivate_token(&mut self, token: &Token);

    fn activate_tokens(&mut self, tokens: &[Token]) {
        for token in tokens {
            self.activate_token(token);
        }
    }

    fn deactivate_tokens(&mut self, tokens: &[Token]) {
        for token in tokens {
            self.deactivate_token(token);
        }
    }
}

// =============================================================================
// PATTERNS
// =============================================================================

/// Positive patterns that must all match, and negative conjunctions that
/// must not be satisfied at the same time.
///
/// A variable in any position, graph included, binds. A variable repeated
/// across or within patterns constrains the match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    positives: Vec<Quad>,
    negatives: Vec<Vec<Quad>>,
}

impl PatternSet {
    #[must_use]
    pub fn new(positives: Vec<Quad>, negatives: Vec<Vec<Quad>>) -> Self {
        Self {
            positives,
            negatives,
        }
    }

    #[must_use]
    pub fn positives(&self) -> &[Quad] {
        &self.positives
    }

    #[must_use]
    pub fn negatives(&self) -> &[Vec<Quad>] {
        &self.negatives
    }

    /// Variables bound by the positive patterns.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<&VariableNode> {
        self.positives.iter().flat_map(Quad::variables).collect()
    }
}

/// Handle of a rule registered with a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MatcherRuleId(pub u64);

// =============================================================================
// MATCH STATUS
// =============================================================================

/// Live match state of one registered rule, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchStatus {
    /// One step per positive pattern, in join order.
    pub steps: Vec<MatchStep>,
    /// Number of live tokens.
    pub tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchStep {
    /// The pattern, rendered.
    pub pattern: String,
    /// Facts matching this pattern on its own.
    pub facts: usize,
    /// Partial matches after joining this pattern with the previous ones.
    pub partial_matches: usize,
}

// =============================================================================
// MATCHER TRAIT
// =============================================================================

/// An incremental multi-pattern matcher.
pub trait PatternMatcher {
    /// Register a rule. Tokens over facts already present are activated
    /// before this returns.
    fn add_rule(&mut self, patterns: PatternSet, output: Box<dyn TokenActivable>) -> MatcherRuleId;

    /// Deregister a rule. Its live tokens are dropped without callbacks.
    fn remove_rule(&mut self, id: MatcherRuleId) -> bool;

    /// New facts.
    fn inject_positives(&mut self, quads: &[Quad]);

    /// Retracted facts.
    fn inject_negatives(&mut self, quads: &[Quad]);

    /// Match state of a registered rule.
    fn status(&self, id: MatcherRuleId) -> Option<MatchStatus>;
}
