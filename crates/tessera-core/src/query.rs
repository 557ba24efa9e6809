//! # Query Engine
//!
//! One-shot pattern evaluation against a store.
//!
//! A query compiles to a transient matcher rule. Every token live right after
//! registration is one solution; the rule is then removed. Results are a
//! snapshot, not a maintained view.

use crate::change::{ChangeInbox, SharedListener};
use crate::matcher::{
    Bindings, JoinMatcher, MatchStatus, PatternMatcher, PatternSet, Token, TokenActivable,
};
use crate::store::QuadStore;
use crate::types::{Node, Quad, TesseraError, VariableNode};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

// =============================================================================
// QUERY
// =============================================================================

/// Positive patterns plus negative conjunctions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    positives: Vec<Quad>,
    negatives: Vec<Vec<Quad>>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern that must match.
    #[must_use]
    pub fn positive(mut self, pattern: Quad) -> Self {
        self.positives.push(pattern);
        self
    }

    /// Add a conjunction that must not match as a whole.
    #[must_use]
    pub fn negative(mut self, conjunction: Vec<Quad>) -> Self {
        self.negatives.push(conjunction);
        self
    }

    #[must_use]
    pub fn positives(&self) -> &[Quad] {
        &self.positives
    }

    #[must_use]
    pub fn negatives(&self) -> &[Vec<Quad>] {
        &self.negatives
    }

    fn pattern_set(&self) -> Result<PatternSet, TesseraError> {
        if self.positives.is_empty() {
            return Err(TesseraError::InvalidQuery(
                "query has no positive pattern".to_string(),
            ));
        }
        if self.negatives.iter().any(Vec::is_empty) {
            return Err(TesseraError::InvalidQuery(
                "query has an empty negative conjunction".to_string(),
            ));
        }
        Ok(PatternSet::new(self.positives.clone(), self.negatives.clone()))
    }
}

/// One binding of the query's variables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Solution(Bindings);

impl Solution {
    #[must_use]
    pub fn get(&self, variable: &VariableNode) -> Option<&Node> {
        self.0.get(variable)
    }

    /// Value of the variable with this name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Node> {
        self.0.get(&VariableNode::new(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariableNode, &Node)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_bindings(self) -> Bindings {
        self.0
    }
}

// =============================================================================
// TOKEN COLLECTOR
// =============================================================================

/// Keeps the live tokens of a transient rule.
struct TokenCollector(Rc<RefCell<BTreeMap<u64, Token>>>);

impl TokenActivable for TokenCollector {
    fn activate_token(&mut self, token: &Token) {
        self.0.borrow_mut().insert(token.id().0, token.clone());
    }

    fn deactivate_token(&mut self, token: &Token) {
        self.0.borrow_mut().remove(&token.id().0);
    }
}

// =============================================================================
// QUERY ENGINE
// =============================================================================

/// Snapshot query evaluation over a store.
pub struct QueryEngine<M: PatternMatcher = JoinMatcher> {
    matcher: M,
    inbox: Rc<RefCell<ChangeInbox>>,
}

impl<M: PatternMatcher> fmt::Debug for QueryEngine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("pending", &self.inbox.borrow().has_pending())
            .finish()
    }
}

impl QueryEngine<JoinMatcher> {
    /// Create a query engine over `store` with the bundled matcher.
    pub fn attach(store: &mut QuadStore) -> Self {
        Self::with_matcher(store, JoinMatcher::new())
    }
}

impl<M: PatternMatcher> QueryEngine<M> {
    /// Create a query engine over `store` with a caller-supplied matcher.
    pub fn with_matcher(store: &mut QuadStore, mut matcher: M) -> Self {
        let inbox = Rc::new(RefCell::new(ChangeInbox::new()));
        store.add_listener(inbox.clone());
        let facts: Vec<Quad> = store.match_quads(None, None, None, None).collect();
        if !facts.is_empty() {
            matcher.inject_positives(&facts);
        }
        Self { matcher, inbox }
    }

    /// Stop listening to `store`.
    pub fn detach(&self, store: &mut QuadStore) -> bool {
        let listener: SharedListener = self.inbox.clone();
        store.remove_listener(&listener)
    }

    /// Bring the matcher up to date with the store.
    fn sync(&mut self) {
        let (positives, negatives) = self.inbox.borrow_mut().checkout();
        if !positives.is_empty() {
            self.matcher.inject_positives(&positives);
        }
        if !negatives.is_empty() {
            self.matcher.inject_negatives(&negatives);
        }
    }

    /// Evaluate `query` against the current content of the store.
    ///
    /// Solutions come out sorted by their bindings.
    pub fn execute(&mut self, query: &Query) -> Result<Vec<Solution>, TesseraError> {
        let patterns = query.pattern_set()?;
        self.sync();

        let tokens = Rc::new(RefCell::new(BTreeMap::new()));
        let id = self
            .matcher
            .add_rule(patterns, Box::new(TokenCollector(Rc::clone(&tokens))));
        self.matcher.remove_rule(id);

        let mut solutions: Vec<Solution> = tokens
            .borrow()
            .values()
            .map(|token| Solution(token.bindings().clone()))
            .collect();
        solutions.sort();
        debug!(solutions = solutions.len(), "query executed");
        Ok(solutions)
    }

    /// Match state of `query` against the current content of the store.
    pub fn match_status(&mut self, query: &Query) -> Result<MatchStatus, TesseraError> {
        let patterns = query.pattern_set()?;
        self.sync();

        let tokens = Rc::new(RefCell::new(BTreeMap::new()));
        let id = self
            .matcher
            .add_rule(patterns, Box::new(TokenCollector(tokens)));
        let status = self.matcher.status(id);
        self.matcher.remove_rule(id);
        status.ok_or_else(|| TesseraError::InvalidQuery("matcher lost the query".to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
