//! # Session
//!
//! One store, one rule engine writing back into it, one query engine.
//!
//! Every mutation made through the session drives the rule engine to
//! fixpoint before returning, so readers always see a closed store.

use crate::change::Changeset;
use crate::engine::{EngineConfig, Explanation, FlushReport, RuleEngine};
use crate::entailment::EntailmentRegime;
use crate::evaluator::Evaluator;
use crate::matcher::MatchStatus;
use crate::nodes::NodeFactory;
use crate::query::{Query, QueryEngine, Solution};
use crate::rule::Rule;
use crate::store::QuadStore;
use crate::types::{AddResult, Node, Quad, RemoveResult, TesseraError};
use tracing::info;

/// A self-maintaining knowledge base.
#[derive(Debug)]
pub struct Session {
    store: QuadStore,
    rules: RuleEngine,
    queries: QueryEngine,
    regime: EntailmentRegime,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty session without entailment.
    #[must_use]
    pub fn new() -> Self {
        let mut store = QuadStore::new();
        let rules = RuleEngine::attach(&mut store, EngineConfig::default());
        let queries = QueryEngine::attach(&mut store);
        Self {
            store,
            rules,
            queries,
            regime: EntailmentRegime::None,
        }
    }

    /// Create a session with engine settings and a built-in rule set.
    pub fn with_config(config: EngineConfig, regime: EntailmentRegime) -> Result<Self, TesseraError> {
        let mut store = QuadStore::new();
        let mut rules = RuleEngine::attach(&mut store, config);
        let queries = QueryEngine::attach(&mut store);
        for rule in regime.rules(store.nodes_mut()) {
            rules.add(rule)?;
        }
        info!(?regime, max_iterations = ?config.max_iterations, "session created");
        Ok(Self {
            store,
            rules,
            queries,
            regime,
        })
    }

    /// Install the evaluator used for dynamic consequent nodes.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.rules = self.rules.with_evaluator(evaluator);
        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn store(&self) -> &QuadStore {
        &self.store
    }

    pub fn nodes_mut(&mut self) -> &mut NodeFactory {
        self.store.nodes_mut()
    }

    #[must_use]
    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    #[must_use]
    pub fn regime(&self) -> EntailmentRegime {
        self.regime
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    pub fn add(
        &mut self,
        graph: &Node,
        subject: &Node,
        property: &Node,
        object: &Node,
    ) -> Result<AddResult, TesseraError> {
        let result = self.store.add(graph, subject, property, object)?;
        self.flush()?;
        Ok(result)
    }

    pub fn remove(
        &mut self,
        graph: &Node,
        subject: &Node,
        property: &Node,
        object: &Node,
    ) -> Result<RemoveResult, TesseraError> {
        let result = self.store.remove(graph, subject, property, object)?;
        self.flush()?;
        Ok(result)
    }

    pub fn add_quad(&mut self, quad: &Quad) -> Result<AddResult, TesseraError> {
        self.add(quad.graph(), quad.subject(), quad.property(), quad.object())
    }

    pub fn remove_quad(&mut self, quad: &Quad) -> Result<RemoveResult, TesseraError> {
        self.remove(quad.graph(), quad.subject(), quad.property(), quad.object())
    }

    /// Apply a batch, then flush once.
    pub fn insert(&mut self, changeset: &Changeset) -> Result<Changeset, TesseraError> {
        let applied = self.store.insert(changeset)?;
        self.flush()?;
        Ok(applied)
    }

    // =========================================================================
    // RULES
    // =========================================================================

    pub fn add_rule(&mut self, rule: Rule) -> Result<FlushReport, TesseraError> {
        self.rules.add(rule)?;
        self.flush()
    }

    pub fn remove_rule(&mut self, iri: &str) -> Result<FlushReport, TesseraError> {
        self.rules.remove_iri(iri)?;
        self.flush()
    }

    /// Drive the rule engine to fixpoint.
    pub fn flush(&mut self) -> Result<FlushReport, TesseraError> {
        self.rules.flush(&mut self.store)
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn query(&mut self, query: &Query) -> Result<Vec<Solution>, TesseraError> {
        self.queries.execute(query)
    }

    pub fn query_status(&mut self, query: &Query) -> Result<MatchStatus, TesseraError> {
        self.queries.match_status(query)
    }

    #[must_use]
    pub fn explain(&self, quad: &Quad) -> Option<Explanation> {
        self.rules.explain(quad)
    }

    pub fn match_status(&self, iri: &str) -> Result<MatchStatus, TesseraError> {
        self.rules.match_status_iri(iri)
    }
}
