//! # Rule Engine
//!
//! Incremental forward chaining over a `QuadStore`.
//!
//! The engine listens to an input store through a `ChangeInbox`, feeds the
//! queued deltas to a shared `PatternMatcher`, and turns the matcher's token
//! callbacks into work:
//!
//! - activation: the token becomes a pending fire
//! - deactivation: a pending fire is cancelled, otherwise the token becomes
//!   a pending unfire
//!
//! `flush` drains this work to fixpoint. Each pass injects pending changes,
//! processes every unfire, then every fire, then writes the accumulated
//! changeset to the output store in one `insert`. If the output store is the
//! input store, that write lands back in the inbox and drives the next pass.
//!
//! ## Skolemization
//!
//! A consequent variable left unbound by the token gets a fresh node the
//! first time a firing meets it: an IRI in graph position, a blank node
//! elsewhere. The production of every firing is recorded per token, and an
//! unfire writes its exact negation, so generated nodes are retracted rather
//! than re-generated.
//!
//! Generated blank ids come from the input store's counter, and every store
//! reserves the blank ids it receives, so a separate output store never
//! confuses a copied input blank with a generated one.
//!
//! Only retractions that take effect are recorded: a negative consequent
//! naming an absent quad is dropped at fire time, so the unfire does not
//! add a quad that never existed.

use crate::change::{ChangeInbox, Changeset, SharedListener};
use crate::evaluator::Evaluator;
use crate::matcher::{
    Bindings, JoinMatcher, MatchStatus, MatcherRuleId, PatternMatcher, Token, TokenActivable,
    TokenId,
};
use crate::nodes::{BlankCounter, NodeFactory};
use crate::rule::Rule;
use crate::store::QuadStore;
use crate::types::{Node, Quad, QuadPosition, TesseraError};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

// =============================================================================
// CONFIGURATION AND REPORTS
// =============================================================================

/// Engine settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// Upper bound on fixpoint passes per `flush`. `None` = unbounded.
    pub max_iterations: Option<usize>,
}

/// What one `flush` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub iterations: usize,
    pub fired: usize,
    pub unfired: usize,
    /// Quads that became present in the output store.
    pub added: usize,
    /// Quads that became absent from the output store.
    pub removed: usize,
}

/// Why a produced quad is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    /// IRI of the rule that produced the quad.
    pub rule: String,
    pub bindings: Bindings,
    pub produced: Quad,
    /// Facts that matched the rule's positive antecedent.
    pub antecedents: Vec<Quad>,
    /// Explanations of the antecedents that were themselves produced.
    pub parents: Vec<Explanation>,
}

// =============================================================================
// PENDING WORK
// =============================================================================

struct FireRequest {
    rule: Arc<Rule>,
    token: Token,
}

/// Work queued by matcher callbacks.
#[derive(Default)]
struct EngineIo {
    requests_to_fire: BTreeMap<TokenId, FireRequest>,
    requests_to_unfire: Vec<TokenId>,
    is_flushing: bool,
}

/// Matcher callback of one registered rule.
struct Activation {
    rule: Arc<Rule>,
    io: Rc<RefCell<EngineIo>>,
}

impl TokenActivable for Activation {
    fn activate_token(&mut self, token: &Token) {
        self.io.borrow_mut().requests_to_fire.insert(
            token.id(),
            FireRequest {
                rule: Arc::clone(&self.rule),
                token: token.clone(),
            },
        );
    }

    fn deactivate_token(&mut self, token: &Token) {
        let mut io = self.io.borrow_mut();
        if io.requests_to_fire.remove(&token.id()).is_none() {
            io.requests_to_unfire.push(token.id());
        }
    }
}

struct RuleData {
    rule: Arc<Rule>,
    matcher_id: MatcherRuleId,
}

/// A firing whose production is live in the output store.
struct Execution {
    rule: Arc<Rule>,
    token: Token,
    changeset: Changeset,
}

// =============================================================================
// RULE ENGINE
// =============================================================================

/// Forward-chaining rule engine.
pub struct RuleEngine<M: PatternMatcher = JoinMatcher> {
    matcher: M,
    inbox: Rc<RefCell<ChangeInbox>>,
    io: Rc<RefCell<EngineIo>>,
    rules: BTreeMap<String, RuleData>,
    executions: BTreeMap<TokenId, Execution>,
    buffer: Changeset,
    blanks: BlankCounter,
    evaluator: Option<Box<dyn Evaluator>>,
    config: EngineConfig,
}

impl<M: PatternMatcher> fmt::Debug for RuleEngine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("executions", &self.executions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl RuleEngine<JoinMatcher> {
    /// Create an engine over `input` with the bundled matcher.
    pub fn attach(input: &mut QuadStore, config: EngineConfig) -> Self {
        Self::with_matcher(input, JoinMatcher::new(), config)
    }
}

impl<M: PatternMatcher> RuleEngine<M> {
    /// Create an engine over `input` with a caller-supplied matcher.
    ///
    /// The engine starts listening to `input` and the matcher is seeded with
    /// the quads already present.
    pub fn with_matcher(input: &mut QuadStore, mut matcher: M, config: EngineConfig) -> Self {
        let inbox = Rc::new(RefCell::new(ChangeInbox::new()));
        let blanks = input.nodes().blank_counter();
        input.add_listener(inbox.clone());
        let facts: Vec<Quad> = input.match_quads(None, None, None, None).collect();
        if !facts.is_empty() {
            matcher.inject_positives(&facts);
        }
        debug!(facts = facts.len(), "rule engine attached");

        Self {
            matcher,
            inbox,
            io: Rc::new(RefCell::new(EngineIo::default())),
            rules: BTreeMap::new(),
            executions: BTreeMap::new(),
            buffer: Changeset::default(),
            blanks,
            evaluator: None,
            config,
        }
    }

    /// Install the evaluator used for dynamic consequent nodes.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    /// Stop listening to `input`. Returns false if the engine was not attached to it.
    pub fn detach(&self, input: &mut QuadStore) -> bool {
        let listener: SharedListener = self.inbox.clone();
        input.remove_listener(&listener)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // RULES
    // =========================================================================

    /// Register a rule. It fires on the next `flush`.
    pub fn add(&mut self, rule: Rule) -> Result<(), TesseraError> {
        rule.validate()?;
        if self.rules.contains_key(rule.iri()) {
            return Err(TesseraError::InvalidRule(format!(
                "{} is already registered",
                rule.iri()
            )));
        }

        let rule = Arc::new(rule);
        let activation = Activation {
            rule: Arc::clone(&rule),
            io: Rc::clone(&self.io),
        };
        let matcher_id = self.matcher.add_rule(rule.pattern_set(), Box::new(activation));
        debug!(rule = rule.iri(), "rule registered");
        self.rules
            .insert(rule.iri().to_string(), RuleData { rule, matcher_id });
        Ok(())
    }

    /// Deregister a rule and retract the productions of its live firings.
    pub fn remove(&mut self, rule: &Rule) -> Result<(), TesseraError> {
        self.remove_iri(rule.iri())
    }

    /// Deregister the rule with this IRI.
    ///
    /// The negations of its live firings are buffered and written by the next
    /// `flush`.
    pub fn remove_iri(&mut self, iri: &str) -> Result<(), TesseraError> {
        let data = self
            .rules
            .remove(iri)
            .ok_or_else(|| TesseraError::UnknownRule(iri.to_string()))?;
        self.matcher.remove_rule(data.matcher_id);

        let retired: Vec<TokenId> = self
            .executions
            .iter()
            .filter(|(_, execution)| Arc::ptr_eq(&execution.rule, &data.rule))
            .map(|(id, _)| *id)
            .collect();
        {
            let mut io = self.io.borrow_mut();
            io.requests_to_fire
                .retain(|_, request| !Arc::ptr_eq(&request.rule, &data.rule));
            io.requests_to_unfire.retain(|id| !retired.contains(id));
        }
        for id in &retired {
            if let Some(execution) = self.executions.remove(id) {
                self.buffer.extend(&execution.changeset.negate());
            }
        }

        debug!(rule = iri, retracted = retired.len(), "rule removed");
        Ok(())
    }

    /// Registered rules, by IRI.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values().map(|data| data.rule.as_ref())
    }

    #[must_use]
    pub fn contains_rule(&self, iri: &str) -> bool {
        self.rules.contains_key(iri)
    }

    /// Match state of a registered rule.
    pub fn match_status(&self, rule: &Rule) -> Result<MatchStatus, TesseraError> {
        self.match_status_iri(rule.iri())
    }

    pub fn match_status_iri(&self, iri: &str) -> Result<MatchStatus, TesseraError> {
        self.rules
            .get(iri)
            .and_then(|data| self.matcher.status(data.matcher_id))
            .ok_or_else(|| TesseraError::UnknownRule(iri.to_string()))
    }

    /// Number of firings whose production is live.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }

    /// Check whether `flush` has anything to do.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        let io = self.io.borrow();
        self.inbox.borrow().has_pending()
            || !io.requests_to_fire.is_empty()
            || !io.requests_to_unfire.is_empty()
            || !self.buffer.is_empty()
    }

    // =========================================================================
    // FIXPOINT
    // =========================================================================

    /// Drain all pending work into `output` until nothing is left.
    ///
    /// A call made while another flush of this engine is running returns an
    /// empty report; the running flush picks up the new work.
    pub fn flush(&mut self, output: &mut QuadStore) -> Result<FlushReport, TesseraError> {
        {
            let mut io = self.io.borrow_mut();
            if io.is_flushing {
                return Ok(FlushReport::default());
            }
            io.is_flushing = true;
        }
        let result = self.run_to_fixpoint(output);
        self.io.borrow_mut().is_flushing = false;
        result
    }

    fn run_to_fixpoint(&mut self, output: &mut QuadStore) -> Result<FlushReport, TesseraError> {
        let mut report = FlushReport::default();

        while self.has_pending() {
            if let Some(limit) = self.config.max_iterations {
                if report.iterations >= limit {
                    warn!(limit, "fixpoint iteration limit reached");
                    return Err(TesseraError::IterationLimit(limit));
                }
            }
            report.iterations += 1;

            let (positives, negatives) = self.inbox.borrow_mut().checkout();
            if !positives.is_empty() {
                self.matcher.inject_positives(&positives);
            }
            if !negatives.is_empty() {
                self.matcher.inject_negatives(&negatives);
            }

            let (fires, unfires) = {
                let mut io = self.io.borrow_mut();
                (
                    std::mem::take(&mut io.requests_to_fire),
                    std::mem::take(&mut io.requests_to_unfire),
                )
            };

            for id in unfires {
                if let Some(execution) = self.executions.remove(&id) {
                    trace!(rule = execution.rule.iri(), token = id.0, "unfire");
                    self.buffer.extend(&execution.changeset.negate());
                    report.unfired += 1;
                }
            }

            for (id, request) in fires {
                let Some(changeset) = self.produce(&request.rule, &request.token, output.nodes_mut())
                else {
                    warn!(rule = request.rule.iri(), token = id.0, "firing abandoned");
                    continue;
                };
                trace!(rule = request.rule.iri(), token = id.0, "fire");
                let changeset = self.effective(changeset, output);
                self.buffer.extend(&changeset);
                self.executions.insert(
                    id,
                    Execution {
                        rule: request.rule,
                        token: request.token,
                        changeset,
                    },
                );
                report.fired += 1;
            }

            if !self.buffer.is_empty() {
                let batch = std::mem::take(&mut self.buffer);
                let applied = output.insert(&batch).inspect_err(|err| {
                    error!(error = %err, "output store rejected rule production");
                })?;
                report.added += applied.added().len();
                report.removed += applied.removed().len();
            }

            debug!(
                iteration = report.iterations,
                fired = report.fired,
                unfired = report.unfired,
                "fixpoint pass"
            );
        }

        Ok(report)
    }

    // =========================================================================
    // PRODUCTION
    // =========================================================================

    /// Instantiate the consequent of `rule` for `token`.
    ///
    /// Returns `None` when a position cannot be filled or filled node does
    /// not fit its role.
    fn produce(&self, rule: &Rule, token: &Token, nodes: &mut NodeFactory) -> Option<Changeset> {
        let mut specials = BTreeMap::new();
        let mut added = Vec::new();
        for pattern in rule.productions() {
            added.push(self.instantiate(pattern, token, &mut specials, nodes)?);
        }
        let mut removed = Vec::new();
        for pattern in rule.retractions() {
            removed.push(self.instantiate(pattern, token, &mut specials, nodes)?);
        }
        Some(Changeset::new(added, removed))
    }

    /// Drop the retractions of `changeset` that would not find their quad.
    ///
    /// A quad is available if the output holds it or a pending addition
    /// brings it, minus the retractions already queued against it.
    fn effective(&self, changeset: Changeset, output: &QuadStore) -> Changeset {
        let occurrences = |quads: &[Quad], quad: &Quad| quads.iter().filter(|q| *q == quad).count();
        let (added, removed) = changeset.into_parts();
        let mut kept: Vec<Quad> = Vec::with_capacity(removed.len());
        for quad in removed {
            let stored =
                output.multiplicity(quad.graph(), quad.subject(), quad.property(), quad.object());
            let available = stored as usize
                + occurrences(self.buffer.added(), &quad)
                + occurrences(added.as_slice(), &quad);
            let claimed = occurrences(self.buffer.removed(), &quad) + occurrences(kept.as_slice(), &quad);
            if available > claimed {
                kept.push(quad);
            } else {
                trace!(%quad, "retraction of absent quad dropped");
            }
        }
        Changeset::new(added, kept)
    }

    fn instantiate(
        &self,
        pattern: &Quad,
        token: &Token,
        specials: &mut BTreeMap<Node, Node>,
        nodes: &mut NodeFactory,
    ) -> Option<Quad> {
        let mut resolve = |position: QuadPosition| {
            self.resolve(pattern.get(position), position, token, specials, nodes)
        };
        let quad = Quad::new(
            resolve(QuadPosition::Graph)?,
            resolve(QuadPosition::Subject)?,
            resolve(QuadPosition::Property)?,
            resolve(QuadPosition::Object)?,
        );

        let fits = quad.graph().can_be_graph()
            && quad.subject().can_be_subject()
            && quad.property().can_be_property()
            && quad.object().is_ground();
        if !fits {
            debug!(%quad, "consequent does not fit quad roles");
            return None;
        }
        Some(quad)
    }

    fn resolve(
        &self,
        node: &Node,
        position: QuadPosition,
        token: &Token,
        specials: &mut BTreeMap<Node, Node>,
        nodes: &mut NodeFactory,
    ) -> Option<Node> {
        match node {
            Node::Variable(variable) => {
                if let Some(value) = token.binding(variable) {
                    return Some(value.clone());
                }
                let value = specials.entry(node.clone()).or_insert_with(|| {
                    if position == QuadPosition::Graph {
                        Node::Iri(nodes.fresh_iri_node())
                    } else {
                        Node::Blank(self.blanks.allocate())
                    }
                });
                Some(value.clone())
            }
            Node::Dynamic(dynamic) => {
                if let Some(value) = specials.get(node) {
                    return Some(value.clone());
                }
                let Some(evaluator) = self.evaluator.as_ref() else {
                    warn!(expression = dynamic.expression(), "no evaluator for dynamic node");
                    return None;
                };
                let value = evaluator.evaluate(dynamic.expression(), token.bindings(), nodes)?;
                specials.insert(node.clone(), value.clone());
                Some(value)
            }
            _ => Some(node.clone()),
        }
    }

    // =========================================================================
    // EXPLANATION
    // =========================================================================

    /// Explain a quad produced by a live firing.
    #[must_use]
    pub fn explain(&self, quad: &Quad) -> Option<Explanation> {
        self.explain_within(quad, &mut BTreeSet::new())
    }

    fn explain_within(&self, quad: &Quad, path: &mut BTreeSet<Quad>) -> Option<Explanation> {
        let execution = self
            .executions
            .values()
            .find(|execution| execution.changeset.added().contains(quad))?;
        if !path.insert(quad.clone()) {
            return None;
        }

        let antecedents = execution.token.facts().to_vec();
        let parents = antecedents
            .iter()
            .filter_map(|fact| self.explain_within(fact, path))
            .collect();
        path.remove(quad);

        Some(Explanation {
            rule: execution.rule.iri().to_string(),
            bindings: execution.token.bindings().clone(),
            produced: quad.clone(),
            antecedents,
            parents,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FunctionRegistry;
    use crate::types::VariableNode;

    struct Vocab {
        g: Node,
        out: Node,
        knows: Node,
        friend: Node,
        ty: Node,
        a: Node,
        b: Node,
        c: Node,
    }

    fn setup() -> (QuadStore, Vocab) {
        let mut store = QuadStore::new();
        let n = store.nodes_mut();
        let vocab = Vocab {
            g: n.iri("http://example.org/g"),
            out: n.iri("http://example.org/out"),
            knows: n.iri("http://example.org/knows"),
            friend: n.iri("http://example.org/friend"),
            ty: n.iri("http://example.org/type"),
            a: n.iri("http://example.org/a"),
            b: n.iri("http://example.org/b"),
            c: n.iri("http://example.org/c"),
        };
        (store, vocab)
    }

    fn var(name: &str) -> Node {
        Node::variable(name)
    }

    /// knows(x, y) => friend(x, y) in graph `out`.
    fn friend_rule(v: &Vocab) -> Rule {
        Rule::builder("http://example.org/rules/friend")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .consequent_target_positive(Quad::new(v.out.clone(), var("x"), v.friend.clone(), var("y")))
            .build()
    }

    #[test]
    fn fires_and_unfires_on_retraction() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.fired, 1);
        assert_eq!(report.added, 1);
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 1);

        store.remove(&v.g, &v.a, &v.knows, &v.b).expect("remove");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.unfired, 1);
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn rule_added_after_facts_fires_on_flush() {
        let (mut store, v) = setup();
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");

        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 1);
    }

    #[test]
    fn chained_rules_reach_fixpoint() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");
        let transitive = Rule::builder("http://example.org/rules/transitive")
            .antecedent_source_positive(Quad::new(v.out.clone(), var("x"), v.friend.clone(), var("y")))
            .antecedent_source_positive(Quad::new(v.out.clone(), var("y"), v.friend.clone(), var("z")))
            .consequent_target_positive(Quad::new(v.out.clone(), var("x"), v.friend.clone(), var("z")))
            .build();
        engine.add(transitive).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        store.add(&v.g, &v.b, &v.knows, &v.c).expect("add");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.c), 1);

        store.remove(&v.g, &v.b, &v.knows, &v.c).expect("remove");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.c), 0);
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 1);
    }

    #[test]
    fn unbound_variables_are_skolemized_once_per_firing() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        let rule = Rule::builder("http://example.org/rules/reify")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .consequent_target_positive(Quad::new(var("ng"), var("r"), v.ty.clone(), v.knows.clone()))
            .consequent_target_positive(Quad::new(var("ng"), var("r"), v.friend.clone(), var("x")))
            .build();
        engine.add(rule).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut store).expect("flush");

        let typed: Vec<Quad> = store.match_quads(None, None, Some(&v.ty), None).collect();
        assert_eq!(typed.len(), 1);
        let reified = typed[0].subject().clone();
        let graph = typed[0].graph().clone();
        assert!(reified.as_blank().is_some());
        assert!(graph.as_iri().is_some());
        assert_eq!(store.multiplicity(&graph, &reified, &v.friend, &v.a), 1);

        // retraction removes the same generated nodes
        store.remove(&v.g, &v.a, &v.knows, &v.b).expect("remove");
        engine.flush(&mut store).expect("flush");
        assert!(store.is_empty());
    }

    #[test]
    fn ill_typed_consequent_is_abandoned() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        // object y becomes a subject; a literal y cannot
        let rule = Rule::builder("http://example.org/rules/flip")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .consequent_target_positive(Quad::new(v.out.clone(), var("y"), v.knows.clone(), var("x")))
            .build();
        engine.add(rule).expect("add rule");

        let literal = store.nodes_mut().literal("nobody");
        store.add(&v.g, &v.a, &v.knows, &literal).expect("add");
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let report = engine.flush(&mut store).expect("flush");

        assert_eq!(report.fired, 1);
        assert_eq!(engine.execution_count(), 1);
        assert_eq!(store.count(Some(&v.out), None, None, None), 1);
    }

    #[test]
    fn removing_rule_retracts_its_productions() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        let rule = friend_rule(&v);
        engine.add(rule.clone()).expect("add rule");
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut store).expect("flush");

        engine.remove(&rule).expect("remove rule");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.count(Some(&v.out), None, None, None), 0);
        assert!(!engine.contains_rule(rule.iri()));
        assert!(matches!(
            engine.remove_iri(rule.iri()),
            Err(TesseraError::UnknownRule(_))
        ));
    }

    #[test]
    fn duplicate_rule_is_rejected() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");
        assert!(matches!(
            engine.add(friend_rule(&v)),
            Err(TesseraError::InvalidRule(_))
        ));
        assert_eq!(engine.rules().count(), 1);
    }

    #[test]
    fn explain_walks_produced_antecedents() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");
        let typing = Rule::builder("http://example.org/rules/typing")
            .antecedent_source_positive(Quad::new(v.out.clone(), var("x"), v.friend.clone(), var("y")))
            .consequent_target_positive(Quad::new(v.out.clone(), var("x"), v.ty.clone(), v.friend.clone()))
            .build();
        engine.add(typing).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut store).expect("flush");

        let typed = Quad::new(v.out.clone(), v.a.clone(), v.ty.clone(), v.friend.clone());
        let explanation = engine.explain(&typed).expect("explained");
        assert_eq!(explanation.rule, "http://example.org/rules/typing");
        assert_eq!(explanation.parents.len(), 1);
        assert_eq!(explanation.parents[0].rule, "http://example.org/rules/friend");
        assert!(explanation.parents[0].parents.is_empty());

        let base = Quad::new(v.g.clone(), v.a.clone(), v.knows.clone(), v.b.clone());
        assert!(engine.explain(&base).is_none());
    }

    #[test]
    fn dynamic_nodes_use_the_evaluator() {
        let (mut store, v) = setup();
        let mut registry = FunctionRegistry::new();
        registry.register("label", |bindings, nodes| {
            let subject = bindings.get(&VariableNode::new("x"))?.as_iri()?;
            let label = format!("label of {}", subject.value());
            Some(nodes.literal(&label))
        });
        let mut engine =
            RuleEngine::attach(&mut store, EngineConfig::default()).with_evaluator(registry);
        let name = store.nodes_mut().iri("http://example.org/name");
        let rule = Rule::builder("http://example.org/rules/label")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .consequent_target_positive(Quad::new(
                v.out.clone(),
                var("x"),
                name.clone(),
                store.nodes().dynamic_node("label"),
            ))
            .build();
        engine.add(rule).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut store).expect("flush");

        let expected = store.nodes_mut().literal("label of http://example.org/a");
        assert_eq!(store.multiplicity(&v.out, &v.a, &name, &expected), 1);
    }

    #[test]
    fn dynamic_node_without_evaluator_abandons_firing() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        let rule = Rule::builder("http://example.org/rules/label")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .consequent_target_positive(Quad::new(
                v.out.clone(),
                var("x"),
                v.friend.clone(),
                store.nodes().dynamic_node("label"),
            ))
            .build();
        engine.add(rule).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.fired, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn self_defeating_rule_hits_iteration_limit() {
        let (mut store, v) = setup();
        let config = EngineConfig {
            max_iterations: Some(16),
        };
        let mut engine = RuleEngine::attach(&mut store, config);
        // x knows y, and not x friend y => x friend y
        let rule = Rule::builder("http://example.org/rules/flicker")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .antecedent_source_negative(vec![Quad::new(v.g.clone(), var("x"), v.friend.clone(), var("y"))])
            .consequent_target_positive(Quad::new(v.g.clone(), var("x"), v.friend.clone(), var("y")))
            .build();
        engine.add(rule).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let result = engine.flush(&mut store);
        assert_eq!(result, Err(TesseraError::IterationLimit(16)));
        assert!(engine.has_pending());
    }

    #[test]
    fn separate_output_store_receives_productions() {
        let (mut input, v) = setup();
        let mut output = QuadStore::new();
        let mut engine = RuleEngine::attach(&mut input, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");

        input.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut output).expect("flush");

        assert_eq!(input.len(), 1);
        assert_eq!(output.multiplicity(&v.out, &v.a, &v.friend, &v.b), 1);
    }

    #[test]
    fn generated_blank_stays_distinct_from_copied_input_blank() {
        let (mut input, v) = setup();
        let mut output = QuadStore::new();
        let mut engine = RuleEngine::attach(&mut input, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");
        let witness = Rule::builder("http://example.org/rules/witness")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .consequent_target_positive(Quad::new(v.out.clone(), var("w"), v.ty.clone(), var("y")))
            .build();
        engine.add(witness).expect("add rule");

        let anon = Node::from(input.nodes_mut().blank_node());
        input.add(&v.g, &anon, &v.knows, &v.a).expect("add");
        engine.flush(&mut output).expect("flush");

        let copied: Vec<Quad> = output.match_quads(None, None, Some(&v.friend), None).collect();
        let generated: Vec<Quad> = output.match_quads(None, None, Some(&v.ty), None).collect();
        assert_eq!(output.len(), 2);
        assert_eq!(copied.len(), 1);
        assert_eq!(generated.len(), 1);
        assert_eq!(copied[0].subject(), &anon);
        assert_ne!(generated[0].subject(), &anon);

        // later allocations on either side skip both ids
        let from_input = Node::from(input.nodes_mut().blank_node());
        let from_output = Node::from(output.nodes_mut().blank_node());
        for fresh in [&from_input, &from_output] {
            assert_ne!(fresh, &anon);
            assert_ne!(fresh, generated[0].subject());
        }
    }

    /// knows(x, y) => retract `blocked(x, y)` from graph `out`.
    fn unblock_rule(v: &Vocab, blocked: &Node, name: &str) -> Rule {
        Rule::builder(name)
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .consequent_target_negative(Quad::new(v.out.clone(), var("x"), blocked.clone(), var("y")))
            .build()
    }

    #[test]
    fn retracting_absent_quad_leaves_nothing_on_unfire() {
        let (mut store, v) = setup();
        let blocked = store.nodes_mut().iri("http://example.org/blocked");
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine
            .add(unblock_rule(&v, &blocked, "http://example.org/rules/unblock"))
            .expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.fired, 1);
        assert_eq!(store.len(), 1);

        store.remove(&v.g, &v.a, &v.knows, &v.b).expect("rm");
        engine.flush(&mut store).expect("flush");
        assert!(store.is_empty());
        assert_eq!(store.multiplicity(&v.out, &v.a, &blocked, &v.b), 0);
    }

    #[test]
    fn retraction_is_restored_on_unfire() {
        let (mut store, v) = setup();
        let blocked = store.nodes_mut().iri("http://example.org/blocked");
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine
            .add(unblock_rule(&v, &blocked, "http://example.org/rules/unblock"))
            .expect("add rule");

        store.add(&v.out, &v.a, &blocked, &v.b).expect("add");
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &blocked, &v.b), 0);

        store.remove(&v.g, &v.a, &v.knows, &v.b).expect("rm");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &blocked, &v.b), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn competing_retractions_restore_only_what_they_removed() {
        let (mut store, v) = setup();
        let blocked = store.nodes_mut().iri("http://example.org/blocked");
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine
            .add(unblock_rule(&v, &blocked, "http://example.org/rules/unblock-1"))
            .expect("add rule");
        engine
            .add(unblock_rule(&v, &blocked, "http://example.org/rules/unblock-2"))
            .expect("add rule");

        store.add(&v.out, &v.a, &blocked, &v.b).expect("add");
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.fired, 2);
        assert_eq!(store.multiplicity(&v.out, &v.a, &blocked, &v.b), 0);

        store.remove(&v.g, &v.a, &v.knows, &v.b).expect("rm");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &blocked, &v.b), 1);
    }

    #[test]
    fn meta_antecedents_and_consequents_follow_their_support() {
        let (mut store, v) = setup();
        let n = store.nodes_mut();
        let meta = n.iri("http://example.org/meta");
        let trusted = n.iri("http://example.org/trusted");
        let vouched = n.iri("http://example.org/vouched");
        let pending = n.iri("http://example.org/pending");
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        let rule = Rule::builder("http://example.org/rules/vouch")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .antecedent_meta_positive(Quad::new(meta.clone(), var("x"), v.ty.clone(), trusted.clone()))
            .consequent_target_positive(Quad::new(v.out.clone(), var("x"), v.friend.clone(), var("y")))
            .consequent_meta_positive(Quad::new(meta.clone(), var("y"), vouched.clone(), var("x")))
            .consequent_meta_negative(Quad::new(meta.clone(), var("y"), v.ty.clone(), pending.clone()))
            .build();
        engine.add(rule).expect("add rule");

        store.add(&meta, &v.b, &v.ty, &pending).expect("add");
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.fired, 0);

        store.add(&meta, &v.a, &v.ty, &trusted).expect("add");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.fired, 1);
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 1);
        assert_eq!(store.multiplicity(&meta, &v.b, &vouched, &v.a), 1);
        assert_eq!(store.multiplicity(&meta, &v.b, &v.ty, &pending), 0);

        store.remove(&meta, &v.a, &v.ty, &trusted).expect("rm");
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.unfired, 1);
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 0);
        assert_eq!(store.multiplicity(&meta, &v.b, &vouched, &v.a), 0);
        assert_eq!(store.multiplicity(&meta, &v.b, &v.ty, &pending), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn meta_negative_antecedent_blocks_and_releases() {
        let (mut store, v) = setup();
        let n = store.nodes_mut();
        let meta = n.iri("http://example.org/meta");
        let banned = n.iri("http://example.org/banned");
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        let rule = Rule::builder("http://example.org/rules/unless-banned")
            .antecedent_source_positive(Quad::new(v.g.clone(), var("x"), v.knows.clone(), var("y")))
            .antecedent_meta_negative(vec![Quad::new(meta.clone(), var("x"), v.ty.clone(), banned.clone())])
            .consequent_target_positive(Quad::new(v.out.clone(), var("x"), v.friend.clone(), var("y")))
            .build();
        engine.add(rule).expect("add rule");

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 1);

        store.add(&meta, &v.a, &v.ty, &banned).expect("add");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 0);

        store.remove(&meta, &v.a, &v.ty, &banned).expect("rm");
        engine.flush(&mut store).expect("flush");
        assert_eq!(store.multiplicity(&v.out, &v.a, &v.friend, &v.b), 1);
    }

    #[test]
    fn flush_during_flush_is_a_no_op() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        engine.add(friend_rule(&v)).expect("add rule");
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");

        engine.io.borrow_mut().is_flushing = true;
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report, FlushReport::default());
        assert!(engine.has_pending());

        engine.io.borrow_mut().is_flushing = false;
        let report = engine.flush(&mut store).expect("flush");
        assert_eq!(report.fired, 1);
    }

    #[test]
    fn detached_engine_stops_listening() {
        let (mut store, v) = setup();
        let engine = RuleEngine::attach(&mut store, EngineConfig::default());
        assert!(engine.detach(&mut store));

        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        assert!(!engine.has_pending());
    }

    #[test]
    fn match_status_tracks_tokens() {
        let (mut store, v) = setup();
        let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
        let rule = friend_rule(&v);
        engine.add(rule.clone()).expect("add rule");
        store.add(&v.g, &v.a, &v.knows, &v.b).expect("add");
        engine.flush(&mut store).expect("flush");

        let status = engine.match_status(&rule).expect("status");
        assert_eq!(status.tokens, 1);
        assert!(matches!(
            engine.match_status_iri("http://example.org/none"),
            Err(TesseraError::UnknownRule(_))
        ));
    }
}
