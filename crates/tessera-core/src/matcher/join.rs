//! # Join Matcher
//!
//! The bundled `PatternMatcher`.
//!
//! Facts live in a private `QuadStore`. Each injected batch goes through a
//! per-pattern constant test (alpha filter) to find the rules it can affect:
//!
//! - new facts that only touch positive patterns are joined incrementally,
//!   with the new fact pinned at each pattern it fits
//! - retracted facts drop every token they support
//! - anything touching a negative conjunction re-joins the rule in full
//!
//! Tokens are keyed by their supporting facts, so a token survives unchanged
//! as long as those facts are present and no negative conjunction holds.
//! Deactivations are always delivered before activations.

use super::{
    Bindings, MatchStatus, MatchStep, MatcherRuleId, PatternMatcher, PatternSet, Token,
    TokenActivable, TokenId,
};
use crate::store::QuadStore;
use crate::types::{AddResult, Node, Quad, RemoveResult};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{trace, warn};

// =============================================================================
// UNIFICATION
// =============================================================================

/// Replace bound variables of `pattern` with their values.
fn substitute(pattern: &Quad, bindings: &Bindings) -> Quad {
    let resolve = |node: &Node| match node {
        Node::Variable(variable) => bindings.get(variable).cloned().unwrap_or_else(|| node.clone()),
        _ => node.clone(),
    };
    Quad::new(
        resolve(pattern.graph()),
        resolve(pattern.subject()),
        resolve(pattern.property()),
        resolve(pattern.object()),
    )
}

/// Extend `bindings` so that `pattern` equals `fact`, if possible.
fn unify(pattern: &Quad, fact: &Quad, bindings: &Bindings) -> Option<Bindings> {
    let mut extended = bindings.clone();
    for (position, node) in pattern.nodes() {
        let value = fact.get(position);
        match node {
            Node::Variable(variable) => match extended.get(variable) {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => {
                    extended.insert(variable.clone(), value.clone());
                }
            },
            _ if node != value => return None,
            _ => {}
        }
    }
    Some(extended)
}

/// Constant positions of `pattern` equal those of `fact`.
fn alpha_matches(pattern: &Quad, fact: &Quad) -> bool {
    pattern
        .nodes()
        .all(|(position, node)| node.is_variable() || node == fact.get(position))
}

fn touches(patterns: &[Quad], facts: &[Quad]) -> bool {
    patterns
        .iter()
        .any(|pattern| facts.iter().any(|fact| alpha_matches(pattern, fact)))
}

// =============================================================================
// JOIN
// =============================================================================

/// One evaluation of a pattern set against a fact store.
struct Join<'a> {
    facts: &'a QuadStore,
    positives: &'a [Quad],
    negatives: &'a [Vec<Quad>],
    /// Restrict the pattern at this index to a single fact.
    pinned: Option<(usize, &'a Quad)>,
}

impl<'a> Join<'a> {
    fn new(facts: &'a QuadStore, patterns: &'a PatternSet) -> Self {
        Self {
            facts,
            positives: patterns.positives(),
            negatives: patterns.negatives(),
            pinned: None,
        }
    }

    /// All matches, keyed by supporting facts.
    fn run(&self) -> BTreeMap<Vec<Quad>, Bindings> {
        let mut out = BTreeMap::new();
        let mut support = Vec::with_capacity(self.positives.len());
        self.extend(0, &Bindings::new(), &mut support, &mut out);
        out
    }

    fn extend(
        &self,
        index: usize,
        bindings: &Bindings,
        support: &mut Vec<Quad>,
        out: &mut BTreeMap<Vec<Quad>, Bindings>,
    ) {
        let Some(pattern) = self.positives.get(index) else {
            let blocked = self
                .negatives
                .iter()
                .any(|conjunction| exists(self.facts, conjunction, bindings));
            if !blocked {
                out.insert(support.clone(), bindings.clone());
            }
            return;
        };

        let bound = substitute(pattern, bindings);
        let candidates: Box<dyn Iterator<Item = Quad> + '_> = match self.pinned {
            Some((pinned, fact)) if pinned == index => Box::new(std::iter::once(fact.clone())),
            _ => self.facts.match_pattern(&bound),
        };
        for fact in candidates {
            if let Some(extended) = unify(&bound, &fact, bindings) {
                support.push(fact);
                self.extend(index + 1, &extended, support, out);
                support.pop();
            }
        }
    }
}

/// Check whether some extension of `bindings` satisfies every pattern.
fn exists(facts: &QuadStore, patterns: &[Quad], bindings: &Bindings) -> bool {
    let Some((pattern, rest)) = patterns.split_first() else {
        return true;
    };
    let bound = substitute(pattern, bindings);
    facts.match_pattern(&bound).any(|fact| {
        unify(&bound, &fact, bindings).is_some_and(|extended| exists(facts, rest, &extended))
    })
}

// =============================================================================
// RULE NETWORK
// =============================================================================

struct RuleNetwork {
    patterns: PatternSet,
    output: Box<dyn TokenActivable>,
    tokens: BTreeMap<Vec<Quad>, Token>,
}

impl RuleNetwork {
    /// Apply a new match set: deactivate vanished tokens, then activate new ones.
    fn apply(
        &mut self,
        removed: Vec<Vec<Quad>>,
        added: BTreeMap<Vec<Quad>, Bindings>,
        next_token: &mut u64,
    ) {
        let deactivated: Vec<Token> = removed
            .into_iter()
            .filter_map(|support| self.tokens.remove(&support))
            .collect();

        let mut activated = Vec::new();
        for (support, bindings) in added {
            if self.tokens.contains_key(&support) {
                continue;
            }
            let token = Token::new(TokenId(*next_token), bindings, support.clone());
            *next_token += 1;
            self.tokens.insert(support, token.clone());
            activated.push(token);
        }

        if !deactivated.is_empty() {
            trace!(count = deactivated.len(), "deactivating tokens");
            self.output.deactivate_tokens(&deactivated);
        }
        if !activated.is_empty() {
            trace!(count = activated.len(), "activating tokens");
            self.output.activate_tokens(&activated);
        }
    }

    /// Re-join from scratch and diff against the live tokens.
    fn refresh(&mut self, facts: &QuadStore, next_token: &mut u64) {
        let current = Join::new(facts, &self.patterns).run();
        let removed: Vec<Vec<Quad>> = self
            .tokens
            .keys()
            .filter(|support| !current.contains_key(*support))
            .cloned()
            .collect();
        self.apply(removed, current, next_token);
    }

    /// Join only the combinations that use at least one of `added`.
    fn extend_with(&mut self, facts: &QuadStore, added: &[Quad], next_token: &mut u64) {
        let mut found = BTreeMap::new();
        for (index, pattern) in self.patterns.positives().iter().enumerate() {
            for fact in added.iter().filter(|fact| alpha_matches(pattern, fact)) {
                let join = Join {
                    pinned: Some((index, fact)),
                    ..Join::new(facts, &self.patterns)
                };
                found.extend(join.run());
            }
        }
        self.apply(Vec::new(), found, next_token);
    }

    /// Drop the tokens supported by any of `removed`.
    fn retract(&mut self, removed: &[Quad], next_token: &mut u64) {
        let vanished: Vec<Vec<Quad>> = self
            .tokens
            .keys()
            .filter(|support| support.iter().any(|fact| removed.contains(fact)))
            .cloned()
            .collect();
        self.apply(vanished, BTreeMap::new(), next_token);
    }

    fn touches_negatives(&self, facts: &[Quad]) -> bool {
        self.patterns
            .negatives()
            .iter()
            .any(|conjunction| touches(conjunction, facts))
    }
}

// =============================================================================
// JOIN MATCHER
// =============================================================================

/// Backtracking join matcher over a private fact store.
pub struct JoinMatcher {
    facts: QuadStore,
    rules: BTreeMap<MatcherRuleId, RuleNetwork>,
    next_rule: u64,
    next_token: u64,
}

impl fmt::Debug for JoinMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinMatcher")
            .field("facts", &self.facts.len())
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Default for JoinMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            facts: QuadStore::new(),
            rules: BTreeMap::new(),
            next_rule: 0,
            next_token: 0,
        }
    }

    /// Number of facts known to the matcher.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }
}

impl PatternMatcher for JoinMatcher {
    fn add_rule(&mut self, patterns: PatternSet, output: Box<dyn TokenActivable>) -> MatcherRuleId {
        let id = MatcherRuleId(self.next_rule);
        self.next_rule += 1;

        let mut network = RuleNetwork {
            patterns,
            output,
            tokens: BTreeMap::new(),
        };
        network.refresh(&self.facts, &mut self.next_token);
        self.rules.insert(id, network);
        id
    }

    fn remove_rule(&mut self, id: MatcherRuleId) -> bool {
        self.rules.remove(&id).is_some()
    }

    fn inject_positives(&mut self, quads: &[Quad]) {
        let mut added = Vec::new();
        for quad in quads {
            match self.facts.add_quad(quad) {
                Ok(AddResult::New) => added.push(quad.clone()),
                Ok(AddResult::Incremented) => {}
                Err(err) => warn!(%quad, error = %err, "fact rejected by matcher"),
            }
        }
        if added.is_empty() {
            return;
        }

        for network in self.rules.values_mut() {
            if network.touches_negatives(&added) {
                network.refresh(&self.facts, &mut self.next_token);
            } else if touches(network.patterns.positives(), &added) {
                network.extend_with(&self.facts, &added, &mut self.next_token);
            }
        }
    }

    fn inject_negatives(&mut self, quads: &[Quad]) {
        let mut removed = Vec::new();
        for quad in quads {
            match self.facts.remove_quad(quad) {
                Ok(RemoveResult::Removed) => removed.push(quad.clone()),
                Ok(_) => {}
                Err(err) => warn!(%quad, error = %err, "retraction rejected by matcher"),
            }
        }
        if removed.is_empty() {
            return;
        }

        for network in self.rules.values_mut() {
            if network.touches_negatives(&removed) {
                network.refresh(&self.facts, &mut self.next_token);
            } else if touches(network.patterns.positives(), &removed) {
                network.retract(&removed, &mut self.next_token);
            }
        }
    }

    fn status(&self, id: MatcherRuleId) -> Option<MatchStatus> {
        let network = self.rules.get(&id)?;
        let positives = network.patterns.positives();
        let steps = positives
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                let prefix = Join {
                    facts: &self.facts,
                    positives: &positives[..=index],
                    negatives: &[],
                    pinned: None,
                };
                MatchStep {
                    pattern: pattern.to_string(),
                    facts: self
                        .facts
                        .match_pattern(pattern)
                        .filter(|fact| unify(pattern, fact, &Bindings::new()).is_some())
                        .count(),
                    partial_matches: prefix.run().len(),
                }
            })
            .collect();
        Some(MatchStatus {
            steps,
            tokens: network.tokens.len(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
