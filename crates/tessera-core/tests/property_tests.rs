//! # Property-Based Tests
//!
//! Invariants of the store and the rule engine, checked with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use tessera_core::{
    AddResult, Change, ChangeListener, Changeset, EngineConfig, Node, Quad, QuadStore,
    RemoveResult, Rule, RuleEngine,
};

/// Counts notified additions and removals.
#[derive(Default)]
struct Tally {
    added: usize,
    removed: usize,
}

impl ChangeListener for Tally {
    fn on_change(&mut self, change: &Change) {
        if change.is_positive() {
            self.added += 1;
        } else {
            self.removed += 1;
        }
    }

    fn on_changeset(&mut self, changeset: &Changeset) {
        self.added += changeset.added().len();
        self.removed += changeset.removed().len();
    }
}

/// Build a quad from small indices over a fixed vocabulary.
fn quad(store: &mut QuadStore, (g, s, p, o): (u8, u8, u8, u8)) -> Quad {
    let n = store.nodes_mut();
    Quad::new(
        n.iri(&format!("http://example.org/g{g}")),
        n.iri(&format!("http://example.org/s{s}")),
        n.iri(&format!("http://example.org/p{p}")),
        n.literal(&format!("o{o}")),
    )
}

fn index() -> impl Strategy<Value = (u8, u8, u8, u8)> {
    (0u8..3, 0u8..4, 0u8..3, 0u8..4)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Adding a quad k times then removing it k times notifies exactly once each way.
    #[test]
    fn multiplicity_idempotence(spec in index(), times in 1usize..6) {
        let mut store = QuadStore::new();
        let tally = Rc::new(RefCell::new(Tally::default()));
        store.add_listener(tally.clone());
        let q = quad(&mut store, spec);

        for i in 0..times {
            let expected = if i == 0 { AddResult::New } else { AddResult::Incremented };
            prop_assert_eq!(store.add_quad(&q).expect("add"), expected);
        }
        prop_assert_eq!(store.len(), 1);
        for i in 0..times {
            let expected = if i + 1 == times { RemoveResult::Removed } else { RemoveResult::Decremented };
            prop_assert_eq!(store.remove_quad(&q).expect("remove"), expected);
        }

        let tally = tally.borrow();
        prop_assert_eq!(tally.added, 1);
        prop_assert_eq!(tally.removed, 1);
        prop_assert!(store.is_empty());
    }

    /// Summing count over every graph equals the wildcard count.
    #[test]
    fn wildcard_consistency(specs in vec(index(), 0..40)) {
        let mut store = QuadStore::new();
        for spec in specs {
            let q = quad(&mut store, spec);
            store.add_quad(&q).expect("add");
        }

        let per_graph: usize = store
            .graphs()
            .iter()
            .map(|g| store.count(Some(g), None, None, None))
            .sum();
        prop_assert_eq!(per_graph, store.count(None, None, None, None));
        prop_assert_eq!(store.len(), store.match_quads(None, None, None, None).count());
    }

    /// Interning returns the same handle for the same text.
    #[test]
    fn interning_is_identity(text in "[a-z]{1,12}") {
        let mut store = QuadStore::new();
        let iri = format!("http://example.org/{text}");
        let a = store.nodes_mut().iri(&iri);
        let b = store.nodes_mut().iri(&iri);
        prop_assert!(a.same(&b));
    }

    /// Matched quads are present, distinct values.
    #[test]
    fn match_yields_distinct_present_quads(specs in vec(index(), 1..30)) {
        let mut store = QuadStore::new();
        for spec in specs {
            let q = quad(&mut store, spec);
            store.add_quad(&q).expect("add");
        }

        let quads: Vec<Quad> = store.match_quads(None, None, None, None).collect();
        let unique: std::collections::BTreeSet<&Quad> = quads.iter().collect();
        prop_assert_eq!(unique.len(), quads.len());
        for q in &quads {
            prop_assert!(store.contains(q));
        }
    }

    /// Adding then removing the same multiset leaves the store empty.
    #[test]
    fn add_remove_round_trip(specs in vec(index(), 0..30)) {
        let mut store = QuadStore::new();
        let quads: Vec<Quad> = specs.into_iter().map(|spec| quad(&mut store, spec)).collect();
        for q in &quads {
            store.add_quad(q).expect("add");
        }
        for q in quads.iter().rev() {
            store.remove_quad(q).expect("remove");
        }
        prop_assert!(store.is_empty());
        prop_assert!(store.graphs().is_empty());
    }

    /// The rule engine reaches the same store whether facts arrive in one batch or many.
    #[test]
    fn fixpoint_independent_of_batch_size(
        edges in vec((0u8..5, 0u8..5), 1..12),
        chunk in 1usize..5,
    ) {
        let run = |chunk: usize| {
            let mut store = QuadStore::new();
            let n = store.nodes_mut();
            let g = n.iri("http://example.org/g");
            let out = n.iri("http://example.org/out");
            let edge = n.iri("http://example.org/edge");
            let path = n.iri("http://example.org/path");
            let nodes: Vec<Node> = (0..5).map(|i| n.iri(&format!("http://example.org/v{i}"))).collect();

            let mut engine = RuleEngine::attach(&mut store, EngineConfig::default());
            let var = Node::variable;
            engine.add(Rule::builder("http://example.org/rules/base")
                .antecedent_source_positive(Quad::new(g.clone(), var("x"), edge.clone(), var("y")))
                .consequent_target_positive(Quad::new(out.clone(), var("x"), path.clone(), var("y")))
                .build()).expect("rule");
            engine.add(Rule::builder("http://example.org/rules/step")
                .antecedent_source_positive(Quad::new(g.clone(), var("x"), edge.clone(), var("y")))
                .antecedent_source_positive(Quad::new(out.clone(), var("y"), path.clone(), var("z")))
                .consequent_target_positive(Quad::new(out.clone(), var("x"), path.clone(), var("z")))
                .build()).expect("rule");

            for batch in edges.chunks(chunk) {
                for (from, to) in batch {
                    store
                        .add(&g, &nodes[*from as usize], &edge, &nodes[*to as usize])
                        .expect("add");
                }
                engine.flush(&mut store).expect("flush");
            }

            let mut paths: Vec<(Node, Node)> = store
                .match_quads(Some(&out), None, None, None)
                .map(|q| (q.subject().clone(), q.object().clone()))
                .collect();
            paths.sort();
            paths
        };

        prop_assert_eq!(run(chunk), run(edges.len()));
    }
}
