//! # Quad Store
//!
//! The in-memory quad index with multiplicity counting.
//!
//! The subject level is split in two: IRI subjects live in a `BTreeMap`
//! keyed by their interned string key, blank subjects in a dense vector
//! indexed by blank id. Below the subject, each `SubjectBucket` holds
//! property -> object -> graph -> multiplicity.
//!
//! ## Notifications
//!
//! Only genuine transitions reach listeners: `AddResult::New` and
//! `RemoveResult::Removed`. Increments, decrements and misses are silent.
//! Batch operations (`insert`, `remove_all`, `clear_graph`, ...) notify one
//! `Changeset`, and only when it is non-empty.
//!
//! ## Wildcards
//!
//! In `match_quads` and `count`, `None` and a `Node::Variable` both mean
//! "any node in this position".

use crate::change::{Change, Changeset, SharedListener};
use crate::index::{Removal, SubjectBucket};
use crate::interner::StringKey;
use crate::nodes::NodeFactory;
use crate::types::{
    AddResult, BlankNode, Node, Quad, QuadPosition, RemoveResult, TesseraError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use tracing::error;

/// Treat variables as wildcards.
fn wildcard(node: Option<&Node>) -> Option<&Node> {
    node.filter(|n| !n.is_variable())
}

/// Check that each node can hold its position in a stored quad.
fn validate(
    graph: &Node,
    subject: &Node,
    property: &Node,
    object: &Node,
) -> Result<(), TesseraError> {
    if !subject.can_be_subject() {
        return Err(TesseraError::UnsupportedSubjectType(subject.to_string()));
    }
    let misplaced = |position: QuadPosition, node: &Node| TesseraError::UnsupportedNodeType {
        position,
        node: node.to_string(),
    };
    if !graph.can_be_graph() {
        return Err(misplaced(QuadPosition::Graph, graph));
    }
    if !property.can_be_property() {
        return Err(misplaced(QuadPosition::Property, property));
    }
    if !object.is_ground() {
        return Err(misplaced(QuadPosition::Object, object));
    }
    Ok(())
}

fn validate_quad(quad: &Quad) -> Result<(), TesseraError> {
    validate(quad.graph(), quad.subject(), quad.property(), quad.object())
}

/// An in-memory quad store.
pub struct QuadStore {
    nodes: NodeFactory,
    iri_subjects: BTreeMap<StringKey, SubjectBucket>,
    blank_subjects: Vec<Option<SubjectBucket>>,
    listeners: Vec<SharedListener>,
    quad_count: usize,
}

impl fmt::Debug for QuadStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadStore")
            .field("quads", &self.quad_count)
            .field("iri_subjects", &self.iri_subjects.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for QuadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadStore {
    /// Create an empty store with its own node factory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_nodes(NodeFactory::new())
    }

    /// Create an empty store over an existing node factory.
    #[must_use]
    pub fn with_nodes(nodes: NodeFactory) -> Self {
        Self {
            nodes,
            iri_subjects: BTreeMap::new(),
            blank_subjects: Vec::new(),
            listeners: Vec::new(),
            quad_count: 0,
        }
    }

    // =========================================================================
    // NODE FACTORY
    // =========================================================================

    #[must_use]
    pub fn nodes(&self) -> &NodeFactory {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeFactory {
        &mut self.nodes
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Register a listener. Registering the same handle twice is a no-op.
    pub fn add_listener(&mut self, listener: SharedListener) {
        if !self.listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_listener(&mut self, listener: &SharedListener) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Rc::ptr_eq(l, listener));
        self.listeners.len() != before
    }

    fn notify_change(&self, change: &Change) {
        for listener in &self.listeners {
            match listener.try_borrow_mut() {
                Ok(mut listener) => listener.on_change(change),
                Err(_) => error!(quad = %change.quad(), "listener busy, change dropped"),
            }
        }
    }

    fn notify_changeset(&self, changeset: &Changeset) {
        if changeset.is_empty() {
            return;
        }
        for listener in &self.listeners {
            match listener.try_borrow_mut() {
                Ok(mut listener) => listener.on_changeset(changeset),
                Err(_) => error!(
                    added = changeset.added().len(),
                    removed = changeset.removed().len(),
                    "listener busy, changeset dropped"
                ),
            }
        }
    }

    // =========================================================================
    // SINGLE-QUAD MUTATION
    // =========================================================================

    /// Add one occurrence of a quad.
    ///
    /// Fails with `UnsupportedSubjectType` if the subject is neither an IRI
    /// nor a blank node, and with `UnsupportedNodeType` for other misplaced
    /// nodes. A rejected call leaves the store unmodified.
    pub fn add(
        &mut self,
        graph: &Node,
        subject: &Node,
        property: &Node,
        object: &Node,
    ) -> Result<AddResult, TesseraError> {
        validate(graph, subject, property, object)?;
        let quad = self.canonical(graph, subject, property, object);
        let result = self.add_silent(&quad);
        if result == AddResult::New {
            self.notify_change(&Change::added(quad));
        }
        Ok(result)
    }

    /// Add one occurrence of `quad`.
    pub fn add_quad(&mut self, quad: &Quad) -> Result<AddResult, TesseraError> {
        self.add(quad.graph(), quad.subject(), quad.property(), quad.object())
    }

    /// Remove one occurrence of a quad.
    ///
    /// Removing an absent quad is not an error: it returns `NotFound`.
    pub fn remove(
        &mut self,
        graph: &Node,
        subject: &Node,
        property: &Node,
        object: &Node,
    ) -> Result<RemoveResult, TesseraError> {
        validate(graph, subject, property, object)?;
        let quad = Quad::new(
            graph.clone(),
            subject.clone(),
            property.clone(),
            object.clone(),
        );
        let result = self.remove_silent(&quad, false);
        if result == RemoveResult::Removed {
            self.notify_change(&Change::removed(quad));
        }
        Ok(result)
    }

    /// Remove one occurrence of `quad`.
    pub fn remove_quad(&mut self, quad: &Quad) -> Result<RemoveResult, TesseraError> {
        self.remove(quad.graph(), quad.subject(), quad.property(), quad.object())
    }

    // =========================================================================
    // BATCH MUTATION
    // =========================================================================

    /// Apply the additions, then the removals, of a changeset.
    ///
    /// Every quad is validated before anything is written. Listeners receive
    /// one changeset holding the genuinely new and genuinely removed quads.
    pub fn insert(&mut self, changeset: &Changeset) -> Result<Changeset, TesseraError> {
        for quad in changeset.added().iter().chain(changeset.removed()) {
            validate_quad(quad)?;
        }

        let mut added = Vec::new();
        for quad in changeset.added() {
            let quad = self.canonical(quad.graph(), quad.subject(), quad.property(), quad.object());
            if self.add_silent(&quad) == AddResult::New {
                added.push(quad);
            }
        }
        let mut removed = Vec::new();
        for quad in changeset.removed() {
            if self.remove_silent(quad, false) == RemoveResult::Removed {
                removed.push(quad.clone());
            }
        }

        let applied = Changeset::new(added, removed);
        self.notify_changeset(&applied);
        Ok(applied)
    }

    /// Remove one occurrence of every quad matching the pattern.
    ///
    /// Returns the quads that became absent.
    pub fn remove_all(
        &mut self,
        graph: Option<&Node>,
        subject: Option<&Node>,
        property: Option<&Node>,
        object: Option<&Node>,
    ) -> Vec<Quad> {
        let matched: Vec<Quad> = self.match_quads(graph, subject, property, object).collect();
        let removed: Vec<Quad> = matched
            .into_iter()
            .filter(|quad| self.remove_silent(quad, false) == RemoveResult::Removed)
            .collect();
        self.notify_changeset(&Changeset::new(Vec::new(), removed.clone()));
        removed
    }

    /// Delete every quad of `graph`, whatever its multiplicity.
    pub fn clear_graph(&mut self, graph: &Node) -> Vec<Quad> {
        let removed = self.purge(Some(graph));
        self.notify_changeset(&Changeset::new(Vec::new(), removed.clone()));
        removed
    }

    /// Delete every quad, whatever its multiplicity.
    pub fn clear(&mut self) -> Vec<Quad> {
        let removed = self.purge(None);
        self.notify_changeset(&Changeset::new(Vec::new(), removed.clone()));
        removed
    }

    /// Copy every quad of `origin` into `target`.
    ///
    /// With `overwrite`, the quads of `target` that have no counterpart in
    /// `origin` are deleted first.
    pub fn copy_graph(
        &mut self,
        origin: &Node,
        target: &Node,
        overwrite: bool,
    ) -> Result<Changeset, TesseraError> {
        let applied = self.copy_silent(origin, target, overwrite)?;
        self.notify_changeset(&applied);
        Ok(applied)
    }

    /// Copy `origin` into `target`, then clear `origin`.
    pub fn move_graph(&mut self, origin: &Node, target: &Node) -> Result<Changeset, TesseraError> {
        let mut applied = self.copy_silent(origin, target, false)?;
        if origin != target {
            let removed = self.purge(Some(origin));
            applied.extend(&Changeset::new(Vec::new(), removed));
        }
        self.notify_changeset(&applied);
        Ok(applied)
    }

    fn copy_silent(
        &mut self,
        origin: &Node,
        target: &Node,
        overwrite: bool,
    ) -> Result<Changeset, TesseraError> {
        for (position, node) in [(QuadPosition::Graph, origin), (QuadPosition::Graph, target)] {
            if !node.can_be_graph() {
                return Err(TesseraError::UnsupportedNodeType {
                    position,
                    node: node.to_string(),
                });
            }
        }
        if origin == target {
            return Ok(Changeset::default());
        }

        let sources: Vec<Quad> = self.match_quads(Some(origin), None, None, None).collect();
        let mut removed = Vec::new();
        if overwrite {
            let stale: Vec<Quad> = self
                .match_quads(Some(target), None, None, None)
                .filter(|quad| {
                    self.multiplicity(origin, quad.subject(), quad.property(), quad.object()) == 0
                })
                .collect();
            for quad in stale {
                if self.remove_silent(&quad, true) == RemoveResult::Removed {
                    removed.push(quad);
                }
            }
        }

        let mut added = Vec::new();
        for quad in sources {
            let copy = quad.with_graph(target.clone());
            if self.add_silent(&copy) == AddResult::New {
                added.push(copy);
            }
        }
        Ok(Changeset::new(added, removed))
    }

    fn purge(&mut self, graph: Option<&Node>) -> Vec<Quad> {
        let matched: Vec<Quad> = self.match_quads(graph, None, None, None).collect();
        matched
            .into_iter()
            .filter(|quad| self.remove_silent(quad, true) == RemoveResult::Removed)
            .collect()
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Rebuild a quad over this store's interned handles.
    fn canonical(&mut self, graph: &Node, subject: &Node, property: &Node, object: &Node) -> Quad {
        Quad::new(
            self.intern(graph),
            self.intern(subject),
            self.intern(property),
            self.intern(object),
        )
    }

    fn intern(&mut self, node: &Node) -> Node {
        match node {
            Node::Iri(iri) => {
                let key = self.nodes.iri_key(iri);
                self.nodes
                    .resolve_iri(key)
                    .map_or_else(|| node.clone(), Node::Iri)
            }
            Node::Literal(literal) => Node::Literal(self.nodes.literal_node(
                literal.lexical(),
                Some(literal.datatype()),
                literal.lang(),
            )),
            _ => node.clone(),
        }
    }

    /// Add without validation or notification.
    fn add_silent(&mut self, quad: &Quad) -> AddResult {
        for node in [quad.graph(), quad.subject(), quad.object()] {
            if let Node::Blank(blank) = node {
                self.nodes.reserve_blank(blank.id());
            }
        }
        let bucket = match quad.subject() {
            Node::Iri(iri) => {
                let key = self.nodes.iri_key(iri);
                self.iri_subjects.entry(key).or_default()
            }
            Node::Blank(blank) => {
                let index = blank.id() as usize;
                if self.blank_subjects.len() <= index {
                    self.blank_subjects.resize_with(index + 1, || None);
                }
                self.blank_subjects[index].get_or_insert_with(SubjectBucket::default)
            }
            // validated upstream
            _ => return AddResult::Incremented,
        };
        let result = bucket.add(quad.property(), quad.object(), quad.graph());
        if result == AddResult::New {
            self.quad_count += 1;
        }
        result
    }

    /// Remove one occurrence (or all of them) without validation or notification.
    fn remove_silent(&mut self, quad: &Quad, all: bool) -> RemoveResult {
        let (property, object, graph) = (quad.property(), quad.object(), quad.graph());
        let removal = match quad.subject() {
            Node::Iri(iri) => {
                let Some(key) = self.nodes.existing_iri_key(iri) else {
                    return RemoveResult::NotFound;
                };
                let Some(bucket) = self.iri_subjects.get_mut(&key) else {
                    return RemoveResult::NotFound;
                };
                let removal = bucket.take(property, object, graph, all);
                if removal == Removal::Emptied {
                    self.iri_subjects.remove(&key);
                }
                removal
            }
            Node::Blank(blank) => {
                let Some(slot) = self.blank_subjects.get_mut(blank.id() as usize) else {
                    return RemoveResult::NotFound;
                };
                let Some(bucket) = slot.as_mut() else {
                    return RemoveResult::NotFound;
                };
                let removal = bucket.take(property, object, graph, all);
                if removal == Removal::Emptied {
                    *slot = None;
                }
                removal
            }
            _ => Removal::NotFound,
        };

        match removal {
            Removal::NotFound => RemoveResult::NotFound,
            Removal::Decremented => RemoveResult::Decremented,
            Removal::Removed | Removal::Emptied => {
                self.quad_count -= 1;
                RemoveResult::Removed
            }
        }
    }

    fn bucket(&self, subject: &Node) -> Option<&SubjectBucket> {
        match subject {
            Node::Iri(iri) => {
                let key = self.nodes.existing_iri_key(iri)?;
                self.iri_subjects.get(&key)
            }
            Node::Blank(blank) => self
                .blank_subjects
                .get(blank.id() as usize)
                .and_then(Option::as_ref),
            _ => None,
        }
    }

    /// Every subject with its bucket: IRI subjects in interning order, then blanks.
    fn subjects(&self) -> impl Iterator<Item = (Node, &SubjectBucket)> + '_ {
        let iris = self.iri_subjects.iter().filter_map(move |(key, bucket)| {
            self.nodes
                .resolve_iri(*key)
                .map(|iri| (Node::Iri(iri), bucket))
        });
        let blanks = self
            .blank_subjects
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .map(|bucket| (Node::Blank(BlankNode::new(index as u64)), bucket))
            });
        iris.chain(blanks)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Lazily enumerate the quads matching a pattern.
    ///
    /// Each yielded quad is an independent value.
    pub fn match_quads<'a>(
        &'a self,
        graph: Option<&'a Node>,
        subject: Option<&'a Node>,
        property: Option<&'a Node>,
        object: Option<&'a Node>,
    ) -> Box<dyn Iterator<Item = Quad> + 'a> {
        let (graph, property, object) = (wildcard(graph), wildcard(property), wildcard(object));
        match wildcard(subject) {
            Some(subject) => match self.bucket(subject) {
                Some(bucket) => Box::new(bucket.entries(property, object, graph).map(
                    move |(p, o, g)| Quad::new(g.clone(), subject.clone(), p.clone(), o.clone()),
                )),
                None => Box::new(std::iter::empty()),
            },
            None => Box::new(self.subjects().flat_map(move |(subject, bucket)| {
                bucket
                    .entries(property, object, graph)
                    .map(move |(p, o, g)| Quad::new(g.clone(), subject.clone(), p.clone(), o.clone()))
            })),
        }
    }

    /// Enumerate the quads matching a pattern quad (variables are wildcards).
    pub fn match_pattern<'a>(&'a self, pattern: &'a Quad) -> Box<dyn Iterator<Item = Quad> + 'a> {
        self.match_quads(
            Some(pattern.graph()),
            Some(pattern.subject()),
            Some(pattern.property()),
            Some(pattern.object()),
        )
    }

    /// Count the distinct quads matching a pattern without materializing them.
    #[must_use]
    pub fn count(
        &self,
        graph: Option<&Node>,
        subject: Option<&Node>,
        property: Option<&Node>,
        object: Option<&Node>,
    ) -> usize {
        let (graph, property, object) = (wildcard(graph), wildcard(property), wildcard(object));
        match wildcard(subject) {
            Some(subject) => self
                .bucket(subject)
                .map_or(0, |bucket| bucket.count(property, object, graph)),
            None => self
                .iri_subjects
                .values()
                .chain(self.blank_subjects.iter().flatten())
                .map(|bucket| bucket.count(property, object, graph))
                .sum(),
        }
    }

    /// Reference count of one concrete quad, 0 if absent.
    #[must_use]
    pub fn multiplicity(&self, graph: &Node, subject: &Node, property: &Node, object: &Node) -> u64 {
        self.bucket(subject)
            .map_or(0, |bucket| bucket.multiplicity(property, object, graph))
    }

    /// Check whether a concrete quad is present.
    #[must_use]
    pub fn contains(&self, quad: &Quad) -> bool {
        self.multiplicity(quad.graph(), quad.subject(), quad.property(), quad.object()) > 0
    }

    /// The distinct graphs holding at least one quad.
    #[must_use]
    pub fn graphs(&self) -> Vec<Node> {
        let graphs: BTreeSet<Node> = self
            .iri_subjects
            .values()
            .chain(self.blank_subjects.iter().flatten())
            .flat_map(|bucket| bucket.entries(None, None, None).map(|(_, _, g)| g.clone()))
            .collect();
        graphs.into_iter().collect()
    }

    /// Number of distinct quads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quad_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quad_count == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeListener;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        changes: Vec<Change>,
        changesets: Vec<Changeset>,
    }

    impl ChangeListener for Recorder {
        fn on_change(&mut self, change: &Change) {
            self.changes.push(change.clone());
        }

        fn on_changeset(&mut self, changeset: &Changeset) {
            self.changesets.push(changeset.clone());
        }
    }

    struct Fixture {
        store: QuadStore,
        g: Node,
        h: Node,
        s: Node,
        p: Node,
        o: Node,
    }

    fn fixture() -> Fixture {
        let mut store = QuadStore::new();
        let nodes = store.nodes_mut();
        let g = nodes.iri("http://example.org/g");
        let h = nodes.iri("http://example.org/h");
        let s = nodes.iri("http://example.org/s");
        let p = nodes.iri("http://example.org/p");
        let o = nodes.literal("o");
        Fixture { store, g, h, s, p, o }
    }

    fn recorder(store: &mut QuadStore) -> Rc<RefCell<Recorder>> {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        store.add_listener(recorder.clone());
        recorder
    }

    #[test]
    fn multiplicity_lifecycle_and_notifications() {
        let Fixture { mut store, g, s, p, o, .. } = fixture();
        let events = recorder(&mut store);

        assert_eq!(store.add(&g, &s, &p, &o).expect("add"), AddResult::New);
        assert_eq!(events.borrow().changes.len(), 1);
        assert_eq!(store.add(&g, &s, &p, &o).expect("add"), AddResult::Incremented);
        assert_eq!(events.borrow().changes.len(), 1);
        assert_eq!(store.count(Some(&g), Some(&s), Some(&p), Some(&o)), 1);

        assert_eq!(store.remove(&g, &s, &p, &o).expect("remove"), RemoveResult::Decremented);
        assert_eq!(events.borrow().changes.len(), 1);
        assert_eq!(store.count(Some(&g), Some(&s), Some(&p), Some(&o)), 1);

        assert_eq!(store.remove(&g, &s, &p, &o).expect("remove"), RemoveResult::Removed);
        let events = events.borrow();
        assert_eq!(events.changes.len(), 2);
        assert!(!events.changes[1].is_positive());
        assert_eq!(store.count(None, None, None, None), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn remove_missing_is_not_found() {
        let Fixture { mut store, g, s, p, o, .. } = fixture();
        assert_eq!(store.remove(&g, &s, &p, &o).expect("remove"), RemoveResult::NotFound);
    }

    #[test]
    fn literal_subject_is_rejected_without_mutation() {
        let Fixture { mut store, g, s, p, o, .. } = fixture();
        store.add(&g, &s, &p, &o).expect("add");

        let result = store.add(&g, &o, &p, &o);
        assert!(matches!(result, Err(TesseraError::UnsupportedSubjectType(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn literal_property_is_rejected() {
        let Fixture { mut store, g, s, o, .. } = fixture();
        let result = store.add(&g, &s, &o, &o);
        assert!(matches!(
            result,
            Err(TesseraError::UnsupportedNodeType {
                position: QuadPosition::Property,
                ..
            })
        ));
    }

    #[test]
    fn variables_are_wildcards() {
        let Fixture { mut store, g, h, s, p, o } = fixture();
        store.add(&g, &s, &p, &o).expect("add");
        store.add(&h, &s, &p, &o).expect("add");

        let x = Node::variable("x");
        assert_eq!(store.count(Some(&x), Some(&s), None, None), 2);
        assert_eq!(store.match_quads(Some(&x), None, Some(&x), None).count(), 2);
    }

    #[test]
    fn blank_subjects_are_indexed() {
        let Fixture { mut store, g, p, o, .. } = fixture();
        let b = Node::Blank(store.nodes_mut().blank_node());
        store.add(&g, &b, &p, &o).expect("add");

        let found: Vec<Quad> = store.match_quads(None, Some(&b), None, None).collect();
        assert_eq!(found, vec![Quad::new(g.clone(), b.clone(), p.clone(), o.clone())]);
        assert_eq!(store.remove(&g, &b, &p, &o).expect("remove"), RemoveResult::Removed);
        assert!(store.is_empty());
    }

    #[test]
    fn insert_notifies_one_changeset_of_genuine_transitions() {
        let Fixture { mut store, g, h, s, p, o } = fixture();
        store.add(&g, &s, &p, &o).expect("add");
        let events = recorder(&mut store);

        let existing = Quad::new(g.clone(), s.clone(), p.clone(), o.clone());
        let fresh = Quad::new(h.clone(), s.clone(), p.clone(), o.clone());
        let applied = store
            .insert(&Changeset::new(vec![existing, fresh.clone()], vec![]))
            .expect("insert");

        assert_eq!(applied.added(), &[fresh]);
        let events = events.borrow();
        assert!(events.changes.is_empty());
        assert_eq!(events.changesets.len(), 1);
    }

    #[test]
    fn insert_rejects_whole_batch() {
        let Fixture { mut store, g, s, p, o, .. } = fixture();
        let good = Quad::new(g.clone(), s.clone(), p.clone(), o.clone());
        let bad = Quad::new(g.clone(), o.clone(), p.clone(), o.clone());

        let result = store.insert(&Changeset::new(vec![good, bad], vec![]));
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_graph_ignores_multiplicity() {
        let Fixture { mut store, g, h, s, p, o } = fixture();
        store.add(&g, &s, &p, &o).expect("add");
        store.add(&g, &s, &p, &o).expect("add");
        store.add(&h, &s, &p, &o).expect("add");

        let removed = store.clear_graph(&g);
        assert_eq!(removed.len(), 1);
        assert_eq!(store.count(Some(&g), None, None, None), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.graphs(), vec![h]);
    }

    #[test]
    fn copy_graph_with_overwrite_drops_stale_quads() {
        let Fixture { mut store, g, h, s, p, o } = fixture();
        let other = store.nodes_mut().literal("other");
        store.add(&g, &s, &p, &o).expect("add");
        store.add(&h, &s, &p, &other).expect("add");

        let applied = store.copy_graph(&g, &h, true).expect("copy");
        assert_eq!(applied.added().len(), 1);
        assert_eq!(applied.removed().len(), 1);
        assert_eq!(store.multiplicity(&h, &s, &p, &o), 1);
        assert_eq!(store.multiplicity(&h, &s, &p, &other), 0);
    }

    #[test]
    fn move_graph_empties_origin() {
        let Fixture { mut store, g, h, s, p, o } = fixture();
        store.add(&g, &s, &p, &o).expect("add");

        store.move_graph(&g, &h).expect("move");
        assert_eq!(store.graphs(), vec![h.clone()]);
        assert_eq!(store.multiplicity(&h, &s, &p, &o), 1);
    }

    #[test]
    fn remove_all_decrements_once() {
        let Fixture { mut store, g, h, s, p, o } = fixture();
        store.add(&g, &s, &p, &o).expect("add");
        store.add(&g, &s, &p, &o).expect("add");
        store.add(&h, &s, &p, &o).expect("add");

        let removed = store.remove_all(None, Some(&s), None, None);
        assert_eq!(removed.len(), 1);
        assert_eq!(store.multiplicity(&g, &s, &p, &o), 1);
    }

    #[test]
    fn removed_listener_hears_nothing() {
        let Fixture { mut store, g, s, p, o, .. } = fixture();
        let events = recorder(&mut store);
        let shared: SharedListener = events.clone();
        assert!(store.remove_listener(&shared));

        store.add(&g, &s, &p, &o).expect("add");
        assert!(events.borrow().changes.is_empty());
    }

    #[test]
    fn foreign_iris_are_found_by_content() {
        let Fixture { mut store, g, s, p, o, .. } = fixture();
        store.add(&g, &s, &p, &o).expect("add");

        let mut other = NodeFactory::new();
        let foreign = other.iri("http://example.org/s");
        assert_eq!(store.count(None, Some(&foreign), None, None), 1);
    }
}
