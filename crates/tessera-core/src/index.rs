//! # Edge Index
//!
//! The per-subject part of the quad index:
//! property -> object -> graph -> multiplicity.
//!
//! Each level is a `SmallMap`, a growable vector scanned by node identity.
//! Per-node fan-out is usually small, so a scan beats hashing, and insertion
//! order gives deterministic iteration.
//!
//! ## Invariants
//!
//! - A multiplicity is >= 1 while its entry exists
//! - An entry reaching 0 is deleted, and an emptied level is deleted from the
//!   level above it (object -> property -> subject)
//! - One logical quad never occupies two entries

use crate::types::{AddResult, Node};

// =============================================================================
// SMALL MAP
// =============================================================================

/// A vector-backed map from nodes to values.
#[derive(Debug, Clone)]
pub(crate) struct SmallMap<V> {
    entries: Vec<(Node, V)>,
}

impl<V> Default for SmallMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> SmallMap<V> {
    fn position(&self, key: &Node) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.same(key) || k == key)
    }

    pub(crate) fn get(&self, key: &Node) -> Option<&V> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    pub(crate) fn get_mut(&mut self, key: &Node) -> Option<&mut V> {
        let index = self.position(key)?;
        Some(&mut self.entries[index].1)
    }

    pub(crate) fn get_or_insert_with(&mut self, key: &Node, make: impl FnOnce() -> V) -> &mut V {
        let index = match self.position(key) {
            Some(index) => index,
            None => {
                self.entries.push((key.clone(), make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Remove an entry, keeping the order of the others.
    pub(crate) fn remove(&mut self, key: &Node) -> Option<V> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).1)
    }

    /// Entries whose key equals `key`, or every entry when `key` is `None`.
    pub(crate) fn matching<'a>(
        &'a self,
        key: Option<&'a Node>,
    ) -> impl Iterator<Item = (&'a Node, &'a V)> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| key.is_none_or(|wanted| k.same(wanted) || k == wanted))
            .map(|entry| (&entry.0, &entry.1))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// SUBJECT BUCKET
// =============================================================================

/// Outcome of taking a quad out of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    NotFound,
    Decremented,
    Removed,
    /// Removed, and the bucket is now empty: the caller must drop it.
    Emptied,
}

/// All edges of one subject.
#[derive(Debug, Clone, Default)]
pub(crate) struct SubjectBucket {
    properties: SmallMap<SmallMap<SmallMap<u64>>>,
}

impl SubjectBucket {
    /// Add one occurrence of (property, object, graph).
    pub(crate) fn add(&mut self, property: &Node, object: &Node, graph: &Node) -> AddResult {
        let multiplicity = self
            .properties
            .get_or_insert_with(property, SmallMap::default)
            .get_or_insert_with(object, SmallMap::default)
            .get_or_insert_with(graph, || 0);
        *multiplicity = multiplicity.saturating_add(1);
        if *multiplicity == 1 {
            AddResult::New
        } else {
            AddResult::Incremented
        }
    }

    /// Remove one occurrence, or every occurrence when `all` is set.
    pub(crate) fn take(
        &mut self,
        property: &Node,
        object: &Node,
        graph: &Node,
        all: bool,
    ) -> Removal {
        let Some(objects) = self.properties.get_mut(property) else {
            return Removal::NotFound;
        };
        let Some(graphs) = objects.get_mut(object) else {
            return Removal::NotFound;
        };
        let Some(multiplicity) = graphs.get_mut(graph) else {
            return Removal::NotFound;
        };

        if !all && *multiplicity > 1 {
            *multiplicity -= 1;
            return Removal::Decremented;
        }

        graphs.remove(graph);
        if graphs.is_empty() {
            objects.remove(object);
            if objects.is_empty() {
                self.properties.remove(property);
            }
        }
        if self.properties.is_empty() {
            Removal::Emptied
        } else {
            Removal::Removed
        }
    }

    /// Multiplicity of one concrete edge, 0 if absent.
    pub(crate) fn multiplicity(&self, property: &Node, object: &Node, graph: &Node) -> u64 {
        self.properties
            .get(property)
            .and_then(|objects| objects.get(object))
            .and_then(|graphs| graphs.get(graph))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct edges matching the pattern (`None` = wildcard).
    pub(crate) fn count(
        &self,
        property: Option<&Node>,
        object: Option<&Node>,
        graph: Option<&Node>,
    ) -> usize {
        self.properties
            .matching(property)
            .map(|(_, objects)| {
                objects
                    .matching(object)
                    .map(|(_, graphs)| match graph {
                        Some(_) => graphs.matching(graph).count(),
                        None => graphs.len(),
                    })
                    .sum::<usize>()
            })
            .sum()
    }

    /// Edges matching the pattern as (property, object, graph) borrows.
    pub(crate) fn entries<'a>(
        &'a self,
        property: Option<&'a Node>,
        object: Option<&'a Node>,
        graph: Option<&'a Node>,
    ) -> impl Iterator<Item = (&'a Node, &'a Node, &'a Node)> + 'a {
        self.properties.matching(property).flat_map(move |(p, objects)| {
            objects.matching(object).flat_map(move |(o, graphs)| {
                graphs.matching(graph).map(move |(g, _)| (p, o, g))
            })
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
