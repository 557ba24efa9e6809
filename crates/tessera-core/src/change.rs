//! # Change Propagation
//!
//! The observer contract over a `QuadStore`.
//!
//! A store notifies its listeners synchronously, on the mutating call stack,
//! and only for genuine transitions: multiplicity 0 -> 1 (added) and 1 -> 0
//! (removed). Single mutations arrive as a `Change`, batch operations as one
//! `Changeset`.
//!
//! Listeners are shared as `Rc<RefCell<dyn ChangeListener>>`. A listener
//! cannot reach back into the store that is notifying it; consumers that need
//! to react with further writes queue the change (see `ChangeInbox`) and
//! apply it later from their own drain loop.

use crate::types::Quad;
use std::cell::RefCell;
use std::rc::Rc;

// =============================================================================
// CHANGE / CHANGESET
// =============================================================================

/// One quad added to or removed from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    quad: Quad,
    positive: bool,
}

impl Change {
    #[must_use]
    pub fn added(quad: Quad) -> Self {
        Self {
            quad,
            positive: true,
        }
    }

    #[must_use]
    pub fn removed(quad: Quad) -> Self {
        Self {
            quad,
            positive: false,
        }
    }

    #[must_use]
    pub fn quad(&self) -> &Quad {
        &self.quad
    }

    /// True for an addition, false for a removal.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.positive
    }
}

/// A batch of added and removed quads.
///
/// Used both for store notifications and for rule productions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    added: Vec<Quad>,
    removed: Vec<Quad>,
}

impl Changeset {
    #[must_use]
    pub fn new(added: Vec<Quad>, removed: Vec<Quad>) -> Self {
        Self { added, removed }
    }

    #[must_use]
    pub fn added(&self) -> &[Quad] {
        &self.added
    }

    #[must_use]
    pub fn removed(&self) -> &[Quad] {
        &self.removed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// The structural negation: additions become removals and vice versa.
    #[must_use]
    pub fn negate(&self) -> Self {
        Self {
            added: self.removed.clone(),
            removed: self.added.clone(),
        }
    }

    /// Append another changeset to this one.
    pub fn extend(&mut self, other: &Self) {
        self.added.extend_from_slice(&other.added);
        self.removed.extend_from_slice(&other.removed);
    }

    pub fn into_parts(self) -> (Vec<Quad>, Vec<Quad>) {
        (self.added, self.removed)
    }
}

// =============================================================================
// LISTENERS
// =============================================================================

/// Observer of store mutations.
pub trait ChangeListener {
    /// One quad became present or absent.
    fn on_change(&mut self, change: &Change);

    /// A batch operation completed. Only genuine transitions are included.
    fn on_changeset(&mut self, changeset: &Changeset);
}

/// Shared handle under which listeners are registered.
pub type SharedListener = Rc<RefCell<dyn ChangeListener>>;

/// A listener that queues every notification for later draining.
///
/// Both engines register one of these on their input store, then move the
/// queued quads into their pattern matcher when they next run.
#[derive(Debug, Default)]
pub struct ChangeInbox {
    positives: Vec<Quad>,
    negatives: Vec<Quad>,
}

impl ChangeInbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether any notification is waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.positives.is_empty() || !self.negatives.is_empty()
    }

    /// Take the queued (positives, negatives), leaving the inbox empty.
    pub fn checkout(&mut self) -> (Vec<Quad>, Vec<Quad>) {
        (
            std::mem::take(&mut self.positives),
            std::mem::take(&mut self.negatives),
        )
    }

    /// Queue one quad, cancelling a queued opposite change for the same quad.
    fn push(&mut self, quad: &Quad, positive: bool) {
        let (same, opposite) = if positive {
            (&mut self.positives, &mut self.negatives)
        } else {
            (&mut self.negatives, &mut self.positives)
        };
        if let Some(index) = opposite.iter().position(|queued| queued == quad) {
            opposite.remove(index);
        } else {
            same.push(quad.clone());
        }
    }
}

impl ChangeListener for ChangeInbox {
    fn on_change(&mut self, change: &Change) {
        self.push(change.quad(), change.is_positive());
    }

    fn on_changeset(&mut self, changeset: &Changeset) {
        for quad in changeset.added() {
            self.push(quad, true);
        }
        for quad in changeset.removed() {
            self.push(quad, false);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
