//! # Reporter Registry
//!
//! Tracks, per reporter, the edge generation it most recently contributed.
//!
//! A generation is the head of a singly linked list threaded through
//! [`Edge::next_in_generation`](crate::graph::Edge). The registry never walks
//! that list itself; the graph store does when it retires a generation.

use crate::graph::EdgeHandle;
use crate::{ReporterId, WaitGraphError};
use std::collections::BTreeMap;

/// The edges currently attributed to one reporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generation {
    pub(crate) head: Option<EdgeHandle>,
    edge_count: usize,
    submissions: u64,
}

impl Generation {
    /// Number of edges in this generation.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// How many subgraphs the reporter has submitted so far.
    #[must_use]
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// The generation that follows this one after a submission of
    /// `edge_count` edges starting at `head`.
    #[must_use]
    pub fn succeed(&self, head: Option<EdgeHandle>, edge_count: usize) -> Self {
        Self {
            head,
            edge_count,
            submissions: self.submissions.saturating_add(1),
        }
    }

    /// Whether the reporter currently contributes no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Registry of reporters and their current generations.
///
/// Uses `BTreeMap` so iteration order is by reporter id.
#[derive(Debug, Clone, Default)]
pub struct ReporterRegistry {
    reporters: BTreeMap<ReporterId, Generation>,
    next_id: u32,
}

impl ReporterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new reporter with an empty generation.
    pub fn register(&mut self) -> Result<ReporterId, WaitGraphError> {
        let id = ReporterId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(WaitGraphError::CapacityExceeded("reporters"))?;
        self.reporters.insert(id, Generation::default());
        Ok(id)
    }

    /// Current generation of a reporter.
    pub fn generation(&self, id: ReporterId) -> Result<&Generation, WaitGraphError> {
        self.reporters
            .get(&id)
            .ok_or(WaitGraphError::UnknownReporter(id))
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ReporterId) -> bool {
        self.reporters.contains_key(&id)
    }

    /// Swap in `next` as the current generation of `id`.
    ///
    /// Returns the generation it replaced, or `None` (and records nothing)
    /// when `id` is not registered. Callers that have already looked `id` up
    /// can ignore the result.
    pub fn install(&mut self, id: ReporterId, next: Generation) -> Option<Generation> {
        self.reporters
            .get_mut(&id)
            .map(|slot| std::mem::replace(slot, next))
    }

    /// Drop a reporter's record, returning its last generation.
    pub fn remove(&mut self, id: ReporterId) -> Result<Generation, WaitGraphError> {
        self.reporters
            .remove(&id)
            .ok_or(WaitGraphError::UnknownReporter(id))
    }

    /// Registered reporters in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ReporterId, &Generation)> + '_ {
        self.reporters.iter().map(|(id, generation)| (*id, generation))
    }

    /// Number of registered reporters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    /// Whether no reporter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_allocates_increasing_ids() {
        let mut registry = ReporterRegistry::new();
        let a = registry.register().expect("register");
        let b = registry.register().expect("register");

        assert!(a < b);
        assert_eq!(registry.len(), 2);
        assert!(registry.generation(a).expect("gen").is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_remove() {
        let mut registry = ReporterRegistry::new();
        let a = registry.register().expect("register");
        registry.remove(a).expect("remove");
        let b = registry.register().expect("register");

        assert_ne!(a, b);
        assert!(!registry.contains(a));
    }

    #[test]
    fn install_counts_submissions() {
        let mut registry = ReporterRegistry::new();
        let id = registry.register().expect("register");

        let current = *registry.generation(id).expect("gen");
        let first = registry
            .install(id, current.succeed(None, 0))
            .expect("install");
        assert_eq!(first.submissions(), 0);

        let current = *registry.generation(id).expect("gen");
        registry.install(id, current.succeed(None, 0));

        assert_eq!(registry.generation(id).expect("gen").submissions(), 2);
    }

    #[test]
    fn unknown_reporter_errors() {
        let mut registry = ReporterRegistry::new();
        let ghost = ReporterId(99);

        assert_eq!(
            registry.generation(ghost).err(),
            Some(WaitGraphError::UnknownReporter(ghost))
        );
        assert!(registry.install(ghost, Generation::default()).is_none());
        assert!(registry.is_empty());
        assert!(registry.remove(ghost).is_err());
    }

    #[test]
    fn iter_is_ordered_by_id() {
        let mut registry = ReporterRegistry::new();
        let ids: Vec<_> = (0..4).map(|_| registry.register().expect("r")).collect();
        let seen: Vec<_> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(seen, ids);
    }
}
