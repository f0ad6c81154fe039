//! # Cycle Detector
//!
//! Answers "is this transaction on a cycle of the wait-for graph?".
//!
//! Each query takes a fresh epoch and stamps every vertex it reaches with
//! it, so "visited" never needs resetting between queries. The traversal is
//! an iterative depth-first search over outgoing edges in list order
//! (newest edge first) and stops at the first edge that leads back to the
//! root. No particular cycle is preferred and no shortest-cycle guarantee
//! is made.

use crate::graph::{EdgeHandle, VertexHandle, WaitGraph};
use crate::{ReporterId, TransactionId, WaitGraphError};

/// One level of the explicit DFS stack.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DfsFrame {
    vertex: VertexHandle,
    /// Next outgoing edge of `vertex` to explore.
    cursor: Option<EdgeHandle>,
}

impl WaitGraph {
    /// Whether `root` lies on a cycle of the current graph.
    ///
    /// Transactions without a vertex cannot be part of a recorded cycle and
    /// yield `false`.
    pub fn has_cycle(&mut self, root: TransactionId) -> bool {
        match self.index.find(&self.vertices, root) {
            Some(vertex) => self.search_from(vertex),
            None => false,
        }
    }

    /// The cycle through `root` found by the same search as
    /// [`has_cycle`](Self::has_cycle).
    ///
    /// The members are listed in wait order starting at `root`; the last
    /// member waits for `root`.
    pub fn find_cycle(&mut self, root: TransactionId) -> Option<Vec<TransactionId>> {
        let vertex = self.index.find(&self.vertices, root)?;
        if !self.search_from(vertex) {
            return None;
        }
        // On success the stack still holds the path from the root.
        Some(
            self.dfs_stack
                .iter()
                .map(|frame| self.vertices.get(frame.vertex).xid)
                .collect(),
        )
    }

    /// Replace `reporter`'s subgraph, then check `root` for a cycle.
    ///
    /// This is the request a lock manager sends right before letting `root`
    /// block: its fresh local view plus the question.
    pub fn replace_and_check(
        &mut self,
        reporter: ReporterId,
        encoded: &[u64],
        root: TransactionId,
    ) -> Result<bool, WaitGraphError> {
        self.replace_subgraph(reporter, encoded)?;
        Ok(self.has_cycle(root))
    }

    /// The epoch of the most recent query.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn next_epoch(&mut self) -> u64 {
        match self.epoch.checked_add(1) {
            Some(next) => self.epoch = next,
            None => {
                // Stamps from before the wrap would alias new epochs.
                for vertex in self.vertices.iter_mut() {
                    vertex.visited = 0;
                }
                self.epoch = 1;
            }
        }
        self.epoch
    }

    fn search_from(&mut self, root: VertexHandle) -> bool {
        let epoch = self.next_epoch();
        let mut stack = std::mem::take(&mut self.dfs_stack);
        stack.clear();

        let root_vertex = self.vertices.get_mut(root);
        root_vertex.visited = epoch;
        stack.push(DfsFrame {
            vertex: root,
            cursor: root_vertex.first_out,
        });

        let mut found = false;
        while let Some(frame) = stack.last_mut() {
            let Some(edge) = frame.cursor else {
                stack.pop();
                continue;
            };
            let record = self.edges.get(edge);
            frame.cursor = record.next_out;
            let target = record.target;

            if target == root {
                found = true;
                break;
            }

            let vertex = self.vertices.get_mut(target);
            if vertex.visited != epoch {
                vertex.visited = epoch;
                let cursor = vertex.first_out;
                stack.push(DfsFrame {
                    vertex: target,
                    cursor,
                });
            }
        }

        self.dfs_stack = stack;
        found
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn xid(raw: u64) -> TransactionId {
        TransactionId::new(raw).expect("non-zero")
    }

    fn graph_with(words: &[u64]) -> WaitGraph {
        let mut graph = WaitGraph::new();
        let r = graph.register_reporter().expect("register");
        graph.replace_subgraph(r, words).expect("replace");
        graph
    }

    #[test]
    fn unknown_root_has_no_cycle() {
        let mut graph = graph_with(&[1, 2, 0]);
        let epoch = graph.epoch();
        assert!(!graph.has_cycle(xid(77)));
        // No vertex, no query, no epoch consumed
        assert_eq!(graph.epoch(), epoch);
    }

    #[test]
    fn self_wait_is_a_cycle() {
        let mut graph = graph_with(&[3, 3, 0]);
        assert!(graph.has_cycle(xid(3)));
        assert_eq!(graph.find_cycle(xid(3)), Some(vec![xid(3)]));
    }

    #[test]
    fn chain_without_back_edge_has_no_cycle() {
        let mut graph = graph_with(&[1, 2, 0, 2, 3, 0, 3, 4, 0]);
        for raw in 1..=4 {
            assert!(!graph.has_cycle(xid(raw)), "{} should be acyclic", raw);
        }
    }

    #[test]
    fn cycle_not_through_root_is_not_reported() {
        // 1 -> 2 -> 3 -> 2: 1 reaches a cycle but is not on it
        let mut graph = graph_with(&[1, 2, 0, 2, 3, 0, 3, 2, 0]);
        assert!(!graph.has_cycle(xid(1)));
        assert!(graph.has_cycle(xid(2)));
        assert!(graph.has_cycle(xid(3)));
    }

    #[test]
    fn each_query_uses_a_new_epoch() {
        let mut graph = graph_with(&[1, 2, 0, 2, 1, 0]);
        assert!(graph.has_cycle(xid(1)));
        let first = graph.epoch();
        assert!(graph.has_cycle(xid(1)));
        assert_eq!(graph.epoch(), first + 1);
    }

    #[test]
    fn find_cycle_returns_wait_order() {
        let mut graph = graph_with(&[1, 2, 0, 2, 3, 0, 3, 1, 0]);
        assert_eq!(graph.find_cycle(xid(1)), Some(vec![xid(1), xid(2), xid(3)]));
        assert_eq!(graph.find_cycle(xid(2)), Some(vec![xid(2), xid(3), xid(1)]));
    }

    #[test]
    fn find_cycle_skips_dead_branches() {
        // 1 waits for 9 (dead end) and 2; 2 waits for 1.
        // Newest edge first: 1 -> 2 is explored before 1 -> 9.
        let mut graph = graph_with(&[1, 9, 2, 0, 2, 1, 0]);
        assert_eq!(graph.find_cycle(xid(1)), Some(vec![xid(1), xid(2)]));

        // Older branch order: the dead end is explored first and popped.
        let mut graph = graph_with(&[1, 2, 9, 0, 2, 1, 0]);
        assert_eq!(graph.find_cycle(xid(1)), Some(vec![xid(1), xid(2)]));
    }

    #[test]
    fn find_cycle_none_when_acyclic() {
        let mut graph = graph_with(&[5, 6, 0]);
        assert_eq!(graph.find_cycle(xid(5)), None);
        assert_eq!(graph.find_cycle(xid(404)), None);
    }

    #[test]
    fn epoch_wrap_clears_stale_stamps() {
        let mut graph = graph_with(&[1, 2, 0, 2, 1, 0]);
        graph.epoch = u64::MAX - 1;
        assert!(graph.has_cycle(xid(1)));
        assert_eq!(graph.epoch(), u64::MAX);

        // Wraps to 1; vertices stamped u64::MAX must not look visited
        assert!(graph.has_cycle(xid(2)));
        assert_eq!(graph.epoch(), 1);
    }

    #[test]
    fn diamond_is_explored_once() {
        // 1 -> {2, 3}, 2 -> 4, 3 -> 4, 4 -> 1
        let mut graph = graph_with(&[1, 2, 3, 0, 2, 4, 0, 3, 4, 0, 4, 1, 0]);
        assert!(graph.has_cycle(xid(1)));
        assert!(graph.has_cycle(xid(4)));
    }

    #[test]
    fn replace_and_check_reports_fresh_state() {
        let mut graph = WaitGraph::new();
        let r1 = graph.register_reporter().expect("register");
        let r2 = graph.register_reporter().expect("register");

        assert!(!graph.replace_and_check(r1, &[1, 2, 0], xid(1)).expect("check"));
        assert!(graph.replace_and_check(r2, &[2, 1, 0], xid(1)).expect("check"));
        assert!(!graph.replace_and_check(r2, &[], xid(1)).expect("check"));
    }
}
