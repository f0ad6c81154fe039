//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the detector cannot be trusted to gate waits.
//!
//! ## Tiers
//! - T0: Encoding Integrity
//! - T1: Generation Replacement
//! - T2: Deadlock Scenarios
//! - T3: Reporter Lifecycle

use waitgraph_core::{
    ReporterId, SubgraphBuilder, TransactionId, WaitGraph, WaitGraphError, encode_edges,
};

fn xid(raw: u64) -> TransactionId {
    TransactionId::new(raw).expect("non-zero")
}

fn edges(pairs: &[(u64, u64)]) -> Vec<u64> {
    let typed: Vec<_> = pairs.iter().map(|&(s, t)| (xid(s), xid(t))).collect();
    encode_edges(&typed)
}

fn two_reporters() -> (WaitGraph, ReporterId, ReporterId) {
    let mut graph = WaitGraph::new();
    let r1 = graph.register_reporter().expect("register");
    let r2 = graph.register_reporter().expect("register");
    (graph, r1, r2)
}

// =============================================================================
// TIER T0: ENCODING INTEGRITY
// =============================================================================

mod t0_encoding_integrity {
    use super::*;

    /// T0.1: A well-formed encoding is accepted.
    #[test]
    fn well_formed_encoding_accepted() {
        let mut graph = WaitGraph::new();
        let r = graph.register_reporter().expect("register");

        let words = SubgraphBuilder::new()
            .segment(xid(1), &[xid(2), xid(3)])
            .segment(xid(4), &[])
            .build();
        assert!(graph.replace_subgraph(r, &words).is_ok());
        assert_eq!(graph.edge_count(), 2);
    }

    /// T0.2: A missing terminator is rejected.
    #[test]
    fn missing_terminator_rejected() {
        let mut graph = WaitGraph::new();
        let r = graph.register_reporter().expect("register");

        let result = graph.replace_subgraph(r, &[1, 2]);
        assert!(matches!(result, Err(WaitGraphError::MalformedSubgraph { .. })));
    }

    /// T0.3: The reserved identifier cannot start a segment.
    #[test]
    fn zero_source_rejected() {
        let mut graph = WaitGraph::new();
        let r = graph.register_reporter().expect("register");

        let result = graph.replace_subgraph(r, &[0, 1, 0]);
        assert!(matches!(result, Err(WaitGraphError::MalformedSubgraph { offset: 0, .. })));
    }

    /// T0.4: A rejected submission does not touch the graph.
    #[test]
    fn rejection_is_atomic() {
        let (mut graph, r1, r2) = two_reporters();
        graph.replace_subgraph(r1, &edges(&[(1, 2)])).expect("replace");
        graph.replace_subgraph(r2, &edges(&[(2, 3)])).expect("replace");
        let vertices = graph.vertex_ids();
        let snapshot = graph.edges();

        // Valid first segments followed by garbage
        assert!(graph.replace_subgraph(r1, &[7, 8, 0, 9, 10]).is_err());

        assert_eq!(graph.vertex_ids(), vertices);
        assert_eq!(graph.edges(), snapshot);
        graph.check_invariants().expect("invariants");
    }

    /// T0.5: Identifier 0 never names a vertex.
    #[test]
    fn zero_is_never_a_vertex() {
        assert!(TransactionId::new(0).is_none());
    }
}

// =============================================================================
// TIER T1: GENERATION REPLACEMENT
// =============================================================================

mod t1_generation_replacement {
    use super::*;

    /// T1.1: Submitting the same subgraph twice equals submitting it once.
    #[test]
    fn replace_is_idempotent() {
        let (mut graph, r1, _) = two_reporters();
        let words = edges(&[(1, 2), (2, 3), (3, 4)]);

        graph.replace_subgraph(r1, &words).expect("replace");
        let once_vertices = graph.vertex_ids();
        let once_edges = graph.edges();

        graph.replace_subgraph(r1, &words).expect("replace");
        assert_eq!(graph.vertex_ids(), once_vertices);
        assert_eq!(graph.edges(), once_edges);
    }

    /// T1.2: The new generation fully replaces the old one.
    #[test]
    fn replacement_drops_stale_edges() {
        let (mut graph, r1, _) = two_reporters();
        graph
            .replace_subgraph(r1, &edges(&[(1, 2), (2, 3), (5, 6)]))
            .expect("replace");
        graph
            .replace_subgraph(r1, &edges(&[(2, 3), (3, 4)]))
            .expect("replace");

        let now: Vec<_> = graph.edges().iter().map(|e| (e.source.get(), e.target.get())).collect();
        assert_eq!(now, vec![(2, 3), (3, 4)]);
        assert!(!graph.contains(xid(1)));
        assert!(!graph.contains(xid(5)));
        assert!(!graph.contains(xid(6)));
    }

    /// T1.3: Replacing one reporter never touches another's edges.
    #[test]
    fn reporters_are_isolated() {
        let (mut graph, r1, r2) = two_reporters();
        graph.replace_subgraph(r1, &edges(&[(1, 2)])).expect("replace");
        graph.replace_subgraph(r2, &edges(&[(3, 4)])).expect("replace");

        graph.replace_subgraph(r1, &[]).expect("replace");

        assert_eq!(graph.reporter_edge_count(r2), Ok(1));
        assert!(graph.contains(xid(3)));
        assert!(graph.contains(xid(4)));
        assert!(!graph.contains(xid(1)));
    }

    /// T1.4: Every vertex keeps at least one incident edge.
    #[test]
    fn no_isolated_vertices_after_churn() {
        let (mut graph, r1, r2) = two_reporters();
        let rounds: [&[(u64, u64)]; 4] = [
            &[(1, 2), (2, 3)],
            &[(3, 1)],
            &[(2, 4), (4, 5), (5, 2)],
            &[],
        ];
        for (i, round) in rounds.iter().enumerate() {
            let reporter = if i % 2 == 0 { r1 } else { r2 };
            graph.replace_subgraph(reporter, &edges(round)).expect("replace");
            graph.check_invariants().expect("invariants");
        }
    }
}

// =============================================================================
// TIER T2: DEADLOCK SCENARIOS
// =============================================================================

mod t2_deadlock_scenarios {
    use super::*;

    fn scenario_a() -> (WaitGraph, ReporterId, ReporterId) {
        let (mut graph, r1, r2) = two_reporters();
        graph
            .replace_subgraph(r1, &edges(&[(1, 2), (2, 3)]))
            .expect("replace");
        graph.replace_subgraph(r2, &edges(&[(3, 1)])).expect("replace");
        (graph, r1, r2)
    }

    /// T2.1: A cycle spanning two reporters is found from every member.
    #[test]
    fn cross_reporter_cycle_detected() {
        let (mut graph, _, _) = scenario_a();
        assert!(graph.has_cycle(xid(1)));
        assert!(graph.has_cycle(xid(2)));
        assert!(graph.has_cycle(xid(3)));
    }

    /// T2.2: Withdrawing one reporter's edge breaks the cycle.
    #[test]
    fn withdrawing_edge_breaks_cycle() {
        let (mut graph, _, r2) = scenario_a();
        graph.replace_subgraph(r2, &[]).expect("replace");

        assert!(!graph.has_cycle(xid(1)));
        // Still referenced by 2 -> 3
        assert!(graph.contains(xid(3)));
        assert!(!graph.has_cycle(xid(3)));
    }

    /// T2.3: A simple wait is not a deadlock.
    #[test]
    fn simple_wait_is_not_deadlock() {
        let mut graph = WaitGraph::new();
        let r = graph.register_reporter().expect("register");
        graph.replace_subgraph(r, &edges(&[(5, 6)])).expect("replace");

        assert!(!graph.has_cycle(xid(5)));
        assert!(!graph.has_cycle(xid(6)));
    }

    /// T2.4: Duplicate edges from two reporters are counted separately.
    #[test]
    fn duplicate_edges_from_two_reporters() {
        let (mut graph, r1, r2) = two_reporters();
        graph.replace_subgraph(r1, &edges(&[(7, 8)])).expect("replace");
        graph.replace_subgraph(r2, &edges(&[(7, 8)])).expect("replace");

        assert!(!graph.has_cycle(xid(7)));
        assert_eq!(graph.incoming_count(xid(8)), Some(2));

        graph.replace_subgraph(r1, &[]).expect("replace");
        assert_eq!(graph.incoming_count(xid(8)), Some(1));
        assert_eq!(graph.successors(xid(7)), vec![xid(8)]);
        assert!(!graph.has_cycle(xid(7)));
    }

    /// T2.5: Unknown transactions are never deadlocked.
    #[test]
    fn unknown_transaction_is_not_deadlocked() {
        let (mut graph, _, _) = scenario_a();
        assert!(!graph.has_cycle(xid(999)));
    }

    /// T2.6: The reported cycle is made of real edges.
    #[test]
    fn reported_cycle_is_closed_path() {
        let (mut graph, _, _) = scenario_a();
        let cycle = graph.find_cycle(xid(2)).expect("cycle");
        assert_eq!(cycle.first(), Some(&xid(2)));

        for (i, &member) in cycle.iter().enumerate() {
            let next = cycle[(i + 1) % cycle.len()];
            assert!(
                graph.successors(member).contains(&next),
                "{} -> {} is not an edge",
                member,
                next
            );
        }
    }
}

// =============================================================================
// TIER T3: REPORTER LIFECYCLE
// =============================================================================

mod t3_reporter_lifecycle {
    use super::*;

    /// T3.1: Unregistering equals replacing with nothing, then forgetting.
    #[test]
    fn unregister_equals_empty_replace() {
        let build = || {
            let (mut graph, r1, r2) = two_reporters();
            graph.replace_subgraph(r1, &edges(&[(1, 2)])).expect("replace");
            graph.replace_subgraph(r2, &edges(&[(2, 1), (2, 3)])).expect("replace");
            (graph, r2)
        };

        let (mut by_unregister, r2) = build();
        by_unregister.unregister_reporter(r2).expect("unregister");

        let (mut by_replace, r2b) = build();
        by_replace.replace_subgraph(r2b, &[]).expect("replace");

        assert_eq!(by_unregister.edges(), by_replace.edges());
        assert_eq!(by_unregister.vertex_ids(), by_replace.vertex_ids());
        assert_eq!(by_unregister.reporter_count(), 1);
        assert_eq!(by_replace.reporter_count(), 2);
    }

    /// T3.2: An unregistered reporter can no longer submit.
    #[test]
    fn unregistered_reporter_rejected() {
        let (mut graph, r1, _) = two_reporters();
        graph.unregister_reporter(r1).expect("unregister");

        assert_eq!(
            graph.replace_subgraph(r1, &edges(&[(1, 2)])),
            Err(WaitGraphError::UnknownReporter(r1))
        );
    }

    /// T3.3: Unregistering every reporter empties the graph.
    #[test]
    fn unregister_all_empties_graph() {
        let (mut graph, r1, r2) = two_reporters();
        graph.replace_subgraph(r1, &edges(&[(1, 2), (2, 3)])).expect("replace");
        graph.replace_subgraph(r2, &edges(&[(3, 1)])).expect("replace");

        graph.unregister_reporter(r1).expect("unregister");
        graph.unregister_reporter(r2).expect("unregister");

        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        graph.check_invariants().expect("invariants");
    }
}
