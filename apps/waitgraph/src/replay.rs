//! # Scenario Replay
//!
//! Runs a scripted sequence of reporter actions against a fresh graph.
//! Scripts are JSON documents:
//!
//! ```json
//! {
//!   "steps": [
//!     { "op": "submit", "reporter": "a", "edges": [[1, 2], [2, 3]] },
//!     { "op": "submit", "reporter": "b", "edges": [[3, 1]] },
//!     { "op": "check", "xid": 1 },
//!     { "op": "unregister", "reporter": "b" },
//!     { "op": "check", "xid": 1 }
//!   ]
//! }
//! ```
//!
//! Reporters are named by the script; `submit` registers an unknown name on
//! first use. A failing step is recorded and the replay continues.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use waitgraph_core::{
    GraphConfig, ReporterId, TransactionId, WaitGraph, WaitGraphError, encode_edges,
};

// =============================================================================
// SCRIPT
// =============================================================================

/// A replay script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub steps: Vec<Step>,
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Register { reporter: String },
    Submit { reporter: String, edges: Vec<(u64, u64)> },
    Unregister { reporter: String },
    Check { xid: u64 },
}

/// What happened at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Registered {
        reporter: String,
        id: u32,
    },
    Submitted {
        reporter: String,
        installed: usize,
        retired: usize,
    },
    Unregistered {
        reporter: String,
        retired: usize,
    },
    Checked {
        xid: u64,
        deadlock: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[serde(default)]
        cycle: Option<Vec<u64>>,
    },
    Failed {
        step: usize,
        error: String,
    },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered { reporter, id } => write!(f, "registered {} as reporter#{}", reporter, id),
            Self::Submitted {
                reporter,
                installed,
                retired,
            } => write!(
                f,
                "{} submitted {} edges (retired {})",
                reporter, installed, retired
            ),
            Self::Unregistered { reporter, retired } => {
                write!(f, "unregistered {} (retired {})", reporter, retired)
            }
            Self::Checked {
                xid,
                cycle: Some(cycle),
                ..
            } => {
                let path: Vec<String> = cycle.iter().map(u64::to_string).collect();
                write!(f, "xid {}: DEADLOCK [{}]", xid, path.join(" -> "))
            }
            Self::Checked { xid, .. } => write!(f, "xid {}: ok", xid),
            Self::Failed { step, error } => write!(f, "step {} failed: {}", step, error),
        }
    }
}

// =============================================================================
// RUNNER
// =============================================================================

struct Replay {
    graph: WaitGraph,
    names: BTreeMap<String, ReporterId>,
}

impl Replay {
    fn reporter(&self, name: &str) -> Result<ReporterId, String> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| format!("unknown reporter '{}'", name))
    }

    fn register(&mut self, name: &str) -> Result<ReporterId, String> {
        if self.names.contains_key(name) {
            return Err(format!("reporter '{}' already registered", name));
        }
        let id = self.graph.register_reporter().map_err(|e| e.to_string())?;
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    fn apply(&mut self, step: &Step) -> Result<StepOutcome, String> {
        match step {
            Step::Register { reporter } => {
                let id = self.register(reporter)?;
                Ok(StepOutcome::Registered {
                    reporter: reporter.clone(),
                    id: id.0,
                })
            }
            Step::Submit { reporter, edges } => {
                let typed = edges
                    .iter()
                    .map(|&(s, t)| Ok((transaction(s)?, transaction(t)?)))
                    .collect::<Result<Vec<(TransactionId, TransactionId)>, String>>()?;
                let id = match self.names.get(reporter.as_str()).copied() {
                    Some(id) => id,
                    None => self.register(reporter)?,
                };
                let summary = self
                    .graph
                    .replace_subgraph(id, &encode_edges(&typed))
                    .map_err(|e| e.to_string())?;
                Ok(StepOutcome::Submitted {
                    reporter: reporter.clone(),
                    installed: summary.installed,
                    retired: summary.retired,
                })
            }
            Step::Unregister { reporter } => {
                let id = self.reporter(reporter)?;
                let summary = self
                    .graph
                    .unregister_reporter(id)
                    .map_err(|e| e.to_string())?;
                self.names.remove(reporter.as_str());
                Ok(StepOutcome::Unregistered {
                    reporter: reporter.clone(),
                    retired: summary.retired,
                })
            }
            Step::Check { xid } => {
                let cycle = self.graph.find_cycle(transaction(*xid)?);
                Ok(StepOutcome::Checked {
                    xid: *xid,
                    deadlock: cycle.is_some(),
                    cycle: cycle.map(|c| c.iter().map(|m| m.get()).collect()),
                })
            }
        }
    }
}

fn transaction(raw: u64) -> Result<TransactionId, String> {
    TransactionId::new(raw).ok_or_else(|| "transaction id 0 is reserved".to_string())
}

/// Run `script` against a fresh graph built from `config`.
///
/// Fails only if the graph cannot be built; step failures are reported as
/// [`StepOutcome::Failed`]. The graph invariants are checked after the last
/// step.
pub fn run_script(
    script: &ReplayScript,
    config: GraphConfig,
) -> Result<Vec<StepOutcome>, WaitGraphError> {
    let mut replay = Replay {
        graph: WaitGraph::with_config(config)?,
        names: BTreeMap::new(),
    };

    let outcomes = script
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            replay
                .apply(step)
                .unwrap_or_else(|error| StepOutcome::Failed { step: i, error })
        })
        .collect();

    replay.graph.check_invariants()?;
    Ok(outcomes)
}

// =============================================================================
// TESTS
// =============================================================================
