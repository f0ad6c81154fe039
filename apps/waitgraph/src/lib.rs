//! # waitgraph
//!
//! Deadlock detection daemon: an HTTP front end, a CLI and a scenario
//! replayer around [`waitgraph_core::WaitGraph`].

pub mod api;
pub mod cli;
pub mod config;
pub mod replay;
