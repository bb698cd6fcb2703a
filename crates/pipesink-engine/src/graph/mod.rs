//! Pipeline graph module.
//!
//! # Overview
//!
//! Builds a petgraph-based directed graph of the jobs downstream of the
//! trigger's root job and checks it for cycles before anything evaluates
//! it.
//!
//! ## Pipeline
//!
//! ```text
//! JobRepository (host)
//!        ↓  build::PipelineGraph::build()
//! PipelineGraph (DiGraph<Job, ()> with possible cycles)
//!        ↓  cycles::has_cycle()
//! verified acyclic → crate::evaluate
//! ```
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! use pipesink_engine::graph::{PipelineGraph, has_cycle};
//!
//! let graph = PipelineGraph::build(&repo, &root, &exclusions)?;
//! if has_cycle(&graph) {
//!     return Ok(TickOutcome::CycleDetected { .. });
//! }
//! ```

pub mod build;
pub mod cycles;

pub use build::PipelineGraph;
pub use cycles::{find_cycles, has_cycle};
