//! Staged off-thread Jacobian derivation.
//!
//! Wraps the pure stages of `dhsym-jacobian` in a coordinator thread:
//! velocity propagation runs first, the six per-component extractions fan
//! out across scoped worker threads, and frame conversion runs after the
//! join (it is internally sequential — every rotation multiply is
//! simplified before the next). Stages communicate only by channel; there
//! is no shared mutable symbolic state.
//!
//! Every request bumps a monotonic topology version. In-flight work checks
//! the latest version at stage boundaries and abandons itself once
//! superseded, so exactly one artifact settles per latest request and
//! results from different topologies are never mixed.

pub mod pipeline;

pub use pipeline::{JacobianPipeline, PipelineError};
