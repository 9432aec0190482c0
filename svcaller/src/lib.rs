//! Structural variant calling from aligned reads.
//!
//! For each region, alignment records become signals ([signal]), signals become an evidence
//! graph ([evidence_graph]), the graph is partitioned into clusters ([cluster]), each cluster is
//! assembled locally ([assemble]) and turned into a call ([call]), and each call is scored
//! against the local depth ([coverage], [scorer]). [pipeline] runs the regions in parallel.
pub mod assemble;
pub mod call;
pub mod cluster;
pub mod config;
pub mod coverage;
pub mod error;
pub mod evidence_graph;
pub mod find_union;
pub mod pipeline;
pub mod region;
pub mod scorer;
pub mod seq;
pub mod signal;
pub mod stats;
#[macro_use]
extern crate log;

pub use config::CallerConfig;
pub use error::{Error, Result};
