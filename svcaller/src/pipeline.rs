//! The driver: run every region through the stages and merge the results.
//!
//! Within a region the stages run one after another:
//! signals -> coverage -> evidence graph -> clusters -> assembly -> calls -> scores.
//! Regions run in parallel on the current rayon pool and share nothing but the scorer.
use crate::assemble::LocalAssembler;
use crate::call::CallSynthesizer;
use crate::cluster::ClusterExtractor;
use crate::config::CallerConfig;
use crate::coverage::CoverageProfile;
use crate::error::RegionError;
use crate::evidence_graph::GraphBuilder;
use crate::region::{tile, Region, RegionReader};
use crate::scorer::{score_call, Scorer};
use crate::signal::{InsertSizeStats, SignalExtractor};
use definitions::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag to abort the run. Regions check it between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
    fn check(&self) -> Result<(), RegionError> {
        match self.is_cancelled() {
            true => Err(RegionError::Cancelled),
            false => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStats {
    pub records: usize,
    pub signals: usize,
    pub nodes: usize,
    pub edges: usize,
    pub clusters: usize,
    pub contigs: usize,
    pub calls: usize,
}

impl std::ops::AddAssign for RegionStats {
    fn add_assign(&mut self, other: Self) {
        self.records += other.records;
        self.signals += other.signals;
        self.nodes += other.nodes;
        self.edges += other.edges;
        self.clusters += other.clusters;
        self.contigs += other.contigs;
        self.calls += other.calls;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionOutput {
    /// Calls owned by the region, sorted.
    pub calls: Vec<ScoredCall>,
    pub dropped: DropTally,
    pub stats: RegionStats,
}

/// Run the stages on the records of one region.
pub fn process_region(
    region: &Region,
    records: &[AlignmentRecord],
    scorer: &dyn Scorer,
    config: &CallerConfig,
    cancel: &CancelToken,
) -> Result<RegionOutput, RegionError> {
    cancel.check()?;
    let mut stats = RegionStats {
        records: records.len(),
        ..Default::default()
    };
    let mut dropped = DropTally::default();
    let insert_size = match config.max_insert_size {
        Some(threshold) => InsertSizeStats::with_threshold(threshold),
        None => InsertSizeStats::estimate(records),
    };
    let extractor = SignalExtractor::new(config, &insert_size);
    // Records starting in the padding are tallied by the window owning them.
    let mut padding = DropTally::default();
    let mut signals = vec![];
    for record in records {
        let tally = match region.owns(&Locus::new(&record.chrom, record.position)) {
            true => &mut dropped,
            false => &mut padding,
        };
        signals.extend(extractor.extract_all(std::iter::once(record), tally));
    }
    stats.signals = signals.len();
    if config.max_signals_per_region < signals.len() {
        return Err(RegionError::SignalBudget {
            found: signals.len(),
            limit: config.max_signals_per_region,
        });
    }
    let profile = CoverageProfile::build(
        &region.chrom,
        region.start,
        region.end,
        config.coverage_bin_size,
        records,
    );
    cancel.check()?;
    let slop = extractor.insert_threshold();
    let graph = GraphBuilder::new(config, slop).build(signals);
    stats.nodes = graph.nodes().len();
    stats.edges = graph.edges().len();
    cancel.check()?;
    let clusters = ClusterExtractor::new(config, slop).extract(graph).clusters;
    stats.clusters = clusters.len();
    cancel.check()?;
    let assembler = LocalAssembler::new(config);
    let synthesizer = CallSynthesizer::new(config);
    let mut calls = vec![];
    for cluster in clusters.iter() {
        let consensus = assembler.assemble(cluster).contig();
        stats.contigs += consensus.is_some() as usize;
        let call = synthesizer.synthesize(cluster, consensus);
        if !region.owns(&call.locus_a) {
            continue;
        }
        if matches!(call.length, Some(len) if len < config.min_sv_length) {
            continue;
        }
        calls.push(score_call(call, &profile, scorer, config));
    }
    calls.sort_by(compare_calls);
    stats.calls = calls.len();
    debug!(
        "REGION\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        region,
        stats.records,
        stats.signals,
        stats.nodes,
        stats.edges,
        stats.clusters,
        stats.contigs,
        stats.calls
    );
    Ok(RegionOutput {
        calls,
        dropped,
        stats,
    })
}

/// Output order: (locus A, locus B), then type, anchors, and the stronger call first.
pub fn compare_calls(x: &ScoredCall, y: &ScoredCall) -> std::cmp::Ordering {
    let (a, b) = (&x.call, &y.call);
    (&a.locus_a, &a.locus_b, a.sv_type, a.anchor_a, a.anchor_b)
        .cmp(&(&b.locus_a, &b.locus_b, b.sv_type, b.anchor_a, b.anchor_b))
        .then(b.support.cmp(&a.support))
        .then(y.score.total_cmp(&x.score))
        .then(a.length.cmp(&b.length))
}

/// Run every region of `reader` and merge the results into one deterministic call set.
/// Failed regions, including panicked and cancelled ones, are listed instead of their calls.
pub fn run<R: RegionReader + ?Sized>(
    reader: &R,
    scorer: &dyn Scorer,
    config: &CallerConfig,
    cancel: &CancelToken,
) -> (CallSet, RegionStats) {
    let regions = tile(&reader.chrom_lengths(), config);
    info!("RUN\tRegions\t{}", regions.len());
    let results: Vec<(&Region, Result<RegionOutput, RegionError>)> = regions
        .par_iter()
        .map(|region| {
            let task = || -> Result<RegionOutput, RegionError> {
                cancel.check()?;
                let records = reader.fetch(region).map_err(RegionError::Fetch)?;
                process_region(region, &records, scorer, config, cancel)
            };
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task))
                .unwrap_or_else(|payload| Err(RegionError::Panicked(panic_message(payload))));
            (region, result)
        })
        .collect();
    let mut callset = CallSet {
        regions: regions.len(),
        ..Default::default()
    };
    let mut total = RegionStats::default();
    for (region, result) in results {
        match result {
            Ok(output) => {
                callset.calls.extend(output.calls);
                callset.dropped.merge(&output.dropped);
                total += output.stats;
            }
            Err(why) => {
                warn!("FAILED\t{}\t{}", region, why);
                callset.failures.push(RegionFailure {
                    region: region.to_string(),
                    reason: why.to_string(),
                });
            }
        }
    }
    callset.calls.sort_by(compare_calls);
    callset.calls = merge_calls(std::mem::take(&mut callset.calls), config.merge_distance);
    info!(
        "RUN\tCalls\t{}\tPass\t{}\tFailed\t{}\tDropped\t{}",
        callset.calls.len(),
        callset.calls.iter().filter(|c| c.pass).count(),
        callset.failures.len(),
        callset.dropped.total()
    );
    (callset, total)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Merge sorted calls of the same type whose loci are both within `distance`.
/// The call with more support wins, then the one with the higher score.
pub fn merge_calls(calls: Vec<ScoredCall>, distance: u64) -> Vec<ScoredCall> {
    let close = |x: &Locus, y: &Locus| matches!(x.distance(y), Some(d) if d <= distance);
    let mut merged: Vec<ScoredCall> = Vec::with_capacity(calls.len());
    for call in calls {
        let hit = merged
            .iter()
            .rev()
            .take_while(|kept| close(&kept.call.locus_a, &call.call.locus_a))
            .position(|kept| {
                kept.call.sv_type == call.call.sv_type && close(&kept.call.locus_b, &call.call.locus_b)
            })
            .map(|i| merged.len() - 1 - i);
        match hit {
            Some(i) => {
                let kept = &merged[i];
                let better = (call.call.support, call.score) > (kept.call.support, kept.score);
                trace!("MERGE\t{}\t{}", kept.call.locus_a, call.call.locus_a);
                if better {
                    merged[i] = call;
                }
            }
            None => merged.push(call),
        }
    }
    merged.sort_by(compare_calls);
    merged
}
