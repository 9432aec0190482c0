//! Overlaps between a growing contig and a fragment.
//!
//! The candidate offset comes from k-mer diagonal voting. It is then verified by
//! an edlib alignment over the overlapping stretch, so sequencing errors are tolerated.
use crate::config::CallerConfig;
use crate::seq::is_clean;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapConfig {
    pub min_overlap: usize,
    pub min_identity: f64,
    pub kmer_size: usize,
    pub band_width: usize,
}

impl OverlapConfig {
    pub fn new(config: &CallerConfig) -> Self {
        Self {
            min_overlap: config.min_overlap,
            min_identity: config.min_overlap_identity,
            kmer_size: config.kmer_size,
            band_width: config.band_width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    /// The offset of the query start in the target. Negative if the query hangs over the head.
    pub diagonal: isize,
    pub length: usize,
    pub distance: usize,
    pub identity: f64,
}

impl Overlap {
    pub fn matches(&self) -> usize {
        self.length - self.distance
    }
}

/// Positions of every clean k-mer of the target.
#[derive(Debug, Clone)]
pub struct KmerIndex<'a> {
    k: usize,
    target: &'a [u8],
    index: HashMap<&'a [u8], Vec<usize>>,
}

impl<'a> KmerIndex<'a> {
    pub fn new(target: &'a [u8], k: usize) -> Self {
        let mut index: HashMap<&[u8], Vec<usize>> = HashMap::new();
        if 0 < k && k <= target.len() {
            for (i, kmer) in target.windows(k).enumerate() {
                if is_clean(kmer) {
                    index.entry(kmer).or_default().push(i);
                }
            }
        }
        Self { k, target, index }
    }
    /// The diagonal with the most k-mer hits and its vote. Ties go to the diagonal closer to zero, then the smaller one.
    pub fn best_diagonal(&self, query: &[u8]) -> Option<(isize, usize)> {
        if self.k == 0 || query.len() < self.k {
            return None;
        }
        let mut votes: HashMap<isize, usize> = HashMap::new();
        for (j, kmer) in query.windows(self.k).enumerate() {
            if let Some(hits) = self.index.get(kmer) {
                for &i in hits {
                    *votes.entry(i as isize - j as isize).or_default() += 1;
                }
            }
        }
        votes.into_iter().max_by(|(d1, v1), (d2, v2)| {
            v1.cmp(v2)
                .then(d2.unsigned_abs().cmp(&d1.unsigned_abs()))
                .then(d2.cmp(d1))
        })
    }
    /// Overlap of `query` placed on the best diagonal. None if it is too short or too divergent.
    pub fn overlap(&self, query: &[u8], config: &OverlapConfig) -> Option<Overlap> {
        let (diagonal, _) = self.best_diagonal(query)?;
        let target = self.target;
        let t_start = diagonal.max(0) as usize;
        let q_start = (-diagonal).max(0) as usize;
        let length = (target.len() - t_start).min(query.len() - q_start);
        if length < config.min_overlap.max(1) {
            return None;
        }
        let xs = &target[t_start..t_start + length];
        let ys = &query[q_start..q_start + length];
        let distance = overlap_distance(xs, ys, config.band_width)?;
        let identity = 1f64 - distance as f64 / length as f64;
        (config.min_identity <= identity).then_some(Overlap {
            diagonal,
            length,
            distance,
            identity,
        })
    }
}

// Operation codes of an edlib alignment.
const EDLIB_MATCH: u8 = 0;
const EDLIB_INS: u8 = 1;
const EDLIB_DEL: u8 = 2;

/// Global edit distance of two overlapping stretches by edlib.
/// None if the alignment drifts more than `band` off the diagonal at any point.
pub fn overlap_distance(xs: &[u8], ys: &[u8], band: usize) -> Option<usize> {
    if band < xs.len().abs_diff(ys.len()) {
        return None;
    }
    if xs.is_empty() || ys.is_empty() {
        return Some(xs.len().max(ys.len()));
    }
    let mode = edlib_sys::AlignMode::Global;
    let task = edlib_sys::AlignTask::Alignment;
    let aln = edlib_sys::align(ys, xs, mode, task);
    let ops = aln.operations()?;
    let (mut drift, mut max_drift) = (0isize, 0usize);
    for &op in ops.iter() {
        match op {
            EDLIB_INS => drift += 1,
            EDLIB_DEL => drift -= 1,
            _ => {}
        }
        max_drift = max_drift.max(drift.unsigned_abs());
    }
    if band < max_drift {
        return None;
    }
    Some(ops.iter().filter(|&&op| op != EDLIB_MATCH).count())
}
