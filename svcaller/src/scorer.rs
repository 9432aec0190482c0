//! Features of a candidate call and the scoring function applied to them.
//!
//! The feature layout is fixed. A model artifact names the features it was trained on,
//! and is rejected at load time unless the names match this layout exactly.
use crate::config::CallerConfig;
use crate::coverage::CoverageProfile;
use crate::error::ScorerError;
use definitions::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const FEATURE_NAMES: [&str; 17] = [
    "support",
    "support_depth_ratio",
    "discordant_count",
    "split_count",
    "clip_count",
    "consensus_present",
    "consensus_identity",
    "consensus_fragments",
    "interval_width",
    "mean_mapq",
    "log_length",
    "is_deletion",
    "is_duplication",
    "is_inversion",
    "is_insertion",
    "is_translocation",
    "is_breakend",
];
pub const FEATURE_LEN: usize = FEATURE_NAMES.len();
const TYPE_OFFSET: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector(pub [f64; FEATURE_LEN]);

impl FeatureVector {
    /// Compute the features of `call`. `profile` should be the coverage of the region the call came from.
    pub fn new(call: &CandidateCall, profile: &CoverageProfile, config: &CallerConfig) -> Self {
        let mut xs = [0f64; FEATURE_LEN];
        let depth = local_depth(call, profile, config.depth_flank);
        xs[0] = call.support as f64;
        xs[1] = call.support as f64 / depth as f64;
        xs[2] = call.evidence.discordant as f64;
        xs[3] = call.evidence.split as f64;
        xs[4] = call.evidence.clip as f64;
        if let Some(contig) = call.consensus.as_ref() {
            xs[5] = 1f64;
            xs[6] = contig.identity;
            xs[7] = contig.fragments as f64;
        }
        xs[8] = call.interval_width as f64;
        xs[9] = call.mean_mapq;
        xs[10] = call.length.map(|len| (1f64 + len as f64).log10()).unwrap_or(0f64);
        let type_index = match call.sv_type {
            SvType::Deletion => 0,
            SvType::Duplication => 1,
            SvType::Inversion => 2,
            SvType::Insertion => 3,
            SvType::Translocation => 4,
            SvType::Breakend => 5,
        };
        xs[TYPE_OFFSET + type_index] = 1f64;
        Self(xs)
    }
    pub fn get(&self, name: &str) -> Option<f64> {
        let index = FEATURE_NAMES.iter().position(|&n| n == name)?;
        Some(self.0[index])
    }
}

/// Mean depth on the anchored side of each breakend, truncated and averaged over the sides inside the region.
/// Never below 1.
pub fn local_depth(call: &CandidateCall, profile: &CoverageProfile, flank: u64) -> u32 {
    let side = |locus: &Locus, anchor: Anchor| -> Option<u32> {
        if !profile.contains(&locus.chrom, locus.position) {
            return None;
        }
        let pos = locus.position;
        let (start, end) = match anchor {
            Anchor::Left => (pos.saturating_sub(flank), pos),
            Anchor::Right => (pos, pos + flank),
        };
        Some(profile.mean_depth_truncated(start, end.max(start + 1)))
    };
    let depths: Vec<u32> = [(&call.locus_a, call.anchor_a), (&call.locus_b, call.anchor_b)]
        .into_iter()
        .filter_map(|(locus, anchor)| side(locus, anchor))
        .collect();
    match depths.len() {
        0 => 1,
        n => (depths.iter().sum::<u32>() / n as u32).max(1),
    }
}

/// A pre-trained, pure scoring function. Shared read-only by every worker.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> f64;
}

/// `sigmoid(bias + weights . x)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ScorerError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ScorerError::Missing {
            source,
            path: path.to_path_buf(),
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, ScorerError> {
        let model: Self = serde_json::from_reader(reader)?;
        model.validate()?;
        Ok(model)
    }
    pub fn validate(&self) -> Result<(), ScorerError> {
        if self.feature_names.len() != FEATURE_LEN {
            return Err(ScorerError::FeatureShape {
                expected: FEATURE_LEN,
                found: self.feature_names.len(),
            });
        }
        if self.weights.len() != FEATURE_LEN {
            return Err(ScorerError::FeatureShape {
                expected: FEATURE_LEN,
                found: self.weights.len(),
            });
        }
        let mismatch = FEATURE_NAMES
            .iter()
            .zip(self.feature_names.iter())
            .enumerate()
            .find(|(_, (expected, found))| expected != found);
        if let Some((index, (&expected, found))) = mismatch {
            return Err(ScorerError::FeatureName {
                index,
                expected,
                found: found.clone(),
            });
        }
        if let Some(i) = self.weights.iter().position(|w| !w.is_finite()) {
            return Err(ScorerError::NotFinite(self.feature_names[i].clone()));
        }
        if !self.bias.is_finite() {
            return Err(ScorerError::NotFinite("bias".to_string()));
        }
        Ok(())
    }
}

impl Scorer for LogisticModel {
    fn score(&self, features: &FeatureVector) -> f64 {
        let linear: f64 = self
            .weights
            .iter()
            .zip(features.0.iter())
            .map(|(w, x)| w * x)
            .sum();
        1f64 / (1f64 + (-(linear + self.bias)).exp())
    }
}

/// Score a call and set its filter flag.
pub fn score_call<S: Scorer + ?Sized>(
    call: CandidateCall,
    profile: &CoverageProfile,
    scorer: &S,
    config: &CallerConfig,
) -> ScoredCall {
    let features = FeatureVector::new(&call, profile, config);
    let score = scorer.score(&features);
    trace!("SCORE\t{}\t{}\t{:?}\t{:.4}", call.sv_type, call.locus_a, features.0, score);
    ScoredCall {
        call,
        score,
        pass: config.score_threshold <= score,
    }
}
