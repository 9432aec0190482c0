//! The configuration of the caller.
//! This struct is a comprehensive list of the parameters that can be set by a user.
//! Every field has a default, so a partial TOML profile is a valid configuration.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CallerConfig {
    /// Maximum distance (bp) between two split/clip breakends to be linked in the evidence graph.
    pub max_evidence_separation: u64,
    /// Extra slack (bp) when either side is a discordant pair. If None, derived from the insert size.
    pub discordant_slop: Option<u64>,
    /// Maximum number of edges a new node may create.
    pub max_neighbors: usize,
    pub min_mapq: u8,
    pub min_clip_length: u32,
    /// The number of aligned bases kept beside a clip.
    pub clip_flank: usize,
    /// Noise floor, in distinct reads.
    pub min_cluster_support: usize,
    pub min_assembly_fragments: usize,
    pub max_assembly_fragments: usize,
    pub max_extension_steps: usize,
    pub min_overlap: usize,
    pub min_overlap_identity: f64,
    pub kmer_size: usize,
    pub band_width: usize,
    pub coverage_bin_size: u64,
    /// Local depth is measured over +/- this many bp around each breakpoint.
    pub depth_flank: u64,
    pub score_threshold: f64,
    pub min_sv_length: u64,
    /// Intra-chromosomal events longer than this are reported as breakends.
    pub max_intra_length: u64,
    pub merge_distance: u64,
    pub region_window_size: u64,
    pub region_overlap: u64,
    pub max_signals_per_region: usize,
    pub max_insert_size: Option<u64>,
    /// 0 means all cores.
    pub threads: usize,
    pub seed: u64,
}

impl std::default::Default for CallerConfig {
    fn default() -> Self {
        Self {
            max_evidence_separation: 500,
            discordant_slop: None,
            max_neighbors: 64,
            min_mapq: 20,
            min_clip_length: 15,
            clip_flank: 40,
            min_cluster_support: 3,
            min_assembly_fragments: 3,
            max_assembly_fragments: 64,
            max_extension_steps: 128,
            min_overlap: 20,
            min_overlap_identity: 0.85,
            kmer_size: 11,
            band_width: 8,
            coverage_bin_size: 1,
            depth_flank: 200,
            score_threshold: 0.5,
            min_sv_length: 30,
            max_intra_length: 10_000_000,
            merge_distance: 50,
            region_window_size: 1_000_000,
            region_overlap: 10_000,
            max_signals_per_region: 2_000_000,
            max_insert_size: None,
            threads: 0,
            seed: 42,
        }
    }
}

impl CallerConfig {
    pub fn from_toml_str(profile: &str) -> Result<Self, crate::error::Error> {
        let config: Self = toml::from_str(profile)?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives: [(&'static str, u64); 7] = [
            ("max_evidence_separation", self.max_evidence_separation),
            ("max_neighbors", self.max_neighbors as u64),
            ("min_cluster_support", self.min_cluster_support as u64),
            ("max_extension_steps", self.max_extension_steps as u64),
            ("coverage_bin_size", self.coverage_bin_size),
            ("region_window_size", self.region_window_size),
            ("min_overlap", self.min_overlap as u64),
        ];
        if let Some(&(name, _)) = positives.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::NotPositive { name });
        }
        if self.region_window_size <= self.region_overlap {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.region_overlap,
                window: self.region_window_size,
            });
        }
        let identity = self.min_overlap_identity;
        if !(0f64 < identity && identity <= 1f64) {
            return Err(ConfigError::OutOfUnitRange {
                name: "min_overlap_identity",
                value: identity,
            });
        }
        // Scores are opaque reals. Only the logistic model keeps them in (0, 1).
        if !self.score_threshold.is_finite() {
            return Err(ConfigError::NotFinite {
                name: "score_threshold",
                value: self.score_threshold,
            });
        }
        if !(1..=32).contains(&self.kmer_size) {
            return Err(ConfigError::KmerSize(self.kmer_size));
        }
        if self.max_assembly_fragments < self.min_assembly_fragments {
            return Err(ConfigError::FragmentBounds {
                min: self.min_assembly_fragments,
                max: self.max_assembly_fragments,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_is_valid() {
        assert_eq!(CallerConfig::default().validate(), Ok(()));
    }
    #[test]
    fn partial_profile() {
        let profile = "min_cluster_support = 5\nscore_threshold = 0.7\n";
        let config = CallerConfig::from_toml_str(profile).unwrap();
        assert_eq!(config.min_cluster_support, 5);
        assert_eq!(config.score_threshold, 0.7);
        assert_eq!(config.max_evidence_separation, 500);
    }
    #[test]
    fn rejects_overlap() {
        let config = CallerConfig {
            region_window_size: 100,
            region_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OverlapTooLarge { .. })
        ));
    }
    #[test]
    fn rejects_zero() {
        let config = CallerConfig {
            max_neighbors: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive {
                name: "max_neighbors"
            })
        );
    }
    #[test]
    fn threshold_is_any_finite_score() {
        for score_threshold in [-3.5, 0f64, 12f64] {
            let config = CallerConfig {
                score_threshold,
                ..Default::default()
            };
            assert_eq!(config.validate(), Ok(()));
        }
        let config = CallerConfig {
            score_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotFinite {
                name: "score_threshold",
                ..
            })
        ));
        let profile = "score_threshold = inf\n";
        assert!(CallerConfig::from_toml_str(profile).is_err());
    }
    #[test]
    fn rejects_kmer() {
        let config = CallerConfig {
            kmer_size: 33,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::KmerSize(33)));
    }
}
