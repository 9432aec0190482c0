use std::path::PathBuf;

/// Errors that stop a run before or outside of region processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("scorer artifact error: {0}")]
    Scorer(#[from] ScorerError),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("record {line}: {source}")]
    Record {
        line: usize,
        source: serde_json::Error,
    },
}

impl Error {
    /// Convenience for wrapping an `io::Error` with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be positive")]
    NotPositive { name: &'static str },

    #[error("region_overlap ({overlap}) must be smaller than region_window_size ({window})")]
    OverlapTooLarge { overlap: u64, window: u64 },

    #[error("{name} must be in (0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("kmer_size must be in 1..=32, got {0}")]
    KmerSize(usize),

    #[error("min_assembly_fragments ({min}) exceeds max_assembly_fragments ({max})")]
    FragmentBounds { min: usize, max: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("cannot open model {path}: {source}")]
    Missing {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("cannot parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model expects {found} features, the caller produces {expected}")]
    FeatureShape { expected: usize, found: usize },

    #[error("model feature #{index} is {found:?}, expected {expected:?}")]
    FeatureName {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("model parameter is not finite: {0}")]
    NotFinite(String),
}

/// Why one record did not yield a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("empty reference name")]
    EmptyChrom,

    #[error("alignment end precedes its start")]
    InvertedSpan,

    #[error("clip extents exceed the read length")]
    ClipOverflow,

    #[error("supplementary record without a split partner")]
    MissingPartner,

    #[error("split partner end precedes its start")]
    InvertedPartner,

    #[error("mapped mate without a mate locus")]
    MissingMate,
}

impl SignalError {
    /// The key used in the dropped-signal tally.
    pub fn tag(&self) -> &'static str {
        match self {
            SignalError::EmptyChrom => "malformed_empty_chrom",
            SignalError::InvertedSpan => "malformed_inverted_span",
            SignalError::ClipOverflow => "malformed_clip_overflow",
            SignalError::MissingPartner => "malformed_missing_partner",
            SignalError::InvertedPartner => "malformed_inverted_partner",
            SignalError::MissingMate => "malformed_missing_mate",
        }
    }
}

/// Why a region produced no output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegionError {
    #[error("cancelled")]
    Cancelled,

    #[error("{found} signals exceed the per-region limit of {limit}")]
    SignalBudget { found: usize, limit: usize },

    #[error("cannot fetch records: {0}")]
    Fetch(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, Error>;
