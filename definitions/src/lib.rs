//! Definitions -- A tiny interface for structural variant calling.
//! Roughly speaking, every stage of the caller passes messages through the structures defined here, and the CLI reads and writes them as JSON.
//! The input is a stream of [AlignmentRecord](AlignmentRecord), the output is a [CallSet](CallSet).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FLAG_PAIRED: u16 = 0x1;
pub const FLAG_PROPER_PAIR: u16 = 0x2;
pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_MATE_REVERSE: u16 = 0x20;
pub const FLAG_SECONDARY: u16 = 0x100;
pub const FLAG_DUPLICATE: u16 = 0x400;
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

/// One alignment record, as handed over by an external reader.
/// All coordinates are 0-based and the sequence is in the reference orientation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlignmentRecord {
    /// Name of the read. Both mates of a pair share it.
    pub name: String,
    pub chrom: String,
    /// Leftmost aligned position.
    pub position: u64,
    /// Exclusive end of the aligned part.
    pub end: u64,
    /// SAM flags.
    pub flags: u16,
    pub mapq: u8,
    /// Soft-clipped bases at the start/end of the read, in reference orientation.
    #[serde(default)]
    pub left_clip: u32,
    #[serde(default)]
    pub right_clip: u32,
    #[serde(default)]
    pub mate: Option<MateLocus>,
    #[serde(default)]
    pub template_len: i64,
    /// The other segment of a split alignment (the SA tag).
    #[serde(default)]
    pub split_partner: Option<SplitPartner>,
    /// A string on an alphabet of A,C,G,T,N. It can be empty when the reader drops sequences.
    #[serde(default)]
    pub seq: String,
}

impl AlignmentRecord {
    pub fn seq(&self) -> &[u8] {
        self.seq.as_bytes()
    }
    fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag == flag
    }
    pub fn is_paired(&self) -> bool {
        self.has_flag(FLAG_PAIRED)
    }
    pub fn is_proper_pair(&self) -> bool {
        self.has_flag(FLAG_PROPER_PAIR)
    }
    pub fn is_unmapped(&self) -> bool {
        self.has_flag(FLAG_UNMAPPED)
    }
    pub fn is_mate_unmapped(&self) -> bool {
        self.has_flag(FLAG_MATE_UNMAPPED)
    }
    pub fn is_reverse(&self) -> bool {
        self.has_flag(FLAG_REVERSE)
    }
    pub fn is_mate_reverse(&self) -> bool {
        self.has_flag(FLAG_MATE_REVERSE)
    }
    pub fn is_secondary(&self) -> bool {
        self.has_flag(FLAG_SECONDARY)
    }
    pub fn is_duplicate(&self) -> bool {
        self.has_flag(FLAG_DUPLICATE)
    }
    pub fn is_supplementary(&self) -> bool {
        self.has_flag(FLAG_SUPPLEMENTARY)
    }
    pub fn strand(&self) -> Strand {
        Strand::from_is_reverse(self.is_reverse())
    }
    /// The number of reference bases covered by the aligned part.
    pub fn aligned_length(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MateLocus {
    pub chrom: String,
    pub position: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitPartner {
    pub chrom: String,
    pub position: u64,
    /// Exclusive end of the partner segment.
    pub end: u64,
    pub is_reverse: bool,
    pub mapq: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_is_reverse(is_reverse: bool) -> Self {
        match is_reverse {
            true => Strand::Reverse,
            false => Strand::Forward,
        }
    }
    pub fn is_forward(&self) -> bool {
        *self == Strand::Forward
    }
}

/// Which side of a junction keeps the aligned sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Anchor {
    /// Aligned sequence lies to the left. The junction is at the end of the alignment.
    Left,
    /// Aligned sequence lies to the right. The junction is at the start of the alignment.
    Right,
}

impl Anchor {
    pub fn flip(self) -> Self {
        match self {
            Anchor::Left => Anchor::Right,
            Anchor::Right => Anchor::Left,
        }
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Anchor::Left => write!(f, "+"),
            Anchor::Right => write!(f, "-"),
        }
    }
}

/// A reference position. Ordered by chromosome name, then position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locus {
    pub chrom: String,
    pub position: u64,
}

impl Locus {
    pub fn new(chrom: &str, position: u64) -> Self {
        Self {
            chrom: chrom.to_string(),
            position,
        }
    }
    /// Distance between two loci, or None if they are on different chromosomes.
    pub fn distance(&self, other: &Locus) -> Option<u64> {
        (self.chrom == other.chrom).then(|| self.position.abs_diff(other.position))
    }
}

impl std::fmt::Display for Locus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.chrom, self.position)
    }
}

/// One side of a junction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Breakend {
    pub locus: Locus,
    pub anchor: Anchor,
}

impl Breakend {
    pub fn new(chrom: &str, position: u64, anchor: Anchor) -> Self {
        Self {
            locus: Locus::new(chrom, position),
            anchor,
        }
    }
    /// True if both breakends are on the same chromosome, point in the same direction, and lie within `sep` bp.
    pub fn is_near(&self, other: &Breakend, sep: u64) -> bool {
        self.anchor == other.anchor && matches!(self.locus.distance(&other.locus), Some(d) if d <= sep)
    }
}

impl std::fmt::Display for Breakend {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.locus, self.anchor)
    }
}

/// The kind of evidence a signal carries. The set is closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    DiscordantPair,
    SplitRead,
    SoftClip,
}

/// A piece of read sequence next to a junction, used for local assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    /// A string on an alphabet of A,C,G,T,N in reference orientation.
    pub seq: String,
    /// 0-index. The offset in `seq` where the junction lies.
    pub junction: usize,
    /// The junction on the reference.
    pub breakend: Breakend,
}

impl Fragment {
    pub fn seq(&self) -> &[u8] {
        self.seq.as_bytes()
    }
}

/// One unit of evidence derived from a read. Immutable once extracted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlignmentSignal {
    pub kind: SignalKind,
    /// The lower breakend. For soft clips, the only one.
    pub first: Breakend,
    /// The upper breakend of paired/split evidence.
    pub second: Option<Breakend>,
    pub read_name: String,
    pub mapq: u8,
    pub fragment: Option<Fragment>,
}

impl AlignmentSignal {
    /// Create a signal and put the breakends in canonical order.
    pub fn new(
        kind: SignalKind,
        first: Breakend,
        second: Option<Breakend>,
        read_name: &str,
        mapq: u8,
        fragment: Option<Fragment>,
    ) -> Self {
        let (first, second) = match second {
            Some(second) if second < first => (second, Some(first)),
            second => (first, second),
        };
        Self {
            kind,
            first,
            second,
            read_name: read_name.to_string(),
            mapq,
            fragment,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SvType {
    Deletion,
    Duplication,
    Inversion,
    Insertion,
    Translocation,
    /// A breakpoint whose partner could not be resolved.
    Breakend,
}

impl SvType {
    pub const ALL: [SvType; 6] = [
        SvType::Deletion,
        SvType::Duplication,
        SvType::Inversion,
        SvType::Insertion,
        SvType::Translocation,
        SvType::Breakend,
    ];
    pub fn tag(&self) -> &'static str {
        match self {
            SvType::Deletion => "DEL",
            SvType::Duplication => "DUP",
            SvType::Inversion => "INV",
            SvType::Insertion => "INS",
            SvType::Translocation => "TRA",
            SvType::Breakend => "BND",
        }
    }
}

impl std::fmt::Display for SvType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Where a breakpoint sits in a consensus contig and on the reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContigJunction {
    /// 0-index in the contig.
    pub offset: usize,
    pub position: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusContig {
    /// A string on an alphabet of A,C,G,T,N.
    pub seq: String,
    /// The number of fragments placed in the contig.
    pub fragments: usize,
    /// Mean identity of the accepted overlaps.
    pub identity: f64,
    pub junction_a: Option<ContigJunction>,
    pub junction_b: Option<ContigJunction>,
}

impl ConsensusContig {
    pub fn seq(&self) -> &[u8] {
        self.seq.as_bytes()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EvidenceTally {
    pub discordant: usize,
    pub split: usize,
    pub clip: usize,
}

impl EvidenceTally {
    pub fn add(&mut self, kind: SignalKind) {
        match kind {
            SignalKind::DiscordantPair => self.discordant += 1,
            SignalKind::SplitRead => self.split += 1,
            SignalKind::SoftClip => self.clip += 1,
        }
    }
    pub fn total(&self) -> usize {
        self.discordant + self.split + self.clip
    }
}

/// A synthesized call. `locus_a <= locus_b` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateCall {
    pub sv_type: SvType,
    pub locus_a: Locus,
    pub anchor_a: Anchor,
    pub locus_b: Locus,
    pub anchor_b: Anchor,
    /// None for translocations and unresolved breakends.
    pub length: Option<u64>,
    /// The number of distinct reads.
    pub support: usize,
    pub evidence: EvidenceTally,
    /// The widest breakpoint interval among the two sides, before refinement.
    pub interval_width: u64,
    pub mean_mapq: f64,
    pub consensus: Option<ConsensusContig>,
}

impl CandidateCall {
    /// Order the two loci so that A comes first, swapping their anchors along.
    pub fn canonicalize(&mut self) {
        if self.locus_b < self.locus_a {
            std::mem::swap(&mut self.locus_a, &mut self.locus_b);
            std::mem::swap(&mut self.anchor_a, &mut self.anchor_b);
            if let Some(contig) = self.consensus.as_mut() {
                std::mem::swap(&mut contig.junction_a, &mut contig.junction_b);
            }
        }
    }
    pub fn is_canonical(&self) -> bool {
        self.locus_a <= self.locus_b
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCall {
    #[serde(flatten)]
    pub call: CandidateCall,
    pub score: f64,
    pub pass: bool,
}

impl ScoredCall {
    pub fn consensus_seq(&self) -> Option<&str> {
        self.call.consensus.as_ref().map(|c| c.seq.as_str())
    }
}

impl std::fmt::Display for ScoredCall {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let call = &self.call;
        let length = match call.length {
            Some(len) => len.to_string(),
            None => ".".to_string(),
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.4}\t{}\t{}",
            call.sv_type,
            call.locus_a,
            call.locus_b,
            length,
            call.support,
            call.anchor_a.to_string() + &call.anchor_b.to_string(),
            self.score,
            if self.pass { "PASS" } else { "LowScore" },
            self.consensus_seq().unwrap_or("."),
        )
    }
}

/// Dropped signal counts, keyed by reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DropTally {
    pub counts: BTreeMap<String, u64>,
}

impl DropTally {
    pub fn add(&mut self, reason: &str) {
        *self.counts.entry(reason.to_string()).or_default() += 1;
    }
    pub fn merge(&mut self, other: &DropTally) {
        for (reason, count) in other.counts.iter() {
            *self.counts.entry(reason.clone()).or_default() += count;
        }
    }
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
    pub fn get(&self, reason: &str) -> u64 {
        self.counts.get(reason).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionFailure {
    /// chrom:start-end
    pub region: String,
    pub reason: String,
}

/// The final output of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CallSet {
    /// The number of regions processed, failed ones included.
    #[serde(default)]
    pub regions: usize,
    pub calls: Vec<ScoredCall>,
    pub failures: Vec<RegionFailure>,
    pub dropped: DropTally,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn signal_is_canonical() {
        let first = Breakend::new("chr1", 2000, Anchor::Right);
        let second = Breakend::new("chr1", 1000, Anchor::Left);
        let signal = AlignmentSignal::new(
            SignalKind::DiscordantPair,
            first,
            Some(second),
            "r1",
            60,
            None,
        );
        assert_eq!(signal.first.locus.position, 1000);
        assert_eq!(signal.first.anchor, Anchor::Left);
        assert_eq!(signal.second.unwrap().locus.position, 2000);
    }
    #[test]
    fn locus_order() {
        assert!(Locus::new("chr1", 5000) < Locus::new("chr2", 10));
        assert!(Locus::new("chr1", 10) < Locus::new("chr1", 11));
        assert_eq!(Locus::new("chr1", 10).distance(&Locus::new("chr2", 10)), None);
    }
    #[test]
    fn breakend_near() {
        let a = Breakend::new("chr1", 100, Anchor::Left);
        let b = Breakend::new("chr1", 150, Anchor::Left);
        let c = Breakend::new("chr1", 150, Anchor::Right);
        assert!(a.is_near(&b, 50));
        assert!(!a.is_near(&b, 49));
        assert!(!a.is_near(&c, 100));
    }
    #[test]
    fn drop_tally() {
        let mut tally = DropTally::default();
        tally.add("low_mapq");
        tally.add("low_mapq");
        let mut other = DropTally::default();
        other.add("malformed_clip");
        tally.merge(&other);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.get("low_mapq"), 2);
        assert_eq!(tally.get("none"), 0);
    }
}
