//! Turn a cluster and its optional consensus into exactly one [CandidateCall].
use crate::cluster::Cluster;
use crate::config::CallerConfig;
use definitions::*;

/// SV type inference from the orientation and the relative position of two breakends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRule {
    pub min_sv_length: u64,
    pub max_intra_length: u64,
}

impl TypeRule {
    pub fn new(config: &CallerConfig) -> Self {
        Self {
            min_sv_length: config.min_sv_length,
            max_intra_length: config.max_intra_length,
        }
    }
    pub fn infer(&self, a: &Breakend, b: Option<&Breakend>) -> SvType {
        let b = match b {
            Some(b) => b,
            None => return SvType::Breakend,
        };
        let (a, b) = if b < a { (b, a) } else { (a, b) };
        let distance = match a.locus.distance(&b.locus) {
            Some(d) => d,
            None => return SvType::Translocation,
        };
        if self.max_intra_length < distance {
            return SvType::Breakend;
        }
        match (a.anchor, b.anchor) {
            (Anchor::Left, Anchor::Right) | (Anchor::Right, Anchor::Left)
                if distance < self.min_sv_length =>
            {
                SvType::Insertion
            }
            (Anchor::Left, Anchor::Right) => SvType::Deletion,
            (Anchor::Right, Anchor::Left) => SvType::Duplication,
            (Anchor::Left, Anchor::Left) | (Anchor::Right, Anchor::Right) => SvType::Inversion,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallSynthesizer {
    rule: TypeRule,
}

impl CallSynthesizer {
    pub fn new(config: &CallerConfig) -> Self {
        Self {
            rule: TypeRule::new(config),
        }
    }
    pub fn synthesize(&self, cluster: &Cluster, consensus: Option<ConsensusContig>) -> CandidateCall {
        let mut a = cluster.side_a.breakend();
        let mut b = cluster.side_b.as_ref().map(|s| s.breakend());
        if let Some(contig) = consensus.as_ref() {
            if let Some(junction) = contig.junction_a {
                a.locus.position = junction.position;
            }
            if let (Some(junction), Some(b)) = (contig.junction_b, b.as_mut()) {
                b.locus.position = junction.position;
            }
        }
        let sv_type = self.rule.infer(&a, b.as_ref());
        let length = match sv_type {
            SvType::Deletion | SvType::Duplication | SvType::Inversion => {
                b.as_ref().and_then(|b| a.locus.distance(&b.locus))
            }
            SvType::Insertion => consensus.as_ref().and_then(inserted_length),
            SvType::Translocation | SvType::Breakend => None,
        };
        let mut evidence = EvidenceTally::default();
        cluster.signals.iter().for_each(|s| evidence.add(s.kind));
        let support = cluster.reads().len();
        let mapq_sum: u64 = cluster.signals.iter().map(|s| s.mapq as u64).sum();
        let mean_mapq = match cluster.signals.len() {
            0 => 0f64,
            n => mapq_sum as f64 / n as f64,
        };
        let interval_width = cluster
            .side_b
            .iter()
            .map(|s| s.width())
            .fold(cluster.side_a.width(), |x, y| x.max(y));
        let b = b.unwrap_or_else(|| a.clone());
        let mut call = CandidateCall {
            sv_type,
            locus_a: a.locus,
            anchor_a: a.anchor,
            locus_b: b.locus,
            anchor_b: b.anchor,
            length,
            support,
            evidence,
            interval_width,
            mean_mapq,
            consensus,
        };
        call.canonicalize();
        trace!(
            "CALL\t{}\t{}\t{}\t{}\t{}",
            cluster.id,
            call.sv_type,
            call.locus_a,
            call.locus_b,
            call.support
        );
        call
    }
}

/// The contig bases between the left-anchored and the right-anchored junction.
fn inserted_length(contig: &ConsensusContig) -> Option<u64> {
    let (ja, jb) = (contig.junction_a?, contig.junction_b?);
    let (start, end) = match ja.position <= jb.position {
        true => (ja.offset, jb.offset),
        false => (jb.offset, ja.offset),
    };
    (start < end).then(|| (end - start) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SideInterval;
    fn side(chrom: &str, start: u64, end: u64, anchor: Anchor) -> SideInterval {
        SideInterval {
            chrom: chrom.to_string(),
            start,
            end,
            position: (start + end) / 2,
            anchor,
        }
    }
    fn cluster(side_a: SideInterval, side_b: Option<SideInterval>, reads: usize) -> Cluster {
        let first = side_a.breakend();
        let second = side_b.as_ref().map(|s| s.breakend());
        let kind = match second.is_some() {
            true => SignalKind::SplitRead,
            false => SignalKind::SoftClip,
        };
        let mut signals: Vec<_> = (0..reads)
            .map(|i| AlignmentSignal::new(kind, first.clone(), second.clone(), &format!("r{i}"), 50, None))
            .collect();
        // The other mate of the first read.
        signals.push(AlignmentSignal::new(
            SignalKind::DiscordantPair,
            first.clone(),
            second.clone(),
            "r0",
            30,
            None,
        ));
        Cluster {
            id: 0,
            hint: SvType::Breakend,
            side_a,
            side_b,
            support: reads,
            paired: true,
            signals,
        }
    }
    #[test]
    fn infer_types() {
        let rule = TypeRule::new(&CallerConfig::default());
        let be = |chrom: &str, pos: u64, anchor: Anchor| Breakend::new(chrom, pos, anchor);
        let a = be("chr1", 1000, Anchor::Left);
        assert_eq!(rule.infer(&a, Some(&be("chr1", 2000, Anchor::Right))), SvType::Deletion);
        assert_eq!(
            rule.infer(&be("chr1", 1000, Anchor::Right), Some(&be("chr1", 2000, Anchor::Left))),
            SvType::Duplication
        );
        assert_eq!(rule.infer(&a, Some(&be("chr1", 2000, Anchor::Left))), SvType::Inversion);
        assert_eq!(
            rule.infer(&be("chr1", 2000, Anchor::Right), Some(&be("chr1", 1000, Anchor::Right))),
            SvType::Inversion
        );
        assert_eq!(rule.infer(&a, Some(&be("chr2", 10, Anchor::Right))), SvType::Translocation);
        assert_eq!(rule.infer(&a, Some(&be("chr1", 1005, Anchor::Right))), SvType::Insertion);
        assert_eq!(
            rule.infer(&a, Some(&be("chr1", 50_000_000, Anchor::Right))),
            SvType::Breakend
        );
        assert_eq!(rule.infer(&a, None), SvType::Breakend);
        // The order of the arguments does not matter.
        assert_eq!(
            rule.infer(&be("chr1", 2000, Anchor::Right), Some(&a)),
            SvType::Deletion
        );
    }
    #[test]
    fn deletion_without_consensus() {
        let cluster = cluster(
            side("chr1", 990, 1010, Anchor::Left),
            Some(side("chr1", 1995, 2005, Anchor::Right)),
            8,
        );
        let call = CallSynthesizer::new(&CallerConfig::default()).synthesize(&cluster, None);
        assert_eq!(call.sv_type, SvType::Deletion);
        assert_eq!(call.locus_a, Locus::new("chr1", 1000));
        assert_eq!(call.locus_b, Locus::new("chr1", 2000));
        assert_eq!(call.length, Some(1000));
        assert_eq!(call.support, 8);
        assert_eq!(call.evidence.split, 8);
        assert_eq!(call.evidence.discordant, 1);
        assert_eq!(call.interval_width, 20);
        assert!((call.mean_mapq - (8f64 * 50f64 + 30f64) / 9f64).abs() < 1e-9);
        assert!(call.consensus.is_none());
    }
    #[test]
    fn consensus_refines_loci() {
        let cluster = cluster(
            side("chr1", 990, 1010, Anchor::Left),
            Some(side("chr1", 1995, 2005, Anchor::Right)),
            4,
        );
        let contig = ConsensusContig {
            seq: "ACGT".repeat(20),
            fragments: 4,
            identity: 0.99,
            junction_a: Some(ContigJunction {
                offset: 40,
                position: 1003,
            }),
            junction_b: Some(ContigJunction {
                offset: 40,
                position: 2003,
            }),
        };
        let call = CallSynthesizer::new(&CallerConfig::default()).synthesize(&cluster, Some(contig));
        assert_eq!(call.locus_a.position, 1003);
        assert_eq!(call.locus_b.position, 2003);
        assert_eq!(call.length, Some(1000));
        assert!(call.consensus.is_some());
    }
    #[test]
    fn insertion_length_from_contig() {
        let cluster = cluster(
            side("chr1", 1000, 1000, Anchor::Left),
            Some(side("chr1", 1002, 1002, Anchor::Right)),
            3,
        );
        let contig = ConsensusContig {
            seq: "A".repeat(200),
            fragments: 5,
            identity: 1f64,
            junction_a: Some(ContigJunction {
                offset: 40,
                position: 1000,
            }),
            junction_b: Some(ContigJunction {
                offset: 160,
                position: 1002,
            }),
        };
        let synth = CallSynthesizer::new(&CallerConfig::default());
        let call = synth.synthesize(&cluster, Some(contig));
        assert_eq!(call.sv_type, SvType::Insertion);
        assert_eq!(call.length, Some(120));
        assert_eq!(synth.synthesize(&cluster, None).length, None);
    }
    #[test]
    fn single_side_and_canonical_order() {
        let single = cluster(side("chr3", 500, 500, Anchor::Right), None, 3);
        let call = CallSynthesizer::new(&CallerConfig::default()).synthesize(&single, None);
        assert_eq!(call.sv_type, SvType::Breakend);
        assert_eq!(call.locus_a, call.locus_b);
        assert_eq!(call.length, None);
        let cluster = cluster(
            side("chr2", 100, 100, Anchor::Left),
            Some(side("chr10", 900, 900, Anchor::Right)),
            3,
        );
        let call = CallSynthesizer::new(&CallerConfig::default()).synthesize(&cluster, None);
        assert_eq!(call.sv_type, SvType::Translocation);
        assert!(call.is_canonical());
        assert_eq!(call.locus_a.chrom, "chr10");
        assert_eq!(call.anchor_a, Anchor::Right);
        assert_eq!(call.length, None);
    }
}
