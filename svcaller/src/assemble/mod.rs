//! Local consensus assembly of the fragments of a cluster.
//!
//! The highest-weight fragment seeds a contig, which is then extended greedily by the best
//! overlapping fragment, in either orientation, for at most `max_extension_steps` steps.
//! The layout is polished by a column vote and the junctions of the fragments are mapped
//! back onto the contig.
//! Failure to assemble is a normal outcome, reported as [AssemblyOutcome::Insufficient].
pub mod overlap;
pub mod pileup;
use crate::cluster::Cluster;
use crate::config::CallerConfig;
use crate::seq::revcmp;
use definitions::*;
use overlap::{KmerIndex, Overlap, OverlapConfig};
use pileup::Pileup;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoroshiro128PlusPlus;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insufficient {
    TooFewFragments { found: usize, required: usize },
    NoOverlap,
}

impl std::fmt::Display for Insufficient {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Insufficient::TooFewFragments { found, required } => {
                write!(f, "TooFewFragments\t{}\t{}", found, required)
            }
            Insufficient::NoOverlap => write!(f, "NoOverlap"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyOutcome {
    Contig(ConsensusContig),
    Insufficient(Insufficient),
}

impl AssemblyOutcome {
    pub fn contig(self) -> Option<ConsensusContig> {
        match self {
            AssemblyOutcome::Contig(contig) => Some(contig),
            AssemblyOutcome::Insufficient(_) => None,
        }
    }
    pub fn is_contig(&self) -> bool {
        matches!(self, AssemblyOutcome::Contig(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    fragment: usize,
    offset: usize,
    reversed: bool,
    identity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct LocalAssembler<'a> {
    config: &'a CallerConfig,
    overlap: OverlapConfig,
}

impl<'a> LocalAssembler<'a> {
    pub fn new(config: &'a CallerConfig) -> Self {
        Self {
            config,
            overlap: OverlapConfig::new(config),
        }
    }
    pub fn assemble(&self, cluster: &Cluster) -> AssemblyOutcome {
        let fragments = self.pick_fragments(cluster);
        let required = self.config.min_assembly_fragments.max(2);
        if fragments.len() < required {
            return AssemblyOutcome::Insufficient(Insufficient::TooFewFragments {
                found: fragments.len(),
                required,
            });
        }
        let (contig, placements) = self.layout(&fragments);
        if placements.len() < 2 {
            debug!("ASSEMBLY\t{}\tNoOverlap\t{}", cluster.id, fragments.len());
            return AssemblyOutcome::Insufficient(Insufficient::NoOverlap);
        }
        let oriented = |p: &Placement| -> Vec<u8> {
            let seq = fragments[p.fragment].seq();
            match p.reversed {
                true => revcmp(seq),
                false => seq.to_vec(),
            }
        };
        let mut pileup = Pileup::new(contig.len());
        for placement in placements.iter() {
            pileup.add(placement.offset, &oriented(placement));
        }
        let polished = pileup.polish(&contig);
        let identities: Vec<f64> = placements.iter().filter_map(|p| p.identity).collect();
        let identity = identities.iter().sum::<f64>() / identities.len() as f64;
        let slack = self.config.max_evidence_separation;
        let (mut side_a, mut side_b) = (vec![], vec![]);
        for placement in placements.iter() {
            let fragment = fragments[placement.fragment];
            let junction = match placement.reversed {
                true => fragment.seq.len().saturating_sub(fragment.junction),
                false => fragment.junction,
            };
            let point = (placement.offset + junction, fragment.breakend.locus.position);
            if cluster.side_a.contains(&fragment.breakend, slack) {
                side_a.push(point);
            } else if let Some(side) = cluster.side_b.as_ref() {
                if side.contains(&fragment.breakend, slack) {
                    side_b.push(point);
                }
            }
        }
        let seq = String::from_utf8_lossy(&polished).to_string();
        debug!(
            "ASSEMBLY\t{}\tContig\t{}\t{}\t{}\t{:.3}",
            cluster.id,
            fragments.len(),
            placements.len(),
            seq.len(),
            identity
        );
        AssemblyOutcome::Contig(ConsensusContig {
            seq,
            fragments: placements.len(),
            identity,
            junction_a: junction_of(&side_a),
            junction_b: junction_of(&side_b),
        })
    }
    /// Fragments sorted by priority, the seed first, capped by `max_assembly_fragments`.
    fn pick_fragments<'b>(&self, cluster: &'b Cluster) -> Vec<&'b Fragment> {
        let mut weights: HashMap<&Breakend, usize> = HashMap::new();
        for fragment in cluster.fragments() {
            *weights.entry(&fragment.breakend).or_default() += 1;
        }
        let mut fragments: Vec<_> = cluster.fragments().filter(|f| !f.seq.is_empty()).collect();
        fragments.sort_by(|x, y| {
            let (wx, wy) = (weights[&x.breakend], weights[&y.breakend]);
            wy.cmp(&wx)
                .then(y.seq.len().cmp(&x.seq.len()))
                .then(x.breakend.cmp(&y.breakend))
                .then(x.seq.cmp(&y.seq))
                .then(x.junction.cmp(&y.junction))
        });
        let max = self.config.max_assembly_fragments.max(2);
        if max < fragments.len() {
            let seed = self.config.seed.wrapping_add(cluster.side_a.position);
            let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(seed);
            fragments[1..].shuffle(&mut rng);
            fragments.truncate(max);
            trace!("ASSEMBLY\t{}\tSubsampled\t{}", cluster.id, max);
        }
        fragments
    }
    /// Greedy layout. Returns the raw contig and the placements of the fragments in it.
    fn layout(&self, fragments: &[&Fragment]) -> (Vec<u8>, Vec<Placement>) {
        let mut contig = fragments[0].seq().to_vec();
        let mut placements = vec![Placement {
            fragment: 0,
            offset: 0,
            reversed: false,
            identity: None,
        }];
        let mut remaining: Vec<usize> = (1..fragments.len()).collect();
        let forward: Vec<Vec<u8>> = fragments.iter().map(|f| f.seq().to_vec()).collect();
        let reverse: Vec<Vec<u8>> = fragments.iter().map(|f| revcmp(f.seq())).collect();
        for _ in 0..self.config.max_extension_steps {
            if remaining.is_empty() {
                break;
            }
            let index = KmerIndex::new(&contig, self.overlap.kmer_size);
            let best = remaining
                .iter()
                .enumerate()
                .flat_map(|(slot, &i)| {
                    let fwd = index.overlap(&forward[i], &self.overlap).map(|o| (slot, false, o));
                    let rev = index.overlap(&reverse[i], &self.overlap).map(|o| (slot, true, o));
                    fwd.into_iter().chain(rev)
                })
                .max_by(|(s1, r1, o1), (s2, r2, o2)| {
                    compare_overlaps(o1, o2)
                        .then(r2.cmp(r1))
                        .then(s2.cmp(s1))
                });
            let (slot, reversed, ovlp) = match best {
                Some(best) => best,
                None => break,
            };
            let fragment = remaining.remove(slot);
            let query = match reversed {
                true => &reverse[fragment],
                false => &forward[fragment],
            };
            let offset = match ovlp.diagonal < 0 {
                true => {
                    let head = ovlp.diagonal.unsigned_abs();
                    let mut extended = query[..head].to_vec();
                    extended.extend_from_slice(&contig);
                    contig = extended;
                    placements.iter_mut().for_each(|p| p.offset += head);
                    0
                }
                false => ovlp.diagonal as usize,
            };
            if contig.len() < offset + query.len() {
                let tail = contig.len() - offset;
                contig.extend_from_slice(&query[tail..]);
            }
            placements.push(Placement {
                fragment,
                offset,
                reversed,
                identity: Some(ovlp.identity),
            });
        }
        (contig, placements)
    }
}

fn compare_overlaps(x: &Overlap, y: &Overlap) -> std::cmp::Ordering {
    x.matches()
        .cmp(&y.matches())
        .then(x.identity.total_cmp(&y.identity))
}

/// The most frequent contig offset and reference position among the fragments of one side.
fn junction_of(points: &[(usize, u64)]) -> Option<ContigJunction> {
    let offset = mode(points.iter().map(|x| x.0))?;
    let position = mode(points.iter().map(|x| x.1))?;
    Some(ContigJunction { offset, position })
}

/// Ties go to the smaller value.
fn mode<T: Ord + Copy + std::hash::Hash, I: Iterator<Item = T>>(xs: I) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    for x in xs {
        *counts.entry(x).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(x, c1), (y, c2)| c1.cmp(c2).then(y.cmp(x)))
        .map(|x| x.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SideInterval;
    use kiley::gen_seq::generate_seq;
    fn side(position: u64, anchor: Anchor) -> SideInterval {
        SideInterval {
            chrom: "chr1".to_string(),
            start: position,
            end: position,
            position,
            anchor,
        }
    }
    fn signal(name: &str, seq: &[u8], junction: usize, breakend: Breakend) -> AlignmentSignal {
        let fragment = Fragment {
            seq: String::from_utf8_lossy(seq).to_string(),
            junction,
            breakend: breakend.clone(),
        };
        AlignmentSignal::new(SignalKind::SoftClip, breakend, None, name, 60, Some(fragment))
    }
    fn cluster(signals: Vec<AlignmentSignal>) -> Cluster {
        Cluster {
            id: 0,
            hint: SvType::Deletion,
            side_a: side(1000, Anchor::Left),
            side_b: Some(side(2000, Anchor::Right)),
            support: signals.len(),
            paired: true,
            signals,
        }
    }
    fn template(seed: u64) -> Vec<u8> {
        let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(seed);
        generate_seq(&mut rng, 300)
    }
    #[test]
    fn assemble_both_orientations() {
        let template = template(3480);
        let a = Breakend::new("chr1", 1000, Anchor::Left);
        let b = Breakend::new("chr1", 2000, Anchor::Right);
        let mut seed_seq = template[0..150].to_vec();
        seed_seq[100] = match seed_seq[100] {
            b'A' => b'G',
            _ => b'A',
        };
        let signals = vec![
            signal("r0", &seed_seq, 120, a.clone()),
            signal("r1", &template[50..170], 70, a.clone()),
            signal("r2", &template[100..220], 100, b.clone()),
            signal("r3", &revcmp(&template[160..280]), 80, b.clone()),
        ];
        let config = CallerConfig::default();
        let contig = LocalAssembler::new(&config)
            .assemble(&cluster(signals))
            .contig()
            .unwrap();
        assert_eq!(contig.seq.as_bytes(), &template[0..280]);
        assert_eq!(contig.fragments, 4);
        assert!(0.98 < contig.identity);
        let junction_a = contig.junction_a.unwrap();
        assert_eq!(junction_a.offset, 120);
        assert_eq!(junction_a.position, 1000);
        let junction_b = contig.junction_b.unwrap();
        assert_eq!(junction_b.offset, 200);
        assert_eq!(junction_b.position, 2000);
    }
    #[test]
    fn too_few_fragments() {
        let template = template(1);
        let a = Breakend::new("chr1", 1000, Anchor::Left);
        let signals = vec![
            signal("r0", &template[0..150], 100, a.clone()),
            signal("r1", &template[50..200], 50, a.clone()),
        ];
        let config = CallerConfig::default();
        let outcome = LocalAssembler::new(&config).assemble(&cluster(signals));
        assert_eq!(
            outcome,
            AssemblyOutcome::Insufficient(Insufficient::TooFewFragments {
                found: 2,
                required: 3
            })
        );
        let signals = vec![AlignmentSignal::new(
            SignalKind::DiscordantPair,
            a.clone(),
            Some(Breakend::new("chr1", 2000, Anchor::Right)),
            "r",
            60,
            None,
        )];
        assert!(!LocalAssembler::new(&config)
            .assemble(&cluster(signals))
            .is_contig());
    }
    #[test]
    fn no_overlap() {
        let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(10);
        let a = Breakend::new("chr1", 1000, Anchor::Left);
        let signals: Vec<_> = (0..4)
            .map(|i| signal(&format!("r{i}"), &generate_seq(&mut rng, 100), 50, a.clone()))
            .collect();
        let config = CallerConfig::default();
        let outcome = LocalAssembler::new(&config).assemble(&cluster(signals));
        assert_eq!(outcome, AssemblyOutcome::Insufficient(Insufficient::NoOverlap));
    }
    #[test]
    fn capped_assembly_is_deterministic() {
        let template = template(92);
        let a = Breakend::new("chr1", 1000, Anchor::Left);
        let signals: Vec<_> = (0..10)
            .map(|i| {
                let start = i * 15;
                signal(&format!("r{i}"), &template[start..start + 120], 50, a.clone())
            })
            .collect();
        let config = CallerConfig {
            max_assembly_fragments: 4,
            ..Default::default()
        };
        let assembler = LocalAssembler::new(&config);
        let first = assembler.assemble(&cluster(signals.clone()));
        let second = assembler.assemble(&cluster(signals));
        assert_eq!(first, second);
        if let AssemblyOutcome::Contig(contig) = first {
            assert!(contig.fragments <= 4);
        }
    }
}
