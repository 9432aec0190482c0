//! Cluster extraction -- partition the evidence graph into breakpoint clusters.
//!
//! 1. Take connected components of the graph.
//! 2. Discard components whose support is below the floor.
//! 3. Split each component into sub-groups of mutually consistent breakpoint geometry.
//!    Nodes are visited in an order defined by their contents (weight, then breakends),
//!    so the partition does not depend on node indices.
//! 4. Discard sub-groups below the floor, and turn the others into [Cluster]s.
//!
//! Every node, and hence every signal, ends up in at most one cluster.
use crate::call::TypeRule;
use crate::config::CallerConfig;
use crate::evidence_graph::{EvidenceGraph, GraphNode};
use crate::find_union::FindUnion;
use definitions::*;
use std::collections::BTreeSet;

/// The approximate extent of one side of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideInterval {
    pub chrom: String,
    pub start: u64,
    /// Inclusive.
    pub end: u64,
    /// Weighted median of the breakends.
    pub position: u64,
    pub anchor: Anchor,
}

impl SideInterval {
    pub fn width(&self) -> u64 {
        self.end - self.start
    }
    pub fn breakend(&self) -> Breakend {
        Breakend::new(&self.chrom, self.position, self.anchor)
    }
    pub fn contains(&self, breakend: &Breakend, slack: u64) -> bool {
        breakend.locus.chrom == self.chrom
            && breakend.anchor == self.anchor
            && self.start.saturating_sub(slack) <= breakend.locus.position
            && breakend.locus.position <= self.end + slack
    }
    fn from_points(points: &[(&Breakend, usize)]) -> Option<Self> {
        let (head, _) = points.first()?;
        let start = points.iter().map(|(b, _)| b.locus.position).min()?;
        let end = points.iter().map(|(b, _)| b.locus.position).max()?;
        let mut weighted: Vec<(u64, usize)> =
            points.iter().map(|(b, w)| (b.locus.position, *w)).collect();
        weighted.sort_unstable();
        let total: usize = weighted.iter().map(|x| x.1).sum();
        let mut acc = 0;
        let position = weighted
            .iter()
            .find(|(_, w)| {
                acc += w;
                total <= 2 * acc
            })
            .map(|x| x.0)
            .unwrap_or(start);
        Some(Self {
            chrom: head.locus.chrom.clone(),
            start,
            end,
            position,
            anchor: head.anchor,
        })
    }
}

/// A set of signals judged to represent one breakpoint event.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: usize,
    pub hint: SvType,
    pub side_a: SideInterval,
    pub side_b: Option<SideInterval>,
    /// The number of distinct reads.
    pub support: usize,
    /// True if any paired/split evidence is in the cluster.
    pub paired: bool,
    pub signals: Vec<AlignmentSignal>,
}

impl Cluster {
    pub fn reads(&self) -> BTreeSet<&str> {
        self.signals.iter().map(|s| s.read_name.as_str()).collect()
    }
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.signals.iter().filter_map(|s| s.fragment.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterOutcome {
    pub clusters: Vec<Cluster>,
    /// Signals in groups below the support floor.
    pub discarded_signals: usize,
    pub discarded_groups: usize,
}

#[derive(Debug, Clone)]
struct Group {
    seed_first: Breakend,
    seed_second: Option<Breakend>,
    seed_kind: SignalKind,
    members: Vec<usize>,
    weight: usize,
}

impl Group {
    fn new(node: &GraphNode, idx: usize) -> Self {
        Self {
            seed_first: node.first.clone(),
            seed_second: node.second.clone(),
            seed_kind: node.kind,
            members: vec![idx],
            weight: node.weight(),
        }
    }
    fn push(&mut self, node: &GraphNode, idx: usize) {
        self.members.push(idx);
        self.weight += node.weight();
    }
    /// Distance from `node` to the seed, if the node fits the geometry of this group.
    fn distance(&self, node: &GraphNode, sep: u64) -> Option<u64> {
        let dist = |x: &Breakend, y: &Breakend| {
            x.is_near(y, sep)
                .then(|| x.locus.position.abs_diff(y.locus.position))
        };
        match (self.seed_second.as_ref(), node.second.as_ref()) {
            (Some(seed_second), Some(second)) => {
                let d1 = dist(&self.seed_first, &node.first)?;
                let d2 = dist(seed_second, second)?;
                Some(d1.max(d2))
            }
            (Some(seed_second), None) => {
                let d1 = dist(&self.seed_first, &node.first);
                let d2 = dist(seed_second, &node.first);
                d1.into_iter().chain(d2).min()
            }
            // Paired nodes always seed their own groups before clips come in.
            (None, Some(_)) => None,
            (None, None) => {
                let d = self.seed_first.locus.distance(&node.first.locus)?;
                (d <= sep).then_some(d)
            }
        }
    }
}

pub struct ClusterExtractor<'a> {
    config: &'a CallerConfig,
    discordant_slop: u64,
    rule: TypeRule,
}

impl<'a> ClusterExtractor<'a> {
    pub fn new(config: &'a CallerConfig, discordant_slop: u64) -> Self {
        let discordant_slop = config.discordant_slop.unwrap_or(discordant_slop);
        Self {
            config,
            discordant_slop,
            rule: TypeRule::new(config),
        }
    }
    fn separation(&self, x: SignalKind, y: SignalKind) -> u64 {
        let sep = self.config.max_evidence_separation;
        match (x, y) {
            (SignalKind::DiscordantPair, _) | (_, SignalKind::DiscordantPair) => {
                sep + self.discordant_slop
            }
            (SignalKind::SplitRead | SignalKind::SoftClip, _) => sep,
        }
    }
    pub fn extract(&self, graph: EvidenceGraph) -> ClusterOutcome {
        let min_support = self.config.min_cluster_support;
        let mut fu = FindUnion::new(graph.nodes().len());
        for edge in graph.edges() {
            fu.unite(edge.from, edge.to);
        }
        let components = fu.components();
        let mut outcome = ClusterOutcome::default();
        let mut groups: Vec<Vec<usize>> = vec![];
        for component in components {
            if support_of(graph.nodes(), &component) < min_support {
                outcome.discarded_groups += 1;
                outcome.discarded_signals += signals_of(graph.nodes(), &component);
                continue;
            }
            for group in self.split_component(graph.nodes(), &component) {
                if support_of(graph.nodes(), &group) < min_support {
                    outcome.discarded_groups += 1;
                    outcome.discarded_signals += signals_of(graph.nodes(), &group);
                } else {
                    groups.push(group);
                }
            }
        }
        let mut nodes: Vec<Option<GraphNode>> = graph.into_nodes().into_iter().map(Some).collect();
        let mut clusters: Vec<Cluster> = groups
            .iter()
            .filter_map(|group| {
                let members: Vec<GraphNode> =
                    group.iter().filter_map(|&i| nodes[i].take()).collect();
                self.to_cluster(members)
            })
            .collect();
        clusters.sort_by(|x, y| {
            let x_key = (x.side_a.breakend(), x.side_b.as_ref().map(|s| s.breakend()));
            let y_key = (y.side_a.breakend(), y.side_b.as_ref().map(|s| s.breakend()));
            x_key.cmp(&y_key).then(y.support.cmp(&x.support))
        });
        clusters.iter_mut().enumerate().for_each(|(i, c)| c.id = i);
        debug!(
            "CLUSTER\tKept\t{}\tDiscarded\t{}\t{}",
            clusters.len(),
            outcome.discarded_groups,
            outcome.discarded_signals
        );
        outcome.clusters = clusters;
        outcome
    }
    /// Split a component into geometrically consistent sub-groups.
    /// A node joins the nearest compatible group; ties go to the heavier group, then the older one.
    pub fn split_component(&self, nodes: &[GraphNode], component: &[usize]) -> Vec<Vec<usize>> {
        let mut order = component.to_vec();
        order.sort_by(|&i, &j| {
            let (x, y) = (&nodes[i], &nodes[j]);
            let x_paired = x.second.is_some();
            let y_paired = y.second.is_some();
            y_paired
                .cmp(&x_paired)
                .then(y.weight().cmp(&x.weight()))
                .then(x.first.cmp(&y.first))
                .then(x.second.cmp(&y.second))
                .then(x.kind.cmp(&y.kind))
        });
        let mut groups: Vec<Group> = vec![];
        for idx in order {
            let node = &nodes[idx];
            let best = groups
                .iter()
                .enumerate()
                .filter_map(|(g, group)| {
                    let sep = self.separation(group.seed_kind, node.kind);
                    group.distance(node, sep).map(|d| (g, d, group.weight))
                })
                .min_by(|x, y| x.1.cmp(&y.1).then(y.2.cmp(&x.2)).then(x.0.cmp(&y.0)));
            match best {
                Some((g, _, _)) => groups[g].push(node, idx),
                None => groups.push(Group::new(node, idx)),
            }
        }
        if 1 < groups.len() {
            debug!("SPLIT\t{}\t{}", component.len(), groups.len());
        }
        groups
            .into_iter()
            .map(|mut g| {
                g.members.sort_unstable();
                g.members
            })
            .collect()
    }
    fn to_cluster(&self, members: Vec<GraphNode>) -> Option<Cluster> {
        let paired = members.iter().any(|n| n.second.is_some());
        let (side_a, side_b) = match paired {
            true => self.paired_sides(&members)?,
            false => clip_sides(&members)?,
        };
        let hint = self
            .rule
            .infer(&side_a.breakend(), side_b.as_ref().map(|s| s.breakend()).as_ref());
        let signals: Vec<AlignmentSignal> = members.into_iter().flat_map(|n| n.signals).collect();
        let support = signals
            .iter()
            .map(|s| s.read_name.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        Some(Cluster {
            id: 0,
            hint,
            side_a,
            side_b,
            support,
            paired,
            signals,
        })
    }
    fn paired_sides(&self, members: &[GraphNode]) -> Option<(SideInterval, Option<SideInterval>)> {
        let seed = members
            .iter()
            .filter(|n| n.second.is_some())
            .max_by(|x, y| x.weight().cmp(&y.weight()).then(y.first.cmp(&x.first)))?;
        let seed_second = seed.second.as_ref()?;
        let (mut first, mut second) = (vec![], vec![]);
        for node in members {
            match node.second.as_ref() {
                Some(other) => {
                    first.push((&node.first, node.weight()));
                    second.push((other, node.weight()));
                }
                None => {
                    let sep = self.separation(seed.kind, node.kind);
                    let to_first = seed.first.is_near(&node.first, sep);
                    let to_second = seed_second.is_near(&node.first, sep);
                    let d1 = seed.first.locus.distance(&node.first.locus);
                    let d2 = seed_second.locus.distance(&node.first.locus);
                    match (to_first, to_second) {
                        (true, true) if d2 < d1 => second.push((&node.first, node.weight())),
                        (true, _) => first.push((&node.first, node.weight())),
                        (false, true) => second.push((&node.first, node.weight())),
                        (false, false) => {}
                    }
                }
            }
        }
        let side_a = SideInterval::from_points(&first)?;
        let side_b = SideInterval::from_points(&second);
        Some((side_a, side_b))
    }
}

/// Clip-only groups: left-anchored clips on one side, right-anchored ones on the other.
fn clip_sides(members: &[GraphNode]) -> Option<(SideInterval, Option<SideInterval>)> {
    let points = |anchor: Anchor| -> Vec<(&Breakend, usize)> {
        members
            .iter()
            .filter(|n| n.first.anchor == anchor)
            .map(|n| (&n.first, n.weight()))
            .collect()
    };
    let left = SideInterval::from_points(&points(Anchor::Left));
    let right = SideInterval::from_points(&points(Anchor::Right));
    match (left, right) {
        (Some(left), right) => Some((left, right)),
        (None, Some(right)) => Some((right, None)),
        (None, None) => None,
    }
}

fn support_of(nodes: &[GraphNode], members: &[usize]) -> usize {
    members
        .iter()
        .flat_map(|&i| nodes[i].reads().iter())
        .collect::<BTreeSet<_>>()
        .len()
}

fn signals_of(nodes: &[GraphNode], members: &[usize]) -> usize {
    members.iter().map(|&i| nodes[i].signals.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence_graph::tests::{clip, paired};
    use crate::evidence_graph::GraphBuilder;
    fn config() -> CallerConfig {
        CallerConfig {
            max_evidence_separation: 100,
            min_cluster_support: 3,
            ..Default::default()
        }
    }
    fn deletion_reads(n: usize, prefix: &str) -> Vec<AlignmentSignal> {
        (0..n as u64)
            .map(|i| {
                let name = format!("{prefix}{i}");
                paired(SignalKind::SplitRead, &name, (1000 + i, Anchor::Left), (2000 + i, Anchor::Right))
            })
            .collect()
    }
    #[test]
    fn singleton_below_floor_is_discarded() {
        let config = config();
        let graph = GraphBuilder::new(&config, 0).build(vec![clip("c1", 1000, Anchor::Left)]);
        let outcome = ClusterExtractor::new(&config, 0).extract(graph);
        assert!(outcome.clusters.is_empty());
        assert_eq!(outcome.discarded_signals, 1);
    }
    #[test]
    fn heavy_singleton_is_kept() {
        let config = config();
        let signals: Vec<_> = (0..4)
            .map(|i| paired(SignalKind::SplitRead, &format!("r{i}"), (1000, Anchor::Left), (5000, Anchor::Right)))
            .collect();
        let graph = GraphBuilder::new(&config, 0).build(signals);
        assert_eq!(graph.nodes().len(), 1);
        let outcome = ClusterExtractor::new(&config, 0).extract(graph);
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].support, 4);
        assert_eq!(outcome.clusters[0].hint, SvType::Deletion);
    }
    #[test]
    fn deletion_cluster() {
        let config = config();
        let graph = GraphBuilder::new(&config, 0).build(deletion_reads(6, "r"));
        let outcome = ClusterExtractor::new(&config, 0).extract(graph);
        assert_eq!(outcome.clusters.len(), 1);
        let cluster = &outcome.clusters[0];
        assert_eq!(cluster.support, 6);
        assert_eq!(cluster.side_a.start, 1000);
        assert_eq!(cluster.side_a.end, 1005);
        assert_eq!(cluster.side_b.as_ref().unwrap().start, 2000);
        assert!((1002..=1003).contains(&cluster.side_a.position));
        assert_eq!(cluster.signals.len(), 6);
    }
    #[test]
    fn incompatible_orientations_are_split() {
        let config = config();
        let mut signals = deletion_reads(4, "d");
        signals.extend((0..4u64).map(|i| {
            let name = format!("v{i}");
            paired(SignalKind::SplitRead, &name, (1000 + i, Anchor::Left), (2000 + i, Anchor::Left))
        }));
        // The clip bridges both bands into one component.
        signals.push(clip("c", 1001, Anchor::Left));
        let graph = GraphBuilder::new(&config, 0).build(signals);
        let mut fu = FindUnion::new(graph.nodes().len());
        graph.edges().iter().for_each(|e| {
            fu.unite(e.from, e.to);
        });
        assert_eq!(fu.components().len(), 1);
        let outcome = ClusterExtractor::new(&config, 0).extract(graph);
        assert_eq!(outcome.clusters.len(), 2);
        let types: Vec<_> = outcome.clusters.iter().map(|c| c.hint).collect();
        assert!(types.contains(&SvType::Deletion));
        assert!(types.contains(&SvType::Inversion));
        let total: usize = outcome.clusters.iter().map(|c| c.signals.len()).sum();
        assert_eq!(total, 9);
    }
    #[test]
    fn partition_is_order_independent() {
        let config = config();
        let mut signals = deletion_reads(5, "d");
        signals.extend(deletion_reads(5, "e").into_iter().map(|mut s| {
            s.first.locus.position += 60;
            s.second.as_mut().unwrap().locus.position += 60;
            s
        }));
        signals.push(clip("c", 1030, Anchor::Left));
        let forward = GraphBuilder::new(&config, 0).build(signals.clone());
        signals.reverse();
        let backward = GraphBuilder::new(&config, 0).build(signals);
        let summarize = |outcome: ClusterOutcome| -> Vec<Vec<String>> {
            outcome
                .clusters
                .iter()
                .map(|c| {
                    let mut names: Vec<_> = c.signals.iter().map(|s| s.read_name.clone()).collect();
                    names.sort();
                    names
                })
                .collect()
        };
        let extractor = ClusterExtractor::new(&config, 0);
        assert_eq!(
            summarize(extractor.extract(forward)),
            summarize(extractor.extract(backward))
        );
    }
    #[test]
    fn equidistant_node_goes_to_heavier_group() {
        let config = config();
        let mut signals: Vec<_> = (0..3)
            .map(|i| paired(SignalKind::SplitRead, &format!("a{i}"), (1000, Anchor::Left), (2000, Anchor::Right)))
            .collect();
        signals.extend(
            (0..5).map(|i| paired(SignalKind::SplitRead, &format!("b{i}"), (1000, Anchor::Left), (2000, Anchor::Left))),
        );
        signals.push(clip("c", 1000, Anchor::Left));
        let graph = GraphBuilder::new(&config, 0).build(signals);
        let outcome = ClusterExtractor::new(&config, 0).extract(graph);
        let heavy = outcome
            .clusters
            .iter()
            .find(|c| c.hint == SvType::Inversion)
            .unwrap();
        assert!(heavy.signals.iter().any(|s| s.read_name == "c"));
        assert_eq!(heavy.support, 6);
    }
    #[test]
    fn clip_only_insertion() {
        let config = config();
        let mut signals: Vec<_> = (0..3).map(|i| clip(&format!("l{i}"), 1000, Anchor::Left)).collect();
        signals.extend((0..3).map(|i| clip(&format!("r{i}"), 1002, Anchor::Right)));
        let graph = GraphBuilder::new(&config, 0).build(signals);
        let outcome = ClusterExtractor::new(&config, 0).extract(graph);
        assert_eq!(outcome.clusters.len(), 1);
        let cluster = &outcome.clusters[0];
        assert_eq!(cluster.hint, SvType::Insertion);
        assert!(!cluster.paired);
        assert_eq!(cluster.side_a.anchor, Anchor::Left);
        assert_eq!(cluster.side_b.as_ref().unwrap().position, 1002);
    }
}
