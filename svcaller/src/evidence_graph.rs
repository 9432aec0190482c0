//! Evidence graph -- a weighted undirected graph over the signals of a region.
//!
//! Nodes are groups of signals with identical kind and breakends, and their weight is the number of distinct reads in them.
//! Two nodes are linked when they likely describe the same breakpoint:
//! their breakends lie within the separation bound, point to the same direction, and,
//! for paired/split evidence, their partner breakends agree as well.
//! Nodes and edges live in flat arrays and refer to each other by index.
use crate::config::CallerConfig;
use definitions::*;
use std::collections::{BTreeSet, HashMap, HashSet};

// The neighbor search examines at most this many times `max_neighbors` candidates per node.
const SCAN_FACTOR: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    kind: SignalKind,
    first: Breakend,
    second: Option<Breakend>,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub kind: SignalKind,
    pub first: Breakend,
    pub second: Option<Breakend>,
    pub signals: Vec<AlignmentSignal>,
    reads: BTreeSet<String>,
}

impl GraphNode {
    fn new(signal: AlignmentSignal) -> Self {
        let mut reads = BTreeSet::new();
        reads.insert(signal.read_name.clone());
        Self {
            kind: signal.kind,
            first: signal.first.clone(),
            second: signal.second.clone(),
            signals: vec![signal],
            reads,
        }
    }
    fn merge(&mut self, signal: AlignmentSignal) {
        self.reads.insert(signal.read_name.clone());
        self.signals.push(signal);
    }
    /// The number of distinct reads.
    pub fn weight(&self) -> usize {
        self.reads.len()
    }
    pub fn reads(&self) -> &BTreeSet<String> {
        &self.reads
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    /// Proximity of the breakends, between 0 and 1.
    pub proximity: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EvidenceGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// node index -> edge indices.
    adjacency: Vec<Vec<usize>>,
}

impl EvidenceGraph {
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }
    /// Neighbors of `node` with the weights of the edges to them.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.adjacency[node].iter().map(move |&e| {
            let edge = &self.edges[e];
            let next = if edge.from == node { edge.to } else { edge.from };
            (next, edge.weight)
        })
    }
    pub fn signal_count(&self) -> usize {
        self.nodes.iter().map(|n| n.signals.len()).sum()
    }
    /// Hand the nodes over. Signals move out of the graph.
    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }
}

/// Streaming construction of an [EvidenceGraph].
#[derive(Debug, Clone)]
pub struct GraphBuilder<'a> {
    config: &'a CallerConfig,
    discordant_slop: u64,
    bucket_width: u64,
    nodes: Vec<GraphNode>,
    edges: Vec<(usize, usize, f64)>,
    index: HashMap<NodeKey, usize>,
    // (chrom, position / bucket_width) -> nodes having a breakend there.
    buckets: HashMap<(String, u64), Vec<usize>>,
    capped: usize,
    scanned: usize,
}

impl<'a> GraphBuilder<'a> {
    /// `discordant_slop` is added to the separation bound when a discordant pair takes part,
    /// as its breakends are only known up to the insert size.
    pub fn new(config: &'a CallerConfig, discordant_slop: u64) -> Self {
        let discordant_slop = config.discordant_slop.unwrap_or(discordant_slop);
        let bucket_width = (config.max_evidence_separation + discordant_slop).max(1);
        Self {
            config,
            discordant_slop,
            bucket_width,
            nodes: vec![],
            edges: vec![],
            index: HashMap::new(),
            buckets: HashMap::new(),
            capped: 0,
            scanned: 0,
        }
    }
    pub fn build<I: IntoIterator<Item = AlignmentSignal>>(mut self, signals: I) -> EvidenceGraph {
        signals.into_iter().for_each(|s| self.push(s));
        self.finish()
    }
    pub fn push(&mut self, signal: AlignmentSignal) {
        let key = NodeKey {
            kind: signal.kind,
            first: signal.first.clone(),
            second: signal.second.clone(),
        };
        if let Some(&idx) = self.index.get(&key) {
            self.nodes[idx].merge(signal);
            return;
        }
        let idx = self.nodes.len();
        self.nodes.push(GraphNode::new(signal));
        self.index.insert(key, idx);
        self.link(idx);
        let node = &self.nodes[idx];
        let mut slots = vec![self.bucket_of(&node.first.locus)];
        if let Some(second) = node.second.as_ref() {
            slots.push(self.bucket_of(&second.locus));
        }
        slots.dedup();
        for slot in slots {
            self.buckets.entry(slot).or_default().push(idx);
        }
    }
    fn bucket_of(&self, locus: &Locus) -> (String, u64) {
        (locus.chrom.clone(), locus.position / self.bucket_width)
    }
    fn link(&mut self, idx: usize) {
        let (edges, scanned, capped) = self.search_neighbors(idx);
        self.capped += capped as usize;
        self.scanned += scanned;
        self.edges.extend(edges);
    }
    /// Edges from `idx` to earlier nodes, the number of candidates visited, and whether the search was cut short.
    /// At most `max_neighbors * SCAN_FACTOR` candidates are visited, most recent first in each bucket.
    fn search_neighbors(&self, idx: usize) -> (Vec<(usize, usize, f64)>, usize, bool) {
        let node = &self.nodes[idx];
        let mut slots = vec![];
        let mut loci = vec![&node.first.locus];
        loci.extend(node.second.as_ref().map(|b| &b.locus));
        for locus in loci {
            let bucket = locus.position / self.bucket_width;
            for slot in bucket.saturating_sub(1)..=bucket + 1 {
                let key = (locus.chrom.clone(), slot);
                if !slots.contains(&key) {
                    slots.push(key);
                }
            }
        }
        let max_edges = self.config.max_neighbors;
        let max_scan = max_edges * SCAN_FACTOR;
        let candidates = slots
            .iter()
            .filter_map(|key| self.buckets.get(key))
            .flat_map(|members| members.iter().rev().copied());
        let mut seen = HashSet::new();
        let mut edges = vec![];
        for other in candidates {
            if !seen.contains(&other) {
                if max_edges <= edges.len() || max_scan <= seen.len() {
                    return (edges, seen.len(), true);
                }
                seen.insert(other);
                let sep = self.separation(node.kind, self.nodes[other].kind);
                if let Some(proximity) = compatibility(node, &self.nodes[other], sep) {
                    edges.push((other, idx, proximity));
                }
            }
        }
        (edges, seen.len(), false)
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
    pub fn finish(self) -> EvidenceGraph {
        let nodes = self.nodes;
        let mut adjacency = vec![vec![]; nodes.len()];
        let edges: Vec<_> = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(e, (from, to, proximity))| {
                adjacency[from].push(e);
                adjacency[to].push(e);
                let (u, v) = (&nodes[from], &nodes[to]);
                let support = u.weight().min(v.weight()) as f64;
                let shared = u.reads().intersection(v.reads()).count() as f64;
                GraphEdge {
                    from,
                    to,
                    proximity,
                    weight: proximity * support + shared,
                }
            })
            .collect();
        debug!(
            "GRAPH\tNodes\t{}\tEdges\t{}\tCapped\t{}\tScanned\t{}",
            nodes.len(),
            edges.len(),
            self.capped,
            self.scanned
        );
        EvidenceGraph {
            nodes,
            edges,
            adjacency,
        }
    }
}

fn proximity(d: u64, sep: u64) -> f64 {
    1f64 - d as f64 / (sep + 1) as f64
}

fn near(x: &Breakend, y: &Breakend, sep: u64) -> Option<u64> {
    x.is_near(y, sep).then(|| x.locus.position.abs_diff(y.locus.position))
}

/// The proximity of two nodes if they are evidence-compatible.
pub fn compatibility(x: &GraphNode, y: &GraphNode, sep: u64) -> Option<f64> {
    use SignalKind::*;
    match (x.kind, y.kind) {
        (DiscordantPair | SplitRead, DiscordantPair | SplitRead) => {
            let (x2, y2) = (x.second.as_ref()?, y.second.as_ref()?);
            let d1 = near(&x.first, &y.first, sep)?;
            let d2 = near(x2, y2, sep)?;
            Some(proximity(d1.max(d2), sep))
        }
        (DiscordantPair | SplitRead, SoftClip) => pair_and_clip(x, &y.first, sep),
        (SoftClip, DiscordantPair | SplitRead) => pair_and_clip(y, &x.first, sep),
        (SoftClip, SoftClip) => {
            // Opposite clips close to each other flank an insertion.
            let d = x.first.locus.distance(&y.first.locus)?;
            (d <= sep).then(|| proximity(d, sep))
        }
    }
}

fn pair_and_clip(pair: &GraphNode, clip: &Breakend, sep: u64) -> Option<f64> {
    let first = near(&pair.first, clip, sep);
    let second = pair.second.as_ref().and_then(|b| near(b, clip, sep));
    let d = match (first, second) {
        (Some(x), Some(y)) => x.min(y),
        (Some(x), None) | (None, Some(x)) => x,
        (None, None) => return None,
    };
    Some(proximity(d, sep))
}
