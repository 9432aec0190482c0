//! Regions, the unit of parallelism, and the record source they are fetched from.
use crate::config::CallerConfig;
use crate::error::Error;
use definitions::{AlignmentRecord, Locus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A window of a chromosome. `[start, end)` is fetched; only calls whose locus A lies in
/// `[core_start, core_end)` belong to the window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub core_start: u64,
    pub core_end: u64,
}

impl Region {
    pub fn owns(&self, locus: &Locus) -> bool {
        locus.chrom == self.chrom && self.core_start <= locus.position && locus.position < self.core_end
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Tile chromosomes into windows of `region_window_size`, padded by `region_overlap` on each side.
/// The cores of the windows partition each chromosome. The output is sorted by (chrom, start).
pub fn tile(chrom_lengths: &[(String, u64)], config: &CallerConfig) -> Vec<Region> {
    let window = config.region_window_size.max(1);
    let pad = config.region_overlap;
    let mut regions: Vec<Region> = chrom_lengths
        .iter()
        .flat_map(|(chrom, len)| {
            let len = *len;
            (0..len.div_ceil(window)).map(move |i| {
                let core_start = i * window;
                let core_end = ((i + 1) * window).min(len);
                Region {
                    chrom: chrom.clone(),
                    start: core_start.saturating_sub(pad),
                    end: (core_end + pad).min(len),
                    core_start,
                    core_end,
                }
            })
        })
        .collect();
    regions.sort();
    regions
}

/// The source of alignment records. Implementations must be shareable across workers.
pub trait RegionReader: Sync {
    /// Records overlapping the region, sorted by position.
    fn fetch(&self, region: &Region) -> Result<Vec<AlignmentRecord>, String>;
    /// Chromosome names and lengths.
    fn chrom_lengths(&self) -> Vec<(String, u64)>;
}

/// Records held in memory, grouped by chromosome and sorted by position.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: BTreeMap<String, Vec<AlignmentRecord>>,
    // The longest span on each chromosome, to bound the backward search.
    max_span: BTreeMap<String, u64>,
    lengths: BTreeMap<String, u64>,
}

impl RecordStore {
    pub fn new(records: Vec<AlignmentRecord>) -> Self {
        let mut grouped: BTreeMap<String, Vec<AlignmentRecord>> = BTreeMap::new();
        for record in records {
            grouped.entry(record.chrom.clone()).or_default().push(record);
        }
        let mut max_span = BTreeMap::new();
        let mut lengths = BTreeMap::new();
        for (chrom, records) in grouped.iter_mut() {
            records.sort_by(|x, y| {
                (x.position, x.end, &x.name, x.flags).cmp(&(y.position, y.end, &y.name, y.flags))
            });
            let span = records
                .iter()
                .map(|r| r.end.saturating_sub(r.position))
                .max()
                .unwrap_or(0);
            let len = records.iter().map(|r| r.end.max(r.position + 1)).max().unwrap_or(0);
            max_span.insert(chrom.clone(), span);
            lengths.insert(chrom.clone(), len);
        }
        Self {
            records: grouped,
            max_span,
            lengths,
        }
    }
    /// Read JSON Lines, one [AlignmentRecord] per line. Blank lines are skipped.
    pub fn from_jsonl<R: std::io::BufRead>(reader: R) -> Result<Self, Error> {
        let mut records = vec![];
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AlignmentRecord = serde_json::from_str(&line)
                .map_err(|source| Error::Record { line: i + 1, source })?;
            records.push(record);
        }
        Ok(Self::new(records))
    }
    /// Declare chromosome lengths. Chromosomes are otherwise as long as their furthest record.
    pub fn with_lengths(mut self, lengths: &[(String, u64)]) -> Self {
        for (chrom, len) in lengths {
            let entry = self.lengths.entry(chrom.clone()).or_default();
            *entry = (*entry).max(*len);
        }
        self
    }
    pub fn len(&self) -> usize {
        self.records.values().map(|x| x.len()).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegionReader for RecordStore {
    fn fetch(&self, region: &Region) -> Result<Vec<AlignmentRecord>, String> {
        let records = match self.records.get(&region.chrom) {
            Some(records) => records,
            None => return Ok(vec![]),
        };
        let span = self.max_span.get(&region.chrom).copied().unwrap_or(0);
        let lower = region.start.saturating_sub(span);
        let from = records.partition_point(|r| r.position < lower);
        let to = records.partition_point(|r| r.position < region.end);
        Ok(records[from..to]
            .iter()
            .filter(|r| region.start < r.end || region.start <= r.position)
            .cloned()
            .collect())
    }
    fn chrom_lengths(&self) -> Vec<(String, u64)> {
        self.lengths.iter().map(|(c, &l)| (c.clone(), l)).collect()
    }
}
