//! Per-position (or binned) read depth of a region.
//!
//! The profile is accumulated in a single forward pass over the records with a difference array,
//! so its memory is proportional to the span of the region, not to the number of reads.
use definitions::AlignmentRecord;

#[derive(Debug, Clone)]
pub struct CoverageBuilder {
    chrom: String,
    start: u64,
    end: u64,
    bin_size: u64,
    // diff[i] is the change of depth at start + i.
    diff: Vec<i32>,
    reads: usize,
}

impl CoverageBuilder {
    pub fn new(chrom: &str, start: u64, end: u64, bin_size: u64) -> Self {
        let span = end.saturating_sub(start) as usize;
        Self {
            chrom: chrom.to_string(),
            start,
            end,
            bin_size: bin_size.max(1),
            diff: vec![0; span + 1],
            reads: 0,
        }
    }
    /// Count the span of the record. Records off the region, unmapped, secondary, or duplicated are ignored.
    pub fn add(&mut self, record: &AlignmentRecord) {
        if record.chrom != self.chrom
            || record.is_unmapped()
            || record.is_secondary()
            || record.is_duplicate()
        {
            return;
        }
        let start = record.position.max(self.start);
        let end = record.end.min(self.end);
        if end <= start {
            return;
        }
        self.diff[(start - self.start) as usize] += 1;
        self.diff[(end - self.start) as usize] -= 1;
        self.reads += 1;
    }
    pub fn finish(self) -> CoverageProfile {
        let span = (self.end - self.start) as usize;
        let bin_size = self.bin_size as usize;
        let bin_num = span / bin_size + (span % bin_size != 0) as usize;
        let mut sums = vec![0u64; bin_num];
        let mut depth = 0i64;
        for (i, delta) in self.diff.iter().take(span).enumerate() {
            depth += *delta as i64;
            sums[i / bin_size] += depth.max(0) as u64;
        }
        let depth: Vec<u32> = sums
            .iter()
            .enumerate()
            .map(|(bin, &sum)| {
                let width = bin_size.min(span - bin * bin_size) as u64;
                (sum / width) as u32
            })
            .collect();
        debug!(
            "COVERAGE\t{}:{}-{}\t{}\t{}",
            self.chrom,
            self.start,
            self.end,
            self.reads,
            depth.len()
        );
        CoverageProfile {
            chrom: self.chrom,
            start: self.start,
            end: self.end,
            bin_size: self.bin_size,
            depth,
        }
    }
}

/// Read depth of a region. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageProfile {
    chrom: String,
    start: u64,
    end: u64,
    bin_size: u64,
    depth: Vec<u32>,
}

impl CoverageProfile {
    pub fn build<'a, I: IntoIterator<Item = &'a AlignmentRecord>>(
        chrom: &str,
        start: u64,
        end: u64,
        bin_size: u64,
        records: I,
    ) -> Self {
        let mut builder = CoverageBuilder::new(chrom, start, end, bin_size);
        records.into_iter().for_each(|r| builder.add(r));
        builder.finish()
    }
    pub fn chrom(&self) -> &str {
        &self.chrom
    }
    pub fn contains(&self, chrom: &str, position: u64) -> bool {
        self.chrom == chrom && self.start <= position && position < self.end
    }
    /// Depth at `position`. Zero if nothing covers it or it is off the region.
    pub fn depth_at(&self, position: u64) -> u32 {
        if position < self.start || self.end <= position {
            return 0;
        }
        let bin = ((position - self.start) / self.bin_size) as usize;
        self.depth[bin]
    }
    /// The arithmetic mean depth over `[start, end)`, clipped to the region.
    pub fn mean_depth(&self, start: u64, end: u64) -> f64 {
        let start = start.max(self.start);
        let end = end.min(self.end);
        if end <= start {
            return 0f64;
        }
        let sum: u64 = (start..end).map(|pos| self.depth_at(pos) as u64).sum();
        sum as f64 / (end - start) as f64
    }
    /// The same as [mean_depth](CoverageProfile::mean_depth), truncated to an integer.
    pub fn mean_depth_truncated(&self, start: u64, end: u64) -> u32 {
        self.mean_depth(start, end).trunc() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::tests::mapped;
    #[test]
    fn zero_depth_without_reads() {
        let reads = vec![mapped("r", "chr1", 100, 50, 0)];
        let profile = CoverageProfile::build("chr1", 0, 1000, 1, &reads);
        assert_eq!(profile.depth_at(99), 0);
        assert_eq!(profile.depth_at(100), 1);
        assert_eq!(profile.depth_at(149), 1);
        assert_eq!(profile.depth_at(150), 0);
        assert_eq!(profile.depth_at(5000), 0);
        let empty = CoverageProfile::build("chr1", 0, 1000, 1, std::iter::empty());
        assert!((0..1000).all(|p| empty.depth_at(p) == 0));
    }
    #[test]
    fn overlapping_reads() {
        let reads: Vec<_> = (0..20)
            .map(|i| mapped("r", "chr1", 100 + i * 10, 100, 0))
            .collect();
        let profile = CoverageProfile::build("chr1", 0, 1000, 1, &reads);
        assert_eq!(profile.depth_at(100), 1);
        assert_eq!(profile.depth_at(195), 10);
        assert_eq!(profile.depth_at(295), 10);
        assert_eq!(profile.depth_at(389), 1);
        assert_eq!(profile.depth_at(390), 0);
    }
    #[test]
    fn ignores_other_records() {
        let mut dup = mapped("r", "chr1", 0, 100, definitions::FLAG_DUPLICATE);
        dup.mapq = 0;
        let reads = vec![
            dup,
            mapped("r", "chr2", 0, 100, 0),
            mapped("r", "chr1", 0, 100, definitions::FLAG_SECONDARY),
        ];
        let profile = CoverageProfile::build("chr1", 0, 200, 1, &reads);
        assert_eq!(profile.mean_depth(0, 200), 0f64);
    }
    #[test]
    fn interval_mean() {
        let reads = vec![
            mapped("r", "chr1", 0, 100, 0),
            mapped("r", "chr1", 50, 100, 0),
        ];
        let profile = CoverageProfile::build("chr1", 0, 400, 1, &reads);
        assert_eq!(profile.mean_depth(0, 100), 1.5);
        assert_eq!(profile.mean_depth_truncated(0, 100), 1);
        assert_eq!(profile.mean_depth(0, 200), 1.0);
        assert_eq!(profile.mean_depth(1000, 2000), 0f64);
    }
    #[test]
    fn binned() {
        let reads = vec![mapped("r", "chr1", 0, 50, 0)];
        let profile = CoverageProfile::build("chr1", 0, 250, 100, &reads);
        assert_eq!(profile.depth_at(10), 0);
        let reads = vec![mapped("r", "chr1", 0, 100, 0), mapped("r", "chr1", 0, 100, 0)];
        let profile = CoverageProfile::build("chr1", 0, 250, 100, &reads);
        assert_eq!(profile.depth_at(99), 2);
        assert_eq!(profile.depth_at(100), 0);
        assert_eq!(profile.depth_at(249), 0);
    }
    #[test]
    fn region_offset() {
        let reads = vec![mapped("r", "chr1", 900, 200, 0)];
        let profile = CoverageProfile::build("chr1", 1000, 2000, 1, &reads);
        assert_eq!(profile.depth_at(1000), 1);
        assert_eq!(profile.depth_at(1099), 1);
        assert_eq!(profile.depth_at(1100), 0);
        assert!(profile.contains("chr1", 1500));
        assert!(!profile.contains("chr1", 2000));
    }
}
