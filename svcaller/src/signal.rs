//! Turn alignment records into evidence signals.
//!
//! Each record yields zero or more [AlignmentSignal]s:
//! - a discordant pair signal if its mate lies on another chromosome, in an unexpected orientation, or too far away,
//! - a split read signal if the record has a split partner,
//! - a soft clip signal for each long enough clip of a record that is not split.
//!
//! Records that cannot be interpreted are dropped and counted by reason in a [DropTally].
use crate::config::CallerConfig;
use crate::error::SignalError;
use definitions::*;

/// Below this many proper pairs, the insert size threshold falls back to [DEFAULT_INSERT_THRESHOLD].
pub const MIN_PROPER_PAIRS: usize = 100;
pub const DEFAULT_INSERT_THRESHOLD: u64 = 1_000;
// Scale MAD into a standard deviation for normal data.
const MAD_SCALE: f64 = 1.4826;
const MAD_MULTIPLIER: f64 = 5f64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertSizeStats {
    pub median: f64,
    pub mad: f64,
    /// The number of templates used.
    pub sample: usize,
    /// Templates longer than this are discordant.
    pub threshold: u64,
}

impl InsertSizeStats {
    /// Estimate the insert size distribution from properly paired records.
    /// Each template is counted once, from its mate with the positive template length.
    pub fn estimate<'a, I: IntoIterator<Item = &'a AlignmentRecord>>(records: I) -> Self {
        let mut lens: Vec<u64> = records
            .into_iter()
            .filter(|r| r.is_proper_pair() && !r.is_secondary() && !r.is_supplementary())
            .filter(|r| 0 < r.template_len)
            .map(|r| r.template_len as u64)
            .collect();
        if lens.len() < MIN_PROPER_PAIRS {
            return Self {
                median: 0f64,
                mad: 0f64,
                sample: lens.len(),
                threshold: DEFAULT_INSERT_THRESHOLD,
            };
        }
        lens.sort_unstable();
        let median = median_of_sorted(&lens);
        let mut devs: Vec<u64> = lens
            .iter()
            .map(|&x| (x as f64 - median).abs().round() as u64)
            .collect();
        devs.sort_unstable();
        let mad = median_of_sorted(&devs);
        let threshold = (median + MAD_MULTIPLIER * MAD_SCALE * mad.max(1f64)).ceil() as u64;
        Self {
            median,
            mad,
            sample: lens.len(),
            threshold,
        }
    }
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            median: 0f64,
            mad: 0f64,
            sample: 0,
            threshold,
        }
    }
}

fn median_of_sorted(xs: &[u64]) -> f64 {
    let len = xs.len();
    match len % 2 {
        1 => xs[len / 2] as f64,
        _ => (xs[len / 2 - 1] + xs[len / 2]) as f64 / 2f64,
    }
}

/// Check that a record is internally consistent.
pub fn validate(record: &AlignmentRecord) -> Result<(), SignalError> {
    if record.chrom.is_empty() {
        return Err(SignalError::EmptyChrom);
    }
    if record.end < record.position {
        return Err(SignalError::InvertedSpan);
    }
    let clips = record.left_clip as u64 + record.right_clip as u64;
    if !record.seq.is_empty() && (record.seq.len() as u64) < clips {
        return Err(SignalError::ClipOverflow);
    }
    match record.split_partner.as_ref() {
        None if record.is_supplementary() => return Err(SignalError::MissingPartner),
        Some(partner) if partner.end < partner.position => {
            return Err(SignalError::InvertedPartner)
        }
        _ => {}
    }
    if record.is_paired() && !record.is_mate_unmapped() && record.mate.is_none() {
        return Err(SignalError::MissingMate);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SignalExtractor<'a> {
    config: &'a CallerConfig,
    insert_threshold: u64,
}

impl<'a> SignalExtractor<'a> {
    pub fn new(config: &'a CallerConfig, insert_size: &InsertSizeStats) -> Self {
        let insert_threshold = config.max_insert_size.unwrap_or(insert_size.threshold);
        Self {
            config,
            insert_threshold,
        }
    }
    pub fn insert_threshold(&self) -> u64 {
        self.insert_threshold
    }
    /// Extract the signals of every record, tallying the dropped ones.
    pub fn extract_all<'b, I: IntoIterator<Item = &'b AlignmentRecord>>(
        &self,
        records: I,
        dropped: &mut DropTally,
    ) -> Vec<AlignmentSignal> {
        let mut signals = vec![];
        for record in records {
            if record.is_unmapped() || record.is_secondary() || record.is_duplicate() {
                dropped.add("filtered_flag");
                continue;
            }
            if record.mapq < self.config.min_mapq {
                dropped.add("low_mapq");
                continue;
            }
            match self.extract(record) {
                Ok(mut xs) => signals.append(&mut xs),
                Err(why) => {
                    trace!("DROP\t{}\t{}", record.name, why);
                    dropped.add(why.tag());
                }
            }
        }
        signals
    }
    /// Extract the signals of one record.
    pub fn extract(&self, record: &AlignmentRecord) -> Result<Vec<AlignmentSignal>, SignalError> {
        validate(record)?;
        let mut signals = vec![];
        if let Some(signal) = self.discordant_pair(record) {
            signals.push(signal);
        }
        match record.split_partner.as_ref() {
            Some(partner) => signals.extend(self.split_read(record, partner)),
            None => signals.extend(self.soft_clips(record)),
        }
        Ok(signals)
    }
    fn discordant_pair(&self, record: &AlignmentRecord) -> Option<AlignmentSignal> {
        if !record.is_paired() || record.is_mate_unmapped() || record.is_supplementary() {
            return None;
        }
        if record.is_proper_pair() {
            return None;
        }
        let mate = record.mate.as_ref()?;
        let same_chrom = mate.chrom == record.chrom;
        let orientation_ok = match record.position <= mate.position {
            true => !record.is_reverse() && record.is_mate_reverse(),
            false => record.is_reverse() && !record.is_mate_reverse(),
        };
        let too_far = record.template_len.unsigned_abs() > self.insert_threshold
            || record.position.abs_diff(mate.position) > self.insert_threshold;
        if same_chrom && orientation_ok && !too_far {
            return None;
        }
        let own = match record.is_reverse() {
            false => Breakend::new(&record.chrom, record.end, Anchor::Left),
            true => Breakend::new(&record.chrom, record.position, Anchor::Right),
        };
        // The mate's span is unknown. Take this record's span as a proxy.
        let mate_end = mate.position + record.aligned_length();
        let other = match record.is_mate_reverse() {
            false => Breakend::new(&mate.chrom, mate_end, Anchor::Left),
            true => Breakend::new(&mate.chrom, mate.position, Anchor::Right),
        };
        Some(AlignmentSignal::new(
            SignalKind::DiscordantPair,
            own,
            Some(other),
            &record.name,
            record.mapq,
            None,
        ))
    }
    fn split_read(
        &self,
        record: &AlignmentRecord,
        partner: &SplitPartner,
    ) -> Option<AlignmentSignal> {
        let anchor = match (record.left_clip, record.right_clip) {
            (0, 0) => return None,
            (l, r) if l <= r => Anchor::Left,
            _ => Anchor::Right,
        };
        let own = match anchor {
            Anchor::Left => Breakend::new(&record.chrom, record.end, Anchor::Left),
            Anchor::Right => Breakend::new(&record.chrom, record.position, Anchor::Right),
        };
        let same_strand = partner.is_reverse == record.is_reverse();
        let other = match (anchor, same_strand) {
            (Anchor::Left, true) | (Anchor::Right, false) => {
                Breakend::new(&partner.chrom, partner.position, Anchor::Right)
            }
            (Anchor::Left, false) | (Anchor::Right, true) => {
                Breakend::new(&partner.chrom, partner.end, Anchor::Left)
            }
        };
        let fragment = self.fragment(record, &own);
        let mapq = record.mapq.min(partner.mapq);
        Some(AlignmentSignal::new(
            SignalKind::SplitRead,
            own,
            Some(other),
            &record.name,
            mapq,
            fragment,
        ))
    }
    fn soft_clips(&self, record: &AlignmentRecord) -> Vec<AlignmentSignal> {
        let min_clip = self.config.min_clip_length.max(1);
        let mut signals = vec![];
        if min_clip <= record.left_clip {
            let breakend = Breakend::new(&record.chrom, record.position, Anchor::Right);
            signals.push(self.clip_signal(record, breakend));
        }
        if min_clip <= record.right_clip {
            let breakend = Breakend::new(&record.chrom, record.end, Anchor::Left);
            signals.push(self.clip_signal(record, breakend));
        }
        signals
    }
    fn clip_signal(&self, record: &AlignmentRecord, breakend: Breakend) -> AlignmentSignal {
        let fragment = self.fragment(record, &breakend);
        AlignmentSignal::new(
            SignalKind::SoftClip,
            breakend,
            None,
            &record.name,
            record.mapq,
            fragment,
        )
    }
    /// The clipped bases plus at most `clip_flank` aligned bases next to the junction.
    fn fragment(&self, record: &AlignmentRecord, breakend: &Breakend) -> Option<Fragment> {
        let seq = record.seq();
        if seq.is_empty() {
            return None;
        }
        let flank = self.config.clip_flank;
        let (left, right) = (record.left_clip as usize, record.right_clip as usize);
        let (start, end, junction) = match breakend.anchor {
            Anchor::Left => {
                let clip_start = seq.len() - right;
                let start = clip_start.saturating_sub(flank).max(left);
                (start, seq.len(), clip_start - start)
            }
            Anchor::Right => {
                let end = (left + flank).min(seq.len() - right);
                (0, end, left)
            }
        };
        let seq = String::from_utf8_lossy(&seq[start..end]).to_ascii_uppercase();
        Some(Fragment {
            seq,
            junction,
            breakend: breakend.clone(),
        })
    }
}
