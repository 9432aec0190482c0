use crate::pipeline::RegionStats;
use definitions::{CallSet, SvType};

pub trait Stats {
    fn stats<W: std::io::Write>(&self, wtr: W) -> std::io::Result<()>;
}

impl Stats for CallSet {
    fn stats<W: std::io::Write>(&self, mut wtr: W) -> std::io::Result<()> {
        let passing = self.calls.iter().filter(|c| c.pass).count();
        writeln!(&mut wtr, "Regions")?;
        writeln!(
            &mut wtr,
            "# of Regions:{}\n# of Failed:{}",
            self.regions,
            self.failures.len()
        )?;
        for failure in self.failures.iter() {
            writeln!(&mut wtr, "Failed:{}\t{}", failure.region, failure.reason)?;
        }
        writeln!(&mut wtr, "Calls")?;
        writeln!(
            &mut wtr,
            "# of Calls:{}\n# of Passing:{}",
            self.calls.len(),
            passing
        )?;
        for sv_type in SvType::ALL {
            let calls = self.calls.iter().filter(|c| c.call.sv_type == sv_type);
            let (total, pass) = calls.fold((0, 0), |(t, p), c| (t + 1, p + c.pass as usize));
            if 0 < total {
                writeln!(&mut wtr, "{}:{}\t{}", sv_type, total, pass)?;
            }
        }
        if !self.dropped.counts.is_empty() {
            writeln!(&mut wtr, "Dropped")?;
            writeln!(&mut wtr, "# of Dropped:{}", self.dropped.total())?;
            for (reason, count) in self.dropped.counts.iter() {
                writeln!(&mut wtr, "{}:{}", reason, count)?;
            }
        }
        Ok(())
    }
}

impl Stats for RegionStats {
    fn stats<W: std::io::Write>(&self, mut wtr: W) -> std::io::Result<()> {
        writeln!(&mut wtr, "Stages")?;
        writeln!(
            &mut wtr,
            "Records:{}\nSignals:{}\nNodes:{}\nEdges:{}",
            self.records, self.signals, self.nodes, self.edges
        )?;
        writeln!(
            &mut wtr,
            "Clusters:{}\nContigs:{}\nCalls:{}",
            self.clusters, self.contigs, self.calls
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use definitions::*;
    #[test]
    fn summary() {
        let call = CandidateCall {
            sv_type: SvType::Inversion,
            locus_a: Locus::new("chr1", 10),
            anchor_a: Anchor::Left,
            locus_b: Locus::new("chr1", 5000),
            anchor_b: Anchor::Left,
            length: Some(4990),
            support: 4,
            evidence: EvidenceTally::default(),
            interval_width: 0,
            mean_mapq: 60f64,
            consensus: None,
        };
        let mut dropped = DropTally::default();
        dropped.add("low_mapq");
        dropped.add("low_mapq");
        let callset = CallSet {
            regions: 3,
            calls: vec![ScoredCall {
                call,
                score: 0.7,
                pass: true,
            }],
            failures: vec![RegionFailure {
                region: "chr2:0-100".to_string(),
                reason: "cancelled".to_string(),
            }],
            dropped,
        };
        let mut out = vec![];
        callset.stats(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("# of Regions:3"));
        assert!(out.contains("Failed:chr2:0-100\tcancelled"));
        assert!(out.contains("INV:1\t1"));
        assert!(out.contains("low_mapq:2"));
        assert!(!out.contains("DEL:"));
        let mut out = vec![];
        RegionStats::default().stats(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Clusters:0"));
    }
}
