const fn base_table() -> [usize; 128] {
    let mut table = [4; 128];
    table[b'A' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b'a' as usize] = 0;
    table[b'c' as usize] = 1;
    table[b'g' as usize] = 2;
    table[b't' as usize] = 3;
    table
}
const BASE_TABLE: [usize; 128] = base_table();
const BASES: [u8; 4] = *b"ACGT";

/// Base counts for each column of a contig.
#[derive(Debug, Clone)]
pub struct Pileup {
    columns: Vec<[u32; 4]>,
}

impl Pileup {
    pub fn new(len: usize) -> Self {
        Self {
            columns: vec![[0; 4]; len],
        }
    }
    /// Put `seq` starting at column `offset`. Bases past the end and N's are ignored.
    pub fn add(&mut self, offset: usize, seq: &[u8]) {
        let columns = self.columns.iter_mut().skip(offset);
        for (column, &base) in columns.zip(seq.iter()) {
            if let Some(&slot) = BASE_TABLE.get(base as usize) {
                if slot < 4 {
                    column[slot] += 1;
                }
            }
        }
    }
    /// Replace each base of `template` by the majority of its column.
    /// A tie or an empty column keeps the template base.
    pub fn polish(&self, template: &[u8]) -> Vec<u8> {
        template
            .iter()
            .zip(self.columns.iter())
            .map(|(&base, column)| {
                let current = BASE_TABLE
                    .get(base as usize)
                    .and_then(|&i| column.get(i))
                    .copied()
                    .unwrap_or(0);
                let (argmax, &max) = column
                    .iter()
                    .enumerate()
                    .max_by_key(|&(i, count)| (count, std::cmp::Reverse(i)))
                    .unwrap_or((0, &0));
                match current < max {
                    true => BASES[argmax],
                    false => base,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn depth(pileup: &Pileup, position: usize) -> u32 {
        pileup.columns[position].iter().sum()
    }
    #[test]
    fn majority() {
        let mut pileup = Pileup::new(6);
        pileup.add(0, b"ACGTAC");
        pileup.add(1, b"CCTA");
        pileup.add(2, b"GTAC");
        assert_eq!(depth(&pileup, 0), 1);
        assert_eq!(depth(&pileup, 2), 3);
        assert_eq!(pileup.polish(b"ACGTAC"), b"ACGTAC".to_vec());
        assert_eq!(pileup.polish(b"ATGTAC"), b"ACGTAC".to_vec());
    }
    #[test]
    fn ties_keep_template() {
        let mut pileup = Pileup::new(3);
        pileup.add(0, b"AAA");
        pileup.add(0, b"ACA");
        assert_eq!(pileup.polish(b"ACA"), b"ACA".to_vec());
        assert_eq!(pileup.polish(b"AGA"), b"AAA".to_vec());
        pileup.add(2, b"NNNN");
        assert_eq!(depth(&pileup, 2), 2);
    }
}
