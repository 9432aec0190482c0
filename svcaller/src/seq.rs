const fn revcmp_table() -> [u8; 256] {
    let mut table = [b'N'; 256];
    table[b'A' as usize] = b'T';
    table[b'C' as usize] = b'G';
    table[b'G' as usize] = b'C';
    table[b'T' as usize] = b'A';
    table[b'a' as usize] = b't';
    table[b'c' as usize] = b'g';
    table[b'g' as usize] = b'c';
    table[b't' as usize] = b'a';
    table[b'n' as usize] = b'n';
    table
}
const REVCMP: [u8; 256] = revcmp_table();

/// Reverse complement. Letters other than ACGT become N.
pub fn revcmp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| REVCMP[b as usize]).collect()
}

/// True if the k-mer consists of ACGT only.
pub fn is_clean(kmer: &[u8]) -> bool {
    kmer.iter()
        .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T'))
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn revcmp_test() {
        assert_eq!(revcmp(b"AACGTN"), b"NACGTT".to_vec());
        assert_eq!(revcmp(&revcmp(b"GATTACA")), b"GATTACA".to_vec());
        assert!(is_clean(b"acgT"));
        assert!(!is_clean(b"ACNT"));
    }
}
