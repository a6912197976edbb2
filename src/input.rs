//! Input distributors for tests and benchmarks.
//!
//! All generators are driven by explicit seeds. The distributed ones
//! (D/N-ratio, suffixes) deal the global strings to ranks with a PRNG
//! seeded identically across the group, so every rank draws the same
//! ownership sequence and keeps only its own strings.

use crate::comm::Comm;
use crate::container::StringContainer;
use nanorand::{Rng, WyRand};

/// Uniform random strings over A-Z with lengths in [min_len, max_len].
pub fn random_strings(
    seed: u64,
    count: usize,
    min_len: usize,
    max_len: usize,
) -> StringContainer {
    let mut rng = WyRand::new_seed(seed);
    let mut bytes = Vec::with_capacity(count * (max_len + 1));
    for _ in 0..count {
        let len = rng.generate_range(min_len..=max_len);
        for _ in 0..len {
            bytes.push(rng.generate_range(b'A'..=b'Z'));
        }
        bytes.push(0);
    }
    StringContainer::from_bytes(bytes)
}

/// One string per number in [1, count]: a shared prefix byte followed by
/// the number's decimal digits, least significant first.
pub fn prefix_number_strings(count: usize, prefix: u8) -> StringContainer {
    let mut bytes = Vec::new();
    for i in 1..=count {
        bytes.push(prefix);
        let mut n = i;
        while n > 0 {
            bytes.push(b'0' + (n % 10) as u8);
            n /= 10;
        }
        bytes.push(0);
    }
    StringContainer::from_bytes(bytes)
}

/// D/N-ratio strings.
///
/// Every string is `string_length` bytes: the first k encode the string's
/// global number in base 26, right-aligned over an 'A' fill, and the rest
/// repeat one shared random character. k is d_to_n * string_length,
/// raised if needed so all `num_strings` numbers stay distinct, making
/// roughly d_to_n of each string distinguishing.
pub fn dn_ratio_strings(
    comm: &Comm,
    seed: u64,
    num_strings: usize,
    string_length: usize,
    d_to_n: f64,
) -> StringContainer {
    const MIN_CHAR: u8 = b'A';
    const SIGMA: u64 = 26;

    let needed = ((num_strings.max(2) as f64).ln() / (SIGMA as f64).ln()).ceil();
    let k = (string_length as f64 * d_to_n).max(needed) as usize;
    let k = k.max(1);
    let len = string_length.max(k);

    let mut rng = WyRand::new_seed(seed);
    let pad = MIN_CHAR + (rng.generate::<u64>() % SIGMA) as u8;

    let mut bytes = Vec::new();
    for i in 0..num_strings {
        // every rank draws every owner so the streams stay in lockstep
        let owner = (rng.generate::<u64>() % comm.size() as u64) as usize;
        if owner != comm.rank() {
            continue;
        }
        let start = bytes.len();
        bytes.resize(start + k, MIN_CHAR);
        let mut cur = i;
        let mut j = 0;
        while cur > 0 && j < k {
            bytes[start + k - 1 - j] = MIN_CHAR + (cur as u64 % SIGMA) as u8;
            cur /= SIGMA as usize;
            j += 1;
        }
        for _ in k..len {
            bytes.push(pad);
        }
        bytes.push(0);
    }
    StringContainer::from_bytes(bytes)
}

/// Skewed distribution: a 4-to-1 mix of strings behind one long shared
/// prefix and plain uniform strings.
pub fn skewed_strings(
    seed: u64,
    count: usize,
    prefix_len: usize,
    tail_len: usize,
) -> StringContainer {
    let mut rng = WyRand::new_seed(seed);
    let prefix: Vec<u8> = (0..prefix_len)
        .map(|_| rng.generate_range(b'a'..=b'z'))
        .collect();
    let mut bytes = Vec::new();
    for i in 0..count {
        if i % 5 != 0 {
            bytes.extend_from_slice(&prefix);
        }
        for _ in 0..tail_len {
            bytes.push(rng.generate_range(b'a'..=b'z'));
        }
        bytes.push(0);
    }
    StringContainer::from_bytes(bytes)
}

/// All suffixes of `text` (which must be free of zero bytes), dealt to
/// the ranks of the group.
pub fn suffix_strings(comm: &Comm, seed: u64, text: &[u8]) -> StringContainer {
    assert!(!text.contains(&0), "suffix text must not contain zero bytes");
    let mut rng = WyRand::new_seed(seed);
    let mut bytes = Vec::new();
    for i in 0..text.len() {
        let owner = (rng.generate::<u64>() % comm.size() as u64) as usize;
        if owner == comm.rank() {
            bytes.extend_from_slice(&text[i..]);
            bytes.push(0);
        }
    }
    StringContainer::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::local;

    #[test]
    fn random_strings_respect_bounds() {
        let cont = random_strings(3, 50, 2, 6);
        assert_eq!(cont.len(), 50);
        for i in 0..cont.len() {
            let s = cont.get(i);
            assert!(s.len() >= 2 && s.len() <= 6);
            assert!(s.iter().all(|c| (b'A'..=b'Z').contains(c)));
        }
    }

    #[test]
    fn prefix_numbers_are_distinct() {
        let cont = prefix_number_strings(30, b'n');
        assert_eq!(cont.len(), 30);
        let mut all: Vec<Vec<u8>> = (0..30).map(|i| cont.get(i).to_vec()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 30);
    }

    #[test]
    fn dn_ratio_covers_all_strings_once() {
        let per_rank = local::run(4, |comm| {
            let cont = dn_ratio_strings(&comm, 11, 200, 20, 0.5);
            (0..cont.len()).map(|i| cont.get(i).to_vec()).collect::<Vec<_>>()
        });
        let mut all: Vec<Vec<u8>> = per_rank.into_iter().flatten().collect();
        assert_eq!(all.len(), 200);
        for s in &all {
            assert_eq!(s.len(), 20);
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 200, "every global number appears exactly once");
    }

    #[test]
    fn suffixes_partition_the_text() {
        let text = b"mississippi";
        let per_rank = local::run(3, |comm| {
            let cont = suffix_strings(&comm, 5, text);
            (0..cont.len()).map(|i| cont.get(i).to_vec()).collect::<Vec<_>>()
        });
        let mut all: Vec<Vec<u8>> = per_rank.into_iter().flatten().collect();
        assert_eq!(all.len(), text.len());
        all.sort();
        all.dedup();
        assert_eq!(all.len(), text.len());
    }

    #[test]
    fn skew_shares_a_prefix() {
        let cont = skewed_strings(9, 100, 30, 4);
        let long = (0..cont.len()).filter(|&i| cont.get(i).len() > 30).count();
        assert_eq!(long, 80);
    }
}
