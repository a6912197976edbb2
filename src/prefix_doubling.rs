//! Distinguishing-prefix computation and the truncating sort pipeline.
//!
//! For every string, find the minimum d such that no other string in the
//! whole dataset shares its first d bytes (capped at the string's
//! length). Rounds of distributed hash filtering at doubling depths
//! shrink the candidate set; an exact pass over the gathered survivors
//! closes it regardless of hash collisions.

use crate::bloom_filter::{BloomFilter, HashTransport};
use crate::comm::{Comm, Tag};
use crate::container::{cmp_str, decode_u64s, encode_u64s, lcp, StringContainer};
use crate::sample::Sampling;
use crate::sorts::hyper_quicksort::SortConfig;
use crate::sorts::splitter_sort::partition_sort;
use crate::tracker::Tracker;

#[derive(Debug, Clone)]
pub struct PrefixDoublingConfig {
    /// First hashing depth.
    pub start_depth: u64,
    /// Last hashing depth; survivors go to the exact pass.
    pub max_depth: u64,
    pub transport: HashTransport,
    pub tag: Tag,
}

impl Default for PrefixDoublingConfig {
    fn default() -> Self {
        Self {
            start_depth: 4,
            max_depth: 4096,
            transport: HashTransport::Raw,
            tag: 21111,
        }
    }
}

/// Global average LCP of the locally sorted containers, the usual start
/// depth hint (the original runs with twice this value).
pub fn global_avg_lcp(cont: &StringContainer, comm: &Comm) -> u64 {
    debug_assert!(cont.check_local_order());
    let local_sum: u64 = (1..cont.len())
        .map(|i| lcp(cont.get(i - 1), cont.get(i)) as u64)
        .sum();
    let total = comm.all_reduce_sum(local_sum);
    let count = comm.all_reduce_sum(cont.len() as u64);
    if count == 0 {
        0
    } else {
        total / count
    }
}

/// Compute the distinguishing prefix length of every local string.
pub fn distinguishing_prefixes(
    cont: &StringContainer,
    comm: &Comm,
    cfg: &PrefixDoublingConfig,
) -> Vec<u64> {
    assert!(cfg.start_depth >= 1);
    let filter = BloomFilter::new(cfg.transport, cfg.tag);
    let mut results = vec![0u64; cont.len()];
    let mut candidates: Vec<usize> = (0..cont.len()).collect();

    let mut depth = cfg.start_depth;
    loop {
        candidates = filter.filter(cont, depth, &candidates, &mut results, comm);

        #[cfg(feature = "work_profiles")]
        println!(
            "({}) PD depth={} candidates={}",
            comm.rank(),
            depth,
            candidates.len()
        );

        let remaining = comm.all_reduce_sum(candidates.len() as u64);
        if remaining == 0 {
            return results;
        }
        if depth >= cfg.max_depth {
            break;
        }
        depth = (depth * 2).min(cfg.max_depth);
    }

    // Hash rounds could not separate the survivors (deep shared prefixes
    // or outright collisions); settle them exactly.
    filter_exact(cont, &candidates, &mut results, comm);
    results
}

/// Exact pass: all-gather the remaining candidate strings, sort the
/// gathered set and derive each candidate's distinguishing prefix from
/// its LCP with both neighbours, capped at the string's length.
pub fn filter_exact(
    cont: &StringContainer,
    candidates: &[usize],
    results: &mut [u64],
    comm: &Comm,
) {
    let mut send_bytes = Vec::new();
    for &c in candidates {
        send_bytes.extend_from_slice(cont.get(c));
        send_bytes.push(0);
    }
    let counts = comm.all_gather_u64(candidates.len() as u64);
    let positions = decode_u64s(&comm.all_gatherv(encode_u64s(
        &candidates.iter().map(|&c| c as u64).collect::<Vec<_>>(),
    )));
    let gathered = StringContainer::from_bytes(comm.all_gatherv(send_bytes));

    let total: u64 = counts.iter().sum();
    if total == 0 {
        return;
    }
    debug_assert_eq!(gathered.len() as u64, total);

    // owner rank of every gathered string, in gather order
    let mut owners = Vec::with_capacity(gathered.len());
    for (rank, &count) in counts.iter().enumerate() {
        owners.extend(std::iter::repeat(rank).take(count as usize));
    }

    let mut order: Vec<usize> = (0..gathered.len()).collect();
    order.sort_by(|&a, &b| cmp_str(gathered.get(a), gathered.get(b)));

    let mut apply = |g: usize, dist: u64| {
        if owners[g] == comm.rank() {
            let local = positions[g] as usize;
            let capped = dist.min(cont.get(local).len() as u64);
            results[local] = results[local].max(capped);
        }
    };

    for w in order.windows(2) {
        let (a, b) = (w[0], w[1]);
        let dist = 1 + lcp(gathered.get(a), gathered.get(b)) as u64;
        apply(a, dist);
        apply(b, dist);
    }
}

/// Shorten every string to its distinguishing prefix, tag it with its
/// global input position and sort the truncated set with the splitter
/// partitioner in indexed mode.
///
/// The result is the sorted truncated container; its index stream is the
/// sorted permutation of the input.
pub fn prefix_doubled_sort<T: Tracker>(
    cont: StringContainer,
    comm: &Comm,
    pd_cfg: &PrefixDoublingConfig,
    sort_cfg: &SortConfig,
    tracker: &mut T,
) -> StringContainer {
    assert!(
        !cont.indexed(),
        "the pipeline assigns global input positions itself"
    );

    let dists = distinguishing_prefixes(&cont, comm, pd_cfg);

    let sizes = comm.all_gather_u64(cont.len() as u64);
    let offset: u64 = sizes[..comm.rank()].iter().sum();

    let mut bytes = Vec::with_capacity(cont.char_size());
    let mut indices = Vec::with_capacity(cont.len());
    for i in 0..cont.len() {
        let s = cont.get(i);
        let d = (dists[i] as usize).min(s.len());
        bytes.extend_from_slice(&s[..d]);
        bytes.push(0);
        indices.push(offset + i as u64);
    }
    let truncated = StringContainer::from_indexed_bytes(bytes, indices);

    let sampling = Sampling::num_strings().indexed();
    partition_sort(truncated, comm, &sampling, sort_cfg, tracker)
}
