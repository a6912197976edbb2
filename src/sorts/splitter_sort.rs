//! Splitter-based partitioner.
//!
//! Draws a deterministic sample per processor, sorts the concatenated
//! sample globally with the hyper-quicksort engine on a duplicate of the
//! caller's group, selects P-1 global splitters, computes per-peer
//! interval counts by binary search, redistributes the strings in one
//! all-to-all and fuses the received runs with the LCP loser tree.

use crate::comm::Comm;
use crate::container::{cmp_str, decode_u64s, encode_u64s, Record, StringContainer};
use crate::sample::Sampling;
use crate::sorts::hyper_quicksort::{self, SortConfig};
use crate::sorts::lcp_losertree;
use crate::tracker::{NoTracker, Tracker};
use arbitrary_chunks::ArbitraryChunks;
use std::cmp::Ordering;

/// Redistribute and sort the container across the group.
///
/// On return every processor holds a locally sorted container with fresh
/// LCPs, and concatenating the containers in rank order yields the
/// globally sorted sequence.
pub fn partition_sort<T: Tracker>(
    mut cont: StringContainer,
    comm: &Comm,
    sampling: &Sampling,
    cfg: &SortConfig,
    tracker: &mut T,
) -> StringContainer {
    assert_eq!(
        sampling.indexed,
        cont.indexed(),
        "sampling mode must match container indexing"
    );

    tracker.start("local_sort");
    cont.sort_locally();
    tracker.stop("local_sort");

    let p = comm.size();
    if p == 1 {
        cont.compute_lcps_in_runs(&[cont.len()]);
        return cont;
    }

    tracker.start("sample_splitters");
    let sample = sampling.sample(&cont, p);
    tracker.stop("sample_splitters");

    // Sort the sample on a fresh group so the engine's tags and
    // collectives cannot collide with the caller's message space. The
    // sample sort's own phases are not measured.
    tracker.start("sort_splitter");
    let sample_comm = comm.duplicate();
    let sorted_sample = hyper_quicksort::sort(sample, &sample_comm, cfg, &mut NoTracker);
    tracker.stop("sort_splitter");

    tracker.start("choose_splitters");
    let splitters = global_splitters(&sorted_sample, comm, cont.indexed());
    tracker.stop("choose_splitters");

    tracker.start("compute_interval_sizes");
    let counts = interval_counts(&cont, &splitters, p);
    tracker.stop("compute_interval_sizes");

    tracker.start("all_to_all_strings");
    let recv_counts: Vec<usize> = comm
        .all_to_all_u64(&counts.iter().map(|&c| c as u64).collect::<Vec<_>>())
        .iter()
        .map(|&c| c as usize)
        .collect();

    let parts: Vec<Vec<u8>> = cont
        .records()
        .arbitrary_chunks(&counts)
        .map(|run| run_wire_bytes(&cont, run))
        .collect();
    let recv_bytes = comm.all_to_all(parts).concat();

    let mut recv_cont = if cont.indexed() {
        let parts: Vec<Vec<u8>> = cont
            .records()
            .arbitrary_chunks(&counts)
            .map(|run| encode_u64s(&run.iter().map(|r| r.index).collect::<Vec<_>>()))
            .collect();
        let recv_indices = decode_u64s(&comm.all_to_all(parts).concat());
        StringContainer::from_indexed_bytes(recv_bytes, recv_indices)
    } else {
        StringContainer::from_bytes(recv_bytes)
    };
    tracker.stop("all_to_all_strings");

    let total = comm.all_reduce_sum(cont.len() as u64);
    let received: usize = recv_counts.iter().sum();
    let fair = (total / p as u64) as i64;
    tracker.add((received as i64 - fair).unsigned_abs(), "inbalance");

    // The received payload is P sorted runs; fuse them in one pass.
    tracker.start("merge_ranges");
    recv_cont.compute_lcps_in_runs(&recv_counts);
    let k = p.next_power_of_two();
    assert!(k <= 512, "merge fan-in above 512 processors is unsupported");
    let mut ranges = Vec::with_capacity(k);
    let mut offset = 0;
    for &count in &recv_counts {
        ranges.push((offset, count));
        offset += count;
    }
    ranges.resize(k, (0, 0));
    let merged = lcp_losertree::merge_runs(&recv_cont, &ranges);
    tracker.stop("merge_ranges");

    #[cfg(feature = "work_profiles")]
    println!("({}/{}) PART recv={}", comm.rank(), p, merged.len());

    merged
}

fn run_wire_bytes(cont: &StringContainer, run: &[Record]) -> Vec<u8> {
    let total: usize = run.iter().map(|r| r.len() + 1).sum();
    let mut out = Vec::with_capacity(total);
    for r in run {
        out.extend_from_slice(cont.str_of_with_nul(r));
    }
    out
}

/// Pick the P-1 global splitters out of the globally sorted sample.
///
/// Every processor determines which of the evenly spaced positions fall
/// into its slice of the sample and contributes those strings; the
/// contributions are all-gathered so every rank ends up with the same
/// splitter vector.
fn global_splitters(
    sorted_sample: &StringContainer,
    comm: &Comm,
    indexed: bool,
) -> StringContainer {
    let sizes = comm.all_gather_u64(sorted_sample.len() as u64);
    let local_prefix: u64 = sizes[..comm.rank()].iter().sum();
    let total: u64 = sizes.iter().sum();
    let mine = sorted_sample.len() as u64;

    let nr_splitters = (comm.size() as u64 - 1).min(total);
    let dist = if nr_splitters == 0 {
        0
    } else {
        total / (nr_splitters + 1)
    };

    let mut bytes = Vec::new();
    let mut indices = Vec::new();
    if dist > 0 {
        for k in 1..=nr_splitters {
            let pos = k * dist;
            if pos >= local_prefix && pos < local_prefix + mine {
                let i = (pos - local_prefix) as usize;
                bytes.extend_from_slice(sorted_sample.get(i));
                bytes.push(0);
                if indexed {
                    indices.push(sorted_sample.index(i));
                }
            }
        }
    }

    let all_bytes = comm.all_gatherv(bytes);
    if indexed {
        let all_indices = decode_u64s(&comm.all_gatherv(encode_u64s(&indices)));
        StringContainer::from_indexed_bytes(all_bytes, all_indices)
    } else {
        StringContainer::from_bytes(all_bytes)
    }
}

/// Per-peer send counts: for every splitter the insertion point in the
/// local records, then differences of consecutive insertion points. In
/// indexed mode ties on bytes break on the record's index.
fn interval_counts(
    cont: &StringContainer,
    splitters: &StringContainer,
    parts: usize,
) -> Vec<usize> {
    let mut counts = Vec::with_capacity(parts);
    let mut prev = 0;
    for s in 0..splitters.len() {
        let splitter = splitters.get(s);
        let splitter_index = if splitters.indexed() {
            splitters.index(s)
        } else {
            0
        };
        let pos = cont.records().partition_point(|r| {
            match cmp_str(cont.str_of(r), splitter) {
                Ordering::Equal if cont.indexed() => r.index < splitter_index,
                ord => ord == Ordering::Less,
            }
        });
        // splitters are sorted, so insertion points never move backwards
        debug_assert!(pos >= prev);
        counts.push(pos - prev);
        prev = pos;
    }
    counts.push(cont.len() - prev);
    counts.resize(parts, 0);
    counts
}
