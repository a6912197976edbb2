//! Distributed duplicate detection over hashed string prefixes.
//!
//! One round of the distinguishing-prefix estimator: hash the first d
//! bytes of every candidate, detect duplicate hashes locally, route the
//! surviving hashes to their bucket owners, detect duplicates across
//! processors and report them back. Strings whose hash is unique at depth
//! d are distinguished by their first d bytes; the rest stay candidates.

use crate::comm::{Comm, Tag};
use crate::container::{decode_u64s, encode_u64s, StringContainer};
use crate::golomb;
use arbitrary_chunks::ArbitraryChunks;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Hash range. The distribution over buckets was good enough in practice
/// to keep a fixed size rather than balancing it per input.
pub const FILTER_SIZE: u64 = u32::MAX as u64;

/// How hash values travel to their bucket owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashTransport {
    /// Bulk 64-bit values.
    Raw,
    /// Golomb-coded delta stream per destination, one all-to-all.
    GolombSequential,
    /// Same encoding, shipped in P pairwise exchange rounds.
    GolombPipelined,
}

/// Hash of the first `depth` bytes of `s`, reduced into the filter range.
pub fn prefix_hash(s: &[u8], depth: usize, m: u64) -> u64 {
    let mut h: u64 = 5381;
    for &c in s.iter().take(depth) {
        h = h.wrapping_mul(33).wrapping_add(33 * c as u64);
    }
    h % m
}

#[derive(Debug, Clone, Copy)]
struct HashStringIndex {
    hash: u64,
    string: usize,
    local_dup: bool,
    /// First member of a local duplicate run; still sent so the remote
    /// side can match the run against other processors' hashes.
    send_anyway: bool,
}

pub struct BloomFilter {
    pub filter_size: u64,
    pub transport: HashTransport,
    pub golomb_b: u64,
    pub tag: Tag,
}

impl BloomFilter {
    pub fn new(transport: HashTransport, tag: Tag) -> Self {
        Self {
            filter_size: FILTER_SIZE,
            transport,
            golomb_b: golomb::DEFAULT_B,
            tag,
        }
    }

    /// Run one round at `depth` over `candidates`.
    ///
    /// Sets `results[c] = depth` for every candidate and `results[c] =
    /// len(c)` for candidates shorter than `depth` (those leave the set
    /// for good). Returns the next round's candidates: every string whose
    /// hash collided locally or remotely.
    pub fn filter(
        &self,
        cont: &StringContainer,
        depth: u64,
        candidates: &[usize],
        results: &mut [u64],
        comm: &Comm,
    ) -> Vec<usize> {
        let p = comm.size();

        let mut hsi: Vec<HashStringIndex> = Vec::with_capacity(candidates.len());
        let mut eos = Vec::new();
        for &c in candidates {
            let s = cont.get(c);
            if depth as usize > s.len() {
                eos.push(c);
            } else {
                hsi.push(HashStringIndex {
                    hash: prefix_hash(s, depth as usize, self.filter_size),
                    string: c,
                    local_dup: false,
                    send_anyway: false,
                });
            }
        }
        hsi.sort_unstable_by_key(|h| h.hash);

        let local_dups = mark_local_duplicates(&mut hsi);
        let reduced: Vec<HashStringIndex> = hsi
            .into_iter()
            .filter(|h| !h.local_dup || h.send_anyway)
            .collect();

        // Route each hash to the processor owning its bucket. The
        // exchanged offsets let receivers address duplicates as positions
        // into each sender's reduced array.
        let counts = bucket_counts(&reduced, p, self.filter_size);
        let mut offsets = Vec::with_capacity(p);
        let mut acc = 0u64;
        for &c in &counts {
            offsets.push(acc);
            acc += c as u64;
        }
        let recv_offsets = comm.all_to_all_u64(&offsets);

        let hashes: Vec<u64> = reduced.iter().map(|h| h.hash).collect();
        let incoming = self.send_to_filter(&hashes, &counts, comm);

        let dup_positions = find_remote_duplicates(&incoming);
        let total_back: u64 = dup_positions.iter().map(|v| v.len() as u64).sum();
        let any_back = comm.all_reduce_max(total_back) > 0;
        let remote_dups: Vec<u64> = if any_back {
            let parts = dup_positions
                .iter()
                .zip(&recv_offsets)
                .map(|(positions, off)| {
                    encode_u64s(&positions.iter().map(|pos| pos + off).collect::<Vec<_>>())
                })
                .collect();
            comm.all_to_all(parts)
                .iter()
                .flat_map(|part| decode_u64s(part))
                .collect()
        } else {
            Vec::new()
        };

        let mut next = local_dups;
        for pos in remote_dups {
            let h = &reduced[pos as usize];
            if !h.send_anyway {
                next.push(h.string);
            }
        }
        next.sort_unstable();

        for &c in candidates {
            results[c] = depth;
        }
        for &c in &eos {
            results[c] = cont.get(c).len() as u64;
        }
        next
    }

    /// Deliver each sorted per-destination run to its bucket owner;
    /// returns the received runs by source rank.
    fn send_to_filter(&self, hashes: &[u64], counts: &[usize], comm: &Comm) -> Vec<Vec<u64>> {
        match self.transport {
            HashTransport::Raw => {
                let parts = hashes
                    .arbitrary_chunks(counts)
                    .map(encode_u64s)
                    .collect();
                comm.all_to_all(parts)
                    .iter()
                    .map(|part| decode_u64s(part))
                    .collect()
            }
            HashTransport::GolombSequential => {
                let parts = hashes
                    .arbitrary_chunks(counts)
                    .map(|run| encode_u64s(&golomb::delta_encode(run, self.golomb_b)))
                    .collect();
                comm.all_to_all(parts)
                    .iter()
                    .map(|part| golomb::delta_decode(&decode_u64s(part), self.golomb_b))
                    .collect()
            }
            HashTransport::GolombPipelined => {
                let p = comm.size();
                let runs: Vec<&[u64]> = hashes.arbitrary_chunks(counts).collect();
                let mut incoming = vec![Vec::new(); p];
                // self-inverse pairing: in round r, i talks to (r - i) mod p
                for round in 0..p {
                    let partner = (round + p - comm.rank()) % p;
                    if partner == comm.rank() {
                        incoming[partner] = runs[partner].to_vec();
                        continue;
                    }
                    let enc = encode_u64s(&golomb::delta_encode(runs[partner], self.golomb_b));
                    let recv = comm.exchange(partner, self.tag, enc);
                    incoming[partner] =
                        golomb::delta_decode(&decode_u64s(&recv), self.golomb_b);
                }
                incoming
            }
        }
    }
}

/// Mark every member of a run of equal hashes as a local duplicate and
/// return their string positions; the run's first member is flagged to be
/// sent anyway.
fn mark_local_duplicates(hsi: &mut [HashStringIndex]) -> Vec<usize> {
    let mut dups = Vec::new();
    let mut i = 0;
    while i + 1 < hsi.len() {
        if hsi[i + 1].hash != hsi[i].hash {
            i += 1;
            continue;
        }
        dups.push(hsi[i].string);
        hsi[i].local_dup = true;
        hsi[i].send_anyway = true;
        let mut j = i + 1;
        while j < hsi.len() && hsi[j].hash == hsi[i].hash {
            hsi[j].local_dup = true;
            dups.push(hsi[j].string);
            j += 1;
        }
        i = j;
    }
    dups
}

/// Per-destination counts of a hash array sorted ascending. The last
/// bucket absorbs the flooring remainder so no hash is dropped.
fn bucket_counts(reduced: &[HashStringIndex], parts: usize, m: u64) -> Vec<usize> {
    let mut counts = vec![0usize; parts];
    for h in reduced {
        let bucket = ((h.hash * parts as u64) / m).min(parts as u64 - 1);
        counts[bucket as usize] += 1;
    }
    counts
}

/// Merge the incoming sorted hash runs and collect, per source rank, the
/// run positions of every hash that occurs more than once globally.
fn find_remote_duplicates(incoming: &[Vec<u64>]) -> Vec<Vec<u64>> {
    let p = incoming.len();
    let mut result = vec![Vec::new(); p];
    let mut counters = vec![0u64; p];

    let mut heap: BinaryHeap<Reverse<(u64, usize, usize)>> = BinaryHeap::new();
    for (src, run) in incoming.iter().enumerate() {
        if !run.is_empty() {
            heap.push(Reverse((run[0], src, 0)));
        }
    }

    let mut prev: Option<(u64, usize)> = None;
    let mut duplicate = false;
    while let Some(Reverse((hash, src, pos))) = heap.pop() {
        if pos + 1 < incoming[src].len() {
            heap.push(Reverse((incoming[src][pos + 1], src, pos + 1)));
        }
        if let Some((prev_hash, prev_src)) = prev {
            if prev_hash == hash {
                result[prev_src].push(counters[prev_src]);
                counters[prev_src] += 1;
                duplicate = true;
            } else if duplicate {
                result[prev_src].push(counters[prev_src]);
                counters[prev_src] += 1;
                duplicate = false;
            } else {
                counters[prev_src] += 1;
            }
        }
        prev = Some((hash, src));
    }
    if let Some((_, prev_src)) = prev {
        if duplicate {
            result[prev_src].push(counters[prev_src]);
        }
    }
    result
}
