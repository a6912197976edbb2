//! Distributed hyper-quicksort for strings.
//!
//! The engine entry point of the crate: accepts any group size, folds it
//! onto the largest power-of-two subcube, shuffles, sorts locally, and
//! then recursively partitions the group in halves around a pivot picked
//! by binary-tree median selection, exchanging partitions across the
//! halves and merging locally.
//!
//! Also doubles as the internal sorter for splitter samples in the
//! splitter partitioner.

use crate::comm::{Comm, Tag};
use crate::container::{cmp_str, Record, StringBlock, StringContainer};
use crate::median_select;
use crate::random_bits::RandomBitStore;
use crate::shuffle::shuffle;
use crate::sorts::merge_sorted_ranges;
use crate::tracker::Tracker;
use nanorand::WyRand;
use std::cmp::Ordering;

/// Splitter placement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Split exactly at the pivot's lower bound.
    Plain,
    /// Shift the split point towards the local midpoint within the
    /// pivot's equal range, bounding the worst-case exchange imbalance.
    Robust,
}

/// Per-invocation engine configuration.
///
/// Identical seeds across a group yield identical splitter choices; the
/// engine reserves the message tags [tag, tag + 1].
#[derive(Debug, Clone)]
pub struct SortConfig {
    pub seed: u64,
    pub tag: Tag,
    pub mode: Mode,
    /// Insert a group barrier at every stage boundary so the tracker's
    /// phase timers measure computation instead of skew.
    pub barriers: bool,
}

impl SortConfig {
    pub fn new(seed: u64, tag: Tag) -> Self {
        Self {
            seed,
            tag,
            mode: Mode::Robust,
            barriers: false,
        }
    }
}

fn prev_power_of_two(p: usize) -> usize {
    let np = p.next_power_of_two();
    if np == p {
        p
    } else {
        np / 2
    }
}

/// Sort the distributed multiset held in `data` across `comm`.
///
/// On return every surviving rank holds a locally sorted container and
/// rank-order concatenation yields the globally sorted sequence. When the
/// group is not a power of two, the overflow ranks contribute their data
/// and return an empty container.
pub fn sort<T: Tracker>(
    data: StringBlock,
    comm: &Comm,
    cfg: &SortConfig,
    tracker: &mut T,
) -> StringContainer {
    let indexed = data.indexed;

    if comm.size() == 1 {
        let mut cont = data.into_container();
        tracker.start("local_sort");
        cont.sort_locally();
        tracker.stop("local_sort");
        return cont;
    }

    // Fold a non-power-of-two group onto the largest power-of-two
    // subcube: overflow ranks ship their strings to rank - q and drop out.
    tracker.start("shape");
    let p = comm.size();
    let q = prev_power_of_two(p);
    let mut data = data;
    let sub = if q == p {
        comm.clone()
    } else if comm.rank() >= q {
        data.send(comm, comm.rank() - q, cfg.tag);
        let _ = comm.shrink(q);
        tracker.stop("shape");
        return if indexed {
            StringContainer::new_indexed()
        } else {
            StringContainer::new()
        };
    } else {
        if comm.rank() < p - q {
            data.recv_append(comm, q + comm.rank(), cfg.tag);
        }
        comm.shrink(q).unwrap()
    };
    tracker.stop("shape");

    let mut cont = data.into_container();

    // Per-processor stream for routing decisions; the group-synchronous
    // stream below is seeded identically on every rank.
    let mut local_rng = WyRand::new_seed(
        cfg.seed ^ 0x9e37_79b9_7f4a_7c15u64.wrapping_mul(comm.rank() as u64 + 1),
    );
    let mut local_bits = RandomBitStore::new();

    tracker.start("shuffle");
    shuffle(&mut cont, &sub, &mut local_rng, &mut local_bits, cfg.tag);
    tracker.stop("shuffle");

    tracker.start("local_sort");
    cont.sort_locally();
    tracker.stop("local_sort");

    if sub.size() == 1 {
        return cont;
    }

    let mut sync_rng = WyRand::new_seed(cfg.seed);
    let mut sync_bits = RandomBitStore::new();
    sort_rec(cont, sub, &mut sync_rng, &mut sync_bits, cfg, tracker)
}

fn sort_rec<T: Tracker>(
    mut cont: StringContainer,
    comm: Comm,
    rng: &mut WyRand,
    bits: &mut RandomBitStore,
    cfg: &SortConfig,
    tracker: &mut T,
) -> StringContainer {
    let p = comm.size();
    debug_assert!(p.is_power_of_two() && p >= 2);
    debug_assert!(cont.check_local_order());

    // A group holding an empty multiset is already sorted; the pivot
    // selection below has nothing to pick from.
    if comm.all_reduce_sum(cont.len() as u64) == 0 {
        return cont;
    }

    if cfg.barriers {
        comm.barrier();
    }
    tracker.start("median_select");
    let pivot = select_pivot(&cont, &comm, rng, bits, cfg.tag);
    tracker.stop("median_select");

    if cfg.barriers {
        comm.barrier();
    }
    tracker.start("partition");
    let sep = locate_splitter(&cont, &pivot, rng, bits, cfg.mode == Mode::Robust);
    let is_left = comm.rank() < p / 2;
    let (own_from, own_to, send_from, send_to) = if is_left {
        (0, sep, sep, cont.len())
    } else {
        (sep, cont.len(), 0, sep)
    };
    let send = StringBlock::from_range(&cont, send_from, send_to);
    let inbalance = (cont.len() as i64 - (send_to - send_from) as i64).unsigned_abs();
    tracker.add(inbalance, "inbalance");
    tracker.stop("partition");

    if cfg.barriers {
        comm.barrier();
    }
    tracker.start("exchange");
    let partner = (comm.rank() + p / 2) % p;
    let recv_cont = send.exchange(&comm, partner, cfg.tag).into_container();
    tracker.stop("exchange");

    if cfg.barriers {
        comm.barrier();
    }
    tracker.start("merge");
    cont = merge_sorted_ranges(&cont, own_from, own_to, &recv_cont);
    tracker.stop("merge");

    #[cfg(feature = "work_profiles")]
    println!(
        "({}/{}) HQ kept={} recv={}",
        comm.rank(),
        p,
        own_to - own_from,
        recv_cont.len()
    );

    if p >= 4 {
        if cfg.barriers {
            comm.barrier();
        }
        tracker.start("comm_split");
        let sub = comm.split_half();
        tracker.stop("comm_split");
        sort_rec(cont, sub, rng, bits, cfg, tracker)
    } else {
        cont
    }
}

fn select_pivot(
    cont: &StringContainer,
    comm: &Comm,
    rng: &mut WyRand,
    bits: &mut RandomBitStore,
    tag: Tag,
) -> StringBlock {
    debug_assert!(cont.is_consistent());
    let local = median_select::middle_most(cont, 2, rng, bits);
    let pivot = median_select::select(local, 2, comm, rng, bits, tag);
    assert!(
        pivot.bytes.last() == Some(&0),
        "pivot selection produced a malformed string"
    );
    if pivot.indexed {
        assert_eq!(pivot.indices.len(), 1, "pivot must carry exactly one index");
    }
    pivot
}

/// Position of the split point in the sorted local records.
///
/// Plain mode answers the pivot's lower bound; robust mode pulls the
/// split point towards the local midpoint while staying inside the
/// pivot's equal range, rounding the midpoint of an odd-sized container
/// up or down at random.
fn locate_splitter(
    cont: &StringContainer,
    pivot: &StringBlock,
    rng: &mut WyRand,
    bits: &mut RandomBitStore,
    robust: bool,
) -> usize {
    let pivot_str = &pivot.bytes[..pivot.bytes.len() - 1];
    let pivot_index = pivot.indices.first().copied().unwrap_or(0);
    let cmp_to_pivot = |r: &Record| match cmp_str(cont.str_of(r), pivot_str) {
        Ordering::Equal if cont.indexed() => r.index.cmp(&pivot_index),
        ord => ord,
    };

    let lower = cont
        .records()
        .partition_point(|r| cmp_to_pivot(r) == Ordering::Less);
    if !robust {
        return lower;
    }
    let upper = cont
        .records()
        .partition_point(|r| cmp_to_pivot(r) != Ordering::Greater);

    let opt = cont.len() / 2 + (cont.len() % 2 == 1 && bits.next_bit(rng)) as usize;
    if lower < opt {
        opt.min(upper)
    } else {
        lower
    }
}
