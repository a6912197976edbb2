//! Distributed sortedness checks.
//!
//! The cheap check looks at local order, rank occupancy and the order
//! across rank boundaries; the exhaustive checker gathers everything on
//! rank 0 and compares against a freshly sorted copy of the input.

use crate::comm::{Comm, Tag};
use crate::container::{cmp_str, StringContainer};
use std::cmp::Ordering;

fn boundary_payload(cont: &StringContainer, i: usize) -> Vec<u8> {
    let mut v = cont.index(i).to_le_bytes().to_vec();
    v.extend_from_slice(cont.get(i));
    v
}

fn boundary_leq(cont: &StringContainer, prev: &[u8], first: usize) -> bool {
    let prev_index = u64::from_le_bytes(prev[..8].try_into().unwrap());
    let prev_str = &prev[8..];
    match cmp_str(prev_str, cont.get(first)) {
        Ordering::Equal if cont.indexed() => prev_index <= cont.index(first),
        ord => ord != Ordering::Greater,
    }
}

/// True iff the distributed container is globally sorted: every local
/// record list is non-decreasing, no empty rank sits between two
/// non-empty ranks, and each rank's last string is <= its successor's
/// first. All checks AND-reduce across the group.
pub fn is_sorted(cont: &StringContainer, comm: &Comm, tag: Tag) -> bool {
    let locally = cont.check_local_order();
    if comm.size() == 1 {
        return locally;
    }

    let has = !cont.is_empty();
    let with_data = comm.all_reduce_sum(has as u64);
    if with_data <= 1 {
        return comm.all_reduce_and(locally);
    }

    let min_rank = comm.all_reduce_min(if has { comm.rank() as u64 } else { u64::MAX });
    let max_rank = comm.all_reduce_max(if has { comm.rank() as u64 } else { 0 });
    let contiguous = with_data == max_rank - min_rank + 1;

    let mut ok = locally && contiguous;
    if contiguous && has {
        let r = comm.rank() as u64;
        if r < max_rank {
            comm.send(comm.rank() + 1, tag, boundary_payload(cont, cont.len() - 1));
        }
        if r > min_rank {
            let prev = comm.recv(comm.rank() - 1, tag);
            ok &= boundary_leq(cont, &prev, 0);
        }
    }
    comm.all_reduce_and(ok)
}

/// [`is_sorted`] plus multiset conservation: the global string and char
/// counts must match those recorded before sorting.
pub fn is_complete_and_sorted(
    cont: &StringContainer,
    initial_strings: u64,
    initial_chars: u64,
    comm: &Comm,
    tag: Tag,
) -> bool {
    let strings_before = comm.all_reduce_sum(initial_strings);
    let chars_before = comm.all_reduce_sum(initial_chars);
    let strings_now = comm.all_reduce_sum(cont.len() as u64);
    let chars_now = comm.all_reduce_sum(cont.char_size() as u64);
    if strings_before != strings_now || chars_before != chars_now {
        return false;
    }
    is_sorted(cont, comm, tag)
}

/// Gather-and-compare checker. Snapshot the input before sorting, then
/// compare the gathered output against a locally sorted copy of the
/// gathered input on rank 0.
#[derive(Debug, Default)]
pub struct ExhaustiveChecker {
    input: Vec<u8>,
}

impl ExhaustiveChecker {
    pub fn store_input(cont: &StringContainer) -> Self {
        Self {
            input: cont.wire_bytes(0, cont.len()),
        }
    }

    pub fn check(&self, sorted: &StringContainer, comm: &Comm) -> bool {
        let gathered_sorted = comm.gather(0, sorted.wire_bytes(0, sorted.len()));
        let gathered_input = comm.gather(0, self.input.clone());
        let ok = match (gathered_sorted, gathered_input) {
            (Some(sorted_parts), Some(input_parts)) => {
                let mut oracle = StringContainer::from_bytes(input_parts.concat());
                oracle.sort_locally();
                oracle.into_block().bytes == sorted_parts.concat()
            }
            _ => true,
        };
        comm.all_reduce_and(ok)
    }
}
