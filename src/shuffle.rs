//! Hypercube shuffle.
//!
//! log2(P) bit-flip phases; in phase f every string is routed to self or
//! to partner rank ^ 2^f by a fresh random bit. Afterwards the local set
//! is a uniform random sample of the global multiset, which defuses
//! adversarial input placements ahead of the hyper-quicksort.

use crate::comm::{Comm, Tag};
use crate::container::{StringBlock, StringContainer};
use crate::random_bits::RandomBitStore;
use nanorand::WyRand;

/// Shuffle the container's strings across the group in place. The PRNG is
/// the per-processor stream, not the group-synchronous one.
pub fn shuffle(
    cont: &mut StringContainer,
    comm: &Comm,
    rng: &mut WyRand,
    bits: &mut RandomBitStore,
    tag: Tag,
) {
    let p = comm.size();
    assert!(p.is_power_of_two(), "shuffle needs a power-of-two group");
    if p == 1 {
        return;
    }

    let indexed = cont.indexed();
    for phase in 0..p.trailing_zeros() {
        let partner = comm.rank() ^ (1usize << phase);

        let mut keep_bytes = Vec::with_capacity(cont.char_size());
        let mut keep_indices = Vec::new();
        let mut send_bytes = Vec::new();
        let mut send_indices = Vec::new();
        for r in cont.records() {
            if bits.next_bit(rng) {
                send_bytes.extend_from_slice(cont.str_of_with_nul(r));
                if indexed {
                    send_indices.push(r.index);
                }
            } else {
                keep_bytes.extend_from_slice(cont.str_of_with_nul(r));
                if indexed {
                    keep_indices.push(r.index);
                }
            }
        }

        let send = StringBlock {
            bytes: send_bytes,
            indices: send_indices,
            indexed,
        };
        let recv = send.exchange(comm, partner, tag);

        keep_bytes.extend_from_slice(&recv.bytes);
        if indexed {
            keep_indices.extend(recv.indices);
            cont.update_indexed(keep_bytes, keep_indices);
        } else {
            cont.update(keep_bytes);
        }
    }
}
