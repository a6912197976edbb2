//! Binary-tree median selection.
//!
//! Reduces one candidate set of at most k sorted strings per processor up
//! a balanced binary tree. At every level the receiver merges its own set
//! with its partner's and keeps the k middle-most survivors; after
//! log2(P) levels rank 0 picks the middle survivor and broadcasts it.

use crate::comm::{Comm, Tag};
use crate::container::{decode_u64s, encode_u64s, StringBlock, StringContainer};
use crate::random_bits::RandomBitStore;
use crate::sorts::merge_sorted;
use nanorand::WyRand;

/// Wire block of the k middle-most records of a sorted container.
///
/// When the parities of the container size and k differ there is no exact
/// middle; a shared random bit decides whether to round the window up or
/// down.
pub fn middle_most(
    cont: &StringContainer,
    k: usize,
    rng: &mut WyRand,
    bits: &mut RandomBitStore,
) -> StringBlock {
    if cont.len() <= k {
        return StringBlock::from_range(cont, 0, cont.len());
    }
    let offset = (cont.len() - k) / 2;
    let same_parity = cont.len() % 2 == k % 2;
    let shift = if same_parity {
        0
    } else {
        bits.next_bit(rng) as usize
    };
    StringBlock::from_range(cont, offset + shift, offset + shift + k)
}

fn keep_middle(
    cont: StringContainer,
    k: usize,
    rng: &mut WyRand,
    bits: &mut RandomBitStore,
) -> StringContainer {
    if cont.len() <= k {
        return cont;
    }
    middle_most(&cont, k, rng, bits).into_container()
}

/// Run the reduction over the whole group and return the selected median
/// string on every rank.
///
/// `local` must hold the locally sorted candidate set (at most k strings).
/// The group size must be a power of two.
pub fn select(
    local: StringBlock,
    k: usize,
    comm: &Comm,
    rng: &mut WyRand,
    bits: &mut RandomBitStore,
    tag: Tag,
) -> StringBlock {
    let p = comm.size();
    assert!(
        p.is_power_of_two(),
        "median selection needs a power-of-two group, got {}",
        p
    );
    let indexed = local.indexed;
    let mut set = local.into_container();
    debug_assert!(set.check_local_order());

    let mut level = 0;
    while (1usize << level) < p {
        let bit = 1usize << level;
        if comm.rank() & (bit - 1) == 0 {
            if comm.rank() & bit == 0 {
                let recv =
                    StringBlock::recv(comm, comm.rank() + bit, tag, indexed).into_container();
                set = keep_middle(merge_sorted(&set, &recv), k, rng, bits);
            } else {
                set.into_block().send(comm, comm.rank() - bit, tag);
                set = if indexed {
                    StringContainer::new_indexed()
                } else {
                    StringContainer::new()
                };
            }
        }
        level += 1;
    }

    let pick = if comm.rank() == 0 {
        assert!(!set.is_empty(), "median selection over an empty candidate multiset");
        let n = set.len();
        let mid = if n % 2 == 1 {
            n / 2
        } else {
            n / 2 - 1 + bits.next_bit(rng) as usize
        };
        StringBlock::from_range(&set, mid, mid + 1)
    } else {
        StringBlock {
            bytes: Vec::new(),
            indices: Vec::new(),
            indexed,
        }
    };

    let bytes = comm.bcast(0, pick.bytes);
    let indices = if indexed {
        decode_u64s(&comm.bcast(0, encode_u64s(&pick.indices)))
    } else {
        Vec::new()
    };
    StringBlock {
        bytes,
        indices,
        indexed,
    }
}
