//! # rdss
//!
//! rdss is a distributed sorting engine for variable-length,
//! zero-terminated byte strings, partitioned across the processors of a
//! message-passing group.
//!
//! On input every processor owns an arbitrary slice of the global
//! multiset; on output every processor owns a contiguous run of the
//! globally sorted sequence, with the multiset preserved and the load
//! approximately balanced. Two sorters share one infrastructure:
//!
//!  * a recursive **hyper-quicksort** over power-of-two processor groups
//!    ([`sorts::hyper_quicksort`]), with binary-tree median selection for
//!    pivots, pairwise partition exchange and local merging. Groups of
//!    any size are first folded onto the largest power-of-two subcube and
//!    shuffled to defuse adversarial placements;
//!  * a **splitter partitioner** ([`sorts::splitter_sort`]) that samples
//!    each processor, sorts the sample with the hyper-quicksort, selects
//!    global splitters, redistributes everything in one all-to-all and
//!    fuses the received runs with an LCP-aware loser tree.
//!
//! On top of these, [`prefix_doubling`] computes each string's
//! distinguishing prefix with rounds of distributed hash filtering and
//! can sort the truncated strings instead of the full payload.
//!
//! The message-passing seam is [`comm::Comm`]; [`comm::local`] runs a
//! whole group inside one process, which is how the crate is tested and
//! benchmarked.
//!
//! ## Usage
//!
//! ```
//! use rdss::comm::local;
//! use rdss::container::StringBlock;
//! use rdss::sorts::hyper_quicksort::{sort, SortConfig};
//! use rdss::tracker::NoTracker;
//!
//! let words = ["delta", "alpha", "carol", "bravo"];
//! let per_rank = local::run(4, |comm| {
//!     let mut bytes = words[comm.rank()].as_bytes().to_vec();
//!     bytes.push(0);
//!     let cfg = SortConfig::new(1, 100);
//!     let cont = sort(StringBlock::plain(bytes), &comm, &cfg, &mut NoTracker);
//!     (0..cont.len())
//!         .map(|i| String::from_utf8(cont.get(i).to_vec()).unwrap())
//!         .collect::<Vec<_>>()
//! });
//! let flat: Vec<String> = per_rank.into_iter().flatten().collect();
//! assert_eq!(flat, ["alpha", "bravo", "carol", "delta"]);
//! ```
//!
//! ## Indexed mode
//!
//! Containers built with indices sort by (bytes, index), making the
//! order total and the sort stable; the index stream travels beside the
//! byte payload on a companion message tag throughout.
//!
//! ## License
//!
//! Licensed under either of
//!
//! * Apache License, Version 2.0, ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

pub mod bloom_filter;
pub mod comm;
pub mod container;
pub mod golomb;
pub mod input;
pub mod median_select;
pub mod prefix_doubling;
pub mod random_bits;
pub mod sample;
pub mod shuffle;
pub mod sorts;
pub mod tracker;
pub mod verify;

#[cfg(test)]
mod tests;

pub use container::{StringBlock, StringContainer};
pub use sorts::hyper_quicksort::{sort, Mode, SortConfig};
pub use sorts::splitter_sort::partition_sort;
