pub mod hyper_quicksort;
pub mod lcp_losertree;
pub mod splitter_sort;

use crate::container::{cross_cmp, ContainerBuilder, StringContainer};
use std::cmp::Ordering;

/// Merge two locally sorted containers into a fresh one in O(n)
/// comparisons, rebuilding a contiguous byte buffer.
pub(crate) fn merge_sorted(a: &StringContainer, b: &StringContainer) -> StringContainer {
    merge_sorted_ranges(a, 0, a.len(), b)
}

/// [`merge_sorted`] restricted to the records `[a_from, a_to)` of `a`.
pub(crate) fn merge_sorted_ranges(
    a: &StringContainer,
    a_from: usize,
    a_to: usize,
    b: &StringContainer,
) -> StringContainer {
    debug_assert_eq!(a.indexed(), b.indexed());
    debug_assert!(b.check_local_order());

    let mut out = ContainerBuilder::with_capacity(
        a.indexed(),
        (a_to - a_from) + b.len(),
        a.char_size() + b.char_size(),
    );
    let (mut i, mut j) = (a_from, 0);
    while i < a_to && j < b.len() {
        let ra = &a.records()[i];
        let rb = &b.records()[j];
        if cross_cmp(a, ra, b, rb) != Ordering::Greater {
            out.push(a.str_of(ra), ra.index);
            i += 1;
        } else {
            out.push(b.str_of(rb), rb.index);
            j += 1;
        }
    }
    for r in &a.records()[i..a_to] {
        out.push(a.str_of(r), r.index);
    }
    for r in &b.records()[j..] {
        out.push(b.str_of(r), r.index);
    }
    out.finish()
}
