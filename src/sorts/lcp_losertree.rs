//! K-way LCP-aware loser tree.
//!
//! Merges K ordered runs of one container in a single pass. Every duel is
//! short-circuited by the competitors' known common-prefix lengths
//! relative to the last emitted string: the competitor sharing the longer
//! prefix wins outright, and only on equal prefixes does the comparison
//! touch bytes, starting at the shared depth. This amortises the byte
//! scans to O(output chars + K log K).

use crate::container::{ContainerBuilder, StringContainer};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
struct Entry {
    leaf: usize,
    /// (record position, lcp against the last emitted string); `None` is
    /// the sentinel of a drained run and loses every duel.
    item: Option<(usize, u64)>,
}

struct LoserTree<'a> {
    cont: &'a StringContainer,
    lcps: &'a [u64],
    k: usize,
    losers: Vec<Entry>,
    cursor: Vec<usize>,
    ends: Vec<usize>,
}

impl<'a> LoserTree<'a> {
    fn new(cont: &'a StringContainer, ranges: &[(usize, usize)]) -> Self {
        let k = ranges.len();
        assert!(
            k.is_power_of_two() && k <= 512,
            "loser tree supports K in {{1, 2, 4, ..., 512}}, got {}",
            k
        );
        let lcps = cont
            .lcps()
            .expect("loser tree input needs per-run LCP values");
        let tree = Self {
            cont,
            lcps,
            k,
            losers: vec![
                Entry {
                    leaf: 0,
                    item: None
                };
                k
            ],
            cursor: ranges.iter().map(|&(start, _)| start).collect(),
            ends: ranges.iter().map(|&(start, len)| start + len).collect(),
        };
        debug_assert_eq!(
            ranges.iter().map(|&(_, len)| len).sum::<usize>(),
            cont.len()
        );
        tree
    }

    fn head(&self, leaf: usize, lcp: u64) -> Entry {
        let pos = self.cursor[leaf];
        Entry {
            leaf,
            item: if pos < self.ends[leaf] {
                Some((pos, lcp))
            } else {
                None
            },
        }
    }

    /// Returns (winner, loser); the loser's lcp is updated to be relative
    /// to the winner.
    fn duel(&self, x: Entry, y: Entry) -> (Entry, Entry) {
        let (px, lx) = match x.item {
            Some(it) => it,
            None => return (y, x),
        };
        let (py, ly) = match y.item {
            Some(it) => it,
            None => return (x, y),
        };
        // Both heads are >= the last emitted string and share lx resp. ly
        // leading bytes with it; the deeper one is the smaller.
        match lx.cmp(&ly) {
            Ordering::Greater => (x, y),
            Ordering::Less => (y, x),
            Ordering::Equal => {
                let sx = self.cont.str_of(&self.cont.records()[px]);
                let sy = self.cont.str_of(&self.cont.records()[py]);
                let mut h = lx as usize;
                let n = sx.len().min(sy.len());
                while h < n && sx[h] == sy[h] {
                    h += 1;
                }
                let ord = if h == sx.len() && h == sy.len() {
                    if self.cont.indexed() {
                        self.cont.records()[px]
                            .index
                            .cmp(&self.cont.records()[py].index)
                    } else {
                        Ordering::Equal
                    }
                } else if h == sx.len() {
                    Ordering::Less
                } else if h == sy.len() {
                    Ordering::Greater
                } else {
                    sx[h].cmp(&sy[h])
                };
                let h = h as u64;
                if ord != Ordering::Greater {
                    (x, Entry { leaf: y.leaf, item: Some((py, h)) })
                } else {
                    (y, Entry { leaf: x.leaf, item: Some((px, h)) })
                }
            }
        }
    }

    fn build(&mut self, node: usize) -> Entry {
        if node >= self.k {
            return self.head(node - self.k, 0);
        }
        let a = self.build(2 * node);
        let b = self.build(2 * node + 1);
        let (winner, loser) = self.duel(a, b);
        self.losers[node] = loser;
        winner
    }

    fn replay(&mut self, leaf: usize) -> Entry {
        // lcp of the fresh head against the last output: its run LCP,
        // because the run's previous element was just emitted.
        let lcp = if self.cursor[leaf] < self.ends[leaf] {
            self.lcps[self.cursor[leaf]]
        } else {
            0
        };
        let mut cur = self.head(leaf, lcp);
        let mut node = (self.k + leaf) / 2;
        while node >= 1 {
            let (winner, loser) = self.duel(cur, self.losers[node]);
            self.losers[node] = loser;
            cur = winner;
            node /= 2;
        }
        cur
    }
}

/// Merge the counted runs of `cont` (each individually sorted, with
/// attached per-run LCPs) into a fresh sorted container carrying the LCP
/// values of the merged order.
///
/// The number of ranges must be a power of two in {1, ..., 512}; callers
/// with fewer runs pad with empty (0, 0) ranges.
pub fn merge_runs(cont: &StringContainer, ranges: &[(usize, usize)]) -> StringContainer {
    let mut tree = LoserTree::new(cont, ranges);
    let mut out = ContainerBuilder::with_lcps(cont.indexed(), cont.len(), cont.char_size());

    let mut winner = tree.build(1);
    while let Some((pos, lcp)) = winner.item {
        let rec = &cont.records()[pos];
        out.push_with_lcp(cont.str_of(rec), rec.index, lcp);
        let leaf = winner.leaf;
        tree.cursor[leaf] += 1;
        winner = tree.replay(leaf);
    }
    out.finish()
}
