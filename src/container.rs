use crate::comm::{Comm, Tag};
use std::cmp::Ordering;

#[cfg(feature = "multi-threaded")]
use rayon::prelude::*;

/// Compare two zero-free byte strings in lexicographic order.
///
/// Strings never contain interior zero bytes, so plain slice order is
/// exactly the order of the zero-terminated wire form.
#[inline]
pub fn cmp_str(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Length of the longest common prefix of `a` and `b`.
#[inline]
pub fn lcp(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let mut i = 0;
    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

/// Pack a u64 slice into little-endian wire bytes.
pub fn encode_u64s(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Reverse of [`encode_u64s`].
pub fn decode_u64s(bytes: &[u8]) -> Vec<u64> {
    assert!(bytes.len() % 8 == 0, "index payload not a multiple of 8 bytes");
    bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// One string of a [`StringContainer`]: offset and length into the
/// container's byte buffer, plus an index that only participates in
/// comparisons when the owning container is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    start: usize,
    len: usize,
    pub index: u64,
}

impl Record {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
}

/// Owns a contiguous buffer of zero-terminated strings and the record list
/// describing them.
///
/// Indexing is chosen at construction and sticks: every operation on an
/// indexed container moves the index stream along with the bytes, and the
/// active order becomes (bytes, index) instead of bytes alone.
#[derive(Debug, Default)]
pub struct StringContainer {
    bytes: Vec<u8>,
    records: Vec<Record>,
    indexed: bool,
    lcps: Option<Vec<u64>>,
}

impl StringContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_indexed() -> Self {
        Self {
            indexed: true,
            ..Self::default()
        }
    }

    /// Build a container from a raw `(string || 0)*` buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let records = scan_records(&bytes);
        Self {
            bytes,
            records,
            indexed: false,
            lcps: None,
        }
    }

    /// Build an indexed container; `indices` must carry one entry per
    /// terminated string in `bytes`.
    pub fn from_indexed_bytes(bytes: Vec<u8>, indices: Vec<u64>) -> Self {
        let mut records = scan_records(&bytes);
        assert_eq!(
            records.len(),
            indices.len(),
            "index stream does not match string count"
        );
        for (r, idx) in records.iter_mut().zip(indices) {
            r.index = idx;
        }
        Self {
            bytes,
            records,
            indexed: true,
            lcps: None,
        }
    }

    /// Replace the byte buffer; records are rebuilt by scanning for
    /// terminators. Any attached LCP array is dropped.
    pub fn update(&mut self, bytes: Vec<u8>) {
        assert!(!self.indexed, "indexed container updated without indices");
        self.records = scan_records(&bytes);
        self.bytes = bytes;
        self.lcps = None;
    }

    pub fn update_indexed(&mut self, bytes: Vec<u8>, indices: Vec<u64>) {
        assert!(self.indexed, "plain container updated with indices");
        let mut records = scan_records(&bytes);
        assert_eq!(
            records.len(),
            indices.len(),
            "index stream does not match string count"
        );
        for (r, idx) in records.iter_mut().zip(indices) {
            r.index = idx;
        }
        self.records = records;
        self.bytes = bytes;
        self.lcps = None;
    }

    pub(crate) fn from_parts(
        bytes: Vec<u8>,
        records: Vec<Record>,
        indexed: bool,
        lcps: Option<Vec<u64>>,
    ) -> Self {
        let cont = Self {
            bytes,
            records,
            indexed,
            lcps,
        };
        debug_assert!(cont.is_consistent());
        cont
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total size of the byte buffer, terminators included.
    #[inline]
    pub fn char_size(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn indexed(&self) -> bool {
        self.indexed
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// String `i` without its terminator.
    #[inline]
    pub fn get(&self, i: usize) -> &[u8] {
        self.str_of(&self.records[i])
    }

    #[inline]
    pub fn index(&self, i: usize) -> u64 {
        self.records[i].index
    }

    #[inline]
    pub fn str_of(&self, r: &Record) -> &[u8] {
        &self.bytes[r.start..r.start + r.len]
    }

    /// String of record `r` including the terminator.
    #[inline]
    pub fn str_of_with_nul(&self, r: &Record) -> &[u8] {
        &self.bytes[r.start..r.start + r.len + 1]
    }

    pub fn lcps(&self) -> Option<&[u64]> {
        self.lcps.as_deref()
    }

    pub fn take_lcps(&mut self) -> Option<Vec<u64>> {
        self.lcps.take()
    }

    /// Compare two records of this container under the active order.
    #[inline]
    pub fn record_cmp(&self, a: &Record, b: &Record) -> Ordering {
        match cmp_str(self.str_of(a), self.str_of(b)) {
            Ordering::Equal if self.indexed => a.index.cmp(&b.index),
            ord => ord,
        }
    }

    /// Sort the record list under the active order. The byte buffer is not
    /// touched; any attached LCP array is dropped.
    pub fn sort_locally(&mut self) {
        let mut records = std::mem::take(&mut self.records);
        let bytes = &self.bytes;
        let indexed = self.indexed;
        let cmp = |a: &Record, b: &Record| {
            match cmp_str(&bytes[a.start..a.start + a.len], &bytes[b.start..b.start + b.len]) {
                Ordering::Equal if indexed => a.index.cmp(&b.index),
                ord => ord,
            }
        };

        #[cfg(feature = "multi-threaded")]
        records.par_sort_unstable_by(cmp);
        #[cfg(not(feature = "multi-threaded"))]
        records.sort_unstable_by(cmp);

        self.records = records;
        self.lcps = None;
    }

    /// True iff adjacent records compare non-decreasing under the active
    /// order.
    pub fn check_local_order(&self) -> bool {
        self.records
            .windows(2)
            .all(|w| self.record_cmp(&w[0], &w[1]) != Ordering::Greater)
    }

    /// Verify the container invariants: records in bounds, terminator in
    /// place, no interior zero bytes.
    pub fn is_consistent(&self) -> bool {
        for r in &self.records {
            if r.start + r.len >= self.bytes.len() {
                return false;
            }
            if self.bytes[r.start + r.len] != 0 {
                return false;
            }
            if self.bytes[r.start..r.start + r.len].contains(&0) {
                return false;
            }
        }
        if let Some(lcps) = &self.lcps {
            if lcps.len() != self.records.len() {
                return false;
            }
        }
        true
    }

    /// Attach LCP values for a buffer that is a concatenation of counted,
    /// individually sorted runs: 0 at the start of each run, the pairwise
    /// LCP inside a run.
    pub fn compute_lcps_in_runs(&mut self, counts: &[usize]) {
        debug_assert_eq!(counts.iter().sum::<usize>(), self.records.len());
        let mut lcps = vec![0u64; self.records.len()];
        let mut offset = 0;
        for &count in counts {
            for i in 1..count {
                let prev = &self.records[offset + i - 1];
                let cur = &self.records[offset + i];
                lcps[offset + i] = lcp(self.str_of(prev), self.str_of(cur)) as u64;
            }
            offset += count;
        }
        self.lcps = Some(lcps);
    }

    /// Wire form of the records in `[from, to)`: their strings
    /// concatenated, terminators included.
    pub fn wire_bytes(&self, from: usize, to: usize) -> Vec<u8> {
        let total: usize = self.records[from..to].iter().map(|r| r.len + 1).sum();
        let mut out = Vec::with_capacity(total);
        for r in &self.records[from..to] {
            out.extend_from_slice(self.str_of_with_nul(r));
        }
        out
    }

    pub fn wire_indices(&self, from: usize, to: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity((to - from) * 8);
        for r in &self.records[from..to] {
            out.extend_from_slice(&r.index.to_le_bytes());
        }
        out
    }

    /// Move the whole container into wire form.
    pub fn into_block(self) -> StringBlock {
        let bytes = self.wire_bytes(0, self.records.len());
        let indices = if self.indexed {
            self.records.iter().map(|r| r.index).collect()
        } else {
            Vec::new()
        };
        StringBlock {
            bytes,
            indices,
            indexed: self.indexed,
        }
    }
}

/// Compare records from two different containers under their (shared)
/// active order.
#[inline]
pub fn cross_cmp(
    a: &StringContainer,
    ra: &Record,
    b: &StringContainer,
    rb: &Record,
) -> Ordering {
    debug_assert_eq!(a.indexed(), b.indexed());
    match cmp_str(a.str_of(ra), b.str_of(rb)) {
        Ordering::Equal if a.indexed() => ra.index.cmp(&rb.index),
        ord => ord,
    }
}

/// Assembles a fresh container string by string, rebuilding a contiguous
/// byte buffer along the way. Used by every merge that produces a new
/// ordering.
#[derive(Debug)]
pub struct ContainerBuilder {
    bytes: Vec<u8>,
    records: Vec<Record>,
    indexed: bool,
    lcps: Option<Vec<u64>>,
}

impl ContainerBuilder {
    pub fn new(indexed: bool) -> Self {
        Self {
            bytes: Vec::new(),
            records: Vec::new(),
            indexed,
            lcps: None,
        }
    }

    pub fn with_capacity(indexed: bool, strings: usize, chars: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(chars),
            records: Vec::with_capacity(strings),
            indexed,
            lcps: None,
        }
    }

    /// Like [`ContainerBuilder::with_capacity`], but the finished
    /// container carries an LCP array even when no string is pushed.
    pub fn with_lcps(indexed: bool, strings: usize, chars: usize) -> Self {
        let mut b = Self::with_capacity(indexed, strings, chars);
        b.lcps = Some(Vec::with_capacity(strings));
        b
    }

    /// Append a string (without terminator).
    pub fn push(&mut self, s: &[u8], index: u64) {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(s);
        self.bytes.push(0);
        self.records.push(Record {
            start,
            len: s.len(),
            index,
        });
    }

    /// Append a string together with its LCP against the previously pushed
    /// one. Mixing this with [`ContainerBuilder::push`] is a logic error.
    pub fn push_with_lcp(&mut self, s: &[u8], index: u64, lcp: u64) {
        self.lcps.get_or_insert_with(Vec::new).push(lcp);
        self.push(s, index);
    }

    pub fn finish(self) -> StringContainer {
        if let Some(lcps) = &self.lcps {
            assert_eq!(lcps.len(), self.records.len());
        }
        StringContainer::from_parts(self.bytes, self.records, self.indexed, self.lcps)
    }
}

fn scan_records(bytes: &[u8]) -> Vec<Record> {
    if let Some(&last) = bytes.last() {
        assert_eq!(last, 0, "string buffer does not end with a terminator");
    }
    let mut records = Vec::new();
    let mut start = 0;
    for (pos, &b) in bytes.iter().enumerate() {
        if b == 0 {
            records.push(Record {
                start,
                len: pos - start,
                index: 0,
            });
            start = pos + 1;
        }
    }
    records
}

/// The wire form of a set of strings: a `(string || 0)*` byte payload and,
/// for indexed data, a parallel packed little-endian u64 index stream.
///
/// Indexed blocks travel as two messages with tags (T, T+1) so the control
/// path never branches per message on the receiving side.
#[derive(Debug, Default, Clone)]
pub struct StringBlock {
    pub bytes: Vec<u8>,
    pub indices: Vec<u64>,
    pub indexed: bool,
}

impl StringBlock {
    pub fn plain(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            indices: Vec::new(),
            indexed: false,
        }
    }

    pub fn indexed(bytes: Vec<u8>, indices: Vec<u64>) -> Self {
        Self {
            bytes,
            indices,
            indexed: true,
        }
    }

    /// Wire form of the records `[from, to)` of `cont`.
    pub fn from_range(cont: &StringContainer, from: usize, to: usize) -> Self {
        Self {
            bytes: cont.wire_bytes(from, to),
            indices: if cont.indexed() {
                cont.records()[from..to].iter().map(|r| r.index).collect()
            } else {
                Vec::new()
            },
            indexed: cont.indexed(),
        }
    }

    pub fn into_container(self) -> StringContainer {
        if self.indexed {
            StringContainer::from_indexed_bytes(self.bytes, self.indices)
        } else {
            StringContainer::from_bytes(self.bytes)
        }
    }

    /// Ship this block to `to`; the index stream rides on `tag + 1`.
    pub fn send(self, comm: &Comm, to: usize, tag: Tag) {
        comm.send(to, tag, self.bytes);
        if self.indexed {
            comm.send(to, tag + 1, encode_u64s(&self.indices));
        }
    }

    pub fn recv(comm: &Comm, from: usize, tag: Tag, indexed: bool) -> Self {
        let bytes = comm.recv(from, tag);
        let indices = if indexed {
            decode_u64s(&comm.recv(from, tag + 1))
        } else {
            Vec::new()
        };
        Self {
            bytes,
            indices,
            indexed,
        }
    }

    /// Receive a block from `from` and append it to this one.
    pub fn recv_append(&mut self, comm: &Comm, from: usize, tag: Tag) {
        let recv = Self::recv(comm, from, tag, self.indexed);
        self.bytes.extend_from_slice(&recv.bytes);
        self.indices.extend_from_slice(&recv.indices);
    }

    /// Symmetric exchange with `partner`: both sides send their block and
    /// return the partner's.
    pub fn exchange(self, comm: &Comm, partner: usize, tag: Tag) -> Self {
        let indexed = self.indexed;
        comm.send(partner, tag, self.bytes);
        if indexed {
            comm.send(partner, tag + 1, encode_u64s(&self.indices));
        }
        let bytes = comm.recv(partner, tag);
        let indices = if indexed {
            decode_u64s(&comm.recv(partner, tag + 1))
        } else {
            Vec::new()
        };
        Self {
            bytes,
            indices,
            indexed,
        }
    }
}
