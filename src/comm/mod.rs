//! Processor groups and the collective operations the sorters run on.
//!
//! A [`Comm`] is a handle onto one group of processors. Point-to-point
//! messages are tagged byte payloads; delivery is in-order per
//! (source, destination, tag). Collectives follow the usual SPMD
//! discipline: every rank of the group calls the same operation in the
//! same order, and every collective runs on the *current* group handle.
//!
//! Group handles are cheap to clone and are replaced wholesale at
//! split boundaries ([`Comm::split_half`], [`Comm::shrink`],
//! [`Comm::duplicate`]); sub-group handles are never reused across
//! recursion frames.

pub mod local;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender};

/// Message tag. An engine invocation with base tag T reserves [T, T+1].
pub type Tag = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    User(Tag),
    Barrier(u32),
    Bcast,
    Gather,
    AllGather,
    AllToAll,
}

pub(crate) struct Envelope {
    group: u64,
    src: usize,
    class: Class,
    data: Vec<u8>,
}

pub(crate) struct Endpoint {
    world_rank: usize,
    tx: Vec<Sender<Envelope>>,
    rx: Receiver<Envelope>,
    stash: RefCell<VecDeque<Envelope>>,
}

/// Handle onto one processor group.
///
/// Owned by exactly one worker thread; the engine never shares a `Comm`
/// across threads (local fork-join parallelism stays below the
/// message-passing layer).
#[derive(Clone)]
pub struct Comm {
    ep: Rc<Endpoint>,
    group: u64,
    members: Rc<Vec<usize>>,
    rank: usize,
}

impl Comm {
    pub(crate) fn world(
        world_rank: usize,
        tx: Vec<Sender<Envelope>>,
        rx: Receiver<Envelope>,
        procs: usize,
    ) -> Self {
        Self {
            ep: Rc::new(Endpoint {
                world_rank,
                tx,
                rx,
                stash: RefCell::new(VecDeque::new()),
            }),
            group: 0,
            members: Rc::new((0..procs).collect()),
            rank: world_rank,
        }
    }

    /// Rank of this processor within the group.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of processors in the group.
    #[inline]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    fn post(&self, to: usize, class: Class, data: Vec<u8>) {
        let env = Envelope {
            group: self.group,
            src: self.ep.world_rank,
            class,
            data,
        };
        self.ep.tx[self.members[to]]
            .send(env)
            .expect("transport failure: peer endpoint is gone");
    }

    fn take(&self, from: usize, class: Class) -> Vec<u8> {
        let src = self.members[from];
        {
            let mut stash = self.ep.stash.borrow_mut();
            if let Some(pos) = stash
                .iter()
                .position(|e| e.group == self.group && e.src == src && e.class == class)
            {
                return stash.remove(pos).unwrap().data;
            }
        }
        loop {
            let env = self
                .ep
                .rx
                .recv()
                .expect("transport failure: fabric disconnected");
            if env.group == self.group && env.src == src && env.class == class {
                return env.data;
            }
            self.ep.stash.borrow_mut().push_back(env);
        }
    }

    /// Send `data` to group rank `to` under `tag`.
    pub fn send(&self, to: usize, tag: Tag, data: Vec<u8>) {
        self.post(to, Class::User(tag), data);
    }

    /// Receive the next payload from group rank `from` under `tag`.
    pub fn recv(&self, from: usize, tag: Tag) -> Vec<u8> {
        self.take(from, Class::User(tag))
    }

    /// Symmetric send+receive with `partner`.
    pub fn exchange(&self, partner: usize, tag: Tag, data: Vec<u8>) -> Vec<u8> {
        self.send(partner, tag, data);
        self.recv(partner, tag)
    }

    /// Dissemination barrier across the group.
    pub fn barrier(&self) {
        let p = self.size();
        let r = self.rank;
        let mut round = 0u32;
        let mut step = 1;
        while step < p {
            self.post((r + step) % p, Class::Barrier(round), Vec::new());
            let _ = self.take((r + p - step) % p, Class::Barrier(round));
            round += 1;
            step <<= 1;
        }
    }

    /// Broadcast `data` from `root`; every rank returns the root's payload.
    /// Non-root ranks pass their payload argument unused.
    pub fn bcast(&self, root: usize, data: Vec<u8>) -> Vec<u8> {
        if self.rank == root {
            for i in 0..self.size() {
                if i != root {
                    self.post(i, Class::Bcast, data.clone());
                }
            }
            data
        } else {
            self.take(root, Class::Bcast)
        }
    }

    /// Gather every rank's payload at `root` (rank order). Non-roots get
    /// `None`.
    pub fn gather(&self, root: usize, data: Vec<u8>) -> Option<Vec<Vec<u8>>> {
        if self.rank == root {
            let mut out: Vec<Vec<u8>> = vec![Vec::new(); self.size()];
            out[root] = data;
            for i in 0..self.size() {
                if i != root {
                    out[i] = self.take(i, Class::Gather);
                }
            }
            Some(out)
        } else {
            self.post(root, Class::Gather, data);
            None
        }
    }

    /// All ranks end up with every rank's payload, in rank order.
    pub fn all_gather(&self, data: Vec<u8>) -> Vec<Vec<u8>> {
        let p = self.size();
        for i in 0..p {
            if i != self.rank {
                self.post(i, Class::AllGather, data.clone());
            }
        }
        let mut out: Vec<Vec<u8>> = vec![Vec::new(); p];
        out[self.rank] = data;
        for i in 0..p {
            if i != self.rank {
                out[i] = self.take(i, Class::AllGather);
            }
        }
        out
    }

    /// [`Comm::all_gather`] with the per-rank payloads concatenated.
    pub fn all_gatherv(&self, data: Vec<u8>) -> Vec<u8> {
        self.all_gather(data).concat()
    }

    pub fn all_gather_u64(&self, v: u64) -> Vec<u64> {
        self.all_gather(v.to_le_bytes().to_vec())
            .iter()
            .map(|b| u64::from_le_bytes(b[..8].try_into().unwrap()))
            .collect()
    }

    /// Personalised exchange: `parts[i]` goes to rank i; the result holds
    /// one payload per peer, in rank order.
    pub fn all_to_all(&self, mut parts: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        let p = self.size();
        assert_eq!(parts.len(), p, "all_to_all needs one payload per peer");
        let own = std::mem::take(&mut parts[self.rank]);
        for (i, part) in parts.into_iter().enumerate() {
            if i != self.rank {
                self.post(i, Class::AllToAll, part);
            }
        }
        let mut out: Vec<Vec<u8>> = vec![Vec::new(); p];
        out[self.rank] = own;
        for i in 0..p {
            if i != self.rank {
                out[i] = self.take(i, Class::AllToAll);
            }
        }
        out
    }

    /// One u64 per peer in each direction; the counts exchange of the
    /// redistribution steps.
    pub fn all_to_all_u64(&self, vals: &[u64]) -> Vec<u64> {
        let parts = vals.iter().map(|v| v.to_le_bytes().to_vec()).collect();
        self.all_to_all(parts)
            .iter()
            .map(|b| u64::from_le_bytes(b[..8].try_into().unwrap()))
            .collect()
    }

    pub fn all_reduce_sum(&self, v: u64) -> u64 {
        self.all_gather_u64(v).iter().sum()
    }

    pub fn all_reduce_min(&self, v: u64) -> u64 {
        self.all_gather_u64(v).into_iter().min().unwrap()
    }

    pub fn all_reduce_max(&self, v: u64) -> u64 {
        self.all_gather_u64(v).into_iter().max().unwrap()
    }

    pub fn all_reduce_and(&self, v: bool) -> bool {
        self.all_reduce_min(v as u64) == 1
    }

    /// Split the group into its lower and upper half of consecutive ranks.
    /// The group size must be even.
    pub fn split_half(&self) -> Comm {
        let p = self.size();
        assert!(p >= 2 && p % 2 == 0, "cannot halve a group of {}", p);
        let half = p / 2;
        let lower = self.rank < half;
        let (members, rank) = if lower {
            (self.members[..half].to_vec(), self.rank)
        } else {
            (self.members[half..].to_vec(), self.rank - half)
        };
        Comm {
            ep: Rc::clone(&self.ep),
            group: self.group * 8 + if lower { 1 } else { 2 },
            members: Rc::new(members),
            rank,
        }
    }

    /// Form the sub-group over ranks [0, q). Ranks outside it get `None`.
    /// Collective: every rank of the parent group must call it.
    pub fn shrink(&self, q: usize) -> Option<Comm> {
        assert!(q >= 1 && q <= self.size());
        if self.rank >= q {
            return None;
        }
        Some(Comm {
            ep: Rc::clone(&self.ep),
            group: self.group * 8 + 3,
            members: Rc::new(self.members[..q].to_vec()),
            rank: self.rank,
        })
    }

    /// A fresh group over the same members, with its own message space.
    pub fn duplicate(&self) -> Comm {
        Comm {
            ep: Rc::clone(&self.ep),
            group: self.group * 8 + 4,
            members: Rc::clone(&self.members),
            rank: self.rank,
        }
    }
}
