//! In-process fabric: one OS thread per processor, connected by
//! `std::sync::mpsc` channels.
//!
//! Channels give per-sender FIFO delivery, which is all the engine relies
//! on. A dropped endpoint surfaces as a send/recv error on its peers and
//! aborts them, matching the fatal-transport-failure rule.

use super::Comm;
use std::sync::mpsc;
use std::thread;

/// Run `f` on every rank of a fresh `procs`-processor group and return the
/// per-rank results in rank order.
pub fn run<T, F>(procs: usize, f: F) -> Vec<T>
where
    F: Fn(Comm) -> T + Send + Sync,
    T: Send,
{
    assert!(procs >= 1, "group must contain at least one processor");

    let mut txs = Vec::with_capacity(procs);
    let mut rxs = Vec::with_capacity(procs);
    for _ in 0..procs {
        let (tx, rx) = mpsc::channel();
        txs.push(tx);
        rxs.push(rx);
    }

    let f = &f;
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(procs);
        for (rank, rx) in rxs.into_iter().enumerate() {
            let txs = txs.clone();
            handles.push(s.spawn(move || f(Comm::world(rank, txs, rx, procs))));
        }
        handles
            .into_iter()
            .map(|h| h.join().expect("processor thread panicked"))
            .collect()
    })
}
