use crate::comm::local;
use crate::container::{StringBlock, StringContainer};
use crate::input;
use crate::median_select;
use crate::prefix_doubling::{
    distinguishing_prefixes, global_avg_lcp, prefix_doubled_sort, PrefixDoublingConfig,
};
use crate::bloom_filter::HashTransport;
use crate::sample::Sampling;
use crate::shuffle::shuffle;
use crate::sorts::hyper_quicksort::{sort, Mode, SortConfig};
use crate::sorts::splitter_sort::partition_sort;
use crate::random_bits::RandomBitStore;
use crate::tracker::{NoTracker, SortTimers, Tracker};
use crate::verify;
use nanorand::{Rng, WyRand};

fn wire(strs: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strs {
        out.extend_from_slice(s);
        out.push(0);
    }
    out
}

fn cont_strings(cont: &StringContainer) -> Vec<Vec<u8>> {
    (0..cont.len()).map(|i| cont.get(i).to_vec()).collect()
}

fn cont_indices(cont: &StringContainer) -> Vec<u64> {
    (0..cont.len()).map(|i| cont.index(i)).collect()
}

fn random_string(rng: &mut WyRand, len: usize, lo: u8, hi: u8) -> Vec<u8> {
    (0..len).map(|_| rng.generate_range(lo..=hi)).collect()
}

#[test]
pub fn tiny_power_of_two_group() {
    let pool: [&[u8]; 6] = [b"apple", b"ant", b"ape", b"apply", b"banana", b"bee"];
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(40 + comm.rank() as u64);
        let mut input: Vec<Vec<u8>> = Vec::new();
        for _ in 0..3 {
            input.push(pool[rng.generate_range(0..pool.len())].to_vec());
        }
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cont = sort(
            StringBlock::plain(wire(&borrowed)),
            &comm,
            &SortConfig::new(7, 100),
            &mut NoTracker,
        );
        // with 3 strings per rank the occupancy rule of the full
        // validator is too strict; local order plus the global sequence
        // check below cover this scenario
        assert!(cont.check_local_order());
        (input, cont_strings(&cont))
    });

    let mut expected: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
pub fn non_power_of_two_group() {
    let per_rank = local::run(3, |comm| {
        let mut rng = WyRand::new_seed(17 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..5)
            .map(|_| random_string(&mut rng, 4, b'A', b'Z'))
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cont = sort(
            StringBlock::plain(wire(&borrowed)),
            &comm,
            &SortConfig::new(11, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&cont, &comm, 900));
        (input, cont_strings(&cont))
    });

    // the third processor is folded away and must come back empty
    assert!(per_rank[2].1.is_empty());
    let mut expected: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
pub fn all_equal_input() {
    let per_rank = local::run(8, |comm| {
        let input = vec![b"xxxx".as_slice(); 100];
        let cont = sort(
            StringBlock::plain(wire(&input)),
            &comm,
            &SortConfig::new(23, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&cont, &comm, 900));
        for i in 0..cont.len() {
            assert_eq!(cont.get(i), b"xxxx");
        }
        cont.len()
    });
    assert_eq!(per_rank.iter().sum::<usize>(), 800);
    // robust splitter placement keeps the equal-key load spread out
    for &n in &per_rank {
        assert!(n >= 50 && n <= 150, "rank ended up with {} strings", n);
    }
}

#[test]
pub fn all_equal_input_indexed_is_stable() {
    let per_rank = local::run(8, |comm| {
        let input = vec![b"xxxx".as_slice(); 100];
        let indices: Vec<u64> = (0..100).map(|i| (comm.rank() * 100 + i) as u64).collect();
        let cont = StringContainer::from_indexed_bytes(wire(&input), indices);
        let sorted = partition_sort(
            cont,
            &comm,
            &Sampling::num_strings().indexed(),
            &SortConfig::new(29, 100),
            &mut NoTracker,
        );
        cont_indices(&sorted)
    });
    // every processor owns one contiguous block of input positions
    let flat: Vec<u64> = per_rank.into_iter().flatten().collect();
    assert_eq!(flat, (0..800).collect::<Vec<u64>>());
}

#[test]
pub fn heavy_skew_rebalances() {
    let per_rank = local::run(4, |comm| {
        let input: Vec<Vec<u8>> = if comm.rank() == 0 {
            let mut rng = WyRand::new_seed(5);
            (0..10_000)
                .map(|_| random_string(&mut rng, 6, b'a', b'z'))
                .collect()
        } else {
            Vec::new()
        };
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cont = sort(
            StringBlock::plain(wire(&borrowed)),
            &comm,
            &SortConfig::new(31, 100),
            &mut NoTracker,
        );
        assert!(verify::is_complete_and_sorted(
            &cont,
            input.len() as u64,
            borrowed.iter().map(|s| s.len() as u64 + 1).sum(),
            &comm,
            900,
        ));
        (input, cont_strings(&cont))
    });

    let mut expected: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
    for (_, out) in &per_rank {
        assert!(
            out.len() >= 1_800 && out.len() <= 3_200,
            "rank holds {} of 10000",
            out.len()
        );
    }
}

#[test]
pub fn splitter_partitioner_sorts_globally() {
    for procs in [2usize, 3, 4, 8] {
        let per_rank = local::run(procs, |comm| {
            let mut rng = WyRand::new_seed(100 + comm.rank() as u64);
            let input: Vec<Vec<u8>> = (0..200)
                .map(|_| {
                    let len = rng.generate_range(1..10usize);
                    random_string(&mut rng, len, b'a', b'f')
                })
                .collect();
            let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
            let cont = StringContainer::from_bytes(wire(&borrowed));
            let sorted = partition_sort(
                cont,
                &comm,
                &Sampling::num_strings(),
                &SortConfig::new(3, 100),
                &mut NoTracker,
            );
            assert!(verify::is_sorted(&sorted, &comm, 900));
            assert!(sorted.lcps().is_some());
            (input, cont_strings(&sorted))
        });
        let mut expected: Vec<Vec<u8>> =
            per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
        let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
        expected.sort();
        assert_eq!(got, expected, "procs = {}", procs);
    }
}

#[test]
pub fn splitter_partitioner_num_chars_policy() {
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(7 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..150)
            .map(|_| {
                let len = rng.generate_range(1..20usize);
                random_string(&mut rng, len, b'a', b'd')
            })
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let sorted = partition_sort(
            StringContainer::from_bytes(wire(&borrowed)),
            &comm,
            &Sampling::num_chars(),
            &SortConfig::new(13, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&sorted, &comm, 900));
        (input, cont_strings(&sorted))
    });
    let mut expected: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
pub fn indexed_mode_is_stable() {
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(55 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..100)
            .map(|_| {
                let len = rng.generate_range(1..3usize);
                random_string(&mut rng, len, b'a', b'b')
            })
            .collect();
        let indices: Vec<u64> = (0..100).map(|i| (comm.rank() * 100 + i) as u64).collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cont = StringContainer::from_indexed_bytes(wire(&borrowed), indices.clone());
        let sorted = partition_sort(
            cont,
            &comm,
            &Sampling::num_strings().indexed(),
            &SortConfig::new(1, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&sorted, &comm, 900));
        let pairs: Vec<(Vec<u8>, u64)> = input.into_iter().zip(indices).collect();
        let out: Vec<(Vec<u8>, u64)> = (0..sorted.len())
            .map(|i| (sorted.get(i).to_vec(), sorted.index(i)))
            .collect();
        (pairs, out)
    });
    let mut expected: Vec<(Vec<u8>, u64)> =
        per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<(Vec<u8>, u64)> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
pub fn indexed_hyper_quicksort_is_stable() {
    let per_rank = local::run(4, |comm| {
        let input = vec![b"same".as_slice(); 50];
        let indices: Vec<u64> = (0..50).map(|i| (comm.rank() * 50 + i) as u64).collect();
        let cont = sort(
            StringBlock::indexed(wire(&input), indices),
            &comm,
            &SortConfig::new(77, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&cont, &comm, 900));
        cont_indices(&cont)
    });
    let flat: Vec<u64> = per_rank.into_iter().flatten().collect();
    assert_eq!(flat, (0..200).collect::<Vec<u64>>());
}

#[test]
pub fn idempotent_on_sorted_input() {
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(9 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..80)
            .map(|_| random_string(&mut rng, 5, b'a', b'z'))
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cfg = SortConfig::new(19, 100);
        let sampling = Sampling::num_strings();

        let first = partition_sort(
            StringContainer::from_bytes(wire(&borrowed)),
            &comm,
            &sampling,
            &cfg,
            &mut NoTracker,
        );
        let first_strings = cont_strings(&first);
        let again = StringContainer::from_bytes(first.wire_bytes(0, first.len()));
        let second = partition_sort(again, &comm, &sampling, &cfg, &mut NoTracker);
        assert!(second.check_local_order());
        (first_strings, cont_strings(&second))
    });
    // re-sorting the sorted distribution reproduces the same global
    // sequence; rank boundaries follow the splitters drawn from it
    let first: Vec<Vec<u8>> = per_rank.iter().flat_map(|(f, _)| f.clone()).collect();
    let second: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, s)| s.clone()).collect();
    assert_eq!(first, second);
}

#[test]
pub fn plain_mode_sorts_too() {
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(41 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..120)
            .map(|_| random_string(&mut rng, 4, b'a', b'c'))
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let mut cfg = SortConfig::new(43, 100);
        cfg.mode = Mode::Plain;
        let cont = sort(StringBlock::plain(wire(&borrowed)), &comm, &cfg, &mut NoTracker);
        assert!(verify::is_sorted(&cont, &comm, 900));
        (input, cont_strings(&cont))
    });
    let mut expected: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
pub fn barriers_do_not_change_the_result() {
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(2 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..50)
            .map(|_| random_string(&mut rng, 3, b'a', b'z'))
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let mut cfg = SortConfig::new(3, 100);
        cfg.barriers = true;
        let cont = sort(StringBlock::plain(wire(&borrowed)), &comm, &cfg, &mut NoTracker);
        assert!(verify::is_sorted(&cont, &comm, 900));
    });
    assert_eq!(per_rank.len(), 4);
}

#[test]
pub fn distinguishing_prefix_convergence() {
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(6100 + comm.rank() as u64);
        let mut shared = WyRand::new_seed(61);
        let prefix = random_string(&mut shared, 40, 0x01, 0xff);
        let input: Vec<Vec<u8>> = (0..50)
            .map(|_| {
                let mut s = prefix.clone();
                s.extend(random_string(&mut rng, 24, 0x01, 0xff));
                s
            })
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cont = StringContainer::from_bytes(wire(&borrowed));
        let cfg = PrefixDoublingConfig {
            start_depth: 3,
            ..PrefixDoublingConfig::default()
        };
        let dists = distinguishing_prefixes(&cont, &comm, &cfg);
        (input, dists)
    });

    let all: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    for (input, dists) in &per_rank {
        for (s, &d) in input.iter().zip(dists) {
            assert!(d as usize <= s.len());
            assert!(d > 40, "shared 40-byte prefix forces deeper cuts, got {}", d);
            assert!(d <= 48, "rounds 3,6,12,24,48 should settle at 48, got {}", d);
            // soundness: nothing else shares the first d bytes
            let prefix = &s[..d as usize];
            let sharers = all
                .iter()
                .filter(|t| t.len() >= prefix.len() && &t[..prefix.len()] == prefix)
                .count();
            assert_eq!(sharers, 1);
        }
    }
}

#[test]
pub fn exact_pass_rescues_capped_rounds() {
    use crate::bloom_filter::{prefix_hash, FILTER_SIZE};

    // two strings that disagree in their first byte but still collide
    // under the hash at depth 4
    let mut rng = WyRand::new_seed(1234);
    let mut seen: std::collections::HashMap<u64, Vec<u8>> = std::collections::HashMap::new();
    let (c, d) = loop {
        let cand = random_string(&mut rng, 10, 1, 255);
        let h = prefix_hash(&cand, 4, FILTER_SIZE);
        match seen.get(&h) {
            Some(prev) if prev[0] != cand[0] => break (prev.clone(), cand),
            Some(_) => {}
            None => {
                seen.insert(h, cand);
            }
        }
    };
    assert_eq!(
        prefix_hash(&c, 4, FILTER_SIZE),
        prefix_hash(&d, 4, FILTER_SIZE)
    );

    // two strings genuinely sharing 6 bytes, deeper than the depth cap
    let a = b"pppppp0123".to_vec();
    let b = b"pppppp4567".to_vec();

    let inputs = [vec![a, c.clone()], vec![b, d.clone()]];
    let per_rank = local::run(2, |comm| {
        let borrowed: Vec<&[u8]> = inputs[comm.rank()].iter().map(|s| s.as_slice()).collect();
        let cont = StringContainer::from_bytes(wire(&borrowed));
        let cfg = PrefixDoublingConfig {
            start_depth: 4,
            max_depth: 4,
            ..PrefixDoublingConfig::default()
        };
        distinguishing_prefixes(&cont, &comm, &cfg)
    });

    // The deep pair is unresolvable at depth 4; without the exact pass
    // its result would stay at the cap and wrongly claim uniqueness at
    // 4 bytes. The exact pass lifts it to lcp + 1 = 7.
    assert_eq!(per_rank[0][0], 7);
    assert_eq!(per_rank[1][0], 7);
    // The hash-collision pair is marked duplicate by the rounds, reaches
    // the exact pass, and keeps the sound depth-4 bound.
    assert_eq!(per_rank[0][1], 4);
    assert_eq!(per_rank[1][1], 4);
}

#[test]
pub fn hash_transports_agree() {
    for transport in [
        HashTransport::Raw,
        HashTransport::GolombSequential,
        HashTransport::GolombPipelined,
    ] {
        let per_rank = local::run(4, |comm| {
            let mut rng = WyRand::new_seed(8 + comm.rank() as u64);
            let input: Vec<Vec<u8>> = (0..60)
                .map(|_| {
                    let len = rng.generate_range(2..12usize);
                    random_string(&mut rng, len, b'a', b'd')
                })
                .collect();
            let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
            let cont = StringContainer::from_bytes(wire(&borrowed));
            let cfg = PrefixDoublingConfig {
                transport,
                ..PrefixDoublingConfig::default()
            };
            distinguishing_prefixes(&cont, &comm, &cfg)
        });
        let raw_ref = local::run(4, |comm| {
            let mut rng = WyRand::new_seed(8 + comm.rank() as u64);
            let input: Vec<Vec<u8>> = (0..60)
                .map(|_| {
                    let len = rng.generate_range(2..12usize);
                    random_string(&mut rng, len, b'a', b'd')
                })
                .collect();
            let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
            let cont = StringContainer::from_bytes(wire(&borrowed));
            distinguishing_prefixes(&cont, &comm, &PrefixDoublingConfig::default())
        });
        assert_eq!(per_rank, raw_ref, "transport {:?}", transport);
    }
}

#[test]
pub fn prefix_doubled_sort_yields_stable_permutation() {
    let per_rank = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(71 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..50)
            .map(|_| {
                let len = rng.generate_range(1..8usize);
                random_string(&mut rng, len, b'a', b'c')
            })
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cont = StringContainer::from_bytes(wire(&borrowed));
        let sorted = prefix_doubled_sort(
            cont,
            &comm,
            &PrefixDoublingConfig::default(),
            &SortConfig::new(5, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&sorted, &comm, 900));
        (input, cont_indices(&sorted))
    });

    // oracle: stable sort of all strings by bytes; the pipeline must
    // emit exactly that permutation of global input positions
    let all: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let mut oracle: Vec<(Vec<u8>, u64)> = all
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, s)| (s, i as u64))
        .collect();
    oracle.sort_by(|a, b| a.0.cmp(&b.0));
    let expected: Vec<u64> = oracle.into_iter().map(|(_, i)| i).collect();
    let got: Vec<u64> = per_rank.iter().flat_map(|(_, p)| p.clone()).collect();
    assert_eq!(got, expected);
}

#[test]
pub fn dn_ratio_input_sorts_and_hints_the_start_depth() {
    let per_rank = local::run(4, |comm| {
        // 20-byte strings whose first ~10 bytes are distinguishing
        let mut cont = input::dn_ratio_strings(&comm, 77, 400, 20, 0.5);
        cont.sort_locally();
        let avg = global_avg_lcp(&cont, &comm);
        // neighbours in the global order differ late in the key part
        assert!(avg >= 4 && avg < 20, "avg lcp {}", avg);

        let cfg = PrefixDoublingConfig {
            start_depth: (2 * avg).max(1),
            ..PrefixDoublingConfig::default()
        };
        let dists = distinguishing_prefixes(&cont, &comm, &cfg);
        for (i, &d) in dists.iter().enumerate() {
            assert!(d as usize <= cont.get(i).len());
        }

        let input: Vec<Vec<u8>> = (0..cont.len()).map(|i| cont.get(i).to_vec()).collect();
        let sorted = partition_sort(
            cont,
            &comm,
            &Sampling::num_chars(),
            &SortConfig::new(7, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&sorted, &comm, 900));
        (input, cont_strings(&sorted))
    });
    let mut expected: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
pub fn skewed_input_sorts() {
    let per_rank = local::run(4, |comm| {
        let cont = input::skewed_strings(900 + comm.rank() as u64, 150, 32, 6);
        let input: Vec<Vec<u8>> = (0..cont.len()).map(|i| cont.get(i).to_vec()).collect();
        let sorted = sort(
            cont.into_block(),
            &comm,
            &SortConfig::new(37, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&sorted, &comm, 900));
        (input, cont_strings(&sorted))
    });
    let mut expected: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let got: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
pub fn median_selection_k1_two_processors_is_exact() {
    let words: [&[u8]; 2] = [b"delta", b"alpha"];
    let picked = local::run(2, |comm| {
        let cont = StringContainer::from_bytes(wire(&[words[comm.rank()]]));
        let mut rng = WyRand::new_seed(2);
        let mut bits = RandomBitStore::new();
        let local = median_select::middle_most(&cont, 1, &mut rng, &mut bits);
        let median = median_select::select(local, 1, &comm, &mut rng, &mut bits, 300);
        median.bytes
    });
    // one reduction step over two singletons: the pick is a median of
    // the whole multiset and every rank agrees on it
    assert_eq!(picked[0], picked[1]);
    assert!(picked[0] == b"alpha\0" || picked[0] == b"delta\0");
}

#[test]
pub fn median_selection_agrees_across_the_group() {
    let words: [&[u8]; 4] = [b"delta", b"alpha", b"carol", b"bravo"];
    let picked = local::run(4, |comm| {
        let cont = StringContainer::from_bytes(wire(&[words[comm.rank()]]));
        let mut rng = WyRand::new_seed(2);
        let mut bits = RandomBitStore::new();
        let local = median_select::middle_most(&cont, 1, &mut rng, &mut bits);
        let median = median_select::select(local, 1, &comm, &mut rng, &mut bits, 300);
        median.bytes
    });
    for p in &picked {
        assert_eq!(p, &picked[0]);
        assert!(words.iter().any(|w| {
            let mut z = w.to_vec();
            z.push(0);
            z == *p
        }));
    }
}

#[test]
pub fn shuffle_preserves_the_multiset() {
    let per_rank = local::run(8, |comm| {
        let mut rng = WyRand::new_seed(83 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..64)
            .map(|_| random_string(&mut rng, 4, b'a', b'z'))
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let mut cont = StringContainer::from_bytes(wire(&borrowed));
        let mut bits = RandomBitStore::new();
        shuffle(&mut cont, &comm, &mut rng, &mut bits, 400);
        (input, cont_strings(&cont))
    });
    let mut before: Vec<Vec<u8>> = per_rank.iter().flat_map(|(i, _)| i.clone()).collect();
    let mut after: Vec<Vec<u8>> = per_rank.iter().flat_map(|(_, o)| o.clone()).collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);
}

#[test]
pub fn validator_rejects_disorder() {
    let verdicts = local::run(2, |comm| {
        let s: &[u8] = if comm.rank() == 0 { b"zz" } else { b"aa" };
        let cont = StringContainer::from_bytes(wire(&[s]));
        verify::is_sorted(&cont, &comm, 900)
    });
    assert_eq!(verdicts, vec![false, false]);
}

#[test]
pub fn validator_rejects_gaps() {
    let verdicts = local::run(3, |comm| {
        let cont = if comm.rank() == 1 {
            StringContainer::new()
        } else {
            let s: &[u8] = if comm.rank() == 0 { b"aa" } else { b"zz" };
            StringContainer::from_bytes(wire(&[s]))
        };
        verify::is_sorted(&cont, &comm, 900)
    });
    assert_eq!(verdicts, vec![false, false, false]);
}

#[test]
pub fn validator_accepts_empty_edges() {
    let verdicts = local::run(3, |comm| {
        let cont = if comm.rank() == 2 {
            StringContainer::new()
        } else {
            let s: &[u8] = if comm.rank() == 0 { b"aa" } else { b"zz" };
            StringContainer::from_bytes(wire(&[s]))
        };
        verify::is_sorted(&cont, &comm, 900)
    });
    assert_eq!(verdicts, vec![true, true, true]);
}

#[test]
pub fn exhaustive_checker_round_trip() {
    let verdicts = local::run(4, |comm| {
        let mut rng = WyRand::new_seed(13 + comm.rank() as u64);
        let input: Vec<Vec<u8>> = (0..40)
            .map(|_| random_string(&mut rng, 3, b'a', b'f'))
            .collect();
        let borrowed: Vec<&[u8]> = input.iter().map(|s| s.as_slice()).collect();
        let cont = StringContainer::from_bytes(wire(&borrowed));
        let checker = verify::ExhaustiveChecker::store_input(&cont);
        let sorted = partition_sort(
            cont,
            &comm,
            &Sampling::num_strings(),
            &SortConfig::new(47, 100),
            &mut NoTracker,
        );
        let good = checker.check(&sorted, &comm);
        // a mangled result must be caught
        let bad = checker.check(
            &StringContainer::from_bytes(wire(&[b"not".as_slice(), b"sorted"])),
            &comm,
        );
        (good, bad)
    });
    for (good, bad) in verdicts {
        assert!(good);
        assert!(!bad);
    }
}

#[test]
pub fn collectives_smoke_test() {
    local::run(5, |comm| {
        comm.barrier();
        assert_eq!(comm.all_gather_u64(comm.rank() as u64), vec![0, 1, 2, 3, 4]);

        let sent: Vec<u64> = (0..5).map(|peer| (comm.rank() * 10 + peer) as u64).collect();
        let recv = comm.all_to_all_u64(&sent);
        let expected: Vec<u64> = (0..5).map(|peer| (peer * 10 + comm.rank()) as u64).collect();
        assert_eq!(recv, expected);

        let payload = comm.bcast(2, vec![comm.rank() as u8; 3]);
        assert_eq!(payload, vec![2, 2, 2]);

        let gathered = comm.gather(1, vec![comm.rank() as u8]);
        if comm.rank() == 1 {
            let parts = gathered.unwrap();
            assert_eq!(parts, vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
        } else {
            assert!(gathered.is_none());
        }

        assert_eq!(comm.all_reduce_sum(2), 10);
        assert_eq!(comm.all_reduce_min(comm.rank() as u64 + 3), 3);
        assert_eq!(comm.all_reduce_max(comm.rank() as u64), 4);
        assert!(comm.all_reduce_and(true));
        assert!(!comm.all_reduce_and(comm.rank() != 3));
    });
}

#[test]
pub fn single_processor_group() {
    let out = local::run(1, |comm| {
        let cont = sort(
            StringBlock::plain(wire(&[b"b".as_slice(), b"a", b"c"])),
            &comm,
            &SortConfig::new(1, 100),
            &mut NoTracker,
        );
        assert!(verify::is_sorted(&cont, &comm, 900));
        cont_strings(&cont)
    });
    assert_eq!(out[0], vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

#[test]
pub fn timers_accumulate() {
    let mut timers = SortTimers::new();
    timers.start("local_sort");
    timers.stop("local_sort");
    timers.add(3, "inbalance");
    timers.add(4, "inbalance");
    assert_eq!(timers.counter("inbalance"), 7);
    let _ = timers.elapsed("local_sort");

    local::run(2, |comm| {
        let mut timers = SortTimers::new();
        let cont = sort(
            StringBlock::plain(wire(&[b"b".as_slice(), b"a"])),
            &comm,
            &SortConfig::new(1, 100),
            &mut timers,
        );
        assert!(cont.check_local_order());
    });
}
