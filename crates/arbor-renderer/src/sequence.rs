//! Longest stable run over the new-to-old index map.
//!
//! Input is the keyed-diff map where entry `k` holds `old index + 1` of
//! the new child at offset `k`, or `0` when the child has no old
//! counterpart. The returned indices (ascending) mark the children that
//! can stay put; everything else gets moved or mounted.

/// O(n log n): greedy tails with binary search, predecessor links for
/// reconstruction. Zero entries never participate.
pub(crate) fn longest_stable_run(map: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<usize> = vec![0; map.len()];

    for (i, &value) in map.iter().enumerate() {
        if value == 0 {
            continue;
        }
        if let Some(&last) = tails.last() {
            if map[last] < value {
                prev[i] = last;
                tails.push(i);
                continue;
            }
        } else {
            tails.push(i);
            continue;
        }
        // First tail >= value gets replaced by i.
        let mut lo = 0usize;
        let mut hi = tails.len() - 1;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if map[tails[mid]] < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if value < map[tails[lo]] {
            if lo > 0 {
                prev[i] = tails[lo - 1];
            }
            tails[lo] = i;
        }
    }

    let mut k = tails.len();
    if k == 0 {
        return tails;
    }
    let mut idx = tails[k - 1];
    while k > 0 {
        k -= 1;
        tails[k] = idx;
        idx = prev[idx];
    }
    tails
}

#[cfg(test)]
mod tests {
    use super::longest_stable_run;

    /// O(n^2) reference used to cross-check the greedy implementation.
    fn brute_force(map: &[usize]) -> usize {
        let values: Vec<usize> = map.iter().copied().filter(|&v| v != 0).collect();
        let mut best = vec![0usize; values.len()];
        let mut longest = 0;
        for i in 0..values.len() {
            best[i] = 1;
            for j in 0..i {
                if values[j] < values[i] {
                    best[i] = best[i].max(best[j] + 1);
                }
            }
            longest = longest.max(best[i]);
        }
        longest
    }

    fn assert_valid(map: &[usize]) {
        let run = longest_stable_run(map);
        for pair in run.windows(2) {
            assert!(pair[0] < pair[1], "indices must ascend: {run:?}");
            assert!(
                map[pair[0]] < map[pair[1]],
                "values must ascend: {run:?} over {map:?}"
            );
        }
        for &i in &run {
            assert_ne!(map[i], 0, "zero entries may not be selected");
        }
        assert_eq!(run.len(), brute_force(map), "run is not maximal for {map:?}");
    }

    #[test]
    fn empty_input() {
        assert!(longest_stable_run(&[]).is_empty());
    }

    #[test]
    fn all_zero() {
        assert!(longest_stable_run(&[0, 0, 0]).is_empty());
    }

    #[test]
    fn already_sorted() {
        assert_eq!(longest_stable_run(&[1, 2, 3, 4]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn reversed() {
        assert_eq!(longest_stable_run(&[4, 3, 2, 1]).len(), 1);
    }

    #[test]
    fn single_swap() {
        // Old order a b c d, new order a c b d.
        assert_valid(&[1, 3, 2, 4]);
        assert_eq!(longest_stable_run(&[1, 3, 2, 4]).len(), 3);
    }

    #[test]
    fn zeros_interleaved() {
        assert_valid(&[0, 2, 0, 5, 3, 0, 7]);
    }

    #[test]
    fn known_cases() {
        for map in [
            vec![10, 9, 2, 5, 3, 7, 101, 18],
            vec![2, 1, 5, 3, 6, 4, 8, 9, 7],
            vec![1],
            vec![0, 1],
            vec![5, 0, 0, 1, 2, 3],
        ] {
            assert_valid(&map);
        }
    }

    mod properties {
        use super::assert_valid;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn matches_brute_force(map in proptest::collection::vec(0usize..32, 0..48)) {
                // Nonzero entries must be distinct, as old indices are.
                let mut seen = std::collections::HashSet::new();
                let map: Vec<usize> = map
                    .into_iter()
                    .map(|v| if v != 0 && !seen.insert(v) { 0 } else { v })
                    .collect();
                assert_valid(&map);
            }
        }
    }
}
