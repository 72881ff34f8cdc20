use log::debug;

use std::cmp::Reverse;

use crate::config::*;

/// Minimum number of seats for outright control.
pub fn majority_threshold(total_seats: u32) -> u32 {
    total_seats / 2 + 1
}

/// Coalitions able to reach `threshold`, with the default rules.
pub fn compute_coalitions(seat_totals: &SeatTotals, threshold: u32) -> Vec<Coalition> {
    compute_coalitions_with(seat_totals, threshold, &CoalitionRules::DEFAULT)
}

/// All the index combinations of size `k` out of `n`, in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut res: Vec<Vec<usize>> = Vec::new();
    if k == 0 || k > n {
        return res;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        res.push(idx.clone());
        // Find the rightmost index that can still move.
        let mut i = k;
        while i > 0 && idx[i - 1] == n - k + i - 1 {
            i -= 1;
        }
        if i == 0 {
            return res;
        }
        idx[i - 1] += 1;
        for j in i..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

fn is_subset(small: &[usize], big: &[usize]) -> bool {
    small.iter().all(|i| big.contains(i))
}

fn make_coalition(ranked: &[(String, u32)], members: &[usize], threshold: u32) -> Coalition {
    let seats: u32 = members.iter().map(|i| ranked[*i].1).sum();
    Coalition {
        // Members are indices into the seat ranking, so this is already seats-descending.
        parties: members.iter().map(|i| ranked[*i].0.clone()).collect(),
        seats,
        working_majority: seats.saturating_sub(threshold),
        kind: if members.len() == 1 {
            CoalitionKind::SinglePartyMajority
        } else {
            CoalitionKind::MultiPartyCoalition
        },
    }
}

/// Enumerates the coalitions that reach `threshold`.
///
/// A single party with a majority is the only answer. Otherwise combinations are
/// tried from the smallest size up, and a combination that already reaches the
/// threshold is never extended with more partners. The largest bloc (the top
/// parties by seats, taken until they reach the threshold) is always reported.
///
/// Unallocated seats and parties without seats are left out.
pub fn compute_coalitions_with(
    seat_totals: &SeatTotals,
    threshold: u32,
    rules: &CoalitionRules,
) -> Vec<Coalition> {
    let mut ranked: Vec<(String, u32)> = seat_totals
        .iter()
        .filter(|(p, s)| p.as_str() != UNALLOCATED && **s > 0)
        .map(|(p, s)| (p.clone(), *s))
        .collect();
    ranked.sort_by_key(|(p, s)| (Reverse(*s), p.clone()));
    debug!("compute_coalitions: ranked: {:?} threshold: {}", ranked, threshold);

    if let Some((_, seats)) = ranked.first() {
        if *seats >= threshold {
            return vec![make_coalition(&ranked, &[0], threshold)];
        }
    }
    let available: u32 = ranked.iter().map(|(_, s)| *s).sum();
    if available < threshold {
        debug!(
            "compute_coalitions: {} seats available, no coalition reaches {}",
            available, threshold
        );
        return Vec::new();
    }

    let n = ranked.len();
    let mut viable: Vec<Vec<usize>> = Vec::new();
    for size in 2..=rules.max_parties.min(n) {
        for members in combinations(n, size) {
            if viable.iter().any(|v| is_subset(v, &members)) {
                continue;
            }
            let seats: u32 = members.iter().map(|i| ranked[*i].1).sum();
            if seats >= threshold {
                viable.push(members);
            }
        }
    }

    if rules.include_largest_bloc {
        let mut cum = 0;
        let mut bloc: Vec<usize> = Vec::new();
        for (i, (_, s)) in ranked.iter().enumerate() {
            cum += *s;
            bloc.push(i);
            if cum >= threshold {
                break;
            }
        }
        if !viable.contains(&bloc) {
            debug!("compute_coalitions: adding largest bloc {:?}", bloc);
            viable.push(bloc);
        }
    }

    let mut res: Vec<Coalition> = viable
        .iter()
        .map(|m| make_coalition(&ranked, m, threshold))
        .collect();
    res.sort_by(|a, b| {
        a.parties
            .len()
            .cmp(&b.parties.len())
            .then(b.seats.cmp(&a.seats))
            .then_with(|| a.parties.cmp(&b.parties))
    });
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(l: &[(&str, u32)]) -> SeatTotals {
        l.iter().map(|(p, s)| (p.to_string(), *s)).collect()
    }

    fn names(c: &Coalition) -> Vec<&str> {
        c.parties.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn threshold() {
        assert_eq!(majority_threshold(45), 23);
        assert_eq!(majority_threshold(44), 23);
        assert_eq!(majority_threshold(1), 1);
    }

    #[test]
    fn single_party_majority() {
        let st = seats(&[("Lab", 30), ("Con", 10), ("LD", 5)]);
        let res = compute_coalitions(&st, 23);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].kind, CoalitionKind::SinglePartyMajority);
        assert_eq!(names(&res[0]), vec!["Lab"]);
        assert_eq!(res[0].working_majority, 7);
    }

    #[test]
    fn hung_council() {
        let st = seats(&[("Labour", 20), ("Conservative", 15), ("LibDem", 6), ("Green", 4)]);
        let res = compute_coalitions(&st, 23);
        let all: Vec<Vec<&str>> = res.iter().map(names).collect();
        assert_eq!(
            all,
            vec![
                vec!["Labour", "Conservative"],
                vec!["Labour", "LibDem"],
                vec!["Labour", "Green"],
                vec!["Conservative", "LibDem", "Green"],
            ]
        );
        for c in res.iter() {
            assert!(c.seats >= 23);
            assert_eq!(c.working_majority, c.seats - 23);
            assert_eq!(c.kind, CoalitionKind::MultiPartyCoalition);
        }
        assert_eq!(res[0].seats, 35);
        assert_eq!(res[3].seats, 25);
    }

    #[test]
    fn nothing_when_seats_fall_short() {
        let st = seats(&[("A", 5), ("B", 4), (UNALLOCATED, 30)]);
        assert!(compute_coalitions(&st, 20).is_empty());
    }

    #[test]
    fn largest_bloc_beyond_max_parties() {
        let st = seats(&[("A", 5), ("B", 5), ("C", 5), ("D", 5), ("E", 5), ("F", 5)]);
        let rules = CoalitionRules {
            max_parties: 2,
            include_largest_bloc: true,
        };
        let res = compute_coalitions_with(&st, 16, &rules);
        assert_eq!(res.len(), 1);
        assert_eq!(names(&res[0]), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn tied_seats_are_ordered_by_name() {
        let st = seats(&[("Zed", 10), ("Alpha", 10), ("Mid", 3)]);
        let res = compute_coalitions(&st, 12);
        assert_eq!(names(&res[0]), vec!["Alpha", "Zed"]);
        let again = compute_coalitions(&st, 12);
        assert_eq!(res, again);
    }

    #[test]
    fn every_coalition_reaches_threshold() {
        let st = seats(&[("A", 11), ("B", 9), ("C", 7), ("D", 6), ("E", 3), ("F", 1)]);
        let th = majority_threshold(37);
        let res = compute_coalitions(&st, th);
        assert!(!res.is_empty());
        assert!(res.iter().all(|c| c.seats >= th));
    }

    #[test]
    fn combination_order() {
        assert_eq!(
            combinations(4, 2),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert!(combinations(2, 3).is_empty());
    }
}
