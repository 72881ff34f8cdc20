use log::{debug, info};

use std::collections::BTreeMap;

use crate::coalition::majority_threshold;
use crate::config::*;
use crate::council::CouncilPrediction;

// Trailing words dropped when comparing council names.
const GENERIC_SUFFIXES: [&str; 5] = ["council", "borough", "district", "city", "county"];

/// The seats of one council, as a whole and ward by ward.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CouncilSeatsMap {
    pub council: String,
    pub totals: SeatTotals,
    pub wards: BTreeMap<String, SeatTotals>,
}

impl CouncilSeatsMap {
    pub fn from_prediction(
        prediction: &CouncilPrediction,
        overrides: &BTreeMap<String, String>,
    ) -> CouncilSeatsMap {
        let wards = prediction.ward_seats(overrides);
        let mut totals = SeatTotals::new();
        for seats in wards.values() {
            for (party, s) in seats.iter() {
                *totals.entry(party.clone()).or_insert(0) += s;
            }
        }
        CouncilSeatsMap {
            council: prediction.council.clone(),
            totals,
            wards,
        }
    }
}

/// Lower-cases a council name and drops punctuation and generic trailing words, so that
/// "Stafford Borough Council" and "stafford" compare equal.
pub fn council_key(name: &str) -> String {
    let mut words: Vec<String> = name
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    while words.len() > 1 && GENERIC_SUFFIXES.contains(&words[words.len() - 1].as_str()) {
        words.pop();
    }
    words.join("")
}

fn largest_party(seats: &SeatTotals) -> Option<String> {
    seats
        .iter()
        .filter(|(p, s)| p.as_str() != UNALLOCATED && **s > 0)
        // Ties go to the first name in lexical order.
        .max_by(|(pa, sa), (pb, sb)| sa.cmp(sb).then_with(|| pb.cmp(pa)))
        .map(|(p, _)| p.clone())
}

/// Re-aggregates one council's seats onto the authorities of a reorganisation model.
///
/// Only authorities that name this council receive its seats, so a ward listed by an
/// authority of another council is never matched against a ward of the same name here.
/// Authorities this council does not feed are omitted. The majority is recomputed
/// against each authority's own seat total, and authorities that also absorb other
/// councils are marked partial since their seats are not known here.
pub fn project_to_boundary(
    council_seats: &CouncilSeatsMap,
    model: &LgrModel,
) -> BTreeMap<String, AuthorityProjection> {
    let own_key = council_key(&council_seats.council);
    let mut res: BTreeMap<String, AuthorityProjection> = BTreeMap::new();

    for authority in model.authorities.iter() {
        let names_council = authority.councils.iter().any(|c| council_key(c) == own_key);
        let partial = authority.councils.iter().any(|c| council_key(c) != own_key);

        if !names_council {
            debug!(
                "project_to_boundary: {} receives nothing from {}",
                authority.name, council_seats.council
            );
            continue;
        }

        let matched_wards: Vec<&SeatTotals> = authority
            .wards
            .iter()
            .filter_map(|w| council_seats.wards.get(w))
            .collect();

        let seats: SeatTotals = if !matched_wards.is_empty() {
            let mut s = SeatTotals::new();
            for ward_seats in matched_wards {
                for (party, n) in ward_seats.iter() {
                    *s.entry(party.clone()).or_insert(0) += n;
                }
            }
            s
        } else {
            council_seats.totals.clone()
        };

        let total_seats: u32 = seats.values().sum();
        if total_seats == 0 {
            continue;
        }
        let largest = largest_party(&seats);
        let has_majority = largest
            .as_ref()
            .and_then(|p| seats.get(p))
            .map(|s| *s >= majority_threshold(total_seats))
            .unwrap_or(false);
        res.insert(
            authority.name.clone(),
            AuthorityProjection {
                seats,
                total_seats,
                largest_party: largest,
                has_majority,
                partial,
                contributing_council: council_seats.council.clone(),
            },
        );
    }
    info!(
        "project_to_boundary: model {}: {} authorities fed by {}",
        model.id,
        res.len(),
        council_seats.council
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(l: &[(&str, u32)]) -> SeatTotals {
        l.iter().map(|(p, s)| (p.to_string(), *s)).collect()
    }

    fn authority(name: &str, councils: &[&str], wards: &[&str]) -> ProposedAuthority {
        ProposedAuthority {
            name: name.to_string(),
            councils: councils.iter().map(|s| s.to_string()).collect(),
            wards: wards.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn stafford() -> CouncilSeatsMap {
        let wards: BTreeMap<String, SeatTotals> = [
            ("Abbey".to_string(), seats(&[("Con", 2)])),
            ("Baswich".to_string(), seats(&[("Lab", 1), ("Con", 1)])),
            ("Coton".to_string(), seats(&[("Lab", 3)])),
        ]
        .into_iter()
        .collect();
        CouncilSeatsMap {
            council: "Stafford Borough Council".to_string(),
            totals: seats(&[("Con", 3), ("Lab", 4)]),
            wards,
        }
    }

    #[test]
    fn council_names_compare_loosely() {
        assert_eq!(council_key("Stafford Borough Council"), "stafford");
        assert_eq!(council_key("stafford"), "stafford");
        assert_eq!(council_key("Newcastle-under-Lyme"), "newcastleunderlyme");
        assert_eq!(council_key("City"), "city");
    }

    #[test]
    fn whole_council_and_partial_label() {
        let model = LgrModel {
            id: "two-unitary".to_string(),
            name: "Two unitaries".to_string(),
            source: None,
            authorities: vec![
                authority("North Staffordshire", &["Stafford", "Stoke-on-Trent"], &[]),
                authority("South Staffordshire", &["Cannock Chase", "Lichfield"], &[]),
            ],
        };
        let res = project_to_boundary(&stafford(), &model);
        assert_eq!(res.len(), 1);
        let north = &res["North Staffordshire"];
        assert!(north.partial);
        assert_eq!(north.total_seats, 7);
        assert_eq!(north.largest_party, Some("Lab".to_string()));
        // 4 of 7 against a threshold of 4.
        assert!(north.has_majority);
    }

    #[test]
    fn split_council_by_wards() {
        let model = LgrModel {
            id: "split".to_string(),
            name: "Split".to_string(),
            source: Some("consultation".to_string()),
            authorities: vec![
                authority("East", &["Stafford"], &["Abbey", "Baswich"]),
                authority("West", &["Stafford"], &["Coton"]),
            ],
        };
        let res = project_to_boundary(&stafford(), &model);
        let east = &res["East"];
        assert!(!east.partial);
        assert_eq!(east.seats, seats(&[("Con", 3), ("Lab", 1)]));
        assert!(east.has_majority);
        let west = &res["West"];
        assert_eq!(west.total_seats, 3);
        assert_eq!(west.largest_party, Some("Lab".to_string()));
    }

    // Lichfield also has a ward called Coton. Stafford's Coton must not feed it.
    #[test]
    fn ward_names_of_other_councils_are_ignored() {
        let model = LgrModel {
            id: "split".to_string(),
            name: "Split".to_string(),
            source: None,
            authorities: vec![
                authority("Lichfield Unitary", &["Lichfield"], &["Coton"]),
                authority("Stafford East", &["Stafford", "Lichfield"], &["Coton", "Curborough"]),
            ],
        };
        let res = project_to_boundary(&stafford(), &model);
        assert!(!res.contains_key("Lichfield Unitary"));
        let east = &res["Stafford East"];
        assert_eq!(east.seats, seats(&[("Lab", 3)]));
        assert!(east.partial);
    }

    #[test]
    fn largest_party_tie_is_lexical_and_no_majority() {
        let map = CouncilSeatsMap {
            council: "Tied".to_string(),
            totals: seats(&[("B", 2), ("A", 2), (UNALLOCATED, 5)]),
            wards: BTreeMap::new(),
        };
        let model = LgrModel {
            id: "m".to_string(),
            name: "m".to_string(),
            source: None,
            authorities: vec![authority("Only", &["Tied"], &[])],
        };
        let res = project_to_boundary(&map, &model);
        assert_eq!(res["Only"].largest_party, Some("A".to_string()));
        assert!(!res["Only"].has_majority);
    }
}
