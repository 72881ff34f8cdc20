/*!
Illustrative "what-if" projections of local council elections.

The engine is layered bottom-up:

1. [`compute_swing`] turns national polling into a per-party adjustment.
2. [`predict_ward`] applies it to the last comparable result of one ward and explains
   every step it took.
3. [`predict_council`] predicts every contested ward, adds the seats that are not up,
   and [`apply_overrides`] re-counts seats with some winners replaced.
4. [`compute_coalitions`] lists the numerically viable coalitions and
   [`project_to_boundary`] re-maps a council onto proposed new authorities.

Everything is a pure function of its inputs: no call keeps state for the next one.
Missing or inconsistent data degrades the result (down to a `Confidence::None`
prediction) instead of failing.

```
use council_projection::builder::CouncilBuilder;
use council_projection::*;

let mut builder = CouncilBuilder::new("Testshire");
builder.add_ward("Abbey", 1, Some(9000))?;
builder.add_result_simple("Abbey", 2023, &[("A", 1200), ("B", 800), ("C", 500)])?;
let council = builder.build()?;

let inputs = ProjectionInputs {
    national: NationalPicture {
        current: [("A", 0.30), ("B", 0.25), ("C", 0.20)]
            .iter()
            .map(|(p, s)| (p.to_string(), *s))
            .collect(),
        baseline: Some(
            [("A", 0.28), ("B", 0.30), ("C", 0.18)]
                .iter()
                .map(|(p, s)| (p.to_string(), *s))
                .collect(),
        ),
        ..Default::default()
    },
    ..Default::default()
};
let prediction = predict_council(&council, &inputs);
assert_eq!(prediction.wards["Abbey"].winner.as_deref(), Some("A"));
assert_eq!(prediction.seat_totals.get("A"), Some(&1));
# Ok::<(), ProjectionErrors>(())
```
*/

mod boundary;
pub mod builder;
mod coalition;
mod config;
mod council;
pub mod manual;
mod swing;
mod ward;

pub use crate::boundary::{council_key, project_to_boundary, CouncilSeatsMap};
pub use crate::coalition::{compute_coalitions, compute_coalitions_with, majority_threshold};
pub use crate::config::*;
pub use crate::council::{apply_overrides, predict_council, CouncilPrediction, HeldSeats};
pub use crate::swing::{aggregate_polls, compute_swing, Swing, SwingSource};
pub use crate::ward::{predict_ward, WardContext};

#[cfg(test)]
mod tests {
    use super::builder::CouncilBuilder;
    use super::*;
    use std::collections::BTreeMap;

    fn shares(l: &[(&str, f64)]) -> PartyShares {
        l.iter().map(|(p, s)| (p.to_string(), *s)).collect()
    }

    // The whole chain: prediction, overrides, coalitions and a reorganisation model.
    #[test]
    fn end_to_end() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut b = CouncilBuilder::new("Riverside District Council");
        let results: [(&str, [(&str, u64); 3]); 5] = [
            ("Ash", [("Lab", 900), ("Con", 800), ("Green", 200)]),
            ("Beech", [("Con", 1000), ("Lab", 600), ("LD", 500)]),
            ("Cedar", [("LD", 1100), ("Con", 700), ("Lab", 300)]),
            ("Dale", [("Green", 800), ("Lab", 760), ("Con", 300)]),
            ("Elm", [("Lab", 1300), ("Con", 500), ("LD", 200)]),
        ];
        for (ward, votes) in results.iter() {
            b.add_ward(ward, 1, Some(7000)).unwrap();
            b.add_result_simple(ward, 2022, votes).unwrap();
        }
        let council = b.build().unwrap();
        let inputs = ProjectionInputs {
            national: NationalPicture {
                current: shares(&[("Lab", 0.28), ("Con", 0.22), ("LD", 0.13), ("Green", 0.10)]),
                baseline: Some(shares(&[("Lab", 0.34), ("Con", 0.24), ("LD", 0.12), ("Green", 0.07)])),
                ..Default::default()
            },
            ..Default::default()
        };

        let prediction = predict_council(&council, &inputs);
        for p in prediction.wards.values() {
            let sum: f64 = p.parties.values().map(|r| r.share).sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        let total: u32 = prediction.seat_totals.values().sum();
        assert_eq!(total, 5);

        let threshold = majority_threshold(prediction.total_seats);
        let coalitions = compute_coalitions(&prediction.seat_totals, threshold);
        assert!(!coalitions.is_empty());
        assert!(coalitions.iter().all(|c| c.seats >= threshold));

        let overrides: BTreeMap<String, String> =
            [("Ash".to_string(), "Green".to_string())].into_iter().collect();
        let seats_map = CouncilSeatsMap::from_prediction(&prediction, &overrides);
        assert_eq!(
            seats_map.totals,
            apply_overrides(&prediction, &overrides, prediction.total_seats)
        );

        let model = LgrModel {
            id: "north-south".to_string(),
            name: "North/South".to_string(),
            source: None,
            authorities: vec![ProposedAuthority {
                name: "North Riverside".to_string(),
                councils: vec!["Riverside".to_string(), "Hilltop".to_string()],
                wards: vec![],
            }],
        };
        let projection = project_to_boundary(&seats_map, &model);
        let north = &projection["North Riverside"];
        assert!(north.partial);
        assert_eq!(north.total_seats, 5);
    }
}
