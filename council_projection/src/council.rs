use log::{debug, info, warn};

use std::collections::BTreeMap;

use crate::config::*;
use crate::swing::{compute_swing, Swing};
use crate::ward::{predict_ward, WardContext};

/// The seats of a ward that are not up at this election.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct HeldSeats {
    pub ward: String,
    pub seats: SeatTotals,
}

/// A full council projection. Every call to `predict_council` returns a new one.
#[derive(PartialEq, Debug, Clone)]
pub struct CouncilPrediction {
    pub council: String,
    pub total_seats: u32,
    pub swing: Swing,
    /// Contested wards only.
    pub wards: BTreeMap<String, PredictionResult>,
    /// Every ward, including the ones with nothing held (then empty).
    pub held: BTreeMap<String, HeldSeats>,
    pub seat_totals: SeatTotals,
}

impl CouncilPrediction {
    pub fn seats_up(&self) -> u32 {
        self.wards.values().map(|p| p.seats_up).sum()
    }

    pub fn held_seats(&self) -> u32 {
        self.held.values().flat_map(|h| h.seats.values()).sum()
    }

    /// Per-ward seat composition (held and contested), with optional winner overrides.
    pub fn ward_seats(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, SeatTotals> {
        let mut res: BTreeMap<String, SeatTotals> = self
            .held
            .iter()
            .map(|(w, h)| (w.clone(), h.seats.clone()))
            .collect();
        for (name, p) in self.wards.iter() {
            let party = overrides
                .get(name)
                .cloned()
                .or_else(|| p.winner.clone())
                .unwrap_or_else(|| UNALLOCATED.to_string());
            let e = res.entry(name.clone()).or_insert_with(SeatTotals::new);
            *e.entry(party).or_insert(0) += p.seats_up;
        }
        res
    }

    /// Net change in contested seats per party, against the defending parties.
    pub fn changes(&self) -> BTreeMap<String, i64> {
        let mut res: BTreeMap<String, i64> = BTreeMap::new();
        for p in self.wards.values().filter(|p| p.is_gain()) {
            if let (Some(w), Some(d)) = (&p.winner, &p.defender) {
                *res.entry(w.clone()).or_insert(0) += p.seats_up as i64;
                *res.entry(d.party.clone()).or_insert(0) -= p.seats_up as i64;
            }
        }
        res
    }
}

fn add_seats(totals: &mut SeatTotals, party: &str, seats: u32) {
    if seats > 0 {
        *totals.entry(party.to_string()).or_insert(0) += seats;
    }
}

/// Works out who keeps the seats that are not up.
///
/// Defenders are removed from the holders of a contested ward (by name, else by
/// party, else the first holder). Seats without a known holder are unallocated.
fn held_seats(ward: &Ward, seats_up: u32, defender: Option<&Holder>) -> HeldSeats {
    let mut holders: Vec<&Holder> = ward.current_holders.iter().collect();
    if seats_up > 0 {
        let mut to_remove = seats_up as usize;
        if let Some(d) = defender {
            let pos = holders
                .iter()
                .position(|h| h.name == d.name)
                .or_else(|| holders.iter().position(|h| h.party == d.party));
            if let Some(pos) = pos {
                holders.remove(pos);
                to_remove -= 1;
            }
        }
        // Multi-seat contests or missing defender records.
        let n = to_remove.min(holders.len());
        holders.drain(..n);
    }
    let held_count = ward.seats.saturating_sub(seats_up);
    if holders.len() > held_count as usize {
        warn!(
            "held_seats: {}: {} holders recorded for {} held seats",
            ward.name,
            holders.len(),
            held_count
        );
        holders.truncate(held_count as usize);
    }
    let mut seats = SeatTotals::new();
    for h in holders.iter() {
        add_seats(&mut seats, &h.party, 1);
    }
    add_seats(&mut seats, UNALLOCATED, held_count - holders.len() as u32);
    HeldSeats {
        ward: ward.name.clone(),
        seats,
    }
}

/// Predicts every contested ward of a council and aggregates the seat totals.
pub fn predict_council(council: &Council, inputs: &ProjectionInputs) -> CouncilPrediction {
    let assumptions = inputs.assumptions.sanitized();
    let swing = compute_swing(&inputs.national, &assumptions, &inputs.params);
    let next = council.next_election.as_ref();
    let cycle_year = next.and_then(|ne| ne.year);

    let contested: Vec<&Ward> = council.contested_wards();
    info!(
        "predict_council: {}: {} wards, {} contested, {} seats",
        council.name,
        council.wards.len(),
        contested.len(),
        council.total_seats()
    );
    if let Some(declared) = council.declared_total_seats {
        if declared != council.total_seats() {
            warn!(
                "predict_council: {}: declared {} seats, wards add up to {}",
                council.name,
                declared,
                council.total_seats()
            );
        }
    }

    let mut wards: BTreeMap<String, PredictionResult> = BTreeMap::new();
    for ward in contested.iter() {
        let seats_up = council.cycle.seats_up(ward.seats);
        let ctx = WardContext {
            swing: &swing,
            assumptions: &assumptions,
            params: &inputs.params,
            demographics: inputs.demographics.get(&ward.name),
            deprivation: inputs.deprivation.get(&ward.name),
            ward_proxy: inputs.ward_proxies.get(&ward.name),
            council_proxy: inputs.council_proxy.as_ref(),
            declared_defender: next.and_then(|ne| ne.defenders.get(&ward.name)),
            cycle_year,
            seats_up,
        };
        let p = predict_ward(ward, &ctx);
        debug!(
            "predict_council: {}: winner {:?} confidence {:?}",
            ward.name, p.winner, p.confidence
        );
        wards.insert(ward.name.clone(), p);
    }

    let mut held: BTreeMap<String, HeldSeats> = BTreeMap::new();
    for ward in council.wards.values() {
        let (seats_up, defender) = match wards.get(&ward.name) {
            Some(p) => (p.seats_up, p.defender.as_ref()),
            None => (0, None),
        };
        held.insert(ward.name.clone(), held_seats(ward, seats_up, defender));
    }

    let mut prediction = CouncilPrediction {
        council: council.name.clone(),
        total_seats: council.total_seats(),
        swing,
        wards,
        held,
        seat_totals: SeatTotals::new(),
    };
    prediction.seat_totals = apply_overrides(&prediction, &BTreeMap::new(), prediction.total_seats);
    info!(
        "predict_council: {}: seat totals {:?}",
        prediction.council, prediction.seat_totals
    );
    prediction
}

/// Seat totals with the winners of some wards replaced.
///
/// Only seat counting changes: the predictions themselves are left untouched.
/// Overrides for unknown or uncontested wards are ignored.
pub fn apply_overrides(
    prediction: &CouncilPrediction,
    overrides: &BTreeMap<String, String>,
    total_seats: u32,
) -> SeatTotals {
    for ward in overrides.keys() {
        if !prediction.wards.contains_key(ward) {
            warn!("apply_overrides: ignoring override for uncontested or unknown ward {}", ward);
        }
    }
    let mut totals = SeatTotals::new();
    for h in prediction.held.values() {
        for (party, seats) in h.seats.iter() {
            add_seats(&mut totals, party, *seats);
        }
    }
    for (name, p) in prediction.wards.iter() {
        let party = overrides
            .get(name)
            .map(|s| s.as_str())
            .or(p.winner.as_deref())
            .unwrap_or(UNALLOCATED);
        add_seats(&mut totals, party, p.seats_up);
    }
    let counted: u32 = totals.values().sum();
    if counted < total_seats {
        add_seats(&mut totals, UNALLOCATED, total_seats - counted);
    } else if counted > total_seats {
        warn!(
            "apply_overrides: counted {} seats for a council of {}",
            counted, total_seats
        );
    }
    totals
}
