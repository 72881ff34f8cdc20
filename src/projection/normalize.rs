// Turns the loosely-typed documents into the engine's explicit types. This is the only
// place that knows about alternative field names, percentages and party aliases.

use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet};

use council_projection::builder::CouncilBuilder;
use council_projection::*;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::projection::documents::*;
use crate::projection::*;

/// Reads a number written either as a JSON number or as a string such as "1,234" or "31.2%".
pub fn read_js_number(x: &Option<JSValue>) -> Option<f64> {
    match x {
        Some(JSValue::Number(n)) => n.as_f64(),
        Some(JSValue::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, ',' | '%' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn read_js_u64(x: &Option<JSValue>) -> Option<u64> {
    read_js_number(x).filter(|v| *v >= 0.0).map(|v| v.round() as u64)
}

fn read_js_i32(x: &Option<JSValue>) -> Option<i32> {
    read_js_number(x).map(|v| v as i32)
}

/// A single turnout above 1 is a percentage.
pub fn as_fraction(v: f64) -> f64 {
    if v > 1.0 {
        v / 100.0
    } else {
        v
    }
}

/// The divisor that turns a set of shares into fractions.
///
/// The scale is decided once for the whole set: it is in percent when any value is
/// above 1 or the values add up to well over 1. A small party at 0.8% then stays 0.008.
pub fn percent_scale<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut sum = 0.0;
    let mut above_one = false;
    for v in values {
        above_one |= v > 1.0;
        sum += v;
    }
    if above_one || sum > 1.5 {
        100.0
    } else {
        1.0
    }
}

fn year_of_date(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse::<i32>().ok())
}

pub struct PartyAliases<'a> {
    aliases: Option<&'a BTreeMap<String, String>>,
}

impl<'a> PartyAliases<'a> {
    pub fn new(reference: Option<&'a ReferenceDocument>) -> PartyAliases<'a> {
        PartyAliases {
            aliases: reference.map(|r| &r.party_aliases),
        }
    }

    pub fn resolve(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.aliases
            .and_then(|a| a.get(trimmed))
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Converts raw shares, summing parties that resolve to the same name.
    pub fn shares(&self, raw: &RawShares) -> PartyShares {
        let mut res = PartyShares::new();
        for (party, v) in raw.iter() {
            if let Some(x) = read_js_number(&Some(v.clone())) {
                *res.entry(self.resolve(party)).or_insert(0.0) += x;
            }
        }
        res
    }

    /// Share deltas, in percentage points when any of them is above 1 in size.
    pub fn deltas(&self, raw: &RawShares) -> PartyShares {
        let deltas = self.shares(raw);
        let scale = if deltas.values().any(|d| d.abs() > 1.0) {
            100.0
        } else {
            1.0
        };
        deltas.into_iter().map(|(p, d)| (p, d / scale)).collect()
    }

    /// Same as `shares`, converted from percentages when the set is written in percent.
    pub fn fractions(&self, raw: &RawShares) -> PartyShares {
        let shares = self.shares(raw);
        let scale = percent_scale(shares.values().cloned());
        shares.into_iter().map(|(p, v)| (p, v / scale)).collect()
    }
}

pub fn parse_cycle(s: &str) -> Option<ElectionCycle> {
    let s = s.to_lowercase();
    if s.contains("third") {
        Some(ElectionCycle::Thirds)
    } else if s.contains("half") || s.contains("halves") {
        Some(ElectionCycle::Halves)
    } else if s.contains("all") || s.contains("whole") || s == "ordinary" {
        Some(ElectionCycle::AllOut)
    } else {
        None
    }
}

pub fn parse_kind(s: Option<&str>) -> ElectionKind {
    let s = s.unwrap_or("").to_lowercase();
    if s.contains("by") {
        ElectionKind::ByElection
    } else if s.contains("third") {
        ElectionKind::Thirds
    } else if s.contains("half") {
        ElectionKind::Halves
    } else {
        ElectionKind::Ordinary
    }
}

fn holder(h: &HolderDocument, aliases: &PartyAliases) -> Option<Holder> {
    let party = h.party.as_deref().map(|p| aliases.resolve(p))?;
    Some(Holder {
        name: h.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        party,
    })
}

fn election(e: &ElectionDocument, aliases: &PartyAliases) -> Option<Election> {
    let year = read_js_i32(&e.year).or_else(|| e.date.as_deref().and_then(year_of_date))?;
    let scale = percent_scale(e.candidates.iter().filter_map(|c| read_js_number(&c.share)));
    let candidates: Vec<CandidateResult> = e
        .candidates
        .iter()
        .map(|c| CandidateResult {
            name: c.name.clone().unwrap_or_default(),
            party: aliases.resolve(c.party.as_deref().unwrap_or("Independent")),
            votes: read_js_u64(&c.votes),
            share: read_js_number(&c.share).map(|s| s / scale),
            elected: c.elected.unwrap_or(false),
        })
        .collect();
    Some(Election {
        year,
        date: e.date.clone(),
        kind: parse_kind(e.kind.as_deref()),
        turnout: read_js_number(&e.turnout).map(as_fraction),
        candidates,
    })
}

fn infer_cycle(doc: &HistoryDocument) -> ElectionCycle {
    let declared = doc
        .meta
        .as_ref()
        .and_then(|m| m.election_cycle.as_deref())
        .and_then(parse_cycle);
    if let Some(c) = declared {
        return c;
    }
    let latest = doc
        .council_history
        .iter()
        .filter_map(|h| h.kind.as_deref().and_then(parse_cycle).map(|c| (read_js_i32(&h.year), c)))
        .max_by_key(|(y, _)| *y)
        .map(|(_, c)| c);
    match latest {
        Some(c) => {
            info!("infer_cycle: using the cycle of the latest council-wide election: {:?}", c);
            c
        }
        None => ElectionCycle::AllOut,
    }
}

fn calendar_year(reference: Option<&ReferenceDocument>, council_name: &str) -> Option<i32> {
    let key = council_key(council_name);
    reference?
        .election_calendar
        .iter()
        .filter(|e| council_key(&e.council) == key)
        .filter_map(|e| read_js_i32(&e.year).or_else(|| e.date.as_deref().and_then(year_of_date)))
        .min()
}

/// Builds the council from its election history document.
pub fn council_from_document(
    doc: &HistoryDocument,
    council_name: &str,
    reference: Option<&ReferenceDocument>,
    path: &str,
) -> ProjResult<Council> {
    let aliases = PartyAliases::new(reference);
    let meta = doc.meta.as_ref();
    let next_doc = meta.and_then(|m| m.next_election.as_ref());
    let cycle = infer_cycle(doc);

    let mut builder = CouncilBuilder::new(council_name)
        .cycle(cycle)
        .declared_total_seats(meta.and_then(|m| read_js_u64(&m.total_seats)).map(|s| s as u32));

    for (name, w) in doc.wards.iter() {
        let seats = match read_js_u64(&w.seats) {
            Some(s) if s > 0 => s as u32,
            _ => {
                // Fall back on the number of councillors, else a single seat.
                let n = w.current_holders.len().max(1) as u32;
                warn!("council_from_document: {}: no seat count, assuming {}", name, n);
                n
            }
        };
        builder
            .add_ward(name, seats, read_js_u64(&w.electorate))
            .context(InvalidCouncilSnafu { path })?;
        for h in w.current_holders.iter().filter_map(|h| holder(h, &aliases)) {
            builder
                .add_holder(name, &h.name, &h.party)
                .context(InvalidCouncilSnafu { path })?;
        }
        for e in w.history.iter() {
            match election(e, &aliases) {
                Some(e) => builder
                    .add_election(name, e)
                    .context(InvalidCouncilSnafu { path })?,
                None => warn!("council_from_document: {}: skipping an election with no year", name),
            }
        }
    }

    if let Some(next) = next_doc {
        let year = read_js_i32(&next.year)
            .or_else(|| next.date.as_deref().and_then(year_of_date))
            .or_else(|| calendar_year(reference, council_name));
        builder = builder.next_election_date(year, next.date.clone());
        if let Some(up) = next.wards_up.as_ref() {
            let known: Vec<&str> = up
                .iter()
                .map(|s| s.as_str())
                .filter(|w| {
                    let ok = doc.wards.contains_key(*w);
                    if !ok {
                        warn!("council_from_document: ward up {} not in the history, ignored", w);
                    }
                    ok
                })
                .collect();
            builder = builder.wards_up(&known).context(InvalidCouncilSnafu { path })?;
        }
        for (ward, d) in next.defenders.iter() {
            if !doc.wards.contains_key(ward) {
                warn!("council_from_document: defender for unknown ward {} ignored", ward);
                continue;
            }
            if let Some(h) = holder(d, &aliases) {
                builder = builder.defender(ward, h).context(InvalidCouncilSnafu { path })?;
            }
        }
    } else if let Some(year) = calendar_year(reference, council_name) {
        builder = builder.next_election_date(Some(year), None);
    }

    let council = builder.build().context(InvalidCouncilSnafu { path })?;
    if let Some(total_wards) = meta.and_then(|m| read_js_u64(&m.total_wards)) {
        if total_wards != council.wards.len() as u64 {
            warn!(
                "council_from_document: {} wards declared, {} found in the history",
                total_wards,
                council.wards.len()
            );
        }
    }
    if let Some(seats_up) = next_doc.and_then(|n| read_js_u64(&n.seats_up)) {
        let computed: u32 = council
            .contested_wards()
            .iter()
            .map(|w| council.cycle.seats_up(w.seats))
            .sum();
        if computed as u64 != seats_up {
            warn!(
                "council_from_document: {} seats up declared, {} computed from the wards",
                seats_up, computed
            );
        }
    }
    debug!("council_from_document: {:?}", council.name);
    Ok(council)
}

/// The national picture from the polling and reference documents.
///
/// Polling falls back on the weighted average of individual polls, then on the
/// reference document's national polling.
pub fn national_from_documents(
    polling: Option<&PollingDocument>,
    reference: Option<&ReferenceDocument>,
) -> NationalPicture {
    let aliases = PartyAliases::new(reference);
    let polls: Vec<Poll> = polling
        .map(|p| {
            p.individual_polls
                .iter()
                .map(|poll| Poll {
                    pollster: poll.pollster.clone().unwrap_or_default(),
                    date: poll.date.clone(),
                    weight: read_js_number(&poll.weight).unwrap_or(1.0),
                    shares: aliases.fractions(&poll.shares),
                })
                .collect()
        })
        .unwrap_or_default();

    let current = match polling.and_then(|p| p.aggregate.as_ref()) {
        Some(agg) => aliases.fractions(agg),
        None if !polls.is_empty() => {
            info!("national_from_documents: no aggregate, averaging {} polls", polls.len());
            aggregate_polls(&polls)
        }
        None => {
            let fallback = reference
                .and_then(|r| r.national_polling.as_ref())
                .map(|s| aliases.fractions(s))
                .unwrap_or_default();
            if fallback.is_empty() {
                warn!("national_from_documents: no current polling available");
            }
            fallback
        }
    };

    NationalPicture {
        current,
        baseline: reference
            .and_then(|r| r.prior_election.as_ref())
            .map(|s| aliases.fractions(s)),
        reported_swing: polling
            .map(|p| aliases.deltas(&p.swing_from_baseline))
            .unwrap_or_default(),
        trend_30d: polling
            .map(|p| aliases.deltas(&p.trend_30d))
            .unwrap_or_default(),
        polls,
    }
}

fn number_or(x: &Option<JSValue>, default: f64) -> f64 {
    read_js_number(x).unwrap_or(default)
}

pub fn params_from_reference(reference: Option<&ReferenceDocument>) -> ModelParameters {
    let defaults = ModelParameters::default();
    let doc = match reference.and_then(|r| r.model_parameters.as_ref()) {
        Some(d) => d,
        None => return defaults,
    };
    let aliases = PartyAliases::new(reference);
    ModelParameters {
        swing_dampening: aliases.shares(&doc.swing_dampening),
        default_dampening: number_or(&doc.default_dampening, defaults.default_dampening),
        incumbency_bonus: number_or(&doc.incumbency_bonus, defaults.incumbency_bonus),
        demographic_coefficients: doc
            .demographic_coefficients
            .iter()
            .map(|(party, coefs)| {
                let c: BTreeMap<String, f64> = coefs
                    .iter()
                    .filter_map(|(k, v)| read_js_number(&Some(v.clone())).map(|x| (k.clone(), x)))
                    .collect();
                (aliases.resolve(party), c)
            })
            .collect(),
        indicator_means: doc
            .indicator_means
            .iter()
            .filter_map(|(k, v)| read_js_number(&Some(v.clone())).map(|x| (k.clone(), x)))
            .collect(),
        max_demographic_shift: number_or(&doc.max_demographic_shift, defaults.max_demographic_shift),
        mapped_proxy_weight: number_or(&doc.mapped_proxy_weight, defaults.mapped_proxy_weight),
        fallback_proxy_weight: number_or(&doc.fallback_proxy_weight, defaults.fallback_proxy_weight),
        max_baseline_age_years: read_js_i32(&doc.max_baseline_age_years)
            .or(defaults.max_baseline_age_years),
        confidence: ConfidenceCutoffs {
            high_margin: number_or(&doc.high_confidence_margin, defaults.confidence.high_margin),
            low_margin: number_or(&doc.low_confidence_margin, defaults.confidence.low_margin),
        },
        coalition: CoalitionRules {
            max_parties: read_js_u64(&doc.max_coalition_parties)
                .map(|n| n as usize)
                .unwrap_or(defaults.coalition.max_parties),
            include_largest_bloc: doc
                .include_largest_bloc
                .unwrap_or(defaults.coalition.include_largest_bloc),
        },
    }
}

pub fn indicators_from_document(doc: &IndicatorsDocument) -> BTreeMap<String, IndicatorRecord> {
    doc.wards()
        .iter()
        .map(|(ward, values)| {
            let values: BTreeMap<String, f64> = values
                .iter()
                .filter_map(|(k, v)| read_js_number(&Some(v.clone())).map(|x| (k.clone(), x)))
                .collect();
            (ward.clone(), IndicatorRecord { values })
        })
        .collect()
}

/// The constituency proxies of one council: explicit ward mappings and the fallback.
pub fn proxies_for(
    reference: Option<&ReferenceDocument>,
    council_name: &str,
) -> (BTreeMap<String, PartyShares>, Option<PartyShares>) {
    let key = council_key(council_name);
    let aliases = PartyAliases::new(reference);
    let proxy = reference.and_then(|r| {
        r.constituency_proxies
            .iter()
            .find(|(name, _)| council_key(name) == key)
            .map(|(_, p)| p)
    });
    match proxy {
        Some(p) => (
            p.ward_mapping
                .iter()
                .map(|(w, s)| (w.clone(), aliases.fractions(s)))
                .collect(),
            p.default.as_ref().map(|s| aliases.fractions(s)),
        ),
        None => (BTreeMap::new(), None),
    }
}

pub fn lgr_models(doc: &LgrDocument, only: Option<&str>) -> Vec<LgrModel> {
    doc.proposed_models
        .iter()
        .filter(|m| only.map(|id| id == m.id).unwrap_or(true))
        .map(|m| LgrModel {
            id: m.id.clone(),
            name: m.name.clone().unwrap_or_else(|| m.id.clone()),
            source: m.source.clone(),
            authorities: m
                .authorities
                .iter()
                .map(|a| ProposedAuthority {
                    name: a.name.clone(),
                    councils: a.councils.clone(),
                    wards: a.wards.clone(),
                })
                .collect(),
        })
        .collect()
}

pub fn assumptions_from(doc: &AssumptionsDocument, reference: Option<&ReferenceDocument>) -> Assumptions {
    let aliases = PartyAliases::new(reference);
    let defaults = Assumptions::default();
    Assumptions {
        swing_multiplier: doc.swing_multiplier.unwrap_or(defaults.swing_multiplier),
        turnout_adjustment: doc.turnout_adjustment.unwrap_or(defaults.turnout_adjustment),
        new_entrants: doc
            .new_entrants
            .iter()
            .map(|p| aliases.resolve(p))
            .collect::<BTreeSet<String>>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_in_many_shapes() {
        assert_eq!(read_js_number(&Some(json!(12))), Some(12.0));
        assert_eq!(read_js_number(&Some(json!("1,234"))), Some(1234.0));
        assert_eq!(read_js_number(&Some(json!("31.5%"))), Some(31.5));
        assert_eq!(read_js_number(&Some(json!("n/a"))), None);
        assert_eq!(read_js_number(&None), None);
        assert_eq!(as_fraction(31.5), 0.315);
        assert_eq!(as_fraction(0.315), 0.315);
    }

    #[test]
    fn percent_scale_is_decided_per_set() {
        let polling: PollingDocument = serde_json::from_value(json!({
            "aggregate": { "Labour": 30, "Conservative": 25, "Reform": 28, "Green": 10, "Other": 0.8 }
        }))
        .unwrap();
        let national = national_from_documents(Some(&polling), None);
        assert!((national.current["Other"] - 0.008).abs() < 1e-12);
        assert!((national.current["Labour"] - 0.3).abs() < 1e-12);

        // Already fractions: left alone.
        let aliases = PartyAliases::new(None);
        let raw: RawShares = serde_json::from_value(json!({ "A": 0.6, "B": 0.4 })).unwrap();
        assert_eq!(aliases.fractions(&raw)["A"], 0.6);

        // All small values but clearly percentages by their sum.
        assert_eq!(percent_scale(vec![0.9, 0.8, 0.7]), 100.0);
        assert_eq!(percent_scale(vec![0.5, 0.3, 0.2]), 1.0);

        let e: ElectionDocument = serde_json::from_value(json!({
            "year": 2022,
            "candidates": [
                { "party": "A", "share": 70.5 },
                { "party": "B", "share": 28.9 },
                { "party": "C", "share": 0.6 }
            ]
        }))
        .unwrap();
        let e = election(&e, &aliases).unwrap();
        assert!((e.candidates[2].share.unwrap() - 0.006).abs() < 1e-12);
    }

    #[test]
    fn cycles_and_kinds() {
        assert_eq!(parse_cycle("Thirds"), Some(ElectionCycle::Thirds));
        assert_eq!(parse_cycle("all-out"), Some(ElectionCycle::AllOut));
        assert_eq!(parse_cycle("halves"), Some(ElectionCycle::Halves));
        assert_eq!(parse_cycle("unknown"), None);
        assert_eq!(parse_kind(Some("by-election")), ElectionKind::ByElection);
        assert_eq!(parse_kind(None), ElectionKind::Ordinary);
    }

    #[test]
    fn history_with_alternative_field_names() {
        let doc: HistoryDocument = serde_json::from_value(json!({
            "meta": {
                "totalSeats": 3,
                "cycle": "thirds",
                "nextElection": {
                    "date": "2026-05-07",
                    "wardsUp": ["Abbey", "Ghost"],
                    "defenders": { "Abbey": { "councillor": "A. Person", "party": "Lab" } }
                }
            },
            "wards": {
                "Abbey": {
                    "electors": "6,500",
                    "seats": 3,
                    "councillors": [
                        { "name": "A. Person", "party": "Lab" },
                        { "name": "B. Person", "party": "Con" }
                    ],
                    "elections": [
                        { "date": "2024-05-02", "electionType": "thirds", "turnout": 31,
                          "results": [
                              { "candidate": "A. Person", "party": "Lab", "votes": "1,100" },
                              { "candidate": "C. Person", "party": "Con", "pct": 40 }
                          ] }
                    ]
                }
            }
        }))
        .unwrap();
        let reference: ReferenceDocument = serde_json::from_value(json!({
            "partyAliases": { "Lab": "Labour", "Con": "Conservative" }
        }))
        .unwrap();
        let council = council_from_document(&doc, "Testshire", Some(&reference), "mem").unwrap();
        assert_eq!(council.cycle, ElectionCycle::Thirds);
        let abbey = &council.wards["Abbey"];
        assert_eq!(abbey.electorate, Some(6500));
        assert_eq!(abbey.current_holders[1].party, "Conservative");
        let e = &abbey.history[0];
        assert_eq!(e.year, 2024);
        assert_eq!(e.kind, ElectionKind::Thirds);
        assert_eq!(e.turnout, Some(0.31));
        assert_eq!(e.candidates[0].votes, Some(1100));
        assert_eq!(e.candidates[1].share, Some(0.4));
        let next = council.next_election.as_ref().unwrap();
        assert_eq!(next.year, Some(2026));
        assert_eq!(next.wards_up, Some(vec!["Abbey".to_string()]));
        assert_eq!(next.defenders["Abbey"].party, "Labour");
    }

    #[test]
    fn polling_falls_back_on_individual_polls() {
        let polling: PollingDocument = serde_json::from_value(json!({
            "individualPolls": [
                { "pollster": "X", "weight": 1, "shares": { "A": 40, "B": 60 } },
                { "pollster": "Y", "weight": 1, "shares": { "A": 60, "B": 40 } }
            ],
            "swingFromBaseline": { "A": -0.02 },
            "trend30d": { "A": 1.5, "B": -0.5 }
        }))
        .unwrap();
        let national = national_from_documents(Some(&polling), None);
        assert!((national.current["A"] - 0.5).abs() < 1e-9);
        assert_eq!(national.baseline, None);
        assert_eq!(national.reported_swing["A"], -0.02);
        // Points, since one delta is above 1 in size.
        assert_eq!(national.trend_30d["A"], 0.015);
        assert_eq!(national.trend_30d["B"], -0.005);
    }

    #[test]
    fn indicators_wrapped_or_flat() {
        let wrapped: IndicatorsDocument =
            serde_json::from_value(json!({ "wards": { "Abbey": { "imdScore": "21.5", "label": "x" } } }))
                .unwrap();
        let flat: IndicatorsDocument =
            serde_json::from_value(json!({ "Abbey": { "imdScore": 21.5 } })).unwrap();
        assert_eq!(indicators_from_document(&wrapped), indicators_from_document(&flat));
    }

    #[test]
    fn model_parameters_override_defaults() {
        let reference: ReferenceDocument = serde_json::from_value(json!({
            "modelParameters": { "incumbencyBonus": 0.02, "highConfidenceMargin": "0.12",
                                 "swingDampening": { "Lab": 0.8 } },
            "partyAliases": { "Lab": "Labour" }
        }))
        .unwrap();
        let params = params_from_reference(Some(&reference));
        assert_eq!(params.incumbency_bonus, 0.02);
        assert_eq!(params.confidence.high_margin, 0.12);
        assert_eq!(params.confidence.low_margin, ConfidenceCutoffs::DEFAULT.low_margin);
        assert_eq!(params.dampening("Labour"), 0.8);
    }
}
