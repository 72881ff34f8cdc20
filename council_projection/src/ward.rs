use log::{debug, warn};

use std::collections::BTreeMap;

use crate::config::*;
use crate::swing::{normalize, Swing};

// Shares are compared on this grid so that ranking is a total order.
const SHARE_GRID: f64 = 1e9;

/// Everything a single ward prediction depends on besides the ward itself.
#[derive(Debug, Clone)]
pub struct WardContext<'a> {
    pub swing: &'a Swing,
    /// Expected to be sanitized already.
    pub assumptions: &'a Assumptions,
    pub params: &'a ModelParameters,
    pub demographics: Option<&'a IndicatorRecord>,
    pub deprivation: Option<&'a IndicatorRecord>,
    pub ward_proxy: Option<&'a PartyShares>,
    pub council_proxy: Option<&'a PartyShares>,
    /// The defender recorded for the upcoming contest, if any.
    pub declared_defender: Option<&'a Holder>,
    /// The year of the contest being predicted, when known.
    pub cycle_year: Option<i32>,
    pub seats_up: u32,
}

#[derive(Default)]
struct Trail {
    steps: Vec<MethodologyStep>,
}

impl Trail {
    fn record(
        &mut self,
        name: &str,
        description: String,
        inputs: Vec<(String, f64)>,
        outputs: Vec<(String, f64)>,
    ) {
        let step = self.steps.len() as u32 + 1;
        debug!("trail: step {} {}: {}", step, name, description);
        self.steps.push(MethodologyStep {
            step,
            name: name.to_string(),
            description,
            inputs,
            outputs,
        });
    }
}

fn share_pairs(shares: &PartyShares) -> Vec<(String, f64)> {
    shares.iter().map(|(p, s)| (p.clone(), *s)).collect()
}

/// The local vote shares of one historical election, with the total votes when every
/// candidate has a vote count.
struct BaselineShares {
    shares: PartyShares,
    total_votes: Option<f64>,
    /// Candidates recorded with votes only, whose share was derived from the others.
    derived: Vec<String>,
    /// Candidates recorded with neither votes nor a share.
    unusable: Vec<String>,
}

fn election_shares(election: &Election) -> Option<BaselineShares> {
    if election.candidates.is_empty() {
        return None;
    }
    let all_votes = election.candidates.iter().all(|c| c.votes.is_some());
    let total_votes: u64 = election.candidates.iter().filter_map(|c| c.votes).sum();
    if all_votes && total_votes > 0 {
        let mut shares = PartyShares::new();
        for c in election.candidates.iter() {
            let v = c.votes.unwrap_or(0) as f64 / total_votes as f64;
            *shares.entry(c.party.clone()).or_insert(0.0) += v;
        }
        return Some(BaselineShares {
            shares,
            total_votes: Some(total_votes as f64),
            derived: Vec::new(),
            unusable: Vec::new(),
        });
    }

    let mut raw = PartyShares::new();
    let mut unusable: Vec<String> = Vec::new();
    let mut votes_only: Vec<(&str, u64)> = Vec::new();
    for c in election.candidates.iter() {
        match (c.share, c.votes) {
            (Some(s), _) => *raw.entry(c.party.clone()).or_insert(0.0) += s,
            (None, Some(v)) => votes_only.push((c.party.as_str(), v)),
            (None, None) => unusable.push(c.name.clone()),
        }
    }
    if election.candidates.len() == 1 {
        // Uncontested seats often have neither votes nor shares recorded.
        raw.insert(election.candidates[0].party.clone(), 1.0);
        unusable.clear();
    }

    // Candidates with votes only share whatever the recorded shares leave, in
    // proportion to their votes.
    let mut derived: Vec<String> = Vec::new();
    let known_votes: u64 = votes_only.iter().map(|(_, v)| *v).sum();
    if !votes_only.is_empty() {
        let recorded: f64 = raw.values().sum();
        let remainder = 1.0 - recorded;
        if known_votes > 0 && remainder > 0.0 {
            for (party, v) in votes_only.iter() {
                *raw.entry(party.to_string()).or_insert(0.0) +=
                    remainder * *v as f64 / known_votes as f64;
                derived.push(party.to_string());
            }
        } else {
            for (party, v) in votes_only.iter() {
                if *v > 0 {
                    unusable.push(party.to_string());
                }
            }
        }
    }
    normalize(&raw).map(|shares| BaselineShares {
        shares,
        total_votes: None,
        derived,
        unusable,
    })
}

/// Picks the most recent comparable election with usable shares, falling back to the
/// most recent usable by-election. The flag tells whether the pick is comparable.
fn select_baseline(history: &[Election]) -> Option<(&Election, BaselineShares, bool)> {
    let latest = |comparable_only: bool| {
        history
            .iter()
            .enumerate()
            .filter(|(_, e)| !comparable_only || e.kind.is_comparable())
            .filter_map(|(idx, e)| election_shares(e).map(|s| (idx, e, s)))
            .max_by_key(|(idx, e, _)| (e.year, *idx))
            .map(|(_, e, s)| (e, s))
    };
    if let Some((e, s)) = latest(true) {
        return Some((e, s, true));
    }
    latest(false).map(|(e, s)| (e, s, false))
}

fn resolve_defender(ward: &Ward, ctx: &WardContext, trail: &mut Trail) -> Option<Holder> {
    if let Some(d) = ctx.declared_defender {
        return Some(d.clone());
    }
    match ward.current_holders.first() {
        Some(h) => {
            warn!(
                "predict_ward: {}: no recorded defender, using first holder {} ({})",
                ward.name, h.name, h.party
            );
            trail.record(
                "defender-fallback",
                format!(
                    "No defender recorded for this contest; assuming the first current holder, {} ({}), defends.",
                    h.name, h.party
                ),
                vec![("current_holders".to_string(), ward.current_holders.len() as f64)],
                vec![],
            );
            Some(h.clone())
        }
        None => {
            trail.record(
                "defender-missing",
                "No defender recorded and no current holder known.".to_string(),
                vec![],
                vec![],
            );
            None
        }
    }
}

fn rank_parties(shares: &PartyShares, incumbent: Option<&str>) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = share_pairs(shares);
    ranked.sort_by(|(pa, sa), (pb, sb)| {
        let ka = (sa * SHARE_GRID).round() as i64;
        let kb = (sb * SHARE_GRID).round() as i64;
        let ia = Some(pa.as_str()) == incumbent;
        let ib = Some(pb.as_str()) == incumbent;
        kb.cmp(&ka).then(ib.cmp(&ia)).then_with(|| pa.cmp(pb))
    });
    ranked
}

fn classify(margin_pct: f64, sparse: bool, blended: bool, cutoffs: &ConfidenceCutoffs) -> Confidence {
    if margin_pct < cutoffs.low_margin || sparse {
        Confidence::Low
    } else if margin_pct >= cutoffs.high_margin && !blended {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

fn demographic_shift(party: &str, records: &[&IndicatorRecord], params: &ModelParameters) -> f64 {
    let coefficients = match params.demographic_coefficients.get(party) {
        Some(c) => c,
        None => return 0.0,
    };
    let mut shift = 0.0;
    for (indicator, coef) in coefficients.iter() {
        if let Some(v) = records.iter().find_map(|r| r.values.get(indicator)) {
            let mean = params.indicator_means.get(indicator).cloned().unwrap_or(0.0);
            shift += coef * (v - mean);
        }
    }
    let cap = params.max_demographic_shift.abs();
    shift.clamp(-cap, cap)
}

fn no_baseline(ward: &Ward, ctx: &WardContext, defender: Option<Holder>, mut trail: Trail) -> PredictionResult {
    let winner = defender.as_ref().map(|h| h.party.clone());
    trail.record(
        "baseline",
        match &winner {
            Some(p) => format!(
                "No historical baseline for this ward; keeping the known incumbent party {}.",
                p
            ),
            None => "No historical baseline for this ward; no prediction possible.".to_string(),
        },
        vec![("elections".to_string(), ward.history.len() as f64)],
        vec![],
    );
    PredictionResult {
        ward: ward.name.clone(),
        parties: BTreeMap::new(),
        winner,
        margin: 0.0,
        margin_pct: 0.0,
        estimated_turnout: None,
        confidence: Confidence::None,
        methodology: trail.steps,
        defender,
        seats_up: ctx.seats_up,
    }
}

/// Predicts the outcome of one ward contest.
///
/// This never fails: missing history gives a `Confidence::None` result and data
/// problems are recorded in the methodology trail.
pub fn predict_ward(ward: &Ward, ctx: &WardContext) -> PredictionResult {
    let mut trail = Trail::default();
    let defender = resolve_defender(ward, ctx, &mut trail);
    let incumbent: Option<String> = defender.as_ref().map(|h| h.party.clone());

    let (election, baseline, comparable) = match select_baseline(&ward.history) {
        Some(x) => x,
        None => {
            debug!("predict_ward: {}: no usable history", ward.name);
            return no_baseline(ward, ctx, defender, trail);
        }
    };

    trail.record(
        "baseline",
        if comparable {
            format!(
                "Local baseline: most recent comparable election ({}, {:?}).",
                election.year, election.kind
            )
        } else {
            format!(
                "Only by-elections on record; using the {} by-election as baseline.",
                election.year
            )
        },
        vec![
            ("year".to_string(), election.year as f64),
            ("candidates".to_string(), election.candidates.len() as f64),
        ],
        share_pairs(&baseline.shares),
    );

    if !baseline.derived.is_empty() || !baseline.unusable.is_empty() {
        warn!(
            "predict_ward: {}: incomplete baseline, derived: {:?} unusable: {:?}",
            ward.name, baseline.derived, baseline.unusable
        );
        trail.record(
            "baseline-discrepancy",
            format!(
                "The baseline mixes vote counts and shares. Shares derived from votes for {:?}; no usable figure for {:?}. The history is treated as sparse.",
                baseline.derived, baseline.unusable
            ),
            vec![
                ("derived".to_string(), baseline.derived.len() as f64),
                ("unusable".to_string(), baseline.unusable.len() as f64),
            ],
            vec![],
        );
    }

    let turnout_base: Option<f64> = election.turnout.or_else(|| {
        match (baseline.total_votes, ward.electorate) {
            (Some(v), Some(e)) if e > 0 => Some(v / e as f64),
            _ => None,
        }
    });

    // Uncontested: the only candidate's party holds trivially.
    if election.candidates.len() == 1 {
        let party = election.candidates[0].party.clone();
        let votes = baseline.total_votes.unwrap_or(0.0);
        trail.record(
            "uncontested",
            format!("The baseline contest was uncontested; {} holds.", party),
            vec![],
            vec![(party.clone(), 1.0)],
        );
        let mut parties = BTreeMap::new();
        parties.insert(party.clone(), PartyResult { votes, share: 1.0 });
        return PredictionResult {
            ward: ward.name.clone(),
            parties,
            winner: Some(party),
            margin: votes,
            margin_pct: 1.0,
            estimated_turnout: turnout_base,
            confidence: Confidence::High,
            methodology: trail.steps,
            defender,
            seats_up: ctx.seats_up,
        };
    }

    let mut blended = !comparable;

    // Swing
    let swung: PartyShares = baseline
        .shares
        .iter()
        .map(|(p, s)| (p.clone(), (s + ctx.swing.delta(p)).max(0.0)))
        .collect();
    let mut shares = match normalize(&swung) {
        Some(s) => s,
        None => {
            warn!(
                "predict_ward: {}: swing removed every party, keeping the baseline",
                ward.name
            );
            baseline.shares.clone()
        }
    };
    trail.record(
        "swing",
        format!(
            "Applied national swing (multiplier {:.2}) to local shares and renormalised.",
            ctx.swing.multiplier
        ),
        baseline
            .shares
            .keys()
            .map(|p| (p.clone(), ctx.swing.delta(p)))
            .collect(),
        share_pairs(&shares),
    );

    // New entrants
    let mut seeded: Vec<(String, f64)> = Vec::new();
    let mut seeded_from: Vec<&str> = Vec::new();
    for party in ctx.assumptions.new_entrants.iter() {
        if shares.contains_key(party) {
            continue;
        }
        let (seed, from) = if let Some(s) = ctx.ward_proxy.and_then(|p| p.get(party)) {
            (*s, "ward proxy")
        } else if let Some(s) = ctx.council_proxy.and_then(|p| p.get(party)) {
            (*s, "council proxy")
        } else {
            (ctx.swing.delta(party), "national swing")
        };
        if seed > 0.0 {
            seeded.push((party.clone(), seed));
            seeded_from.push(from);
        }
    }
    if !seeded.is_empty() {
        for (party, seed) in seeded.iter() {
            shares.insert(party.clone(), *seed);
        }
        shares = normalize(&shares).unwrap_or(shares);
        blended = true;
        trail.record(
            "new-entrants",
            format!(
                "Seeded parties with no local history from {}.",
                seeded_from.join(", ")
            ),
            seeded,
            share_pairs(&shares),
        );
    }

    // Demographics
    let records: Vec<&IndicatorRecord> = ctx
        .demographics
        .iter()
        .chain(ctx.deprivation.iter())
        .cloned()
        .collect();
    if records.is_empty() {
        trail.record(
            "demographics",
            "No demographic or deprivation data for this ward; no adjustment.".to_string(),
            vec![],
            vec![],
        );
    } else {
        let shifts: Vec<(String, f64)> = shares
            .keys()
            .map(|p| (p.clone(), demographic_shift(p, &records, ctx.params)))
            .filter(|(_, s)| *s != 0.0)
            .collect();
        if !shifts.is_empty() {
            let adjusted: PartyShares = shares
                .iter()
                .map(|(p, s)| {
                    let d = shifts
                        .iter()
                        .find(|(p2, _)| p2 == p)
                        .map(|(_, d)| *d)
                        .unwrap_or(0.0);
                    (p.clone(), (s + d).max(0.0))
                })
                .collect();
            shares = normalize(&adjusted).unwrap_or(shares);
            blended = true;
            trail.record(
                "demographics",
                "Adjusted shares for local demographic and deprivation indicators.".to_string(),
                shifts,
                share_pairs(&shares),
            );
        }
    }

    // Proxy blend
    let proxy = match (ctx.ward_proxy, ctx.council_proxy) {
        (Some(p), _) => Some((p, ctx.params.mapped_proxy_weight, "ward-level proxy")),
        (None, Some(p)) => Some((p, ctx.params.fallback_proxy_weight, "council-wide proxy")),
        (None, None) => None,
    };
    if let Some((proxy, weight, label)) = proxy {
        let weight = weight.clamp(0.0, 1.0);
        let standing: PartyShares = proxy
            .iter()
            .filter(|(p, _)| shares.contains_key(*p))
            .map(|(p, s)| (p.clone(), *s))
            .collect();
        if weight > 0.0 {
            if let Some(proxy_norm) = normalize(&standing) {
                let mixed: PartyShares = shares
                    .iter()
                    .map(|(p, s)| {
                        let ps = proxy_norm.get(p).cloned().unwrap_or(0.0);
                        (p.clone(), (1.0 - weight) * s + weight * ps)
                    })
                    .collect();
                shares = normalize(&mixed).unwrap_or(shares);
                blended = true;
                trail.record(
                    "proxy-blend",
                    format!("Blended local shares with the {} at weight {:.2}.", label, weight),
                    share_pairs(&proxy_norm),
                    share_pairs(&shares),
                );
            }
        }
    }

    // Incumbency
    if let Some(party) = incumbent.as_ref() {
        let bonus = ctx.params.incumbency_bonus;
        if bonus != 0.0 && shares.contains_key(party) {
            if let Some(s) = shares.get_mut(party) {
                *s = (*s + bonus).max(0.0);
            }
            shares = normalize(&shares).unwrap_or(shares);
            trail.record(
                "incumbency",
                format!("Added an incumbency effect of {:.3} to {}.", bonus, party),
                vec![(party.clone(), bonus)],
                share_pairs(&shares),
            );
        }
    }

    // Turnout
    let adjustment = ctx.assumptions.turnout_adjustment;
    let estimated_turnout = turnout_base.map(|t| (t + adjustment).clamp(0.0, 1.0));
    let total_votes: f64 = match (ward.electorate, estimated_turnout) {
        (Some(e), Some(t)) if e > 0 => e as f64 * t,
        _ => baseline.total_votes.unwrap_or(0.0),
    };
    trail.record(
        "turnout",
        match estimated_turnout {
            Some(t) => format!(
                "Estimated turnout {:.1}% (baseline adjusted by {:+.1} points).",
                t * 100.0,
                adjustment * 100.0
            ),
            None => "No baseline turnout known; turnout not estimated.".to_string(),
        },
        turnout_base
            .map(|t| ("baseline_turnout".to_string(), t))
            .into_iter()
            .chain(std::iter::once(("adjustment".to_string(), adjustment)))
            .collect(),
        estimated_turnout
            .map(|t| ("turnout".to_string(), t))
            .into_iter()
            .chain(std::iter::once(("total_votes".to_string(), total_votes)))
            .collect(),
    );

    // Ranking
    let ranked = rank_parties(&shares, incumbent.as_deref());
    let first = ranked.first().cloned();
    let second_share = ranked.get(1).map(|(_, s)| *s).unwrap_or(0.0);
    let (winner, margin_pct) = match first {
        Some((p, s)) => (Some(p), s - second_share),
        None => (None, 0.0),
    };
    let margin = margin_pct * total_votes;
    trail.record(
        "ranking",
        match &winner {
            Some(w) => format!(
                "{} leads by {:.1} points ({:.0} votes).",
                w,
                margin_pct * 100.0,
                margin
            ),
            None => "No party left standing.".to_string(),
        },
        ranked.clone(),
        vec![
            ("margin".to_string(), margin),
            ("margin_pct".to_string(), margin_pct),
        ],
    );

    // Confidence
    let too_old = match (ctx.cycle_year, ctx.params.max_baseline_age_years) {
        (Some(year), Some(max_age)) => year - election.year > max_age,
        _ => false,
    };
    let sparse = baseline.total_votes.is_none() || too_old;
    let confidence = classify(margin_pct, sparse, blended, &ctx.params.confidence);
    trail.record(
        "confidence",
        format!(
            "Confidence {}: margin {:.1} points, {}{}.",
            confidence.label(),
            margin_pct * 100.0,
            if blended {
                "leans on blended data"
            } else {
                "local data only"
            },
            if sparse { ", sparse history" } else { "" }
        ),
        vec![
            ("margin_pct".to_string(), margin_pct),
            ("high_cutoff".to_string(), ctx.params.confidence.high_margin),
            ("low_cutoff".to_string(), ctx.params.confidence.low_margin),
        ],
        vec![],
    );

    let parties: BTreeMap<String, PartyResult> = shares
        .iter()
        .map(|(p, s)| {
            (
                p.clone(),
                PartyResult {
                    votes: s * total_votes,
                    share: *s,
                },
            )
        })
        .collect();

    PredictionResult {
        ward: ward.name.clone(),
        parties,
        winner,
        margin,
        margin_pct,
        estimated_turnout,
        confidence,
        methodology: trail.steps,
        defender,
        seats_up: ctx.seats_up,
    }
}
