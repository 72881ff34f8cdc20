use log::{debug, warn};

use crate::config::*;

const MAX_SWING_MULTIPLIER: f64 = 3.0;

/// Where the raw national swing came from.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SwingSource {
    /// Current polling minus the baseline result.
    Baseline,
    /// Deltas reported by the polling source.
    Reported,
    /// Nothing to derive a swing from.
    Missing,
}

/// The per-party adjustment applied to local shares.
#[derive(PartialEq, Debug, Clone)]
pub struct Swing {
    pub deltas: PartyShares,
    pub source: SwingSource,
    pub multiplier: f64,
}

impl Swing {
    pub fn delta(&self, party: &str) -> f64 {
        self.deltas.get(party).cloned().unwrap_or(0.0)
    }
}

impl Assumptions {
    /// Returns a copy with every value clamped into its valid domain.
    pub fn sanitized(&self) -> Assumptions {
        let swing_multiplier = if self.swing_multiplier.is_finite() {
            self.swing_multiplier.clamp(0.0, MAX_SWING_MULTIPLIER)
        } else {
            1.0
        };
        if swing_multiplier != self.swing_multiplier {
            warn!(
                "sanitized: swing multiplier {} clamped to {}",
                self.swing_multiplier, swing_multiplier
            );
        }
        let turnout_adjustment = if self.turnout_adjustment.is_finite() {
            self.turnout_adjustment.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        if turnout_adjustment != self.turnout_adjustment {
            warn!(
                "sanitized: turnout adjustment {} clamped to {}",
                self.turnout_adjustment, turnout_adjustment
            );
        }
        Assumptions {
            swing_multiplier,
            turnout_adjustment,
            new_entrants: self.new_entrants.clone(),
        }
    }
}

/// Computes the local swing of every party from the national picture.
///
/// `swing[p] = (current[p] - baseline[p]) * multiplier * dampening[p]`
///
/// A party missing from the baseline is a new entrant: its baseline share is 0 and
/// all of its current support counts as swing.
pub fn compute_swing(
    national: &NationalPicture,
    assumptions: &Assumptions,
    params: &ModelParameters,
) -> Swing {
    let assumptions = assumptions.sanitized();
    let multiplier = assumptions.swing_multiplier;

    let (raw, source): (PartyShares, SwingSource) = match &national.baseline {
        Some(baseline) => {
            let mut raw = PartyShares::new();
            for (party, current) in national.current.iter() {
                let base = baseline.get(party).cloned().unwrap_or(0.0);
                raw.insert(party.clone(), current - base);
            }
            // Parties that stood at the baseline but are not polled any more.
            for (party, base) in baseline.iter() {
                if !national.current.contains_key(party) {
                    raw.insert(party.clone(), -base);
                }
            }
            (raw, SwingSource::Baseline)
        }
        None if !national.reported_swing.is_empty() => {
            (national.reported_swing.clone(), SwingSource::Reported)
        }
        None => {
            warn!("compute_swing: no baseline and no reported swing, using a zero swing");
            (PartyShares::new(), SwingSource::Missing)
        }
    };

    let deltas: PartyShares = raw
        .iter()
        .map(|(party, d)| (party.clone(), d * multiplier * params.dampening(party)))
        .collect();
    debug!("compute_swing: source: {:?} deltas: {:?}", source, deltas);
    Swing {
        deltas,
        source,
        multiplier,
    }
}

/// Weighted average of individual polls, renormalised to sum to 1.
///
/// Polls with a non-positive weight are ignored.
pub fn aggregate_polls(polls: &[Poll]) -> PartyShares {
    let mut weighted = PartyShares::new();
    let mut total_weight = 0.0;
    for poll in polls.iter().filter(|p| p.weight > 0.0 && p.weight.is_finite()) {
        total_weight += poll.weight;
        for (party, share) in poll.shares.iter() {
            *weighted.entry(party.clone()).or_insert(0.0) += poll.weight * share;
        }
    }
    if total_weight <= 0.0 {
        return PartyShares::new();
    }
    for v in weighted.values_mut() {
        *v /= total_weight;
    }
    normalize(&weighted).unwrap_or_default()
}

/// Rescales non-negative shares to sum to 1. Returns `None` when nothing is left.
pub(crate) fn normalize(shares: &PartyShares) -> Option<PartyShares> {
    let total: f64 = shares.values().map(|s| s.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some(
        shares
            .iter()
            .map(|(p, s)| (p.clone(), s.max(0.0) / total))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares(l: &[(&str, f64)]) -> PartyShares {
        l.iter().map(|(p, s)| (p.to_string(), *s)).collect()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn swing_against_baseline() {
        let national = NationalPicture {
            current: shares(&[("A", 0.30), ("B", 0.25), ("C", 0.20)]),
            baseline: Some(shares(&[("A", 0.28), ("B", 0.30), ("C", 0.18)])),
            ..Default::default()
        };
        let swing = compute_swing(
            &national,
            &Assumptions::default(),
            &ModelParameters::default(),
        );
        assert_eq!(swing.source, SwingSource::Baseline);
        assert_close(swing.delta("A"), 0.02);
        assert_close(swing.delta("B"), -0.05);
        assert_close(swing.delta("C"), 0.02);
    }

    #[test]
    fn new_entrant_swing_is_its_whole_share() {
        let national = NationalPicture {
            current: shares(&[("A", 0.40), ("Reform", 0.15)]),
            baseline: Some(shares(&[("A", 0.45), ("Gone", 0.05)])),
            ..Default::default()
        };
        let swing = compute_swing(
            &national,
            &Assumptions::default(),
            &ModelParameters::default(),
        );
        assert_close(swing.delta("Reform"), 0.15);
        assert_close(swing.delta("Gone"), -0.05);
    }

    #[test]
    fn multiplier_and_dampening() {
        let national = NationalPicture {
            current: shares(&[("A", 0.40), ("B", 0.30)]),
            baseline: Some(shares(&[("A", 0.30), ("B", 0.40)])),
            ..Default::default()
        };
        let assumptions = Assumptions {
            swing_multiplier: 0.5,
            ..Default::default()
        };
        let mut params = ModelParameters::default();
        params.swing_dampening.insert("B".to_string(), 0.5);
        let swing = compute_swing(&national, &assumptions, &params);
        assert_close(swing.delta("A"), 0.05);
        assert_close(swing.delta("B"), -0.025);
    }

    #[test]
    fn reported_swing_without_baseline() {
        let national = NationalPicture {
            current: shares(&[("A", 0.40)]),
            reported_swing: shares(&[("A", -0.03)]),
            ..Default::default()
        };
        let swing = compute_swing(
            &national,
            &Assumptions::default(),
            &ModelParameters::default(),
        );
        assert_eq!(swing.source, SwingSource::Reported);
        assert_close(swing.delta("A"), -0.03);
    }

    #[test]
    fn missing_swing_is_zero() {
        let swing = compute_swing(
            &NationalPicture::default(),
            &Assumptions::default(),
            &ModelParameters::default(),
        );
        assert_eq!(swing.source, SwingSource::Missing);
        assert_close(swing.delta("A"), 0.0);
    }

    #[test]
    fn invalid_assumptions_are_clamped() {
        let a = Assumptions {
            swing_multiplier: -2.0,
            turnout_adjustment: -7.0,
            ..Default::default()
        }
        .sanitized();
        assert_close(a.swing_multiplier, 0.0);
        assert_close(a.turnout_adjustment, -1.0);
        let b = Assumptions {
            swing_multiplier: f64::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_close(b.swing_multiplier, 1.0);
    }

    #[test]
    fn weighted_poll_average() {
        let polls = vec![
            Poll {
                pollster: "P1".to_string(),
                date: None,
                weight: 3.0,
                shares: shares(&[("A", 0.40), ("B", 0.60)]),
            },
            Poll {
                pollster: "P2".to_string(),
                date: None,
                weight: 1.0,
                shares: shares(&[("A", 0.80), ("B", 0.20)]),
            },
            Poll {
                pollster: "ignored".to_string(),
                date: None,
                weight: 0.0,
                shares: shares(&[("C", 1.0)]),
            },
        ];
        let agg = aggregate_polls(&polls);
        assert_close(agg["A"], 0.5);
        assert_close(agg["B"], 0.5);
        assert!(!agg.contains_key("C"));
    }
}
