// ********* Input data structures ***********

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;

/// Vote shares (or share deltas) keyed by party name.
///
/// A `BTreeMap` keeps every iteration in lexical party order, which is what makes
/// repeated runs produce identical outputs.
pub type PartyShares = BTreeMap<String, f64>;

/// Seats keyed by party name.
pub type SeatTotals = BTreeMap<String, u32>;

/// The bucket that receives seats with no recorded holder or no predicted winner.
pub const UNALLOCATED: &str = "Unallocated";

/// The kind of contest a historical result comes from.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum ElectionKind {
    /// All seats of the ward were up.
    Ordinary,
    /// A single vacancy was filled outside the normal cycle.
    ByElection,
    /// One seat in three is up in each cycle.
    Thirds,
    /// One seat in two is up in each cycle.
    Halves,
}

impl ElectionKind {
    /// By-elections have their own turnout and campaign dynamics and are only used
    /// as a baseline when nothing else exists.
    pub fn is_comparable(&self) -> bool {
        !matches!(self, ElectionKind::ByElection)
    }
}

/// How the council renews its seats.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ElectionCycle {
    AllOut,
    Thirds,
    Halves,
}

impl ElectionCycle {
    /// The number of seats a ward of the given size puts up in one cycle.
    pub fn seats_up(&self, ward_seats: u32) -> u32 {
        let up = match self {
            ElectionCycle::AllOut => ward_seats,
            ElectionCycle::Thirds => 1,
            ElectionCycle::Halves => (ward_seats + 1) / 2,
        };
        up.min(ward_seats)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct CandidateResult {
    pub name: String,
    pub party: String,
    pub votes: Option<u64>,
    /// Fraction in [0, 1].
    pub share: Option<f64>,
    pub elected: bool,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Election {
    pub year: i32,
    pub date: Option<String>,
    pub kind: ElectionKind,
    /// Fraction in [0, 1].
    pub turnout: Option<f64>,
    pub candidates: Vec<CandidateResult>,
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Holder {
    pub name: String,
    pub party: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Ward {
    pub name: String,
    pub electorate: Option<u64>,
    pub seats: u32,
    pub current_holders: Vec<Holder>,
    /// Ordered from the oldest to the most recent election.
    pub history: Vec<Election>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct NextElection {
    pub year: Option<i32>,
    pub date: Option<String>,
    /// The wards with a seat up. `None` means every ward.
    pub wards_up: Option<Vec<String>>,
    pub defenders: BTreeMap<String, Holder>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Council {
    pub name: String,
    pub cycle: ElectionCycle,
    pub wards: BTreeMap<String, Ward>,
    pub next_election: Option<NextElection>,
    /// The total declared by the source, if any. The ward seats are authoritative.
    pub declared_total_seats: Option<u32>,
}

impl Council {
    pub fn total_seats(&self) -> u32 {
        self.wards.values().map(|w| w.seats).sum()
    }

    /// The wards with at least one seat up at the next election, in name order.
    pub fn contested_wards(&self) -> Vec<&Ward> {
        match self.next_election.as_ref().and_then(|ne| ne.wards_up.as_ref()) {
            Some(up) => self
                .wards
                .values()
                .filter(|w| up.iter().any(|n| *n == w.name))
                .collect(),
            None => self.wards.values().collect(),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Poll {
    pub pollster: String,
    pub date: Option<String>,
    pub weight: f64,
    pub shares: PartyShares,
}

/// The national polling situation the swing is derived from.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct NationalPicture {
    /// Current aggregate polling shares.
    pub current: PartyShares,
    /// The reference result the swing is measured against (e.g. the last general election).
    pub baseline: Option<PartyShares>,
    /// Swing deltas as reported by the polling source, used when no baseline is known.
    pub reported_swing: PartyShares,
    pub trend_30d: PartyShares,
    pub polls: Vec<Poll>,
}

/// Local indicators (demographics or deprivation) for one ward.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct IndicatorRecord {
    pub values: BTreeMap<String, f64>,
}

/// User-controlled what-if settings. Never persisted.
#[derive(PartialEq, Debug, Clone)]
pub struct Assumptions {
    pub swing_multiplier: f64,
    /// Added to the baseline turnout, in fraction points.
    pub turnout_adjustment: f64,
    /// Parties assumed to stand in every contested ward.
    pub new_entrants: BTreeSet<String>,
}

impl Default for Assumptions {
    fn default() -> Self {
        Assumptions {
            swing_multiplier: 1.0,
            turnout_adjustment: 0.0,
            new_entrants: BTreeSet::new(),
        }
    }
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PartyResult {
    pub votes: f64,
    pub share: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// No usable local baseline.
    None,
}

impl Confidence {
    pub fn label(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::None => "none",
        }
    }
}

/// One entry of the explainability trail of a ward prediction.
#[derive(PartialEq, Debug, Clone)]
pub struct MethodologyStep {
    pub step: u32,
    pub name: String,
    pub description: String,
    pub inputs: Vec<(String, f64)>,
    pub outputs: Vec<(String, f64)>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PredictionResult {
    pub ward: String,
    pub parties: BTreeMap<String, PartyResult>,
    pub winner: Option<String>,
    pub margin: f64,
    pub margin_pct: f64,
    pub estimated_turnout: Option<f64>,
    pub confidence: Confidence,
    pub methodology: Vec<MethodologyStep>,
    pub defender: Option<Holder>,
    pub seats_up: u32,
}

impl PredictionResult {
    /// True when the predicted winner differs from the defending party.
    pub fn is_gain(&self) -> bool {
        match (&self.winner, &self.defender) {
            (Some(w), Some(d)) => *w != d.party,
            _ => false,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CoalitionKind {
    SinglePartyMajority,
    MultiPartyCoalition,
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Coalition {
    /// Seats descending, then name.
    pub parties: Vec<String>,
    pub seats: u32,
    /// Seats beyond the majority threshold.
    pub working_majority: u32,
    pub kind: CoalitionKind,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProposedAuthority {
    pub name: String,
    pub councils: Vec<String>,
    /// Wards absorbed when an existing council is split between authorities.
    pub wards: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LgrModel {
    pub id: String,
    pub name: String,
    pub source: Option<String>,
    pub authorities: Vec<ProposedAuthority>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AuthorityProjection {
    pub seats: SeatTotals,
    pub total_seats: u32,
    pub largest_party: Option<String>,
    pub has_majority: bool,
    /// Other councils feed this authority and their results are not included.
    pub partial: bool,
    pub contributing_council: String,
}

/// Errors from assembling the engine's inputs.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ProjectionErrors {
    DuplicateWard(String),
    UnknownWard(String),
    EmptyCouncil,
}

impl Error for ProjectionErrors {}

impl Display for ProjectionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectionErrors::DuplicateWard(w) => write!(f, "ward declared twice: {}", w),
            ProjectionErrors::UnknownWard(w) => write!(f, "unknown ward: {}", w),
            ProjectionErrors::EmptyCouncil => write!(f, "council has no wards"),
        }
    }
}

// ********* Configuration **********

/// Margin cutoffs, as share differences between the first and second party.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ConfidenceCutoffs {
    pub high_margin: f64,
    pub low_margin: f64,
}

impl ConfidenceCutoffs {
    pub const DEFAULT: ConfidenceCutoffs = ConfidenceCutoffs {
        high_margin: 0.10,
        low_margin: 0.05,
    };
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CoalitionRules {
    /// The largest number of parties considered in one coalition.
    pub max_parties: usize,
    /// Also report the smallest group of top parties that reaches a majority.
    pub include_largest_bloc: bool,
}

impl CoalitionRules {
    pub const DEFAULT: CoalitionRules = CoalitionRules {
        max_parties: 4,
        include_largest_bloc: true,
    };
}

/// Model coefficients. They are supplied, never trained here.
#[derive(PartialEq, Debug, Clone)]
pub struct ModelParameters {
    /// Per-party fraction of the national swing that transfers to local contests.
    pub swing_dampening: PartyShares,
    pub default_dampening: f64,
    pub incumbency_bonus: f64,
    /// party -> indicator -> share shift per unit of indicator above its mean.
    pub demographic_coefficients: BTreeMap<String, BTreeMap<String, f64>>,
    pub indicator_means: BTreeMap<String, f64>,
    pub max_demographic_shift: f64,
    /// Blend weight for wards with an explicit constituency proxy.
    pub mapped_proxy_weight: f64,
    /// Blend weight for wards relying on the council-wide fallback proxy.
    pub fallback_proxy_weight: f64,
    /// Baselines older than this (relative to the cycle year) count as sparse history.
    pub max_baseline_age_years: Option<i32>,
    pub confidence: ConfidenceCutoffs,
    pub coalition: CoalitionRules,
}

impl Default for ModelParameters {
    fn default() -> Self {
        ModelParameters {
            swing_dampening: BTreeMap::new(),
            default_dampening: 1.0,
            incumbency_bonus: 0.0,
            demographic_coefficients: BTreeMap::new(),
            indicator_means: BTreeMap::new(),
            max_demographic_shift: 0.05,
            mapped_proxy_weight: 0.25,
            fallback_proxy_weight: 0.10,
            max_baseline_age_years: Some(8),
            confidence: ConfidenceCutoffs::DEFAULT,
            coalition: CoalitionRules::DEFAULT,
        }
    }
}

impl ModelParameters {
    pub fn dampening(&self, party: &str) -> f64 {
        self.swing_dampening
            .get(party)
            .cloned()
            .unwrap_or(self.default_dampening)
    }
}

/// Everything besides the council itself that a council prediction depends on.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ProjectionInputs {
    pub national: NationalPicture,
    pub assumptions: Assumptions,
    pub params: ModelParameters,
    pub demographics: BTreeMap<String, IndicatorRecord>,
    pub deprivation: BTreeMap<String, IndicatorRecord>,
    /// Constituency-level shares explicitly mapped to a ward.
    pub ward_proxies: BTreeMap<String, PartyShares>,
    /// Constituency-level shares used for the wards without an explicit mapping.
    pub council_proxy: Option<PartyShares>,
}
