// Schemas of the input documents, as published. Most fields are optional and several
// have alternative names; `normalize` turns them into the engine's types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

pub type RawShares = BTreeMap<String, JSValue>;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct HolderDocument {
    #[serde(alias = "councillor")]
    pub name: Option<String>,
    #[serde(alias = "partyName")]
    pub party: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDocument {
    #[serde(alias = "candidate")]
    pub name: Option<String>,
    #[serde(alias = "partyName")]
    pub party: Option<String>,
    pub votes: Option<JSValue>,
    #[serde(alias = "pct", alias = "percentage")]
    pub share: Option<JSValue>,
    pub elected: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionDocument {
    pub year: Option<JSValue>,
    pub date: Option<String>,
    #[serde(rename = "type", alias = "electionType")]
    pub kind: Option<String>,
    #[serde(alias = "turnoutPct")]
    pub turnout: Option<JSValue>,
    #[serde(default, alias = "results")]
    pub candidates: Vec<CandidateDocument>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct WardDocument {
    #[serde(alias = "electors")]
    pub electorate: Option<JSValue>,
    #[serde(alias = "seatCount", alias = "numSeats")]
    pub seats: Option<JSValue>,
    #[serde(default, rename = "currentHolders", alias = "councillors", alias = "holders")]
    pub current_holders: Vec<HolderDocument>,
    #[serde(default, alias = "elections")]
    pub history: Vec<ElectionDocument>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct NextElectionDocument {
    pub date: Option<String>,
    pub year: Option<JSValue>,
    #[serde(rename = "seatsUp")]
    pub seats_up: Option<JSValue>,
    #[serde(rename = "wardsUp")]
    pub wards_up: Option<Vec<String>>,
    #[serde(default)]
    pub defenders: BTreeMap<String, HolderDocument>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMeta {
    #[serde(rename = "councilName", alias = "council", alias = "name")]
    pub council_name: Option<String>,
    #[serde(rename = "totalSeats")]
    pub total_seats: Option<JSValue>,
    #[serde(rename = "totalWards")]
    pub total_wards: Option<JSValue>,
    #[serde(rename = "electionCycle", alias = "cycle")]
    pub election_cycle: Option<String>,
    #[serde(rename = "nextElection")]
    pub next_election: Option<NextElectionDocument>,
}

/// A council-wide election. Only used to infer the cycle when the meta block has none.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CouncilHistoryEntry {
    pub year: Option<JSValue>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Election history of one council.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDocument {
    pub meta: Option<HistoryMeta>,
    #[serde(default)]
    pub wards: BTreeMap<String, WardDocument>,
    #[serde(default, rename = "councilHistory")]
    pub council_history: Vec<CouncilHistoryEntry>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollDocument {
    #[serde(alias = "name")]
    pub pollster: Option<String>,
    pub date: Option<String>,
    pub weight: Option<JSValue>,
    #[serde(default, alias = "results")]
    pub shares: RawShares,
}

/// Current national polling.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollingDocument {
    pub aggregate: Option<RawShares>,
    #[serde(default, rename = "trend30d")]
    pub trend_30d: RawShares,
    #[serde(default, rename = "individualPolls", alias = "polls")]
    pub individual_polls: Vec<PollDocument>,
    #[serde(default, rename = "swingFromBaseline")]
    pub swing_from_baseline: RawShares,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ModelParametersDocument {
    #[serde(default, rename = "swingDampening")]
    pub swing_dampening: RawShares,
    #[serde(rename = "defaultDampening", alias = "localSwingTransfer")]
    pub default_dampening: Option<JSValue>,
    #[serde(rename = "incumbencyBonus")]
    pub incumbency_bonus: Option<JSValue>,
    #[serde(default, rename = "demographicCoefficients")]
    pub demographic_coefficients: BTreeMap<String, RawShares>,
    #[serde(default, rename = "indicatorMeans")]
    pub indicator_means: RawShares,
    #[serde(rename = "maxDemographicShift")]
    pub max_demographic_shift: Option<JSValue>,
    #[serde(rename = "mappedProxyWeight")]
    pub mapped_proxy_weight: Option<JSValue>,
    #[serde(rename = "fallbackProxyWeight")]
    pub fallback_proxy_weight: Option<JSValue>,
    #[serde(rename = "maxBaselineAgeYears")]
    pub max_baseline_age_years: Option<JSValue>,
    #[serde(rename = "highConfidenceMargin")]
    pub high_confidence_margin: Option<JSValue>,
    #[serde(rename = "lowConfidenceMargin")]
    pub low_confidence_margin: Option<JSValue>,
    #[serde(rename = "maxCoalitionParties")]
    pub max_coalition_parties: Option<JSValue>,
    #[serde(rename = "includeLargestBloc")]
    pub include_largest_bloc: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub council: String,
    pub date: Option<String>,
    pub year: Option<JSValue>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ProxyDocument {
    #[serde(default, rename = "wardMapping", alias = "wards")]
    pub ward_mapping: BTreeMap<String, RawShares>,
    #[serde(alias = "fallback")]
    pub default: Option<RawShares>,
}

/// National baselines, model parameters and the election calendar.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDocument {
    #[serde(rename = "nationalPolling", alias = "nationalBaseline")]
    pub national_polling: Option<RawShares>,
    #[serde(rename = "priorElection", alias = "baseline", alias = "generalElection")]
    pub prior_election: Option<RawShares>,
    #[serde(rename = "modelParameters")]
    pub model_parameters: Option<ModelParametersDocument>,
    #[serde(default, rename = "partyAliases")]
    pub party_aliases: BTreeMap<String, String>,
    #[serde(default, rename = "electionCalendar")]
    pub election_calendar: Vec<CalendarEntry>,
    /// Keyed by council name.
    #[serde(default, rename = "constituencyProxies")]
    pub constituency_proxies: BTreeMap<String, ProxyDocument>,
}

/// Demographic or deprivation indicators, either at the top level or under `wards`.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorsDocument {
    Wrapped { wards: BTreeMap<String, RawShares> },
    Flat(BTreeMap<String, RawShares>),
}

impl IndicatorsDocument {
    pub fn wards(&self) -> &BTreeMap<String, RawShares> {
        match self {
            IndicatorsDocument::Wrapped { wards } => wards,
            IndicatorsDocument::Flat(wards) => wards,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityDocument {
    pub name: String,
    #[serde(default)]
    pub councils: Vec<String>,
    #[serde(default)]
    pub wards: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LgrModelDocument {
    pub id: String,
    pub name: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub authorities: Vec<AuthorityDocument>,
}

/// Proposed local-government reorganisation models.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LgrDocument {
    #[serde(default, rename = "proposedModels")]
    pub proposed_models: Vec<LgrModelDocument>,
}

// ********* Run configuration **********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPaths {
    pub history: Option<String>,
    pub reference: Option<String>,
    pub polling: Option<String>,
    pub demographics: Option<String>,
    pub deprivation: Option<String>,
    pub lgr: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssumptionsDocument {
    #[serde(rename = "swingMultiplier")]
    pub swing_multiplier: Option<f64>,
    #[serde(rename = "turnoutAdjustment")]
    pub turnout_adjustment: Option<f64>,
    #[serde(default, rename = "newEntrants")]
    pub new_entrants: Vec<String>,
}

/// The `--config` file.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(rename = "councilName")]
    pub council_name: Option<String>,
    #[serde(default)]
    pub documents: DocumentPaths,
    #[serde(default)]
    pub assumptions: AssumptionsDocument,
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
    /// Only project onto this reorganisation model. All models by default.
    #[serde(rename = "lgrModel")]
    pub lgr_model: Option<String>,
    pub output: Option<String>,
}
