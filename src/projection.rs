use log::{debug, info, warn};

use council_projection::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::projection::documents::*;
use crate::projection::io_common::{read_document, resolve_path, simplify_file_name};
use crate::projection::normalize::*;

mod documents;
mod io_common;
mod normalize;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProjectionError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Missing required document: {name}"))]
    MissingDocument { name: String },
    #[snafu(display("Invalid council in {path}"))]
    InvalidCouncil {
        source: ProjectionErrors,
        path: String,
    },
    #[snafu(display("Invalid override {value:?}, expected WARD=PARTY"))]
    InvalidOverride { value: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    SerializingSummary { source: serde_json::Error },
    #[snafu(display("Difference detected between the computed summary and {path}"))]
    SummaryMismatch { path: String },
    #[snafu(display("Configuration file has no parent directory"))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ProjResult<T> = Result<T, ProjectionError>;

// Keeps the summary stable across platforms and easy to diff.
fn round(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

fn pairs_to_json(l: &[(String, f64)]) -> JSMap<String, JSValue> {
    l.iter().map(|(k, v)| (k.clone(), json!(round(*v)))).collect()
}

fn prediction_to_json(p: &PredictionResult, override_party: Option<&String>) -> JSValue {
    let parties: JSMap<String, JSValue> = p
        .parties
        .iter()
        .map(|(name, r)| {
            (
                name.clone(),
                json!({"votes": round(r.votes), "share": round(r.share)}),
            )
        })
        .collect();
    let methodology: Vec<JSValue> = p
        .methodology
        .iter()
        .map(|s| {
            json!({
                "step": s.step,
                "name": s.name,
                "description": s.description,
                "inputs": pairs_to_json(&s.inputs),
                "outputs": pairs_to_json(&s.outputs),
            })
        })
        .collect();
    json!({
        "winner": p.winner,
        "margin": round(p.margin),
        "marginPct": round(p.margin_pct),
        "estimatedTurnout": p.estimated_turnout.map(round),
        "confidence": p.confidence.label(),
        "seatsUp": p.seats_up,
        "defender": p.defender.as_ref().map(|d| json!({"name": d.name, "party": d.party})),
        "gain": p.is_gain(),
        "override": override_party,
        "parties": parties,
        "methodology": methodology,
    })
}

fn coalition_to_json(c: &Coalition) -> JSValue {
    let kind = match c.kind {
        CoalitionKind::SinglePartyMajority => "singlePartyMajority",
        CoalitionKind::MultiPartyCoalition => "coalition",
    };
    json!({
        "parties": c.parties,
        "seats": c.seats,
        "workingMajority": c.working_majority,
        "kind": kind,
    })
}

fn authority_to_json(a: &AuthorityProjection) -> JSValue {
    json!({
        "seats": a.seats,
        "totalSeats": a.total_seats,
        "largestParty": a.largest_party,
        "hasMajority": a.has_majority,
        "partial": a.partial,
        "contributingCouncil": a.contributing_council,
    })
}

fn swing_to_json(s: &Swing) -> JSValue {
    let source = match s.source {
        SwingSource::Baseline => "baseline",
        SwingSource::Reported => "reported",
        SwingSource::Missing => "missing",
    };
    json!({"source": source, "multiplier": round(s.multiplier), "deltas": rounded_shares(&s.deltas)})
}

fn rounded_shares(shares: &PartyShares) -> JSMap<String, JSValue> {
    shares
        .iter()
        .map(|(p, v)| (p.clone(), json!(round(*v))))
        .collect()
}

fn national_to_json(n: &NationalPicture) -> JSValue {
    json!({
        "current": rounded_shares(&n.current),
        "trend30d": rounded_shares(&n.trend_30d),
        "polls": n.polls.len(),
    })
}

fn parse_override(value: &str, aliases: &PartyAliases) -> ProjResult<(String, String)> {
    match value.split_once('=') {
        Some((ward, party)) if !ward.trim().is_empty() && !party.trim().is_empty() => {
            Ok((ward.trim().to_string(), aliases.resolve(party)))
        }
        _ => InvalidOverrideSnafu { value }.fail(),
    }
}

fn read_optional<T: serde::de::DeserializeOwned>(
    name: &str,
    path: Option<String>,
) -> ProjResult<Option<T>> {
    match path {
        Some(p) => {
            info!("Reading {} document {:?}", name, p);
            read_document(&p).map(Some)
        }
        None => {
            debug!("No {} document", name);
            Ok(None)
        }
    }
}

/// Loads the documents named by the arguments and the configuration file, runs the
/// projection and returns the JSON summary.
pub fn run_projection(args: &Args) -> ProjResult<JSValue> {
    let (config, root) = match args.config.as_ref() {
        Some(p) => {
            let config: ProjectionConfig = read_document(p)?;
            let root = Path::new(p.as_str())
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            info!("config: {:?}", config);
            (config, Some(root))
        }
        None => (ProjectionConfig::default(), None),
    };
    let root = root.as_deref();

    // Flags win over the configuration file.
    let pick = |flag: &Option<String>, configured: &Option<String>| -> Option<String> {
        flag.clone()
            .or_else(|| configured.as_ref().map(|p| resolve_path(root, p)))
    };
    let docs = &config.documents;
    let history_path = pick(&args.history, &docs.history)
        .context(MissingDocumentSnafu { name: "history" })?;

    let history: HistoryDocument = read_document(&history_path)?;
    let reference: Option<ReferenceDocument> =
        read_optional("reference", pick(&args.reference, &docs.reference))?;
    let polling: Option<PollingDocument> =
        read_optional("polling", pick(&args.polling, &docs.polling))?;
    let demographics: Option<IndicatorsDocument> =
        read_optional("demographics", pick(&args.demographics, &docs.demographics))?;
    let deprivation: Option<IndicatorsDocument> =
        read_optional("deprivation", pick(&args.deprivation, &docs.deprivation))?;
    let lgr: Option<LgrDocument> = read_optional("lgr", pick(&args.lgr, &docs.lgr))?;
    let reference = reference.as_ref();

    let council_name = args
        .council
        .clone()
        .or_else(|| config.council_name.clone())
        .or_else(|| history.meta.as_ref().and_then(|m| m.council_name.clone()))
        .unwrap_or_else(|| {
            let file_name = simplify_file_name(&history_path);
            file_name
                .strip_suffix(".json")
                .unwrap_or(&file_name)
                .to_string()
        });
    let council = council_from_document(&history, &council_name, reference, &history_path)?;
    info!(
        "council {}: {} wards, {} seats",
        council.name,
        council.wards.len(),
        council.total_seats()
    );
    if let Some(declared) = council.declared_total_seats {
        if declared != council.total_seats() {
            warn!(
                "{} seats declared, {} counted from the wards. Using the ward seats.",
                declared,
                council.total_seats()
            );
        }
    }

    let aliases = PartyAliases::new(reference);
    let mut assumptions = assumptions_from(&config.assumptions, reference);
    if let Some(m) = args.swing_multiplier {
        assumptions.swing_multiplier = m;
    }
    if let Some(t) = args.turnout_adjustment {
        assumptions.turnout_adjustment = t;
    }
    if !args.new_entrant.is_empty() {
        assumptions.new_entrants = args.new_entrant.iter().map(|p| aliases.resolve(p)).collect();
    }

    let (ward_proxies, council_proxy) = proxies_for(reference, &council.name);
    let inputs = ProjectionInputs {
        national: national_from_documents(polling.as_ref(), reference),
        assumptions,
        params: params_from_reference(reference),
        demographics: demographics
            .as_ref()
            .map(indicators_from_document)
            .unwrap_or_default(),
        deprivation: deprivation
            .as_ref()
            .map(indicators_from_document)
            .unwrap_or_default(),
        ward_proxies,
        council_proxy,
    };

    let prediction = predict_council(&council, &inputs);

    let mut overrides: BTreeMap<String, String> = config
        .overrides
        .iter()
        .map(|(w, p)| (w.clone(), aliases.resolve(p)))
        .collect();
    for o in args.overrides.iter() {
        let (ward, party) = parse_override(o, &aliases)?;
        overrides.insert(ward, party);
    }

    let seat_totals = apply_overrides(&prediction, &overrides, prediction.total_seats);
    let threshold = majority_threshold(prediction.total_seats);
    let coalitions = compute_coalitions_with(&seat_totals, threshold, &inputs.params.coalition);

    let lgr_model = args.lgr_model.as_ref().or(config.lgr_model.as_ref());
    let mut boundaries: JSMap<String, JSValue> = JSMap::new();
    if let Some(doc) = lgr.as_ref() {
        let models = lgr_models(doc, lgr_model.map(|s| s.as_str()));
        if let (Some(id), true) = (lgr_model, models.is_empty()) {
            whatever!("Unknown reorganisation model {:?}", id)
        }
        let seats_map = CouncilSeatsMap::from_prediction(&prediction, &overrides);
        for model in models.iter() {
            let projection = project_to_boundary(&seats_map, model);
            let authorities: JSMap<String, JSValue> = projection
                .iter()
                .map(|(name, a)| (name.clone(), authority_to_json(a)))
                .collect();
            boundaries.insert(
                model.id.clone(),
                json!({"name": model.name, "source": model.source, "authorities": authorities}),
            );
        }
    } else if let Some(id) = lgr_model {
        whatever!("Reorganisation model {:?} requested without an lgr document", id)
    }

    let wards: JSMap<String, JSValue> = prediction
        .wards
        .iter()
        .map(|(name, p)| (name.clone(), prediction_to_json(p, overrides.get(name))))
        .collect();

    Ok(json!({
        "council": council.name,
        "totalSeats": prediction.total_seats,
        "seatsUp": prediction.seats_up(),
        "majorityThreshold": threshold,
        "national": national_to_json(&inputs.national),
        "swing": swing_to_json(&prediction.swing),
        "wards": wards,
        "seatTotals": seat_totals,
        "changes": prediction.changes(),
        "coalitions": coalitions.iter().map(coalition_to_json).collect::<Vec<JSValue>>(),
        "boundaries": boundaries,
    }))
}

fn output_path(args: &Args) -> ProjResult<Option<String>> {
    if args.out.is_some() {
        return Ok(args.out.clone());
    }
    match args.config.as_ref() {
        Some(p) => {
            let config: ProjectionConfig = read_document(p)?;
            let root = Path::new(p.as_str()).parent();
            Ok(config.output.map(|o| match o.as_str() {
                "stdout" => o.clone(),
                _ => resolve_path(root, &o),
            }))
        }
        None => Ok(None),
    }
}

/// Runs the projection, writes the summary and compares it with a reference summary.
pub fn run(args: &Args) -> ProjResult<()> {
    let summary = run_projection(args)?;
    let pretty_js_summary =
        serde_json::to_string_pretty(&summary).context(SerializingSummarySnafu {})?;

    match output_path(args)? {
        Some(p) if p != "stdout" && !p.is_empty() => {
            info!("Writing summary to {:?}", p);
            fs::write(&p, pretty_js_summary.as_bytes()).context(WritingOutputSnafu { path: p })?;
        }
        _ => println!("{}", pretty_js_summary),
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = args.check.as_ref() {
        let summary_ref: JSValue = read_document(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(SerializingSummarySnafu {})?;
        if pretty_js_summary_ref != pretty_js_summary {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_summary.as_ref(),
                "\n",
            );
            return SummaryMismatchSnafu { path: summary_p }.fail();
        }
        info!("Summary matches {:?}", summary_p);
    }
    Ok(())
}
