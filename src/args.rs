use clap::Parser;

/// Illustrative what-if projections of local council elections.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file with the document paths, the assumptions and the overrides.
    /// Document paths in this file are relative to its directory. For more information about the
    /// format, read the manual of the council_projection crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The election history of the council. Required, either here or in the configuration.
    #[clap(long, value_parser)]
    pub history: Option<String>,

    /// (file path) National baseline, model parameters, party aliases and election calendar.
    #[clap(long, value_parser)]
    pub reference: Option<String>,

    /// (file path) The current national polling.
    #[clap(long, value_parser)]
    pub polling: Option<String>,

    /// (file path) Demographic indicators keyed by ward name.
    #[clap(long, value_parser)]
    pub demographics: Option<String>,

    /// (file path) Deprivation indicators keyed by ward name.
    #[clap(long, value_parser)]
    pub deprivation: Option<String>,

    /// (file path) Proposed reorganisation models.
    #[clap(long, value_parser)]
    pub lgr: Option<String>,

    /// (model id) Only project onto this reorganisation model. All the models by default.
    #[clap(long, value_parser)]
    pub lgr_model: Option<String>,

    /// The name of the council. Defaults to the name in the history document.
    #[clap(long, value_parser)]
    pub council: Option<String>,

    /// (default 1.0, between 0 and 3) Scales the national swing.
    #[clap(long, value_parser)]
    pub swing_multiplier: Option<f64>,

    /// (default 0.0, fraction points) Added to the turnout of every ward.
    #[clap(long, value_parser, allow_hyphen_values = true)]
    pub turnout_adjustment: Option<f64>,

    /// (party name, repeatable) A party assumed to stand in every contested ward.
    #[clap(long, value_parser)]
    pub new_entrant: Vec<String>,

    /// (WARD=PARTY, repeatable) Replaces the predicted winner of a ward when counting seats.
    #[clap(long = "override", value_parser)]
    pub overrides: Vec<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, wardcast will check that the
    /// computed summary matches it.
    #[clap(long, value_parser)]
    pub check: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
