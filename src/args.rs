use clap::Parser;

/// Cross-tabulated statistics over municipal ordinance records.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file describing the input, the column names,
    /// the province aliases and the views to compute.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference summary in JSON format. If provided, ordstats will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location. Otherwise it is printed on the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The ordinance table. Setting this option overrides the path that may be specified
    /// in the configuration file.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (csv or xlsx) The type of the input. Inferred from the file extension by default.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, the name of the worksheet to use. The first worksheet by default.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (termProvinces, provinceTrend, municipalities, nationalTrend, delegationShares or ranking)
    /// Compute a single preset view instead of the views of the configuration file.
    #[clap(short, long, value_parser)]
    pub preset: Option<String>,

    /// The parameter of the preset: a council term number, a province name or a ranking scope.
    #[clap(long, value_parser)]
    pub param: Option<String>,

    /// Keep only the largest N rows of every view.
    #[clap(long, value_parser)]
    pub top_n: Option<usize>,

    /// Use the Korean column headers, council term labels and province aliases.
    #[clap(long, takes_value = false)]
    pub korean: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
