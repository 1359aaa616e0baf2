use clap::Parser;

/// Builds a DA to FSA crosswalk and redistributes census measures onto FSAs.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the run. The options below override the
    /// values found in this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The membership table: postal code counts, postal codes or proportions per DA and FSA.
    #[clap(short, long, value_parser)]
    pub membership: Option<String>,

    /// (default counts) The layout of the membership table: counts, postal_codes or proportions.
    #[clap(long, value_parser)]
    pub membership_layout: Option<String>,

    /// (file path, repeatable) The DA-level measures. If specified, replaces the measure sources
    /// of the configuration file.
    #[clap(short = 'i', long, value_parser)]
    pub measures: Option<Vec<String>>,

    /// (default long) The layout of the measure tables: long or wide.
    #[clap(long, value_parser)]
    pub measures_layout: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the FSA-level measures in CSV format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, a summary of the run will be written in JSON format
    /// to the given location.
    #[clap(long, value_parser)]
    pub summary: Option<String>,

    /// (file path or empty) If specified, the share of each attribute in the total of each FSA
    /// will be written in CSV format to the given location.
    #[clap(long, value_parser)]
    pub shares: Option<String>,

    /// (file path or empty) If specified, the crosswalk weights will be written in CSV format
    /// to the given location.
    #[clap(long, value_parser)]
    pub crosswalk_out: Option<String>,

    /// (file path or empty) If specified, the number of DAs of each FSA for each category of
    /// the measures will be written in CSV format to the given location. Each DA is counted in
    /// its dominant FSA.
    #[clap(long, value_parser)]
    pub da_counts: Option<String>,

    /// (default proportional) How the DA measures are assigned to FSAs: proportional or dominant.
    #[clap(long, value_parser)]
    pub allocation: Option<String>,

    /// When using Excel files, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (file path) A reference file containing the expected FSA-level measures in CSV format. If
    /// provided, dafsa will check that the output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
