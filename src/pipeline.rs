use log::{debug, info, warn};

use fsa_crosswalk::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};

use serde::Serialize;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::pipeline::config_reader::*;
use crate::pipeline::io_common::{read_measure_table, read_membership_table, read_table};
use crate::pipeline::io_common::MembershipData;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no content"))]
    EmptyExcel { path: String },
    #[snafu(display("The Excel file {path} has no worksheet named {name:?}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("{path}: line {lineno}: could not understand cell {content}"))]
    ExcelWrongCellType {
        path: String,
        lineno: usize,
        content: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("{path}: could not parse line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error formatting CSV output"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("{path}: line {lineno} is too short"))]
    LineTooShort { path: String, lineno: usize },
    #[snafu(display("{path}: missing column {column:?}"))]
    MissingColumn { path: String, column: String },
    #[snafu(display("{path}: line {lineno}: could not parse {content:?} in column {column:?}"))]
    CellParse {
        path: String,
        lineno: usize,
        column: String,
        content: String,
    },
    #[snafu(display("Unknown provider {provider:?}, expected csv or xlsx"))]
    UnknownProvider { provider: String },
    #[snafu(display("Unknown layout {layout:?}"))]
    UnknownLayout { layout: String },
    #[snafu(display("Error reading file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the configuration"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error serializing the summary"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    Writing {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("No membership table provided (use --membership or a configuration file)"))]
    MissingMembership {},
    #[snafu(display("Crosswalk error: {source}"))]
    Crosswalk { source: CrosswalkError },
    #[snafu(display("Error reading the reference file {path}"))]
    OpeningReference {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Difference detected between the output and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

// ******** Output rows *********

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    fsa_id: &'a str,
    attribute: &'a str,
    value: f64,
}

#[derive(Debug, Serialize)]
struct ShareRow<'a> {
    fsa_id: &'a str,
    attribute: &'a str,
    value: f64,
    share: f64,
}

#[derive(Debug, Serialize)]
struct DaCountRow<'a> {
    fsa_id: &'a str,
    attribute: &'a str,
    category: &'a str,
    da_count: u64,
    total_das: u64,
    proportion: f64,
}

#[derive(Debug, Serialize)]
struct WeightRow<'a> {
    da_id: &'a str,
    fsa_id: &'a str,
    weight: f64,
    dominant: bool,
}

/// Everything produced by one run.
#[derive(Debug)]
pub struct RunOutcome {
    pub crosswalk: Crosswalk,
    pub aggregated: Vec<AggregatedMeasure>,
    pub output_csv: String,
    pub summary: JSValue,
}

fn read_crosswalk(source: &MembershipSource, rules: &RunRules) -> PipelineResult<Crosswalk> {
    let table = read_table(
        &source.file_path,
        &source.provider,
        &source.excel_worksheet_name,
    )?;
    let data = read_membership_table(&table, source)?;
    let crosswalk = match data {
        MembershipData::Counts(records) => build_crosswalk(&records),
        MembershipData::PostalCodes(pairs) => {
            count_postal_codes(&pairs).and_then(|records| build_crosswalk(&records))
        }
        MembershipData::Proportions(weights) => {
            Crosswalk::from_weights(&weights, rules.weight_tolerance())
        }
    }
    .context(CrosswalkSnafu {})?;
    Ok(crosswalk)
}

fn read_measures(sources: &[MeasureSource], rules: &RunRules) -> PipelineResult<Vec<MeasureRecord>> {
    let skip_empty_values = rules.skip_empty_values.unwrap_or(false);
    let mut data: Vec<MeasureRecord> = Vec::new();
    for source in sources.iter() {
        let table = read_table(
            &source.file_path,
            &source.provider,
            &source.excel_worksheet_name,
        )?;
        let mut file_data = read_measure_table(&table, source, skip_empty_values)?;
        debug!(
            "read_measures: {:?} measures in {:?}",
            file_data.len(),
            source.file_path
        );
        data.append(&mut file_data);
    }
    Ok(data)
}

fn build_summary_js(
    config: &RunConfig,
    mode: AllocationMode,
    crosswalk: &Crosswalk,
    measures: &[MeasureRecord],
    aggregated: &[AggregatedMeasure],
) -> JSValue {
    let input_totals = measure_totals(measures);
    let output_totals = aggregated_totals(aggregated);
    let totals: Vec<JSValue> = input_totals
        .iter()
        .map(|(attribute, input)| {
            json!({
                "attribute": attribute,
                "input": input,
                "output": output_totals.get(attribute).cloned().unwrap_or(0.0),
            })
        })
        .collect();
    let da_stats = da_count_stats(&da_counts_per_fsa(crosswalk));
    json!({
        "config": {
            "runName": config.output_settings.run_name,
            "allocation": mode.name(),
            "crosswalkFingerprint": crosswalk.fingerprint(),
        },
        "results": {
            "das": crosswalk.da_count(),
            "fsas": crosswalk.fsa_ids().len(),
            "weights": crosswalk.len(),
            "measures": measures.len(),
            "rows": aggregated.len(),
            "dasPerFsa": {
                "fsas": da_stats.fsa_count,
                "mean": da_stats.mean,
                "median": da_stats.median,
            },
            "totals": totals,
        }
    })
}

fn crosswalk_to_csv(crosswalk: &Crosswalk) -> PipelineResult<String> {
    let rows: Vec<WeightRow> = crosswalk
        .weights()
        .iter()
        .map(|w| WeightRow {
            da_id: &w.da_id,
            fsa_id: &w.fsa_id,
            weight: w.weight,
            dominant: crosswalk
                .dominant_fsa(&w.da_id)
                .map(|d| d.fsa_id == w.fsa_id)
                .unwrap_or(false),
        })
        .collect();
    io_csv::rows_to_csv(&rows)
}

fn da_counts_to_csv(counts: &[DaCount]) -> PipelineResult<String> {
    let rows: Vec<DaCountRow> = counts
        .iter()
        .map(|c| DaCountRow {
            fsa_id: &c.fsa_id,
            attribute: &c.attribute,
            category: &c.category,
            da_count: c.da_count,
            total_das: c.total_das,
            proportion: c.proportion,
        })
        .collect();
    io_csv::rows_to_csv(&rows)
}

fn to_pretty_json<T: Serialize>(value: &T) -> PipelineResult<String> {
    serde_json::to_string_pretty(value).context(SerializingJsonSnafu {})
}

/// Writes the content to the given file, or to the standard output.
fn write_output(path: &Option<String>, content: &str) -> PipelineResult<()> {
    match path.as_deref() {
        None | Some("stdout") => {
            println!("{}", content);
            Ok(())
        }
        Some(p) => {
            info!("Writing {:?}", p);
            fs::write(p, content).context(WritingSnafu { path: p })
        }
    }
}

/// Normalizes line endings and trailing blank lines before comparing CSV texts.
fn normalize_csv_text(s: &str) -> String {
    let lines: Vec<&str> = s.lines().map(|l| l.trim_end()).collect();
    lines.join("\n").trim_end().to_string()
}

fn check_reference(reference_path: &str, output_csv: &str) -> PipelineResult<()> {
    let reference = fs::read_to_string(reference_path).context(OpeningReferenceSnafu {
        path: reference_path,
    })?;
    let reference_n = normalize_csv_text(&reference);
    let output_n = normalize_csv_text(output_csv);
    if reference_n != output_n {
        warn!("Found differences with the reference file");
        print_diff(reference_n.as_str(), output_n.as_str(), "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("Output matches the reference {:?}", reference_path);
    Ok(())
}

pub fn run_crosswalk(args: &Args) -> PipelineResult<RunOutcome> {
    let config = read_config(args)?;
    info!("config: {:?}", config);

    let mode = config.rules.allocation()?;
    let membership_source = config
        .membership_source
        .as_ref()
        .context(MissingMembershipSnafu {})?;

    let crosswalk = read_crosswalk(membership_source, &config.rules)?;
    info!(
        "Crosswalk: {:?} weights, {:?} DAs, fingerprint {}",
        crosswalk.len(),
        crosswalk.da_count(),
        crosswalk.fingerprint()
    );

    if config.measure_sources.is_empty() {
        warn!("No measure source provided: the output will be empty");
    }
    let measures = read_measures(&config.measure_sources, &config.rules)?;
    info!("Read {:?} measures", measures.len());

    let unmapped = unmapped_das(&crosswalk, &measures);
    if !unmapped.is_empty() {
        warn!(
            "{} DAs without an FSA assignment: {:?}",
            unmapped.len(),
            unmapped
        );
    }

    let aggregated = aggregate_with(&crosswalk, &measures, mode).context(CrosswalkSnafu {})?;

    if config.rules.check_conservation.unwrap_or(true) {
        check_conservation(
            &measures,
            &aggregated,
            config.rules.conservation_tolerance(),
        )
        .context(CrosswalkSnafu {})?;
        debug!("run_crosswalk: conservation check passed");
    }

    let da_counts = match config.output_settings.da_counts_file {
        Some(_) => Some(count_das_by_category(&crosswalk, &measures).context(CrosswalkSnafu {})?),
        None => None,
    };

    let output_rows: Vec<OutputRow> = aggregated
        .iter()
        .map(|a| OutputRow {
            fsa_id: &a.fsa_id,
            attribute: &a.attribute,
            value: a.value,
        })
        .collect();
    let output_csv = io_csv::rows_to_csv(&output_rows)?;
    write_output(&config.output_settings.output_file, &output_csv)?;

    let summary = build_summary_js(&config, mode, &crosswalk, &measures, &aggregated);
    let pretty_summary = to_pretty_json(&summary)?;
    info!("summary: {}", pretty_summary);
    if let Some(p) = config.output_settings.summary_file.clone() {
        write_output(&Some(p), &pretty_summary)?;
    }

    if let Some(p) = config.output_settings.shares_file.clone() {
        let shares = fsa_shares(&aggregated);
        let rows: Vec<ShareRow> = shares
            .iter()
            .map(|s| ShareRow {
                fsa_id: &s.fsa_id,
                attribute: &s.attribute,
                value: s.value,
                share: s.share,
            })
            .collect();
        write_output(&Some(p), &io_csv::rows_to_csv(&rows)?)?;
    }

    if let Some(p) = config.output_settings.crosswalk_file.clone() {
        write_output(&Some(p), &crosswalk_to_csv(&crosswalk)?)?;
    }

    if let (Some(p), Some(counts)) = (config.output_settings.da_counts_file.clone(), da_counts) {
        write_output(&Some(p), &da_counts_to_csv(&counts)?)?;
    }

    // The reference output, if provided for comparison
    if let Some(reference_path) = args.reference.clone() {
        check_reference(&reference_path, &output_csv)?;
    }

    Ok(RunOutcome {
        crosswalk,
        aggregated,
        output_csv,
        summary,
    })
}
