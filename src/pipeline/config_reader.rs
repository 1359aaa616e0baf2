use crate::pipeline::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONSERVATION_TOLERANCE: f64 = 1e-9;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "runName")]
    pub run_name: Option<String>,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
    #[serde(rename = "summaryFile")]
    pub summary_file: Option<String>,
    #[serde(rename = "sharesFile")]
    pub shares_file: Option<String>,
    #[serde(rename = "crosswalkFile")]
    pub crosswalk_file: Option<String>,
    #[serde(rename = "daCountsFile")]
    pub da_counts_file: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub layout: Option<String>,
    #[serde(rename = "daColumn")]
    pub da_column: Option<String>,
    #[serde(rename = "fsaColumn")]
    pub fsa_column: Option<String>,
    #[serde(rename = "countColumn")]
    pub count_column: Option<String>,
    #[serde(rename = "postalCodeColumn")]
    pub postal_code_column: Option<String>,
    #[serde(rename = "weightColumn")]
    pub weight_column: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

/// The ways a membership table can be laid out.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MembershipLayout {
    Counts,
    PostalCodes,
    Proportions,
}

impl MembershipSource {
    pub fn layout(&self) -> PipelineResult<MembershipLayout> {
        match self.layout.as_deref() {
            None | Some("counts") => Ok(MembershipLayout::Counts),
            Some("postal_codes") => Ok(MembershipLayout::PostalCodes),
            Some("proportions") => Ok(MembershipLayout::Proportions),
            Some(x) => UnknownLayoutSnafu {
                layout: x.to_string(),
            }
            .fail(),
        }
    }

    pub fn da_column(&self) -> &str {
        self.da_column.as_deref().unwrap_or("da_id")
    }

    pub fn fsa_column(&self) -> &str {
        self.fsa_column.as_deref().unwrap_or("fsa_id")
    }

    pub fn count_column(&self) -> &str {
        self.count_column.as_deref().unwrap_or("postal_code_count")
    }

    pub fn postal_code_column(&self) -> &str {
        self.postal_code_column.as_deref().unwrap_or("postal_code")
    }

    pub fn weight_column(&self) -> &str {
        self.weight_column.as_deref().unwrap_or("weight")
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasureSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub layout: Option<String>,
    #[serde(rename = "daColumn")]
    pub da_column: Option<String>,
    #[serde(rename = "attributeColumn")]
    pub attribute_column: Option<String>,
    #[serde(rename = "valueColumn")]
    pub value_column: Option<String>,
    /// For the wide layout: the columns to read. All the columns except the DA
    /// column if not specified.
    #[serde(rename = "valueColumns")]
    pub value_columns: Option<Vec<String>>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MeasureLayout {
    Long,
    Wide,
}

impl MeasureSource {
    pub fn layout(&self) -> PipelineResult<MeasureLayout> {
        match self.layout.as_deref() {
            None | Some("long") => Ok(MeasureLayout::Long),
            Some("wide") => Ok(MeasureLayout::Wide),
            Some(x) => UnknownLayoutSnafu {
                layout: x.to_string(),
            }
            .fail(),
        }
    }

    pub fn da_column(&self) -> &str {
        self.da_column.as_deref().unwrap_or("da_id")
    }

    pub fn attribute_column(&self) -> &str {
        self.attribute_column.as_deref().unwrap_or("attribute")
    }

    pub fn value_column(&self) -> &str {
        self.value_column.as_deref().unwrap_or("value")
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRules {
    pub allocation: Option<String>,
    #[serde(rename = "checkConservation")]
    pub check_conservation: Option<bool>,
    #[serde(rename = "conservationTolerance")]
    pub conservation_tolerance: Option<f64>,
    /// Tolerance on the sum of the weights of a DA, for the proportions layout.
    #[serde(rename = "weightTolerance")]
    pub weight_tolerance: Option<f64>,
    /// Skip the empty cells of the measure tables instead of failing.
    #[serde(rename = "skipEmptyValues")]
    pub skip_empty_values: Option<bool>,
}

impl RunRules {
    pub fn allocation(&self) -> PipelineResult<AllocationMode> {
        match self.allocation.as_deref() {
            None | Some("proportional") => Ok(AllocationMode::Proportional),
            Some("dominant") => Ok(AllocationMode::Dominant),
            Some(x) => whatever!("unknown allocation mode: {}", x),
        }
    }

    pub fn conservation_tolerance(&self) -> f64 {
        self.conservation_tolerance
            .unwrap_or(DEFAULT_CONSERVATION_TOLERANCE)
    }

    pub fn weight_tolerance(&self) -> f64 {
        self.weight_tolerance.unwrap_or(WEIGHT_SUM_TOLERANCE)
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "membershipSource")]
    pub membership_source: Option<MembershipSource>,
    #[serde(rename = "measureSources", default)]
    pub measure_sources: Vec<MeasureSource>,
    #[serde(default)]
    pub rules: RunRules,
}

/// Reads the configuration file, if any, and applies the command line options
/// on top of it.
///
/// The paths of the configuration file are resolved relative to its directory.
/// The paths of the command line are used as given.
pub fn read_config(args: &Args) -> PipelineResult<RunConfig> {
    let mut config: RunConfig = if let Some(config_path) = args.config.clone() {
        let contents = fs::read_to_string(config_path.clone()).context(OpeningJsonSnafu {
            path: config_path.clone(),
        })?;
        let c: RunConfig =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        let root_p = Path::new(config_path.as_str())
            .parent()
            .context(MissingParentDirSnafu {})?;
        resolve_paths(c, root_p)
    } else {
        RunConfig::default()
    };
    debug!("read_config: config before overrides: {:?}", config);

    if let Some(p) = args.membership.clone() {
        let mut source = config.membership_source.unwrap_or_default();
        source.file_path = p;
        // The provider is deduced again from the new file name.
        source.provider = None;
        config.membership_source = Some(source);
    }
    if let Some(layout) = args.membership_layout.clone() {
        if let Some(source) = config.membership_source.as_mut() {
            source.layout = Some(layout);
        }
    }
    if let Some(paths) = args.measures.clone() {
        config.measure_sources = paths
            .iter()
            .map(|p| MeasureSource {
                file_path: p.clone(),
                ..MeasureSource::default()
            })
            .collect();
    }
    if let Some(layout) = args.measures_layout.clone() {
        for source in config.measure_sources.iter_mut() {
            source.layout = Some(layout.clone());
        }
    }
    if let Some(name) = args.excel_worksheet_name.clone() {
        if let Some(source) = config.membership_source.as_mut() {
            source.excel_worksheet_name = Some(name.clone());
        }
        for source in config.measure_sources.iter_mut() {
            source.excel_worksheet_name = Some(name.clone());
        }
    }
    if args.out.is_some() {
        config.output_settings.output_file = args.out.clone();
    }
    if args.summary.is_some() {
        config.output_settings.summary_file = args.summary.clone();
    }
    if args.shares.is_some() {
        config.output_settings.shares_file = args.shares.clone();
    }
    if args.crosswalk_out.is_some() {
        config.output_settings.crosswalk_file = args.crosswalk_out.clone();
    }
    if args.da_counts.is_some() {
        config.output_settings.da_counts_file = args.da_counts.clone();
    }
    if args.allocation.is_some() {
        config.rules.allocation = args.allocation.clone();
    }
    Ok(config)
}

fn resolve_paths(config: RunConfig, root_p: &Path) -> RunConfig {
    let resolve = |p: &String| -> String {
        let pb: PathBuf = root_p.join(p);
        pb.as_path().display().to_string()
    };
    let resolve_output = |p: Option<String>| -> Option<String> {
        match p {
            Some(x) if x == "stdout" => Some(x),
            Some(x) => Some(resolve(&x)),
            None => None,
        }
    };
    RunConfig {
        output_settings: OutputSettings {
            run_name: config.output_settings.run_name,
            output_file: resolve_output(config.output_settings.output_file),
            summary_file: resolve_output(config.output_settings.summary_file),
            shares_file: resolve_output(config.output_settings.shares_file),
            crosswalk_file: resolve_output(config.output_settings.crosswalk_file),
            da_counts_file: resolve_output(config.output_settings.da_counts_file),
        },
        membership_source: config.membership_source.map(|s| MembershipSource {
            file_path: resolve(&s.file_path),
            ..s
        }),
        measure_sources: config
            .measure_sources
            .into_iter()
            .map(|s| MeasureSource {
                file_path: resolve(&s.file_path),
                ..s
            })
            .collect(),
        rules: config.rules,
    }
}
