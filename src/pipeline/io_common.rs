// Layout interpretation shared by all the providers.

use crate::pipeline::*;

/// The content of a tabular file, as read by one of the providers.
/// The first row of the file is the header.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Table {
    pub path: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, column: &str) -> PipelineResult<usize> {
        self.header
            .iter()
            .position(|h| h == column)
            .context(MissingColumnSnafu {
                path: self.path.clone(),
                column: column.to_string(),
            })
    }

    // Line numbers start at 1 with the header.
    fn cell(&self, row_idx: usize, col_idx: usize) -> PipelineResult<&str> {
        self.rows[row_idx]
            .get(col_idx)
            .map(|s| s.as_str())
            .context(LineTooShortSnafu {
                path: self.path.clone(),
                lineno: row_idx + 2,
            })
    }

    fn parse_error(&self, row_idx: usize, column: &str, content: &str) -> PipelineError {
        PipelineError::CellParse {
            path: self.path.clone(),
            lineno: row_idx + 2,
            column: column.to_string(),
            content: content.to_string(),
        }
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// The membership data, as found in the file.
#[derive(PartialEq, Debug, Clone)]
pub enum MembershipData {
    Counts(Vec<MembershipRecord>),
    PostalCodes(Vec<(String, String)>),
    Proportions(Vec<CrosswalkWeight>),
}

pub fn read_membership_table(
    table: &Table,
    source: &MembershipSource,
) -> PipelineResult<MembershipData> {
    let da_idx = table.column_index(source.da_column())?;
    match source.layout()? {
        MembershipLayout::Counts => {
            let fsa_idx = table.column_index(source.fsa_column())?;
            let count_idx = table.column_index(source.count_column())?;
            let mut res: Vec<MembershipRecord> = Vec::new();
            for row_idx in 0..table.rows.len() {
                let count_s = table.cell(row_idx, count_idx)?;
                let postal_code_count = count_s
                    .parse::<u64>()
                    .map_err(|_| table.parse_error(row_idx, source.count_column(), count_s))?;
                res.push(MembershipRecord {
                    da_id: table.cell(row_idx, da_idx)?.to_string(),
                    fsa_id: table.cell(row_idx, fsa_idx)?.to_string(),
                    postal_code_count,
                });
            }
            Ok(MembershipData::Counts(res))
        }
        MembershipLayout::PostalCodes => {
            let pc_idx = table.column_index(source.postal_code_column())?;
            let mut res: Vec<(String, String)> = Vec::new();
            for row_idx in 0..table.rows.len() {
                res.push((
                    table.cell(row_idx, da_idx)?.to_string(),
                    table.cell(row_idx, pc_idx)?.to_string(),
                ));
            }
            Ok(MembershipData::PostalCodes(res))
        }
        MembershipLayout::Proportions => {
            let fsa_idx = table.column_index(source.fsa_column())?;
            let weight_idx = table.column_index(source.weight_column())?;
            let mut res: Vec<CrosswalkWeight> = Vec::new();
            for row_idx in 0..table.rows.len() {
                let weight_s = table.cell(row_idx, weight_idx)?;
                let weight = weight_s
                    .parse::<f64>()
                    .map_err(|_| table.parse_error(row_idx, source.weight_column(), weight_s))?;
                res.push(CrosswalkWeight {
                    da_id: table.cell(row_idx, da_idx)?.to_string(),
                    fsa_id: table.cell(row_idx, fsa_idx)?.to_string(),
                    weight,
                });
            }
            Ok(MembershipData::Proportions(res))
        }
    }
}

/// Reads the measures of a table.
///
/// Values are parsed but not validated: negative values are rejected by the
/// aggregation.
pub fn read_measure_table(
    table: &Table,
    source: &MeasureSource,
    skip_empty_values: bool,
) -> PipelineResult<Vec<MeasureRecord>> {
    let da_idx = table.column_index(source.da_column())?;

    // (column index, attribute name)
    let value_cols: Vec<(usize, String)> = match source.layout()? {
        MeasureLayout::Long => vec![(
            table.column_index(source.value_column())?,
            source.value_column().to_string(),
        )],
        MeasureLayout::Wide => match source.value_columns.as_ref() {
            Some(cols) => {
                let mut res = Vec::new();
                for c in cols.iter() {
                    res.push((table.column_index(c)?, c.clone()));
                }
                res
            }
            None => table
                .header
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != da_idx)
                .map(|(idx, name)| (idx, name.clone()))
                .collect(),
        },
    };
    let attribute_idx = match source.layout()? {
        MeasureLayout::Long => Some(table.column_index(source.attribute_column())?),
        MeasureLayout::Wide => None,
    };
    debug!(
        "read_measure_table: {}: value columns {:?}",
        table.path, value_cols
    );

    let mut res: Vec<MeasureRecord> = Vec::new();
    for row_idx in 0..table.rows.len() {
        let da_id = table.cell(row_idx, da_idx)?;
        for (col_idx, col_name) in value_cols.iter() {
            let value_s = table.cell(row_idx, *col_idx)?;
            if value_s.is_empty() && skip_empty_values {
                warn!(
                    "read_measure_table: {}: line {}: skipping empty value for DA {} in column {}",
                    table.path,
                    row_idx + 2,
                    da_id,
                    col_name
                );
                continue;
            }
            let value = value_s
                .parse::<f64>()
                .map_err(|_| table.parse_error(row_idx, col_name, value_s))?;
            let attribute = match attribute_idx {
                Some(idx) => table.cell(row_idx, idx)?.to_string(),
                None => col_name.clone(),
            };
            res.push(MeasureRecord {
                da_id: da_id.to_string(),
                attribute,
                value,
            });
        }
    }
    Ok(res)
}

/// Selects the provider from the configuration or from the file extension.
pub fn read_table(
    path: &str,
    provider: &Option<String>,
    worksheet: &Option<String>,
) -> PipelineResult<Table> {
    let provider_name = match provider.as_deref() {
        Some(p) => p.to_string(),
        None if path.to_lowercase().ends_with(".xlsx") => "xlsx".to_string(),
        None => "csv".to_string(),
    };
    info!(
        "Attempting to read {} file {:?}",
        provider_name,
        simplify_file_name(path)
    );
    match provider_name.as_str() {
        "csv" => io_csv::read_csv_table(path),
        "xlsx" => io_excel::read_excel_table(path, worksheet),
        x => UnknownProviderSnafu {
            provider: x.to_string(),
        }
        .fail(),
    }
}
