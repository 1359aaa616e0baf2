// Primitives for reading and writing CSV files.

use crate::pipeline::{io_common::Table, *};

use serde::Serialize;

pub fn read_csv_table(path: &str) -> PipelineResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    debug!("read_csv_table: header: {:?}", header);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is on line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    debug!("read_csv_table: {:?} rows in {:?}", rows.len(), path);
    Ok(Table {
        path: path.to_string(),
        header,
        rows,
    })
}

/// Serializes the rows into CSV text, with a header.
pub fn rows_to_csv<T: Serialize>(rows: &[T]) -> PipelineResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(vec![]);
    for row in rows.iter() {
        writer.serialize(row).context(CsvWriteSnafu {})?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context(WritingSnafu {
            path: "<memory>".to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
