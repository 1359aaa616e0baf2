use calamine::DataType;

use crate::pipeline::{io_common::Table, *};

/// Reads the named worksheet, or the first one, of an Excel file.
pub fn read_excel_table(path: &str, worksheet: &Option<String>) -> PipelineResult<Table> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet {
        Some(name) => workbook
            .worksheet_range(name.as_str())
            .context(MissingWorksheetSnafu {
                path,
                name: name.clone(),
            })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut iter = wrange.rows();
    let header_row = iter.next().context(EmptyExcelSnafu { path })?;
    let mut header: Vec<String> = Vec::new();
    for cell in header_row.iter() {
        header.push(read_cell(cell, path, 1)?);
    }
    debug!("read_excel_table: header: {:?}", header);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let mut cells: Vec<String> = Vec::new();
        for cell in row.iter() {
            cells.push(read_cell(cell, path, lineno)?);
        }
        // Fully empty rows are common at the bottom of spreadsheets.
        if cells.iter().all(|c| c.is_empty()) {
            debug!("read_excel_table: skipping empty line {:?}", lineno);
            continue;
        }
        rows.push(cells);
    }
    debug!("read_excel_table: {:?} rows in {:?}", rows.len(), path);
    Ok(Table {
        path: path.to_string(),
        header,
        rows,
    })
}

/// The text of a cell, as it would appear in a CSV export.
///
/// DA ids are often stored as numbers: integral floats are printed without
/// their decimal part.
fn read_cell(cell: &DataType, path: &str, lineno: usize) -> PipelineResult<String> {
    match cell {
        DataType::String(s) => Ok(s.trim().to_string()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        DataType::Empty => Ok("".to_string()),
        _ => ExcelWrongCellTypeSnafu {
            path,
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}
