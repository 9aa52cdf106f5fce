use calamine::{open_workbook, DataType, Reader, Xlsx};

use census_reduce::builder::TableBuilder;

use crate::panel::{
    io_common::{infer_level, normalize_header},
    *,
};

/// Reads a table from an Excel workbook.
///
/// The first row of the worksheet is the header. Without a worksheet name,
/// the first worksheet is used.
pub fn read_excel_table(path: &str, worksheet_name: Option<&str>) -> PanelResult<ElectionTable> {
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyFileSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyFileSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyFileSnafu { path })?;
    let columns: Vec<String> = header
        .iter()
        .map(|c| normalize_header(&header_text(c)))
        .collect();
    let level = infer_level(&columns);
    debug!("read_excel_table: level: {} columns: {:?}", level, columns);

    let identifiers: Vec<bool> = columns.iter().map(|c| is_identifier(c)).collect();
    let mut builder = TableBuilder::new(level).column_names(columns);
    for (idx, row) in rows.enumerate() {
        let lineno = idx + 2;
        let values: Vec<Value> = row
            .iter()
            .zip(identifiers.iter())
            .map(|(c, ident)| match c {
                DataType::String(s) if *ident => Ok(Value::parse_identifier(s)),
                _ => read_cell(c, lineno),
            })
            .collect::<PanelResult<Vec<Value>>>()?;
        builder.add_row(values).context(ReduceSnafu {})?;
    }
    let table = builder.build().context(ReduceSnafu {})?;
    info!("read_excel_table: {}: {} records", path, table.len());
    Ok(table)
}

fn header_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) => f.to_string(),
        DataType::Empty => String::new(),
        c => format!("{:?}", c),
    }
}

fn read_cell(cell: &DataType, lineno: usize) -> PanelResult<Value> {
    match cell {
        DataType::Int(i) => Ok(Value::Number(*i as f64)),
        DataType::Float(f) => Ok(Value::from_float(*f)),
        DataType::String(s) => Ok(Value::parse_cell(s)),
        DataType::Bool(b) => Ok(Value::Text(b.to_string())),
        DataType::Empty => Ok(Value::Empty),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}
