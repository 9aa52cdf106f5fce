// Primitives for reading CSV files.

use std::fs::File;
use std::io::Read;

use census_reduce::builder::TableBuilder;

use crate::panel::{
    io_common::{infer_level, normalize_header, simplify_file_name},
    *,
};

pub fn read_csv_table(path: &str) -> PanelResult<ElectionTable> {
    let file = File::open(path)
        .map_err(csv::Error::from)
        .context(OpeningCsvSnafu { path })?;
    read_csv_table_from_reader(file, &simplify_file_name(path))
}

/// Reads a table from any reader. `name` is only used in messages.
pub fn read_csv_table_from_reader<R: Read>(reader: R, name: &str) -> PanelResult<ElectionTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut records = rdr.into_records();
    let header = records
        .next()
        .context(EmptyFileSnafu { path: name })?
        .context(CsvLineParseSnafu { path: name, lineno: 1usize })?;
    let columns: Vec<String> = header.iter().map(normalize_header).collect();
    let level = infer_level(&columns);
    debug!("read_csv_table: {}: level: {} columns: {:?}", name, level, columns);

    let mut builder = TableBuilder::new(level).column_names(columns);
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path: name, lineno })?;
        let cells: Vec<&str> = line.iter().collect();
        builder.add_row_raw(&cells).context(ReduceSnafu {})?;
    }
    let table = builder.build().context(ReduceSnafu {})?;
    info!("read_csv_table: {}: {} records", name, table.len());
    Ok(table)
}
