pub use crate::config::*;

use snafu::prelude::*;

/// A builder for assembling a table row by row.
///
/// Loaders and tests should prefer it over building the raw rows by hand.
///
/// ```
/// use census_reduce::builder::TableBuilder;
/// use census_reduce::{Level, ReduceError};
///
/// let mut builder = TableBuilder::new(Level::State).columns(&["state", "illiterate"]);
///
/// builder.add_row_raw(&["SP", "500000"])?;
/// builder.add_row_raw(&["RJ", "800000"])?;
///
/// let table = builder.build()?;
/// assert_eq!(table.len(), 2);
///
/// # Ok::<(), ReduceError>(())
/// ```
pub struct TableBuilder {
    pub(crate) _level: Level,
    pub(crate) _columns: Vec<String>,
    pub(crate) _rows: Vec<Vec<Value>>,
}

impl TableBuilder {
    pub fn new(level: Level) -> TableBuilder {
        TableBuilder {
            _level: level,
            _columns: Vec::new(),
            _rows: Vec::new(),
        }
    }

    /// Sets the header. Any row added before is dropped.
    pub fn columns(self, names: &[&str]) -> TableBuilder {
        TableBuilder {
            _level: self._level,
            _columns: names.iter().map(|s| s.to_string()).collect(),
            _rows: Vec::new(),
        }
    }

    /// Same as `columns`, for owned names (as read from a file header).
    pub fn column_names(self, names: Vec<String>) -> TableBuilder {
        TableBuilder {
            _level: self._level,
            _columns: names,
            _rows: Vec::new(),
        }
    }

    /// Adds a row of raw cells. Identifier cells are kept as text, the others
    /// are parsed with `Value::parse_cell`.
    pub fn add_row_raw(&mut self, cells: &[&str]) -> ReduceResult<()> {
        let values: Vec<Value> = cells
            .iter()
            .enumerate()
            .map(|(idx, c)| match self._columns.get(idx) {
                Some(name) if is_identifier(name) => Value::parse_identifier(c),
                _ => Value::parse_cell(c),
            })
            .collect();
        self.add_row(values)
    }

    pub fn add_row(&mut self, values: Vec<Value>) -> ReduceResult<()> {
        ensure!(
            values.len() == self._columns.len(),
            RowWidthSnafu {
                row: self._rows.len(),
                expected: self._columns.len(),
                found: values.len()
            }
        );
        self._rows.push(values);
        Ok(())
    }

    pub fn build(self) -> ReduceResult<ElectionTable> {
        ElectionTable::new(self._level, self._columns, self._rows)
    }
}
