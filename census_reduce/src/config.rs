// ********* Table data structures ***********

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use snafu::prelude::*;

/// Canonical names of the fields used by the reducer.
///
/// Loaders are expected to normalize their headers to these names. Any other
/// column is carried along and can still be used as a metric.
pub mod fields {
    pub const STATE: &str = "state";
    pub const MUNICIPALITY: &str = "municipality";

    pub const ELIGIBLE_VOTERS: &str = "eligible_voters";
    pub const FEMALE_VOTERS: &str = "female_voters";
    pub const MALE_VOTERS: &str = "male_voters";
    pub const ILLITERATE: &str = "illiterate";
    pub const VOTERS_WITH_DISABILITY: &str = "voters_with_disability";

    pub const TURNOUT_PERCENT: &str = "turnout_percent";
    pub const ABSTENTION_PERCENT: &str = "abstention_percent";
    pub const MALE_PERCENT: &str = "male_percent";
    pub const FEMALE_PERCENT: &str = "female_percent";
    pub const VOTERS_WITH_DISABILITY_PERCENT: &str = "voters_with_disability_percent";
    pub const OPTIONAL_VOTERS_PERCENT: &str = "optional_voters_percent";

    pub const ILLITERATE_PERCENT: &str = "illiterate_percent";
    pub const READS_WRITES_PERCENT: &str = "reads_writes_percent";
    pub const ELEMENTARY_INCOMPLETE_PERCENT: &str = "elementary_incomplete_percent";
    pub const ELEMENTARY_COMPLETE_PERCENT: &str = "elementary_complete_percent";
    pub const HIGH_SCHOOL_INCOMPLETE_PERCENT: &str = "high_school_incomplete_percent";
    pub const HIGH_SCHOOL_COMPLETE_PERCENT: &str = "high_school_complete_percent";
    pub const HIGHER_INCOMPLETE_PERCENT: &str = "higher_incomplete_percent";
    pub const HIGHER_COMPLETE_PERCENT: &str = "higher_complete_percent";

    /// The education attainment partition, from lowest to highest.
    pub const EDUCATION_TIERS: [&str; 8] = [
        ILLITERATE_PERCENT,
        READS_WRITES_PERCENT,
        ELEMENTARY_INCOMPLETE_PERCENT,
        ELEMENTARY_COMPLETE_PERCENT,
        HIGH_SCHOOL_INCOMPLETE_PERCENT,
        HIGH_SCHOOL_COMPLETE_PERCENT,
        HIGHER_INCOMPLETE_PERCENT,
        HIGHER_COMPLETE_PERCENT,
    ];

    /// Voters aged 16 and 17: voting is optional for them.
    pub const YOUTH_AGES: [&str; 2] = ["age_16_percent", "age_17_percent"];

    /// Voters aged 65 and more, in five-year bands.
    pub const ELDERLY_AGES: [&str; 8] = [
        "age_65_69_percent",
        "age_70_74_percent",
        "age_75_79_percent",
        "age_80_84_percent",
        "age_85_89_percent",
        "age_90_94_percent",
        "age_95_99_percent",
        "age_100_percent",
    ];

    // Columns appended by `age_buckets`.
    pub const YOUTH: &str = "youth";
    pub const ELDERLY: &str = "elderly";
    pub const TOTAL: &str = "total";
}

/// The content of a single cell.
#[derive(PartialEq, Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    /// A missing cell.
    Empty,
}

impl Value {
    /// Interprets the raw content of a cell: blank cells and missing-value
    /// markers (`NA`, `NaN`, `null`, ...) are empty, finite floats are numbers,
    /// the rest is text.
    ///
    /// Infinite values are kept as text, so they are rejected wherever a
    /// number is required.
    pub fn parse_cell(raw: &str) -> Value {
        let s = raw.trim();
        if is_missing_marker(s) {
            Value::Empty
        } else {
            match s.parse::<f64>() {
                Ok(x) if x.is_finite() => Value::Number(x),
                Ok(x) if x.is_nan() => Value::Empty,
                _ => Value::Text(s.to_string()),
            }
        }
    }

    /// Interprets the raw content of an identifier cell (state, municipality).
    ///
    /// Identifiers are never read as numbers: `"01"` stays `"01"`.
    pub fn parse_identifier(raw: &str) -> Value {
        let s = raw.trim();
        if s.is_empty() {
            Value::Empty
        } else {
            Value::Text(s.to_string())
        }
    }

    /// A float read from a typed source (a spreadsheet cell).
    pub fn from_float(x: f64) -> Value {
        if x.is_nan() {
            Value::Empty
        } else {
            Value::Number(x)
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{:.0}", x),
            Value::Number(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Empty => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

// The markers pandas reads as missing values by default.
const MISSING_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing_marker(s: &str) -> bool {
    s.is_empty() || MISSING_MARKERS.contains(&s)
}

/// Whether a column holds identifiers rather than measures.
pub fn is_identifier(column: &str) -> bool {
    column == fields::STATE || column == fields::MUNICIPALITY
}

/// The geographic granularity of a table.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Level {
    State,
    Municipality,
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::State => write!(f, "state"),
            Level::Municipality => write!(f, "municipality"),
        }
    }
}

/// The ordered column names of a table, with a lookup index.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> ReduceResult<Schema> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (idx, c) in columns.iter().enumerate() {
            if index.insert(c.clone(), idx).is_some() {
                return DuplicateColumnSnafu { column: c.clone() }.fail();
            }
        }
        Ok(Schema { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One row of an election table: one geographic unit.
#[derive(PartialEq, Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.position(name).map(|idx| &self.values[idx])
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    /// The identifier of the state, rendered as text.
    pub fn state(&self) -> Option<String> {
        self.get(fields::STATE).map(|v| v.to_string())
    }

    /// The identifier of the municipality, rendered as text.
    pub fn municipality(&self) -> Option<String> {
        self.get(fields::MUNICIPALITY).map(|v| v.to_string())
    }

    /// The numeric content of a field. Empty cells are `None`.
    pub fn number(&self, name: &str) -> ReduceResult<Option<f64>> {
        match self.get(name) {
            None => UnknownMetricSnafu { metric: name }.fail(),
            Some(Value::Number(x)) => Ok(Some(*x)),
            Some(Value::Empty) => Ok(None),
            Some(Value::Text(s)) => NotNumericSnafu {
                metric: name,
                value: s.clone(),
            }
            .fail(),
        }
    }

    pub(crate) fn extended(&self, schema: &Arc<Schema>, extra: &[Value]) -> Record {
        let mut values = self.values.clone();
        values.extend_from_slice(extra);
        Record {
            schema: schema.clone(),
            values,
        }
    }
}

/// A pre-aggregated census table, one record per state or per municipality.
///
/// Tables are read-only once built. The reducer functions never modify them.
#[derive(PartialEq, Debug, Clone)]
pub struct ElectionTable {
    level: Level,
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl ElectionTable {
    /// Builds a table from raw rows.
    ///
    /// Every row must have as many values as there are columns. A `state`
    /// column is always required, and a `municipality` column at the
    /// municipality level.
    pub fn new(level: Level, columns: Vec<String>, rows: Vec<Vec<Value>>) -> ReduceResult<Self> {
        let schema = Arc::new(Schema::new(columns)?);
        ensure!(
            schema.contains(fields::STATE),
            UnknownMetricSnafu {
                metric: fields::STATE
            }
        );
        if level == Level::Municipality {
            ensure!(
                schema.contains(fields::MUNICIPALITY),
                UnknownMetricSnafu {
                    metric: fields::MUNICIPALITY
                }
            );
        }
        let identifiers: Vec<usize> = (0..schema.len())
            .filter(|idx| is_identifier(&schema.columns()[*idx]))
            .collect();
        let mut records: Vec<Record> = Vec::with_capacity(rows.len());
        for (row, mut values) in rows.into_iter().enumerate() {
            ensure!(
                values.len() == schema.len(),
                RowWidthSnafu {
                    row,
                    expected: schema.len(),
                    found: values.len()
                }
            );
            for idx in identifiers.iter() {
                if let Value::Number(_) = values[*idx] {
                    values[*idx] = Value::Text(values[*idx].to_string());
                }
            }
            records.push(Record {
                schema: schema.clone(),
                values,
            });
        }
        Ok(ElectionTable {
            level,
            schema,
            records,
        })
    }

    pub(crate) fn from_records(level: Level, schema: Arc<Schema>, records: Vec<Record>) -> Self {
        ElectionTable {
            level,
            schema,
            records,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn check_metric(&self, metric: &str) -> ReduceResult<()> {
        ensure!(self.schema.contains(metric), UnknownMetricSnafu { metric });
        Ok(())
    }
}

// ********* Selection data structures ***********

/// The four pre-aggregated datasets: geography level x election round.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum DatasetId {
    StateRound1,
    StateRound2,
    MunicipalityRound1,
    MunicipalityRound2,
}

impl DatasetId {
    /// All the datasets, in the order they are offered for selection.
    pub const ALL: [DatasetId; 4] = [
        DatasetId::StateRound1,
        DatasetId::StateRound2,
        DatasetId::MunicipalityRound1,
        DatasetId::MunicipalityRound2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetId::StateRound1 => "state/round-1",
            DatasetId::StateRound2 => "state/round-2",
            DatasetId::MunicipalityRound1 => "municipality/round-1",
            DatasetId::MunicipalityRound2 => "municipality/round-2",
        }
    }

    /// The label shown in the original dashboard selector.
    pub fn label(&self) -> &'static str {
        match self {
            DatasetId::StateRound1 => "Estadual - 1º turno",
            DatasetId::StateRound2 => "Estadual - 2º turno",
            DatasetId::MunicipalityRound1 => "Municipal - 1º turno",
            DatasetId::MunicipalityRound2 => "Municipal - 2º turno",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            DatasetId::StateRound1 | DatasetId::StateRound2 => Level::State,
            DatasetId::MunicipalityRound1 | DatasetId::MunicipalityRound2 => Level::Municipality,
        }
    }

    pub fn round(&self) -> u8 {
        match self {
            DatasetId::StateRound1 | DatasetId::MunicipalityRound1 => 1,
            DatasetId::StateRound2 | DatasetId::MunicipalityRound2 => 2,
        }
    }
}

impl Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatasetId {
    type Err = ReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetId::ALL
            .iter()
            .find(|id| id.as_str() == s || id.label() == s)
            .cloned()
            .context(NotFoundSnafu { id: s })
    }
}

/// Identifies one record: a state, or a municipality within a state.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum LookupKey {
    State(String),
    Municipality { state: String, municipality: String },
}

impl LookupKey {
    pub fn state(state: &str) -> LookupKey {
        LookupKey::State(state.to_string())
    }

    pub fn municipality(state: &str, municipality: &str) -> LookupKey {
        LookupKey::Municipality {
            state: state.to_string(),
            municipality: municipality.to_string(),
        }
    }

    pub(crate) fn matches(&self, record: &Record) -> bool {
        match self {
            LookupKey::State(s) => record.state().as_deref() == Some(s.as_str()),
            LookupKey::Municipality {
                state,
                municipality,
            } => {
                record.state().as_deref() == Some(state.as_str())
                    && record.municipality().as_deref() == Some(municipality.as_str())
            }
        }
    }
}

impl Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKey::State(s) => write!(f, "{}", s),
            LookupKey::Municipality {
                state,
                municipality,
            } => write!(f, "{}/{}", state, municipality),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Order {
    Ascending,
    Descending,
}

// ******** Output data structures *********

/// The share of male and female voters of one unit, in percent.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct SexSplit {
    pub male_percent: f64,
    pub female_percent: f64,
}

/// A record whose mutually exclusive percentages do not add up to 100.
#[derive(PartialEq, Debug, Clone)]
pub struct PartitionViolation {
    pub row: usize,
    pub label: String,
    /// "education" or "sex"
    pub partition: &'static str,
    pub sum: f64,
}

// ******** Errors *********

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SelectionKind {
    Dataset,
    State,
    Municipality,
}

impl Display for SelectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionKind::Dataset => write!(f, "dataset"),
            SelectionKind::State => write!(f, "state"),
            SelectionKind::Municipality => write!(f, "municipality"),
        }
    }
}

/// Errors surfaced by the registry, the reducer and the selection state.
///
/// None of them is fatal by itself: it is up to the caller to decide how to
/// report them.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReduceError {
    #[snafu(display("Unknown dataset {id:?}"))]
    NotFound { id: String },
    #[snafu(display("Unknown metric {metric:?}"))]
    UnknownMetric { metric: String },
    #[snafu(display("No record found for {key}"))]
    KeyNotFound { key: LookupKey },
    #[snafu(display("Found {count} records for {key}, expected exactly one"))]
    DuplicateKey { key: LookupKey, count: usize },
    #[snafu(display("Invalid {kind} selection {id:?}"))]
    InvalidSelection { kind: SelectionKind, id: String },
    #[snafu(display("Metric {metric:?} holds the non-numeric value {value:?}"))]
    NotNumeric { metric: String, value: String },
    #[snafu(display("Failed to load dataset {id}"))]
    Load { id: DatasetId, source: BoxError },
    #[snafu(display("Dataset {id} was loaded as a {level}-level table"))]
    LevelMismatch { id: DatasetId, level: Level },
    #[snafu(display("Row {row} has {found} values, expected {expected}"))]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[snafu(display("Column {column:?} appears more than once"))]
    DuplicateColumn { column: String },
}

pub type ReduceResult<T> = Result<T, ReduceError>;
