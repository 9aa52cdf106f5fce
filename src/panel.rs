use log::{debug, info, warn};

use census_reduce::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::panel::config_reader::*;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PanelError {
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No content in {path}"))]
    EmptyFile { path: String },
    #[snafu(display("Unexpected cell on line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error computing the panel"))]
    Reduce { source: ReduceError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type PanelResult<T> = Result<T, PanelError>;

/// Colors of the ranking bars, from the first to the tenth.
const PALETTE: [&str; 10] = [
    "#FCC202", "#E6DD39", "#FEE592", "#FEE592", "#E1E0C7", "#DEE0FC", "#A6ACE6", "#7179E6",
    "#597092", "#355070",
];

/// The colors for a ranking of `n` entries. Shorter rankings use the first
/// colors of the palette; longer ones cycle through it.
pub fn palette(n: usize) -> Vec<&'static str> {
    PALETTE.iter().cycle().take(n).cloned().collect()
}

/// Reads the tables from files, one per dataset.
pub struct FileTableSource {
    paths: HashMap<DatasetId, PathBuf>,
    input_type: InputType,
    worksheet_name: Option<String>,
}

impl FileTableSource {
    pub fn read(&self, id: DatasetId) -> PanelResult<ElectionTable> {
        let p = self
            .paths
            .get(&id)
            .with_whatever_context(|| format!("no file configured for dataset {}", id))?;
        let p2 = p.as_path().display().to_string();
        info!("Attempting to read dataset {} from {:?}", id, p2);
        match self.input_type {
            InputType::Csv => io_csv::read_csv_table(&p2),
            InputType::Xlsx => io_excel::read_excel_table(&p2, self.worksheet_name.as_deref()),
        }
    }
}

impl TableSource for FileTableSource {
    fn load(&self, id: DatasetId) -> Result<ElectionTable, BoxError> {
        Ok(self.read(id)?)
    }
}

// **** Panel assembly ****

fn value_js(v: &Value) -> JSValue {
    match v {
        Value::Number(x) => json!(x),
        Value::Text(s) => json!(s),
        Value::Empty => JSValue::Null,
    }
}

fn record_value_js(r: &Record, metric: &str) -> JSValue {
    r.get(metric).map(value_js).unwrap_or(JSValue::Null)
}

fn split_js(s: &SexSplit) -> JSValue {
    json!({"malePercent": s.male_percent, "femalePercent": s.female_percent})
}

// A section that could not be computed carries the error instead of its data.
fn section(name: &str, res: ReduceResult<JSValue>) -> JSValue {
    match res {
        Ok(js) => js,
        Err(e) => {
            warn!("panel section {}: {}", name, e);
            json!({ "error": e.to_string() })
        }
    }
}

fn ranking_js(table: &ElectionTable, metric: &str, n: usize) -> ReduceResult<JSValue> {
    let top = top_n(table, metric, n, Order::Descending)?;
    let colors = palette(top.len());
    let entries: Vec<JSValue> = top
        .iter()
        .zip(colors)
        .map(|(r, color)| {
            json!({
                "label": unit_label(r),
                "value": record_value_js(r, metric),
                "color": color,
            })
        })
        .collect();
    Ok(JSValue::Array(entries))
}

fn totals_js(table: &ElectionTable) -> JSValue {
    let sums: [(&str, &str); 3] = [
        ("eligibleVoters", fields::ELIGIBLE_VOTERS),
        ("femaleVoters", fields::FEMALE_VOTERS),
        ("maleVoters", fields::MALE_VOTERS),
    ];
    let means: [(&str, &str); 2] = [
        ("turnoutPercent", fields::TURNOUT_PERCENT),
        ("abstentionPercent", fields::ABSTENTION_PERCENT),
    ];
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for (name, metric) in sums.iter() {
        let js = section(name, column_sum(table, metric).map(|x| json!(x)));
        res.insert(name.to_string(), js);
    }
    for (name, metric) in means.iter() {
        let js = section(name, column_mean(table, metric).map(|x| json!(x)));
        res.insert(name.to_string(), js);
    }
    JSValue::Object(res)
}

fn selected_js(table: &ElectionTable, key: &LookupKey) -> JSValue {
    let metrics: [(&str, &str); 5] = [
        ("turnoutPercent", fields::TURNOUT_PERCENT),
        ("illiterate", fields::ILLITERATE),
        ("illiteratePercent", fields::ILLITERATE_PERCENT),
        ("votersWithDisability", fields::VOTERS_WITH_DISABILITY),
        (
            "votersWithDisabilityPercent",
            fields::VOTERS_WITH_DISABILITY_PERCENT,
        ),
    ];
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for (name, metric) in metrics.iter() {
        let js = section(name, lookup_scalar(table, key, metric).map(|v| value_js(&v)));
        res.insert(name.to_string(), js);
    }
    let optional = age_buckets(table).and_then(|b| lookup_scalar(&b, key, fields::TOTAL));
    res.insert(
        "optionalVotersTotal".to_string(),
        section("optionalVotersTotal", optional.map(|v| value_js(&v))),
    );
    JSValue::Object(res)
}

fn sex_split_js(table: &ElectionTable, key: &LookupKey) -> ReduceResult<JSValue> {
    let selected = sex_split(table, key)?;
    let all: Vec<JSValue> = sex_split_all(table)?
        .iter()
        .map(|(label, s)| {
            json!({"label": label, "malePercent": s.male_percent, "femalePercent": s.female_percent})
        })
        .collect();
    Ok(json!({"selected": split_js(&selected), "all": all}))
}

fn education_js(table: &ElectionTable, key: &LookupKey, n: usize) -> ReduceResult<JSValue> {
    let selected: Vec<JSValue> = education_profile(table, key)?
        .iter()
        .map(|(tier, pct)| json!({"tier": tier, "percent": pct}))
        .collect();
    let ranking: Vec<JSValue> = top_n(table, fields::HIGHER_COMPLETE_PERCENT, n, Order::Descending)?
        .iter()
        .map(|r| {
            let tiers: JSMap<String, JSValue> = fields::EDUCATION_TIERS
                .iter()
                .map(|t| (t.to_string(), record_value_js(r, t)))
                .collect();
            json!({"label": unit_label(r), "tiers": tiers})
        })
        .collect();
    Ok(json!({"selected": selected, "ranking": ranking}))
}

fn optional_voters_js(table: &ElectionTable, n: usize) -> ReduceResult<JSValue> {
    let buckets = age_buckets(table)?;
    let entries: Vec<JSValue> = buckets
        .records()
        .iter()
        .take(n)
        .map(|r| {
            json!({
                "label": unit_label(r),
                "youth": record_value_js(r, fields::YOUTH),
                "elderly": record_value_js(r, fields::ELDERLY),
                "total": record_value_js(r, fields::TOTAL),
            })
        })
        .collect();
    Ok(JSValue::Array(entries))
}

/// The selector domains of a session.
pub fn domains_js(session: &Session) -> JSValue {
    let datasets: Vec<JSValue> = DatasetId::ALL
        .iter()
        .map(|id| json!({"id": id.as_str(), "label": id.label()}))
        .collect();
    json!({
        "datasets": datasets,
        "states": session.state_domain(),
        "municipalities": session.municipality_domain(),
    })
}

/// All the chart-ready views of the current selection.
///
/// Rankings hold at most `n` entries.
pub fn build_panel(session: &Session, n: usize) -> JSValue {
    let table = session.table();
    let selection = session.selection();
    let key = session.key();
    let id = session.dataset_id();
    debug!("build_panel: {:?} n: {}", selection, n);

    let mut rankings: JSMap<String, JSValue> = JSMap::new();
    for (name, metric) in [
        ("illiterate", fields::ILLITERATE),
        ("illiteratePercent", fields::ILLITERATE_PERCENT),
        ("votersWithDisability", fields::VOTERS_WITH_DISABILITY),
        (
            "votersWithDisabilityPercent",
            fields::VOTERS_WITH_DISABILITY_PERCENT,
        ),
    ] {
        rankings.insert(name.to_string(), section(name, ranking_js(table, metric, n)));
    }

    json!({
        "dataset": {
            "id": id.as_str(),
            "label": id.label(),
            "level": id.level().to_string(),
            "round": id.round(),
        },
        "selection": {
            "state": selection.state_id,
            "municipality": selection.municipality_id,
        },
        "domains": domains_js(session),
        "totals": totals_js(table),
        "selected": selected_js(table, &key),
        "sexSplit": section("sexSplit", sex_split_js(table, &key)),
        "education": section("education", education_js(table, &key, n)),
        "rankings": rankings,
        "optionalVoters": section("optionalVoters", optional_voters_js(table, n)),
    })
}

// **** Command line ****

const DEFAULT_TOP_N: usize = 10;

fn write_output(out: &Option<String>, contents: &str) -> PanelResult<()> {
    match out.as_deref() {
        None | Some("stdout") => {
            println!("{}", contents);
            Ok(())
        }
        Some(path) => {
            info!("Writing panel to {:?}", path);
            fs::write(path, contents).context(WritingOutputSnafu { path })
        }
    }
}

fn check_reference(reference_path: &str, pretty_js: &str) -> PanelResult<()> {
    let reference = read_reference(reference_path)?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
    if pretty_reference != pretty_js {
        warn!("Found differences with the reference panel");
        print_diff(pretty_reference.as_str(), pretty_js, "\n");
        whatever!("Difference detected between the computed panel and the reference panel")
    }
    info!("The panel matches the reference {:?}", reference_path);
    Ok(())
}

pub fn run_panel(args: &Args) -> PanelResult<()> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => PanelConfig::default(),
    };
    info!("config: {:?}", config);

    // Paths in the configuration are relative to its directory.
    let root: PathBuf = args
        .config
        .as_ref()
        .and_then(|p| Path::new(p).parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let data_dir: PathBuf = match (&args.data_dir, &config.data_directory) {
        (Some(d), _) => PathBuf::from(d),
        (None, Some(d)) => root.join(d),
        (None, None) => root.join("data"),
    };
    let input_type = InputType::parse(
        args.input_type
            .as_deref()
            .or(config.input_type.as_deref())
            .unwrap_or("csv"),
    )?;
    let n = args.top_n.or(config.top_n).unwrap_or(DEFAULT_TOP_N);
    let worksheet_name = args
        .excel_worksheet_name
        .clone()
        .or_else(|| config.worksheet_name.clone());

    let paths = dataset_paths(&config, &data_dir, input_type)?;
    let registry = DatasetRegistry::new(FileTableSource {
        paths,
        input_type,
        worksheet_name,
    });

    let mut session = match &args.dataset {
        Some(name) => {
            let id: DatasetId = name.parse().context(ReduceSnafu {})?;
            Session::with_dataset(&registry, id).context(ReduceSnafu {})?
        }
        None => Session::start(&registry).context(ReduceSnafu {})?,
    };
    if let Some(state) = &args.state {
        session.set_state(state).context(ReduceSnafu {})?;
    }
    if let Some(municipality) = &args.municipality {
        session.set_municipality(municipality).context(ReduceSnafu {})?;
    }
    info!("selection: {:?}", session.selection());

    let violations = check_partitions(session.table(), 0.5);
    if !violations.is_empty() {
        warn!(
            "{} records of {} have percentages that do not add up to 100",
            violations.len(),
            session.dataset_id()
        );
    }

    let result_js = if args.list {
        domains_js(&session)
    } else {
        build_panel(&session, n)
    };
    let pretty_js = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_output(&args.out, &pretty_js)?;

    if let Some(reference_path) = &args.reference {
        check_reference(reference_path, &pretty_js)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_reduce::builder::TableBuilder;

    const STATE_COLUMNS: [&str; 9] = [
        "state",
        "eligible_voters",
        "female_voters",
        "male_voters",
        "turnout_percent",
        "abstention_percent",
        "illiterate",
        "male_percent",
        "female_percent",
    ];

    fn states() -> ElectionTable {
        let mut b = TableBuilder::new(Level::State).columns(&STATE_COLUMNS);
        b.add_row_raw(&["SP", "100", "52", "48", "80.0", "20.0", "5", "48.0", "52.0"])
            .unwrap();
        b.add_row_raw(&["RJ", "50", "27", "23", "70.0", "30.0", "9", "46.0", "54.0"])
            .unwrap();
        b.build().unwrap()
    }

    fn registry() -> DatasetRegistry {
        DatasetRegistry::new(|_id: DatasetId| -> Result<ElectionTable, BoxError> { Ok(states()) })
    }

    #[test]
    fn palette_is_clipped() {
        assert_eq!(palette(3), vec!["#FCC202", "#E6DD39", "#FEE592"]);
        assert!(palette(0).is_empty());
        assert_eq!(palette(12).len(), 12);
    }

    #[test]
    fn panel_for_state() {
        let registry = registry();
        let mut session = Session::start(&registry).unwrap();
        session.set_state("RJ").unwrap();
        let panel = build_panel(&session, 10);

        assert_eq!(panel["dataset"]["id"], json!("state/round-1"));
        assert_eq!(panel["selection"]["state"], json!("RJ"));
        assert_eq!(panel["selection"]["municipality"], JSValue::Null);
        assert_eq!(panel["domains"]["states"], json!(["SP", "RJ"]));
        assert_eq!(panel["totals"]["eligibleVoters"], json!(150.0));
        assert_eq!(panel["totals"]["femaleVoters"], json!(79.0));
        assert_eq!(panel["totals"]["maleVoters"], json!(71.0));
        assert_eq!(panel["totals"]["turnoutPercent"], json!(75.0));
        assert_eq!(panel["totals"]["abstentionPercent"], json!(25.0));
        assert_eq!(panel["selected"]["turnoutPercent"], json!(70.0));
        assert_eq!(panel["sexSplit"]["selected"]["femalePercent"], json!(54.0));
        assert_eq!(panel["sexSplit"]["all"].as_array().unwrap().len(), 2);

        let ranking = panel["rankings"]["illiterate"].as_array().unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0]["label"], json!("RJ"));
        assert_eq!(ranking[0]["color"], json!("#FCC202"));
        assert_eq!(ranking[1]["color"], json!("#E6DD39"));
    }

    #[test]
    fn missing_columns_are_reported_per_section() {
        let registry = registry();
        let session = Session::start(&registry).unwrap();
        let panel = build_panel(&session, 10);
        // No education nor age columns in this table.
        assert!(panel["education"]["error"].is_string());
        assert!(panel["optionalVoters"]["error"].is_string());
        assert!(panel["selected"]["optionalVotersTotal"]["error"].is_string());
        assert!(panel["rankings"]["votersWithDisability"]["error"].is_string());
        // The other sections are still computed.
        assert!(panel["rankings"]["illiterate"].is_array());
    }

    #[test]
    fn totals_fail_one_by_one() {
        let mut b = TableBuilder::new(Level::State).columns(&["state", "eligible_voters", "turnout_percent"]);
        b.add_row_raw(&["SP", "100", "80.0"]).unwrap();
        b.add_row_raw(&["RJ", "50", "70.0"]).unwrap();
        let totals = totals_js(&b.build().unwrap());
        assert_eq!(totals["eligibleVoters"], json!(150.0));
        assert_eq!(totals["turnoutPercent"], json!(75.0));
        assert!(totals["femaleVoters"]["error"].is_string());
        assert!(totals["abstentionPercent"]["error"].is_string());
    }

    #[test]
    fn source_reports_missing_files() {
        let source = FileTableSource {
            paths: HashMap::new(),
            input_type: InputType::Csv,
            worksheet_name: None,
        };
        assert!(matches!(
            source.read(DatasetId::StateRound1),
            Err(PanelError::Whatever { .. })
        ));
        let registry = DatasetRegistry::new(source);
        assert!(matches!(
            Session::start(&registry),
            Err(ReduceError::Load { .. })
        ));
    }
}
