use crate::panel::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The optional JSON configuration of the panel.
///
/// Every entry can also be given on the command line, which takes precedence.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Relative to the directory of the configuration file.
    #[serde(rename = "dataDirectory")]
    pub data_directory: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    /// Dataset identifier (or dashboard label) -> file, relative to the data
    /// directory.
    #[serde(rename = "datasets")]
    pub datasets: Option<BTreeMap<String, String>>,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
    #[serde(rename = "topN")]
    pub top_n: Option<usize>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    Csv,
    Xlsx,
}

impl InputType {
    pub fn parse(s: &str) -> PanelResult<InputType> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(InputType::Csv),
            "xlsx" | "excel" => Ok(InputType::Xlsx),
            _ => whatever!("unknown input type: {}", s),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            InputType::Csv => "csv",
            InputType::Xlsx => "xlsx",
        }
    }
}

pub fn read_config(path: &str) -> PanelResult<PanelConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> PanelResult<PanelConfig> {
    let config: PanelConfig = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
    debug!("parse_config: {:?}", config);
    if config.top_n == Some(0) {
        whatever!("topN must be at least 1");
    }
    Ok(config)
}

/// The file names used by the original exports of the 2020 elections.
pub fn default_file_name(id: DatasetId, input_type: InputType) -> String {
    let level = match id.level() {
        Level::State => "estados",
        Level::Municipality => "municipios",
    };
    format!(
        "df_{}_{}turno_2020.{}",
        level,
        id.round(),
        input_type.extension()
    )
}

/// Resolves the file of every dataset: the default names in the data
/// directory, overridden by the `datasets` entries of the configuration.
pub fn dataset_paths(
    config: &PanelConfig,
    data_dir: &Path,
    input_type: InputType,
) -> PanelResult<HashMap<DatasetId, PathBuf>> {
    let mut res: HashMap<DatasetId, PathBuf> = DatasetId::ALL
        .iter()
        .map(|id| (*id, data_dir.join(default_file_name(*id, input_type))))
        .collect();
    if let Some(datasets) = &config.datasets {
        for (name, file) in datasets.iter() {
            let id: DatasetId = name.parse().context(ReduceSnafu {})?;
            debug!("dataset_paths: {} -> {}", id, file);
            res.insert(id, data_dir.join(file));
        }
    }
    Ok(res)
}

/// Reads a panel previously written in JSON, for comparison.
pub fn read_reference(path: &str) -> PanelResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
