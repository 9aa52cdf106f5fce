use clap::Parser;

/// This program computes the chart-ready views of the electoral census panel.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. It may set the data directory, the input type and the file of
    /// each dataset. Relative paths are resolved against the directory of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, default 'data') The directory holding the dataset files. Overrides the configuration file.
    #[clap(short, long, value_parser)]
    pub data_dir: Option<String>,

    /// (default csv) The type of the input files: csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default Sheet at position 0) When using Excel files, the name of the worksheet to read.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (default state/round-1) The dataset: state/round-1, state/round-2, municipality/round-1 or
    /// municipality/round-2. The labels of the original dashboard are also accepted.
    #[clap(long, value_parser)]
    pub dataset: Option<String>,

    /// (default: the first state of the dataset) The state to select.
    #[clap(short, long, value_parser)]
    pub state: Option<String>,

    /// (default: the first municipality of the state) The municipality to select. Only for municipality datasets.
    #[clap(short, long, value_parser)]
    pub municipality: Option<String>,

    /// (default 10) The number of entries in the rankings.
    #[clap(long, value_parser)]
    pub top_n: Option<usize>,

    /// (file path, 'stdout' or empty) Where the panel is written, in JSON format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference panel in JSON format. If provided, the computed panel is checked against it.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, only the selector domains (datasets, states, municipalities) are written.
    #[clap(long, takes_value = false)]
    pub list: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
