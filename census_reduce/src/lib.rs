/*!
Selection and reduction primitives over pre-aggregated electoral census tables.

The tables hold one record per state or per municipality, with counts and
percentages of eligible voters (turnout, sex, education, age brackets, ...).
This crate turns a selection (dataset, state, municipality) into the values
that charts consume: single values, top-N rankings, sex splits and the
optional voters (youth and elderly) buckets.

```
use census_reduce::builder::TableBuilder;
use census_reduce::*;

let mut builder = TableBuilder::new(Level::State)
    .columns(&["state", "illiterate", "illiterate_percent"]);
builder.add_row_raw(&["SP", "500000", "5.0"])?;
builder.add_row_raw(&["RJ", "800000", "9.0"])?;
builder.add_row_raw(&["MG", "100000", "2.0"])?;
let table = builder.build()?;

let top = top_n(&table, "illiterate", 2, Order::Descending)?;
assert_eq!(top[0].state().as_deref(), Some("RJ"));

let pct = lookup_scalar(&table, &LookupKey::state("MG"), "illiterate_percent")?;
assert_eq!(pct, Value::Number(2.0));
# Ok::<(), ReduceError>(())
```
*/

pub mod builder;
mod config;
pub mod registry;
pub mod selection;

use log::{debug, warn};
use snafu::prelude::*;

use std::cmp::Ordering;
use std::sync::Arc;

pub use crate::config::*;
pub use crate::registry::{DatasetRegistry, TableSource};
pub use crate::selection::{Selection, Session};

// **** Private helpers ****

/// Finds the only record matching the key.
fn find_record<'a>(table: &'a ElectionTable, key: &LookupKey) -> ReduceResult<&'a Record> {
    let matching: Vec<&Record> = table.records().iter().filter(|r| key.matches(r)).collect();
    debug!("find_record: key: {} matches: {}", key, matching.len());
    match matching.as_slice() {
        [] => KeyNotFoundSnafu { key: key.clone() }.fail(),
        [r] => Ok(*r),
        _ => DuplicateKeySnafu {
            key: key.clone(),
            count: matching.len(),
        }
        .fail(),
    }
}

fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Number(_), Value::Text(_)) => Ordering::Less,
        (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

// Numbers come first, then text, then empty cells, whatever the order.
fn rank_cmp(a: &Value, b: &Value, order: Order) -> Ordering {
    fn class(v: &Value) -> u8 {
        match v {
            Value::Number(_) => 0,
            Value::Text(_) => 1,
            Value::Empty => 2,
        }
    }
    class(a).cmp(&class(b)).then_with(|| match order {
        Order::Ascending => value_cmp(a, b),
        Order::Descending => value_cmp(a, b).reverse(),
    })
}

fn required_number(record: &Record, metric: &str) -> ReduceResult<f64> {
    record.number(metric)?.context(NotNumericSnafu {
        metric,
        value: "",
    })
}

/// Adds up the fields. Any empty field makes the whole sum empty.
fn sum_fields(record: &Record, names: &[&str]) -> ReduceResult<Option<f64>> {
    let mut total = 0.0;
    for name in names {
        match record.number(name)? {
            Some(x) => total += x,
            None => return Ok(None),
        }
    }
    Ok(Some(total))
}

fn to_value(x: Option<f64>) -> Value {
    x.map(Value::Number).unwrap_or(Value::Empty)
}

// **** Reducer ****

/// Returns the value of `metric` for the record identified by `key`.
///
/// The metric is checked first, then the key must resolve to exactly one
/// record. A state key against a municipality-level table usually resolves
/// to several records and is reported as a duplicate.
pub fn lookup_scalar(table: &ElectionTable, key: &LookupKey, metric: &str) -> ReduceResult<Value> {
    table.check_metric(metric)?;
    let record = find_record(table, key)?;
    let res = record.get(metric).cloned().unwrap_or(Value::Empty);
    debug!("lookup_scalar: {} {}: {:?}", key, metric, res);
    Ok(res)
}

/// The first `n` records ranked by `metric`.
///
/// The sort is stable: records with equal values keep their table order.
/// Text cells rank after the numbers and empty cells always rank last.
pub fn top_n(table: &ElectionTable, metric: &str, n: usize, order: Order) -> ReduceResult<Vec<Record>> {
    table.check_metric(metric)?;
    let mut ranked: Vec<&Record> = table.records().iter().collect();
    ranked.sort_by(|a, b| {
        rank_cmp(
            a.get(metric).unwrap_or(&Value::Empty),
            b.get(metric).unwrap_or(&Value::Empty),
            order,
        )
    });
    debug!(
        "top_n: metric: {} n: {} order: {:?} rows: {}",
        metric,
        n,
        order,
        table.len()
    );
    Ok(ranked.into_iter().take(n).cloned().collect())
}

/// The male and female shares of the voters for `key`.
pub fn sex_split(table: &ElectionTable, key: &LookupKey) -> ReduceResult<SexSplit> {
    table.check_metric(fields::MALE_PERCENT)?;
    table.check_metric(fields::FEMALE_PERCENT)?;
    let record = find_record(table, key)?;
    Ok(SexSplit {
        male_percent: required_number(record, fields::MALE_PERCENT)?,
        female_percent: required_number(record, fields::FEMALE_PERCENT)?,
    })
}

/// The sex split of every record, in table order, labelled with `unit_label`.
pub fn sex_split_all(table: &ElectionTable) -> ReduceResult<Vec<(String, SexSplit)>> {
    table.check_metric(fields::MALE_PERCENT)?;
    table.check_metric(fields::FEMALE_PERCENT)?;
    table
        .records()
        .iter()
        .map(|r| -> ReduceResult<(String, SexSplit)> {
            Ok((
                unit_label(r),
                SexSplit {
                    male_percent: required_number(r, fields::MALE_PERCENT)?,
                    female_percent: required_number(r, fields::FEMALE_PERCENT)?,
                },
            ))
        })
        .collect()
}

/// Computes the optional voters buckets.
///
/// Returns a copy of the table with three extra columns:
/// * `youth`: voters aged 16 and 17
/// * `elderly`: voters aged 65 and more
/// * `total`: the sum of both
///
/// sorted by decreasing `total`. The input table is left untouched.
pub fn age_buckets(table: &ElectionTable) -> ReduceResult<ElectionTable> {
    for name in fields::YOUTH_AGES.iter().chain(fields::ELDERLY_AGES.iter()) {
        table.check_metric(name)?;
    }
    let mut columns: Vec<String> = table.columns().to_vec();
    columns.extend(
        [fields::YOUTH, fields::ELDERLY, fields::TOTAL]
            .iter()
            .map(|s| s.to_string()),
    );
    let schema = Arc::new(Schema::new(columns)?);

    let mut records: Vec<Record> = Vec::with_capacity(table.len());
    for r in table.records() {
        let youth = sum_fields(r, &fields::YOUTH_AGES)?;
        let elderly = sum_fields(r, &fields::ELDERLY_AGES)?;
        let total = match (youth, elderly) {
            (Some(y), Some(e)) => Some(y + e),
            _ => None,
        };
        records.push(r.extended(&schema, &[to_value(youth), to_value(elderly), to_value(total)]));
    }
    records.sort_by(|a, b| {
        rank_cmp(
            a.get(fields::TOTAL).unwrap_or(&Value::Empty),
            b.get(fields::TOTAL).unwrap_or(&Value::Empty),
            Order::Descending,
        )
    });
    Ok(ElectionTable::from_records(table.level(), schema, records))
}

/// The sum of a numeric column. Empty cells are skipped.
pub fn column_sum(table: &ElectionTable, metric: &str) -> ReduceResult<f64> {
    table.check_metric(metric)?;
    let mut total = 0.0;
    for r in table.records() {
        total += r.number(metric)?.unwrap_or(0.0);
    }
    Ok(total)
}

/// The mean of a numeric column, ignoring empty cells.
///
/// Returns `None` if the column has no value at all.
pub fn column_mean(table: &ElectionTable, metric: &str) -> ReduceResult<Option<f64>> {
    table.check_metric(metric)?;
    let mut total = 0.0;
    let mut count: usize = 0;
    for r in table.records() {
        if let Some(x) = r.number(metric)? {
            total += x;
            count += 1;
        }
    }
    if count == 0 {
        Ok(None)
    } else {
        Ok(Some(total / count as f64))
    }
}

/// The eight education tiers of one record, from illiterate to complete
/// higher education.
pub fn education_profile(table: &ElectionTable, key: &LookupKey) -> ReduceResult<Vec<(String, f64)>> {
    for name in fields::EDUCATION_TIERS.iter() {
        table.check_metric(name)?;
    }
    let record = find_record(table, key)?;
    fields::EDUCATION_TIERS
        .iter()
        .map(|name| -> ReduceResult<(String, f64)> {
            Ok((name.to_string(), required_number(record, name)?))
        })
        .collect()
}

/// The display name of a record: its municipality if it has one, its state
/// otherwise.
pub fn unit_label(record: &Record) -> String {
    record
        .municipality()
        .or_else(|| record.state())
        .unwrap_or_default()
}

/// Lists the records whose education tiers or sex split do not add up to 100
/// (within `tolerance`).
///
/// Partitions whose columns are not all present are not checked, and neither
/// are records with empty or non-numeric cells in the partition.
pub fn check_partitions(table: &ElectionTable, tolerance: f64) -> Vec<PartitionViolation> {
    let sex: [&str; 2] = [fields::MALE_PERCENT, fields::FEMALE_PERCENT];
    let partitions: [(&'static str, &[&str]); 2] =
        [("education", &fields::EDUCATION_TIERS), ("sex", &sex)];
    let mut res: Vec<PartitionViolation> = Vec::new();
    for (partition, names) in partitions.iter() {
        if !names.iter().all(|n| table.schema().contains(n)) {
            debug!("check_partitions: skipping {}: missing columns", partition);
            continue;
        }
        for (row, r) in table.records().iter().enumerate() {
            if let Ok(Some(sum)) = sum_fields(r, names) {
                if (sum - 100.0).abs() > tolerance {
                    let label = unit_label(r);
                    warn!(
                        "check_partitions: {} percentages of {} add up to {}",
                        partition, label, sum
                    );
                    res.push(PartitionViolation {
                        row,
                        label,
                        partition: *partition,
                        sum,
                    });
                }
            }
        }
    }
    res
}

#[cfg(test)]
pub(crate) mod tests {
    use super::builder::TableBuilder;
    use super::*;
    use std::collections::HashSet;

    pub(crate) const SAMPLE_COLUMNS: [&str; 23] = [
        "state",
        "illiterate",
        "illiterate_percent",
        "reads_writes_percent",
        "elementary_incomplete_percent",
        "elementary_complete_percent",
        "high_school_incomplete_percent",
        "high_school_complete_percent",
        "higher_incomplete_percent",
        "higher_complete_percent",
        "male_percent",
        "female_percent",
        "turnout_percent",
        "age_16_percent",
        "age_17_percent",
        "age_65_69_percent",
        "age_70_74_percent",
        "age_75_79_percent",
        "age_80_84_percent",
        "age_85_89_percent",
        "age_90_94_percent",
        "age_95_99_percent",
        "age_100_percent",
    ];

    pub(crate) const SAMPLE_ROWS: [[&str; 23]; 4] = [
        [
            "SP", "500000", "5.0", "8.0", "20.0", "7.0", "6.0", "30.0", "6.0", "18.0", "47.5",
            "52.5", "80.0", "0.5", "1.0", "4.0", "3.0", "2.0", "1.0", "0.5", "0.25", "0.125",
            "0.125",
        ],
        [
            "RJ", "800000", "9.0", "9.0", "18.0", "8.0", "6.0", "28.0", "7.0", "15.0", "46.0",
            "54.0", "78.5", "0.25", "0.75", "5.0", "4.0", "3.0", "2.0", "1.0", "0.5", "0.25",
            "0.25",
        ],
        [
            "MG", "100000", "2.0", "10.0", "25.0", "8.0", "5.0", "30.0", "5.0", "15.0", "48.0",
            "52.0", "81.0", "1.0", "1.5", "3.0", "2.0", "1.0", "0.5", "0.25", "0.125", "0.0625",
            "0.0625",
        ],
        [
            "BA", "800000", "12.0", "11.0", "22.0", "8.0", "6.0", "26.0", "5.0", "10.0", "49.0",
            "51.0", "75.25", "2.0", "2.0", "4.0", "3.0", "2.0", "1.0", "0.5", "0.25", "0.125",
            "0.125",
        ],
    ];

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    pub(crate) fn sample_states() -> ElectionTable {
        let mut builder = TableBuilder::new(Level::State).columns(&SAMPLE_COLUMNS);
        for row in SAMPLE_ROWS.iter() {
            builder.add_row_raw(row).unwrap();
        }
        builder.build().unwrap()
    }

    fn states(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.state().unwrap()).collect()
    }

    fn scenario_table() -> ElectionTable {
        let mut builder = TableBuilder::new(Level::State).columns(&[
            "state",
            "illiterate",
            "illiterate_percent",
        ]);
        builder.add_row_raw(&["SP", "500000", "5.0"]).unwrap();
        builder.add_row_raw(&["RJ", "800000", "9.0"]).unwrap();
        builder.add_row_raw(&["MG", "100000", "2.0"]).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn three_states_scenario() {
        init_logs();
        let table = scenario_table();
        let top = top_n(&table, "illiterate", 2, Order::Descending).unwrap();
        assert_eq!(states(&top), vec!["RJ", "SP"]);
        assert_eq!(top[0].get("illiterate"), Some(&Value::Number(800000.0)));
        assert_eq!(top[1].get("illiterate"), Some(&Value::Number(500000.0)));

        let pct = lookup_scalar(&table, &LookupKey::state("MG"), "illiterate_percent").unwrap();
        assert_eq!(pct, Value::Number(2.0));
    }

    #[test]
    fn education_tiers_add_up() {
        let table = sample_states();
        let key_states = ["SP", "RJ", "MG", "BA"];
        for s in key_states {
            let profile = education_profile(&table, &LookupKey::state(s)).unwrap();
            assert_eq!(profile.len(), 8);
            let sum: f64 = profile.iter().map(|(_, x)| x).sum();
            assert!((sum - 100.0).abs() <= 0.5, "{} sums to {}", s, sum);
        }
        assert!(check_partitions(&table, 0.5).is_empty());
    }

    #[test]
    fn partitions_report_violations() {
        let mut builder = TableBuilder::new(Level::State).columns(&[
            "state",
            "male_percent",
            "female_percent",
        ]);
        builder.add_row_raw(&["SP", "48.0", "52.0"]).unwrap();
        builder.add_row_raw(&["RJ", "48.0", "50.0"]).unwrap();
        let table = builder.build().unwrap();
        let violations = check_partitions(&table, 0.5);
        assert_eq!(
            violations,
            vec![PartitionViolation {
                row: 1,
                label: "RJ".to_string(),
                partition: "sex",
                sum: 98.0
            }]
        );
    }

    #[test]
    fn top_n_is_stable() {
        let table = sample_states();
        // RJ and BA are tied: RJ comes first in the table.
        let top = top_n(&table, "illiterate", 3, Order::Descending).unwrap();
        assert_eq!(states(&top), vec!["RJ", "BA", "SP"]);
        let bottom = top_n(&table, "illiterate", 4, Order::Ascending).unwrap();
        assert_eq!(states(&bottom), vec!["MG", "SP", "RJ", "BA"]);
    }

    #[test]
    fn top_n_bounds() {
        let table = sample_states();
        assert!(top_n(&table, "illiterate", 0, Order::Descending)
            .unwrap()
            .is_empty());
        assert_eq!(
            top_n(&table, "illiterate", 10, Order::Descending)
                .unwrap()
                .len(),
            4
        );
        assert!(matches!(
            top_n(&table, "literacy", 2, Order::Descending),
            Err(ReduceError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn top_n_reversed_table_same_set() {
        let table = sample_states();
        let mut builder = TableBuilder::new(Level::State).columns(&SAMPLE_COLUMNS);
        for row in SAMPLE_ROWS.iter().rev() {
            builder.add_row_raw(row).unwrap();
        }
        let reversed = builder.build().unwrap();
        let n = table.len();
        let desc: HashSet<String> = states(&top_n(&table, "turnout_percent", n, Order::Descending).unwrap())
            .into_iter()
            .collect();
        let asc: HashSet<String> = states(&top_n(&reversed, "turnout_percent", n, Order::Ascending).unwrap())
            .into_iter()
            .collect();
        assert_eq!(desc, asc);
    }

    #[test]
    fn empty_cells_rank_last() {
        let mut builder = TableBuilder::new(Level::State).columns(&["state", "illiterate"]);
        builder.add_row_raw(&["SP", ""]).unwrap();
        builder.add_row_raw(&["RJ", "3"]).unwrap();
        builder.add_row_raw(&["MG", "1"]).unwrap();
        let table = builder.build().unwrap();
        let desc = top_n(&table, "illiterate", 3, Order::Descending).unwrap();
        assert_eq!(states(&desc), vec!["RJ", "MG", "SP"]);
        let asc = top_n(&table, "illiterate", 3, Order::Ascending).unwrap();
        assert_eq!(states(&asc), vec!["MG", "RJ", "SP"]);
    }

    #[test]
    fn missing_markers_rank_last() {
        let mut builder = TableBuilder::new(Level::State).columns(&["state", "illiterate"]);
        builder.add_row_raw(&["SP", "5"]).unwrap();
        builder.add_row_raw(&["RJ", "NaN"]).unwrap();
        builder.add_row_raw(&["MG", "2"]).unwrap();
        builder.add_row_raw(&["BA", "NA"]).unwrap();
        let table = builder.build().unwrap();
        let desc = top_n(&table, "illiterate", 4, Order::Descending).unwrap();
        assert_eq!(states(&desc), vec!["SP", "MG", "RJ", "BA"]);
        assert_eq!(column_sum(&table, "illiterate").unwrap(), 7.0);
        assert_eq!(column_mean(&table, "illiterate").unwrap(), Some(3.5));
    }

    #[test]
    fn text_ranks_after_numbers() {
        let mut builder = TableBuilder::new(Level::State).columns(&["state", "illiterate"]);
        builder.add_row_raw(&["SP", "5"]).unwrap();
        builder.add_row_raw(&["RJ", "sigiloso"]).unwrap();
        builder.add_row_raw(&["MG", ""]).unwrap();
        builder.add_row_raw(&["BA", "2"]).unwrap();
        let table = builder.build().unwrap();
        let desc = top_n(&table, "illiterate", 4, Order::Descending).unwrap();
        assert_eq!(states(&desc), vec!["SP", "BA", "RJ", "MG"]);
        let asc = top_n(&table, "illiterate", 4, Order::Ascending).unwrap();
        assert_eq!(states(&asc), vec!["BA", "SP", "RJ", "MG"]);
    }

    #[test]
    fn lookup_is_idempotent() {
        let table = sample_states();
        let before = table.clone();
        let key = LookupKey::state("RJ");
        let first = lookup_scalar(&table, &key, "turnout_percent").unwrap();
        let second = lookup_scalar(&table, &key, "turnout_percent").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Value::Number(78.5));
        assert_eq!(table, before);
    }

    #[test]
    fn lookup_errors() {
        let table = sample_states();
        assert!(matches!(
            lookup_scalar(&table, &LookupKey::state("XX"), "turnout_percent"),
            Err(ReduceError::KeyNotFound { .. })
        ));
        assert!(matches!(
            lookup_scalar(&table, &LookupKey::state("SP"), "nope"),
            Err(ReduceError::UnknownMetric { .. })
        ));
        // A municipality key never matches a state-level table.
        assert!(matches!(
            lookup_scalar(
                &table,
                &LookupKey::municipality("SP", "Campinas"),
                "turnout_percent"
            ),
            Err(ReduceError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn lookup_rejects_duplicates() {
        let mut builder = TableBuilder::new(Level::State).columns(&["state", "illiterate"]);
        builder.add_row_raw(&["SP", "1"]).unwrap();
        builder.add_row_raw(&["SP", "2"]).unwrap();
        let table = builder.build().unwrap();
        assert!(matches!(
            lookup_scalar(&table, &LookupKey::state("SP"), "illiterate"),
            Err(ReduceError::DuplicateKey { count: 2, .. })
        ));
    }

    #[test]
    fn sex_split_for_state() {
        let table = sample_states();
        let split = sex_split(&table, &LookupKey::state("SP")).unwrap();
        assert_eq!(
            split,
            SexSplit {
                male_percent: 47.5,
                female_percent: 52.5
            }
        );
        let all = sex_split_all(&table).unwrap();
        let labels: Vec<&str> = all.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["SP", "RJ", "MG", "BA"]);
        assert!(matches!(
            sex_split(&table, &LookupKey::state("PR")),
            Err(ReduceError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn age_buckets_totals() {
        let table = sample_states();
        let before = table.clone();
        let buckets = age_buckets(&table).unwrap();
        assert_eq!(table, before);
        assert_eq!(buckets.columns().len(), table.columns().len() + 3);
        assert_eq!(states(buckets.records()), vec!["RJ", "BA", "SP", "MG"]);
        for r in buckets.records() {
            let youth = r.number("youth").unwrap().unwrap();
            let elderly = r.number("elderly").unwrap().unwrap();
            let total = r.number("total").unwrap().unwrap();
            assert_eq!(total, youth + elderly);
        }
        let sp = &buckets.records()[2];
        assert_eq!(sp.get("youth"), Some(&Value::Number(1.5)));
        assert_eq!(sp.get("elderly"), Some(&Value::Number(11.0)));
    }

    #[test]
    fn age_buckets_needs_age_columns() {
        let table = scenario_table();
        assert!(matches!(
            age_buckets(&table),
            Err(ReduceError::UnknownMetric { metric }) if metric == "age_16_percent"
        ));
    }

    #[test]
    fn headline_totals() {
        let table = sample_states();
        assert_eq!(column_sum(&table, "illiterate").unwrap(), 2_200_000.0);
        assert_eq!(
            column_mean(&table, "turnout_percent").unwrap(),
            Some((80.0 + 78.5 + 81.0 + 75.25) / 4.0)
        );
        assert!(matches!(
            column_sum(&table, "state"),
            Err(ReduceError::NotNumeric { .. })
        ));
    }
}
