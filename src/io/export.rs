use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{CsvIoError, CsvIoResult};
use crate::core::{ScenarioReports, StatementTable};

/// Writes one statement: a `Line Item` header followed by the period labels,
/// then one row per line item.
pub fn write_statement_csv<W: Write>(writer: W, table: &StatementTable) -> CsvIoResult<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.period_labels.len() + 1);
    header.push("Line Item".to_string());
    header.extend(table.period_labels.iter().cloned());
    csv.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.label.to_string());
        record.extend(row.values.iter().map(f64::to_string));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes `<scenario>_<statement>.csv` for every scenario and statement into
/// `dir`, creating it if needed. Returns the paths written, in order.
///
/// Nothing is written when two scenario names map to the same file stem.
pub fn export_reports(
    dir: &Path,
    reports: &BTreeMap<String, ScenarioReports>,
) -> CsvIoResult<Vec<PathBuf>> {
    let stems = unique_file_stems(reports.keys())?;
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for ((_, scenario_reports), stem) in reports.iter().zip(&stems) {
        for table in scenario_reports.tables() {
            let path = dir.join(format!("{stem}_{}.csv", table.kind.slug()));
            write_statement_csv(File::create(&path)?, table)?;
            tracing::info!(path = %path.display(), "report written");
            written.push(path);
        }
    }
    Ok(written)
}

fn unique_file_stems<'a>(
    scenarios: impl Iterator<Item = &'a String>,
) -> CsvIoResult<Vec<String>> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    let mut stems = Vec::new();
    for scenario in scenarios {
        let stem = file_stem(scenario);
        if let Some(first) = owners.insert(stem.clone(), scenario) {
            return Err(CsvIoError::FileStemCollision {
                first: first.to_string(),
                second: scenario.clone(),
                stem,
            });
        }
        stems.push(stem);
    }
    Ok(stems)
}

fn file_stem(scenario: &str) -> String {
    scenario
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PeriodGranularity, ProjectedPeriodRecord, ScenarioResult, build_reports};

    fn sample_reports(name: &str) -> ScenarioReports {
        let result = ScenarioResult {
            name: name.to_string(),
            periods: vec![
                ProjectedPeriodRecord {
                    period: 0,
                    revenue: 154_000.0,
                    net_income: 34_361.25,
                    ..ProjectedPeriodRecord::default()
                },
                ProjectedPeriodRecord {
                    period: 1,
                    revenue: 169_400.0,
                    ..ProjectedPeriodRecord::default()
                },
            ],
        };
        build_reports(&result, Some("2024"), PeriodGranularity::Yearly)
    }

    #[test]
    fn statement_csv_has_header_and_one_row_per_line_item() {
        let reports = sample_reports("Base");
        let mut buffer = Vec::new();
        write_statement_csv(&mut buffer, &reports.income_statement).expect("write csv");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], "Line Item,2025,2026");
        assert_eq!(lines[1], "Revenue,154000,169400");
        assert_eq!(lines.len(), reports.income_statement.rows.len() + 1);
        assert!(lines.contains(&"Net Income,34361.25,0"));
    }

    #[test]
    fn export_writes_every_scenario_and_statement() {
        let dir = std::env::temp_dir().join(format!("finmodel-export-{}", std::process::id()));
        let reports = BTreeMap::from([
            ("Base".to_string(), sample_reports("Base")),
            ("Best Case".to_string(), sample_reports("Best Case")),
        ]);

        let written = export_reports(&dir, &reports).expect("export");
        let names = written
            .iter()
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "Base_income_statement.csv",
                "Base_cash_flow.csv",
                "Base_balance_sheet.csv",
                "Best_Case_income_statement.csv",
                "Best_Case_cash_flow.csv",
                "Best_Case_balance_sheet.csv",
            ]
        );
        let balance = fs::read_to_string(&written[2]).expect("read back");
        assert!(balance.starts_with("Line Item,2025,2026"));

        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn colliding_scenario_names_are_rejected_before_writing() {
        let dir = std::env::temp_dir().join(format!("finmodel-collide-{}", std::process::id()));
        let reports = BTreeMap::from([
            ("Best Case".to_string(), sample_reports("Best Case")),
            ("Best_Case".to_string(), sample_reports("Best_Case")),
        ]);

        let err = export_reports(&dir, &reports).expect_err("stems collide");
        match err {
            CsvIoError::FileStemCollision { first, second, stem } => {
                assert_eq!(first, "Best Case");
                assert_eq!(second, "Best_Case");
                assert_eq!(stem, "Best_Case");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.exists());
    }
}
