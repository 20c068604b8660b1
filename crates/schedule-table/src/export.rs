use std::io;
use std::path::Path;
use std::str::FromStr;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::columns::{ACTIVITY_ID, ACTIVITY_NAME, FINISH, ORIGINAL_DURATION, START};
use crate::error::ReconstructError;
use crate::model::{LogicalRow, StructuredResult};

pub const EXPORT_FILE_NAME: &str = "schedule_data.csv";

const HIERARCHY_HEADERS: [&str; 5] = [ACTIVITY_ID, ACTIVITY_NAME, "Duration", START, FINISH];
const HIERARCHY_COLUMNS: [&str; 5] = [ACTIVITY_ID, ACTIVITY_NAME, ORIGINAL_DURATION, START, FINISH];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportView {
    /// Every filtered activity under the declared headers.
    #[default]
    Flat,
    /// Each main activity followed by its sub-activities.
    Hierarchy,
}

impl ExportView {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Hierarchy => "hierarchy",
        }
    }
}

impl FromStr for ExportView {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "hierarchy" | "grouped" => Ok(Self::Hierarchy),
            other => Err(format!(
                "unknown view '{other}', expected 'flat' or 'hierarchy'"
            )),
        }
    }
}

fn flat_records(result: &StructuredResult) -> Vec<Vec<String>> {
    let mut records = vec![result.headers.clone()];
    records.extend(result.activities.iter().map(|row| {
        result
            .headers
            .iter()
            .map(|header| row.cell(header).to_string())
            .collect()
    }));
    records
}

fn hierarchy_record(row: &LogicalRow) -> Vec<String> {
    HIERARCHY_COLUMNS
        .iter()
        .map(|column| row.cell(column).to_string())
        .collect()
}

fn hierarchy_records(result: &StructuredResult) -> Vec<Vec<String>> {
    let mut records = vec![HIERARCHY_HEADERS.iter().map(ToString::to_string).collect()];
    for group in result.grouped_activities.values() {
        records.push(hierarchy_record(&group.main));
        records.extend(group.sub_activities.iter().map(hierarchy_record));
    }
    records
}

/// Renders one view as comma separated text with every field quoted.
///
/// Records are separated by `\n` with no trailing newline.
///
/// # Errors
///
/// Returns an error if the CSV writer fails.
pub fn export_csv(result: &StructuredResult, view: ExportView) -> Result<String, ReconstructError> {
    let records = match view {
        ExportView::Flat => flat_records(result),
        ExportView::Hierarchy => hierarchy_records(result),
    };

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::<u8>::new());
    for record in &records {
        writer.write_record(record)?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|error| ReconstructError::Csv(error.into_error().into()))?;
    let mut csv = String::from_utf8(bytes).map_err(|error| {
        ReconstructError::Csv(io::Error::new(io::ErrorKind::InvalidData, error).into())
    })?;
    if csv.ends_with('\n') {
        csv.pop();
    }
    Ok(csv)
}

/// # Errors
///
/// Returns an error if rendering or writing the file fails.
pub fn write_csv(
    path: &Path,
    result: &StructuredResult,
    view: ExportView,
) -> Result<(), ReconstructError> {
    let csv = export_csv(result, view)?;
    std::fs::write(path, csv)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ExportView, export_csv};
    use crate::columns::ColumnLayout;
    use crate::model::LogicalRow;
    use crate::structure::structure_rows;

    fn sample() -> crate::model::StructuredResult {
        let rows: Vec<LogicalRow> = vec![
            [
                ("Activity ID", "101"),
                ("Activity Name", "Design \"Alpha\" Phase"),
                ("Original Duration", "10"),
            ]
            .into_iter()
            .collect(),
            [
                ("Activity ID", " 101.1"),
                ("Activity Name", "Review, sign-off"),
                ("Start", "01-Jan-24 A"),
            ]
            .into_iter()
            .collect(),
        ];
        structure_rows(rows, &ColumnLayout::standard())
    }

    #[test]
    fn quotes_every_field_and_doubles_embedded_quotes() {
        let csv = export_csv(&sample(), ExportView::Flat).expect("export should succeed");
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[0],
            r#""Activity ID","Activity Name","Original Duration","Remaining Duration","Start","Finish""#
        );
        assert_eq!(
            lines[1],
            r#""101","Design ""Alpha"" Phase","10","","","""#
        );
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn hierarchy_view_lists_main_then_subs() {
        let csv = export_csv(&sample(), ExportView::Hierarchy).expect("export should succeed");
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                r#""Activity ID","Activity Name","Duration","Start","Finish""#,
                r#""101","Design ""Alpha"" Phase","10","","""#,
                r#"" 101.1","Review, sign-off","","01-Jan-24 A","""#,
            ]
        );
    }

    #[test]
    fn flat_export_round_trips_cells() {
        let result = sample();
        let csv = export_csv(&result, ExportView::Flat).expect("export should succeed");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(csv.as_bytes());
        let records = reader
            .records()
            .map(|record| {
                record
                    .expect("record should parse")
                    .iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        assert_eq!(records[0], result.headers);
        for (record, row) in records[1..].iter().zip(&result.activities) {
            let expected = result
                .headers
                .iter()
                .map(|header| row.cell(header).to_string())
                .collect::<Vec<_>>();
            assert_eq!(record, &expected);
        }
        assert_eq!(records.len(), result.activities.len() + 1);
    }

    #[test]
    fn naive_split_round_trips_comma_free_cells() {
        let result = sample();
        let csv = export_csv(&result, ExportView::Flat).expect("export should succeed");
        let first_data_line = csv.lines().nth(1).expect("data line");
        let cells = first_data_line
            .split("\",\"")
            .map(|cell| cell.trim_matches('"').replace("\"\"", "\""))
            .collect::<Vec<_>>();
        assert_eq!(cells[0], "101");
        assert_eq!(cells[1], "Design \"Alpha\" Phase");
        assert_eq!(cells[2], "10");
    }

    #[test]
    fn parses_view_names() {
        assert_eq!(ExportView::from_str("Flat"), Ok(ExportView::Flat));
        assert_eq!(ExportView::from_str("hierarchy"), Ok(ExportView::Hierarchy));
        assert!(ExportView::from_str("tree").is_err());
    }
}
