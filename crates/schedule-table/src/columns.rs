use std::str::FromStr;

use crate::error::ReconstructError;

pub const ACTIVITY_ID: &str = "Activity ID";
pub const ACTIVITY_NAME: &str = "Activity Name";
pub const ORIGINAL_DURATION: &str = "Original Duration";
pub const REMAINING_DURATION: &str = "Remaining Duration";
pub const START: &str = "Start";
pub const FINISH: &str = "Finish";

/// A named horizontal band `[start_x, end_x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub start_x: f32,
    pub end_x: f32,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, start_x: f32, end_x: f32) -> Self {
        Self {
            name: name.into(),
            start_x,
            end_x,
        }
    }

    #[must_use]
    pub fn contains(&self, x: f32) -> bool {
        x >= self.start_x && x < self.end_x
    }
}

impl FromStr for ColumnSpec {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (name, range) = spec
            .rsplit_once(':')
            .ok_or_else(|| format!("invalid column '{spec}', expected name:start-end"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err("column name cannot be empty".to_string());
        }

        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| format!("invalid column range '{range}', expected start-end"))?;
        let start_x: f32 = start
            .trim()
            .parse()
            .map_err(|_| format!("invalid column start: '{start}'"))?;
        let end_x: f32 = end
            .trim()
            .parse()
            .map_err(|_| format!("invalid column end: '{end}'"))?;

        if end_x <= start_x {
            return Err(format!("column '{name}' requires end > start"));
        }

        Ok(Self::new(name, start_x, end_x))
    }
}

/// Ordered, non-overlapping column bands plus the two columns the structuring
/// rules key on.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    columns: Vec<ColumnSpec>,
    id_column: String,
    name_column: String,
}

impl ColumnLayout {
    /// Builds a layout keyed on the standard `Activity ID` / `Activity Name`
    /// columns.
    ///
    /// # Errors
    ///
    /// Fails when a band is empty or inverted, names repeat, bands overlap, or
    /// a key column is missing.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, ReconstructError> {
        Self::with_key_columns(columns, ACTIVITY_ID, ACTIVITY_NAME)
    }

    /// # Errors
    ///
    /// Same conditions as [`ColumnLayout::new`].
    pub fn with_key_columns(
        columns: Vec<ColumnSpec>,
        id_column: &str,
        name_column: &str,
    ) -> Result<Self, ReconstructError> {
        if columns.is_empty() {
            return Err(ReconstructError::InvalidColumnLayout(
                "at least one column is required".to_string(),
            ));
        }

        for column in &columns {
            if !(column.start_x.is_finite() && column.end_x.is_finite())
                || column.end_x <= column.start_x
            {
                return Err(ReconstructError::InvalidColumnLayout(format!(
                    "column '{}' has an empty band [{}, {})",
                    column.name, column.start_x, column.end_x
                )));
            }
        }

        for (index, column) in columns.iter().enumerate() {
            for other in &columns[index + 1..] {
                if column.name == other.name {
                    return Err(ReconstructError::InvalidColumnLayout(format!(
                        "column '{}' is declared twice",
                        column.name
                    )));
                }
                if column.start_x < other.end_x && other.start_x < column.end_x {
                    return Err(ReconstructError::InvalidColumnLayout(format!(
                        "columns '{}' and '{}' overlap",
                        column.name, other.name
                    )));
                }
            }
        }

        for key in [id_column, name_column] {
            if !columns.iter().any(|column| column.name == key) {
                return Err(ReconstructError::InvalidColumnLayout(format!(
                    "key column '{key}' is not declared"
                )));
            }
        }

        Ok(Self {
            columns,
            id_column: id_column.to_string(),
            name_column: name_column.to_string(),
        })
    }

    /// The six-band activity report layout.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new(ACTIVITY_ID, 0.0, 100.0),
                ColumnSpec::new(ACTIVITY_NAME, 100.0, 300.0),
                ColumnSpec::new(ORIGINAL_DURATION, 300.0, 400.0),
                ColumnSpec::new(REMAINING_DURATION, 400.0, 500.0),
                ColumnSpec::new(START, 500.0, 600.0),
                ColumnSpec::new(FINISH, 600.0, 700.0),
            ],
            id_column: ACTIVITY_ID.to_string(),
            name_column: ACTIVITY_NAME.to_string(),
        }
    }

    /// Band containing `x`, if any.
    #[must_use]
    pub fn find_column(&self, x: f32) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.contains(x))
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    #[must_use]
    pub fn name_column(&self) -> &str {
        &self.name_column
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ACTIVITY_ID, ACTIVITY_NAME, ColumnLayout, ColumnSpec};

    #[test]
    fn finds_column_on_half_open_bounds() {
        let layout = ColumnLayout::standard();
        assert_eq!(
            layout.find_column(0.0).map(|c| c.name.as_str()),
            Some(ACTIVITY_ID)
        );
        assert_eq!(
            layout.find_column(99.99).map(|c| c.name.as_str()),
            Some(ACTIVITY_ID)
        );
        assert_eq!(
            layout.find_column(100.0).map(|c| c.name.as_str()),
            Some(ACTIVITY_NAME)
        );
        assert_eq!(
            layout.find_column(699.9).map(|c| c.name.as_str()),
            Some("Finish")
        );
    }

    #[test]
    fn positions_outside_every_band_have_no_column() {
        let layout = ColumnLayout::standard();
        assert!(layout.find_column(-0.5).is_none());
        assert!(layout.find_column(700.0).is_none());
        assert!(layout.find_column(f32::NAN).is_none());
    }

    #[test]
    fn assignment_is_unique_for_disjoint_bands() {
        let layout = ColumnLayout::standard();
        for step in 0..1500 {
            let x = step as f32 * 0.5 - 20.0;
            let matches = layout
                .columns()
                .iter()
                .filter(|column| column.contains(x))
                .count();
            assert!(matches <= 1, "x={x} matched {matches} bands");
            assert_eq!(matches == 1, layout.find_column(x).is_some());
        }
    }

    #[test]
    fn rejects_overlapping_bands() {
        let err = ColumnLayout::new(vec![
            ColumnSpec::new(ACTIVITY_ID, 0.0, 120.0),
            ColumnSpec::new(ACTIVITY_NAME, 100.0, 300.0),
        ])
        .expect_err("overlap should fail");
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn rejects_layout_without_key_columns() {
        let err = ColumnLayout::new(vec![ColumnSpec::new("Code", 0.0, 50.0)])
            .expect_err("missing key columns should fail");
        assert!(err.to_string().contains("Activity ID"));
    }

    #[test]
    fn accepts_adjacent_bands_with_custom_keys() {
        let layout = ColumnLayout::with_key_columns(
            vec![
                ColumnSpec::new("Code", 0.0, 50.0),
                ColumnSpec::new("Task", 50.0, 250.0),
            ],
            "Code",
            "Task",
        )
        .expect("adjacent bands are valid");
        assert_eq!(layout.id_column(), "Code");
        assert_eq!(layout.names(), vec!["Code", "Task"]);
    }

    #[test]
    fn parses_column_spec() {
        let spec = ColumnSpec::from_str("Activity ID:0-100").expect("column should parse");
        assert_eq!(spec, ColumnSpec::new(ACTIVITY_ID, 0.0, 100.0));
    }

    #[test]
    fn rejects_inverted_column_spec() {
        let err = ColumnSpec::from_str("Start:600-500").expect_err("inverted range should fail");
        assert!(err.contains("end > start"));
    }
}
