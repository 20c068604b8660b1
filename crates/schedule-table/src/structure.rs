use indexmap::IndexMap;
use tracing::warn;

use crate::columns::ColumnLayout;
use crate::model::{ActivityGroup, LogicalRow, StructuredResult};
use crate::warning::{ReconstructWarning, WarningCode};

/// A row is data when it carries an identifier that is not the identifier
/// column's own label, and a name.
#[must_use]
pub fn is_valid_row(row: &LogicalRow, layout: &ColumnLayout) -> bool {
    let id_column = layout.id_column();
    row.get(id_column)
        .is_some_and(|id| !id.is_empty() && !id.contains(id_column))
        && row.has_text(layout.name_column())
}

/// Indented identifiers mark sub-activities.
#[must_use]
pub fn is_sub_activity_id(id: &str) -> bool {
    id.starts_with(' ')
}

#[derive(Debug, Default)]
struct GroupingState {
    open: Option<String>,
    groups: IndexMap<String, ActivityGroup>,
    warnings: Vec<ReconstructWarning>,
}

impl GroupingState {
    fn absorb(mut self, row: &LogicalRow, layout: &ColumnLayout) -> Self {
        let id = row.cell(layout.id_column());

        if !is_sub_activity_id(id) {
            let group = ActivityGroup {
                main: row.clone(),
                sub_activities: Vec::new(),
            };
            if self.groups.insert(id.to_string(), group).is_some() {
                self.warnings.push(
                    ReconstructWarning::new(
                        WarningCode::DuplicateActivityId,
                        "activity id seen twice; the later group replaces the earlier one",
                    )
                    .with_activity_id(id),
                );
            }
            self.open = Some(id.to_string());
            return self;
        }

        match self
            .open
            .as_ref()
            .and_then(|key| self.groups.get_mut(key))
        {
            Some(group) => group.sub_activities.push(row.clone()),
            None => {
                warn!(activity_id = id, "dropping sub-activity with no open group");
                self.warnings.push(
                    ReconstructWarning::new(
                        WarningCode::OrphanSubActivity,
                        "sub-activity appeared before any main activity",
                    )
                    .with_activity_id(id),
                );
            }
        }
        self
    }
}

pub(crate) fn structure_rows_reporting(
    rows: Vec<LogicalRow>,
    layout: &ColumnLayout,
) -> (StructuredResult, Vec<ReconstructWarning>) {
    let activities = rows
        .into_iter()
        .filter(|row| is_valid_row(row, layout))
        .collect::<Vec<_>>();

    let state = activities
        .iter()
        .fold(GroupingState::default(), |state, row| state.absorb(row, layout));

    let result = StructuredResult {
        headers: layout.names(),
        activities,
        grouped_activities: state.groups,
    };
    (result, state.warnings)
}

/// Drops non-data rows and groups the rest into main activities with their
/// following sub-activities.
#[must_use]
pub fn structure_rows(rows: Vec<LogicalRow>, layout: &ColumnLayout) -> StructuredResult {
    structure_rows_reporting(rows, layout).0
}
