use crate::columns::ColumnLayout;
use crate::model::LogicalRow;
use crate::row_cluster::VisualRow;

/// Closed rows of one page plus the number of fragments that fell outside
/// every column band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledPage {
    pub rows: Vec<LogicalRow>,
    pub dropped_fragments: usize,
}

#[derive(Debug, Default)]
struct AssemblyState {
    in_progress: LogicalRow,
    emitted: Vec<LogicalRow>,
    dropped: usize,
}

impl AssemblyState {
    fn absorb(mut self, row: &VisualRow, layout: &ColumnLayout) -> Self {
        for fragment in &row.fragments {
            match layout.find_column(fragment.x) {
                Some(column) => self.in_progress.push_text(&column.name, &fragment.text),
                None => self.dropped += 1,
            }
        }

        if is_row_complete(&self.in_progress, layout) {
            self.emitted.push(std::mem::take(&mut self.in_progress));
        }
        self
    }
}

/// A row closes once it has an identifier and any other column.
///
/// This is a layout heuristic: two short records without a wrapped line in
/// between may still be merged into one.
#[must_use]
pub fn is_row_complete(row: &LogicalRow, layout: &ColumnLayout) -> bool {
    row.has_text(layout.id_column()) && row.len() > 1
}

/// Folds visual rows into closed logical rows.
///
/// Text from consecutive visual rows keeps accumulating until the row is
/// complete; whatever is still open when the page ends is discarded.
#[must_use]
pub fn assemble_rows(rows: &[VisualRow], layout: &ColumnLayout) -> AssembledPage {
    let state = rows
        .iter()
        .fold(AssemblyState::default(), |state, row| state.absorb(row, layout));

    AssembledPage {
        rows: state.emitted,
        dropped_fragments: state.dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::{assemble_rows, is_row_complete};
    use crate::columns::ColumnLayout;
    use crate::model::{Fragment, LogicalRow};
    use crate::row_cluster::{VisualRow, cluster_rows};

    fn visual_row(y: i64, cells: &[(&str, f32)]) -> VisualRow {
        VisualRow {
            y,
            fragments: cells
                .iter()
                .map(|(text, x)| Fragment::new(*text, *x, y as f32, 10.0))
                .collect(),
        }
    }

    #[test]
    fn assembles_single_visual_row() {
        let rows = cluster_rows(vec![
            Fragment::new("101", 10.0, 700.0, 15.0),
            Fragment::new("Design Phase", 150.0, 700.0, 60.0),
            Fragment::new("10", 320.0, 700.0, 10.0),
        ]);

        let page = assemble_rows(&rows, &ColumnLayout::standard());
        let expected: LogicalRow = [
            ("Activity ID", "101"),
            ("Activity Name", "Design Phase"),
            ("Original Duration", "10"),
        ]
        .into_iter()
        .collect();
        assert_eq!(page.rows, vec![expected]);
        assert_eq!(page.dropped_fragments, 0);
    }

    #[test]
    fn wrapped_name_before_identifier_is_merged() {
        let rows = vec![
            visual_row(700, &[("Long activity", 150.0)]),
            visual_row(690, &[("A100", 10.0), ("name", 150.0), ("5", 320.0)]),
        ];

        let page = assemble_rows(&rows, &ColumnLayout::standard());
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].get("Activity Name"), Some("Long activity name"));
        assert_eq!(page.rows[0].get("Activity ID"), Some("A100"));
    }

    #[test]
    fn fragments_outside_bands_are_counted_and_dropped() {
        let rows = vec![visual_row(
            700,
            &[("101", 10.0), ("Task", 150.0), ("margin", 720.0), ("gutter", -4.0)],
        )];

        let page = assemble_rows(&rows, &ColumnLayout::standard());
        assert_eq!(page.dropped_fragments, 2);
        assert_eq!(page.rows[0].len(), 2);
    }

    #[test]
    fn identifier_alone_keeps_row_open() {
        let rows = vec![
            visual_row(700, &[("101", 10.0)]),
            visual_row(690, &[("Follow up", 150.0)]),
        ];

        let page = assemble_rows(&rows, &ColumnLayout::standard());
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].get("Activity ID"), Some("101"));
        assert_eq!(page.rows[0].get("Activity Name"), Some("Follow up"));
    }

    #[test]
    fn trailing_incomplete_row_is_discarded() {
        let rows = vec![
            visual_row(700, &[("101", 10.0), ("Task", 150.0)]),
            visual_row(20, &[("Page 1 of 3", 150.0)]),
        ];

        let page = assemble_rows(&rows, &ColumnLayout::standard());
        assert_eq!(page.rows.len(), 1);
    }

    #[test]
    fn completion_requires_non_empty_identifier() {
        let layout = ColumnLayout::standard();
        let empty_id: LogicalRow = [("Activity ID", ""), ("Activity Name", "x")]
            .into_iter()
            .collect();
        let no_other: LogicalRow = [("Activity ID", "1")].into_iter().collect();
        let complete: LogicalRow = [("Activity ID", "1"), ("Finish", "")]
            .into_iter()
            .collect();

        assert!(!is_row_complete(&empty_id, &layout));
        assert!(!is_row_complete(&no_other, &layout));
        assert!(is_row_complete(&complete, &layout));
    }
}
