mod columns;
mod error;
mod export;
mod fields;
mod model;
mod options;
mod pdf_reader;
mod row_assemble;
mod row_cluster;
mod structure;
mod warning;

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::row_assemble::assemble_rows;
use crate::row_cluster::cluster_rows;
use crate::structure::structure_rows_reporting;

pub use columns::{
    ACTIVITY_ID, ACTIVITY_NAME, ColumnLayout, ColumnSpec, FINISH, ORIGINAL_DURATION,
    REMAINING_DURATION, START,
};
pub use error::ReconstructError;
pub use export::{EXPORT_FILE_NAME, ExportView, export_csv, write_csv};
pub use fields::{Activity, ScheduleDate, clean_text, parse_date, parse_duration};
pub use model::{ActivityGroup, Fragment, FragmentSource, LogicalRow, StructuredResult, TextItem};
pub use options::{PageSelection, ReconstructOptions};
pub use pdf_reader::PdfFragmentSource;
pub use row_assemble::{AssembledPage, is_row_complete};
pub use row_cluster::VisualRow;
pub use structure::{is_sub_activity_id, is_valid_row, structure_rows};
pub use warning::{ReconstructWarning, WarningCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructionReport {
    pub page_count: usize,
    pub row_count: usize,
    pub activity_count: usize,
    pub group_count: usize,
    pub warnings: Vec<ReconstructWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconstruction {
    pub result: StructuredResult,
    pub report: ReconstructionReport,
}

/// Turns positioned text into the activity table for one column layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutReconstructor {
    layout: ColumnLayout,
}

impl LayoutReconstructor {
    #[must_use]
    pub fn new(layout: ColumnLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn standard() -> Self {
        Self::new(ColumnLayout::standard())
    }

    #[must_use]
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Clusters and assembles a single page.
    #[must_use]
    pub fn reconstruct_page(&self, items: Vec<TextItem>) -> AssembledPage {
        let fragments = items.into_iter().map(Fragment::from).collect();
        assemble_rows(&cluster_rows(fragments), &self.layout)
    }

    #[must_use]
    pub fn structure(&self, rows: Vec<LogicalRow>) -> StructuredResult {
        structure_rows(rows, &self.layout)
    }

    /// Runs every selected page in ascending order and structures the
    /// concatenated rows.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any page cannot be extracted, or if the selection
    /// leaves no pages.
    pub fn reconstruct(
        &self,
        source: &dyn FragmentSource,
        pages: Option<&PageSelection>,
    ) -> Result<Reconstruction, ReconstructError> {
        let mut page_numbers = source
            .page_numbers()
            .into_iter()
            .filter(|page| pages.is_none_or(|selection| selection.contains(*page)))
            .collect::<Vec<_>>();
        page_numbers.sort_unstable();
        page_numbers.dedup();
        if page_numbers.is_empty() {
            return Err(ReconstructError::NoPagesSelected);
        }

        let mut warnings = Vec::new();
        let mut rows = Vec::new();
        for &page in &page_numbers {
            let assembled = self.reconstruct_page(source.page_items(page)?);
            debug!(
                page,
                rows = assembled.rows.len(),
                dropped = assembled.dropped_fragments,
                "assembled page"
            );
            if assembled.dropped_fragments > 0 {
                warnings.push(
                    ReconstructWarning::new(
                        WarningCode::DroppedFragments,
                        "text outside every column band was ignored",
                    )
                    .with_page(page)
                    .with_count(assembled.dropped_fragments),
                );
            }
            rows.extend(assembled.rows);
        }

        let row_count = rows.len();
        let (result, structure_warnings) = structure_rows_reporting(rows, &self.layout);
        warnings.extend(structure_warnings);
        if result.activities.is_empty() {
            warnings.push(ReconstructWarning::new(
                WarningCode::NoActivities,
                "no activity rows were reconstructed from the selected pages",
            ));
        }

        let report = ReconstructionReport {
            page_count: page_numbers.len(),
            row_count,
            activity_count: result.activities.len(),
            group_count: result.grouped_activities.len(),
            warnings,
        };
        debug!(
            pages = report.page_count,
            rows = report.row_count,
            activities = report.activity_count,
            groups = report.group_count,
            "reconstruction finished"
        );

        Ok(Reconstruction { result, report })
    }
}

/// # Errors
///
/// Returns an error when the PDF cannot be loaded or any selected page fails.
pub fn reconstruct_pdf(
    input_pdf: &Path,
    options: &ReconstructOptions,
) -> Result<Reconstruction, ReconstructError> {
    let source = PdfFragmentSource::load(input_pdf)?;
    LayoutReconstructor::new(options.columns.clone()).reconstruct(&source, options.pages.as_ref())
}

/// # Errors
///
/// Returns an error when the bytes are not a readable PDF or any selected
/// page fails.
pub fn reconstruct_pdf_bytes(
    input_pdf: &[u8],
    options: &ReconstructOptions,
) -> Result<Reconstruction, ReconstructError> {
    let source = PdfFragmentSource::load_mem(input_pdf)?;
    LayoutReconstructor::new(options.columns.clone()).reconstruct(&source, options.pages.as_ref())
}

/// Reconstructs `input_pdf` and writes the selected view to `output_csv`.
///
/// # Errors
///
/// Returns an error when reconstruction or writing fails; nothing is written
/// if reconstruction fails.
pub fn export_pdf_to_csv(
    input_pdf: &Path,
    output_csv: &Path,
    options: &ReconstructOptions,
) -> Result<ReconstructionReport, ReconstructError> {
    let Reconstruction { result, report } = reconstruct_pdf(input_pdf, options)?;
    write_csv(output_csv, &result, options.view)?;
    Ok(report)
}

/// # Errors
///
/// Returns an error when reconstruction or rendering fails.
pub fn export_pdf_bytes_to_csv_string(
    input_pdf: &[u8],
    options: &ReconstructOptions,
) -> Result<(String, ReconstructionReport), ReconstructError> {
    let Reconstruction { result, report } = reconstruct_pdf_bytes(input_pdf, options)?;
    let csv = export_csv(&result, options.view)?;
    Ok((csv, report))
}
