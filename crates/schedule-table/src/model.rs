use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ReconstructError;

/// One positioned run of text as produced by an extraction backend.
///
/// `transform` is the 6-element affine matrix `[a, b, c, d, e, f]`; only the
/// translation part (`e`, `f`) is used for layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub transform: [f32; 6],
    pub width: f32,
}

impl TextItem {
    #[must_use]
    pub fn at(text: impl Into<String>, x: f32, y: f32, width: f32) -> Self {
        Self {
            text: text.into(),
            transform: [1.0, 0.0, 0.0, 1.0, x, y],
            width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

impl Fragment {
    #[must_use]
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
        }
    }
}

impl From<TextItem> for Fragment {
    fn from(item: TextItem) -> Self {
        Self {
            text: item.text,
            x: item.transform[4],
            y: item.transform[5],
            width: item.width,
        }
    }
}

/// Per-page supplier of text items.
///
/// Pages are identified by their 1-based number. A failing page aborts the
/// whole reconstruction.
pub trait FragmentSource {
    /// Page numbers available in the document, ascending.
    fn page_numbers(&self) -> Vec<u32>;

    /// # Errors
    ///
    /// Returns an error when the page cannot be decoded.
    fn page_items(&self, page_number: u32) -> Result<Vec<TextItem>, ReconstructError>;
}

/// In-memory pages, index 0 is page 1.
impl FragmentSource for Vec<Vec<TextItem>> {
    fn page_numbers(&self) -> Vec<u32> {
        (1..=self.len())
            .filter_map(|page| u32::try_from(page).ok())
            .collect()
    }

    fn page_items(&self, page_number: u32) -> Result<Vec<TextItem>, ReconstructError> {
        usize::try_from(page_number)
            .ok()
            .and_then(|page| page.checked_sub(1))
            .and_then(|index| self.get(index))
            .cloned()
            .ok_or_else(|| ReconstructError::PageDecode {
                page: page_number,
                message: "page does not exist".to_string(),
            })
    }
}

/// One assembled table record, keyed by column name in first-populated order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LogicalRow {
    cells: IndexMap<String, String>,
}

impl LogicalRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an unpopulated column, otherwise appends after a single space.
    pub fn push_text(&mut self, column: &str, text: &str) {
        match self.cells.get_mut(column) {
            Some(existing) if !existing.is_empty() => {
                existing.push(' ');
                existing.push_str(text);
            }
            Some(existing) => text.clone_into(existing),
            None => {
                self.cells.insert(column.to_string(), text.to_string());
            }
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Value of `column`, empty when the column was never populated.
    #[must_use]
    pub fn cell(&self, column: &str) -> &str {
        self.get(column).unwrap_or_default()
    }

    #[must_use]
    pub fn has_text(&self, column: &str) -> bool {
        self.get(column).is_some_and(|value| !value.is_empty())
    }

    /// Number of columns that received at least one fragment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells
            .iter()
            .map(|(column, value)| (column.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for LogicalRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityGroup {
    pub main: LogicalRow,
    pub sub_activities: Vec<LogicalRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResult {
    pub headers: Vec<String>,
    pub activities: Vec<LogicalRow>,
    pub grouped_activities: IndexMap<String, ActivityGroup>,
}

#[cfg(test)]
mod tests {
    use super::{Fragment, FragmentSource, LogicalRow, TextItem};

    #[test]
    fn fragment_reads_translation_from_transform() {
        let item = TextItem {
            text: "101".to_string(),
            transform: [9.0, 0.0, 0.0, 9.0, 12.5, 700.25],
            width: 14.0,
        };
        let fragment = Fragment::from(item);
        assert_eq!(fragment.x, 12.5);
        assert_eq!(fragment.y, 700.25);
        assert_eq!(fragment.width, 14.0);
    }

    #[test]
    fn push_text_appends_with_single_space() {
        let mut row = LogicalRow::new();
        row.push_text("Activity Name", "Design");
        row.push_text("Activity Name", "Phase");
        assert_eq!(row.get("Activity Name"), Some("Design Phase"));
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn push_text_overwrites_empty_cell() {
        let mut row = LogicalRow::new();
        row.push_text("Start", "");
        row.push_text("Start", "01-Jan-24");
        assert_eq!(row.get("Start"), Some("01-Jan-24"));
    }

    #[test]
    fn serializes_as_object_in_insertion_order() {
        let row: LogicalRow = [("Activity ID", "101"), ("Activity Name", "Design")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&row).expect("row should serialize");
        assert_eq!(json, r#"{"Activity ID":"101","Activity Name":"Design"}"#);
    }

    #[test]
    fn in_memory_pages_are_one_based() {
        let pages = vec![vec![TextItem::at("a", 1.0, 2.0, 3.0)], Vec::new()];
        assert_eq!(pages.page_numbers(), vec![1, 2]);
        assert_eq!(pages.page_items(1).expect("page 1").len(), 1);
        assert!(pages.page_items(0).is_err());
        assert!(pages.page_items(3).is_err());
    }
}
