use std::collections::BTreeMap;

use crate::model::Fragment;

/// Fragments sharing one rounded vertical position, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualRow {
    pub y: i64,
    pub fragments: Vec<Fragment>,
}

#[allow(clippy::cast_possible_truncation)]
fn quantize(y: f32) -> i64 {
    // `as` saturates at the i64 bounds and maps NaN to 0.
    y.round() as i64
}

/// Groups one page's fragments into visual rows, top of page first.
///
/// PDF y grows upward, so rows are emitted by descending rounded y. Two
/// fragments on the same printed line whose y rounds differently end up in
/// separate rows.
#[must_use]
pub fn cluster_rows(fragments: Vec<Fragment>) -> Vec<VisualRow> {
    let mut clusters: BTreeMap<i64, Vec<Fragment>> = BTreeMap::new();
    for fragment in fragments {
        clusters
            .entry(quantize(fragment.y))
            .or_default()
            .push(fragment);
    }

    clusters
        .into_iter()
        .rev()
        .map(|(y, mut fragments)| {
            fragments.sort_by(|left, right| {
                left.x
                    .total_cmp(&right.x)
                    .then_with(|| left.text.cmp(&right.text))
            });
            VisualRow { y, fragments }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{VisualRow, cluster_rows};
    use crate::model::Fragment;

    fn texts(rows: &[VisualRow]) -> Vec<Vec<&str>> {
        rows.iter()
            .map(|row| row.fragments.iter().map(|f| f.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn empty_page_yields_no_rows() {
        assert!(cluster_rows(Vec::new()).is_empty());
    }

    #[test]
    fn orders_rows_top_down_and_fragments_left_to_right() {
        let rows = cluster_rows(vec![
            Fragment::new("b2", 150.0, 680.0, 10.0),
            Fragment::new("a1", 10.0, 700.0, 10.0),
            Fragment::new("a2", 150.0, 700.2, 10.0),
            Fragment::new("b1", 10.0, 679.8, 10.0),
        ]);

        assert_eq!(rows.iter().map(|row| row.y).collect::<Vec<_>>(), vec![700, 680]);
        assert_eq!(texts(&rows), vec![vec!["a1", "a2"], vec!["b1", "b2"]]);
    }

    #[test]
    fn rounding_boundary_splits_visually_aligned_fragments() {
        let rows = cluster_rows(vec![
            Fragment::new("left", 10.0, 700.49, 10.0),
            Fragment::new("right", 150.0, 700.5, 10.0),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].y, 701);
        assert_eq!(rows[1].y, 700);
        assert_eq!(texts(&rows), vec![vec!["right"], vec!["left"]]);
    }

    #[test]
    fn rounding_absorbs_sub_pixel_jitter() {
        let rows = cluster_rows(vec![
            Fragment::new("a", 10.0, 699.6, 10.0),
            Fragment::new("b", 120.0, 700.4, 10.0),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].y, 700);
    }

    #[test]
    fn clustering_is_independent_of_input_order() {
        let fragments = vec![
            Fragment::new("101", 10.0, 700.1, 12.0),
            Fragment::new("Design", 150.0, 699.9, 30.0),
            Fragment::new("10", 320.0, 700.0, 8.0),
            Fragment::new("102", 10.0, 688.0, 12.0),
            Fragment::new("Build", 150.0, 687.6, 24.0),
            Fragment::new("Phase", 185.0, 700.3, 24.0),
            Fragment::new("footer", 40.0, 20.0, 30.0),
        ];
        let expected = cluster_rows(fragments.clone());

        let mut reversed = fragments.clone();
        reversed.reverse();
        assert_eq!(cluster_rows(reversed), expected);

        for shift in 1..fragments.len() {
            let mut rotated = fragments.clone();
            rotated.rotate_left(shift);
            assert_eq!(cluster_rows(rotated), expected, "rotation by {shift}");
        }
    }
}
