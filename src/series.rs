use crate::models::{AssignmentRecord, ScoreSample};

/// Number of most recent graded assignments considered for the trend.
pub const TREND_WINDOW: usize = 5;

/// Builds the trend window from raw assignments, oldest first.
///
/// Ungraded (`N/A`) and errored submissions are skipped. With fewer than two
/// graded assignments there is no usable series and an empty one is returned.
pub fn build_series(assignments: &[AssignmentRecord]) -> Vec<ScoreSample> {
    let percentages: Vec<f64> = assignments
        .iter()
        .filter_map(AssignmentRecord::percentage)
        .collect();

    if percentages.len() < 2 {
        return Vec::new();
    }

    let start = percentages.len().saturating_sub(TREND_WINDOW);
    percentages[start..]
        .iter()
        .enumerate()
        .map(|(index, percentage)| ScoreSample {
            ordinal: index + 1,
            percentage: *percentage,
        })
        .collect()
}

/// Mean of the window percentages, `None` for an empty window.
pub fn mean_percentage(series: &[ScoreSample]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let total: f64 = series.iter().map(|sample| sample.percentage).sum();
    Some(total / series.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Score;

    fn assignment(name: &str, score: Score, points_possible: f64) -> AssignmentRecord {
        AssignmentRecord {
            name: name.to_string(),
            score,
            points_possible,
        }
    }

    #[test]
    fn keeps_last_five_graded_in_original_order() {
        let assignments: Vec<AssignmentRecord> = (1..=7)
            .map(|i| assignment(&format!("HW {i}"), Score::Points(i as f64), 10.0))
            .collect();

        let series = build_series(&assignments);
        let percentages: Vec<f64> = series.iter().map(|s| s.percentage).collect();
        assert_eq!(percentages, vec![30.0, 40.0, 50.0, 60.0, 70.0]);
        let ordinals: Vec<usize> = series.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn skips_sentinel_scores_before_windowing() {
        let assignments = vec![
            assignment("HW 1", Score::Points(5.0), 10.0),
            assignment("HW 2", Score::NotAvailable, 10.0),
            assignment("HW 3", Score::Points(9.0), 10.0),
            assignment("HW 4", Score::Error, 10.0),
        ];

        let series = build_series(&assignments);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].percentage, 50.0);
        assert_eq!(series[1].percentage, 90.0);
    }

    #[test]
    fn single_graded_assignment_is_insufficient() {
        let assignments = vec![
            assignment("HW 1", Score::Points(5.0), 10.0),
            assignment("HW 2", Score::NotAvailable, 10.0),
        ];
        assert!(build_series(&assignments).is_empty());
        assert!(build_series(&[]).is_empty());
    }

    #[test]
    fn zero_point_assignments_are_not_gradable() {
        let assignments = vec![
            assignment("Survey", Score::Points(1.0), 0.0),
            assignment("HW 1", Score::Points(8.0), 10.0),
        ];
        assert!(build_series(&assignments).is_empty());
    }

    #[test]
    fn mean_of_empty_window_is_none() {
        assert_eq!(mean_percentage(&[]), None);
        let series = vec![
            ScoreSample { ordinal: 1, percentage: 60.0 },
            ScoreSample { ordinal: 2, percentage: 80.0 },
        ];
        assert_eq!(mean_percentage(&series), Some(70.0));
    }
}
