use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{RiskAssessment, RiskLevel};
use crate::overview::ClassOverview;

#[derive(Debug, Clone)]
pub struct StudentSummary {
    pub name: String,
    pub assessment: RiskAssessment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSummary {
    pub level: RiskLevel,
    pub count: usize,
    pub avg_index: Option<f64>,
}

pub fn summarize_by_level(students: &[StudentSummary]) -> Vec<LevelSummary> {
    let mut map: HashMap<RiskLevel, (usize, f64, usize)> = HashMap::new();

    for student in students {
        let entry = map
            .entry(student.assessment.risk_level)
            .or_insert((0, 0.0, 0));
        entry.0 += 1;
        if let Some(index) = student.assessment.risk_index {
            entry.1 += index;
            entry.2 += 1;
        }
    }

    let mut summaries: Vec<LevelSummary> = map
        .into_iter()
        .map(|(level, (count, total_index, indexed))| LevelSummary {
            level,
            count,
            avg_index: (indexed > 0).then(|| total_index / indexed as f64),
        })
        .collect();

    summaries.sort_by_key(|summary| severity_rank(summary.level));
    summaries
}

fn severity_rank(level: RiskLevel) -> u8 {
    match level {
        RiskLevel::High => 0,
        RiskLevel::Medium => 1,
        RiskLevel::Low => 2,
    }
}

pub fn build_report(
    course_id: &str,
    generated_on: NaiveDate,
    risk_visible: bool,
    students: &[StudentSummary],
    overview: &ClassOverview,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Course Risk Report");
    let _ = writeln!(output, "Generated for course {} on {}", course_id, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Gradebook Overview");
    let _ = writeln!(output, "- Class average: {:.1}%", overview.average_score);
    let _ = writeln!(
        output,
        "- Gradebook bands: {} high, {} medium, {} low",
        overview.high_risk, overview.medium_risk, overview.low_risk
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Levels");

    if !risk_visible {
        let _ = writeln!(output, "Risk analysis is disabled for this course.");
        return output;
    }

    let summaries = summarize_by_level(students);
    if summaries.is_empty() {
        let _ = writeln!(output, "No students enrolled.");
        return output;
    }

    for summary in summaries.iter() {
        match summary.avg_index {
            Some(avg) => {
                let _ = writeln!(
                    output,
                    "- {}: {} students (avg index {:.1})",
                    summary.level, summary.count, avg
                );
            }
            None => {
                let _ = writeln!(output, "- {}: {} students", summary.level, summary.count);
            }
        }
    }

    let mut ranked: Vec<&StudentSummary> = students.iter().collect();
    ranked.sort_by(|a, b| {
        severity_rank(a.assessment.risk_level)
            .cmp(&severity_rank(b.assessment.risk_level))
            .then_with(|| {
                let a_index = a.assessment.risk_index.unwrap_or(f64::INFINITY);
                let b_index = b.assessment.risk_index.unwrap_or(f64::INFINITY);
                a_index
                    .partial_cmp(&b_index)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");
    for student in ranked.iter().take(10) {
        match student.assessment.risk_index {
            Some(index) => {
                let _ = writeln!(
                    output,
                    "- {}: {} (index {:.1})",
                    student.name, student.assessment.risk_level, index
                );
            }
            None => {
                let _ = writeln!(
                    output,
                    "- {}: {} (grade unavailable)",
                    student.name, student.assessment.risk_level
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, level: RiskLevel, index: Option<f64>) -> StudentSummary {
        StudentSummary {
            name: name.to_string(),
            assessment: RiskAssessment {
                risk_index: index,
                risk_level: level,
            },
        }
    }

    fn overview() -> ClassOverview {
        ClassOverview {
            high_risk: 1,
            medium_risk: 1,
            low_risk: 1,
            average_score: 71.25,
        }
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        let students = vec![
            student("Avery", RiskLevel::Low, Some(82.0)),
            student("Jules", RiskLevel::High, Some(55.0)),
            student("Kiara", RiskLevel::Medium, None),
            student("Rowan", RiskLevel::High, Some(45.0)),
        ];
        let summaries = summarize_by_level(&students);
        assert_eq!(summaries[0].level, RiskLevel::High);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].avg_index, Some(50.0));
        assert_eq!(summaries[1].avg_index, None);
        assert_eq!(summaries[2].level, RiskLevel::Low);
    }

    #[test]
    fn report_lists_highest_risk_first() {
        let students = vec![
            student("Avery", RiskLevel::Low, Some(82.0)),
            student("Jules", RiskLevel::High, Some(55.0)),
            student("Rowan", RiskLevel::High, Some(45.0)),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        let report = build_report("101", date, true, &students, &overview());

        assert!(report.contains("Generated for course 101 on 2026-02-02"));
        assert!(report.contains("- Class average: 71.2%") || report.contains("- Class average: 71.3%"));
        let rowan = report.find("- Rowan: High Risk").unwrap();
        let jules = report.find("- Jules: High Risk").unwrap();
        let avery = report.find("- Avery: Low Risk").unwrap();
        assert!(rowan < jules && jules < avery);
    }

    #[test]
    fn disabled_course_hides_levels() {
        let students = vec![student("Jules", RiskLevel::High, Some(55.0))];
        let date = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        let report = build_report("101", date, false, &students, &overview());
        assert!(report.contains("Risk analysis is disabled for this course."));
        assert!(!report.contains("Jules"));
    }
}
