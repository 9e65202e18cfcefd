use serde::Serialize;

use crate::models::{RiskLevel, Score};

/// Scores of one student as seen from the instructor gradebook.
#[derive(Debug, Clone)]
pub struct StudentScores {
    pub name: String,
    pub scores: Vec<Score>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassOverview {
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub average_score: f64,
}

pub fn average_score(scores: &[Score]) -> f64 {
    let graded: Vec<f64> = scores.iter().filter_map(Score::points).collect();
    if graded.is_empty() {
        return 0.0;
    }
    graded.iter().sum::<f64>() / graded.len() as f64
}

/// Coarse gradebook banding used for the class overview.
pub fn risk_factor(average: f64) -> RiskLevel {
    if average < 50.0 {
        RiskLevel::High
    } else if average < 70.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn class_overview(students: &[StudentScores]) -> ClassOverview {
    let mut overview = ClassOverview {
        high_risk: 0,
        medium_risk: 0,
        low_risk: 0,
        average_score: 0.0,
    };
    let mut total = 0.0;

    for student in students {
        let average = average_score(&student.scores);
        match risk_factor(average) {
            RiskLevel::High => overview.high_risk += 1,
            RiskLevel::Medium => overview.medium_risk += 1,
            RiskLevel::Low => overview.low_risk += 1,
        }
        total += average;
    }

    if !students.is_empty() {
        overview.average_score = total / students.len() as f64;
    }
    overview
}
