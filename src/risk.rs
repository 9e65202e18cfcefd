use serde::Serialize;
use tracing::debug;

use crate::models::{AssignmentRecord, RiskAssessment, RiskInputs, RiskLevel, ScoreSample};
use crate::series::{build_series, mean_percentage};
use crate::trend::{estimate_trend, Trend};

pub const RPS_WEIGHT: f64 = 0.30;
pub const CGS_WEIGHT: f64 = 0.55;
pub const GTS_WEIGHT: f64 = 0.15;

pub const LOW_RISK_FLOOR: f64 = 75.0;
pub const PASSING_FLOOR: f64 = 69.0;
pub const STRONG_GROWTH: f64 = 75.0;

/// Everything computed for one student, kept for display and debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRiskReport {
    pub series: Vec<ScoreSample>,
    pub trend: Trend,
    pub inputs: Option<RiskInputs>,
    pub assessment: RiskAssessment,
}

pub fn risk_index(rps: f64, cgs: f64, gts: f64) -> f64 {
    RPS_WEIGHT * rps + CGS_WEIGHT * cgs + GTS_WEIGHT * gts
}

/// Classifies a student from the weighted components.
///
/// A non-numeric `current_score` (NaN or infinite) yields Medium with no index.
/// A failing grade paired with strong recent growth is softened to Medium.
pub fn assess_risk(rps: f64, cgs: f64, gts: f64, current_score: f64) -> RiskAssessment {
    if !current_score.is_finite() {
        return RiskAssessment {
            risk_index: None,
            risk_level: RiskLevel::Medium,
        };
    }

    let index = risk_index(rps, cgs, gts);
    let risk_level = if current_score < PASSING_FLOOR && gts > STRONG_GROWTH {
        RiskLevel::Medium
    } else if index >= LOW_RISK_FLOOR {
        RiskLevel::Low
    } else if index >= PASSING_FLOOR {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    RiskAssessment {
        risk_index: Some(index),
        risk_level,
    }
}

impl RiskInputs {
    pub fn assess(&self) -> RiskAssessment {
        assess_risk(self.rps, self.cgs, self.gts, self.current_score)
    }
}

/// Runs the whole pipeline for one student: series, trend, weighting, level.
pub fn assess_student(
    assignments: &[AssignmentRecord],
    current_score: Option<f64>,
) -> StudentRiskReport {
    let series = build_series(assignments);
    let trend = estimate_trend(&series);

    let Some(current) = current_score.filter(|score| score.is_finite()) else {
        debug!(samples = series.len(), "current grade unavailable, using fallback level");
        return StudentRiskReport {
            series,
            trend,
            inputs: None,
            assessment: RiskAssessment {
                risk_index: None,
                risk_level: RiskLevel::Medium,
            },
        };
    };

    let inputs = RiskInputs {
        rps: mean_percentage(&series).unwrap_or(current),
        cgs: current,
        gts: trend.normalized,
        current_score: current,
    };
    debug!(
        rps = inputs.rps,
        cgs = inputs.cgs,
        gts = inputs.gts,
        slope = trend.slope,
        "risk inputs"
    );

    StudentRiskReport {
        assessment: inputs.assess(),
        series,
        trend,
        inputs: Some(inputs),
    }
}

/// Reads a grade field such as `"82.5"` or `"82.5%"` using its leading number.
pub fn parse_current_score(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| {
            !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0))
        })
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());

    let mut candidate = &trimmed[..end];
    while !candidate.is_empty() {
        if let Ok(value) = candidate.parse::<f64>() {
            return Some(value).filter(|v| v.is_finite());
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    None
}
