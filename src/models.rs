use std::fmt;

use serde::{Deserialize, Serialize};

/// Score cell of an assignment as reported by the LMS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawScore", into = "RawScore")]
pub enum Score {
    Points(f64),
    NotAvailable,
    Error,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

impl From<RawScore> for Score {
    fn from(raw: RawScore) -> Self {
        match raw {
            RawScore::Number(value) => Score::from_points(value),
            RawScore::Text(text) => Score::parse(&text),
        }
    }
}

impl From<Score> for RawScore {
    fn from(score: Score) -> Self {
        match score {
            Score::Points(value) => RawScore::Number(value),
            Score::NotAvailable => RawScore::Text("N/A".to_string()),
            Score::Error => RawScore::Text("Error".to_string()),
        }
    }
}

impl Score {
    /// Parses the textual score column. Anything that is neither a number nor
    /// `N/A` is treated as an errored submission.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("n/a") || trimmed.is_empty() {
            return Score::NotAvailable;
        }
        trimmed
            .parse::<f64>()
            .map(Score::from_points)
            .unwrap_or(Score::Error)
    }

    fn from_points(value: f64) -> Self {
        if value.is_finite() {
            Score::Points(value)
        } else {
            Score::Error
        }
    }

    pub fn points(&self) -> Option<f64> {
        match self {
            Score::Points(value) => Some(*value),
            Score::NotAvailable | Score::Error => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub name: String,
    pub score: Score,
    pub points_possible: f64,
}

impl AssignmentRecord {
    /// Percentage grade, defined only for numeric scores on a gradable assignment.
    pub fn percentage(&self) -> Option<f64> {
        let points = self.score.points()?;
        if self.points_possible <= 0.0 {
            return None;
        }
        Some(points / self.points_possible * 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSample {
    pub ordinal: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskInputs {
    pub rps: f64,
    pub cgs: f64,
    pub gts: f64,
    pub current_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            RiskLevel::Low => Tier::Low,
            RiskLevel::Medium => Tier::Medium,
            RiskLevel::High => Tier::High,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercase key used to look up support videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }

    /// Accepts both `"medium"` and the display form `"Medium Risk"`.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase();
        let normalized = lowered.trim_end_matches("risk").trim();
        match normalized {
            "low" => Some(Tier::Low),
            "medium" => Some(Tier::Medium),
            "high" => Some(Tier::High),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub risk_index: Option<f64>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub title: String,
    pub channel: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub topic: String,
    pub quiz_name: Option<String>,
}

impl VideoCandidate {
    /// Key under which the watched flag for this video is stored.
    pub fn video_id(&self) -> String {
        if let Some(id) = crate::catalog::youtube_id(&self.url) {
            return id.to_string();
        }
        self.url
            .split("v=")
            .nth(1)
            .map(|rest| rest.split('&').next().unwrap_or(rest).to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub video: VideoCandidate,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskToggleState {
    pub course_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRole {
    Instructor,
    Student,
}

impl ParticipantRole {
    /// Maps an LMS enrollment type onto a participant role.
    pub fn from_enrollment(kind: &str) -> Option<Self> {
        match kind {
            "TeacherEnrollment" | "TaEnrollment" => Some(ParticipantRole::Instructor),
            "StudentEnrollment" => Some(ParticipantRole::Student),
            _ => None,
        }
    }

    pub fn enrollment_type(&self) -> &'static str {
        match self {
            ParticipantRole::Instructor => "TeacherEnrollment",
            ParticipantRole::Student => "StudentEnrollment",
        }
    }
}

/// Enrollment row supplied by the grades collaborator.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub user_id: String,
    pub full_name: String,
    pub role: Option<ParticipantRole>,
    pub current_score: Option<String>,
}
