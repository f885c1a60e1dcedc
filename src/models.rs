use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub roll_number: String,
    pub name: String,
    pub email: Option<String>,
    pub course: Option<String>,
    pub semester: i32,
}

/// One subject's raw marks and attendance, as ingested. Immutable once read
/// from storage; derived values (grade, risk) are computed from it, never
/// written back into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubjectRecord {
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub credits: i32,
    pub attendance_percentage: f64,
}

/// A subject record joined with its owning student, for report listings.
#[derive(Debug, Clone)]
pub struct SubjectRow {
    pub roll_number: String,
    pub student_name: String,
    pub subject_name: String,
    pub semester: i32,
    pub record: SubjectRecord,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LetterGrade {
    O,
    APlus,
    A,
    BPlus,
    B,
    C,
    P,
    F,
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LetterGrade::O => "O",
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::P => "P",
            LetterGrade::F => "F",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradeResult {
    pub letter: LetterGrade,
    pub point: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Per-factor risk contributions on the internal 0-100 scale, kept for
/// reporting after the factors are blended into the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskFactors {
    pub attendance: f64,
    pub performance: f64,
    pub trend: f64,
}

/// Result of one risk evaluation for one student. `risk_score` is the
/// normalized 0-1 value; `risk_level` is derived from the unnormalized
/// 0-100 score before normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskEvaluation {
    pub avg_attendance: f64,
    pub avg_marks: f64,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub contributors: RiskFactors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubjectAlert {
    Critical,
    Warning,
    Normal,
}

impl fmt::Display for SubjectAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubjectAlert::Critical => "Critical",
            SubjectAlert::Warning => "Warning",
            SubjectAlert::Normal => "Normal",
        };
        f.write_str(s)
    }
}

/// Aggregates derived from one student's full record snapshot, fed into the
/// risk engine. `marks_percentages` is chronological (oldest semester first).
#[derive(Debug, Clone, PartialEq)]
pub struct StudentAverages {
    pub avg_attendance: f64,
    pub avg_marks: f64,
    pub marks_percentages: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SemesterSummary {
    pub roll_number: String,
    pub semester: i32,
    pub sgpa: f64,
    pub cgpa: f64,
    pub attendance: f64,
}

/// A stored prediction joined with its student, as read back for reporting.
#[derive(Debug, Clone)]
pub struct PredictionRow {
    pub roll_number: String,
    pub student_name: String,
    pub risk_score: f64,
    pub risk_level: String,
    pub predicted_grade: Option<String>,
    pub average_marks: f64,
    pub average_attendance: f64,
    pub attendance_risk: f64,
    pub performance_risk: f64,
    pub trend_risk: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardStats {
    pub total_students: i64,
    pub total_records: i64,
    pub average_attendance: f64,
    pub average_marks: f64,
    pub average_cgpa: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
}
