use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::EngineError;
use crate::grade::round2;
use crate::models::{RiskEvaluation, RiskFactors, RiskLevel, SubjectAlert};

/// Risk thresholds. The student-level warning thresholds (attendance 75,
/// performance 60) and the subject-level thresholds are separate knobs;
/// keep them that way.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub attendance_threshold: f64,
    pub performance_threshold: f64,
    pub subject_critical_marks: f64,
    pub subject_critical_attendance: f64,
    pub subject_warning_marks: f64,
    pub subject_warning_attendance: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            attendance_threshold: 75.0,
            performance_threshold: 60.0,
            subject_critical_marks: 40.0,
            subject_critical_attendance: 60.0,
            subject_warning_marks: 50.0,
            subject_warning_attendance: 65.0,
        }
    }
}

impl RiskConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read risk config {}", path.display()))?;
        let config: RiskConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid risk config {}", path.display()))?;
        Ok(config)
    }
}

/// Heuristic rule-based risk engine. Stateless apart from its immutable
/// configuration; construct one at startup and share it by reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Risk from low average attendance, 0-100. Below the threshold the
    /// penalty scales at 250, so the score degrades roughly 2.5x faster
    /// than the raw percentage gap.
    pub fn attendance_risk(&self, avg_attendance: f64) -> f64 {
        let threshold = self.config.attendance_threshold;
        if avg_attendance >= threshold {
            return 0.0;
        }
        ((threshold - avg_attendance) / threshold * 250.0).min(100.0)
    }

    /// Risk from low average marks, 0-100, penalty scale 200.
    pub fn performance_risk(&self, avg_marks: f64) -> f64 {
        let threshold = self.config.performance_threshold;
        if avg_marks >= threshold {
            return 0.0;
        }
        ((threshold - avg_marks) / threshold * 200.0).min(100.0)
    }

    /// Risk from a declining marks trend. `marks` must be chronological,
    /// oldest first; the last entry is compared against the mean of all
    /// preceding ones. An improving or flat trend carries no risk.
    pub fn trend_risk(&self, marks: &[f64]) -> f64 {
        if marks.len() < 2 {
            return 0.0;
        }
        let (last, previous) = marks.split_last().unwrap_or((&0.0, &[]));
        let previous_avg = previous.iter().sum::<f64>() / previous.len() as f64;
        if *last < previous_avg {
            ((previous_avg - last) * 5.0).min(100.0)
        } else {
            0.0
        }
    }

    /// Weighted blend of the three factors. A single factor above 70 floors
    /// the result at 90% of that factor, so one severely bad signal cannot
    /// be diluted by the average.
    pub fn overall_risk(&self, att_risk: f64, perf_risk: f64, trend_risk: f64) -> f64 {
        let blend = 0.4 * att_risk + 0.5 * perf_risk + 0.1 * trend_risk;
        let max_factor = att_risk.max(perf_risk);
        if max_factor > 70.0 {
            blend.max(max_factor * 0.9)
        } else {
            blend
        }
    }

    /// Step function of the unnormalized 0-100 score, inclusive upper
    /// bounds checked low to high.
    pub fn risk_level(&self, score: f64) -> RiskLevel {
        if score <= 20.0 {
            RiskLevel::Low
        } else if score <= 40.0 {
            RiskLevel::Medium
        } else if score <= 70.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    /// Full student-level evaluation. `marks` is the chronological per-record
    /// percentage sequence. Inputs outside their domain are rejected, never
    /// clamped; the only clamping anywhere is the documented `min(100, ..)`
    /// ceiling on each factor. The returned `risk_score` is normalized to
    /// 0-1, while `risk_level` is derived from the 0-100 score first.
    pub fn evaluate_student(
        &self,
        avg_attendance: f64,
        avg_marks: f64,
        marks: &[f64],
    ) -> Result<RiskEvaluation, EngineError> {
        if !avg_attendance.is_finite() || !(0.0..=100.0).contains(&avg_attendance) {
            return Err(EngineError::InvalidInput(format!(
                "avg_attendance must be within 0-100, got {avg_attendance}"
            )));
        }
        if !avg_marks.is_finite() || avg_marks < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "avg_marks must be non-negative, got {avg_marks}"
            )));
        }
        if let Some(bad) = marks.iter().find(|m| !m.is_finite()) {
            return Err(EngineError::InvalidInput(format!(
                "marks sequence contains a non-finite value: {bad}"
            )));
        }

        let att = self.attendance_risk(avg_attendance);
        let perf = self.performance_risk(avg_marks);
        let trend = self.trend_risk(marks);
        let score = self.overall_risk(att, perf, trend);

        Ok(RiskEvaluation {
            avg_attendance: round2(avg_attendance),
            avg_marks: round2(avg_marks),
            risk_score: round2(score / 100.0),
            risk_level: self.risk_level(score),
            contributors: RiskFactors {
                attendance: round2(att),
                performance: round2(perf),
                trend: round2(trend),
            },
        })
    }

    /// Subject-level alert. The Critical conjunction is checked before the
    /// Warning disjunction; both could fire on the same record otherwise.
    /// The Warning attendance cutoff is the student-level threshold, not
    /// `subject_warning_attendance`.
    pub fn evaluate_subject(&self, marks: f64, attendance: f64) -> SubjectAlert {
        if marks < self.config.subject_critical_marks
            && attendance < self.config.subject_critical_attendance
        {
            SubjectAlert::Critical
        } else if marks < self.config.subject_critical_marks
            || attendance < self.config.attendance_threshold
        {
            SubjectAlert::Warning
        } else {
            SubjectAlert::Normal
        }
    }

    /// Heuristic weighted projection, not a trained model.
    pub fn predict_performance(&self, attendance: f64, internal_marks: f64) -> f64 {
        attendance * 0.3 + internal_marks * 0.7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RiskEngine {
        RiskEngine::default()
    }

    #[test]
    fn attendance_risk_boundaries() {
        let e = engine();
        assert_eq!(e.attendance_risk(75.0), 0.0);
        assert_eq!(e.attendance_risk(100.0), 0.0);
        assert_eq!(e.attendance_risk(0.0), 100.0);
        let at_50 = e.attendance_risk(50.0);
        assert!((at_50 - 25.0 / 75.0 * 250.0).abs() < 1e-9);
        assert!((round2(at_50) - 83.33).abs() < 1e-9);
    }

    #[test]
    fn performance_risk_boundaries() {
        let e = engine();
        assert_eq!(e.performance_risk(60.0), 0.0);
        assert_eq!(e.performance_risk(0.0), 100.0);
        assert!((e.performance_risk(30.0) - 100.0).abs() < 1e-9);
        assert!((e.performance_risk(45.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn trend_risk_needs_two_points() {
        let e = engine();
        assert_eq!(e.trend_risk(&[]), 0.0);
        assert_eq!(e.trend_risk(&[50.0]), 0.0);
    }

    #[test]
    fn trend_risk_penalizes_decline_only() {
        let e = engine();
        assert_eq!(e.trend_risk(&[80.0, 60.0]), 100.0);
        assert_eq!(e.trend_risk(&[60.0, 80.0]), 0.0);
        // last (60) vs mean of [70, 80] = 75 -> 15 * 5
        assert_eq!(e.trend_risk(&[70.0, 80.0, 60.0]), 75.0);
    }

    #[test]
    fn overall_risk_escalates_dominant_factor() {
        let e = engine();
        assert_eq!(e.overall_risk(80.0, 0.0, 0.0), 72.0);
        // below the 70 gate the plain blend applies
        assert_eq!(e.overall_risk(70.0, 0.0, 0.0), 28.0);
        let blended = e.overall_risk(50.0, 40.0, 10.0);
        assert!((blended - (0.4 * 50.0 + 0.5 * 40.0 + 0.1 * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn risk_level_boundaries() {
        let e = engine();
        assert_eq!(e.risk_level(20.0), RiskLevel::Low);
        assert_eq!(e.risk_level(20.1), RiskLevel::Medium);
        assert_eq!(e.risk_level(40.0), RiskLevel::Medium);
        assert_eq!(e.risk_level(70.0), RiskLevel::High);
        assert_eq!(e.risk_level(70.1), RiskLevel::Critical);
    }

    #[test]
    fn subject_alert_checks_critical_before_warning() {
        let e = engine();
        assert_eq!(e.evaluate_subject(30.0, 50.0), SubjectAlert::Critical);
        assert_eq!(e.evaluate_subject(30.0, 80.0), SubjectAlert::Warning);
        assert_eq!(e.evaluate_subject(80.0, 70.0), SubjectAlert::Warning);
        assert_eq!(e.evaluate_subject(80.0, 80.0), SubjectAlert::Normal);
    }

    #[test]
    fn evaluate_student_normalizes_score() {
        let e = engine();
        let eval = e.evaluate_student(0.0, 0.0, &[]).unwrap();
        // both factors clip to 100 -> overall 100 -> normalized 1.0
        assert_eq!(eval.risk_score, 1.0);
        assert_eq!(eval.risk_level, RiskLevel::Critical);
        assert_eq!(eval.contributors.attendance, 100.0);
        assert_eq!(eval.contributors.performance, 100.0);
        assert_eq!(eval.contributors.trend, 0.0);
    }

    #[test]
    fn evaluate_student_is_idempotent() {
        let e = engine();
        let marks = [62.0, 58.0, 49.5];
        let first = e.evaluate_student(71.25, 56.5, &marks).unwrap();
        let second = e.evaluate_student(71.25, 56.5, &marks).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn evaluate_student_rejects_out_of_domain_inputs() {
        let e = engine();
        assert!(matches!(
            e.evaluate_student(-5.0, 50.0, &[]),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            e.evaluate_student(120.0, 50.0, &[]),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            e.evaluate_student(80.0, -1.0, &[]),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            e.evaluate_student(80.0, 50.0, &[f64::NAN]),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn mixed_student_stays_below_critical() {
        // subjects: (35/100, att 55) and (90/100, att 90)
        let e = engine();
        let eval = e.evaluate_student(72.5, 62.5, &[35.0, 90.0]).unwrap();
        assert!(eval.contributors.attendance > 0.0);
        assert_eq!(eval.contributors.performance, 0.0);
        assert!(
            eval.risk_level == RiskLevel::Low || eval.risk_level == RiskLevel::Medium,
            "expected Low or Medium, got {:?}",
            eval.risk_level
        );
    }

    #[test]
    fn thresholds_are_adjustable() {
        let e = RiskEngine::new(RiskConfig {
            attendance_threshold: 90.0,
            ..RiskConfig::default()
        });
        assert!(e.attendance_risk(80.0) > 0.0);
        assert_eq!(e.attendance_risk(90.0), 0.0);
    }
}
