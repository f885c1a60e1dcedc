use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{
    DashboardStats, PredictionRow, SemesterSummary, SubjectAlert, SubjectRow,
};
use crate::risk::RiskEngine;

/// Alert thresholds on the normalized 0-1 risk score. These intentionally
/// match the stored `risk_score` scale, not the engine's internal 0-100 one.
pub const ALERT_RISK: f64 = 0.4;
pub const CRITICAL_RISK: f64 = 0.7;

// GPA-to-percentage conversion used only for presentation bucketing. The
// 9.5 factor is a common convention, not a validated domain constant.
const GPA_TO_PERCENT: f64 = 9.5;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertGuidance {
    pub status: &'static str,
    pub main_cause: &'static str,
    pub actions: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Buckets CGPA values into nearest-10 percentage bins ("90" holds 90-100%
/// equivalents, and so on).
pub fn grade_distribution(cgpas: &[f64]) -> BTreeMap<i32, usize> {
    let mut buckets = BTreeMap::new();
    for cgpa in cgpas {
        let percent = cgpa * GPA_TO_PERCENT;
        let bin = (percent / 10.0).floor() as i32 * 10;
        *buckets.entry(bin).or_insert(0) += 1;
    }
    buckets
}

const GPA_BANDS: &[(&str, f64)] = &[
    ("9-10", 9.0),
    ("8-9", 8.0),
    ("7-8", 7.0),
    ("6-7", 6.0),
    ("5-6", 5.0),
    ("4-5", 4.0),
    ("<4", f64::NEG_INFINITY),
];

pub fn gpa_bands(sgpas: &[f64]) -> Vec<(&'static str, usize)> {
    let mut counts = vec![0usize; GPA_BANDS.len()];
    for sgpa in sgpas {
        for (i, (_, lower)) in GPA_BANDS.iter().enumerate() {
            if *sgpa >= *lower {
                counts[i] += 1;
                break;
            }
        }
    }
    GPA_BANDS
        .iter()
        .zip(counts)
        .map(|((label, _), count)| (*label, count))
        .collect()
}

/// Students whose latest semester SGPA fell strictly below the previous
/// semester's. `summaries` must be ordered by roll, then semester.
pub fn declining_students(summaries: &[SemesterSummary]) -> usize {
    let mut declining = 0usize;
    let mut i = 0;
    while i < summaries.len() {
        let roll = &summaries[i].roll_number;
        let mut j = i;
        while j < summaries.len() && summaries[j].roll_number == *roll {
            j += 1;
        }
        if j - i >= 2 && summaries[j - 1].sgpa < summaries[j - 2].sgpa {
            declining += 1;
        }
        i = j;
    }
    declining
}

/// Splits stored predictions into critical (> 0.7), warning (> 0.4) and the
/// remainder, compared against the normalized score.
pub fn risk_distribution(predictions: &[PredictionRow], total_students: i64) -> RiskDistribution {
    let high = predictions
        .iter()
        .filter(|p| p.risk_score > CRITICAL_RISK)
        .count();
    let alerts = predictions
        .iter()
        .filter(|p| p.risk_score > ALERT_RISK)
        .count();
    RiskDistribution {
        high,
        medium: alerts - high,
        low: (total_students as usize).saturating_sub(alerts),
    }
}

/// Status, dominant cause and suggested interventions for a flagged student.
pub fn alert_guidance(
    risk_score: f64,
    avg_attendance: f64,
    avg_marks: f64,
    engine: &RiskEngine,
) -> AlertGuidance {
    let config = engine.config();
    let mut actions = Vec::new();

    let status = if risk_score > CRITICAL_RISK {
        actions.push("Schedule Parent Meeting");
        actions.push("Remedial Class");
        "Critical"
    } else if risk_score > ALERT_RISK {
        actions.push("Peer Tutoring");
        actions.push("Counseling Session");
        "Warning"
    } else {
        "Monitor"
    };

    let main_cause = if avg_attendance < config.subject_critical_attendance {
        actions.push("Attendance Warning Letter");
        "Critical Attendance Failure"
    } else if avg_attendance < config.attendance_threshold {
        "Low Attendance"
    } else if avg_marks < config.subject_critical_marks {
        actions.insert(0, "Subject Retake Plan");
        "Academic Failure"
    } else if avg_marks < config.subject_warning_marks {
        "Low Academic Performance"
    } else {
        "General Academic Risk"
    };

    AlertGuidance {
        status,
        main_cause,
        actions,
    }
}

pub fn build_report(
    stats: &DashboardStats,
    summaries: &[SemesterSummary],
    predictions: &[PredictionRow],
    subjects: &[SubjectRow],
    engine: &RiskEngine,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Analytics Report");
    let _ = writeln!(output, "Generated {}", chrono::Utc::now().date_naive());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Students: {}", stats.total_students);
    let _ = writeln!(output, "- Subject records: {}", stats.total_records);
    let _ = writeln!(
        output,
        "- Average attendance: {:.1}%",
        stats.average_attendance
    );
    let _ = writeln!(output, "- Average marks: {:.1}", stats.average_marks);
    let _ = writeln!(output, "- Average CGPA: {:.2}", stats.average_cgpa);

    let cgpas: Vec<f64> = summaries.iter().map(|s| s.cgpa).collect();
    let sgpas: Vec<f64> = summaries.iter().map(|s| s.sgpa).collect();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution (approx. percentage bins)");
    let distribution = grade_distribution(&cgpas);
    if distribution.is_empty() {
        let _ = writeln!(output, "No semester history recorded.");
    } else {
        for (bin, count) in distribution.iter().rev() {
            let _ = writeln!(output, "- {}-{}%: {} semester(s)", bin, bin + 10, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## SGPA Bands");
    for (band, count) in gpa_bands(&sgpas) {
        let _ = writeln!(output, "- {band}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Summary");
    let dist = risk_distribution(predictions, stats.total_students);
    let _ = writeln!(output, "- Critical (score > {CRITICAL_RISK}): {}", dist.high);
    let _ = writeln!(output, "- Warning (score > {ALERT_RISK}): {}", dist.medium);
    let _ = writeln!(output, "- Low: {}", dist.low);
    let _ = writeln!(
        output,
        "- Declining students: {}",
        declining_students(summaries)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");
    if predictions.is_empty() {
        let _ = writeln!(output, "No risk evaluations stored.");
    } else {
        for p in predictions.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) score {:.2} [{}] attendance {:.1}% marks {:.1} \
                 (factors: att {:.1}, perf {:.1}, trend {:.1}) evaluated {}",
                p.student_name,
                p.roll_number,
                p.risk_score,
                p.risk_level,
                p.average_attendance,
                p.average_marks,
                p.attendance_risk,
                p.performance_risk,
                p.trend_risk,
                p.generated_at.date_naive()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Suggested Interventions");
    let flagged: Vec<&PredictionRow> = predictions
        .iter()
        .filter(|p| p.risk_score > ALERT_RISK)
        .collect();
    if flagged.is_empty() {
        let _ = writeln!(output, "No students above the alert threshold.");
    } else {
        for p in flagged {
            let guidance = alert_guidance(p.risk_score, p.average_attendance, p.average_marks, engine);
            let _ = writeln!(
                output,
                "- {} ({}): {} - {}. Actions: {}",
                p.student_name,
                p.roll_number,
                guidance.status,
                guidance.main_cause,
                guidance.actions.join(", ")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Watchlist");
    let mut flagged_subjects = 0usize;
    for subject in subjects {
        let alert = engine.evaluate_subject(
            subject.record.marks_obtained,
            subject.record.attendance_percentage,
        );
        let low_attendance =
            subject.record.attendance_percentage < engine.config().subject_warning_attendance;
        if alert == SubjectAlert::Normal && !low_attendance {
            continue;
        }
        flagged_subjects += 1;
        let mut note = alert.to_string();
        if low_attendance {
            note.push_str(", attendance watch");
        }
        let _ = writeln!(
            output,
            "- {} ({}) sem {} {}: marks {:.0}/{:.0}, attendance {:.1}% [{}]",
            subject.student_name,
            subject.roll_number,
            subject.semester,
            subject.subject_name,
            subject.record.marks_obtained,
            subject.record.total_marks,
            subject.record.attendance_percentage,
            note
        );
    }
    if flagged_subjects == 0 {
        let _ = writeln!(output, "No subjects flagged.");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectRecord;

    fn prediction(roll: &str, risk_score: f64, attendance: f64, marks: f64) -> PredictionRow {
        PredictionRow {
            roll_number: roll.to_string(),
            student_name: format!("Student {roll}"),
            risk_score,
            risk_level: "High".to_string(),
            predicted_grade: Some("61.0%".to_string()),
            average_marks: marks,
            average_attendance: attendance,
            attendance_risk: 0.0,
            performance_risk: 0.0,
            trend_risk: 0.0,
            generated_at: chrono::Utc::now(),
        }
    }

    fn summary(roll: &str, semester: i32, sgpa: f64, cgpa: f64) -> SemesterSummary {
        SemesterSummary {
            roll_number: roll.to_string(),
            semester,
            sgpa,
            cgpa,
            attendance: 80.0,
        }
    }

    #[test]
    fn grade_distribution_bins_by_converted_percentage() {
        // 8.0 * 9.5 = 76 and 8.4 * 9.5 = 79.8 -> bin 70;
        // 9.6 * 9.5 = 91.2 -> bin 90; 4.0 * 9.5 = 38 -> bin 30
        let buckets = grade_distribution(&[8.0, 9.6, 4.0, 8.4]);
        assert_eq!(buckets.get(&70), Some(&2));
        assert_eq!(buckets.get(&90), Some(&1));
        assert_eq!(buckets.get(&30), Some(&1));
        assert_eq!(buckets.values().sum::<usize>(), 4);
    }

    #[test]
    fn gpa_bands_cover_all_values() {
        let bands = gpa_bands(&[9.2, 8.0, 6.5, 3.1, 0.0]);
        let as_map: std::collections::HashMap<_, _> = bands.into_iter().collect();
        assert_eq!(as_map["9-10"], 1);
        assert_eq!(as_map["8-9"], 1);
        assert_eq!(as_map["6-7"], 1);
        assert_eq!(as_map["<4"], 2);
    }

    #[test]
    fn risk_distribution_uses_normalized_boundaries() {
        let predictions = vec![
            prediction("A", 0.4, 80.0, 60.0),  // at the boundary: not an alert
            prediction("B", 0.41, 80.0, 60.0), // alert, not critical
            prediction("C", 0.7, 80.0, 60.0),  // at the boundary: not critical
            prediction("D", 0.71, 80.0, 60.0), // critical
        ];
        let dist = risk_distribution(&predictions, 6);
        assert_eq!(dist.high, 1);
        assert_eq!(dist.medium, 2);
        assert_eq!(dist.low, 3);
    }

    #[test]
    fn declining_compares_latest_two_semesters() {
        let summaries = vec![
            summary("A", 1, 7.0, 7.0),
            summary("A", 2, 6.5, 6.8),
            summary("B", 1, 6.0, 6.0),
            summary("B", 2, 6.0, 6.0),
            summary("C", 1, 8.0, 8.0),
        ];
        assert_eq!(declining_students(&summaries), 1);
    }

    #[test]
    fn guidance_escalates_with_risk_and_cause() {
        let engine = RiskEngine::default();
        let critical = alert_guidance(0.8, 55.0, 45.0, &engine);
        assert_eq!(critical.status, "Critical");
        assert_eq!(critical.main_cause, "Critical Attendance Failure");
        assert!(critical.actions.contains(&"Attendance Warning Letter"));

        let failing = alert_guidance(0.5, 80.0, 35.0, &engine);
        assert_eq!(failing.status, "Warning");
        assert_eq!(failing.main_cause, "Academic Failure");
        assert_eq!(failing.actions[0], "Subject Retake Plan");

        let monitor = alert_guidance(0.2, 85.0, 65.0, &engine);
        assert_eq!(monitor.status, "Monitor");
        assert_eq!(monitor.main_cause, "General Academic Risk");
        assert!(monitor.actions.is_empty());
    }

    #[test]
    fn report_lists_flagged_subjects() {
        let engine = RiskEngine::default();
        let stats = DashboardStats {
            total_students: 1,
            total_records: 2,
            average_attendance: 70.0,
            average_marks: 55.0,
            average_cgpa: 6.0,
        };
        let subjects = vec![
            SubjectRow {
                roll_number: "A1".to_string(),
                student_name: "Avi".to_string(),
                subject_name: "Physics".to_string(),
                semester: 1,
                record: SubjectRecord {
                    marks_obtained: 30.0,
                    total_marks: 100.0,
                    credits: 4,
                    attendance_percentage: 50.0,
                },
                grade: Some("F".to_string()),
            },
            SubjectRow {
                roll_number: "A1".to_string(),
                student_name: "Avi".to_string(),
                subject_name: "Chemistry".to_string(),
                semester: 1,
                record: SubjectRecord {
                    marks_obtained: 85.0,
                    total_marks: 100.0,
                    credits: 4,
                    attendance_percentage: 92.0,
                },
                grade: Some("A+".to_string()),
            },
        ];
        let report = build_report(&stats, &[], &[], &subjects, &engine);
        assert!(report.contains("Physics"));
        assert!(report.contains("Critical"));
        assert!(!report.contains("Chemistry"));
    }
}
