use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::error::EngineError;
use crate::grade;
use crate::models::{RiskEvaluation, StudentAverages, SubjectRecord};
use crate::risk::RiskEngine;

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    roll_number: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    course: Option<String>,
    semester: i32,
    #[serde(default)]
    subject_name: Option<String>,
    #[serde(default)]
    subject_credits: Option<i32>,
    #[serde(default)]
    marks_obtained: Option<f64>,
    #[serde(default)]
    total_marks: Option<f64>,
    #[serde(default)]
    attendance_percentage: Option<f64>,
    #[serde(default)]
    cgpa: Option<f64>,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub students: usize,
    pub records: usize,
    pub semesters: usize,
    pub evaluated: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct SemesterGroup {
    records: Vec<SubjectRecord>,
    provided_cgpa: Option<f64>,
}

/// Full master-upload pipeline: upsert students and graded subject records,
/// roll up per-semester SGPA/CGPA history, then re-evaluate risk per
/// student. Faults are isolated per row and per student; a malformed entry
/// is logged and skipped without aborting the batch.
pub async fn ingest_csv(
    pool: &PgPool,
    engine: &RiskEngine,
    csv_path: &Path,
) -> anyhow::Result<IngestOutcome> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut outcome = IngestOutcome::default();
    let mut student_ids: BTreeMap<String, Uuid> = BTreeMap::new();
    let mut semester_groups: BTreeMap<(String, i32), SemesterGroup> = BTreeMap::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(line = line + 2, error = %err, "skipping malformed CSV row");
                outcome.skipped += 1;
                continue;
            }
        };

        let student_id = match student_ids.get(&row.roll_number) {
            Some(id) => *id,
            None => {
                let id = db::upsert_student(
                    pool,
                    &row.roll_number,
                    &row.name,
                    row.email.as_deref(),
                    row.course.as_deref(),
                    row.semester,
                )
                .await?;
                student_ids.insert(row.roll_number.clone(), id);
                outcome.students += 1;
                id
            }
        };

        let Some(subject_name) = row.subject_name.as_deref() else {
            continue;
        };

        let record = SubjectRecord {
            marks_obtained: row.marks_obtained.unwrap_or(0.0),
            total_marks: row.total_marks.unwrap_or(100.0),
            credits: row.subject_credits.unwrap_or(4),
            attendance_percentage: row.attendance_percentage.unwrap_or(0.0),
        };

        let graded = match grade::grade(record.marks_obtained, record.total_marks) {
            Ok(graded) => graded,
            Err(err) => {
                warn!(
                    roll = %row.roll_number,
                    subject = subject_name,
                    error = %err,
                    "skipping ungradable subject row"
                );
                outcome.skipped += 1;
                continue;
            }
        };

        db::upsert_academic_record(pool, student_id, subject_name, row.semester, &record, &graded)
            .await?;
        outcome.records += 1;

        let group = semester_groups
            .entry((row.roll_number.clone(), row.semester))
            .or_default();
        group.records.push(record);
        if group.provided_cgpa.is_none() {
            group.provided_cgpa = row.cgpa;
        }
    }

    for ((roll, semester), group) in &semester_groups {
        let student_id = student_ids[roll];
        match rollup_semester(pool, student_id, *semester, group).await {
            Ok(()) => outcome.semesters += 1,
            Err(err) => {
                warn!(roll = %roll, semester = *semester, error = %err, "skipping semester rollup");
                outcome.skipped += 1;
            }
        }
    }

    for (roll, student_id) in &student_ids {
        match refresh_student(pool, engine, *student_id).await {
            Ok(_) => outcome.evaluated += 1,
            Err(err) => {
                warn!(roll = %roll, error = %err, "skipping risk evaluation");
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

async fn rollup_semester(
    pool: &PgPool,
    student_id: Uuid,
    semester: i32,
    group: &SemesterGroup,
) -> anyhow::Result<()> {
    let sgpa = grade::semester_gpa(&group.records)?;
    let cgpa = grade::cumulative_gpa(group.provided_cgpa, sgpa);
    let attendance = mean(
        group
            .records
            .iter()
            .map(|r| r.attendance_percentage),
    );
    db::upsert_semester_performance(pool, student_id, semester, sgpa, cgpa, attendance).await
}

/// Recomputes the risk evaluation and performance projection for one student
/// from a consistent snapshot of their subject records, and overwrites the
/// stored prediction. Read-then-compute: the snapshot is fetched in full
/// before anything is derived from it.
pub async fn refresh_student(
    pool: &PgPool,
    engine: &RiskEngine,
    student_id: Uuid,
) -> anyhow::Result<RiskEvaluation> {
    let records = db::fetch_subject_records(pool, student_id).await?;
    if records.is_empty() {
        return Err(EngineError::InsufficientData("student has no academic records").into());
    }

    let averages = aggregate_records(&records)?;
    let evaluation = engine.evaluate_student(
        averages.avg_attendance,
        averages.avg_marks,
        &averages.marks_percentages,
    )?;
    let projected = engine.predict_performance(averages.avg_attendance, averages.avg_marks);

    db::upsert_prediction(pool, student_id, &evaluation, &format!("{projected:.1}%")).await?;

    Ok(evaluation)
}

/// Re-runs the evaluation step for one student or for everyone. The all-
/// students pass keeps the batch's fault isolation: a failing student is
/// logged and skipped.
pub async fn process_students(
    pool: &PgPool,
    engine: &RiskEngine,
    roll: Option<&str>,
) -> anyhow::Result<Vec<(String, RiskEvaluation)>> {
    let students = db::fetch_students(pool, roll).await?;
    if students.is_empty() {
        anyhow::bail!("no matching students");
    }

    let single = students.len() == 1;
    let mut evaluated = Vec::new();
    for student in &students {
        match refresh_student(pool, engine, student.id).await {
            Ok(evaluation) => evaluated.push((student.roll_number.clone(), evaluation)),
            Err(err) if single => return Err(err),
            Err(err) => {
                warn!(roll = %student.roll_number, error = %err, "skipping student");
            }
        }
    }

    Ok(evaluated)
}

/// Aggregates a student's snapshot into the risk engine's inputs: mean
/// attendance, the chronological per-subject percentage sequence, and its
/// mean. Empty input yields zeros rather than an error.
pub fn aggregate_records(records: &[SubjectRecord]) -> Result<StudentAverages, EngineError> {
    let mut marks_percentages = Vec::with_capacity(records.len());
    for record in records {
        if record.total_marks <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "total_marks must be positive, got {}",
                record.total_marks
            )));
        }
        marks_percentages.push(record.marks_obtained / record.total_marks * 100.0);
    }

    Ok(StudentAverages {
        avg_attendance: mean(records.iter().map(|r| r.attendance_percentage)),
        avg_marks: mean(marks_percentages.iter().copied()),
        marks_percentages,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(marks: f64, total: f64, attendance: f64) -> SubjectRecord {
        SubjectRecord {
            marks_obtained: marks,
            total_marks: total,
            credits: 4,
            attendance_percentage: attendance,
        }
    }

    #[test]
    fn aggregates_percentages_in_order() {
        let records = vec![record(35.0, 100.0, 55.0), record(45.0, 50.0, 90.0)];
        let averages = aggregate_records(&records).unwrap();
        assert_eq!(averages.marks_percentages, vec![35.0, 90.0]);
        assert_eq!(averages.avg_marks, 62.5);
        assert_eq!(averages.avg_attendance, 72.5);
    }

    #[test]
    fn empty_snapshot_defaults_to_zero() {
        let averages = aggregate_records(&[]).unwrap();
        assert_eq!(averages.avg_attendance, 0.0);
        assert_eq!(averages.avg_marks, 0.0);
        assert!(averages.marks_percentages.is_empty());
    }

    #[test]
    fn rejects_zero_total_marks() {
        let records = vec![record(35.0, 0.0, 55.0)];
        assert!(matches!(
            aggregate_records(&records),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn end_to_end_mixed_student() {
        let engine = RiskEngine::default();
        let records = vec![record(35.0, 100.0, 55.0), record(90.0, 100.0, 90.0)];
        let sgpa = grade::semester_gpa(&records).unwrap();
        assert_eq!(sgpa, 5.0);

        let averages = aggregate_records(&records).unwrap();
        let evaluation = engine
            .evaluate_student(
                averages.avg_attendance,
                averages.avg_marks,
                &averages.marks_percentages,
            )
            .unwrap();
        assert_eq!(evaluation.avg_marks, 62.5);
        assert_eq!(evaluation.avg_attendance, 72.5);
        assert!(evaluation.contributors.attendance > 0.0);
        assert_eq!(evaluation.contributors.performance, 0.0);
        assert!(
            matches!(
                evaluation.risk_level,
                crate::models::RiskLevel::Low | crate::models::RiskLevel::Medium
            ),
            "expected Low or Medium, got {:?}",
            evaluation.risk_level
        );
    }
}
