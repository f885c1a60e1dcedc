use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    DashboardStats, GradeResult, PredictionRow, RiskEvaluation, SemesterSummary, Sentiment,
    Student, SubjectRecord, SubjectRow,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let students = vec![
        ("CS2301", "Ananya Rao", "ananya.rao@example.edu", "B.Tech CSE", 3),
        ("CS2317", "Dev Malhotra", "dev.malhotra@example.edu", "B.Tech CSE", 3),
        ("EC2288", "Meera Iyer", "meera.iyer@example.edu", "B.Tech ECE", 3),
    ];

    for (roll, name, email, course, semester) in students {
        upsert_student(pool, roll, name, Some(email), Some(course), semester).await?;
    }

    // (roll, subject, semester, marks, total, attendance, credits)
    let records = vec![
        ("CS2301", "Data Structures", 2, 82.0, 100.0, 91.0, 4),
        ("CS2301", "Discrete Mathematics", 2, 74.0, 100.0, 88.0, 4),
        ("CS2301", "Operating Systems", 3, 68.0, 100.0, 84.0, 4),
        ("CS2317", "Data Structures", 2, 46.0, 100.0, 71.0, 4),
        ("CS2317", "Discrete Mathematics", 2, 38.0, 100.0, 58.0, 4),
        ("CS2317", "Operating Systems", 3, 33.0, 100.0, 52.0, 4),
        ("EC2288", "Signals and Systems", 2, 64.0, 100.0, 79.0, 4),
        ("EC2288", "Digital Circuits", 3, 58.0, 100.0, 72.0, 3),
    ];

    let mut inserted = 0usize;
    for (roll, subject, semester, marks, total, attendance, credits) in records {
        let student_id = sqlx::query(
            "SELECT id FROM student_analytics.students WHERE roll_number = $1",
        )
        .bind(roll)
        .fetch_one(pool)
        .await?
        .get::<Uuid, _>("id");

        let record = SubjectRecord {
            marks_obtained: marks,
            total_marks: total,
            credits,
            attendance_percentage: attendance,
        };
        let grade = crate::grade::grade(marks, total)?;
        upsert_academic_record(pool, student_id, subject, semester, &record, &grade).await?;
        inserted += 1;
    }

    Ok(inserted)
}

pub async fn upsert_student(
    pool: &PgPool,
    roll_number: &str,
    name: &str,
    email: Option<&str>,
    course: Option<&str>,
    semester: i32,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO student_analytics.students (id, roll_number, name, email, course, semester)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (roll_number) DO UPDATE
        SET name = EXCLUDED.name,
            email = COALESCE(EXCLUDED.email, students.email),
            course = COALESCE(EXCLUDED.course, students.course),
            semester = EXCLUDED.semester
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(roll_number)
    .bind(name)
    .bind(email)
    .bind(course)
    .bind(semester)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

pub async fn upsert_academic_record(
    pool: &PgPool,
    student_id: Uuid,
    subject_name: &str,
    semester: i32,
    record: &SubjectRecord,
    grade: &GradeResult,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO student_analytics.academic_records
        (id, student_id, subject_name, semester, marks_obtained, total_marks,
         attendance_percentage, subject_credits, grade, grade_point)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (student_id, subject_name, semester) DO UPDATE
        SET marks_obtained = EXCLUDED.marks_obtained,
            total_marks = EXCLUDED.total_marks,
            attendance_percentage = EXCLUDED.attendance_percentage,
            subject_credits = EXCLUDED.subject_credits,
            grade = EXCLUDED.grade,
            grade_point = EXCLUDED.grade_point
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(subject_name)
    .bind(semester)
    .bind(record.marks_obtained)
    .bind(record.total_marks)
    .bind(record.attendance_percentage)
    .bind(record.credits)
    .bind(grade.letter.to_string())
    .bind(grade.point)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_semester_performance(
    pool: &PgPool,
    student_id: Uuid,
    semester: i32,
    sgpa: f64,
    cgpa: f64,
    attendance: f64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO student_analytics.semester_performance
        (id, student_id, semester, sgpa, cgpa, attendance_percentage)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (student_id, semester) DO UPDATE
        SET sgpa = EXCLUDED.sgpa,
            cgpa = EXCLUDED.cgpa,
            attendance_percentage = EXCLUDED.attendance_percentage
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(semester)
    .bind(sgpa)
    .bind(cgpa)
    .bind(attendance)
    .execute(pool)
    .await?;

    Ok(())
}

/// One prediction row per student; a re-evaluation overwrites the previous
/// one. The sentiment score is managed separately and survives overwrites.
pub async fn upsert_prediction(
    pool: &PgPool,
    student_id: Uuid,
    evaluation: &RiskEvaluation,
    predicted_grade: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO student_analytics.predictions
        (student_id, risk_score, risk_level, predicted_grade, average_marks,
         average_attendance, attendance_risk, performance_risk, trend_risk, generated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        ON CONFLICT (student_id) DO UPDATE
        SET risk_score = EXCLUDED.risk_score,
            risk_level = EXCLUDED.risk_level,
            predicted_grade = EXCLUDED.predicted_grade,
            average_marks = EXCLUDED.average_marks,
            average_attendance = EXCLUDED.average_attendance,
            attendance_risk = EXCLUDED.attendance_risk,
            performance_risk = EXCLUDED.performance_risk,
            trend_risk = EXCLUDED.trend_risk,
            generated_at = now()
        "#,
    )
    .bind(student_id)
    .bind(evaluation.risk_score)
    .bind(evaluation.risk_level.to_string())
    .bind(predicted_grade)
    .bind(evaluation.avg_marks)
    .bind(evaluation.avg_attendance)
    .bind(evaluation.contributors.attendance)
    .bind(evaluation.contributors.performance)
    .bind(evaluation.contributors.trend)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_students(pool: &PgPool, roll: Option<&str>) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from(
        "SELECT id, roll_number, name, email, course, semester \
         FROM student_analytics.students",
    );
    if roll.is_some() {
        query.push_str(" WHERE roll_number = $1");
    }
    query.push_str(" ORDER BY roll_number");

    let mut rows = sqlx::query(&query);
    if let Some(value) = roll {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut students = Vec::new();
    for row in records {
        students.push(Student {
            id: row.get("id"),
            roll_number: row.get("roll_number"),
            name: row.get("name"),
            email: row.get("email"),
            course: row.get("course"),
            semester: row.get("semester"),
        });
    }

    Ok(students)
}

/// A student's full subject snapshot in chronological order (semester, then
/// subject name for a stable order within a semester).
pub async fn fetch_subject_records(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<SubjectRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT marks_obtained, total_marks, subject_credits, attendance_percentage
        FROM student_analytics.academic_records
        WHERE student_id = $1
        ORDER BY semester, subject_name
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(SubjectRecord {
            marks_obtained: row.get("marks_obtained"),
            total_marks: row.get("total_marks"),
            credits: row.get("subject_credits"),
            attendance_percentage: row.get("attendance_percentage"),
        });
    }

    Ok(records)
}

pub async fn fetch_all_subject_rows(pool: &PgPool) -> anyhow::Result<Vec<SubjectRow>> {
    let rows = sqlx::query(
        r#"
        SELECT s.roll_number, s.name, r.subject_name, r.semester, r.marks_obtained,
               r.total_marks, r.subject_credits, r.attendance_percentage, r.grade
        FROM student_analytics.academic_records r
        JOIN student_analytics.students s ON s.id = r.student_id
        ORDER BY s.roll_number, r.semester, r.subject_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut subjects = Vec::new();
    for row in rows {
        subjects.push(SubjectRow {
            roll_number: row.get("roll_number"),
            student_name: row.get("name"),
            subject_name: row.get("subject_name"),
            semester: row.get("semester"),
            record: SubjectRecord {
                marks_obtained: row.get("marks_obtained"),
                total_marks: row.get("total_marks"),
                credits: row.get("subject_credits"),
                attendance_percentage: row.get("attendance_percentage"),
            },
            grade: row.get("grade"),
        });
    }

    Ok(subjects)
}

pub async fn fetch_semester_summaries(pool: &PgPool) -> anyhow::Result<Vec<SemesterSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT s.roll_number, p.semester,
               COALESCE(p.sgpa, 0) AS sgpa,
               COALESCE(p.cgpa, 0) AS cgpa,
               COALESCE(p.attendance_percentage, 0) AS attendance
        FROM student_analytics.semester_performance p
        JOIN student_analytics.students s ON s.id = p.student_id
        ORDER BY s.roll_number, p.semester
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::new();
    for row in rows {
        summaries.push(SemesterSummary {
            roll_number: row.get("roll_number"),
            semester: row.get("semester"),
            sgpa: row.get("sgpa"),
            cgpa: row.get("cgpa"),
            attendance: row.get("attendance"),
        });
    }

    Ok(summaries)
}

/// Stored predictions above `min_risk` (normalized 0-1 scale), highest
/// risk first.
pub async fn fetch_predictions(
    pool: &PgPool,
    min_risk: f64,
) -> anyhow::Result<Vec<PredictionRow>> {
    let rows = sqlx::query(
        r#"
        SELECT s.roll_number, s.name, p.risk_score, p.risk_level, p.predicted_grade, p.generated_at,
               COALESCE(p.average_marks, 0) AS average_marks,
               COALESCE(p.average_attendance, 0) AS average_attendance,
               COALESCE(p.attendance_risk, 0) AS attendance_risk,
               COALESCE(p.performance_risk, 0) AS performance_risk,
               COALESCE(p.trend_risk, 0) AS trend_risk
        FROM student_analytics.predictions p
        JOIN student_analytics.students s ON s.id = p.student_id
        WHERE p.risk_score > $1
        ORDER BY p.risk_score DESC, s.roll_number
        "#,
    )
    .bind(min_risk)
    .fetch_all(pool)
    .await?;

    let mut predictions = Vec::new();
    for row in rows {
        predictions.push(PredictionRow {
            roll_number: row.get("roll_number"),
            student_name: row.get("name"),
            risk_score: row.get("risk_score"),
            risk_level: row.get("risk_level"),
            predicted_grade: row.get("predicted_grade"),
            average_marks: row.get("average_marks"),
            average_attendance: row.get("average_attendance"),
            attendance_risk: row.get("attendance_risk"),
            performance_risk: row.get("performance_risk"),
            trend_risk: row.get("trend_risk"),
            generated_at: row.get("generated_at"),
        });
    }

    Ok(predictions)
}

pub async fn fetch_dashboard_stats(pool: &PgPool) -> anyhow::Result<DashboardStats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM student_analytics.students) AS total_students,
            (SELECT COUNT(*) FROM student_analytics.academic_records) AS total_records,
            (SELECT COALESCE(AVG(attendance_percentage), 0)
             FROM student_analytics.academic_records) AS average_attendance,
            (SELECT COALESCE(AVG(marks_obtained), 0)
             FROM student_analytics.academic_records) AS average_marks,
            (SELECT COALESCE(AVG(cgpa), 0)
             FROM student_analytics.semester_performance) AS average_cgpa
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        total_students: row.get("total_students"),
        total_records: row.get("total_records"),
        average_attendance: row.get("average_attendance"),
        average_marks: row.get("average_marks"),
        average_cgpa: row.get("average_cgpa"),
    })
}

/// Logs a feedback entry and mirrors its score onto the student's current
/// prediction, when one exists.
pub async fn insert_feedback(
    pool: &PgPool,
    student_id: Uuid,
    content: &str,
    sentiment: &Sentiment,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO student_analytics.feedback_logs
        (id, student_id, content, sentiment_score, sentiment_label)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(content)
    .bind(sentiment.score)
    .bind(sentiment.label.to_string())
    .execute(pool)
    .await?;

    sqlx::query(
        "UPDATE student_analytics.predictions SET sentiment_score = $1 WHERE student_id = $2",
    )
    .bind(sentiment.score)
    .bind(student_id)
    .execute(pool)
    .await?;

    Ok(())
}
