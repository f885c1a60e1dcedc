use crate::error::EngineError;
use crate::models::{GradeResult, LetterGrade, SubjectRecord};

/// Converts a raw mark pair into a letter grade and grade point.
///
/// | Percentage | Grade | Point |
/// |------------|-------|-------|
/// | >= 90      | O     | 10    |
/// | >= 80      | A+    | 9     |
/// | >= 70      | A     | 8     |
/// | >= 60      | B+    | 7     |
/// | >= 50      | B     | 6     |
/// | >= 45      | C     | 5     |
/// | >= 40      | P     | 4     |
/// | < 40       | F     | 0     |
///
/// The percentage is compared unrounded. `total_marks` must be positive;
/// the caller guards, this function does not coerce.
pub fn grade(marks_obtained: f64, total_marks: f64) -> Result<GradeResult, EngineError> {
    if !marks_obtained.is_finite() || !total_marks.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "marks must be finite numbers, got {marks_obtained}/{total_marks}"
        )));
    }
    if total_marks <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "total_marks must be positive, got {total_marks}"
        )));
    }
    if marks_obtained < 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "marks_obtained must be non-negative, got {marks_obtained}"
        )));
    }

    let percentage = marks_obtained / total_marks * 100.0;
    let (letter, point) = match percentage {
        p if p >= 90.0 => (LetterGrade::O, 10),
        p if p >= 80.0 => (LetterGrade::APlus, 9),
        p if p >= 70.0 => (LetterGrade::A, 8),
        p if p >= 60.0 => (LetterGrade::BPlus, 7),
        p if p >= 50.0 => (LetterGrade::B, 6),
        p if p >= 45.0 => (LetterGrade::C, 5),
        p if p >= 40.0 => (LetterGrade::P, 4),
        _ => (LetterGrade::F, 0),
    };
    Ok(GradeResult { letter, point })
}

/// Credit-weighted grade point average over one semester's subjects,
/// rounded to 2 decimal places. Zero total credits yields 0.0 rather
/// than an error.
pub fn semester_gpa(records: &[SubjectRecord]) -> Result<f64, EngineError> {
    let mut total_points = 0i64;
    let mut total_credits = 0i64;

    for record in records {
        let result = grade(record.marks_obtained, record.total_marks)?;
        total_points += i64::from(result.point) * i64::from(record.credits);
        total_credits += i64::from(record.credits);
    }

    if total_credits == 0 {
        return Ok(0.0);
    }
    Ok(round2(total_points as f64 / total_credits as f64))
}

/// CGPA is taken from the source data when supplied, otherwise it falls
/// back to the semester's computed SGPA.
pub fn cumulative_gpa(provided: Option<f64>, sgpa: f64) -> f64 {
    provided.unwrap_or(sgpa)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(marks: f64, total: f64) -> (LetterGrade, i32) {
        let g = grade(marks, total).unwrap();
        (g.letter, g.point)
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(letter(90.0, 100.0), (LetterGrade::O, 10));
        assert_eq!(letter(89.9, 100.0), (LetterGrade::APlus, 9));
        assert_eq!(letter(80.0, 100.0), (LetterGrade::APlus, 9));
        assert_eq!(letter(70.0, 100.0), (LetterGrade::A, 8));
        assert_eq!(letter(60.0, 100.0), (LetterGrade::BPlus, 7));
        assert_eq!(letter(50.0, 100.0), (LetterGrade::B, 6));
        assert_eq!(letter(45.0, 100.0), (LetterGrade::C, 5));
        assert_eq!(letter(40.0, 100.0), (LetterGrade::P, 4));
        assert_eq!(letter(39.9, 100.0), (LetterGrade::F, 0));
        assert_eq!(letter(0.0, 100.0), (LetterGrade::F, 0));
    }

    #[test]
    fn grade_scales_with_total() {
        // 45/50 = 90%, top band even though raw marks are low
        assert_eq!(letter(45.0, 50.0), (LetterGrade::O, 10));
        assert_eq!(letter(20.0, 50.0), (LetterGrade::P, 4));
    }

    #[test]
    fn grade_points_monotonic_in_percentage() {
        let mut last = 0;
        for tenths in 0..=1000 {
            let marks = tenths as f64 / 10.0;
            let point = grade(marks, 100.0).unwrap().point;
            assert!(point >= last, "point dropped at {marks}%");
            last = point;
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn grade_rejects_invalid_totals() {
        assert!(matches!(
            grade(50.0, 0.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            grade(50.0, -10.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            grade(f64::NAN, 100.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            grade(-1.0, 100.0),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn sgpa_weights_by_credits() {
        let records = vec![
            SubjectRecord {
                marks_obtained: 35.0,
                total_marks: 100.0,
                credits: 4,
                attendance_percentage: 55.0,
            },
            SubjectRecord {
                marks_obtained: 90.0,
                total_marks: 100.0,
                credits: 4,
                attendance_percentage: 90.0,
            },
        ];
        // F(0) and O(10) at equal credits: (0*4 + 10*4) / 8
        assert_eq!(semester_gpa(&records).unwrap(), 5.0);
    }

    #[test]
    fn sgpa_zero_credits_is_zero() {
        assert_eq!(semester_gpa(&[]).unwrap(), 0.0);
        let records = vec![SubjectRecord {
            marks_obtained: 80.0,
            total_marks: 100.0,
            credits: 0,
            attendance_percentage: 80.0,
        }];
        assert_eq!(semester_gpa(&records).unwrap(), 0.0);
    }

    #[test]
    fn sgpa_rounds_to_two_places() {
        let records = vec![
            SubjectRecord {
                marks_obtained: 90.0,
                total_marks: 100.0,
                credits: 2,
                attendance_percentage: 90.0,
            },
            SubjectRecord {
                marks_obtained: 70.0,
                total_marks: 100.0,
                credits: 4,
                attendance_percentage: 90.0,
            },
        ];
        // (10*2 + 8*4) / 6 = 8.666..
        assert_eq!(semester_gpa(&records).unwrap(), 8.67);
    }

    #[test]
    fn cgpa_prefers_provided_value() {
        assert_eq!(cumulative_gpa(Some(8.4), 7.0), 8.4);
        assert_eq!(cumulative_gpa(None, 7.0), 7.0);
    }
}
