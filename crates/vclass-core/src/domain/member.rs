//! Lesson membership and enrollment history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A learner's membership in a lesson, taken through one course.
///
/// `(lesson_id, course_id, user_id)` is unique and orders learner pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonMember {
    pub lesson_id: String,
    pub user_id: String,
    pub course_id: String,
}

/// One enrollment validity window of a student at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentStatusHistory {
    pub student_id: String,
    pub location_id: String,
    pub enrollment_status: String,
    pub start_date: DateTime<Utc>,
    /// Open-ended while the enrollment is current
    pub end_date: Option<DateTime<Utc>>,
}

/// Legacy class membership mapped onto an active course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseClass {
    pub course_id: String,
    pub class_id: i64,
}
