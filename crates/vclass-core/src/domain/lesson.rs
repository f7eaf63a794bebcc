//! Lessons as stored by the scheduling side and read by the classroom.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::status::{project_status, LessonStatus};

/// Publication state of a scheduled lesson.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SchedulingStatus {
    Draft,
    Published,
    Completed,
    Canceled,
}

/// How a lesson is delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TeachingMedium {
    Online,
    Zoom,
    Offline,
    Hybrid,
    ClassDo,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TeachingMethod {
    Individual,
    Group,
}

/// A scheduled lesson.
///
/// `end_at` is only set when the lesson was ended manually or early. The
/// runtime status is never stored; see [`VirtualLesson::status_at`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualLesson {
    pub lesson_id: String,
    pub name: String,
    /// Location the lesson takes place at
    pub center_id: String,
    pub course_id: String,
    pub class_id: String,
    /// Primary teacher recorded on the lesson row
    pub teacher_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub scheduling_status: SchedulingStatus,
    pub teaching_medium: TeachingMedium,
    pub teaching_method: TeachingMethod,
    pub lesson_capacity: u32,
    pub zoom_link: String,
    pub class_do_link: String,
    /// Filled by the teacher enrichment step
    #[serde(default)]
    pub teacher_ids: Vec<String>,
    /// Filled by the learner enrichment step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learner_ids: Vec<String>,
}

impl VirtualLesson {
    pub fn status_at(&self, now: DateTime<Utc>) -> LessonStatus {
        project_status(self.start_time, self.end_time, self.end_at, now)
    }
}
