//! Runtime lesson status, derived from time fields only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Derive the status of a lesson at `now`.
///
/// A lesson that has not reached its start is not started even when it was
/// ended early; otherwise either passing `end_time` or having an `end_at`
/// completes it.
pub fn project_status(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> LessonStatus {
    if start_time >= now {
        LessonStatus::NotStarted
    } else if end_time < now || end_at.is_some() {
        LessonStatus::Completed
    } else {
        LessonStatus::InProgress
    }
}
