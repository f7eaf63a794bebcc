//! Query arguments handed to the lesson storage.
//!
//! - [`EffectiveFilter`] - the role-adjusted filter of the live-lesson listing
//! - [`LessonListQuery`] - filter, time comparison and keyset cursor of the
//!   generic lesson listing
//! - [`LearnerPageQuery`] - one page of a lesson's members

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    domain::{SchedulingStatus, VirtualLesson},
    pagination::CombinedCursor,
};

// ============================================================================
// TIME COMPARISON
// ============================================================================

/// Which lesson time is compared against the request's current time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "snake_case")]
pub enum TimeLookup {
    #[default]
    StartTime,
    EndTime,
    /// End time, or any lesson not ended manually
    EndTimeIncludeWithoutEndAt,
    /// End time, or any lesson ended manually
    EndTimeIncludeWithEndAt,
}

/// Direction of the comparison `lesson time <op> current time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "snake_case")]
pub enum LessonTimeCompare {
    #[default]
    Future,
    FutureAndEqual,
    Past,
    PastAndEqual,
}

impl LessonTimeCompare {
    pub const fn sql_operator(self) -> &'static str {
        match self {
            Self::Future => ">",
            Self::FutureAndEqual => ">=",
            Self::Past => "<",
            Self::PastAndEqual => "<=",
        }
    }
}

/// Filter on whether a lesson was ended manually.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "snake_case")]
pub enum LiveLessonStatus {
    #[default]
    None,
    Ended,
    NotEnded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub const fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Ascending
        } else {
            Self::Descending
        }
    }

    pub const fn sql_keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

// ============================================================================
// LIVE LESSONS
// ============================================================================

/// Filter the live-lesson listing is allowed to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveFilter {
    pub location_ids: Vec<String>,
    pub course_ids: Vec<String>,
    /// Lessons must have one of these students as a member
    pub student_ids: Vec<String>,
    /// Lessons must be taught by one of these teachers
    pub teacher_ids: Vec<String>,
    pub scheduling_statuses: Vec<SchedulingStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Report the matched course instead of the lesson's primary course
    pub replace_course_id_column: bool,
}

impl EffectiveFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_location_ids(mut self, ids: Vec<String>) -> Self {
        self.location_ids = ids;
        self
    }

    #[must_use]
    pub fn with_course_ids(mut self, ids: Vec<String>) -> Self {
        self.course_ids = ids;
        self
    }

    #[must_use]
    pub fn with_scheduling_statuses(mut self, statuses: Vec<SchedulingStatus>) -> Self {
        self.scheduling_statuses = statuses;
        self
    }

    #[must_use]
    pub fn with_window(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Both bounds of the time window, when the caller gave both.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.from.zip(self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveLessonQuery {
    pub resource_path: String,
    pub filter: EffectiveFilter,
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl fmt::Display for LiveLessonQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "locations={:?} courses={:?} students={:?} teachers={:?} statuses={:?} limit={} offset={}",
            self.filter.location_ids,
            self.filter.course_ids,
            self.filter.student_ids,
            self.filter.teacher_ids,
            self.filter.scheduling_statuses,
            self.limit,
            self.offset
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveLessonPage {
    pub lessons: Vec<VirtualLesson>,
    pub total: u32,
}

// ============================================================================
// GENERIC LESSON LISTING
// ============================================================================

/// Caller-supplied filter of the generic lesson listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonFilter {
    #[serde(default)]
    pub teacher_ids: Vec<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub course_ids: Vec<String>,
    #[serde(default)]
    pub location_ids: Vec<String>,
    #[serde(default)]
    pub scheduling_statuses: Vec<SchedulingStatus>,
    /// Keep lessons ending at or after this instant
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,
    /// Keep lessons starting at or before this instant
    #[serde(default)]
    pub to_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub live_lesson_status: LiveLessonStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonListQuery {
    pub resource_path: String,
    pub current_time: DateTime<Utc>,
    pub time_lookup: TimeLookup,
    pub time_compare: LessonTimeCompare,
    pub sort: SortDirection,
    pub filter: LessonFilter,
    pub limit: u32,
    /// Last lesson of the previous page; `None` starts at the first row
    pub after_lesson_id: Option<String>,
}

impl LessonListQuery {
    pub fn new(resource_path: impl Into<String>, current_time: DateTime<Utc>, limit: u32) -> Self {
        Self {
            resource_path: resource_path.into(),
            current_time,
            time_lookup: TimeLookup::default(),
            time_compare: LessonTimeCompare::default(),
            sort: SortDirection::default(),
            filter: LessonFilter::default(),
            limit,
            after_lesson_id: None,
        }
    }

    #[must_use]
    pub fn with_time(mut self, lookup: TimeLookup, compare: LessonTimeCompare) -> Self {
        self.time_lookup = lookup;
        self.time_compare = compare;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortDirection) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: LessonFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Continue after `lesson_id`; an empty ID starts at the first row.
    #[must_use]
    pub fn after(mut self, lesson_id: impl Into<String>) -> Self {
        let id = lesson_id.into();
        self.after_lesson_id = (!id.is_empty()).then_some(id);
        self
    }
}

impl fmt::Display for LessonListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "now={} lookup={} compare={} sort={:?} limit={} after={:?} filter={:?}",
            self.current_time.to_rfc3339(),
            self.time_lookup,
            self.time_compare,
            self.sort,
            self.limit,
            self.after_lesson_id,
            self.filter
        )
    }
}

/// One page of the generic lesson listing as reported by storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonListPage {
    pub lessons: Vec<VirtualLesson>,
    /// All rows matching the filter
    pub total: u32,
    /// Cursor that yields the previous page; empty when that is the first page
    pub previous_offset: String,
    /// Rows remaining from the current cursor, this page included
    pub pre_total: u32,
}

// ============================================================================
// LEARNERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerPageQuery {
    /// Tenant the lesson must belong to
    pub resource_path: String,
    pub lesson_id: String,
    pub limit: u32,
    pub after: Option<CombinedCursor>,
}
