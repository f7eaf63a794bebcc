//! Page sizes and opaque cursors for the listing operations.
//!
//! Three paging styles are in use:
//!
//! - **Page number** (live lessons): `limit` + 1-based `page`
//! - **Single-field cursor** (lesson listing): the last returned lesson ID
//! - **Combined cursor** (learner listing): `(lesson/course key, user ID)` of
//!   the last returned member, both exclusive lower bounds

use serde::{Deserialize, Serialize};

use crate::{
    config::{PaginationConfig, MAX_PAGE_LIMIT},
    Error, Result,
};

/// Joins lesson ID and course ID inside a combined cursor. IDs never carry
/// ASCII control characters, so the key splits back unambiguously.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Clamp a caller-supplied limit: unset or out of `[1, max]` falls back to
/// the operation default.
pub const fn clamp_limit(requested: u32, default: u32, max: u32) -> u32 {
    if requested == 0 || requested > max {
        default
    } else {
        requested
    }
}

/// Per-operation page sizes resolved from configuration.
#[derive(Debug, Clone, Copy)]
pub struct CursorPaginator {
    config: PaginationConfig,
}

impl CursorPaginator {
    pub const fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    pub const fn lessons_limit(&self, requested: u32) -> u32 {
        clamp_limit(
            requested,
            self.config.lessons_default_limit,
            self.max_limit(),
        )
    }

    pub const fn live_lessons_limit(&self, requested: u32) -> u32 {
        clamp_limit(
            requested,
            self.config.live_lessons_default_limit,
            self.max_limit(),
        )
    }

    pub const fn learners_limit(&self, requested: u32) -> u32 {
        clamp_limit(
            requested,
            self.config.learners_default_limit,
            self.max_limit(),
        )
    }

    /// Configured maximum, never above [`MAX_PAGE_LIMIT`].
    const fn max_limit(&self) -> u32 {
        if self.config.max_limit > MAX_PAGE_LIMIT {
            MAX_PAGE_LIMIT
        } else {
            self.config.max_limit
        }
    }

    /// Offset for the cursor that follows a lesson page.
    ///
    /// Empty when the rows remaining from the current offset fit in this
    /// page, otherwise the last returned lesson ID.
    pub fn next_lesson_offset(last_lesson_id: Option<&str>, remaining: u32, limit: u32) -> String {
        if remaining <= limit {
            return String::new();
        }
        last_lesson_id.map(str::to_string).unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PAGE NUMBER PAGING
// ═══════════════════════════════════════════════════════════════════════════

/// `limit`/`page` paging; page 0 is treated as the first page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: u32,
    pub page: u32,
}

impl PageRequest {
    pub const fn page(&self) -> u32 {
        if self.page == 0 {
            1
        } else {
            self.page
        }
    }

    /// Rows to skip for this page at the given (already clamped) limit.
    pub const fn offset(&self, limit: u32) -> u32 {
        (self.page() - 1).saturating_mul(limit)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SINGLE-FIELD CURSOR
// ═══════════════════════════════════════════════════════════════════════════

/// Lesson-listing paging block; an empty offset starts at the first row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPaging {
    pub limit: u32,
    #[serde(default)]
    pub offset: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// COMBINED CURSOR
// ═══════════════════════════════════════════════════════════════════════════

/// Two-field cursor over lesson members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedCursor {
    /// Lesson ID and course ID joined by [`KEY_SEPARATOR`]
    pub lesson_course_id: String,
    pub user_id: String,
}

impl CombinedCursor {
    /// Cursor pointing just after the given member.
    pub fn after(lesson_id: &str, course_id: &str, user_id: &str) -> Self {
        Self {
            lesson_course_id: lesson_course_key(lesson_id, course_id),
            user_id: user_id.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lesson_course_id.is_empty() && self.user_id.is_empty()
    }

    /// Validate a cursor received for `lesson_id`.
    ///
    /// Returns `None` for an empty cursor (first page).
    pub fn decode(&self, lesson_id: &str) -> Result<Option<Self>> {
        if self.is_empty() {
            return Ok(None);
        }
        if self.user_id.is_empty() {
            return Err(Error::invalid_argument(
                "combined offset is missing its user ID",
            ));
        }
        let belongs_to_lesson = self
            .lesson_course_id
            .strip_prefix(lesson_id)
            .is_some_and(|rest| rest.starts_with(KEY_SEPARATOR));
        if !belongs_to_lesson {
            return Err(Error::invalid_argument(format!(
                "combined offset does not belong to lesson {lesson_id}"
            )));
        }
        Ok(Some(self.clone()))
    }

    /// Course ID part of the key, when well formed.
    pub fn course_id(&self) -> Option<&str> {
        self.lesson_course_id
            .split_once(KEY_SEPARATOR)
            .map(|(_, course)| course)
    }
}

pub fn lesson_course_key(lesson_id: &str, course_id: &str) -> String {
    format!("{lesson_id}{KEY_SEPARATOR}{course_id}")
}

/// Learner-listing paging block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedPaging {
    pub limit: u32,
    #[serde(default)]
    pub offset: CombinedCursor,
}
