//! Lesson queries: live-lesson pages, keyset lesson listing, single lookup.

use std::str::FromStr;

use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::{from_millis, json_array, to_count, to_millis, SqliteStore};
use crate::{
    domain::{SchedulingStatus, TeachingMedium, TeachingMethod, VirtualLesson},
    query::{
        LessonListPage, LessonListQuery, LiveLessonPage, LiveLessonQuery, LiveLessonStatus,
        SortDirection, TimeLookup,
    },
    repository::LessonRepository,
    Error, Result,
};

const LESSON_COLUMNS_BEFORE_COURSE: &str = "l.lesson_id, l.name, l.center_id";
const LESSON_COLUMNS_AFTER_COURSE: &str = "l.class_id, l.teacher_id, l.start_time, l.end_time, \
     l.end_at, l.scheduling_status, l.teaching_medium, l.teaching_method, l.lesson_capacity, \
     l.zoom_link, l.class_do_link";

/// Ordering tuple of a lesson: `(start_time, end_time, lesson_id)`.
type SortKey = (i64, i64, String);

fn read<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| Error::invalid_data(format!("Failed to read {column}: {e}")))
}

fn parse_enum<T: FromStr>(column: &str, value: &str) -> Result<T> {
    T::from_str(value).map_err(|_| Error::invalid_data(format!("Invalid {column} value '{value}'")))
}

/// Parse a database row into a `VirtualLesson`
fn parse_lesson_row(row: &SqliteRow) -> Result<VirtualLesson> {
    let scheduling_status: String = read(row, "scheduling_status")?;
    let teaching_medium: String = read(row, "teaching_medium")?;
    let teaching_method: String = read(row, "teaching_method")?;
    let capacity: i64 = read(row, "lesson_capacity")?;
    let end_at: Option<i64> = read(row, "end_at")?;

    Ok(VirtualLesson {
        lesson_id: read(row, "lesson_id")?,
        name: read(row, "name")?,
        center_id: read(row, "center_id")?,
        course_id: read(row, "course_id")?,
        class_id: read(row, "class_id")?,
        teacher_id: read(row, "teacher_id")?,
        start_time: from_millis("start_time", read(row, "start_time")?)?,
        end_time: from_millis("end_time", read(row, "end_time")?)?,
        end_at: end_at
            .map(|millis| from_millis("end_at", millis))
            .transpose()?,
        scheduling_status: parse_enum::<SchedulingStatus>("scheduling_status", &scheduling_status)?,
        teaching_medium: parse_enum::<TeachingMedium>("teaching_medium", &teaching_medium)?,
        teaching_method: parse_enum::<TeachingMethod>("teaching_method", &teaching_method)?,
        lesson_capacity: to_count("lesson_capacity", capacity)?,
        zoom_link: read(row, "zoom_link")?,
        class_do_link: read(row, "class_do_link")?,
        teacher_ids: Vec::new(),
        learner_ids: Vec::new(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// SHARED FILTER FRAGMENTS
// ═══════════════════════════════════════════════════════════════════════════

/// `SELECT` list; `replace_courses` reports the matched course instead of
/// the primary one for lessons reached through `lessons_courses`.
fn push_columns(qb: &mut QueryBuilder<'_, Sqlite>, replace_courses: Option<&str>) {
    qb.push(LESSON_COLUMNS_BEFORE_COURSE);
    match replace_courses {
        Some(courses) => {
            qb.push(", CASE WHEN l.course_id IN (SELECT value FROM json_each(")
                .push_bind(courses.to_string())
                .push(")) THEN l.course_id ELSE COALESCE((SELECT MIN(lc.course_id) FROM lessons_courses lc WHERE lc.lesson_id = l.lesson_id AND lc.deleted_at IS NULL AND lc.course_id IN (SELECT value FROM json_each(")
                .push_bind(courses.to_string())
                .push("))), l.course_id) END AS course_id, ");
        }
        None => {
            qb.push(", l.course_id, ");
        }
    }
    qb.push(LESSON_COLUMNS_AFTER_COURSE);
}

fn push_in(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, json: String) {
    qb.push(" AND ")
        .push(column)
        .push(" IN (SELECT value FROM json_each(")
        .push_bind(json)
        .push("))");
}

fn push_course_filter(qb: &mut QueryBuilder<'_, Sqlite>, json: &str) {
    qb.push(" AND (l.course_id IN (SELECT value FROM json_each(")
        .push_bind(json.to_string())
        .push(")) OR EXISTS (SELECT 1 FROM lessons_courses lc WHERE lc.lesson_id = l.lesson_id AND lc.deleted_at IS NULL AND lc.course_id IN (SELECT value FROM json_each(")
        .push_bind(json.to_string())
        .push("))))");
}

fn push_student_filter(qb: &mut QueryBuilder<'_, Sqlite>, json: String) {
    qb.push(" AND EXISTS (SELECT 1 FROM lesson_members lm WHERE lm.lesson_id = l.lesson_id AND lm.deleted_at IS NULL AND lm.user_id IN (SELECT value FROM json_each(")
        .push_bind(json)
        .push(")))");
}

fn push_teacher_filter(qb: &mut QueryBuilder<'_, Sqlite>, json: String) {
    qb.push(" AND EXISTS (SELECT 1 FROM lessons_teachers lt WHERE lt.lesson_id = l.lesson_id AND lt.deleted_at IS NULL AND lt.teacher_id IN (SELECT value FROM json_each(")
        .push_bind(json)
        .push(")))");
}

fn status_strings(statuses: &[SchedulingStatus]) -> Vec<String> {
    statuses.iter().map(ToString::to_string).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// LIVE LESSONS
// ═══════════════════════════════════════════════════════════════════════════

fn push_live_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &LiveLessonQuery) -> Result<()> {
    let filter = &query.filter;
    qb.push(" FROM lessons l WHERE l.deleted_at IS NULL AND l.resource_path = ")
        .push_bind(query.resource_path.clone());

    if !filter.location_ids.is_empty() {
        push_in(qb, "l.center_id", json_array(&filter.location_ids)?);
    }
    if !filter.course_ids.is_empty() {
        push_course_filter(qb, &json_array(&filter.course_ids)?);
    }
    if !filter.student_ids.is_empty() {
        push_student_filter(qb, json_array(&filter.student_ids)?);
    }
    if !filter.teacher_ids.is_empty() {
        push_teacher_filter(qb, json_array(&filter.teacher_ids)?);
    }
    if !filter.scheduling_statuses.is_empty() {
        push_in(
            qb,
            "l.scheduling_status",
            json_array(&status_strings(&filter.scheduling_statuses))?,
        );
    }
    if let Some((from, to)) = filter.window() {
        qb.push(" AND l.start_time <= ")
            .push_bind(to_millis(to))
            .push(" AND l.end_time >= ")
            .push_bind(to_millis(from));
    }
    Ok(())
}

impl SqliteStore {
    async fn count_live_lessons(&self, query: &LiveLessonQuery) -> Result<u32> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        push_live_filters(&mut qb, query)?;
        let total = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(Error::database("count live lessons"))?;
        to_count("total", total)
    }

    async fn fetch_live_lessons(&self, query: &LiveLessonQuery) -> Result<Vec<VirtualLesson>> {
        let replace = (query.filter.replace_course_id_column && !query.filter.course_ids.is_empty())
            .then(|| json_array(&query.filter.course_ids))
            .transpose()?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        push_columns(&mut qb, replace.as_deref());
        push_live_filters(&mut qb, query)?;
        qb.push(" ORDER BY l.start_time ASC, l.end_time ASC, l.lesson_id ASC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));

        qb.build()
            .fetch_all(self.pool())
            .await
            .map_err(Error::database("get live lessons"))?
            .iter()
            .map(parse_lesson_row)
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GENERIC LESSON LISTING
// ═══════════════════════════════════════════════════════════════════════════

fn push_list_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &LessonListQuery) -> Result<()> {
    let filter = &query.filter;
    let op = query.time_compare.sql_operator();
    let now = to_millis(query.current_time);

    qb.push(" FROM lessons l WHERE l.deleted_at IS NULL AND l.resource_path = ")
        .push_bind(query.resource_path.clone());

    match query.time_lookup {
        TimeLookup::StartTime => {
            qb.push(" AND l.start_time ").push(op).push(" ").push_bind(now);
        }
        TimeLookup::EndTime => {
            qb.push(" AND l.end_time ").push(op).push(" ").push_bind(now);
        }
        TimeLookup::EndTimeIncludeWithoutEndAt => {
            qb.push(" AND (l.end_time ")
                .push(op)
                .push(" ")
                .push_bind(now)
                .push(" OR l.end_at IS NULL)");
        }
        TimeLookup::EndTimeIncludeWithEndAt => {
            qb.push(" AND (l.end_time ")
                .push(op)
                .push(" ")
                .push_bind(now)
                .push(" OR l.end_at IS NOT NULL)");
        }
    }

    if let Some(from) = filter.from_date {
        qb.push(" AND l.end_time >= ").push_bind(to_millis(from));
    }
    if let Some(to) = filter.to_date {
        qb.push(" AND l.start_time <= ").push_bind(to_millis(to));
    }
    match filter.live_lesson_status {
        LiveLessonStatus::None => {}
        LiveLessonStatus::Ended => {
            qb.push(" AND l.end_at IS NOT NULL");
        }
        LiveLessonStatus::NotEnded => {
            qb.push(" AND l.end_at IS NULL");
        }
    }

    if !filter.teacher_ids.is_empty() {
        push_teacher_filter(qb, json_array(&filter.teacher_ids)?);
    }
    if !filter.student_ids.is_empty() {
        push_student_filter(qb, json_array(&filter.student_ids)?);
    }
    if !filter.course_ids.is_empty() {
        push_course_filter(qb, &json_array(&filter.course_ids)?);
    }
    if !filter.location_ids.is_empty() {
        push_in(qb, "l.center_id", json_array(&filter.location_ids)?);
    }
    if !filter.scheduling_statuses.is_empty() {
        push_in(
            qb,
            "l.scheduling_status",
            json_array(&status_strings(&filter.scheduling_statuses))?,
        );
    }
    Ok(())
}

/// Restrict to rows on one side of `anchor` in sort-key order.
fn push_keyset(qb: &mut QueryBuilder<'_, Sqlite>, anchor: &SortKey, op: &str) {
    qb.push(" AND (l.start_time, l.end_time, l.lesson_id) ")
        .push(op)
        .push(" (")
        .push_bind(anchor.0)
        .push(", ")
        .push_bind(anchor.1)
        .push(", ")
        .push_bind(anchor.2.clone())
        .push(")");
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, sort: SortDirection) {
    let dir = sort.sql_keyword();
    qb.push(format!(
        " ORDER BY l.start_time {dir}, l.end_time {dir}, l.lesson_id {dir}"
    ));
}

const fn reversed(sort: SortDirection) -> SortDirection {
    match sort {
        SortDirection::Ascending => SortDirection::Descending,
        SortDirection::Descending => SortDirection::Ascending,
    }
}

/// Keyset operators `(after current cursor, at or before current cursor)`.
const fn keyset_operators(sort: SortDirection) -> (&'static str, &'static str) {
    match sort {
        SortDirection::Ascending => (">", "<="),
        SortDirection::Descending => ("<", ">="),
    }
}

impl SqliteStore {
    /// Sort key of the tenant's cursor lesson, deleted or not.
    async fn sort_key_of(&self, lesson_id: &str, resource_path: &str) -> Result<Option<SortKey>> {
        sqlx::query_as::<_, SortKey>(
            "SELECT start_time, end_time, lesson_id FROM lessons \
             WHERE lesson_id = ? AND resource_path = ?",
        )
        .bind(lesson_id)
        .bind(resource_path)
        .fetch_optional(self.pool())
        .await
        .map_err(Error::database("resolve lesson cursor"))
    }

    async fn count_lessons(
        &self,
        query: &LessonListQuery,
        after: Option<(&SortKey, &str)>,
    ) -> Result<u32> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        push_list_filters(&mut qb, query)?;
        if let Some((anchor, op)) = after {
            push_keyset(&mut qb, anchor, op);
        }
        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(Error::database("count lessons"))?;
        to_count("count", count)
    }

    async fn fetch_lesson_page(
        &self,
        query: &LessonListQuery,
        anchor: Option<&SortKey>,
    ) -> Result<Vec<VirtualLesson>> {
        let (after_op, _) = keyset_operators(query.sort);
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        push_columns(&mut qb, None);
        push_list_filters(&mut qb, query)?;
        if let Some(anchor) = anchor {
            push_keyset(&mut qb, anchor, after_op);
        }
        push_order(&mut qb, query.sort);
        qb.push(" LIMIT ").push_bind(i64::from(query.limit));

        qb.build()
            .fetch_all(self.pool())
            .await
            .map_err(Error::database("get lessons"))?
            .iter()
            .map(parse_lesson_row)
            .collect()
    }

    /// Cursor producing the page before the current one.
    ///
    /// Walking backwards from the current cursor, the previous page covers
    /// the first `limit` rows; the row after those is its cursor.
    async fn previous_offset(&self, query: &LessonListQuery, anchor: &SortKey) -> Result<String> {
        let (_, before_op) = keyset_operators(query.sort);
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT l.lesson_id");
        push_list_filters(&mut qb, query)?;
        push_keyset(&mut qb, anchor, before_op);
        push_order(&mut qb, reversed(query.sort));
        qb.push(" LIMIT 1 OFFSET ").push_bind(i64::from(query.limit));

        let id = qb
            .build_query_scalar::<String>()
            .fetch_optional(self.pool())
            .await
            .map_err(Error::database("resolve previous page"))?;
        Ok(id.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl LessonRepository for SqliteStore {
    async fn get_live_lessons(&self, query: &LiveLessonQuery) -> Result<LiveLessonPage> {
        tracing::debug!(%query, "querying live lessons");
        let total = self.count_live_lessons(query).await?;
        let lessons = if total == 0 {
            Vec::new()
        } else {
            self.fetch_live_lessons(query).await?
        };
        Ok(LiveLessonPage { lessons, total })
    }

    async fn get_lessons(&self, query: &LessonListQuery) -> Result<LessonListPage> {
        tracing::debug!(%query, "querying lessons");
        let anchor = match query.after_lesson_id.as_deref() {
            Some(id) => self.sort_key_of(id, &query.resource_path).await?,
            None => None,
        };
        if anchor.is_none() && query.after_lesson_id.is_some() {
            tracing::debug!(after = ?query.after_lesson_id, "unknown cursor, starting over");
        }

        let total = self.count_lessons(query, None).await?;
        let (lessons, pre_total, previous_offset) = match &anchor {
            Some(key) => {
                let (after_op, _) = keyset_operators(query.sort);
                let pre_total = self.count_lessons(query, Some((key, after_op))).await?;
                let lessons = self.fetch_lesson_page(query, Some(key)).await?;
                let previous = self.previous_offset(query, key).await?;
                (lessons, pre_total, previous)
            }
            None => {
                let lessons = self.fetch_lesson_page(query, None).await?;
                (lessons, total, String::new())
            }
        };

        Ok(LessonListPage {
            lessons,
            total,
            previous_offset,
            pre_total,
        })
    }

    async fn get_lesson_by_id(&self, lesson_id: &str, resource_path: &str) -> Result<VirtualLesson> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        push_columns(&mut qb, None);
        qb.push(" FROM lessons l WHERE l.deleted_at IS NULL AND l.lesson_id = ")
            .push_bind(lesson_id.to_string())
            .push(" AND l.resource_path = ")
            .push_bind(resource_path.to_string());

        let row = qb
            .build()
            .fetch_one(self.pool())
            .await
            .map_err(Error::database("get lesson by id"))?;
        parse_lesson_row(&row)
    }
}
