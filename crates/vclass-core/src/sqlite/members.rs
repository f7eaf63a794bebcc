//! Lesson members, teacher assignments and enrollment history.

use std::collections::HashMap;

use itertools::Itertools;
use sqlx::{sqlite::SqliteRow, Row};

use super::{from_millis, json_array, SqliteStore};
use crate::{
    domain::{EnrollmentStatusHistory, LessonMember},
    pagination::KEY_SEPARATOR,
    query::LearnerPageQuery,
    repository::{EnrollmentHistoryRepository, LessonMemberRepository, LessonTeacherRepository},
    Error, Result,
};

fn parse_member_row(row: &SqliteRow) -> Result<LessonMember> {
    let read = |column: &str| -> Result<String> {
        row.try_get(column)
            .map_err(|e| Error::invalid_data(format!("Failed to read {column}: {e}")))
    };
    Ok(LessonMember {
        lesson_id: read("lesson_id")?,
        user_id: read("user_id")?,
        course_id: read("course_id")?,
    })
}

fn parse_history_row(row: &SqliteRow) -> Result<EnrollmentStatusHistory> {
    let text = |column: &str| -> Result<String> {
        row.try_get(column)
            .map_err(|e| Error::invalid_data(format!("Failed to read {column}: {e}")))
    };
    let start: i64 = row
        .try_get("start_date")
        .map_err(|e| Error::invalid_data(format!("Failed to read start_date: {e}")))?;
    let end: Option<i64> = row
        .try_get("end_date")
        .map_err(|e| Error::invalid_data(format!("Failed to read end_date: {e}")))?;

    Ok(EnrollmentStatusHistory {
        student_id: text("student_id")?,
        location_id: text("location_id")?,
        enrollment_status: text("enrollment_status")?,
        start_date: from_millis("start_date", start)?,
        end_date: end.map(|millis| from_millis("end_date", millis)).transpose()?,
    })
}

/// Members only count when their lesson is a live lesson of the tenant.
const TENANT_SCOPE: &str = "EXISTS (SELECT 1 FROM lessons l WHERE l.lesson_id = lm.lesson_id \
     AND l.deleted_at IS NULL AND l.resource_path = ?)";

#[async_trait::async_trait]
impl LessonMemberRepository for SqliteStore {
    async fn get_learners_page(&self, query: &LearnerPageQuery) -> Result<Vec<LessonMember>> {
        tracing::debug!(
            lesson_id = %query.lesson_id,
            limit = query.limit,
            after = ?query.after,
            "paging lesson members"
        );
        // Cursor key compared exactly as the cursor is encoded
        let key = format!("lm.lesson_id || char({}) || lm.course_id", u32::from(KEY_SEPARATOR));

        let rows = match &query.after {
            Some(cursor) => {
                let sql = format!(
                    "SELECT lm.lesson_id, lm.user_id, lm.course_id FROM lesson_members lm \
                     WHERE lm.lesson_id = ? AND lm.deleted_at IS NULL AND {TENANT_SCOPE} \
                       AND ({key}, lm.user_id) > (?, ?) \
                     ORDER BY {key} ASC, lm.user_id ASC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(&query.lesson_id)
                    .bind(&query.resource_path)
                    .bind(&cursor.lesson_course_id)
                    .bind(&cursor.user_id)
                    .bind(i64::from(query.limit))
                    .fetch_all(self.pool())
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT lm.lesson_id, lm.user_id, lm.course_id FROM lesson_members lm \
                     WHERE lm.lesson_id = ? AND lm.deleted_at IS NULL AND {TENANT_SCOPE} \
                     ORDER BY {key} ASC, lm.user_id ASC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(&query.lesson_id)
                    .bind(&query.resource_path)
                    .bind(i64::from(query.limit))
                    .fetch_all(self.pool())
                    .await
            }
        }
        .map_err(Error::database("get learners by lesson id"))?;

        rows.iter().map(parse_member_row).collect()
    }

    async fn get_members_by_lesson_ids(
        &self,
        lesson_ids: &[String],
        resource_path: &str,
    ) -> Result<Vec<LessonMember>> {
        if lesson_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT lm.lesson_id, lm.user_id, lm.course_id FROM lesson_members lm \
             WHERE lm.deleted_at IS NULL AND lm.lesson_id IN (SELECT value FROM json_each(?)) \
               AND {TENANT_SCOPE} \
             ORDER BY lm.lesson_id, lm.user_id, lm.course_id"
        );
        let rows = sqlx::query(&sql)
            .bind(json_array(lesson_ids)?)
            .bind(resource_path)
            .fetch_all(self.pool())
            .await
            .map_err(Error::database("get learners by lesson ids"))?;

        rows.iter().map(parse_member_row).collect()
    }

    async fn get_course_accessible(&self, student_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT course_id FROM lesson_members \
             WHERE user_id = ? AND deleted_at IS NULL AND course_id <> '' ORDER BY course_id",
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await
        .map_err(Error::database("get course accessible"))
    }
}

#[async_trait::async_trait]
impl LessonTeacherRepository for SqliteStore {
    async fn get_teacher_ids_by_lesson_ids(
        &self,
        lesson_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        if lesson_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pairs = sqlx::query_as::<_, (String, String)>(
            "SELECT lesson_id, teacher_id FROM lessons_teachers \
             WHERE deleted_at IS NULL AND lesson_id IN (SELECT value FROM json_each(?)) \
             ORDER BY lesson_id, teacher_id",
        )
        .bind(json_array(lesson_ids)?)
        .fetch_all(self.pool())
        .await
        .map_err(Error::database("get teacher ids by lesson ids"))?;

        Ok(pairs.into_iter().into_group_map())
    }
}

#[async_trait::async_trait]
impl EnrollmentHistoryRepository for SqliteStore {
    async fn get_status_history_by_student_ids_and_location_id(
        &self,
        student_ids: &[String],
        location_id: &str,
    ) -> Result<Vec<EnrollmentStatusHistory>> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT student_id, location_id, enrollment_status, start_date, end_date \
             FROM student_enrollment_status_history \
             WHERE deleted_at IS NULL AND location_id = ? \
               AND student_id IN (SELECT value FROM json_each(?)) \
             ORDER BY student_id, start_date",
        )
        .bind(location_id)
        .bind(json_array(student_ids)?)
        .fetch_all(self.pool())
        .await
        .map_err(Error::database("get enrollment status history"))?;

        rows.iter().map(parse_history_row).collect()
    }
}
