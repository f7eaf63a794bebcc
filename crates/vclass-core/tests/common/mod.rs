//! Common fixtures for vclass-core integration tests
//!
//! Every test gets its own in-memory `SQLite` store seeded through plain SQL.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use vclass_core::{
    config::{FlagRule, DEFAULT_WHITELIST_FLAG},
    Config, RequestContext, Repositories, SqliteStore, StaticFeatureFlags, VirtualLessonReader,
};

pub const TENANT: &str = "tenant-1";

/// Fixed reference instant so ordering assertions are stable.
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}

pub async fn store() -> SqliteStore {
    SqliteStore::open("sqlite::memory:").await.unwrap()
}

pub fn ctx(user_id: &str) -> RequestContext {
    RequestContext::new(user_id, TENANT)
}

pub fn reader(store: &SqliteStore) -> VirtualLessonReader {
    reader_with(Repositories::from_store(store.clone()), false)
}

pub fn reader_with(repos: Repositories, whitelist_flag_on: bool) -> VirtualLessonReader {
    let mut config = Config::default();
    config.feature_flags.insert(
        DEFAULT_WHITELIST_FLAG.to_string(),
        FlagRule {
            enabled: whitelist_flag_on,
            environments: vec![],
        },
    );
    let flags = StaticFeatureFlags::new(config.feature_flags.clone());
    VirtualLessonReader::new(repos, Arc::new(flags), &config)
}

pub fn reader_with_config(repos: Repositories, config: &Config) -> VirtualLessonReader {
    let flags = StaticFeatureFlags::new(config.feature_flags.clone());
    VirtualLessonReader::new(repos, Arc::new(flags), config)
}

fn millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

/// A lesson row to insert.
#[derive(Debug, Clone)]
pub struct LessonSeed {
    pub lesson_id: String,
    pub center_id: String,
    pub course_id: String,
    pub teacher_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub scheduling_status: &'static str,
    pub teaching_medium: &'static str,
    pub class_do_link: String,
    pub resource_path: String,
    pub deleted: bool,
}

impl LessonSeed {
    pub fn new(lesson_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            lesson_id: lesson_id.to_string(),
            center_id: "loc-1".to_string(),
            course_id: "course-1".to_string(),
            teacher_id: String::new(),
            start,
            end,
            end_at: None,
            scheduling_status: "published",
            teaching_medium: "online",
            class_do_link: String::new(),
            resource_path: TENANT.to_string(),
            deleted: false,
        }
    }

    pub fn center(mut self, center_id: &str) -> Self {
        self.center_id = center_id.to_string();
        self
    }

    pub fn course(mut self, course_id: &str) -> Self {
        self.course_id = course_id.to_string();
        self
    }

    pub fn teacher(mut self, teacher_id: &str) -> Self {
        self.teacher_id = teacher_id.to_string();
        self
    }

    pub fn ended_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    pub fn status(mut self, status: &'static str) -> Self {
        self.scheduling_status = status;
        self
    }

    pub fn medium(mut self, medium: &'static str) -> Self {
        self.teaching_medium = medium;
        self
    }

    pub fn class_do(mut self, link: &str) -> Self {
        self.class_do_link = link.to_string();
        self
    }

    pub fn tenant(mut self, resource_path: &str) -> Self {
        self.resource_path = resource_path.to_string();
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub async fn insert(self, store: &SqliteStore) {
        sqlx::query(
            "INSERT INTO lessons (lesson_id, name, center_id, course_id, teacher_id, start_time, \
             end_time, end_at, scheduling_status, teaching_medium, class_do_link, resource_path, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.lesson_id)
        .bind(format!("Lesson {}", self.lesson_id))
        .bind(&self.center_id)
        .bind(&self.course_id)
        .bind(&self.teacher_id)
        .bind(millis(self.start))
        .bind(millis(self.end))
        .bind(self.end_at.map(millis))
        .bind(self.scheduling_status)
        .bind(self.teaching_medium)
        .bind(&self.class_do_link)
        .bind(&self.resource_path)
        .bind(self.deleted.then(|| millis(t0())))
        .execute(store.pool())
        .await
        .unwrap();
    }
}

pub async fn add_teacher(store: &SqliteStore, lesson_id: &str, teacher_id: &str) {
    sqlx::query("INSERT INTO lessons_teachers (lesson_id, teacher_id) VALUES (?, ?)")
        .bind(lesson_id)
        .bind(teacher_id)
        .execute(store.pool())
        .await
        .unwrap();
}

pub async fn add_lesson_course(store: &SqliteStore, lesson_id: &str, course_id: &str) {
    sqlx::query("INSERT INTO lessons_courses (lesson_id, course_id) VALUES (?, ?)")
        .bind(lesson_id)
        .bind(course_id)
        .execute(store.pool())
        .await
        .unwrap();
}

pub async fn add_member(store: &SqliteStore, lesson_id: &str, user_id: &str, course_id: &str) {
    sqlx::query("INSERT INTO lesson_members (lesson_id, user_id, course_id) VALUES (?, ?, ?)")
        .bind(lesson_id)
        .bind(user_id)
        .bind(course_id)
        .execute(store.pool())
        .await
        .unwrap();
}

pub async fn add_student(store: &SqliteStore, student_id: &str) {
    sqlx::query("INSERT INTO students (student_id) VALUES (?)")
        .bind(student_id)
        .execute(store.pool())
        .await
        .unwrap();
}

pub async fn add_class_member(store: &SqliteStore, class_id: i64, user_id: &str) {
    sqlx::query("INSERT INTO class_members (class_id, user_id) VALUES (?, ?)")
        .bind(class_id)
        .bind(user_id)
        .execute(store.pool())
        .await
        .unwrap();
}

pub async fn add_course_class(store: &SqliteStore, course_id: &str, class_id: i64, status: &str) {
    sqlx::query("INSERT INTO courses_classes (course_id, class_id, status) VALUES (?, ?, ?)")
        .bind(course_id)
        .bind(class_id)
        .bind(status)
        .execute(store.pool())
        .await
        .unwrap();
}

pub async fn add_whitelist(store: &SqliteStore, resource_path: &str, value: &str) {
    sqlx::query(
        "INSERT INTO configs (config_key, config_group, country, config_value, resource_path) \
         VALUES ('specificCourseIDsForLesson', 'lesson', 'COUNTRY_MASTER', ?, ?)",
    )
    .bind(value)
    .bind(resource_path)
    .execute(store.pool())
    .await
    .unwrap();
}

pub async fn add_enrollment(
    store: &SqliteStore,
    student_id: &str,
    location_id: &str,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) {
    sqlx::query(
        "INSERT INTO student_enrollment_status_history \
         (student_id, location_id, enrollment_status, start_date, end_date) VALUES (?, ?, 'enrolled', ?, ?)",
    )
    .bind(student_id)
    .bind(location_id)
    .bind(millis(start))
    .bind(end.map(millis))
    .execute(store.pool())
    .await
    .unwrap();
}
