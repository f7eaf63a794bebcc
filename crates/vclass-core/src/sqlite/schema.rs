//! Database schema definitions and initialization

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::{Error, Result};

/// Database schema as SQL string - executed once on open.
///
/// Instants are INTEGER Unix milliseconds; `deleted_at` marks soft deletes.
pub(crate) const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS lessons (
    lesson_id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    center_id TEXT NOT NULL DEFAULT '',
    course_id TEXT NOT NULL DEFAULT '',
    class_id TEXT NOT NULL DEFAULT '',
    teacher_id TEXT NOT NULL DEFAULT '',
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL,
    end_at INTEGER,
    scheduling_status TEXT NOT NULL DEFAULT 'published'
        CHECK(scheduling_status IN ('draft', 'published', 'completed', 'canceled')),
    teaching_medium TEXT NOT NULL DEFAULT 'online'
        CHECK(teaching_medium IN ('online', 'zoom', 'offline', 'hybrid', 'class_do')),
    teaching_method TEXT NOT NULL DEFAULT 'individual'
        CHECK(teaching_method IN ('individual', 'group')),
    lesson_capacity INTEGER NOT NULL DEFAULT 0,
    zoom_link TEXT NOT NULL DEFAULT '',
    class_do_link TEXT NOT NULL DEFAULT '',
    resource_path TEXT NOT NULL DEFAULT '',
    deleted_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_lessons_order ON lessons(start_time, end_time, lesson_id);
CREATE INDEX IF NOT EXISTS idx_lessons_center ON lessons(center_id);

CREATE TABLE IF NOT EXISTS lessons_courses (
    lesson_id TEXT NOT NULL,
    course_id TEXT NOT NULL,
    deleted_at INTEGER,
    PRIMARY KEY (lesson_id, course_id)
);

CREATE TABLE IF NOT EXISTS lessons_teachers (
    lesson_id TEXT NOT NULL,
    teacher_id TEXT NOT NULL,
    deleted_at INTEGER,
    PRIMARY KEY (lesson_id, teacher_id)
);

CREATE INDEX IF NOT EXISTS idx_lessons_teachers_teacher ON lessons_teachers(teacher_id);

CREATE TABLE IF NOT EXISTS lesson_members (
    lesson_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    course_id TEXT NOT NULL DEFAULT '',
    deleted_at INTEGER,
    PRIMARY KEY (lesson_id, course_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_lesson_members_user ON lesson_members(user_id);

CREATE TABLE IF NOT EXISTS student_enrollment_status_history (
    student_id TEXT NOT NULL,
    location_id TEXT NOT NULL,
    enrollment_status TEXT NOT NULL,
    start_date INTEGER NOT NULL,
    end_date INTEGER,
    deleted_at INTEGER,
    PRIMARY KEY (student_id, location_id, enrollment_status, start_date)
);

CREATE TABLE IF NOT EXISTS students (
    student_id TEXT PRIMARY KEY NOT NULL,
    deleted_at INTEGER
);

CREATE TABLE IF NOT EXISTS class_members (
    class_id INTEGER NOT NULL,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    deleted_at INTEGER,
    PRIMARY KEY (class_id, user_id)
);

CREATE TABLE IF NOT EXISTS courses_classes (
    course_id TEXT NOT NULL,
    class_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    deleted_at INTEGER,
    PRIMARY KEY (course_id, class_id)
);

CREATE TABLE IF NOT EXISTS configs (
    config_key TEXT NOT NULL,
    config_group TEXT NOT NULL,
    country TEXT NOT NULL,
    config_value TEXT NOT NULL DEFAULT '',
    resource_path TEXT NOT NULL DEFAULT '',
    deleted_at INTEGER,
    PRIMARY KEY (config_key, config_group, country, resource_path)
);
";

/// Create `SQLite` connection pool.
///
/// In-memory databases live in a single connection that is never recycled.
pub(crate) async fn create_connection_pool(db_url: &str) -> Result<SqlitePool> {
    let options = if db_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5).min_connections(1)
    };

    options
        .connect(db_url)
        .await
        .map_err(Error::database("connect"))
}

/// Initialize database schema
pub(crate) async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA)
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(Error::database("initialize schema"))
}
