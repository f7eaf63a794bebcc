//! Role, class and tenant configuration lookups.

use sqlx::Row;

use super::{json_array, SqliteStore};
use crate::{
    domain::{ConfigEntry, CourseClass},
    repository::{ConfigRepository, CourseClassRepository, OldClassRepository, StudentRepository},
    Error, Result,
};

#[async_trait::async_trait]
impl StudentRepository for SqliteStore {
    async fn is_user_id_a_student(&self, user_id: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS (SELECT 1 FROM students WHERE student_id = ? AND deleted_at IS NULL)",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(Error::database("is user id a student"))?;
        Ok(found == 1)
    }
}

#[async_trait::async_trait]
impl OldClassRepository for SqliteStore {
    async fn find_joined(&self, student_id: &str) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT class_id FROM class_members \
             WHERE user_id = ? AND status = 'active' AND deleted_at IS NULL ORDER BY class_id",
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await
        .map_err(Error::database("find joined classes"))
    }
}

#[async_trait::async_trait]
impl CourseClassRepository for SqliteStore {
    async fn find_active_course_class_by_id(&self, class_ids: &[i64]) -> Result<Vec<CourseClass>> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT course_id, class_id FROM courses_classes \
             WHERE status = 'active' AND deleted_at IS NULL \
               AND class_id IN (SELECT value FROM json_each(?)) \
             ORDER BY course_id, class_id",
        )
        .bind(json_array(class_ids)?)
        .fetch_all(self.pool())
        .await
        .map_err(Error::database("find active course classes"))?;

        Ok(rows
            .into_iter()
            .map(|(course_id, class_id)| CourseClass {
                course_id,
                class_id,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl ConfigRepository for SqliteStore {
    async fn get_config_with_resource_path(
        &self,
        country: &str,
        group: &str,
        keys: &[String],
        resource_path: &str,
    ) -> Result<Vec<ConfigEntry>> {
        let rows = sqlx::query(
            "SELECT config_key, config_group, country, config_value, resource_path FROM configs \
             WHERE deleted_at IS NULL AND country = ? AND config_group = ? AND resource_path = ? \
               AND config_key IN (SELECT value FROM json_each(?)) \
             ORDER BY config_key",
        )
        .bind(country)
        .bind(group)
        .bind(resource_path)
        .bind(json_array(keys)?)
        .fetch_all(self.pool())
        .await
        .map_err(Error::database("get config with resource path"))?;

        rows.iter()
            .map(|row| {
                let read = |column: &str| -> Result<String> {
                    row.try_get(column)
                        .map_err(|e| Error::invalid_data(format!("Failed to read {column}: {e}")))
                };
                Ok(ConfigEntry {
                    key: read("config_key")?,
                    group: read("config_group")?,
                    country: read("country")?,
                    value: read("config_value")?,
                    resource_path: read("resource_path")?,
                })
            })
            .collect()
    }
}
