//! Repository traits - the storage boundary of the read path.
//!
//! Each trait covers one collaborator the pipelines consult. The `SQLite`
//! store in [`crate::sqlite`] implements all of them; tests substitute
//! hand-written mocks.
//!
//! All methods are read-only and return the crate's [`Result`]. An empty
//! match is an empty collection, never an error.

use std::{collections::HashMap, sync::Arc};

use crate::{
    domain::{ConfigEntry, CourseClass, EnrollmentStatusHistory, LessonMember, VirtualLesson},
    query::{LearnerPageQuery, LessonListPage, LessonListQuery, LiveLessonPage, LiveLessonQuery},
    Result,
};

#[async_trait::async_trait]
pub trait LessonRepository: Send + Sync {
    /// Page of live lessons matching an effective filter, with the total.
    async fn get_live_lessons(&self, query: &LiveLessonQuery) -> Result<LiveLessonPage>;

    /// Keyset page of the generic lesson listing.
    async fn get_lessons(&self, query: &LessonListQuery) -> Result<LessonListPage>;

    /// Load one lesson of the tenant; a missing lesson is an error.
    async fn get_lesson_by_id(&self, lesson_id: &str, resource_path: &str) -> Result<VirtualLesson>;
}

#[async_trait::async_trait]
pub trait LessonTeacherRepository: Send + Sync {
    /// `lesson_id -> teacher IDs` for every lesson that has teachers.
    async fn get_teacher_ids_by_lesson_ids(
        &self,
        lesson_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>>;
}

#[async_trait::async_trait]
pub trait LessonMemberRepository: Send + Sync {
    /// Members ordered by `(lesson/course key, user ID)` after the cursor.
    async fn get_learners_page(&self, query: &LearnerPageQuery) -> Result<Vec<LessonMember>>;

    /// Every member of each of the tenant's lessons, in one round trip.
    async fn get_members_by_lesson_ids(
        &self,
        lesson_ids: &[String],
        resource_path: &str,
    ) -> Result<Vec<LessonMember>>;

    /// Courses the student currently reaches through lesson memberships.
    async fn get_course_accessible(&self, student_id: &str) -> Result<Vec<String>>;
}

#[async_trait::async_trait]
pub trait EnrollmentHistoryRepository: Send + Sync {
    async fn get_status_history_by_student_ids_and_location_id(
        &self,
        student_ids: &[String],
        location_id: &str,
    ) -> Result<Vec<EnrollmentStatusHistory>>;
}

#[async_trait::async_trait]
pub trait StudentRepository: Send + Sync {
    async fn is_user_id_a_student(&self, user_id: &str) -> Result<bool>;
}

/// Legacy class membership.
#[async_trait::async_trait]
pub trait OldClassRepository: Send + Sync {
    /// Classes the student has joined.
    async fn find_joined(&self, student_id: &str) -> Result<Vec<i64>>;
}

#[async_trait::async_trait]
pub trait CourseClassRepository: Send + Sync {
    /// Active course assignments of the given classes.
    async fn find_active_course_class_by_id(&self, class_ids: &[i64]) -> Result<Vec<CourseClass>>;
}

/// Tenant-scoped configuration store.
#[async_trait::async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn get_config_with_resource_path(
        &self,
        country: &str,
        group: &str,
        keys: &[String],
        resource_path: &str,
    ) -> Result<Vec<ConfigEntry>>;
}

/// Every repository the read path needs, shareable across requests.
#[derive(Clone)]
pub struct Repositories {
    pub lessons: Arc<dyn LessonRepository>,
    pub teachers: Arc<dyn LessonTeacherRepository>,
    pub members: Arc<dyn LessonMemberRepository>,
    pub enrollment: Arc<dyn EnrollmentHistoryRepository>,
    pub students: Arc<dyn StudentRepository>,
    pub old_classes: Arc<dyn OldClassRepository>,
    pub course_classes: Arc<dyn CourseClassRepository>,
    pub configs: Arc<dyn ConfigRepository>,
}

impl Repositories {
    /// Back every repository with the same store.
    pub fn from_store<S>(store: S) -> Self
    where
        S: LessonRepository
            + LessonTeacherRepository
            + LessonMemberRepository
            + EnrollmentHistoryRepository
            + StudentRepository
            + OldClassRepository
            + CourseClassRepository
            + ConfigRepository
            + 'static,
    {
        let store = Arc::new(store);
        Self {
            lessons: store.clone(),
            teachers: store.clone(),
            members: store.clone(),
            enrollment: store.clone(),
            students: store.clone(),
            old_classes: store.clone(),
            course_classes: store.clone(),
            configs: store,
        }
    }
}
