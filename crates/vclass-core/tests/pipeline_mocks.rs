//! Pipeline behaviour against hand-written repository doubles.
//!
//! The `SQLite` store backs every collaborator a test does not replace.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::doc_markdown
)]

mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use common::{add_student, ctx, hours, reader_with, reader_with_config, store, t0};
use vclass_core::{
    domain::{
        ConfigEntry, LessonMember, SchedulingStatus, TeachingMedium, TeachingMethod, VirtualLesson,
    },
    pagination::{CombinedCursor, LessonPaging},
    query::{
        LearnerPageQuery, LessonFilter, LessonListPage, LessonListQuery, LessonTimeCompare,
        LiveLessonPage, LiveLessonQuery, TimeLookup,
    },
    repository::{
        ConfigRepository, EnrollmentHistoryRepository, LessonMemberRepository, LessonRepository,
        StudentRepository,
    },
    service::{GetLessonsRequest, LearnersRequest, LiveLessonsRequest},
    Config, Error, ErrorKind, FeatureFlagClient, Repositories, Result, VirtualLessonReader,
};

fn lesson(id: &str, start_hour: i64) -> VirtualLesson {
    VirtualLesson {
        lesson_id: id.to_string(),
        name: format!("Lesson {id}"),
        center_id: "loc-1".into(),
        course_id: "course-1".into(),
        class_id: String::new(),
        teacher_id: String::new(),
        start_time: t0() + hours(start_hour),
        end_time: t0() + hours(start_hour + 1),
        end_at: None,
        scheduling_status: SchedulingStatus::Published,
        teaching_medium: TeachingMedium::Online,
        teaching_method: TeachingMethod::Individual,
        lesson_capacity: 0,
        zoom_link: String::new(),
        class_do_link: String::new(),
        teacher_ids: vec![],
        learner_ids: vec![],
    }
}

fn lessons_request(limit: u32) -> GetLessonsRequest {
    GetLessonsRequest {
        paging: Some(LessonPaging {
            limit,
            offset: String::new(),
        }),
        current_time: Some(t0()),
        time_lookup: TimeLookup::StartTime,
        lesson_time_compare: LessonTimeCompare::Future,
        sort_asc: true,
        filter: LessonFilter::default(),
    }
}

// =============================================================================
// DOUBLES
// =============================================================================

/// Serves a fixed listing page and counts single-lesson lookups.
#[derive(Default)]
struct ScriptedLessons {
    page: Mutex<Option<LessonListPage>>,
    seen_limit: Mutex<Option<u32>>,
    by_id_calls: AtomicUsize,
    fail: bool,
}

#[async_trait::async_trait]
impl LessonRepository for ScriptedLessons {
    async fn get_live_lessons(&self, _query: &LiveLessonQuery) -> Result<LiveLessonPage> {
        Ok(LiveLessonPage::default())
    }

    async fn get_lessons(&self, query: &LessonListQuery) -> Result<LessonListPage> {
        if self.fail {
            return Err(Error::invalid_data("corrupt lesson row"));
        }
        *self.seen_limit.lock().unwrap() = Some(query.limit);
        Ok(self.page.lock().unwrap().clone().unwrap_or_default())
    }

    async fn get_lesson_by_id(&self, lesson_id: &str, _resource_path: &str) -> Result<VirtualLesson> {
        self.by_id_calls.fetch_add(1, Ordering::SeqCst);
        Ok(lesson(lesson_id, 0))
    }
}

/// Lesson members with no learners at all.
#[derive(Default)]
struct EmptyMembers {
    page_calls: AtomicUsize,
}

#[async_trait::async_trait]
impl LessonMemberRepository for EmptyMembers {
    async fn get_learners_page(&self, _query: &LearnerPageQuery) -> Result<Vec<LessonMember>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }

    async fn get_members_by_lesson_ids(
        &self,
        _lesson_ids: &[String],
        _resource_path: &str,
    ) -> Result<Vec<LessonMember>> {
        Ok(vec![])
    }

    async fn get_course_accessible(&self, _student_id: &str) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

#[derive(Default)]
struct CountingEnrollment {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl EnrollmentHistoryRepository for CountingEnrollment {
    async fn get_status_history_by_student_ids_and_location_id(
        &self,
        _student_ids: &[String],
        _location_id: &str,
    ) -> Result<Vec<vclass_core::domain::EnrollmentStatusHistory>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }
}

/// Role lookup that never answers in time.
struct SlowStudents;

#[async_trait::async_trait]
impl StudentRepository for SlowStudents {
    async fn is_user_id_a_student(&self, _user_id: &str) -> Result<bool> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(false)
    }
}

struct BrokenConfigs;

#[async_trait::async_trait]
impl ConfigRepository for BrokenConfigs {
    async fn get_config_with_resource_path(
        &self,
        _country: &str,
        _group: &str,
        _keys: &[String],
        _resource_path: &str,
    ) -> Result<Vec<ConfigEntry>> {
        Err(Error::invalid_data("config value is not text"))
    }
}

struct UnreachableFlags;

#[async_trait::async_trait]
impl FeatureFlagClient for UnreachableFlags {
    async fn is_feature_enabled(&self, flag: &str, _environment: &str) -> Result<bool> {
        Err(Error::FeatureFlag {
            flag: flag.to_string(),
            reason: "connection refused".into(),
        })
    }
}

// =============================================================================
// CURSOR ASSEMBLY
// =============================================================================

#[tokio::test]
async fn given_remaining_rows_within_limit_then_next_offset_is_empty() {
    let store = store().await;
    let scripted = Arc::new(ScriptedLessons {
        page: Mutex::new(Some(LessonListPage {
            lessons: vec![lesson("a", 1), lesson("b", 2), lesson("c", 3), lesson("d", 4)],
            total: 9,
            previous_offset: "z".into(),
            pre_total: 4,
        })),
        ..ScriptedLessons::default()
    });
    let mut repos = Repositories::from_store(store.clone());
    repos.lessons = scripted.clone();

    let response = reader_with(repos, false)
        .get_lessons(&ctx("staff-1"), lessons_request(10))
        .await
        .unwrap();

    assert_eq!(response.items.len(), 4);
    assert_eq!(response.next_page.offset, "");
    assert_eq!(response.next_page.limit, 10);
    assert_eq!(response.previous_page.offset, "z");
    assert_eq!(response.total_items, 9);
    assert_eq!(response.total_lesson, 9);
    assert_eq!(*scripted.seen_limit.lock().unwrap(), Some(10));
}

#[tokio::test]
async fn given_more_rows_than_limit_then_next_offset_is_last_lesson() {
    let store = store().await;
    let scripted = Arc::new(ScriptedLessons {
        page: Mutex::new(Some(LessonListPage {
            lessons: vec![lesson("a", 1), lesson("b", 2)],
            total: 5,
            previous_offset: String::new(),
            pre_total: 5,
        })),
        ..ScriptedLessons::default()
    });
    let mut repos = Repositories::from_store(store.clone());
    repos.lessons = scripted;

    let response = reader_with(repos, false)
        .get_lessons(&ctx("staff-1"), lessons_request(2))
        .await
        .unwrap();

    assert_eq!(response.next_page.offset, "b");
}

// =============================================================================
// SHORT CIRCUITS
// =============================================================================

#[tokio::test]
async fn given_no_members_then_lesson_and_enrollment_are_never_consulted() {
    let store = store().await;
    let lessons = Arc::new(ScriptedLessons::default());
    let members = Arc::new(EmptyMembers::default());
    let enrollment = Arc::new(CountingEnrollment::default());
    let mut repos = Repositories::from_store(store.clone());
    repos.lessons = lessons.clone();
    repos.members = members.clone();
    repos.enrollment = enrollment.clone();

    let page = reader_with(repos, false)
        .get_learners_by_lesson_id(
            &ctx("staff-1"),
            LearnersRequest {
                lesson_id: "L1".into(),
                paging: None,
            },
        )
        .await
        .unwrap();

    assert!(page.learners.is_empty());
    assert_eq!(page.next_page, None);
    assert_eq!(members.page_calls.load(Ordering::SeqCst), 1);
    assert_eq!(lessons.by_id_calls.load(Ordering::SeqCst), 0);
    assert_eq!(enrollment.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_invalid_cursor_then_no_repository_is_called() {
    let store = store().await;
    let members = Arc::new(EmptyMembers::default());
    let mut repos = Repositories::from_store(store.clone());
    repos.members = members.clone();

    let err = reader_with(repos, false)
        .get_learners_by_lesson_id(
            &ctx("staff-1"),
            LearnersRequest {
                lesson_id: "L1".into(),
                paging: Some(vclass_core::pagination::CombinedPaging {
                    limit: 5,
                    offset: CombinedCursor::after("L9", "c1", "u1"),
                }),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(members.page_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn given_slow_collaborator_then_deadline_is_exceeded() {
    let store = store().await;
    let mut repos = Repositories::from_store(store.clone());
    repos.students = Arc::new(SlowStudents);
    let config = Config {
        request_timeout_ms: 50,
        ..Config::default()
    };

    let err = reader_with_config(repos, &config)
        .get_live_lessons_by_locations(&ctx("staff-1"), LiveLessonsRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn given_config_store_failure_then_error_is_internal_with_context() {
    let store = store().await;
    add_student(&store, "s-1").await;
    let mut repos = Repositories::from_store(store.clone());
    repos.configs = Arc::new(BrokenConfigs);

    let err = reader_with(repos, true)
        .get_live_lessons_by_locations(&ctx("s-1"), LiveLessonsRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    let message = err.to_string();
    assert!(message.contains("GetLiveLessonsByLocations"), "{message}");
    assert!(message.contains("GetConfigWithResourcePath"), "{message}");
    assert!(matches!(err.root(), Error::InvalidData(_)));
}

#[tokio::test]
async fn given_flag_service_failure_then_student_request_fails() {
    let store = store().await;
    add_student(&store, "s-1").await;
    let reader = VirtualLessonReader::new(
        Repositories::from_store(store.clone()),
        Arc::new(UnreachableFlags),
        &Config::default(),
    );

    let err = reader
        .get_live_lessons_by_locations(&ctx("s-1"), LiveLessonsRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("IsFeatureEnabled"));
}

#[tokio::test]
async fn given_flag_service_failure_then_staff_request_still_succeeds() {
    let store = store().await;
    let reader = VirtualLessonReader::new(
        Repositories::from_store(store.clone()),
        Arc::new(UnreachableFlags),
        &Config::default(),
    );

    let response = reader
        .get_live_lessons_by_locations(&ctx("staff-1"), LiveLessonsRequest::default())
        .await
        .unwrap();

    assert!(response.lessons.is_empty());
}

#[tokio::test]
async fn given_listing_failure_then_query_is_named_in_the_error() {
    let store = store().await;
    let mut repos = Repositories::from_store(store.clone());
    repos.lessons = Arc::new(ScriptedLessons {
        fail: true,
        ..ScriptedLessons::default()
    });

    let err = reader_with(repos, false)
        .get_lessons(&ctx("staff-1"), lessons_request(3))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("GetLessons(now="));
}
