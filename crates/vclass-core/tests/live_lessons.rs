//! Live lessons by location: role-based visibility, status projection and
//! page-number pagination.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::doc_markdown
)]

mod common;

use common::{
    add_class_member, add_course_class, add_lesson_course, add_member, add_student, add_teacher,
    add_whitelist, ctx, hours, reader, reader_with, reader_with_config, store, t0, LessonSeed, TENANT,
};
use vclass_core::{
    config::{FlagRule, DEFAULT_WHITELIST_FLAG},
    domain::LessonStatus,
    pagination::PageRequest,
    service::{LiveLessonsRequest, LiveLessonsResponse},
    Config, Repositories, SqliteStore,
};

fn ids(response: &LiveLessonsResponse) -> Vec<&str> {
    response
        .lessons
        .iter()
        .map(|lesson| lesson.lesson_id.as_str())
        .collect()
}

fn for_courses(courses: &[&str]) -> LiveLessonsRequest {
    LiveLessonsRequest {
        course_ids: courses.iter().map(ToString::to_string).collect(),
        ..LiveLessonsRequest::default()
    }
}

/// A student `s-1` with:
/// - class 7 mapped to `math` (active) and class 8 mapped to `art` (inactive)
/// - memberships in M (math), A (art) and H (history) lessons
/// - lesson N (math) they are not a member of
async fn student_fixture() -> SqliteStore {
    let store = store().await;
    add_student(&store, "s-1").await;
    add_class_member(&store, 7, "s-1").await;
    add_class_member(&store, 8, "s-1").await;
    add_course_class(&store, "math", 7, "active").await;
    add_course_class(&store, "art", 8, "inactive").await;

    LessonSeed::new("M", t0() + hours(1), t0() + hours(2))
        .course("math")
        .insert(&store)
        .await;
    LessonSeed::new("H", t0() + hours(2), t0() + hours(3))
        .course("history")
        .insert(&store)
        .await;
    LessonSeed::new("A", t0() + hours(3), t0() + hours(4))
        .course("art")
        .insert(&store)
        .await;
    LessonSeed::new("N", t0() + hours(4), t0() + hours(5))
        .course("math")
        .insert(&store)
        .await;

    // Memberships without a course do not grant course access
    add_member(&store, "M", "s-1", "").await;
    add_member(&store, "A", "s-1", "").await;
    add_member(&store, "H", "s-1", "history").await;
    store
}

// =============================================================================
// STAFF VISIBILITY
// =============================================================================

#[tokio::test]
async fn given_teacher_without_course_filter_then_only_assigned_lessons_are_listed() {
    let store = store().await;
    LessonSeed::new("mine", t0() + hours(1), t0() + hours(2))
        .teacher("t-1")
        .insert(&store)
        .await;
    LessonSeed::new("other", t0() + hours(2), t0() + hours(3))
        .teacher("t-2")
        .insert(&store)
        .await;
    add_teacher(&store, "mine", "t-1").await;
    add_teacher(&store, "other", "t-2").await;

    let response = reader(&store)
        .get_live_lessons_by_locations(&ctx("t-1"), LiveLessonsRequest::default())
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["mine"]);
    assert_eq!(response.total, 1);
    let teacher = response.lessons[0].teacher.as_ref().unwrap();
    assert_eq!(teacher.user_id, "t-1");
}

#[tokio::test]
async fn given_staff_course_filter_then_course_column_reports_matched_course() {
    let store = store().await;
    LessonSeed::new("primary", t0() + hours(1), t0() + hours(2))
        .course("math")
        .insert(&store)
        .await;
    LessonSeed::new("secondary", t0() + hours(2), t0() + hours(3))
        .course("bio")
        .insert(&store)
        .await;
    LessonSeed::new("unrelated", t0() + hours(3), t0() + hours(4))
        .course("art")
        .insert(&store)
        .await;
    add_lesson_course(&store, "secondary", "math").await;

    let response = reader(&store)
        .get_live_lessons_by_locations(&ctx("staff-1"), for_courses(&["math"]))
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["primary", "secondary"]);
    assert!(response.lessons.iter().all(|lesson| lesson.course_id == "math"));
    assert!(
        response.lessons.iter().all(|lesson| lesson.teacher.is_none()),
        "lessons without a primary teacher carry no profile"
    );
}

#[tokio::test]
async fn given_location_filter_then_only_those_centers_are_listed() {
    let store = store().await;
    LessonSeed::new("north", t0() + hours(1), t0() + hours(2))
        .center("loc-north")
        .insert(&store)
        .await;
    LessonSeed::new("south", t0() + hours(1), t0() + hours(2))
        .center("loc-south")
        .insert(&store)
        .await;

    let response = reader(&store)
        .get_live_lessons_by_locations(
            &ctx("staff-1"),
            LiveLessonsRequest {
                location_ids: vec!["loc-south".into()],
                ..for_courses(&["course-1"])
            },
        )
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["south"]);
}

// =============================================================================
// STUDENT VISIBILITY
// =============================================================================

#[tokio::test]
async fn given_student_then_class_and_accessible_courses_bound_the_listing() {
    let store = student_fixture().await;

    let response = reader(&store)
        .get_live_lessons_by_locations(&ctx("s-1"), LiveLessonsRequest::default())
        .await
        .unwrap();

    // A: art only reachable through an inactive class; N: not a member
    assert_eq!(ids(&response), vec!["M", "H"]);
    assert_eq!(response.total, 2);
}

#[tokio::test]
async fn given_student_course_filter_then_it_narrows_visible_courses() {
    let store = student_fixture().await;
    let reader = reader(&store);

    let history = reader
        .get_live_lessons_by_locations(&ctx("s-1"), for_courses(&["history"]))
        .await
        .unwrap();
    let outside = reader
        .get_live_lessons_by_locations(&ctx("s-1"), for_courses(&["art"]))
        .await
        .unwrap();

    assert_eq!(ids(&history), vec!["H"]);
    assert_eq!(outside, LiveLessonsResponse::default());
}

#[tokio::test]
async fn given_student_then_course_column_never_reports_a_hidden_primary_course() {
    let store = store().await;
    add_student(&store, "s-1").await;
    add_class_member(&store, 7, "s-1").await;
    add_course_class(&store, "math", 7, "active").await;
    LessonSeed::new("X", t0() + hours(1), t0() + hours(2))
        .course("secret")
        .insert(&store)
        .await;
    add_lesson_course(&store, "X", "math").await;
    add_member(&store, "X", "s-1", "").await;

    let response = reader(&store)
        .get_live_lessons_by_locations(&ctx("s-1"), LiveLessonsRequest::default())
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["X"]);
    assert_eq!(response.lessons[0].course_id, "math");
    assert!(response
        .lessons
        .iter()
        .all(|lesson| lesson.course_id != "secret"));
}

#[tokio::test]
async fn given_whitelist_flag_on_then_student_sees_whitelisted_courses_only() {
    let store = student_fixture().await;
    add_whitelist(&store, TENANT, "art, music").await;
    add_whitelist(&store, "tenant-2", "math").await;

    let response = reader_with(Repositories::from_store(store.clone()), true)
        .get_live_lessons_by_locations(&ctx("s-1"), LiveLessonsRequest::default())
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["A"]);
}

#[tokio::test]
async fn given_whitelist_flag_on_without_entry_then_entitled_courses_apply() {
    let store = student_fixture().await;

    let response = reader_with(Repositories::from_store(store.clone()), true)
        .get_live_lessons_by_locations(&ctx("s-1"), LiveLessonsRequest::default())
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["M", "H"]);
}

#[tokio::test]
async fn given_whitelist_disabled_in_config_then_flag_is_ignored() {
    let store = student_fixture().await;
    add_whitelist(&store, TENANT, "art").await;
    let mut config = Config::default();
    config.visibility.course_whitelist = false;
    config.feature_flags.insert(
        DEFAULT_WHITELIST_FLAG.to_string(),
        FlagRule {
            enabled: true,
            environments: vec![],
        },
    );

    let response = reader_with_config(Repositories::from_store(store.clone()), &config)
        .get_live_lessons_by_locations(&ctx("s-1"), LiveLessonsRequest::default())
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["M", "H"]);
}

#[tokio::test]
async fn given_student_without_courses_then_response_is_empty() {
    let store = store().await;
    add_student(&store, "s-2").await;
    LessonSeed::new("L1", t0() + hours(1), t0() + hours(2))
        .insert(&store)
        .await;
    add_member(&store, "L1", "s-2", "").await;

    let response = reader(&store)
        .get_live_lessons_by_locations(&ctx("s-2"), LiveLessonsRequest::default())
        .await
        .unwrap();

    assert!(response.lessons.is_empty());
    assert_eq!(response.total, 0);
}

// =============================================================================
// STATUS, PAGINATION AND SCOPE
// =============================================================================

#[tokio::test]
async fn status_is_projected_against_the_reader_clock() {
    let store = store().await;
    let now = t0();
    LessonSeed::new("a-done", now - hours(3), now - hours(2))
        .insert(&store)
        .await;
    LessonSeed::new("b-running", now - hours(1), now + hours(1))
        .insert(&store)
        .await;
    LessonSeed::new("c-ended-early", now - hours(1), now + hours(1))
        .ended_at(now - chrono::Duration::minutes(5))
        .insert(&store)
        .await;
    LessonSeed::new("d-upcoming", now + hours(1), now + hours(2))
        .insert(&store)
        .await;

    let response = reader(&store)
        .with_clock(t0)
        .get_live_lessons_by_locations(&ctx("staff-1"), for_courses(&["course-1"]))
        .await
        .unwrap();

    let statuses: Vec<(&str, LessonStatus)> = response
        .lessons
        .iter()
        .map(|lesson| (lesson.lesson_id.as_str(), lesson.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("a-done", LessonStatus::Completed),
            ("b-running", LessonStatus::InProgress),
            ("c-ended-early", LessonStatus::Completed),
            ("d-upcoming", LessonStatus::NotStarted),
        ]
    );
}

#[tokio::test]
async fn page_numbers_select_consecutive_slices() {
    let store = store().await;
    for i in 1..=5 {
        LessonSeed::new(&format!("L{i}"), t0() + hours(i), t0() + hours(i + 1))
            .insert(&store)
            .await;
    }
    let reader = reader(&store);
    let page = |page| LiveLessonsRequest {
        pagination: PageRequest { limit: 2, page },
        ..for_courses(&["course-1"])
    };

    let second = reader
        .get_live_lessons_by_locations(&ctx("staff-1"), page(2))
        .await
        .unwrap();
    let third = reader
        .get_live_lessons_by_locations(&ctx("staff-1"), page(3))
        .await
        .unwrap();
    let beyond = reader
        .get_live_lessons_by_locations(&ctx("staff-1"), page(9))
        .await
        .unwrap();

    assert_eq!(ids(&second), vec!["L3", "L4"]);
    assert_eq!(second.total, 5);
    assert_eq!(ids(&third), vec!["L5"]);
    assert!(beyond.lessons.is_empty());
    assert_eq!(beyond.total, 5);
}

#[tokio::test]
async fn time_window_keeps_overlapping_lessons() {
    let store = store().await;
    LessonSeed::new("before", t0(), t0() + hours(1))
        .insert(&store)
        .await;
    LessonSeed::new("overlap", t0() + hours(2), t0() + hours(4))
        .insert(&store)
        .await;
    LessonSeed::new("after", t0() + hours(6), t0() + hours(7))
        .insert(&store)
        .await;

    let response = reader(&store)
        .get_live_lessons_by_locations(
            &ctx("staff-1"),
            LiveLessonsRequest {
                from: Some(t0() + hours(3)),
                to: Some(t0() + hours(5)),
                ..for_courses(&["course-1"])
            },
        )
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["overlap"]);
}

#[tokio::test]
async fn other_tenants_and_deleted_lessons_are_excluded() {
    let store = store().await;
    LessonSeed::new("visible", t0() + hours(1), t0() + hours(2))
        .insert(&store)
        .await;
    LessonSeed::new("foreign", t0() + hours(1), t0() + hours(2))
        .tenant("tenant-2")
        .insert(&store)
        .await;
    LessonSeed::new("removed", t0() + hours(1), t0() + hours(2))
        .deleted()
        .insert(&store)
        .await;

    let response = reader(&store)
        .get_live_lessons_by_locations(&ctx("staff-1"), for_courses(&["course-1"]))
        .await
        .unwrap();

    assert_eq!(ids(&response), vec!["visible"]);
    assert_eq!(response.total, 1);
}
