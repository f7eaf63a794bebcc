//! Learners of one lesson joined with their enrollment windows.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    pagination::{CombinedCursor, CombinedPaging},
    query::LearnerPageQuery,
    repository::{EnrollmentHistoryRepository, LessonMemberRepository, LessonRepository},
    Result, ResultExt,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentStatusInfo {
    pub location_id: String,
    pub enrollment_status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerInfo {
    pub learner_id: String,
    pub enrollment_status_info: Vec<EnrollmentStatusInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnersPage {
    pub learners: Vec<LearnerInfo>,
    /// Absent when the page was empty
    pub next_page: Option<CombinedPaging>,
}

pub struct LearnerEnrollmentJoiner {
    members: Arc<dyn LessonMemberRepository>,
    lessons: Arc<dyn LessonRepository>,
    enrollment: Arc<dyn EnrollmentHistoryRepository>,
}

impl LearnerEnrollmentJoiner {
    pub fn new(
        members: Arc<dyn LessonMemberRepository>,
        lessons: Arc<dyn LessonRepository>,
        enrollment: Arc<dyn EnrollmentHistoryRepository>,
    ) -> Self {
        Self {
            members,
            lessons,
            enrollment,
        }
    }

    pub async fn join(&self, query: &LearnerPageQuery) -> Result<LearnersPage> {
        let members = self
            .members
            .get_learners_page(query)
            .await
            .with_context(|| {
                format!(
                    "GetLearnersByLessonIDWithPaging(lesson_id={}, limit={}, after={:?})",
                    query.lesson_id, query.limit, query.after
                )
            })?;

        let Some(last) = members.last() else {
            tracing::debug!(lesson_id = %query.lesson_id, "lesson has no learners on this page");
            return Ok(LearnersPage::default());
        };
        let next_page = CombinedPaging {
            limit: query.limit,
            offset: CombinedCursor::after(&last.lesson_id, &last.course_id, &last.user_id),
        };

        let lesson = self
            .lessons
            .get_lesson_by_id(&query.lesson_id, &query.resource_path)
            .await
            .with_context(|| {
                format!(
                    "GetVirtualLessonOnlyByID(lesson_id={}, resource_path={})",
                    query.lesson_id, query.resource_path
                )
            })?;

        // A learner may appear once per course; keep first-seen order
        let learner_ids: Vec<String> = members
            .iter()
            .map(|member| member.user_id.clone())
            .unique()
            .collect();

        let histories = self
            .enrollment
            .get_status_history_by_student_ids_and_location_id(&learner_ids, &lesson.center_id)
            .await
            .with_context(|| {
                format!(
                    "GetStatusHistoryByStudentIDsAndLocationID(student_ids={learner_ids:?}, location_id={})",
                    lesson.center_id
                )
            })?;

        let mut by_learner: HashMap<String, Vec<EnrollmentStatusInfo>> = histories
            .into_iter()
            .sorted_by(|a, b| a.start_date.cmp(&b.start_date))
            .map(|history| {
                (
                    history.student_id,
                    EnrollmentStatusInfo {
                        location_id: history.location_id,
                        enrollment_status: history.enrollment_status,
                        start_date: history.start_date,
                        end_date: history.end_date,
                    },
                )
            })
            .into_group_map();

        let learners = learner_ids
            .into_iter()
            .map(|learner_id| LearnerInfo {
                enrollment_status_info: by_learner.remove(&learner_id).unwrap_or_default(),
                learner_id,
            })
            .collect();

        Ok(LearnersPage {
            learners,
            next_page: Some(next_page),
        })
    }
}
