//! Post-fetch enrichment of lesson records.
//!
//! Enrichers run in the order given, after the base fetch, and each fills
//! one derived field in a single batched lookup. The first failure aborts
//! the request.

use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;

use crate::{
    domain::VirtualLesson,
    repository::{LessonMemberRepository, LessonTeacherRepository},
    Result, ResultExt,
};

#[async_trait::async_trait]
pub trait LessonEnricher: Send + Sync {
    async fn enrich(&self, lessons: &mut [VirtualLesson]) -> Result<()>;
}

/// Apply enrichers in order.
pub async fn apply_enrichers(
    enrichers: &[Arc<dyn LessonEnricher>],
    lessons: &mut [VirtualLesson],
) -> Result<()> {
    if lessons.is_empty() {
        return Ok(());
    }
    for enricher in enrichers {
        enricher.enrich(lessons).await?;
    }
    Ok(())
}

fn lesson_ids(lessons: &[VirtualLesson]) -> Vec<String> {
    lessons
        .iter()
        .map(|lesson| lesson.lesson_id.clone())
        .unique()
        .collect()
}

/// Attaches every assigned teacher to the lessons of a page.
pub struct TeacherAggregator {
    teachers: Arc<dyn LessonTeacherRepository>,
}

impl TeacherAggregator {
    pub fn new(teachers: Arc<dyn LessonTeacherRepository>) -> Self {
        Self { teachers }
    }
}

#[async_trait::async_trait]
impl LessonEnricher for TeacherAggregator {
    async fn enrich(&self, lessons: &mut [VirtualLesson]) -> Result<()> {
        let ids = lesson_ids(lessons);
        let mut by_lesson = self
            .teachers
            .get_teacher_ids_by_lesson_ids(&ids)
            .await
            .with_context(|| format!("GetTeacherIDsByLessonIDs(lesson_ids={ids:?})"))?;

        for lesson in lessons.iter_mut() {
            let mut teacher_ids = by_lesson.remove(&lesson.lesson_id).unwrap_or_default();
            teacher_ids.sort();
            teacher_ids.dedup();
            lesson.teacher_ids = teacher_ids;
        }
        Ok(())
    }
}

/// Attaches the IDs of every learner of each lesson of one tenant.
pub struct LearnerIdsEnricher {
    members: Arc<dyn LessonMemberRepository>,
    resource_path: String,
}

impl LearnerIdsEnricher {
    pub fn new(members: Arc<dyn LessonMemberRepository>, resource_path: impl Into<String>) -> Self {
        Self {
            members,
            resource_path: resource_path.into(),
        }
    }
}

#[async_trait::async_trait]
impl LessonEnricher for LearnerIdsEnricher {
    async fn enrich(&self, lessons: &mut [VirtualLesson]) -> Result<()> {
        let ids = lesson_ids(lessons);
        let members = self
            .members
            .get_members_by_lesson_ids(&ids, &self.resource_path)
            .await
            .with_context(|| {
                format!(
                    "GetLessonMembersByLessonIDs(lesson_ids={ids:?}, resource_path={})",
                    self.resource_path
                )
            })?;

        let mut by_lesson: HashMap<String, Vec<String>> = members
            .into_iter()
            .map(|member| (member.lesson_id, member.user_id))
            .into_group_map();

        for lesson in lessons.iter_mut() {
            let mut learner_ids = by_lesson.remove(&lesson.lesson_id).unwrap_or_default();
            learner_ids.sort();
            learner_ids.dedup();
            lesson.learner_ids = learner_ids;
        }
        Ok(())
    }
}
