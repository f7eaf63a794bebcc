//! Role-based visibility of live lessons.
//!
//! Turns the filter a caller asked for into the filter the lesson query is
//! allowed to run:
//!
//! - **Teachers and staff** keep their course filter. Without one they only
//!   see lessons they are assigned to.
//! - **Students** only see courses they are entitled to, taken from the
//!   tenant whitelist when its flag is on, otherwise from their classes and
//!   lesson memberships. Their own user ID is always a mandatory member
//!   filter.

use std::sync::Arc;

use itertools::Itertools;
use tap::Pipe;

use crate::{
    config::VisibilityConfig,
    context::RequestContext,
    domain::{
        whitelist::{COUNTRY_MASTER, LESSON_CONFIG_GROUP, SPECIFIC_COURSE_IDS_KEY},
        whitelist_course_ids,
    },
    feature_flag::FeatureFlagClient,
    query::EffectiveFilter,
    repository::{
        ConfigRepository, CourseClassRepository, LessonMemberRepository, OldClassRepository,
        Repositories, StudentRepository,
    },
    Result, ResultExt,
};

/// Outcome of visibility resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Run the lesson query with this filter
    Filter(EffectiveFilter),
    /// The caller cannot see any lesson; skip the query
    Nothing,
}

pub struct VisibilityResolver {
    students: Arc<dyn StudentRepository>,
    old_classes: Arc<dyn OldClassRepository>,
    course_classes: Arc<dyn CourseClassRepository>,
    members: Arc<dyn LessonMemberRepository>,
    configs: Arc<dyn ConfigRepository>,
    flags: Arc<dyn FeatureFlagClient>,
    settings: VisibilityConfig,
    environment: String,
}

impl VisibilityResolver {
    pub fn new(
        repos: &Repositories,
        flags: Arc<dyn FeatureFlagClient>,
        settings: VisibilityConfig,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            students: repos.students.clone(),
            old_classes: repos.old_classes.clone(),
            course_classes: repos.course_classes.clone(),
            members: repos.members.clone(),
            configs: repos.configs.clone(),
            flags,
            settings,
            environment: environment.into(),
        }
    }

    /// Produce the effective filter for `requested` on behalf of the caller.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        requested: EffectiveFilter,
    ) -> Result<Visibility> {
        let is_student = self
            .students
            .is_user_id_a_student(&ctx.user_id)
            .await
            .with_context(|| format!("IsUserIDAStudent(user_id={})", ctx.user_id))?;

        if !is_student {
            tracing::debug!(user_id = %ctx.user_id, "resolving visibility for staff caller");
            return Ok(Visibility::Filter(Self::staff_filter(ctx, requested)));
        }

        let mut courses = if self.settings.course_whitelist {
            self.whitelist_courses(ctx).await?
        } else {
            Vec::new()
        };
        if courses.is_empty() {
            courses = self.entitled_courses(&ctx.user_id).await?;
        } else {
            tracing::debug!(
                user_id = %ctx.user_id,
                count = courses.len(),
                "using tenant course whitelist"
            );
        }

        // A student's own course filter can only narrow what they are entitled to
        if !requested.course_ids.is_empty() {
            courses.retain(|course| requested.course_ids.contains(course));
        }

        if courses.is_empty() {
            tracing::debug!(user_id = %ctx.user_id, "student has no visible courses");
            return Ok(Visibility::Nothing);
        }

        Ok(Visibility::Filter(EffectiveFilter {
            course_ids: courses,
            student_ids: vec![ctx.user_id.clone()],
            teacher_ids: Vec::new(),
            // Report the visible course a lesson matched through, never a foreign primary
            replace_course_id_column: true,
            ..requested
        }))
    }

    fn staff_filter(ctx: &RequestContext, requested: EffectiveFilter) -> EffectiveFilter {
        let teacher_ids = if requested.course_ids.is_empty() {
            vec![ctx.user_id.clone()]
        } else {
            Vec::new()
        };
        EffectiveFilter {
            teacher_ids,
            student_ids: Vec::new(),
            replace_course_id_column: true,
            ..requested
        }
    }

    /// Whitelisted courses of the caller's tenant; empty when the flag is off.
    async fn whitelist_courses(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let flag = self.settings.whitelist_flag.as_str();
        let enabled = self
            .flags
            .is_feature_enabled(flag, &self.environment)
            .await
            .with_context(|| {
                format!(
                    "IsFeatureEnabled(flag={flag}, environment={})",
                    self.environment
                )
            })?;
        if !enabled {
            return Ok(Vec::new());
        }

        let keys = [SPECIFIC_COURSE_IDS_KEY.to_string()];
        self.configs
            .get_config_with_resource_path(
                COUNTRY_MASTER,
                LESSON_CONFIG_GROUP,
                &keys,
                &ctx.resource_path,
            )
            .await
            .with_context(|| {
                format!(
                    "GetConfigWithResourcePath(key={SPECIFIC_COURSE_IDS_KEY}, resource_path={})",
                    ctx.resource_path
                )
            })?
            .pipe(|entries| whitelist_course_ids(&entries))
            .pipe(Ok)
    }

    /// Union of class-derived and directly accessible courses, sorted.
    async fn entitled_courses(&self, student_id: &str) -> Result<Vec<String>> {
        let (from_classes, accessible) = futures::try_join!(
            self.class_courses(student_id),
            async {
                self.members
                    .get_course_accessible(student_id)
                    .await
                    .with_context(|| format!("GetCourseAccessible(student_id={student_id})"))
            }
        )?;

        Ok(from_classes
            .into_iter()
            .chain(accessible)
            .sorted()
            .dedup()
            .collect())
    }

    async fn class_courses(&self, student_id: &str) -> Result<Vec<String>> {
        let class_ids = self
            .old_classes
            .find_joined(student_id)
            .await
            .with_context(|| format!("FindJoined(student_id={student_id})"))?;
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mappings = self
            .course_classes
            .find_active_course_class_by_id(&class_ids)
            .await
            .with_context(|| format!("FindActiveCourseClassByID(class_ids={class_ids:?})"))?;
        Ok(mappings.into_iter().map(|m| m.course_id).collect())
    }
}
