//! Read operations of the virtual classroom.
//!
//! [`VirtualLessonReader`] wires the pipelines together:
//!
//! - `GetLiveLessonsByLocations`: visibility -> live-lesson query -> status
//! - `GetLessons`: caller filter -> keyset query -> teacher aggregation -> cursors
//! - `GetLearnersByLessonID`: member page -> enrollment join
//! - `GetLearnersByLessonIDs`: batch membership lookup
//! - `GetClassDoURL`: single lesson lookup
//! - `GetVirtualLessonByID`: single lesson + caller-chosen enrichers
//!
//! Every operation runs under the configured request deadline. Required
//! fields are checked before any I/O.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    context::RequestContext,
    domain::{LessonStatus, SchedulingStatus, TeachingMedium, TeachingMethod, VirtualLesson},
    enrichment::{apply_enrichers, LearnerIdsEnricher, LessonEnricher, TeacherAggregator},
    feature_flag::FeatureFlagClient,
    learners::{LearnerEnrollmentJoiner, LearnersPage},
    pagination::{CombinedPaging, CursorPaginator, LessonPaging, PageRequest},
    query::{
        EffectiveFilter, LearnerPageQuery, LessonFilter, LessonListQuery, LessonTimeCompare,
        LiveLessonQuery, SortDirection, TimeLookup,
    },
    repository::Repositories,
    visibility::{Visibility, VisibilityResolver},
    Error, Result, ResultExt,
};

// ═══════════════════════════════════════════════════════════════════════════
// REQUESTS AND RESPONSES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveLessonsRequest {
    #[serde(default)]
    pub location_ids: Vec<String>,
    #[serde(default)]
    pub course_ids: Vec<String>,
    #[serde(default)]
    pub scheduling_statuses: Vec<SchedulingStatus>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveLesson {
    pub lesson_id: String,
    pub name: String,
    pub center_id: String,
    pub course_id: String,
    pub class_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: LessonStatus,
    pub scheduling_status: SchedulingStatus,
    pub teaching_medium: TeachingMedium,
    pub teaching_method: TeachingMethod,
    pub zoom_link: String,
    pub teacher: Option<TeacherProfile>,
}

impl LiveLesson {
    fn project(lesson: VirtualLesson, now: DateTime<Utc>) -> Self {
        let status = lesson.status_at(now);
        let teacher = (!lesson.teacher_id.is_empty()).then(|| TeacherProfile {
            user_id: lesson.teacher_id.clone(),
        });
        Self {
            lesson_id: lesson.lesson_id,
            name: lesson.name,
            center_id: lesson.center_id,
            course_id: lesson.course_id,
            class_id: lesson.class_id,
            start_time: lesson.start_time,
            end_time: lesson.end_time,
            status,
            scheduling_status: lesson.scheduling_status,
            teaching_medium: lesson.teaching_medium,
            teaching_method: lesson.teaching_method,
            zoom_link: lesson.zoom_link,
            teacher,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveLessonsResponse {
    pub lessons: Vec<LiveLesson>,
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLessonsRequest {
    /// Required
    pub paging: Option<LessonPaging>,
    /// Required
    pub current_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_lookup: TimeLookup,
    #[serde(default)]
    pub lesson_time_compare: LessonTimeCompare,
    #[serde(default = "default_sort_asc")]
    pub sort_asc: bool,
    #[serde(default)]
    pub filter: LessonFilter,
}

const fn default_sort_asc() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLessonsResponse {
    pub items: Vec<VirtualLesson>,
    pub total_items: u32,
    pub total_lesson: u32,
    pub next_page: LessonPaging,
    pub previous_page: LessonPaging,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnersRequest {
    pub lesson_id: String,
    /// Defaults to the first page at the default limit
    #[serde(default)]
    pub paging: Option<CombinedPaging>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerRef {
    pub learner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonLearners {
    pub lesson_id: String,
    pub learners: Vec<LearnerRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonsLearnersResponse {
    pub lesson_learners: Vec<LessonLearners>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDoUrlResponse {
    pub classdo_link: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// READER
// ═══════════════════════════════════════════════════════════════════════════

/// Source of the instant live-lesson statuses are projected at.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct VirtualLessonReader {
    repos: Repositories,
    resolver: VisibilityResolver,
    joiner: LearnerEnrollmentJoiner,
    paginator: CursorPaginator,
    timeout: Duration,
    clock: Clock,
}

impl VirtualLessonReader {
    pub fn new(repos: Repositories, flags: Arc<dyn FeatureFlagClient>, config: &Config) -> Self {
        let resolver = VisibilityResolver::new(
            &repos,
            flags,
            config.visibility.clone(),
            config.environment.clone(),
        );
        let joiner = LearnerEnrollmentJoiner::new(
            repos.members.clone(),
            repos.lessons.clone(),
            repos.enrollment.clone(),
        );
        Self {
            repos,
            resolver,
            joiner,
            paginator: CursorPaginator::new(config.pagination),
            timeout: config.request_timeout(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for status projection.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Attaches all teacher IDs of a lesson.
    pub fn teacher_enricher(&self) -> Arc<dyn LessonEnricher> {
        Arc::new(TeacherAggregator::new(self.repos.teachers.clone()))
    }

    /// Attaches all learner IDs of a lesson within the caller's tenant.
    pub fn learner_enricher(&self, ctx: &RequestContext) -> Arc<dyn LessonEnricher> {
        Arc::new(LearnerIdsEnricher::new(
            self.repos.members.clone(),
            ctx.resource_path.clone(),
        ))
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.context(operation),
            Err(_) => Err(Error::DeadlineExceeded {
                operation,
                timeout_ms: self.timeout.as_millis(),
            }),
        };
        if let Err(e) = &result {
            tracing::warn!(operation, kind = %e.kind(), error = %e, "request failed");
        }
        result
    }

    #[tracing::instrument(
        skip_all,
        fields(user_id = %ctx.user_id, resource_path = %ctx.resource_path)
    )]
    pub async fn get_live_lessons_by_locations(
        &self,
        ctx: &RequestContext,
        req: LiveLessonsRequest,
    ) -> Result<LiveLessonsResponse> {
        self.with_deadline("GetLiveLessonsByLocations", async {
            let now = (self.clock)();
            let limit = self.paginator.live_lessons_limit(req.pagination.limit);
            let offset = req.pagination.offset(limit);
            let requested = EffectiveFilter::new()
                .with_location_ids(req.location_ids)
                .with_course_ids(req.course_ids)
                .with_scheduling_statuses(req.scheduling_statuses)
                .with_window(req.from, req.to);

            let filter = match self.resolver.resolve(ctx, requested).await? {
                Visibility::Filter(filter) => filter,
                Visibility::Nothing => return Ok(LiveLessonsResponse::default()),
            };

            let query = LiveLessonQuery {
                resource_path: ctx.resource_path.clone(),
                filter,
                limit,
                offset,
            };
            let page = self
                .repos
                .lessons
                .get_live_lessons(&query)
                .await
                .with_context(|| format!("GetVirtualLessons({query})"))?;

            Ok(LiveLessonsResponse {
                lessons: page
                    .lessons
                    .into_iter()
                    .map(|lesson| LiveLesson::project(lesson, now))
                    .collect(),
                total: page.total,
            })
        })
        .await
    }

    #[tracing::instrument(
        skip_all,
        fields(user_id = %ctx.user_id, resource_path = %ctx.resource_path)
    )]
    pub async fn get_lessons(
        &self,
        ctx: &RequestContext,
        req: GetLessonsRequest,
    ) -> Result<GetLessonsResponse> {
        self.with_deadline("GetLessons", async {
            let paging = req
                .paging
                .ok_or_else(|| Error::invalid_argument("paging is required"))?;
            let current_time = req
                .current_time
                .ok_or_else(|| Error::invalid_argument("current time is required"))?;
            let limit = self.paginator.lessons_limit(paging.limit);

            let query = LessonListQuery::new(ctx.resource_path.clone(), current_time, limit)
                .with_time(req.time_lookup, req.lesson_time_compare)
                .with_sort(SortDirection::from_ascending(req.sort_asc))
                .with_filter(req.filter)
                .after(paging.offset);

            let mut page = self
                .repos
                .lessons
                .get_lessons(&query)
                .await
                .with_context(|| format!("GetLessons({query})"))?;

            apply_enrichers(&[self.teacher_enricher()], &mut page.lessons).await?;

            let next_offset = CursorPaginator::next_lesson_offset(
                page.lessons.last().map(|lesson| lesson.lesson_id.as_str()),
                page.pre_total,
                limit,
            );

            Ok(GetLessonsResponse {
                total_items: page.total,
                total_lesson: page.total,
                next_page: LessonPaging {
                    limit,
                    offset: next_offset,
                },
                previous_page: LessonPaging {
                    limit,
                    offset: page.previous_offset,
                },
                items: page.lessons,
            })
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id, lesson_id = %req.lesson_id))]
    pub async fn get_learners_by_lesson_id(
        &self,
        ctx: &RequestContext,
        req: LearnersRequest,
    ) -> Result<LearnersPage> {
        self.with_deadline("GetLearnersByLessonID", async {
            if req.lesson_id.trim().is_empty() {
                return Err(Error::invalid_argument("lesson ID cannot be empty"));
            }
            let paging = req.paging.unwrap_or_default();
            let after = paging.offset.decode(&req.lesson_id)?;
            let query = LearnerPageQuery {
                resource_path: ctx.resource_path.clone(),
                limit: self.paginator.learners_limit(paging.limit),
                lesson_id: req.lesson_id,
                after,
            };
            self.joiner.join(&query).await
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id, lessons = lesson_ids.len()))]
    pub async fn get_learners_by_lesson_ids(
        &self,
        ctx: &RequestContext,
        lesson_ids: Vec<String>,
    ) -> Result<LessonsLearnersResponse> {
        self.with_deadline("GetLearnersByLessonIDs", async {
            if lesson_ids.is_empty() {
                return Err(Error::invalid_argument("lesson IDs cannot be empty"));
            }
            if lesson_ids.iter().any(|id| id.trim().is_empty()) {
                return Err(Error::invalid_argument("lesson IDs cannot contain an empty ID"));
            }
            let lesson_ids: Vec<String> = lesson_ids.into_iter().unique().collect();

            let members = self
                .repos
                .members
                .get_members_by_lesson_ids(&lesson_ids, &ctx.resource_path)
                .await
                .with_context(|| {
                    format!(
                        "GetLessonMembersByLessonIDs(lesson_ids={lesson_ids:?}, resource_path={})",
                        ctx.resource_path
                    )
                })?;
            let mut by_lesson = members
                .into_iter()
                .map(|member| (member.lesson_id, member.user_id))
                .into_group_map();

            let lesson_learners = lesson_ids
                .into_iter()
                .map(|lesson_id| {
                    let learners = by_lesson
                        .remove(&lesson_id)
                        .unwrap_or_default()
                        .into_iter()
                        .sorted()
                        .dedup()
                        .map(|learner_id| LearnerRef { learner_id })
                        .collect();
                    LessonLearners {
                        lesson_id,
                        learners,
                    }
                })
                .collect();

            Ok(LessonsLearnersResponse { lesson_learners })
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id, lesson_id = %lesson_id))]
    pub async fn get_class_do_url(
        &self,
        ctx: &RequestContext,
        lesson_id: &str,
    ) -> Result<ClassDoUrlResponse> {
        self.with_deadline("GetClassDoURL", async {
            if lesson_id.trim().is_empty() {
                return Err(Error::invalid_argument("lesson ID cannot be empty"));
            }
            let lesson = self
                .repos
                .lessons
                .get_lesson_by_id(lesson_id, &ctx.resource_path)
                .await
                .with_context(|| {
                    format!(
                        "GetVirtualLessonByID(lesson_id={lesson_id}, resource_path={})",
                        ctx.resource_path
                    )
                })?;
            Ok(ClassDoUrlResponse {
                classdo_link: lesson.class_do_link,
            })
        })
        .await
    }

    /// Load one lesson and run `enrichers` over it in order.
    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id, lesson_id = %lesson_id))]
    pub async fn get_virtual_lesson_by_id(
        &self,
        ctx: &RequestContext,
        lesson_id: &str,
        enrichers: &[Arc<dyn LessonEnricher>],
    ) -> Result<VirtualLesson> {
        self.with_deadline("GetVirtualLessonByID", async {
            if lesson_id.trim().is_empty() {
                return Err(Error::invalid_argument("lesson ID cannot be empty"));
            }
            let lesson = self
                .repos
                .lessons
                .get_lesson_by_id(lesson_id, &ctx.resource_path)
                .await
                .with_context(|| {
                    format!(
                        "GetVirtualLessonByID(lesson_id={lesson_id}, resource_path={})",
                        ctx.resource_path
                    )
                })?;

            let mut lessons = [lesson];
            apply_enrichers(enrichers, &mut lessons).await?;
            let [lesson] = lessons;
            Ok(lesson)
        })
        .await
    }
}
