//! Command-line surface of `vclass`.
//!
//! Each query subcommand maps onto one read operation and prints the
//! response as JSON on stdout.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use vclass_core::{
    domain::SchedulingStatus,
    enrichment::LessonEnricher,
    load_config_with,
    pagination::{CombinedCursor, CombinedPaging, LessonPaging, PageRequest},
    query::{LessonFilter, LessonTimeCompare, LiveLessonStatus, TimeLookup},
    service::{GetLessonsRequest, LearnersRequest, LiveLessonsRequest},
    Config, Error, Repositories, RequestContext, SqliteStore, StaticFeatureFlags,
    VirtualLessonReader,
};

#[derive(Debug, Parser)]
#[command(name = "vclass")]
#[command(about = "Query lessons and learners of the virtual classroom", version)]
pub struct Cli {
    /// Configuration file used instead of .vclass/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Caller on whose behalf the query runs
    #[arg(long, global = true)]
    pub user_id: Option<String>,

    /// Tenant of the caller
    #[arg(long, global = true)]
    pub resource_path: Option<String>,

    /// Deployment environment for feature-flag evaluation
    #[arg(long, global = true)]
    pub environment: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Live lessons visible to the caller, by page number
    LiveLessons(LiveLessonsArgs),
    /// Lessons relative to a point in time, by cursor
    Lessons(LessonsArgs),
    /// Learners of one lesson with their enrollment history
    Learners(LearnersArgs),
    /// Learner IDs of several lessons
    LessonsLearners {
        #[arg(required = true, num_args = 1..)]
        lesson_ids: Vec<String>,
    },
    /// ClassDo room link of a lesson
    ClassdoUrl { lesson_id: String },
    /// One lesson, optionally with its teachers and learners
    Lesson {
        lesson_id: String,
        #[arg(long)]
        with_teachers: bool,
        #[arg(long)]
        with_learners: bool,
    },
    /// Create the schema in the target database
    Init,
}

#[derive(Debug, Args)]
pub struct LiveLessonsArgs {
    #[arg(long = "location-id")]
    pub location_ids: Vec<String>,
    #[arg(long = "course-id")]
    pub course_ids: Vec<String>,
    #[arg(long = "status")]
    pub statuses: Vec<SchedulingStatus>,
    #[arg(long, requires = "to")]
    pub from: Option<DateTime<Utc>>,
    #[arg(long, requires = "from")]
    pub to: Option<DateTime<Utc>>,
    #[arg(long, default_value_t = 0)]
    pub limit: u32,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

impl LiveLessonsArgs {
    pub fn into_request(self) -> LiveLessonsRequest {
        LiveLessonsRequest {
            location_ids: self.location_ids,
            course_ids: self.course_ids,
            scheduling_statuses: self.statuses,
            from: self.from,
            to: self.to,
            pagination: PageRequest {
                limit: self.limit,
                page: self.page,
            },
        }
    }
}

#[derive(Debug, Args)]
pub struct LessonsArgs {
    #[arg(long, default_value_t = 0)]
    pub limit: u32,
    /// Lesson ID returned as the previous response's next offset
    #[arg(long, default_value = "")]
    pub offset: String,
    /// Reference instant; defaults to now
    #[arg(long)]
    pub current_time: Option<DateTime<Utc>>,
    #[arg(long, default_value = "start-time")]
    pub time_lookup: TimeLookup,
    #[arg(long, default_value = "future")]
    pub compare: LessonTimeCompare,
    /// Latest lessons first
    #[arg(long)]
    pub desc: bool,
    #[arg(long = "teacher-id")]
    pub teacher_ids: Vec<String>,
    #[arg(long = "student-id")]
    pub student_ids: Vec<String>,
    #[arg(long = "course-id")]
    pub course_ids: Vec<String>,
    #[arg(long = "location-id")]
    pub location_ids: Vec<String>,
    #[arg(long = "status")]
    pub statuses: Vec<SchedulingStatus>,
    #[arg(long)]
    pub from_date: Option<DateTime<Utc>>,
    #[arg(long)]
    pub to_date: Option<DateTime<Utc>>,
    #[arg(long, default_value = "none")]
    pub live_status: LiveLessonStatus,
}

impl LessonsArgs {
    pub fn into_request(self, now: DateTime<Utc>) -> GetLessonsRequest {
        GetLessonsRequest {
            paging: Some(LessonPaging {
                limit: self.limit,
                offset: self.offset,
            }),
            current_time: Some(self.current_time.unwrap_or(now)),
            time_lookup: self.time_lookup,
            lesson_time_compare: self.compare,
            sort_asc: !self.desc,
            filter: LessonFilter {
                teacher_ids: self.teacher_ids,
                student_ids: self.student_ids,
                course_ids: self.course_ids,
                location_ids: self.location_ids,
                scheduling_statuses: self.statuses,
                from_date: self.from_date,
                to_date: self.to_date,
                live_lesson_status: self.live_status,
            },
        }
    }
}

#[derive(Debug, Args)]
pub struct LearnersArgs {
    pub lesson_id: String,
    #[arg(long, default_value_t = 0)]
    pub limit: u32,
    /// Course of the last learner on the previous page
    #[arg(long, requires = "after_user")]
    pub after_course: Option<String>,
    /// Last learner on the previous page
    #[arg(long, requires = "after_course")]
    pub after_user: Option<String>,
}

impl LearnersArgs {
    pub fn into_request(self) -> LearnersRequest {
        let offset = match (&self.after_course, &self.after_user) {
            (Some(course), Some(user)) => CombinedCursor::after(&self.lesson_id, course, user),
            _ => CombinedCursor::default(),
        };
        LearnersRequest {
            paging: Some(CombinedPaging {
                limit: self.limit,
                offset,
            }),
            lesson_id: self.lesson_id,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// EXECUTION
// ═══════════════════════════════════════════════════════════════════════════

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.database_url {
            config.database_url.clone_from(url);
        }
        if let Some(environment) = &self.environment {
            config.environment.clone_from(environment);
        }
    }

    fn request_context(&self) -> std::result::Result<RequestContext, Error> {
        let user_id = self
            .user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::invalid_argument("--user-id is required"))?;
        let resource_path = self
            .resource_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| Error::invalid_argument("--resource-path is required"))?;
        Ok(RequestContext::new(user_id, resource_path))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}

/// Run the parsed command to completion.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config_with(cli.config.as_deref()).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    tracing::debug!(database_url = %config.database_url, "opening lesson store");
    let store = SqliteStore::open(&config.database_url).await?;

    if matches!(cli.command, Command::Init) {
        tracing::info!(database_url = %config.database_url, "schema initialized");
        return print_json(&serde_json::json!({
            "database_url": config.database_url,
            "initialized": true,
        }));
    }

    let ctx = cli.request_context()?;
    let flags = StaticFeatureFlags::new(config.feature_flags.clone());
    let reader = VirtualLessonReader::new(Repositories::from_store(store), Arc::new(flags), &config);

    match cli.command {
        Command::LiveLessons(args) => {
            print_json(&reader.get_live_lessons_by_locations(&ctx, args.into_request()).await?)
        }
        Command::Lessons(args) => {
            print_json(&reader.get_lessons(&ctx, args.into_request(Utc::now())).await?)
        }
        Command::Learners(args) => {
            print_json(&reader.get_learners_by_lesson_id(&ctx, args.into_request()).await?)
        }
        Command::LessonsLearners { lesson_ids } => {
            print_json(&reader.get_learners_by_lesson_ids(&ctx, lesson_ids).await?)
        }
        Command::ClassdoUrl { lesson_id } => {
            print_json(&reader.get_class_do_url(&ctx, &lesson_id).await?)
        }
        Command::Lesson {
            lesson_id,
            with_teachers,
            with_learners,
        } => {
            let mut enrichers: Vec<Arc<dyn LessonEnricher>> = Vec::new();
            if with_teachers {
                enrichers.push(reader.teacher_enricher());
            }
            if with_learners {
                enrichers.push(reader.learner_enricher(&ctx));
            }
            print_json(
                &reader
                    .get_virtual_lesson_by_id(&ctx, &lesson_id, &enrichers)
                    .await?,
            )
        }
        Command::Init => Ok(()),
    }
}

/// Process exit code for a failed run.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>()
        .map_or(vclass_core::ErrorKind::Internal.exit_code(), Error::exit_code)
}
