//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/vclass/config.toml
//! 3. Project config: .vclass/config.toml
//! 4. Environment variables: `VCLASS_*`
//! 5. CLI flags (applied by the binary)
//!
//! # Example Config
//!
//! ```toml
//! environment = "stag"
//! database_url = "sqlite://lessons.db?mode=rwc"
//! request_timeout_ms = 5000
//!
//! [pagination]
//! learners_default_limit = 20
//!
//! [visibility]
//! course_whitelist = true
//!
//! [feature_flags.Lesson_VirtualClassroom_SpecificCourseIDsForLesson]
//! enabled = true
//! environments = ["stag", "prod"]
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Flag that gates the per-tenant course whitelist for live lessons.
pub const DEFAULT_WHITELIST_FLAG: &str = "Lesson_VirtualClassroom_SpecificCourseIDsForLesson";

const DEFAULT_ENVIRONMENT: &str = "local";
const DEFAULT_DATABASE_URL: &str = "sqlite://vclass.db?mode=rwc";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Largest page size any listing accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment, used when evaluating feature flags
    pub environment: String,
    pub database_url: String,
    /// Deadline applied to every read operation
    pub request_timeout_ms: u64,
    pub pagination: PaginationConfig,
    pub visibility: VisibilityConfig,
    pub feature_flags: BTreeMap<String, FlagRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub lessons_default_limit: u32,
    pub live_lessons_default_limit: u32,
    pub learners_default_limit: u32,
    pub max_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Consult the tenant course whitelist for student callers
    pub course_whitelist: bool,
    pub whitelist_flag: String,
}

/// Static rule backing the built-in feature-flag client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagRule {
    pub enabled: bool,
    /// Environments the flag is on for; empty means every environment
    pub environments: Vec<String>,
}

/// A config file as written: keys absent from the TOML stay `None` and leave
/// lower layers untouched, even when a present key restates a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub pagination: Option<PartialPaginationConfig>,
    #[serde(default)]
    pub visibility: Option<PartialVisibilityConfig>,
    #[serde(default)]
    pub feature_flags: BTreeMap<String, FlagRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialPaginationConfig {
    #[serde(default)]
    pub lessons_default_limit: Option<u32>,
    #[serde(default)]
    pub live_lessons_default_limit: Option<u32>,
    #[serde(default)]
    pub learners_default_limit: Option<u32>,
    #[serde(default)]
    pub max_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialVisibilityConfig {
    #[serde(default)]
    pub course_whitelist: Option<bool>,
    #[serde(default)]
    pub whitelist_flag: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            pagination: PaginationConfig::default(),
            visibility: VisibilityConfig::default(),
            feature_flags: BTreeMap::new(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            lessons_default_limit: 10,
            live_lessons_default_limit: 10,
            learners_default_limit: 15,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            course_whitelist: true,
            whitelist_flag: DEFAULT_WHITELIST_FLAG.to_string(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Apply the keys a file layer sets; absent keys keep the current value.
    pub fn merge_partial(&mut self, partial: PartialConfig) {
        if let Some(environment) = partial.environment {
            self.environment = environment;
        }
        if let Some(database_url) = partial.database_url {
            self.database_url = database_url;
        }
        if let Some(request_timeout_ms) = partial.request_timeout_ms {
            self.request_timeout_ms = request_timeout_ms;
        }
        if let Some(pagination) = partial.pagination {
            self.pagination.merge_partial(pagination);
        }
        if let Some(visibility) = partial.visibility {
            self.visibility.merge_partial(visibility);
        }
        // Flags are keyed; a later layer replaces individual rules
        self.feature_flags.extend(partial.feature_flags);
    }

    fn apply_env_vars(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("VCLASS_ENVIRONMENT") {
            self.environment = value;
        }

        if let Ok(value) = std::env::var("VCLASS_DATABASE_URL") {
            self.database_url = value;
        }

        if let Ok(value) = std::env::var("VCLASS_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = value.parse().map_err(|e| {
                Error::invalid_config(format!("Invalid VCLASS_REQUEST_TIMEOUT_MS value: {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("VCLASS_COURSE_WHITELIST") {
            self.visibility.course_whitelist = value.parse().map_err(|e| {
                Error::invalid_config(format!("Invalid VCLASS_COURSE_WHITELIST value: {e}"))
            })?;
        }

        Ok(())
    }

    /// Reject settings the read path cannot run with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pagination;
        if p.max_limit == 0 || p.max_limit > MAX_PAGE_LIMIT {
            return Err(Error::invalid_config(format!(
                "pagination.max_limit must be between 1 and {MAX_PAGE_LIMIT}, got {}",
                p.max_limit
            )));
        }
        for (name, value) in [
            ("lessons_default_limit", p.lessons_default_limit),
            ("live_lessons_default_limit", p.live_lessons_default_limit),
            ("learners_default_limit", p.learners_default_limit),
        ] {
            if value == 0 || value > p.max_limit {
                return Err(Error::invalid_config(format!(
                    "pagination.{name} must be between 1 and {}, got {value}",
                    p.max_limit
                )));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::invalid_config("request_timeout_ms must be positive"));
        }
        if self.visibility.whitelist_flag.trim().is_empty() {
            return Err(Error::invalid_config(
                "visibility.whitelist_flag cannot be empty",
            ));
        }
        Ok(())
    }
}

impl PaginationConfig {
    fn merge_partial(&mut self, partial: PartialPaginationConfig) {
        if let Some(limit) = partial.lessons_default_limit {
            self.lessons_default_limit = limit;
        }
        if let Some(limit) = partial.live_lessons_default_limit {
            self.live_lessons_default_limit = limit;
        }
        if let Some(limit) = partial.learners_default_limit {
            self.learners_default_limit = limit;
        }
        if let Some(limit) = partial.max_limit {
            self.max_limit = limit;
        }
    }
}

impl VisibilityConfig {
    fn merge_partial(&mut self, partial: PartialVisibilityConfig) {
        if let Some(course_whitelist) = partial.course_whitelist {
            self.course_whitelist = course_whitelist;
        }
        if let Some(whitelist_flag) = partial.whitelist_flag {
            self.whitelist_flag = whitelist_flag;
        }
    }
}

/// Load configuration from all sources.
///
/// # Errors
///
/// Returns error if a config file exists but cannot be read or parsed, an
/// environment override has an invalid value, or validation fails.
pub async fn load_config() -> Result<Config> {
    load_config_with(None).await
}

/// Load configuration, using `explicit` instead of the project file when given.
pub async fn load_config_with(explicit: Option<&Path>) -> Result<Config> {
    // 1. Start with built-in defaults
    let mut config = Config::default();

    // 2. Load global config if exists
    if let Ok(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_toml_file(&global_path).await?;
            config.merge_partial(global);
        }
    }

    // 3. Explicit file replaces the project lookup
    match explicit {
        Some(path) => {
            let file = load_toml_file(path).await?;
            config.merge_partial(file);
        }
        None => {
            let project_path = project_config_path();
            if project_path.exists() {
                let project = load_toml_file(&project_path).await?;
                config.merge_partial(project);
            }
        }
    }

    // 4. Apply environment variable overrides
    config.apply_env_vars()?;

    config.validate()?;

    tracing::debug!(
        environment = %config.environment,
        database_url = %config.database_url,
        "configuration loaded"
    );
    Ok(config)
}

fn project_config_path() -> PathBuf {
    PathBuf::from(".vclass").join("config.toml")
}

fn global_config_path() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "vclass")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
        .ok_or_else(|| Error::io_error("Failed to determine global config directory"))
}

async fn load_toml_file(path: &Path) -> Result<PartialConfig> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::io_error(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::invalid_config(format!("Failed to parse config: {}: {e}", path.display()))
    })
}
