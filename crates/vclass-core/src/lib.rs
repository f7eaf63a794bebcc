//! # vclass core
//!
//! Read path of the virtual classroom: which lessons a caller may see, how
//! they are listed and paged, and who attends them.
//!
//! ## Components
//!
//! - [`domain::project_status`] - runtime status from time fields
//! - [`pagination::CursorPaginator`] - limits and opaque cursors
//! - [`visibility::VisibilityResolver`] - role-based effective filters
//! - [`repository`] + [`sqlite`] - lesson queries against storage
//! - [`enrichment::TeacherAggregator`] - batched teacher assignment
//! - [`learners::LearnerEnrollmentJoiner`] - learners with enrollment windows
//! - [`service::VirtualLessonReader`] - the operations exposed to callers
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, Error>`; no `unwrap()`,
//! `expect()` or `panic!()` outside tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod domain;
pub mod enrichment;
mod error;
pub mod feature_flag;
pub mod learners;
pub mod pagination;
pub mod query;
pub mod repository;
pub mod service;
pub mod sqlite;
pub mod visibility;

pub use config::{load_config, load_config_with, Config};
pub use context::RequestContext;
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use feature_flag::{FeatureFlagClient, StaticFeatureFlags};
pub use repository::Repositories;
pub use service::VirtualLessonReader;
pub use sqlite::SqliteStore;
