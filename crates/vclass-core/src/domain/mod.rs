//! Domain model of the classroom read path.
//!
//! - **Lessons**: [`VirtualLesson`] plus its scheduling/delivery enums
//! - **Status**: [`LessonStatus`] derived by [`project_status`]
//! - **Membership**: [`LessonMember`], [`EnrollmentStatusHistory`], [`CourseClass`]
//! - **Whitelist**: [`ConfigEntry`] holding per-tenant course overrides

pub mod lesson;
pub mod member;
pub mod status;
pub mod whitelist;

pub use lesson::{SchedulingStatus, TeachingMedium, TeachingMethod, VirtualLesson};
pub use member::{CourseClass, EnrollmentStatusHistory, LessonMember};
pub use status::{project_status, LessonStatus};
pub use whitelist::{whitelist_course_ids, ConfigEntry};
