//! Tenant-scoped course whitelist for live lessons.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Country of configuration entries that apply to every country.
pub const COUNTRY_MASTER: &str = "COUNTRY_MASTER";
pub const LESSON_CONFIG_GROUP: &str = "lesson";
pub const SPECIFIC_COURSE_IDS_KEY: &str = "specificCourseIDsForLesson";

/// A configuration entry as stored per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub group: String,
    pub country: String,
    pub value: String,
    pub resource_path: String,
}

impl ConfigEntry {
    /// Parse a comma-separated course list, dropping blanks and duplicates.
    pub fn course_ids(&self) -> Vec<String> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .sorted()
            .dedup()
            .collect()
    }
}

/// Collect whitelisted courses from the entries matching the whitelist key.
pub fn whitelist_course_ids(entries: &[ConfigEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|entry| entry.key == SPECIFIC_COURSE_IDS_KEY)
        .flat_map(ConfigEntry::course_ids)
        .sorted()
        .dedup()
        .collect()
}
