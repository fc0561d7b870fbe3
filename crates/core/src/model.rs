//! Library data model
//!
//! Prompts and projects as they appear in the persisted document. The JSON
//! shape (camelCase keys, optional keys omitted, millisecond ISO-8601
//! timestamps) is shared by the local slot and the remote file.

use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::LibraryError;

/// Schema version written into every exported document
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Prompt category
///
/// Documents written by other clients may carry categories this build does
/// not know. Those are kept verbatim as [`PromptCategory::Other`] so they
/// survive a load and save; new prompts only accept the known ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum PromptCategory {
    #[default]
    Chat,
    Code,
    Image,
    Video,
    Other(String),
}

impl PromptCategory {
    pub const ALL: [PromptCategory; 4] = [
        PromptCategory::Chat,
        PromptCategory::Code,
        PromptCategory::Image,
        PromptCategory::Video,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            PromptCategory::Chat => "chat",
            PromptCategory::Code => "code",
            PromptCategory::Image => "image",
            PromptCategory::Video => "video",
            PromptCategory::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PromptCategory::Other(_))
    }

    /// Map a stored value, keeping unknown ones
    fn from_stored(raw: String) -> Self {
        PromptCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == raw)
            .unwrap_or(PromptCategory::Other(raw))
    }
}

impl fmt::Display for PromptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse: only the known categories
impl FromStr for PromptCategory {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                LibraryError::Validation(format!(
                    "unknown category '{}' (expected chat, code, image or video)",
                    s
                ))
            })
    }
}

impl Serialize for PromptCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Lenient: unknown values become [`PromptCategory::Other`]
impl<'de> Deserialize<'de> for PromptCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(PromptCategory::from_stored)
    }
}

/// Deserialize a caller-supplied category, rejecting unknown values
fn known_category<'de, D>(deserializer: D) -> Result<PromptCategory, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
}

pub(crate) fn known_category_opt<'de, D>(deserializer: D) -> Result<Option<PromptCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => raw.parse().map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

/// A stored prompt
///
/// Deserialization goes through [`PromptRecord`], so records with missing or
/// null fields still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PromptRecord")]
pub struct Prompt {
    pub id:         String,
    pub title:      String,
    pub content:    String,
    pub category:   PromptCategory,
    pub tags:       Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url:  Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub updated_at: DateTime<Utc>,
}

impl Prompt {
    /// Merge a partial update. `id` and `created_at` are never touched.
    pub fn apply(&mut self, patch: PromptPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(image_url) = patch.image_url {
            self.image_url = image_url;
        }
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
    }

    /// Case-insensitive match on title, content or any tag, plus an optional
    /// category filter. An empty term matches everything.
    pub fn matches(&self, term: &str, category: Option<&PromptCategory>) -> bool {
        if let Some(category) = category {
            if &self.category != category {
                return false;
            }
        }

        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

/// Fields supplied when creating a prompt
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrompt {
    pub title:      String,
    pub content:    String,
    #[serde(deserialize_with = "known_category")]
    pub category:   PromptCategory,
    #[serde(default)]
    pub tags:       Vec<String>,
    #[serde(default)]
    pub image_url:  Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Partial prompt update
///
/// For the optional fields the outer `Option` means "present in the update"
/// and the inner one is the new value, so `Some(None)` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PromptPatch {
    #[serde(default)]
    pub title:      Option<String>,
    #[serde(default)]
    pub content:    Option<String>,
    #[serde(default, deserialize_with = "known_category_opt")]
    pub category:   Option<PromptCategory>,
    #[serde(default)]
    pub tags:       Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url:  Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<String>>,
}

/// A stored project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProjectRecord")]
pub struct Project {
    pub id:            String,
    pub name:          String,
    pub description:   String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at:    DateTime<Utc>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub updated_at:    DateTime<Utc>,
}

impl Project {
    /// Merge a partial update. `id` and `created_at` are never touched.
    pub fn apply(&mut self, patch: ProjectPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(thumbnail_url) = patch.thumbnail_url {
            self.thumbnail_url = thumbnail_url;
        }
    }
}

/// Fields supplied when creating a project
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name:          String,
    #[serde(default)]
    pub description:   String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Partial project update
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectPatch {
    #[serde(default)]
    pub name:          Option<String>,
    #[serde(default)]
    pub description:   Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail_url: Option<Option<String>>,
}

/// The whole library: the unit of persistence and sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DocumentRecord")]
pub struct AppData {
    pub prompts:     Vec<Prompt>,
    pub projects:    Vec<Project>,
    pub version:     String,
    #[serde(serialize_with = "timestamp::serialize")]
    pub exported_at: DateTime<Utc>,
}

impl AppData {
    /// Build a document stamped with the current schema version and time
    pub fn new(prompts: Vec<Prompt>, projects: Vec<Project>) -> Self {
        Self {
            prompts,
            projects,
            version: SCHEMA_VERSION.to_string(),
            exported_at: timestamp::now(),
        }
    }

    /// Total number of prompts and projects
    pub fn record_count(&self) -> usize {
        self.prompts.len() + self.projects.len()
    }

    /// Parse a serialized document
    ///
    /// Fails only on invalid JSON or a missing `prompts` or `projects`
    /// field. Records are decoded leniently: missing or null fields get
    /// defaults and unknown extra fields are ignored.
    pub fn parse(raw: &str) -> Result<Self, LibraryError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| LibraryError::Parse(format!("not valid JSON: {}", e)))?;

        for field in ["prompts", "projects"] {
            if value.get(field).map_or(true, Value::is_null) {
                return Err(LibraryError::Parse(format!("missing '{}' field", field)));
            }
        }

        serde_json::from_value(value).map_err(|e| LibraryError::Parse(e.to_string()))
    }

    /// Pretty-printed JSON, the form written to every slot and file
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Lenient wire records
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptRecord {
    #[serde(default, deserialize_with = "null_default")]
    id:         String,
    #[serde(default, deserialize_with = "null_default")]
    title:      String,
    #[serde(default, deserialize_with = "null_default")]
    content:    String,
    #[serde(default, deserialize_with = "null_default")]
    category:   PromptCategory,
    #[serde(default, deserialize_with = "null_default")]
    tags:       Vec<String>,
    #[serde(default)]
    image_url:  Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_lenient")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_lenient")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<PromptRecord> for Prompt {
    fn from(record: PromptRecord) -> Self {
        let (created_at, updated_at) = record_times(record.created_at, record.updated_at);
        Self {
            id: record_id(record.id),
            title: record.title,
            content: record.content,
            category: record.category,
            tags: record.tags,
            image_url: record.image_url,
            project_id: record.project_id,
            created_at,
            updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRecord {
    #[serde(default, deserialize_with = "null_default")]
    id:            String,
    #[serde(default, deserialize_with = "null_default")]
    name:          String,
    #[serde(default, deserialize_with = "null_default")]
    description:   String,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_lenient")]
    created_at:    Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_lenient")]
    updated_at:    Option<DateTime<Utc>>,
}

impl From<ProjectRecord> for Project {
    fn from(record: ProjectRecord) -> Self {
        let (created_at, updated_at) = record_times(record.created_at, record.updated_at);
        Self {
            id: record_id(record.id),
            name: record.name,
            description: record.description,
            thumbnail_url: record.thumbnail_url,
            created_at,
            updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRecord {
    prompts:     Vec<Prompt>,
    projects:    Vec<Project>,
    #[serde(default)]
    version:     Option<Value>,
    #[serde(default, deserialize_with = "timestamp::deserialize_lenient")]
    exported_at: Option<DateTime<Utc>>,
}

impl From<DocumentRecord> for AppData {
    fn from(record: DocumentRecord) -> Self {
        Self {
            prompts:     record.prompts,
            projects:    record.projects,
            version:     match record.version {
                Some(Value::String(v)) => v,
                _ => SCHEMA_VERSION.to_string(),
            },
            exported_at: record.exported_at.unwrap_or_else(timestamp::now),
        }
    }
}

/// Missing `updatedAt` falls back to `createdAt` and vice versa
fn record_times(
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let created_at = created_at.or(updated_at).unwrap_or_else(timestamp::now);
    (created_at, updated_at.unwrap_or(created_at))
}

/// Records without an id get a fresh one so they stay addressable
fn record_id(id: String) -> String {
    if id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id
    }
}

/// Treat an explicit `null` like an absent field
fn null_default<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Deserialize<'de> + Default,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Trim, lowercase and dedupe tags, keeping first occurrences in order
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Deserialize a field that distinguishes "absent" from explicit `null`
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// ISO-8601 UTC timestamps with millisecond precision
pub mod timestamp {
    use chrono::{DateTime, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    /// Current time truncated to what the document can represent
    pub fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(3)
    }

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.format(FORMAT).to_string()
    }

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(ts))
    }

    /// RFC 3339 string or epoch milliseconds; anything else reads as absent
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.and_then(|value| match value {
            Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        }))
    }
}
