//! Task input records and per-task outcome headers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Task identifier.
///
/// Input files carry ids as either strings or integers; both are kept as
/// their string form so `7` and `"7"` name the same task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Integer(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Integer(n) => Self(n.to_string()),
        })
    }
}

/// One evaluated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "task_id")]
    pub id: TaskId,

    /// Original query text
    #[serde(default, alias = "query")]
    pub prompt: String,

    /// Report body
    #[serde(alias = "report")]
    pub article: String,

    /// Declared language, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, prompt: impl Into<String>, article: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            article: article.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Declared language, or one inferred from the report body.
    pub fn effective_language(&self) -> String {
        self.language
            .clone()
            .unwrap_or_else(|| detect_language(&self.article).to_string())
    }
}

/// Outcome of extraction for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Extracted,
    ExtractionFailed,
}

/// Per-task header record, carried through every stage file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHeader {
    pub task_id: TaskId,

    #[serde(default)]
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    pub status: TaskStatus,

    #[serde(default)]
    pub claim_count: usize,

    /// Claims extracted without any citation marker
    #[serde(default)]
    pub uncited_claim_count: usize,

    /// Citation mentions before deduplication
    #[serde(default)]
    pub citation_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskHeader {
    pub fn extracted(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            query: task.prompt.clone(),
            language: Some(task.effective_language()),
            status: TaskStatus::Extracted,
            claim_count: 0,
            uncited_claim_count: 0,
            citation_count: 0,
            error: None,
        }
    }

    pub fn failed(task: &Task, error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::ExtractionFailed,
            error: Some(error.into()),
            ..Self::extracted(task)
        }
    }

    /// Header for a task seen only through its downstream records.
    pub fn implied(task_id: TaskId) -> Self {
        Self {
            task_id,
            query: String::new(),
            language: None,
            status: TaskStatus::Extracted,
            claim_count: 0,
            uncited_claim_count: 0,
            citation_count: 0,
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::ExtractionFailed
    }
}

/// Query-data record used to fill in missing query text and language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    #[serde(alias = "task_id")]
    pub id: TaskId,

    #[serde(default, alias = "query")]
    pub prompt: String,

    #[serde(default)]
    pub language: Option<String>,
}

/// Query data indexed by task id.
#[derive(Debug, Clone, Default)]
pub struct QueryIndex {
    records: HashMap<TaskId, QueryRecord>,
}

impl QueryIndex {
    pub fn new(records: impl IntoIterator<Item = QueryRecord>) -> Self {
        let mut index = HashMap::new();
        for record in records {
            index.entry(record.id.clone()).or_insert(record);
        }
        Self { records: index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fill missing query text and language on a task.
    pub fn fill_task(&self, task: &mut Task) {
        let Some(record) = self.records.get(&task.id) else {
            return;
        };
        if task.prompt.trim().is_empty() {
            task.prompt = record.prompt.clone();
        }
        if task.language.is_none() {
            task.language = record.language.clone();
        }
    }

    /// Fill missing query text and language on a header.
    pub fn fill_header(&self, header: &mut TaskHeader) {
        let Some(record) = self.records.get(&header.task_id) else {
            return;
        };
        if header.query.trim().is_empty() {
            header.query = record.prompt.clone();
        }
        if header.language.is_none() {
            header.language = record.language.clone();
        }
    }
}

/// Infer a report language: `zh` when CJK characters outnumber Latin words.
pub fn detect_language(text: &str) -> &'static str {
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    let latin_words = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .count();

    if cjk > latin_words {
        "zh"
    } else {
        "en"
    }
}
