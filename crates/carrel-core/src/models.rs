//! Wire types shared with the backend.
//!
//! Every request and response body exchanged with the HTTP API lives here,
//! serde-derived to match the backend's JSON exactly. Enumerated statuses
//! are closed sets on the wire (`DocStatus`, `ProjectStatus`, `Relevance`,
//! `SectionStatus`) and parse from their wire spelling via `FromStr` so the
//! CLI can accept them as flag values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// === Query ===

/// A retrieval question with the session's active filters applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
}

fn default_top_k() -> u32 {
    5
}

/// A cited passage backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document_id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub section: Option<String>,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub processing_time_ms: u64,
}

// === Documents ===

/// Lifecycle state of an indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Pending,
    Indexed,
    Error,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Pending => "pending",
            DocStatus::Indexed => "indexed",
            DocStatus::Error => "error",
        }
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocStatus::Pending),
            "indexed" => Ok(DocStatus::Indexed),
            "error" => Ok(DocStatus::Error),
            other => Err(ApiError::InvalidInput(format!(
                "unknown document status '{}' (expected pending, indexed, or error)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub chunk_count: u32,
    pub status: DocStatus,
    /// ISO 8601, as emitted by the backend.
    #[serde(default)]
    pub indexed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentInfo>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

/// One bibliography entry extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub document_id: String,
    pub summary: String,
}

// === Indexing ===

/// Index a file already visible to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchIndexRequest {
    pub folder_path: String,
}

/// Reindex a subset of the corpus; an absent list means everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReindexRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexResponse {
    pub document_id: String,
    pub title: String,
    pub chunks_count: u32,
    /// "indexed" or "already_indexed"; not part of [`DocStatus`].
    pub status: String,
}

/// Outcome of a batch index run. Per-file failures are data, not errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchIndexResponse {
    pub processed: u32,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub documents: Vec<IndexResponse>,
}

// === Health & stats ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default = "unknown_status")]
    pub chroma_status: String,
    #[serde(default = "unknown_status")]
    pub claude_status: String,
    #[serde(default = "unknown_status")]
    pub voyage_status: String,
    #[serde(default)]
    pub document_count: u32,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

/// Corpus-wide metadata quality summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub total_documents: u32,
    pub average_score: f64,
    #[serde(default)]
    pub score_distribution: BTreeMap<String, u32>,
    #[serde(default)]
    pub missing_fields: BTreeMap<String, u32>,
    #[serde(default)]
    pub low_quality_count: u32,
    #[serde(default)]
    pub documents_needing_review: Vec<serde_json::Value>,
}

// === Projects ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    InProgress,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProjectStatus::Draft),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(ApiError::InvalidInput(format!(
                "unknown project status '{}' (expected draft, in_progress, or completed)",
                other
            ))),
        }
    }
}

/// How strongly a source bears on the project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Relevance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::Low => "low",
            Relevance::Medium => "medium",
            Relevance::High => "high",
            Relevance::Critical => "critical",
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relevance {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Relevance::Low),
            "medium" => Ok(Relevance::Medium),
            "high" => Ok(Relevance::High),
            "critical" => Ok(Relevance::Critical),
            other => Err(ApiError::InvalidInput(format!(
                "unknown relevance '{}' (expected low, medium, high, or critical)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    #[default]
    Draft,
    Review,
    Final,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStatus::Draft => "draft",
            SectionStatus::Review => "review",
            SectionStatus::Final => "final",
        }
    }
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SectionStatus::Draft),
            "review" => Ok(SectionStatus::Review),
            "final" => Ok(SectionStatus::Final),
            other => Err(ApiError::InvalidInput(format!(
                "unknown section status '{}' (expected draft, review, or final)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub sources_count: u32,
    pub sections_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectInfo>,
    pub total: u32,
}

/// A document attached to a project, with its attachment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSourceInfo {
    pub id: String,
    pub document_id: String,
    pub document_title: String,
    #[serde(default)]
    pub document_authors: Option<String>,
    #[serde(default)]
    pub document_year: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub relevance: Relevance,
    pub added_at: String,
}

/// One section of a project write-up. `section_order` is the only sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSectionInfo {
    pub id: String,
    pub section_type: String,
    pub section_order: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub cited_sources: Vec<String>,
    pub word_count: u32,
    #[serde(default)]
    pub status: SectionStatus,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub sources: Vec<ProjectSourceInfo>,
    pub sections: Vec<ProjectSectionInfo>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSourceCreate {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub relevance: Relevance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSourceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<Relevance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSectionCreate {
    pub section_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SectionStatus>,
}

// === Export ===

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    #[default]
    Docx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "markdown",
            ExportFormat::Docx => "docx",
        }
    }

    /// File extension used when the response carries no filename.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "docx" => Ok(ExportFormat::Docx),
            other => Err(ApiError::InvalidInput(format!(
                "unknown export format '{}' (expected markdown or docx)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub include_bibliography: bool,
    pub citation_style: String,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            include_bibliography: true,
            citation_style: "apa".to_string(),
        }
    }
}

/// The exported document as returned by the backend.
///
/// Not a wire schema: the body is the raw response bytes and the filename
/// comes from the `Content-Disposition` header when present.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPayload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

// === Acknowledgements ===

/// Generic delete/remove acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    #[serde(
        default,
        alias = "document_id",
        alias = "project_id",
        alias = "source_id",
        alias = "section_id"
    )]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_spellings() {
        assert_eq!(
            serde_json::to_string(&ProjectStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::from_str::<DocStatus>("\"indexed\"").unwrap(),
            DocStatus::Indexed
        );
        assert_eq!("critical".parse::<Relevance>().unwrap(), Relevance::Critical);
        assert!("urgent".parse::<Relevance>().is_err());
    }

    #[test]
    fn query_request_omits_unset_filters() {
        let req = QueryRequest {
            question: "What is attention?".to_string(),
            top_k: 5,
            year_min: None,
            year_max: None,
            authors: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("year_min"));
        assert!(!json.contains("authors"));
    }

    #[test]
    fn ack_id_aliases() {
        let ack: Ack =
            serde_json::from_str(r#"{"status": "deleted", "document_id": "abc"}"#).unwrap();
        assert_eq!(ack.id.as_deref(), Some("abc"));
        let ack: Ack =
            serde_json::from_str(r#"{"status": "removed", "source_id": "s9"}"#).unwrap();
        assert_eq!(ack.id.as_deref(), Some("s9"));
    }

    #[test]
    fn health_tolerates_missing_component_statuses() {
        let h: HealthResponse =
            serde_json::from_str(r#"{"status": "ok", "document_count": 3}"#).unwrap();
        assert_eq!(h.chroma_status, "unknown");
        assert_eq!(h.document_count, 3);
    }
}
