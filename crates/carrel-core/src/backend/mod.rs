//! Backend abstraction.
//!
//! The [`Backend`] trait defines every operation the client can ask of the
//! remote service, one method per endpoint, enabling pluggable transports
//! (HTTP in the binary crate, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::models::{
    Ack, BatchIndexRequest, BatchIndexResponse, DocStatus, DocumentInfo, DocumentListResponse,
    ExportPayload, ExportRequest, HealthResponse, IndexRequest, IndexResponse, ProjectCreate,
    ProjectDetail, ProjectInfo, ProjectListResponse, ProjectSectionCreate, ProjectSectionInfo,
    ProjectSectionUpdate, ProjectSourceCreate, ProjectSourceInfo, ProjectSourceUpdate,
    ProjectStatus, ProjectUpdate, QualityStats, QueryRequest, QueryResponse, ReferenceEntry,
    ReindexRequest, SummaryResponse,
};

/// Remote operations, one method per backend endpoint.
///
/// All methods are async (via `async-trait`). Errors use the
/// [`ApiError`](crate::error::ApiError) taxonomy; a partial batch failure
/// is a successful [`BatchIndexResponse`], not an error.
#[async_trait]
pub trait Backend: Send + Sync {
    // Retrieval
    async fn query(&self, req: &QueryRequest) -> ApiResult<QueryResponse>;

    // Indexing
    async fn index_file(&self, req: &IndexRequest) -> ApiResult<IndexResponse>;
    async fn index_folder(&self, req: &BatchIndexRequest) -> ApiResult<BatchIndexResponse>;
    async fn reindex(&self, req: &ReindexRequest) -> ApiResult<BatchIndexResponse>;
    async fn reset_index(&self) -> ApiResult<Ack>;
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> ApiResult<IndexResponse>;

    // Documents
    async fn list_documents(
        &self,
        page: u32,
        limit: u32,
        status: Option<DocStatus>,
        search: Option<&str>,
    ) -> ApiResult<DocumentListResponse>;
    async fn get_document(&self, id: &str) -> ApiResult<DocumentInfo>;
    async fn delete_document(&self, id: &str) -> ApiResult<Ack>;
    async fn summarize_document(&self, id: &str) -> ApiResult<SummaryResponse>;
    async fn document_references(&self, id: &str) -> ApiResult<Vec<ReferenceEntry>>;
    async fn document_pdf(&self, id: &str) -> ApiResult<Vec<u8>>;

    // System
    async fn health(&self) -> ApiResult<HealthResponse>;
    async fn stats(&self) -> ApiResult<QualityStats>;

    // Projects
    async fn list_projects(&self, status: Option<ProjectStatus>)
        -> ApiResult<ProjectListResponse>;
    async fn create_project(&self, req: &ProjectCreate) -> ApiResult<ProjectInfo>;
    async fn get_project(&self, id: &str) -> ApiResult<ProjectDetail>;
    async fn update_project(&self, id: &str, req: &ProjectUpdate) -> ApiResult<ProjectInfo>;
    async fn delete_project(&self, id: &str) -> ApiResult<Ack>;

    // Project sources
    async fn add_source(
        &self,
        project_id: &str,
        req: &ProjectSourceCreate,
    ) -> ApiResult<ProjectSourceInfo>;
    async fn update_source(
        &self,
        project_id: &str,
        source_id: &str,
        req: &ProjectSourceUpdate,
    ) -> ApiResult<ProjectSourceInfo>;
    async fn remove_source(&self, project_id: &str, source_id: &str) -> ApiResult<Ack>;

    // Project sections
    async fn create_section(
        &self,
        project_id: &str,
        req: &ProjectSectionCreate,
    ) -> ApiResult<ProjectSectionInfo>;
    async fn update_section(
        &self,
        project_id: &str,
        section_id: &str,
        req: &ProjectSectionUpdate,
    ) -> ApiResult<ProjectSectionInfo>;
    async fn delete_section(&self, project_id: &str, section_id: &str) -> ApiResult<Ack>;

    // Export
    async fn export_project(&self, id: &str, req: &ExportRequest) -> ApiResult<ExportPayload>;
}
