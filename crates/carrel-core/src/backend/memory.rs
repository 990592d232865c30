//! In-memory [`Backend`] implementation for testing.
//!
//! Holds documents and projects in `Vec`s behind `std::sync::RwLock`,
//! applies the same mutation rules as the real backend (duplicate source
//! rejection, dense section orders, whitespace word counts), counts calls
//! per operation, and supports one-shot failure injection so coordinator
//! and cache behavior are assertable without a network.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::compose;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Ack, BatchIndexRequest, BatchIndexResponse, DocStatus, DocumentInfo, DocumentListResponse,
    ExportPayload, ExportRequest, HealthResponse, IndexRequest, IndexResponse, ProjectCreate,
    ProjectDetail, ProjectInfo, ProjectListResponse, ProjectSectionCreate, ProjectSectionInfo,
    ProjectSectionUpdate, ProjectSourceCreate, ProjectSourceInfo, ProjectSourceUpdate,
    ProjectStatus, ProjectUpdate, QualityStats, QueryRequest, QueryResponse, ReferenceEntry,
    ReindexRequest, SectionStatus, Source, SummaryResponse,
};

use super::Backend;

#[derive(Default)]
struct State {
    documents: Vec<DocumentInfo>,
    projects: Vec<ProjectDetail>,
    answer: String,
    answer_sources: Vec<Source>,
    references: HashMap<String, Vec<ReferenceEntry>>,
    batch_response: BatchIndexResponse,
    last_query: Option<QueryRequest>,
}

/// In-memory backend for tests.
pub struct InMemoryBackend {
    state: RwLock<State>,
    calls: RwLock<HashMap<&'static str, u32>>,
    failures: RwLock<HashMap<&'static str, ApiError>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                answer: "No answer configured.".to_string(),
                ..State::default()
            }),
            calls: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Put a document into the corpus directly, bypassing indexing.
    pub fn seed_document(&self, doc: DocumentInfo) {
        self.state.write().unwrap().documents.push(doc);
    }

    /// Set the canned answer and sources returned by `query`.
    pub fn seed_answer(&self, answer: &str, sources: Vec<Source>) {
        let mut state = self.state.write().unwrap();
        state.answer = answer.to_string();
        state.answer_sources = sources;
    }

    pub fn seed_references(&self, document_id: &str, refs: Vec<ReferenceEntry>) {
        self.state
            .write()
            .unwrap()
            .references
            .insert(document_id.to_string(), refs);
    }

    pub fn seed_batch_response(&self, response: BatchIndexResponse) {
        self.state.write().unwrap().batch_response = response;
    }

    /// Make the next call to `op` (a trait method name) fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: ApiError) {
        self.failures.write().unwrap().insert(op, err);
    }

    /// How many times `op` has been called.
    pub fn calls(&self, op: &str) -> u32 {
        self.calls.read().unwrap().get(op).copied().unwrap_or(0)
    }

    /// The most recent request seen by `query`.
    pub fn last_query(&self) -> Option<QueryRequest> {
        self.state.read().unwrap().last_query.clone()
    }

    /// Count the call and fire any injected one-shot failure.
    fn hit(&self, op: &'static str) -> ApiResult<()> {
        *self.calls.write().unwrap().entry(op).or_insert(0) += 1;
        match self.failures.write().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn not_found(what: &str) -> ApiError {
    ApiError::Backend {
        status: 404,
        message: format!("{} not found", what),
    }
}

fn project_info(detail: &ProjectDetail) -> ProjectInfo {
    ProjectInfo {
        id: detail.id.clone(),
        title: detail.title.clone(),
        description: detail.description.clone(),
        status: detail.status,
        sources_count: detail.sources.len() as u32,
        sections_count: detail.sections.len() as u32,
        created_at: detail.created_at.clone(),
        updated_at: detail.updated_at.clone(),
    }
}

fn find_project<'a>(state: &'a mut State, id: &str) -> ApiResult<&'a mut ProjectDetail> {
    state
        .projects
        .iter_mut()
        .find(|project| project.id == id)
        .ok_or_else(|| not_found("Project"))
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn query(&self, req: &QueryRequest) -> ApiResult<QueryResponse> {
        self.hit("query")?;
        let mut state = self.state.write().unwrap();
        state.last_query = Some(req.clone());
        Ok(QueryResponse {
            answer: state.answer.clone(),
            sources: state.answer_sources.clone(),
            processing_time_ms: 42,
        })
    }

    async fn index_file(&self, req: &IndexRequest) -> ApiResult<IndexResponse> {
        self.hit("index_file")?;
        let title = req.title.clone().unwrap_or_else(|| {
            std::path::Path::new(&req.file_path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| req.file_path.clone())
        });
        let doc = DocumentInfo {
            id: Uuid::new_v4().to_string(),
            title: title.clone(),
            authors: req.authors.as_ref().map(|authors| authors.join(", ")),
            year: req.year,
            page_count: Some(10),
            chunk_count: 3,
            status: DocStatus::Indexed,
            indexed_at: Some(now_iso()),
        };
        let response = IndexResponse {
            document_id: doc.id.clone(),
            title,
            chunks_count: doc.chunk_count,
            status: "indexed".to_string(),
        };
        self.state.write().unwrap().documents.push(doc);
        Ok(response)
    }

    async fn index_folder(&self, _req: &BatchIndexRequest) -> ApiResult<BatchIndexResponse> {
        self.hit("index_folder")?;
        Ok(self.state.read().unwrap().batch_response.clone())
    }

    async fn reindex(&self, req: &ReindexRequest) -> ApiResult<BatchIndexResponse> {
        self.hit("reindex")?;
        let state = self.state.read().unwrap();
        let targets: Vec<&DocumentInfo> = match &req.document_ids {
            Some(ids) => state
                .documents
                .iter()
                .filter(|doc| ids.contains(&doc.id))
                .collect(),
            None => state.documents.iter().collect(),
        };
        Ok(BatchIndexResponse {
            processed: targets.len() as u32,
            errors: Vec::new(),
            documents: targets
                .iter()
                .map(|doc| IndexResponse {
                    document_id: doc.id.clone(),
                    title: doc.title.clone(),
                    chunks_count: doc.chunk_count,
                    status: "indexed".to_string(),
                })
                .collect(),
        })
    }

    async fn reset_index(&self) -> ApiResult<Ack> {
        self.hit("reset_index")?;
        self.state.write().unwrap().documents.clear();
        Ok(Ack {
            status: "reset".to_string(),
            id: None,
        })
    }

    async fn upload(&self, filename: &str, _bytes: Vec<u8>) -> ApiResult<IndexResponse> {
        self.hit("upload")?;
        let title = filename.strip_suffix(".pdf").unwrap_or(filename).to_string();
        let doc = DocumentInfo {
            id: Uuid::new_v4().to_string(),
            title: title.clone(),
            authors: None,
            year: None,
            page_count: Some(10),
            chunk_count: 3,
            status: DocStatus::Indexed,
            indexed_at: Some(now_iso()),
        };
        let response = IndexResponse {
            document_id: doc.id.clone(),
            title,
            chunks_count: doc.chunk_count,
            status: "indexed".to_string(),
        };
        self.state.write().unwrap().documents.push(doc);
        Ok(response)
    }

    async fn list_documents(
        &self,
        page: u32,
        limit: u32,
        status: Option<DocStatus>,
        search: Option<&str>,
    ) -> ApiResult<DocumentListResponse> {
        self.hit("list_documents")?;
        let state = self.state.read().unwrap();
        let needle = search.map(|s| s.to_lowercase());
        let filtered: Vec<&DocumentInfo> = state
            .documents
            .iter()
            .filter(|doc| status.map_or(true, |wanted| doc.status == wanted))
            .filter(|doc| {
                needle
                    .as_ref()
                    .map_or(true, |needle| doc.title.to_lowercase().contains(needle))
            })
            .collect();

        let total = filtered.len() as u32;
        let start = ((page.saturating_sub(1)) * limit) as usize;
        let documents = filtered
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(DocumentListResponse {
            documents,
            total,
            page,
            limit,
        })
    }

    async fn get_document(&self, id: &str) -> ApiResult<DocumentInfo> {
        self.hit("get_document")?;
        self.state
            .read()
            .unwrap()
            .documents
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
            .ok_or_else(|| not_found("Document"))
    }

    async fn delete_document(&self, id: &str) -> ApiResult<Ack> {
        self.hit("delete_document")?;
        let mut state = self.state.write().unwrap();
        let before = state.documents.len();
        state.documents.retain(|doc| doc.id != id);
        if state.documents.len() == before {
            return Err(not_found("Document"));
        }
        Ok(Ack {
            status: "deleted".to_string(),
            id: Some(id.to_string()),
        })
    }

    async fn summarize_document(&self, id: &str) -> ApiResult<SummaryResponse> {
        self.hit("summarize_document")?;
        let state = self.state.read().unwrap();
        let doc = state
            .documents
            .iter()
            .find(|doc| doc.id == id)
            .ok_or_else(|| not_found("Document"))?;
        Ok(SummaryResponse {
            document_id: doc.id.clone(),
            summary: format!("Summary of {}.", doc.title),
        })
    }

    async fn document_references(&self, id: &str) -> ApiResult<Vec<ReferenceEntry>> {
        self.hit("document_references")?;
        let state = self.state.read().unwrap();
        if !state.documents.iter().any(|doc| doc.id == id) {
            return Err(not_found("Document"));
        }
        Ok(state.references.get(id).cloned().unwrap_or_default())
    }

    async fn document_pdf(&self, id: &str) -> ApiResult<Vec<u8>> {
        self.hit("document_pdf")?;
        let state = self.state.read().unwrap();
        if !state.documents.iter().any(|doc| doc.id == id) {
            return Err(not_found("Document"));
        }
        Ok(b"%PDF-1.4\n%stub\n".to_vec())
    }

    async fn health(&self) -> ApiResult<HealthResponse> {
        self.hit("health")?;
        let state = self.state.read().unwrap();
        Ok(HealthResponse {
            status: "ok".to_string(),
            chroma_status: "ok".to_string(),
            claude_status: "ok".to_string(),
            voyage_status: "ok".to_string(),
            document_count: state.documents.len() as u32,
        })
    }

    async fn stats(&self) -> ApiResult<QualityStats> {
        self.hit("stats")?;
        let state = self.state.read().unwrap();
        Ok(QualityStats {
            total_documents: state.documents.len() as u32,
            ..QualityStats::default()
        })
    }

    async fn list_projects(
        &self,
        status: Option<ProjectStatus>,
    ) -> ApiResult<ProjectListResponse> {
        self.hit("list_projects")?;
        let state = self.state.read().unwrap();
        let projects: Vec<ProjectInfo> = state
            .projects
            .iter()
            .filter(|project| status.map_or(true, |wanted| project.status == wanted))
            .map(project_info)
            .collect();
        let total = projects.len() as u32;
        Ok(ProjectListResponse { projects, total })
    }

    async fn create_project(&self, req: &ProjectCreate) -> ApiResult<ProjectInfo> {
        self.hit("create_project")?;
        let now = now_iso();
        let detail = ProjectDetail {
            id: Uuid::new_v4().to_string(),
            title: req.title.clone(),
            description: req.description.clone(),
            status: ProjectStatus::Draft,
            sources: Vec::new(),
            sections: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        let info = project_info(&detail);
        self.state.write().unwrap().projects.push(detail);
        Ok(info)
    }

    async fn get_project(&self, id: &str) -> ApiResult<ProjectDetail> {
        self.hit("get_project")?;
        let state = self.state.read().unwrap();
        let mut detail = state
            .projects
            .iter()
            .find(|project| project.id == id)
            .cloned()
            .ok_or_else(|| not_found("Project"))?;
        detail.sections.sort_by_key(|section| section.section_order);
        Ok(detail)
    }

    async fn update_project(&self, id: &str, req: &ProjectUpdate) -> ApiResult<ProjectInfo> {
        self.hit("update_project")?;
        let mut state = self.state.write().unwrap();
        let project = find_project(&mut state, id)?;
        if let Some(title) = &req.title {
            project.title = title.clone();
        }
        if req.description.is_some() {
            project.description = req.description.clone();
        }
        if let Some(status) = req.status {
            project.status = status;
        }
        project.updated_at = now_iso();
        Ok(project_info(project))
    }

    async fn delete_project(&self, id: &str) -> ApiResult<Ack> {
        self.hit("delete_project")?;
        let mut state = self.state.write().unwrap();
        let before = state.projects.len();
        state.projects.retain(|project| project.id != id);
        if state.projects.len() == before {
            return Err(not_found("Project"));
        }
        Ok(Ack {
            status: "deleted".to_string(),
            id: Some(id.to_string()),
        })
    }

    async fn add_source(
        &self,
        project_id: &str,
        req: &ProjectSourceCreate,
    ) -> ApiResult<ProjectSourceInfo> {
        self.hit("add_source")?;
        let mut state = self.state.write().unwrap();

        let doc = state
            .documents
            .iter()
            .find(|doc| doc.id == req.document_id)
            .cloned()
            .ok_or_else(|| not_found("Document"))?;

        let project = find_project(&mut state, project_id)?;
        if project
            .sources
            .iter()
            .any(|source| source.document_id == req.document_id)
        {
            return Err(ApiError::Backend {
                status: 400,
                message: "Source is already in the project".to_string(),
            });
        }

        let source = ProjectSourceInfo {
            id: Uuid::new_v4().to_string(),
            document_id: doc.id,
            document_title: doc.title,
            document_authors: doc.authors,
            document_year: doc.year,
            notes: req.notes.clone(),
            highlights: Vec::new(),
            relevance: req.relevance,
            added_at: now_iso(),
        };
        project.sources.push(source.clone());
        project.updated_at = now_iso();
        Ok(source)
    }

    async fn update_source(
        &self,
        project_id: &str,
        source_id: &str,
        req: &ProjectSourceUpdate,
    ) -> ApiResult<ProjectSourceInfo> {
        self.hit("update_source")?;
        let mut state = self.state.write().unwrap();
        let project = find_project(&mut state, project_id)?;
        let source = project
            .sources
            .iter_mut()
            .find(|source| source.id == source_id)
            .ok_or_else(|| not_found("Source"))?;

        if req.notes.is_some() {
            source.notes = req.notes.clone();
        }
        if let Some(highlights) = &req.highlights {
            source.highlights = highlights.clone();
        }
        if let Some(relevance) = req.relevance {
            source.relevance = relevance;
        }
        let updated = source.clone();
        project.updated_at = now_iso();
        Ok(updated)
    }

    async fn remove_source(&self, project_id: &str, source_id: &str) -> ApiResult<Ack> {
        self.hit("remove_source")?;
        let mut state = self.state.write().unwrap();
        let project = find_project(&mut state, project_id)?;
        let before = project.sources.len();
        project.sources.retain(|source| source.id != source_id);
        if project.sources.len() == before {
            return Err(not_found("Source"));
        }
        project.updated_at = now_iso();
        Ok(Ack {
            status: "removed".to_string(),
            id: Some(source_id.to_string()),
        })
    }

    async fn create_section(
        &self,
        project_id: &str,
        req: &ProjectSectionCreate,
    ) -> ApiResult<ProjectSectionInfo> {
        self.hit("create_section")?;
        let mut state = self.state.write().unwrap();
        let project = find_project(&mut state, project_id)?;

        let section = ProjectSectionInfo {
            id: Uuid::new_v4().to_string(),
            section_type: req.section_type.clone(),
            section_order: project.sections.len() as u32,
            title: req.title.clone(),
            content: req.content.clone(),
            cited_sources: Vec::new(),
            word_count: req.content.as_deref().map_or(0, compose::word_count),
            status: SectionStatus::Draft,
            updated_at: now_iso(),
        };
        project.sections.push(section.clone());
        project.updated_at = now_iso();
        Ok(section)
    }

    async fn update_section(
        &self,
        project_id: &str,
        section_id: &str,
        req: &ProjectSectionUpdate,
    ) -> ApiResult<ProjectSectionInfo> {
        self.hit("update_section")?;
        let mut state = self.state.write().unwrap();
        let project = find_project(&mut state, project_id)?;
        let section = project
            .sections
            .iter_mut()
            .find(|section| section.id == section_id)
            .ok_or_else(|| not_found("Section"))?;

        if let Some(title) = &req.title {
            section.title = Some(title.clone());
        }
        if let Some(content) = &req.content {
            section.word_count = compose::word_count(content);
            section.content = Some(content.clone());
        }
        if let Some(order) = req.section_order {
            section.section_order = order;
        }
        if let Some(status) = req.status {
            section.status = status;
        }
        section.updated_at = now_iso();
        let updated = section.clone();
        project.updated_at = now_iso();
        Ok(updated)
    }

    async fn delete_section(&self, project_id: &str, section_id: &str) -> ApiResult<Ack> {
        self.hit("delete_section")?;
        let mut state = self.state.write().unwrap();
        let project = find_project(&mut state, project_id)?;
        let before = project.sections.len();
        project.sections.retain(|section| section.id != section_id);
        if project.sections.len() == before {
            return Err(not_found("Section"));
        }
        project.updated_at = now_iso();
        Ok(Ack {
            status: "deleted".to_string(),
            id: Some(section_id.to_string()),
        })
    }

    async fn export_project(&self, id: &str, req: &ExportRequest) -> ApiResult<ExportPayload> {
        self.hit("export_project")?;
        let state = self.state.read().unwrap();
        let project = state
            .projects
            .iter()
            .find(|project| project.id == id)
            .ok_or_else(|| not_found("Project"))?;

        let mut body = format!("# {}\n\n", project.title);
        if let Some(description) = &project.description {
            body.push_str(description);
            body.push_str("\n\n");
        }
        for section in compose::ordered_sections(project) {
            let heading = section
                .title
                .clone()
                .unwrap_or_else(|| section.section_type.clone());
            body.push_str(&format!("## {}\n\n", heading));
            if let Some(content) = &section.content {
                body.push_str(content);
                body.push_str("\n\n");
            }
        }
        if req.include_bibliography && !project.sources.is_empty() {
            body.push_str("## Bibliography\n\n");
            for source in &project.sources {
                let authors = source.document_authors.as_deref().unwrap_or("Unknown");
                let year = source
                    .document_year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "n.d.".to_string());
                body.push_str(&format!(
                    "- {} ({}). {}.\n",
                    authors, year, source.document_title
                ));
            }
        }

        let filename = format!(
            "{}.{}",
            project.title.to_lowercase().replace(' ', "_"),
            req.format.extension()
        );
        Ok(ExportPayload {
            filename: Some(filename),
            bytes: body.into_bytes(),
        })
    }
}
