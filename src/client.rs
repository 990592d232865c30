//! The cache-aware client.
//!
//! [`Client`] owns the four pieces of local state: the session store, the
//! view cache, the operation log, and a [`Backend`]. Every gateway call
//! runs through its operation key so superseded completions are dropped
//! and errors stay visible; every successful mutation marks its
//! invalidation targets stale; cached reads serve fresh entries, refetch
//! stale ones, and fall back per [`ReadPolicy`] when the refetch fails.
//!
//! The ask flow records the user's question before dispatching the query,
//! so the log keeps the question even when the backend fails, and appends
//! an assistant message either way: the answer with ranked sources, or
//! the error rendering with none.

use tracing::{info, warn};

use carrel_core::backend::Backend;
use carrel_core::cache::{
    invalidation_targets, Cache, CachedValue, Freshness, QueryKey, ReadPolicy,
};
use carrel_core::citations;
use carrel_core::compose;
use carrel_core::error::{ApiError, ApiResult};
use carrel_core::models::{
    Ack, BatchIndexRequest, BatchIndexResponse, DocStatus, DocumentInfo, DocumentListResponse,
    ExportPayload, ExportRequest, HealthResponse, IndexRequest, IndexResponse, ProjectCreate,
    ProjectDetail, ProjectInfo, ProjectListResponse, ProjectSectionCreate, ProjectSectionInfo,
    ProjectSectionUpdate, ProjectSourceCreate, ProjectSourceInfo, ProjectSourceUpdate,
    ProjectStatus, ProjectUpdate, QualityStats, QueryRequest, QueryResponse, ReferenceEntry,
    ReindexRequest, SummaryResponse,
};
use carrel_core::ops::{OpKind, OpStatus, OperationLog, Ticket};
use carrel_core::session::{ChatFilters, Message, SessionStore};

use crate::config::Config;
use crate::persist::SessionFile;

/// Fixed page size for document listings.
const PAGE_LIMIT: u32 = 20;

pub struct Client<B> {
    backend: B,
    base_url: String,
    top_k: u32,
    persist_limit: usize,
    session: SessionStore,
    session_file: Option<SessionFile>,
    cache: Cache,
    ops: OperationLog,
}

impl<B: Backend> Client<B> {
    /// Build a client and rehydrate the session from the configured path.
    pub fn new(backend: B, config: &Config) -> Self {
        let session_file = SessionFile::new(config.session.path.clone());
        let session = SessionStore::restore(session_file.load());
        Self {
            backend,
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            top_k: config.chat.top_k,
            persist_limit: config.session.persist_limit,
            session,
            session_file: Some(session_file),
            cache: Cache::new(config.cache.fresh_secs),
            ops: OperationLog::new(),
        }
    }

    /// Build a client with no session file, for commands that never touch
    /// the conversation (health, stats) and for tests.
    pub fn without_persistence(backend: B, config: &Config) -> Self {
        Self {
            backend,
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            top_k: config.chat.top_k,
            persist_limit: config.session.persist_limit,
            session: SessionStore::new(),
            session_file: None,
            cache: Cache::new(config.cache.fresh_secs),
            ops: OperationLog::new(),
        }
    }

    #[allow(dead_code)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[allow(dead_code)]
    pub fn op_status(&self, kind: &OpKind) -> OpStatus<()> {
        self.ops.status(kind)
    }

    // === Session ===

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn filters(&self) -> &ChatFilters {
        self.session.filters()
    }

    pub fn merge_filters(&mut self, update: ChatFilters) {
        self.session.merge_filters(update);
        self.persist();
    }

    pub fn clear_filters(&mut self) {
        self.session.clear_filters();
        self.persist();
    }

    pub fn clear_messages(&mut self) {
        self.session.clear_messages();
        self.persist();
    }

    fn persist(&self) {
        if let Some(file) = &self.session_file {
            if let Err(err) = file.save(&self.session.snapshot(self.persist_limit)) {
                warn!("Failed to persist session: {:#}", err);
            }
        }
    }

    // === Ask ===

    /// Ask a question under the session's active filters.
    ///
    /// The user message is appended (and persisted) before the query is
    /// dispatched. On success the assistant message carries the answer
    /// and the sources ranked by descending relevance; on failure it
    /// carries the error rendering, and the error is also returned.
    pub async fn ask(&mut self, question: &str, top_k: Option<u32>) -> ApiResult<Message> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::InvalidInput("question is empty".to_string()));
        }

        self.session.append_user(question);
        self.persist();

        let filters = self.session.filters().clone();
        let request = QueryRequest {
            question: question.to_string(),
            top_k: top_k.unwrap_or(self.top_k),
            year_min: filters.year_min,
            year_max: filters.year_max,
            authors: filters.authors,
        };

        let ticket = self.ops.begin(OpKind::Ask);
        let result = self.backend.query(&request).await;
        let result = self.finish(OpKind::Ask, ticket, result);

        match result {
            Ok(QueryResponse {
                answer,
                mut sources,
                processing_time_ms,
            }) => {
                citations::rank(&mut sources);
                let message =
                    self.session
                        .append_assistant(answer, sources, Some(processing_time_ms));
                self.persist();
                Ok(message)
            }
            Err(err) => {
                self.session
                    .append_assistant(err.to_string(), Vec::new(), None);
                self.persist();
                Err(err)
            }
        }
    }

    // === Cached reads ===

    pub async fn documents(
        &mut self,
        page: u32,
        status: Option<DocStatus>,
        search: Option<&str>,
        policy: ReadPolicy,
    ) -> ApiResult<DocumentListResponse> {
        let key = QueryKey::Documents {
            page,
            status,
            search: search.map(str::to_string),
        };
        if let Some((CachedValue::Documents(list), Freshness::Fresh)) = self.cache.lookup(&key) {
            return Ok(list.clone());
        }

        let ticket = self.ops.begin(OpKind::ListDocuments);
        let result = self
            .backend
            .list_documents(page, PAGE_LIMIT, status, search)
            .await;
        match self.finish(OpKind::ListDocuments, ticket, result) {
            Ok(list) => {
                self.cache
                    .insert(key, CachedValue::Documents(list.clone()));
                Ok(list)
            }
            Err(err) => match self.cache.lookup(&key) {
                Some((CachedValue::Documents(list), _)) if policy == ReadPolicy::AllowStale => {
                    warn!("Refetch of {} failed ({}); serving stale data", key.domain(), err);
                    Ok(list.clone())
                }
                _ => Err(err),
            },
        }
    }

    pub async fn health(&mut self, policy: ReadPolicy) -> ApiResult<HealthResponse> {
        if let Some((CachedValue::Health(health), Freshness::Fresh)) =
            self.cache.lookup(&QueryKey::Health)
        {
            return Ok(health.clone());
        }

        match self.fetch_health().await {
            Ok(health) => Ok(health),
            Err(err) => match self.cache.lookup(&QueryKey::Health) {
                Some((CachedValue::Health(health), _)) if policy == ReadPolicy::AllowStale => {
                    warn!("Refetch of health failed ({}); serving stale data", err);
                    Ok(health.clone())
                }
                _ => Err(err),
            },
        }
    }

    /// One `health --watch` tick: refetch unconditionally, retrying once.
    pub async fn poll_health(&mut self) -> ApiResult<HealthResponse> {
        match self.fetch_health().await {
            Ok(health) => Ok(health),
            Err(err) => {
                warn!("Health poll failed ({}); retrying once", err);
                self.fetch_health().await
            }
        }
    }

    async fn fetch_health(&mut self) -> ApiResult<HealthResponse> {
        let ticket = self.ops.begin(OpKind::Health);
        let result = self.backend.health().await;
        let result = self.finish(OpKind::Health, ticket, result);
        if let Ok(health) = &result {
            self.cache
                .insert(QueryKey::Health, CachedValue::Health(health.clone()));
        }
        result
    }

    pub async fn stats(&mut self, policy: ReadPolicy) -> ApiResult<QualityStats> {
        if let Some((CachedValue::Stats(stats), Freshness::Fresh)) =
            self.cache.lookup(&QueryKey::Stats)
        {
            return Ok(stats.clone());
        }

        let ticket = self.ops.begin(OpKind::Stats);
        let result = self.backend.stats().await;
        match self.finish(OpKind::Stats, ticket, result) {
            Ok(stats) => {
                self.cache
                    .insert(QueryKey::Stats, CachedValue::Stats(stats.clone()));
                Ok(stats)
            }
            Err(err) => match self.cache.lookup(&QueryKey::Stats) {
                Some((CachedValue::Stats(stats), _)) if policy == ReadPolicy::AllowStale => {
                    warn!("Refetch of stats failed ({}); serving stale data", err);
                    Ok(stats.clone())
                }
                _ => Err(err),
            },
        }
    }

    pub async fn projects(
        &mut self,
        status: Option<ProjectStatus>,
        policy: ReadPolicy,
    ) -> ApiResult<ProjectListResponse> {
        let key = QueryKey::Projects { status };
        if let Some((CachedValue::Projects(list), Freshness::Fresh)) = self.cache.lookup(&key) {
            return Ok(list.clone());
        }

        let ticket = self.ops.begin(OpKind::ListProjects);
        let result = self.backend.list_projects(status).await;
        match self.finish(OpKind::ListProjects, ticket, result) {
            Ok(list) => {
                self.cache.insert(key, CachedValue::Projects(list.clone()));
                Ok(list)
            }
            Err(err) => match self.cache.lookup(&key) {
                Some((CachedValue::Projects(list), _)) if policy == ReadPolicy::AllowStale => {
                    warn!("Refetch of {} failed ({}); serving stale data", key.domain(), err);
                    Ok(list.clone())
                }
                _ => Err(err),
            },
        }
    }

    pub async fn project(&mut self, id: &str, policy: ReadPolicy) -> ApiResult<ProjectDetail> {
        let key = QueryKey::Project(id.to_string());
        if let Some((CachedValue::Project(detail), Freshness::Fresh)) = self.cache.lookup(&key) {
            return Ok(detail.clone());
        }

        let kind = OpKind::ShowProject(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.get_project(id).await;
        match self.finish(kind, ticket, result) {
            Ok(detail) => {
                self.cache
                    .insert(key, CachedValue::Project(detail.clone()));
                Ok(detail)
            }
            Err(err) => match self.cache.lookup(&key) {
                Some((CachedValue::Project(detail), _)) if policy == ReadPolicy::AllowStale => {
                    warn!("Refetch of {} failed ({}); serving stale data", key.domain(), err);
                    Ok(detail.clone())
                }
                _ => Err(err),
            },
        }
    }

    // === Uncached document reads ===

    pub async fn document(&mut self, id: &str) -> ApiResult<DocumentInfo> {
        let kind = OpKind::ShowDocument(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.get_document(id).await;
        self.finish(kind, ticket, result)
    }

    pub async fn summarize_document(&mut self, id: &str) -> ApiResult<SummaryResponse> {
        let kind = OpKind::SummarizeDocument(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.summarize_document(id).await;
        self.finish(kind, ticket, result)
    }

    pub async fn document_references(&mut self, id: &str) -> ApiResult<Vec<ReferenceEntry>> {
        let kind = OpKind::FetchReferences(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.document_references(id).await;
        self.finish(kind, ticket, result)
    }

    pub async fn document_pdf(&mut self, id: &str) -> ApiResult<Vec<u8>> {
        let kind = OpKind::FetchPdf(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.document_pdf(id).await;
        self.finish(kind, ticket, result)
    }

    // === Corpus mutations ===

    pub async fn delete_document(&mut self, id: &str) -> ApiResult<Ack> {
        let kind = OpKind::DeleteDocument(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.delete_document(id).await;
        self.finish(kind, ticket, result)
    }

    pub async fn index_file(&mut self, req: &IndexRequest) -> ApiResult<IndexResponse> {
        let ticket = self.ops.begin(OpKind::IndexFile);
        let result = self.backend.index_file(req).await;
        self.finish(OpKind::IndexFile, ticket, result)
    }

    pub async fn index_folder(&mut self, req: &BatchIndexRequest) -> ApiResult<BatchIndexResponse> {
        let ticket = self.ops.begin(OpKind::IndexFolder);
        let result = self.backend.index_folder(req).await;
        self.finish(OpKind::IndexFolder, ticket, result)
    }

    pub async fn reindex(&mut self, req: &ReindexRequest) -> ApiResult<BatchIndexResponse> {
        let ticket = self.ops.begin(OpKind::Reindex);
        let result = self.backend.reindex(req).await;
        self.finish(OpKind::Reindex, ticket, result)
    }

    pub async fn reset_index(&mut self) -> ApiResult<Ack> {
        let ticket = self.ops.begin(OpKind::ResetIndex);
        let result = self.backend.reset_index().await;
        self.finish(OpKind::ResetIndex, ticket, result)
    }

    pub async fn upload(&mut self, filename: &str, bytes: Vec<u8>) -> ApiResult<IndexResponse> {
        let ticket = self.ops.begin(OpKind::Upload);
        let result = self.backend.upload(filename, bytes).await;
        self.finish(OpKind::Upload, ticket, result)
    }

    // === Project mutations ===

    pub async fn create_project(&mut self, req: &ProjectCreate) -> ApiResult<ProjectInfo> {
        let ticket = self.ops.begin(OpKind::CreateProject);
        let result = self.backend.create_project(req).await;
        self.finish(OpKind::CreateProject, ticket, result)
    }

    pub async fn update_project(
        &mut self,
        id: &str,
        req: &ProjectUpdate,
    ) -> ApiResult<ProjectInfo> {
        let kind = OpKind::UpdateProject(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.update_project(id, req).await;
        self.finish(kind, ticket, result)
    }

    pub async fn delete_project(&mut self, id: &str) -> ApiResult<Ack> {
        let kind = OpKind::DeleteProject(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.delete_project(id).await;
        self.finish(kind, ticket, result)
    }

    /// Attach a document as a project source.
    ///
    /// Checked locally against the fetched project first, so a duplicate
    /// is rejected without a mutation reaching the backend. The backend's
    /// own 400 on a duplicate (from a view the client had not seen) maps
    /// to the same [`ApiError::DuplicateSource`].
    pub async fn add_source(
        &mut self,
        project_id: &str,
        req: &ProjectSourceCreate,
    ) -> ApiResult<ProjectSourceInfo> {
        let project = self.project(project_id, ReadPolicy::AllowStale).await?;
        compose::ensure_not_attached(&project, &req.document_id)?;

        let kind = OpKind::AddSource(project_id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = match self.backend.add_source(project_id, req).await {
            Err(ApiError::Backend { status: 400, .. }) => Err(ApiError::DuplicateSource {
                project_id: project_id.to_string(),
                document_id: req.document_id.clone(),
            }),
            other => other,
        };
        self.finish(kind, ticket, result)
    }

    pub async fn update_source(
        &mut self,
        project_id: &str,
        source_id: &str,
        req: &ProjectSourceUpdate,
    ) -> ApiResult<ProjectSourceInfo> {
        let kind = OpKind::UpdateSource(project_id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.update_source(project_id, source_id, req).await;
        self.finish(kind, ticket, result)
    }

    pub async fn remove_source(&mut self, project_id: &str, source_id: &str) -> ApiResult<Ack> {
        let kind = OpKind::RemoveSource(project_id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.remove_source(project_id, source_id).await;
        self.finish(kind, ticket, result)
    }

    pub async fn create_section(
        &mut self,
        project_id: &str,
        req: &ProjectSectionCreate,
    ) -> ApiResult<ProjectSectionInfo> {
        let kind = OpKind::CreateSection(project_id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.create_section(project_id, req).await;
        self.finish(kind, ticket, result)
    }

    pub async fn update_section(
        &mut self,
        project_id: &str,
        section_id: &str,
        req: &ProjectSectionUpdate,
    ) -> ApiResult<ProjectSectionInfo> {
        let kind = OpKind::UpdateSection(project_id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self
            .backend
            .update_section(project_id, section_id, req)
            .await;
        self.finish(kind, ticket, result)
    }

    pub async fn delete_section(&mut self, project_id: &str, section_id: &str) -> ApiResult<Ack> {
        let kind = OpKind::DeleteSection(project_id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.delete_section(project_id, section_id).await;
        self.finish(kind, ticket, result)
    }

    /// Reorder sections to the given id sequence.
    ///
    /// Plans dense orders 0..n against a fresh project view and issues one
    /// section update per changed order. Returns how many updates were
    /// issued.
    pub async fn reorder_sections(
        &mut self,
        project_id: &str,
        ids_in_new_order: &[String],
    ) -> ApiResult<usize> {
        let project = self.project(project_id, ReadPolicy::RequireFresh).await?;
        let plan = compose::reorder_plan(&project.sections, ids_in_new_order)?;
        let count = plan.len();
        for (section_id, new_order) in plan {
            let update = ProjectSectionUpdate {
                section_order: Some(new_order),
                ..Default::default()
            };
            self.update_section(project_id, &section_id, &update).await?;
        }
        Ok(count)
    }

    pub async fn export_project(
        &mut self,
        id: &str,
        req: &ExportRequest,
    ) -> ApiResult<ExportPayload> {
        let kind = OpKind::ExportProject(id.to_string());
        let ticket = self.ops.begin(kind.clone());
        let result = self.backend.export_project(id, req).await;
        self.finish(kind, ticket, result)
    }

    /// Land a completion in the operation log and, for a successful
    /// mutation, mark its invalidation targets stale.
    fn finish<T>(&mut self, kind: OpKind, ticket: Ticket, result: ApiResult<T>) -> ApiResult<T> {
        let unit = result.as_ref().map(|_| ()).map_err(|err| err.clone());
        let landed = self.ops.complete(&kind, ticket, unit);
        if landed && result.is_ok() {
            let targets = invalidation_targets(&kind);
            if !targets.is_empty() {
                let marked = self.cache.invalidate(&targets);
                info!("{} marked {} cached entries stale", kind, marked);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrel_core::backend::memory::InMemoryBackend;
    use carrel_core::models::Source;
    use carrel_core::session::Role;

    fn test_client() -> Client<InMemoryBackend> {
        Client::without_persistence(InMemoryBackend::new(), &Config::default())
    }

    fn scored_source(id: &str, score: f64) -> Source {
        Source {
            document_id: id.to_string(),
            title: format!("Paper {}", id),
            authors: None,
            year: Some(2020),
            page: Some(1),
            section: None,
            relevance_score: score,
        }
    }

    #[tokio::test]
    async fn empty_question_never_reaches_backend() {
        let mut client = test_client();
        let err = client.ask("   ", None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        assert_eq!(client.backend().calls("query"), 0);
        assert!(client.messages().is_empty());
    }

    #[tokio::test]
    async fn ask_appends_user_then_ranked_assistant() {
        let mut client = test_client();
        client.backend().seed_answer(
            "Attention weighs token interactions.",
            vec![scored_source("weak", 0.3), scored_source("strong", 0.9)],
        );

        client.ask("what is attention?", None).await.unwrap();

        let messages = client.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        let cited: Vec<&str> = messages[1]
            .sources
            .iter()
            .map(|s| s.document_id.as_str())
            .collect();
        assert_eq!(cited, ["strong", "weak"]);
        assert_eq!(messages[1].latency_ms, Some(42));
    }

    #[tokio::test]
    async fn fresh_documents_read_is_served_from_cache() {
        let mut client = test_client();
        client
            .documents(1, None, None, ReadPolicy::AllowStale)
            .await
            .unwrap();
        client
            .documents(1, None, None, ReadPolicy::AllowStale)
            .await
            .unwrap();
        assert_eq!(client.backend().calls("list_documents"), 1);
    }

    #[tokio::test]
    async fn require_fresh_propagates_refetch_failure() {
        let mut client = test_client();
        client.health(ReadPolicy::AllowStale).await.unwrap();
        client.upload("a.pdf", b"%PDF".to_vec()).await.unwrap();

        client
            .backend()
            .fail_next("health", ApiError::Network("down".to_string()));
        let err = client.health(ReadPolicy::RequireFresh).await.unwrap_err();
        assert_eq!(err, ApiError::Network("down".to_string()));

        // AllowStale serves the pre-mutation value instead
        client
            .backend()
            .fail_next("health", ApiError::Network("down".to_string()));
        let stale = client.health(ReadPolicy::AllowStale).await.unwrap();
        assert_eq!(stale.document_count, 0);
    }
}
