//! HTTP gateway to the corpus backend.
//!
//! [`HttpBackend`] implements the core [`Backend`] trait over `reqwest`.
//! One client per process, fixed request timeout, no retries. Errors map
//! onto the core taxonomy: reqwest timeouts become [`ApiError::Timeout`],
//! other transport failures [`ApiError::Network`], non-2xx responses
//! [`ApiError::Backend`] with the message taken from the FastAPI
//! `{"detail": ...}` body when present, and an undecodable 2xx body
//! [`ApiError::Decode`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use carrel_core::backend::Backend;
use carrel_core::error::{ApiError, ApiResult};
use carrel_core::models::{
    Ack, BatchIndexRequest, BatchIndexResponse, DocStatus, DocumentInfo, DocumentListResponse,
    ExportPayload, ExportRequest, HealthResponse, IndexRequest, IndexResponse, ProjectCreate,
    ProjectDetail, ProjectInfo, ProjectListResponse, ProjectSectionCreate, ProjectSectionInfo,
    ProjectSectionUpdate, ProjectSourceCreate, ProjectSourceInfo, ProjectSourceUpdate,
    ProjectStatus, ProjectUpdate, QualityStats, QueryRequest, QueryResponse, ReferenceEntry,
    ReindexRequest, SummaryResponse,
};

use crate::config::BackendConfig;

pub struct HttpBackend {
    client: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base: config.api_base(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ApiResult<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Error message for a non-2xx response: the FastAPI `detail` field when
/// the body is JSON, the raw text otherwise.
fn backend_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned())
        .map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string());

    ApiError::Backend {
        status: status.as_u16(),
        message,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
    } else {
        Err(backend_error(status, &body))
    }
}

/// Read a binary response, keeping the filename from Content-Disposition.
async fn read_payload(response: Response) -> ApiResult<ExportPayload> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.map_err(transport_error)?;
        return Err(backend_error(status, &body));
    }

    let filename = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(disposition_filename);
    let bytes = response.bytes().await.map_err(transport_error)?;

    Ok(ExportPayload {
        filename,
        bytes: bytes.to_vec(),
    })
}

fn disposition_filename(value: &str) -> Option<String> {
    let start = value.find("filename=")? + "filename=".len();
    let name = value[start..].split(';').next()?.trim().trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn query(&self, req: &QueryRequest) -> ApiResult<QueryResponse> {
        let url = self.url("/query");
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn index_file(&self, req: &IndexRequest) -> ApiResult<IndexResponse> {
        let url = self.url("/index");
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn index_folder(&self, req: &BatchIndexRequest) -> ApiResult<BatchIndexResponse> {
        let url = self.url("/index/batch");
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn reindex(&self, req: &ReindexRequest) -> ApiResult<BatchIndexResponse> {
        let url = self.url("/index/reindex");
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn reset_index(&self) -> ApiResult<Ack> {
        let url = self.url("/index/reset");
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> ApiResult<IndexResponse> {
        let url = self.url("/upload");
        debug!("POST {} ({} bytes)", url, bytes.len());
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn list_documents(
        &self,
        page: u32,
        limit: u32,
        status: Option<DocStatus>,
        search: Option<&str>,
    ) -> ApiResult<DocumentListResponse> {
        let mut params: Vec<(&str, String)> =
            vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some(status) = status {
            params.push(("status", status.to_string()));
        }
        if let Some(search) = search {
            params.push(("search", search.to_string()));
        }
        self.get_json("/documents", &params).await
    }

    async fn get_document(&self, id: &str) -> ApiResult<DocumentInfo> {
        self.get_json(&format!("/documents/{}", id), &[]).await
    }

    async fn delete_document(&self, id: &str) -> ApiResult<Ack> {
        let url = self.url(&format!("/documents/{}", id));
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn summarize_document(&self, id: &str) -> ApiResult<SummaryResponse> {
        let url = self.url(&format!("/documents/{}/summary", id));
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn document_references(&self, id: &str) -> ApiResult<Vec<ReferenceEntry>> {
        self.get_json(&format!("/documents/{}/references", id), &[])
            .await
    }

    async fn document_pdf(&self, id: &str) -> ApiResult<Vec<u8>> {
        let url = self.url(&format!("/documents/{}/pdf", id));
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(read_payload(response).await?.bytes)
    }

    async fn health(&self) -> ApiResult<HealthResponse> {
        self.get_json("/health", &[]).await
    }

    async fn stats(&self) -> ApiResult<QualityStats> {
        self.get_json("/stats", &[]).await
    }

    async fn list_projects(
        &self,
        status: Option<ProjectStatus>,
    ) -> ApiResult<ProjectListResponse> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(status) = status {
            params.push(("status", status.to_string()));
        }
        self.get_json("/projects", &params).await
    }

    async fn create_project(&self, req: &ProjectCreate) -> ApiResult<ProjectInfo> {
        let url = self.url("/projects");
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn get_project(&self, id: &str) -> ApiResult<ProjectDetail> {
        self.get_json(&format!("/projects/{}", id), &[]).await
    }

    async fn update_project(&self, id: &str, req: &ProjectUpdate) -> ApiResult<ProjectInfo> {
        let url = self.url(&format!("/projects/{}", id));
        debug!("PUT {}", url);
        let response = self
            .client
            .put(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn delete_project(&self, id: &str) -> ApiResult<Ack> {
        let url = self.url(&format!("/projects/{}", id));
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn add_source(
        &self,
        project_id: &str,
        req: &ProjectSourceCreate,
    ) -> ApiResult<ProjectSourceInfo> {
        let url = self.url(&format!("/projects/{}/sources", project_id));
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn update_source(
        &self,
        project_id: &str,
        source_id: &str,
        req: &ProjectSourceUpdate,
    ) -> ApiResult<ProjectSourceInfo> {
        let url = self.url(&format!("/projects/{}/sources/{}", project_id, source_id));
        debug!("PUT {}", url);
        let response = self
            .client
            .put(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn remove_source(&self, project_id: &str, source_id: &str) -> ApiResult<Ack> {
        let url = self.url(&format!("/projects/{}/sources/{}", project_id, source_id));
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn create_section(
        &self,
        project_id: &str,
        req: &ProjectSectionCreate,
    ) -> ApiResult<ProjectSectionInfo> {
        let url = self.url(&format!("/projects/{}/sections", project_id));
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn update_section(
        &self,
        project_id: &str,
        section_id: &str,
        req: &ProjectSectionUpdate,
    ) -> ApiResult<ProjectSectionInfo> {
        let url = self.url(&format!("/projects/{}/sections/{}", project_id, section_id));
        debug!("PUT {}", url);
        let response = self
            .client
            .put(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn delete_section(&self, project_id: &str, section_id: &str) -> ApiResult<Ack> {
        let url = self.url(&format!("/projects/{}/sections/{}", project_id, section_id));
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn export_project(&self, id: &str, req: &ExportRequest) -> ApiResult<ExportPayload> {
        let url = self.url(&format!("/projects/{}/export", id));
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;
        read_payload(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_prefers_detail_field() {
        let err = backend_error(
            StatusCode::NOT_FOUND,
            r#"{"detail": "Document non trouvé"}"#,
        );
        assert_eq!(
            err,
            ApiError::Backend {
                status: 404,
                message: "Document non trouvé".to_string()
            }
        );
    }

    #[test]
    fn backend_error_falls_back_to_raw_body() {
        let err = backend_error(StatusCode::BAD_GATEWAY, "upstream exploded\n");
        assert_eq!(
            err,
            ApiError::Backend {
                status: 502,
                message: "upstream exploded".to_string()
            }
        );
    }

    #[test]
    fn disposition_filename_variants() {
        assert_eq!(
            disposition_filename("attachment; filename=\"essay.docx\""),
            Some("essay.docx".to_string())
        );
        assert_eq!(
            disposition_filename("attachment; filename=notes.md; size=12"),
            Some("notes.md".to_string())
        );
        assert_eq!(disposition_filename("inline"), None);
    }
}
