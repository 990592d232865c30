//! End-to-end client flows against the in-memory backend: asking with
//! filters, citation resolution, project source rules, and export.

use carrel::client::Client;
use carrel::config::Config;
use carrel_core::backend::memory::InMemoryBackend;
use carrel_core::cache::ReadPolicy;
use carrel_core::citations;
use carrel_core::error::ApiError;
use carrel_core::models::{
    DocStatus, DocumentInfo, ExportFormat, ExportRequest, ProjectCreate, ProjectSectionCreate,
    ProjectSourceCreate, Relevance, Source,
};
use carrel_core::session::{ChatFilters, Role};

fn client() -> Client<InMemoryBackend> {
    Client::without_persistence(InMemoryBackend::new(), &Config::default())
}

fn paper(id: &str) -> DocumentInfo {
    DocumentInfo {
        id: id.to_string(),
        title: "Attention Is All You Need".to_string(),
        authors: Some("Vaswani et al.".to_string()),
        year: Some(2017),
        page_count: Some(11),
        chunk_count: 8,
        status: DocStatus::Indexed,
        indexed_at: Some("2024-01-01T00:00:00".to_string()),
    }
}

fn scored(id: &str, score: f64, page: Option<u32>) -> Source {
    Source {
        document_id: id.to_string(),
        title: format!("Paper {}", id),
        authors: None,
        year: Some(2021),
        page,
        section: None,
        relevance_score: score,
    }
}

fn section(kind: &str, title: &str) -> ProjectSectionCreate {
    ProjectSectionCreate {
        section_type: kind.to_string(),
        title: Some(title.to_string()),
        content: None,
    }
}

#[tokio::test]
async fn ask_sends_active_filters_with_the_question() {
    let mut client = client();
    client.merge_filters(ChatFilters {
        year_min: Some(2019),
        year_max: None,
        authors: Some(vec!["Hinton".to_string()]),
    });

    client
        .ask("  how do transformers scale?  ", Some(3))
        .await
        .unwrap();

    let sent = client.backend().last_query().unwrap();
    assert_eq!(sent.question, "how do transformers scale?");
    assert_eq!(sent.top_k, 3);
    assert_eq!(sent.year_min, Some(2019));
    assert_eq!(sent.year_max, None);
    assert_eq!(sent.authors, Some(vec!["Hinton".to_string()]));
}

#[tokio::test]
async fn failed_ask_keeps_question_and_error_reply() {
    let mut client = client();
    client.backend().fail_next(
        "query",
        ApiError::Backend {
            status: 500,
            message: "model overloaded".to_string(),
        },
    );

    let err = client.ask("why?", None).await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    let messages = client.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert!(messages[1].content.contains("backend error (500)"));
    assert!(messages[1].sources.is_empty());
    assert_eq!(messages[1].latency_ms, None);
}

#[tokio::test]
async fn answers_rank_sources_and_resolve_to_page_links() {
    let mut client = client();
    client.backend().seed_answer(
        "Layered claims.",
        vec![
            scored("borderline", 0.45, Some(9)),
            scored("weak", 0.2, None),
            scored("definitive", 0.92, Some(3)),
            scored("solid", 0.65, Some(1)),
        ],
    );

    let message = client.ask("what holds up?", None).await.unwrap();

    let resolved: Vec<_> = message
        .sources
        .iter()
        .map(|source| citations::resolve(client.base_url(), source))
        .collect();
    let labels: Vec<&str> = resolved.iter().map(|c| c.tier.label()).collect();
    assert_eq!(labels, ["high", "medium-high", "medium", "low"]);
    assert_eq!(
        resolved[0].href,
        "http://127.0.0.1:8000/api/v1/documents/definitive/pdf#page=3"
    );
    // No page known, no anchor.
    assert!(resolved[3].href.ends_with("/documents/weak/pdf"));
}

#[tokio::test]
async fn duplicate_source_never_reaches_the_backend_twice() {
    let mut client = client();
    client.backend().seed_document(paper("doc-1"));
    let project = client
        .create_project(&ProjectCreate {
            title: "Survey".to_string(),
            description: None,
        })
        .await
        .unwrap();

    let request = ProjectSourceCreate {
        document_id: "doc-1".to_string(),
        notes: None,
        relevance: Relevance::High,
    };
    client.add_source(&project.id, &request).await.unwrap();
    let err = client.add_source(&project.id, &request).await.unwrap_err();

    assert!(matches!(err, ApiError::DuplicateSource { .. }));
    assert_eq!(client.backend().calls("add_source"), 1);

    let detail = client
        .project(&project.id, ReadPolicy::RequireFresh)
        .await
        .unwrap();
    assert_eq!(detail.sources.len(), 1);
}

#[tokio::test]
async fn export_orders_sections_and_appends_bibliography() {
    let mut client = client();
    client.backend().seed_document(paper("doc-1"));
    let project = client
        .create_project(&ProjectCreate {
            title: "Attention Survey".to_string(),
            description: None,
        })
        .await
        .unwrap();
    client
        .add_source(
            &project.id,
            &ProjectSourceCreate {
                document_id: "doc-1".to_string(),
                notes: None,
                relevance: Relevance::Medium,
            },
        )
        .await
        .unwrap();

    let intro = client
        .create_section(&project.id, &section("introduction", "Introduction"))
        .await
        .unwrap();
    let methods = client
        .create_section(&project.id, &section("methods", "Methods"))
        .await
        .unwrap();
    let results = client
        .create_section(&project.id, &section("results", "Results"))
        .await
        .unwrap();

    let changed = client
        .reorder_sections(
            &project.id,
            &[results.id.clone(), intro.id.clone(), methods.id.clone()],
        )
        .await
        .unwrap();
    assert_eq!(changed, 3);

    let payload = client
        .export_project(
            &project.id,
            &ExportRequest {
                format: ExportFormat::Markdown,
                include_bibliography: true,
                citation_style: "apa".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(payload.filename.as_deref(), Some("attention_survey.md"));
    let body = String::from_utf8(payload.bytes).unwrap();
    let results_at = body.find("## Results").unwrap();
    let intro_at = body.find("## Introduction").unwrap();
    let methods_at = body.find("## Methods").unwrap();
    assert!(results_at < intro_at);
    assert!(intro_at < methods_at);
    assert!(body.contains("## Bibliography"));
    assert!(body.contains("- Vaswani et al. (2017). Attention Is All You Need."));
}

#[tokio::test]
async fn export_without_bibliography_omits_it() {
    let mut client = client();
    client.backend().seed_document(paper("doc-1"));
    let project = client
        .create_project(&ProjectCreate {
            title: "Notes".to_string(),
            description: None,
        })
        .await
        .unwrap();
    client
        .add_source(
            &project.id,
            &ProjectSourceCreate {
                document_id: "doc-1".to_string(),
                notes: None,
                relevance: Relevance::Low,
            },
        )
        .await
        .unwrap();

    let payload = client
        .export_project(
            &project.id,
            &ExportRequest {
                format: ExportFormat::Markdown,
                include_bibliography: false,
                citation_style: "apa".to_string(),
            },
        )
        .await
        .unwrap();

    let body = String::from_utf8(payload.bytes).unwrap();
    assert!(!body.contains("## Bibliography"));
}

#[tokio::test]
async fn upload_refreshes_document_listing() {
    let mut client = client();
    let before = client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(before.total, 0);

    client
        .upload("new-paper.pdf", b"%PDF-1.4".to_vec())
        .await
        .unwrap();

    let after = client
        .documents(1, None, None, ReadPolicy::RequireFresh)
        .await
        .unwrap();
    assert_eq!(after.total, 1);
    assert_eq!(after.documents[0].title, "new-paper");
    assert_eq!(client.backend().calls("list_documents"), 2);
}
