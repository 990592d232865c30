//! Cache invalidation across domains, stale fallback policy, and
//! operation error visibility.

use carrel::client::Client;
use carrel::config::Config;
use carrel_core::backend::memory::InMemoryBackend;
use carrel_core::cache::ReadPolicy;
use carrel_core::error::ApiError;
use carrel_core::models::{DocStatus, DocumentInfo, ProjectCreate, ProjectSectionCreate};
use carrel_core::ops::{OpKind, OpStatus};

fn client() -> Client<InMemoryBackend> {
    Client::without_persistence(InMemoryBackend::new(), &Config::default())
}

fn paper(id: &str, title: &str) -> DocumentInfo {
    DocumentInfo {
        id: id.to_string(),
        title: title.to_string(),
        authors: None,
        year: Some(2020),
        page_count: Some(9),
        chunk_count: 4,
        status: DocStatus::Indexed,
        indexed_at: Some("2024-01-01T00:00:00".to_string()),
    }
}

#[tokio::test]
async fn corpus_mutation_invalidates_its_domains_only() {
    let mut client = client();
    client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    client.health(ReadPolicy::AllowStale).await.unwrap();
    client.stats(ReadPolicy::AllowStale).await.unwrap();
    client.projects(None, ReadPolicy::AllowStale).await.unwrap();

    client.upload("fresh.pdf", b"%PDF".to_vec()).await.unwrap();

    client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    client.health(ReadPolicy::AllowStale).await.unwrap();
    client.stats(ReadPolicy::AllowStale).await.unwrap();
    client.projects(None, ReadPolicy::AllowStale).await.unwrap();

    assert_eq!(client.backend().calls("list_documents"), 2);
    assert_eq!(client.backend().calls("health"), 2);
    assert_eq!(client.backend().calls("stats"), 2);
    // Project listings are untouched by corpus mutations.
    assert_eq!(client.backend().calls("list_projects"), 1);
}

#[tokio::test]
async fn section_edit_leaves_sibling_project_cached() {
    let mut client = client();
    let alpha = client
        .create_project(&ProjectCreate {
            title: "Alpha".to_string(),
            description: None,
        })
        .await
        .unwrap();
    let beta = client
        .create_project(&ProjectCreate {
            title: "Beta".to_string(),
            description: None,
        })
        .await
        .unwrap();

    client
        .project(&alpha.id, ReadPolicy::AllowStale)
        .await
        .unwrap();
    client
        .project(&beta.id, ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(client.backend().calls("get_project"), 2);

    client
        .create_section(
            &alpha.id,
            &ProjectSectionCreate {
                section_type: "introduction".to_string(),
                title: None,
                content: Some("Opening words.".to_string()),
            },
        )
        .await
        .unwrap();

    // Beta is still fresh; Alpha must be refetched.
    client
        .project(&beta.id, ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(client.backend().calls("get_project"), 2);

    let alpha_detail = client
        .project(&alpha.id, ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(client.backend().calls("get_project"), 3);
    assert_eq!(alpha_detail.sections.len(), 1);
}

#[tokio::test]
async fn stale_fallback_is_policy_scoped() {
    let mut client = client();
    client.backend().seed_document(paper("doc-1", "Before"));
    let before = client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(before.total, 1);

    client.upload("after.pdf", b"%PDF".to_vec()).await.unwrap();

    client
        .backend()
        .fail_next("list_documents", ApiError::Timeout);
    let err = client
        .documents(1, None, None, ReadPolicy::RequireFresh)
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Timeout);

    // Same failure, but AllowStale serves the pre-upload view.
    client
        .backend()
        .fail_next("list_documents", ApiError::Timeout);
    let stale = client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(stale.total, 1);

    // An unaffected domain still reaches the backend normally.
    let health = client.health(ReadPolicy::AllowStale).await.unwrap();
    assert_eq!(health.document_count, 2);
}

#[tokio::test]
async fn errors_stay_visible_until_the_next_attempt() {
    let mut client = client();
    client.backend().fail_next("stats", ApiError::Timeout);
    client.stats(ReadPolicy::RequireFresh).await.unwrap_err();
    assert_eq!(
        client.op_status(&OpKind::Stats),
        OpStatus::Error(ApiError::Timeout)
    );

    client.stats(ReadPolicy::RequireFresh).await.unwrap();
    assert_eq!(client.op_status(&OpKind::Stats), OpStatus::Success(()));
}

#[tokio::test]
async fn delete_then_fresh_read_never_shows_the_document() {
    let mut client = client();
    client.backend().seed_document(paper("doc-1", "Keep"));
    client.backend().seed_document(paper("doc-2", "Drop"));
    let before = client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(before.total, 2);

    client.delete_document("doc-2").await.unwrap();

    let after = client
        .documents(1, None, None, ReadPolicy::RequireFresh)
        .await
        .unwrap();
    assert_eq!(after.total, 1);
    assert!(after.documents.iter().all(|doc| doc.id != "doc-2"));

    let health = client.health(ReadPolicy::RequireFresh).await.unwrap();
    assert_eq!(health.document_count, 1);
}

#[tokio::test]
async fn distinct_listing_keys_are_cached_independently() {
    let mut client = client();
    client.backend().seed_document(paper("doc-1", "Alpha"));

    client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    client
        .documents(1, None, Some("alpha"), ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(client.backend().calls("list_documents"), 2);

    // Both keys now fresh; repeats hit the cache.
    client
        .documents(1, None, None, ReadPolicy::AllowStale)
        .await
        .unwrap();
    client
        .documents(1, None, Some("alpha"), ReadPolicy::AllowStale)
        .await
        .unwrap();
    assert_eq!(client.backend().calls("list_documents"), 2);
}
