//! Cached backend views and the mutation invalidation graph.
//!
//! Each independently fetched view is cached under a [`QueryKey`]. Keys
//! group into [`Domain`]s, and every mutation names the domains it makes
//! stale via [`invalidation_targets`]. Invalidation marks entries stale
//! without evicting them: the value stays available as a last-known-good
//! fallback, and the next read refetches.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    DocStatus, DocumentListResponse, HealthResponse, ProjectDetail, ProjectListResponse,
    ProjectStatus, QualityStats,
};
use crate::ops::OpKind;

/// Identity of one cached view, parameters included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Documents {
        page: u32,
        status: Option<DocStatus>,
        search: Option<String>,
    },
    Health,
    Stats,
    Projects {
        status: Option<ProjectStatus>,
    },
    Project(String),
}

impl QueryKey {
    /// The invalidation domain this key belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            QueryKey::Documents { .. } => Domain::Documents,
            QueryKey::Health => Domain::Health,
            QueryKey::Stats => Domain::Stats,
            QueryKey::Projects { .. } => Domain::Projects,
            QueryKey::Project(id) => Domain::Project(id.clone()),
        }
    }
}

/// Granularity at which mutations invalidate: whole view families, except
/// single projects which invalidate individually.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    Documents,
    Health,
    Stats,
    Projects,
    Project(String),
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Documents => write!(f, "documents"),
            Domain::Health => write!(f, "health"),
            Domain::Stats => write!(f, "stats"),
            Domain::Projects => write!(f, "projects"),
            Domain::Project(id) => write!(f, "project:{}", id),
        }
    }
}

/// A cached view value.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Documents(DocumentListResponse),
    Health(HealthResponse),
    Stats(QualityStats),
    Projects(ProjectListResponse),
    Project(ProjectDetail),
}

/// Whether a cached entry may be served as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// How a read treats a failed refetch.
///
/// `AllowStale` falls back to the last known value when the refetch fails;
/// `RequireFresh` propagates the failure instead. The latter is used right
/// after a delete, where showing the pre-delete view would be worse than
/// showing the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    AllowStale,
    RequireFresh,
}

#[derive(Debug, Clone)]
struct Entry {
    value: CachedValue,
    fetched_at: DateTime<Utc>,
    fresh: bool,
}

/// One entry per key: last value, fresh flag, fetch time.
///
/// An entry is served while its flag is set and it is younger than the
/// freshness window; invalidation clears the flag, age expires it.
#[derive(Debug)]
pub struct Cache {
    entries: HashMap<QueryKey, Entry>,
    fresh_window: Duration,
}

impl Cache {
    pub fn new(fresh_window_secs: u64) -> Self {
        Self {
            entries: HashMap::new(),
            fresh_window: Duration::seconds(fresh_window_secs as i64),
        }
    }

    /// Store a freshly fetched value, replacing any previous entry whole.
    pub fn insert(&mut self, key: QueryKey, value: CachedValue) {
        self.insert_at(key, value, Utc::now());
    }

    fn insert_at(&mut self, key: QueryKey, value: CachedValue, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            Entry {
                value,
                fetched_at: now,
                fresh: true,
            },
        );
    }

    pub fn lookup(&self, key: &QueryKey) -> Option<(&CachedValue, Freshness)> {
        self.lookup_at(key, Utc::now())
    }

    fn lookup_at(&self, key: &QueryKey, now: DateTime<Utc>) -> Option<(&CachedValue, Freshness)> {
        self.entries.get(key).map(|entry| {
            let within_window = now.signed_duration_since(entry.fetched_at) <= self.fresh_window;
            let freshness = if entry.fresh && within_window {
                Freshness::Fresh
            } else {
                Freshness::Stale
            };
            (&entry.value, freshness)
        })
    }

    /// Mark every entry in the given domains stale. Returns how many
    /// entries were affected.
    pub fn invalidate(&mut self, domains: &[Domain]) -> usize {
        let mut marked = 0;
        for (key, entry) in self.entries.iter_mut() {
            if entry.fresh && domains.contains(&key.domain()) {
                entry.fresh = false;
                marked += 1;
            }
        }
        marked
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The static mutation-to-domain edge list.
///
/// Corpus mutations touch the document list, health counters, and quality
/// stats. Project mutations touch the affected project and the project
/// list (its counts). Reads, questions, and exports invalidate nothing.
pub fn invalidation_targets(kind: &OpKind) -> Vec<Domain> {
    match kind {
        OpKind::IndexFile
        | OpKind::IndexFolder
        | OpKind::Reindex
        | OpKind::ResetIndex
        | OpKind::Upload
        | OpKind::DeleteDocument(_) => {
            vec![Domain::Documents, Domain::Health, Domain::Stats]
        }
        OpKind::CreateProject => vec![Domain::Projects],
        OpKind::UpdateProject(id)
        | OpKind::DeleteProject(id)
        | OpKind::AddSource(id)
        | OpKind::UpdateSource(id)
        | OpKind::RemoveSource(id)
        | OpKind::CreateSection(id)
        | OpKind::UpdateSection(id)
        | OpKind::DeleteSection(id) => {
            vec![Domain::Project(id.clone()), Domain::Projects]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health_value(count: u32) -> CachedValue {
        CachedValue::Health(HealthResponse {
            status: "ok".to_string(),
            chroma_status: "ok".to_string(),
            claude_status: "ok".to_string(),
            voyage_status: "ok".to_string(),
            document_count: count,
        })
    }

    #[test]
    fn fresh_until_invalidated() {
        let mut cache = Cache::new(60);
        cache.insert(QueryKey::Health, health_value(4));

        let (_, freshness) = cache.lookup(&QueryKey::Health).unwrap();
        assert_eq!(freshness, Freshness::Fresh);

        cache.invalidate(&[Domain::Health]);
        let (value, freshness) = cache.lookup(&QueryKey::Health).unwrap();
        assert_eq!(freshness, Freshness::Stale);
        // the value survives invalidation
        assert_eq!(*value, health_value(4));
    }

    #[test]
    fn fresh_flag_expires_with_age() {
        let mut cache = Cache::new(60);
        let fetched = Utc::now();
        cache.insert_at(QueryKey::Health, health_value(1), fetched);

        let (_, f) = cache
            .lookup_at(&QueryKey::Health, fetched + Duration::seconds(59))
            .unwrap();
        assert_eq!(f, Freshness::Fresh);

        let (_, f) = cache
            .lookup_at(&QueryKey::Health, fetched + Duration::seconds(61))
            .unwrap();
        assert_eq!(f, Freshness::Stale);
    }

    #[test]
    fn invalidation_is_domain_scoped() {
        let mut cache = Cache::new(60);
        cache.insert(QueryKey::Health, health_value(1));
        cache.insert(
            QueryKey::Project("p1".to_string()),
            CachedValue::Project(ProjectDetail {
                id: "p1".to_string(),
                title: "Survey".to_string(),
                description: None,
                status: ProjectStatus::Draft,
                sources: Vec::new(),
                sections: Vec::new(),
                created_at: "2026-01-01T00:00:00".to_string(),
                updated_at: "2026-01-01T00:00:00".to_string(),
            }),
        );

        let marked = cache.invalidate(&[Domain::Project("p1".to_string()), Domain::Projects]);
        assert_eq!(marked, 1);

        let (_, health) = cache.lookup(&QueryKey::Health).unwrap();
        assert_eq!(health, Freshness::Fresh);
        let (_, project) = cache.lookup(&QueryKey::Project("p1".to_string())).unwrap();
        assert_eq!(project, Freshness::Stale);
    }

    #[test]
    fn distinct_parameters_are_distinct_entries() {
        let mut cache = Cache::new(60);
        let page1 = QueryKey::Documents {
            page: 1,
            status: None,
            search: None,
        };
        let page2 = QueryKey::Documents {
            page: 2,
            status: None,
            search: None,
        };
        cache.insert(
            page1.clone(),
            CachedValue::Documents(DocumentListResponse {
                documents: Vec::new(),
                total: 0,
                page: 1,
                limit: 20,
            }),
        );
        assert!(cache.lookup(&page1).is_some());
        assert!(cache.lookup(&page2).is_none());
    }

    #[test]
    fn corpus_mutations_invalidate_documents_health_stats() {
        for kind in [
            OpKind::DeleteDocument("d".to_string()),
            OpKind::IndexFile,
            OpKind::IndexFolder,
            OpKind::Upload,
            OpKind::Reindex,
            OpKind::ResetIndex,
        ] {
            let targets = invalidation_targets(&kind);
            assert_eq!(
                targets,
                vec![Domain::Documents, Domain::Health, Domain::Stats],
                "unexpected targets for {}",
                kind
            );
        }
    }

    #[test]
    fn project_mutations_invalidate_project_and_list() {
        let targets = invalidation_targets(&OpKind::AddSource("p7".to_string()));
        assert_eq!(
            targets,
            vec![Domain::Project("p7".to_string()), Domain::Projects]
        );
        assert_eq!(
            invalidation_targets(&OpKind::CreateProject),
            vec![Domain::Projects]
        );
    }

    #[test]
    fn reads_and_exports_invalidate_nothing() {
        assert!(invalidation_targets(&OpKind::Ask).is_empty());
        assert!(invalidation_targets(&OpKind::ListDocuments).is_empty());
        assert!(invalidation_targets(&OpKind::ExportProject("p".to_string())).is_empty());
    }
}
