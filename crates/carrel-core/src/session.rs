//! Conversation session state.
//!
//! A session is an ordered message log plus the active retrieval filters.
//! Messages are append-only and immutable once recorded; the log is never
//! reordered. The in-memory log is unbounded for the process lifetime,
//! persistence windows it through [`SessionStore::snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Source;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
///
/// Assistant messages carry the ranked sources backing the answer and the
/// backend's reported latency. A failed question still produces an
/// assistant message: its content is the error rendering and it has no
/// sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Active retrieval filters, applied to every question until changed.
///
/// Fields are independent and passed through verbatim; no cross-field
/// validation happens client-side (a `year_min` above `year_max` simply
/// matches nothing).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_max: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
}

impl ChatFilters {
    /// Shallow merge: fields set in `update` overwrite, unset fields keep
    /// their current value.
    pub fn merge(&mut self, update: ChatFilters) {
        if update.year_min.is_some() {
            self.year_min = update.year_min;
        }
        if update.year_max.is_some() {
            self.year_max = update.year_max;
        }
        if update.authors.is_some() {
            self.authors = update.authors;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.year_min.is_none() && self.year_max.is_none() && self.authors.is_none()
    }
}

/// The persisted subset of a session: the tail of the message log plus the
/// full filter set. This is the only durable client-side record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub filters: ChatFilters,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Ordered message log + active filters.
#[derive(Debug, Default)]
pub struct SessionStore {
    messages: Vec<Message>,
    filters: ChatFilters,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted snapshot.
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        Self {
            messages: snapshot.messages,
            filters: snapshot.filters,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn filters(&self) -> &ChatFilters {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append the user's question. Called before the query is dispatched,
    /// so the log records the question even when the backend fails.
    pub fn append_user(&mut self, content: impl Into<String>) -> Message {
        self.push(Role::User, content.into(), Vec::new(), None)
    }

    /// Append an answer (or its error rendering) with its ranked sources.
    pub fn append_assistant(
        &mut self,
        content: impl Into<String>,
        sources: Vec<Source>,
        latency_ms: Option<u64>,
    ) -> Message {
        self.push(Role::Assistant, content.into(), sources, latency_ms)
    }

    fn push(
        &mut self,
        role: Role,
        content: String,
        sources: Vec<Source>,
        latency_ms: Option<u64>,
    ) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            role,
            content,
            sources,
            latency_ms,
            timestamp: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    pub fn merge_filters(&mut self, update: ChatFilters) {
        self.filters.merge(update);
    }

    pub fn clear_filters(&mut self) {
        self.filters = ChatFilters::default();
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// The persisted view: at most `cap` most recent messages, full filters.
    pub fn snapshot(&self, cap: usize) -> SessionSnapshot {
        let start = self.messages.len().saturating_sub(cap);
        SessionSnapshot {
            filters: self.filters.clone(),
            messages: self.messages[start..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_preserve_order() {
        let mut session = SessionStore::new();
        session.append_user("first");
        session.append_assistant("answer one", Vec::new(), Some(12));
        session.append_user("second");

        let contents: Vec<&str> = session
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["first", "answer one", "second"]);
        assert_eq!(session.messages()[0].role, Role::User);
        assert_eq!(session.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn message_ids_are_unique() {
        let mut session = SessionStore::new();
        session.append_user("a");
        session.append_user("b");
        assert_ne!(session.messages()[0].id, session.messages()[1].id);
    }

    #[test]
    fn snapshot_keeps_last_cap_messages() {
        let mut session = SessionStore::new();
        for i in 0..60 {
            session.append_user(format!("q{}", i));
        }
        let snap = session.snapshot(50);
        assert_eq!(snap.messages.len(), 50);
        assert_eq!(snap.messages[0].content, "q10");
        assert_eq!(snap.messages[49].content, "q59");
        // the live log is untouched
        assert_eq!(session.messages().len(), 60);
    }

    #[test]
    fn snapshot_of_short_log_is_whole() {
        let mut session = SessionStore::new();
        session.append_user("only");
        let snap = session.snapshot(50);
        assert_eq!(snap.messages.len(), 1);
    }

    #[test]
    fn filter_merge_is_shallow() {
        let mut session = SessionStore::new();
        session.merge_filters(ChatFilters {
            year_min: Some(1990),
            ..Default::default()
        });
        session.merge_filters(ChatFilters {
            authors: Some(vec!["Curie".to_string()]),
            ..Default::default()
        });

        let filters = session.filters();
        assert_eq!(filters.year_min, Some(1990));
        assert_eq!(filters.authors.as_deref(), Some(&["Curie".to_string()][..]));

        session.merge_filters(ChatFilters {
            year_min: Some(2000),
            ..Default::default()
        });
        assert_eq!(session.filters().year_min, Some(2000));
        assert!(session.filters().authors.is_some());
    }

    #[test]
    fn inverted_year_range_is_accepted() {
        let mut session = SessionStore::new();
        session.merge_filters(ChatFilters {
            year_min: Some(2020),
            year_max: Some(2000),
            ..Default::default()
        });
        assert_eq!(session.filters().year_min, Some(2020));
        assert_eq!(session.filters().year_max, Some(2000));
    }

    #[test]
    fn clear_messages_keeps_filters() {
        let mut session = SessionStore::new();
        session.merge_filters(ChatFilters {
            year_max: Some(2015),
            ..Default::default()
        });
        session.append_user("q");
        session.clear_messages();
        assert!(session.is_empty());
        assert_eq!(session.filters().year_max, Some(2015));
    }

    #[test]
    fn restore_round_trip() {
        let mut session = SessionStore::new();
        session.append_user("saved question");
        session.merge_filters(ChatFilters {
            year_min: Some(2001),
            ..Default::default()
        });

        let snap = session.snapshot(50);
        let restored = SessionStore::restore(snap);
        assert_eq!(restored.messages().len(), 1);
        assert_eq!(restored.messages()[0].content, "saved question");
        assert_eq!(restored.filters().year_min, Some(2001));
    }
}
